//! Binding generation entry point and helpers shared by the host-language
//! renderers.

use super::description::{Callable, InterfaceDescription};
use super::error::BindingError;
use super::module::{BindingModule, binding_file_name, stamp_header};
use super::types::{Primitive, TypeRef};
use super::{kotlin, swift};
use bindkit_common::WrappedLibrary;
use convert_case::{Boundary, Case, Casing};
use log::debug;
use std::fmt;

/// Host language a binding module is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum HostLanguage {
    /// Swift, consumed through a Swift package.
    Swift,
    /// Kotlin, consumed through Gradle.
    Kotlin,
}

impl HostLanguage {
    /// Every supported host language.
    pub const ALL: [Self; 2] = [Self::Swift, Self::Kotlin];

    /// File extension of generated sources.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Swift => "swift",
            Self::Kotlin => "kt",
        }
    }

    /// Directory (under the bindings root) that holds this language's output.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
        }
    }
}

impl fmt::Display for HostLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Generate the binding module for `library` in `language`.
///
/// The description is validated first. Output depends only on the
/// description, the library, and the language, so running the generator
/// twice yields byte-identical source.
///
/// # Errors
///
/// Returns [`BindingError::DuplicateName`] or
/// [`BindingError::UnsupportedType`] (tagged with `library`) when the
/// description cannot be rendered, and [`BindingError::Canonicalize`] when
/// it cannot be fingerprinted.
pub fn generate(
    description: &InterfaceDescription,
    library: WrappedLibrary,
    language: HostLanguage,
) -> Result<BindingModule, BindingError> {
    description
        .validate()
        .map_err(|err| err.for_library(library))?;
    let stamp = description.stamp()?;
    let body = match language {
        HostLanguage::Swift => swift::render(description, library),
        HostLanguage::Kotlin => kotlin::render(description, library),
    };
    let mut source = stamp_header(&stamp);
    source.push('\n');
    source.push_str(&body);
    debug!(
        "generated {language} binding for {library} ({} bytes, digest {})",
        source.len(),
        stamp.digest
    );
    Ok(BindingModule {
        library,
        language,
        file_name: binding_file_name(library, language),
        stamp,
        source,
    })
}

/// Line-oriented source buffer with four-space indentation.
#[derive(Debug, Default)]
pub(crate) struct Emitter {
    out: String,
}

impl Emitter {
    pub(crate) fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            self.out.push_str(&"    ".repeat(depth));
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.out.push('\n');
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

/// Spelling of converter names for one host language.
pub(crate) struct ConverterNames {
    pub(crate) primitive: fn(Primitive) -> &'static str,
    pub(crate) optional: &'static str,
    pub(crate) map: &'static str,
}

impl ConverterNames {
    /// Name of the `FfiConverter` that lifts and lowers `ty`.
    pub(crate) fn converter(&self, ty: &TypeRef) -> String {
        format!("FfiConverter{}", self.suffix(ty))
    }

    fn suffix(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Primitive(p) => (self.primitive)(*p).to_owned(),
            TypeRef::Optional(inner) => format!("{}{}", self.optional, self.suffix(inner)),
            TypeRef::Sequence(inner) => format!("Sequence{}", self.suffix(inner)),
            TypeRef::Map(key, value) => {
                format!("{}{}{}", self.map, self.suffix(key), self.suffix(value))
            }
            TypeRef::Union(members) => members.iter().map(|m| self.suffix(m)).collect(),
            TypeRef::Named(name) => format!("Type{name}"),
        }
    }
}

/// Native symbol names exported by the wrapper crate's scaffolding.
pub(crate) struct FfiSymbols {
    crate_name: String,
}

impl FfiSymbols {
    pub(crate) fn new(library: WrappedLibrary) -> Self {
        Self {
            crate_name: library.crate_name(),
        }
    }

    pub(crate) fn function(&self, callable: &Callable) -> String {
        format!("uniffi_{}_fn_func_{}", self.crate_name, callable.name)
    }

    pub(crate) fn method(&self, object: &str, callable: &Callable) -> String {
        format!(
            "uniffi_{}_fn_method_{}_{}",
            self.crate_name,
            object.to_ascii_lowercase(),
            callable.name
        )
    }

    pub(crate) fn constructor(&self, object: &str, callable: &Callable) -> String {
        format!(
            "uniffi_{}_fn_constructor_{}_{}",
            self.crate_name,
            object.to_ascii_lowercase(),
            callable.name
        )
    }

    pub(crate) fn free(&self, object: &str) -> String {
        format!(
            "uniffi_{}_fn_free_{}",
            self.crate_name,
            object.to_ascii_lowercase()
        )
    }
}

/// `set_default_logger` -> `setDefaultLogger`.
pub(crate) fn member_name(snake: &str) -> String {
    snake.from_case(Case::Snake).to_case(Case::Camel)
}

/// `NotFound` -> `notFound`.
pub(crate) fn variant_name(pascal: &str) -> String {
    pascal
        .from_case(Case::Pascal)
        .without_boundaries(&Boundary::digits())
        .to_case(Case::Camel)
}

/// `NotFound` -> `NOT_FOUND`, `HTTPError` -> `HTTP_ERROR`.
///
/// Digits stay attached to their word, so `Ed25519` becomes `ED25519`.
pub(crate) fn constant_name(pascal: &str) -> String {
    pascal
        .from_case(Case::Pascal)
        .without_boundaries(&Boundary::digits())
        .to_case(Case::UpperSnake)
}

/// Clone `items` sorted by `key`.
pub(crate) fn sorted_by_name<T: Clone>(items: &[T], key: impl Fn(&T) -> &str) -> Vec<T> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| key(a).cmp(key(b)));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("set_default_logger", "setDefaultLogger")]
    #[case("category", "category")]
    #[case("_private", "private")]
    #[case("sha256_digest", "sha256Digest")]
    fn converts_snake_to_member_names(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(member_name(input), expected);
    }

    #[rstest]
    #[case("NotFound", "notFound")]
    #[case("HTTPError", "httpError")]
    fn converts_pascal_to_variant_names(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(variant_name(input), expected);
    }

    #[rstest]
    #[case("NotFound", "NOT_FOUND")]
    #[case("Busy", "BUSY")]
    #[case::acronym("HTTPError", "HTTP_ERROR")]
    #[case::trailing_acronym("InvalidDID", "INVALID_DID")]
    #[case::digits("Ed25519", "ED25519")]
    #[case::digits_mid_word("Bls12381G1", "BLS12381G1")]
    fn converts_pascal_to_constant_names(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(constant_name(input), expected);
    }

    #[test]
    fn converter_names_nest() {
        let names = ConverterNames {
            primitive: |_| "String",
            optional: "Option",
            map: "Dictionary",
        };
        let ty: TypeRef = "optional<sequence<EntryTag>>".parse().expect("valid");
        assert_eq!(
            names.converter(&ty),
            "FfiConverterOptionSequenceTypeEntryTag"
        );
    }
}
