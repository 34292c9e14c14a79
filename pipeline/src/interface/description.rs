//! Interface description schema, validation, and digest.
//!
//! An interface description is the JSON document a wrapper crate exports to
//! describe its foreign-callable surface. The generator consumes it, and
//! the pipeline fingerprints it: the digest is the SHA-256 of its
//! canonical JSON form (object keys sorted, insignificant whitespace and
//! type-spelling differences removed), so reformatting a description does
//! not change the digest but any semantic edit does.

use super::error::BindingError;
use super::types::TypeRef;
use crate::artefact::checksum::Checksum;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Interface version and digest stamped into generated bindings and
/// archive manifests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceStamp {
    /// Declared interface version.
    pub version: String,
    /// Digest of the canonical description.
    pub digest: Checksum,
}

/// A named, typed value (record field or argument).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Field {
    /// Identifier in `snake_case`.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// A record (value type with named fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Record {
    /// Type name in `UpperCamelCase`.
    pub name: String,
    /// Optional documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
}

/// A fieldless enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Enumeration {
    /// Type name.
    pub name: String,
    /// Variant names in `UpperCamelCase`.
    pub variants: Vec<String>,
}

/// An error enumeration. Each variant carries a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorType {
    /// Type name.
    pub name: String,
    /// Variant names in `UpperCamelCase`.
    pub variants: Vec<String>,
}

/// A callable: free function, method, constructor, or callback method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Callable {
    /// Identifier in `snake_case`.
    pub name: String,
    /// Optional documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    /// Arguments in order.
    #[serde(default)]
    pub args: Vec<Field>,
    /// Return type; `None` for unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<TypeRef>,
    /// Error type the call may raise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throws: Option<String>,
}

/// An object: an opaque native handle with constructors and methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Object {
    /// Type name.
    pub name: String,
    /// Optional documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    /// Constructors.
    #[serde(default)]
    pub constructors: Vec<Callable>,
    /// Methods.
    #[serde(default)]
    pub methods: Vec<Callable>,
}

/// A callback interface implemented on the host side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Callback {
    /// Type name.
    pub name: String,
    /// Methods the host implements.
    pub methods: Vec<Callable>,
}

/// A complete interface description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceDescription {
    /// Namespace of the native library.
    pub namespace: String,
    /// Declared interface version.
    pub interface_version: String,
    /// Records.
    #[serde(default)]
    pub records: Vec<Record>,
    /// Enumerations.
    #[serde(default)]
    pub enums: Vec<Enumeration>,
    /// Error enumerations.
    #[serde(default)]
    pub errors: Vec<ErrorType>,
    /// Objects.
    #[serde(default)]
    pub objects: Vec<Object>,
    /// Free functions.
    #[serde(default)]
    pub functions: Vec<Callable>,
    /// Callback interfaces.
    #[serde(default)]
    pub callbacks: Vec<Callback>,
}

impl InterfaceDescription {
    /// Read and parse a description file.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Read`] or [`BindingError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, BindingError> {
        let json = std::fs::read_to_string(path).map_err(|source| BindingError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json_str(&json, path.as_str())
    }

    /// Parse a description from JSON. `origin` is used only in errors.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Parse`] when the JSON does not match the
    /// schema or a type fails to parse.
    pub fn from_json_str(json: &str, origin: &str) -> Result<Self, BindingError> {
        serde_json::from_str(json).map_err(|err| BindingError::Parse {
            origin: origin.to_owned(),
            reason: err.to_string(),
        })
    }

    /// Compute the digest of the canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Canonicalize`] when the description cannot
    /// be converted to JSON. Hashing a placeholder instead would give every
    /// such description the same digest.
    ///
    /// # Examples
    ///
    /// ```
    /// use bindkit_pipeline::interface::InterfaceDescription;
    ///
    /// let a = InterfaceDescription::from_json_str(
    ///     r#"{"namespace":"askar","interface_version":"1.0.0"}"#,
    ///     "inline",
    /// )
    /// .expect("valid");
    /// let b = InterfaceDescription::from_json_str(
    ///     r#"{ "interface_version": "1.0.0", "namespace": "askar", "records": [] }"#,
    ///     "inline",
    /// )
    /// .expect("valid");
    /// assert_eq!(a.digest().expect("digest"), b.digest().expect("digest"));
    /// ```
    pub fn digest(&self) -> Result<Checksum, BindingError> {
        // serde_json::Value keeps object keys sorted, which makes the
        // serialisation canonical.
        let canonical =
            serde_json::to_value(self).map_err(|err| BindingError::Canonicalize {
                namespace: self.namespace.clone(),
                reason: err.to_string(),
            })?;
        Ok(Checksum::of_bytes(canonical.to_string().as_bytes()))
    }

    /// Return the version and digest pair.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Canonicalize`] as [`Self::digest`] does.
    pub fn stamp(&self) -> Result<InterfaceStamp, BindingError> {
        Ok(InterfaceStamp {
            version: self.interface_version.clone(),
            digest: self.digest()?,
        })
    }

    /// Check that names are unique, every type is representable, and every
    /// named reference resolves.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::DuplicateName`] or
    /// [`BindingError::UnsupportedType`] naming the first offending item.
    pub fn validate(&self) -> Result<(), BindingError> {
        let mut declared = BTreeSet::new();
        let names = self
            .records
            .iter()
            .map(|r| &r.name)
            .chain(self.enums.iter().map(|e| &e.name))
            .chain(self.errors.iter().map(|e| &e.name))
            .chain(self.objects.iter().map(|o| &o.name))
            .chain(self.callbacks.iter().map(|c| &c.name));
        for name in names {
            if !declared.insert(name.as_str()) {
                return Err(BindingError::DuplicateName { name: name.clone() });
            }
        }
        let value_types: BTreeSet<&str> = self
            .records
            .iter()
            .map(|r| r.name.as_str())
            .chain(self.enums.iter().map(|e| e.name.as_str()))
            .chain(self.objects.iter().map(|o| o.name.as_str()))
            .chain(self.callbacks.iter().map(|c| c.name.as_str()))
            .collect();
        let error_types: BTreeSet<&str> = self.errors.iter().map(|e| e.name.as_str()).collect();
        let checker = Checker {
            value_types: &value_types,
            error_types: &error_types,
        };

        for record in &self.records {
            for field in &record.fields {
                checker.check_type(&format!("{}.{}", record.name, field.name), &field.ty)?;
            }
        }
        for function in &self.functions {
            checker.check_callable(&function.name, function)?;
        }
        for object in &self.objects {
            for callable in object.constructors.iter().chain(&object.methods) {
                checker.check_callable(&format!("{}.{}", object.name, callable.name), callable)?;
            }
        }
        for callback in &self.callbacks {
            for method in &callback.methods {
                checker.check_callable(&format!("{}.{}", callback.name, method.name), method)?;
            }
        }
        Ok(())
    }
}

struct Checker<'a> {
    value_types: &'a BTreeSet<&'a str>,
    error_types: &'a BTreeSet<&'a str>,
}

impl Checker<'_> {
    fn check_callable(&self, item: &str, callable: &Callable) -> Result<(), BindingError> {
        for arg in &callable.args {
            self.check_type(&format!("{item}({})", arg.name), &arg.ty)?;
        }
        if let Some(returns) = &callable.returns {
            self.check_type(&format!("{item} return"), returns)?;
        }
        if let Some(throws) = &callable.throws {
            if !self.error_types.contains(throws.as_str()) {
                return Err(unsupported(format!("{item} throws"), throws.clone()));
            }
        }
        Ok(())
    }

    fn check_type(&self, item: &str, ty: &TypeRef) -> Result<(), BindingError> {
        if let Some(bad) = ty.first_unrepresentable() {
            return Err(unsupported(item.to_owned(), bad.to_string()));
        }
        let mut names = Vec::new();
        ty.named_refs(&mut names);
        if let Some(unknown) = names.into_iter().find(|n| !self.value_types.contains(n)) {
            return Err(unsupported(item.to_owned(), unknown.to_owned()));
        }
        Ok(())
    }
}

fn unsupported(item: String, ty: String) -> BindingError {
    BindingError::UnsupportedType {
        library: None,
        item,
        ty,
    }
}
