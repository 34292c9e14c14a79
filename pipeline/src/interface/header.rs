//! C header declaring the scaffolding symbols of a wrapper crate.
//!
//! Apple framework bundles expose native code to Swift through a clang
//! module, which needs a header. The header declares exactly the symbols
//! the generated Swift binding calls, lowered to their C ABI types.

use super::description::{Callable, InterfaceDescription};
use super::generator::{Emitter, FfiSymbols, sorted_by_name};
use super::types::{Primitive, TypeRef};
use bindkit_common::WrappedLibrary;

/// File name of the header inside a framework slice.
#[must_use]
pub fn header_file_name(library: WrappedLibrary) -> String {
    format!("{}.h", library.binary_target_name())
}

/// Clang module map exposing the header as the FFI module the Swift
/// binding imports.
#[must_use]
pub fn module_map(library: WrappedLibrary) -> String {
    format!(
        "module {} {{\n    header \"{}\"\n    export *\n}}\n",
        library.binary_target_name(),
        header_file_name(library)
    )
}

/// Render the C header for `description`.
///
/// Output is deterministic for a given description and library.
#[must_use]
pub fn ffi_header(description: &InterfaceDescription, library: WrappedLibrary) -> String {
    let symbols = FfiSymbols::new(library);
    let lowering = Lowering {
        objects: description.objects.iter().map(|o| o.name.as_str()).collect(),
        callbacks: description.callbacks.iter().map(|c| c.name.as_str()).collect(),
    };
    let mut out = Emitter::default();
    out.line(
        0,
        format!(
            "// Scaffolding for {} {}.",
            description.namespace, description.interface_version
        ),
    );
    out.line(0, "#pragma once");
    out.blank();
    out.line(0, "#include <stdbool.h>");
    out.line(0, "#include <stdint.h>");
    out.blank();
    out.line(0, "#ifndef UNIFFI_SHARED_H");
    out.line(0, "#define UNIFFI_SHARED_H");
    out.line(0, "typedef struct RustBuffer {");
    out.line(1, "int32_t capacity;");
    out.line(1, "int32_t len;");
    out.line(1, "uint8_t *_Nullable data;");
    out.line(0, "} RustBuffer;");
    out.blank();
    out.line(0, "typedef struct RustCallStatus {");
    out.line(1, "int8_t code;");
    out.line(1, "RustBuffer errorBuf;");
    out.line(0, "} RustCallStatus;");
    out.line(0, "#endif");

    for object in sorted_by_name(&description.objects, |o| &o.name) {
        out.blank();
        for constructor in &object.constructors {
            let symbol = symbols.constructor(&object.name, constructor);
            out.line(0, lowering.declaration("void *_Nonnull", &symbol, None, constructor));
        }
        out.line(
            0,
            format!(
                "void {}(void *_Nonnull ptr, RustCallStatus *_Nonnull out_status);",
                symbols.free(&object.name)
            ),
        );
        for method in &object.methods {
            let symbol = symbols.method(&object.name, method);
            let returns = lowering.returns(method);
            out.line(0, lowering.declaration(&returns, &symbol, Some("void *_Nonnull ptr"), method));
        }
    }

    let functions = sorted_by_name(&description.functions, |f| &f.name);
    if !functions.is_empty() {
        out.blank();
    }
    for function in functions {
        let returns = lowering.returns(&function);
        out.line(
            0,
            lowering.declaration(&returns, &symbols.function(&function), None, &function),
        );
    }
    out.finish()
}

/// How interface types cross the C boundary.
struct Lowering<'a> {
    objects: Vec<&'a str>,
    callbacks: Vec<&'a str>,
}

impl Lowering<'_> {
    fn c_type(&self, ty: &TypeRef) -> &'static str {
        match ty {
            TypeRef::Primitive(p) => primitive_c_type(*p),
            TypeRef::Named(name) if self.objects.contains(&name.as_str()) => "void *_Nonnull",
            TypeRef::Named(name) if self.callbacks.contains(&name.as_str()) => "uint64_t",
            TypeRef::Optional(_)
            | TypeRef::Sequence(_)
            | TypeRef::Map(..)
            | TypeRef::Union(_)
            | TypeRef::Named(_) => "RustBuffer",
        }
    }

    fn returns(&self, callable: &Callable) -> String {
        callable
            .returns
            .as_ref()
            .map_or("void", |ty| self.c_type(ty))
            .to_owned()
    }

    fn declaration(
        &self,
        returns: &str,
        symbol: &str,
        receiver: Option<&str>,
        callable: &Callable,
    ) -> String {
        let mut params: Vec<String> = receiver.map(str::to_owned).into_iter().collect();
        params.extend(
            callable
                .args
                .iter()
                .map(|arg| format!("{} {}", self.c_type(&arg.ty), arg.name)),
        );
        params.push("RustCallStatus *_Nonnull out_status".to_owned());
        format!("{returns} {symbol}({});", params.join(", "))
    }
}

const fn primitive_c_type(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Bool | Primitive::I8 => "int8_t",
        Primitive::I16 => "int16_t",
        Primitive::I32 => "int32_t",
        Primitive::I64 => "int64_t",
        Primitive::U8 => "uint8_t",
        Primitive::U16 => "uint16_t",
        Primitive::U32 => "uint32_t",
        Primitive::U64 => "uint64_t",
        Primitive::F32 => "float",
        Primitive::F64 => "double",
        // 128-bit integers are rejected by validation; the rest are
        // serialised into a buffer.
        Primitive::I128 | Primitive::U128 | Primitive::String | Primitive::Bytes => "RustBuffer",
    }
}
