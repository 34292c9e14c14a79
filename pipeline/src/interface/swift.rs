//! Swift renderer.
//!
//! Emits one Swift source per library. Runtime helpers (`rustCall`,
//! `rustCallWithError`, `FfiConverterRustBuffer` and the primitive
//! converters) live in the library's FFI module and are imported, not
//! generated.

use super::description::{Callable, Callback, InterfaceDescription, Object, Record};
use super::generator::{
    ConverterNames, Emitter, FfiSymbols, member_name, sorted_by_name, variant_name,
};
use super::types::{Primitive, TypeRef};
use bindkit_common::WrappedLibrary;

const CONVERTERS: ConverterNames = ConverterNames {
    primitive: primitive_name,
    optional: "Option",
    map: "Dictionary",
};

fn primitive_name(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Bool => "Bool",
        Primitive::I8 => "Int8",
        Primitive::I16 => "Int16",
        Primitive::I32 => "Int32",
        Primitive::I64 => "Int64",
        Primitive::U8 => "UInt8",
        Primitive::U16 => "UInt16",
        Primitive::U32 => "UInt32",
        Primitive::U64 => "UInt64",
        // Rejected by validation before rendering.
        Primitive::I128 | Primitive::U128 => "Never",
        Primitive::F32 => "Float",
        Primitive::F64 => "Double",
        Primitive::String => "String",
        Primitive::Bytes => "Data",
    }
}

fn type_name(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Primitive(p) => primitive_name(*p).to_owned(),
        TypeRef::Optional(inner) => format!("{}?", type_name(inner)),
        TypeRef::Sequence(inner) => format!("[{}]", type_name(inner)),
        TypeRef::Map(key, value) => format!("[{}: {}]", type_name(key), type_name(value)),
        TypeRef::Union(_) => "Never".to_owned(),
        TypeRef::Named(name) => name.clone(),
    }
}

/// Render the Swift binding body (everything after the stamp header).
pub(crate) fn render(description: &InterfaceDescription, library: WrappedLibrary) -> String {
    let symbols = FfiSymbols::new(library);
    let mut out = Emitter::default();
    let ffi_module = library.binary_target_name();
    out.line(0, "import Foundation");
    out.line(0, format!("#if canImport({ffi_module})"));
    out.line(0, format!("import {ffi_module}"));
    out.line(0, "#endif");

    for record in sorted_by_name(&description.records, |r| &r.name) {
        out.blank();
        record_struct(&mut out, &record);
    }
    for enumeration in sorted_by_name(&description.enums, |e| &e.name) {
        out.blank();
        out.line(0, format!("public enum {} {{", enumeration.name));
        for variant in &enumeration.variants {
            out.line(1, format!("case {}", variant_name(variant)));
        }
        out.line(0, "}");
    }
    for error in sorted_by_name(&description.errors, |e| &e.name) {
        out.blank();
        out.line(0, format!("public enum {}: Swift.Error {{", error.name));
        for variant in &error.variants {
            out.line(1, format!("case {}(message: String)", variant_name(variant)));
        }
        out.line(0, "}");
    }
    for callback in sorted_by_name(&description.callbacks, |c| &c.name) {
        out.blank();
        callback_protocol(&mut out, &callback);
    }
    for object in sorted_by_name(&description.objects, |o| &o.name) {
        out.blank();
        object_class(&mut out, &symbols, &object);
    }
    for function in sorted_by_name(&description.functions, |f| &f.name) {
        out.blank();
        doc(&mut out, 0, function.docs.as_deref());
        out.line(0, format!("public func {} {{", signature(&function)));
        call_body(&mut out, 1, &function, &symbols.function(&function), None);
        out.line(0, "}");
    }
    out.finish()
}

fn doc(out: &mut Emitter, depth: usize, docs: Option<&str>) {
    for line in docs.into_iter().flat_map(str::lines) {
        out.line(depth, format!("/// {line}"));
    }
}

fn record_struct(out: &mut Emitter, record: &Record) {
    doc(out, 0, record.docs.as_deref());
    out.line(0, format!("public struct {} {{", record.name));
    for field in &record.fields {
        out.line(
            1,
            format!("public var {}: {}", member_name(&field.name), type_name(&field.ty)),
        );
    }
    out.blank();
    let params: Vec<String> = record
        .fields
        .iter()
        .map(|f| format!("{}: {}", member_name(&f.name), type_name(&f.ty)))
        .collect();
    out.line(1, format!("public init({}) {{", params.join(", ")));
    for field in &record.fields {
        let name = member_name(&field.name);
        out.line(2, format!("self.{name} = {name}"));
    }
    out.line(1, "}");
    out.line(0, "}");
    out.blank();

    let name = &record.name;
    out.line(
        0,
        format!("public struct FfiConverterType{name}: FfiConverterRustBuffer {{"),
    );
    out.line(
        1,
        format!(
            "public static func read(from buf: inout (data: Data, offset: Data.Index)) throws -> {name} {{"
        ),
    );
    out.line(2, format!("return try {name}("));
    let reads: Vec<String> = record
        .fields
        .iter()
        .map(|f| {
            format!(
                "{}: {}.read(from: &buf)",
                member_name(&f.name),
                CONVERTERS.converter(&f.ty)
            )
        })
        .collect();
    let last = reads.len().saturating_sub(1);
    for (i, read) in reads.iter().enumerate() {
        out.line(3, if i == last { read.clone() } else { format!("{read},") });
    }
    out.line(2, ")");
    out.line(1, "}");
    out.blank();
    out.line(
        1,
        format!("public static func write(_ value: {name}, into buf: inout [UInt8]) {{"),
    );
    for field in &record.fields {
        out.line(
            2,
            format!(
                "{}.write(value.{}, into: &buf)",
                CONVERTERS.converter(&field.ty),
                member_name(&field.name)
            ),
        );
    }
    out.line(1, "}");
    out.line(0, "}");
}

fn callback_protocol(out: &mut Emitter, callback: &Callback) {
    out.line(0, format!("public protocol {}: AnyObject {{", callback.name));
    for method in &callback.methods {
        doc(out, 1, method.docs.as_deref());
        out.line(1, format!("func {}", signature(method)));
    }
    out.line(0, "}");
}

fn object_class(out: &mut Emitter, symbols: &FfiSymbols, object: &Object) {
    let name = &object.name;
    doc(out, 0, object.docs.as_deref());
    out.line(0, format!("public final class {name} {{"));
    out.line(1, "fileprivate let pointer: UnsafeMutableRawPointer");
    out.blank();
    out.line(
        1,
        "fileprivate init(unsafeFromRawPointer pointer: UnsafeMutableRawPointer) {",
    );
    out.line(2, "self.pointer = pointer");
    out.line(1, "}");

    for constructor in sorted_by_name(&object.constructors, |c| &c.name) {
        out.blank();
        doc(out, 1, constructor.docs.as_deref());
        let symbol = symbols.constructor(name, &constructor);
        let call = rust_call(&constructor, &symbol, &lowered_args(&constructor), None);
        if constructor.name == "new" {
            out.line(
                1,
                format!(
                    "public convenience init({}){} {{",
                    params(&constructor),
                    throws_clause(&constructor)
                ),
            );
            out.line(2, format!("self.init(unsafeFromRawPointer: {call})"));
        } else {
            out.line(
                1,
                format!(
                    "public static func {}({}){} -> {name} {{",
                    member_name(&constructor.name),
                    params(&constructor),
                    throws_clause(&constructor)
                ),
            );
            out.line(2, format!("return {name}(unsafeFromRawPointer: {call})"));
        }
        out.line(1, "}");
    }

    out.blank();
    out.line(1, "deinit {");
    out.line(
        2,
        format!("try! rustCall {{ {}(pointer, $0) }}", symbols.free(name)),
    );
    out.line(1, "}");

    for method in sorted_by_name(&object.methods, |m| &m.name) {
        out.blank();
        doc(out, 1, method.docs.as_deref());
        out.line(1, format!("public func {} {{", signature(&method)));
        call_body(
            out,
            2,
            &method,
            &symbols.method(name, &method),
            Some("self.pointer"),
        );
        out.line(1, "}");
    }
    out.line(0, "}");
}

fn params(callable: &Callable) -> String {
    callable
        .args
        .iter()
        .map(|a| format!("{}: {}", member_name(&a.name), type_name(&a.ty)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn throws_clause(callable: &Callable) -> &'static str {
    if callable.throws.is_some() {
        " throws"
    } else {
        ""
    }
}

fn signature(callable: &Callable) -> String {
    let returns = callable
        .returns
        .as_ref()
        .map(|ty| format!(" -> {}", type_name(ty)))
        .unwrap_or_default();
    format!(
        "{}({}){}{returns}",
        member_name(&callable.name),
        params(callable),
        throws_clause(callable)
    )
}

fn lowered_args(callable: &Callable) -> Vec<String> {
    callable
        .args
        .iter()
        .map(|a| {
            format!(
                "{}.lower({})",
                CONVERTERS.converter(&a.ty),
                member_name(&a.name)
            )
        })
        .collect()
}

fn rust_call(callable: &Callable, symbol: &str, args: &[String], receiver: Option<&str>) -> String {
    let mut all: Vec<String> = receiver.map(str::to_owned).into_iter().collect();
    all.extend_from_slice(args);
    all.push("$0".to_owned());
    let invocation = format!("{symbol}({})", all.join(", "));
    match &callable.throws {
        Some(error) => format!(
            "try rustCallWithError(FfiConverterType{error}.lift) {{ {invocation} }}"
        ),
        None => format!("try! rustCall {{ {invocation} }}"),
    }
}

fn call_body(
    out: &mut Emitter,
    depth: usize,
    callable: &Callable,
    symbol: &str,
    receiver: Option<&str>,
) {
    let call = rust_call(callable, symbol, &lowered_args(callable), receiver);
    match &callable.returns {
        Some(ty) => {
            let lift = if callable.throws.is_some() { "try" } else { "try!" };
            out.line(
                depth,
                format!("return {lift} {}.lift({call})", CONVERTERS.converter(ty)),
            );
        }
        None => out.line(depth, call),
    }
}
