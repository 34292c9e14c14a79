//! Kotlin renderer.
//!
//! Objects implement `AutoCloseable`. Unless the library opts out through
//! `disable_java_cleaner`, they also register with the shared
//! `java.lang.ref.Cleaner` so an unclosed handle is still freed.

use super::description::{Callable, Callback, InterfaceDescription, Object, Record};
use super::generator::{
    ConverterNames, Emitter, FfiSymbols, constant_name, member_name, sorted_by_name,
};
use super::types::{Primitive, TypeRef};
use bindkit_common::WrappedLibrary;

const CONVERTERS: ConverterNames = ConverterNames {
    primitive: primitive_name,
    optional: "Optional",
    map: "Map",
};

fn primitive_name(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Bool => "Boolean",
        Primitive::I8 => "Byte",
        Primitive::I16 => "Short",
        Primitive::I32 => "Int",
        Primitive::I64 => "Long",
        Primitive::U8 => "UByte",
        Primitive::U16 => "UShort",
        Primitive::U32 => "UInt",
        Primitive::U64 => "ULong",
        // Rejected by validation before rendering.
        Primitive::I128 | Primitive::U128 => "Nothing",
        Primitive::F32 => "Float",
        Primitive::F64 => "Double",
        Primitive::String => "String",
        Primitive::Bytes => "ByteArray",
    }
}

fn type_name(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Primitive(p) => primitive_name(*p).to_owned(),
        TypeRef::Optional(inner) => format!("{}?", type_name(inner)),
        TypeRef::Sequence(inner) => format!("List<{}>", type_name(inner)),
        TypeRef::Map(key, value) => format!("Map<{}, {}>", type_name(key), type_name(value)),
        TypeRef::Union(_) => "Nothing".to_owned(),
        TypeRef::Named(name) => name.clone(),
    }
}

/// Render the Kotlin binding body (everything after the stamp header).
pub(crate) fn render(description: &InterfaceDescription, library: WrappedLibrary) -> String {
    let symbols = FfiSymbols::new(library);
    let bindgen = library.descriptor().bindgen;
    let mut out = Emitter::default();
    out.line(0, "@file:Suppress(\"NAME_SHADOWING\")");
    out.blank();
    out.line(0, format!("package {}", bindgen.package_name));
    out.blank();
    out.line(0, "import com.sun.jna.Pointer");
    if !bindgen.disable_java_cleaner {
        out.line(0, "import java.lang.ref.Cleaner");
    }

    for record in sorted_by_name(&description.records, |r| &r.name) {
        out.blank();
        data_class(&mut out, &record);
    }
    for enumeration in sorted_by_name(&description.enums, |e| &e.name) {
        out.blank();
        out.line(0, format!("enum class {} {{", enumeration.name));
        let variants: Vec<String> = enumeration
            .variants
            .iter()
            .map(|v| constant_name(v))
            .collect();
        out.line(1, format!("{};", variants.join(", ")));
        out.line(0, "}");
    }
    for error in sorted_by_name(&description.errors, |e| &e.name) {
        out.blank();
        out.line(
            0,
            format!("sealed class {}(message: String) : Exception(message) {{", error.name),
        );
        for variant in &error.variants {
            out.line(
                1,
                format!("class {variant}(message: String) : {}(message)", error.name),
            );
        }
        out.line(0, "}");
    }
    for callback in sorted_by_name(&description.callbacks, |c| &c.name) {
        out.blank();
        callback_interface(&mut out, &callback);
    }
    for object in sorted_by_name(&description.objects, |o| &o.name) {
        out.blank();
        object_class(&mut out, &symbols, &object, bindgen.disable_java_cleaner);
    }
    for function in sorted_by_name(&description.functions, |f| &f.name) {
        out.blank();
        doc(&mut out, 0, function.docs.as_deref());
        throws_annotation(&mut out, 0, &function);
        out.line(0, format!("{} {{", signature(&function)));
        call_body(&mut out, 1, &function, &symbols.function(&function), None);
        out.line(0, "}");
    }
    out.finish()
}

fn doc(out: &mut Emitter, depth: usize, docs: Option<&str>) {
    let Some(docs) = docs else { return };
    out.line(depth, "/**");
    for line in docs.lines() {
        out.line(depth, format!(" * {line}"));
    }
    out.line(depth, " */");
}

fn data_class(out: &mut Emitter, record: &Record) {
    doc(out, 0, record.docs.as_deref());
    out.line(0, format!("data class {}(", record.name));
    for field in &record.fields {
        out.line(
            1,
            format!("var {}: {},", member_name(&field.name), type_name(&field.ty)),
        );
    }
    out.line(0, ") {");
    out.line(1, "companion object");
    out.line(0, "}");
}

fn callback_interface(out: &mut Emitter, callback: &Callback) {
    out.line(0, format!("interface {} {{", callback.name));
    for method in &callback.methods {
        doc(out, 1, method.docs.as_deref());
        throws_annotation(out, 1, method);
        out.line(1, signature(method));
    }
    out.line(0, "}");
}

fn object_class(out: &mut Emitter, symbols: &FfiSymbols, object: &Object, no_cleaner: bool) {
    let name = &object.name;
    let free = symbols.free(name);
    doc(out, 0, object.docs.as_deref());
    out.line(
        0,
        format!("class {name} internal constructor(private val pointer: Pointer) : AutoCloseable {{"),
    );
    if no_cleaner {
        out.line(1, "override fun close() {");
        out.line(
            2,
            format!("rustCall {{ status -> UniffiLib.INSTANCE.{free}(pointer, status) }}"),
        );
        out.line(1, "}");
    } else {
        out.line(
            1,
            "private val cleanable: Cleaner.Cleanable = UniffiLib.CLEANER.register(this, CleanAction(pointer))",
        );
        out.blank();
        out.line(1, "override fun close() {");
        out.line(2, "cleanable.clean()");
        out.line(1, "}");
        out.blank();
        out.line(1, "private class CleanAction(private val pointer: Pointer) : Runnable {");
        out.line(2, "override fun run() {");
        out.line(
            3,
            format!("rustCall {{ status -> UniffiLib.INSTANCE.{free}(pointer, status) }}"),
        );
        out.line(2, "}");
        out.line(1, "}");
    }

    let constructors = sorted_by_name(&object.constructors, |c| &c.name);
    for constructor in constructors.iter().filter(|c| c.name == "new") {
        out.blank();
        doc(out, 1, constructor.docs.as_deref());
        let call = rust_call(
            constructor,
            &symbols.constructor(name, constructor),
            &lowered_args(constructor),
            None,
        );
        out.line(1, format!("constructor({}) : this({call})", params(constructor)));
    }

    for method in sorted_by_name(&object.methods, |m| &m.name) {
        out.blank();
        doc(out, 1, method.docs.as_deref());
        throws_annotation(out, 1, &method);
        out.line(1, format!("{} {{", signature(&method)));
        call_body(
            out,
            2,
            &method,
            &symbols.method(name, &method),
            Some("pointer"),
        );
        out.line(1, "}");
    }

    let named: Vec<&Callable> = constructors.iter().filter(|c| c.name != "new").collect();
    if !named.is_empty() {
        out.blank();
        out.line(1, "companion object {");
        for constructor in named {
            doc(out, 2, constructor.docs.as_deref());
            let call = rust_call(
                constructor,
                &symbols.constructor(name, constructor),
                &lowered_args(constructor),
                None,
            );
            out.line(
                2,
                format!(
                    "fun {}({}): {name} = {name}({call})",
                    member_name(&constructor.name),
                    params(constructor)
                ),
            );
        }
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

fn throws_annotation(out: &mut Emitter, depth: usize, callable: &Callable) {
    if let Some(error) = &callable.throws {
        out.line(depth, format!("@Throws({error}::class)"));
    }
}

fn signature(callable: &Callable) -> String {
    let returns = callable
        .returns
        .as_ref()
        .map(|ty| format!(": {}", type_name(ty)))
        .unwrap_or_default();
    format!(
        "fun {}({}){returns}",
        member_name(&callable.name),
        params(callable)
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
    all.push("status".to_owned());
    let invocation = format!("UniffiLib.INSTANCE.{symbol}({})", all.join(", "));
    match &callable.throws {
        Some(error) => format!("rustCallWithError({error}) {{ status -> {invocation} }}"),
        None => format!("rustCall {{ status -> {invocation} }}"),
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
        Some(ty) => out.line(
            depth,
            format!("return {}.lift({call})", CONVERTERS.converter(ty)),
        ),
        None => out.line(depth, call),
    }
}
