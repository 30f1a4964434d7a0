//! Turns one file descriptor into one generated Rust module
//!
//! Generation runs in two passes: the descriptor is first checked and
//! lowered into a small plan (rejecting the constructs the codec does not
//! carry), then the plan is printed. Printed code only ever calls the typed
//! builder/parser surface, so the back-patching contract stays inside the
//! runtime.

use crate::gen::descriptor::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, LABEL_REPEATED,
};
use crate::gen::GenError;
use crate::sizeof::header_size;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    Str,
    Message,
    Bytes,
    Uint32,
    Enum,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl FieldKind {
    fn from_raw(raw: i32, location: &str) -> Result<FieldKind, GenError> {
        Ok(match raw {
            1 => FieldKind::Double,
            2 => FieldKind::Float,
            3 => FieldKind::Int64,
            4 => FieldKind::Uint64,
            5 => FieldKind::Int32,
            6 => FieldKind::Fixed64,
            7 => FieldKind::Fixed32,
            8 => FieldKind::Bool,
            9 => FieldKind::Str,
            10 => {
                return Err(GenError::Unsupported {
                    location: location.to_owned(),
                    construct: "group fields",
                })
            }
            11 => FieldKind::Message,
            12 => FieldKind::Bytes,
            13 => FieldKind::Uint32,
            14 => FieldKind::Enum,
            15 => FieldKind::Sfixed32,
            16 => FieldKind::Sfixed64,
            17 => FieldKind::Sint32,
            18 => FieldKind::Sint64,
            other => {
                return Err(GenError::UnknownType {
                    location: location.to_owned(),
                    raw: other,
                })
            }
        })
    }

    /// The `{stem}_field` accessor/emitter name for this type
    fn stem(self) -> &'static str {
        match self {
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::Int64 => "int64",
            FieldKind::Uint64 => "uint64",
            FieldKind::Int32 => "int32",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Bool => "bool",
            FieldKind::Str => "string",
            FieldKind::Message => "message",
            FieldKind::Bytes => "bytes",
            FieldKind::Uint32 => "uint32",
            // enums travel as plain int32 varints
            FieldKind::Enum => "int32",
            FieldKind::Sfixed32 => "sfixed32",
            FieldKind::Sfixed64 => "sfixed64",
            FieldKind::Sint32 => "sint32",
            FieldKind::Sint64 => "sint64",
        }
    }

    fn scalar_type(self) -> &'static str {
        match self {
            FieldKind::Double => "f64",
            FieldKind::Float => "f32",
            FieldKind::Int64 | FieldKind::Sfixed64 | FieldKind::Sint64 => "i64",
            FieldKind::Uint64 | FieldKind::Fixed64 => "u64",
            FieldKind::Int32 | FieldKind::Enum | FieldKind::Sfixed32 | FieldKind::Sint32 => "i32",
            FieldKind::Uint32 | FieldKind::Fixed32 => "u32",
            FieldKind::Bool => "bool",
            FieldKind::Str => "String",
            FieldKind::Bytes => "Vec<u8>",
            FieldKind::Message => unreachable!("message members are named types"),
        }
    }

    fn is_packable(self) -> bool {
        !matches!(self, FieldKind::Str | FieldKind::Bytes | FieldKind::Message)
    }

    /// Worst case payload bytes of one occurrence, headers excluded
    fn payload_bound(self) -> usize {
        match self {
            FieldKind::Double | FieldKind::Fixed64 | FieldKind::Sfixed64 => 8,
            FieldKind::Float | FieldKind::Fixed32 | FieldKind::Sfixed32 => 4,
            // varints and the length prefix of blobs both cap at 10
            _ => 10,
        }
    }
}

struct FieldPlan {
    ident: String,
    number: u64,
    kind: FieldKind,
    repeated: bool,
    packed: bool,
    /// Resolved Rust type name for message fields
    message_type: Option<String>,
}

struct MessagePlan {
    ident: String,
    fields: Vec<FieldPlan>,
}

impl MessagePlan {
    fn build(file: &FileDescriptorProto, m: &DescriptorProto) -> Result<MessagePlan, GenError> {
        if !m.nested_type.is_empty() {
            return Err(GenError::Unsupported {
                location: format!("message {}", m.name),
                construct: "nested message types",
            });
        }
        let fields = m
            .field
            .iter()
            .map(|f| FieldPlan::build(file, m, f))
            .collect::<Result<_, _>>()?;
        Ok(MessagePlan {
            ident: rust_ident(&m.name),
            fields,
        })
    }
}

impl FieldPlan {
    fn build(
        file: &FileDescriptorProto,
        m: &DescriptorProto,
        f: &FieldDescriptorProto,
    ) -> Result<FieldPlan, GenError> {
        let location = format!("field {}.{}", m.name, f.name);
        if f.oneof_index.is_some() {
            return Err(GenError::Unsupported {
                location,
                construct: "oneof",
            });
        }
        let kind = FieldKind::from_raw(f.r#type, &location)?;
        let message_type = if kind == FieldKind::Message {
            Some(resolve_type_name(file, &location, &f.type_name)?)
        } else {
            None
        };
        let repeated = f.label == LABEL_REPEATED;
        let packed = repeated
            && kind.is_packable()
            && match f.options.as_ref().and_then(|o| o.packed) {
                Some(explicit) => explicit,
                None => file.syntax == "proto3",
            };
        Ok(FieldPlan {
            ident: rust_ident(&f.name),
            number: f.number as u64,
            kind,
            repeated,
            packed,
            message_type,
        })
    }

    fn member_type(&self) -> String {
        let element = match &self.message_type {
            Some(name) => format!("Box<{name}>"),
            None => self.kind.scalar_type().to_owned(),
        };
        if self.repeated {
            format!("Vec<{element}>")
        } else if self.message_type.is_some() {
            format!("Option<{element}>")
        } else {
            element
        }
    }
}

// Map fields keep the nested-entry rejection honest: protoc lowers them to a
// repeated message of a nested *Entry type, so they fail there.
fn resolve_type_name(
    file: &FileDescriptorProto,
    location: &str,
    type_name: &str,
) -> Result<String, GenError> {
    if type_name.is_empty() {
        return Err(GenError::MissingTypeName {
            location: location.to_owned(),
        });
    }
    let mut rest = type_name.strip_prefix('.').unwrap_or(type_name);
    if !file.package.is_empty() {
        if let Some(stripped) = rest.strip_prefix(&format!("{}.", file.package)) {
            rest = stripped;
        }
    }
    if rest.contains('.') {
        return Err(GenError::ForeignType {
            location: location.to_owned(),
            name: type_name.to_owned(),
        });
    }
    Ok(rust_ident(rest))
}

fn rust_ident(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" | "extern" => format!("{name}_"),
        "as" | "async" | "await" | "box" | "break" | "const" | "continue" | "do" | "dyn"
        | "else" | "enum" | "false" | "fn" | "for" | "if" | "impl" | "in" | "let" | "loop"
        | "match" | "mod" | "move" | "mut" | "priv" | "pub" | "ref" | "return" | "static"
        | "struct" | "trait" | "true" | "try" | "type" | "unsafe" | "use" | "where" | "while"
        | "yield" => format!("r#{name}"),
        _ => name.to_owned(),
    }
}

struct Emitter {
    out: String,
    indent: usize,
}

impl Emitter {
    fn new() -> Emitter {
        Emitter {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: &str) {
        self.indent -= 1;
        self.line(text);
    }
}

/// Prints the generated module for one `.proto` file
pub(super) fn generate_file(fd: &FileDescriptorProto) -> Result<String, GenError> {
    let messages = fd
        .message_type
        .iter()
        .map(|m| MessagePlan::build(fd, m))
        .collect::<Result<Vec<_>, _>>()?;

    let mut e = Emitter::new();
    e.line(&format!(
        "//! Generated by protoc-gen-pocket {} from {}. Do not edit.",
        env!("CARGO_PKG_VERSION"),
        fd.name
    ));
    e.blank();
    e.line("#![allow(non_camel_case_types)]");
    e.blank();

    let package_mods: Vec<String> = if fd.package.is_empty() {
        Vec::new()
    } else {
        fd.package.split('.').map(rust_ident).collect()
    };
    for m in &package_mods {
        e.open(&format!("pub mod {m} {{"));
    }

    e.line("use pocket_protobuf::{InputStream, Message, MsgBuilder, MsgParser, OutputStream, Result};");
    for m in &messages {
        e.blank();
        emit_struct(&mut e, m);
    }
    for m in &messages {
        e.blank();
        emit_impl(&mut e, m);
    }

    for _ in &package_mods {
        e.close("}");
    }
    Ok(e.out)
}

fn emit_struct(e: &mut Emitter, m: &MessagePlan) {
    e.line("#[derive(Debug, Default, PartialEq, Clone)]");
    if m.fields.is_empty() {
        e.line(&format!("pub struct {} {{}}", m.ident));
        return;
    }
    e.open(&format!("pub struct {} {{", m.ident));
    for f in &m.fields {
        e.line(&format!("pub {}: {},", f.ident, f.member_type()));
    }
    e.close("}");
}

fn emit_impl(e: &mut Emitter, m: &MessagePlan) {
    e.open(&format!("impl Message for {} {{", m.ident));
    emit_estimate_size(e, m);
    e.blank();
    emit_encode(e, m);
    e.blank();
    emit_decode(e, m);
    e.close("}");
}

fn emit_estimate_size(e: &mut Emitter, m: &MessagePlan) {
    if m.fields.is_empty() {
        e.open("fn estimate_size(&self) -> usize {");
        e.line("0");
        e.close("}");
        return;
    }
    e.open("fn estimate_size(&self) -> usize {");
    e.line("let mut size: usize = 0;");

    // repeated fields of the same per-element weight share one tally line
    let mut weights: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    let mut fixed: usize = 0;
    for f in &m.fields {
        let hsize = header_size(f.number);
        if f.kind == FieldKind::Message {
            let per_element = 10 + hsize;
            if f.repeated {
                e.open(&format!("for e in &self.{} {{", f.ident));
                e.line(&format!(
                    "size = size.saturating_add(e.estimate_size()).saturating_add({per_element});"
                ));
                e.close("}");
            } else {
                e.open(&format!("if let Some(m) = &self.{} {{", f.ident));
                e.line(&format!(
                    "size = size.saturating_add(m.estimate_size()).saturating_add({per_element});"
                ));
                e.close("}");
            }
            continue;
        }
        let weight = f.kind.payload_bound() + hsize;
        if f.repeated {
            if matches!(f.kind, FieldKind::Str | FieldKind::Bytes) {
                e.open(&format!("for e in &self.{} {{", f.ident));
                e.line("size = size.saturating_add(e.len());");
                e.close("}");
            }
            weights.entry(weight).or_default().push(f.ident.clone());
        } else {
            if matches!(f.kind, FieldKind::Str | FieldKind::Bytes) {
                e.line(&format!(
                    "size = size.saturating_add(self.{}.len());",
                    f.ident
                ));
            }
            fixed += weight;
        }
    }
    for (weight, names) in &weights {
        let lens = names
            .iter()
            .map(|n| format!("self.{n}.len()"))
            .collect::<Vec<_>>()
            .join(" + ");
        e.line(&format!(
            "size = size.saturating_add({weight}usize.saturating_mul({lens}));"
        ));
    }
    if fixed > 0 {
        e.line(&format!("size = size.saturating_add({fixed});"));
    }
    e.line("size");
    e.close("}");
}

fn emit_encode(e: &mut Emitter, m: &MessagePlan) {
    e.open("fn encode<S: OutputStream>(&self, b: &mut MsgBuilder<S>) -> Result<()> {");
    for f in &m.fields {
        let n = f.number;
        let name = &f.ident;
        let stem = f.kind.stem();
        if f.packed {
            e.line(&format!("b.packed_{stem}_field({n}, &self.{name});"));
        } else if f.repeated {
            match f.kind {
                FieldKind::Message => {
                    e.line(&format!(
                        "for e in &self.{name} {{ b.message_field({n}, &**e); }}"
                    ));
                }
                FieldKind::Str | FieldKind::Bytes => {
                    e.line(&format!(
                        "for e in &self.{name} {{ b.{stem}_field({n}, e); }}"
                    ));
                }
                _ => {
                    e.line(&format!(
                        "for e in &self.{name} {{ b.{stem}_field({n}, *e); }}"
                    ));
                }
            }
        } else {
            match f.kind {
                FieldKind::Message => {
                    e.line(&format!(
                        "if let Some(m) = &self.{name} {{ b.message_field({n}, &**m); }}"
                    ));
                }
                FieldKind::Str | FieldKind::Bytes => {
                    e.line(&format!("b.{stem}_field({n}, &self.{name});"));
                }
                _ => {
                    e.line(&format!("b.{stem}_field({n}, self.{name});"));
                }
            }
        }
    }
    e.line("b.last_error()");
    e.close("}");
}

fn emit_decode(e: &mut Emitter, m: &MessagePlan) {
    e.open("fn decode<S: InputStream>(&mut self, p: &mut MsgParser<S>) -> Result<()> {");
    e.open("while !p.is_eof() {");
    e.line("p.next_field()?;");
    e.open("match p.field_id() {");
    for f in &m.fields {
        let n = f.number;
        let name = &f.ident;
        let stem = f.kind.stem();
        match (f.kind, f.repeated) {
            (FieldKind::Message, true) => {
                let ty = f.message_type.as_deref().unwrap_or_default();
                e.open(&format!("{n} => {{"));
                e.line(&format!("let mut e = Box::new({ty}::default());"));
                e.line("p.message_field(&mut *e)?;");
                e.line(&format!("self.{name}.push(e);"));
                e.close("}");
            }
            (FieldKind::Message, false) => {
                e.open(&format!("{n} => {{"));
                e.line(&format!(
                    "let m = self.{name}.get_or_insert_with(Default::default);"
                ));
                e.line("p.message_field(&mut **m)?;");
                e.close("}");
            }
            (_, true) => {
                e.line(&format!("{n} => p.repeated_{stem}_field(&mut self.{name})?,"));
            }
            (_, false) => {
                e.line(&format!("{n} => self.{name} = p.{stem}_field()?,"));
            }
        }
    }
    e.line("_ => p.skip_field()?,");
    e.close("}");
    e.close("}");
    e.line("Ok(())");
    e.close("}");
}
