//! Hand-maintained wire structs for the compiler plugin protocol
//!
//! Carries the subset of `descriptor.proto` and `plugin.proto` the generator
//! consumes, decoded and encoded with this crate's own runtime. Fields the
//! generator does not look at are skipped as unknown on decode. The impls
//! follow the same shape the generator itself emits, except that a few
//! members use `Option` where field presence matters to the schema.

use crate::builder::MsgBuilder;
use crate::errors::Result;
use crate::message::Message;
use crate::parser::MsgParser;
use crate::reader::InputStream;
use crate::writer::OutputStream;

/// `FieldDescriptorProto.label` value for repeated fields
pub const LABEL_REPEATED: i32 = 3;

/// A code generation request, read from the plugin's standard input
#[derive(Debug, Default, PartialEq, Clone)]
pub struct CodeGeneratorRequest {
    pub file_to_generate: Vec<String>,
    pub parameter: String,
    pub proto_file: Vec<Box<FileDescriptorProto>>,
}

impl Message for CodeGeneratorRequest {
    fn estimate_size(&self) -> usize {
        let mut size: usize = 0;
        for e in &self.file_to_generate {
            size = size.saturating_add(e.len());
        }
        size = size.saturating_add(11usize.saturating_mul(self.file_to_generate.len()));
        size = size.saturating_add(self.parameter.len());
        for e in &self.proto_file {
            size = size.saturating_add(e.estimate_size()).saturating_add(11);
        }
        size = size.saturating_add(11);
        size
    }

    fn encode<S: OutputStream>(&self, b: &mut MsgBuilder<S>) -> Result<()> {
        for e in &self.file_to_generate {
            b.string_field(1, e);
        }
        b.string_field(2, &self.parameter);
        for e in &self.proto_file {
            b.message_field(15, &**e);
        }
        b.last_error()
    }

    fn decode<S: InputStream>(&mut self, p: &mut MsgParser<S>) -> Result<()> {
        while !p.is_eof() {
            p.next_field()?;
            match p.field_id() {
                1 => p.repeated_string_field(&mut self.file_to_generate)?,
                2 => self.parameter = p.string_field()?,
                15 => {
                    let mut e = Box::new(FileDescriptorProto::default());
                    p.message_field(&mut *e)?;
                    self.proto_file.push(e);
                }
                _ => p.skip_field()?,
            }
        }
        Ok(())
    }
}

/// One `.proto` file of the request
#[derive(Debug, Default, PartialEq, Clone)]
pub struct FileDescriptorProto {
    pub name: String,
    pub package: String,
    pub message_type: Vec<Box<DescriptorProto>>,
    pub syntax: String,
}

impl Message for FileDescriptorProto {
    fn estimate_size(&self) -> usize {
        let mut size: usize = 0;
        size = size.saturating_add(self.name.len());
        size = size.saturating_add(self.package.len());
        for e in &self.message_type {
            size = size.saturating_add(e.estimate_size()).saturating_add(11);
        }
        size = size.saturating_add(self.syntax.len());
        size = size.saturating_add(33);
        size
    }

    fn encode<S: OutputStream>(&self, b: &mut MsgBuilder<S>) -> Result<()> {
        b.string_field(1, &self.name);
        b.string_field(2, &self.package);
        for e in &self.message_type {
            b.message_field(4, &**e);
        }
        b.string_field(12, &self.syntax);
        b.last_error()
    }

    fn decode<S: InputStream>(&mut self, p: &mut MsgParser<S>) -> Result<()> {
        while !p.is_eof() {
            p.next_field()?;
            match p.field_id() {
                1 => self.name = p.string_field()?,
                2 => self.package = p.string_field()?,
                4 => {
                    let mut e = Box::new(DescriptorProto::default());
                    p.message_field(&mut *e)?;
                    self.message_type.push(e);
                }
                12 => self.syntax = p.string_field()?,
                _ => p.skip_field()?,
            }
        }
        Ok(())
    }
}

/// One message declaration
#[derive(Debug, Default, PartialEq, Clone)]
pub struct DescriptorProto {
    pub name: String,
    pub field: Vec<Box<FieldDescriptorProto>>,
    pub nested_type: Vec<Box<DescriptorProto>>,
}

impl Message for DescriptorProto {
    fn estimate_size(&self) -> usize {
        let mut size: usize = 0;
        size = size.saturating_add(self.name.len());
        for e in &self.field {
            size = size.saturating_add(e.estimate_size()).saturating_add(11);
        }
        for e in &self.nested_type {
            size = size.saturating_add(e.estimate_size()).saturating_add(11);
        }
        size = size.saturating_add(11);
        size
    }

    fn encode<S: OutputStream>(&self, b: &mut MsgBuilder<S>) -> Result<()> {
        b.string_field(1, &self.name);
        for e in &self.field {
            b.message_field(2, &**e);
        }
        for e in &self.nested_type {
            b.message_field(3, &**e);
        }
        b.last_error()
    }

    fn decode<S: InputStream>(&mut self, p: &mut MsgParser<S>) -> Result<()> {
        while !p.is_eof() {
            p.next_field()?;
            match p.field_id() {
                1 => self.name = p.string_field()?,
                2 => {
                    let mut e = Box::new(FieldDescriptorProto::default());
                    p.message_field(&mut *e)?;
                    self.field.push(e);
                }
                3 => {
                    let mut e = Box::new(DescriptorProto::default());
                    p.message_field(&mut *e)?;
                    self.nested_type.push(e);
                }
                _ => p.skip_field()?,
            }
        }
        Ok(())
    }
}

/// One field declaration
#[derive(Debug, Default, PartialEq, Clone)]
pub struct FieldDescriptorProto {
    pub name: String,
    pub number: i32,
    pub label: i32,
    pub r#type: i32,
    pub type_name: String,
    pub options: Option<Box<FieldOptions>>,
    pub oneof_index: Option<i32>,
}

impl Message for FieldDescriptorProto {
    fn estimate_size(&self) -> usize {
        let mut size: usize = 0;
        size = size.saturating_add(self.name.len());
        size = size.saturating_add(self.type_name.len());
        if let Some(m) = &self.options {
            size = size.saturating_add(m.estimate_size()).saturating_add(11);
        }
        size = size.saturating_add(66);
        size
    }

    fn encode<S: OutputStream>(&self, b: &mut MsgBuilder<S>) -> Result<()> {
        b.string_field(1, &self.name);
        b.int32_field(3, self.number);
        b.int32_field(4, self.label);
        b.int32_field(5, self.r#type);
        b.string_field(6, &self.type_name);
        if let Some(m) = &self.options {
            b.message_field(8, &**m);
        }
        if let Some(v) = self.oneof_index {
            b.int32_field(9, v);
        }
        b.last_error()
    }

    fn decode<S: InputStream>(&mut self, p: &mut MsgParser<S>) -> Result<()> {
        while !p.is_eof() {
            p.next_field()?;
            match p.field_id() {
                1 => self.name = p.string_field()?,
                3 => self.number = p.int32_field()?,
                4 => self.label = p.int32_field()?,
                5 => self.r#type = p.int32_field()?,
                6 => self.type_name = p.string_field()?,
                8 => {
                    let m = self.options.get_or_insert_with(Default::default);
                    p.message_field(&mut **m)?;
                }
                9 => self.oneof_index = Some(p.int32_field()?),
                _ => p.skip_field()?,
            }
        }
        Ok(())
    }
}

/// The field options the generator cares about
#[derive(Debug, Default, PartialEq, Clone)]
pub struct FieldOptions {
    pub packed: Option<bool>,
}

impl Message for FieldOptions {
    fn estimate_size(&self) -> usize {
        12
    }

    fn encode<S: OutputStream>(&self, b: &mut MsgBuilder<S>) -> Result<()> {
        if let Some(v) = self.packed {
            b.bool_field(2, v);
        }
        b.last_error()
    }

    fn decode<S: InputStream>(&mut self, p: &mut MsgParser<S>) -> Result<()> {
        while !p.is_eof() {
            p.next_field()?;
            match p.field_id() {
                2 => self.packed = Some(p.bool_field()?),
                _ => p.skip_field()?,
            }
        }
        Ok(())
    }
}

/// The generation result, written to the plugin's standard output
#[derive(Debug, Default, PartialEq, Clone)]
pub struct CodeGeneratorResponse {
    pub error: String,
    pub supported_features: u64,
    pub file: Vec<Box<CodeGeneratorResponseFile>>,
}

impl Message for CodeGeneratorResponse {
    fn estimate_size(&self) -> usize {
        let mut size: usize = 0;
        size = size.saturating_add(self.error.len());
        for e in &self.file {
            size = size.saturating_add(e.estimate_size()).saturating_add(11);
        }
        size = size.saturating_add(22);
        size
    }

    fn encode<S: OutputStream>(&self, b: &mut MsgBuilder<S>) -> Result<()> {
        b.string_field(1, &self.error);
        b.uint64_field(2, self.supported_features);
        for e in &self.file {
            b.message_field(15, &**e);
        }
        b.last_error()
    }

    fn decode<S: InputStream>(&mut self, p: &mut MsgParser<S>) -> Result<()> {
        while !p.is_eof() {
            p.next_field()?;
            match p.field_id() {
                1 => self.error = p.string_field()?,
                2 => self.supported_features = p.uint64_field()?,
                15 => {
                    let mut e = Box::new(CodeGeneratorResponseFile::default());
                    p.message_field(&mut *e)?;
                    self.file.push(e);
                }
                _ => p.skip_field()?,
            }
        }
        Ok(())
    }
}

/// One synthesized output file of the response
#[derive(Debug, Default, PartialEq, Clone)]
pub struct CodeGeneratorResponseFile {
    pub name: String,
    pub content: String,
}

impl Message for CodeGeneratorResponseFile {
    fn estimate_size(&self) -> usize {
        let mut size: usize = 0;
        size = size.saturating_add(self.name.len());
        size = size.saturating_add(self.content.len());
        size = size.saturating_add(22);
        size
    }

    fn encode<S: OutputStream>(&self, b: &mut MsgBuilder<S>) -> Result<()> {
        b.string_field(1, &self.name);
        b.string_field(15, &self.content);
        b.last_error()
    }

    fn decode<S: InputStream>(&mut self, p: &mut MsgParser<S>) -> Result<()> {
        while !p.is_eof() {
            p.next_field()?;
            match p.field_id() {
                1 => self.name = p.string_field()?,
                15 => self.content = p.string_field()?,
                _ => p.skip_field()?,
            }
        }
        Ok(())
    }
}
