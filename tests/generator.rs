//! Drives the code generator over in-memory descriptor trees

use pocket_protobuf::gen;
use pocket_protobuf::gen::descriptor::{
    CodeGeneratorRequest, CodeGeneratorResponse, DescriptorProto, FieldDescriptorProto,
    FieldOptions, FileDescriptorProto, LABEL_REPEATED,
};

const TYPE_FLOAT: i32 = 2;
const TYPE_INT32: i32 = 5;
const TYPE_GROUP: i32 = 10;
const TYPE_MESSAGE: i32 = 11;
const TYPE_STRING: i32 = 9;

const LABEL_OPTIONAL: i32 = 1;

fn field(name: &str, number: i32, label: i32, r#type: i32) -> Box<FieldDescriptorProto> {
    Box::new(FieldDescriptorProto {
        name: name.to_owned(),
        number,
        label,
        r#type,
        ..Default::default()
    })
}

fn message_field(name: &str, number: i32, label: i32, type_name: &str) -> Box<FieldDescriptorProto> {
    let mut f = field(name, number, label, TYPE_MESSAGE);
    f.type_name = type_name.to_owned();
    f
}

fn sample_file() -> Box<FileDescriptorProto> {
    Box::new(FileDescriptorProto {
        name: "sample.proto".to_owned(),
        package: "test".to_owned(),
        syntax: String::new(),
        message_type: vec![
            Box::new(DescriptorProto {
                name: "message_a".to_owned(),
                field: vec![
                    field("field1", 1, LABEL_REPEATED, TYPE_INT32),
                    field("field2", 2, LABEL_OPTIONAL, TYPE_INT32),
                ],
                ..Default::default()
            }),
            Box::new(DescriptorProto {
                name: "message_b".to_owned(),
                field: vec![
                    field("field1", 1, LABEL_OPTIONAL, TYPE_STRING),
                    message_field("field2", 2, LABEL_OPTIONAL, ".test.message_a"),
                    field("field3", 3, LABEL_OPTIONAL, TYPE_FLOAT),
                ],
                ..Default::default()
            }),
        ],
    })
}

fn request_for(file: Box<FileDescriptorProto>) -> CodeGeneratorRequest {
    CodeGeneratorRequest {
        file_to_generate: vec![file.name.clone()],
        parameter: String::new(),
        proto_file: vec![file],
    }
}

fn generate_one(file: Box<FileDescriptorProto>) -> CodeGeneratorResponse {
    gen::generate(&request_for(file))
}

#[test]
fn emits_one_module_per_file() {
    let response = generate_one(sample_file());
    assert_eq!(response.error, "");
    assert_eq!(response.file.len(), 1);
    assert_eq!(response.file[0].name, "sample.proto.rs");

    let content = &response.file[0].content;
    assert!(content.contains("pub mod test {"));
    assert!(content.contains("pub struct message_a {"));
    assert!(content.contains("pub field1: Vec<i32>,"));
    assert!(content.contains("pub field2: Option<Box<message_a>>,"));
    assert!(content.contains("impl Message for message_b {"));
    // proto2 repeated scalars stay unpacked
    assert!(content.contains("for e in &self.field1 { b.int32_field(1, *e); }"));
    assert!(content.contains("1 => p.repeated_int32_field(&mut self.field1)?,"));
    assert!(content.contains("let m = self.field2.get_or_insert_with(Default::default);"));
    assert!(content.contains("_ => p.skip_field()?,"));
}

#[test]
fn estimate_size_groups_repeated_weights() {
    let mut file = sample_file();
    file.message_type[0]
        .field
        .push(field("more", 3, LABEL_REPEATED, TYPE_INT32));
    let response = generate_one(file);
    assert_eq!(response.error, "");
    let content = &response.file[0].content;
    // both repeated int32 fields share the 11 bytes/element tally
    assert!(content.contains("11usize.saturating_mul(self.field1.len() + self.more.len())"));
}

#[test]
fn proto3_packs_by_default() {
    let mut file = sample_file();
    file.syntax = "proto3".to_owned();
    let response = generate_one(file);
    assert_eq!(response.error, "");
    let content = &response.file[0].content;
    assert!(content.contains("b.packed_int32_field(1, &self.field1);"));
}

#[test]
fn explicit_packed_option_wins() {
    let mut file = sample_file();
    file.syntax = "proto3".to_owned();
    file.message_type[0].field[0].options = Some(Box::new(FieldOptions {
        packed: Some(false),
    }));
    let response = generate_one(file);
    assert_eq!(response.error, "");
    let content = &response.file[0].content;
    assert!(content.contains("for e in &self.field1 { b.int32_field(1, *e); }"));

    let mut file = sample_file();
    file.message_type[0].field[0].options = Some(Box::new(FieldOptions { packed: Some(true) }));
    let content_packed = generate_one(file);
    assert!(content_packed.file[0]
        .content
        .contains("b.packed_int32_field(1, &self.field1);"));
}

#[test]
fn repeated_messages_decode_into_fresh_boxes() {
    let mut file = sample_file();
    file.message_type[1]
        .field
        .push(message_field("extras", 4, LABEL_REPEATED, ".test.message_a"));
    let response = generate_one(file);
    assert_eq!(response.error, "");
    let content = &response.file[0].content;
    assert!(content.contains("pub extras: Vec<Box<message_a>>,"));
    assert!(content.contains("for e in &self.extras { b.message_field(4, &**e); }"));
    assert!(content.contains("let mut e = Box::new(message_a::default());"));
}

#[test]
fn keyword_field_names_are_escaped() {
    let mut file = sample_file();
    file.message_type[0]
        .field
        .push(field("type", 9, LABEL_OPTIONAL, TYPE_INT32));
    let response = generate_one(file);
    assert_eq!(response.error, "");
    let content = &response.file[0].content;
    assert!(content.contains("pub r#type: i32,"));
    assert!(content.contains("9 => self.r#type = p.int32_field()?,"));
}

#[test]
fn groups_are_rejected_with_a_diagnostic() {
    let mut file = sample_file();
    file.message_type[0]
        .field
        .push(field("legacy", 5, LABEL_OPTIONAL, TYPE_GROUP));
    let response = generate_one(file);
    assert!(response.error.contains("group"));
    assert!(response.file.is_empty());
}

#[test]
fn oneofs_are_rejected_with_a_diagnostic() {
    let mut file = sample_file();
    let mut f = field("choice", 6, LABEL_OPTIONAL, TYPE_INT32);
    f.oneof_index = Some(0);
    file.message_type[0].field.push(f);
    let response = generate_one(file);
    assert!(response.error.contains("oneof"));
    assert!(response.file.is_empty());
}

#[test]
fn nested_message_types_are_rejected() {
    let mut file = sample_file();
    file.message_type[0].nested_type.push(Box::new(DescriptorProto {
        name: "inner".to_owned(),
        ..Default::default()
    }));
    let response = generate_one(file);
    assert!(response.error.contains("nested"));
}

#[test]
fn foreign_message_types_are_rejected() {
    let mut file = sample_file();
    file.message_type[1]
        .field
        .push(message_field("other", 5, LABEL_OPTIONAL, ".elsewhere.thing"));
    let response = generate_one(file);
    assert!(response.error.contains("elsewhere.thing"));
}

#[test]
fn files_not_requested_are_not_generated() {
    let mut request = request_for(sample_file());
    request.file_to_generate.clear();
    let response = gen::generate(&request);
    assert_eq!(response.error, "");
    assert!(response.file.is_empty());
}

#[test]
fn request_survives_its_own_wire_format() {
    let request = request_for(sample_file());
    let mut buf = Vec::new();
    pocket_protobuf::encode(&request, &mut buf).unwrap();
    let decoded: CodeGeneratorRequest = pocket_protobuf::decode(&buf).unwrap();
    assert_eq!(decoded, request);
}

#[test]
fn response_survives_its_own_wire_format() {
    let response = generate_one(sample_file());
    let mut buf = Vec::new();
    pocket_protobuf::encode(&response, &mut buf).unwrap();
    let decoded: CodeGeneratorResponse = pocket_protobuf::decode(&buf).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn request_decode_skips_unrecognized_descriptor_fields() {
    let request = request_for(sample_file());
    let mut buf = Vec::new();
    pocket_protobuf::encode(&request, &mut buf).unwrap();
    // splice an unknown top-level field (id 3, the compiler version) in front
    let mut spliced = vec![0x1a, 0x02, 0x08, 0x09];
    spliced.extend_from_slice(&buf);
    let decoded: CodeGeneratorRequest = pocket_protobuf::decode(&spliced).unwrap();
    assert_eq!(decoded, request);
}
