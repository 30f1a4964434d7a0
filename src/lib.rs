//! A compact proto3 wire codec and its code generator
//!
//! The codec encodes in a single pass: length-delimited payloads reserve a
//! worst-case length varint out of [`Message::estimate_size`], write
//! themselves, then patch the true length in place. The generator (see
//! [`gen`] and the `protoc-gen-pocket` binary) consumes compiler descriptors
//! and emits one Rust module per `.proto` file, with an `estimate_size`,
//! `encode` and `decode` implementation per message.

pub mod builder;
pub mod errors;
pub mod gen;
pub mod message;
pub mod parser;
pub mod reader;
pub mod sizeof;
pub mod wire;
pub mod writer;

pub use crate::{
    builder::MsgBuilder,
    errors::{Error, Result},
    message::{decode, encode, Message},
    parser::MsgParser,
    reader::{Decoder, InputStream, SliceInput, SubsetInput},
    wire::WireType,
    writer::{ArrayOutput, Encoder, OutputStream, VecOutput},
};
