//! The `protoc` plugin side: descriptor model and code emission
//!
//! [`generate`] consumes a decoded [`descriptor::CodeGeneratorRequest`] and
//! produces the matching response. For every requested `foo/bar.proto` the
//! response carries exactly one synthesized file named `foo/bar.proto.rs`.
//! A generation failure is reported through the response's error field, as
//! the plugin protocol expects, never as a broken partial file set.

pub mod descriptor;
mod emit;

use self::descriptor::{CodeGeneratorRequest, CodeGeneratorResponse, CodeGeneratorResponseFile};
use thiserror::Error;

/// Why a descriptor could not be lowered to Rust
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenError {
    /// A construct the codec deliberately does not carry
    #[error("{location}: {construct} are not supported")]
    Unsupported {
        location: String,
        construct: &'static str,
    },
    /// A field type value outside `descriptor.proto`'s enumeration
    #[error("{location}: unknown field type {raw}")]
    UnknownType { location: String, raw: i32 },
    /// A message type living in another file or package
    #[error("{location}: cannot resolve message type {name:?} within this file")]
    ForeignType { location: String, name: String },
    /// A message field whose descriptor carries no type name
    #[error("{location}: missing message type name")]
    MissingTypeName { location: String },
}

/// Runs code generation for every file the request names
pub fn generate(request: &CodeGeneratorRequest) -> CodeGeneratorResponse {
    let mut response = CodeGeneratorResponse::default();
    for fd in &request.proto_file {
        if !request.file_to_generate.iter().any(|n| n == &fd.name) {
            continue;
        }
        log::debug!("generating code for {}", fd.name);
        match emit::generate_file(fd) {
            Ok(content) => {
                response.file.push(Box::new(CodeGeneratorResponseFile {
                    name: format!("{}.rs", fd.name),
                    content,
                }));
            }
            Err(e) => {
                log::error!("{}: {e}", fd.name);
                response.error = format!("{}: {e}", fd.name);
                response.file.clear();
                break;
            }
        }
    }
    response
}
