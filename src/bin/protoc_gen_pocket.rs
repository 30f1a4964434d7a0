//! `protoc` plugin entry point
//!
//! Invoked by the descriptor compiler as `protoc --pocket_out=DIR foo.proto`
//! with a `CodeGeneratorRequest` on standard input; answers with a
//! `CodeGeneratorResponse` on standard output. Diagnostics go to standard
//! error only, standard output belongs to the response wire format.

use std::io::{Read, Write};

use anyhow::Context;
use pocket_protobuf::gen;
use pocket_protobuf::gen::descriptor::CodeGeneratorRequest;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("POCKETPB_LOG", "warn"))
        .format_timestamp(None)
        .init();

    if let Err(e) = try_main() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("reading the code generator request from stdin")?;

    let request: CodeGeneratorRequest =
        pocket_protobuf::decode(&input).context("malformed code generator request")?;
    log::debug!(
        "request: {} descriptor(s), {} file(s) to generate",
        request.proto_file.len(),
        request.file_to_generate.len()
    );

    let response = gen::generate(&request);

    let mut output = Vec::new();
    pocket_protobuf::encode(&response, &mut output).context("encoding the response")?;
    std::io::stdout()
        .write_all(&output)
        .context("writing the response to stdout")?;
    Ok(())
}
