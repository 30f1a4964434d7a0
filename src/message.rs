//! The contract implemented by every generated message type

use crate::builder::MsgBuilder;
use crate::errors::Result;
use crate::parser::MsgParser;
use crate::reader::{InputStream, SliceInput};
use crate::writer::{OutputStream, VecOutput};

/// A trait implemented (usually by generated code) for any protobuf message
pub trait Message {
    /// Upper bound on the serialized size, in bytes
    ///
    /// May over-estimate, never under-estimate. 0 means unknown and is
    /// treated as unbounded when reserving length prefixes.
    fn estimate_size(&self) -> usize;

    /// Writes `self` field by field, without a length prefix
    fn encode<S: OutputStream>(&self, b: &mut MsgBuilder<S>) -> Result<()>;

    /// Populates `self` from the parser until its input is drained
    fn decode<S: InputStream>(&mut self, p: &mut MsgParser<S>) -> Result<()>;
}

/// Serializes `msg` onto the end of `out` without a length prefix
pub fn encode<M: Message>(msg: &M, out: &mut Vec<u8>) -> Result<()> {
    let mut builder = MsgBuilder::new(VecOutput::new(out));
    msg.encode(&mut builder)
}

/// Deserializes an `M` from `bytes` without a length prefix
pub fn decode<M: Message + Default>(bytes: &[u8]) -> Result<M> {
    let mut msg = M::default();
    let mut parser = MsgParser::new(SliceInput::new(bytes));
    msg.decode(&mut parser)?;
    Ok(msg)
}
