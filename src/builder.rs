//! Typed field emitters over a single-pass output stream
//!
//! The builder carries a sticky error: after the first failure every emitter
//! is a no-op, so generated `encode` bodies issue their field calls back to
//! back and inspect [`MsgBuilder::last_error`] once at the end.
//!
//! Length-delimited payloads whose size is not known up front (sub-messages,
//! packed varint blocks) are framed without buffering: a worst-case length
//! varint is reserved, the payload is written, and the true length is padded
//! out to the reserved width with continuation bits and patched in place.

use crate::errors::{Error, Result};
use crate::message::Message;
use crate::sizeof::varint_size;
use crate::wire::WireType;
use crate::writer::{build_varint, zigzag, Encoder, OutputStream};

/// A struct to emit a message field by field
pub struct MsgBuilder<S: OutputStream> {
    enc: Encoder<S>,
    err: Option<Error>,
}

impl<S: OutputStream> MsgBuilder<S> {
    /// Creates a new `MsgBuilder` writing into `stream`
    pub fn new(stream: S) -> MsgBuilder<S> {
        MsgBuilder {
            enc: Encoder::new(stream),
            err: None,
        }
    }

    /// The first error hit so far, `Ok` while the builder is healthy
    pub fn last_error(&self) -> Result<()> {
        match self.err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Consumes the builder, returning the stream
    pub fn into_stream(self) -> S {
        self.enc.into_stream()
    }

    fn emit(&mut self, f: impl FnOnce(&mut Encoder<S>) -> Result<()>) {
        if self.err.is_none() {
            self.err = f(&mut self.enc).err();
        }
    }

    /// Writes a `double` field
    pub fn double_field(&mut self, field_id: u64, value: f64) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Fixed64)?;
            e.double(value)
        });
    }

    /// Writes a `float` field
    pub fn float_field(&mut self, field_id: u64, value: f32) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Fixed32)?;
            e.float(value)
        });
    }

    /// Writes an `int32` field
    pub fn int32_field(&mut self, field_id: u64, value: i32) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Varint)?;
            e.varint(value as u64)
        });
    }

    /// Writes an `int64` field
    pub fn int64_field(&mut self, field_id: u64, value: i64) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Varint)?;
            e.varint(value as u64)
        });
    }

    /// Writes a `uint32` field
    pub fn uint32_field(&mut self, field_id: u64, value: u32) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Varint)?;
            e.varint(value as u64)
        });
    }

    /// Writes a `uint64` field
    pub fn uint64_field(&mut self, field_id: u64, value: u64) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Varint)?;
            e.varint(value)
        });
    }

    /// Writes a `sint32` field (zig-zag)
    pub fn sint32_field(&mut self, field_id: u64, value: i32) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Varint)?;
            e.varint_signed(value as i64)
        });
    }

    /// Writes a `sint64` field (zig-zag)
    pub fn sint64_field(&mut self, field_id: u64, value: i64) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Varint)?;
            e.varint_signed(value)
        });
    }

    /// Writes a `fixed32` field
    pub fn fixed32_field(&mut self, field_id: u64, value: u32) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Fixed32)?;
            e.fixed32(value)
        });
    }

    /// Writes a `fixed64` field
    pub fn fixed64_field(&mut self, field_id: u64, value: u64) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Fixed64)?;
            e.fixed64(value)
        });
    }

    /// Writes a `sfixed32` field
    pub fn sfixed32_field(&mut self, field_id: u64, value: i32) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Fixed32)?;
            e.sfixed32(value)
        });
    }

    /// Writes a `sfixed64` field
    pub fn sfixed64_field(&mut self, field_id: u64, value: i64) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Fixed64)?;
            e.sfixed64(value)
        });
    }

    /// Writes a `bool` field
    pub fn bool_field(&mut self, field_id: u64, value: bool) {
        self.emit(|e| {
            e.field_header(field_id, WireType::Varint)?;
            e.varint(u64::from(value))
        });
    }

    /// Writes a `string` field: header, byte length, then the bytes
    pub fn string_field(&mut self, field_id: u64, value: &str) {
        self.bytes_field(field_id, value.as_bytes());
    }

    /// Writes a `bytes` field; no validation is applied to the payload
    pub fn bytes_field(&mut self, field_id: u64, value: &[u8]) {
        self.emit(|e| {
            e.field_header(field_id, WireType::LengthBlob)?;
            e.varint(value.len() as u64)?;
            e.raw(value)
        });
    }

    /// Writes a sub-message field
    ///
    /// The payload length is reserved from the message's own size estimate
    /// and patched once the true length is known. An estimate of 0 means
    /// unknown and reserves the full 10 bytes.
    pub fn message_field<M: Message>(&mut self, field_id: u64, msg: &M) {
        if self.err.is_some() {
            return;
        }
        if let Err(e) = self.patched_message(field_id, msg) {
            self.err = Some(e);
        }
    }

    fn patched_message<M: Message>(&mut self, field_id: u64, msg: &M) -> Result<()> {
        let mut bound = msg.estimate_size();
        if bound == 0 {
            bound = usize::MAX;
        }
        self.enc.field_header(field_id, WireType::LengthBlob)?;
        let reserved = varint_size(bound as u64);
        let pos = self.enc.stream().position();
        let zeros = [0u8; 10];
        self.enc.raw(&zeros[..reserved])?;
        msg.encode(self)?;
        self.last_error()?;
        let real = self.enc.stream().position() - (pos + reserved);
        self.patch_length(pos, reserved, real, bound)
    }

    /// Writes a packed `float` field
    pub fn packed_float_field(&mut self, field_id: u64, values: &[f32]) {
        self.packed_fixed32s(field_id, values, |e, v| e.float(v));
    }

    /// Writes a packed `fixed32` field
    pub fn packed_fixed32_field(&mut self, field_id: u64, values: &[u32]) {
        self.packed_fixed32s(field_id, values, |e, v| e.fixed32(v));
    }

    /// Writes a packed `sfixed32` field
    pub fn packed_sfixed32_field(&mut self, field_id: u64, values: &[i32]) {
        self.packed_fixed32s(field_id, values, |e, v| e.sfixed32(v));
    }

    /// Writes a packed `double` field
    pub fn packed_double_field(&mut self, field_id: u64, values: &[f64]) {
        self.packed_fixed64s(field_id, values, |e, v| e.double(v));
    }

    /// Writes a packed `fixed64` field
    pub fn packed_fixed64_field(&mut self, field_id: u64, values: &[u64]) {
        self.packed_fixed64s(field_id, values, |e, v| e.fixed64(v));
    }

    /// Writes a packed `sfixed64` field
    pub fn packed_sfixed64_field(&mut self, field_id: u64, values: &[i64]) {
        self.packed_fixed64s(field_id, values, |e, v| e.sfixed64(v));
    }

    /// Writes a packed `int32` field
    pub fn packed_int32_field(&mut self, field_id: u64, values: &[i32]) {
        self.packed_varints(field_id, values, |v| v as u64);
    }

    /// Writes a packed `int64` field
    pub fn packed_int64_field(&mut self, field_id: u64, values: &[i64]) {
        self.packed_varints(field_id, values, |v| v as u64);
    }

    /// Writes a packed `uint32` field
    pub fn packed_uint32_field(&mut self, field_id: u64, values: &[u32]) {
        self.packed_varints(field_id, values, |v| v as u64);
    }

    /// Writes a packed `uint64` field
    pub fn packed_uint64_field(&mut self, field_id: u64, values: &[u64]) {
        self.packed_varints(field_id, values, |v| v);
    }

    /// Writes a packed `bool` field
    pub fn packed_bool_field(&mut self, field_id: u64, values: &[bool]) {
        self.packed_varints(field_id, values, u64::from);
    }

    /// Writes a packed `sint32` field (zig-zag)
    pub fn packed_sint32_field(&mut self, field_id: u64, values: &[i32]) {
        self.packed_varints(field_id, values, |v| zigzag(v as i64));
    }

    /// Writes a packed `sint64` field (zig-zag)
    pub fn packed_sint64_field(&mut self, field_id: u64, values: &[i64]) {
        self.packed_varints(field_id, values, zigzag);
    }

    // Fixed-width packed blocks have an exact length, no patching needed.
    fn packed_fixed32s<T: Copy>(
        &mut self,
        field_id: u64,
        values: &[T],
        emit_one: impl Fn(&mut Encoder<S>, T) -> Result<()>,
    ) {
        self.emit(|e| {
            e.field_header(field_id, WireType::LengthBlob)?;
            e.varint((values.len() * 4) as u64)?;
            for &v in values {
                emit_one(e, v)?;
            }
            Ok(())
        });
    }

    fn packed_fixed64s<T: Copy>(
        &mut self,
        field_id: u64,
        values: &[T],
        emit_one: impl Fn(&mut Encoder<S>, T) -> Result<()>,
    ) {
        self.emit(|e| {
            e.field_header(field_id, WireType::LengthBlob)?;
            e.varint((values.len() * 8) as u64)?;
            for &v in values {
                emit_one(e, v)?;
            }
            Ok(())
        });
    }

    fn packed_varints<T: Copy>(
        &mut self,
        field_id: u64,
        values: &[T],
        to_u64: impl Fn(T) -> u64,
    ) {
        let bound = values.len().saturating_mul(10);
        self.emit(|e| {
            e.field_header(field_id, WireType::LengthBlob)?;
            let reserved = varint_size(bound as u64);
            let pos = e.stream().position();
            let zeros = [0u8; 10];
            e.raw(&zeros[..reserved])?;
            for &v in values {
                e.varint(to_u64(v))?;
            }
            let real = e.stream().position() - (pos + reserved);
            if real > bound {
                return Err(Error::General);
            }
            let mut patch = [0u8; 10];
            build_varint(real as u64, &mut patch);
            for b in &mut patch[..reserved - 1] {
                *b |= 0x80;
            }
            e.stream_mut().write_at(pos, &patch[..reserved])
        });
    }

    fn patch_length(&mut self, pos: usize, reserved: usize, real: usize, bound: usize) -> Result<()> {
        if real > bound {
            return Err(Error::General);
        }
        let mut patch = [0u8; 10];
        build_varint(real as u64, &mut patch);
        for b in &mut patch[..reserved - 1] {
            *b |= 0x80;
        }
        self.enc.stream_mut().write_at(pos, &patch[..reserved])
    }
}
