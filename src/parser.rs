//! Typed field readers over a bounded input stream
//!
//! [`MsgParser::next_field`] is the scheduler: it skips the current field if
//! no accessor consumed it, then reads the next header. Callers dispatch on
//! [`MsgParser::field_id`] and invoke the accessor matching their schema;
//! unknown ids go to [`MsgParser::skip_field`].

use crate::errors::{Error, Result};
use crate::message::Message;
use crate::reader::{Decoder, InputStream, SubsetInput};
use crate::wire::WireType;

fn push_checked<T>(values: &mut Vec<T>, v: T) -> Result<()> {
    values.try_reserve(1).map_err(|_| Error::General)?;
    values.push(v);
    Ok(())
}

/// A struct to read a message field by field
pub struct MsgParser<S: InputStream> {
    dec: Decoder<S>,
    field_id: u64,
    wire_type: WireType,
    consumed: bool,
}

impl<S: InputStream> MsgParser<S> {
    /// Creates a new `MsgParser` reading from `stream`
    pub fn new(stream: S) -> MsgParser<S> {
        MsgParser {
            dec: Decoder::new(stream),
            field_id: 0,
            wire_type: WireType::Varint,
            consumed: true,
        }
    }

    /// Advances to the next field header
    ///
    /// Skips the current field first when no accessor consumed it.
    pub fn next_field(&mut self) -> Result<()> {
        if !self.consumed {
            self.dec.skip_field(self.wire_type)?;
        }
        let (id, wt) = self.dec.field_header()?;
        self.field_id = id;
        self.wire_type = wt;
        self.consumed = false;
        Ok(())
    }

    /// Id of the current field
    pub fn field_id(&self) -> u64 {
        self.field_id
    }

    /// Wire type of the current field
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// Checks whether all input has been consumed
    pub fn is_eof(&self) -> bool {
        self.dec.is_eof()
    }

    /// Skips the current field whatever its wire type
    pub fn skip_field(&mut self) -> Result<()> {
        self.consumed = true;
        self.dec.skip_field(self.wire_type)
    }

    /// Reads a `double` field, promoting a 4-byte `float` payload
    pub fn double_field(&mut self) -> Result<f64> {
        self.consumed = true;
        match self.wire_type {
            WireType::Fixed64 => self.dec.double(),
            WireType::Fixed32 => self.dec.float().map(f64::from),
            _ => Err(Error::InvalidInput),
        }
    }

    /// Reads a `float` field, narrowing an 8-byte `double` payload
    pub fn float_field(&mut self) -> Result<f32> {
        self.consumed = true;
        match self.wire_type {
            WireType::Fixed64 => self.dec.double().map(|v| v as f32),
            WireType::Fixed32 => self.dec.float(),
            _ => Err(Error::InvalidInput),
        }
    }

    /// Reads an `int32` field
    pub fn int32_field(&mut self) -> Result<i32> {
        self.consumed = true;
        self.dec.varint().map(|v| v as i32)
    }

    /// Reads an `int64` field
    pub fn int64_field(&mut self) -> Result<i64> {
        self.consumed = true;
        self.dec.varint().map(|v| v as i64)
    }

    /// Reads a `uint32` field
    pub fn uint32_field(&mut self) -> Result<u32> {
        self.consumed = true;
        self.dec.varint().map(|v| v as u32)
    }

    /// Reads a `uint64` field
    pub fn uint64_field(&mut self) -> Result<u64> {
        self.consumed = true;
        self.dec.varint()
    }

    /// Reads a `sint32` field (zig-zag)
    pub fn sint32_field(&mut self) -> Result<i32> {
        self.consumed = true;
        self.dec.varint_signed().map(|v| v as i32)
    }

    /// Reads a `sint64` field (zig-zag)
    pub fn sint64_field(&mut self) -> Result<i64> {
        self.consumed = true;
        self.dec.varint_signed()
    }

    /// Reads a `fixed32` field
    pub fn fixed32_field(&mut self) -> Result<u32> {
        self.consumed = true;
        self.dec.fixed32()
    }

    /// Reads a `fixed64` field
    pub fn fixed64_field(&mut self) -> Result<u64> {
        self.consumed = true;
        self.dec.fixed64()
    }

    /// Reads a `sfixed32` field
    pub fn sfixed32_field(&mut self) -> Result<i32> {
        self.consumed = true;
        self.dec.sfixed32()
    }

    /// Reads a `sfixed64` field
    pub fn sfixed64_field(&mut self) -> Result<i64> {
        self.consumed = true;
        self.dec.sfixed64()
    }

    /// Reads a `bool` field
    pub fn bool_field(&mut self) -> Result<bool> {
        self.consumed = true;
        self.dec.varint().map(|v| v != 0)
    }

    /// Reads a `bytes` field
    pub fn bytes_field(&mut self) -> Result<Vec<u8>> {
        self.consumed = true;
        let len = self.dec.varint()?;
        let len = usize::try_from(len).map_err(|_| Error::InvalidInput)?;
        if len > self.dec.stream().bytes_available() {
            return Err(Error::InvalidInput);
        }
        let mut value = Vec::new();
        value.try_reserve_exact(len).map_err(|_| Error::General)?;
        value.resize(len, 0);
        self.dec.raw(&mut value)?;
        Ok(value)
    }

    /// Reads a `string` field
    ///
    /// The payload is not required to be valid UTF-8; invalid sequences are
    /// replaced rather than rejected.
    pub fn string_field(&mut self) -> Result<String> {
        let bytes = self.bytes_field()?;
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }

    /// Reads a sub-message field into `msg`
    ///
    /// Parses inside a bounded view; if the sub-message does not drain its
    /// view, the leftover is skipped so the outer parser stays aligned.
    pub fn message_field<M: Message>(&mut self, msg: &mut M) -> Result<()> {
        self.consumed = true;
        let len = self.dec.varint()?;
        let len = usize::try_from(len).map_err(|_| Error::InvalidInput)?;
        if len > self.dec.stream().bytes_available() {
            return Err(Error::InvalidInput);
        }
        let remaining = self.dec.stream().bytes_available() - len;
        {
            let sub = SubsetInput::new(self.dec.stream_mut(), len);
            let mut parser = MsgParser::new(sub);
            msg.decode(&mut parser)?;
        }
        let leftover = self.dec.stream().bytes_available() - remaining;
        if leftover > 0 {
            self.dec.stream_mut().skip(leftover)?;
        }
        Ok(())
    }

    /// Reads one `double` occurrence, packed or not
    pub fn repeated_double_field(&mut self, values: &mut Vec<f64>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.double())
        } else {
            let v = self.double_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `float` occurrence, packed or not
    pub fn repeated_float_field(&mut self, values: &mut Vec<f32>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.float())
        } else {
            let v = self.float_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `int32` occurrence, packed or not
    pub fn repeated_int32_field(&mut self, values: &mut Vec<i32>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.varint().map(|v| v as i32))
        } else {
            let v = self.int32_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `int64` occurrence, packed or not
    pub fn repeated_int64_field(&mut self, values: &mut Vec<i64>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.varint().map(|v| v as i64))
        } else {
            let v = self.int64_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `uint32` occurrence, packed or not
    pub fn repeated_uint32_field(&mut self, values: &mut Vec<u32>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.varint().map(|v| v as u32))
        } else {
            let v = self.uint32_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `uint64` occurrence, packed or not
    pub fn repeated_uint64_field(&mut self, values: &mut Vec<u64>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.varint())
        } else {
            let v = self.uint64_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `sint32` occurrence, packed or not
    pub fn repeated_sint32_field(&mut self, values: &mut Vec<i32>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.varint_signed().map(|v| v as i32))
        } else {
            let v = self.sint32_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `sint64` occurrence, packed or not
    pub fn repeated_sint64_field(&mut self, values: &mut Vec<i64>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.varint_signed())
        } else {
            let v = self.sint64_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `fixed32` occurrence, packed or not
    pub fn repeated_fixed32_field(&mut self, values: &mut Vec<u32>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.fixed32())
        } else {
            let v = self.fixed32_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `fixed64` occurrence, packed or not
    pub fn repeated_fixed64_field(&mut self, values: &mut Vec<u64>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.fixed64())
        } else {
            let v = self.fixed64_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `sfixed32` occurrence, packed or not
    pub fn repeated_sfixed32_field(&mut self, values: &mut Vec<i32>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.sfixed32())
        } else {
            let v = self.sfixed32_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `sfixed64` occurrence, packed or not
    pub fn repeated_sfixed64_field(&mut self, values: &mut Vec<i64>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.sfixed64())
        } else {
            let v = self.sfixed64_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `bool` occurrence, packed or not
    pub fn repeated_bool_field(&mut self, values: &mut Vec<bool>) -> Result<()> {
        if self.wire_type == WireType::LengthBlob {
            self.packed_block(values, |d| d.varint().map(|v| v != 0))
        } else {
            let v = self.bool_field()?;
            push_checked(values, v)
        }
    }

    /// Reads one `string` occurrence; strings are never packed
    pub fn repeated_string_field(&mut self, values: &mut Vec<String>) -> Result<()> {
        let v = self.string_field()?;
        push_checked(values, v)
    }

    /// Reads one `bytes` occurrence; bytes are never packed
    pub fn repeated_bytes_field(&mut self, values: &mut Vec<Vec<u8>>) -> Result<()> {
        let v = self.bytes_field()?;
        push_checked(values, v)
    }

    // One length blob holding back to back payloads; elements are read until
    // the bounded view is drained.
    fn packed_block<T>(
        &mut self,
        values: &mut Vec<T>,
        read_one: fn(&mut Decoder<SubsetInput<'_>>) -> Result<T>,
    ) -> Result<()> {
        self.consumed = true;
        let len = self.dec.varint()?;
        let len = usize::try_from(len).map_err(|_| Error::InvalidInput)?;
        if len > self.dec.stream().bytes_available() {
            return Err(Error::InvalidInput);
        }
        let sub = SubsetInput::new(self.dec.stream_mut(), len);
        let mut dec = Decoder::new(sub);
        while !dec.is_eof() {
            let v = read_one(&mut dec)?;
            push_checked(values, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SliceInput;

    #[test]
    fn repeated_field_accepts_unpacked_encoding() {
        let data = [0x08, 0x01, 0x08, 0x02];
        let mut p = MsgParser::new(SliceInput::new(&data));
        let mut values = Vec::new();
        while !p.is_eof() {
            p.next_field().unwrap();
            assert_eq!(p.field_id(), 1);
            p.repeated_int32_field(&mut values).unwrap();
        }
        assert_eq!(values, [1, 2]);
    }

    #[test]
    fn repeated_field_accepts_packed_encoding() {
        let data = [0x0a, 0x02, 0x01, 0x02];
        let mut p = MsgParser::new(SliceInput::new(&data));
        let mut values = Vec::new();
        while !p.is_eof() {
            p.next_field().unwrap();
            assert_eq!(p.field_id(), 1);
            p.repeated_int32_field(&mut values).unwrap();
        }
        assert_eq!(values, [1, 2]);
    }

    #[test]
    fn unknown_fields_of_every_wire_type_are_skipped() {
        let data = [
            0x48, 0x2a, // id 9, varint
            0x55, 0x01, 0x02, 0x03, 0x04, // id 10, fixed32
            0x59, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // id 11, fixed64
            0x62, 0x03, b'x', b'y', b'z', // id 12, length blob
            0x08, 0x07, // id 1, the known field
        ];
        let mut p = MsgParser::new(SliceInput::new(&data));
        let mut known = 0u32;
        while !p.is_eof() {
            p.next_field().unwrap();
            match p.field_id() {
                1 => known = p.uint32_field().unwrap(),
                _ => p.skip_field().unwrap(),
            }
        }
        assert_eq!(known, 7);
    }

    #[test]
    fn next_field_skips_an_unconsumed_field() {
        let data = [
            0x08, 0x96, 0x01, // id 1, varint 150
            0x10, 0x07, // id 2, varint 7
        ];
        let mut p = MsgParser::new(SliceInput::new(&data));
        p.next_field().unwrap();
        assert_eq!(p.field_id(), 1);
        // not consumed on purpose
        p.next_field().unwrap();
        assert_eq!(p.field_id(), 2);
        assert_eq!(p.uint32_field(), Ok(7));
        assert!(p.is_eof());
    }

    #[test]
    fn float_field_widens_and_narrows() {
        let data = [
            0x0d, 0x00, 0x00, 0x80, 0x3f, // id 1, fixed32 1.0f
            0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf0, 0x3f, // id 2, fixed64 1.0
        ];
        let mut p = MsgParser::new(SliceInput::new(&data));
        p.next_field().unwrap();
        assert_eq!(p.double_field(), Ok(1.0));
        p.next_field().unwrap();
        assert_eq!(p.float_field(), Ok(1.0));
    }

    #[test]
    fn blob_longer_than_input_is_invalid() {
        let data = [0x0a, 0x7f, 0x01];
        let mut p = MsgParser::new(SliceInput::new(&data));
        p.next_field().unwrap();
        assert_eq!(p.bytes_field(), Err(Error::InvalidInput));
    }

    #[test]
    fn string_field_reads_the_exact_length() {
        let data = [0x0a, 0x05, b'h', b'e', b'l', b'l', b'o', 0x10, 0x01];
        let mut p = MsgParser::new(SliceInput::new(&data));
        p.next_field().unwrap();
        assert_eq!(p.string_field().unwrap(), "hello");
        p.next_field().unwrap();
        assert_eq!(p.field_id(), 2);
        assert_eq!(p.bool_field(), Ok(true));
    }
}
