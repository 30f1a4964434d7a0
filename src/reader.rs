//! Input streams and the low level wire decoder

use crate::errors::{Error, Result};
use crate::wire::WireType;
use byteorder_lite::{ByteOrder, LittleEndian as LE};

/// Input source abstraction for the decoder
///
/// Protobuf messages carry no end marker, so `bytes_available` is the
/// authoritative end-of-input signal. The trait is object safe: bounded
/// sub-message views wrap their parent as `&mut dyn InputStream`.
pub trait InputStream {
    /// Fills `data` completely or fails with [`Error::OutOfSpace`] without a
    /// defined amount consumed
    fn read(&mut self, data: &mut [u8]) -> Result<()>;

    /// Consumes `n` bytes without copying them
    fn skip(&mut self, n: usize) -> Result<()>;

    /// Copies up to `data.len()` bytes without advancing, returning the
    /// count; 0 means no data or peeking unsupported
    fn peek(&mut self, data: &mut [u8]) -> usize;

    /// Bytes left to read
    fn bytes_available(&self) -> usize;
}

/// An input stream over a borrowed byte slice
///
/// Covers both fixed buffers and growable containers; a `Vec<u8>` is read
/// through its slice view.
pub struct SliceInput<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceInput<'a> {
    /// Creates a new stream reading `data` from the start
    pub fn new(data: &'a [u8]) -> SliceInput<'a> {
        SliceInput { data, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn bytes_used(&self) -> usize {
        self.pos
    }

    /// Rewinds to the start of the slice
    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

impl InputStream for SliceInput<'_> {
    fn read(&mut self, data: &mut [u8]) -> Result<()> {
        if data.len() > self.bytes_available() {
            return Err(Error::OutOfSpace);
        }
        data.copy_from_slice(&self.data[self.pos..self.pos + data.len()]);
        self.pos += data.len();
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if n > self.bytes_available() {
            return Err(Error::OutOfSpace);
        }
        self.pos += n;
        Ok(())
    }

    fn peek(&mut self, data: &mut [u8]) -> usize {
        let n = data.len().min(self.bytes_available());
        data[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        n
    }

    #[inline(always)]
    fn bytes_available(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// A bounded view over a parent stream
///
/// Exposes at most `len` bytes (clipped to what the parent has left) and
/// forwards every read and skip, so consuming the view advances the parent.
/// Confines sub-message and packed-block parsing.
pub struct SubsetInput<'a> {
    parent: &'a mut dyn InputStream,
    len: usize,
    pos: usize,
}

impl<'a> SubsetInput<'a> {
    /// Creates a view exposing the next `len` bytes of `parent`
    pub fn new(parent: &'a mut dyn InputStream, len: usize) -> SubsetInput<'a> {
        let len = len.min(parent.bytes_available());
        SubsetInput {
            parent,
            len,
            pos: 0,
        }
    }
}

impl InputStream for SubsetInput<'_> {
    fn read(&mut self, data: &mut [u8]) -> Result<()> {
        if data.len() > self.bytes_available() {
            return Err(Error::OutOfSpace);
        }
        self.parent.read(data)?;
        self.pos += data.len();
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if n > self.bytes_available() {
            return Err(Error::OutOfSpace);
        }
        self.parent.skip(n)?;
        self.pos += n;
        Ok(())
    }

    fn peek(&mut self, data: &mut [u8]) -> usize {
        let n = data.len().min(self.bytes_available());
        self.parent.peek(&mut data[..n])
    }

    #[inline(always)]
    fn bytes_available(&self) -> usize {
        self.len - self.pos
    }
}

/// A struct to read the raw protobuf wire primitives out of an input stream
pub struct Decoder<S: InputStream> {
    stream: S,
}

impl<S: InputStream> Decoder<S> {
    /// Creates a new `Decoder`
    pub fn new(stream: S) -> Decoder<S> {
        Decoder { stream }
    }

    /// Shared access to the underlying stream
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Exclusive access to the underlying stream
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Reads a `varint` of up to 10 bytes
    ///
    /// Scans a peeked window when the stream supports peeking and falls back
    /// to single byte reads otherwise. A 10th byte with its continuation bit
    /// still set is malformed.
    pub fn varint(&mut self) -> Result<u64> {
        let mut buf = [0u8; 10];
        let peeked = self.stream.peek(&mut buf);
        let mut val = 0u64;
        if peeked == 0 {
            for i in 0..10 {
                let mut byte = [0u8; 1];
                self.stream.read(&mut byte)?;
                val |= ((byte[0] & 0x7f) as u64) << (i * 7);
                if byte[0] & 0x80 == 0 {
                    return Ok(val);
                }
            }
        } else {
            for (i, &byte) in buf[..peeked].iter().enumerate() {
                val |= ((byte & 0x7f) as u64) << (i * 7);
                if byte & 0x80 == 0 {
                    self.stream.skip(i + 1)?;
                    return Ok(val);
                }
            }
        }
        Err(Error::InvalidInput)
    }

    /// Reads a zig-zag coded `varint`
    #[inline(always)]
    pub fn varint_signed(&mut self) -> Result<i64> {
        let v = self.varint()?;
        Ok(((v >> 1) as i64) ^ -((v & 1) as i64))
    }

    /// Reads a field header, splitting it into field id and wire type
    pub fn field_header(&mut self) -> Result<(u64, WireType)> {
        let v = self.varint()?;
        Ok((v >> 3, WireType::from_bits((v & 0x7) as u8)?))
    }

    /// Reads a `fixed32` (4 little endian bytes)
    #[inline(always)]
    pub fn fixed32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.stream.read(&mut buf)?;
        Ok(LE::read_u32(&buf))
    }

    /// Reads a `sfixed32` (4 little endian bytes)
    #[inline(always)]
    pub fn sfixed32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.stream.read(&mut buf)?;
        Ok(LE::read_i32(&buf))
    }

    /// Reads a `float` (4 little endian bytes)
    #[inline(always)]
    pub fn float(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.stream.read(&mut buf)?;
        Ok(LE::read_f32(&buf))
    }

    /// Reads a `fixed64` (8 little endian bytes)
    #[inline(always)]
    pub fn fixed64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.stream.read(&mut buf)?;
        Ok(LE::read_u64(&buf))
    }

    /// Reads a `sfixed64` (8 little endian bytes)
    #[inline(always)]
    pub fn sfixed64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.stream.read(&mut buf)?;
        Ok(LE::read_i64(&buf))
    }

    /// Reads a `double` (8 little endian bytes)
    #[inline(always)]
    pub fn double(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.stream.read(&mut buf)?;
        Ok(LE::read_f64(&buf))
    }

    /// Reads raw bytes with no framing
    #[inline(always)]
    pub fn raw(&mut self, data: &mut [u8]) -> Result<()> {
        self.stream.read(data)
    }

    /// Consumes one field payload of the given wire type
    ///
    /// Group framing is recognized but rejected.
    pub fn skip_field(&mut self, wt: WireType) -> Result<()> {
        match wt {
            WireType::Varint => self.varint().map(|_| ()),
            WireType::Fixed64 => self.stream.skip(8),
            WireType::LengthBlob => {
                let len = self.varint()?;
                let len = usize::try_from(len).map_err(|_| Error::InvalidInput)?;
                self.stream.skip(len)
            }
            WireType::GroupStart | WireType::GroupEnd => Err(Error::InvalidInput),
            WireType::Fixed32 => self.stream.skip(4),
        }
    }

    /// Checks whether all input has been consumed
    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        self.stream.bytes_available() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trip() {
        for v in [
            0u64,
            1,
            127,
            128,
            150,
            300,
            0x1000,
            0x10000,
            u32::MAX as u64,
            u64::MAX - 1,
            u64::MAX,
        ] {
            let mut buf = [0u8; 10];
            let len = crate::writer::build_varint(v, &mut buf);
            let mut dec = Decoder::new(SliceInput::new(&buf[..len]));
            assert_eq!(dec.varint(), Ok(v));
            assert!(dec.is_eof());
        }
    }

    #[test]
    fn varint_ten_continuation_bytes_is_malformed() {
        let buf = [0x80u8; 10];
        let mut dec = Decoder::new(SliceInput::new(&buf));
        assert_eq!(dec.varint(), Err(Error::InvalidInput));
    }

    #[test]
    fn varint_truncated_input() {
        let buf = [0x80u8, 0x80];
        let mut dec = Decoder::new(SliceInput::new(&buf));
        assert_eq!(dec.varint(), Err(Error::InvalidInput));
    }

    #[test]
    fn varint_signed_round_trip() {
        let mut scratch = Vec::new();
        for v in [0i64, -1, 1, -2, 63, -64, i32::MIN as i64, i64::MIN, i64::MAX] {
            scratch.clear();
            let mut enc = crate::writer::Encoder::new(crate::writer::VecOutput::new(&mut scratch));
            enc.varint_signed(v).unwrap();
            drop(enc);
            let mut dec = Decoder::new(SliceInput::new(&scratch));
            assert_eq!(dec.varint_signed(), Ok(v));
        }
    }

    #[test]
    fn subset_is_bounded() {
        let data = [0x01u8, 0x02, 0x03, 0x04];
        let mut parent = SliceInput::new(&data);
        let mut sub = SubsetInput::new(&mut parent, 2);
        assert_eq!(sub.bytes_available(), 2);
        let mut b = [0u8; 1];
        assert_eq!(sub.read(&mut b), Ok(()));
        assert_eq!(b[0], 0x01);
        assert_eq!(sub.skip(2), Err(Error::OutOfSpace));
        assert_eq!(sub.skip(1), Ok(()));
        assert_eq!(sub.bytes_available(), 0);
        drop(sub);
        // the parent advanced with the view
        assert_eq!(parent.bytes_available(), 2);
    }

    #[test]
    fn subset_clips_to_parent() {
        let data = [0x01u8, 0x02];
        let mut parent = SliceInput::new(&data);
        let sub = SubsetInput::new(&mut parent, 100);
        assert_eq!(sub.bytes_available(), 2);
    }

    #[test]
    fn subset_peek_is_clipped() {
        let data = [0x96u8, 0x01, 0xff, 0xff];
        let mut parent = SliceInput::new(&data);
        let mut sub = SubsetInput::new(&mut parent, 2);
        let mut buf = [0u8; 10];
        assert_eq!(sub.peek(&mut buf), 2);
        assert_eq!(&buf[..2], &[0x96, 0x01]);
    }

    #[test]
    fn varint_does_not_cross_a_subset_boundary() {
        // varint terminator lies outside the 1-byte view
        let data = [0x80u8, 0x01];
        let mut parent = SliceInput::new(&data);
        let sub = SubsetInput::new(&mut parent, 1);
        let mut dec = Decoder::new(sub);
        assert_eq!(dec.varint(), Err(Error::InvalidInput));
    }

    #[test]
    fn skip_field_advances_per_wire_type() {
        // varint, fixed32, fixed64, then a length blob
        let data = [
            0xac, 0x02, // varint
            0x01, 0x02, 0x03, 0x04, // fixed32
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // fixed64
            0x02, 0xaa, 0xbb, // length blob
        ];
        let mut dec = Decoder::new(SliceInput::new(&data));
        assert_eq!(dec.skip_field(WireType::Varint), Ok(()));
        assert_eq!(dec.skip_field(WireType::Fixed32), Ok(()));
        assert_eq!(dec.skip_field(WireType::Fixed64), Ok(()));
        assert_eq!(dec.skip_field(WireType::LengthBlob), Ok(()));
        assert!(dec.is_eof());
    }

    #[test]
    fn skip_field_rejects_groups() {
        let data = [0x00u8];
        let mut dec = Decoder::new(SliceInput::new(&data));
        assert_eq!(dec.skip_field(WireType::GroupStart), Err(Error::InvalidInput));
        assert_eq!(dec.skip_field(WireType::GroupEnd), Err(Error::InvalidInput));
    }

    #[test]
    fn field_header_splits_id_and_type() {
        let data = [0x0a, 0x1d, 0x10];
        let mut dec = Decoder::new(SliceInput::new(&data));
        assert_eq!(dec.field_header(), Ok((1, WireType::LengthBlob)));
        assert_eq!(dec.field_header(), Ok((3, WireType::Fixed32)));
        assert_eq!(dec.field_header(), Ok((2, WireType::Varint)));
    }
}
