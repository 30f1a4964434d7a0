//! The 3-bit payload framing tag that accompanies every field id

use crate::errors::{Error, Result};

/// The wire type of a protobuf value
///
/// A wire type is packed together with a field id into a field header; it
/// selects how the payload that follows is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// A variable length integer (`int32`, `int64`, `uint32`, `uint64`,
    /// `sint32`, `sint64`, `bool`, `enum`)
    Varint = 0,
    /// 8 little endian bytes (`fixed64`, `sfixed64`, `double`)
    Fixed64 = 1,
    /// A varint byte length followed by that many bytes (`string`, `bytes`,
    /// sub-messages, packed repeated fields)
    LengthBlob = 2,
    /// Group start, deprecated proto2 framing
    GroupStart = 3,
    /// Group end, deprecated proto2 framing
    GroupEnd = 4,
    /// 4 little endian bytes (`fixed32`, `sfixed32`, `float`)
    Fixed32 = 5,
}

impl WireType {
    /// Decodes the low three bits of a field header
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits & 0x7 {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthBlob),
            3 => Ok(WireType::GroupStart),
            4 => Ok(WireType::GroupEnd),
            5 => Ok(WireType::Fixed32),
            _ => Err(Error::InvalidInput),
        }
    }

    /// The raw 3-bit value of this wire type
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_live_tags() {
        for wt in [
            WireType::Varint,
            WireType::Fixed64,
            WireType::LengthBlob,
            WireType::GroupStart,
            WireType::GroupEnd,
            WireType::Fixed32,
        ] {
            assert_eq!(WireType::from_bits(wt.bits()), Ok(wt));
        }
    }

    #[test]
    fn rejects_reserved_tags() {
        assert_eq!(WireType::from_bits(6), Err(Error::InvalidInput));
        assert_eq!(WireType::from_bits(7), Err(Error::InvalidInput));
    }
}
