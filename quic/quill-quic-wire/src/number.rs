// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Packet number encodings.
//!
//! Packet numbers ride in the packet header truncated to 1, 2, or 4 bytes.
//! The leading bits of the first byte carry the width (`0` -> 1 byte, `10`
//! -> 2 bytes, `11` -> 4 bytes), leaving 7, 14, or 30 usable bits. The
//! receiver recovers the full 62-bit value by expanding the truncated value
//! against the largest packet number it has seen on the same level.

use core::convert::TryFrom;
use s2n_codec::{DecoderBuffer, DecoderBufferResult, DecoderError, Encoder, EncoderValue};

use crate::varint::MAX_VARINT_VALUE;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PacketNumberLen {
    One,
    Two,
    Four,
}

impl PacketNumberLen {
    #[inline]
    pub const fn bytesize(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    #[inline]
    pub const fn usable_bits(self) -> u32 {
        match self {
            Self::One => 7,
            Self::Two => 14,
            Self::Four => 30,
        }
    }

    #[inline]
    pub const fn max_value(self) -> u64 {
        (1 << self.usable_bits()) - 1
    }

    /// Reads the width flag from the first (unmasked) packet number byte
    #[inline]
    pub const fn from_first_byte(byte: u8) -> Self {
        if byte & 0x80 == 0 {
            Self::One
        } else if byte & 0x40 == 0 {
            Self::Two
        } else {
            Self::Four
        }
    }

    /// Returns the smallest width able to represent `value`
    #[inline]
    pub fn for_value(value: u64) -> Option<Self> {
        [Self::One, Self::Two, Self::Four]
            .into_iter()
            .find(|len| value <= len.max_value())
    }
}

/// A packet number truncated for transmission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TruncatedPacketNumber {
    len: PacketNumberLen,
    value: u64,
}

impl TruncatedPacketNumber {
    /// Truncates `packet_number`, choosing a width able to represent more
    /// than twice the distance to the largest acknowledged packet number.
    #[inline]
    pub fn truncate(packet_number: u64, largest_acked: Option<u64>) -> Option<Self> {
        debug_assert!(packet_number <= MAX_VARINT_VALUE);

        let distance = match largest_acked {
            Some(largest) => packet_number.checked_sub(largest)?,
            None => packet_number.checked_add(1)?,
        };
        let len = PacketNumberLen::for_value(distance.checked_mul(2)?)?;

        Some(Self::with_len(packet_number, len))
    }

    /// Truncates `packet_number` to an explicit caller-chosen width
    #[inline]
    pub fn with_len(packet_number: u64, len: PacketNumberLen) -> Self {
        Self {
            len,
            value: packet_number & len.max_value(),
        }
    }

    /// Decodes an unmasked packet number field, deriving the width from the
    /// leading bits of the first byte
    #[inline]
    pub fn decode(buffer: DecoderBuffer) -> DecoderBufferResult<Self> {
        let first = buffer.peek_byte(0)?;
        let len = PacketNumberLen::from_first_byte(first);

        let (value, buffer) = match len {
            PacketNumberLen::One => {
                let (value, buffer) = buffer.decode::<u8>()?;
                ((value & 0x7f) as u64, buffer)
            }
            PacketNumberLen::Two => {
                let (value, buffer) = buffer.decode::<u16>()?;
                ((value & 0x3fff) as u64, buffer)
            }
            PacketNumberLen::Four => {
                let (value, buffer) = buffer.decode::<u32>()?;
                ((value & 0x3fff_ffff) as u64, buffer)
            }
        };

        Ok((Self { len, value }, buffer))
    }

    #[inline]
    pub const fn len(self) -> PacketNumberLen {
        self.len
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        false
    }

    #[inline]
    pub const fn into_u64(self) -> u64 {
        self.value
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#appendix-A.3
    //# candidate_pn = (expected_pn & ~pn_mask) | truncated_pn
    //# if candidate_pn <= expected_pn - pn_hwin and
    //#    candidate_pn < (1 << 62) - pn_win:
    //#    return candidate_pn + pn_win
    //# if candidate_pn > expected_pn + pn_hwin and
    //#    candidate_pn >= pn_win:
    //#    return candidate_pn - pn_win
    //# return candidate_pn
    /// Expands the truncated value against the largest packet number
    /// received on the same level
    #[inline]
    pub fn expand(self, largest: Option<u64>) -> u64 {
        let expected = match largest {
            Some(largest) => largest + 1,
            None => return self.value,
        };

        let win = 1u64 << self.len.usable_bits();
        let hwin = win / 2;
        let mask = win - 1;
        let candidate = (expected & !mask) | self.value;

        if expected
            .checked_sub(hwin)
            .map_or(false, |low| candidate <= low)
            && candidate < MAX_VARINT_VALUE + 1 - win
        {
            return candidate + win;
        }

        if candidate > expected + hwin && candidate >= win {
            return candidate - win;
        }

        candidate
    }
}

impl EncoderValue for TruncatedPacketNumber {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        match self.len {
            PacketNumberLen::One => encoder.encode(&(self.value as u8)),
            PacketNumberLen::Two => encoder.encode(&((0b10u16 << 14) | self.value as u16)),
            PacketNumberLen::Four => encoder.encode(&((0b11u32 << 30) | self.value as u32)),
        }
    }

    #[inline]
    fn encoding_size(&self) -> usize {
        self.len.bytesize()
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        self.len.bytesize()
    }
}

impl TryFrom<usize> for PacketNumberLen {
    type Error = DecoderError;

    #[inline]
    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            _ => Err(DecoderError::InvariantViolation("invalid packet number length")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolero::check;
    use s2n_codec::EncoderBuffer;

    fn encode(pn: TruncatedPacketNumber) -> Vec<u8> {
        let mut bytes = [0u8; 4];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&pn);
        let len = encoder.len();
        assert_eq!(len, pn.len().bytesize());
        bytes[..len].to_vec()
    }

    #[test]
    fn width_flag_test() {
        let one = encode(TruncatedPacketNumber::with_len(0x55, PacketNumberLen::One));
        assert_eq!(one, vec![0x55]);
        assert_eq!(PacketNumberLen::from_first_byte(one[0]), PacketNumberLen::One);

        let two = encode(TruncatedPacketNumber::with_len(0x1234, PacketNumberLen::Two));
        assert_eq!(two, vec![0x92, 0x34]);
        assert_eq!(PacketNumberLen::from_first_byte(two[0]), PacketNumberLen::Two);

        let four = encode(TruncatedPacketNumber::with_len(
            0x2345_6789,
            PacketNumberLen::Four,
        ));
        assert_eq!(four, vec![0xe3, 0x45, 0x67, 0x89]);
        assert_eq!(
            PacketNumberLen::from_first_byte(four[0]),
            PacketNumberLen::Four
        );
    }

    #[test]
    fn truncate_width_test() {
        // fresh space: a small packet number fits in one byte
        assert_eq!(
            TruncatedPacketNumber::truncate(3, None).unwrap().len(),
            PacketNumberLen::One
        );

        // a distance needing more than 7 usable bits widens the field
        assert_eq!(
            TruncatedPacketNumber::truncate(0x6000, Some(0x10))
                .unwrap()
                .len(),
            PacketNumberLen::Four
        );

        // sending below the acknowledged floor is a caller error
        assert!(TruncatedPacketNumber::truncate(1, Some(2)).is_none());
    }

    #[test]
    fn expand_test() {
        // no history: the truncated value is the packet number
        let pn = TruncatedPacketNumber::with_len(0, PacketNumberLen::One);
        assert_eq!(pn.expand(None), 0);

        // contiguous delivery
        let pn = TruncatedPacketNumber::with_len(17, PacketNumberLen::One);
        assert_eq!(pn.expand(Some(16)), 17);

        // wrap past the window boundary
        let pn = TruncatedPacketNumber::with_len(0x02, PacketNumberLen::One);
        assert_eq!(pn.expand(Some(0x7f)), 0x82);

        // reordered packet below the expected value
        let pn = TruncatedPacketNumber::with_len(0x7e, PacketNumberLen::One);
        assert_eq!(pn.expand(Some(0x7f)), 0x7e);
    }

    #[test]
    fn truncate_expand_round_trip_test() {
        check!()
            .with_type::<(u64, u64)>()
            .cloned()
            .for_each(|(largest, delta)| {
                let largest = largest % (MAX_VARINT_VALUE / 2);
                let packet_number = largest + (delta % (1 << 28)) + 1;

                let truncated =
                    TruncatedPacketNumber::truncate(packet_number, Some(largest)).unwrap();

                // the receiver tracks some largest value in the delivery
                // window; the most recent in-order case
                assert_eq!(truncated.expand(Some(packet_number - 1)), packet_number);

                // the wire form decodes to the same truncated value
                let bytes = {
                    let mut bytes = [0u8; 4];
                    let mut encoder = EncoderBuffer::new(&mut bytes);
                    encoder.encode(&truncated);
                    let len = encoder.len();
                    bytes[..len].to_vec()
                };
                let (decoded, _) = TruncatedPacketNumber::decode(DecoderBuffer::new(&bytes)).unwrap();
                assert_eq!(decoded, truncated);
            });
    }
}
