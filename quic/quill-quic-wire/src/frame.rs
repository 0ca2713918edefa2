// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The CRYPTO frame carries the ordered stream of TLS handshake records for
//! an encryption level.

use crate::varint::VarInt;
use core::{convert::TryFrom, mem::size_of};
use s2n_codec::{
    decoder_invariant, decoder_parameterized_value, DecoderBuffer, DecoderBufferMut,
    DecoderBufferResult, Encoder, EncoderValue,
};

pub type Tag = u8;

//= CRYPTO Frame {
//=   Type (i) = 0x18,
//=   Offset (i),
//=   Length (i),
//=   Crypto Data (..),
//= }
macro_rules! crypto_tag {
    () => {
        0x18u8
    };
}

pub const CRYPTO_TAG: Tag = crypto_tag!();

/// Error returned when a frame cannot fit into a given capacity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FitError;

#[derive(Debug, PartialEq, Eq)]
pub struct Crypto<Data> {
    /// A variable-length integer specifying the byte offset in the stream
    /// for the data in this CRYPTO frame.
    pub offset: VarInt,

    /// The cryptographic message data.
    pub data: Data,
}

impl<Data> Crypto<Data> {
    #[inline]
    pub const fn tag(&self) -> Tag {
        crypto_tag!()
    }

    /// Converts the crypto data from one type to another
    #[inline]
    pub fn map_data<F: FnOnce(Data) -> Out, Out>(self, map: F) -> Crypto<Out> {
        Crypto {
            offset: self.offset,
            data: map(self.data),
        }
    }
}

impl<Data: EncoderValue> Crypto<Data> {
    /// Tries to fit the frame into the provided capacity
    ///
    /// If ok, the new payload length is returned, otherwise the frame cannot
    /// fit.
    #[inline]
    pub fn try_fit(&self, capacity: usize) -> Result<usize, FitError> {
        let mut fixed_len = 0;
        fixed_len += size_of::<Tag>();
        fixed_len += self.offset.encoding_size();

        let remaining_capacity = capacity.checked_sub(fixed_len).ok_or(FitError)?;

        let data_len = self.data.encoding_size();
        let max_data_len = remaining_capacity.min(data_len);

        let len_prefix_size = VarInt::try_from(max_data_len)
            .map_err(|_| FitError)?
            .encoding_size();

        let prefixed_data_len = remaining_capacity
            .checked_sub(len_prefix_size)
            .ok_or(FitError)?;
        let data_len = prefixed_data_len.min(data_len);

        Ok(data_len)
    }
}

pub type CryptoRef<'a> = Crypto<&'a [u8]>;
pub type CryptoMut<'a> = Crypto<&'a mut [u8]>;

impl<'a> CryptoRef<'a> {
    /// Parses a CRYPTO frame, including its type byte, returning the frame
    /// and the unconsumed rest of the buffer
    #[inline]
    pub fn parse(buffer: DecoderBuffer<'a>) -> DecoderBufferResult<'a, Self> {
        let (tag, buffer) = buffer.decode::<Tag>()?;
        decoder_invariant!(tag == CRYPTO_TAG, "invalid crypto frame tag");
        let (frame, buffer) = buffer.decode_parameterized::<Crypto<DecoderBuffer<'a>>>(tag)?;
        Ok((frame.into(), buffer))
    }
}

decoder_parameterized_value!(
    impl<'a, Data> Crypto<Data> {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (offset, buffer) = buffer.decode()?;
            let (data, buffer) = buffer.decode_with_len_prefix::<VarInt, Data>()?;

            let frame = Crypto { offset, data };

            Ok((frame, buffer))
        }
    }
);

impl<Data: EncoderValue> EncoderValue for Crypto<Data> {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.offset);
        buffer.encode_with_len_prefix::<VarInt, _>(&self.data);
    }
}

impl<'a> From<Crypto<DecoderBuffer<'a>>> for CryptoRef<'a> {
    #[inline]
    fn from(s: Crypto<DecoderBuffer<'a>>) -> Self {
        s.map_data(|data| data.into_less_safe_slice())
    }
}

impl<'a> From<Crypto<DecoderBufferMut<'a>>> for CryptoRef<'a> {
    #[inline]
    fn from(s: Crypto<DecoderBufferMut<'a>>) -> Self {
        s.map_data(|data| &*data.into_less_safe_slice())
    }
}

impl<'a> From<Crypto<DecoderBufferMut<'a>>> for CryptoMut<'a> {
    #[inline]
    fn from(s: Crypto<DecoderBufferMut<'a>>) -> Self {
        s.map_data(|data| data.into_less_safe_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolero::check;

    #[test]
    fn round_trip_test() {
        let frame = Crypto {
            offset: VarInt::from_u16(1234),
            data: &[1u8, 2, 3, 4, 5][..],
        };

        let encoded = frame.encode_to_vec();
        assert_eq!(encoded[0], CRYPTO_TAG);

        let (decoded, remaining) = CryptoRef::parse(DecoderBuffer::new(&encoded)).unwrap();
        assert!(remaining.is_empty());
        assert_eq!(decoded.offset, frame.offset);
        assert_eq!(decoded.data, frame.data);
    }

    #[test]
    fn rejects_other_tags_test() {
        let bytes = [0x06u8, 0x00, 0x01, 0xaa];
        assert!(CryptoRef::parse(DecoderBuffer::new(&bytes)).is_err());
    }

    #[test]
    fn try_fit_test() {
        let payload = [0u8; 64];

        check!()
            .with_type::<(u16, usize)>()
            .cloned()
            .for_each(|(offset, capacity)| {
                let capacity = capacity % 128;
                let mut frame = Crypto {
                    offset: VarInt::from_u16(offset),
                    data: &payload[..],
                };

                if let Ok(new_len) = frame.try_fit(capacity) {
                    frame.data = &payload[..new_len];
                    assert!(
                        frame.encoding_size() <= capacity,
                        "the encoding_size should not exceed capacity {frame:#?}"
                    );
                } else {
                    assert!(frame.encoding_size() > capacity);
                }
            });
    }
}
