// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Packet seal and open.
//!
//! Sealing composes `header || masked_pn || ciphertext || tag`; the AEAD
//! associated data is the header followed by the unmasked encoded packet
//! number. The packet-number mask keystream is seeded by a 16-byte sample
//! of the AEAD output taken at offset `4 - pn_len`, which pins the sample
//! to a fixed anchor 4 bytes past the start of the packet number field
//! regardless of the encoded width.

use crate::{
    cipher_suite::{TLS_AES_128_GCM_SHA256 as CipherSuite, TAG_LEN},
    error::Error,
    header_key::{PnKey, SAMPLE_LEN},
};
use quill_quic_wire::{
    number::TruncatedPacketNumber, DecoderBuffer, EncoderBuffer,
};
use s2n_codec::Encoder;

/// The packet number field never exceeds 4 bytes, placing the sample anchor
/// 4 bytes past the field start
const SAMPLE_ANCHOR: usize = 4;

/// Seals `plaintext` under the given keys.
///
/// The packet number width covers twice the distance to `largest_acked`.
pub fn seal(
    cipher: &CipherSuite,
    pn_key: &PnKey,
    header: &[u8],
    packet_number: u64,
    largest_acked: Option<u64>,
    plaintext: &[u8],
) -> Result<Vec<u8>, Error> {
    let truncated = TruncatedPacketNumber::truncate(packet_number, largest_acked)
        .ok_or(Error::InternalError)?;

    let pn_len = truncated.len().bytesize();
    let mut pn_bytes = [0u8; 4];
    {
        let mut encoder = EncoderBuffer::new(&mut pn_bytes);
        encoder.encode(&truncated);
    }
    let pn_bytes = &mut pn_bytes[..pn_len];

    // AAD covers the entire header including the unmasked packet number
    let mut aad = Vec::with_capacity(header.len() + pn_len);
    aad.extend_from_slice(header);
    aad.extend_from_slice(pn_bytes);

    let mut payload = plaintext.to_vec();
    let tag = cipher.seal(packet_number, &aad, &mut payload)?;

    let sample = sample_at(&payload, &tag, SAMPLE_ANCHOR - pn_len)?;
    pn_key.mask(&sample, pn_bytes)?;

    let mut datagram = Vec::with_capacity(header.len() + pn_len + payload.len() + TAG_LEN);
    datagram.extend_from_slice(header);
    datagram.extend_from_slice(pn_bytes);
    datagram.extend_from_slice(&payload);
    datagram.extend_from_slice(&tag);
    Ok(datagram)
}

/// Opens a sealed payload. `datagram[..header_len]` is the header the peer
/// authenticated; `largest_pn` is the largest packet number opened at this
/// level so far.
///
/// Returns the recovered packet number and the plaintext. A tag mismatch
/// yields [`Error::DecryptError`] with no other effect; QUIC requires the
/// caller to drop such packets silently.
pub fn open(
    cipher: &CipherSuite,
    pn_key: &PnKey,
    largest_pn: Option<u64>,
    header_len: usize,
    datagram: &[u8],
) -> Result<(u64, Vec<u8>), Error> {
    let header = datagram.get(..header_len).ok_or(Error::DecodeError)?;
    let body = &datagram[header_len..];

    let sample_start = SAMPLE_ANCHOR;
    let sample: [u8; SAMPLE_LEN] = body
        .get(sample_start..sample_start + SAMPLE_LEN)
        .ok_or(Error::DecodeError)?
        .try_into()
        .expect("sample slice length checked");

    // unmask a 4-byte window; only the leading pn_len bytes are the field
    let mut window = [0u8; 4];
    window.copy_from_slice(&body[..4]);
    pn_key.mask(&sample, &mut window)?;

    let (truncated, _) = TruncatedPacketNumber::decode(DecoderBuffer::new(&window))?;
    let pn_len = truncated.len().bytesize();
    let packet_number = truncated.expand(largest_pn);

    let mut aad = Vec::with_capacity(header_len + pn_len);
    aad.extend_from_slice(header);
    aad.extend_from_slice(&window[..pn_len]);

    let mut payload = body[pn_len..].to_vec();
    let plaintext_len = cipher.open(packet_number, &aad, &mut payload)?;
    payload.truncate(plaintext_len);

    Ok((packet_number, payload))
}

fn sample_at(ciphertext: &[u8], tag: &[u8; TAG_LEN], offset: usize) -> Result<[u8; SAMPLE_LEN], Error> {
    if ciphertext.len() + TAG_LEN < offset + SAMPLE_LEN {
        // the connection layer pads packets well past this floor
        return Err(Error::DecodeError);
    }

    let mut sample = [0u8; SAMPLE_LEN];
    for (index, byte) in sample.iter_mut().enumerate() {
        let position = offset + index;
        *byte = if position < ciphertext.len() {
            ciphertext[position]
        } else {
            tag[position - ciphertext.len()]
        };
    }
    Ok(sample)
}
