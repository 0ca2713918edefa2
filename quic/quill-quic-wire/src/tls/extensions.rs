// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The TLS extension block, restricted to the extensions the QUIC handshake
//! negotiates. Unknown extensions are skipped.

use crate::tls::HandshakeType;
use s2n_codec::{decoder_invariant, DecoderBuffer, DecoderError};

pub const SUPPORTED_GROUPS: u16 = 10;
pub const SIGNATURE_ALGORITHMS: u16 = 13;
pub const SERVER_CERTIFICATE_TYPE: u16 = 20;
pub const SUPPORTED_VERSIONS: u16 = 43;
pub const KEY_SHARE: u16 = 51;

/// The QUIC transport parameter extension codepoint
pub const TRANSPORT_PARAMETERS: u16 = 0xffa5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyShareEntry<'a> {
    pub group: u16,
    pub key_exchange: &'a [u8],
}

/// The extensions of one hello-family message, in parsed form.
///
/// List-valued fields are empty when the extension is absent; the hello
/// variants (client list vs server selection) are normalized into the same
/// shape.
#[derive(Debug, Default)]
pub struct Extensions<'a> {
    pub supported_versions: Vec<u16>,
    pub supported_groups: Vec<u16>,
    pub signature_algorithms: Vec<u16>,
    pub server_certificate_types: Vec<u8>,
    pub key_shares: Vec<KeyShareEntry<'a>>,
    pub transport_parameters: Option<&'a [u8]>,
}

impl<'a> Extensions<'a> {
    pub fn parse(
        msg_type: HandshakeType,
        mut buffer: DecoderBuffer<'a>,
    ) -> Result<Self, DecoderError> {
        let mut extensions = Self::default();

        while !buffer.is_empty() {
            let (id, rest) = buffer.decode::<u16>()?;
            let (payload, rest) = rest.decode_slice_with_len_prefix::<u16>()?;

            match id {
                SUPPORTED_VERSIONS => {
                    extensions.supported_versions = match msg_type {
                        // ClientHello offers a list; the server echoes its
                        // selection as a bare version
                        HandshakeType::ClientHello => {
                            let (list, payload) = payload.decode_slice_with_len_prefix::<u8>()?;
                            payload.ensure_empty()?;
                            u16_items(list)?
                        }
                        _ => {
                            let (version, payload) = payload.decode::<u16>()?;
                            payload.ensure_empty()?;
                            vec![version]
                        }
                    };
                }
                SUPPORTED_GROUPS => {
                    let (list, payload) = payload.decode_slice_with_len_prefix::<u16>()?;
                    payload.ensure_empty()?;
                    extensions.supported_groups = u16_items(list)?;
                }
                SIGNATURE_ALGORITHMS => {
                    let (list, payload) = payload.decode_slice_with_len_prefix::<u16>()?;
                    payload.ensure_empty()?;
                    extensions.signature_algorithms = u16_items(list)?;
                }
                SERVER_CERTIFICATE_TYPE => {
                    extensions.server_certificate_types = match msg_type {
                        HandshakeType::ClientHello => {
                            let (list, payload) = payload.decode_slice_with_len_prefix::<u8>()?;
                            payload.ensure_empty()?;
                            list.into_less_safe_slice().to_vec()
                        }
                        _ => {
                            let (cert_type, payload) = payload.decode::<u8>()?;
                            payload.ensure_empty()?;
                            vec![cert_type]
                        }
                    };
                }
                KEY_SHARE => match msg_type {
                    HandshakeType::ClientHello => {
                        let (mut list, payload) = payload.decode_slice_with_len_prefix::<u16>()?;
                        payload.ensure_empty()?;
                        while !list.is_empty() {
                            let (entry, rest) = key_share_entry(list)?;
                            extensions.key_shares.push(entry);
                            list = rest;
                        }
                    }
                    // ServerHello carries exactly one entry, no list prefix
                    _ => {
                        let (entry, payload) = key_share_entry(payload)?;
                        payload.ensure_empty()?;
                        extensions.key_shares.push(entry);
                    }
                },
                TRANSPORT_PARAMETERS => {
                    decoder_invariant!(
                        extensions.transport_parameters.is_none(),
                        "duplicate transport parameter extension"
                    );
                    extensions.transport_parameters = Some(payload.into_less_safe_slice());
                }
                _ => {
                    // unknown extensions are tolerated and ignored
                }
            }

            buffer = rest;
        }

        Ok(extensions)
    }
}

fn key_share_entry(buffer: DecoderBuffer) -> Result<(KeyShareEntry, DecoderBuffer), DecoderError> {
    let (group, buffer) = buffer.decode::<u16>()?;
    let (key_exchange, buffer) = buffer.decode_slice_with_len_prefix::<u16>()?;
    decoder_invariant!(!key_exchange.is_empty(), "empty key_share entry");

    Ok((
        KeyShareEntry {
            group,
            key_exchange: key_exchange.into_less_safe_slice(),
        },
        buffer,
    ))
}

pub(crate) fn u16_items(buffer: DecoderBuffer) -> Result<Vec<u16>, DecoderError> {
    decoder_invariant!(buffer.len() % 2 == 0, "odd u16 list length");
    let mut buffer = buffer;
    let mut items = Vec::with_capacity(buffer.len() / 2);
    while !buffer.is_empty() {
        let (item, rest) = buffer.decode::<u16>()?;
        items.push(item);
        buffer = rest;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn skips_unknown_extensions_test() {
        // ALPN (16) followed by supported_groups
        let block = hex!(
            "0010 0005 0403616263"
            "000a 0004 0002 0017"
        );
        let extensions =
            Extensions::parse(HandshakeType::ClientHello, DecoderBuffer::new(&block)).unwrap();
        assert_eq!(extensions.supported_groups, vec![0x0017]);
    }

    #[test]
    fn rejects_duplicate_transport_parameters_test() {
        let block = hex!("ffa5 0000 ffa5 0000");
        assert!(
            Extensions::parse(HandshakeType::ClientHello, DecoderBuffer::new(&block)).is_err()
        );
    }

    #[test]
    fn server_key_share_is_single_entry_test() {
        let block = hex!("0033 0007 0017 0003 aabbcc");
        let extensions =
            Extensions::parse(HandshakeType::ServerHello, DecoderBuffer::new(&block)).unwrap();
        assert_eq!(
            extensions.key_shares,
            vec![KeyShareEntry {
                group: 0x0017,
                key_exchange: &[0xaa, 0xbb, 0xcc],
            }]
        );
    }

    #[test]
    fn truncated_extension_test() {
        let block = hex!("000a 0006 0002 0017");
        assert!(
            Extensions::parse(HandshakeType::ClientHello, DecoderBuffer::new(&block)).is_err()
        );
    }
}
