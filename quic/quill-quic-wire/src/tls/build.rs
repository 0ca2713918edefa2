// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Encoders for outbound handshake records.
//!
//! Each builder borrows its inputs and implements `EncoderValue`; wrapping a
//! body in [`Message`] prepends the `{type, length}` record header.

use crate::tls::{extensions, HandshakeType, CERT_TYPE_X509, TLS_LEGACY_VERSION, TLS_VERSION_13};
use s2n_codec::{u24, Encoder, EncoderValue};

/// A handshake record: `{type:u8, length:u24, body}`
#[derive(Debug)]
pub struct Message<Body> {
    pub msg_type: HandshakeType,
    pub body: Body,
}

impl<Body: EncoderValue> EncoderValue for Message<Body> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&(self.msg_type as u8));
        let len = self.body.encoding_size_for_encoder(encoder);
        debug_assert!(len < 1 << 24, "handshake body exceeds u24 length");
        encoder.encode(&u24::new_truncated(len as u32));
        encoder.encode(&self.body);
    }
}

/// A bare sequence of u16 values
struct U16Seq<'a>(&'a [u16]);

impl EncoderValue for U16Seq<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        for item in self.0 {
            encoder.encode(item);
        }
    }
}

/// An extension: `{id:u16, len:u16, payload}`
struct Extension<V> {
    id: u16,
    value: V,
}

impl<V: EncoderValue> EncoderValue for Extension<V> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.id);
        encoder.encode_with_len_prefix::<u16, _>(&self.value);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct KeyShare<'a> {
    pub group: u16,
    pub key_exchange: &'a [u8],
}

impl EncoderValue for KeyShare<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.group);
        encoder.encode_with_len_prefix::<u16, _>(&self.key_exchange);
    }
}

/// The client form of supported_versions: a u8-prefixed list
struct OfferedVersions<'a>(&'a [u16]);

impl EncoderValue for OfferedVersions<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode_with_len_prefix::<u8, _>(&U16Seq(self.0));
    }
}

/// A u16-prefixed list of u16 values (groups, signature schemes, ciphers)
struct U16List<'a>(&'a [u16]);

impl EncoderValue for U16List<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode_with_len_prefix::<u16, _>(&U16Seq(self.0));
    }
}

#[derive(Debug)]
pub struct ClientHello<'a> {
    pub random: &'a [u8; 32],
    pub cipher_suites: &'a [u16],
    pub supported_versions: &'a [u16],
    pub groups: &'a [u16],
    pub signature_algorithms: &'a [u16],
    pub certificate_types: &'a [u8],
    pub key_share: KeyShare<'a>,
    /// pre-encoded transport parameter extension payload
    pub transport_parameters: &'a [u8],
}

impl EncoderValue for ClientHello<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&TLS_LEGACY_VERSION);
        encoder.write_slice(self.random);
        // legacy_session_id is always empty over QUIC
        encoder.encode(&0u8);
        encoder.encode_with_len_prefix::<u16, _>(&U16Seq(self.cipher_suites));
        // legacy_compression_methods: the null method only
        encoder.encode(&1u8);
        encoder.encode(&0u8);

        let extensions = ClientHelloExtensions(self);
        encoder.encode_with_len_prefix::<u16, _>(&extensions);
    }
}

struct ClientHelloExtensions<'a>(&'a ClientHello<'a>);

impl EncoderValue for ClientHelloExtensions<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let hello = self.0;
        encoder.encode(&Extension {
            id: extensions::SUPPORTED_VERSIONS,
            value: OfferedVersions(hello.supported_versions),
        });
        encoder.encode(&Extension {
            id: extensions::SUPPORTED_GROUPS,
            value: U16List(hello.groups),
        });
        encoder.encode(&Extension {
            id: extensions::SIGNATURE_ALGORITHMS,
            value: U16List(hello.signature_algorithms),
        });
        encoder.encode(&Extension {
            id: extensions::SERVER_CERTIFICATE_TYPE,
            value: CertificateTypes(hello.certificate_types),
        });
        encoder.encode(&Extension {
            id: extensions::KEY_SHARE,
            value: ClientKeyShare(hello.key_share),
        });
        encoder.encode(&Extension {
            id: extensions::TRANSPORT_PARAMETERS,
            value: hello.transport_parameters,
        });
    }
}

/// The client form of key_share: a u16-prefixed entry list
struct ClientKeyShare<'a>(KeyShare<'a>);

impl EncoderValue for ClientKeyShare<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode_with_len_prefix::<u16, _>(&self.0);
    }
}

/// The client form of server_certificate_type: a u8-prefixed list
struct CertificateTypes<'a>(&'a [u8]);

impl EncoderValue for CertificateTypes<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode_with_len_prefix::<u8, _>(&self.0)
    }
}

#[derive(Debug)]
pub struct ServerHello<'a> {
    pub random: &'a [u8; 32],
    pub cipher_suite: u16,
    pub key_share: KeyShare<'a>,
}

impl EncoderValue for ServerHello<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&TLS_LEGACY_VERSION);
        encoder.write_slice(self.random);
        encoder.encode(&0u8);
        encoder.encode(&self.cipher_suite);
        encoder.encode(&0u8);

        let extensions = ServerHelloExtensions(self);
        encoder.encode_with_len_prefix::<u16, _>(&extensions);
    }
}

struct ServerHelloExtensions<'a>(&'a ServerHello<'a>);

impl EncoderValue for ServerHelloExtensions<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let hello = self.0;
        encoder.encode(&Extension {
            id: extensions::SUPPORTED_VERSIONS,
            value: TLS_VERSION_13,
        });
        encoder.encode(&Extension {
            id: extensions::KEY_SHARE,
            value: hello.key_share,
        });
    }
}

#[derive(Debug)]
pub struct EncryptedExtensions<'a> {
    pub groups: &'a [u16],
    pub signature_algorithms: &'a [u16],
    /// pre-encoded transport parameter extension payload
    pub transport_parameters: &'a [u8],
}

impl EncoderValue for EncryptedExtensions<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let extensions = EncryptedExtensionList(self);
        encoder.encode_with_len_prefix::<u16, _>(&extensions);
    }
}

struct EncryptedExtensionList<'a>(&'a EncryptedExtensions<'a>);

impl EncoderValue for EncryptedExtensionList<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let body = self.0;
        encoder.encode(&Extension {
            id: extensions::SUPPORTED_GROUPS,
            value: U16List(body.groups),
        });
        encoder.encode(&Extension {
            id: extensions::SIGNATURE_ALGORITHMS,
            value: U16List(body.signature_algorithms),
        });
        encoder.encode(&Extension {
            id: extensions::SERVER_CERTIFICATE_TYPE,
            value: CERT_TYPE_X509,
        });
        encoder.encode(&Extension {
            id: extensions::TRANSPORT_PARAMETERS,
            value: body.transport_parameters,
        });
    }
}

#[derive(Debug)]
pub struct Certificate<'a> {
    /// DER certificates, leaf first
    pub entries: &'a [&'a [u8]],
}

impl EncoderValue for Certificate<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        // certificate_request_context is empty outside client auth
        encoder.encode(&0u8);

        let list = CertificateList(self.entries);
        let len = list.encoding_size_for_encoder(encoder);
        debug_assert!(len < 1 << 24, "certificate list exceeds u24 length");
        encoder.encode(&u24::new_truncated(len as u32));
        encoder.encode(&list);
    }
}

struct CertificateList<'a>(&'a [&'a [u8]]);

impl EncoderValue for CertificateList<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        for cert in self.0 {
            debug_assert!(cert.len() < 1 << 24, "certificate exceeds u24 length");
            encoder.encode(&u24::new_truncated(cert.len() as u32));
            encoder.write_slice(cert);
            // no per-entry extensions
            encoder.encode(&0u16);
        }
    }
}

#[derive(Debug)]
pub struct CertificateVerify<'a> {
    pub algorithm: u16,
    pub signature: &'a [u8],
}

impl EncoderValue for CertificateVerify<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.algorithm);
        encoder.encode_with_len_prefix::<u16, _>(&self.signature);
    }
}

#[derive(Debug)]
pub struct Finished<'a> {
    pub verify_data: &'a [u8],
}

impl EncoderValue for Finished<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.write_slice(self.verify_data);
    }
}
