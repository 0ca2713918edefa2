// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! TLS 1.3 handshake record codec, profiled for the QUIC handshake.
//!
//! Records are `{type:u8, length:u24, body}`. Only the six message types the
//! QUIC handshake uses are representable; everything else fails to decode.

use core::convert::TryFrom;
use s2n_codec::{
    decoder_invariant, decoder_value, u24, DecoderBuffer, DecoderBufferResult, DecoderError,
};

pub mod build;
pub mod extensions;

pub use extensions::Extensions;

/// legacy_version on hello messages
pub const TLS_LEGACY_VERSION: u16 = 0x0303;
/// The only real protocol version, carried in supported_versions
pub const TLS_VERSION_13: u16 = 0x0304;
/// TLS_AES_128_GCM_SHA256
pub const CIPHER_AES_128_GCM_SHA256: u16 = 0x1301;
/// secp256r1
pub const GROUP_SECP256R1: u16 = 0x0017;
/// ecdsa_secp256r1_sha256
pub const SIG_ECDSA_SECP256R1_SHA256: u16 = 0x0403;
/// X.509, the only certificate type
pub const CERT_TYPE_X509: u8 = 0;

macro_rules! handshake_type {
    ($($variant:ident($value:literal)),* $(,)?) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum HandshakeType {
            $($variant = $value),*
        }

        impl TryFrom<u8> for HandshakeType {
            type Error = ();

            #[inline]
            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)*
                    _ => Err(()),
                }
            }
        }
    };
}

//= https://www.rfc-editor.org/rfc/rfc8446#appendix-B.3
//# enum {
//#     client_hello(1), server_hello(2), ..., encrypted_extensions(8),
//#     certificate(11), certificate_verify(15), finished(20), ...
//# } HandshakeType;
handshake_type!(
    ClientHello(1),
    ServerHello(2),
    EncryptedExtensions(8),
    Certificate(11),
    CertificateVerify(15),
    Finished(20),
);

/// The `{type, length}` prefix of a handshake record
#[derive(Clone, Copy, Debug)]
pub struct HandshakeHeader {
    msg_type: u8,
    length: u24,
}

impl HandshakeHeader {
    #[inline]
    pub fn msg_type(self) -> Option<HandshakeType> {
        HandshakeType::try_from(self.msg_type).ok()
    }

    #[inline]
    pub fn len(self) -> usize {
        let length: u32 = self.length.into();
        length as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

decoder_value!(
    impl<'a> HandshakeHeader {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (msg_type, buffer) = buffer.decode::<u8>()?;
            let (length, buffer) = buffer.decode::<u24>()?;
            Ok((HandshakeHeader { msg_type, length }, buffer))
        }
    }
);

/// A parsed handshake record
#[derive(Debug)]
pub enum HandshakeRecord<'a> {
    ClientHello(ClientHello<'a>),
    ServerHello(ServerHello<'a>),
    EncryptedExtensions(EncryptedExtensions<'a>),
    Certificate(Certificate<'a>),
    CertificateVerify(CertificateVerify<'a>),
    Finished(Finished<'a>),
}

impl<'a> HandshakeRecord<'a> {
    #[inline]
    pub fn msg_type(&self) -> HandshakeType {
        match self {
            Self::ClientHello(_) => HandshakeType::ClientHello,
            Self::ServerHello(_) => HandshakeType::ServerHello,
            Self::EncryptedExtensions(_) => HandshakeType::EncryptedExtensions,
            Self::Certificate(_) => HandshakeType::Certificate,
            Self::CertificateVerify(_) => HandshakeType::CertificateVerify,
            Self::Finished(_) => HandshakeType::Finished,
        }
    }

    /// Decodes one record, returning it and the unconsumed rest of the
    /// buffer
    pub fn decode(buffer: DecoderBuffer<'a>) -> DecoderBufferResult<'a, Self> {
        let (header, buffer) = buffer.decode::<HandshakeHeader>()?;
        let (body, buffer) = buffer.decode_slice(header.len())?;

        let msg_type = header
            .msg_type()
            .ok_or(DecoderError::InvariantViolation("unknown handshake message"))?;

        let record = match msg_type {
            HandshakeType::ClientHello => Self::ClientHello(ClientHello::parse(body)?),
            HandshakeType::ServerHello => Self::ServerHello(ServerHello::parse(body)?),
            HandshakeType::EncryptedExtensions => {
                Self::EncryptedExtensions(EncryptedExtensions::parse(body)?)
            }
            HandshakeType::Certificate => Self::Certificate(Certificate::parse(body)?),
            HandshakeType::CertificateVerify => {
                Self::CertificateVerify(CertificateVerify::parse(body)?)
            }
            HandshakeType::Finished => Self::Finished(Finished::parse(body)?),
        };

        Ok((record, buffer))
    }
}

//= https://www.rfc-editor.org/rfc/rfc8446#section-4.1.2
//# struct {
//#     ProtocolVersion legacy_version = 0x0303;
//#     Random random;
//#     opaque legacy_session_id<0..32>;
//#     CipherSuite cipher_suites<2..2^16-2>;
//#     opaque legacy_compression_methods<1..2^8-1>;
//#     Extension extensions<8..2^16-1>;
//# } ClientHello;
#[derive(Debug)]
pub struct ClientHello<'a> {
    pub legacy_version: u16,
    pub random: &'a [u8],
    pub cipher_suites: Vec<u16>,
    pub extensions: Extensions<'a>,
}

impl<'a> ClientHello<'a> {
    fn parse(buffer: DecoderBuffer<'a>) -> Result<Self, DecoderError> {
        let (legacy_version, buffer) = buffer.decode::<u16>()?;
        let (random, buffer) = buffer.decode_slice(32)?;
        let (session_id, buffer) = buffer.decode_slice_with_len_prefix::<u8>()?;
        decoder_invariant!(session_id.len() <= 32, "legacy_session_id too long");
        let (suites, buffer) = buffer.decode_slice_with_len_prefix::<u16>()?;
        let cipher_suites = extensions::u16_items(suites)?;
        decoder_invariant!(!cipher_suites.is_empty(), "empty cipher_suites");
        let (compression, buffer) = buffer.decode_slice_with_len_prefix::<u8>()?;
        decoder_invariant!(!compression.is_empty(), "empty compression methods");
        let (block, buffer) = buffer.decode_slice_with_len_prefix::<u16>()?;
        let extensions = Extensions::parse(HandshakeType::ClientHello, block)?;
        buffer.ensure_empty()?;

        Ok(Self {
            legacy_version,
            random: random.into_less_safe_slice(),
            cipher_suites,
            extensions,
        })
    }
}

//= https://www.rfc-editor.org/rfc/rfc8446#section-4.1.3
//# struct {
//#     ProtocolVersion legacy_version = 0x0303;
//#     Random random;
//#     opaque legacy_session_id_echo<0..32>;
//#     CipherSuite cipher_suite;
//#     uint8 legacy_compression_method = 0;
//#     Extension extensions<6..2^16-1>;
//# } ServerHello;
#[derive(Debug)]
pub struct ServerHello<'a> {
    pub legacy_version: u16,
    pub random: &'a [u8],
    pub cipher_suite: u16,
    pub extensions: Extensions<'a>,
}

impl<'a> ServerHello<'a> {
    fn parse(buffer: DecoderBuffer<'a>) -> Result<Self, DecoderError> {
        let (legacy_version, buffer) = buffer.decode::<u16>()?;
        let (random, buffer) = buffer.decode_slice(32)?;
        let (session_id, buffer) = buffer.decode_slice_with_len_prefix::<u8>()?;
        decoder_invariant!(session_id.len() <= 32, "legacy_session_id too long");
        let (cipher_suite, buffer) = buffer.decode::<u16>()?;
        let (_compression, buffer) = buffer.decode::<u8>()?;
        let (block, buffer) = buffer.decode_slice_with_len_prefix::<u16>()?;
        let extensions = Extensions::parse(HandshakeType::ServerHello, block)?;
        buffer.ensure_empty()?;

        Ok(Self {
            legacy_version,
            random: random.into_less_safe_slice(),
            cipher_suite,
            extensions,
        })
    }
}

#[derive(Debug)]
pub struct EncryptedExtensions<'a> {
    pub extensions: Extensions<'a>,
}

impl<'a> EncryptedExtensions<'a> {
    fn parse(buffer: DecoderBuffer<'a>) -> Result<Self, DecoderError> {
        let (block, buffer) = buffer.decode_slice_with_len_prefix::<u16>()?;
        let extensions = Extensions::parse(HandshakeType::EncryptedExtensions, block)?;
        buffer.ensure_empty()?;

        Ok(Self { extensions })
    }
}

//= https://www.rfc-editor.org/rfc/rfc8446#section-4.4.2
//# struct {
//#     opaque cert_data<1..2^24-1>;
//#     Extension extensions<0..2^16-1>;
//# } CertificateEntry;
//#
//# struct {
//#     opaque certificate_request_context<0..2^8-1>;
//#     CertificateEntry certificate_list<0..2^24-1>;
//# } Certificate;
#[derive(Debug)]
pub struct Certificate<'a> {
    /// DER certificates, leaf first
    pub entries: Vec<&'a [u8]>,
}

impl<'a> Certificate<'a> {
    fn parse(buffer: DecoderBuffer<'a>) -> Result<Self, DecoderError> {
        let (_context, buffer) = buffer.decode_slice_with_len_prefix::<u8>()?;
        let (list_len, buffer) = buffer.decode::<u24>()?;
        let (mut list, buffer) = buffer.decode_slice(*list_len as usize)?;
        buffer.ensure_empty()?;

        let mut entries = Vec::new();
        while !list.is_empty() {
            let (cert_len, rest) = list.decode::<u24>()?;
            let (cert_data, rest) = rest.decode_slice(*cert_len as usize)?;
            decoder_invariant!(!cert_data.is_empty(), "empty certificate entry");
            let rest = rest.skip_with_len_prefix::<u16>()?;
            entries.push(cert_data.into_less_safe_slice());
            list = rest;
        }
        decoder_invariant!(!entries.is_empty(), "empty certificate list");

        Ok(Self { entries })
    }
}

//= https://www.rfc-editor.org/rfc/rfc8446#section-4.4.3
//# struct {
//#     SignatureScheme algorithm;
//#     opaque signature<0..2^16-1>;
//# } CertificateVerify;
#[derive(Debug)]
pub struct CertificateVerify<'a> {
    pub algorithm: u16,
    pub signature: &'a [u8],
}

impl<'a> CertificateVerify<'a> {
    fn parse(buffer: DecoderBuffer<'a>) -> Result<Self, DecoderError> {
        let (algorithm, buffer) = buffer.decode::<u16>()?;
        let (signature, buffer) = buffer.decode_slice_with_len_prefix::<u16>()?;
        buffer.ensure_empty()?;
        decoder_invariant!(!signature.is_empty(), "empty signature");

        Ok(Self {
            algorithm,
            signature: signature.into_less_safe_slice(),
        })
    }
}

#[derive(Debug)]
pub struct Finished<'a> {
    pub verify_data: &'a [u8],
}

impl<'a> Finished<'a> {
    fn parse(buffer: DecoderBuffer<'a>) -> Result<Self, DecoderError> {
        decoder_invariant!(!buffer.is_empty(), "empty verify_data");
        Ok(Self {
            verify_data: buffer.into_less_safe_slice(),
        })
    }
}
