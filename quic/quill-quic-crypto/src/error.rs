// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::fmt;
use s2n_codec::DecoderError;

/// Fatal outcomes of the crypto core.
///
/// Non-fatal conditions (a repeated or reordered CRYPTO frame, an
/// intermediate handshake step) are reported through
/// [`crate::session::Outcome`], not here. The caller converts an `Error`
/// into a TLS alert carried in CONNECTION_CLOSE, except for
/// `DecryptError`, which QUIC requires to be swallowed by dropping the
/// packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The peer does not speak TLS 1.3
    TlsVersion,
    /// No mutually supported cipher suite
    NoCipher,
    /// No mutually supported signature algorithm
    NoSignatureAlg,
    /// No mutually supported key-exchange group
    NoGroup,
    /// The key_share extension is absent or malformed
    KeyShare,
    /// The certificate chain does not verify
    Cert,
    /// The CertificateVerify signature does not verify
    CertVerify,
    /// The Finished MAC does not verify
    Finished,
    /// Transport parameters are malformed or out of range
    InvalidParams,
    /// AEAD authentication failed; the packet is dropped silently
    DecryptError,
    /// A record or field failed to decode
    DecodeError,
    /// No keys are installed for the requested encryption level
    KeyUnavailable,
    /// A record arrived that the state machine does not permit
    ProtocolViolation,
    /// A failure in the underlying crypto provider
    InternalError,
}

//= https://www.rfc-editor.org/rfc/rfc8446#appendix-B.2
//# enum { ..., handshake_failure(40), bad_certificate(42),
//#     illegal_parameter(47), decode_error(50), decrypt_error(51),
//#     protocol_version(70), internal_error(80), unexpected_message(10),
//#     ... } AlertDescription;
impl Error {
    /// The TLS alert description the caller reports for this error
    pub const fn alert(self) -> u8 {
        match self {
            Self::TlsVersion => 70,
            Self::NoCipher | Self::NoSignatureAlg | Self::NoGroup => 40,
            Self::KeyShare | Self::InvalidParams => 47,
            Self::Cert => 42,
            Self::CertVerify | Self::Finished | Self::DecryptError => 51,
            Self::DecodeError => 50,
            Self::ProtocolViolation => 10,
            Self::KeyUnavailable | Self::InternalError => 80,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            Self::TlsVersion => "tls_version",
            Self::NoCipher => "no_cipher",
            Self::NoSignatureAlg => "no_signature_alg",
            Self::NoGroup => "no_group",
            Self::KeyShare => "key_share",
            Self::Cert => "cert",
            Self::CertVerify => "cert_verify",
            Self::Finished => "finished",
            Self::InvalidParams => "invalid_params",
            Self::DecryptError => "decrypt_error",
            Self::DecodeError => "decode_error",
            Self::KeyUnavailable => "key_unavailable",
            Self::ProtocolViolation => "protocol_violation",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl std::error::Error for Error {}

impl From<DecoderError> for Error {
    fn from(_: DecoderError) -> Self {
        Self::DecodeError
    }
}

impl From<aws_lc_rs::error::Unspecified> for Error {
    fn from(_: aws_lc_rs::error::Unspecified) -> Self {
        Self::InternalError
    }
}
