// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Record-level handshake checks: hello negotiation and the Finished MAC.
//!
//! The role/level/record state machine itself lives in
//! [`crate::session::Session::validate_record`]; this module holds the
//! per-record rules it applies.

use crate::{
    error::Error,
    kdf::{self, Secret},
    label,
};
use aws_lc_rs::{constant_time, hmac};
use quill_quic_wire::tls::{
    self, ClientHello, ServerHello, CIPHER_AES_128_GCM_SHA256, GROUP_SECP256R1,
    SIG_ECDSA_SECP256R1_SHA256, TLS_LEGACY_VERSION, TLS_VERSION_13,
};

/// The choices a completed negotiation pins down, each set exactly once
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Negotiated {
    pub tls_version: u16,
    pub cipher: u16,
    pub signature_alg: u16,
    pub group: u16,
}

/// Applies the server's ClientHello checks and picks the first supported
/// choice of each kind. Returns the negotiation and the client's key share.
pub fn negotiate_client_hello<'a>(
    hello: &'a ClientHello<'a>,
) -> Result<(Negotiated, &'a [u8]), Error> {
    if hello.legacy_version != TLS_LEGACY_VERSION {
        return Err(Error::TlsVersion);
    }
    if !hello
        .extensions
        .supported_versions
        .contains(&TLS_VERSION_13)
    {
        return Err(Error::TlsVersion);
    }

    let cipher = *hello
        .cipher_suites
        .iter()
        .find(|&&suite| suite == CIPHER_AES_128_GCM_SHA256)
        .ok_or(Error::NoCipher)?;

    let signature_alg = *hello
        .extensions
        .signature_algorithms
        .iter()
        .find(|&&alg| alg == SIG_ECDSA_SECP256R1_SHA256)
        .ok_or(Error::NoSignatureAlg)?;

    let group = *hello
        .extensions
        .supported_groups
        .iter()
        .find(|&&group| group == GROUP_SECP256R1)
        .ok_or(Error::NoGroup)?;

    let key_share = hello
        .extensions
        .key_shares
        .iter()
        .find(|entry| entry.group == group)
        .ok_or(Error::KeyShare)?;

    Ok((
        Negotiated {
            tls_version: TLS_VERSION_13,
            cipher,
            signature_alg,
            group,
        },
        key_share.key_exchange,
    ))
}

/// Applies the client's ServerHello checks. Returns the negotiation (the
/// signature algorithm is confirmed later by EncryptedExtensions) and the
/// server's key share.
pub fn accept_server_hello<'a>(
    hello: &'a ServerHello<'a>,
) -> Result<(Negotiated, &'a [u8]), Error> {
    if hello.legacy_version != TLS_LEGACY_VERSION {
        return Err(Error::TlsVersion);
    }
    if hello.extensions.supported_versions != [TLS_VERSION_13] {
        return Err(Error::TlsVersion);
    }
    if hello.cipher_suite != CIPHER_AES_128_GCM_SHA256 {
        return Err(Error::NoCipher);
    }

    let key_share = match &hello.extensions.key_shares[..] {
        [entry] if entry.group == GROUP_SECP256R1 => entry,
        _ => return Err(Error::KeyShare),
    };

    Ok((
        Negotiated {
            tls_version: TLS_VERSION_13,
            cipher: hello.cipher_suite,
            signature_alg: SIG_ECDSA_SECP256R1_SHA256,
            group: GROUP_SECP256R1,
        },
        key_share.key_exchange,
    ))
}

/// Checks the algorithm echoes EncryptedExtensions may carry against the
/// negotiated choices
pub fn check_encrypted_extensions(
    extensions: &tls::Extensions,
    negotiated: &Negotiated,
) -> Result<(), Error> {
    if !extensions.signature_algorithms.is_empty()
        && !extensions
            .signature_algorithms
            .contains(&negotiated.signature_alg)
    {
        return Err(Error::NoSignatureAlg);
    }
    if !extensions.supported_groups.is_empty()
        && !extensions.supported_groups.contains(&negotiated.group)
    {
        return Err(Error::NoGroup);
    }
    Ok(())
}

/// `finished_key = HKDF-Expand-Label(traffic_secret, "finished", "", 32)`;
/// the MAC is `HMAC-SHA256(finished_key, transcript_hash)`
pub fn finished_mac(
    traffic_secret: &Secret,
    transcript_hash: &[u8],
) -> Result<[u8; kdf::SHA256_LEN], Error> {
    let finished_key = kdf::expand_secret(traffic_secret, label::FINISHED, &[])?;
    let key = hmac::Key::new(hmac::HMAC_SHA256, finished_key.as_ref());
    let tag = hmac::sign(&key, transcript_hash);

    let mut mac = [0u8; kdf::SHA256_LEN];
    mac.copy_from_slice(tag.as_ref());
    Ok(mac)
}

/// Compares a received Finished MAC in constant time
pub fn verify_finished(
    traffic_secret: &Secret,
    transcript_hash: &[u8],
    verify_data: &[u8],
) -> Result<(), Error> {
    let expected = finished_mac(traffic_secret, transcript_hash)?;
    constant_time::verify_slices_are_equal(&expected, verify_data).map_err(|_| Error::Finished)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_mac_round_trip_test() {
        let secret = Secret::new([0x21; 32]);
        let transcript_hash = [0x42u8; 32];

        let mac = finished_mac(&secret, &transcript_hash).unwrap();
        assert!(verify_finished(&secret, &transcript_hash, &mac).is_ok());
    }

    #[test]
    fn wrong_key_fails_test() {
        let secret = Secret::new([0x21; 32]);
        let wrong = Secret::new([0x22; 32]);
        let transcript_hash = [0x42u8; 32];

        let mac = finished_mac(&wrong, &transcript_hash).unwrap();
        assert_eq!(
            verify_finished(&secret, &transcript_hash, &mac),
            Err(Error::Finished)
        );
    }

    #[test]
    fn truncated_mac_fails_test() {
        let secret = Secret::new([0x21; 32]);
        let transcript_hash = [0x42u8; 32];

        let mac = finished_mac(&secret, &transcript_hash).unwrap();
        assert_eq!(
            verify_finished(&secret, &transcript_hash, &mac[..16]),
            Err(Error::Finished)
        );
    }
}
