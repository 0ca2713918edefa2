// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Certificate chain validation.
//!
//! The chain arrives leaf first. Every certificate must be signed by its
//! successor; the final certificate must be self-signed and verify under
//! its own key. A single self-signed certificate (the chain's root equals
//! the leaf) is accepted. There is no external trust store in this core;
//! anchoring the chain is the caller's policy.

use crate::error::Error;
use aws_lc_rs::signature;
use x509_parser::prelude::*;

/// Verifies the presented chain and returns the leaf's public key
/// (an uncompressed secp256r1 point) for CertificateVerify
pub fn verify_chain(entries: &[&[u8]]) -> Result<Vec<u8>, Error> {
    if entries.is_empty() {
        return Err(Error::Cert);
    }

    let mut certificates = Vec::with_capacity(entries.len());
    for der in entries {
        let (rest, certificate) = X509Certificate::from_der(der).map_err(|_| Error::Cert)?;
        if !rest.is_empty() {
            return Err(Error::Cert);
        }
        certificates.push(certificate);
    }

    for pair in certificates.windows(2) {
        verify_signed_by(&pair[0], &pair[1])?;
    }

    let root = certificates.last().expect("chain is non-empty");
    if root.subject().as_raw() != root.issuer().as_raw() {
        return Err(Error::Cert);
    }
    verify_signed_by(root, root)?;

    let leaf = &certificates[0];
    Ok(leaf.public_key().subject_public_key.data.to_vec())
}

fn verify_signed_by(
    certificate: &X509Certificate,
    issuer: &X509Certificate,
) -> Result<(), Error> {
    let public_key = &issuer.public_key().subject_public_key.data;
    let key = signature::UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, public_key);

    key.verify(
        certificate.tbs_certificate.as_ref(),
        &certificate.signature_value.data,
    )
    .map_err(|_| Error::Cert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn self_signed_chain_test() {
        let identity = testing::self_signed_identity();
        let entries: Vec<&[u8]> = identity.chain.iter().map(|cert| &cert[..]).collect();

        let public_key = verify_chain(&entries).unwrap();
        // an uncompressed P-256 point
        assert_eq!(public_key.len(), 65);
        assert_eq!(public_key[0], 0x04);
    }

    #[test]
    fn tampered_certificate_test() {
        let identity = testing::self_signed_identity();
        let mut cert = identity.chain[0].clone();
        let last = cert.len() - 1;
        cert[last] ^= 0x01;

        assert_eq!(verify_chain(&[&cert]), Err(Error::Cert));
    }

    #[test]
    fn garbage_certificate_test() {
        assert_eq!(verify_chain(&[&[0xde, 0xad, 0xbe, 0xef]]), Err(Error::Cert));
        assert_eq!(verify_chain(&[]), Err(Error::Cert));
    }

    #[test]
    fn unrelated_issuer_test() {
        let first = testing::self_signed_identity();
        let second = testing::self_signed_identity();

        // the leaf is not signed by the unrelated "issuer"
        let entries: Vec<&[u8]> = vec![&first.chain[0], &second.chain[0]];
        assert_eq!(verify_chain(&entries), Err(Error::Cert));
    }
}
