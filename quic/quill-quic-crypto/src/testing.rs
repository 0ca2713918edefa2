// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Test helpers: a hermetic self-signed server identity.
//!
//! The builder emits just enough DER for a well-formed ECDSA-P256
//! certificate; it is not a general-purpose X.509 writer.

use crate::session::ServerIdentity;
use aws_lc_rs::{
    rand::SystemRandom,
    signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING},
};

const SEQUENCE: u8 = 0x30;
const SET: u8 = 0x31;
const INTEGER: u8 = 0x02;
const BIT_STRING: u8 = 0x03;
const UTF8_STRING: u8 = 0x0c;
const UTC_TIME: u8 = 0x17;
const CONTEXT_0: u8 = 0xa0;

// ecdsa-with-SHA256
const OID_ECDSA_SHA256: &[u8] = &[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];
// id-ecPublicKey
const OID_EC_PUBLIC_KEY: &[u8] = &[0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
// prime256v1
const OID_PRIME256V1: &[u8] = &[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
// commonName
const OID_COMMON_NAME: &[u8] = &[0x06, 0x03, 0x55, 0x04, 0x03];

fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 128 {
        out.push(len as u8);
    } else if len < 256 {
        out.push(0x81);
        out.push(len as u8);
    } else {
        debug_assert!(len < 1 << 16);
        out.push(0x82);
        out.push((len >> 8) as u8);
        out.push(len as u8);
    }
    out.extend_from_slice(content);
    out
}

fn der_concat(tag: u8, parts: &[&[u8]]) -> Vec<u8> {
    let content: Vec<u8> = parts.iter().flat_map(|part| part.iter().copied()).collect();
    der(tag, &content)
}

fn name(common_name: &str) -> Vec<u8> {
    let value = der(UTF8_STRING, common_name.as_bytes());
    let attribute = der_concat(SEQUENCE, &[OID_COMMON_NAME, &value]);
    let rdn = der(SET, &attribute);
    der(SEQUENCE, &rdn)
}

fn bit_string(data: &[u8]) -> Vec<u8> {
    let mut content = vec![0u8];
    content.extend_from_slice(data);
    der(BIT_STRING, &content)
}

/// Generates a fresh keypair and a matching self-signed certificate
pub fn self_signed_identity() -> ServerIdentity {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
        .expect("keypair generation");
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref())
        .expect("freshly generated key parses");

    let signature_algorithm = der(SEQUENCE, OID_ECDSA_SHA256);
    let subject = name("quill test endpoint");

    let tbs = {
        let version = der_concat(CONTEXT_0, &[&der(INTEGER, &[0x02])]);
        let serial = der(INTEGER, &[0x01]);
        let validity = der_concat(
            SEQUENCE,
            &[
                &der(UTC_TIME, b"700101000000Z"),
                &der(UTC_TIME, b"491231235959Z"),
            ],
        );
        let spki = {
            let algorithm = der_concat(SEQUENCE, &[OID_EC_PUBLIC_KEY, OID_PRIME256V1]);
            let point = bit_string(key_pair.public_key().as_ref());
            der_concat(SEQUENCE, &[&algorithm, &point])
        };

        der_concat(
            SEQUENCE,
            &[
                &version,
                &serial,
                &signature_algorithm,
                &subject,
                &validity,
                &subject,
                &spki,
            ],
        )
    };

    let signature = key_pair.sign(&rng, &tbs).expect("signing");
    let certificate = der_concat(
        SEQUENCE,
        &[&tbs, &signature_algorithm, &bit_string(signature.as_ref())],
    );

    ServerIdentity {
        chain: vec![certificate],
        signing_key: pkcs8.as_ref().to_vec(),
    }
}
