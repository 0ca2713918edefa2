// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::kdf::{self, Secret};
use aws_lc_rs::hmac;
use hex_literal::hex;

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.2
//# initial_salt = 0x38762cf7f55934b34d179ae6a4c80cadccbb7f0a

pub const INITIAL_SALT: [u8; 20] = hex!("38762cf7f55934b34d179ae6a4c80cadccbb7f0a");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# These packets use an 8-byte client-chosen Destination Connection ID
//# of 0x8394c8f03e515708.

pub const EXAMPLE_DCID: [u8; 8] = hex!("8394c8f03e515708");

lazy_static::lazy_static! {
    /// Compute the extraction key once, as the salt is constant
    static ref INITIAL_EXTRACT_KEY: hmac::Key = hmac::Key::new(hmac::HMAC_SHA256, &INITIAL_SALT);
}

/// `initial_secret = HKDF-Extract(initial_salt, client_dst_connection_id)`
#[inline]
pub fn initial_secret(connection_id: &[u8]) -> Secret {
    let prk = hmac::sign(&INITIAL_EXTRACT_KEY, connection_id);
    Secret::from_slice(prk.as_ref())
}
