// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! HKDF-SHA256 primitives for the key schedule.
//!
//! Secrets are held as raw 32-byte values rather than opaque PRK handles so
//! that the schedule can chain extractions (`derived` feeding the next
//! extract), carry transcript-hash contexts, and zeroize retired material.

use crate::{error::Error, label};
use aws_lc_rs::{digest, hkdf, hmac};
use core::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const SHA256_LEN: usize = 32;

/// A 32-byte HKDF secret, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SHA256_LEN]);

impl Secret {
    #[inline]
    pub fn new(bytes: [u8; SHA256_LEN]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), SHA256_LEN);
        let mut secret = [0u8; SHA256_LEN];
        secret.copy_from_slice(bytes);
        Self(secret)
    }

    #[inline]
    pub fn as_prk(&self) -> hkdf::Prk {
        hkdf::Prk::new_less_safe(hkdf::HKDF_SHA256, &self.0)
    }
}

impl AsRef<[u8]> for Secret {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // never log key material
        f.debug_struct("Secret").finish()
    }
}

/// HKDF-Extract: `HMAC-SHA256(salt, ikm)`
#[inline]
pub fn extract(salt: &[u8], ikm: &[u8]) -> Secret {
    let salt = hmac::Key::new(hmac::HMAC_SHA256, salt);
    let prk = hmac::sign(&salt, ikm);
    Secret::from_slice(prk.as_ref())
}

/// HKDF-Expand-Label with the TLS 1.3 HkdfLabel info string.
///
/// An empty `context` is encoded as a zero-length vector.
pub fn expand_label(
    secret: &Secret,
    label: &[u8],
    context: &[u8],
    out: &mut [u8],
) -> Result<(), Error> {
    debug_assert!(context.len() <= u8::MAX as usize, "context is too long");

    let mut info = Vec::with_capacity(10 + label.len() + context.len());
    label::compute_label(out.len(), label, &mut info);
    // compute_label closes with the empty-context length byte; splice the
    // caller's context in when there is one
    if !context.is_empty() {
        *info.last_mut().expect("info is never empty") = context.len() as u8;
        info.extend_from_slice(context);
    }

    secret
        .as_prk()
        .expand(&[info.as_slice()], OutLen(out.len()))
        .map_err(|_| Error::InternalError)?
        .fill(out)
        .map_err(|_| Error::InternalError)
}

/// `expand_label` specialized to a 32-byte secret
#[inline]
pub fn expand_secret(secret: &Secret, label: &[u8], context: &[u8]) -> Result<Secret, Error> {
    let mut out = [0u8; SHA256_LEN];
    expand_label(secret, label, context, &mut out)?;
    Ok(Secret::new(out))
}

/// SHA-256 of `data`
#[inline]
pub fn sha256(data: &[u8]) -> [u8; SHA256_LEN] {
    let mut out = [0u8; SHA256_LEN];
    out.copy_from_slice(digest::digest(&digest::SHA256, data).as_ref());
    out
}

struct OutLen(usize);

impl hkdf::KeyType for OutLen {
    #[inline]
    fn len(&self) -> usize {
        self.0
    }
}
