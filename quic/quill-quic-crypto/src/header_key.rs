// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Packet-number protection.
//!
//! The on-the-wire packet number is masked with an AES-128-CTR keystream.
//! The cipher is keyed by the level's packet-number secret; the counter
//! block is a 16-byte sample of the sealed payload, so the mask changes
//! with every packet without extra state.

use crate::{error::Error, kdf};
use aws_lc_rs::{cipher, iv::FixedLength};
use core::fmt;

/// Bytes of sealed payload consumed as the keystream seed
pub const SAMPLE_LEN: usize = 16;

pub struct PnKey {
    key: cipher::EncryptingKey,
}

impl PnKey {
    /// Builds the mask cipher from the first 16 bytes of the level's
    /// packet-number secret
    pub fn derive(pn_secret: &kdf::Secret) -> Result<Self, Error> {
        let key = cipher::UnboundCipherKey::new(&cipher::AES_128, &pn_secret.as_ref()[..16])
            .map_err(|_| Error::InternalError)?;
        let key = cipher::EncryptingKey::ctr(key).map_err(|_| Error::InternalError)?;

        Ok(Self { key })
    }

    /// XORs the keystream seeded by `sample` into `pn_bytes`.
    ///
    /// CTR encryption is an XOR stream, so the same call both applies and
    /// removes the mask.
    #[inline]
    pub fn mask(&self, sample: &[u8; SAMPLE_LEN], pn_bytes: &mut [u8]) -> Result<(), Error> {
        debug_assert!(pn_bytes.len() <= 4);
        let context = cipher::EncryptionContext::Iv128(FixedLength::from(*sample));
        self.key
            .less_safe_encrypt(pn_bytes, context)
            .map(|_| ())
            .map_err(|_| Error::InternalError)
    }
}

impl fmt::Debug for PnKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PnKey").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_is_involutive_test() {
        let key = PnKey::derive(&kdf::Secret::new([0x17; 32])).unwrap();
        let sample = [0xab; SAMPLE_LEN];

        let original = [0xc0u8, 0x01, 0x02, 0x03];
        let mut masked = original;
        key.mask(&sample, &mut masked).unwrap();
        assert_ne!(masked, original);

        key.mask(&sample, &mut masked).unwrap();
        assert_eq!(masked, original);
    }

    #[test]
    fn mask_depends_on_sample_test() {
        let key = PnKey::derive(&kdf::Secret::new([0x17; 32])).unwrap();

        let mut first = [0u8; 4];
        let mut second = [0u8; 4];
        key.mask(&[0x01; SAMPLE_LEN], &mut first).unwrap();
        key.mask(&[0x02; SAMPLE_LEN], &mut second).unwrap();

        assert_ne!(first, second);
    }
}
