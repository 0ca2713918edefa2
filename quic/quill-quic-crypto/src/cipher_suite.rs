// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The single negotiable cipher suite: TLS_AES_128_GCM_SHA256.

use crate::{error::Error, iv::Iv, kdf, label};
use aws_lc_rs::aead;
use core::fmt;
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

//= https://www.rfc-editor.org/rfc/rfc9001#section-6.6
//# For AEAD_AES_128_GCM and AEAD_AES_256_GCM, the confidentiality limit
//# is 2^23 encrypted packets; see Appendix B.1.
pub const CONFIDENTIALITY_LIMIT: u64 = u64::pow(2, 23);
pub const INTEGRITY_LIMIT: u64 = u64::pow(2, 52);

/// One direction's AEAD state: the traffic key and the nonce mask
// ignore casing warnings in order to preserve the IANA name
#[allow(non_camel_case_types)]
pub struct TLS_AES_128_GCM_SHA256 {
    key: aead::LessSafeKey,
    iv: Iv,
}

impl TLS_AES_128_GCM_SHA256 {
    pub fn new(secret: &kdf::Secret) -> Result<Self, Error> {
        let iv = Iv::derive(secret)?;
        let key = {
            let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
            kdf::expand_label(secret, label::QUIC_KEY, &[], bytes.as_mut())?;
            let key = aead::UnboundKey::new(&aead::AES_128_GCM, bytes.as_ref())
                .map_err(|_| Error::InternalError)?;
            aead::LessSafeKey::new(key)
        };

        Ok(Self { key, iv })
    }

    /// Encrypts `payload` in place and returns the authentication tag
    #[inline]
    pub fn seal(
        &self,
        packet_number: u64,
        aad: &[u8],
        payload: &mut [u8],
    ) -> Result<[u8; TAG_LEN], Error> {
        let nonce = aead::Nonce::assume_unique_for_key(self.iv.nonce(packet_number));
        let tag = self
            .key
            .seal_in_place_separate_tag(nonce, aead::Aad::from(aad), payload)
            .map_err(|_| Error::InternalError)?;

        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(tag.as_ref());
        Ok(out)
    }

    /// Decrypts `payload` (ciphertext followed by the tag) in place,
    /// returning the plaintext length
    #[inline]
    pub fn open(
        &self,
        packet_number: u64,
        aad: &[u8],
        payload: &mut [u8],
    ) -> Result<usize, Error> {
        let nonce = aead::Nonce::assume_unique_for_key(self.iv.nonce(packet_number));
        let plaintext = self
            .key
            .open_in_place(nonce, aead::Aad::from(aad), payload)
            .map_err(|_| Error::DecryptError)?;

        Ok(plaintext.len())
    }

    #[inline]
    pub fn tag_len(&self) -> usize {
        TAG_LEN
    }

    #[inline]
    pub fn aead_confidentiality_limit(&self) -> u64 {
        CONFIDENTIALITY_LIMIT
    }

    #[inline]
    pub fn aead_integrity_limit(&self) -> u64 {
        INTEGRITY_LIMIT
    }
}

impl fmt::Debug for TLS_AES_128_GCM_SHA256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TLS_AES_128_GCM_SHA256").finish()
    }
}
