// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{error::Error, kdf, label};
use s2n_codec::{Encoder, EncoderBuffer};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use aws_lc_rs::aead::NONCE_LEN;

/// The per-direction nonce mask
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Iv([u8; NONCE_LEN]);

impl Iv {
    #[inline]
    pub fn derive(secret: &kdf::Secret) -> Result<Self, Error> {
        let mut bytes = [0u8; NONCE_LEN];
        kdf::expand_label(secret, label::QUIC_IV, &[], &mut bytes)?;
        Ok(Self(bytes))
    }

    /// XORs the left-padded packet number into the mask
    #[inline]
    pub fn nonce(&self, packet_number: u64) -> [u8; NONCE_LEN] {
        let mut nonce = [0; NONCE_LEN];
        let mut encoder = EncoderBuffer::new(&mut nonce);

        encoder.encode(&0u32);
        encoder.encode(&packet_number);

        for (a, b) in nonce.iter_mut().zip(self.0.iter()) {
            *a ^= b;
        }

        nonce
    }
}
