// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Wire-format framing for the quill QUIC crypto core.
//!
//! This crate owns every bit-packing concern of the handshake path: QUIC
//! variable-length integers, the draft-style packet number encodings, the
//! CRYPTO frame, the TLS 1.3 handshake record codec, and the QUIC transport
//! parameter extension. It performs no cryptography; the crypto crate
//! consumes it.

pub mod frame;
pub mod number;
pub mod tls;
pub mod transport;
pub mod varint;

pub use s2n_codec::{DecoderBuffer, DecoderBufferMut, DecoderError, EncoderBuffer};
