// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use hex_literal::hex;

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# The labels generated during the execution of the HKDF-Expand-Label
//# function (that is, HkdfLabel.label) and part of the value given to
//# the HKDF-Expand function in order to produce its output are:
//#
//# client in:  00200f746c73313320636c69656e7420696e00

pub const CLIENT_IN: [u8; 19] = hex!("00200f746c73313320636c69656e7420696e00");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# server in:  00200f746c7331332073657276657220696e00

pub const SERVER_IN: [u8; 19] = hex!("00200f746c7331332073657276657220696e00");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# quic key:  00100e746c7331332071756963206b657900

pub const QUIC_KEY_16: [u8; 18] = hex!("00100e746c7331332071756963206b657900");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# quic iv:  000c0d746c733133207175696320697600

pub const QUIC_IV_12: [u8; 17] = hex!("000c0d746c733133207175696320697600");

/// The per-level packet-number protection secret
pub const QUIC_PN_32: [u8; 17] = hex!("00200d746c7331332071756963 20706e00");

/// Schedule labels; these take the transcript hash as context, so only the
/// label bytes are fixed
pub const CLIENT_HS_TRAFFIC: &[u8] = b"c hs traffic";
pub const SERVER_HS_TRAFFIC: &[u8] = b"s hs traffic";
pub const CLIENT_AP_TRAFFIC: &[u8] = b"c ap traffic";
pub const SERVER_AP_TRAFFIC: &[u8] = b"s ap traffic";
pub const DERIVED: &[u8] = b"derived";
pub const FINISHED: &[u8] = b"finished";
pub const QUIC_KEY: &[u8] = b"quic key";
pub const QUIC_IV: &[u8] = b"quic iv";
pub const QUIC_PN: &[u8] = b"quic pn";
pub const QUIC_0RTT: &[u8] = b"quic 0rtt";
pub const CLIENT_IN_LABEL: &[u8] = b"client in";
pub const SERVER_IN_LABEL: &[u8] = b"server in";

/// Computes the HkdfLabel prefix for an empty context, given the output len
pub fn compute_label<T: Extend<u8>>(len: usize, label: &[u8], out: &mut T) {
    const TLS_LABEL: &[u8] = b"tls13 ";
    let label_len = TLS_LABEL.len() + label.len();
    debug_assert!(label_len <= u8::MAX as usize, "label is too long");

    out.extend((len as u16).to_be_bytes().iter().cloned());
    out.extend(Some(label_len as u8));
    out.extend(TLS_LABEL.iter().cloned());
    out.extend(label.iter().cloned());
    out.extend(Some(0));
}
