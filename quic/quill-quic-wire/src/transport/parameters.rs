// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! QUIC transport parameters, carried in the 0xffa5 TLS extension.
//!
//! Each parameter is `{id:u16, len:u16, value}`. Integer values are encoded
//! as varints; `disable_migration` has no value; `stateless_reset_token` is
//! a fixed 16 bytes. Parameters absent from the wire take their defaults.

use crate::varint::VarInt;
use s2n_codec::{decoder_invariant, decoder_value, DecoderBuffer, DecoderError, Encoder, EncoderValue};

pub mod id {
    pub const INITIAL_MAX_STREAM_DATA: u16 = 0;
    pub const INITIAL_MAX_DATA: u16 = 1;
    pub const INITIAL_MAX_BIDI_STREAMS: u16 = 2;
    pub const IDLE_TIMEOUT: u16 = 3;
    pub const PREFERRED_ADDRESS: u16 = 4;
    pub const MAX_PACKET_SIZE: u16 = 5;
    pub const STATELESS_RESET_TOKEN: u16 = 6;
    pub const ACK_DELAY_EXPONENT: u16 = 7;
    pub const INITIAL_MAX_UNI_STREAMS: u16 = 8;
    pub const DISABLE_MIGRATION: u16 = 9;
}

/// The smallest maximum packet size an endpoint may advertise
pub const MIN_MAX_PACKET_SIZE: u64 = 1200;
/// ack_delay_exponent values above 20 are invalid
pub const MAX_ACK_DELAY_EXPONENT: u8 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatelessResetToken(pub [u8; 16]);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreferredAddress {
    pub ip_version: u8,
    pub address: Vec<u8>,
    pub port: u16,
    pub connection_id: Vec<u8>,
    pub stateless_reset_token: StatelessResetToken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportParameters {
    pub initial_max_stream_data: VarInt,
    pub initial_max_data: VarInt,
    pub initial_max_bidi_streams: VarInt,
    pub idle_timeout: VarInt,
    pub preferred_address: Option<PreferredAddress>,
    pub max_packet_size: VarInt,
    pub stateless_reset_token: Option<StatelessResetToken>,
    pub ack_delay_exponent: u8,
    pub initial_max_uni_streams: VarInt,
    pub disable_migration: bool,
    /// Local pacing knob; has no wire identifier and is never encoded
    pub max_ack_delay: VarInt,
}

impl Default for TransportParameters {
    fn default() -> Self {
        Self {
            initial_max_stream_data: VarInt::from_u16(5000),
            initial_max_data: VarInt::from_u16(5000),
            initial_max_bidi_streams: VarInt::from_u8(1),
            idle_timeout: VarInt::ZERO,
            preferred_address: None,
            max_packet_size: VarInt::from_u16(1200),
            stateless_reset_token: None,
            ack_delay_exponent: 3,
            initial_max_uni_streams: VarInt::from_u8(1),
            disable_migration: false,
            max_ack_delay: VarInt::from_u8(25),
        }
    }
}

#[inline]
fn encode_parameter<E: Encoder, V: EncoderValue>(encoder: &mut E, id: u16, value: &V) {
    encoder.encode(&id);
    encoder.encode_with_len_prefix::<u16, _>(value);
}

impl EncoderValue for TransportParameters {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encode_parameter(
            encoder,
            id::INITIAL_MAX_STREAM_DATA,
            &self.initial_max_stream_data,
        );
        encode_parameter(encoder, id::INITIAL_MAX_DATA, &self.initial_max_data);
        encode_parameter(
            encoder,
            id::INITIAL_MAX_BIDI_STREAMS,
            &self.initial_max_bidi_streams,
        );
        encode_parameter(encoder, id::IDLE_TIMEOUT, &self.idle_timeout);
        if let Some(preferred_address) = &self.preferred_address {
            encode_parameter(encoder, id::PREFERRED_ADDRESS, preferred_address);
        }
        encode_parameter(encoder, id::MAX_PACKET_SIZE, &self.max_packet_size);
        if let Some(token) = &self.stateless_reset_token {
            encode_parameter(encoder, id::STATELESS_RESET_TOKEN, &&token.0[..]);
        }
        encode_parameter(encoder, id::ACK_DELAY_EXPONENT, &self.ack_delay_exponent);
        encode_parameter(
            encoder,
            id::INITIAL_MAX_UNI_STREAMS,
            &self.initial_max_uni_streams,
        );
        if self.disable_migration {
            encoder.encode(&id::DISABLE_MIGRATION);
            encoder.encode(&0u16);
        }
    }
}

impl EncoderValue for PreferredAddress {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.ip_version);
        encoder.encode_with_len_prefix::<u8, _>(&&self.address[..]);
        encoder.encode(&self.port);
        encoder.encode_with_len_prefix::<u8, _>(&&self.connection_id[..]);
        encoder.write_slice(&self.stateless_reset_token.0);
    }
}

impl TransportParameters {
    /// Decodes a parameter sequence, starting from the defaults
    pub fn decode_parameters(mut buffer: DecoderBuffer) -> Result<Self, DecoderError> {
        let mut parameters = Self::default();
        let mut seen = 0u16;

        while !buffer.is_empty() {
            let (param_id, rest) = buffer.decode::<u16>()?;
            let (payload, rest) = rest.decode_slice_with_len_prefix::<u16>()?;

            if param_id <= id::DISABLE_MIGRATION {
                let bit = 1u16 << param_id;
                decoder_invariant!(seen & bit == 0, "duplicate transport parameter");
                seen |= bit;
            }

            match param_id {
                id::INITIAL_MAX_STREAM_DATA => {
                    parameters.initial_max_stream_data = varint_value(payload)?;
                }
                id::INITIAL_MAX_DATA => {
                    parameters.initial_max_data = varint_value(payload)?;
                }
                id::INITIAL_MAX_BIDI_STREAMS => {
                    parameters.initial_max_bidi_streams = varint_value(payload)?;
                }
                id::IDLE_TIMEOUT => {
                    parameters.idle_timeout = varint_value(payload)?;
                }
                id::PREFERRED_ADDRESS => {
                    let (value, payload) = payload.decode::<PreferredAddress>()?;
                    payload.ensure_empty()?;
                    parameters.preferred_address = Some(value);
                }
                id::MAX_PACKET_SIZE => {
                    let value = varint_value(payload)?;
                    decoder_invariant!(
                        value >= MIN_MAX_PACKET_SIZE,
                        "max_packet_size below 1200"
                    );
                    parameters.max_packet_size = value;
                }
                id::STATELESS_RESET_TOKEN => {
                    decoder_invariant!(payload.len() == 16, "malformed stateless_reset_token");
                    let mut token = [0u8; 16];
                    token.copy_from_slice(payload.into_less_safe_slice());
                    parameters.stateless_reset_token = Some(StatelessResetToken(token));
                }
                id::ACK_DELAY_EXPONENT => {
                    let (value, payload) = payload.decode::<u8>()?;
                    payload.ensure_empty()?;
                    decoder_invariant!(
                        value <= MAX_ACK_DELAY_EXPONENT,
                        "ack_delay_exponent above 20"
                    );
                    parameters.ack_delay_exponent = value;
                }
                id::INITIAL_MAX_UNI_STREAMS => {
                    parameters.initial_max_uni_streams = varint_value(payload)?;
                }
                id::DISABLE_MIGRATION => {
                    decoder_invariant!(payload.is_empty(), "disable_migration carries no value");
                    parameters.disable_migration = true;
                }
                _ => {
                    // unknown parameters are tolerated and ignored
                }
            }

            buffer = rest;
        }

        Ok(parameters)
    }
}

fn varint_value(payload: DecoderBuffer) -> Result<VarInt, DecoderError> {
    let (value, payload) = payload.decode::<VarInt>()?;
    payload.ensure_empty()?;
    Ok(value)
}

decoder_value!(
    impl<'a> PreferredAddress {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (ip_version, buffer) = buffer.decode::<u8>()?;
            let (address, buffer) = buffer.decode_slice_with_len_prefix::<u8>()?;
            let address = match ip_version {
                4 => {
                    decoder_invariant!(address.len() == 4, "malformed IPv4 address");
                    address
                }
                6 => {
                    decoder_invariant!(address.len() == 16, "malformed IPv6 address");
                    address
                }
                _ => return Err(DecoderError::InvariantViolation("invalid ip version")),
            };
            let (port, buffer) = buffer.decode::<u16>()?;
            let (connection_id, buffer) = buffer.decode_slice_with_len_prefix::<u8>()?;
            decoder_invariant!(connection_id.len() <= 18, "connection id too long");
            let (token, buffer) = buffer.decode_slice(16)?;
            let mut stateless_reset_token = [0u8; 16];
            stateless_reset_token.copy_from_slice(token.peek().into_less_safe_slice());

            Ok((
                PreferredAddress {
                    ip_version,
                    address: address.peek().into_less_safe_slice().to_vec(),
                    port,
                    connection_id: connection_id.peek().into_less_safe_slice().to_vec(),
                    stateless_reset_token: StatelessResetToken(stateless_reset_token),
                },
                buffer,
            ))
        }
    }
);

/// The 0xffa5 payload inside a ClientHello:
/// `initial_version:u32 || params_len:u16 || params`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientTransportParameters {
    pub initial_version: u32,
    pub parameters: TransportParameters,
}

impl EncoderValue for ClientTransportParameters {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.initial_version);
        encoder.encode_with_len_prefix::<u16, _>(&self.parameters);
    }
}

impl ClientTransportParameters {
    pub fn decode(buffer: DecoderBuffer) -> Result<Self, DecoderError> {
        let (initial_version, buffer) = buffer.decode::<u32>()?;
        let (params, buffer) = buffer.decode_slice_with_len_prefix::<u16>()?;
        buffer.ensure_empty()?;
        let parameters = TransportParameters::decode_parameters(params)?;

        Ok(Self {
            initial_version,
            parameters,
        })
    }
}

/// The 0xffa5 payload inside EncryptedExtensions:
/// `negotiated_version:u32 || other_versions_len:u8 || other_versions ||
/// params_len:u16 || params`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerTransportParameters {
    pub negotiated_version: u32,
    pub other_versions: Vec<u32>,
    pub parameters: TransportParameters,
}

impl EncoderValue for ServerTransportParameters {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.negotiated_version);
        debug_assert!(self.other_versions.len() * 4 < 256);
        encoder.encode(&((self.other_versions.len() * 4) as u8));
        for version in &self.other_versions {
            encoder.encode(version);
        }
        encoder.encode_with_len_prefix::<u16, _>(&self.parameters);
    }
}

impl ServerTransportParameters {
    pub fn decode(buffer: DecoderBuffer) -> Result<Self, DecoderError> {
        let (negotiated_version, buffer) = buffer.decode::<u32>()?;
        let (mut versions, buffer) = buffer.decode_slice_with_len_prefix::<u8>()?;
        decoder_invariant!(versions.len() % 4 == 0, "malformed version list");
        let mut other_versions = Vec::with_capacity(versions.len() / 4);
        while !versions.is_empty() {
            let (version, rest) = versions.decode::<u32>()?;
            other_versions.push(version);
            versions = rest;
        }
        let (params, buffer) = buffer.decode_slice_with_len_prefix::<u16>()?;
        buffer.ensure_empty()?;
        let parameters = TransportParameters::decode_parameters(params)?;

        Ok(Self {
            negotiated_version,
            other_versions,
            parameters,
        })
    }
}
