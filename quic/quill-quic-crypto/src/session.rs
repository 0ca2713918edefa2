// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection crypto session.
//!
//! A `Session` owns the key schedule, the handshake transcript, the
//! per-level CRYPTO stream offsets, and the negotiated parameters. The
//! connection layer drives it:
//!
//! - [`Session::encode_crypto_record`] emits the next outbound handshake
//!   record wrapped in a CRYPTO frame,
//! - [`Session::validate_record`] consumes one inbound CRYPTO frame,
//! - [`Session::advance_keys`] performs the level transition the handshake
//!   position implies,
//! - [`Session::seal_packet`] / [`Session::open_packet`] protect packet
//!   payloads with the keys of an encryption level.

use crate::{
    certificate,
    error::Error,
    event, handshake, kdf, packet,
    secrets::{KeySet, Level},
    stream::{CryptoStream, ReceiveOutcome},
};
use aws_lc_rs::{
    agreement,
    rand::{SecureRandom, SystemRandom},
    signature::{self, EcdsaKeyPair},
};
use quill_quic_wire::{
    frame::{Crypto, CryptoRef},
    tls::{
        self, build, HandshakeRecord, HandshakeType, CERT_TYPE_X509, CIPHER_AES_128_GCM_SHA256,
        GROUP_SECP256R1, SIG_ECDSA_SECP256R1_SHA256, TLS_VERSION_13,
    },
    transport::parameters::{
        ClientTransportParameters, ServerTransportParameters, TransportParameters,
    },
    varint::VarInt,
    DecoderBuffer,
};
use s2n_codec::EncoderValue;
use zeroize::Zeroizing;

/// The QUIC version this endpoint negotiates
pub const QUIC_VERSION: u32 = 0x0000_0001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Result of consuming one CRYPTO frame.
///
/// `Incomplete` covers both a mid-handshake record and a repeat delivery;
/// `OutOfOrder` asks the caller to buffer the frame and retry after earlier
/// bytes arrive. Fatal conditions surface as [`Error`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Valid,
    Incomplete,
    OutOfOrder,
}

/// Server certificate material
#[derive(Clone)]
pub struct ServerIdentity {
    /// DER certificates, leaf first
    pub chain: Vec<Vec<u8>>,
    /// PKCS#8 document holding the leaf's ECDSA-P256 signing key
    pub signing_key: Vec<u8>,
}

pub struct Config {
    /// The client's destination connection ID on the first initial packet
    pub cid_initial: Vec<u8>,
    /// Local transport parameters offered to the peer
    pub parameters: TransportParameters,
    pub quic_version: u32,
    /// ECDHE private key (DER); generated ephemerally when absent
    pub ecdh_private_key: Option<Vec<u8>>,
    /// Server-only certificate material
    pub identity: Option<ServerIdentity>,
}

impl Config {
    pub fn new(cid_initial: &[u8]) -> Self {
        Self {
            cid_initial: cid_initial.to_vec(),
            parameters: TransportParameters::default(),
            quic_version: QUIC_VERSION,
            ecdh_private_key: None,
            identity: None,
        }
    }
}

// one bit per record kind already emitted
const SENT_CLIENT_HELLO: u8 = 1 << 0;
const SENT_SERVER_HELLO: u8 = 1 << 1;
const SENT_ENCRYPTED_EXTENSIONS: u8 = 1 << 2;
const SENT_CERTIFICATE: u8 = 1 << 3;
const SENT_CERTIFICATE_VERIFY: u8 = 1 << 4;
const SENT_FINISHED: u8 = 1 << 5;

enum PendingTransition {
    Handshake,
    Protected,
}

pub struct Session {
    role: Role,
    keys: KeySet,
    streams: [CryptoStream; 3],
    transcript: Vec<u8>,
    /// transcript hash through ServerHello
    th_hello: Option<[u8; 32]>,
    /// transcript hash through the server Finished
    th_server_finished: Option<[u8; 32]>,
    pending: Option<PendingTransition>,
    negotiated: Option<handshake::Negotiated>,
    private_key: agreement::PrivateKey,
    public_key: Vec<u8>,
    peer_public_key: Option<Vec<u8>>,
    peer_certificate_key: Option<Vec<u8>>,
    identity: Option<(ServerIdentity, EcdsaKeyPair)>,
    parameters: TransportParameters,
    peer_parameters: Option<TransportParameters>,
    quic_version: u32,
    largest_pn: [Option<u64>; 4],
    sent: u8,
    rng: SystemRandom,
}

impl Session {
    /// Creates the session and installs initial (and 0-RTT) keys
    pub fn new(role: Role, config: Config) -> Result<Self, Error> {
        let keys = KeySet::new(&config.cid_initial)?;

        let private_key = match &config.ecdh_private_key {
            Some(der) => agreement::PrivateKey::from_private_key_der(&agreement::ECDH_P256, der)
                .map_err(|_| Error::InternalError)?,
            None => agreement::PrivateKey::generate(&agreement::ECDH_P256)
                .map_err(|_| Error::InternalError)?,
        };
        let public_key = private_key
            .compute_public_key()
            .map_err(|_| Error::InternalError)?
            .as_ref()
            .to_vec();

        let identity = match (role, config.identity) {
            (Role::Server, Some(identity)) => {
                let key_pair = EcdsaKeyPair::from_pkcs8(
                    &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
                    &identity.signing_key,
                )
                .map_err(|_| Error::InternalError)?;
                Some((identity, key_pair))
            }
            (Role::Client, Some(_)) => return Err(Error::InternalError),
            (_, None) => None,
        };

        Ok(Self {
            role,
            keys,
            streams: Default::default(),
            transcript: Vec::new(),
            th_hello: None,
            th_server_finished: None,
            pending: None,
            negotiated: None,
            private_key,
            public_key,
            peer_public_key: None,
            peer_certificate_key: None,
            identity,
            parameters: config.parameters,
            peer_parameters: None,
            quic_version: config.quic_version,
            largest_pn: [None; 4],
            sent: 0,
            rng: SystemRandom::new(),
        })
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn level(&self) -> Level {
        self.keys.level()
    }

    #[inline]
    pub fn negotiated(&self) -> Option<&handshake::Negotiated> {
        self.negotiated.as_ref()
    }

    #[inline]
    pub fn peer_parameters(&self) -> Option<&TransportParameters> {
        self.peer_parameters.as_ref()
    }

    #[inline]
    pub fn send_offset(&self, level: Level) -> u64 {
        self.streams[stream_index(level)].send_offset()
    }

    #[inline]
    pub fn recv_offset(&self, level: Level) -> u64 {
        self.streams[stream_index(level)].recv_offset()
    }

    /// Builds the named outbound record, appends it to the transcript, and
    /// returns it wrapped in a CRYPTO frame at the level's send offset
    pub fn encode_crypto_record(&mut self, msg_type: HandshakeType) -> Result<Vec<u8>, Error> {
        match (self.role, msg_type) {
            (Role::Client, HandshakeType::ClientHello) => self.encode_client_hello(),
            (Role::Server, HandshakeType::ServerHello) => self.encode_server_hello(),
            (Role::Server, HandshakeType::EncryptedExtensions) => {
                self.encode_encrypted_extensions()
            }
            (Role::Server, HandshakeType::Certificate) => self.encode_certificate(),
            (Role::Server, HandshakeType::CertificateVerify) => self.encode_certificate_verify(),
            (Role::Server, HandshakeType::Finished) => self.encode_server_finished(),
            (Role::Client, HandshakeType::Finished) => self.encode_client_finished(),
            _ => Err(Error::ProtocolViolation),
        }
    }

    /// Consumes one inbound CRYPTO frame at the current encryption level.
    ///
    /// A failed validation leaves the session untouched; an accepted record
    /// is appended to the transcript exactly once and consumes its bytes
    /// from the level's stream.
    pub fn validate_record(&mut self, frame: &CryptoRef) -> Result<Outcome, Error> {
        let level = self.keys.level();

        match self.streams[stream_index(level)].check_recv(frame.offset.as_u64()) {
            ReceiveOutcome::Repeat => return Ok(Outcome::Incomplete),
            ReceiveOutcome::Gap => return Ok(Outcome::OutOfOrder),
            ReceiveOutcome::Expected => {}
        }

        let (record, rest) = HandshakeRecord::decode(DecoderBuffer::new(frame.data))?;
        rest.ensure_empty().map_err(|_| Error::DecodeError)?;
        let msg_type = record.msg_type();

        let outcome = match (self.role, level, &record) {
            (Role::Server, Level::Initial, HandshakeRecord::ClientHello(hello)) => {
                self.validate_client_hello(hello)?
            }
            (Role::Client, Level::Initial, HandshakeRecord::ServerHello(hello)) => {
                self.validate_server_hello(hello)?
            }
            (Role::Client, Level::Handshake, HandshakeRecord::EncryptedExtensions(body)) => {
                self.validate_encrypted_extensions(body)?
            }
            (Role::Client, Level::Handshake, HandshakeRecord::Certificate(body)) => {
                self.validate_certificate(body)?
            }
            (Role::Client, Level::Handshake, HandshakeRecord::CertificateVerify(body)) => {
                self.validate_certificate_verify(body)?
            }
            (Role::Client, Level::Handshake, HandshakeRecord::Finished(body)) => {
                self.validate_server_finished(body)?
            }
            (Role::Server, Level::Protected, HandshakeRecord::Finished(body)) => {
                self.validate_client_finished(body)?
            }
            _ => return Err(Error::ProtocolViolation),
        };

        if self.role == Role::Server && msg_type == HandshakeType::Finished {
            // the handshake is complete; nothing reads the transcript or
            // the handshake traffic secrets again
            self.transcript.clear();
            self.keys.retire_handshake_secrets();
        } else {
            self.transcript.extend_from_slice(frame.data);
        }

        match (self.role, msg_type) {
            (Role::Client, HandshakeType::ServerHello) => {
                self.th_hello = Some(kdf::sha256(&self.transcript));
                self.pending = Some(PendingTransition::Handshake);
            }
            (Role::Client, HandshakeType::Finished) => {
                self.th_server_finished = Some(kdf::sha256(&self.transcript));
                self.pending = Some(PendingTransition::Protected);
            }
            _ => {}
        }

        self.streams[stream_index(level)].advance_recv(frame.data.len());
        event!(?level, ?outcome, "record accepted");

        Ok(outcome)
    }

    /// Performs the level transition implied by the handshake position
    pub fn advance_keys(&mut self) -> Result<(), Error> {
        match self.pending.take() {
            Some(PendingTransition::Handshake) => {
                let transcript_hash = self.th_hello.ok_or(Error::KeyUnavailable)?;
                let peer = self.peer_public_key.as_ref().ok_or(Error::KeyShare)?;
                let peer =
                    agreement::UnparsedPublicKey::new(&agreement::ECDH_P256, peer.as_slice());
                let dhe = agreement::agree(&self.private_key, &peer, Error::KeyShare, |shared| {
                    Ok(Zeroizing::new(shared.to_vec()))
                })?;

                self.keys.install_handshake(&dhe, &transcript_hash)?;
                event!(level = "handshake", "keys installed");
            }
            Some(PendingTransition::Protected) => {
                let transcript_hash = self.th_server_finished.ok_or(Error::KeyUnavailable)?;
                self.keys.install_protected(&transcript_hash)?;
                event!(level = "protected", "keys installed");
            }
            None => return Err(Error::ProtocolViolation),
        }

        Ok(())
    }

    /// Seals `plaintext` for transmission at `level`
    pub fn seal_packet(
        &self,
        level: Level,
        header: &[u8],
        packet_number: u64,
        largest_acked: Option<u64>,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let client = self.role == Role::Client;
        let (cipher, pn_key) = self.keys.seal_keys(client, level)?;
        packet::seal(
            cipher,
            pn_key,
            header,
            packet_number,
            largest_acked,
            plaintext,
        )
    }

    /// Opens a received datagram payload at `level`, returning the packet
    /// number and plaintext
    pub fn open_packet(
        &mut self,
        level: Level,
        header_len: usize,
        datagram: &[u8],
    ) -> Result<(u64, Vec<u8>), Error> {
        let client = self.role == Role::Client;
        let (cipher, pn_key) = self.keys.open_keys(client, level)?;

        let space = space_index(level);
        let (packet_number, plaintext) =
            packet::open(cipher, pn_key, self.largest_pn[space], header_len, datagram)?;

        let largest = &mut self.largest_pn[space];
        *largest = Some(largest.map_or(packet_number, |prev| prev.max(packet_number)));

        Ok((packet_number, plaintext))
    }

    // === outbound records ===

    fn mark_sent(&mut self, flag: u8) -> Result<(), Error> {
        if self.sent & flag != 0 {
            return Err(Error::ProtocolViolation);
        }
        self.sent |= flag;
        Ok(())
    }

    fn random(&self) -> Result<[u8; 32], Error> {
        let mut random = [0u8; 32];
        self.rng
            .fill(&mut random)
            .map_err(|_| Error::InternalError)?;
        Ok(random)
    }

    fn encode_client_hello(&mut self) -> Result<Vec<u8>, Error> {
        self.mark_sent(SENT_CLIENT_HELLO)?;
        let random = self.random()?;

        let parameters = ClientTransportParameters {
            initial_version: self.quic_version,
            parameters: self.parameters.clone(),
        }
        .encode_to_vec();

        let record = build::Message {
            msg_type: HandshakeType::ClientHello,
            body: build::ClientHello {
                random: &random,
                cipher_suites: &[CIPHER_AES_128_GCM_SHA256],
                supported_versions: &[TLS_VERSION_13],
                groups: &[GROUP_SECP256R1],
                signature_algorithms: &[SIG_ECDSA_SECP256R1_SHA256],
                certificate_types: &[CERT_TYPE_X509],
                key_share: build::KeyShare {
                    group: GROUP_SECP256R1,
                    key_exchange: &self.public_key,
                },
                transport_parameters: &parameters,
            },
        }
        .encode_to_vec();

        Ok(self.emit(Level::Initial, record))
    }

    fn encode_server_hello(&mut self) -> Result<Vec<u8>, Error> {
        let negotiated = self.negotiated.ok_or(Error::ProtocolViolation)?;
        self.mark_sent(SENT_SERVER_HELLO)?;
        let random = self.random()?;

        let record = build::Message {
            msg_type: HandshakeType::ServerHello,
            body: build::ServerHello {
                random: &random,
                cipher_suite: negotiated.cipher,
                key_share: build::KeyShare {
                    group: negotiated.group,
                    key_exchange: &self.public_key,
                },
            },
        }
        .encode_to_vec();

        let frame = self.emit(Level::Initial, record);
        self.th_hello = Some(kdf::sha256(&self.transcript));
        self.pending = Some(PendingTransition::Handshake);
        Ok(frame)
    }

    fn encode_encrypted_extensions(&mut self) -> Result<Vec<u8>, Error> {
        let negotiated = self.negotiated.ok_or(Error::ProtocolViolation)?;
        if self.keys.level() < Level::Handshake {
            return Err(Error::KeyUnavailable);
        }
        self.mark_sent(SENT_ENCRYPTED_EXTENSIONS)?;

        let parameters = ServerTransportParameters {
            negotiated_version: self.quic_version,
            other_versions: Vec::new(),
            parameters: self.parameters.clone(),
        }
        .encode_to_vec();

        let record = build::Message {
            msg_type: HandshakeType::EncryptedExtensions,
            body: build::EncryptedExtensions {
                groups: &[negotiated.group],
                signature_algorithms: &[negotiated.signature_alg],
                transport_parameters: &parameters,
            },
        }
        .encode_to_vec();

        Ok(self.emit(Level::Handshake, record))
    }

    fn encode_certificate(&mut self) -> Result<Vec<u8>, Error> {
        if self.keys.level() < Level::Handshake {
            return Err(Error::KeyUnavailable);
        }
        self.mark_sent(SENT_CERTIFICATE)?;
        let (identity, _) = self.identity.as_ref().ok_or(Error::Cert)?;
        let entries: Vec<&[u8]> = identity.chain.iter().map(|cert| &cert[..]).collect();

        let record = build::Message {
            msg_type: HandshakeType::Certificate,
            body: build::Certificate { entries: &entries },
        }
        .encode_to_vec();

        Ok(self.emit(Level::Handshake, record))
    }

    fn encode_certificate_verify(&mut self) -> Result<Vec<u8>, Error> {
        let negotiated = self.negotiated.ok_or(Error::ProtocolViolation)?;
        if self.keys.level() < Level::Handshake {
            return Err(Error::KeyUnavailable);
        }
        self.mark_sent(SENT_CERTIFICATE_VERIFY)?;

        // the signature covers the transcript hash at this point, before
        // the CertificateVerify record itself
        let digest = kdf::sha256(&self.transcript);
        let signature = {
            let (_, key_pair) = self.identity.as_ref().ok_or(Error::Cert)?;
            key_pair
                .sign(&self.rng, &digest)
                .map_err(|_| Error::InternalError)?
        };

        let record = build::Message {
            msg_type: HandshakeType::CertificateVerify,
            body: build::CertificateVerify {
                algorithm: negotiated.signature_alg,
                signature: signature.as_ref(),
            },
        }
        .encode_to_vec();

        Ok(self.emit(Level::Handshake, record))
    }

    fn encode_server_finished(&mut self) -> Result<Vec<u8>, Error> {
        self.mark_sent(SENT_FINISHED)?;

        let transcript_hash = kdf::sha256(&self.transcript);
        let mac = handshake::finished_mac(self.keys.server_hs_secret()?, &transcript_hash)?;

        let record = build::Message {
            msg_type: HandshakeType::Finished,
            body: build::Finished { verify_data: &mac },
        }
        .encode_to_vec();

        let frame = self.emit(Level::Handshake, record);
        self.th_server_finished = Some(kdf::sha256(&self.transcript));
        self.pending = Some(PendingTransition::Protected);
        Ok(frame)
    }

    fn encode_client_finished(&mut self) -> Result<Vec<u8>, Error> {
        if self.keys.level() < Level::Protected {
            return Err(Error::KeyUnavailable);
        }
        self.mark_sent(SENT_FINISHED)?;

        let transcript_hash = kdf::sha256(&self.transcript);
        let mac = handshake::finished_mac(self.keys.client_hs_secret()?, &transcript_hash)?;

        let record = build::Message {
            msg_type: HandshakeType::Finished,
            body: build::Finished { verify_data: &mac },
        }
        .encode_to_vec();

        let frame = self.emit(Level::Protected, record);

        // nothing on this side reads the transcript or the handshake
        // traffic secrets again
        self.transcript.clear();
        self.keys.retire_handshake_secrets();

        Ok(frame)
    }

    fn emit(&mut self, level: Level, record: Vec<u8>) -> Vec<u8> {
        self.transcript.extend_from_slice(&record);

        let stream = &mut self.streams[stream_index(level)];
        let offset = stream.send_offset();
        stream.advance_send(record.len());

        let frame = Crypto {
            offset: VarInt::new(offset).expect("stream offsets stay in varint range"),
            data: &record[..],
        };
        frame.encode_to_vec()
    }

    // === inbound records ===
    //
    // Validators check and record negotiation state only; the caller
    // appends the raw record bytes to the transcript and advances the
    // stream once a record is accepted, so a rejected record leaves no
    // trace.

    fn validate_client_hello(&mut self, hello: &tls::ClientHello) -> Result<Outcome, Error> {
        if self.negotiated.is_some() {
            return Err(Error::ProtocolViolation);
        }

        let (negotiated, key_share) = handshake::negotiate_client_hello(hello)?;

        let parameters = hello
            .extensions
            .transport_parameters
            .ok_or(Error::InvalidParams)?;
        let parameters = ClientTransportParameters::decode(DecoderBuffer::new(parameters))
            .map_err(|_| Error::InvalidParams)?;

        self.negotiated = Some(negotiated);
        self.peer_public_key = Some(key_share.to_vec());
        self.peer_parameters = Some(parameters.parameters);

        Ok(Outcome::Valid)
    }

    fn validate_server_hello(&mut self, hello: &tls::ServerHello) -> Result<Outcome, Error> {
        if self.negotiated.is_some() {
            return Err(Error::ProtocolViolation);
        }

        let (negotiated, key_share) = handshake::accept_server_hello(hello)?;

        self.negotiated = Some(negotiated);
        self.peer_public_key = Some(key_share.to_vec());

        Ok(Outcome::Valid)
    }

    fn validate_encrypted_extensions(
        &mut self,
        body: &tls::EncryptedExtensions,
    ) -> Result<Outcome, Error> {
        let negotiated = self.negotiated.ok_or(Error::ProtocolViolation)?;
        if self.peer_parameters.is_some() {
            return Err(Error::ProtocolViolation);
        }

        handshake::check_encrypted_extensions(&body.extensions, &negotiated)?;

        let parameters = body
            .extensions
            .transport_parameters
            .ok_or(Error::InvalidParams)?;
        let parameters = ServerTransportParameters::decode(DecoderBuffer::new(parameters))
            .map_err(|_| Error::InvalidParams)?;
        if parameters.negotiated_version != self.quic_version {
            return Err(Error::InvalidParams);
        }

        self.peer_parameters = Some(parameters.parameters);

        Ok(Outcome::Incomplete)
    }

    fn validate_certificate(&mut self, body: &tls::Certificate) -> Result<Outcome, Error> {
        if self.peer_certificate_key.is_some() {
            return Err(Error::ProtocolViolation);
        }

        let public_key = certificate::verify_chain(&body.entries)?;
        self.peer_certificate_key = Some(public_key);

        Ok(Outcome::Incomplete)
    }

    fn validate_certificate_verify(
        &mut self,
        body: &tls::CertificateVerify,
    ) -> Result<Outcome, Error> {
        let negotiated = self.negotiated.ok_or(Error::ProtocolViolation)?;
        if body.algorithm != negotiated.signature_alg {
            return Err(Error::CertVerify);
        }
        let public_key = self
            .peer_certificate_key
            .as_ref()
            .ok_or(Error::ProtocolViolation)?;

        // the signature covers the transcript hash at this point, before
        // the CertificateVerify record itself
        let digest = kdf::sha256(&self.transcript);
        signature::UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, public_key)
            .verify(&digest, body.signature)
            .map_err(|_| Error::CertVerify)?;

        Ok(Outcome::Valid)
    }

    fn validate_server_finished(&mut self, body: &tls::Finished) -> Result<Outcome, Error> {
        let transcript_hash = kdf::sha256(&self.transcript);
        handshake::verify_finished(
            self.keys.server_hs_secret()?,
            &transcript_hash,
            body.verify_data,
        )?;

        Ok(Outcome::Valid)
    }

    fn validate_client_finished(&mut self, body: &tls::Finished) -> Result<Outcome, Error> {
        let transcript_hash = kdf::sha256(&self.transcript);
        handshake::verify_finished(
            self.keys.client_hs_secret()?,
            &transcript_hash,
            body.verify_data,
        )?;

        Ok(Outcome::Valid)
    }
}

#[inline]
fn stream_index(level: Level) -> usize {
    match level {
        // 0-RTT shares the initial CRYPTO stream; no handshake records are
        // exchanged at that level
        Level::Initial | Level::EarlyData => 0,
        Level::Handshake => 1,
        Level::Protected => 2,
    }
}

#[inline]
fn space_index(level: Level) -> usize {
    match level {
        Level::Initial => 0,
        Level::EarlyData => 1,
        Level::Handshake => 2,
        Level::Protected => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    const CID: [u8; 8] = [0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08];

    fn client() -> Session {
        Session::new(Role::Client, Config::new(&CID)).unwrap()
    }

    fn server() -> Session {
        let mut config = Config::new(&CID);
        config.identity = Some(testing::self_signed_identity());
        Session::new(Role::Server, config).unwrap()
    }

    /// Runs `validate_record` over an encoded CRYPTO frame
    fn deliver(session: &mut Session, frame_bytes: &[u8]) -> Result<Outcome, Error> {
        let (frame, rest) = CryptoRef::parse(DecoderBuffer::new(frame_bytes)).unwrap();
        assert!(rest.is_empty());
        session.validate_record(&frame)
    }

    fn frame_at(offset: u64, record: &[u8]) -> Vec<u8> {
        Crypto {
            offset: VarInt::new(offset).unwrap(),
            data: record,
        }
        .encode_to_vec()
    }

    fn record_len(frame_bytes: &[u8]) -> u64 {
        let (frame, _) = CryptoRef::parse(DecoderBuffer::new(frame_bytes)).unwrap();
        frame.data.len() as u64
    }

    /// Drives both sides to the protected level
    fn complete_handshake() -> (Session, Session) {
        let mut client = client();
        let mut server = server();

        let client_hello = client
            .encode_crypto_record(HandshakeType::ClientHello)
            .unwrap();
        assert_eq!(deliver(&mut server, &client_hello), Ok(Outcome::Valid));

        let server_hello = server
            .encode_crypto_record(HandshakeType::ServerHello)
            .unwrap();
        server.advance_keys().unwrap();
        assert_eq!(deliver(&mut client, &server_hello), Ok(Outcome::Valid));
        client.advance_keys().unwrap();

        let encrypted_extensions = server
            .encode_crypto_record(HandshakeType::EncryptedExtensions)
            .unwrap();
        assert_eq!(
            deliver(&mut client, &encrypted_extensions),
            Ok(Outcome::Incomplete)
        );

        let certificate = server
            .encode_crypto_record(HandshakeType::Certificate)
            .unwrap();
        assert_eq!(deliver(&mut client, &certificate), Ok(Outcome::Incomplete));

        let certificate_verify = server
            .encode_crypto_record(HandshakeType::CertificateVerify)
            .unwrap();
        assert_eq!(
            deliver(&mut client, &certificate_verify),
            Ok(Outcome::Valid)
        );

        let finished = server.encode_crypto_record(HandshakeType::Finished).unwrap();
        server.advance_keys().unwrap();
        assert_eq!(deliver(&mut client, &finished), Ok(Outcome::Valid));
        client.advance_keys().unwrap();

        let client_finished = client.encode_crypto_record(HandshakeType::Finished).unwrap();
        assert_eq!(deliver(&mut server, &client_finished), Ok(Outcome::Valid));

        assert_eq!(client.level(), Level::Protected);
        assert_eq!(server.level(), Level::Protected);
        (client, server)
    }

    #[test]
    fn full_handshake_test() {
        let (client, server) = complete_handshake();

        // both sides negotiated the same single suite
        assert_eq!(client.negotiated(), server.negotiated());
        let negotiated = client.negotiated().unwrap();
        assert_eq!(negotiated.cipher, CIPHER_AES_128_GCM_SHA256);
        assert_eq!(negotiated.group, GROUP_SECP256R1);
        assert_eq!(negotiated.signature_alg, SIG_ECDSA_SECP256R1_SHA256);

        // both sides hold the peer's transport parameters
        assert!(client.peer_parameters().is_some());
        assert!(server.peer_parameters().is_some());

        // the server's transcript is cleared after the client Finished
        assert!(server.transcript.is_empty());
        assert!(client.transcript.is_empty());
    }

    #[test]
    fn handshake_secrets_agree_test() {
        let mut client = client();
        let mut server = server();

        let client_hello = client
            .encode_crypto_record(HandshakeType::ClientHello)
            .unwrap();
        deliver(&mut server, &client_hello).unwrap();
        let server_hello = server
            .encode_crypto_record(HandshakeType::ServerHello)
            .unwrap();
        server.advance_keys().unwrap();
        deliver(&mut client, &server_hello).unwrap();
        client.advance_keys().unwrap();

        // the handshake secrets are a pure function of the shared secret
        // and the hello transcript, so both sides agree
        assert_eq!(
            client.keys.client_hs_secret().unwrap().as_ref(),
            server.keys.client_hs_secret().unwrap().as_ref()
        );
        assert_eq!(
            client.keys.server_hs_secret().unwrap().as_ref(),
            server.keys.server_hs_secret().unwrap().as_ref()
        );
        assert_eq!(client.th_hello, server.th_hello);
    }

    #[test]
    fn protected_packets_round_trip_test() {
        let (mut client, mut server) = complete_handshake();
        let header = [0x43u8, 0x01, 0x02];

        let payload = b"application data from the client";
        let datagram = client
            .seal_packet(Level::Protected, &header, 0, None, payload)
            .unwrap();
        let (packet_number, plaintext) = server
            .open_packet(Level::Protected, header.len(), &datagram)
            .unwrap();
        assert_eq!(packet_number, 0);
        assert_eq!(plaintext, payload);

        let payload = b"application data from the server";
        let datagram = server
            .seal_packet(Level::Protected, &header, 1, None, payload)
            .unwrap();
        let (packet_number, plaintext) = client
            .open_packet(Level::Protected, header.len(), &datagram)
            .unwrap();
        assert_eq!(packet_number, 1);
        assert_eq!(plaintext, payload);
    }

    #[test]
    fn initial_packets_round_trip_test() {
        let client = client();
        let mut server = server();
        let header = [0xc3u8, 0x00, 0x00, 0x00, 0x01];

        let payload = b"an initial crypto frame with padding";
        let datagram = client
            .seal_packet(Level::Initial, &header, 0, None, payload)
            .unwrap();
        let (packet_number, plaintext) = server
            .open_packet(Level::Initial, header.len(), &datagram)
            .unwrap();
        assert_eq!(packet_number, 0);
        assert_eq!(plaintext, payload);
    }

    #[test]
    fn early_data_round_trip_test() {
        let client = client();
        let mut server = server();
        let header = [0xc3u8, 0x7a];

        let payload = b"zero rtt request bytes";
        let datagram = client
            .seal_packet(Level::EarlyData, &header, 0, None, payload)
            .unwrap();
        let (_, plaintext) = server
            .open_packet(Level::EarlyData, header.len(), &datagram)
            .unwrap();
        assert_eq!(plaintext, payload);

        // 0-RTT protects the client direction only
        assert_eq!(
            server
                .seal_packet(Level::EarlyData, &header, 0, None, payload)
                .unwrap_err(),
            Error::KeyUnavailable
        );
    }

    #[test]
    fn valid_client_hello_test() {
        let mut client = client();
        let mut server = server();

        let client_hello = client
            .encode_crypto_record(HandshakeType::ClientHello)
            .unwrap();
        let body_len = record_len(&client_hello);

        assert_eq!(deliver(&mut server, &client_hello), Ok(Outcome::Valid));
        assert_eq!(server.level(), Level::Initial);
        assert_eq!(server.recv_offset(Level::Initial), body_len);
        assert_eq!(
            server.peer_parameters().unwrap().max_packet_size.as_u64(),
            1200
        );
    }

    #[test]
    fn unsupported_cipher_is_rejected_test() {
        let client = client();
        let mut server = server();

        // a hello offering only TLS_AES_256_GCM_SHA384
        let record = build::Message {
            msg_type: HandshakeType::ClientHello,
            body: build::ClientHello {
                random: &[0x5au8; 32],
                cipher_suites: &[0x1302],
                supported_versions: &[TLS_VERSION_13],
                groups: &[GROUP_SECP256R1],
                signature_algorithms: &[SIG_ECDSA_SECP256R1_SHA256],
                certificate_types: &[CERT_TYPE_X509],
                key_share: build::KeyShare {
                    group: GROUP_SECP256R1,
                    key_exchange: &client.public_key,
                },
                transport_parameters: &ClientTransportParameters {
                    initial_version: QUIC_VERSION,
                    parameters: TransportParameters::default(),
                }
                .encode_to_vec(),
            },
        }
        .encode_to_vec();

        let frame = frame_at(0, &record);
        assert_eq!(deliver(&mut server, &frame), Err(Error::NoCipher));

        // the failed record left no trace
        assert_eq!(server.recv_offset(Level::Initial), 0);
        assert!(server.transcript.is_empty());
        assert!(server.negotiated().is_none());
    }

    #[test]
    fn repeats_do_not_mutate_test() {
        let mut client = client();
        let mut server = server();

        let client_hello = client
            .encode_crypto_record(HandshakeType::ClientHello)
            .unwrap();
        deliver(&mut server, &client_hello).unwrap();
        let server_hello = server
            .encode_crypto_record(HandshakeType::ServerHello)
            .unwrap();
        server.advance_keys().unwrap();
        deliver(&mut client, &server_hello).unwrap();
        client.advance_keys().unwrap();

        let encrypted_extensions = server
            .encode_crypto_record(HandshakeType::EncryptedExtensions)
            .unwrap();
        assert_eq!(
            deliver(&mut client, &encrypted_extensions),
            Ok(Outcome::Incomplete)
        );

        let transcript_len = client.transcript.len();
        let recv_offset = client.recv_offset(Level::Handshake);

        // the duplicate is reported incomplete and the state is untouched
        assert_eq!(
            deliver(&mut client, &encrypted_extensions),
            Ok(Outcome::Incomplete)
        );
        assert_eq!(client.transcript.len(), transcript_len);
        assert_eq!(client.recv_offset(Level::Handshake), recv_offset);
    }

    #[test]
    fn gap_is_out_of_order_test() {
        let mut client = client();
        let mut server = server();

        let client_hello = client
            .encode_crypto_record(HandshakeType::ClientHello)
            .unwrap();
        deliver(&mut server, &client_hello).unwrap();
        let server_hello = server
            .encode_crypto_record(HandshakeType::ServerHello)
            .unwrap();
        server.advance_keys().unwrap();
        deliver(&mut client, &server_hello).unwrap();
        client.advance_keys().unwrap();

        let _skipped = server
            .encode_crypto_record(HandshakeType::EncryptedExtensions)
            .unwrap();
        let certificate = server
            .encode_crypto_record(HandshakeType::Certificate)
            .unwrap();

        // the certificate's offset is past the expected next byte
        assert_eq!(deliver(&mut client, &certificate), Ok(Outcome::OutOfOrder));
        assert_eq!(client.recv_offset(Level::Handshake), 0);
    }

    #[test]
    fn corrupted_finished_is_rejected_test() {
        let mut client = client();
        let mut server = server();

        let client_hello = client
            .encode_crypto_record(HandshakeType::ClientHello)
            .unwrap();
        deliver(&mut server, &client_hello).unwrap();
        let server_hello = server
            .encode_crypto_record(HandshakeType::ServerHello)
            .unwrap();
        server.advance_keys().unwrap();
        deliver(&mut client, &server_hello).unwrap();
        client.advance_keys().unwrap();

        for msg_type in [
            HandshakeType::EncryptedExtensions,
            HandshakeType::Certificate,
            HandshakeType::CertificateVerify,
        ] {
            let record = server.encode_crypto_record(msg_type).unwrap();
            deliver(&mut client, &record).unwrap();
        }

        // a Finished computed under the wrong key
        let forged = build::Message {
            msg_type: HandshakeType::Finished,
            body: build::Finished {
                verify_data: &[0u8; 32],
            },
        }
        .encode_to_vec();
        let frame = frame_at(client.recv_offset(Level::Handshake), &forged);

        let transcript_len = client.transcript.len();
        assert_eq!(deliver(&mut client, &frame), Err(Error::Finished));
        assert_eq!(client.transcript.len(), transcript_len);

        // the genuine Finished still goes through
        let finished = server.encode_crypto_record(HandshakeType::Finished).unwrap();
        assert_eq!(deliver(&mut client, &finished), Ok(Outcome::Valid));
    }

    #[test]
    fn unexpected_record_is_a_protocol_violation_test() {
        let mut client = client();
        let mut server = server();

        // the server cannot accept its own kind of hello
        let mut other = client.encode_crypto_record(HandshakeType::ClientHello).unwrap();
        deliver(&mut server, &other).unwrap();
        other = server.encode_crypto_record(HandshakeType::ServerHello).unwrap();

        let mut third = Session::new(Role::Server, {
            let mut config = Config::new(&CID);
            config.identity = Some(testing::self_signed_identity());
            config
        })
        .unwrap();
        assert_eq!(deliver(&mut third, &other), Err(Error::ProtocolViolation));
    }

    #[test]
    fn advance_without_pending_transition_test() {
        let mut client = client();
        assert_eq!(client.advance_keys(), Err(Error::ProtocolViolation));
    }

    #[test]
    fn packet_number_expansion_across_packets_test() {
        let (client, mut server) = complete_handshake();
        let header = [0x41u8];

        // a burst of packets with growing numbers, each truncated against
        // the previous acknowledgment
        let mut largest_acked = None;
        for packet_number in [0u64, 1, 2, 200, 70_000] {
            let datagram = client
                .seal_packet(
                    Level::Protected,
                    &header,
                    packet_number,
                    largest_acked,
                    b"stream frame payload",
                )
                .unwrap();
            let (recovered, _) = server
                .open_packet(Level::Protected, header.len(), &datagram)
                .unwrap();
            assert_eq!(recovered, packet_number);
            largest_acked = Some(packet_number);
        }
    }

    #[test]
    fn seal_before_keys_installed_test() {
        let client = client();
        assert_eq!(
            client
                .seal_packet(Level::Handshake, &[0xe0], 0, None, b"data")
                .unwrap_err(),
            Error::KeyUnavailable
        );
        assert_eq!(
            client
                .seal_packet(Level::Protected, &[0x40], 0, None, b"data")
                .unwrap_err(),
            Error::KeyUnavailable
        );
    }

    #[test]
    fn encode_is_one_shot_per_record_test() {
        let mut client = client();
        client
            .encode_crypto_record(HandshakeType::ClientHello)
            .unwrap();
        assert_eq!(
            client
                .encode_crypto_record(HandshakeType::ClientHello)
                .unwrap_err(),
            Error::ProtocolViolation
        );
    }

    #[test]
    fn send_offsets_advance_test() {
        let mut client = client();
        let frame = client
            .encode_crypto_record(HandshakeType::ClientHello)
            .unwrap();
        assert_eq!(client.send_offset(Level::Initial), record_len(&frame));
    }

    #[test]
    fn supplied_ecdh_key_is_used_test() {
        use aws_lc_rs::encoding::{AsDer, Pkcs8V1Der};

        // a supplied key yields a deterministic public share
        let der: Pkcs8V1Der = agreement::PrivateKey::generate(&agreement::ECDH_P256)
            .unwrap()
            .as_der()
            .unwrap();

        let mut config = Config::new(&CID);
        config.ecdh_private_key = Some(der.as_ref().to_vec());
        let first = Session::new(Role::Client, config).unwrap();

        let mut config = Config::new(&CID);
        config.ecdh_private_key = Some(der.as_ref().to_vec());
        let second = Session::new(Role::Client, config).unwrap();

        assert_eq!(first.public_key, second.public_key);
    }

    #[test]
    fn crypto_frame_shape_test() {
        let mut client = client();
        let frame_bytes = client
            .encode_crypto_record(HandshakeType::ClientHello)
            .unwrap();

        // frame type 0x18, offset 0
        assert_eq!(frame_bytes[0], 0x18);
        let (frame, _) = CryptoRef::parse(DecoderBuffer::new(&frame_bytes)).unwrap();
        assert_eq!(frame.offset.as_u64(), 0);
        // the payload is a ClientHello record
        assert_eq!(frame.data[0], 1);

        // the parsed frame re-encodes to the same bytes
        assert_eq!(frame.encode_to_vec(), frame_bytes);
    }
}
