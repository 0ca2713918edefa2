// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The key schedule: per-level secrets and keys, and the one-shot level
//! transitions `initial -> handshake -> protected`.
//!
//! Each level is a separate record; later levels are `Option`s so material
//! that has not been derived cannot be read. Transitions consume the
//! predecessor inputs and zeroize what the schedule no longer needs.

use crate::{
    cipher_suite::TLS_AES_128_GCM_SHA256 as CipherSuite,
    error::Error,
    header_key::PnKey,
    initial,
    kdf::{self, Secret},
    label,
};
use zeroize::Zeroize;

/// An encryption level / packet number space
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Initial,
    EarlyData,
    Handshake,
    Protected,
}

/// One direction's secret and the AEAD state derived from it
pub struct DirectionalKeys {
    secret: Secret,
    cipher: CipherSuite,
}

impl DirectionalKeys {
    fn derive(secret: Secret) -> Result<Self, Error> {
        let cipher = CipherSuite::new(&secret)?;
        Ok(Self { secret, cipher })
    }

    #[inline]
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    #[inline]
    pub fn cipher(&self) -> &CipherSuite {
        &self.cipher
    }
}

/// Both directions of one level, plus its packet-number protection key
pub struct LevelKeys {
    pub(crate) client: DirectionalKeys,
    pub(crate) server: DirectionalKeys,
    pn_secret: Secret,
    pn: PnKey,
}

impl LevelKeys {
    fn derive(client: Secret, server: Secret, pn_secret: Secret) -> Result<Self, Error> {
        let client = DirectionalKeys::derive(client)?;
        let server = DirectionalKeys::derive(server)?;
        let pn = PnKey::derive(&pn_secret)?;

        Ok(Self {
            client,
            server,
            pn_secret,
            pn,
        })
    }

    #[inline]
    pub fn pn_key(&self) -> &PnKey {
        &self.pn
    }

    /// Wipes the level's secrets; the derived keys stay usable for packets
    /// still in flight
    fn retire_secrets(&mut self) {
        self.client.secret.zeroize();
        self.server.secret.zeroize();
        self.pn_secret.zeroize();
    }
}

/// The client-to-server 0-RTT material
pub struct EarlyKeys {
    pub(crate) keys: DirectionalKeys,
    pub(crate) pn: PnKey,
}

impl EarlyKeys {
    fn derive(secret: Secret) -> Result<Self, Error> {
        let pn_secret = kdf::expand_secret(&secret, label::QUIC_PN, &[])?;
        let pn = PnKey::derive(&pn_secret)?;
        let keys = DirectionalKeys::derive(secret)?;

        Ok(Self { keys, pn })
    }
}

/// The per-connection key schedule
pub struct KeySet {
    level: Level,
    initial_secret: Secret,
    initial: LevelKeys,
    early: EarlyKeys,
    handshake: Option<LevelKeys>,
    hs_secret: Option<Secret>,
    protected: Option<LevelKeys>,
}

impl KeySet {
    /// Installs the initial level from the client's destination connection
    /// ID, along with the 0-RTT material hanging off the initial secret
    pub fn new(connection_id: &[u8]) -> Result<Self, Error> {
        let initial_secret = initial::initial_secret(connection_id);

        let client = kdf::expand_secret(&initial_secret, label::CLIENT_IN_LABEL, &[])?;
        let server = kdf::expand_secret(&initial_secret, label::SERVER_IN_LABEL, &[])?;
        let pn = kdf::expand_secret(&initial_secret, label::QUIC_PN, &[])?;
        let initial = LevelKeys::derive(client, server, pn)?;

        let early_secret = kdf::expand_secret(&initial_secret, label::QUIC_0RTT, &[])?;
        let early = EarlyKeys::derive(early_secret)?;

        Ok(Self {
            level: Level::Initial,
            initial_secret,
            initial,
            early,
            handshake: None,
            hs_secret: None,
            protected: None,
        })
    }

    #[inline]
    pub fn level(&self) -> Level {
        self.level
    }

    /// `initial -> handshake`: folds the ECDHE shared secret and the
    /// transcript hash through ServerHello into the handshake level
    pub fn install_handshake(&mut self, dhe: &[u8], transcript_hash: &[u8]) -> Result<(), Error> {
        if self.handshake.is_some() {
            return Err(Error::ProtocolViolation);
        }

        let derived = kdf::expand_secret(&self.initial_secret, label::DERIVED, &[])?;
        let hs_secret = kdf::extract(derived.as_ref(), dhe);

        let client = kdf::expand_secret(&hs_secret, label::CLIENT_HS_TRAFFIC, transcript_hash)?;
        let server = kdf::expand_secret(&hs_secret, label::SERVER_HS_TRAFFIC, transcript_hash)?;
        let pn = kdf::expand_secret(&hs_secret, label::QUIC_PN, transcript_hash)?;

        self.handshake = Some(LevelKeys::derive(client, server, pn)?);
        self.hs_secret = Some(hs_secret);
        self.level = Level::Handshake;

        self.initial_secret.zeroize();
        self.initial.retire_secrets();

        Ok(())
    }

    /// `handshake -> protected`: folds the transcript hash through the
    /// server Finished into the application level
    pub fn install_protected(&mut self, transcript_hash: &[u8]) -> Result<(), Error> {
        if self.protected.is_some() {
            return Err(Error::ProtocolViolation);
        }
        let hs_secret = self.hs_secret.as_ref().ok_or(Error::KeyUnavailable)?;

        let derived = kdf::expand_secret(hs_secret, label::DERIVED, &[])?;
        let master = kdf::extract(derived.as_ref(), &[0u8; kdf::SHA256_LEN]);

        let client = kdf::expand_secret(&master, label::CLIENT_AP_TRAFFIC, transcript_hash)?;
        let server = kdf::expand_secret(&master, label::SERVER_AP_TRAFFIC, transcript_hash)?;
        let pn = kdf::expand_secret(&master, label::QUIC_PN, transcript_hash)?;

        self.protected = Some(LevelKeys::derive(client, server, pn)?);
        self.level = Level::Protected;

        Ok(())
    }

    /// Wipes the handshake traffic secrets once both Finished MACs are
    /// settled; the handshake AEAD keys stay usable for retransmits
    pub fn retire_handshake_secrets(&mut self) {
        if let Some(keys) = &mut self.handshake {
            keys.retire_secrets();
        }
        if let Some(secret) = &mut self.hs_secret {
            secret.zeroize();
        }
    }

    /// The client handshake traffic secret, input of the client Finished
    /// key
    pub fn client_hs_secret(&self) -> Result<&Secret, Error> {
        Ok(self
            .handshake
            .as_ref()
            .ok_or(Error::KeyUnavailable)?
            .client
            .secret())
    }

    /// The server handshake traffic secret, input of the server Finished
    /// key
    pub fn server_hs_secret(&self) -> Result<&Secret, Error> {
        Ok(self
            .handshake
            .as_ref()
            .ok_or(Error::KeyUnavailable)?
            .server
            .secret())
    }

    fn level_keys(&self, level: Level) -> Result<&LevelKeys, Error> {
        match level {
            Level::Initial => Ok(&self.initial),
            Level::Handshake => self.handshake.as_ref().ok_or(Error::KeyUnavailable),
            Level::Protected => self.protected.as_ref().ok_or(Error::KeyUnavailable),
            Level::EarlyData => Err(Error::KeyUnavailable),
        }
    }

    /// The AEAD and mask keys protecting packets this endpoint sends at
    /// `level`. `client` is true for the client role.
    pub fn seal_keys(&self, client: bool, level: Level) -> Result<(&CipherSuite, &PnKey), Error> {
        if level == Level::EarlyData {
            // 0-RTT protects client-to-server data only
            if !client {
                return Err(Error::KeyUnavailable);
            }
            return Ok((self.early.keys.cipher(), &self.early.pn));
        }

        let keys = self.level_keys(level)?;
        let direction = if client { &keys.client } else { &keys.server };
        Ok((direction.cipher(), &keys.pn))
    }

    /// The AEAD and mask keys protecting packets this endpoint receives at
    /// `level`
    pub fn open_keys(&self, client: bool, level: Level) -> Result<(&CipherSuite, &PnKey), Error> {
        if level == Level::EarlyData {
            if client {
                return Err(Error::KeyUnavailable);
            }
            return Ok((self.early.keys.cipher(), &self.early.pn));
        }

        let keys = self.level_keys(level)?;
        let direction = if client { &keys.server } else { &keys.client };
        Ok((direction.cipher(), &keys.pn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_set() -> KeySet {
        KeySet::new(&initial::EXAMPLE_DCID).unwrap()
    }

    #[test]
    fn later_levels_start_uninstalled_test() {
        let keys = key_set();
        assert_eq!(keys.level(), Level::Initial);
        assert!(matches!(
            keys.seal_keys(true, Level::Handshake),
            Err(Error::KeyUnavailable)
        ));
        assert!(matches!(
            keys.seal_keys(true, Level::Protected),
            Err(Error::KeyUnavailable)
        ));
    }

    #[test]
    fn transitions_are_one_shot_test() {
        let mut keys = key_set();
        let th = [0x11u8; 32];
        keys.install_handshake(&[0x22; 32], &th).unwrap();
        assert_eq!(keys.level(), Level::Handshake);
        assert!(keys.install_handshake(&[0x22; 32], &th).is_err());

        keys.install_protected(&th).unwrap();
        assert_eq!(keys.level(), Level::Protected);
        assert!(keys.install_protected(&th).is_err());
    }

    #[test]
    fn protected_requires_handshake_test() {
        let mut keys = key_set();
        assert!(matches!(
            keys.install_protected(&[0u8; 32]),
            Err(Error::KeyUnavailable)
        ));
    }

    #[test]
    fn early_data_is_one_directional_test() {
        let keys = key_set();
        assert!(keys.seal_keys(true, Level::EarlyData).is_ok());
        assert!(keys.open_keys(false, Level::EarlyData).is_ok());

        assert!(keys.seal_keys(false, Level::EarlyData).is_err());
        assert!(keys.open_keys(true, Level::EarlyData).is_err());
    }

    /// The freshly derived level keys are a pure function of the
    /// predecessor secret and the transcript hash
    #[test]
    fn derivation_is_deterministic_test() {
        let mut first = key_set();
        let mut second = key_set();
        let th = [0x42u8; 32];
        first.install_handshake(&[0x33; 32], &th).unwrap();
        second.install_handshake(&[0x33; 32], &th).unwrap();

        assert_eq!(
            first.client_hs_secret().unwrap().as_ref(),
            second.client_hs_secret().unwrap().as_ref()
        );
        assert_eq!(
            first.server_hs_secret().unwrap().as_ref(),
            second.server_hs_secret().unwrap().as_ref()
        );

        // a different transcript hash yields different secrets
        let mut third = key_set();
        third.install_handshake(&[0x33; 32], &[0x43u8; 32]).unwrap();
        assert_ne!(
            first.client_hs_secret().unwrap().as_ref(),
            third.client_hs_secret().unwrap().as_ref()
        );
    }
}
