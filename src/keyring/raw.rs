//! The raw tier: parsed, unvalidated key material.

use sequoia_openpgp as openpgp;
use openpgp::{Cert, Fingerprint, KeyID};
use openpgp::cert::CertParser;
use openpgp::parse::Parse;

use crate::Error;
use crate::Result;
use crate::types::VerificationLevel;

use super::WrappedKeyRing;

/// A freshly parsed key ring.
///
/// Owns a parsed public-key block and optionally a parsed secret-key
/// block for the same master key.  No trust computation has been
/// done; this is a transport form only.  [`validate`] is the only
/// way forward.
///
/// [`validate`]: RawKeyRing::validate
#[derive(Debug, Clone)]
pub struct RawKeyRing {
    public: Cert,
    secret: Option<Cert>,
}

assert_send_and_sync!(RawKeyRing);

impl RawKeyRing {
    /// Wraps already parsed material.
    ///
    /// The secret block, if present, must contain secret key
    /// material and share the public block's master key.
    pub fn new(public: Cert, secret: Option<Cert>) -> Result<Self> {
        if let Some(secret) = &secret {
            if !secret.is_tsk() {
                return Err(Error::Structural(
                    "secret block contains no secret key material"
                        .into()).into());
            }
            if secret.fingerprint() != public.fingerprint() {
                return Err(Error::Structural(format!(
                    "secret block belongs to {}, not {}",
                    secret.keyid(), public.keyid())).into());
            }
        }

        Ok(RawKeyRing { public, secret })
    }

    /// Parses a raw key ring from serialized blocks.
    ///
    /// The public block must contain exactly one key ring with no
    /// trailing data; anything else is a structural error.
    pub fn from_bytes(public: &[u8], secret: Option<&[u8]>) -> Result<Self> {
        let public = Self::parse_single(public)?;
        let secret = match secret {
            Some(bytes) => Some(Self::parse_single(bytes)?),
            None => None,
        };
        Self::new(public, secret)
    }

    /// Parses exactly one cert, rejecting trailing material.
    fn parse_single(bytes: &[u8]) -> Result<Cert> {
        let mut parser = CertParser::from_bytes(bytes)?;
        let cert = match parser.next() {
            Some(Ok(cert)) => cert,
            Some(Err(e)) => return Err(Error::Structural(
                e.to_string()).into()),
            None => return Err(Error::Structural(
                "no key ring in input".into()).into()),
        };
        if parser.next().is_some() {
            return Err(Error::Structural(
                "trailing data after key ring".into()).into());
        }
        Ok(cert)
    }

    /// Returns the master key id of the public block.
    pub fn key_id(&self) -> KeyID {
        self.public.keyid()
    }

    /// Returns the master key's fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        self.public.fingerprint()
    }

    /// Returns whether a secret block is attached.
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Validates the ring and moves it to the wrapped tier.
    ///
    /// Merges the secret block into the public block and snapshots
    /// the combined material.  `level` records how strongly the
    /// ring's identity has been corroborated; computing that level
    /// is the caller's trust model, not this crate's.
    pub fn validate(self, level: VerificationLevel) -> Result<WrappedKeyRing> {
        let cert = match self.secret {
            Some(secret) => self.public.merge_public_and_secret(secret)
                .map_err(|e| Error::Structural(e.to_string()))?,
            None => self.public,
        };

        WrappedKeyRing::from_cert(cert, level)
    }
}
