//! The cached tier: denormalized, comparison-friendly summaries.

use std::cmp::Ordering;

use sequoia_openpgp as openpgp;
use openpgp::{Fingerprint, KeyID};

use crate::Error;
use crate::Result;
use crate::types::VerificationLevel;

use super::{KeyRing, WrappedKeyRing};

/// An immutable summary of a wrapped key ring.
///
/// Carries no cryptographic material: just the fields needed for
/// equality, sorting, display, and for initializing an operation
/// without materializing the full parsed structure.  Produced once,
/// by [`WrappedKeyRing::summarize`] or from stored summary data, and
/// never mutated afterward; any change requires producing a new
/// snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CachedKeyRing {
    key_id: KeyID,
    fingerprint: Fingerprint,
    primary_user_id: Option<String>,
    verification: VerificationLevel,
    revoked: bool,
    can_certify: bool,
    has_secret: bool,
    encrypt_subkey_id: Option<KeyID>,
    sign_subkey_id: Option<KeyID>,
}

assert_send_and_sync!(CachedKeyRing);

impl CachedKeyRing {
    /// Summarizes a wrapped ring.
    ///
    /// Copies every field by value; the snapshot stays valid after
    /// the wrapped ring is dropped.
    pub(crate) fn from_wrapped(ring: &WrappedKeyRing) -> Result<Self> {
        Ok(CachedKeyRing {
            key_id: ring.key_id()?,
            fingerprint: ring.fingerprint()?,
            primary_user_id: ring.primary_user_id()?,
            verification: ring.verification(),
            revoked: ring.is_revoked()?,
            can_certify: ring.can_certify()?,
            has_secret: ring.has_any_secret()?,
            encrypt_subkey_id: ring.encrypt_id()?,
            sign_subkey_id: ring.sign_id()?,
        })
    }

    /// Restores a snapshot from stored summary data.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(key_id: KeyID,
                      fingerprint: Fingerprint,
                      primary_user_id: Option<String>,
                      verification: VerificationLevel,
                      revoked: bool,
                      can_certify: bool,
                      has_secret: bool,
                      encrypt_subkey_id: Option<KeyID>,
                      sign_subkey_id: Option<KeyID>)
                      -> Self {
        CachedKeyRing {
            key_id,
            fingerprint,
            primary_user_id,
            verification,
            revoked,
            can_certify,
            has_secret,
            encrypt_subkey_id,
            sign_subkey_id,
        }
    }

    /// Returns whether this ring has secret material available.
    pub fn has_secret(&self) -> bool {
        self.has_secret
    }
}

impl KeyRing for CachedKeyRing {
    fn key_id(&self) -> Result<KeyID> {
        Ok(self.key_id.clone())
    }

    fn fingerprint(&self) -> Result<Fingerprint> {
        Ok(self.fingerprint.clone())
    }

    fn primary_user_id(&self) -> Result<Option<String>> {
        Ok(self.primary_user_id.clone())
    }

    fn is_revoked(&self) -> Result<bool> {
        Ok(self.revoked)
    }

    fn can_certify(&self) -> Result<bool> {
        Ok(self.can_certify)
    }

    fn encrypt_subkey_id(&self) -> Result<KeyID> {
        self.encrypt_subkey_id.clone().ok_or_else(
            || Error::NoUsableSubkey {
                key_ring: self.key_id.clone(),
                problem: None,
            }.into())
    }

    fn has_encrypt_subkey(&self) -> Result<bool> {
        Ok(self.encrypt_subkey_id.is_some())
    }

    fn sign_subkey_id(&self) -> Result<KeyID> {
        self.sign_subkey_id.clone().ok_or_else(
            || Error::NoUsableSubkey {
                key_ring: self.key_id.clone(),
                problem: None,
            }.into())
    }

    fn has_sign_subkey(&self) -> Result<bool> {
        Ok(self.sign_subkey_id.is_some())
    }

    fn verification(&self) -> VerificationLevel {
        self.verification
    }
}

/// Orders by trust first: more verified rings sort before less
/// verified ones, then by primary user id, then by fingerprint.  The
/// remaining fields are tie-breakers so that the order is consistent
/// with the derived equality: snapshots of the same ring that differ
/// in any field never compare `Equal`.
impl Ord for CachedKeyRing {
    fn cmp(&self, other: &Self) -> Ordering {
        other.verification.cmp(&self.verification)
            .then_with(|| self.primary_user_id.cmp(&other.primary_user_id))
            .then_with(|| self.fingerprint.as_bytes()
                       .cmp(other.fingerprint.as_bytes()))
            .then_with(|| self.key_id.cmp(&other.key_id))
            .then_with(|| self.revoked.cmp(&other.revoked))
            .then_with(|| self.can_certify.cmp(&other.can_certify))
            .then_with(|| self.has_secret.cmp(&other.has_secret))
            .then_with(|| self.encrypt_subkey_id
                       .cmp(&other.encrypt_subkey_id))
            .then_with(|| self.sign_subkey_id.cmp(&other.sign_subkey_id))
    }
}

impl PartialOrd for CachedKeyRing {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use openpgp::cert::{CertBuilder, CipherSuite};

    fn ring() -> WrappedKeyRing {
        let (cert, _) = CertBuilder::new()
            .set_cipher_suite(CipherSuite::Cv25519)
            .add_userid("Frank <frank@example.org>")
            .add_signing_subkey()
            .add_transport_encryption_subkey()
            .generate()
            .unwrap();
        crate::RawKeyRing::new(cert.clone(), None).unwrap()
            .validate(VerificationLevel::VerifiedSelf).unwrap()
    }

    #[test]
    fn summarize_is_deterministic() {
        let wrapped = ring();
        let a = wrapped.summarize().unwrap();
        let b = wrapped.summarize().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn summary_matches_the_wrapped_ring() {
        let wrapped = ring();
        let cached = wrapped.summarize().unwrap();
        assert_eq!(cached.key_id().unwrap(), wrapped.key_id().unwrap());
        assert_eq!(cached.fingerprint().unwrap(),
                   wrapped.fingerprint().unwrap());
        assert_eq!(cached.primary_user_id().unwrap().as_deref(),
                   Some("Frank <frank@example.org>"));
        assert_eq!(cached.verification(), VerificationLevel::VerifiedSelf);
        assert!(cached.can_certify().unwrap());
        assert!(cached.has_secret());
        assert_eq!(cached.encrypt_subkey_id().unwrap(),
                   wrapped.encrypt_subkey_id().unwrap());
        assert_eq!(cached.sign_subkey_id().unwrap(),
                   wrapped.sign_subkey_id().unwrap());
    }

    #[test]
    fn more_verified_rings_sort_first() {
        let wrapped = ring();
        let cached = wrapped.summarize().unwrap();
        let less = CachedKeyRing {
            verification: VerificationLevel::Unverified,
            ..cached.clone()
        };
        let mut v = vec![less.clone(), cached.clone()];
        v.sort();
        assert_eq!(v, vec![cached, less]);
    }

    #[test]
    fn ordering_is_consistent_with_equality() {
        let cached = ring().summarize().unwrap();
        // A later snapshot of the same ring may differ only in
        // revocation or secret availability; it must not compare
        // Equal to the earlier one.
        let after_revocation = CachedKeyRing {
            revoked: true,
            ..cached.clone()
        };
        let after_secret_deletion = CachedKeyRing {
            has_secret: false,
            ..cached.clone()
        };

        assert_ne!(cached, after_revocation);
        assert_ne!(cached.cmp(&after_revocation), Ordering::Equal);
        assert_ne!(cached, after_secret_deletion);
        assert_ne!(cached.cmp(&after_secret_deletion), Ordering::Equal);
        assert_eq!(cached.cmp(&cached.clone()), Ordering::Equal);
    }

    #[test]
    fn missing_subkeys_are_reported() {
        let (cert, _) = CertBuilder::new()
            .set_cipher_suite(CipherSuite::Cv25519)
            .add_userid("Grace <grace@example.org>")
            .add_signing_subkey()
            .generate()
            .unwrap();
        let cached = crate::RawKeyRing::new(cert, None).unwrap()
            .validate(VerificationLevel::Unverified).unwrap()
            .summarize().unwrap();
        assert!(!cached.has_encrypt_subkey().unwrap());
        assert!(cached.has_sign_subkey().unwrap());
        let err = cached.encrypt_subkey_id().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(),
                         Some(Error::NoUsableSubkey { .. })));
    }
}
