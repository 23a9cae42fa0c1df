//! The injected security policy and its evaluator.
//!
//! Thresholds (minimum modulus size per algorithm family, the
//! whitelisted curve set, hash and cipher blacklists) are
//! configuration, not code: subkey selection and the decrypt-verify
//! pipeline take a [`KeySecurityPolicy`] by reference so the policy
//! can be tightened without touching the selection logic.
//!
//! The evaluator fails closed: an algorithm, curve, or digest it
//! cannot classify is treated as insecure, never as acceptable.

use sequoia_openpgp as openpgp;
use openpgp::KeyID;
use openpgp::crypto::mpi;
use openpgp::packet::{key, Key};
use openpgp::types::{
    Curve,
    HashAlgorithm,
    PublicKeyAlgorithm,
    SymmetricAlgorithm,
};

use crate::problems::{KeyProblem, KeyProblemKind, SymmetricProblem};

/// Security thresholds for keys and algorithms.
///
/// The default reflects current recommendations; use the `set_*`
/// methods to adjust individual thresholds:
///
/// ```
/// use openpgp_keyring::KeySecurityPolicy;
///
/// let policy = KeySecurityPolicy::default()
///     .set_min_rsa_bits(3072);
/// assert_eq!(policy.min_rsa_bits(), 3072);
/// ```
#[derive(Clone, Debug)]
pub struct KeySecurityPolicy {
    min_rsa_bits: usize,
    min_dsa_bits: usize,
    min_elgamal_bits: usize,
    curve_whitelist: Vec<Curve>,
    insecure_hashes: Vec<HashAlgorithm>,
    insecure_ciphers: Vec<SymmetricAlgorithm>,
}

assert_send_and_sync!(KeySecurityPolicy);

impl Default for KeySecurityPolicy {
    fn default() -> Self {
        #[allow(deprecated)]
        KeySecurityPolicy {
            min_rsa_bits: 2048,
            min_dsa_bits: 2048,
            min_elgamal_bits: 2048,
            curve_whitelist: vec![
                Curve::NistP256,
                Curve::NistP384,
                Curve::NistP521,
                Curve::BrainpoolP256,
                Curve::BrainpoolP512,
                Curve::Ed25519,
                Curve::Cv25519,
            ],
            insecure_hashes: vec![
                HashAlgorithm::MD5,
                HashAlgorithm::SHA1,
                HashAlgorithm::RipeMD,
            ],
            insecure_ciphers: vec![
                SymmetricAlgorithm::Unencrypted,
                SymmetricAlgorithm::IDEA,
                SymmetricAlgorithm::TripleDES,
                SymmetricAlgorithm::CAST5,
            ],
        }
    }
}

impl KeySecurityPolicy {
    /// Returns the minimum RSA modulus bit length.
    pub fn min_rsa_bits(&self) -> usize {
        self.min_rsa_bits
    }

    /// Sets the minimum RSA modulus bit length.
    pub fn set_min_rsa_bits(mut self, bits: usize) -> Self {
        self.min_rsa_bits = bits;
        self
    }

    /// Sets the minimum DSA modulus bit length.
    pub fn set_min_dsa_bits(mut self, bits: usize) -> Self {
        self.min_dsa_bits = bits;
        self
    }

    /// Sets the minimum ElGamal modulus bit length.
    pub fn set_min_elgamal_bits(mut self, bits: usize) -> Self {
        self.min_elgamal_bits = bits;
        self
    }

    /// Replaces the set of accepted elliptic curves.
    pub fn set_curve_whitelist(mut self, curves: Vec<Curve>) -> Self {
        self.curve_whitelist = curves;
        self
    }

    /// Replaces the set of rejected digest algorithms.
    pub fn set_insecure_hashes(mut self, hashes: Vec<HashAlgorithm>) -> Self {
        self.insecure_hashes = hashes;
        self
    }

    /// Replaces the set of rejected symmetric ciphers.
    pub fn set_insecure_ciphers(mut self, ciphers: Vec<SymmetricAlgorithm>)
                                -> Self {
        self.insecure_ciphers = ciphers;
        self
    }

    /// Evaluates a key given its algorithm, modulus size, and curve.
    ///
    /// Returns at most one problem.  A key exactly at the configured
    /// minimum is secure; anything the policy cannot classify is
    /// [`KeyProblemKind::Unidentified`].
    pub fn evaluate_key_parts(&self,
                              key_id: &KeyID,
                              subkey_id: &KeyID,
                              algo: PublicKeyAlgorithm,
                              bits: Option<usize>,
                              curve: Option<&Curve>)
                              -> Option<KeyProblem> {
        let problem = |kind| Some(KeyProblem {
            key_id: key_id.clone(),
            subkey_id: subkey_id.clone(),
            algo,
            kind,
        });

        let check_bits = |minimum| match bits {
            Some(bits) if bits >= minimum => None,
            Some(bits) =>
                problem(KeyProblemKind::InsecureBitStrength { bits }),
            // Cannot even measure the modulus.
            None => problem(KeyProblemKind::Unidentified),
        };

        #[allow(deprecated)]
        match algo {
            PublicKeyAlgorithm::RSAEncryptSign
                | PublicKeyAlgorithm::RSAEncrypt
                | PublicKeyAlgorithm::RSASign =>
                check_bits(self.min_rsa_bits),

            PublicKeyAlgorithm::DSA =>
                check_bits(self.min_dsa_bits),

            PublicKeyAlgorithm::ElGamalEncrypt
                | PublicKeyAlgorithm::ElGamalEncryptSign =>
                check_bits(self.min_elgamal_bits),

            PublicKeyAlgorithm::ECDH
                | PublicKeyAlgorithm::ECDSA
                | PublicKeyAlgorithm::EdDSA =>
                match curve {
                    Some(c) if self.curve_whitelist.contains(c) => None,
                    Some(c) => problem(KeyProblemKind::NotWhitelistedCurve {
                        curve: c.clone(),
                    }),
                    None => problem(KeyProblemKind::Unidentified),
                },

            _ => problem(KeyProblemKind::Unidentified),
        }
    }

    /// Evaluates a parsed key against the policy.
    ///
    /// `key_id` names the ring the key belongs to.
    pub fn evaluate_key<R>(&self,
                           key_id: &KeyID,
                           key: &Key<key::PublicParts, R>)
                           -> Option<KeyProblem>
    where
        R: key::KeyRole,
    {
        let curve = match key.mpis() {
            mpi::PublicKey::EdDSA { curve, .. } => Some(curve),
            mpi::PublicKey::ECDSA { curve, .. } => Some(curve),
            mpi::PublicKey::ECDH { curve, .. } => Some(curve),
            _ => None,
        };

        self.evaluate_key_parts(key_id, &key.keyid(), key.pk_algo(),
                                key.mpis().bits(), curve)
    }

    /// Evaluates a signature digest algorithm.
    ///
    /// Returns the offending algorithm if it is below policy or
    /// cannot be classified.
    pub fn evaluate_hash(&self, hash: HashAlgorithm)
                         -> Option<HashAlgorithm> {
        let unknown = matches!(hash,
                               HashAlgorithm::Private(_)
                               | HashAlgorithm::Unknown(_));
        if unknown || self.insecure_hashes.contains(&hash) {
            Some(hash)
        } else {
            None
        }
    }

    /// Evaluates a symmetric cipher.
    pub fn evaluate_symmetric(&self, cipher: SymmetricAlgorithm)
                              -> Option<SymmetricProblem> {
        let unknown = matches!(cipher,
                               SymmetricAlgorithm::Private(_)
                               | SymmetricAlgorithm::Unknown(_));
        if unknown || self.insecure_ciphers.contains(&cipher) {
            Some(SymmetricProblem::InsecureAlgorithm(cipher))
        } else {
            None
        }
    }

    /// Checks for integrity protection of symmetrically encrypted
    /// data.
    ///
    /// Independent of [`evaluate_symmetric`]; both checks may fire
    /// for the same message.
    ///
    /// [`evaluate_symmetric`]: KeySecurityPolicy::evaluate_symmetric
    pub fn evaluate_integrity_protection(&self, protected: bool)
                                         -> Option<SymmetricProblem> {
        if protected {
            None
        } else {
            Some(SymmetricProblem::MissingMdc)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (KeyID, KeyID) {
        (KeyID::from(0x0123_4567_89AB_CDEF),
         KeyID::from(0xFEDC_BA98_7654_3210))
    }

    #[test]
    fn rsa_boundary_at_minimum_is_secure() {
        let p = KeySecurityPolicy::default();
        let (ring, sub) = ids();
        assert_eq!(p.evaluate_key_parts(
            &ring, &sub, PublicKeyAlgorithm::RSAEncryptSign,
            Some(2048), None), None);
    }

    #[test]
    fn rsa_below_minimum_is_insecure() {
        let p = KeySecurityPolicy::default();
        let (ring, sub) = ids();
        let problem = p.evaluate_key_parts(
            &ring, &sub, PublicKeyAlgorithm::RSAEncryptSign,
            Some(1024), None).expect("below minimum");
        assert_eq!(problem.kind,
                   KeyProblemKind::InsecureBitStrength { bits: 1024 });
        assert_eq!(problem.key_id, ring);
        assert_eq!(problem.subkey_id, sub);
    }

    #[test]
    fn dsa_and_elgamal_have_their_own_minimums() {
        let p = KeySecurityPolicy::default()
            .set_min_dsa_bits(3072)
            .set_min_elgamal_bits(1024);
        let (ring, sub) = ids();
        assert!(p.evaluate_key_parts(
            &ring, &sub, PublicKeyAlgorithm::DSA,
            Some(2048), None).is_some());
        assert!(p.evaluate_key_parts(
            &ring, &sub, PublicKeyAlgorithm::ElGamalEncrypt,
            Some(2048), None).is_none());
    }

    #[test]
    fn whitelisted_curve_is_secure() {
        let p = KeySecurityPolicy::default();
        let (ring, sub) = ids();
        assert_eq!(p.evaluate_key_parts(
            &ring, &sub, PublicKeyAlgorithm::EdDSA,
            None, Some(&Curve::Ed25519)), None);
    }

    #[test]
    fn unlisted_curve_is_rejected() {
        let p = KeySecurityPolicy::default()
            .set_curve_whitelist(vec![Curve::NistP384]);
        let (ring, sub) = ids();
        let problem = p.evaluate_key_parts(
            &ring, &sub, PublicKeyAlgorithm::ECDH,
            None, Some(&Curve::Cv25519)).expect("not whitelisted");
        assert_eq!(problem.kind, KeyProblemKind::NotWhitelistedCurve {
            curve: Curve::Cv25519,
        });
    }

    #[test]
    fn unknown_algorithm_fails_closed() {
        let p = KeySecurityPolicy::default();
        let (ring, sub) = ids();
        let problem = p.evaluate_key_parts(
            &ring, &sub, PublicKeyAlgorithm::Unknown(99),
            Some(4096), None).expect("unknown algorithm");
        assert_eq!(problem.kind, KeyProblemKind::Unidentified);

        // An ECC key whose curve could not be determined is equally
        // unidentifiable.
        let problem = p.evaluate_key_parts(
            &ring, &sub, PublicKeyAlgorithm::ECDSA,
            None, None).expect("no curve");
        assert_eq!(problem.kind, KeyProblemKind::Unidentified);
    }

    #[test]
    fn hash_policy() {
        let p = KeySecurityPolicy::default();
        assert_eq!(p.evaluate_hash(HashAlgorithm::SHA1),
                   Some(HashAlgorithm::SHA1));
        assert_eq!(p.evaluate_hash(HashAlgorithm::SHA256), None);
        // Fail closed on unknown digests.
        assert_eq!(p.evaluate_hash(HashAlgorithm::Unknown(123)),
                   Some(HashAlgorithm::Unknown(123)));
    }

    #[test]
    fn symmetric_policy() {
        let p = KeySecurityPolicy::default();
        #[allow(deprecated)]
        {
            assert_eq!(
                p.evaluate_symmetric(SymmetricAlgorithm::TripleDES),
                Some(SymmetricProblem::InsecureAlgorithm(
                    SymmetricAlgorithm::TripleDES)));
        }
        assert_eq!(p.evaluate_symmetric(SymmetricAlgorithm::AES256), None);
        assert_eq!(p.evaluate_integrity_protection(true), None);
        assert_eq!(p.evaluate_integrity_protection(false),
                   Some(SymmetricProblem::MissingMdc));
    }
}
