//! The security-problem taxonomy and its aggregation.
//!
//! Every way a key or algorithm can be unsafe is a variant of the
//! closed [`SecurityProblem`] sum type.  Variants carry only the data
//! needed to explain the problem to a user or a log line, never key
//! material.  A decrypt-and-verify operation collects its findings
//! into an optional [`DecryptVerifyProblems`] report through the
//! [`DecryptVerifyProblemsBuilder`] accumulator.

use std::fmt;

use sequoia_openpgp as openpgp;
use openpgp::KeyID;
use openpgp::types::{
    Curve,
    HashAlgorithm,
    PublicKeyAlgorithm,
    SymmetricAlgorithm,
};

/// Why an asymmetric key was rejected.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyProblemKind {
    /// The key is shorter than the policy minimum for its algorithm
    /// family.
    InsecureBitStrength {
        /// The key's modulus bit length.
        bits: usize,
    },

    /// The key lives on an elliptic curve that is not in the
    /// accepted set.
    NotWhitelistedCurve {
        /// The offending curve.
        curve: Curve,
    },

    /// The key's capability or algorithm could not be classified at
    /// all.  Unknown is treated as insecure, never as acceptable.
    Unidentified,
}

/// A problem with a specific asymmetric key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyProblem {
    /// The master key id of the ring the key belongs to.
    pub key_id: KeyID,
    /// The id of the offending (sub)key.
    pub subkey_id: KeyID,
    /// The key's public-key algorithm.
    pub algo: PublicKeyAlgorithm,
    /// What is wrong with the key.
    pub kind: KeyProblemKind,
}

assert_send_and_sync!(KeyProblem);

impl fmt::Display for KeyProblem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            KeyProblemKind::InsecureBitStrength { bits } =>
                write!(f, "{} key {} has insecure bit strength {}",
                       self.algo, self.subkey_id, bits),
            KeyProblemKind::NotWhitelistedCurve { curve } =>
                write!(f, "key {} uses non-whitelisted curve {}",
                       self.subkey_id, curve),
            KeyProblemKind::Unidentified =>
                write!(f, "key {} could not be classified (algorithm {})",
                       self.subkey_id, self.algo),
        }
    }
}

/// A problem with the symmetric layer of an encrypted message.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymmetricProblem {
    /// The cipher is on the blacklist.
    InsecureAlgorithm(SymmetricAlgorithm),

    /// The symmetrically encrypted data lacks integrity protection.
    MissingMdc,
}

assert_send_and_sync!(SymmetricProblem);

impl fmt::Display for SymmetricProblem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymmetricProblem::InsecureAlgorithm(a) =>
                write!(f, "insecure symmetric algorithm {}", a),
            SymmetricProblem::MissingMdc =>
                f.write_str("encrypted data is not integrity protected"),
        }
    }
}

/// Classifies why a key or algorithm is unsafe.
///
/// This is a closed set: the evaluator and the aggregator match
/// exhaustively over it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecurityProblem {
    /// A problem with an asymmetric key.
    Key(KeyProblem),

    /// A signature uses a digest algorithm below policy.
    InsecureHash(HashAlgorithm),

    /// A problem with the symmetric layer.
    Symmetric(SymmetricProblem),
}

assert_send_and_sync!(SecurityProblem);

impl fmt::Display for SecurityProblem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SecurityProblem::Key(p) => p.fmt(f),
            SecurityProblem::InsecureHash(h) =>
                write!(f, "insecure hash algorithm {}", h),
            SecurityProblem::Symmetric(p) => p.fmt(f),
        }
    }
}

impl From<KeyProblem> for SecurityProblem {
    fn from(p: KeyProblem) -> Self {
        SecurityProblem::Key(p)
    }
}

impl From<SymmetricProblem> for SecurityProblem {
    fn from(p: SymmetricProblem) -> Self {
        SecurityProblem::Symmetric(p)
    }
}

/// The problems found during one decrypt-and-verify operation.
///
/// At most one problem per category.  An instance of this type
/// always contains at least one problem: if nothing was found, the
/// builder collapses to `None` instead of producing an empty report,
/// and callers branch on presence, not on field values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptVerifyProblems {
    encryption_key: Option<KeyProblem>,
    signing_key: Option<KeyProblem>,
    symmetric: Option<SymmetricProblem>,
    signature_hash: Option<HashAlgorithm>,
}

assert_send_and_sync!(DecryptVerifyProblems);

impl DecryptVerifyProblems {
    /// Returns the problem with the encryption key, if any.
    pub fn encryption_key(&self) -> Option<&KeyProblem> {
        self.encryption_key.as_ref()
    }

    /// Returns the problem with the signing key, if any.
    pub fn signing_key(&self) -> Option<&KeyProblem> {
        self.signing_key.as_ref()
    }

    /// Returns the problem with the symmetric layer, if any.
    pub fn symmetric(&self) -> Option<&SymmetricProblem> {
        self.symmetric.as_ref()
    }

    /// Returns the insecure signature digest algorithm, if any.
    pub fn signature_hash(&self) -> Option<HashAlgorithm> {
        self.signature_hash
    }

    /// Iterates over all recorded problems.
    pub fn iter(&self) -> impl Iterator<Item = SecurityProblem> + '_ {
        self.encryption_key.clone().map(SecurityProblem::Key).into_iter()
            .chain(self.signing_key.clone().map(SecurityProblem::Key))
            .chain(self.symmetric.clone().map(SecurityProblem::Symmetric))
            .chain(self.signature_hash.map(SecurityProblem::InsecureHash))
    }
}

/// Accumulates problems found during one decrypt-and-verify
/// operation.
///
/// Each category has one slot; writing a slot twice keeps the last
/// value, since detection runs once per category in the pipeline and
/// the most recent finding is authoritative.  [`build`] is the
/// terminal operation.
///
/// [`build`]: DecryptVerifyProblemsBuilder::build
#[derive(Clone, Debug, Default)]
pub struct DecryptVerifyProblemsBuilder {
    encryption_key: Option<KeyProblem>,
    signing_key: Option<KeyProblem>,
    symmetric: Option<SymmetricProblem>,
    signature_hash: Option<HashAlgorithm>,
}

assert_send_and_sync!(DecryptVerifyProblemsBuilder);

impl DecryptVerifyProblemsBuilder {
    /// Returns a builder with all slots empty.
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a problem with the encryption key.
    pub fn set_encryption_key_problem(&mut self, p: KeyProblem) -> &mut Self {
        self.encryption_key = Some(p);
        self
    }

    /// Records a problem with the signing key.
    pub fn set_signing_key_problem(&mut self, p: KeyProblem) -> &mut Self {
        self.signing_key = Some(p);
        self
    }

    /// Records a problem with the symmetric layer.
    pub fn set_symmetric_problem(&mut self, p: SymmetricProblem) -> &mut Self {
        self.symmetric = Some(p);
        self
    }

    /// Records an insecure signature digest algorithm.
    pub fn set_signature_hash_problem(&mut self, h: HashAlgorithm) -> &mut Self {
        self.signature_hash = Some(h);
        self
    }

    /// Finalizes the report.
    ///
    /// Returns `None` if no slot was ever written; downstream code
    /// treats "no report" and "report with zero problems" as the
    /// same no-problem state, so the latter is never produced.
    pub fn build(self) -> Option<DecryptVerifyProblems> {
        if self.encryption_key.is_none()
            && self.signing_key.is_none()
            && self.symmetric.is_none()
            && self.signature_hash.is_none()
        {
            return None;
        }

        Some(DecryptVerifyProblems {
            encryption_key: self.encryption_key,
            signing_key: self.signing_key,
            symmetric: self.symmetric,
            signature_hash: self.signature_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_problem(bits: usize) -> KeyProblem {
        KeyProblem {
            key_id: KeyID::from(0xAABB_CCDD_EEFF_0011),
            subkey_id: KeyID::from(0x1122_3344_5566_7788),
            algo: PublicKeyAlgorithm::RSAEncryptSign,
            kind: KeyProblemKind::InsecureBitStrength { bits },
        }
    }

    #[test]
    fn empty_builder_collapses_to_none() {
        assert!(DecryptVerifyProblemsBuilder::new().build().is_none());
    }

    #[test]
    fn single_slot_populated() {
        let mut b = DecryptVerifyProblemsBuilder::new();
        b.set_symmetric_problem(SymmetricProblem::MissingMdc);
        let report = b.build().expect("one slot was written");
        assert_eq!(report.symmetric(), Some(&SymmetricProblem::MissingMdc));
        assert!(report.encryption_key().is_none());
        assert!(report.signing_key().is_none());
        assert!(report.signature_hash().is_none());
        assert_eq!(report.iter().count(), 1);
    }

    #[test]
    fn last_write_wins_per_slot() {
        let mut b = DecryptVerifyProblemsBuilder::new();
        b.set_signing_key_problem(key_problem(1024));
        b.set_signing_key_problem(key_problem(768));
        let report = b.build().unwrap();
        assert_eq!(report.signing_key(), Some(&key_problem(768)));
    }

    #[test]
    fn slots_are_independent() {
        let mut b = DecryptVerifyProblemsBuilder::new();
        b.set_encryption_key_problem(key_problem(1024))
            .set_signature_hash_problem(HashAlgorithm::SHA1);
        let report = b.build().unwrap();
        assert_eq!(report.encryption_key(), Some(&key_problem(1024)));
        assert_eq!(report.signature_hash(), Some(HashAlgorithm::SHA1));
        assert!(report.symmetric().is_none());
        assert_eq!(report.iter().count(), 2);
    }

    #[test]
    fn display_mentions_the_subkey() {
        let p = SecurityProblem::Key(key_problem(1024));
        let s = p.to_string();
        assert!(s.contains("1122334455667788"));
        assert!(s.contains("1024"));
    }
}
