//! Immutable descriptors exchanged with the orchestration layer.
//!
//! A sign/encrypt operation is described by a [`SignEncryptRequest`]
//! before it runs; a decrypt-and-verify operation reports back
//! through a [`DecryptionResult`].  Both are plain values: the
//! orchestrating layer can hold them, queue them, or ship them
//! across a process boundary without touching this crate again.

use sequoia_openpgp as openpgp;
use openpgp::KeyID;
use openpgp::crypto::SessionKey;
use openpgp::types::{
    CompressionAlgorithm,
    HashAlgorithm,
    SymmetricAlgorithm,
};

use crate::problems::{DecryptVerifyProblems, DecryptVerifyProblemsBuilder};

/// Where the data for an operation comes from.
///
/// Exactly one of the two: either the bytes themselves, or a locator
/// the orchestrating layer knows how to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    /// The input data itself.
    Bytes(Vec<u8>),
    /// A resource locator resolved by the caller.
    Locator(String),
}

assert_send_and_sync!(InputSource);

/// An immutable description of a sign and/or encrypt operation.
#[derive(Clone, Debug)]
pub struct SignEncryptRequest {
    input: InputSource,
    output: String,
    symmetric_algo: SymmetricAlgorithm,
    hash_algo: HashAlgorithm,
    compression: Option<CompressionAlgorithm>,
    armor: bool,
    sign_key: Option<KeyID>,
    encrypt_to: Vec<KeyID>,
}

assert_send_and_sync!(SignEncryptRequest);

impl SignEncryptRequest {
    /// Describes an operation reading from `input` and writing to
    /// the resource at `output`.
    ///
    /// The defaults are AES-256, SHA-512, no compression, binary
    /// output, no signing, and no recipients; adjust with the
    /// `set_*` methods.
    pub fn new(input: InputSource, output: impl Into<String>) -> Self {
        SignEncryptRequest {
            input,
            output: output.into(),
            symmetric_algo: SymmetricAlgorithm::AES256,
            hash_algo: HashAlgorithm::SHA512,
            compression: None,
            armor: false,
            sign_key: None,
            encrypt_to: Vec::new(),
        }
    }

    /// Sets the symmetric algorithm to encrypt with.
    pub fn set_symmetric_algo(mut self, algo: SymmetricAlgorithm) -> Self {
        self.symmetric_algo = algo;
        self
    }

    /// Sets the digest algorithm to sign with.
    pub fn set_hash_algo(mut self, algo: HashAlgorithm) -> Self {
        self.hash_algo = algo;
        self
    }

    /// Sets the compression algorithm, if any.
    pub fn set_compression(mut self, algo: Option<CompressionAlgorithm>)
                           -> Self {
        self.compression = algo;
        self
    }

    /// Requests ASCII-armored output.
    pub fn set_armor(mut self, armor: bool) -> Self {
        self.armor = armor;
        self
    }

    /// Sets the key ring to sign with, if the operation signs.
    pub fn set_sign_key(mut self, key_id: Option<KeyID>) -> Self {
        self.sign_key = key_id;
        self
    }

    /// Sets the key rings to encrypt to, if the operation encrypts.
    pub fn set_encrypt_to(mut self, key_ids: Vec<KeyID>) -> Self {
        self.encrypt_to = key_ids;
        self
    }

    /// Returns the input source.
    pub fn input(&self) -> &InputSource {
        &self.input
    }

    /// Returns the output resource locator.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Returns the symmetric algorithm to encrypt with.
    pub fn symmetric_algo(&self) -> SymmetricAlgorithm {
        self.symmetric_algo
    }

    /// Returns the digest algorithm to sign with.
    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    /// Returns the compression algorithm, if any.
    pub fn compression(&self) -> Option<CompressionAlgorithm> {
        self.compression
    }

    /// Returns whether the output is ASCII armored.
    pub fn armor(&self) -> bool {
        self.armor
    }

    /// Returns the key ring to sign with, if any.
    pub fn sign_key(&self) -> Option<&KeyID> {
        self.sign_key.as_ref()
    }

    /// Returns the key rings to encrypt to.
    pub fn encrypt_to(&self) -> &[KeyID] {
        &self.encrypt_to
    }
}

/// A recovered session key together with its encrypted form.
///
/// Coupling the two makes the invariant structural: the plaintext
/// session key is present exactly when the encrypted one is.
#[derive(Clone, Debug)]
pub struct SessionKeyPair {
    session_key: SessionKey,
    encrypted_session_key: Box<[u8]>,
}

assert_send_and_sync!(SessionKeyPair);

impl SessionKeyPair {
    /// Couples a decrypted session key with its encrypted form.
    pub fn new(session_key: SessionKey,
               encrypted_session_key: impl Into<Box<[u8]>>) -> Self {
        SessionKeyPair {
            session_key,
            encrypted_session_key: encrypted_session_key.into(),
        }
    }

    /// Returns the decrypted session key.
    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    /// Returns the encrypted session key.
    pub fn encrypted_session_key(&self) -> &[u8] {
        &self.encrypted_session_key
    }
}

/// What a decrypt-and-verify operation found.
#[derive(Clone, Debug)]
pub enum DecryptionOutcome {
    /// A security problem was found; the report is never empty.
    Insecure(DecryptVerifyProblems),
    /// Successfully decrypted, no problem found.
    Encrypted,
    /// The input was not encrypted data.
    NotEncrypted,
}

assert_send_and_sync!(DecryptionOutcome);

/// The result of one decrypt-and-verify operation.
#[derive(Clone, Debug)]
pub struct DecryptionResult {
    outcome: DecryptionOutcome,
    session_key: Option<SessionKeyPair>,
}

assert_send_and_sync!(DecryptionResult);

impl DecryptionResult {
    /// Returns what the operation found.
    pub fn outcome(&self) -> &DecryptionOutcome {
        &self.outcome
    }

    /// Returns the recovered session key, when available.
    pub fn session_key(&self) -> Option<&SessionKeyPair> {
        self.session_key.as_ref()
    }
}

/// Accumulates the findings of a decrypt-and-verify operation.
#[derive(Debug, Default)]
pub struct DecryptionResultBuilder {
    encrypted: bool,
    problems: DecryptVerifyProblemsBuilder,
    session_key: Option<SessionKeyPair>,
}

assert_send_and_sync!(DecryptionResultBuilder);

impl DecryptionResultBuilder {
    /// Returns a builder for an operation that has seen no
    /// encrypted data yet.
    pub fn new() -> Self {
        Default::default()
    }

    /// Records that the input was encrypted data.
    pub fn mark_encrypted(&mut self) -> &mut Self {
        self.encrypted = true;
        self
    }

    /// Gives access to the per-category problem slots.
    pub fn problems(&mut self) -> &mut DecryptVerifyProblemsBuilder {
        &mut self.problems
    }

    /// Records the recovered session key and its encrypted form.
    pub fn set_session_key(&mut self, pair: SessionKeyPair) -> &mut Self {
        self.session_key = Some(pair);
        self
    }

    /// Finalizes the result.
    ///
    /// Any recorded problem makes the outcome `Insecure`; otherwise
    /// the outcome reflects whether encrypted data was seen at all.
    pub fn build(self) -> DecryptionResult {
        let outcome = match (self.encrypted, self.problems.build()) {
            (_, Some(problems)) => DecryptionOutcome::Insecure(problems),
            (true, None) => DecryptionOutcome::Encrypted,
            (false, None) => DecryptionOutcome::NotEncrypted,
        };
        DecryptionResult {
            outcome,
            session_key: self.session_key,
        }
    }
}
