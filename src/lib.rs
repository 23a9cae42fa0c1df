//! Managing OpenPGP key rings at increasing levels of validation.
//!
//! This crate sits between an OpenPGP packet library and an
//! application that has to answer questions like "which subkey do I
//! encrypt to?", "is this key safe to use?", and "have I already paid
//! for this passphrase-based key derivation?".  It models key rings
//! in three tiers:
//!
//!   - [`RawKeyRing`]: freshly parsed material, no validation done,
//!   - [`WrappedKeyRing`]: structurally validated, answers per-subkey
//!     capability queries and performs subkey selection,
//!   - [`CachedKeyRing`]: an immutable, allocation-light summary for
//!     comparison, sorting, and display.
//!
//! Security evaluation is driven by an injected [`KeySecurityPolicy`]
//! and surfaces findings as values of the closed [`SecurityProblem`]
//! taxonomy, which a decrypt-and-verify pipeline aggregates with
//! [`DecryptVerifyProblemsBuilder`].  Expensive string-to-key
//! derivations are memoized by the [`SessionKeyCache`], keyed on
//! [`S2kParams`] extracted from the secret key's packet data.
//!
//! Packet parsing, armor handling, and the cryptographic primitives
//! themselves are delegated to [`sequoia-openpgp`]; this crate never
//! touches the wire format or a cipher directly.
//!
//! [`sequoia-openpgp`]: https://docs.rs/sequoia-openpgp
//!
//! # Examples
//!
//! Validate a parsed key ring and select the encryption subkey:
//!
//! ```no_run
//! use openpgp_keyring::{KeySecurityPolicy, RawKeyRing, VerificationLevel};
//!
//! # fn f(public: &[u8]) -> openpgp_keyring::Result<()> {
//! let raw = RawKeyRing::from_bytes(public, None)?;
//! let ring = raw.validate(VerificationLevel::Unverified)?;
//! let policy = KeySecurityPolicy::default();
//! let subkey = ring.encryption_subkey(&policy)?;
//! assert!(subkey.can_encrypt());
//! # Ok(()) }
//! ```

#![warn(missing_docs)]

use sequoia_openpgp::KeyID;

#[macro_use]
mod macros;

pub mod keyring;
pub use keyring::{
    CachedKeyRing,
    KeyRing,
    RawKeyRing,
    WrappedKey,
    WrappedKeyRing,
};
pub mod ops;
pub mod policy;
pub use policy::KeySecurityPolicy;
pub mod problems;
pub use problems::{
    DecryptVerifyProblems,
    DecryptVerifyProblemsBuilder,
    SecurityProblem,
};
pub mod provider;
pub mod session_cache;
pub use session_cache::{S2kParams, SessionKeyCache};
mod types;
pub use types::VerificationLevel;

/// Results for openpgp-keyring.
pub type Result<T> = ::std::result::Result<T, anyhow::Error>;

#[derive(thiserror::Error, Debug)]
/// Errors returned from key-ring management.
#[non_exhaustive]
pub enum Error {
    /// Malformed key-ring material.
    ///
    /// Fatal to the key ring in question, but not to the caller:
    /// other key rings remain usable.
    #[error("Malformed key ring: {0}")]
    Structural(String),

    /// A requested key was not found.
    #[error("Key {0} not found")]
    KeyNotFound(KeyID),

    /// The ring exists, but no subkey satisfies the capability and
    /// security requirements.
    #[error("No usable subkey on key ring {key_ring}")]
    NoUsableSubkey {
        /// The ring that was searched.
        key_ring: KeyID,
        /// The security problem that disqualified the designated
        /// subkey, if it was disqualified by policy rather than by a
        /// missing capability.
        problem: Option<SecurityProblem>,
    },

    /// A key or algorithm is classified insecure under the current
    /// policy.
    ///
    /// Never silently downgraded; surfaced so that the caller can
    /// decide whether to proceed, warn, or refuse.
    #[error("Security policy violation: {0}")]
    PolicyViolation(SecurityProblem),

    /// The passphrase source has nothing cached for this key.
    ///
    /// Recoverable by prompting for a passphrase.
    #[error("No cached secret for key {0}")]
    NoSecretKey(KeyID),

    /// An argument was invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

assert_send_and_sync!(Error);
