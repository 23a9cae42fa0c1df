//! Key rings at increasing levels of validation.
//!
//! A key ring moves through three tiers:
//!
//!   - [`RawKeyRing`]: freshly parsed public material plus an
//!     optional matching secret block; a transport form, nothing has
//!     been checked,
//!   - [`WrappedKeyRing`]: produced by [`RawKeyRing::validate`];
//!     structurally sound, carries a verification level and answers
//!     per-subkey capability queries,
//!   - [`CachedKeyRing`]: produced by [`WrappedKeyRing::summarize`];
//!     a denormalized, immutable snapshot for fast comparison and
//!     display without materializing the full structure.
//!
//! All tiers that can answer them share the [`KeyRing`] capability
//! interface.  A ring is identified by exactly one master key id;
//! subkey ids are distinct from the master id and from each other.

use sequoia_openpgp as openpgp;
use openpgp::{Fingerprint, KeyID};

use crate::Result;
use crate::types::VerificationLevel;

mod raw;
pub use raw::RawKeyRing;
mod wrapped;
pub use wrapped::{WrappedKey, WrappedKeyRing};
mod cached;
pub use cached::CachedKeyRing;

/// The capability set any concrete key-ring tier must answer.
///
/// Accessors are fallible: the underlying material may be malformed
/// or lack a usable self-certification.
pub trait KeyRing {
    /// Returns the master key id identifying this ring.
    fn key_id(&self) -> Result<KeyID>;

    /// Returns the master key's fingerprint.
    fn fingerprint(&self) -> Result<Fingerprint>;

    /// Returns the primary user id as a display string, if the ring
    /// has one.
    fn primary_user_id(&self) -> Result<Option<String>>;

    /// Returns whether the ring is revoked.
    fn is_revoked(&self) -> Result<bool>;

    /// Returns whether the master key may certify other keys.
    fn can_certify(&self) -> Result<bool>;

    /// Returns the id of the subkey currently designated as the
    /// ring's encryption target.
    ///
    /// Fails with [`Error::NoUsableSubkey`] if there is none.
    ///
    /// [`Error::NoUsableSubkey`]: crate::Error::NoUsableSubkey
    fn encrypt_subkey_id(&self) -> Result<KeyID>;

    /// Returns whether the ring has a designated encryption subkey.
    fn has_encrypt_subkey(&self) -> Result<bool>;

    /// Returns the id of the subkey currently designated as the
    /// ring's signing target.
    ///
    /// Fails with [`Error::NoUsableSubkey`] if there is none.
    ///
    /// [`Error::NoUsableSubkey`]: crate::Error::NoUsableSubkey
    fn sign_subkey_id(&self) -> Result<KeyID>;

    /// Returns whether the ring has a designated signing subkey.
    fn has_sign_subkey(&self) -> Result<bool>;

    /// Returns how strongly this ring's identity has been
    /// corroborated.
    fn verification(&self) -> VerificationLevel;
}
