//! Seams to the external collaborators.
//!
//! This crate never prompts for passphrases and never persists key
//! material; both concerns live behind narrow traits implemented by
//! the orchestrating layer.

use sequoia_openpgp as openpgp;
use openpgp::KeyID;
use openpgp::crypto::Password;

use crate::Result;
use crate::keyring::WrappedKeyRing;

/// Hands out passphrases the user has already entered.
///
/// Consulted only when a session key is not found in the
/// [`SessionKeyCache`].
///
/// [`SessionKeyCache`]: crate::SessionKeyCache
pub trait PassphraseSource {
    /// Returns the cached passphrase for the given subkey.
    ///
    /// Fails with [`Error::NoSecretKey`] if nothing is cached; the
    /// caller recovers by prompting.
    ///
    /// [`Error::NoSecretKey`]: crate::Error::NoSecretKey
    fn cached_passphrase(&self, subkey_id: &KeyID) -> Result<Password>;

    /// Like [`cached_passphrase`], with the master key id for
    /// disambiguation when the same subkey id appears on several
    /// rings.
    ///
    /// [`cached_passphrase`]: PassphraseSource::cached_passphrase
    fn cached_passphrase_for(&self, _master_key_id: &KeyID,
                             subkey_id: &KeyID) -> Result<Password> {
        self.cached_passphrase(subkey_id)
    }
}

/// Resolves key ids to key-ring material.
pub trait KeyProvider {
    /// Returns the public ring identified by the given master or
    /// subkey id.
    ///
    /// Fails with [`Error::KeyNotFound`] if the id is unknown.
    ///
    /// [`Error::KeyNotFound`]: crate::Error::KeyNotFound
    fn public_ring(&self, key_id: &KeyID) -> Result<WrappedKeyRing>;

    /// Returns the ring with secret material identified by the given
    /// master or subkey id.
    ///
    /// Fails with [`Error::KeyNotFound`] if the id is unknown or no
    /// secret material is available for it.
    fn secret_ring(&self, key_id: &KeyID) -> Result<WrappedKeyRing>;
}
