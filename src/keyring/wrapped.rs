//! The wrapped tier: validated key rings and per-subkey views.

use std::sync::OnceLock;

use sequoia_openpgp as openpgp;
use openpgp::{Cert, Fingerprint, KeyID};
use openpgp::cert::amalgamation::ValidAmalgamation;
use openpgp::crypto::{mpi, Password, SessionKey};
use openpgp::packet::key::SecretKeyMaterial;
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::SerializeInto;
use openpgp::types::{Curve, KeyFlags, PublicKeyAlgorithm, RevocationStatus};

use crate::Error;
use crate::Result;
use crate::policy::KeySecurityPolicy;
use crate::problems::KeyProblem;
use crate::provider::PassphraseSource;
use crate::session_cache::{derive_session_key, S2kParams, SessionKeyCache};
use crate::types::VerificationLevel;

use super::{CachedKeyRing, KeyRing};

/// A structurally validated key ring.
///
/// Produced by [`RawKeyRing::validate`], or restored from a
/// serialized blob that was validated on an earlier run.  The full
/// parsed structure is materialized from the blob lazily, on first
/// access, and cached for the ring's lifetime; concurrent first
/// accesses materialize exactly once.
///
/// Immutable after construction and safe to share for reads across
/// threads.
///
/// [`RawKeyRing::validate`]: super::RawKeyRing::validate
#[derive(Clone, Debug)]
pub struct WrappedKeyRing {
    blob: Vec<u8>,
    cert: OnceLock<std::result::Result<Cert, String>>,
    level: VerificationLevel,
}

assert_send_and_sync!(WrappedKeyRing);

impl WrappedKeyRing {
    /// Wraps an already validated cert.
    pub(crate) fn from_cert(cert: Cert, level: VerificationLevel)
                            -> Result<Self> {
        let blob = if cert.is_tsk() {
            cert.as_tsk().to_vec()?
        } else {
            cert.to_vec()?
        };

        let slot = OnceLock::new();
        let _ = slot.set(Ok(cert));
        Ok(WrappedKeyRing { blob, cert: slot, level })
    }

    /// Restores a wrapped ring from its serialized form.
    ///
    /// The blob must have gone through [`RawKeyRing::validate`]
    /// before it was stored; it is not re-validated here, and
    /// parsing is deferred until the ring is first used.
    ///
    /// [`RawKeyRing::validate`]: super::RawKeyRing::validate
    pub fn from_bytes(blob: impl Into<Vec<u8>>, level: VerificationLevel)
                      -> Self {
        WrappedKeyRing {
            blob: blob.into(),
            cert: OnceLock::new(),
            level,
        }
    }

    /// Returns the serialized form of this ring.
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    /// Returns the materialized structure, parsing it on first use.
    pub(crate) fn cert(&self) -> Result<&Cert> {
        match self.cert.get_or_init(
            || Cert::from_bytes(&self.blob).map_err(|e| e.to_string()))
        {
            Ok(cert) => Ok(cert),
            Err(e) => Err(Error::Structural(e.clone()).into()),
        }
    }

    /// Returns whether any key in this ring carries secret material.
    pub fn has_any_secret(&self) -> Result<bool> {
        Ok(self.cert()?.is_tsk())
    }

    /// Iterates over the ring's keys, primary key first.
    ///
    /// Only keys with a valid binding are yielded.  Each call
    /// produces a fresh iterator over the same underlying material;
    /// the iterated structure cannot be mutated through this view.
    pub fn keys(&self) -> Result<impl Iterator<Item = WrappedKey<'_>> + '_> {
        Ok(self.snapshot_keys()?.into_iter())
    }

    /// Snapshots the ring's keys under the standard policy.
    fn snapshot_keys(&self) -> Result<Vec<WrappedKey<'_>>> {
        let cert = self.cert()?;
        let p = StandardPolicy::new();
        let vc = cert.with_policy(&p, None)
            .map_err(|e| Error::Structural(e.to_string()))?;

        let master = cert.keyid();
        let mut keys = Vec::new();
        for ka in vc.keys() {
            let key = ka.key();
            let curve = match key.mpis() {
                mpi::PublicKey::EdDSA { curve, .. } => Some(curve.clone()),
                mpi::PublicKey::ECDSA { curve, .. } => Some(curve.clone()),
                mpi::PublicKey::ECDH { curve, .. } => Some(curve.clone()),
                _ => None,
            };

            keys.push(WrappedKey {
                ring: self,
                master_key_id: master.clone(),
                key_id: key.keyid(),
                fingerprint: key.fingerprint(),
                primary: key.keyid() == master,
                algo: key.pk_algo(),
                bits: key.mpis().bits(),
                curve,
                flags: ka.key_flags(),
                revoked: matches!(ka.revocation_status(),
                                  RevocationStatus::Revoked(_)),
                expired: ka.alive().is_err(),
                has_secret: key.has_secret(),
            });
        }
        Ok(keys)
    }

    /// Returns the id of the subkey designated as the ring's
    /// encryption target, if any.
    ///
    /// Subkeys are preferred over the primary key.  Designation only
    /// considers liveness and capability flags; the security policy
    /// is applied by [`encryption_subkey`].
    ///
    /// [`encryption_subkey`]: WrappedKeyRing::encryption_subkey
    pub fn encrypt_id(&self) -> Result<Option<KeyID>> {
        self.designate(|k| k.can_encrypt())
    }

    /// Returns the id of the subkey designated as the ring's signing
    /// target, if any.
    pub fn sign_id(&self) -> Result<Option<KeyID>> {
        self.designate(|k| k.can_sign())
    }

    fn designate(&self, capable: impl Fn(&WrappedKey) -> bool)
                 -> Result<Option<KeyID>> {
        let keys = self.snapshot_keys()?;
        let candidate = |k: &&WrappedKey| {
            capable(k) && !k.is_revoked() && !k.is_expired()
        };
        Ok(keys.iter().filter(|k| !k.is_primary()).find(&candidate)
           .or_else(|| keys.iter().filter(|k| k.is_primary())
                    .find(&candidate))
           .map(|k| k.key_id().clone()))
    }

    /// Selects the ring's designated encryption key.
    ///
    /// Fails with [`Error::NoUsableSubkey`] unless the designated
    /// key exists, is neither revoked nor expired, carries the
    /// encrypt capability, and is not classified insecure under
    /// `policy`.
    ///
    /// [`Error::NoUsableSubkey`]: crate::Error::NoUsableSubkey
    pub fn encryption_subkey(&self, policy: &KeySecurityPolicy)
                             -> Result<WrappedKey<'_>> {
        let id = self.encrypt_id()?
            .ok_or_else(|| self.no_usable_subkey(None))?;
        self.encryption_subkey_by_id(&id, policy)
    }

    /// Selects the encryption key with the given id.
    ///
    /// The id may come from storage or from a remote request, so the
    /// candidate's capability flags are re-checked: a stale or
    /// malicious id pointing at a non-encryption-capable key is
    /// rejected.
    pub fn encryption_subkey_by_id(&self, id: &KeyID,
                                   policy: &KeySecurityPolicy)
                                   -> Result<WrappedKey<'_>> {
        self.select_by_id(id, policy, |k| k.can_encrypt())
    }

    /// Selects the ring's designated signing key.
    pub fn signing_subkey(&self, policy: &KeySecurityPolicy)
                          -> Result<WrappedKey<'_>> {
        let id = self.sign_id()?
            .ok_or_else(|| self.no_usable_subkey(None))?;
        self.signing_subkey_by_id(&id, policy)
    }

    /// Selects the signing key with the given id, re-checking its
    /// capability flags.
    pub fn signing_subkey_by_id(&self, id: &KeyID,
                                policy: &KeySecurityPolicy)
                                -> Result<WrappedKey<'_>> {
        self.select_by_id(id, policy, |k| k.can_sign())
    }

    fn select_by_id(&self, id: &KeyID, policy: &KeySecurityPolicy,
                    capable: impl Fn(&WrappedKey) -> bool)
                    -> Result<WrappedKey<'_>> {
        let key = self.snapshot_keys()?.into_iter()
            .find(|k| k.key_id() == id)
            .ok_or_else(|| self.no_usable_subkey(None))?;

        if !capable(&key) || key.is_revoked() || key.is_expired() {
            return Err(self.no_usable_subkey(None));
        }
        if let Some(problem) = key.security_problem(policy) {
            return Err(self.no_usable_subkey(Some(problem)));
        }
        Ok(key)
    }

    fn no_usable_subkey(&self, problem: Option<KeyProblem>) -> anyhow::Error {
        Error::NoUsableSubkey {
            key_ring: self.cert().map(|c| c.keyid())
                .unwrap_or_else(|_| KeyID::wildcard()),
            problem: problem.map(Into::into),
        }.into()
    }

    /// Summarizes this ring into the cached tier.
    ///
    /// Pure: always succeeds given a successfully wrapped ring, and
    /// calling it twice yields snapshots that compare equal.
    pub fn summarize(&self) -> Result<CachedKeyRing> {
        CachedKeyRing::from_wrapped(self)
    }
}

impl KeyRing for WrappedKeyRing {
    fn key_id(&self) -> Result<KeyID> {
        Ok(self.cert()?.keyid())
    }

    fn fingerprint(&self) -> Result<Fingerprint> {
        Ok(self.cert()?.fingerprint())
    }

    fn primary_user_id(&self) -> Result<Option<String>> {
        let cert = self.cert()?;
        let p = StandardPolicy::new();
        let vc = cert.with_policy(&p, None)
            .map_err(|e| Error::Structural(e.to_string()))?;
        Ok(vc.primary_userid().ok()
           .map(|uid| String::from_utf8_lossy(uid.userid().value())
                .into_owned()))
    }

    fn is_revoked(&self) -> Result<bool> {
        let cert = self.cert()?;
        let p = StandardPolicy::new();
        let vc = cert.with_policy(&p, None)
            .map_err(|e| Error::Structural(e.to_string()))?;
        Ok(matches!(vc.revocation_status(),
                    RevocationStatus::Revoked(_)))
    }

    fn can_certify(&self) -> Result<bool> {
        Ok(self.snapshot_keys()?.iter()
           .any(|k| k.is_primary() && k.can_certify()))
    }

    fn encrypt_subkey_id(&self) -> Result<KeyID> {
        self.encrypt_id()?.ok_or_else(|| self.no_usable_subkey(None))
    }

    fn has_encrypt_subkey(&self) -> Result<bool> {
        Ok(self.encrypt_id()?.is_some())
    }

    fn sign_subkey_id(&self) -> Result<KeyID> {
        self.sign_id()?.ok_or_else(|| self.no_usable_subkey(None))
    }

    fn has_sign_subkey(&self) -> Result<bool> {
        Ok(self.sign_id()?.is_some())
    }

    fn verification(&self) -> VerificationLevel {
        self.level
    }
}

/// A single key of a wrapped ring.
///
/// An immutable snapshot of the key's identity, capability flags,
/// and liveness, holding a back-reference to the ring it was
/// obtained from.  Capability answers combine the key flags with the
/// algorithm's abilities: a flag on a key whose algorithm cannot
/// honor it does not count.
#[derive(Clone, Debug)]
pub struct WrappedKey<'a> {
    ring: &'a WrappedKeyRing,
    master_key_id: KeyID,
    key_id: KeyID,
    fingerprint: Fingerprint,
    primary: bool,
    algo: PublicKeyAlgorithm,
    bits: Option<usize>,
    curve: Option<Curve>,
    flags: Option<KeyFlags>,
    revoked: bool,
    expired: bool,
    has_secret: bool,
}

impl<'a> WrappedKey<'a> {
    /// Returns the ring this key belongs to.
    pub fn ring(&self) -> &'a WrappedKeyRing {
        self.ring
    }

    /// Returns the id of the ring's master key.
    pub fn master_key_id(&self) -> &KeyID {
        &self.master_key_id
    }

    /// Returns this key's id.
    pub fn key_id(&self) -> &KeyID {
        &self.key_id
    }

    /// Returns this key's fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns whether this is the ring's primary key.
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Returns the key's public-key algorithm.
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algo
    }

    /// Returns the key's modulus bit length, if meaningful for the
    /// algorithm.
    pub fn bit_length(&self) -> Option<usize> {
        self.bits
    }

    /// Returns the key's curve, if it is an ECC key.
    pub fn curve(&self) -> Option<&Curve> {
        self.curve.as_ref()
    }

    /// Returns whether this key may encrypt.
    pub fn can_encrypt(&self) -> bool {
        self.flag(|f| f.for_transport_encryption()
                  || f.for_storage_encryption())
            && self.algo.for_encryption()
    }

    /// Returns whether this key may sign data.
    pub fn can_sign(&self) -> bool {
        self.flag(KeyFlags::for_signing) && self.algo.for_signing()
    }

    /// Returns whether this key may certify other keys.
    pub fn can_certify(&self) -> bool {
        self.flag(KeyFlags::for_certification) && self.algo.for_signing()
    }

    /// Returns whether this key may authenticate.
    pub fn can_authenticate(&self) -> bool {
        self.flag(KeyFlags::for_authentication) && self.algo.for_signing()
    }

    fn flag(&self, f: impl Fn(&KeyFlags) -> bool) -> bool {
        self.flags.as_ref().map(f).unwrap_or(false)
    }

    /// Returns whether this key is revoked.
    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Returns whether this key is expired.
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Returns whether this key carries secret material.
    pub fn has_secret(&self) -> bool {
        self.has_secret
    }

    /// Evaluates this key against a security policy.
    pub fn security_problem(&self, policy: &KeySecurityPolicy)
                            -> Option<KeyProblem> {
        policy.evaluate_key_parts(&self.master_key_id, &self.key_id,
                                  self.algo, self.bits,
                                  self.curve.as_ref())
    }

    /// Returns the S2K parameters protecting this key's secret
    /// material.
    ///
    /// `None` if the key has no secret material or the material is
    /// stored unencrypted.
    pub fn s2k_params(&self) -> Result<Option<S2kParams>> {
        match self.encrypted_secret()? {
            Some(e) => Ok(Some(S2kParams::from_encrypted(e)?)),
            None => Ok(None),
        }
    }

    /// Derives the symmetric key protecting this key's secret
    /// material, consulting `cache` first.
    ///
    /// Fails with [`Error::NoSecretKey`] if there is no encrypted
    /// secret material to unlock.
    ///
    /// [`Error::NoSecretKey`]: crate::Error::NoSecretKey
    pub fn unlock_key(&self, password: &Password, cache: &SessionKeyCache)
                      -> Result<SessionKey> {
        match self.encrypted_secret()? {
            Some(e) => derive_session_key(e, password, cache),
            None => Err(Error::NoSecretKey(self.key_id.clone()).into()),
        }
    }

    /// Like [`unlock_key`], but obtains the passphrase from `source`.
    ///
    /// The source is consulted only when `cache` has no key for this
    /// secret's derivation parameters; on a cache hit no passphrase
    /// is needed at all.
    ///
    /// [`unlock_key`]: WrappedKey::unlock_key
    pub fn unlock_key_with(&self,
                           source: &dyn PassphraseSource,
                           cache: &SessionKeyCache)
                           -> Result<SessionKey> {
        let e = self.encrypted_secret()?
            .ok_or_else(|| Error::NoSecretKey(self.key_id.clone()))?;
        let params = S2kParams::from_encrypted(e)?;
        if let Some(key) = cache.lookup(&params) {
            return Ok(key);
        }

        let password = source.cached_passphrase_for(&self.master_key_id,
                                                    &self.key_id)?;
        derive_session_key(e, &password, cache)
    }

    fn encrypted_secret(&self)
                        -> Result<Option<&'a openpgp::packet::key::Encrypted>>
    {
        let cert = self.ring.cert()?;
        for ka in cert.keys() {
            if ka.key().fingerprint() != self.fingerprint {
                continue;
            }
            return Ok(match ka.key().optional_secret() {
                Some(SecretKeyMaterial::Encrypted(e)) => Some(e),
                _ => None,
            });
        }
        Err(Error::KeyNotFound(self.key_id.clone()).into())
    }
}
