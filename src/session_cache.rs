//! Caching of passphrase-derived session keys.
//!
//! Unlocking a secret key means running its string-to-key (S2K)
//! function, which is deliberately expensive.  The derivation
//! depends only on the S2K parameters recorded in the secret key
//! packet and the passphrase, so once a key has been derived it can
//! be reused for any secret whose parameters match, even across
//! different master keys.  [`S2kParams`] is the comparable
//! descriptor of those parameters, and [`SessionKeyCache`] the
//! process-lifetime memo keyed on it.
//!
//! Clearing the cache when a passphrase stops being trusted (a user
//! lock event, say) is the owner's policy; the cache itself only
//! offers [`SessionKeyCache::clear`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use sequoia_openpgp as openpgp;
use openpgp::crypto::{Password, S2K, SessionKey};
use openpgp::packet::key::Encrypted;
use openpgp::types::{HashAlgorithm, SymmetricAlgorithm};

use crate::Error;
use crate::Result;

/// How a secret key's passphrase was turned into a symmetric key.
///
/// Immutable; equality and hash are structural over all five fields.
/// Two secret keys with identical derivation parameters are
/// cache-equivalent, since the derivation cost and mechanism depend
/// only on these parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct S2kParams {
    cipher: SymmetricAlgorithm,
    s2k_type: u8,
    hash: HashAlgorithm,
    iteration_count: u32,
    iv: Box<[u8]>,
}

assert_send_and_sync!(S2kParams);

impl S2kParams {
    /// Creates a descriptor from explicit parts.
    ///
    /// `iv` is the salt material feeding the derivation; for simple
    /// S2K it is empty.
    pub fn new(cipher: SymmetricAlgorithm,
               s2k_type: u8,
               hash: HashAlgorithm,
               iteration_count: u32,
               iv: impl Into<Box<[u8]>>)
               -> Self {
        S2kParams {
            cipher,
            s2k_type,
            hash,
            iteration_count,
            iv: iv.into(),
        }
    }

    /// Extracts the descriptor from an encrypted secret key.
    ///
    /// All five fields are populated from the packet data.  Fails on
    /// S2K mechanisms this crate does not recognize: a partially
    /// constructed descriptor must never reach the cache.
    pub fn from_encrypted(e: &Encrypted) -> Result<S2kParams> {
        let cipher = e.algo();
        #[allow(deprecated)]
        let (s2k_type, hash, iteration_count, iv): (u8, _, u32, Vec<u8>) =
            match e.s2k() {
                S2K::Simple { hash } =>
                    (0, *hash, 0, Vec::new()),
                S2K::Salted { hash, salt } =>
                    (1, *hash, 0, salt.to_vec()),
                S2K::Iterated { hash, salt, hash_bytes } =>
                    (3, *hash, *hash_bytes, salt.to_vec()),
                other => return Err(Error::InvalidArgument(
                    format!("unsupported S2K mechanism {:?}", other)).into()),
            };

        Ok(S2kParams::new(cipher, s2k_type, hash, iteration_count, iv))
    }

    /// Returns the cipher the derived key is for.
    pub fn cipher(&self) -> SymmetricAlgorithm {
        self.cipher
    }

    /// Returns the S2K type id.
    pub fn s2k_type(&self) -> u8 {
        self.s2k_type
    }

    /// Returns the digest algorithm used by the derivation.
    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    /// Returns the iteration count, 0 if the mechanism does not
    /// iterate.
    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Returns the salt material feeding the derivation.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }
}

/// Maps S2K parameters to previously derived session keys.
///
/// The one mutable shared resource in this crate: lookups and stores
/// may race from concurrent decryptions.  Each operation is
/// individually atomic; there is no single-flight guarantee, so two
/// operations that miss concurrently may both derive, and the last
/// store wins.  That is acceptable because a secret's derivation
/// parameters are immutable for its lifetime, so both derive the
/// same key.
///
/// Constructed explicitly and passed to the operations that need it;
/// there is no global instance.
#[derive(Debug, Default)]
pub struct SessionKeyCache {
    map: Mutex<HashMap<S2kParams, SessionKey>>,
}

assert_send_and_sync!(SessionKeyCache);

impl SessionKeyCache {
    /// Returns an empty cache.
    pub fn new() -> Self {
        Default::default()
    }

    /// Looks up a previously derived key.
    pub fn lookup(&self, params: &S2kParams) -> Option<SessionKey> {
        self.map.lock().unwrap().get(params).cloned()
    }

    /// Stores a derived key.
    ///
    /// Idempotent: storing the same parameters with the same value
    /// is a no-op; a different value overwrites.  Divergent values
    /// for the same parameters indicate caller error, not a cache
    /// policy decision.
    pub fn store(&self, params: S2kParams, key: SessionKey) {
        self.map.lock().unwrap().insert(params, key);
    }

    /// Drops all entries.
    ///
    /// Invoked by the owner whenever cached passphrase material is
    /// no longer trusted.
    pub fn clear(&self) {
        self.map.lock().unwrap().clear();
    }

    /// Returns the number of cached derivations.
    pub fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.lock().unwrap().is_empty()
    }
}

impl fmt::Display for SessionKeyCache {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SessionKeyCache with {} entries", self.len())
    }
}

/// Derives the symmetric key protecting an encrypted secret key,
/// consulting the cache first.
///
/// On a miss, runs the S2K function and memoizes the result.  This
/// is the only place that ties the cache to an actual derivation.
pub fn derive_session_key(e: &Encrypted,
                          password: &Password,
                          cache: &SessionKeyCache)
                          -> Result<SessionKey> {
    let params = S2kParams::from_encrypted(e)?;
    if let Some(key) = cache.lookup(&params) {
        return Ok(key);
    }

    let key = e.s2k().derive_key(password, e.algo().key_size()?)?;
    cache.store(params, key.clone());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    use quickcheck::{Arbitrary, Gen, quickcheck};

    fn params() -> S2kParams {
        S2kParams::new(SymmetricAlgorithm::AES256, 3, HashAlgorithm::SHA256,
                       65536, vec![1, 2, 3, 4, 5, 6, 7, 8])
    }

    fn key(bytes: &[u8]) -> SessionKey {
        bytes.to_vec().into()
    }

    impl Arbitrary for S2kParams {
        fn arbitrary(g: &mut Gen) -> Self {
            let ciphers = [SymmetricAlgorithm::AES128,
                           SymmetricAlgorithm::AES192,
                           SymmetricAlgorithm::AES256];
            let hashes = [HashAlgorithm::SHA1,
                          HashAlgorithm::SHA256,
                          HashAlgorithm::SHA512];
            S2kParams::new(*g.choose(&ciphers).unwrap(),
                           *g.choose(&[0u8, 1, 3]).unwrap(),
                           *g.choose(&hashes).unwrap(),
                           u32::arbitrary(g),
                           Vec::<u8>::arbitrary(g))
        }
    }

    quickcheck! {
        fn equal_parts_compare_and_hash_equal(p: S2kParams) -> bool {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};

            let q = S2kParams::new(p.cipher(), p.s2k_type(), p.hash(),
                                   p.iteration_count(), p.iv().to_vec());
            let hash_of = |p: &S2kParams| {
                let mut h = DefaultHasher::new();
                Hash::hash(p, &mut h);
                h.finish()
            };
            p == q && hash_of(&p) == hash_of(&q)
        }
    }

    #[test]
    fn changing_any_field_breaks_equality() {
        let p = params();
        assert_ne!(p, S2kParams::new(SymmetricAlgorithm::AES128, 3,
                                     HashAlgorithm::SHA256, 65536,
                                     p.iv().to_vec()));
        assert_ne!(p, S2kParams::new(p.cipher(), 1, p.hash(), 65536,
                                     p.iv().to_vec()));
        assert_ne!(p, S2kParams::new(p.cipher(), 3, HashAlgorithm::SHA512,
                                     65536, p.iv().to_vec()));
        assert_ne!(p, S2kParams::new(p.cipher(), 3, p.hash(), 65537,
                                     p.iv().to_vec()));
        assert_ne!(p, S2kParams::new(p.cipher(), 3, p.hash(), 65536,
                                     vec![8, 7, 6, 5, 4, 3, 2, 1]));
    }

    #[test]
    fn store_then_lookup() {
        let cache = SessionKeyCache::new();
        assert!(cache.lookup(&params()).is_none());

        cache.store(params(), key(&[0xAA; 32]));
        let hit = cache.lookup(&params()).expect("stored");
        assert_eq!(&hit[..], &[0xAA; 32][..]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lookup_on_never_stored_parameters_is_absent() {
        let cache = SessionKeyCache::new();
        cache.store(params(), key(&[0xAA; 32]));

        let other = S2kParams::new(SymmetricAlgorithm::AES128, 3,
                                   HashAlgorithm::SHA256, 65536,
                                   params().iv().to_vec());
        assert!(cache.lookup(&other).is_none());
    }

    #[test]
    fn store_overwrites_divergent_value() {
        let cache = SessionKeyCache::new();
        cache.store(params(), key(&[0xAA; 32]));
        cache.store(params(), key(&[0xBB; 32]));
        assert_eq!(cache.len(), 1);
        assert_eq!(&cache.lookup(&params()).unwrap()[..], &[0xBB; 32][..]);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = SessionKeyCache::new();
        cache.store(params(), key(&[0xAA; 32]));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.lookup(&params()).is_none());
    }

    #[test]
    fn concurrent_store_and_lookup() {
        use std::sync::Arc;

        let cache = Arc::new(SessionKeyCache::new());
        let writers: Vec<_> = (0..4).map(|i| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    cache.store(params(), key(&[i; 32]));
                    cache.lookup(&params());
                }
            })
        }).collect();
        for w in writers {
            w.join().unwrap();
        }
        // All writers used the same parameters, so exactly one entry
        // survives, holding whichever store came last.
        assert_eq!(cache.len(), 1);
    }
}
