//! Primitive types shared across the key-ring tiers.

use std::fmt;

use crate::Error;
use crate::Result;

#[allow(dead_code)] // Used in assert_send_and_sync.
pub(crate) trait Sendable: Send {}
#[allow(dead_code)] // Used in assert_send_and_sync.
pub(crate) trait Syncable: Sync {}

/// How strongly a key ring's identity has been corroborated.
///
/// Levels are totally ordered; a larger level means more trusted.
/// The numeric representation is stable and is what the cached tier
/// stores and sorts by.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerificationLevel {
    /// No verification has been performed.
    Unverified,
    /// The ring carries a valid self-certification.
    VerifiedSelf,
    /// The ring has been verified by a trusted third party.
    VerifiedByOther,
}

assert_send_and_sync!(VerificationLevel);

impl Default for VerificationLevel {
    fn default() -> Self {
        VerificationLevel::Unverified
    }
}

impl From<VerificationLevel> for u8 {
    fn from(l: VerificationLevel) -> u8 {
        match l {
            VerificationLevel::Unverified => 0,
            VerificationLevel::VerifiedSelf => 1,
            VerificationLevel::VerifiedByOther => 2,
        }
    }
}

impl TryFrom<u8> for VerificationLevel {
    type Error = anyhow::Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(VerificationLevel::Unverified),
            1 => Ok(VerificationLevel::VerifiedSelf),
            2 => Ok(VerificationLevel::VerifiedByOther),
            n => Err(Error::InvalidArgument(
                format!("unknown verification level {}", n)).into()),
        }
    }
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VerificationLevel::Unverified => f.write_str("unverified"),
            VerificationLevel::VerifiedSelf => f.write_str("self-certified"),
            VerificationLevel::VerifiedByOther =>
                f.write_str("verified by a third party"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(VerificationLevel::Unverified
                < VerificationLevel::VerifiedSelf);
        assert!(VerificationLevel::VerifiedSelf
                < VerificationLevel::VerifiedByOther);
    }

    #[test]
    fn roundtrip() {
        for l in [VerificationLevel::Unverified,
                  VerificationLevel::VerifiedSelf,
                  VerificationLevel::VerifiedByOther] {
            assert_eq!(l, VerificationLevel::try_from(u8::from(l)).unwrap());
        }
        assert!(VerificationLevel::try_from(3).is_err());
    }
}
