//! Key, class and access-level types shared across the workspace.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitAnd, BitOr};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Name of a property on an [`Obj`](crate::Obj).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyKey(String);

impl PropertyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PropertyKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for PropertyKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for PropertyKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PropertyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PropertyKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PropertyKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Membership-only key collection. Ordered so snapshots and logs are stable.
pub type KeySet = BTreeSet<PropertyKey>;

/// Builds a [`KeySet`] from anything key-like.
pub fn key_set<I, K>(keys: I) -> KeySet
where
    I: IntoIterator<Item = K>,
    K: Into<PropertyKey>,
{
    keys.into_iter().map(Into::into).collect()
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

/// Identifies the "class" of an object for default ward lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(String);

impl ClassId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClassId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for ClassId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Access levels
// ---------------------------------------------------------------------------

/// Ways a property can be reached through a ward. Bit-combinable.
///
/// `NONE(0) < GET(1) < SET(2)`; `GET | SET` is a valid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Access(u8);

impl Access {
    pub const NONE: Access = Access(0);
    pub const GET: Access = Access(1);
    pub const SET: Access = Access(2);

    const ALL_BITS: u8 = Self::GET.0 | Self::SET.0;

    /// Returns `None` for bit patterns outside `GET | SET`.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL_BITS == 0 {
            Some(Access(bits))
        } else {
            None
        }
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Access) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Access {
    type Output = Access;

    fn bitor(self, rhs: Access) -> Access {
        Access(self.0 | rhs.0)
    }
}

impl BitAnd for Access {
    type Output = Access;

    fn bitand(self, rhs: Access) -> Access {
        Access(self.0 & rhs.0)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Access::GET), self.contains(Access::SET)) {
            (false, false) => f.write_str("None"),
            (true, false) => f.write_str("Get"),
            (false, true) => f.write_str("Set"),
            (true, true) => f.write_str("Get|Set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_levels_combine() {
        let both = Access::GET | Access::SET;
        assert!(both.contains(Access::GET));
        assert!(both.contains(Access::SET));
        assert!(!Access::GET.contains(Access::SET));
        assert!(!Access::GET.contains(Access::NONE));
        assert_eq!(both.to_string(), "Get|Set");
    }

    #[test]
    fn unknown_access_bits_are_rejected() {
        assert_eq!(Access::from_bits(0), Some(Access::NONE));
        assert_eq!(Access::from_bits(3), Some(Access::GET | Access::SET));
        assert_eq!(Access::from_bits(4), None);
    }

    #[test]
    fn key_set_dedups() {
        let keys = key_set(["b", "a", "b"]);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("a"));
    }
}
