//! ChannelId - channel name shared by the config, the wire and the logs
//!
//! The id is a JSON key in every image message and the default region name
//! is `shm_<id>`, so only `[A-Za-z0-9_-]` is accepted, at most
//! [`MAX_CHANNEL_ID_LEN`] bytes. Cloned into every frame and snapshot, hence
//! `Arc<str>`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use crate::ContractError;

/// Longest accepted channel id.
pub const MAX_CHANNEL_ID_LEN: usize = 64;

/// Channel identifier, validated by [`ChannelId::parse`].
///
/// `From<&str>` does not validate; config ids are checked by the config
/// validator before the registry is built.
#[derive(Clone)]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    /// Parse a channel id, rejecting names that are not region-safe.
    pub fn parse(name: &str) -> Result<Self, ContractError> {
        Self::check_name(name).map_err(|reason| ContractError::invalid_channel_id(name, reason))?;
        Ok(Self(Arc::from(name)))
    }

    /// Why `name` is not a usable channel id, if it is not.
    pub fn check_name(name: &str) -> Result<(), &'static str> {
        if name.is_empty() {
            return Err("channel id cannot be empty");
        }
        if name.len() > MAX_CHANNEL_ID_LEN {
            return Err("channel id is longer than 64 bytes");
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err("channel id may only contain ASCII letters, digits, '_' and '-'");
        }
        Ok(())
    }

    /// Whether this id passes [`check_name`](Self::check_name).
    pub fn is_valid(&self) -> bool {
        Self::check_name(&self.0).is_ok()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ChannelId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// lets maps keyed by ChannelId be queried with &str
impl Borrow<str> for ChannelId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ChannelId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({:?})", self.0)
    }
}

impl PartialEq for ChannelId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ChannelId {}

impl PartialEq<str> for ChannelId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ChannelId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

// ordered by name so image messages serialize deterministically
impl PartialOrd for ChannelId {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChannelId {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_ref().cmp(other.0.as_ref())
    }
}

// must hash like str for the Borrow<str> lookups
impl Hash for ChannelId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for ChannelId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn parse_accepts_region_safe_names() {
        for name in ["mobile_rgb", "hand-depth", "map", "cam2"] {
            assert_eq!(ChannelId::parse(name).unwrap(), name);
        }
    }

    #[test]
    fn parse_rejects_unsafe_names() {
        let too_long = "x".repeat(MAX_CHANNEL_ID_LEN + 1);
        for name in ["", "a/b", "rgb cam", "map.png", "手部", too_long.as_str()] {
            let err = ChannelId::parse(name).unwrap_err();
            assert!(
                matches!(err, ContractError::InvalidChannelId { .. }),
                "{name:?}: {err}"
            );
        }
        assert!(ChannelId::parse(&"x".repeat(MAX_CHANNEL_ID_LEN)).is_ok());
    }

    #[test]
    fn unchecked_conversion_reports_validity() {
        assert!(ChannelId::from("hand_rgb").is_valid());
        assert!(!ChannelId::from("../etc").is_valid());
    }

    #[test]
    fn lookups_by_str() {
        let mut hashed: HashMap<ChannelId, i32> = HashMap::new();
        hashed.insert("mobile_rgb".into(), 1);
        assert_eq!(hashed.get("mobile_rgb"), Some(&1));

        let mut ordered = BTreeMap::new();
        ordered.insert(ChannelId::from("mobile_rgb"), 1);
        ordered.insert(ChannelId::from("hand_rgb"), 2);
        ordered.insert(ChannelId::from("map"), 3);
        let keys: Vec<&str> = ordered.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["hand_rgb", "map", "mobile_rgb"]);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id: ChannelId = "map".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"map\"");
        assert_eq!(serde_json::from_str::<ChannelId>(&json).unwrap(), id);
    }
}
