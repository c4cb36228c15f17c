//! Common types used across plugyard modules.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;

/// Stable plugin identity.
///
/// Doubles as the folder name of the plugin under the plugins directory,
/// so it never contains path separators.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
    /// Maximum identity length.
    pub const MAX_LEN: usize = 128;

    /// Create an identity without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse and validate an identity received from a client.
    pub fn parse(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::InvalidRequest("plugin id must not be empty".to_string()));
        }
        if id.len() > Self::MAX_LEN {
            return Err(Error::InvalidRequest(format!(
                "plugin id exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        if id.starts_with('.') {
            return Err(Error::InvalidRequest(format!("plugin id must not start with '.': {id}")));
        }
        let valid = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(Error::InvalidRequest(format!("invalid plugin id: {id}")));
        }
        Ok(Self(id.to_string()))
    }

    /// Get the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PluginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PluginId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for PluginId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PluginId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// A field of a partial update.
///
/// `Cleared` overwrites the receiver's value with "nothing", which a plain
/// `Option` cannot tell apart from "leave unchanged". Serialized as an
/// explicit `null`; pair with
/// `#[serde(default, skip_serializing_if = "Field::is_absent")]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Field<T> {
    /// Not part of the update
    Absent,
    /// Explicitly reset to no value
    Cleared,
    /// Set to a value
    Present(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T> Field<T> {
    /// Whether the field is left out of the update.
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    /// Apply the update to a receiver's value.
    pub fn apply_to(&self, target: &mut Option<T>)
    where
        T: Clone,
    {
        match self {
            Field::Absent => {}
            Field::Cleared => *target = None,
            Field::Present(value) => *target = Some(value.clone()),
        }
    }
}

impl<T: Clone + PartialEq> Field<T> {
    /// Describe the change from `old` to `new`.
    pub fn change(old: &Option<T>, new: &Option<T>) -> Self {
        if old == new {
            return Field::Absent;
        }
        match new {
            Some(value) => Field::Present(value.clone()),
            None => Field::Cleared,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Field::Present(value) => value.serialize(serializer),
            Field::Absent | Field::Cleared => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Field::Present(value),
            None => Field::Cleared,
        })
    }
}

/// `Some(new)` when it differs from `old`. Non-nullable patch fields use this.
pub(crate) fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| new.clone())
}
