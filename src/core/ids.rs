use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Storage key reserved for the global space. Never a valid realm id, since
/// realm ids always render as hyphenated UUIDs.
pub const GLOBAL_SPACE_KEY: &str = "global";

/// Immutable identity of a realm; the sole cache and storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealmId(Uuid);

impl RealmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RealmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RealmId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Keying dimension for inventory snapshots: a realm, or the global space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SpaceId {
    Global,
    Realm(RealmId),
}

impl SpaceId {
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    pub fn realm(&self) -> Option<RealmId> {
        match self {
            Self::Global => None,
            Self::Realm(id) => Some(*id),
        }
    }

    /// Stable string used for directory names and record tags.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Global => GLOBAL_SPACE_KEY.to_string(),
            Self::Realm(id) => id.to_string(),
        }
    }
}

impl From<RealmId> for SpaceId {
    fn from(id: RealmId) -> Self {
        Self::Realm(id)
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

impl FromStr for SpaceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case(GLOBAL_SPACE_KEY) {
            return Ok(Self::Global);
        }
        s.parse::<RealmId>()
            .map(Self::Realm)
            .map_err(|err| format!("invalid space id '{}': {}", s, err))
    }
}

impl From<SpaceId> for String {
    fn from(space: SpaceId) -> Self {
        space.storage_key()
    }
}

impl TryFrom<String> for SpaceId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
