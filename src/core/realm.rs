use crate::core::ids::{RealmId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Trusted,
    Member,
    Visitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Peaceful,
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub const LADDER: [Difficulty; 4] = [
        Difficulty::Peaceful,
        Difficulty::Easy,
        Difficulty::Normal,
        Difficulty::Hard,
    ];

    pub fn from_level(level: u32) -> Option<Self> {
        Self::LADDER.get(level as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeKind {
    Size,
    Members,
    Difficulty,
    Warp,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 4] = [
        UpgradeKind::Size,
        UpgradeKind::Members,
        UpgradeKind::Difficulty,
        UpgradeKind::Warp,
    ];
}

impl fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Size => "size",
            Self::Members => "members",
            Self::Difficulty => "difficulty",
            Self::Warp => "warp",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BorderCenter {
    pub x: f64,
    pub z: f64,
}

impl BorderCenter {
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }
}

/// Canonical realm record. Callers mutate a fetched copy and hand it back
/// through `RealmStore::update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Realm {
    pub id: RealmId,
    pub name: String,
    pub owner: UserId,
    #[serde(default)]
    pub members: BTreeMap<UserId, Role>,
    pub world_folder: String,
    pub template_id: String,
    #[serde(default)]
    pub flat: bool,
    pub created_at: DateTime<Utc>,
    pub border_tier_id: String,
    pub border_size: f64,
    #[serde(default)]
    pub border_center: BorderCenter,
    pub max_players: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub upgrades: BTreeMap<UpgradeKind, u32>,
}

impl Realm {
    /// Builds a fresh realm with a new id. The world folder is derived from
    /// the id so it stays unique even when names are reused after deletion.
    pub fn new(
        name: impl Into<String>,
        owner: UserId,
        template_id: impl Into<String>,
        border_tier_id: impl Into<String>,
    ) -> Self {
        let id = RealmId::new();
        let mut members = BTreeMap::new();
        members.insert(owner, Role::Owner);
        Self {
            id,
            name: name.into(),
            owner,
            members,
            world_folder: format!("realm_{}", id.as_uuid().simple()),
            template_id: template_id.into(),
            flat: false,
            created_at: Utc::now(),
            border_tier_id: border_tier_id.into(),
            border_size: 0.0,
            border_center: BorderCenter::default(),
            max_players: 8,
            difficulty: Difficulty::default(),
            upgrades: BTreeMap::new(),
        }
    }

    pub fn flat(mut self, flat: bool) -> Self {
        self.flat = flat;
        self
    }

    pub fn max_players(mut self, max_players: u32) -> Self {
        self.max_players = max_players;
        self
    }

    /// Name key used by the case-insensitive name index.
    pub fn name_key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn role_of(&self, user: &UserId) -> Option<Role> {
        if *user == self.owner {
            return Some(Role::Owner);
        }
        self.members.get(user).copied()
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.role_of(user).is_some()
    }

    pub fn add_member(&mut self, user: UserId, role: Role) {
        if user != self.owner {
            self.members.insert(user, role);
        }
    }

    pub fn remove_member(&mut self, user: &UserId) -> Option<Role> {
        if *user == self.owner {
            return None;
        }
        self.members.remove(user)
    }

    pub fn upgrade_level(&self, kind: UpgradeKind) -> u32 {
        self.upgrades.get(&kind).copied().unwrap_or(0)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
