use crate::core::{RealmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One rung of the border upgrade ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderTier {
    pub id: String,
    pub size: f64,
    #[serde(default)]
    pub center_offset_x: f64,
    #[serde(default)]
    pub center_offset_z: f64,
    #[serde(default = "default_warning_distance")]
    pub warning_distance: u32,
    #[serde(default = "default_warning_time")]
    pub warning_time_secs: u32,
    #[serde(default)]
    pub transition_time_secs: u64,
    #[serde(default)]
    pub upgrade_price: f64,
    #[serde(default)]
    pub default: bool,
}

fn default_warning_distance() -> u32 {
    5
}

fn default_warning_time() -> u32 {
    15
}

impl BorderTier {
    pub fn new(id: impl Into<String>, size: f64) -> Self {
        Self {
            id: id.into(),
            size,
            center_offset_x: 0.0,
            center_offset_z: 0.0,
            warning_distance: default_warning_distance(),
            warning_time_secs: default_warning_time(),
            transition_time_secs: 0,
            upgrade_price: 0.0,
            default: false,
        }
    }

    pub fn upgrade_price(mut self, price: f64) -> Self {
        self.upgrade_price = price;
        self
    }

    pub fn center_offset(mut self, x: f64, z: f64) -> Self {
        self.center_offset_x = x;
        self.center_offset_z = z;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// Ordered tier ladder. Order in `tiers` is the upgrade order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BorderConfig {
    pub tiers: Vec<BorderTier>,
}

impl BorderConfig {
    pub fn new(tiers: Vec<BorderTier>) -> Self {
        Self { tiers }
    }

    /// Parses a tier document: `{"tiers": [{"id": "small", "size": 64.0, "default": true}, ...]}`
    pub fn from_json_str(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)
            .map_err(|err| RealmError::Configuration(format!("parse border tiers: {}", err)))?;
        config.validate().map_err(RealmError::Configuration)?;
        Ok(config)
    }

    pub fn tier(&self, id: &str) -> Option<&BorderTier> {
        self.tiers.iter().find(|tier| tier.id == id)
    }

    pub fn tier_index(&self, id: &str) -> Option<usize> {
        self.tiers.iter().position(|tier| tier.id == id)
    }

    pub fn default_tier(&self) -> Option<&BorderTier> {
        self.tiers.iter().find(|tier| tier.default)
    }

    /// The configured tier, or the default tier when `id` is unknown.
    pub fn resolve(&self, id: &str) -> Option<&BorderTier> {
        self.tier(id).or_else(|| self.default_tier())
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for tier in &self.tiers {
            if !seen.insert(tier.id.as_str()) {
                return Err(format!("duplicate border tier id '{}'", tier.id));
            }
            if !(tier.size.is_finite() && tier.size > 0.0) {
                return Err(format!("border tier '{}' must have a positive size", tier.id));
            }
        }

        match self.tiers.iter().filter(|tier| tier.default).count() {
            1 => Ok(()),
            0 => Err("no default border tier configured".to_string()),
            n => Err(format!("{} border tiers marked default, expected exactly one", n)),
        }
    }
}
