use crate::config::{BorderConfig, BorderTier};
use crate::core::{Difficulty, Realm, Result, UpgradeKind, ValidationError};
use serde::{Deserialize, Serialize};

/// Upgrade descriptor: one type for every kind, effects dispatched on `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upgrade {
    pub kind: UpgradeKind,
    pub max_level: u32,
    pub base_price: f64,
    /// Price of level `n` is `base_price * price_multiplier^(n - 1)`.
    pub price_multiplier: f64,
}

impl Upgrade {
    pub fn new(kind: UpgradeKind, max_level: u32, base_price: f64) -> Self {
        Self {
            kind,
            max_level,
            base_price,
            price_multiplier: 1.0,
        }
    }

    pub fn price_multiplier(mut self, multiplier: f64) -> Self {
        self.price_multiplier = multiplier;
        self
    }

    /// Price of reaching `level` on the curve. Level 0 is free.
    pub fn price(&self, level: u32) -> f64 {
        if level == 0 {
            return 0.0;
        }
        let exponent = i32::try_from(level - 1).unwrap_or(i32::MAX);
        self.base_price * self.price_multiplier.powi(exponent)
    }

    /// Price charged for buying `level`. Size levels cost the configured
    /// price of the tier they move the realm to.
    pub fn purchase_price(&self, level: u32, border: &BorderConfig) -> f64 {
        match self.kind {
            UpgradeKind::Size => size_tier(border, level)
                .map(|tier| tier.upgrade_price)
                .unwrap_or_else(|| self.price(level)),
            _ => self.price(level),
        }
    }

    /// Applies the effect of `level` to `realm`. Does not record the level.
    pub fn apply(
        &self,
        realm: &mut Realm,
        level: u32,
        config: &UpgradeConfig,
        border: &BorderConfig,
    ) -> Result<()> {
        if level > self.max_level {
            return Err(ValidationError::UpgradeMaxed {
                kind: self.kind.to_string(),
                max: self.max_level,
            }
            .into());
        }

        match self.kind {
            UpgradeKind::Size => {
                let tier = size_tier(border, level).ok_or_else(|| {
                    ValidationError::UnknownTier(format!("size level {}", level))
                })?;
                realm.border_tier_id = tier.id.clone();
                realm.border_size = tier.size;
            }
            UpgradeKind::Members => {
                realm.max_players = config
                    .base_max_players
                    .saturating_add(level.saturating_mul(config.members_per_level));
            }
            UpgradeKind::Difficulty => {
                realm.difficulty = Difficulty::from_level(level).ok_or_else(|| {
                    ValidationError::Invalid(format!("difficulty level {}", level))
                })?;
            }
            UpgradeKind::Warp => {}
        }
        Ok(())
    }
}

/// Size level `n` sits `n` rungs above the default tier.
fn size_tier(border: &BorderConfig, level: u32) -> Option<&BorderTier> {
    let base = border
        .default_tier()
        .and_then(|tier| border.tier_index(&tier.id))
        .unwrap_or(0);
    let index = base.checked_add(usize::try_from(level).ok()?)?;
    border.tiers.get(index)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    pub upgrades: Vec<Upgrade>,
    pub base_max_players: u32,
    pub members_per_level: u32,
}

impl UpgradeConfig {
    pub fn upgrade(&self, kind: UpgradeKind) -> Option<&Upgrade> {
        self.upgrades.iter().find(|upgrade| upgrade.kind == kind)
    }
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            upgrades: vec![
                Upgrade::new(UpgradeKind::Size, 2, 1000.0).price_multiplier(2.0),
                Upgrade::new(UpgradeKind::Members, 5, 250.0).price_multiplier(1.5),
                Upgrade::new(UpgradeKind::Difficulty, 3, 100.0),
                Upgrade::new(UpgradeKind::Warp, 1, 500.0),
            ],
            base_max_players: 8,
            members_per_level: 4,
        }
    }
}
