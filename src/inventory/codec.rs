//! Region encoding: `<slot count>:<base64 MessagePack>`.
//!
//! The prefix lets a reader size the region before decoding and catches
//! truncated records. Byte layout is private to this crate version.

use crate::core::{RealmError, Result, SpaceId};
use crate::inventory::model::{InventoryRegion, ItemStack, LiveInventory, RegionKind};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub fn encode_region(region: &InventoryRegion) -> Result<String> {
    let bytes = rmp_serde::to_vec_named(region.slots())?;
    Ok(format!("{}:{}", region.size(), STANDARD.encode(bytes)))
}

pub fn decode_region(encoded: &str) -> Result<InventoryRegion> {
    let (prefix, body) = encoded
        .split_once(':')
        .ok_or_else(|| RealmError::Codec("region encoding missing length prefix".to_string()))?;
    let expected: usize = prefix
        .parse()
        .map_err(|_| RealmError::Codec(format!("invalid region length prefix '{}'", prefix)))?;

    let bytes = STANDARD
        .decode(body)
        .map_err(|err| RealmError::Codec(format!("region base64: {}", err)))?;
    let slots: Vec<Option<ItemStack>> = rmp_serde::from_slice(&bytes)?;

    if slots.len() != expected {
        return Err(RealmError::Codec(format!(
            "region length mismatch: prefix says {}, decoded {}",
            expected,
            slots.len()
        )));
    }
    Ok(InventoryRegion::from_slots(slots))
}

/// Serialized capture of a user's four inventory regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub main: String,
    pub armor: String,
    pub offhand: String,
    pub ender: String,
    pub saved_at: DateTime<Utc>,
    pub source: SpaceId,
}

impl InventorySnapshot {
    pub fn capture(inventory: &LiveInventory, source: SpaceId) -> Result<Self> {
        Ok(Self {
            main: encode_region(&inventory.main)?,
            armor: encode_region(&inventory.armor)?,
            offhand: encode_region(&inventory.offhand)?,
            ender: encode_region(&inventory.ender)?,
            saved_at: Utc::now(),
            source,
        })
    }

    /// Decodes the snapshot back into a live inventory. Regions recorded
    /// with fewer slots than the current layout are padded; regions with
    /// more slots are rejected rather than truncated.
    pub fn restore(&self) -> Result<LiveInventory> {
        let mut inventory = LiveInventory::new();
        for kind in RegionKind::ALL {
            let mut region = decode_region(self.encoded(kind))?;
            if region.size() > kind.size() {
                return Err(RealmError::Codec(format!(
                    "{:?} region holds {} slots, layout allows {}",
                    kind,
                    region.size(),
                    kind.size()
                )));
            }
            region.pad_to(kind.size());
            *inventory.region_mut(kind) = region;
        }
        Ok(inventory)
    }

    pub fn encoded(&self, kind: RegionKind) -> &str {
        match kind {
            RegionKind::Main => &self.main,
            RegionKind::Armor => &self.armor,
            RegionKind::Offhand => &self.offhand,
            RegionKind::Ender => &self.ender,
        }
    }
}
