use crate::core::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub material: String,
    pub amount: u32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ItemStack {
    pub fn new(material: impl Into<String>, amount: u32) -> Self {
        Self {
            material: material.into(),
            amount,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Main,
    Armor,
    Offhand,
    Ender,
}

impl RegionKind {
    pub const ALL: [RegionKind; 4] = [
        RegionKind::Main,
        RegionKind::Armor,
        RegionKind::Offhand,
        RegionKind::Ender,
    ];

    pub fn size(&self) -> usize {
        match self {
            Self::Main => 36,
            Self::Armor => 4,
            Self::Offhand => 1,
            Self::Ender => 27,
        }
    }
}

/// Fixed-size slot array. Empty slots are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRegion {
    slots: Vec<Option<ItemStack>>,
}

impl InventoryRegion {
    pub fn with_size(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub fn for_kind(kind: RegionKind) -> Self {
        Self::with_size(kind.size())
    }

    pub(crate) fn from_slots(slots: Vec<Option<ItemStack>>) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[Option<ItemStack>] {
        &self.slots
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: usize) -> Option<&ItemStack> {
        self.slots.get(slot).and_then(|item| item.as_ref())
    }

    pub fn set(&mut self, slot: usize, item: Option<ItemStack>) -> Result<()> {
        let size = self.slots.len();
        let target = self.slots.get_mut(slot).ok_or_else(|| {
            ValidationError::Invalid(format!("slot {} out of range for region of {}", slot, size))
        })?;
        *target = item;
        Ok(())
    }

    pub fn occupied(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| item.as_ref().map(|item| (slot, item)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Grows the region with empty slots. Never shrinks.
    pub(crate) fn pad_to(&mut self, size: usize) {
        if self.slots.len() < size {
            self.slots.resize(size, None);
        }
    }
}

/// A user's live inventory: the four regions that move between spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInventory {
    pub main: InventoryRegion,
    pub armor: InventoryRegion,
    pub offhand: InventoryRegion,
    pub ender: InventoryRegion,
}

impl LiveInventory {
    pub fn new() -> Self {
        Self {
            main: InventoryRegion::for_kind(RegionKind::Main),
            armor: InventoryRegion::for_kind(RegionKind::Armor),
            offhand: InventoryRegion::for_kind(RegionKind::Offhand),
            ender: InventoryRegion::for_kind(RegionKind::Ender),
        }
    }

    pub fn region(&self, kind: RegionKind) -> &InventoryRegion {
        match kind {
            RegionKind::Main => &self.main,
            RegionKind::Armor => &self.armor,
            RegionKind::Offhand => &self.offhand,
            RegionKind::Ender => &self.ender,
        }
    }

    pub fn region_mut(&mut self, kind: RegionKind) -> &mut InventoryRegion {
        match kind {
            RegionKind::Main => &mut self.main,
            RegionKind::Armor => &mut self.armor,
            RegionKind::Offhand => &mut self.offhand,
            RegionKind::Ender => &mut self.ender,
        }
    }

    pub fn is_empty(&self) -> bool {
        RegionKind::ALL.iter().all(|kind| self.region(*kind).is_empty())
    }

    pub fn clear(&mut self) {
        for kind in RegionKind::ALL {
            self.region_mut(kind).clear();
        }
    }

    /// Total item count across every region.
    pub fn item_count(&self) -> u64 {
        RegionKind::ALL
            .iter()
            .flat_map(|kind| self.region(*kind).occupied())
            .map(|(_, item)| item.amount as u64)
            .sum()
    }
}

impl Default for LiveInventory {
    fn default() -> Self {
        Self::new()
    }
}
