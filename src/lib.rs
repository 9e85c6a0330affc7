// ============================================================================
// Realmkeep Library
// ============================================================================

pub mod config;
pub mod core;
pub mod inventory;
pub mod storage;
pub mod world;

// Re-export main types for convenience
pub use config::{BorderConfig, BorderTier, StoreConfig, TransferConfig, Upgrade, UpgradeConfig};
pub use core::{
    BorderCenter, Difficulty, Realm, RealmError, RealmId, Result, Role, SpaceId, UpgradeKind,
    UserId, ValidationError,
};

// Re-export storage API
pub use storage::{
    FileRealmPersistence, MemoryRealmPersistence, RealmCache, RealmPersistence, RealmStore,
    UpgradePurchase,
};

// Re-export inventory API
pub use inventory::{
    FileInventoryStore, FlushReport, InventoryRegion, InventorySnapshot, InventoryStore,
    InventoryTransferService, ItemStack, LiveInventory, Location, MemoryInventoryStore,
    RegionKind, TransferOutcome,
};

// Re-export world API
pub use world::{
    Authority, BorderApplier, BorderOutcome, InventoryHost, LiveState, Position, WorldBorder,
    WorldCreator, WorldCreatorRegistry, WorldHost, WorldRequest,
};
