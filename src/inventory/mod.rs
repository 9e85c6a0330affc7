pub mod codec;
pub mod model;
pub mod store;
pub mod transfer;

pub use codec::{InventorySnapshot, decode_region, encode_region};
pub use model::{InventoryRegion, ItemStack, LiveInventory, RegionKind};
pub use store::{FileInventoryStore, InventoryStore, MemoryInventoryStore};
pub use transfer::{FlushReport, InventoryTransferService, Location, TransferOutcome};
