pub mod cache;
pub mod persistence;
pub mod realm_store;

pub use cache::RealmCache;
pub use persistence::{FileRealmPersistence, MemoryRealmPersistence, RealmPersistence};
pub use realm_store::{RealmStore, UpgradePurchase};
