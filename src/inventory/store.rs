use crate::core::{RealmError, Result, SpaceId, UserId};
use crate::inventory::codec::InventorySnapshot;
use crate::storage::persistence::write_atomic;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

/// Durable per-(space, user) snapshot storage. Loads never consume the
/// record.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn save(&self, space: SpaceId, user: UserId, snapshot: &InventorySnapshot) -> Result<()>;
    async fn load(&self, space: SpaceId, user: UserId) -> Result<Option<InventorySnapshot>>;
    async fn delete(&self, space: SpaceId, user: UserId) -> Result<()>;

    /// Drops every snapshot recorded for `space`.
    async fn delete_space(&self, space: SpaceId) -> Result<()>;
}

// ============================================================================
// File Store
// ============================================================================

/// One JSON record per pair at `<root>/<space>/<user>.json`.
pub struct FileInventoryStore {
    root: PathBuf,
}

impl FileInventoryStore {
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|err| {
            RealmError::Io(format!("create inventory directory '{}': {}", root.display(), err))
        })?;
        Ok(Self { root })
    }

    fn space_dir(&self, space: SpaceId) -> PathBuf {
        self.root.join(space.storage_key())
    }

    fn record_path(&self, space: SpaceId, user: UserId) -> PathBuf {
        self.space_dir(space).join(format!("{}.json", user))
    }
}

#[async_trait]
impl InventoryStore for FileInventoryStore {
    async fn save(&self, space: SpaceId, user: UserId, snapshot: &InventorySnapshot) -> Result<()> {
        let data = serde_json::to_vec(snapshot)?;
        let path = self.record_path(space, user);

        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await?
            .map_err(|err| {
                RealmError::Persistence(format!("write inventory {}/{}: {}", space, user, err))
            })?;

        debug!("Saved inventory snapshot {}/{}", space, user);
        Ok(())
    }

    async fn load(&self, space: SpaceId, user: UserId) -> Result<Option<InventorySnapshot>> {
        let path = self.record_path(space, user);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(RealmError::Persistence(format!(
                    "read inventory {}/{}: {}",
                    space, user, err
                )));
            }
        };

        let snapshot = serde_json::from_slice(&data).map_err(|err| {
            RealmError::Codec(format!("parse inventory {}/{}: {}", space, user, err))
        })?;
        Ok(Some(snapshot))
    }

    async fn delete(&self, space: SpaceId, user: UserId) -> Result<()> {
        match fs::remove_file(self.record_path(space, user)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RealmError::Persistence(format!(
                "delete inventory {}/{}: {}",
                space, user, err
            ))),
        }
    }

    async fn delete_space(&self, space: SpaceId) -> Result<()> {
        match fs::remove_dir_all(self.space_dir(space)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RealmError::Persistence(format!(
                "delete inventories for {}: {}",
                space, err
            ))),
        }
    }
}

// ============================================================================
// Memory Store
// ============================================================================

#[derive(Default)]
pub struct MemoryInventoryStore {
    records: RwLock<HashMap<(SpaceId, UserId), InventorySnapshot>>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn save(&self, space: SpaceId, user: UserId, snapshot: &InventorySnapshot) -> Result<()> {
        self.records
            .write()
            .await
            .insert((space, user), snapshot.clone());
        Ok(())
    }

    async fn load(&self, space: SpaceId, user: UserId) -> Result<Option<InventorySnapshot>> {
        Ok(self.records.read().await.get(&(space, user)).cloned())
    }

    async fn delete(&self, space: SpaceId, user: UserId) -> Result<()> {
        self.records.write().await.remove(&(space, user));
        Ok(())
    }

    async fn delete_space(&self, space: SpaceId) -> Result<()> {
        self.records
            .write()
            .await
            .retain(|(record_space, _), _| *record_space != space);
        Ok(())
    }
}
