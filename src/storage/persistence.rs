//! Durable realm records: one JSON record per realm, keyed by realm id.

use crate::core::{RealmError, RealmId, Realm, Result, normalize_name};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

const REALM_RECORD_EXTENSION: &str = "json";
const REALM_FORMAT_VERSION: u16 = 1;

/// I/O backend for realm records. Implementations are invoked from the
/// realm store and must not touch cache state.
#[async_trait]
pub trait RealmPersistence: Send + Sync {
    async fn load(&self, id: RealmId) -> Result<Option<Realm>>;
    async fn load_all(&self) -> Result<Vec<Realm>>;
    async fn save(&self, realm: &Realm) -> Result<()>;
    async fn delete(&self, id: RealmId) -> Result<()>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Realm>> {
        let key = normalize_name(name);
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|realm| realm.name_key() == key))
    }

    async fn find_by_world_folder(&self, folder: &str) -> Result<Option<Realm>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|realm| realm.world_folder == folder))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RealmRecord {
    format_version: u16,
    realm: Realm,
}

// ============================================================================
// File Persistence
// ============================================================================

pub struct FileRealmPersistence {
    dir: PathBuf,
}

impl FileRealmPersistence {
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|err| {
            RealmError::Io(format!("create realm directory '{}': {}", dir.display(), err))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: RealmId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, REALM_RECORD_EXTENSION))
    }

    async fn read_record(path: &Path) -> Result<Option<Realm>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(RealmError::Io(format!(
                    "read realm record '{}': {}",
                    path.display(),
                    err
                )));
            }
        };

        let record: RealmRecord = serde_json::from_slice(&data).map_err(|err| {
            RealmError::Codec(format!("parse realm record '{}': {}", path.display(), err))
        })?;
        if record.format_version != REALM_FORMAT_VERSION {
            return Err(RealmError::Codec(format!(
                "Unsupported realm record format version {}",
                record.format_version
            )));
        }
        Ok(Some(record.realm))
    }
}

/// Writes `data` to `path` through a temp file in the same directory, so a
/// crash mid-write leaves either the old record or the new one.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[async_trait]
impl RealmPersistence for FileRealmPersistence {
    async fn load(&self, id: RealmId) -> Result<Option<Realm>> {
        Self::read_record(&self.record_path(id)).await
    }

    async fn load_all(&self) -> Result<Vec<Realm>> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|err| {
            RealmError::Io(format!("list realm directory '{}': {}", self.dir.display(), err))
        })?;

        let mut realms = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(REALM_RECORD_EXTENSION) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(realm)) => realms.push(realm),
                Ok(None) => {}
                Err(err) => warn!("Skipping unreadable realm record {}: {}", path.display(), err),
            }
        }

        realms.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(realms)
    }

    async fn save(&self, realm: &Realm) -> Result<()> {
        let record = RealmRecord {
            format_version: REALM_FORMAT_VERSION,
            realm: realm.clone(),
        };
        let data = serde_json::to_vec_pretty(&record)?;
        let path = self.record_path(realm.id);

        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await?
            .map_err(|err| RealmError::Persistence(format!("write realm {}: {}", realm.id, err)))?;

        debug!("Persisted realm {} ({})", realm.id, realm.name);
        Ok(())
    }

    async fn delete(&self, id: RealmId) -> Result<()> {
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RealmError::Persistence(format!("delete realm {}: {}", id, err))),
        }
    }
}

// ============================================================================
// Memory Persistence
// ============================================================================

/// Process-local backend, for embedding without a data directory.
#[derive(Default)]
pub struct MemoryRealmPersistence {
    records: RwLock<HashMap<RealmId, Realm>>,
}

impl MemoryRealmPersistence {
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
impl RealmPersistence for MemoryRealmPersistence {
    async fn load(&self, id: RealmId) -> Result<Option<Realm>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<Realm>> {
        let mut realms: Vec<Realm> = self.records.read().await.values().cloned().collect();
        realms.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(realms)
    }

    async fn save(&self, realm: &Realm) -> Result<()> {
        self.records.write().await.insert(realm.id, realm.clone());
        Ok(())
    }

    async fn delete(&self, id: RealmId) -> Result<()> {
        self.records.write().await.remove(&id);
        Ok(())
    }
}
