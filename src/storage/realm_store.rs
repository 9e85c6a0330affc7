use crate::config::{BorderConfig, StoreConfig, UpgradeConfig};
use crate::core::{RealmError, RealmId, Realm, Result, UpgradeKind, UserId, ValidationError};
use crate::storage::cache::RealmCache;
use crate::storage::persistence::{FileRealmPersistence, RealmPersistence};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a successful upgrade purchase. Charging `price` is the
/// caller's business.
#[derive(Debug, Clone)]
pub struct UpgradePurchase {
    pub realm: Realm,
    pub kind: UpgradeKind,
    pub level: u32,
    pub price: f64,
}

/// Owner of canonical realm records.
///
/// Writes go to persistence first and reach the cache only on success, so a
/// failed write never leaves the cache ahead of the durable store. Writes are
/// serialized so the persist-then-cache pairs of two updates cannot
/// interleave.
pub struct RealmStore {
    persistence: Arc<dyn RealmPersistence>,
    cache: RealmCache,
    config: StoreConfig,
    write_lock: Mutex<()>,
}

impl RealmStore {
    pub async fn open(persistence: Arc<dyn RealmPersistence>, config: StoreConfig) -> Result<Self> {
        config.validate().map_err(RealmError::Configuration)?;

        let store = Self {
            cache: RealmCache::new(config.cache_capacity, config.cache_ttl),
            persistence,
            config,
            write_lock: Mutex::new(()),
        };

        if store.config.warm_on_open {
            let realms = store.persistence.load_all().await?;
            let total = realms.len();
            for realm in realms.iter().take(store.config.cache_capacity) {
                store.cache.insert(realm);
            }
            info!("Realm cache warmed with {} of {} stored realms", store.cache.len(), total);
        }

        Ok(store)
    }

    /// Opens a store backed by JSON records under `config.realms_dir()`.
    pub async fn open_file(config: StoreConfig) -> Result<Self> {
        let persistence = FileRealmPersistence::open(config.realms_dir()).await?;
        Self::open(Arc::new(persistence), config).await
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub async fn create(&self, realm: Realm) -> Result<Realm> {
        let _guard = self.write_lock.lock().await;

        if self.lookup(realm.id).await?.is_some() {
            return Err(ValidationError::Invalid(format!("realm {} already exists", realm.id)).into());
        }
        self.ensure_unique(&realm).await?;

        if let Err(err) = self.persistence.save(&realm).await {
            warn!("Failed to persist new realm {} ({}): {}", realm.id, realm.name, err);
            return Err(err);
        }

        self.cache.insert(&realm);
        debug!("Created realm {} ({})", realm.id, realm.name);
        Ok(realm)
    }

    pub async fn update(&self, realm: Realm) -> Result<Realm> {
        let _guard = self.write_lock.lock().await;

        if self.lookup(realm.id).await?.is_none() {
            return Err(ValidationError::UnknownRealm(realm.id.to_string()).into());
        }
        self.ensure_unique(&realm).await?;

        if let Err(err) = self.persistence.save(&realm).await {
            warn!("Failed to persist realm update {} ({}): {}", realm.id, realm.name, err);
            return Err(err);
        }

        self.cache.insert(&realm);
        Ok(realm)
    }

    pub async fn delete(&self, id: RealmId) -> Result<Realm> {
        let _guard = self.write_lock.lock().await;

        let realm = self
            .lookup(id)
            .await?
            .ok_or_else(|| ValidationError::UnknownRealm(id.to_string()))?;

        if let Err(err) = self.persistence.delete(id).await {
            warn!("Failed to delete realm {} ({}): {}", id, realm.name, err);
            return Err(err);
        }

        self.cache.invalidate(id);
        info!("Deleted realm {} ({})", id, realm.name);
        Ok(realm)
    }

    /// Cache lookup, falling back to persistence on a miss when read-through
    /// is enabled.
    pub async fn get(&self, id: RealmId) -> Result<Option<Realm>> {
        if let Some(realm) = self.cache.get(id) {
            return Ok(Some(realm));
        }
        if !self.config.read_through {
            return Ok(None);
        }
        let loaded = self.persistence.load(id).await?;
        Ok(self.recache(loaded))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Realm>> {
        if let Some(realm) = self.cache.get_by_name(name) {
            return Ok(Some(realm));
        }
        if !self.config.read_through {
            return Ok(None);
        }
        let loaded = self.persistence.find_by_name(name).await?;
        Ok(self.recache(loaded))
    }

    pub async fn get_by_world_folder(&self, folder: &str) -> Result<Option<Realm>> {
        if let Some(realm) = self.cache.get_by_world_folder(folder) {
            return Ok(Some(realm));
        }
        if !self.config.read_through {
            return Ok(None);
        }
        let loaded = self.persistence.find_by_world_folder(folder).await?;
        Ok(self.recache(loaded))
    }

    pub fn cached(&self, id: RealmId) -> Option<Realm> {
        self.cache.get(id)
    }

    pub fn cached_by_name(&self, name: &str) -> Option<Realm> {
        self.cache.get_by_name(name)
    }

    pub fn cached_by_world_folder(&self, folder: &str) -> Option<Realm> {
        self.cache.get_by_world_folder(folder)
    }

    /// Realms owned by `owner` among current cache contents.
    pub fn list_by_owner(&self, owner: UserId) -> Vec<Realm> {
        self.cache.list_by_owner(owner)
    }

    /// Realms `user` belongs to (owner included) among current cache contents.
    pub fn list_by_membership(&self, user: UserId) -> Vec<Realm> {
        self.cache.list_by_membership(user)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Raises `kind` by one level and persists the result.
    pub async fn apply_upgrade(
        &self,
        id: RealmId,
        kind: UpgradeKind,
        upgrades: &UpgradeConfig,
        border: &BorderConfig,
    ) -> Result<UpgradePurchase> {
        let mut realm = self
            .get(id)
            .await?
            .ok_or_else(|| ValidationError::UnknownRealm(id.to_string()))?;
        let upgrade = upgrades
            .upgrade(kind)
            .ok_or_else(|| ValidationError::Invalid(format!("upgrade {} is not configured", kind)))?;

        let level = realm.upgrade_level(kind).saturating_add(1);
        if level > upgrade.max_level {
            return Err(ValidationError::UpgradeMaxed {
                kind: kind.to_string(),
                max: upgrade.max_level,
            }
            .into());
        }

        upgrade.apply(&mut realm, level, upgrades, border)?;
        realm.upgrades.insert(kind, level);
        let realm = self.update(realm).await?;

        Ok(UpgradePurchase {
            realm,
            kind,
            level,
            price: upgrade.purchase_price(level, border),
        })
    }

    fn recache(&self, loaded: Option<Realm>) -> Option<Realm> {
        if let Some(realm) = &loaded {
            self.cache.insert(realm);
        }
        loaded
    }

    async fn lookup(&self, id: RealmId) -> Result<Option<Realm>> {
        if let Some(realm) = self.cache.get(id) {
            return Ok(Some(realm));
        }
        self.persistence.load(id).await
    }

    async fn ensure_unique(&self, realm: &Realm) -> Result<()> {
        let by_name = match self.cache.get_by_name(&realm.name) {
            Some(found) => Some(found),
            None => self.persistence.find_by_name(&realm.name).await?,
        };
        if by_name.is_some_and(|found| found.id != realm.id) {
            return Err(ValidationError::NameTaken(realm.name.clone()).into());
        }

        let by_folder = match self.cache.get_by_world_folder(&realm.world_folder) {
            Some(found) => Some(found),
            None => self.persistence.find_by_world_folder(&realm.world_folder).await?,
        };
        if by_folder.is_some_and(|found| found.id != realm.id) {
            return Err(ValidationError::WorldFolderTaken(realm.world_folder.clone()).into());
        }

        Ok(())
    }
}
