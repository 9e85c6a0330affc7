use crate::core::{Realm, RealmId, UserId, normalize_name};
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct CacheEntry {
    realm: Realm,
    touched: Instant,
}

impl CacheEntry {
    fn new(realm: Realm) -> Self {
        Self {
            realm,
            touched: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.touched.elapsed() > ttl)
    }
}

/// The three indices. Each evicts on its own: capacity and idle time are
/// tracked per map, so an entry can age out of one index while the others
/// still hold it.
struct Indices {
    by_id: LruCache<RealmId, CacheEntry>,
    by_name: LruCache<String, CacheEntry>,
    by_folder: LruCache<String, CacheEntry>,
}

/// Capacity- and idle-time-bounded realm cache with id, name and
/// world-folder indices.
///
/// All three indices sit behind one lock, so a reader never observes an
/// entity present in the id index but missing from a secondary index
/// mid-write.
pub struct RealmCache {
    indices: Mutex<Indices>,
    ttl: Option<Duration>,
}

fn lookup<K: Hash + Eq>(
    map: &mut LruCache<K, CacheEntry>,
    key: &K,
    ttl: Option<Duration>,
) -> Option<Realm> {
    let expired = match map.get_mut(key) {
        None => return None,
        Some(entry) if entry.is_expired(ttl) => true,
        Some(entry) => {
            entry.touched = Instant::now();
            false
        }
    };

    if expired {
        map.pop(key);
        return None;
    }
    map.peek(key).map(|entry| entry.realm.clone())
}

fn drop_keys_for<K: Hash + Eq + Clone>(
    map: &mut LruCache<K, CacheEntry>,
    id: RealmId,
    keep: Option<&K>,
) {
    let stale: Vec<K> = map
        .iter()
        .filter(|(key, entry)| entry.realm.id == id && Some(*key) != keep)
        .map(|(key, _)| key.clone())
        .collect();
    for key in stale {
        map.pop(&key);
    }
}

impl RealmCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            indices: Mutex::new(Indices {
                by_id: LruCache::new(capacity),
                by_name: LruCache::new(capacity),
                by_folder: LruCache::new(capacity),
            }),
            ttl,
        }
    }

    fn indices(&self) -> MutexGuard<'_, Indices> {
        self.indices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes `realm` into all three indices. Secondary keys left behind by a
    /// rename of the same realm are dropped in the same critical section.
    pub fn insert(&self, realm: &Realm) {
        let name_key = realm.name_key();
        let folder_key = realm.world_folder.clone();

        let mut indices = self.indices();
        drop_keys_for(&mut indices.by_name, realm.id, Some(&name_key));
        drop_keys_for(&mut indices.by_folder, realm.id, Some(&folder_key));
        indices.by_id.put(realm.id, CacheEntry::new(realm.clone()));
        indices.by_name.put(name_key, CacheEntry::new(realm.clone()));
        indices.by_folder.put(folder_key, CacheEntry::new(realm.clone()));
    }

    /// Removes `id` from every index, including secondary entries whose id
    /// entry has already been evicted.
    pub fn invalidate(&self, id: RealmId) {
        let mut indices = self.indices();
        indices.by_id.pop(&id);
        drop_keys_for(&mut indices.by_name, id, None);
        drop_keys_for(&mut indices.by_folder, id, None);
    }

    pub fn get(&self, id: RealmId) -> Option<Realm> {
        let mut indices = self.indices();
        lookup(&mut indices.by_id, &id, self.ttl)
    }

    pub fn get_by_name(&self, name: &str) -> Option<Realm> {
        let key = normalize_name(name);
        let mut indices = self.indices();
        lookup(&mut indices.by_name, &key, self.ttl)
    }

    pub fn get_by_world_folder(&self, folder: &str) -> Option<Realm> {
        let key = folder.to_string();
        let mut indices = self.indices();
        lookup(&mut indices.by_folder, &key, self.ttl)
    }

    /// Snapshot of live id-index entries. Does not refresh recency.
    pub fn values(&self) -> Vec<Realm> {
        let indices = self.indices();
        indices
            .by_id
            .iter()
            .filter(|(_, entry)| !entry.is_expired(self.ttl))
            .map(|(_, entry)| entry.realm.clone())
            .collect()
    }

    pub fn list_by_owner(&self, owner: UserId) -> Vec<Realm> {
        self.values()
            .into_iter()
            .filter(|realm| realm.owner == owner)
            .collect()
    }

    pub fn list_by_membership(&self, user: UserId) -> Vec<Realm> {
        self.values()
            .into_iter()
            .filter(|realm| realm.is_member(&user))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.indices().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut indices = self.indices();
        indices.by_id.clear();
        indices.by_name.clear();
        indices.by_folder.clear();
    }
}
