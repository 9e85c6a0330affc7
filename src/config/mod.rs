pub mod border;
pub mod upgrade;

pub use border::{BorderConfig, BorderTier};
pub use upgrade::{Upgrade, UpgradeConfig};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Realm store and snapshot store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for realm records and inventory snapshots
    pub data_dir: PathBuf,

    /// Maximum entries held by each cache index
    pub cache_capacity: usize,

    /// Entries not accessed within this window are evicted on next lookup
    pub cache_ttl: Option<Duration>,

    /// Reload realms from persistence on a cache miss
    pub read_through: bool,

    /// Load every stored realm into the cache when the store opens
    pub warm_on_open: bool,
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            cache_capacity: 512,
            cache_ttl: Some(Duration::from_secs(1800)), // 30 minutes
            read_through: true,
            warm_on_open: true,
        }
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn no_cache_ttl(mut self) -> Self {
        self.cache_ttl = None;
        self
    }

    pub fn read_through(mut self, enabled: bool) -> Self {
        self.read_through = enabled;
        self
    }

    pub fn warm_on_open(mut self, enabled: bool) -> Self {
        self.warm_on_open = enabled;
        self
    }

    pub fn realms_dir(&self) -> PathBuf {
        self.data_dir.join("realms")
    }

    pub fn inventories_dir(&self) -> PathBuf {
        self.data_dir.join("inventories")
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }

        if let Some(ttl) = self.cache_ttl {
            if ttl.is_zero() {
                return Err("cache_ttl must be non-zero when set".to_string());
            }
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("data")
    }
}

#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Upper bound on how long `flush` waits for in-flight transfers
    pub flush_timeout: Duration,
}

impl TransferConfig {
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            flush_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.cache_capacity, 512);
        assert!(config.read_through);
        assert_eq!(config.realms_dir(), PathBuf::from("data").join("realms"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = StoreConfig::new("/tmp/realms")
            .cache_capacity(4)
            .cache_ttl(Duration::from_secs(5))
            .read_through(false);

        assert_eq!(config.cache_capacity, 4);
        assert_eq!(config.cache_ttl, Some(Duration::from_secs(5)));
        assert!(!config.read_through);
    }

    #[test]
    fn test_validate() {
        assert!(StoreConfig::default().validate().is_ok());
        assert!(StoreConfig::default().cache_capacity(0).validate().is_err());
        assert!(
            StoreConfig::default()
                .cache_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
