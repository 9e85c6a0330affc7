use crate::core::ids::UserId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Realm '{0}' not found")]
    UnknownRealm(String),

    #[error("User {0} is not connected")]
    UnknownUser(String),

    #[error("Border tier '{0}' not found")]
    UnknownTier(String),

    #[error("Realm name '{0}' is already taken")]
    NameTaken(String),

    #[error("World folder '{0}' is already in use")]
    WorldFolderTaken(String),

    #[error("Upgrade {kind} is already at max level {max}")]
    UpgradeMaxed { kind: String, max: u32 },

    #[error("Invalid value: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum RealmError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Transfer already in progress for user {0}")]
    TransferInProgress(UserId),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("World creation failed: {0}")]
    WorldCreation(String),

    #[error("Authority context is shut down")]
    AuthorityClosed,

    #[error("Lock error: {0}")]
    LockError(String),
}

impl RealmError {
    /// True for failures of the durable layer. A transfer failing this way
    /// leaves its capture staged for a retry.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, RealmError>;

impl<T> From<std::sync::PoisonError<T>> for RealmError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for RealmError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RealmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for RealmError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RealmError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RealmError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Persistence(format!("background task: {}", err))
    }
}
