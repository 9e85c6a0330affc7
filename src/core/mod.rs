pub mod error;
pub mod ids;
pub mod realm;

pub use error::{RealmError, Result, ValidationError};
pub use ids::{GLOBAL_SPACE_KEY, RealmId, SpaceId, UserId};
pub use realm::{BorderCenter, Difficulty, Realm, Role, UpgradeKind, normalize_name};
