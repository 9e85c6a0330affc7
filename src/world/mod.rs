pub mod authority;
pub mod border;
pub mod creator;
pub mod state;

pub use authority::Authority;
pub use border::{BorderApplier, BorderOutcome};
pub use creator::{WorldCreator, WorldCreatorRegistry, WorldRequest};
pub use state::{InventoryHost, LiveState, Position, UserSession, WorldBorder, WorldHost, WorldState};
