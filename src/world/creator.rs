use crate::core::{Realm, RealmError, Result};
use async_trait::async_trait;
use tracing::{Level, event};

/// What a creator needs to materialize a realm's backing world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldRequest {
    pub world_folder: String,
    pub template_id: String,
    pub flat: bool,
}

impl WorldRequest {
    pub fn for_realm(realm: &Realm) -> Self {
        Self {
            world_folder: realm.world_folder.clone(),
            template_id: realm.template_id.clone(),
            flat: realm.flat,
        }
    }
}

#[async_trait]
pub trait WorldCreator: Send + Sync {
    fn name(&self) -> &str;

    fn can_handle(&self, _request: &WorldRequest) -> bool {
        true
    }

    /// Creates the world. `Ok(false)` declines and lets the next creator try.
    async fn create(&self, request: &WorldRequest) -> Result<bool>;
}

/// Creators tried in registration order; the first success wins.
#[derive(Default)]
pub struct WorldCreatorRegistry {
    creators: Vec<Box<dyn WorldCreator>>,
}

impl WorldCreatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, creator: Box<dyn WorldCreator>) {
        event!(Level::DEBUG, creator = creator.name(), "registered world creator");
        self.creators.push(creator);
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }

    /// Returns the name of the creator that produced the world.
    pub async fn create(&self, request: &WorldRequest) -> Result<String> {
        for creator in self.creators.iter().filter(|c| c.can_handle(request)) {
            match creator.create(request).await {
                Ok(true) => return Ok(creator.name().to_string()),
                Ok(false) => {}
                Err(err) => {
                    event!(
                        Level::WARN,
                        creator = creator.name(),
                        world = %request.world_folder,
                        error = %err,
                        "world creator failed; trying next"
                    );
                }
            }
        }

        Err(RealmError::WorldCreation(format!(
            "no creator produced world '{}' from template '{}'",
            request.world_folder, request.template_id
        )))
    }
}
