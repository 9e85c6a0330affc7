use crate::config::BorderConfig;
use crate::core::{BorderCenter, Realm, RealmError, Result, UserId};
use crate::world::authority::Authority;
use crate::world::state::{Position, WorldBorder, WorldHost};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{Level, event};

#[derive(Debug, Clone, PartialEq)]
pub enum BorderOutcome {
    Applied {
        tier: String,
        border: WorldBorder,
        /// Occupants scheduled for relocation behind the border write.
        relocating: usize,
    },
    /// World not materialized yet; applied on its ready signal.
    Pending,
    /// No usable tier. Logged, nothing changed.
    Skipped,
}

struct BorderState<S> {
    authority: Authority<S>,
    config: RwLock<BorderConfig>,
    pending: Mutex<HashMap<String, Realm>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Applies realm border settings to backing worlds, deferring worlds that
/// are not loaded yet. Pending entries are keyed by world name; the last
/// queued realm settings win.
pub struct BorderApplier<S: WorldHost> {
    state: Arc<BorderState<S>>,
}

impl<S: WorldHost> Clone for BorderApplier<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<S: WorldHost> BorderApplier<S> {
    pub fn new(authority: Authority<S>, config: BorderConfig) -> Self {
        if let Err(err) = config.validate() {
            event!(Level::WARN, error = %err, "border tier configuration is incomplete");
        }
        Self {
            state: Arc::new(BorderState {
                authority,
                config: RwLock::new(config),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Swaps in a new tier ladder. Rejected if it does not validate.
    pub fn reload_config(&self, config: BorderConfig) -> Result<()> {
        config.validate().map_err(RealmError::Configuration)?;
        *self.state.config.write()? = config;
        Ok(())
    }

    pub fn config(&self) -> BorderConfig {
        self.state
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_pending(&self, world: &str) -> bool {
        locked(&self.state.pending).contains_key(world)
    }

    pub fn pending_count(&self) -> usize {
        locked(&self.state.pending).len()
    }

    /// Applies `realm`'s border now if its world is loaded, otherwise queues
    /// it for the world's ready signal.
    pub async fn apply_border(&self, realm: &Realm) -> Result<BorderOutcome> {
        let state = self.state.clone();
        let realm = realm.clone();
        self.state
            .authority
            .call(move |host: &mut S| {
                if host.is_materialized(&realm.world_folder) {
                    return state.apply_now(host, &realm);
                }
                event!(Level::DEBUG, world = %realm.world_folder, "world not loaded; border application queued");
                locked(&state.pending).insert(realm.world_folder.clone(), realm);
                BorderOutcome::Pending
            })
            .await
    }

    /// World-ready signal. Applies and removes the pending entry for `world`,
    /// if any.
    pub async fn on_world_ready(&self, world: &str) -> Result<Option<BorderOutcome>> {
        let state = self.state.clone();
        let world = world.to_string();
        self.state
            .authority
            .call(move |host: &mut S| {
                let realm = locked(&state.pending).remove(&world)?;
                Some(state.apply_now(host, &realm))
            })
            .await
    }

    /// Drops a queued application, e.g. when the realm is deleted first.
    pub fn cancel_pending(&self, world: &str) -> Option<Realm> {
        locked(&self.state.pending).remove(world)
    }
}

impl<S: WorldHost> BorderState<S> {
    fn apply_now(self: &Arc<Self>, host: &mut S, realm: &Realm) -> BorderOutcome {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
        if config.tier(&realm.border_tier_id).is_none() {
            event!(
                Level::WARN,
                realm = %realm.id,
                tier = %realm.border_tier_id,
                "unknown border tier; falling back to default"
            );
        }
        let Some(tier) = config.resolve(&realm.border_tier_id) else {
            event!(Level::ERROR, realm = %realm.id, "no default border tier configured; border not applied");
            return BorderOutcome::Skipped;
        };

        let border = WorldBorder {
            center: BorderCenter::new(
                realm.border_center.x + tier.center_offset_x,
                realm.border_center.z + tier.center_offset_z,
            ),
            size: tier.size,
            warning_distance: tier.warning_distance,
            warning_time_secs: tier.warning_time_secs,
            transition_time_secs: tier.transition_time_secs,
        };
        let tier_id = tier.id.clone();
        drop(config);

        let world = realm.world_folder.clone();
        if !host.set_border(&world, border.clone()) {
            // Unloaded between the check and the write; queue it again.
            locked(&self.pending).insert(world, realm.clone());
            return BorderOutcome::Pending;
        }

        let outside: Vec<UserId> = host
            .occupants(&world)
            .into_iter()
            .filter(|(_, position)| !border.contains(position))
            .map(|(user, _)| user)
            .collect();
        let relocating = outside.len();

        if !outside.is_empty() {
            let scheduled = self
                .authority
                .post(move |host: &mut S| relocate_outside(host, &world, outside));
            if let Err(err) = scheduled {
                event!(Level::ERROR, error = %err, "could not schedule border relocation");
            }
        }

        event!(Level::INFO, realm = %realm.id, tier = %tier_id, size = border.size, relocating, "border applied");
        BorderOutcome::Applied {
            tier: tier_id,
            border,
            relocating,
        }
    }
}

/// Runs at the next safe point after the border write. Positions are
/// re-checked, since users may have moved or left in between.
fn relocate_outside<S: WorldHost>(host: &mut S, world: &str, users: Vec<UserId>) {
    let Some(border) = host.border(world).cloned() else {
        return;
    };
    let Some(target) = host.safe_point(world) else {
        event!(Level::WARN, world = %world, "no safe point for border relocation");
        return;
    };

    let current: HashMap<UserId, Position> = host.occupants(world).into_iter().collect();
    for user in users {
        match current.get(&user) {
            Some(position) if !border.contains(position) => host.relocate(&user, world, target),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BorderTier;
    use crate::world::state::LiveState;

    fn config() -> BorderConfig {
        BorderConfig::new(vec![
            BorderTier::new("small", 64.0).as_default(),
            BorderTier::new("large", 256.0).center_offset(8.0, -8.0),
        ])
    }

    fn realm(tier: &str) -> Realm {
        Realm::new("Keep", UserId::new(), "plains", tier)
    }

    #[tokio::test]
    async fn test_apply_to_loaded_world() {
        let realm = realm("large");
        let mut live = LiveState::new();
        live.load_world(realm.world_folder.clone(), Position::default());
        let authority = Authority::spawn(live);
        let applier = BorderApplier::new(authority.clone(), config());

        let outcome = applier.apply_border(&realm).await.unwrap();
        match outcome {
            BorderOutcome::Applied { tier, border, relocating } => {
                assert_eq!(tier, "large");
                assert_eq!(border.size, 256.0);
                assert_eq!(border.center, BorderCenter::new(8.0, -8.0));
                assert_eq!(relocating, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tier_falls_back_to_default() {
        let realm = realm("gigantic");
        let mut live = LiveState::new();
        live.load_world(realm.world_folder.clone(), Position::default());
        let applier = BorderApplier::new(Authority::spawn(live), config());

        let outcome = applier.apply_border(&realm).await.unwrap();
        assert!(matches!(outcome, BorderOutcome::Applied { ref tier, .. } if tier == "small"));
    }

    #[tokio::test]
    async fn test_missing_default_skips() {
        let realm = realm("gigantic");
        let mut live = LiveState::new();
        live.load_world(realm.world_folder.clone(), Position::default());
        let authority = Authority::spawn(live);
        let applier = BorderApplier::new(
            authority.clone(),
            BorderConfig::new(vec![BorderTier::new("large", 256.0)]),
        );

        assert_eq!(applier.apply_border(&realm).await.unwrap(), BorderOutcome::Skipped);
        let world = realm.world_folder.clone();
        let border = authority
            .call(move |live: &mut LiveState| live.border(&world).cloned())
            .await
            .unwrap();
        assert!(border.is_none());
    }

    #[tokio::test]
    async fn test_reload_rejects_invalid_config() {
        let applier = BorderApplier::new(Authority::spawn(LiveState::new()), config());
        assert!(applier.reload_config(BorderConfig::default()).is_err());
        assert_eq!(applier.config(), config());
    }
}
