use crate::config::TransferConfig;
use crate::core::{RealmError, RealmId, Result, SpaceId, UserId, ValidationError};
use crate::inventory::codec::InventorySnapshot;
use crate::inventory::model::LiveInventory;
use crate::inventory::store::InventoryStore;
use crate::world::authority::Authority;
use crate::world::state::InventoryHost;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{Instrument, Level, event, info_span};

/// Where a user's live inventory currently belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Unbound,
    Bound(SpaceId),
}

impl Location {
    /// The space an exit from this location saves into.
    pub fn space_or_global(&self) -> SpaceId {
        match self {
            Self::Unbound => SpaceId::Global,
            Self::Bound(space) => *space,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed {
        from: SpaceId,
        to: SpaceId,
        /// False when the target space had no snapshot and a fresh inventory was applied.
        restored: bool,
    },
    /// Already bound to the requested space.
    Unchanged,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub persisted: usize,
    pub failed: usize,
    pub abandoned_in_flight: usize,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    location: Location,
    session: u64,
}

/// Pre-swap capture held until the exit snapshot is durable and the swap
/// has been applied.
#[derive(Debug, Clone)]
struct StagedInventory {
    source: SpaceId,
    inventory: LiveInventory,
    captured_at: DateTime<Utc>,
}

struct TransferState<S> {
    store: Arc<dyn InventoryStore>,
    authority: Authority<S>,
    config: TransferConfig,
    bindings: Mutex<HashMap<UserId, Binding>>,
    staging: Mutex<HashMap<UserId, StagedInventory>>,
    in_flight: Mutex<HashSet<UserId>>,
    idle: Notify,
    sessions: AtomicU64,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Single-flight slot for one user, released on drop.
struct InFlightGuard<S: InventoryHost> {
    state: Arc<TransferState<S>>,
    user: UserId,
}

impl<S: InventoryHost> InFlightGuard<S> {
    fn acquire(state: &Arc<TransferState<S>>, user: UserId) -> Result<Self> {
        if !locked(&state.in_flight).insert(user) {
            event!(Level::WARN, user = %user, "inventory transfer already in flight; request ignored");
            return Err(RealmError::TransferInProgress(user));
        }
        Ok(Self {
            state: state.clone(),
            user,
        })
    }
}

impl<S: InventoryHost> Drop for InFlightGuard<S> {
    fn drop(&mut self) {
        let mut in_flight = locked(&self.state.in_flight);
        in_flight.remove(&self.user);
        if in_flight.is_empty() {
            self.state.idle.notify_waiters();
        }
    }
}

/// Moves users' live inventories between spaces.
///
/// Exit snapshots are written to the store before the live inventory is
/// replaced, and the pre-swap capture is staged so a disconnect in the
/// middle of a transfer can still persist it.
pub struct InventoryTransferService<S: InventoryHost> {
    state: Arc<TransferState<S>>,
}

impl<S: InventoryHost> Clone for InventoryTransferService<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<S: InventoryHost> InventoryTransferService<S> {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        authority: Authority<S>,
        config: TransferConfig,
    ) -> Self {
        Self {
            state: Arc::new(TransferState {
                store,
                authority,
                config,
                bindings: Mutex::new(HashMap::new()),
                staging: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
                idle: Notify::new(),
                sessions: AtomicU64::new(1),
            }),
        }
    }

    pub fn location(&self, user: UserId) -> Location {
        locked(&self.state.bindings)
            .get(&user)
            .map(|binding| binding.location)
            .unwrap_or(Location::Unbound)
    }

    pub fn is_in_flight(&self, user: UserId) -> bool {
        locked(&self.state.in_flight).contains(&user)
    }

    /// Source space of the staged capture, if one is awaiting persistence.
    pub fn staged_source(&self, user: UserId) -> Option<SpaceId> {
        locked(&self.state.staging).get(&user).map(|staged| staged.source)
    }

    pub fn staged_count(&self) -> usize {
        locked(&self.state.staging).len()
    }

    pub fn on_connect(&self, user: UserId) {
        let session = self.state.sessions.fetch_add(1, Ordering::Relaxed);
        locked(&self.state.bindings).insert(
            user,
            Binding {
                location: Location::Bound(SpaceId::Global),
                session,
            },
        );
        event!(Level::DEBUG, user = %user, session, "user bound to global space");
    }

    /// Runs the transfer protocol into `target`. The source is the user's
    /// recorded location, never a caller-supplied value.
    ///
    /// The protocol runs on its own task, so dropping the returned future
    /// does not cancel it. Fails with `UnknownUser` when the user has no
    /// session by the time the capture runs.
    pub async fn on_enter_space(&self, user: UserId, target: SpaceId) -> Result<TransferOutcome> {
        let guard = InFlightGuard::acquire(&self.state, user)?;
        let state = self.state.clone();
        let span = info_span!("inventory_transfer", user = %user, target = %target);

        tokio::spawn(
            async move {
                let _guard = guard;
                state.transfer(user, target).await
            }
            .instrument(span),
        )
        .await?
    }

    pub async fn on_exit_to_global(
        &self,
        user: UserId,
        current: SpaceId,
    ) -> Result<TransferOutcome> {
        let recorded = self.location(user);
        if recorded != Location::Bound(current) {
            event!(
                Level::DEBUG,
                user = %user,
                reported = %current,
                recorded = ?recorded,
                "exit-to-global reported a different source; using recorded location"
            );
        }
        self.on_enter_space(user, SpaceId::Global).await
    }

    /// Persists what the user holds before their session is torn down.
    ///
    /// While a transfer is in flight the staged capture wins over the live
    /// inventory: it is the last state known to belong to its source space.
    /// The caller should await this before dropping the user's live state.
    pub async fn on_disconnect(&self, user: UserId) -> Result<()> {
        let state = self.state.clone();
        let pending = self
            .state
            .authority
            .call(move |host: &mut S| {
                let binding = locked(&state.bindings).remove(&user);
                let in_flight = locked(&state.in_flight).contains(&user);
                let staged = locked(&state.staging).get(&user).cloned();
                if in_flight {
                    if let Some(staged) = staged {
                        return Some((staged.source, staged.inventory, Some(staged.captured_at)));
                    }
                }
                // A capture left staged by a failed transfer is older than the
                // live inventory, which was reverted to it and may have changed since.
                let location = binding.map(|binding| binding.location).unwrap_or(Location::Unbound);
                host.inventory(&user).cloned().map(|inventory| {
                    let staged_at = staged.map(|staged| staged.captured_at);
                    (location.space_or_global(), inventory, staged_at)
                })
            })
            .await?;

        let Some((space, inventory, staged_at)) = pending else {
            event!(Level::DEBUG, user = %user, "disconnect with no live inventory; nothing to persist");
            return Ok(());
        };

        if staged_at.is_some() {
            event!(Level::WARN, user = %user, space = %space, "persisting staged inventory on disconnect");
        }

        let state = self.state.clone();
        tokio::spawn(async move { state.persist_for_disconnect(user, space, inventory, staged_at).await })
            .await?
    }

    /// Retries persisting a staged capture left behind by a failed transfer.
    /// Returns false when nothing was staged.
    pub async fn retry_staged(&self, user: UserId) -> Result<bool> {
        let _guard = InFlightGuard::acquire(&self.state, user)?;
        let staged = locked(&self.state.staging).get(&user).cloned();
        let Some(staged) = staged else {
            return Ok(false);
        };
        self.state.persist_staged(user, staged).await?;
        Ok(true)
    }

    /// Deletes every snapshot recorded for a deleted realm. Returns the users
    /// still bound to it; they should be moved out before the realm's world
    /// is unloaded.
    pub async fn on_realm_deleted(&self, realm: RealmId) -> Result<Vec<UserId>> {
        let space = SpaceId::Realm(realm);
        self.state.store.delete_space(space).await?;

        let stranded: Vec<UserId> = locked(&self.state.bindings)
            .iter()
            .filter(|(_, binding)| binding.location == Location::Bound(space))
            .map(|(user, _)| *user)
            .collect();
        if !stranded.is_empty() {
            event!(Level::WARN, realm = %realm, users = stranded.len(), "users still bound to deleted realm");
        }
        event!(Level::INFO, realm = %realm, "inventory snapshots dropped for deleted realm");
        Ok(stranded)
    }

    /// Shutdown drain: waits for in-flight transfers (bounded by the flush
    /// timeout), then persists every staged capture still outstanding.
    pub async fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();

        let drained = timeout(self.state.config.flush_timeout, async {
            loop {
                let notified = self.state.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if locked(&self.state.in_flight).is_empty() {
                    break;
                }
                notified.await;
            }
        })
        .await;

        if drained.is_err() {
            report.abandoned_in_flight = locked(&self.state.in_flight).len();
            event!(
                Level::ERROR,
                in_flight = report.abandoned_in_flight,
                "flush timed out waiting for in-flight transfers"
            );
        }

        let staged: Vec<(UserId, StagedInventory)> = locked(&self.state.staging)
            .iter()
            .map(|(user, staged)| (*user, staged.clone()))
            .collect();

        let results = join_all(staged.into_iter().map(|(user, staged)| async move {
            (user, self.state.persist_staged(user, staged).await)
        }))
        .await;

        for (user, result) in results {
            match result {
                Ok(()) => report.persisted += 1,
                Err(err) => {
                    report.failed += 1;
                    event!(Level::ERROR, user = %user, error = %err, "staged inventory lost on flush");
                }
            }
        }

        report
    }
}

impl<S: InventoryHost> TransferState<S> {
    fn binding(&self, user: UserId) -> Option<Binding> {
        locked(&self.bindings).get(&user).copied()
    }

    async fn transfer(self: &Arc<Self>, user: UserId, target: SpaceId) -> Result<TransferOutcome> {
        // Steps 1-2: capture and stage on the authoritative context.
        let state = self.clone();
        let captured = self
            .authority
            .call(move |host: &mut S| -> Result<Option<(SpaceId, u64, LiveInventory)>> {
                // Never connected, or disconnected before the capture ran. The
                // disconnect path owns whatever live state is left.
                let Some(binding) = state.binding(user) else {
                    event!(Level::WARN, user = %user, "transfer requested for a user with no session; ignored");
                    return Err(ValidationError::UnknownUser(user.to_string()).into());
                };
                let source = binding.location.space_or_global();
                if binding.location == Location::Bound(target) {
                    return Ok(None);
                }

                let inventory = host
                    .inventory(&user)
                    .cloned()
                    .ok_or_else(|| ValidationError::UnknownUser(user.to_string()))?;
                locked(&state.staging).insert(
                    user,
                    StagedInventory {
                        source,
                        inventory: inventory.clone(),
                        captured_at: Utc::now(),
                    },
                );
                Ok(Some((source, binding.session, inventory)))
            })
            .await??;

        let Some((source, session, captured)) = captured else {
            return Ok(TransferOutcome::Unchanged);
        };

        // Steps 3-4: persist the exit snapshot, then load the target.
        match self.exchange(user, source, target, &captured).await {
            Ok(loaded) => {
                let restored = loaded.is_some();
                self.apply(user, session, target, loaded.unwrap_or_default())
                    .await?;
                event!(Level::INFO, from = %source, to = %target, restored, "inventory transfer completed");
                Ok(TransferOutcome::Completed {
                    from: source,
                    to: target,
                    restored,
                })
            }
            Err(err) => {
                // Step 6: nothing from the target may stick; the capture stays staged.
                event!(Level::ERROR, from = %source, to = %target, error = %err, "inventory transfer failed; reverting");
                self.revert(user, session, captured).await?;
                Err(err)
            }
        }
    }

    async fn exchange(
        &self,
        user: UserId,
        source: SpaceId,
        target: SpaceId,
        captured: &LiveInventory,
    ) -> Result<Option<LiveInventory>> {
        let snapshot = InventorySnapshot::capture(captured, source)?;
        self.store.save(source, user, &snapshot).await?;

        match self.store.load(target, user).await? {
            Some(snapshot) => Ok(Some(snapshot.restore()?)),
            None => Ok(None),
        }
    }

    /// Step 5: swap in the target inventory and bind the user to `target`.
    async fn apply(
        self: &Arc<Self>,
        user: UserId,
        session: u64,
        target: SpaceId,
        inventory: LiveInventory,
    ) -> Result<()> {
        let state = self.clone();
        self.authority
            .call(move |host: &mut S| {
                let mut bindings = locked(&state.bindings);
                let current = bindings.get(&user).map(|binding| binding.session);
                // The exit snapshot is durable; the staged capture is no longer needed
                // whether or not the user is still here to receive the target.
                locked(&state.staging).remove(&user);

                if current != Some(session) {
                    event!(Level::WARN, user = %user, "user left mid-transfer; target inventory not applied");
                    return;
                }
                let Some(live) = host.inventory_mut(&user) else {
                    return;
                };
                *live = inventory;
                bindings.insert(
                    user,
                    Binding {
                        location: Location::Bound(target),
                        session,
                    },
                );
            })
            .await
    }

    async fn revert(self: &Arc<Self>, user: UserId, session: u64, captured: LiveInventory) -> Result<()> {
        let state = self.clone();
        self.authority
            .call(move |host: &mut S| {
                let current = state.binding(user).map(|binding| binding.session);
                if current != Some(session) {
                    return;
                }
                if let Some(live) = host.inventory_mut(&user) {
                    *live = captured;
                }
            })
            .await
    }

    async fn persist_staged(&self, user: UserId, staged: StagedInventory) -> Result<()> {
        let snapshot = InventorySnapshot::capture(&staged.inventory, staged.source)?;
        self.store.save(staged.source, user, &snapshot).await?;
        self.clear_staged_if(user, staged.captured_at);
        event!(Level::INFO, user = %user, space = %staged.source, "staged inventory persisted");
        Ok(())
    }

    async fn persist_for_disconnect(
        &self,
        user: UserId,
        space: SpaceId,
        inventory: LiveInventory,
        staged_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let snapshot = InventorySnapshot::capture(&inventory, space)?;
        if let Err(err) = self.store.save(space, user, &snapshot).await {
            event!(Level::ERROR, user = %user, space = %space, error = %err, "failed to persist inventory on disconnect");
            // Keep what we tried to write staged so flush or a retry can still write it.
            locked(&self.staging).insert(
                user,
                StagedInventory {
                    source: space,
                    inventory,
                    captured_at: Utc::now(),
                },
            );
            return Err(err);
        }

        if let Some(captured_at) = staged_at {
            self.clear_staged_if(user, captured_at);
        }
        event!(Level::DEBUG, user = %user, space = %space, "inventory persisted on disconnect");
        Ok(())
    }

    /// Drops the staged entry only if it is still the capture we persisted.
    fn clear_staged_if(&self, user: UserId, captured_at: DateTime<Utc>) {
        let mut staging = locked(&self.staging);
        if staging
            .get(&user)
            .is_some_and(|staged| staged.captured_at == captured_at)
        {
            staging.remove(&user);
        }
    }
}
