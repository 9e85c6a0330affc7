//! Integration tests for inventory transfers between spaces

use async_trait::async_trait;
use realmkeep::{
    Authority, InventoryHost, InventorySnapshot, InventoryStore, InventoryTransferService,
    ItemStack, LiveState, Location, MemoryInventoryStore, Position, RealmError, RealmId, Result,
    SpaceId, TransferConfig, TransferOutcome, UserId, ValidationError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

/// Memory store with switchable failures and a one-shot gate on `save`.
#[derive(Default)]
struct ControlledStore {
    inner: MemoryInventoryStore,
    fail_save: AtomicBool,
    fail_load: AtomicBool,
    gate_next_save: AtomicBool,
    entered: Notify,
    release: Notify,
    saves: AtomicUsize,
}

#[async_trait]
impl InventoryStore for ControlledStore {
    async fn save(&self, space: SpaceId, user: UserId, snapshot: &InventorySnapshot) -> Result<()> {
        if self.gate_next_save.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(RealmError::Persistence("disk full".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(space, user, snapshot).await
    }

    async fn load(&self, space: SpaceId, user: UserId) -> Result<Option<InventorySnapshot>> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(RealmError::Persistence("read timed out".to_string()));
        }
        self.inner.load(space, user).await
    }

    async fn delete(&self, space: SpaceId, user: UserId) -> Result<()> {
        self.inner.delete(space, user).await
    }

    async fn delete_space(&self, space: SpaceId) -> Result<()> {
        self.inner.delete_space(space).await
    }
}

struct Harness {
    store: Arc<ControlledStore>,
    authority: Authority<LiveState>,
    service: InventoryTransferService<LiveState>,
    user: UserId,
}

impl Harness {
    fn new(config: TransferConfig) -> Self {
        let user = UserId::new();
        let mut live = LiveState::new();
        live.join(user, "lobby", Position::default());

        let store = Arc::new(ControlledStore::default());
        let authority = Authority::spawn(live);
        let service = InventoryTransferService::new(store.clone(), authority.clone(), config);
        service.on_connect(user);

        Self {
            store,
            authority,
            service,
            user,
        }
    }

    async fn give(&self, material: &'static str) {
        let user = self.user;
        self.authority
            .call(move |state: &mut LiveState| {
                let inventory = state.inventory_mut(&user).unwrap();
                inventory.main.set(0, Some(ItemStack::new(material, 1))).unwrap();
            })
            .await
            .unwrap();
    }

    async fn held(&self) -> Option<String> {
        let user = self.user;
        self.authority
            .call(move |state: &mut LiveState| {
                state
                    .inventory(&user)
                    .and_then(|inventory| inventory.main.get(0).map(|item| item.material.clone()))
            })
            .await
            .unwrap()
    }

    async fn stored(&self, space: SpaceId) -> Option<String> {
        let snapshot = self.store.inner.load(space, self.user).await.unwrap()?;
        let inventory = snapshot.restore().unwrap();
        inventory.main.get(0).map(|item| item.material.clone())
    }
}

#[tokio::test]
async fn test_global_to_realms_and_back() {
    let h = Harness::new(TransferConfig::default());
    let realm_a = SpaceId::Realm(RealmId::new());
    let realm_b = SpaceId::Realm(RealmId::new());
    h.give("diamond_sword").await;

    let outcome = assert_ok!(h.service.on_enter_space(h.user, realm_a).await);
    assert_eq!(
        outcome,
        TransferOutcome::Completed {
            from: SpaceId::Global,
            to: realm_a,
            restored: false
        }
    );
    assert_eq!(h.stored(SpaceId::Global).await.as_deref(), Some("diamond_sword"));
    assert_eq!(h.held().await, None);
    assert_eq!(h.service.location(h.user), Location::Bound(realm_a));

    h.give("oak_log").await;
    assert_ok!(h.service.on_enter_space(h.user, realm_b).await);
    assert_eq!(h.stored(realm_a).await.as_deref(), Some("oak_log"));
    assert_eq!(h.held().await, None);

    h.give("cobblestone").await;
    let outcome = assert_ok!(h.service.on_exit_to_global(h.user, realm_b).await);
    assert_eq!(
        outcome,
        TransferOutcome::Completed {
            from: realm_b,
            to: SpaceId::Global,
            restored: true
        }
    );
    assert_eq!(h.held().await.as_deref(), Some("diamond_sword"));
    assert_eq!(h.stored(realm_b).await.as_deref(), Some("cobblestone"));

    // Re-entering restores what was left there.
    assert_ok!(h.service.on_enter_space(h.user, realm_a).await);
    assert_eq!(h.held().await.as_deref(), Some("oak_log"));
    assert_eq!(h.service.staged_count(), 0);
}

#[tokio::test]
async fn test_enter_current_space_is_unchanged() {
    let h = Harness::new(TransferConfig::default());
    h.give("torch").await;

    let outcome = assert_ok!(h.service.on_enter_space(h.user, SpaceId::Global).await);
    assert_eq!(outcome, TransferOutcome::Unchanged);
    assert_eq!(h.held().await.as_deref(), Some("torch"));
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let h = Harness::new(TransferConfig::default());
    let stranger = UserId::new();

    let err = assert_err!(h.service.on_enter_space(stranger, SpaceId::Realm(RealmId::new())).await);
    assert!(matches!(err, RealmError::Validation(ValidationError::UnknownUser(_))));
    assert!(!h.service.is_in_flight(stranger));
}

#[tokio::test]
async fn test_failed_exit_snapshot_keeps_items() {
    let h = Harness::new(TransferConfig::default());
    let realm = SpaceId::Realm(RealmId::new());
    h.give("netherite_ingot").await;
    h.store.fail_save.store(true, Ordering::SeqCst);

    let err = assert_err!(h.service.on_enter_space(h.user, realm).await);
    assert!(err.is_persistence());

    assert_eq!(h.held().await.as_deref(), Some("netherite_ingot"));
    assert_eq!(h.service.location(h.user), Location::Bound(SpaceId::Global));
    assert_eq!(h.service.staged_source(h.user), Some(SpaceId::Global));
    assert!(!h.service.is_in_flight(h.user));

    h.store.fail_save.store(false, Ordering::SeqCst);
    assert!(assert_ok!(h.service.retry_staged(h.user).await));
    assert_eq!(h.stored(SpaceId::Global).await.as_deref(), Some("netherite_ingot"));
    assert_eq!(h.service.staged_count(), 0);
    assert!(!assert_ok!(h.service.retry_staged(h.user).await));
}

#[tokio::test]
async fn test_failed_target_load_keeps_items() {
    let h = Harness::new(TransferConfig::default());
    let realm = SpaceId::Realm(RealmId::new());
    h.give("beacon").await;
    h.store.fail_load.store(true, Ordering::SeqCst);

    assert_err!(h.service.on_enter_space(h.user, realm).await);

    // The exit snapshot landed, the target was never applied.
    assert_eq!(h.stored(SpaceId::Global).await.as_deref(), Some("beacon"));
    assert_eq!(h.held().await.as_deref(), Some("beacon"));
    assert_eq!(h.service.location(h.user), Location::Bound(SpaceId::Global));

    h.store.fail_load.store(false, Ordering::SeqCst);
    assert_ok!(h.service.on_enter_space(h.user, realm).await);
    assert_eq!(h.service.location(h.user), Location::Bound(realm));
    assert_eq!(h.service.staged_count(), 0);
}

#[tokio::test]
async fn test_concurrent_transfer_is_ignored() {
    let h = Harness::new(TransferConfig::default());
    let realm_a = SpaceId::Realm(RealmId::new());
    let realm_b = SpaceId::Realm(RealmId::new());
    h.give("bread").await;
    h.store.gate_next_save.store(true, Ordering::SeqCst);

    let first = tokio::spawn({
        let service = h.service.clone();
        let user = h.user;
        async move { service.on_enter_space(user, realm_a).await }
    });
    h.store.entered.notified().await;
    assert!(h.service.is_in_flight(h.user));

    let err = assert_err!(h.service.on_enter_space(h.user, realm_b).await);
    assert!(matches!(err, RealmError::TransferInProgress(user) if user == h.user));

    h.store.release.notify_one();
    assert_ok!(first.await.unwrap());

    assert_eq!(h.service.location(h.user), Location::Bound(realm_a));
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 1);
    assert!(!h.service.is_in_flight(h.user));
}

#[tokio::test]
async fn test_disconnect_mid_transfer_persists_capture() {
    let h = Harness::new(TransferConfig::default());
    let realm = SpaceId::Realm(RealmId::new());
    h.give("totem_of_undying").await;
    h.store.gate_next_save.store(true, Ordering::SeqCst);

    let transfer = tokio::spawn({
        let service = h.service.clone();
        let user = h.user;
        async move { service.on_enter_space(user, realm).await }
    });
    h.store.entered.notified().await;

    assert_ok!(h.service.on_disconnect(h.user).await);
    assert_eq!(h.stored(SpaceId::Global).await.as_deref(), Some("totem_of_undying"));

    h.store.release.notify_one();
    let _ = transfer.await.unwrap();

    assert_eq!(h.service.location(h.user), Location::Unbound);
    assert_eq!(h.service.staged_count(), 0);
    // The target inventory is never applied to a user who left.
    assert_eq!(h.held().await.as_deref(), Some("totem_of_undying"));
}

#[tokio::test]
async fn test_disconnect_persists_to_bound_space() {
    let h = Harness::new(TransferConfig::default());
    let realm = SpaceId::Realm(RealmId::new());
    assert_ok!(h.service.on_enter_space(h.user, realm).await);
    h.give("elytra").await;

    assert_ok!(h.service.on_disconnect(h.user).await);
    assert_eq!(h.stored(realm).await.as_deref(), Some("elytra"));
    assert_eq!(h.service.location(h.user), Location::Unbound);
}

#[tokio::test]
async fn test_flush_persists_staged_captures() {
    let h = Harness::new(TransferConfig::default());
    h.give("shulker_box").await;
    h.store.fail_save.store(true, Ordering::SeqCst);
    assert_err!(h.service.on_enter_space(h.user, SpaceId::Realm(RealmId::new())).await);
    assert_eq!(h.service.staged_count(), 1);

    h.store.fail_save.store(false, Ordering::SeqCst);
    let report = h.service.flush().await;

    assert_eq!(report.persisted, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.abandoned_in_flight, 0);
    assert_eq!(h.service.staged_count(), 0);
    assert_eq!(h.stored(SpaceId::Global).await.as_deref(), Some("shulker_box"));
}

#[tokio::test]
async fn test_flush_times_out_on_stuck_transfer() {
    let h = Harness::new(TransferConfig::default().flush_timeout(Duration::from_millis(50)));
    h.give("trident").await;
    h.store.gate_next_save.store(true, Ordering::SeqCst);

    let transfer = tokio::spawn({
        let service = h.service.clone();
        let user = h.user;
        async move { service.on_enter_space(user, SpaceId::Realm(RealmId::new())).await }
    });
    h.store.entered.notified().await;

    let report = h.service.flush().await;
    assert_eq!(report.abandoned_in_flight, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(h.stored(SpaceId::Global).await.as_deref(), Some("trident"));

    h.store.release.notify_one();
    assert_ok!(transfer.await.unwrap());
}

#[tokio::test]
async fn test_realm_deletion_drops_snapshots() {
    let h = Harness::new(TransferConfig::default());
    let realm_id = RealmId::new();
    let realm = SpaceId::Realm(realm_id);
    assert_ok!(h.service.on_enter_space(h.user, realm).await);
    h.give("map").await;
    assert_ok!(h.service.on_exit_to_global(h.user, realm).await);
    assert_eq!(h.stored(realm).await.as_deref(), Some("map"));

    assert!(assert_ok!(h.service.on_realm_deleted(realm_id).await).is_empty());
    assert_eq!(h.stored(realm).await, None);
    assert!(h.stored(SpaceId::Global).await.is_none());
}

#[tokio::test]
async fn test_realm_deletion_reports_bound_users() {
    let h = Harness::new(TransferConfig::default());
    let realm_id = RealmId::new();
    assert_ok!(h.service.on_enter_space(h.user, SpaceId::Realm(realm_id)).await);

    let stranded = assert_ok!(h.service.on_realm_deleted(realm_id).await);
    assert_eq!(stranded, vec![h.user]);
}

#[tokio::test]
async fn test_disconnect_racing_transfer_keeps_global_snapshot() {
    let h = Harness::new(TransferConfig::default());
    let realm_a = SpaceId::Realm(RealmId::new());
    let realm_b = SpaceId::Realm(RealmId::new());
    h.give("global_item").await;
    assert_ok!(h.service.on_enter_space(h.user, realm_a).await);
    h.give("realm_a_item").await;

    // The disconnect job reaches the authority before the transfer's capture.
    let (entered, disconnected) = tokio::join!(
        h.service.on_enter_space(h.user, realm_b),
        h.service.on_disconnect(h.user)
    );

    let err = assert_err!(entered);
    assert!(matches!(err, RealmError::Validation(ValidationError::UnknownUser(_))));
    assert_ok!(disconnected);

    assert_eq!(h.stored(SpaceId::Global).await.as_deref(), Some("global_item"));
    assert_eq!(h.stored(realm_a).await.as_deref(), Some("realm_a_item"));
    assert_eq!(h.stored(realm_b).await, None);
    assert_eq!(h.service.staged_count(), 0);
    assert!(!h.service.is_in_flight(h.user));
}

#[tokio::test]
async fn test_transfer_without_session_is_rejected() {
    let h = Harness::new(TransferConfig::default());
    h.give("compass").await;
    assert_ok!(h.service.on_disconnect(h.user).await);
    let saves = h.store.saves.load(Ordering::SeqCst);

    let err = assert_err!(h.service.on_enter_space(h.user, SpaceId::Realm(RealmId::new())).await);
    assert!(matches!(err, RealmError::Validation(ValidationError::UnknownUser(_))));
    assert_eq!(h.store.saves.load(Ordering::SeqCst), saves);
    assert_eq!(h.service.staged_count(), 0);
}
