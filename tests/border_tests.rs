//! Integration tests for border application on loaded and deferred worlds

use realmkeep::{
    Authority, BorderApplier, BorderCenter, BorderConfig, BorderOutcome, BorderTier, LiveState,
    Position, Realm, UserId, WorldHost,
};
use tokio_test::assert_ok;

fn tiers() -> BorderConfig {
    BorderConfig::new(vec![
        BorderTier::new("small", 64.0).as_default(),
        BorderTier::new("large", 256.0).center_offset(16.0, 0.0),
    ])
}

fn realm(tier: &str) -> Realm {
    Realm::new("Meadow", UserId::new(), "plains", tier)
}

#[tokio::test]
async fn test_reapplying_same_settings_is_idempotent() {
    let realm = realm("large");
    let mut live = LiveState::new();
    live.load_world(realm.world_folder.clone(), Position::new(0.0, 64.0, 0.0));
    let authority = Authority::spawn(live);
    let applier = BorderApplier::new(authority.clone(), tiers());

    let first = assert_ok!(applier.apply_border(&realm).await);
    let second = assert_ok!(applier.apply_border(&realm).await);
    assert_eq!(first, second);

    let folder = realm.world_folder.clone();
    let border = authority
        .call(move |state: &mut LiveState| state.border(&folder).cloned())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(border.size, 256.0);
    assert_eq!(border.center, BorderCenter::new(16.0, 0.0));
}

#[tokio::test]
async fn test_unloaded_world_is_deferred_until_ready() {
    let mut realm = realm("small");
    let authority = Authority::spawn(LiveState::new());
    let applier = BorderApplier::new(authority.clone(), tiers());

    assert_eq!(assert_ok!(applier.apply_border(&realm).await), BorderOutcome::Pending);
    realm.border_tier_id = "large".to_string();
    assert_eq!(assert_ok!(applier.apply_border(&realm).await), BorderOutcome::Pending);
    assert!(applier.is_pending(&realm.world_folder));
    assert_eq!(applier.pending_count(), 1);

    let folder = realm.world_folder.clone();
    authority
        .call(move |state: &mut LiveState| state.load_world(folder, Position::default()))
        .await
        .unwrap();

    let outcome = assert_ok!(applier.on_world_ready(&realm.world_folder).await);
    assert!(matches!(outcome, Some(BorderOutcome::Applied { ref tier, .. }) if tier == "large"));
    assert!(assert_ok!(applier.on_world_ready(&realm.world_folder).await).is_none());
    assert_eq!(applier.pending_count(), 0);

    let folder = realm.world_folder.clone();
    let writes = authority
        .call(move |state: &mut LiveState| state.world(&folder).map(|world| world.border_writes))
        .await
        .unwrap();
    assert_eq!(writes, Some(1));
}

#[tokio::test]
async fn test_occupants_outside_border_are_relocated() {
    let realm = realm("small");
    let inside = UserId::new();
    let outside = UserId::new();

    let mut live = LiveState::new();
    live.load_world(realm.world_folder.clone(), Position::new(0.0, 64.0, 0.0));
    live.join(inside, realm.world_folder.clone(), Position::new(10.0, 64.0, -10.0));
    live.join(outside, realm.world_folder.clone(), Position::new(500.0, 70.0, 500.0));
    let authority = Authority::spawn(live);
    let applier = BorderApplier::new(authority.clone(), tiers());

    let outcome = assert_ok!(applier.apply_border(&realm).await);
    assert!(matches!(outcome, BorderOutcome::Applied { relocating: 1, .. }));

    // Queued behind the relocation job posted by the border write.
    let (inside_at, outside_at) = authority
        .call(move |state: &mut LiveState| {
            (
                state.session(&inside).map(|session| session.position),
                state.session(&outside).map(|session| session.position),
            )
        })
        .await
        .unwrap();
    assert_eq!(inside_at, Some(Position::new(10.0, 64.0, -10.0)));
    assert_eq!(outside_at, Some(Position::new(0.0, 64.0, 0.0)));
}

#[tokio::test]
async fn test_cancel_pending_drops_queued_settings() {
    let realm = realm("small");
    let applier = BorderApplier::new(Authority::spawn(LiveState::new()), tiers());

    assert_ok!(applier.apply_border(&realm).await);
    assert_eq!(applier.cancel_pending(&realm.world_folder).map(|r| r.id), Some(realm.id));
    assert!(assert_ok!(applier.on_world_ready(&realm.world_folder).await).is_none());
}
