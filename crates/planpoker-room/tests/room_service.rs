//! Integration tests for the room engine over the in-memory store.

use std::collections::HashMap;
use std::time::Duration;

use planpoker_protocol::{Room, RoomCode, RoomPhase, UserId};
use planpoker_room::{Admission, RoomConfig, RoomService, codes, room_key};
use planpoker_store::{MemoryStore, Store};

// =========================================================================
// Helpers
// =========================================================================

fn service() -> RoomService<MemoryStore> {
    RoomService::new(MemoryStore::new(), RoomConfig::default())
}

fn code(s: &str) -> RoomCode {
    RoomCode::parse(s).unwrap()
}

/// Creates `TEST01` and joins Alice then Bob. Returns (alice, bob).
async fn room_with_alice_and_bob(svc: &RoomService<MemoryStore>) -> (UserId, UserId) {
    svc.create_room(Some(code("TEST01"))).await.unwrap();
    let (_, alice, _) = svc
        .add_user(&code("TEST01"), "Alice", None)
        .await
        .unwrap()
        .unwrap();
    let (_, bob, _) = svc
        .add_user(&code("TEST01"), "Bob", None)
        .await
        .unwrap()
        .unwrap();
    (alice.id, bob.id)
}

fn facilitator_count(room: &Room) -> usize {
    room.users.values().filter(|u| u.is_facilitator).count()
}

// =========================================================================
// create_room / get_room
// =========================================================================

#[tokio::test]
async fn test_create_room_with_explicit_code_is_idempotent() {
    let svc = service();
    let first = svc.create_room(Some(code("TEST01"))).await.unwrap();
    svc.add_user(&code("TEST01"), "Alice", None).await.unwrap();

    let second = svc.create_room(Some(code("TEST01"))).await.unwrap();
    assert_eq!(second.room_code, first.room_code);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.users.len(), 1, "existing room must be returned untouched");
}

#[tokio::test]
async fn test_create_room_generates_valid_code() {
    let svc = service();
    let room = svc.create_room(None).await.unwrap();
    assert!(codes::validate(room.room_code.as_str()));
    assert_eq!(room.state, RoomPhase::Voting);
    assert_eq!(room.current_round, 1);
    assert!(svc.get_room(&room.room_code).await.unwrap().is_some());
}

#[tokio::test]
async fn test_get_room_absent_returns_none() {
    let svc = service();
    assert!(svc.get_room(&code("NOPE22")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_room_corrupt_snapshot_is_error() {
    let svc = service();
    svc.store()
        .set(&room_key(&code("BROKEN")), "{not json", None)
        .await
        .unwrap();
    let err = svc.get_room(&code("BROKEN")).await.unwrap_err();
    assert!(err.to_string().contains("BROKEN"));
}

#[tokio::test]
async fn test_room_codes_lists_stored_rooms() {
    let svc = service();
    svc.create_room(Some(code("AAAAAA"))).await.unwrap();
    svc.create_room(Some(code("BBBBBB"))).await.unwrap();
    let codes = svc.room_codes().await.unwrap();
    assert_eq!(codes, vec![code("AAAAAA"), code("BBBBBB")]);
}

// =========================================================================
// Expiry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_room_expires_without_writes() {
    let svc = RoomService::new(
        MemoryStore::new(),
        RoomConfig {
            room_ttl: Duration::from_secs(60),
            ..RoomConfig::default()
        },
    );
    svc.create_room(Some(code("TEST01"))).await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(svc.get_room(&code("TEST01")).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_room_ttl_slides_on_every_save() {
    let svc = RoomService::new(
        MemoryStore::new(),
        RoomConfig {
            room_ttl: Duration::from_secs(60),
            ..RoomConfig::default()
        },
    );
    svc.create_room(Some(code("TEST01"))).await.unwrap();

    tokio::time::advance(Duration::from_secs(50)).await;
    svc.add_user(&code("TEST01"), "Alice", None).await.unwrap();

    tokio::time::advance(Duration::from_secs(50)).await;
    assert!(svc.get_room(&code("TEST01")).await.unwrap().is_some());
}

// =========================================================================
// add_user / remove_user
// =========================================================================

#[tokio::test]
async fn test_add_user_to_missing_room_returns_none() {
    let svc = service();
    assert!(svc
        .add_user(&code("NOPE22"), "Alice", None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_first_joiner_is_sole_facilitator() {
    let svc = service();
    let (alice, bob) = room_with_alice_and_bob(&svc).await;
    let room = svc.get_room(&code("TEST01")).await.unwrap().unwrap();
    assert!(room.is_facilitator(&alice));
    assert!(!room.is_facilitator(&bob));
    assert_eq!(facilitator_count(&room), 1);
}

#[tokio::test]
async fn test_remove_facilitator_promotes_exactly_one() {
    let svc = service();
    let (alice, bob) = room_with_alice_and_bob(&svc).await;
    svc.add_user(&code("TEST01"), "Carol", None).await.unwrap();

    let room = svc
        .remove_user(&code("TEST01"), &alice)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(facilitator_count(&room), 1);
    assert!(room.is_facilitator(&bob), "earliest remaining joiner is promoted");
}

#[tokio::test]
async fn test_remove_last_user_deletes_room() {
    let svc = service();
    svc.create_room(Some(code("TEST01"))).await.unwrap();
    let (_, alice, _) = svc
        .add_user(&code("TEST01"), "Alice", None)
        .await
        .unwrap()
        .unwrap();

    assert!(svc
        .remove_user(&code("TEST01"), &alice.id)
        .await
        .unwrap()
        .is_none());
    assert!(svc.get_room(&code("TEST01")).await.unwrap().is_none());
    assert!(!svc.store().exists("room:TEST01").await.unwrap());
}

#[tokio::test]
async fn test_remove_unknown_user_returns_none_and_keeps_room() {
    let svc = service();
    room_with_alice_and_bob(&svc).await;
    assert!(svc
        .remove_user(&code("TEST01"), &UserId::from("ghost"))
        .await
        .unwrap()
        .is_none());
    let room = svc.get_room(&code("TEST01")).await.unwrap().unwrap();
    assert_eq!(room.users.len(), 2);
}

// =========================================================================
// Voting
// =========================================================================

#[tokio::test]
async fn test_scenario_vote_and_reveal() {
    let svc = service();
    let (alice, bob) = room_with_alice_and_bob(&svc).await;
    let room_code = code("TEST01");

    svc.submit_vote(&room_code, &alice, "5").await.unwrap().unwrap();
    svc.submit_vote(&room_code, &bob, "8").await.unwrap().unwrap();
    let room = svc.reveal_votes(&room_code).await.unwrap().unwrap();

    let expected = HashMap::from([(alice.clone(), "5".to_string()), (bob.clone(), "8".to_string())]);
    assert_eq!(room.state, RoomPhase::Revealed);
    assert_eq!(room.current_votes(), expected);
    assert_eq!(room.vote_history.len(), 1);
    assert_eq!(room.vote_history[0].round, 1);
    assert_eq!(room.vote_history[0].votes, expected);
}

#[tokio::test]
async fn test_scenario_reset_then_vote_again() {
    let svc = service();
    let (alice, bob) = room_with_alice_and_bob(&svc).await;
    let room_code = code("TEST01");
    svc.submit_vote(&room_code, &alice, "5").await.unwrap();
    svc.reveal_votes(&room_code).await.unwrap();

    let room = svc.reset_round(&room_code).await.unwrap().unwrap();
    assert_eq!(room.state, RoomPhase::Voting);
    assert_eq!(room.current_round, 2);
    assert!(room.current_votes().is_empty());

    let room = svc.submit_vote(&room_code, &bob, "?").await.unwrap().unwrap();
    assert_eq!(room.users[&bob].current_vote.as_deref(), Some("?"));
}

#[tokio::test]
async fn test_submit_vote_after_reveal_leaves_room_unchanged() {
    let svc = service();
    let (alice, bob) = room_with_alice_and_bob(&svc).await;
    let room_code = code("TEST01");
    svc.submit_vote(&room_code, &alice, "5").await.unwrap();
    let revealed = svc.reveal_votes(&room_code).await.unwrap().unwrap();

    assert!(svc.submit_vote(&room_code, &bob, "8").await.unwrap().is_none());
    let after = svc.get_room(&room_code).await.unwrap().unwrap();
    assert_eq!(after, revealed);
}

#[tokio::test]
async fn test_clear_vote_removes_vote() {
    let svc = service();
    let (alice, _) = room_with_alice_and_bob(&svc).await;
    let room_code = code("TEST01");
    svc.submit_vote(&room_code, &alice, "13").await.unwrap();
    let room = svc.clear_vote(&room_code, &alice).await.unwrap().unwrap();
    assert_eq!(room.users[&alice].current_vote, None);
}

#[tokio::test]
async fn test_rounds_are_monotonic_and_history_bounded() {
    let svc = service();
    let (alice, _) = room_with_alice_and_bob(&svc).await;
    let room_code = code("TEST01");

    let mut last_round = 1;
    for vote in ["1", "2", "3"] {
        svc.submit_vote(&room_code, &alice, vote).await.unwrap();
        svc.reveal_votes(&room_code).await.unwrap();
        let room = svc.reset_round(&room_code).await.unwrap().unwrap();
        assert_eq!(room.current_round, last_round + 1);
        assert!(room.vote_history.iter().all(|h| h.round <= room.current_round));
        last_round = room.current_round;
    }
}

// =========================================================================
// Connection state / rejoin
// =========================================================================

#[tokio::test]
async fn test_scenario_disconnect_and_rejoin() {
    let svc = service();
    let (_, bob) = room_with_alice_and_bob(&svc).await;
    let room_code = code("TEST01");

    let room = svc
        .update_user_connection(&room_code, &bob, false)
        .await
        .unwrap()
        .unwrap();
    assert!(!room.users[&bob].connected);
    assert_eq!(room.users.len(), 2);

    let (room, user, admission) = svc
        .add_user(&room_code, "Bob", Some(&bob))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(admission, Admission::Rejoined);
    assert_eq!(user.id, bob);
    assert!(room.users[&bob].connected);
    assert_eq!(room.users.len(), 2);
}

#[tokio::test]
async fn test_update_user_connection_unknown_user_returns_none() {
    let svc = service();
    room_with_alice_and_bob(&svc).await;
    assert!(svc
        .update_user_connection(&code("TEST01"), &UserId::from("ghost"), false)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_version_increments_on_every_save() {
    let svc = service();
    let created = svc.create_room(Some(code("TEST01"))).await.unwrap();
    assert_eq!(created.version, 1);
    let (room, _, _) = svc
        .add_user(&code("TEST01"), "Alice", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(room.version, 2);
}
