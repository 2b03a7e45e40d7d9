//! Integration tests for round allocation against the in-memory store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bingo_allocator::{AllocError, AllocatorConfig, AllocatorManager, CODE_ALPHABET};
use bingo_protocol::{
    AllocationEvent, BunchId, CardDelivery, CardId, Grid, GridSpec, ManualClock, NewBunchCard,
    NewRoundPlayer, PlayerId, PlayerStatus, RoundConfig, RoundId, RoundStatus,
};
use bingo_store::{CardPoolStore, MemoryStore, PlayerStore, StaticRounds};
use tokio::sync::broadcast;

const ROUND: RoundId = RoundId(1);
const START_MS: u64 = 1_700_000_000_000;

// =========================================================================
// Fixture
// =========================================================================

struct Fixture {
    store: Arc<MemoryStore>,
    rounds: Arc<StaticRounds>,
    bunch_id: BunchId,
    clock: ManualClock,
    manager: AllocatorManager<MemoryStore, StaticRounds>,
}

/// `freeCardsDelivered=4, freeCardsToSelect=2, freeCardsOnTimeout=1`, 60 s.
fn delivery() -> CardDelivery {
    CardDelivery {
        selection_time_seconds: 60,
        free_cards_delivered: 4,
        free_cards_to_select: 2,
        free_cards_on_timeout: 1,
    }
}

fn grid() -> Grid {
    Grid::from_flat(3, vec![1, 2, 3, 4, 0, 6, 7, 8, 9]).unwrap()
}

async fn fixture_with(cards: u64, config: AllocatorConfig) -> Fixture {
    let clock = ManualClock::new(START_MS);
    let store = Arc::new(MemoryStore::with_clock(Arc::new(clock.clone())));
    let bunch = store.create_bunch("pool", GridSpec::new(3, 30)).await.unwrap();
    let batch = (0..cards)
        .map(|index| NewBunchCard {
            bunch_id: bunch.id,
            index,
            grid: grid(),
        })
        .collect();
    store.insert_cards(batch).await.unwrap();

    let rounds = Arc::new(StaticRounds::new());
    rounds.upsert(RoundConfig {
        round_id: ROUND,
        status: RoundStatus::InProgress,
        card_bunch_id: Some(bunch.id),
        card_delivery: Some(delivery()),
    });

    let manager = AllocatorManager::with_clock(
        Arc::clone(&store),
        Arc::clone(&rounds),
        Arc::new(clock.clone()),
        config,
    );
    Fixture {
        store,
        rounds,
        bunch_id: bunch.id,
        clock,
        manager,
    }
}

async fn fixture(cards: u64) -> Fixture {
    fixture_with(cards, AllocatorConfig::default()).await
}

/// Drains whatever is buffered without waiting.
fn drain(events: &mut broadcast::Receiver<AllocationEvent>) -> Vec<AllocationEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

// =========================================================================
// Join
// =========================================================================

#[tokio::test]
async fn test_join_round_locks_delivered_cards() {
    let fx = fixture(10).await;

    let joined = fx.manager.join_round(ROUND).await.unwrap();

    let player = &joined.player;
    assert_eq!(player.status, PlayerStatus::Selecting);
    assert_eq!(player.locked_card_ids.len(), 4);
    assert!(player.selected_card_ids.is_empty());
    assert_eq!(player.joined_at, START_MS);
    assert_eq!(player.selection_deadline, START_MS + 60_000);

    assert_eq!(player.player_code.len(), 4);
    assert!(player.player_code.bytes().all(|b| CODE_ALPHABET.contains(&b)));

    let card_ids: Vec<CardId> = joined.cards.iter().map(|c| c.id).collect();
    assert_eq!(card_ids, player.locked_card_ids);
    assert!(joined.cards.iter().all(|c| c.grid == grid()));
}

#[tokio::test]
async fn test_join_round_unknown_round_not_found() {
    let fx = fixture(10).await;

    let result = fx.manager.join_round(RoundId(404)).await;

    assert!(matches!(result, Err(AllocError::RoundNotFound(RoundId(404)))));
    assert!(fx.manager.active_rounds().is_empty());
}

#[tokio::test]
async fn test_join_round_not_in_progress_not_joinable() {
    let fx = fixture(10).await;
    fx.rounds.set_status(ROUND, RoundStatus::Configured);

    let result = fx.manager.join_round(ROUND).await;

    assert!(matches!(result, Err(AllocError::RoundNotJoinable(ROUND))));
    assert_eq!(fx.manager.count_players(ROUND).await.unwrap(), 0);
}

#[tokio::test]
async fn test_join_round_without_delivery_not_joinable() {
    let fx = fixture(10).await;
    let mut round = fx.rounds.remove(ROUND).unwrap();
    round.card_delivery = None;
    fx.rounds.upsert(round);

    let result = fx.manager.join_round(ROUND).await;

    assert!(matches!(result, Err(AllocError::RoundNotJoinable(_))));
}

#[tokio::test]
async fn test_join_round_insufficient_cards() {
    let fx = fixture(10).await;
    fx.manager.join_round(ROUND).await.unwrap();
    fx.manager.join_round(ROUND).await.unwrap();

    let result = fx.manager.join_round(ROUND).await;

    assert!(matches!(
        result,
        Err(AllocError::InsufficientCards {
            available: 2,
            required: 4
        })
    ));
    assert_eq!(fx.manager.count_players(ROUND).await.unwrap(), 2);
}

#[tokio::test]
async fn test_join_round_code_space_exhausted() {
    let config = AllocatorConfig {
        code_length: 1,
        ..AllocatorConfig::default()
    };
    let fx = fixture_with(10, config).await;
    // Every one-character code is taken.
    for &symbol in CODE_ALPHABET {
        fx.store
            .insert_player(NewRoundPlayer {
                round_id: ROUND,
                player_code: (symbol as char).to_string(),
                locked_card_ids: vec![],
                selection_deadline: START_MS,
                joined_at: START_MS,
            })
            .await
            .unwrap();
    }

    let result = fx.manager.join_round(ROUND).await;

    assert!(matches!(
        result,
        Err(AllocError::CodeGenerationExhausted { attempts: 10, .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_round_concurrent_joins_get_disjoint_cards() {
    let fx = fixture(100).await;
    let manager = Arc::new(fx.manager);

    let tasks: Vec<_> = (0..25)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.join_round(ROUND).await })
        })
        .collect();

    let mut held = HashSet::new();
    let mut codes = HashSet::new();
    for task in tasks {
        let joined = task.await.unwrap().unwrap();
        for id in &joined.player.locked_card_ids {
            assert!(held.insert(*id), "card {id} handed out twice");
        }
        assert!(codes.insert(joined.player.player_code));
    }
    assert_eq!(held.len(), 100);
    assert_eq!(codes.len(), 25);
}

// =========================================================================
// Select
// =========================================================================

#[tokio::test]
async fn test_select_cards_releases_unchosen_cards() {
    // Six cards: the first player locks four, leaving two.
    let fx = fixture(6).await;
    let first = fx.manager.join_round(ROUND).await.unwrap().player;
    assert!(matches!(
        fx.manager.join_round(ROUND).await,
        Err(AllocError::InsufficientCards { available: 2, .. })
    ));

    let chosen = first.locked_card_ids[..2].to_vec();
    let released: Vec<CardId> = first.locked_card_ids[2..].to_vec();
    let ready = fx.manager.select_cards(first.id, chosen.clone()).await.unwrap();

    assert_eq!(ready.status, PlayerStatus::Ready);
    assert_eq!(ready.selected_card_ids, chosen);
    assert!(ready.locked_card_ids.is_empty());

    // The two released cards are back in the pool.
    let second = fx.manager.join_round(ROUND).await.unwrap().player;
    for id in &released {
        assert!(second.locked_card_ids.contains(id));
    }
    for id in &chosen {
        assert!(!second.locked_card_ids.contains(id));
    }
}

#[tokio::test]
async fn test_select_cards_refusals_leave_record_unchanged() {
    let fx = fixture(10).await;
    let player = fx.manager.join_round(ROUND).await.unwrap().player;
    let locked = player.locked_card_ids.clone();
    let foreign = fx
        .store
        .card_ids(fx.bunch_id)
        .await
        .unwrap()
        .into_iter()
        .find(|id| !locked.contains(id))
        .unwrap();

    let not_offered = fx.manager.select_cards(player.id, vec![locked[0], foreign]).await;
    assert!(matches!(
        not_offered,
        Err(AllocError::InvalidSelection { card_id, .. }) if card_id == foreign
    ));

    let duplicate = fx.manager.select_cards(player.id, vec![locked[0], locked[0]]).await;
    assert!(matches!(duplicate, Err(AllocError::InvalidSelection { .. })));

    let too_many = fx.manager.select_cards(player.id, locked[..3].to_vec()).await;
    assert!(matches!(
        too_many,
        Err(AllocError::WrongSelectionCount {
            expected: 2,
            got: 3
        })
    ));

    let unknown = fx.manager.select_cards(PlayerId(999), vec![]).await;
    assert!(matches!(unknown, Err(AllocError::PlayerNotFound(PlayerId(999)))));

    let stored = fx.store.get_player(player.id).await.unwrap().unwrap();
    assert_eq!(stored, player);
}

#[tokio::test]
async fn test_select_cards_twice_already_selected() {
    let fx = fixture(10).await;
    let player = fx.manager.join_round(ROUND).await.unwrap().player;
    let chosen = player.locked_card_ids[..2].to_vec();
    fx.manager.select_cards(player.id, chosen.clone()).await.unwrap();

    let again = fx.manager.select_cards(player.id, chosen).await;

    assert!(matches!(again, Err(AllocError::AlreadySelected(_))));
}

#[tokio::test]
async fn test_select_cards_after_deadline_expired() {
    let fx = fixture(10).await;
    let player = fx.manager.join_round(ROUND).await.unwrap().player;
    let chosen = player.locked_card_ids[..2].to_vec();

    fx.clock.set(player.selection_deadline + 1);
    let late = fx.manager.select_cards(player.id, chosen).await;

    assert!(matches!(late, Err(AllocError::DeadlineExpired(_))));
    let stored = fx.store.get_player(player.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PlayerStatus::Selecting);
}

#[tokio::test]
async fn test_select_cards_at_deadline_succeeds() {
    let fx = fixture(10).await;
    let player = fx.manager.join_round(ROUND).await.unwrap().player;

    fx.clock.set(player.selection_deadline);
    let result = fx
        .manager
        .select_cards(player.id, player.locked_card_ids[..2].to_vec())
        .await;

    assert!(result.is_ok());
}

// =========================================================================
// Timeout
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_after_selection_time() {
    let fx = fixture(10).await;
    let mut events = fx.manager.subscribe();
    let joined_at = tokio::time::Instant::now();
    let player = fx.manager.join_round(ROUND).await.unwrap().player;

    // Paused time jumps straight to the timer.
    let assigned = loop {
        if let AllocationEvent::CardsAutoAssigned { player } = events.recv().await.unwrap() {
            break player;
        }
    };

    assert!(joined_at.elapsed() >= Duration::from_secs(60));
    assert_eq!(assigned.id, player.id);
    assert_eq!(assigned.status, PlayerStatus::Ready);
    assert_eq!(assigned.selected_card_ids, vec![player.locked_card_ids[0]]);
    assert!(assigned.locked_card_ids.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_select_cards_cancels_pending_timeout() {
    let fx = fixture(10).await;
    let player = fx.manager.join_round(ROUND).await.unwrap().player;
    let chosen = player.locked_card_ids[..2].to_vec();
    fx.manager.select_cards(player.id, chosen.clone()).await.unwrap();
    let mut events = fx.manager.subscribe();

    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(drain(&mut events).is_empty());
    let stored = fx.store.get_player(player.id).await.unwrap().unwrap();
    assert_eq!(stored.selected_card_ids, chosen);
}

#[tokio::test]
async fn test_handle_timeout_on_ready_player_is_noop() {
    let fx = fixture(10).await;
    let player = fx.manager.join_round(ROUND).await.unwrap().player;
    let ready = fx
        .manager
        .select_cards(player.id, player.locked_card_ids[1..3].to_vec())
        .await
        .unwrap();
    let mut events = fx.manager.subscribe();

    let after = fx.manager.handle_timeout(player.id).await.unwrap();

    assert_eq!(after, ready);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_handle_timeout_forced_early_assigns_first_locked() {
    let fx = fixture(10).await;
    let player = fx.manager.join_round(ROUND).await.unwrap().player;

    let after = fx.manager.handle_timeout(player.id).await.unwrap();

    assert_eq!(after.status, PlayerStatus::Ready);
    assert_eq!(after.selected_card_ids, vec![player.locked_card_ids[0]]);
    let late = fx
        .manager
        .select_cards(player.id, player.locked_card_ids[..2].to_vec())
        .await;
    assert!(matches!(late, Err(AllocError::AlreadySelected(_))));
}

// =========================================================================
// Events, queries, teardown
// =========================================================================

#[tokio::test]
async fn test_events_follow_join_then_select() {
    let fx = fixture(10).await;
    let mut events = fx.manager.subscribe();

    let joined = fx.manager.join_round(ROUND).await.unwrap();
    let chosen = joined.player.locked_card_ids[..2].to_vec();
    fx.manager.select_cards(joined.player.id, chosen).await.unwrap();

    let got = drain(&mut events);
    assert_eq!(got.len(), 4);
    assert!(matches!(
        &got[0],
        AllocationEvent::PlayerJoined { status: PlayerStatus::Selecting, .. }
    ));
    assert!(matches!(
        &got[1],
        AllocationEvent::CardsDelivered { cards, deadline, .. }
            if cards.len() == 4 && *deadline == START_MS + 60_000
    ));
    assert!(matches!(&got[2], AllocationEvent::CardsConfirmed { .. }));
    assert!(matches!(
        &got[3],
        AllocationEvent::PlayerReady { card_count: 2, player_code, .. }
            if *player_code == joined.player.player_code
    ));
}

#[tokio::test]
async fn test_player_queries() {
    let fx = fixture(20).await;
    let a = fx.manager.join_round(ROUND).await.unwrap().player;
    let b = fx.manager.join_round(ROUND).await.unwrap().player;

    let ids: Vec<_> = fx
        .manager
        .players_in_round(ROUND)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![a.id, b.id]);

    let lower = b.player_code.to_lowercase();
    let found = fx.manager.player_by_code(ROUND, &lower).await.unwrap();
    assert_eq!(found.map(|p| p.id), Some(b.id));

    // Locked offer while selecting, selection once ready.
    assert_eq!(fx.manager.player_cards(a.id).await.unwrap().len(), 4);
    fx.manager
        .select_cards(a.id, a.locked_card_ids[..2].to_vec())
        .await
        .unwrap();
    let cards = fx.manager.player_cards(a.id).await.unwrap();
    let card_ids: Vec<_> = cards.iter().map(|c| c.id).collect();
    assert_eq!(card_ids, a.locked_card_ids[..2].to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_close_round_aborts_pending_timeouts() {
    let fx = fixture(10).await;
    let player = fx.manager.join_round(ROUND).await.unwrap().player;
    assert_eq!(fx.manager.active_rounds(), vec![ROUND]);

    assert!(fx.manager.close_round(ROUND).await);
    assert!(!fx.manager.close_round(ROUND).await);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(fx.manager.active_rounds().is_empty());
    let stored = fx.store.get_player(player.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PlayerStatus::Selecting);
}

#[tokio::test]
async fn test_close_round_next_join_starts_fresh_actor() {
    let fx = fixture(8).await;
    let first = fx.manager.join_round(ROUND).await.unwrap().player;
    assert!(fx.manager.close_round(ROUND).await);

    let second = fx.manager.join_round(ROUND).await.unwrap().player;

    assert_eq!(fx.manager.active_rounds(), vec![ROUND]);
    let first_cards: HashSet<CardId> = first.held_card_ids().collect();
    assert!(second.held_card_ids().all(|id| !first_cards.contains(&id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_round_racing_joins_never_double_grants() {
    for _ in 0..25 {
        let fx = fixture(400).await;
        let manager = Arc::new(fx.manager);

        let spawn_join = |manager: &Arc<AllocatorManager<MemoryStore, StaticRounds>>| {
            let manager = Arc::clone(manager);
            tokio::spawn(async move { manager.join_round(ROUND).await })
        };
        let mut joins: Vec<_> = (0..40).map(|_| spawn_join(&manager)).collect();
        let closer = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.close_round(ROUND).await })
        };
        joins.extend((0..40).map(|_| spawn_join(&manager)));

        for join in joins {
            match join.await.unwrap() {
                Ok(_) | Err(AllocError::Unavailable(_)) => {}
                Err(e) => panic!("unexpected join failure: {e}"),
            }
        }
        closer.await.unwrap();

        let mut held = HashSet::new();
        for player in manager.players_in_round(ROUND).await.unwrap() {
            for id in player.held_card_ids() {
                assert!(held.insert(id), "card {id} held by two players");
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_reset_round_deletes_players_and_frees_cards() {
    let fx = fixture(8).await;
    fx.manager.join_round(ROUND).await.unwrap();
    fx.manager.join_round(ROUND).await.unwrap();
    assert!(matches!(
        fx.manager.join_round(ROUND).await,
        Err(AllocError::InsufficientCards { available: 0, .. })
    ));

    assert_eq!(fx.manager.reset_round(ROUND).await.unwrap(), 2);
    assert_eq!(fx.manager.count_players(ROUND).await.unwrap(), 0);
    assert!(fx.manager.active_rounds().is_empty());

    let joined = fx.manager.join_round(ROUND).await.unwrap();
    assert_eq!(joined.cards.len(), 4);

    // Only the new player's timer is still pending.
    tokio::time::sleep(Duration::from_secs(120)).await;
    let players = fx.manager.players_in_round(ROUND).await.unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].status, PlayerStatus::Ready);
}

#[tokio::test]
async fn test_reset_round_without_actor_returns_zero() {
    let fx = fixture(8).await;

    assert_eq!(fx.manager.reset_round(ROUND).await.unwrap(), 0);
    assert!(fx.manager.active_rounds().is_empty());
}
