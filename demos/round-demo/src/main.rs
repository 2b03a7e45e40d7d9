use std::time::Duration;

use bingo::prelude::*;
use tokio::sync::broadcast;

const ROUND: RoundId = RoundId(1);

// ---------------------------------------------------------------------------
// Host side
// ---------------------------------------------------------------------------

/// Starts a generation job and polls it the way the host screen does.
async fn fill_bunch(
    engine: &BingoEngine<MemoryStore, StaticRounds>,
    cards: u64,
) -> Result<BunchId, BingoError> {
    let job_id = engine
        .create_generation_job("Demo night", GridSpec::new(5, 75), cards)
        .await?;

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        ticker.tick().await;
        let job = engine.get_job_progress(job_id)?;
        println!("[host] job {job_id}: {} {}/{}", job.status, job.current, job.total);
        if job.status.is_terminal() {
            return Ok(job.bunch_id);
        }
    }
}

fn open_round(engine: &BingoEngine<MemoryStore, StaticRounds>, bunch_id: BunchId, secs: u64) {
    engine.rounds().upsert(RoundConfig {
        round_id: ROUND,
        status: RoundStatus::InProgress,
        card_bunch_id: Some(bunch_id),
        card_delivery: Some(CardDelivery {
            selection_time_seconds: secs,
            free_cards_delivered: 4,
            free_cards_to_select: 2,
            free_cards_on_timeout: 1,
        }),
    });
}

// ---------------------------------------------------------------------------
// Transport stand-in
// ---------------------------------------------------------------------------

/// Prints every event as the JSON a client would receive. Returns how
/// many were relayed once the channel closes.
async fn relay(mut events: broadcast::Receiver<AllocationEvent>) -> usize {
    let codec = JsonCodec;
    let mut relayed = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                let to = match event.recipient() {
                    Recipient::Round(round_id) => format!("round {round_id}"),
                    Recipient::Player(player_id) => format!("player {player_id}"),
                };
                match codec.encode(&event) {
                    Ok(bytes) => println!("[relay → {to}] {}", String::from_utf8_lossy(&bytes)),
                    Err(e) => tracing::warn!(error = %e, "event encode failed"),
                }
                relayed += 1;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "relay fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return relayed,
        }
    }
}

// ---------------------------------------------------------------------------
// Demo flow
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Summary {
    ready: usize,
    auto_assigned: usize,
}

/// Three players join: two pick cards, the third lets the clock run out.
async fn run(
    engine: &BingoEngine<MemoryStore, StaticRounds>,
    cards: u64,
    selection_secs: u64,
) -> Result<Summary, BingoError> {
    let bunch_id = fill_bunch(engine, cards).await?;
    open_round(engine, bunch_id, selection_secs);

    let mut players = Vec::new();
    for _ in 0..3 {
        let joined = engine.join_round(ROUND).await?;
        println!(
            "[player {}] offered {} cards, pick 2",
            joined.player.player_code,
            joined.cards.len()
        );
        players.push(joined.player);
    }

    for player in &players[..2] {
        let chosen = player.locked_card_ids[..2].to_vec();
        let ready = engine.select_cards(player.id, chosen).await?;
        println!("[player {}] ready with {:?}", ready.player_code, ready.selected_card_ids);
    }

    // The last player never picks.
    tokio::time::sleep(Duration::from_secs(selection_secs + 1)).await;

    let mut summary = Summary {
        ready: 0,
        auto_assigned: 0,
    };
    for player in engine.players_in_round(ROUND).await? {
        if player.is_ready() {
            summary.ready += 1;
            if player.selected_card_ids.len() == 1 {
                summary.auto_assigned += 1;
            }
        }
    }
    engine.close_round(ROUND).await;
    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bingo::telemetry::init_tracing();

    let mut config = EngineConfig::default();
    config.generation.chunk_size = 500;
    let engine = BingoEngine::in_memory(config);
    let relay_task = tokio::spawn(relay(engine.subscribe()));

    let summary = run(&engine, 5_000, 3).await?;
    println!(
        "[host] {} players ready, {} by timeout",
        summary.ready, summary.auto_assigned
    );

    drop(engine);
    let relayed = relay_task.await?;
    println!("[host] relayed {relayed} events");
    Ok(())
}
