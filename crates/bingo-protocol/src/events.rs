//! Events the allocator publishes for the real-time transport.
//!
//! The transport layer (sockets, push, whatever) is not part of this
//! workspace. It subscribes to these events, asks [`AllocationEvent::recipient`]
//! who should get each one, encodes it with a [`Codec`](crate::Codec), and
//! delivers it.

use serde::{Deserialize, Serialize};

use crate::{BunchCard, PlayerId, PlayerStatus, RoundId, RoundPlayer};

/// Who an [`AllocationEvent`] is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Everyone watching the round (host screen, other players).
    Round(RoundId),
    /// Only the player the event is about.
    Player(PlayerId),
}

/// Something that changed in a round's card allocation.
///
/// Internally tagged: `{ "type": "player_ready", "round_id": 1, ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationEvent {
    /// A new player entered the round and is choosing cards.
    PlayerJoined {
        round_id: RoundId,
        player_code: String,
        status: PlayerStatus,
    },

    /// The joining player's locked offer, with full grids.
    CardsDelivered {
        player: RoundPlayer,
        cards: Vec<BunchCard>,
        /// Unix milliseconds.
        deadline: u64,
    },

    /// The player's manual selection was accepted.
    CardsConfirmed { player: RoundPlayer },

    /// The deadline passed and cards were picked for the player.
    CardsAutoAssigned { player: RoundPlayer },

    /// A player has permanent cards and is ready to play.
    PlayerReady {
        round_id: RoundId,
        player_code: String,
        card_count: usize,
    },
}

impl AllocationEvent {
    /// The round this event belongs to.
    pub fn round_id(&self) -> RoundId {
        match self {
            Self::PlayerJoined { round_id, .. }
            | Self::PlayerReady { round_id, .. } => *round_id,
            Self::CardsDelivered { player, .. }
            | Self::CardsConfirmed { player }
            | Self::CardsAutoAssigned { player } => player.round_id,
        }
    }

    /// Where the transport should deliver this event.
    pub fn recipient(&self) -> Recipient {
        match self {
            Self::PlayerJoined { round_id, .. }
            | Self::PlayerReady { round_id, .. } => Recipient::Round(*round_id),
            Self::CardsDelivered { player, .. }
            | Self::CardsConfirmed { player }
            | Self::CardsAutoAssigned { player } => Recipient::Player(player.id),
        }
    }
}
