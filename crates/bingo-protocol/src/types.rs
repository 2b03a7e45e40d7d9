//! Core data model for bunches, cards, round players, and generation jobs.
//!
//! Everything here is plain data. Behaviour (generating, allocating,
//! persisting) lives in the crates above this one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Declares a `u64` newtype id.
///
/// Each id serializes as a plain number (`#[serde(transparent)]`) and
/// displays with a short prefix so log lines stay readable:
/// `card C-17 locked by P-3`.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a [`CardBunch`].
    BunchId,
    "B"
);
id_type!(
    /// Identifies a single [`BunchCard`].
    CardId,
    "C"
);
id_type!(
    /// Identifies a bingo round.
    RoundId,
    "R"
);
id_type!(
    /// Identifies a [`RoundPlayer`] record (one player in one round).
    PlayerId,
    "P"
);
id_type!(
    /// Identifies a [`GenerationJob`].
    JobId,
    "J"
);

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Grid dimensions and number range shared by a bunch and its cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Cells per side. A card has `grid_size²` cells.
    pub grid_size: usize,
    /// Numbers are drawn from `1..=max_number`.
    pub max_number: u32,
}

impl GridSpec {
    /// Smallest supported grid side.
    pub const MIN_GRID_SIZE: usize = 3;
    /// Largest supported grid side.
    pub const MAX_GRID_SIZE: usize = 10;
    /// Largest number a card may carry.
    pub const MAX_NUMBER: u32 = 99;

    pub fn new(grid_size: usize, max_number: u32) -> Self {
        Self {
            grid_size,
            max_number,
        }
    }

    /// Number of cells on one card.
    pub fn cell_count(&self) -> usize {
        self.grid_size * self.grid_size
    }

    /// Odd-sized grids get a free center.
    pub fn has_free_center(&self) -> bool {
        self.grid_size % 2 == 1
    }

    /// Checks that a card with these dimensions can exist.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidGrid`] if the side is outside
    /// `MIN_GRID_SIZE..=MAX_GRID_SIZE`, if `max_number` exceeds
    /// `MAX_NUMBER`, or if there are fewer numbers in the range than cells
    /// on the card.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !(Self::MIN_GRID_SIZE..=Self::MAX_GRID_SIZE)
            .contains(&self.grid_size)
        {
            return Err(ProtocolError::InvalidGrid(format!(
                "grid size {} is outside {}..={}",
                self.grid_size,
                Self::MIN_GRID_SIZE,
                Self::MAX_GRID_SIZE
            )));
        }
        if self.max_number > Self::MAX_NUMBER {
            return Err(ProtocolError::InvalidGrid(format!(
                "max number {} is above {}",
                self.max_number,
                Self::MAX_NUMBER
            )));
        }
        if (self.max_number as usize) < self.cell_count() {
            return Err(ProtocolError::InvalidGrid(format!(
                "max number {} is smaller than {} cells of a {}x{} grid",
                self.max_number,
                self.cell_count(),
                self.grid_size,
                self.grid_size
            )));
        }
        Ok(())
    }
}

/// A square matrix of cell values.
///
/// Each cell is a number in `1..=max_number`, or [`Grid::FREE`] for the
/// free center of an odd-sized card. Serializes as nested arrays:
/// `[[12, 4, 33], [7, 0, 21], [9, 15, 2]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid(Vec<Vec<u32>>);

impl Grid {
    /// The sentinel value of the free center cell.
    pub const FREE: u32 = 0;

    /// Builds a grid from row-major cells.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidGrid`] if `cells.len() != size * size`.
    pub fn from_flat(size: usize, cells: Vec<u32>) -> Result<Self, ProtocolError> {
        if size == 0 || cells.len() != size * size {
            return Err(ProtocolError::InvalidGrid(format!(
                "{} cells cannot form a {size}x{size} grid",
                cells.len()
            )));
        }
        let rows = cells.chunks(size).map(<[u32]>::to_vec).collect();
        Ok(Self(rows))
    }

    /// Builds a grid from rows, checking that it is square.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidGrid`] if any row length differs from the
    /// number of rows.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Result<Self, ProtocolError> {
        let size = rows.len();
        if size == 0 || rows.iter().any(|r| r.len() != size) {
            return Err(ProtocolError::InvalidGrid(
                "rows do not form a square grid".into(),
            ));
        }
        Ok(Self(rows))
    }

    /// Cells per side.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn rows(&self) -> &[Vec<u32>] {
        &self.0
    }

    /// Returns the value at `(row, col)`, or `None` if out of bounds.
    pub fn cell(&self, row: usize, col: usize) -> Option<u32> {
        self.0.get(row).and_then(|r| r.get(col)).copied()
    }

    /// The geometric center, if the grid has one (odd size).
    pub fn center(&self) -> Option<(usize, usize)> {
        let size = self.size();
        (size % 2 == 1).then(|| (size / 2, size / 2))
    }

    /// Every non-free value, row-major.
    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().flatten().copied().filter(|&v| v != Self::FREE)
    }
}

// ---------------------------------------------------------------------------
// Bunches and cards
// ---------------------------------------------------------------------------

/// Metadata for a named set of pre-generated cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardBunch {
    pub id: BunchId,
    /// Display name chosen by the host.
    pub name: String,
    pub grid: GridSpec,
    /// Cards persisted so far. Grows chunk by chunk during generation.
    pub card_count: u64,
    /// Unix milliseconds.
    pub created_at: u64,
}

/// One generated card. Never mutated after it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BunchCard {
    pub id: CardId,
    pub bunch_id: BunchId,
    /// 0-based position within the bunch. Stable ordering key.
    pub index: u64,
    pub grid: Grid,
}

/// A card ready to be persisted. The store assigns its [`CardId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBunchCard {
    pub bunch_id: BunchId,
    pub index: u64,
    pub grid: Grid,
}

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

/// Lifecycle of a round, as reported by the round configuration provider.
///
/// Only [`RoundStatus::InProgress`] accepts joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Created, not started.
    Configured,
    InProgress,
    Finished,
    Cancelled,
}

impl RoundStatus {
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured => write!(f, "configured"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Finished => write!(f, "finished"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How cards are handed out when a player joins a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDelivery {
    /// Seconds a player has to pick cards before auto-assignment.
    pub selection_time_seconds: u64,
    /// Cards locked and shown to a joining player.
    pub free_cards_delivered: usize,
    /// Cards the player must choose from the delivered set.
    pub free_cards_to_select: usize,
    /// Cards auto-assigned when the player lets the deadline pass.
    pub free_cards_on_timeout: usize,
}

/// The slice of a round's configuration the allocator reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    pub round_id: RoundId,
    pub status: RoundStatus,
    pub card_bunch_id: Option<BunchId>,
    pub card_delivery: Option<CardDelivery>,
}

// ---------------------------------------------------------------------------
// Round players
// ---------------------------------------------------------------------------

/// Where a player is in the selection flow.
///
/// ```text
/// Selecting ──(select or timeout)──→ Ready
/// ```
///
/// There is no way back from `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Selecting,
    Ready,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selecting => write!(f, "selecting"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// A player's card allocation within one round.
///
/// A card id appears in at most one player's `locked_card_ids` or
/// `selected_card_ids` across the whole round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPlayer {
    pub id: PlayerId,
    pub round_id: RoundId,
    /// Short code shown to the player, unique within the round.
    pub player_code: String,
    pub status: PlayerStatus,
    /// Temporary hold during selection. Empty once `Ready`.
    pub locked_card_ids: Vec<CardId>,
    /// Permanent assignment. Empty until `Ready`.
    pub selected_card_ids: Vec<CardId>,
    /// Unix milliseconds after which a manual selection is refused.
    pub selection_deadline: u64,
    /// Unix milliseconds.
    pub joined_at: u64,
}

impl RoundPlayer {
    pub fn is_ready(&self) -> bool {
        self.status == PlayerStatus::Ready
    }

    /// `true` once `now_ms` is strictly past the selection deadline.
    pub fn deadline_passed(&self, now_ms: u64) -> bool {
        now_ms > self.selection_deadline
    }

    /// Every card this player holds, locked or selected.
    pub fn held_card_ids(&self) -> impl Iterator<Item = CardId> + '_ {
        self.locked_card_ids
            .iter()
            .chain(self.selected_card_ids.iter())
            .copied()
    }

    /// The cards the player currently sees: the locked offer while
    /// selecting, the permanent assignment once ready.
    pub fn visible_card_ids(&self) -> &[CardId] {
        match self.status {
            PlayerStatus::Selecting => &self.locked_card_ids,
            PlayerStatus::Ready => &self.selected_card_ids,
        }
    }

    /// Moves `selected` into the permanent set, drops every lock, and
    /// marks the player ready.
    pub fn finalize(&mut self, selected: Vec<CardId>) {
        self.selected_card_ids = selected;
        self.locked_card_ids.clear();
        self.status = PlayerStatus::Ready;
    }
}

/// A player record ready to be persisted. The store assigns its
/// [`PlayerId`] and starts it in [`PlayerStatus::Selecting`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoundPlayer {
    pub round_id: RoundId,
    pub player_code: String,
    pub locked_card_ids: Vec<CardId>,
    pub selection_deadline: u64,
    pub joined_at: u64,
}

// ---------------------------------------------------------------------------
// Generation jobs
// ---------------------------------------------------------------------------

/// Status of a bulk generation job.
///
/// `Running` is the only non-terminal state. `Cancelled` is distinct from
/// `Failed`: it carries no error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// In-memory progress record of one bulk generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub job_id: JobId,
    /// Name of the bunch being generated.
    pub name: String,
    /// The bunch the cards are written into.
    pub bunch_id: BunchId,
    pub status: JobStatus,
    /// Cards persisted so far.
    pub current: u64,
    /// Cards requested.
    pub total: u64,
    /// Unix milliseconds.
    pub start_time: u64,
    /// Unix milliseconds, set on any terminal transition.
    pub end_time: Option<u64>,
    /// Only set for [`JobStatus::Failed`].
    pub error: Option<String>,
}

// =========================================================================
// Tests
// =========================================================================
