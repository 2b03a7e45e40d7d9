//! In-memory [`RoundProvider`].

use std::collections::HashMap;

use bingo_protocol::{RoundConfig, RoundId, RoundStatus};
use parking_lot::RwLock;

use crate::{RoundProvider, StoreError};

/// Round configurations held in a map.
///
/// Stands in for the round management service: the host side inserts and
/// updates rounds, the allocator reads them.
#[derive(Default)]
pub struct StaticRounds {
    rounds: RwLock<HashMap<RoundId, RoundConfig>>,
}

impl StaticRounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a round.
    pub fn upsert(&self, config: RoundConfig) {
        self.rounds.write().insert(config.round_id, config);
    }

    /// Changes a round's status. Returns `false` if the round is unknown.
    pub fn set_status(&self, round_id: RoundId, status: RoundStatus) -> bool {
        match self.rounds.write().get_mut(&round_id) {
            Some(round) => {
                round.status = status;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, round_id: RoundId) -> Option<RoundConfig> {
        self.rounds.write().remove(&round_id)
    }
}

impl RoundProvider for StaticRounds {
    async fn get_round(
        &self,
        round_id: RoundId,
    ) -> Result<Option<RoundConfig>, StoreError> {
        Ok(self.rounds.read().get(&round_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(id: u64) -> RoundConfig {
        RoundConfig {
            round_id: RoundId(id),
            status: RoundStatus::Configured,
            card_bunch_id: None,
            card_delivery: None,
        }
    }

    #[tokio::test]
    async fn test_get_round_unknown_returns_none() {
        let rounds = StaticRounds::new();
        assert_eq!(rounds.get_round(RoundId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_status_updates_round() {
        let rounds = StaticRounds::new();
        rounds.upsert(round(1));

        assert!(rounds.set_status(RoundId(1), RoundStatus::InProgress));
        let got = rounds.get_round(RoundId(1)).await.unwrap().unwrap();
        assert_eq!(got.status, RoundStatus::InProgress);
    }

    #[test]
    fn test_set_status_unknown_round_returns_false() {
        let rounds = StaticRounds::new();
        assert!(!rounds.set_status(RoundId(9), RoundStatus::Finished));
    }
}
