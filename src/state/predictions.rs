use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum BetPosition {
    Bull,
    Bear,
    House,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    #[default]
    Initial,
    Live,
    Paused,
}

/// Phase of a round. Ordered: a round only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum RoundPhase {
    Open,
    Locked,
    Closed,
}

/// How a round relates to the current epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RoundStatus {
    Expired,
    Live,
    Next,
    Soon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: String,
    pub epoch: u64,
    pub start_block: u64,
    pub start_at: Option<u64>,
    pub lock_at: Option<u64>,
    pub lock_block: Option<u64>,
    pub lock_price: Option<f64>,
    pub end_block: Option<u64>,
    pub close_price: Option<f64>,
    pub total_bets: u64,
    pub total_amount: f64,
    pub bull_bets: u64,
    pub bull_amount: f64,
    pub bear_bets: u64,
    pub bear_amount: f64,
    pub reward_base_cal_amount: f64,
    pub reward_amount: f64,
    pub oracle_called: bool,
    pub position: Option<BetPosition>,
}

impl Round {
    pub fn new(epoch: u64, start_block: u64) -> Self {
        Self {
            id: epoch.to_string(),
            epoch,
            start_block,
            start_at: None,
            lock_at: None,
            lock_block: None,
            lock_price: None,
            end_block: None,
            close_price: None,
            total_bets: 0,
            total_amount: 0.0,
            bull_bets: 0,
            bull_amount: 0.0,
            bear_bets: 0,
            bear_amount: 0.0,
            reward_base_cal_amount: 0.0,
            reward_amount: 0.0,
            oracle_called: false,
            position: None,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        if self.oracle_called || self.close_price.is_some() {
            RoundPhase::Closed
        } else if self.lock_price.is_some() {
            RoundPhase::Locked
        } else {
            RoundPhase::Open
        }
    }
}

/// Prediction market slice of the application state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionsState {
    pub status: PredictionStatus,
    pub current_epoch: u64,
    pub current_round_start_block: u64,
    pub interval_blocks: u64,
    pub buffer_blocks: u64,
    pub min_bet_amount: String,
    pub rounds: BTreeMap<u64, Round>,
}

impl PredictionsState {
    pub fn new(interval_blocks: u64, buffer_blocks: u64, min_bet_amount: String) -> Self {
        Self {
            status: PredictionStatus::Initial,
            current_epoch: 0,
            current_round_start_block: 0,
            interval_blocks,
            buffer_blocks,
            min_bet_amount,
            rounds: BTreeMap::new(),
        }
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.get(&self.current_epoch)
    }

    pub fn is_next_round(&self, epoch: u64) -> bool {
        epoch == self.current_epoch + 1
    }

    pub fn round_status(&self, epoch: u64) -> RoundStatus {
        match epoch.cmp(&self.current_epoch) {
            std::cmp::Ordering::Less => RoundStatus::Expired,
            std::cmp::Ordering::Equal => RoundStatus::Live,
            std::cmp::Ordering::Greater if self.is_next_round(epoch) => RoundStatus::Next,
            std::cmp::Ordering::Greater => RoundStatus::Soon,
        }
    }

    /// Move the live-round pointer. An epoch behind the stored one is a stale response and is ignored.
    fn set_market(&mut self, current_epoch: u64, paused: bool) -> bool {
        if current_epoch < self.current_epoch {
            debug!(
                stored = self.current_epoch,
                received = current_epoch,
                "Ignoring stale market status"
            );
            return false;
        }
        self.current_epoch = current_epoch;
        self.status = if paused { PredictionStatus::Paused } else { PredictionStatus::Live };
        if let Some(start_block) = self.current_round().map(|round| round.start_block) {
            self.current_round_start_block = start_block;
        }
        true
    }

    /// Merge one round record. Rounds never re-open: a record behind the stored phase is discarded.
    fn merge_round(&mut self, round: Round) -> bool {
        if let Some(existing) = self.rounds.get(&round.epoch) {
            if round.phase() < existing.phase() {
                debug!(
                    epoch = round.epoch,
                    stored = %existing.phase(),
                    received = %round.phase(),
                    "Discarding stale round record"
                );
                return false;
            }
        }
        self.rounds.insert(round.epoch, round);
        true
    }
}

/// Shared round map plus the pointer to the live round.
#[derive(Debug)]
pub struct PredictionsStore {
    state: RwLock<PredictionsState>,
}

impl PredictionsStore {
    pub fn new(state: PredictionsState) -> Self {
        Self { state: RwLock::new(state) }
    }

    pub async fn snapshot(&self) -> PredictionsState {
        self.state.read().await.clone()
    }

    /// Merge fetched rounds by epoch. Other epochs are left as they are.
    pub async fn merge_rounds(&self, rounds: impl IntoIterator<Item = Round>) -> usize {
        let mut state = self.state.write().await;
        let mut merged = 0;
        for round in rounds {
            if state.merge_round(round) {
                merged += 1;
            }
        }
        merged
    }

    /// Returns `false` when `current_epoch` is behind the stored epoch and nothing changed.
    pub async fn set_market(&self, current_epoch: u64, paused: bool) -> bool {
        self.state.write().await.set_market(current_epoch, paused)
    }

    /// Merge rounds and move the live-round pointer under one write lock, so readers never see
    /// new rounds paired with an old epoch.
    pub async fn apply_refresh(
        &self,
        rounds: impl IntoIterator<Item = Round>,
        current_epoch: u64,
        paused: bool,
    ) -> usize {
        let mut state = self.state.write().await;
        let mut merged = 0;
        for round in rounds {
            if state.merge_round(round) {
                merged += 1;
            }
        }
        state.set_market(current_epoch, paused);
        merged
    }

    pub async fn round(&self, epoch: u64) -> Option<Round> {
        self.state.read().await.rounds.get(&epoch).cloned()
    }

    pub async fn current_epoch(&self) -> u64 {
        self.state.read().await.current_epoch
    }

    pub async fn current_round(&self) -> Option<Round> {
        self.state.read().await.current_round().cloned()
    }

    pub async fn status(&self) -> PredictionStatus {
        self.state.read().await.status
    }

    pub async fn round_status(&self, epoch: u64) -> RoundStatus {
        self.state.read().await.round_status(epoch)
    }

    pub async fn is_next_round(&self, epoch: u64) -> bool {
        self.state.read().await.is_next_round(epoch)
    }
}
