use crate::data_sync::stream::NormalizedTick;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latest known state of one symbol's stream.
#[derive(Debug, Clone, Default)]
pub struct TickerEntry {
    pub is_connected: bool,
    pub data: Option<Arc<NormalizedTick>>,
    /// When `data` was last replaced. Survives reconnects together with `data`.
    pub last_updated: Option<Instant>,
}

impl TickerEntry {
    pub fn age(&self) -> Option<Duration> {
        self.last_updated.map(|at| at.elapsed())
    }
}

/// Process-wide `symbol -> TickerEntry` map.
///
/// Written only by the connection manager's socket tasks; readers get clones.
#[derive(Debug, Default)]
pub struct TickerStore {
    entries: DashMap<String, TickerEntry>,
}

impl TickerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connection_status(&self, symbol: &str, is_connected: bool) {
        self.entries
            .entry(symbol.to_string())
            .or_default()
            .is_connected = is_connected;
    }

    pub fn set_ticker_data(&self, symbol: &str, tick: NormalizedTick) {
        let mut entry = self.entries.entry(symbol.to_string()).or_default();
        entry.data = Some(Arc::new(tick));
        entry.last_updated = Some(Instant::now());
    }

    pub fn entry(&self, symbol: &str) -> Option<TickerEntry> {
        self.entries.get(symbol).map(|entry| entry.clone())
    }

    pub fn is_connected(&self, symbol: &str) -> bool {
        self.entries.get(symbol).is_some_and(|entry| entry.is_connected)
    }

    pub fn ticker_data(&self, symbol: &str) -> Option<Arc<NormalizedTick>> {
        self.entries.get(symbol).and_then(|entry| entry.data.clone())
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        symbols.sort();
        symbols
    }
}
