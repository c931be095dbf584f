/// Data Synchronization Layer
///
/// Keeps the shared application state in step with three external sources:
///
/// - Exchange ticker websocket streams, one socket per symbol
/// - A polled chain block height
/// - Prediction round records, refreshed and merged by epoch
///
/// Every source is owned by exactly one component, which is the only writer of its store.

// Core data sync components
pub mod config;
pub mod stream;
pub mod websocket;
pub mod polling;
pub mod block_clock;
pub mod rpc;
pub mod rounds;
pub mod graph;
pub mod service;


// Re-export main components for easy usage
pub use config::SyncConfig;
pub use stream::{NormalizedTick, RawTick, TokenPair, parse_frame};
pub use websocket::{ConnectionEvent, ConnectionState, TickerConnectionManager};
pub use polling::PollingTask;
pub use block_clock::{BlockClock, BlockHeightProvider};
pub use rpc::JsonRpcBlockProvider;
pub use rounds::{MarketData, RefreshOutcome, RoundDataProvider, RoundSynchronizer};
pub use graph::GraphRoundProvider;
pub use service::{DataSyncService, DataSyncServiceBuilder};
