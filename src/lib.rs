// Layers
pub mod data_sync;  // Sources: ticker sockets, block clock, round refresh
pub mod state;      // Shared stores written by data_sync, read by everyone
pub mod logic;      // Pure derivations: countdowns, rewards, balance formatting

// Common utilities and types
pub mod error;
pub mod utils;

// Re-export key components from each layer
pub use data_sync::{
    BlockClock, BlockHeightProvider, ConnectionState, DataSyncService, DataSyncServiceBuilder,
    GraphRoundProvider, JsonRpcBlockProvider, NormalizedTick, PollingTask, RawTick, RoundDataProvider,
    RoundSynchronizer, SyncConfig, TickerConnectionManager, TokenPair, parse_frame,
};
pub use error::{FetchError, MalformedMessageError, SyncError, TransportError};
pub use logic::{countdown, format_round_time, target_block_for_interval};
pub use state::{AppState, BlockState, PredictionsState, Round, RoundStatus, TickerEntry};
pub use utils::{LoadConfigError, init_tracing};
