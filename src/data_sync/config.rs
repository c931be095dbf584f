use crate::utils::{ConfigLoader, ConfigLoaderSync, LoadConfigError, load_from_file, load_from_file_sync};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Configuration for the data synchronization layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base websocket URL of the exchange stream; `/ws/streams/<symbol>@ticker` is appended
    pub stream_base_url: String,
    /// Symbols connected when the service starts
    pub symbols: Vec<String>,
    /// HTTP JSON-RPC endpoint used for block height
    pub rpc_http_url: String,
    /// GraphQL endpoint serving prediction rounds
    pub graph_api_url: String,
    pub block_poll_interval_ms: u64,
    pub round_refresh_interval_ms: u64,
    pub seconds_per_block: u64,
    /// Blocks between two round starts
    pub interval_blocks: u64,
    pub buffer_blocks: u64,
    /// Minimum bet in wei
    pub min_bet_amount: String,
    pub treasury_fee_bps: u64,
    /// Number of most recent rounds pulled on each refresh
    pub rounds_to_fetch: usize,
    pub ws_connection_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
    pub log_color: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stream_base_url: "wss://stream.binance.com:9443".to_string(),
            symbols: vec!["bnbusdt".to_string()],
            rpc_http_url: "https://bsc-dataseed.binance.org".to_string(),
            graph_api_url: "https://api.thegraph.com/subgraphs/name/pancakeswap/prediction".to_string(),
            block_poll_interval_ms: 6000,
            round_refresh_interval_ms: 10_000,
            seconds_per_block: 3,
            interval_blocks: 100,
            buffer_blocks: 20,
            min_bet_amount: "1000000000000000".to_string(),
            treasury_fee_bps: 300,
            rounds_to_fetch: 5,
            ws_connection_timeout_secs: 10,
            http_timeout_secs: 10,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            log_color: true,
        }
    }
}

#[async_trait]
impl ConfigLoader for SyncConfig {
    type SectionType = SyncConfig;

    async fn load_section_from_file(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let config: SyncConfig = load_from_file(file_name).await?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigLoaderSync for SyncConfig {
    type SectionType = SyncConfig;

    fn load_section_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let config: SyncConfig = load_from_file_sync(file_name)?;
        config.validate()?;
        Ok(config)
    }
}

impl SyncConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> eyre::Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(stream_base_url) = std::env::var("STREAM_BASE_URL") {
            config.stream_base_url = stream_base_url;
        }

        if let Ok(symbols) = std::env::var("TICKER_SYMBOLS") {
            config.symbols = symbols
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(rpc_http_url) = std::env::var("RPC_HTTP_URL") {
            config.rpc_http_url = rpc_http_url;
        }

        if let Ok(graph_api_url) = std::env::var("GRAPH_API_URL") {
            config.graph_api_url = graph_api_url;
        }

        if let Ok(interval_str) = std::env::var("BLOCK_POLL_INTERVAL_MS") {
            config.block_poll_interval_ms = interval_str.parse()
                .map_err(|e| eyre::eyre!("Invalid BLOCK_POLL_INTERVAL_MS: {}", e))?;
        }

        if let Ok(interval_str) = std::env::var("ROUND_REFRESH_INTERVAL_MS") {
            config.round_refresh_interval_ms = interval_str.parse()
                .map_err(|e| eyre::eyre!("Invalid ROUND_REFRESH_INTERVAL_MS: {}", e))?;
        }

        if let Ok(seconds_str) = std::env::var("SECONDS_PER_BLOCK") {
            config.seconds_per_block = seconds_str.parse()
                .map_err(|e| eyre::eyre!("Invalid SECONDS_PER_BLOCK: {}", e))?;
        }

        if let Ok(blocks_str) = std::env::var("INTERVAL_BLOCKS") {
            config.interval_blocks = blocks_str.parse()
                .map_err(|e| eyre::eyre!("Invalid INTERVAL_BLOCKS: {}", e))?;
        }

        if let Ok(blocks_str) = std::env::var("BUFFER_BLOCKS") {
            config.buffer_blocks = blocks_str.parse()
                .map_err(|e| eyre::eyre!("Invalid BUFFER_BLOCKS: {}", e))?;
        }

        if let Ok(rounds_str) = std::env::var("ROUNDS_TO_FETCH") {
            config.rounds_to_fetch = rounds_str.parse()
                .map_err(|e| eyre::eyre!("Invalid ROUNDS_TO_FETCH: {}", e))?;
        }

        if let Ok(timeout_str) = std::env::var("WS_CONNECTION_TIMEOUT_SECS") {
            config.ws_connection_timeout_secs = timeout_str.parse()
                .map_err(|e| eyre::eyre!("Invalid WS_CONNECTION_TIMEOUT_SECS: {}", e))?;
        }

        if let Ok(timeout_str) = std::env::var("HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = timeout_str.parse()
                .map_err(|e| eyre::eyre!("Invalid HTTP_TIMEOUT_SECS: {}", e))?;
        }

        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(log_format) = std::env::var("LOG_FORMAT") {
            config.log_format = log_format;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoadConfigError> {
        for (name, value) in [
            ("stream_base_url", &self.stream_base_url),
            ("rpc_http_url", &self.rpc_http_url),
            ("graph_api_url", &self.graph_api_url),
        ] {
            Url::parse(value).map_err(|e| LoadConfigError::ConfigError(format!("Invalid {}: {}", name, e)))?;
        }

        if self.block_poll_interval_ms == 0 || self.round_refresh_interval_ms == 0 {
            return Err(LoadConfigError::ConfigError("Polling intervals must be non-zero".to_string()));
        }

        if self.interval_blocks == 0 {
            return Err(LoadConfigError::ConfigError("interval_blocks must be non-zero".to_string()));
        }

        Ok(())
    }

    pub fn block_poll_interval(&self) -> Duration {
        Duration::from_millis(self.block_poll_interval_ms)
    }

    pub fn round_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.round_refresh_interval_ms)
    }

    pub fn ws_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_connection_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
