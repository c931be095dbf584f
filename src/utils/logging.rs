use crate::data_sync::SyncConfig;
use std::io;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn level_from_str(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber. `RUST_LOG` directives are combined with the configured level.
pub fn init_tracing(cfg: &SyncConfig) {
    let level = level_from_str(&cfg.log_level);

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap_or_else(|_| level.into()))
        .add_directive("tungstenite=warn".parse().unwrap_or_else(|_| level.into()));

    let make_writer = io::stdout;

    if cfg.log_format.to_lowercase() == "pretty" {
        let layer = fmt::layer()
            .with_writer(make_writer)
            .with_ansi(cfg.log_color)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_level(true);

        Registry::default().with(filter).with(layer).init();
    } else {
        let layer = fmt::layer()
            .with_writer(make_writer)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .json()
            .flatten_event(true);

        Registry::default().with(filter).with(layer).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_str() {
        assert_eq!(level_from_str("DEBUG"), Level::DEBUG);
        assert_eq!(level_from_str("warn"), Level::WARN);
        assert_eq!(level_from_str("verbose"), Level::INFO);
    }
}
