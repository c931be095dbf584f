/// Live ticker and round monitor
///
/// Connects to the public exchange stream and the configured chain / graph endpoints, then
/// prints the latest price, block height and next-round countdown every few seconds.
/// Configuration comes from the environment (see `SyncConfig::from_env`).

use eyre::Result;
use prediction_sync::logic::{countdown_label, full_display_balance};
use prediction_sync::{DataSyncServiceBuilder, SyncConfig, TokenPair, init_tracing};
use std::time::Duration;
use strum::IntoEnumIterator;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = SyncConfig::from_env()?;
    init_tracing(&config);

    if config.symbols.is_empty() {
        config.symbols = TokenPair::iter().map(|pair| pair.to_string()).collect();
    }
    let symbols = config.symbols.clone();

    let mut service = DataSyncServiceBuilder::new().with_config(config).build()?;
    service.start().await?;

    let state = service.state().clone();
    let mut report = tokio::time::interval(Duration::from_secs(5));

    loop {
        tokio::select! {
            _ = report.tick() => {
                for symbol in &symbols {
                    match state.ticker.entry(symbol) {
                        Some(entry) => match entry.data.as_ref() {
                            Some(tick) => info!(
                                symbol = %symbol,
                                connected = entry.is_connected,
                                age = ?entry.age(),
                                "last {} ({:+.2}%)", tick.last_price, tick.price_change_percent
                            ),
                            None => info!(symbol = %symbol, connected = entry.is_connected, "waiting for first tick"),
                        },
                        None => info!(symbol = %symbol, "not connected yet"),
                    }
                }

                let predictions = state.predictions.snapshot().await;
                let seconds = service.next_round_countdown(1).await;
                info!(
                    block = state.block.current_block(),
                    epoch = predictions.current_epoch,
                    status = %predictions.status,
                    min_bet = full_display_balance(&predictions.min_bet_amount, 18).as_deref().unwrap_or("?"),
                    "next round {}", countdown_label(seconds)
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    service.stop().await?;
    Ok(())
}
