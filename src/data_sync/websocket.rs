use crate::data_sync::stream::parse_frame;
use crate::error::TransportError;
use crate::state::TickerStore;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::Display;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// Lifecycle of one symbol's stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// `connect()` was called
    Connect,
    /// Transport handshake completed
    Opened,
    /// Transport closed, failed to open, or errored
    Closed,
}

impl ConnectionState {
    /// Next state for `event`, or `None` when the event is not valid here.
    pub fn on_event(self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Disconnected, Connect) => Some(Connecting),
            (Connecting, Opened) => Some(Connected),
            (Connecting, Closed) | (Connected, Closed) => Some(Disconnected),
            _ => None,
        }
    }
}

/// Shared view of one symbol's state, mirrored into the ticker store.
#[derive(Clone)]
struct ConnectionHandle {
    symbol: String,
    state: Arc<watch::Sender<ConnectionState>>,
    store: Arc<TickerStore>,
}

impl ConnectionHandle {
    fn new(symbol: String, store: Arc<TickerStore>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            symbol,
            state: Arc::new(state),
            store,
        }
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Apply `event`. Returns false if the current state does not accept it.
    fn apply(&self, event: ConnectionEvent) -> bool {
        let mut next_state = None;
        self.state.send_if_modified(|state| match state.on_event(event) {
            Some(next) => {
                *state = next;
                next_state = Some(next);
                true
            }
            None => false,
        });

        match next_state {
            Some(ConnectionState::Connected) => self.store.set_connection_status(&self.symbol, true),
            Some(ConnectionState::Disconnected) => self.store.set_connection_status(&self.symbol, false),
            _ => {}
        }
        next_state.is_some()
    }
}

struct SymbolConnection {
    handle: ConnectionHandle,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Owns one ticker stream socket per symbol.
///
/// Frames are normalized and written into the [`TickerStore`] by the socket's own task, one at a
/// time and in receipt order. Malformed frames are logged and dropped.
pub struct TickerConnectionManager {
    stream_base_url: String,
    connection_timeout: Duration,
    store: Arc<TickerStore>,
    connections: Mutex<HashMap<String, SymbolConnection>>,
}

impl TickerConnectionManager {
    pub fn new(stream_base_url: String, connection_timeout: Duration, store: Arc<TickerStore>) -> Self {
        Self {
            stream_base_url,
            connection_timeout,
            store,
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn stream_url(&self, symbol: &str) -> Result<Url, TransportError> {
        let url = format!(
            "{}/ws/streams/{}@ticker",
            self.stream_base_url.trim_end_matches('/'),
            symbol.to_lowercase()
        );
        Ok(Url::parse(&url)?)
    }

    pub fn store(&self) -> &Arc<TickerStore> {
        &self.store
    }

    /// Open the stream for `symbol`. Does nothing unless the symbol is currently disconnected.
    pub async fn connect(&self, symbol: &str) -> Result<(), TransportError> {
        let symbol = symbol.to_lowercase();
        let url = self.stream_url(&symbol)?;

        let mut connections = self.connections.lock().await;
        let connection = connections.entry(symbol.clone()).or_insert_with(|| SymbolConnection {
            handle: ConnectionHandle::new(symbol.clone(), Arc::clone(&self.store)),
            shutdown_tx: None,
            task: None,
        });

        if !connection.handle.apply(ConnectionEvent::Connect) {
            debug!("{} stream is already {}, ignoring connect", symbol, connection.handle.current());
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = connection.handle.clone();
        let connection_timeout = self.connection_timeout;

        connection.shutdown_tx = Some(shutdown_tx);
        connection.task = Some(tokio::spawn(async move {
            run_connection(url, handle, connection_timeout, shutdown_rx).await;
        }));

        info!("Connecting {} ticker stream", symbol);
        Ok(())
    }

    /// Close the stream for `symbol` and wait for its task to finish. No-op if there is none.
    pub async fn disconnect(&self, symbol: &str) {
        let symbol = symbol.to_lowercase();

        let (handle, shutdown_tx, task) = {
            let mut connections = self.connections.lock().await;
            let Some(connection) = connections.get_mut(&symbol) else {
                return;
            };
            (connection.handle.clone(), connection.shutdown_tx.take(), connection.task.take())
        };

        if let Some(shutdown_tx) = shutdown_tx {
            let _ = shutdown_tx.send(()).await;
        }

        if let Some(mut task) = task {
            if timeout(self.connection_timeout, &mut task).await.is_err() {
                warn!("{} stream did not close in time, aborting", symbol);
                task.abort();
                let _ = task.await;

                // An aborted task never reaches its own close handling. Skip when a newer
                // connect has already claimed the slot.
                let connections = self.connections.lock().await;
                let replaced = connections.get(&symbol).is_some_and(|connection| connection.task.is_some());
                if !replaced {
                    handle.apply(ConnectionEvent::Closed);
                }
            }
        }

        info!("Disconnected {} ticker stream", symbol);
    }

    /// Close every open stream.
    pub async fn shutdown(&self) {
        let symbols: Vec<String> = self.connections.lock().await.keys().cloned().collect();
        for symbol in symbols {
            self.disconnect(&symbol).await;
        }
    }

    pub async fn state(&self, symbol: &str) -> ConnectionState {
        self.connections
            .lock()
            .await
            .get(&symbol.to_lowercase())
            .map(|connection| connection.handle.current())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Watch a symbol's state transitions. `None` until the symbol has been connected once.
    pub async fn subscribe(&self, symbol: &str) -> Option<watch::Receiver<ConnectionState>> {
        self.connections
            .lock()
            .await
            .get(&symbol.to_lowercase())
            .map(|connection| connection.handle.state.subscribe())
    }

    pub async fn active_symbols(&self) -> Vec<String> {
        let connections = self.connections.lock().await;
        let mut symbols: Vec<String> = connections
            .iter()
            .filter(|(_, connection)| connection.handle.current() != ConnectionState::Disconnected)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }
}

impl Drop for TickerConnectionManager {
    fn drop(&mut self) {
        for (symbol, connection) in self.connections.get_mut().iter_mut() {
            if let Some(task) = connection.task.take() {
                if !task.is_finished() {
                    warn!("TickerConnectionManager dropped with {} stream open, aborting", symbol);
                    task.abort();
                    connection.handle.apply(ConnectionEvent::Closed);
                }
            }
        }
    }
}

/// Drive one socket from open to close.
async fn run_connection(
    url: Url,
    handle: ConnectionHandle,
    connection_timeout: Duration,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let symbol = handle.symbol.clone();

    let connected = tokio::select! {
        result = timeout(connection_timeout, connect_async(url.as_str())) => match result {
            Ok(Ok((ws_stream, _))) => Some(ws_stream),
            Ok(Err(e)) => {
                error!("{} stream failed to open: {}", symbol, TransportError::from(e));
                None
            }
            Err(_) => {
                error!("{} stream failed to open: {}", symbol, TransportError::ConnectTimeout(connection_timeout));
                None
            }
        },
        _ = shutdown_rx.recv() => {
            debug!("{} stream cancelled while connecting", symbol);
            None
        }
    };

    let Some(ws_stream) = connected else {
        handle.apply(ConnectionEvent::Closed);
        return;
    };

    handle.apply(ConnectionEvent::Opened);
    info!("{} stream connected: {}", symbol, url);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            ws_msg = ws_receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match parse_frame(text.as_str()) {
                            Ok(tick) => handle.store.set_ticker_data(&symbol, tick),
                            Err(e) => warn!("Dropping malformed {} frame: {}", symbol, e),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                            error!("{} stream failed to send pong: {}", symbol, e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("{} stream closed by server", symbol);
                        break;
                    }
                    Some(Ok(_)) => {
                        // binary and pong frames carry nothing for us
                    }
                    Some(Err(e)) => {
                        error!("{} stream error: {}", symbol, TransportError::from(e));
                        break;
                    }
                    None => {
                        info!("{} stream ended", symbol);
                        break;
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                debug!("{} stream received shutdown signal", symbol);
                if let Err(e) = ws_sender.close().await {
                    debug!("{} stream close handshake failed: {}", symbol, e);
                }
                break;
            }
        }
    }

    handle.apply(ConnectionEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine() {
        use ConnectionEvent::*;
        use ConnectionState::*;

        assert_eq!(Disconnected.on_event(Connect), Some(Connecting));
        assert_eq!(Connecting.on_event(Opened), Some(Connected));
        assert_eq!(Connecting.on_event(Closed), Some(Disconnected));
        assert_eq!(Connected.on_event(Closed), Some(Disconnected));

        assert_eq!(Connecting.on_event(Connect), None);
        assert_eq!(Connected.on_event(Connect), None);
        assert_eq!(Disconnected.on_event(Opened), None);
        assert_eq!(Disconnected.on_event(Closed), None);
    }

    #[test]
    fn test_handle_mirrors_store() {
        let store = Arc::new(TickerStore::new());
        let handle = ConnectionHandle::new("bnbusdt".to_string(), Arc::clone(&store));

        assert!(handle.apply(ConnectionEvent::Connect));
        assert!(!store.is_connected("bnbusdt"));
        assert!(!handle.apply(ConnectionEvent::Connect));

        assert!(handle.apply(ConnectionEvent::Opened));
        assert!(store.is_connected("bnbusdt"));

        assert!(handle.apply(ConnectionEvent::Closed));
        assert!(!store.is_connected("bnbusdt"));
        assert_eq!(handle.current(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stream_url() {
        let manager = TickerConnectionManager::new(
            "wss://stream.binance.com:9443/".to_string(),
            Duration::from_secs(10),
            Arc::new(TickerStore::new()),
        );

        assert_eq!(
            manager.stream_url("BNBUSDT").unwrap().as_str(),
            "wss://stream.binance.com:9443/ws/streams/bnbusdt@ticker"
        );
    }

    #[tokio::test]
    async fn test_disconnect_unknown_symbol_is_noop() {
        let manager = TickerConnectionManager::new(
            "ws://127.0.0.1:1".to_string(),
            Duration::from_millis(200),
            Arc::new(TickerStore::new()),
        );

        manager.disconnect("bnbusdt").await;
        assert_eq!(manager.state("bnbusdt").await, ConnectionState::Disconnected);
        assert!(manager.active_symbols().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_open_returns_to_disconnected() {
        let store = Arc::new(TickerStore::new());
        let manager = TickerConnectionManager::new(
            "ws://127.0.0.1:1".to_string(),
            Duration::from_millis(500),
            Arc::clone(&store),
        );

        manager.connect("bnbusdt").await.unwrap();
        let mut state_rx = manager.subscribe("bnbusdt").await.unwrap();
        let settled = timeout(
            Duration::from_secs(2),
            state_rx.wait_for(|state| *state == ConnectionState::Disconnected),
        )
        .await
        .map(|result| result.is_ok());

        assert!(matches!(settled, Ok(true)));
        assert!(!store.is_connected("bnbusdt"));
    }
}
