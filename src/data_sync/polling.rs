use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Handle to a background job that runs on a fixed interval.
///
/// The first run happens immediately. The job is never interrupted mid-run: a stop request is
/// observed between runs. Dropping the handle without calling [`PollingTask::stop`] aborts the task.
pub struct PollingTask {
    name: &'static str,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollingTask {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let period = period.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            info!(task = name, period = ?period, "Polling task started");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        debug!(task = name, "Polling tick");
                        job().await;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            info!(task = name, "Polling task stopped");
        });

        Self {
            name,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Request shutdown and wait for the loop to exit.
    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(task = self.name, "Polling task error during shutdown: {}", e);
            }
        }
    }
}

impl Drop for PollingTask {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                warn!(task = self.name, "PollingTask dropped while running, aborting");
                task.abort();
            }
        }
    }
}
