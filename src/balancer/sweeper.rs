//! Background session eviction.
//!
//! # Responsibilities
//! - Periodically sweep every cluster's session map
//! - Evict sessions idle longer than the configured session timeout
//!
//! # Design Decisions
//! - Cooperative cancellation via a broadcast signal, no forced termination
//! - The timeout is mutable at runtime; a new value applies on the next tick
//! - Sessions are never evicted early, but may be evicted late (poll
//!   interval granularity)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::balancer::cluster::Cluster;
use crate::observability::metrics;

/// How often the sweeper wakes up unless configured otherwise.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Handle to a running session sweep task.
#[derive(Debug)]
pub struct SessionSweeper {
    session_timeout_ms: Arc<AtomicU64>,
    shutdown_tx: broadcast::Sender<()>,
}

impl SessionSweeper {
    /// Spawn the sweep loop over the given cluster registry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        clusters: Arc<DashMap<String, Arc<Cluster>>>,
        session_timeout: Duration,
        interval: Duration,
    ) -> Self {
        let session_timeout_ms = Arc::new(AtomicU64::new(session_timeout.as_millis() as u64));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(run(
            clusters,
            session_timeout_ms.clone(),
            interval,
            shutdown_rx,
        ));
        Self {
            session_timeout_ms,
            shutdown_tx,
        }
    }

    /// The currently configured session timeout.
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms.load(Ordering::Relaxed))
    }

    /// Change the session timeout; the next tick uses the new value.
    pub fn set_session_timeout(&self, timeout: Duration) {
        self.session_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// Signal the sweep loop to exit.
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn run(
    clusters: Arc<DashMap<String, Arc<Cluster>>>,
    session_timeout_ms: Arc<AtomicU64>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(interval_ms = interval.as_millis() as u64, "session sweeper starting");

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let timeout = Duration::from_millis(session_timeout_ms.load(Ordering::Relaxed));
                if timeout.is_zero() {
                    continue;
                }
                let mut evicted = 0;
                for cluster in clusters.iter() {
                    evicted += cluster.sweep_sessions(timeout);
                }
                if evicted > 0 {
                    tracing::debug!(evicted, "evicted idle sessions");
                    metrics::record_sessions_evicted(evicted);
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("session sweeper stopped");
                break;
            }
        }
    }
}
