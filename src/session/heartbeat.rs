use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::transport::TransportLink;

/// Periodic liveness pings on the caller's leg
///
/// Pings only while the link reports open; the first ping goes out one
/// period after start. The task exits by itself once the link closes.
pub struct HeartbeatMonitor {
    handle: Mutex<Option<JoinHandle<()>>>,
    pings_sent: Arc<AtomicU64>,
}

impl HeartbeatMonitor {
    /// Spawn the ping task; a zero period disables it
    pub fn start(link: Arc<dyn TransportLink>, period: Duration, session_id: &str) -> Self {
        let pings_sent = Arc::new(AtomicU64::new(0));

        if period.is_zero() {
            return Self {
                handle: Mutex::new(None),
                pings_sent,
            };
        }

        let counter = Arc::clone(&pings_sent);
        let session_id = session_id.to_string();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if !link.is_open() {
                    debug!("[{}] Link closed, heartbeat stopping", session_id);
                    break;
                }

                if let Err(e) = link.send_ping().await {
                    debug!("[{}] Heartbeat ping failed: {}", session_id, e);
                    break;
                }
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        Self {
            handle: Mutex::new(Some(task)),
            pings_sent,
        }
    }

    /// Stop pinging; true only for the call that actually cancelled the task
    pub async fn cancel(&self) -> bool {
        match self.handle.lock().await.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn pings_sent(&self) -> u64 {
        self.pings_sent.load(Ordering::Relaxed)
    }
}
