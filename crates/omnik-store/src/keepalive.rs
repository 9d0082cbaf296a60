//! Background liveness pinger for a shared [`Store`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::Store;

/// Periodically pings a [`Store`] so its connection stays warm between
/// queries.
///
/// The first ping happens one `period` after spawning. Dropping the handle
/// stops the task.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use omnik_store::{KeepAlive, Store};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), omnik_store::Error> {
/// let store = Arc::new(Store::open_in_memory()?);
/// let keepalive = KeepAlive::spawn(Arc::clone(&store), Duration::from_secs(30));
/// keepalive.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct KeepAlive {
    pings: Arc<AtomicU64>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl KeepAlive {
    /// Start pinging `store` every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<Store>, period: Duration) -> Self {
        let pings = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let task_pings = Arc::clone(&pings);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match store.ping() {
                    Ok(()) => {
                        let n = task_pings.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!("Store keep-alive ping {}", n);
                    }
                    Err(e) => warn!("Store keep-alive ping failed: {}", e),
                }
            }
        });

        Self {
            pings,
            cancel,
            handle: Some(handle),
        }
    }

    /// Number of successful pings so far.
    pub fn pings(&self) -> u64 {
        self.pings.load(Ordering::Relaxed)
    }

    /// Stop pinging and wait for the task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Keep-alive task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pings_on_period() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let keepalive = KeepAlive::spawn(store, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(keepalive.pings(), 0);

        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(keepalive.pings(), 3);

        keepalive.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_pings() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let keepalive = KeepAlive::spawn(Arc::clone(&store), Duration::from_secs(30));
        let pings = Arc::clone(&keepalive.pings);

        tokio::time::sleep(Duration::from_secs(31)).await;
        keepalive.stop().await;
        let after_stop = pings.load(Ordering::Relaxed);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(pings.load(Ordering::Relaxed), after_stop);
        assert_eq!(after_stop, 1);
    }
}
