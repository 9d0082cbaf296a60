//! Continuous polling of an inverter on a fixed period.
//!
//! The poller performs exactly one read per tick and never overlaps reads:
//! a read that outlasts the period delays the next one instead of queueing
//! or skipping it. There is no backoff; a failing inverter is retried at the
//! same cadence until the poller is cancelled.
//!
//! Samples and errors are delivered to two separate channels. Cancelling
//! while a read is in flight abandons that read (its socket is dropped) and
//! emits nothing for it; a result still waiting for room in a full channel
//! is dropped the same way.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use omnik_types::Sample;

use crate::error::{Error, Result};
use crate::traits::Inverter;

/// Options for a [`Poller`].
#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// Time between the start of consecutive reads.
    /// Default: 60 seconds.
    pub interval: Duration,
    /// Capacity of the sample and error channels created by
    /// [`Poller::channels`].
    /// Default: 16.
    pub buffer_size: usize,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            buffer_size: 16,
        }
    }
}

impl PollerOptions {
    /// Create options with a specific interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Validate the options and return an error if invalid.
    ///
    /// Checks that:
    /// - `interval` is > 0
    /// - `buffer_size` is > 0
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::InvalidConfig("interval must be > 0".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig("buffer_size must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Drives an [`Inverter`] on a fixed period.
pub struct Poller {
    inverter: Arc<dyn Inverter>,
    options: PollerOptions,
}

impl Poller {
    /// Create a poller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `options` fail validation.
    pub fn new(inverter: Arc<dyn Inverter>, options: PollerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { inverter, options })
    }

    /// The poller's options.
    pub fn options(&self) -> &PollerOptions {
        &self.options
    }

    /// Create a sample channel and an error channel sized by `buffer_size`.
    #[allow(clippy::type_complexity)]
    pub fn channels(
        &self,
    ) -> (
        (mpsc::Sender<Sample>, mpsc::Receiver<Sample>),
        (mpsc::Sender<Error>, mpsc::Receiver<Error>),
    ) {
        (
            mpsc::channel(self.options.buffer_size),
            mpsc::channel(self.options.buffer_size),
        )
    }

    /// Poll until `cancel` fires or either sink's receiver is dropped.
    ///
    /// The first read starts immediately.
    pub async fn run(
        &self,
        samples: mpsc::Sender<Sample>,
        errors: mpsc::Sender<Error>,
        cancel: CancellationToken,
    ) {
        let endpoint = &self.inverter.info().address;
        info!(
            "Polling {} every {:?}",
            self.inverter.info(),
            self.options.interval
        );

        let mut ticker = interval(self.options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Poller for {} cancelled", endpoint);
                    break;
                }
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Poller for {} cancelled, abandoning in-flight read", endpoint);
                    break;
                }
                outcome = self.inverter.read_sample() => outcome,
            };

            // Severity is the consumer's call.
            if let Err(e) = &outcome {
                debug!("Read from {} failed: {}", endpoint, e);
            }

            // A full sink must not hold off cancellation.
            let delivered = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Poller for {} cancelled, dropping undelivered result", endpoint);
                    break;
                }
                delivered = deliver(outcome, &samples, &errors) => delivered,
            };

            if !delivered {
                debug!("Sink for {} dropped, stopping", endpoint);
                break;
            }
        }
    }

    /// Run the poller in a background task.
    pub fn spawn(
        self,
        samples: mpsc::Sender<Sample>,
        errors: mpsc::Sender<Error>,
    ) -> PollerHandle {
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            self.run(samples, errors, task_token).await;
        });

        PollerHandle {
            handle: Some(handle),
            cancel_token,
        }
    }
}

/// Send a read outcome to its sink. Returns `false` if the receiver is gone.
async fn deliver(
    outcome: Result<Sample>,
    samples: &mpsc::Sender<Sample>,
    errors: &mpsc::Sender<Error>,
) -> bool {
    match outcome {
        Ok(sample) => samples.send(sample).await.is_ok(),
        Err(e) => errors.send(e).await.is_ok(),
    }
}

/// Handle to a poller running in the background.
///
/// Dropping the handle cancels the poller.
pub struct PollerHandle {
    handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl PollerHandle {
    /// Signal the poller to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Get a token that cancels the poller when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Check if the background task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the poller and wait for its task to finish.
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Poller task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
