//! Background data collector.
//!
//! Wires a [`Poller`] to a [`Store`]: every sample is inserted, every read
//! error is logged, and neither kind of failure stops collection.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use omnik_core::{Error as ReadError, Poller, PollerOptions, Sample, SharedInverter};
use omnik_store::Store;

/// Consecutive read failures logged as warnings before escalating.
const LOUD_FAILURES: u32 = 3;

/// Counters accumulated over one [`Collector::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectorStats {
    /// Samples written to the store.
    pub stored: u64,
    /// Samples read but not written.
    pub insert_failures: u64,
    /// Reads that returned an error.
    pub read_failures: u64,
}

/// How loudly a read failure should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureLevel {
    /// One of the first few failures in a row.
    Warn,
    /// The failure after which the collector goes quiet.
    Escalate,
    /// Logged at debug level only.
    Quiet,
}

/// Tracks consecutive read failures to keep an offline inverter from
/// flooding the log.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive: u32,
}

impl FailureTracker {
    /// Record a failed read and return how to report it.
    pub fn failure(&mut self) -> FailureLevel {
        self.consecutive = self.consecutive.saturating_add(1);
        match self.consecutive {
            n if n <= LOUD_FAILURES => FailureLevel::Warn,
            n if n == LOUD_FAILURES + 1 => FailureLevel::Escalate,
            _ => FailureLevel::Quiet,
        }
    }

    /// Record a successful read. Returns the length of the failure streak
    /// it ended.
    pub fn success(&mut self) -> u32 {
        std::mem::take(&mut self.consecutive)
    }

    /// Failures since the last success.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Polls one inverter and stores every sample.
pub struct Collector {
    poller: Poller,
    store: Arc<Store>,
}

impl Collector {
    /// Create a collector.
    ///
    /// # Errors
    ///
    /// Returns [`omnik_core::Error::InvalidConfig`] if `options` fail
    /// validation.
    pub fn new(
        inverter: SharedInverter,
        store: Arc<Store>,
        options: PollerOptions,
    ) -> omnik_core::Result<Self> {
        let poller = Poller::new(inverter, options)?;
        Ok(Self { poller, store })
    }

    /// Collect until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> CollectorStats {
        info!(
            "Starting collector (interval: {}s)",
            self.poller.options().interval.as_secs()
        );

        let ((samples_tx, samples_rx), (errors_tx, errors_rx)) = self.poller.channels();
        let (_, stats) = tokio::join!(
            self.poller.run(samples_tx, errors_tx, cancel),
            self.consume(samples_rx, errors_rx),
        );

        info!(
            "Collector stopped: {} stored, {} insert failures, {} read failures",
            stats.stored, stats.insert_failures, stats.read_failures
        );
        stats
    }

    /// Drain both channels until the poller drops its senders.
    async fn consume(
        &self,
        mut samples: mpsc::Receiver<Sample>,
        mut errors: mpsc::Receiver<ReadError>,
    ) -> CollectorStats {
        let mut stats = CollectorStats::default();
        let mut failures = FailureTracker::default();

        loop {
            tokio::select! {
                Some(sample) = samples.recv() => {
                    let streak = failures.success();
                    if streak > LOUD_FAILURES {
                        info!("Inverter reachable again after {} failed reads", streak);
                    }
                    self.store_sample(&sample, &mut stats);
                }
                Some(err) = errors.recv() => {
                    stats.read_failures += 1;
                    match failures.failure() {
                        FailureLevel::Warn => warn!(
                            "Failed to read inverter: {} (attempt {})",
                            err,
                            failures.consecutive()
                        ),
                        FailureLevel::Escalate => error!(
                            "Failed to read inverter after {} attempts, will continue trying silently: {}",
                            failures.consecutive(),
                            err
                        ),
                        FailureLevel::Quiet => debug!("Failed to read inverter: {}", err),
                    }
                }
                else => break,
            }
        }

        stats
    }

    fn store_sample(&self, sample: &Sample, stats: &mut CollectorStats) {
        match self.store.insert(sample) {
            Ok(id) => {
                stats.stored += 1;
                debug!(
                    "Stored sample {}: {} W, {} kWh today",
                    id, sample.power, sample.energy_today
                );
            }
            Err(e) => {
                stats.insert_failures += 1;
                error!("Failed to store sample taken at {}: {}", sample.timestamp, e);
            }
        }
    }
}
