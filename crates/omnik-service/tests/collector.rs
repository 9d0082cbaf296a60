//! End-to-end collection from a mock inverter into an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use omnik_core::{Inverter, MockInverter, PollerOptions};
use omnik_service::{Collector, CollectorStats};
use omnik_store::Store;

const PERIOD: Duration = Duration::from_secs(60);

async fn collect_for(mock: Arc<MockInverter>, store: Arc<Store>, elapsed: Duration) -> CollectorStats {
    let inverter: Arc<dyn Inverter> = mock;
    let collector = Collector::new(inverter, store, PollerOptions::with_interval(PERIOD)).unwrap();

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { collector.run(cancel).await }
    });

    tokio::time::sleep(elapsed).await;
    cancel.cancel();
    task.await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_collector_stores_every_sample() {
    let mock = Arc::new(MockInverter::new());
    let store = Arc::new(Store::open_in_memory().unwrap());

    // Reads at 0, 60, 120.
    let stats = collect_for(mock, Arc::clone(&store), PERIOD * 2 + Duration::from_secs(1)).await;

    assert_eq!(
        stats,
        CollectorStats {
            stored: 3,
            insert_failures: 0,
            read_failures: 0,
        }
    );
    assert_eq!(store.count_samples().unwrap(), 3);
    assert_eq!(store.latest_sample().unwrap().power, 1250.0);
}

#[tokio::test(start_paused = true)]
async fn test_collector_survives_read_failures() {
    let mock = Arc::new(MockInverter::new());
    mock.set_transient_failures(5);
    let store = Arc::new(Store::open_in_memory().unwrap());

    // Reads at 0..=360: five failures, then two successes.
    let stats = collect_for(
        Arc::clone(&mock),
        Arc::clone(&store),
        PERIOD * 6 + Duration::from_secs(1),
    )
    .await;

    assert_eq!(stats.read_failures, 5);
    assert_eq!(stats.stored, 2);
    assert_eq!(mock.read_count(), 7);
    assert_eq!(store.count_samples().unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_collector_with_offline_inverter_stores_nothing() {
    let mock = Arc::new(MockInverter::failing());
    let store = Arc::new(Store::open_in_memory().unwrap());

    let stats = collect_for(mock, Arc::clone(&store), PERIOD * 9 + Duration::from_secs(1)).await;

    assert_eq!(stats.read_failures, 10);
    assert_eq!(stats.stored, 0);
    assert_eq!(store.count_samples().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_offline_inverter_goes_quiet_after_escalating() {
    let inverter: Arc<dyn Inverter> = Arc::new(MockInverter::failing());
    let store = Arc::new(Store::open_in_memory().unwrap());
    let collector = Collector::new(inverter, store, PollerOptions::with_interval(PERIOD)).unwrap();
    let cancel = CancellationToken::new();

    let stop = async {
        tokio::time::sleep(PERIOD * 9 + Duration::from_secs(1)).await;
        cancel.cancel();
    };
    let (stats, ()) = tokio::join!(collector.run(cancel.clone()), stop);
    assert_eq!(stats.read_failures, 10);

    logs_assert(|lines: &[&str]| {
        let warnings = lines.iter().filter(|line| line.contains("WARN")).count();
        let errors = lines
            .iter()
            .filter(|line| line.contains("ERROR") && line.contains("trying silently"))
            .count();
        match (warnings, errors) {
            (3, 1) => Ok(()),
            other => Err(format!("expected 3 warnings and 1 error, got {other:?}")),
        }
    });
}

#[test]
fn test_collector_rejects_zero_interval() {
    let inverter: Arc<dyn Inverter> = Arc::new(MockInverter::new());
    let store = Arc::new(Store::open_in_memory().unwrap());
    assert!(Collector::new(inverter, store, PollerOptions::with_interval(Duration::ZERO)).is_err());
}
