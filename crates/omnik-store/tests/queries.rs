//! Query behaviour of `Store` over realistic data sets.

use time::macros::{date, datetime};
use time::{Duration, OffsetDateTime};

use omnik_store::{Error, Store};
use omnik_types::{Adjacency, Sample};

fn sample(ts: OffsetDateTime, today: f32) -> Sample {
    let mut sample = Sample::at(ts);
    sample.energy_today = today;
    sample.power = if today > 0.0 { 800.0 } else { 0.0 };
    sample
}

fn store_with_dates(dates: &[OffsetDateTime]) -> Store {
    let store = Store::open_in_memory().unwrap();
    for &ts in dates {
        store.insert(&sample(ts, 1.0)).unwrap();
    }
    store
}

#[test]
fn test_adjacent_date_before_and_after() {
    let store = store_with_dates(&[
        datetime!(2024-01-05 12:00:00 UTC),
        datetime!(2024-01-10 09:00:00 UTC),
        datetime!(2024-01-10 15:00:00 UTC),
        datetime!(2024-01-20 12:00:00 UTC),
    ]);

    assert_eq!(
        store
            .adjacent_date(date!(2024-01-10), Adjacency::Before)
            .unwrap(),
        date!(2024-01-05)
    );
    assert_eq!(
        store
            .adjacent_date(date!(2024-01-10), Adjacency::After)
            .unwrap(),
        date!(2024-01-20)
    );
    // The reference date does not need to be stored itself.
    assert_eq!(
        store
            .adjacent_date(date!(2024-01-15), Adjacency::Before)
            .unwrap(),
        date!(2024-01-10)
    );
}

#[test]
fn test_adjacent_date_at_edges_is_not_found() {
    let store = store_with_dates(&[
        datetime!(2024-01-05 12:00:00 UTC),
        datetime!(2024-01-10 12:00:00 UTC),
        datetime!(2024-01-20 12:00:00 UTC),
    ]);

    assert!(matches!(
        store.adjacent_date(date!(2024-01-05), Adjacency::Before),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        store.adjacent_date(date!(2024-01-20), Adjacency::After),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_adjacent_date_named() {
    let store = store_with_dates(&[
        datetime!(2024-01-05 12:00:00 UTC),
        datetime!(2024-01-10 12:00:00 UTC),
    ]);
    assert_eq!(
        store
            .adjacent_date_named(date!(2024-01-10), "BEFORE")
            .unwrap(),
        date!(2024-01-05)
    );
    assert!(matches!(
        store.adjacent_date_named(date!(2024-01-10), "next"),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_daily_kwh_one_entry_per_date() {
    let store = Store::open_in_memory().unwrap();
    let day_one = datetime!(2024-03-01 08:00:00 UTC);
    let day_two = datetime!(2024-03-02 08:00:00 UTC);
    for (ts, kwh) in [
        (day_one, 0.4),
        (day_one + Duration::hours(4), 3.2),
        (day_one + Duration::hours(8), 7.5),
        (day_two, 0.1),
        (day_two + Duration::hours(6), 5.0),
    ] {
        store.insert(&sample(ts, kwh)).unwrap();
    }

    let daily = store
        .daily_kwh_in_range(date!(2024-03-01), date!(2024-03-02))
        .unwrap();
    assert_eq!(daily.len(), 2);
    assert_eq!(daily[0].date, date!(2024-03-01));
    assert_eq!(daily[0].kwh, 7.5);
    assert_eq!(daily[1].date, date!(2024-03-02));
    assert_eq!(daily[1].kwh, 5.0);

    let only_first = store
        .daily_kwh_in_range(date!(2024-02-01), date!(2024-03-01))
        .unwrap();
    assert_eq!(only_first.len(), 1);
}

#[test]
fn test_samples_for_date_trims_dark_hours() {
    let store = Store::open_in_memory().unwrap();
    let dawn = datetime!(2024-06-01 04:00:00 UTC);
    for (hour, kwh) in [0.0, 0.0, 2.0, 5.0, 0.0].into_iter().enumerate() {
        store
            .insert(&sample(dawn + Duration::hours(hour as i64), kwh))
            .unwrap();
    }
    // A producing sample on another date must not leak in.
    store
        .insert(&sample(datetime!(2024-06-02 12:00:00 UTC), 9.0))
        .unwrap();

    let day = store.samples_for_date(date!(2024-06-01)).unwrap();
    let energies: Vec<f32> = day.iter().map(|s| s.energy_today).collect();
    assert_eq!(energies, vec![2.0, 5.0]);
    assert_eq!(day[0].timestamp, dawn + Duration::hours(2));
}

#[test]
fn test_samples_for_dark_or_missing_date_is_empty() {
    let store = Store::open_in_memory().unwrap();
    let midnight = datetime!(2024-12-21 00:00:00 UTC);
    for hour in 0..3 {
        store
            .insert(&sample(midnight + Duration::hours(hour), 0.0))
            .unwrap();
    }

    assert!(store.samples_for_date(date!(2024-12-21)).unwrap().is_empty());
    assert!(store.samples_for_date(date!(2024-12-22)).unwrap().is_empty());
}

#[test]
fn test_insert_then_latest() {
    let store = Store::open_in_memory().unwrap();
    assert!(matches!(store.latest_sample(), Err(Error::NotFound(_))));

    let first = sample(datetime!(2024-05-05 10:00:00 UTC), 2.0);
    store.insert(&first).unwrap();
    assert_eq!(store.latest_sample().unwrap(), first);

    let second = sample(datetime!(2024-05-05 10:01:00 UTC), 2.1);
    store.insert(&second).unwrap();
    assert_eq!(store.latest_sample().unwrap(), second);
}

#[test]
fn test_latest_uses_measurement_time_not_insert_order() {
    let store = Store::open_in_memory().unwrap();
    let newer = sample(datetime!(2024-05-06 10:00:00 UTC), 2.0);
    let older = sample(datetime!(2024-05-05 10:00:00 UTC), 1.0);
    store.insert(&newer).unwrap();
    store.insert(&older).unwrap();
    assert_eq!(store.latest_sample().unwrap(), newer);
}
