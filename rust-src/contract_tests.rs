//! Behaviour every storage backend must share.
//!
//! Each check runs once against SQLite and once against the JSON document
//! backend, with a fixed local clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use tempfile::TempDir;

use crate::aggregation::Analytics;
use crate::clock::testing::FixedClock;
use crate::clock::Clock;
use crate::counter::{increment_log, CounterError, CounterStore};
use crate::models::{Amount, DailyCounter, DateKey};
use crate::storage::{
    DocumentBackend, FileKeyValueStore, MemoryKeyValueStore, SqliteBackend, StorageBackend,
    StorageError, StorageExt,
};


struct Harness {
    clock: Arc<FixedClock>,
    store: CounterStore,
    analytics: Analytics,
}


impl Harness {
    fn new(backend: Arc<dyn StorageBackend>, date: NaiveDate, hour: u32) -> Self {
        let clock = Arc::new(FixedClock::at(date, hour, 30));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let store = CounterStore::new(Arc::clone(&backend), Arc::clone(&dyn_clock));
        let analytics = Analytics::new(backend, dyn_clock);
        Self {
            clock,
            store,
            analytics,
        }
    }

    fn today(&self) -> DateKey {
        self.clock.today()
    }
}


fn sqlite() -> Arc<dyn StorageBackend> {
    Arc::new(SqliteBackend::open_in_memory().unwrap())
}


fn document() -> Arc<dyn StorageBackend> {
    Arc::new(DocumentBackend::open(Box::new(MemoryKeyValueStore::new()), "counters_storage_v1").unwrap())
}


fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}


fn check_sum_matches_log(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(10), 8);
    h.store.initialize().unwrap();

    for (hour, amount) in [(8, 1u64), (9, 4), (9, 2), (17, 10), (23, 3)] {
        h.clock.set(day(10), hour, 15);
        h.store.increment_today(amount).unwrap();
    }

    let count = h.store.today().unwrap().count;
    let logged: u64 = h
        .analytics
        .events_for(h.today())
        .unwrap()
        .iter()
        .map(|e| e.amount)
        .sum();
    let trend: u64 = h.analytics.hourly_trend(h.today()).unwrap().iter().map(|b| b.count).sum();

    assert_eq!(count, 20);
    assert_eq!(logged, 20);
    assert_eq!(trend, 20);
}


fn check_invalid_amounts(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(10), 8);
    h.store.initialize().unwrap();

    assert!(matches!(h.store.increment_today(0_i32), Err(CounterError::InvalidAmount(_))));
    assert!(matches!(h.store.increment_today(-1_i64), Err(CounterError::InvalidAmount(_))));
    assert!(matches!(h.store.increment_today(1.5_f64), Err(CounterError::InvalidAmount(_))));
    assert!(matches!(h.store.increment_today("abc"), Err(CounterError::InvalidAmount(_))));

    // nothing reached storage
    assert_eq!(h.store.today().unwrap().count, 0);
    assert!(h.analytics.events_for(h.today()).unwrap().is_empty());

    let total = h.store.increment_today(1_i32).unwrap();
    assert_eq!(total, DailyCounter { date: h.today(), count: 1 });
}


fn check_daily_totals_sorted(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(12), 9);
    h.store.initialize().unwrap();
    h.store.increment_today(2u64).unwrap();

    h.clock.set(day(3), 9, 0);
    h.store.increment_today(5u64).unwrap();
    h.store.initialize().unwrap();

    h.clock.set(day(7), 20, 0);
    h.store.increment_today(1u64).unwrap();
    h.store.increment_today(1u64).unwrap();

    let totals = h.analytics.daily_totals().unwrap();
    let dates: Vec<String> = totals.iter().map(|t| t.date.to_string()).collect();
    assert_eq!(dates, vec!["2025-03-03", "2025-03-07", "2025-03-12"]);
    assert_eq!(totals.iter().map(|t| t.count).collect::<Vec<_>>(), vec![5, 2, 2]);

    let mut sorted = dates.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, dates);
}


fn check_hourly_trend_shape(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(10), 0);
    h.store.initialize().unwrap();

    let (date, empty) = h.analytics.hourly_trend_today().unwrap();
    assert_eq!(date, h.today());
    assert_eq!(empty.len(), 24);
    assert!(empty.iter().all(|b| b.count == 0));

    for hour in [0, 6, 6, 23] {
        h.clock.set(day(10), hour, 45);
        h.store.increment_today(3u64).unwrap();
    }

    let (_, trend) = h.analytics.hourly_trend_today().unwrap();
    assert_eq!(trend.len(), 24);
    assert!(trend.iter().enumerate().all(|(i, b)| usize::from(b.hour) == i));
    assert_eq!(trend[0].count, 3);
    assert_eq!(trend[6].count, 6);
    assert_eq!(trend[23].count, 3);

    let sum: u64 = trend.iter().map(|b| b.count).sum();
    assert_eq!(sum, h.store.count_for(h.today()).unwrap().unwrap());
}


fn check_initialize_idempotent(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(10), 8);
    h.store.initialize().unwrap();
    h.store.increment_today(4u64).unwrap();

    h.store.initialize().unwrap();
    h.store.initialize().unwrap();

    assert_eq!(h.analytics.daily_totals().unwrap(), vec![DailyCounter { date: h.today(), count: 4 }]);
}


fn check_scenario_a(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(10), 8);
    h.store.initialize().unwrap();
    h.store.increment_today(1u64).unwrap();
    let total = h.store.increment_today(2u64).unwrap();

    assert_eq!(total.count, 3);
    assert_eq!(h.analytics.daily_totals().unwrap(), vec![DailyCounter { date: h.today(), count: 3 }]);
}


fn check_scenario_b(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(10), 14);
    h.store.initialize().unwrap();
    h.store.increment_today(5u64).unwrap();

    let trend = h.analytics.hourly_trend(h.today()).unwrap();
    for bucket in &trend {
        let expected = if bucket.hour == 14 { 5 } else { 0 };
        assert_eq!(bucket.count, expected, "hour {}", bucket.hour);
    }
}


fn check_scenario_c(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(10), 8);
    h.store.initialize().unwrap();
    h.store.increment_today(Amount::new(7).unwrap()).unwrap();
    let events_before = h.analytics.events_for(h.today()).unwrap();

    let reset = h.store.reset_today().unwrap();

    assert_eq!(reset, DailyCounter { date: h.today(), count: 0 });
    assert_eq!(h.analytics.daily_totals().unwrap(), vec![DailyCounter::zero(h.today())]);
    assert_eq!(h.analytics.events_for(h.today()).unwrap(), events_before);
    // the trend still reflects the logged increment
    let trend: u64 = h.analytics.hourly_trend_today().unwrap().1.iter().map(|b| b.count).sum();
    assert_eq!(trend, 7);
}


fn check_reset_untouched_day(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(10), 8);
    let reset = h.store.reset_today().unwrap();
    assert_eq!(reset.count, 0);
    assert_eq!(h.store.count_for(h.today()).unwrap(), Some(0));
}


fn check_missing_row_reads_zero(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(10), 8);
    h.store.initialize().unwrap();

    h.clock.set(day(11), 0, 5);
    assert_eq!(h.store.count_for(h.today()).unwrap(), None);
    assert_eq!(h.store.today().unwrap(), DailyCounter::zero(h.today()));

    // first increment of a day nobody seeded
    let total = h.store.increment_today(2u64).unwrap();
    assert_eq!(total.count, 2);
}


fn check_last_days(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(backend, day(1), 8);
    for d in 1..=10 {
        h.clock.set(day(d), 8, 0);
        h.store.increment_today(u64::from(d)).unwrap();
    }

    let last = h.analytics.last_days(3).unwrap();
    assert_eq!(last.iter().map(|t| t.count).collect::<Vec<_>>(), vec![8, 9, 10]);
    assert_eq!(h.analytics.last_days(50).unwrap().len(), 10);
    assert!(h.analytics.last_days(0).unwrap().is_empty());
}


fn check_closed_backend(backend: Arc<dyn StorageBackend>) {
    let h = Harness::new(Arc::clone(&backend), day(10), 8);
    h.store.initialize().unwrap();
    backend.close().unwrap();
    backend.close().unwrap();

    assert!(matches!(
        h.store.increment_today(1u64),
        Err(CounterError::Storage(StorageError::Closed))
    ));
    assert!(matches!(h.analytics.daily_totals(), Err(StorageError::Closed)));
}


fn check_concurrent_increments(backend: Arc<dyn StorageBackend>) {
    const WRITERS: u64 = 8;
    const PER_WRITER: u64 = 50;

    let h = Harness::new(Arc::clone(&backend), day(10), 8);
    h.store.initialize().unwrap();
    let today = h.today();
    let writers_done = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                while !writers_done.load(Ordering::SeqCst) {
                    // counter and log must move together in every visible state
                    let (count, logged) = backend
                        .read(|r| {
                            let count = r.select_by_date(today)?.map_or(0, |row| row.count);
                            let logged: u64 = increment_log::hour_sums(r, today)?.iter().sum();
                            Ok((count, logged))
                        })
                        .unwrap();
                    assert_eq!(count, logged);
                    assert_eq!(h.analytics.hourly_trend(today).unwrap().len(), 24);
                }
            });
        }

        let writers: Vec<_> = (0..WRITERS)
            .map(|_| {
                s.spawn(|| {
                    for _ in 0..PER_WRITER {
                        h.store.increment_today(1u64).unwrap();
                    }
                })
            })
            .collect();
        let joined: Vec<_> = writers.into_iter().map(|w| w.join()).collect();
        writers_done.store(true, Ordering::SeqCst);
        assert!(joined.iter().all(Result::is_ok), "a writer panicked");
    });

    let expected = WRITERS * PER_WRITER;
    let events = h.analytics.events_for(today).unwrap();
    let trend: u64 = h.analytics.hourly_trend(today).unwrap().iter().map(|b| b.count).sum();
    assert_eq!(h.store.today().unwrap().count, expected);
    assert_eq!(events.iter().map(|e| e.amount).sum::<u64>(), expected);
    assert_eq!(events.len() as u64, expected);
    assert_eq!(trend, expected);
}


macro_rules! backend_contract {
    ($($name:ident => $check:ident),* $(,)?) => {
        mod sqlite_backend {
            use super::*;
            $(#[test] fn $name() { $check(sqlite()); })*
        }

        mod document_backend {
            use super::*;
            $(#[test] fn $name() { $check(document()); })*
        }
    };
}


backend_contract! {
    test_sum_matches_log => check_sum_matches_log,
    test_invalid_amounts_rejected => check_invalid_amounts,
    test_daily_totals_sorted_and_unique => check_daily_totals_sorted,
    test_hourly_trend_has_24_ordered_buckets => check_hourly_trend_shape,
    test_initialize_is_idempotent => check_initialize_idempotent,
    test_two_increments_sum_to_three => check_scenario_a,
    test_increment_lands_in_its_hour => check_scenario_b,
    test_reset_keeps_increment_log => check_scenario_c,
    test_reset_seeds_untouched_day => check_reset_untouched_day,
    test_unseeded_day_reads_zero => check_missing_row_reads_zero,
    test_last_days_keeps_most_recent => check_last_days,
    test_closed_backend_rejects_calls => check_closed_backend,
}


#[test]
fn test_backends_produce_identical_views() {
    let run = |backend: Arc<dyn StorageBackend>| {
        let h = Harness::new(backend, day(4), 7);
        h.store.initialize().unwrap();
        for (d, hour, amount) in [(4, 7, 1u64), (4, 7, 2), (4, 19, 6), (5, 0, 9), (6, 12, 4)] {
            h.clock.set(day(d), hour, 10);
            h.store.increment_today(amount).unwrap();
        }
        h.clock.set(day(6), 13, 0);
        h.store.reset_today().unwrap();

        let totals = serde_json::to_string(&h.analytics.daily_totals().unwrap()).unwrap();
        let trends: Vec<String> = [4, 5, 6]
            .iter()
            .map(|d| {
                let date = DateKey::from_date(day(*d));
                serde_json::to_string(&h.analytics.hourly_trend(date).unwrap()).unwrap()
            })
            .collect();
        (totals, trends)
    };

    let (sqlite_totals, sqlite_trends) = run(sqlite());
    let (document_totals, document_trends) = run(document());

    assert_eq!(sqlite_totals, document_totals);
    assert_eq!(sqlite_trends, document_trends);
    assert_eq!(
        sqlite_totals,
        r#"[{"date":"2025-03-04","count":9},{"date":"2025-03-05","count":9},{"date":"2025-03-06","count":0}]"#
    );
}


#[test]
fn test_concurrent_increments_sqlite_file() {
    let tmp_dir = TempDir::new().unwrap();
    let backend = SqliteBackend::open(&tmp_dir.path().join("counter.db")).unwrap();
    check_concurrent_increments(Arc::new(backend));
}


#[test]
fn test_concurrent_increments_document_file() {
    let tmp_dir = TempDir::new().unwrap();
    let store = FileKeyValueStore::new(tmp_dir.path());
    let backend = DocumentBackend::open(Box::new(store), "counters_storage_v1").unwrap();
    check_concurrent_increments(Arc::new(backend));
}
