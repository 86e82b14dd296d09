//! Redis-backed ledger against a live server
//!
//! Skipped unless REDIS_TEST_URL is set, e.g.
//! `REDIS_TEST_URL=redis://127.0.0.1:6379/15 cargo test --test redis_ledger_test`

use chrono::{DateTime, Duration};
use pretty_assertions::assert_eq;
use std::sync::Arc;

use icolor::storage::{ManualClock, RedisLedgerStore, SubscriptionLedger};

fn redis_ledger() -> Option<(SubscriptionLedger, Arc<ManualClock>)> {
    let url = std::env::var("REDIS_TEST_URL").ok().filter(|v| !v.is_empty())?;
    let store = RedisLedgerStore::open(&url).unwrap();
    let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap()));
    Some((SubscriptionLedger::new(Arc::new(store), clock.clone()), clock))
}

/// A user id unlikely to collide between runs
fn fresh_user() -> i64 {
    1_000_000_000 + (rand::random::<u32>() as i64)
}

#[tokio::test]
async fn test_grant_extend_and_lapse() {
    let Some((ledger, clock)) = redis_ledger() else {
        eprintln!("REDIS_TEST_URL not set, skipping");
        return;
    };
    let user = fresh_user();

    assert!(!ledger.is_active(user).await.unwrap());

    let first = ledger.grant(user, 30).await.unwrap();
    assert_eq!(first.expires_at, ledger.now() + Duration::days(30));

    let second = ledger.grant(user, 30).await.unwrap();
    assert_eq!(second.expires_at, first.expires_at + Duration::days(30));

    clock.advance(Duration::days(61));
    assert!(!ledger.is_active(user).await.unwrap());
}

#[tokio::test]
async fn test_event_dedup_survives_in_redis() {
    let Some((ledger, _)) = redis_ledger() else {
        eprintln!("REDIS_TEST_URL not set, skipping");
        return;
    };
    let user = fresh_user();
    let event = format!("evt-{}", user);

    let first = ledger.grant_for_event(user, 30, &event).await.unwrap();
    let again = ledger.grant_for_event(user, 30, &event).await.unwrap();

    assert!(first.applied);
    assert!(!again.applied);
    assert_eq!(first.record, again.record);
}

#[tokio::test]
async fn test_concurrent_grants_are_atomic() {
    let Some((ledger, _)) = redis_ledger() else {
        eprintln!("REDIS_TEST_URL not set, skipping");
        return;
    };
    let user = fresh_user();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.grant(user, 1).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let record = ledger.record(user).await.unwrap().unwrap();
    assert_eq!(record.expires_at, ledger.now() + Duration::days(10));
}
