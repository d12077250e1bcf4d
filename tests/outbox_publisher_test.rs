use airline_reservation_core::{
    config::Config,
    kernel::booking::{Booking, BookingSegment},
    kernel::events::DomainEvent,
    kernel::ids::SegmentId,
    kernel::money::{Currency, Money},
    kernel::value_objects::{CabinClass, Gender, PassengerType},
    outbox::consumers::OutboxConsumer,
    outbox::publisher::OutboxPublisher,
    repositories::booking_repo::BookingRepository,
    utils::error::{AppError, AppResult},
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use ctor::dtor;
use sqlx::mysql::MySqlPool as Pool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_context::{test_context, AsyncTestContext};
use tokio::sync::watch;

mod common {
    pub mod test_utils;
}
use common::test_utils::TestDb;

struct OutboxContext {
    pool: Pool,
    repo: BookingRepository,
}

#[dtor]
fn cleanup() {
    if let Err(e) = TestDb::cleanup_database_sync() {
        eprintln!("Failed to cleanup test database: {}", e);
    }
}

#[async_trait]
impl AsyncTestContext for OutboxContext {
    async fn setup() -> Self {
        let pool = TestDb::get_instance(file!()).await.expect("Failed to get test database instance");
        let repo = BookingRepository::new(pool.clone());
        OutboxContext { pool, repo }
    }

    async fn teardown(self) {
        let _ = sqlx::query("SELECT 1").execute(&self.pool).await;
    }
}

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "test-secret".into(),
        webhook_secret: "test-webhook-secret".into(),
        cors_origins: None,
        hold_ttl: Duration::from_secs(900),
        outbox_poll: Duration::from_millis(50),
        outbox_batch: 10,
        outbox_max_retries: 2,
        outbox_retry_delays: vec![Duration::from_millis(10), Duration::from_millis(10)],
        reap_interval: Duration::from_secs(60),
        shutdown_grace: Duration::from_secs(5),
        health_timeout: Duration::from_secs(5),
        payment_api_base: None,
        payment_api_key: None,
        notification_api_base: None,
        notification_api_key: None,
    }
}

fn sample_booking() -> (Booking, Vec<DomainEvent>) {
    let passenger = airline_reservation_core::kernel::booking::Passenger::new(
        "Mary".into(),
        "Jackson".into(),
        "mary@example.com".into(),
        NaiveDate::from_ymd_opt(1988, 3, 2).unwrap(),
        Gender::Female,
        PassengerType::Adult,
        Utc::now(),
    )
    .unwrap();
    let segment = BookingSegment {
        id: SegmentId::new(),
        flight_id: "OUTBOX-FLIGHT".into(),
        cabin: CabinClass::Economy,
        price: Money::new(15_000, Currency::Eur),
        seat_number: None,
    };
    Booking::create(vec![passenger], vec![segment], 15, Utc::now()).expect("booking must validate")
}

async fn published_at(pool: &Pool, booking_id: &str) -> Option<chrono::DateTime<Utc>> {
    let row: Option<(Option<chrono::DateTime<Utc>>,)> =
        sqlx::query_as("SELECT published_at FROM event_outbox WHERE aggregate_id = ?")
            .bind(booking_id)
            .fetch_optional(pool)
            .await
            .unwrap();
    row.and_then(|(p,)| p)
}

async fn retry_count(pool: &Pool, booking_id: &str) -> i32 {
    let row: (i32,) = sqlx::query_as("SELECT retry_count FROM event_outbox WHERE aggregate_id = ?")
        .bind(booking_id)
        .fetch_one(pool)
        .await
        .unwrap();
    row.0
}

/// An event type with no registered consumer is marked published without
/// ever being dead-lettered: there's nothing downstream that needs it.
#[test_context(OutboxContext)]
#[tokio::test]
async fn event_with_no_consumer_is_acked_without_delivery(ctx: &OutboxContext) {
    let (booking, events) = sample_booking();
    ctx.repo.insert(&booking, &events).await.expect("inserting the booking should succeed");

    let publisher = Arc::new(OutboxPublisher::new(ctx.pool.clone(), &test_config()));
    let (_tx, rx) = watch::channel(false);
    let handle = publisher.spawn(rx);

    let mut acked = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if published_at(&ctx.pool, &booking.id.to_string()).await.is_some() {
            acked = true;
            break;
        }
    }
    handle.abort();

    assert!(acked, "an unclaimed event type should still be acknowledged");
}

struct AlwaysFailConsumer {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl OutboxConsumer for AlwaysFailConsumer {
    async fn handle(&self, _event: &DomainEvent) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::NotificationApiUnavailable("simulated failure".into()))
    }
}

/// A consumer that always fails drives `retry_count` up to `max_retries`,
/// at which point the claiming query's `retry_count < max_retries` filter
/// excludes the row and it's effectively dead-lettered.
#[test_context(OutboxContext)]
#[tokio::test]
async fn persistently_failing_consumer_is_dead_lettered_after_max_retries(ctx: &OutboxContext) {
    let (booking, events) = sample_booking();
    ctx.repo.insert(&booking, &events).await.expect("inserting the booking should succeed");

    let calls = Arc::new(AtomicUsize::new(0));
    let mut publisher = OutboxPublisher::new(ctx.pool.clone(), &test_config());
    publisher.register("BookingCreated", Arc::new(AlwaysFailConsumer { calls: calls.clone() }));
    let publisher = Arc::new(publisher);
    let (_tx, rx) = watch::channel(false);
    let handle = publisher.spawn(rx);

    let booking_id = booking.id.to_string();
    let mut dead_lettered = false;
    for _ in 0..60 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if retry_count(&ctx.pool, &booking_id).await >= 2 {
            dead_lettered = true;
            break;
        }
    }
    handle.abort();

    assert!(dead_lettered, "retry_count should reach max_retries once the consumer keeps failing");
    assert!(calls.load(Ordering::SeqCst) >= 2, "the consumer should be invoked once per attempt");
    assert!(published_at(&ctx.pool, &booking_id).await.is_none(), "a dead-lettered event must never be marked published");
}
