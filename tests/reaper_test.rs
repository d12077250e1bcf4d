use airline_reservation_core::{
    kernel::booking::{Booking, BookingSegment, BookingStatus, Passenger},
    kernel::ids::{FlightId, SegmentId},
    kernel::inventory::{FlightInventory, SeatBucket},
    kernel::money::{Currency, Money},
    kernel::value_objects::{CabinClass, Gender, PassengerType},
    reaper::Reaper,
    repositories::booking_repo::BookingRepository,
    services::inventory_service::InventoryService,
};
use chrono::{NaiveDate, Utc};
use ctor::dtor;
use sqlx::mysql::MySqlPool as Pool;
use std::collections::HashMap;
use std::time::Duration;
use test_context::{test_context, AsyncTestContext};
use async_trait::async_trait;
use tokio::sync::watch;

mod common {
    pub mod test_utils;
}
use common::test_utils::TestDb;

struct ReaperContext {
    pool: Pool,
    inventory: InventoryService,
    repo: BookingRepository,
}

#[dtor]
fn cleanup() {
    if let Err(e) = TestDb::cleanup_database_sync() {
        eprintln!("Failed to cleanup test database: {}", e);
    }
}

#[async_trait]
impl AsyncTestContext for ReaperContext {
    async fn setup() -> Self {
        let pool = TestDb::get_instance(file!()).await.expect("Failed to get test database instance");
        let inventory = InventoryService::new(pool.clone(), 15);
        let repo = BookingRepository::new(pool.clone());

        ReaperContext { pool, inventory, repo }
    }

    async fn teardown(self) {
        let _ = sqlx::query("SELECT 1").execute(&self.pool).await;
    }
}

fn passenger() -> Passenger {
    Passenger::new(
        "Grace".into(),
        "Hopper".into(),
        "grace@example.com".into(),
        NaiveDate::from_ymd_opt(1985, 1, 1).unwrap(),
        Gender::Female,
        PassengerType::Adult,
        Utc::now(),
    )
    .unwrap()
}

fn segment(flight_id: &str) -> BookingSegment {
    BookingSegment {
        id: SegmentId::new(),
        flight_id: flight_id.to_string(),
        cabin: CabinClass::Economy,
        price: Money::new(30_000, Currency::Eur),
        seat_number: None,
    }
}

/// A `Held` booking whose `hold_ttl_minutes` is already negative is lapsed
/// with respect to real wall-clock time as soon as it's created, so the
/// reaper picks it up on its first tick without needing to fast-forward a
/// clock.
#[test_context(ReaperContext)]
#[tokio::test]
async fn lapsed_hold_is_expired_and_seats_are_released(ctx: &ReaperContext) {
    let flight_id = FlightId::parse("REAP-FLIGHT").unwrap();
    let mut buckets = HashMap::new();
    buckets.insert(CabinClass::Economy, SeatBucket::new(9, 10, Money::new(30_000, Currency::Eur)).unwrap());
    let inventory_state = FlightInventory::new(flight_id.clone(), buckets);
    ctx.inventory.seed(&inventory_state).await.expect("seeding inventory should succeed");

    let (booking, events) =
        Booking::create(vec![passenger()], vec![segment("REAP-FLIGHT")], -1, Utc::now()).expect("booking must validate");
    assert_eq!(booking.status, BookingStatus::Held);
    ctx.repo.insert(&booking, &events).await.expect("inserting the held booking should succeed");

    let (_tx, rx) = watch::channel(false);
    let reaper = Reaper::new(ctx.pool.clone(), ctx.inventory.clone(), Duration::from_millis(50));
    let handle = reaper.spawn(rx);

    let mut expired = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Some(reloaded) = ctx.repo.find_by_id(booking.id).await.unwrap() {
            if reloaded.status == BookingStatus::Expired {
                expired = true;
                break;
            }
        }
    }
    handle.abort();

    assert!(expired, "reaper should have expired the lapsed hold within the polling window");

    let availability = ctx.inventory.get_availability(&flight_id).await.unwrap();
    assert_eq!(
        availability.buckets[&CabinClass::Economy].available, 10,
        "the reaper must release the seat it reclaimed from the expired hold"
    );
}

/// A booking that is still within its hold window must not be touched.
#[test_context(ReaperContext)]
#[tokio::test]
async fn unexpired_hold_is_left_alone(ctx: &ReaperContext) {
    let flight_id = FlightId::parse("UNEXPIRED-FLIGHT").unwrap();
    let mut buckets = HashMap::new();
    buckets.insert(CabinClass::Economy, SeatBucket::new(4, 5, Money::new(30_000, Currency::Eur)).unwrap());
    let inventory_state = FlightInventory::new(flight_id.clone(), buckets);
    ctx.inventory.seed(&inventory_state).await.expect("seeding inventory should succeed");

    let (booking, events) = Booking::create(vec![passenger()], vec![segment("UNEXPIRED-FLIGHT")], 15, Utc::now())
        .expect("booking must validate");
    ctx.repo.insert(&booking, &events).await.expect("inserting the held booking should succeed");

    let (_tx, rx) = watch::channel(false);
    let reaper = Reaper::new(ctx.pool.clone(), ctx.inventory.clone(), Duration::from_millis(50));
    let handle = reaper.spawn(rx);
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();

    let reloaded = ctx.repo.find_by_id(booking.id).await.unwrap().expect("booking must still exist");
    assert_eq!(reloaded.status, BookingStatus::Held);

    let availability = ctx.inventory.get_availability(&flight_id).await.unwrap();
    assert_eq!(availability.buckets[&CabinClass::Economy].available, 4);
}
