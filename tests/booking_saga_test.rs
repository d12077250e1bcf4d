use airline_reservation_core::{
    gateways::payment::FakePaymentGateway,
    kernel::ids::FlightId,
    kernel::inventory::{FlightInventory, SeatBucket},
    kernel::money::{Currency, Money},
    kernel::value_objects::{CabinClass, Gender, PassengerType},
    models::booking::{BookFlightCommand, PassengerInput, SegmentInput},
    services::booking_service::BookingService,
    services::inventory_service::InventoryService,
    utils::error::AppError,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use ctor::dtor;
use sqlx::mysql::MySqlPool as Pool;
use std::collections::HashMap;
use std::sync::Arc;
use test_context::{test_context, AsyncTestContext};

mod common {
    pub mod test_utils;
}
use common::test_utils::TestDb;

const HOLD_TTL_MINUTES: i64 = 15;

struct BookingSagaContext {
    pool: Pool,
    inventory: InventoryService,
    payment_gateway: Arc<FakePaymentGateway>,
    booking_service: BookingService,
}

#[dtor]
fn cleanup() {
    if let Err(e) = TestDb::cleanup_database_sync() {
        eprintln!("Failed to cleanup test database: {}", e);
    }
}

#[async_trait]
impl AsyncTestContext for BookingSagaContext {
    async fn setup() -> Self {
        let pool = TestDb::get_instance(file!()).await.expect("Failed to get test database instance");
        let inventory = InventoryService::new(pool.clone(), HOLD_TTL_MINUTES);
        let payment_gateway = Arc::new(FakePaymentGateway::new());
        let booking_service =
            BookingService::new(pool.clone(), inventory.clone(), payment_gateway.clone(), HOLD_TTL_MINUTES);

        BookingSagaContext { pool, inventory, payment_gateway, booking_service }
    }

    async fn teardown(self) {
        let _ = sqlx::query("SELECT 1").execute(&self.pool).await;
    }
}

fn bucket(seats: i32, amount_minor: i64) -> SeatBucket {
    SeatBucket::new(seats, seats, Money::new(amount_minor, Currency::Eur)).unwrap()
}

async fn seed_flight(inventory: &InventoryService, flight_id: &str, economy_seats: i32) {
    let mut buckets = HashMap::new();
    buckets.insert(CabinClass::Economy, bucket(economy_seats, 25_000));
    buckets.insert(CabinClass::Business, bucket(economy_seats, 60_000));
    buckets.insert(CabinClass::First, bucket(economy_seats, 120_000));
    let inv = FlightInventory::new(FlightId::parse(flight_id).unwrap(), buckets);
    inventory.seed(&inv).await.expect("seeding flight inventory should succeed");
}

fn one_passenger() -> PassengerInput {
    PassengerInput {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        gender: Gender::Female,
        passenger_type: PassengerType::Adult,
    }
}

fn book_command(flight_id: &str) -> BookFlightCommand {
    BookFlightCommand {
        passengers: vec![one_passenger()],
        segments: vec![SegmentInput { flight_id: flight_id.to_string(), cabin: CabinClass::Economy }],
        success_url: "https://example.com/success".into(),
        cancel_url: None,
    }
}

/// Scenario S3 (spec.md §8): holding seats, persisting the booking and
/// opening a checkout session all succeed together.
#[test_context(BookingSagaContext)]
#[tokio::test]
async fn happy_path_holds_seats_and_opens_checkout(ctx: &BookingSagaContext) {
    seed_flight(&ctx.inventory, "S3-FLIGHT", 10).await;

    let response = ctx.booking_service.book_flight(book_command("S3-FLIGHT")).await.expect("booking should succeed");

    assert_eq!(response.booking.status, "HELD");
    assert!(response.checkout_url.is_some());
    assert!(response.checkout_id.is_some());

    let availability = ctx.inventory.get_availability(&FlightId::parse("S3-FLIGHT").unwrap()).await.unwrap();
    assert_eq!(availability.buckets[&CabinClass::Economy].available, 9);
}

/// Scenario S4 (spec.md §8): the checkout step fails after seats are
/// already held and the booking already persisted; compensation must walk
/// both back.
#[test_context(BookingSagaContext)]
#[tokio::test]
async fn checkout_failure_compensates_by_releasing_held_seats(ctx: &BookingSagaContext) {
    seed_flight(&ctx.inventory, "S4-FLIGHT", 10).await;
    ctx.payment_gateway.fail_next_checkout_with(AppError::PaymentApiUnavailable("simulated outage".into()));

    let result = ctx.booking_service.book_flight(book_command("S4-FLIGHT")).await;
    assert!(result.is_err(), "checkout failure must surface as an error to the caller");

    let availability = ctx.inventory.get_availability(&FlightId::parse("S4-FLIGHT").unwrap()).await.unwrap();
    assert_eq!(
        availability.buckets[&CabinClass::Economy].available, 10,
        "compensation must release the seat held before the checkout step failed"
    );
}

/// A booking with no passengers is rejected before any seat is touched.
#[test_context(BookingSagaContext)]
#[tokio::test]
async fn empty_passenger_list_is_rejected_without_holding_seats(ctx: &BookingSagaContext) {
    seed_flight(&ctx.inventory, "EMPTY-FLIGHT", 5).await;

    let mut command = book_command("EMPTY-FLIGHT");
    command.passengers.clear();

    let result = ctx.booking_service.book_flight(command).await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));

    let availability = ctx.inventory.get_availability(&FlightId::parse("EMPTY-FLIGHT").unwrap()).await.unwrap();
    assert_eq!(availability.buckets[&CabinClass::Economy].available, 5);
}
