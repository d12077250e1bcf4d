#[macro_use]
extern crate rocket;
extern crate rocket_okapi;

pub mod config;
pub mod db;
pub mod gateways;
pub mod kernel;
pub mod models;
pub mod outbox;
pub mod reaper;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod swagger;
pub mod unit_of_work;
pub mod utils;

use crate::config::Config;
use crate::db::Database;
use crate::gateways::notification::{FakeNotificationGateway, HttpNotificationGateway, NotificationGateway};
use crate::gateways::payment::{FakePaymentGateway, PaymentGateway, PolarPaymentGateway};
use crate::outbox::consumers::{SeatReleaseConsumer, TicketNotificationConsumer};
use crate::outbox::publisher::OutboxPublisher;
use crate::reaper::Reaper;
use crate::repositories::booking_repo::BookingRepository;
use crate::services::booking_service::BookingService;
use crate::services::inventory_service::InventoryService;
use crate::services::query_service::QueryService;
use crate::services::user_service::UserService;
use crate::swagger::swagger_ui;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::*;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

fn build_payment_gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    match (&config.payment_api_base, &config.payment_api_key) {
        (Some(base), Some(key)) => Arc::new(PolarPaymentGateway::new(base.clone(), key.clone())),
        _ => {
            tracing::warn!("POLAR_API_BASE/POLAR_API_KEY not set, using in-process fake payment gateway");
            Arc::new(FakePaymentGateway::new())
        }
    }
}

fn build_notification_gateway(config: &Config) -> Arc<dyn NotificationGateway> {
    match (&config.notification_api_base, &config.notification_api_key) {
        (Some(base), Some(key)) => Arc::new(HttpNotificationGateway::new(base.clone(), key.clone())),
        _ => {
            tracing::warn!("NOTIFICATION_API_BASE/NOTIFICATION_API_KEY not set, using in-process fake notification gateway");
            Arc::new(FakeNotificationGateway::new())
        }
    }
}

/// Assembles the full Rocket instance: config, db pool, services, the
/// outbox publisher and reaper as background tasks coordinated through a
/// shutdown watch channel, and every mounted route. Split out of `main.rs`
/// so integration tests can build the same app the binary serves.
pub async fn build_rocket() -> Rocket<Build> {
    let config = Config::from_env();
    let db = Database::new(&config.database_url).await.expect("failed to connect to database");
    let pool = db.get_pool().clone();

    let hold_ttl_minutes = config.hold_ttl_minutes();
    let inventory_service = InventoryService::new(pool.clone(), hold_ttl_minutes);
    let booking_repo = Arc::new(BookingRepository::new(pool.clone()));
    let payment_gateway = build_payment_gateway(&config);
    let notification_gateway = build_notification_gateway(&config);

    let booking_service =
        BookingService::new(pool.clone(), inventory_service.clone(), payment_gateway, hold_ttl_minutes);
    let query_service = QueryService::new(pool.clone());
    let user_service = UserService::new(pool.clone());

    let mut publisher = OutboxPublisher::new(pool.clone(), &config);
    publisher.register(
        "BookingCancelled",
        Arc::new(SeatReleaseConsumer::new(booking_repo.clone(), inventory_service.clone())),
    );
    publisher.register(
        "BookingExpired",
        Arc::new(SeatReleaseConsumer::new(booking_repo.clone(), inventory_service.clone())),
    );
    publisher.register(
        "TicketIssued",
        Arc::new(TicketNotificationConsumer::new(booking_repo.clone(), notification_gateway)),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let publisher_handle = Arc::new(publisher).spawn(shutdown_rx.clone());
    let reaper_handle = Reaper::new(pool.clone(), inventory_service, config.reap_interval).spawn(shutdown_rx);
    let worker_handles: Vec<tokio::task::JoinHandle<()>> = vec![publisher_handle, reaper_handle];

    info!("reservation core starting up");

    rocket::build()
        .manage(config)
        .manage(pool)
        .manage(booking_service)
        .manage(query_service)
        .manage(user_service)
        .manage(shutdown_tx)
        .manage(worker_handles)
        .mount(
            "/api",
            openapi_get_routes![
                routes::user_route::register,
                routes::user_route::login,
                routes::booking_route::book_flight,
                routes::booking_route::confirm_booking,
                routes::booking_route::cancel_booking,
                routes::query_route::list_bookings,
                routes::query_route::get_by_pnr,
                routes::query_route::get_passenger_history,
                routes::query_route::search_bookings,
                routes::webhook_route::polar_webhook,
                routes::health_route::health,
            ],
        )
        .mount("/swagger", make_swagger_ui(&swagger_ui()))
        .attach(AdHoc::on_response("CORS", |_, res| {
            Box::pin(async move {
                res.set_header(rocket::http::Header::new("Access-Control-Allow-Origin", "*"));
            })
        }))
        .attach(AdHoc::on_shutdown("background workers", |rocket| {
            Box::pin(async move {
                info!("rocket shutting down, signalling background workers");
                if let Some(tx) = rocket.state::<watch::Sender<bool>>() {
                    let _ = tx.send(true);
                }
            })
        }))
}
