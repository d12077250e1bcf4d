pub mod booking_route;
pub mod health_route;
pub mod query_route;
pub mod user_route;
pub mod webhook_route;
