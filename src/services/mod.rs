pub mod booking_service;
pub mod inventory_service;
pub mod query_service;
pub mod user_service;
