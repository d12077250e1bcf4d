use crate::kernel::ids::PassengerId;
use crate::models::booking::{BookingSummary, PassengerBookingHistory};
use crate::services::query_service::QueryService;
use crate::utils::error::AppError;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use uuid::Uuid;

/// `GET /bookings`, per spec.md §6.
#[openapi(tag = "Bookings")]
#[get("/bookings")]
pub async fn list_bookings(query_service: &State<QueryService>) -> Result<Json<Vec<BookingSummary>>, AppError> {
    let bookings = query_service.list_all().await?;
    Ok(Json(bookings))
}

/// `GET /bookings/pnr/:pnr`, per spec.md §6.
#[openapi(tag = "Bookings")]
#[get("/bookings/pnr/<pnr>")]
pub async fn get_by_pnr(pnr: String, query_service: &State<QueryService>) -> Result<Json<BookingSummary>, AppError> {
    let summary = query_service.get_by_pnr(&pnr).await?;
    Ok(Json(summary))
}

/// `GET /bookings/passenger/:id`, per spec.md §6.
#[openapi(tag = "Bookings")]
#[get("/bookings/passenger/<id>")]
pub async fn get_passenger_history(
    id: Uuid,
    query_service: &State<QueryService>,
) -> Result<Json<Vec<PassengerBookingHistory>>, AppError> {
    let history = query_service.get_passenger_history(PassengerId::from_uuid(id)).await?;
    Ok(Json(history))
}

/// `GET /bookings/search?name&limit`, per spec.md §6.
#[openapi(tag = "Bookings")]
#[get("/bookings/search?<name>&<limit>")]
pub async fn search_bookings(
    name: String,
    limit: Option<i64>,
    query_service: &State<QueryService>,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    let bookings = query_service.search_by_name(&name, limit).await?;
    Ok(Json(bookings))
}
