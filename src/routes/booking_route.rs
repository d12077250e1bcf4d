use crate::kernel::ids::BookingId;
use crate::models::booking::{BookFlightCommand, BookFlightResponse, BookingSummary, CancelBookingRequest};
use crate::services::booking_service::BookingService;
use crate::utils::error::AppError;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use uuid::Uuid;

/// `POST /bookings`, the saga's forward path, per spec.md §4.G/§6.
#[openapi(tag = "Bookings")]
#[post("/bookings", data = "<command>")]
pub async fn book_flight(
    command: Json<BookFlightCommand>,
    booking_service: &State<BookingService>,
) -> Result<Json<BookFlightResponse>, AppError> {
    let response = booking_service.book_flight(command.into_inner()).await?;
    Ok(Json(response))
}

/// `POST /bookings/:id/confirm`, per spec.md §6.
#[openapi(tag = "Bookings")]
#[post("/bookings/<id>/confirm")]
pub async fn confirm_booking(
    id: Uuid,
    booking_service: &State<BookingService>,
) -> Result<Json<BookingSummary>, AppError> {
    let summary = booking_service.confirm_booking(BookingId::from_uuid(id)).await?;
    Ok(Json(summary))
}

/// `POST /bookings/:id/cancel`, per spec.md §6.
#[openapi(tag = "Bookings")]
#[post("/bookings/<id>/cancel", data = "<request>")]
pub async fn cancel_booking(
    id: Uuid,
    request: Json<CancelBookingRequest>,
    booking_service: &State<BookingService>,
) -> Result<Json<BookingSummary>, AppError> {
    let summary = booking_service.cancel_booking(BookingId::from_uuid(id), request.into_inner().reason).await?;
    Ok(Json(summary))
}
