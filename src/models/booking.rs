use crate::kernel::booking::Booking;
use crate::kernel::ids::FlightId;
use crate::kernel::money::Money;
use crate::kernel::value_objects::{CabinClass, Gender, PassengerType};
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PassengerInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub passenger_type: PassengerType,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SegmentInput {
    pub flight_id: String,
    pub cabin: CabinClass,
}

/// `BookFlightCommand`, per spec.md §6 `POST /bookings`. One segment input
/// is one itinerary leg; seats held per leg equal `passengers.len()`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BookFlightCommand {
    pub passengers: Vec<PassengerInput>,
    pub segments: Vec<SegmentInput>,
    pub success_url: String,
    pub cancel_url: Option<String>,
}

impl BookFlightCommand {
    pub fn parsed_segment_flight_ids(&self) -> Result<Vec<FlightId>, crate::utils::error::AppError> {
        self.segments.iter().map(|s| FlightId::parse(&s.flight_id)).collect()
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CancelBookingRequest {
    pub reason: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BookFlightResponse {
    pub booking: BookingSummary,
    pub checkout_url: Option<String>,
    pub checkout_id: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BookingSummary {
    pub id: String,
    pub pnr_code: String,
    pub status: String,
    pub passenger_names: Vec<String>,
    pub segment_flight_ids: Vec<String>,
    pub total_price: Option<Money>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Booking> for BookingSummary {
    fn from(booking: &Booking) -> Self {
        BookingSummary {
            id: booking.id.to_string(),
            pnr_code: booking.pnr_code.as_str().to_string(),
            status: booking.status.to_string(),
            passenger_names: booking.passengers.iter().map(|p| p.full_name()).collect(),
            segment_flight_ids: booking.segments.iter().map(|s| s.flight_id.clone()).collect(),
            total_price: booking.total_price().ok(),
            expires_at: booking.expires_at,
            created_at: booking.created_at,
        }
    }
}

impl From<Booking> for BookingSummary {
    fn from(booking: Booking) -> Self {
        BookingSummary::from(&booking)
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PassengerBookingHistory {
    pub booking: BookingSummary,
    pub is_past: bool,
}
