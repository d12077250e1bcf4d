use crate::kernel::booking::BookingStatus;
use crate::kernel::ids::{BookingId, PassengerId, PnrCode};
use crate::models::booking::{BookingSummary, PassengerBookingHistory};
use crate::repositories::booking_repo::BookingRepository;
use crate::utils::error::{AppError, AppResult};
use chrono::Utc;
use sqlx::MySqlPool;

const SEARCH_LIMIT_MAX: i64 = 100;

/// Read-only booking queries, per spec.md §6 and [MODULE J]: no mutation, no
/// domain events. Generalizes the teacher's `TicketService::get_history` (by
/// passenger rather than by user account) and `FlightService::search_flights`
/// (substring name search rather than route/date search).
#[derive(Clone)]
pub struct QueryService {
    repo: BookingRepository,
}

impl QueryService {
    pub fn new(pool: MySqlPool) -> Self {
        QueryService { repo: BookingRepository::new(pool) }
    }

    pub async fn list_all(&self) -> AppResult<Vec<BookingSummary>> {
        let bookings = self.repo.find_all().await?;
        Ok(bookings.iter().map(BookingSummary::from).collect())
    }

    pub async fn get_by_id(&self, id: BookingId) -> AppResult<BookingSummary> {
        let booking = self.repo.find_by_id(id).await?.ok_or_else(|| AppError::BookingNotFound(id.to_string()))?;
        Ok(BookingSummary::from(&booking))
    }

    pub async fn get_by_pnr(&self, pnr: &str) -> AppResult<BookingSummary> {
        let pnr = PnrCode::parse(pnr)?;
        let booking = self
            .repo
            .find_by_pnr(&pnr)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(pnr.as_str().to_string()))?;
        Ok(BookingSummary::from(&booking))
    }

    /// Every booking a passenger travels on, annotated with whether it's
    /// already in the past (all segments' booking is terminal and not Held).
    pub async fn get_passenger_history(&self, passenger_id: PassengerId) -> AppResult<Vec<PassengerBookingHistory>> {
        let bookings = self.repo.find_by_passenger_id(passenger_id).await?;
        let now = Utc::now();
        Ok(bookings
            .iter()
            .map(|b| {
                let is_past = matches!(b.status, BookingStatus::Cancelled | BookingStatus::Expired)
                    || (b.status == BookingStatus::Ticketed && b.expires_at.map(|e| e < now).unwrap_or(true));
                PassengerBookingHistory { booking: BookingSummary::from(b), is_past }
            })
            .collect())
    }

    pub async fn search_by_name(&self, name: &str, limit: Option<i64>) -> AppResult<Vec<BookingSummary>> {
        if name.trim().is_empty() {
            return Err(AppError::ValidationError("search name must not be empty".into()));
        }
        let limit = limit.unwrap_or(SEARCH_LIMIT_MAX).clamp(1, SEARCH_LIMIT_MAX);
        let bookings = self.repo.search_by_passenger_name(name, limit).await?;
        Ok(bookings.iter().map(BookingSummary::from).collect())
    }
}
