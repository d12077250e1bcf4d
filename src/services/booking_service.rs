use crate::gateways::payment::{CheckoutCustomer, CreateCheckoutRequest, PaymentGateway};
use crate::kernel::booking::{Booking, BookingSegment, BookingStatus, Passenger, Ticket};
use crate::kernel::ids::{BookingId, FlightId};
use crate::kernel::value_objects::CabinClass;
use crate::models::booking::{BookFlightCommand, BookFlightResponse, BookingSummary};
use crate::repositories::booking_repo::BookingRepository;
use crate::services::inventory_service::InventoryService;
use crate::utils::error::{AppError, AppResult};
use chrono::Utc;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// One itinerary leg that was successfully held, kept around purely so
/// compensation can release it if a later step fails.
struct HeldSegment {
    flight_id: FlightId,
    cabin: CabinClass,
    seats: i32,
}

#[derive(Clone)]
pub struct BookingService {
    pool: MySqlPool,
    repo: BookingRepository,
    inventory: InventoryService,
    payment_gateway: Arc<dyn PaymentGateway>,
    hold_ttl_minutes: i64,
}

impl BookingService {
    pub fn new(
        pool: MySqlPool,
        inventory: InventoryService,
        payment_gateway: Arc<dyn PaymentGateway>,
        hold_ttl_minutes: i64,
    ) -> Self {
        let repo = BookingRepository::new(pool.clone());
        BookingService { pool, repo, inventory, payment_gateway, hold_ttl_minutes }
    }

    /// `bookFlight`, the saga's forward path (spec.md §4.G), wrapped in a
    /// 30s timeout per spec.md §5.
    pub async fn book_flight(&self, command: BookFlightCommand) -> AppResult<BookFlightResponse> {
        match tokio::time::timeout(Duration::from_secs(30), self.book_flight_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::RequestTimeout("bookFlight exceeded 30s".into())),
        }
    }

    async fn book_flight_inner(&self, command: BookFlightCommand) -> AppResult<BookFlightResponse> {
        let now = Utc::now();
        let flight_ids = command.parsed_segment_flight_ids()?;
        let seats_per_segment = command.passengers.len() as i32;
        if seats_per_segment == 0 {
            return Err(AppError::ValidationError("a booking needs at least one passenger".into()));
        }

        let mut held: Vec<HeldSegment> = Vec::with_capacity(flight_ids.len());
        let mut booking_segments: Vec<BookingSegment> = Vec::with_capacity(flight_ids.len());

        for (flight_id, input) in flight_ids.iter().zip(command.segments.iter()) {
            let cabin = input.cabin;
            match self.inventory.hold_seats(flight_id, cabin, seats_per_segment).await {
                Ok(hold) => {
                    held.push(HeldSegment { flight_id: flight_id.clone(), cabin, seats: seats_per_segment });
                    booking_segments.push(BookingSegment {
                        id: crate::kernel::ids::SegmentId::new(),
                        flight_id: flight_id.to_string(),
                        cabin,
                        price: hold.total_price,
                        seat_number: None,
                    });
                }
                Err(e) => {
                    self.compensate(None, &held).await;
                    return Err(e);
                }
            }
        }

        let passengers: Result<Vec<Passenger>, AppError> = command
            .passengers
            .iter()
            .map(|p| {
                Passenger::new(
                    p.first_name.clone(),
                    p.last_name.clone(),
                    p.email.clone(),
                    p.date_of_birth,
                    p.gender,
                    p.passenger_type,
                    now,
                )
            })
            .collect();
        let passengers = match passengers {
            Ok(p) => p,
            Err(e) => {
                self.compensate(None, &held).await;
                return Err(e);
            }
        };

        let (booking, events) = match Booking::create(passengers, booking_segments, self.hold_ttl_minutes, now) {
            Ok(result) => result,
            Err(e) => {
                self.compensate(None, &held).await;
                return Err(e);
            }
        };

        if let Err(e) = self.repo.insert(&booking, &events).await {
            self.compensate(None, &held).await;
            return Err(e);
        }

        let primary_email = command
            .passengers
            .first()
            .map(|p| p.email.clone())
            .unwrap_or_default();
        let checkout_request = CreateCheckoutRequest {
            booking_id: booking.id,
            amount: match booking.total_price() {
                Ok(total) => total,
                Err(e) => {
                    self.compensate(Some(booking.id), &held).await;
                    return Err(e);
                }
            },
            customer: CheckoutCustomer { email: primary_email },
            success_url: command.success_url,
            cancel_url: command.cancel_url,
        };

        match self.payment_gateway.create_checkout(checkout_request).await {
            Ok(session) => Ok(BookFlightResponse {
                booking: BookingSummary::from(&booking),
                checkout_url: Some(session.checkout_url),
                checkout_id: Some(session.id),
            }),
            Err(e) => {
                self.compensate(Some(booking.id), &held).await;
                Err(e)
            }
        }
    }

    /// Cancels the persisted booking (if any) in a fresh UoW and
    /// best-effort-releases every held segment, per spec.md §4.G.
    /// Failures here are logged, never propagated: the caller's original
    /// error is what the saga surfaces.
    ///
    /// `cancel_booking` already releases every segment's seats once it
    /// manages to cancel the aggregate, so the held-segment loop below only
    /// runs when there's no persisted booking to cancel, or cancelling it
    /// failed before it got to releasing anything — otherwise every seat
    /// would be released twice, tripping `InventoryOvercapacity` on the
    /// second attempt.
    async fn compensate(&self, booking_id: Option<BookingId>, held: &[HeldSegment]) {
        let released_by_cancel = match booking_id {
            Some(id) => match self.cancel_booking(id, "compensation: saga step failed".into()).await {
                Ok(_) => true,
                Err(e) => {
                    error!(booking_id = %id, error = %e, "compensation: failed to cancel booking");
                    false
                }
            },
            None => false,
        };

        if released_by_cancel {
            return;
        }

        for segment in held {
            if let Err(e) = self.inventory.release_seats(&segment.flight_id, segment.cabin, segment.seats).await {
                error!(
                    flight_id = %segment.flight_id,
                    cabin = %segment.cabin,
                    error = %e,
                    "compensation: failed to release held seats"
                );
            }
        }
    }

    /// `confirmBooking`, called from the webhook on `checkout.updated` /
    /// `status=succeeded` (spec.md §4.G, §9 open question).
    pub async fn confirm_booking(&self, id: BookingId) -> AppResult<BookingSummary> {
        let booking = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(id.to_string()))?;

        if booking.status == BookingStatus::Ticketed {
            return Ok(BookingSummary::from(&booking));
        }

        let now = Utc::now();
        let (confirmed, confirm_events) = booking.confirm(now)?;
        let confirmed = self.repo.save(&confirmed, &confirm_events).await?;

        let primary_passenger = confirmed
            .passengers
            .first()
            .ok_or_else(|| AppError::ValidationError("booking has no passengers".into()))?;
        let ticket = Ticket::issue(
            confirmed.pnr_code.clone(),
            primary_passenger.id,
            primary_passenger.full_name(),
            &confirmed.segments,
            now,
        )?;

        let (ticketed, ticket_events) = confirmed.mark_ticketed(ticket.ticket_number.clone())?;
        let ticketed = self.repo.save(&ticketed, &ticket_events).await?;
        self.repo.save_ticket(&ticket).await?;

        info!(booking_id = %id, ticket_number = %ticket.ticket_number, "booking ticketed");
        Ok(BookingSummary::from(&ticketed))
    }

    /// `cancelBooking(id, reason)`: cancels the aggregate, then releases
    /// every segment's held seats.
    pub async fn cancel_booking(&self, id: BookingId, reason: String) -> AppResult<BookingSummary> {
        let booking = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(id.to_string()))?;

        let (cancelled, events) = booking.cancel(reason)?;
        let cancelled = self.repo.save(&cancelled, &events).await?;
        let seats_per_segment = cancelled.passengers.len() as i32;

        for segment in &cancelled.segments {
            let flight_id = FlightId::parse(&segment.flight_id)?;
            if let Err(e) = self.inventory.release_seats(&flight_id, segment.cabin, seats_per_segment).await {
                warn!(booking_id = %id, flight_id = %segment.flight_id, error = %e, "failed to release segment on cancel");
            }
        }

        Ok(BookingSummary::from(&cancelled))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub fn repo(&self) -> &BookingRepository {
        &self.repo
    }
}
