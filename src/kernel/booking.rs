use crate::kernel::events::{DomainEvent, EventEnvelope};
use crate::kernel::ids::{BookingId, PassengerId, PnrCode, SegmentId};
use crate::kernel::money::Money;
use crate::kernel::value_objects::{validate_date_of_birth, validate_email_lite, CabinClass, Gender, PassengerType};
use crate::utils::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use rocket_okapi::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum BookingStatus {
    #[sqlx(rename = "HELD")]
    #[strum(serialize = "HELD")]
    Held,
    #[sqlx(rename = "CONFIRMED")]
    #[strum(serialize = "CONFIRMED")]
    Confirmed,
    #[sqlx(rename = "TICKETED")]
    #[strum(serialize = "TICKETED")]
    Ticketed,
    #[sqlx(rename = "CANCELLED")]
    #[strum(serialize = "CANCELLED")]
    Cancelled,
    #[sqlx(rename = "EXPIRED")]
    #[strum(serialize = "EXPIRED")]
    Expired,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Expired)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Passenger {
    pub id: PassengerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub passenger_type: PassengerType,
}

impl Passenger {
    pub fn new(
        first_name: String,
        last_name: String,
        email: String,
        date_of_birth: NaiveDate,
        gender: Gender,
        passenger_type: PassengerType,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        validate_email_lite(&email)?;
        validate_date_of_birth(date_of_birth, now)?;
        if first_name.trim().is_empty() || last_name.trim().is_empty() {
            return Err(AppError::ValidationError("passenger name cannot be empty".into()));
        }
        Ok(Passenger {
            id: PassengerId::new(),
            first_name,
            last_name,
            email,
            date_of_birth,
            gender,
            passenger_type,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BookingSegment {
    pub id: SegmentId,
    pub flight_id: String,
    pub cabin: CabinClass,
    pub price: Money,
    pub seat_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum CouponStatus {
    #[sqlx(rename = "OPEN")]
    #[strum(serialize = "OPEN")]
    Open,
    #[sqlx(rename = "USED")]
    #[strum(serialize = "USED")]
    Used,
    #[sqlx(rename = "VOID")]
    #[strum(serialize = "VOID")]
    Void,
    #[sqlx(rename = "EXCHANGED")]
    #[strum(serialize = "EXCHANGED")]
    Exchanged,
    #[sqlx(rename = "CHECKED_IN")]
    #[strum(serialize = "CHECKED_IN")]
    CheckedIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coupon {
    pub coupon_number: u32,
    pub flight_id: String,
    pub seat_number: Option<String>,
    pub status: CouponStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum TicketStatus {
    #[sqlx(rename = "ISSUED")]
    #[strum(serialize = "ISSUED")]
    Issued,
    #[sqlx(rename = "REFUNDED")]
    #[strum(serialize = "REFUNDED")]
    Refunded,
    #[sqlx(rename = "VOIDED")]
    #[strum(serialize = "VOIDED")]
    Voided,
    #[sqlx(rename = "EXCHANGED")]
    #[strum(serialize = "EXCHANGED")]
    Exchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Ticket {
    pub ticket_number: String,
    pub pnr_code: PnrCode,
    pub status: TicketStatus,
    pub passenger_id: PassengerId,
    pub passenger_name: String,
    pub coupons: Vec<Coupon>,
    pub issued_at: DateTime<Utc>,
}

impl Ticket {
    /// Allocates a 13-digit numeric ticket number with one coupon per
    /// segment, per spec.md §4.G `confirmBooking`.
    pub fn issue(
        pnr_code: PnrCode,
        passenger_id: PassengerId,
        passenger_name: String,
        segments: &[BookingSegment],
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        if segments.is_empty() {
            return Err(AppError::ValidationError("a ticket needs at least one coupon".into()));
        }
        let coupons = segments
            .iter()
            .enumerate()
            .map(|(i, seg)| Coupon {
                coupon_number: (i + 1) as u32,
                flight_id: seg.flight_id.clone(),
                seat_number: seg.seat_number.clone(),
                status: CouponStatus::Open,
            })
            .collect();

        Ok(Ticket {
            ticket_number: generate_ticket_number(),
            pnr_code,
            status: TicketStatus::Issued,
            passenger_id,
            passenger_name,
            coupons,
            issued_at: now,
        })
    }
}

fn generate_ticket_number() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..13).map(|_| rng.gen_range(0..10).to_string()).collect()
}

/// Passenger Name Record: the booking aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Booking {
    pub id: BookingId,
    pub pnr_code: PnrCode,
    pub status: BookingStatus,
    pub passengers: Vec<Passenger>,
    pub segments: Vec<BookingSegment>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: u32,
}

impl Booking {
    /// Creates a new `Held` booking with seats already assumed reserved by
    /// the caller (InventoryService). Fails if any invariant from spec.md
    /// §3 is violated: non-empty passengers/segments, consistent currency.
    pub fn create(
        passengers: Vec<Passenger>,
        segments: Vec<BookingSegment>,
        hold_ttl_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<(Self, Vec<DomainEvent>), AppError> {
        if passengers.is_empty() {
            return Err(AppError::ValidationError("a booking needs at least one passenger".into()));
        }
        if segments.is_empty() {
            return Err(AppError::ValidationError("a booking needs at least one segment".into()));
        }
        let currency = segments[0].price.currency;
        for seg in &segments {
            if seg.price.currency != currency {
                return Err(AppError::CurrencyMismatch { expected: currency, actual: seg.price.currency });
            }
        }

        let id = BookingId::new();
        let pnr_code = PnrCode::generate();
        let expires_at = now + chrono::Duration::minutes(hold_ttl_minutes);

        let booking = Booking {
            id,
            pnr_code: pnr_code.clone(),
            status: BookingStatus::Held,
            passengers,
            segments,
            expires_at: Some(expires_at),
            created_at: now,
            version: 0,
        };

        let event = DomainEvent::BookingCreated {
            envelope: EventEnvelope::new("Booking", id),
            booking_id: id,
            pnr_code,
        };

        Ok((booking, vec![event]))
    }

    /// `Held` -> `Confirmed`, strictly before `expiresAt` (a booking whose
    /// `expiresAt == now` exactly is considered already expired).
    pub fn confirm(&self, now: DateTime<Utc>) -> Result<(Self, Vec<DomainEvent>), AppError> {
        if self.status != BookingStatus::Held {
            return Err(AppError::BookingStatus {
                expected: BookingStatus::Held.to_string(),
                actual: self.status.to_string(),
            });
        }
        let expires_at = self.expires_at.expect("Held booking always carries expiresAt");
        if now >= expires_at {
            return Err(AppError::BookingExpired);
        }

        let mut next = self.clone();
        next.status = BookingStatus::Confirmed;
        next.expires_at = None;
        next.version += 1;

        let event = DomainEvent::BookingConfirmed {
            envelope: EventEnvelope::new("Booking", self.id),
            booking_id: self.id,
        };
        Ok((next, vec![event]))
    }

    /// `Confirmed` -> `Ticketed`. Caller supplies the freshly-issued
    /// ticket's number; this performs the state transition and appends
    /// `TicketIssued` for the outbox (consumed by the notification
    /// gateway, per spec.md §4.H).
    pub fn mark_ticketed(&self, ticket_number: String) -> Result<(Self, Vec<DomainEvent>), AppError> {
        if self.status != BookingStatus::Confirmed {
            return Err(AppError::BookingStatus {
                expected: BookingStatus::Confirmed.to_string(),
                actual: self.status.to_string(),
            });
        }
        let mut next = self.clone();
        next.status = BookingStatus::Ticketed;
        next.version += 1;

        let event = DomainEvent::TicketIssued {
            envelope: EventEnvelope::new("Booking", self.id),
            booking_id: self.id,
            ticket_number,
        };
        Ok((next, vec![event]))
    }

    /// Any non-terminal status -> `Cancelled`.
    pub fn cancel(&self, reason: String) -> Result<(Self, Vec<DomainEvent>), AppError> {
        if self.status.is_terminal() {
            return Err(AppError::BookingStatus {
                expected: "non-terminal".to_string(),
                actual: self.status.to_string(),
            });
        }

        let mut next = self.clone();
        next.status = BookingStatus::Cancelled;
        next.expires_at = None;
        next.version += 1;

        let event = DomainEvent::BookingCancelled {
            envelope: EventEnvelope::new("Booking", self.id),
            booking_id: self.id,
            reason,
        };
        Ok((next, vec![event]))
    }

    /// No-op if `expiresAt` is absent (not `Held`, or already confirmed);
    /// else `Held` -> `Expired`.
    pub fn mark_expired(&self, now: DateTime<Utc>) -> (Self, Vec<DomainEvent>) {
        let Some(expired_at) = self.expires_at else {
            return (self.clone(), vec![]);
        };

        let mut next = self.clone();
        next.status = BookingStatus::Expired;
        next.expires_at = None;
        next.version += 1;

        let event = DomainEvent::BookingExpired {
            envelope: EventEnvelope::new("Booking", self.id),
            booking_id: self.id,
            expired_at,
        };
        let _ = now;
        (next, vec![event])
    }

    pub fn total_price(&self) -> Result<Money, AppError> {
        let prices: Vec<Money> = self.segments.iter().map(|s| s.price).collect();
        Money::sum(&prices)
    }
}
