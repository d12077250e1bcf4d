use crate::kernel::booking::{Booking, BookingSegment, BookingStatus, Coupon, Passenger, Ticket, TicketStatus};
use crate::kernel::events::DomainEvent;
use crate::kernel::ids::{BookingId, PassengerId, PnrCode, SegmentId};
use crate::kernel::money::{Currency, Money};
use crate::kernel::value_objects::{CabinClass, Gender, PassengerType};
use crate::repositories::write_outbox_events;
use crate::unit_of_work::UnitOfWork;
use crate::utils::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::MySqlPool;
use std::str::FromStr;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    pnr_code: String,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    version: i64,
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    date_of_birth: NaiveDate,
    gender: String,
    passenger_type: String,
}

#[derive(sqlx::FromRow)]
struct SegmentRow {
    id: Uuid,
    flight_id: String,
    cabin_class: String,
    price_amount: i64,
    price_currency: String,
    seat_number: Option<String>,
}

fn parse_status(s: &str) -> Result<BookingStatus, AppError> {
    match s {
        "HELD" => Ok(BookingStatus::Held),
        "CONFIRMED" => Ok(BookingStatus::Confirmed),
        "TICKETED" => Ok(BookingStatus::Ticketed),
        "CANCELLED" => Ok(BookingStatus::Cancelled),
        "EXPIRED" => Ok(BookingStatus::Expired),
        other => Err(AppError::BookingPersistence(format!("unknown booking status {:?}", other))),
    }
}

fn status_str(status: &BookingStatus) -> &'static str {
    match status {
        BookingStatus::Held => "HELD",
        BookingStatus::Confirmed => "CONFIRMED",
        BookingStatus::Ticketed => "TICKETED",
        BookingStatus::Cancelled => "CANCELLED",
        BookingStatus::Expired => "EXPIRED",
    }
}

fn parse_gender(s: &str) -> Result<Gender, AppError> {
    match s {
        "MALE" => Ok(Gender::Male),
        "FEMALE" => Ok(Gender::Female),
        "OTHER" => Ok(Gender::Other),
        other => Err(AppError::BookingPersistence(format!("unknown gender {:?}", other))),
    }
}

fn parse_passenger_type(s: &str) -> Result<PassengerType, AppError> {
    match s {
        "ADULT" => Ok(PassengerType::Adult),
        "CHILD" => Ok(PassengerType::Child),
        "SENIOR" => Ok(PassengerType::Senior),
        "INFANT" => Ok(PassengerType::Infant),
        other => Err(AppError::BookingPersistence(format!("unknown passenger type {:?}", other))),
    }
}

fn parse_ticket_status(s: &str) -> Result<TicketStatus, AppError> {
    match s {
        "ISSUED" => Ok(TicketStatus::Issued),
        "REFUNDED" => Ok(TicketStatus::Refunded),
        "VOIDED" => Ok(TicketStatus::Voided),
        "EXCHANGED" => Ok(TicketStatus::Exchanged),
        other => Err(AppError::BookingPersistence(format!("unknown ticket status {:?}", other))),
    }
}

fn parse_cabin(s: &str) -> Result<CabinClass, AppError> {
    match s {
        "ECONOMY" => Ok(CabinClass::Economy),
        "BUSINESS" => Ok(CabinClass::Business),
        "FIRST" => Ok(CabinClass::First),
        other => Err(AppError::BookingPersistence(format!("unknown cabin class {:?}", other))),
    }
}

fn rebuild(row: BookingRow, passenger_rows: Vec<PassengerRow>, segment_rows: Vec<SegmentRow>) -> Result<Booking, AppError> {
    let status = parse_status(&row.status)?;

    let passengers = passenger_rows
        .into_iter()
        .map(|p| {
            Ok(Passenger {
                id: PassengerId::from_uuid(p.id),
                first_name: p.first_name,
                last_name: p.last_name,
                email: p.email,
                date_of_birth: p.date_of_birth,
                gender: parse_gender(&p.gender)?,
                passenger_type: parse_passenger_type(&p.passenger_type)?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let segments = segment_rows
        .into_iter()
        .map(|s| {
            let currency = Currency::from_str(&s.price_currency)
                .map_err(|_| AppError::BookingPersistence(format!("unknown currency {:?}", s.price_currency)))?;
            Ok(BookingSegment {
                id: SegmentId::from_uuid(s.id),
                flight_id: s.flight_id,
                cabin: parse_cabin(&s.cabin_class)?,
                price: Money::new(s.price_amount, currency),
                seat_number: s.seat_number,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Booking {
        id: BookingId::from_uuid(row.id),
        pnr_code: PnrCode::parse(&row.pnr_code)?,
        status,
        passengers,
        segments,
        expires_at: row.expires_at,
        created_at: row.created_at,
        version: row.version as u32,
    })
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    ticket_number: String,
    pnr_code: String,
    status: String,
    passenger_id: Uuid,
    passenger_name: String,
    coupons: serde_json::Value,
    issued_at: DateTime<Utc>,
}

fn rebuild_ticket(row: TicketRow) -> Result<Ticket, AppError> {
    let coupons: Vec<Coupon> =
        serde_json::from_value(row.coupons).map_err(|e| AppError::BookingPersistence(e.to_string()))?;
    Ok(Ticket {
        ticket_number: row.ticket_number,
        pnr_code: PnrCode::parse(&row.pnr_code)?,
        status: parse_ticket_status(&row.status)?,
        passenger_id: PassengerId::from_uuid(row.passenger_id),
        passenger_name: row.passenger_name,
        coupons,
        issued_at: row.issued_at,
    })
}

pub struct BookingRepository {
    pool: MySqlPool,
}

impl BookingRepository {
    pub fn new(pool: MySqlPool) -> Self {
        BookingRepository { pool }
    }

    async fn load_children(&self, booking_id: Uuid) -> Result<(Vec<PassengerRow>, Vec<SegmentRow>), AppError> {
        let passengers = sqlx::query_as!(
            PassengerRow,
            r#"SELECT id, first_name, last_name, email, date_of_birth, gender, passenger_type
               FROM passengers WHERE booking_id = ?"#,
            booking_id
        )
        .fetch_all(&self.pool)
        .await?;

        let segments = sqlx::query_as!(
            SegmentRow,
            r#"SELECT id, flight_id, cabin_class, price_amount, price_currency, seat_number
               FROM segments WHERE booking_id = ?"#,
            booking_id
        )
        .fetch_all(&self.pool)
        .await?;

        Ok((passengers, segments))
    }

    pub async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, AppError> {
        let row = sqlx::query_as!(
            BookingRow,
            r#"SELECT id, pnr_code, status, expires_at, created_at, version FROM bookings WHERE id = ?"#,
            id.0
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let (passengers, segments) = self.load_children(row.id).await?;
        rebuild(row, passengers, segments).map(Some)
    }

    pub async fn find_by_pnr(&self, pnr: &PnrCode) -> Result<Option<Booking>, AppError> {
        let row = sqlx::query_as!(
            BookingRow,
            r#"SELECT id, pnr_code, status, expires_at, created_at, version FROM bookings WHERE pnr_code = ?"#,
            pnr.as_str()
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let (passengers, segments) = self.load_children(row.id).await?;
        rebuild(row, passengers, segments).map(Some)
    }

    /// Every booking `passenger_id` travels on, for `GET
    /// /bookings/passenger/:id` (spec.md §6).
    pub async fn find_by_passenger_id(&self, passenger_id: PassengerId) -> Result<Vec<Booking>, AppError> {
        let rows = sqlx::query_as!(
            BookingRow,
            r#"
            SELECT DISTINCT b.id, b.pnr_code, b.status, b.expires_at, b.created_at, b.version
            FROM bookings b
            INNER JOIN passengers p ON p.booking_id = b.id
            WHERE p.id = ?
            ORDER BY b.created_at DESC
            "#,
            passenger_id.0
        )
        .fetch_all(&self.pool)
        .await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let (passengers, segments) = self.load_children(row.id).await?;
            bookings.push(rebuild(row, passengers, segments)?);
        }
        Ok(bookings)
    }

    /// Substring match on passenger name, for `GET
    /// /bookings/search?name&limit` (spec.md §6).
    pub async fn search_by_passenger_name(&self, name: &str, limit: i64) -> Result<Vec<Booking>, AppError> {
        let pattern = format!("%{}%", name);
        let rows = sqlx::query_as!(
            BookingRow,
            r#"
            SELECT DISTINCT b.id, b.pnr_code, b.status, b.expires_at, b.created_at, b.version
            FROM bookings b
            INNER JOIN passengers p ON p.booking_id = b.id
            WHERE CONCAT(p.first_name, ' ', p.last_name) LIKE ?
            ORDER BY b.created_at DESC
            LIMIT ?
            "#,
            pattern,
            limit
        )
        .fetch_all(&self.pool)
        .await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let (passengers, segments) = self.load_children(row.id).await?;
            bookings.push(rebuild(row, passengers, segments)?);
        }
        Ok(bookings)
    }

    /// All bookings, newest first, for `GET /bookings` (spec.md §6).
    pub async fn find_all(&self) -> Result<Vec<Booking>, AppError> {
        let rows = sqlx::query_as!(
            BookingRow,
            r#"SELECT id, pnr_code, status, expires_at, created_at, version FROM bookings ORDER BY created_at DESC"#
        )
        .fetch_all(&self.pool)
        .await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let (passengers, segments) = self.load_children(row.id).await?;
            bookings.push(rebuild(row, passengers, segments)?);
        }
        Ok(bookings)
    }

    /// Bookings in `Held` whose hold has lapsed, for the expiration reaper.
    pub async fn find_expired(&self, before: DateTime<Utc>, limit: i64) -> Result<Vec<Booking>, AppError> {
        let rows = sqlx::query_as!(
            BookingRow,
            r#"
            SELECT id, pnr_code, status, expires_at, created_at, version
            FROM bookings
            WHERE status = 'HELD' AND expires_at < ?
            ORDER BY expires_at ASC
            LIMIT ?
            "#,
            before,
            limit
        )
        .fetch_all(&self.pool)
        .await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let (passengers, segments) = self.load_children(row.id).await?;
            bookings.push(rebuild(row, passengers, segments)?);
        }
        Ok(bookings)
    }

    /// First persistence of a brand-new booking (version 0), along with its
    /// passengers and segments (owned, cascade-deleted per spec.md §3).
    ///
    /// Routed through `UnitOfWork::transaction` since there's no post-rollback
    /// re-read to do here, unlike `save`'s CAS path below.
    pub async fn insert(&self, booking: &Booking, events: &[DomainEvent]) -> Result<(), AppError> {
        UnitOfWork::transaction(&self.pool, |tx| {
            Box::pin(async move {
                sqlx::query!(
                    r#"
                    INSERT INTO bookings (id, pnr_code, status, created_at, updated_at, expires_at, version)
                    VALUES (?, ?, ?, ?, ?, ?, 0)
                    "#,
                    booking.id.0,
                    booking.pnr_code.as_str(),
                    status_str(&booking.status),
                    booking.created_at,
                    booking.created_at,
                    booking.expires_at,
                )
                .execute(&mut **tx)
                .await?;

                for passenger in &booking.passengers {
                    sqlx::query!(
                        r#"
                        INSERT INTO passengers (id, booking_id, first_name, last_name, email, date_of_birth, gender, passenger_type)
                        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                        passenger.id.0,
                        booking.id.0,
                        passenger.first_name,
                        passenger.last_name,
                        passenger.email,
                        passenger.date_of_birth,
                        passenger.gender.to_string(),
                        passenger.passenger_type.to_string(),
                    )
                    .execute(&mut **tx)
                    .await?;
                }

                for segment in &booking.segments {
                    sqlx::query!(
                        r#"
                        INSERT INTO segments (id, booking_id, flight_id, cabin_class, price_amount, price_currency, seat_number)
                        VALUES (?, ?, ?, ?, ?, ?, ?)
                        "#,
                        segment.id.0,
                        booking.id.0,
                        segment.flight_id,
                        segment.cabin.to_string(),
                        segment.price.amount_minor,
                        segment.price.currency.to_string(),
                        segment.seat_number,
                    )
                    .execute(&mut **tx)
                    .await?;
                }

                write_outbox_events(tx, events).await?;
                Ok(())
            })
        })
        .await
    }

    /// CAS save of an already-persisted booking's mutable fields
    /// (status/expires_at/version), per spec.md §4.D. Manages its own
    /// transaction rather than going through `UnitOfWork::transaction`: on a
    /// version conflict it needs to roll back and then issue a second,
    /// separate read against the pool to report the actual version, which
    /// doesn't fit a single commit-or-rollback scope.
    pub async fn save(&self, booking: &Booking, events: &[DomainEvent]) -> Result<Booking, AppError> {
        let old_version = booking.version as i64;
        let new_version = old_version + 1;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query!(
            r#"
            UPDATE bookings
            SET status = ?, expires_at = ?, updated_at = ?, version = ?
            WHERE id = ? AND version = ?
            "#,
            status_str(&booking.status),
            booking.expires_at,
            Utc::now(),
            new_version,
            booking.id.0,
            old_version,
        )
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            let actual = sqlx::query_scalar!("SELECT version FROM bookings WHERE id = ?", booking.id.0)
                .fetch_optional(&self.pool)
                .await?
                .unwrap_or(old_version);

            return Err(AppError::OptimisticLocking {
                entity_type: "Booking".into(),
                id: booking.id.to_string(),
                expected_version: old_version,
                actual_version: actual,
            });
        }

        // Seat assignments can change on confirm/ticket; keep segments in sync.
        for segment in &booking.segments {
            sqlx::query!(
                "UPDATE segments SET seat_number = ? WHERE id = ?",
                segment.seat_number,
                segment.id.0
            )
            .execute(&mut *tx)
            .await?;
        }

        write_outbox_events(&mut tx, events).await?;
        tx.commit().await?;

        let mut saved = booking.clone();
        saved.version = new_version as u32;
        Ok(saved)
    }

    /// Looked up by the outbox's ticket-notification consumer when
    /// delivering `TicketIssued`.
    pub async fn find_ticket(&self, ticket_number: &str) -> Result<Option<Ticket>, AppError> {
        let row = sqlx::query_as!(
            TicketRow,
            r#"SELECT ticket_number, pnr_code, status, passenger_id, passenger_name, coupons, issued_at
               FROM tickets WHERE ticket_number = ?"#,
            ticket_number
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(rebuild_ticket).transpose()
    }

    pub async fn save_ticket(&self, ticket: &crate::kernel::booking::Ticket) -> Result<(), AppError> {
        let coupons = serde_json::to_value(&ticket.coupons).map_err(|e| AppError::BookingPersistence(e.to_string()))?;
        sqlx::query!(
            r#"
            INSERT INTO tickets (ticket_number, pnr_code, status, passenger_id, passenger_name, coupons, issued_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            ticket.ticket_number,
            ticket.pnr_code.as_str(),
            ticket.status.to_string(),
            ticket.passenger_id.0,
            ticket.passenger_name,
            coupons,
            ticket.issued_at,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
