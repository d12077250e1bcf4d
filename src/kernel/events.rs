use crate::kernel::ids::{BookingId, PnrCode};
use crate::kernel::value_objects::CabinClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Common envelope fields every domain event carries, matching the shape
/// the outbox table persists (`eventType`, `aggregateId`, `payload`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub aggregate_type: String,
    pub aggregate_id: String,
}

impl EventEnvelope {
    pub fn new(aggregate_type: &str, aggregate_id: impl ToString) -> Self {
        EventEnvelope {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            aggregate_type: aggregate_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
        }
    }
}

/// Tagged domain event. The tag (serde-level `type`) becomes the outbox
/// row's `event_type` column; the whole value becomes `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    BookingCreated {
        envelope: EventEnvelope,
        booking_id: BookingId,
        pnr_code: PnrCode,
    },
    BookingConfirmed {
        envelope: EventEnvelope,
        booking_id: BookingId,
    },
    BookingCancelled {
        envelope: EventEnvelope,
        booking_id: BookingId,
        reason: String,
    },
    BookingExpired {
        envelope: EventEnvelope,
        booking_id: BookingId,
        expired_at: DateTime<Utc>,
    },
    TicketIssued {
        envelope: EventEnvelope,
        booking_id: BookingId,
        ticket_number: String,
    },
    SeatsHeld {
        envelope: EventEnvelope,
        flight_id: String,
        cabin: CabinClass,
        quantity: i32,
    },
    SeatsReleased {
        envelope: EventEnvelope,
        flight_id: String,
        cabin: CabinClass,
        quantity: i32,
    },
}

impl DomainEvent {
    /// The `event_type` tag stored in the outbox row, used for consumer
    /// dispatch by the publisher.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated { .. } => "BookingCreated",
            DomainEvent::BookingConfirmed { .. } => "BookingConfirmed",
            DomainEvent::BookingCancelled { .. } => "BookingCancelled",
            DomainEvent::BookingExpired { .. } => "BookingExpired",
            DomainEvent::TicketIssued { .. } => "TicketIssued",
            DomainEvent::SeatsHeld { .. } => "SeatsHeld",
            DomainEvent::SeatsReleased { .. } => "SeatsReleased",
        }
    }

    pub fn aggregate_id(&self) -> String {
        match self {
            DomainEvent::BookingCreated { envelope, .. }
            | DomainEvent::BookingConfirmed { envelope, .. }
            | DomainEvent::BookingCancelled { envelope, .. }
            | DomainEvent::BookingExpired { envelope, .. }
            | DomainEvent::TicketIssued { envelope, .. }
            | DomainEvent::SeatsHeld { envelope, .. }
            | DomainEvent::SeatsReleased { envelope, .. } => envelope.aggregate_id.clone(),
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::BookingCreated { envelope, .. }
            | DomainEvent::BookingConfirmed { envelope, .. }
            | DomainEvent::BookingCancelled { envelope, .. }
            | DomainEvent::BookingExpired { envelope, .. }
            | DomainEvent::TicketIssued { envelope, .. }
            | DomainEvent::SeatsHeld { envelope, .. }
            | DomainEvent::SeatsReleased { envelope, .. } => envelope.occurred_at,
        }
    }
}
