use crate::gateways::notification::{NotificationGateway, Recipient};
use crate::kernel::events::DomainEvent;
use crate::kernel::ids::{BookingId, FlightId};
use crate::repositories::booking_repo::BookingRepository;
use crate::services::inventory_service::InventoryService;
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// One consumer per `event_type`, registered with the publisher per spec.md
/// §4.H. A consumer is handed the already-deserialized event and must be
/// idempotent: the publisher retries on any `Err`.
#[async_trait]
pub trait OutboxConsumer: Send + Sync {
    async fn handle(&self, event: &DomainEvent) -> AppResult<()>;
}

/// Releases a cancelled/expired booking's held seats. Runs alongside the
/// synchronous release already performed by `BookingService::cancel_booking`
/// and the reaper — this is the reliability net for the case where the
/// process died between the aggregate commit and that synchronous release.
/// Idempotent: a release that would push a bucket past capacity means the
/// seats are already back, so `InventoryOvercapacity` is treated as success.
pub struct SeatReleaseConsumer {
    repo: Arc<BookingRepository>,
    inventory: InventoryService,
}

impl SeatReleaseConsumer {
    pub fn new(repo: Arc<BookingRepository>, inventory: InventoryService) -> Self {
        SeatReleaseConsumer { repo, inventory }
    }

    async fn release_for(&self, booking_id: BookingId) -> AppResult<()> {
        let Some(booking) = self.repo.find_by_id(booking_id).await? else {
            return Ok(());
        };
        let seats_per_segment = booking.passengers.len() as i32;

        for segment in &booking.segments {
            let flight_id = FlightId::parse(&segment.flight_id)?;
            match self.inventory.release_seats(&flight_id, segment.cabin, seats_per_segment).await {
                Ok(_) => {}
                Err(AppError::InventoryOvercapacity { .. }) => {
                    info!(booking_id = %booking_id, flight_id = %segment.flight_id, "seats already released, treating as success");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxConsumer for SeatReleaseConsumer {
    async fn handle(&self, event: &DomainEvent) -> AppResult<()> {
        match event {
            DomainEvent::BookingCancelled { booking_id, .. } => self.release_for(*booking_id).await,
            DomainEvent::BookingExpired { booking_id, .. } => self.release_for(*booking_id).await,
            other => Err(AppError::ValidationError(format!(
                "SeatReleaseConsumer received unexpected event type {}",
                other.event_type()
            ))),
        }
    }
}

/// Delivers the issued ticket to the primary passenger's email via the
/// notification gateway, per spec.md §4.K.
pub struct TicketNotificationConsumer {
    repo: Arc<BookingRepository>,
    gateway: Arc<dyn NotificationGateway>,
}

impl TicketNotificationConsumer {
    pub fn new(repo: Arc<BookingRepository>, gateway: Arc<dyn NotificationGateway>) -> Self {
        TicketNotificationConsumer { repo, gateway }
    }
}

#[async_trait]
impl OutboxConsumer for TicketNotificationConsumer {
    async fn handle(&self, event: &DomainEvent) -> AppResult<()> {
        let (booking_id, ticket_number) = match event {
            DomainEvent::TicketIssued { booking_id, ticket_number, .. } => (*booking_id, ticket_number.clone()),
            other => {
                return Err(AppError::ValidationError(format!(
                    "TicketNotificationConsumer received unexpected event type {}",
                    other.event_type()
                )))
            }
        };

        let ticket = self
            .repo
            .find_ticket(&ticket_number)
            .await?
            .ok_or_else(|| AppError::BookingPersistence(format!("ticket {} not found", ticket_number)))?;

        let booking = self
            .repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        let primary = booking
            .passengers
            .first()
            .ok_or_else(|| AppError::ValidationError("booking has no passengers".into()))?;

        let recipient = Recipient { email: primary.email.clone(), name: Some(primary.full_name()) };
        self.gateway.send_ticket(&ticket, recipient).await?;
        info!(ticket_number = %ticket.ticket_number, booking_id = %booking_id, "ticket notification sent");
        Ok(())
    }
}
