pub mod booking_repo;
pub mod inventory_repo;

use crate::kernel::events::DomainEvent;
use crate::utils::error::AppError;
use sqlx::{MySql, Transaction};

/// Inserts one outbox row per domain event inside the caller's transaction,
/// per spec.md §4.D step 3. Shared by both aggregate repositories so the
/// outbox write always rides along with the aggregate write in one commit.
pub async fn write_outbox_events(
    tx: &mut Transaction<'_, MySql>,
    events: &[DomainEvent],
) -> Result<(), AppError> {
    for event in events {
        let event_id = uuid::Uuid::new_v4();
        let payload = serde_json::to_vec(event).map_err(|e| AppError::OutboxPersistence(e.to_string()))?;
        sqlx::query!(
            r#"
            INSERT INTO event_outbox (id, event_type, aggregate_id, payload, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            event_id,
            event.event_type(),
            event.aggregate_id(),
            payload,
            event.occurred_at(),
        )
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::OutboxPersistence(e.to_string()))?;
    }
    Ok(())
}
