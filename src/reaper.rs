use crate::kernel::ids::FlightId;
use crate::repositories::booking_repo::BookingRepository;
use crate::services::inventory_service::InventoryService;
use crate::utils::error::AppError;
use chrono::Utc;
use sqlx::MySqlPool;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const REAP_LIMIT: i64 = 100;

/// Background timer loop per spec.md §4.I: every `reap_interval`, marks
/// lapsed `Held` bookings `Expired` and releases their seats. Grounded in
/// the teacher's CAS idiom (`book_ticket_for_flight`'s "zero rows affected
/// means skip and move on" handling of `save`), generalized to a per-tick
/// batch over candidate bookings instead of a single flight+seat.
pub struct Reaper {
    pool: MySqlPool,
    repo: BookingRepository,
    inventory: InventoryService,
    interval: Duration,
}

impl Reaper {
    pub fn new(pool: MySqlPool, inventory: InventoryService, interval: Duration) -> Self {
        let repo = BookingRepository::new(pool.clone());
        Reaper { pool, repo, inventory, interval }
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_s = self.interval.as_secs(), "expiration reaper starting");
            loop {
                if *shutdown.borrow() {
                    break;
                }

                if let Err(e) = self.tick().await {
                    error!(error = %e, "reaper tick failed");
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
            info!("expiration reaper stopping");
        })
    }

    /// One pass: find lapsed `Held` bookings, expire and release each.
    /// Failures on individual bookings are logged and never stop the batch.
    async fn tick(&self) -> Result<(), AppError> {
        let now = Utc::now();
        let candidates = self.repo.find_expired(now, REAP_LIMIT).await?;
        if candidates.is_empty() {
            return Ok(());
        }
        info!(count = candidates.len(), "reaper found expired holds");

        for booking in candidates {
            if let Err(e) = self.expire_one(booking.id, now).await {
                warn!(booking_id = %booking.id, error = %e, "failed to expire booking this tick, will retry next");
            }
        }
        Ok(())
    }

    async fn expire_one(&self, id: crate::kernel::ids::BookingId, now: chrono::DateTime<Utc>) -> Result<(), AppError> {
        let Some(booking) = self.repo.find_by_id(id).await? else {
            return Ok(());
        };

        let (expired, events) = booking.mark_expired(now);
        if events.is_empty() {
            return Ok(());
        }

        let saved = match self.repo.save(&expired, &events).await {
            Ok(saved) => saved,
            Err(AppError::OptimisticLocking { .. }) => {
                warn!(booking_id = %id, "reaper lost CAS race on booking, deferring to next tick");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let seats_per_segment = saved.passengers.len() as i32;
        for segment in &saved.segments {
            let flight_id = FlightId::parse(&segment.flight_id)?;
            self.inventory.release_seats(&flight_id, segment.cabin, seats_per_segment).await?;
        }

        info!(booking_id = %id, "booking expired and seats released");
        Ok(())
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}
