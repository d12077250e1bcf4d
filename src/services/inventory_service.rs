use crate::kernel::ids::FlightId;
use crate::kernel::inventory::FlightInventory;
use crate::kernel::money::Money;
use crate::kernel::value_objects::CabinClass;
use crate::repositories::inventory_repo::InventoryRepository;
use crate::utils::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use tracing::{info, warn};

/// How many times a CAS conflict on `FlightInventory::save` is retried
/// before surfacing `OptimisticLocking`, per spec.md §4.F. Generalizes the
/// teacher's unbounded `loop { ... rollback ... sleep ... }` retry in
/// `ticket_service.rs::book_ticket_for_flight` into a bounded, no-delay
/// reload-and-retry loop.
const MAX_CAS_RETRIES: u32 = 3;

pub struct HoldResult {
    pub inventory: FlightInventory,
    pub unit_price: Money,
    pub total_price: Money,
    pub seats_held: i32,
    pub hold_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct InventoryService {
    pool: MySqlPool,
    repo: InventoryRepository,
    hold_ttl_minutes: i64,
}

impl InventoryService {
    pub fn new(pool: MySqlPool, hold_ttl_minutes: i64) -> Self {
        let repo = InventoryRepository::new(pool.clone());
        InventoryService { pool, repo, hold_ttl_minutes }
    }

    pub async fn get_availability(&self, flight_id: &FlightId) -> AppResult<FlightInventory> {
        self.repo
            .find_by_id(flight_id)
            .await?
            .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))
    }

    /// `holdSeats{flightId, cabin, numberOfSeats}`, per spec.md §4.F: load ->
    /// aggregate `holdSeats` -> CAS save, retried up to `MAX_CAS_RETRIES`
    /// times with a fresh reload on each `OptimisticLocking` conflict.
    pub async fn hold_seats(&self, flight_id: &FlightId, cabin: CabinClass, n: i32) -> AppResult<HoldResult> {
        let now = Utc::now();
        let mut attempt = 0;

        loop {
            let inventory = self
                .repo
                .find_by_id(flight_id)
                .await?
                .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))?;

            let (next, unit_price, events) = inventory.hold_seats(cabin, n)?;

            match self.repo.save(&next, &events).await {
                Ok(saved) => {
                    let total_price = unit_price.multiply(n as i64)?;
                    return Ok(HoldResult {
                        inventory: saved,
                        unit_price,
                        total_price,
                        seats_held: n,
                        hold_expires_at: now + chrono::Duration::minutes(self.hold_ttl_minutes),
                    });
                }
                Err(AppError::OptimisticLocking { .. }) if attempt < MAX_CAS_RETRIES => {
                    attempt += 1;
                    warn!(flight_id = %flight_id, attempt, "hold_seats CAS conflict, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `releaseSeats`, symmetric retry policy to `hold_seats`.
    pub async fn release_seats(&self, flight_id: &FlightId, cabin: CabinClass, n: i32) -> AppResult<FlightInventory> {
        let mut attempt = 0;

        loop {
            let inventory = self
                .repo
                .find_by_id(flight_id)
                .await?
                .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))?;

            let (next, events) = inventory.release_seats(cabin, n)?;

            match self.repo.save(&next, &events).await {
                Ok(saved) => {
                    info!(flight_id = %flight_id, cabin = %cabin, quantity = n, "seats released");
                    return Ok(saved);
                }
                Err(AppError::OptimisticLocking { .. }) if attempt < MAX_CAS_RETRIES => {
                    attempt += 1;
                    warn!(flight_id = %flight_id, attempt, "release_seats CAS conflict, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Seeds a brand-new flight's inventory row. Capacities/prices are
    /// caller-supplied data per spec.md §9 (the `100/20/8` figures are seed
    /// defaults, not an invariant).
    pub async fn seed(&self, inventory: &FlightInventory) -> AppResult<()> {
        self.repo.seed(inventory).await
    }
}
