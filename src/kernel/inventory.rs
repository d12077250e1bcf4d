use crate::kernel::events::{DomainEvent, EventEnvelope};
use crate::kernel::ids::FlightId;
use crate::kernel::money::Money;
use crate::kernel::value_objects::CabinClass;
use crate::utils::error::AppError;
use std::collections::HashMap;

/// One cabin's seat pool on one flight.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatBucket {
    pub available: i32,
    pub capacity: i32,
    pub price: Money,
}

impl SeatBucket {
    pub fn new(available: i32, capacity: i32, price: Money) -> Result<Self, AppError> {
        if capacity <= 0 {
            return Err(AppError::ValidationError("capacity must be > 0".into()));
        }
        if available < 0 || available > capacity {
            return Err(AppError::ValidationError(
                "available must satisfy 0 <= available <= capacity".into(),
            ));
        }
        Ok(SeatBucket { available, capacity, price })
    }
}

/// Seat availability for one flight, across cabins. The aggregate root for
/// the inventory side of the reservation core.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightInventory {
    pub flight_id: FlightId,
    pub buckets: HashMap<CabinClass, SeatBucket>,
    pub version: u32,
}

impl FlightInventory {
    pub fn new(flight_id: FlightId, buckets: HashMap<CabinClass, SeatBucket>) -> Self {
        FlightInventory { flight_id, buckets, version: 0 }
    }

    fn bucket(&self, cabin: CabinClass) -> Result<&SeatBucket, AppError> {
        self.buckets
            .get(&cabin)
            .ok_or_else(|| AppError::FlightNotFound(format!("{} has no {} cabin", self.flight_id, cabin)))
    }

    /// Reserve `n` seats in `cabin`. Pure state transition: persistence and
    /// optimistic-concurrency CAS are the repository's concern, not this
    /// aggregate's.
    pub fn hold_seats(
        &self,
        cabin: CabinClass,
        n: i32,
    ) -> Result<(Self, Money, Vec<DomainEvent>), AppError> {
        if n <= 0 {
            return Err(AppError::InvalidAmount(format!("seat quantity must be positive, got {}", n)));
        }
        let bucket = self.bucket(cabin)?;
        if n > bucket.available {
            return Err(AppError::FlightFull { requested: n, available: bucket.available });
        }

        let mut next = self.clone();
        let next_bucket = next.buckets.get_mut(&cabin).unwrap();
        next_bucket.available -= n;
        next.version += 1;

        let event = DomainEvent::SeatsHeld {
            envelope: EventEnvelope::new("FlightInventory", self.flight_id.as_str()),
            flight_id: self.flight_id.as_str().to_string(),
            cabin,
            quantity: n,
        };

        Ok((next, bucket.price, vec![event]))
    }

    /// Release `n` seats back into `cabin`. Fails rather than silently
    /// clamping if the release would push availability past capacity.
    pub fn release_seats(&self, cabin: CabinClass, n: i32) -> Result<(Self, Vec<DomainEvent>), AppError> {
        if n <= 0 {
            return Err(AppError::InvalidAmount(format!("seat quantity must be positive, got {}", n)));
        }
        let bucket = self.bucket(cabin)?;
        if bucket.available + n > bucket.capacity {
            return Err(AppError::InventoryOvercapacity {
                attempted: bucket.available + n,
                capacity: bucket.capacity,
            });
        }

        let mut next = self.clone();
        let next_bucket = next.buckets.get_mut(&cabin).unwrap();
        next_bucket.available += n;
        next.version += 1;

        let event = DomainEvent::SeatsReleased {
            envelope: EventEnvelope::new("FlightInventory", self.flight_id.as_str()),
            flight_id: self.flight_id.as_str().to_string(),
            cabin,
            quantity: n,
        };

        Ok((next, vec![event]))
    }
}
