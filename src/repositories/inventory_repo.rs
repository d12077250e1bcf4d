use crate::kernel::events::DomainEvent;
use crate::kernel::inventory::{FlightInventory, SeatBucket};
use crate::kernel::ids::FlightId;
use crate::kernel::money::{Currency, Money};
use crate::kernel::value_objects::CabinClass;
use crate::repositories::write_outbox_events;
use crate::utils::error::AppError;
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct InventoryRow {
    flight_id: String,
    economy_available: i32,
    economy_total: i32,
    economy_price_amount: i64,
    economy_price_currency: String,
    business_available: i32,
    business_total: i32,
    business_price_amount: i64,
    business_price_currency: String,
    first_available: i32,
    first_total: i32,
    first_price_amount: i64,
    first_price_currency: String,
    version: i64,
}

impl InventoryRow {
    fn into_inventory(self) -> Result<FlightInventory, AppError> {
        let flight_id = FlightId::parse(&self.flight_id).map_err(|e| AppError::InventoryPersistence(e.to_string()))?;

        let mut buckets = HashMap::new();
        let rows = [
            (CabinClass::Economy, self.economy_available, self.economy_total, self.economy_price_amount, self.economy_price_currency),
            (CabinClass::Business, self.business_available, self.business_total, self.business_price_amount, self.business_price_currency),
            (CabinClass::First, self.first_available, self.first_total, self.first_price_amount, self.first_price_currency),
        ];
        for (cabin, available, total, amount, currency_str) in rows {
            let currency = Currency::from_str(&currency_str)
                .map_err(|_| AppError::InventoryPersistence(format!("unknown currency column value {:?}", currency_str)))?;
            let bucket = SeatBucket::new(available, total, Money::new(amount, currency))
                .map_err(|e| AppError::InventoryPersistence(e.to_string()))?;
            buckets.insert(cabin, bucket);
        }

        Ok(FlightInventory {
            flight_id,
            buckets,
            version: self.version as u32,
        })
    }
}

impl FromStr for Currency {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            "CHF" => Ok(Currency::Chf),
            _ => Err(()),
        }
    }
}

pub struct InventoryRepository {
    pool: MySqlPool,
}

impl InventoryRepository {
    pub fn new(pool: MySqlPool) -> Self {
        InventoryRepository { pool }
    }

    pub async fn find_by_id(&self, flight_id: &FlightId) -> Result<Option<FlightInventory>, AppError> {
        let row = sqlx::query_as!(
            InventoryRow,
            r#"
            SELECT flight_id, economy_available, economy_total, economy_price_amount, economy_price_currency,
                   business_available, business_total, business_price_amount, business_price_currency,
                   first_available, first_total, first_price_amount, first_price_currency,
                   version
            FROM flight_inventory
            WHERE flight_id = ?
            "#,
            flight_id.as_str()
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(InventoryRow::into_inventory).transpose()
    }

    /// Seeds a brand new flight's inventory row. Called once per flight;
    /// capacities and prices are caller-supplied data, never hard-coded
    /// defaults (per spec.md §9 open question on the `100/20/8` figures).
    pub async fn seed(&self, inventory: &FlightInventory) -> Result<(), AppError> {
        let get = |cabin: CabinClass| inventory.buckets.get(&cabin).expect("all three cabins must be seeded");
        let (eco, biz, first) = (get(CabinClass::Economy), get(CabinClass::Business), get(CabinClass::First));

        sqlx::query!(
            r#"
            INSERT INTO flight_inventory (
                flight_id,
                economy_available, economy_total, economy_price_amount, economy_price_currency,
                business_available, business_total, business_price_amount, business_price_currency,
                first_available, first_total, first_price_amount, first_price_currency,
                version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
            inventory.flight_id.as_str(),
            eco.available, eco.capacity, eco.price.amount_minor, eco.price.currency.to_string(),
            biz.available, biz.capacity, biz.price.amount_minor, biz.price.currency.to_string(),
            first.available, first.capacity, first.price.amount_minor, first.price.currency.to_string(),
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// CAS save per spec.md §4.D: updates the row for `inventory.version`,
    /// and only that version; zero rows affected means someone else won the
    /// race, surfaced as `OptimisticLocking` rather than retried here (the
    /// bounded retry lives in InventoryService, per spec.md §4.F).
    pub async fn save(&self, inventory: &FlightInventory, events: &[DomainEvent]) -> Result<FlightInventory, AppError> {
        let get = |cabin: CabinClass| inventory.buckets.get(&cabin).expect("all three cabins must be present");
        let (eco, biz, first) = (get(CabinClass::Economy), get(CabinClass::Business), get(CabinClass::First));
        let new_version = inventory.version as i64 + 1;
        let old_version = inventory.version as i64;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query!(
            r#"
            UPDATE flight_inventory
            SET economy_available = ?, business_available = ?, first_available = ?, version = ?
            WHERE flight_id = ? AND version = ?
            "#,
            eco.available,
            biz.available,
            first.available,
            new_version,
            inventory.flight_id.as_str(),
            old_version,
        )
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            let actual = sqlx::query_scalar!(
                "SELECT version FROM flight_inventory WHERE flight_id = ?",
                inventory.flight_id.as_str()
            )
            .fetch_optional(&self.pool)
            .await?
            .unwrap_or(old_version);

            return Err(AppError::OptimisticLocking {
                entity_type: "FlightInventory".into(),
                id: inventory.flight_id.as_str().into(),
                expected_version: old_version,
                actual_version: actual,
            });
        }

        write_outbox_events(&mut tx, events).await?;
        tx.commit().await?;

        let mut saved = inventory.clone();
        saved.version = new_version as u32;
        Ok(saved)
    }
}
