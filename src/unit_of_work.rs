use crate::utils::error::AppError;
use futures::future::BoxFuture;
use sqlx::{MySql, MySqlPool, Transaction};

/// Scopes a group of repository calls in one ACID transaction, per
/// spec.md §4.E. MySQL's default isolation (REPEATABLE READ) already
/// satisfies "REPEATABLE READ or stricter" without an explicit
/// `SET TRANSACTION ISOLATION LEVEL`.
///
/// Commits on `Ok`, rolls back on `Err`. A panic inside `action` rolls back
/// too: `sqlx::Transaction`'s `Drop` issues the rollback itself if neither
/// `commit` nor `rollback` ran.
///
/// Per §5's "one UoW per affected aggregate" policy, a single `transaction`
/// call scopes work against one aggregate's rows; cross-aggregate sagas
/// (BookingService, the reaper) call this once per aggregate and reconcile
/// with compensation rather than holding one transaction open across
/// aggregate boundaries and gateway calls.
pub struct UnitOfWork;

impl UnitOfWork {
    pub async fn transaction<F, T>(pool: &MySqlPool, action: F) -> Result<T, AppError>
    where
        F: for<'c> FnOnce(&'c mut Transaction<'static, MySql>) -> BoxFuture<'c, Result<T, AppError>>,
    {
        let mut tx = pool.begin().await?;
        let result = action(&mut tx).await;
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}
