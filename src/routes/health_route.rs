use crate::config::Config;
use chrono::Utc;
use rocket::serde::json::{json, Json, Value};
use rocket::State;
use rocket_okapi::openapi;
use sqlx::MySqlPool;

/// `GET /health`, per spec.md §6: never fails, bounds the DB check with
/// `HEALTH_TIMEOUT_S` and reports a degraded (not absent) response on
/// timeout or connection failure.
#[openapi(tag = "Health")]
#[get("/health")]
pub async fn health(pool: &State<MySqlPool>, config: &State<Config>) -> Json<Value> {
    let database = match tokio::time::timeout(config.health_timeout, sqlx::query("SELECT 1").execute(pool.inner())).await
    {
        Ok(Ok(_)) => "ok",
        Ok(Err(_)) => "error",
        Err(_) => "timeout",
    };

    let status = if database == "ok" { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "timestamp": Utc::now(),
        "components": { "database": database },
    }))
}
