use std::env;
use std::time::Duration;

/// Scalar configuration loaded once at boot, per spec.md §6. Required vars
/// panic with a descriptive message (matching the teacher's
/// `DATABASE_URL must be set` idiom); vars with defaults fall back silently.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub webhook_secret: String,
    pub cors_origins: Option<String>,
    pub hold_ttl: Duration,
    pub outbox_poll: Duration,
    pub outbox_batch: i64,
    pub outbox_max_retries: i32,
    pub outbox_retry_delays: Vec<Duration>,
    pub reap_interval: Duration,
    pub shutdown_grace: Duration,
    pub health_timeout: Duration,
    pub payment_api_base: Option<String>,
    pub payment_api_key: Option<String>,
    pub notification_api_base: Option<String>,
    pub notification_api_key: Option<String>,
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn env_i32(key: &str, default: i32) -> i32 {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        let webhook_secret = env::var("WEBHOOK_SECRET").expect("WEBHOOK_SECRET must be set");
        let is_development = env::var("ROCKET_PROFILE").map(|p| p == "debug").unwrap_or(true);
        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(v) => Some(v),
            Err(_) if is_development => None,
            Err(_) => panic!("CORS_ORIGINS must be set outside of development"),
        };

        let retry_delays_raw = env::var("OUTBOX_RETRY_DELAYS_MS").unwrap_or_else(|_| "1000,2000,4000".to_string());
        let outbox_retry_delays = retry_delays_raw
            .split(',')
            .filter_map(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .collect();

        Config {
            database_url,
            jwt_secret,
            webhook_secret,
            cors_origins,
            hold_ttl: Duration::from_secs(60 * env_u64("HOLD_TTL_MIN", 15)),
            outbox_poll: Duration::from_millis(env_u64("OUTBOX_POLL_MS", 1000)),
            outbox_batch: env_i64("OUTBOX_BATCH", 100),
            outbox_max_retries: env_i32("OUTBOX_MAX_RETRIES", 3),
            outbox_retry_delays,
            reap_interval: Duration::from_secs(env_u64("REAP_INTERVAL_S", 60)),
            shutdown_grace: Duration::from_secs(env_u64("SHUTDOWN_GRACE_S", 30)),
            health_timeout: Duration::from_secs(env_u64("HEALTH_TIMEOUT_S", 5)),
            payment_api_base: env::var("POLAR_API_BASE").ok(),
            payment_api_key: env::var("POLAR_API_KEY").ok(),
            notification_api_base: env::var("NOTIFICATION_API_BASE").ok(),
            notification_api_key: env::var("NOTIFICATION_API_KEY").ok(),
        }
    }

    pub fn hold_ttl_minutes(&self) -> i64 {
        (self.hold_ttl.as_secs() / 60) as i64
    }
}
