use crate::kernel::money::Currency;
use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::Request;
use rocket::Response;
use rocket_okapi::JsonSchema;
use serde_json::{json, Value};
use std::io::Cursor;
use thiserror::Error;

/// Tagged error taxonomy for the reservation core. Aggregates raise only the
/// business variants; services may add concurrency/infrastructure variants
/// on top. The transport layer (this module's `Responder` impl) maps every
/// tag to an HTTP status; nothing below this boundary throws untagged.
#[derive(Error, Debug, JsonSchema)]
pub enum AppError {
    // ---- Input / business ----
    #[error("flight not found: {0}")]
    FlightNotFound(String),
    #[error("flight full: requested {requested}, only {available} available")]
    FlightFull { requested: i32, available: i32 },
    #[error("booking not found: {0}")]
    BookingNotFound(String),
    #[error("booking status: expected {expected}, found {actual}")]
    BookingStatus { expected: String, actual: String },
    #[error("booking hold has expired")]
    BookingExpired,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("currency mismatch: expected {expected}, found {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },
    #[error("unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String, supported: Vec<String> },
    #[error("inventory overcapacity: {attempted} would exceed capacity {capacity}")]
    InventoryOvercapacity { attempted: i32, capacity: i32 },
    #[error("ticket already issued: {0}")]
    TicketAlreadyIssued(String),
    #[error("validation error: {0}")]
    ValidationError(String),

    // ---- Concurrency ----
    #[error("optimistic lock conflict on {entity_type} {id}: expected version {expected_version}, actual {actual_version}")]
    OptimisticLocking {
        entity_type: String,
        id: String,
        expected_version: i64,
        actual_version: i64,
    },

    // ---- Infrastructure ----
    #[error("booking persistence error: {0}")]
    BookingPersistence(String),
    #[error("inventory persistence error: {0}")]
    InventoryPersistence(String),
    #[error("outbox persistence error: {0}")]
    OutboxPersistence(String),
    #[error("persistence error")]
    Persistence(String),
    #[error("request timed out: {0}")]
    RequestTimeout(String),
    #[error("network error: {0}")]
    NetworkError(String),

    // ---- Gateway ----
    #[error("payment gateway unavailable: {0}")]
    PaymentApiUnavailable(String),
    #[error("payment declined: {reason}")]
    PaymentDeclined { reason: String },
    #[error("checkout session not found: {0}")]
    CheckoutNotFound(String),
    #[error("notification gateway unavailable: {0}")]
    NotificationApiUnavailable(String),
    #[error("notification rate limited, retry after {retry_after_seconds}s")]
    NotificationRateLimit { retry_after_seconds: u64 },
    #[error("invalid notification recipient: {0}")]
    InvalidRecipient(String),
    #[error("notification authentication failed: {0}")]
    NotificationAuthentication(String),

    // ---- Security ----
    #[error("webhook authentication failed: {0}")]
    WebhookAuthentication(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    // ---- Account/auth (ambient; not part of the booking/inventory taxonomy
    // but required by the AuthenticatedUser request guard carried from the
    // teacher) ----
    #[error("authentication error: {0}")]
    AuthError(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error")]
    Internal(String),

    /// Wraps an already-tagged transient error at a boundary that must
    /// answer with a single, caller-facing status regardless of which
    /// transient variant actually failed underneath — the webhook handler
    /// (spec.md §6/§7) needs every transient failure to come back as 503 so
    /// the payment provider's retry logic keys off one status code.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// `_tag` sent to clients, one per variant name.
    pub fn tag(&self) -> &'static str {
        match self {
            AppError::FlightNotFound(_) => "FlightNotFound",
            AppError::FlightFull { .. } => "FlightFull",
            AppError::BookingNotFound(_) => "BookingNotFound",
            AppError::BookingStatus { .. } => "BookingStatus",
            AppError::BookingExpired => "BookingExpired",
            AppError::InvalidAmount(_) => "InvalidAmount",
            AppError::CurrencyMismatch { .. } => "CurrencyMismatch",
            AppError::UnsupportedCurrency { .. } => "UnsupportedCurrency",
            AppError::InventoryOvercapacity { .. } => "InventoryOvercapacity",
            AppError::TicketAlreadyIssued(_) => "TicketAlreadyIssued",
            AppError::ValidationError(_) => "ValidationError",
            AppError::OptimisticLocking { .. } => "OptimisticLocking",
            AppError::BookingPersistence(_) => "BookingPersistence",
            AppError::InventoryPersistence(_) => "InventoryPersistence",
            AppError::OutboxPersistence(_) => "OutboxPersistence",
            AppError::Persistence(_) => "Persistence",
            AppError::RequestTimeout(_) => "RequestTimeout",
            AppError::NetworkError(_) => "NetworkError",
            AppError::PaymentApiUnavailable(_) => "PaymentApiUnavailable",
            AppError::PaymentDeclined { .. } => "PaymentDeclined",
            AppError::CheckoutNotFound(_) => "CheckoutNotFound",
            AppError::NotificationApiUnavailable(_) => "NotificationApiUnavailable",
            AppError::NotificationRateLimit { .. } => "NotificationRateLimit",
            AppError::InvalidRecipient(_) => "InvalidRecipient",
            AppError::NotificationAuthentication(_) => "NotificationAuthentication",
            AppError::WebhookAuthentication(_) => "WebhookAuthentication",
            AppError::MalformedPayload(_) => "MalformedPayload",
            AppError::AuthError(_) => "AuthError",
            AppError::Conflict(_) => "Conflict",
            AppError::Internal(_) => "Internal",
            AppError::Transient(_) => "Transient",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            AppError::FlightFull { .. } | AppError::OptimisticLocking { .. } => Status::Conflict,
            AppError::FlightNotFound(_) | AppError::BookingNotFound(_) | AppError::CheckoutNotFound(_) => {
                Status::NotFound
            }
            AppError::BookingExpired => Status::Gone,
            AppError::InvalidAmount(_)
            | AppError::UnsupportedCurrency { .. }
            | AppError::ValidationError(_)
            | AppError::BookingStatus { .. }
            | AppError::MalformedPayload(_) => Status::BadRequest,
            AppError::RequestTimeout(_) => Status::GatewayTimeout,
            AppError::PaymentDeclined { .. } => Status::PaymentRequired,
            AppError::PaymentApiUnavailable(_) | AppError::NotificationApiUnavailable(_) => {
                Status::ServiceUnavailable
            }
            AppError::WebhookAuthentication(_) | AppError::AuthError(_) => Status::Unauthorized,
            AppError::Conflict(_) => Status::Conflict,
            AppError::InventoryOvercapacity { .. } | AppError::TicketAlreadyIssued(_) => Status::Conflict,
            AppError::NotificationRateLimit { .. } => Status::TooManyRequests,
            AppError::InvalidRecipient(_) => Status::BadRequest,
            AppError::NotificationAuthentication(_) => Status::Unauthorized,
            AppError::CurrencyMismatch { .. } => Status::BadRequest,
            AppError::NetworkError(_)
            | AppError::BookingPersistence(_)
            | AppError::InventoryPersistence(_)
            | AppError::OutboxPersistence(_)
            | AppError::Persistence(_)
            | AppError::Internal(_) => Status::InternalServerError,
            AppError::Transient(_) => Status::ServiceUnavailable,
        }
    }

    /// Structured context for 4xx bodies; empty object for variants with no
    /// extra fields beyond the message already in `_tag`/`message`.
    fn context(&self) -> Value {
        match self {
            AppError::FlightFull { requested, available } => json!({ "requested": requested, "available": available }),
            AppError::BookingStatus { expected, actual } => json!({ "expected": expected, "actual": actual }),
            AppError::CurrencyMismatch { expected, actual } => json!({ "expected": expected, "actual": actual }),
            AppError::UnsupportedCurrency { currency, supported } => json!({ "currency": currency, "supported": supported }),
            AppError::InventoryOvercapacity { attempted, capacity } => json!({ "attempted": attempted, "capacity": capacity }),
            AppError::OptimisticLocking { entity_type, id, expected_version, actual_version } => json!({
                "entityType": entity_type,
                "id": id,
                "expectedVersion": expected_version,
                "actualVersion": actual_version,
            }),
            AppError::PaymentDeclined { reason } => json!({ "reason": reason }),
            AppError::NotificationRateLimit { retry_after_seconds } => json!({ "retryAfterSeconds": retry_after_seconds }),
            _ => json!({}),
        }
    }

    /// Whether this error belongs to the retryable/transient class used by
    /// the webhook handler (§5, §7): SqlError, OptimisticLocking,
    /// Persistence, RequestTimeout.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::OptimisticLocking { .. }
                | AppError::Persistence(_)
                | AppError::BookingPersistence(_)
                | AppError::InventoryPersistence(_)
                | AppError::OutboxPersistence(_)
                | AppError::RequestTimeout(_)
                | AppError::NetworkError(_)
                | AppError::Transient(_)
        )
    }

    /// Redact anything that looks like a credential, path, IP, or long
    /// secret-like token before it reaches a 5xx body.
    fn sanitized_message(&self) -> String {
        sanitize(&self.to_string())
    }
}

/// Best-effort scrub of internal detail from an error message: file paths,
/// IPv4 addresses, and long hex/base64-looking tokens (likely secrets).
fn sanitize(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let looks_like_path = word.starts_with('/') && word.len() > 3;
            let looks_like_ip = word.split('.').count() == 4 && word.chars().all(|c| c.is_ascii_digit() || c == '.');
            let looks_like_secret = word.len() >= 24
                && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=' || c == '-' || c == '_');
            if looks_like_path || looks_like_ip || looks_like_secret {
                "[redacted]"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[rocket::async_trait]
impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let status = self.status();
        let tag = self.tag();

        let body = if status.code < 500 {
            let mut context = self.context();
            if let Value::Object(ref mut map) = context {
                map.insert("_tag".to_string(), json!(tag));
            }
            context
        } else {
            json!({ "_tag": tag, "message": self.sanitized_message() })
        };

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(None, Cursor::new(body.to_string()))
            .ok()
    }
}
