use crate::config::Config;
use crate::kernel::ids::BookingId;
use crate::services::booking_service::BookingService;
use crate::utils::error::AppError;
use hmac::{Hmac, Mac};
use rocket::data::{Data, ToByteUnit};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::serde::json::{json, Json, Value};
use rocket::{Request, State};
use rocket_okapi::openapi;
use serde::Deserialize;
use sha2::Sha256;
use std::str::FromStr;
use tracing::{error, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_BODY_SIZE_MIB: u64 = 1;

struct WebhookSignature(String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for WebhookSignature {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.headers().get_one("webhook-signature") {
            Some(value) => Outcome::Success(WebhookSignature(value.to_string())),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    status: Option<String>,
    metadata: Option<WebhookMetadata>,
}

#[derive(Debug, Deserialize)]
struct WebhookMetadata {
    #[serde(rename = "bookingId")]
    booking_id: String,
}

/// `HMAC-SHA256(rawBody, secret)` verified against `webhook-signature:
/// v1=<hex>` with constant-time comparison, per spec.md §6. Mismatched or
/// missing signature -> 401 before the body is even parsed as JSON.
fn verify_signature(raw_body: &[u8], header: &str, secret: &str) -> Result<(), AppError> {
    let hex_digest = header
        .strip_prefix("v1=")
        .ok_or_else(|| AppError::WebhookAuthentication("signature header missing v1= prefix".into()))?;

    let signature = hex::decode(hex_digest)
        .map_err(|_| AppError::WebhookAuthentication("signature is not valid hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::WebhookAuthentication(e.to_string()))?;
    mac.update(raw_body);
    mac.verify_slice(&signature).map_err(|_| AppError::WebhookAuthentication("signature mismatch".into()))
}

/// `POST /webhooks/polar`, per spec.md §6 and §7 (transient errors surface
/// as 503 for upstream retry; business errors are logged and swallowed so
/// the provider doesn't keep retrying a booking that's already resolved).
#[openapi(tag = "Webhooks")]
#[post("/webhooks/polar", data = "<body>")]
pub async fn polar_webhook(
    body: Data<'_>,
    signature: WebhookSignature,
    config: &State<Config>,
    booking_service: &State<BookingService>,
) -> Result<Json<Value>, AppError> {
    let raw_body = body
        .open(MAX_BODY_SIZE_MIB.mebibytes())
        .into_bytes()
        .await
        .map_err(|e| AppError::MalformedPayload(e.to_string()))?
        .into_inner();

    verify_signature(&raw_body, &signature.0, &config.webhook_secret)?;

    let payload: WebhookPayload = serde_json::from_slice(&raw_body)
        .map_err(|e| AppError::MalformedPayload(format!("invalid webhook body: {}", e)))?;

    let is_checkout_succeeded = match payload.event_type.as_str() {
        "checkout.updated" => payload.data.status.as_deref() == Some("succeeded"),
        "checkout.succeeded" => true,
        _ => false,
    };

    if !is_checkout_succeeded {
        return Ok(Json(json!({ "received": true })));
    }

    let booking_id_raw = payload
        .data
        .metadata
        .map(|m| m.booking_id)
        .ok_or_else(|| AppError::MalformedPayload("webhook payload missing metadata.bookingId".into()))?;
    let booking_id = Uuid::from_str(&booking_id_raw)
        .map(BookingId::from_uuid)
        .map_err(|_| AppError::MalformedPayload(format!("invalid bookingId {:?}", booking_id_raw)))?;

    match booking_service.confirm_booking(booking_id).await {
        Ok(_) => Ok(Json(json!({ "received": true }))),
        Err(e) if e.is_transient() => {
            error!(booking_id = %booking_id, error = %e, "transient error confirming booking from webhook");
            Err(AppError::Transient(e.to_string()))
        }
        Err(e) => {
            warn!(booking_id = %booking_id, error = %e, "webhook confirm failed with business error, acknowledging anyway");
            Ok(Json(json!({ "received": true })))
        }
    }
}
