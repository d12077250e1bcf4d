use crate::kernel::booking::Ticket;
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    pub message_id: String,
}

/// Notification delivery contract, per spec.md §4.K. `Retry-After` is
/// parsed as integer-seconds or an HTTP-date; absent defaults to 60s,
/// surfaced as `NotificationRateLimit{retry_after_seconds}`.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_ticket(&self, ticket: &Ticket, recipient: Recipient) -> AppResult<SendResult>;
}

/// HTTP-backed implementation. Same `reqwest` client shape as
/// `PolarPaymentGateway`; `Retry-After` parsing follows RFC 7231 (either an
/// integer delta-seconds or an HTTP-date).
pub struct HttpNotificationGateway {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl HttpNotificationGateway {
    pub fn new(api_base: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");
        HttpNotificationGateway { http, api_base, api_key }
    }
}

fn parse_retry_after(value: &str) -> u64 {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return seconds;
    }
    match chrono::DateTime::parse_from_rfc2822(value.trim()) {
        Ok(at) => {
            let delta = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
            delta.num_seconds().max(0) as u64
        }
        Err(_) => 60,
    }
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn send_ticket(&self, ticket: &Ticket, recipient: Recipient) -> AppResult<SendResult> {
        let url = format!("{}/v1/tickets/notify", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "ticketNumber": ticket.ticket_number,
                "pnrCode": ticket.pnr_code.as_str(),
                "recipient": recipient,
            }))
            .send()
            .await
            .map_err(|e| AppError::NotificationApiUnavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(parse_retry_after)
                .unwrap_or(60);
            return Err(AppError::NotificationRateLimit { retry_after_seconds });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AppError::NotificationAuthentication(format!("status {}", status)));
        }
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Err(AppError::InvalidRecipient(recipient.email));
        }
        if !status.is_success() {
            return Err(AppError::NotificationApiUnavailable(format!("status {}", status)));
        }

        response
            .json::<SendResult>()
            .await
            .map_err(|e| AppError::NotificationApiUnavailable(e.to_string()))
    }
}

/// In-process fake recording every send, for tests.
pub struct FakeNotificationGateway {
    sent: Mutex<Vec<(String, Recipient)>>,
}

impl FakeNotificationGateway {
    pub fn new() -> Self {
        FakeNotificationGateway { sent: Mutex::new(Vec::new()) }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Default for FakeNotificationGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationGateway for FakeNotificationGateway {
    async fn send_ticket(&self, ticket: &Ticket, recipient: Recipient) -> AppResult<SendResult> {
        let message_id = format!("msg_{}", ticket.ticket_number);
        self.sent.lock().unwrap().push((ticket.ticket_number.clone(), recipient));
        Ok(SendResult { message_id })
    }
}
