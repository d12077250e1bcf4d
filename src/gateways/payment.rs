use crate::kernel::ids::BookingId;
use crate::kernel::money::Money;
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocket_okapi::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckoutCustomer {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateCheckoutRequest {
    pub booking_id: BookingId,
    pub amount: Money,
    pub customer: CheckoutCustomer,
    pub success_url: String,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckoutSession {
    pub id: String,
    pub checkout_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaymentConfirmation {
    pub transaction_id: String,
    pub paid_at: DateTime<Utc>,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub enum CheckoutStatus {
    Pending,
    Completed { confirmation: PaymentConfirmation },
    Expired,
    Failed { reason: String },
}

/// Payment checkout contract, per spec.md §4.K. `create_checkout` must be
/// idempotent on `booking_id`: retrying it for an in-flight booking returns
/// the session already created for it rather than opening a second one.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: CreateCheckoutRequest) -> AppResult<CheckoutSession>;
    async fn get_checkout_status(&self, checkout_id: &str) -> AppResult<CheckoutStatus>;
}

/// HTTP-backed implementation talking to the `/webhooks/polar`-named
/// checkout provider. Grounded in `vaya-payment`'s `StripeClient`: a
/// `reqwest::Client` with a fixed timeout, one POST per call, JSON bodies.
pub struct PolarPaymentGateway {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl PolarPaymentGateway {
    pub fn new(api_base: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");
        PolarPaymentGateway { http, api_base, api_key }
    }
}

#[async_trait]
impl PaymentGateway for PolarPaymentGateway {
    async fn create_checkout(&self, request: CreateCheckoutRequest) -> AppResult<CheckoutSession> {
        let url = format!("{}/v1/checkouts", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "amount": request.amount.amount_minor,
                "currency": request.amount.currency,
                "customerEmail": request.customer.email,
                "metadata": { "bookingId": request.booking_id.to_string() },
                "successUrl": request.success_url,
                "cancelUrl": request.cancel_url,
            }))
            .send()
            .await
            .map_err(|e| AppError::PaymentApiUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::PaymentApiUnavailable(format!(
                "checkout provider returned {}",
                response.status()
            )));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::PaymentApiUnavailable(e.to_string()))
    }

    async fn get_checkout_status(&self, checkout_id: &str) -> AppResult<CheckoutStatus> {
        let url = format!("{}/v1/checkouts/{}", self.api_base, checkout_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::PaymentApiUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::CheckoutNotFound(checkout_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(AppError::PaymentApiUnavailable(format!(
                "checkout provider returned {}",
                response.status()
            )));
        }

        response
            .json::<CheckoutStatus>()
            .await
            .map_err(|e| AppError::PaymentApiUnavailable(e.to_string()))
    }
}

/// In-process fake for tests: records calls, is idempotent on `booking_id`,
/// and lets a test pre-arm a failure so saga-compensation paths (spec.md
/// scenario S4) can be exercised without a real HTTP dependency.
pub struct FakePaymentGateway {
    sessions: Mutex<HashMap<String, CheckoutSession>>,
    fail_with: Mutex<Option<AppError>>,
}

impl FakePaymentGateway {
    pub fn new() -> Self {
        FakePaymentGateway { sessions: Mutex::new(HashMap::new()), fail_with: Mutex::new(None) }
    }

    /// Arms the next `create_checkout` call to fail with `error`, for
    /// exercising compensation (spec.md S4).
    pub fn fail_next_checkout_with(&self, error: AppError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }
}

impl Default for FakePaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_checkout(&self, request: CreateCheckoutRequest) -> AppResult<CheckoutSession> {
        if let Some(err) = self.fail_with.lock().unwrap().take() {
            return Err(err);
        }

        let key = request.booking_id.to_string();
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(existing) = sessions.get(&key) {
            return Ok(existing.clone());
        }

        let session = CheckoutSession {
            id: format!("cs_{}", key),
            checkout_url: format!("https://checkout.example/{}", key),
            expires_at: Utc::now() + chrono::Duration::minutes(30),
        };
        sessions.insert(key, session.clone());
        Ok(session)
    }

    async fn get_checkout_status(&self, checkout_id: &str) -> AppResult<CheckoutStatus> {
        let sessions = self.sessions.lock().unwrap();
        if sessions.values().any(|s| s.id == checkout_id) {
            Ok(CheckoutStatus::Pending)
        } else {
            Err(AppError::CheckoutNotFound(checkout_id.to_string()))
        }
    }
}
