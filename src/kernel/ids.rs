use crate::utils::error::AppError;
use rocket_okapi::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, sqlx::Type)]
        #[sqlx(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                $name(id)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(BookingId);
uuid_id!(SegmentId);
uuid_id!(PassengerId);

/// Globally-unique (among active bookings), human-facing booking code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PnrCode(String);

impl PnrCode {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let valid = raw.len() == 6 && raw.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !valid {
            return Err(AppError::ValidationError(format!(
                "PNR code must be 6 characters of [A-Z0-9], got {:?}",
                raw
            )));
        }
        Ok(PnrCode(raw.to_string()))
    }

    pub fn generate() -> Self {
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut rng = rand::thread_rng();
        let code: String = (0..6)
            .map(|_| {
                use rand::Rng;
                ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
            })
            .collect();
        PnrCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PnrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque bounded flight identifier, e.g. "AF123-2026-03-05".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FlightId(String);

impl FlightId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if raw.is_empty() || raw.len() > 50 {
            return Err(AppError::ValidationError(format!(
                "flight id must be 1-50 chars, got {} chars",
                raw.len()
            )));
        }
        Ok(FlightId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
