use crate::utils::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use rocket_okapi::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum CabinClass {
    #[sqlx(rename = "ECONOMY")]
    #[strum(serialize = "ECONOMY")]
    Economy,
    #[sqlx(rename = "BUSINESS")]
    #[strum(serialize = "BUSINESS")]
    Business,
    #[sqlx(rename = "FIRST")]
    #[strum(serialize = "FIRST")]
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum PassengerType {
    #[sqlx(rename = "ADULT")]
    #[strum(serialize = "ADULT")]
    Adult,
    #[sqlx(rename = "CHILD")]
    #[strum(serialize = "CHILD")]
    Child,
    #[sqlx(rename = "SENIOR")]
    #[strum(serialize = "SENIOR")]
    Senior,
    #[sqlx(rename = "INFANT")]
    #[strum(serialize = "INFANT")]
    Infant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum Gender {
    #[sqlx(rename = "MALE")]
    #[strum(serialize = "MALE")]
    Male,
    #[sqlx(rename = "FEMALE")]
    #[strum(serialize = "FEMALE")]
    Female,
    #[sqlx(rename = "OTHER")]
    #[strum(serialize = "OTHER")]
    Other,
}

/// Origin/destination pair. Both ends are IATA codes and must differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    pub fn parse(origin: &str, destination: &str) -> Result<Self, AppError> {
        let is_iata = |s: &str| s.len() == 3 && s.chars().all(|c| c.is_ascii_uppercase());
        if !is_iata(origin) || !is_iata(destination) {
            return Err(AppError::ValidationError(
                "origin/destination must be 3-letter IATA codes".into(),
            ));
        }
        if origin == destination {
            return Err(AppError::ValidationError(
                "origin and destination must differ".into(),
            ));
        }
        Ok(Route {
            origin: origin.to_string(),
            destination: destination.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Schedule {
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
}

impl Schedule {
    pub fn parse(departure: DateTime<Utc>, arrival: DateTime<Utc>) -> Result<Self, AppError> {
        if arrival <= departure {
            return Err(AppError::ValidationError(
                "arrival must be strictly after departure".into(),
            ));
        }
        Ok(Schedule { departure, arrival })
    }
}

/// A passenger's email, validated against a conservative subset of RFC 5321
/// ("RFC 5321 lite" per spec): one `@`, non-empty local and domain parts,
/// domain contains at least one `.`.
pub fn validate_email_lite(email: &str) -> Result<(), AppError> {
    let parts: Vec<&str> = email.splitn(2, '@').collect();
    let valid = parts.len() == 2
        && !parts[0].is_empty()
        && parts[1].contains('.')
        && !parts[1].starts_with('.')
        && !parts[1].ends_with('.');
    if valid {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!("invalid email: {}", email)))
    }
}

pub fn validate_date_of_birth(dob: NaiveDate, now: DateTime<Utc>) -> Result<(), AppError> {
    if dob > now.date_naive() {
        return Err(AppError::ValidationError(
            "date of birth cannot be in the future".into(),
        ));
    }
    Ok(())
}
