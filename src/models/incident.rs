use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::{Validate, ValidationError};

use crate::error::{AppError, Result};

/// Messages that are rejected regardless of case.
pub const FORBIDDEN_MESSAGES: [&str; 3] = ["test", "none", "null"];

pub const MESSAGE_MIN_CHARS: usize = 5;
pub const MESSAGE_MAX_CHARS: usize = 1000;

/// A stored incident report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Store-assigned identifier
    pub id: i64,

    pub message: String,

    /// Current status
    #[serde(rename = "type")]
    pub incident_type: IncidentStatus,

    /// Who reported the incident
    pub source: IncidentSource,

    /// Creation timestamp, whole seconds
    #[serde(with = "created_at_format")]
    pub created_at: DateTime<Utc>,
}

impl Incident {
    /// Build the stored form of a draft
    pub fn from_draft(id: i64, draft: NewIncident) -> Self {
        Self {
            id,
            message: draft.message,
            incident_type: draft.incident_type,
            source: draft.source,
            created_at: Utc::now().trunc_subsecs(0),
        }
    }
}

/// An incident as submitted, before the store assigns `id` and `createdAt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewIncident {
    #[validate(custom(function = "validate_message"))]
    pub message: String,

    #[serde(rename = "type")]
    pub incident_type: IncidentStatus,

    pub source: IncidentSource,
}

impl NewIncident {
    pub fn new(message: impl Into<String>, incident_type: IncidentStatus, source: IncidentSource) -> Self {
        Self {
            message: message.into(),
            incident_type,
            source,
        }
    }

    /// Validate the draft and return it with the message trimmed.
    pub fn normalized(self) -> Result<Self> {
        self.validate()?;
        Ok(Self {
            message: self.message.trim().to_string(),
            ..self
        })
    }
}

fn validate_message(message: &str) -> std::result::Result<(), ValidationError> {
    let trimmed = message.trim();
    let length = trimmed.chars().count();

    if !(MESSAGE_MIN_CHARS..=MESSAGE_MAX_CHARS).contains(&length) {
        let mut error = ValidationError::new("length");
        error.message = Some(
            format!(
                "message must be between {} and {} characters",
                MESSAGE_MIN_CHARS, MESSAGE_MAX_CHARS
            )
            .into(),
        );
        return Err(error);
    }

    if FORBIDDEN_MESSAGES
        .iter()
        .any(|forbidden| trimmed.eq_ignore_ascii_case(forbidden))
    {
        let mut error = ValidationError::new("forbidden");
        error.message = Some("Invalid incident message".into());
        return Err(error);
    }

    Ok(())
}

/// Incident status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IncidentStatus {
    New,
    Completed,
    Failed,
}

/// Origin of an incident report
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IncidentSource {
    Operator,
    Monitoring,
    Partner,
}

impl IncidentStatus {
    /// Parse a client-supplied status, rejecting unknown values as a validation error
    pub fn parse(value: &str) -> Result<Self> {
        value.trim().parse().map_err(|_| {
            AppError::Validation(format!(
                "unknown incident type '{}', expected one of: new, completed, failed",
                value
            ))
        })
    }
}

impl IncidentSource {
    /// Parse a client-supplied source, rejecting unknown values as a validation error
    pub fn parse(value: &str) -> Result<Self> {
        value.trim().parse().map_err(|_| {
            AppError::Validation(format!(
                "unknown incident source '{}', expected one of: operator, monitoring, partner",
                value
            ))
        })
    }
}

/// `createdAt` wire format: `YYYY-MM-DD HH:MM:SS`, UTC, no offset.
pub mod created_at_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
