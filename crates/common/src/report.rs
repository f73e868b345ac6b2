//! Analysis reports

use crate::model::ApiRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation finding or report error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Ignore,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Ignore => "IGNORE",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// One `{key, level, message}` finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub key: String,
    pub level: Level,
    pub message: String,
}

impl ValidationMessage {
    pub fn new(key: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            level,
            message: message.into(),
        }
    }
}

/// Failure that prevented the request from completing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
    pub key: String,
    pub level: Level,
    pub message: String,
}

/// Outcome of one executed (or short-circuited) request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub request: ApiRequest,
    pub uri: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status_code: Option<u16>,
    pub validation_messages: Vec<ValidationMessage>,
    pub error: Option<ReportError>,
}

impl AnalysisReport {
    pub const PRE_EXECUTION: &'static str = "Pre-Execution";
    pub const AUTHORIZATION: &'static str = "Authorization";
    pub const TRANSPORT: &'static str = "Transport";
    pub const CANCELLED: &'static str = "Cancelled";

    /// Report for a request that was sent and answered
    pub fn completed(
        request: ApiRequest,
        uri: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        status_code: u16,
        validation_messages: Vec<ValidationMessage>,
    ) -> Self {
        Self {
            request,
            uri: Some(uri),
            start_time,
            end_time,
            status_code: Some(status_code),
            validation_messages,
            error: None,
        }
    }

    /// Report for a request that never produced a response
    pub fn failed(
        request: ApiRequest,
        uri: Option<String>,
        start_time: DateTime<Utc>,
        error: ReportError,
    ) -> Self {
        Self {
            request,
            uri,
            start_time,
            end_time: Utc::now(),
            status_code: None,
            validation_messages: Vec::new(),
            error: Some(error),
        }
    }

    /// Sent, answered with 2xx, no error
    pub fn is_success(&self) -> bool {
        self.error.is_none() && matches!(self.status_code, Some(code) if (200..300).contains(&code))
    }

    pub fn error_key(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.key.as_str())
    }

    /// Number of findings at or above `level`
    pub fn count_at_least(&self, level: Level) -> usize {
        self.validation_messages
            .iter()
            .filter(|m| m.level >= level)
            .count()
    }
}
