use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::types::{Issue, OperationOutcome};

/// Status reported when no response was received, as the web client did.
const TRANSPORT_STATUS: u16 = 500;
const PRECONDITION_STATUS: u16 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response arrived: connect, DNS, TLS or I/O failure.
    Transport,
    /// The server answered with a non-2xx status or an unreadable body.
    Protocol,
    /// The caller asked for something impossible; nothing was sent.
    Precondition,
}

/// The one error shape every client operation fails with.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} (status {status})")]
pub struct FhirError {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issue: Vec<Issue>,
}

pub type FhirResult<T> = Result<T, FhirError>;

impl FhirError {
    pub fn transport(err: reqwest::Error) -> Self {
        Self {
            kind: ErrorKind::Transport,
            status: err.status().map_or(TRANSPORT_STATUS, |s| s.as_u16()),
            message: err.to_string(),
            issue: Vec::new(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Precondition,
            status: PRECONDITION_STATUS,
            message: message.into(),
            issue: Vec::new(),
        }
    }

    /// Builds the error for a non-2xx response. An `OperationOutcome` body
    /// contributes its issues and the first issue's text as the message.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let issue = serde_json::from_slice::<OperationOutcome>(body)
            .map(|outcome| outcome.issue)
            .unwrap_or_default();
        let message = issue
            .first()
            .and_then(Issue::text)
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status code {}", status.as_u16()));
        Self {
            kind: ErrorKind::Protocol,
            status: status.as_u16(),
            message,
            issue,
        }
    }

    pub fn invalid_body(status: StatusCode, err: &serde_json::Error) -> Self {
        Self {
            kind: ErrorKind::Protocol,
            status: status.as_u16(),
            message: format!("invalid response body: {err}"),
            issue: Vec::new(),
        }
    }
}

/// Rejected server configuration input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("a base address is required")]
    MissingBaseUrl,
    #[error("invalid base address {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("{field} is required for {mode} authentication")]
    MissingAuthField {
        mode: &'static str,
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_outcome_supplies_message_and_issues() {
        let body = json!({
            "resourceType": "OperationOutcome",
            "issue": [
                {"severity": "error", "code": "processing", "diagnostics": "Invalid birthDate"},
                {"severity": "warning", "code": "informational", "diagnostics": "second"}
            ]
        });
        let err = FhirError::from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            &serde_json::to_vec(&body).unwrap(),
        );
        assert_eq!(err.kind, ErrorKind::Protocol);
        assert_eq!(err.status, 422);
        assert_eq!(err.message, "Invalid birthDate");
        assert_eq!(err.issue.len(), 2);
        assert_eq!(err.issue[1].severity, "warning");
    }

    #[test]
    fn plain_body_falls_back_to_status_message() {
        let err = FhirError::from_response(StatusCode::NOT_FOUND, b"<html>nope</html>");
        assert_eq!(err.message, "request failed with status code 404");
        assert!(err.issue.is_empty());
    }

    #[test]
    fn precondition_serializes_without_issues() {
        let err = FhirError::precondition("Resource ID is required for updates");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "kind": "precondition",
                "status": 400,
                "message": "Resource ID is required for updates"
            })
        );
    }
}
