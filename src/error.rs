//! Domain-specific error types for knowledge-weaver

use crate::clients::TransportError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the article generation pipeline
#[derive(Error, Debug)]
pub enum WeaverError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("LLM transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed outline: {message}")]
    MalformedOutline { message: String },

    #[error("Failed to get a valid outline after {attempts} attempts: {last_error}")]
    GenerationExhausted {
        attempts: u32,
        #[source]
        last_error: Box<WeaverError>,
    },

    #[error("Error generating content: {}", .failures.join("; "))]
    SectionGeneration { failures: Vec<String> },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WeaverError {
    /// Whether the outline fetcher should spend another attempt on this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WeaverError::Transport(_) | WeaverError::MalformedOutline { .. }
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WeaverError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            WeaverError::Config { .. }
            | WeaverError::Serialization { .. }
            | WeaverError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            // Generation failures are reported in-band with an empty article
            WeaverError::Transport(_)
            | WeaverError::MalformedOutline { .. }
            | WeaverError::GenerationExhausted { .. }
            | WeaverError::SectionGeneration { .. } => StatusCode::OK,
        }
    }
}

impl From<anyhow::Error> for WeaverError {
    fn from(err: anyhow::Error) -> Self {
        WeaverError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for WeaverError {
    fn from(err: serde_json::Error) -> Self {
        WeaverError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<quick_xml::DeError> for WeaverError {
    fn from(err: quick_xml::DeError) -> Self {
        WeaverError::MalformedOutline {
            message: format!("XML parsing failed: {}", err),
        }
    }
}

impl From<toml::de::Error> for WeaverError {
    fn from(err: toml::de::Error) -> Self {
        WeaverError::Config {
            message: format!("Invalid config file: {}", err),
        }
    }
}

/// Convert WeaverError to the `{error, content: ""}` body the HTTP layer returns
impl IntoResponse for WeaverError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = crate::orchestrator::ErrorResult::from(&self);
        (status, Json(body)).into_response()
    }
}

/// Result type alias for knowledge-weaver operations
pub type Result<T> = std::result::Result<T, WeaverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_failures_are_joined_in_order() {
        let err = WeaverError::SectionGeneration {
            failures: vec![
                "Section 0 (Intro): timeout".to_string(),
                "Section 2 (Usage): 500".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Error generating content: Section 0 (Intro): timeout; Section 2 (Usage): 500"
        );
    }

    #[test]
    fn exhaustion_carries_last_cause() {
        let err = WeaverError::GenerationExhausted {
            attempts: 3,
            last_error: Box::new(WeaverError::MalformedOutline {
                message: "XML tags not found in the response".to_string(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("after 3 attempts"));
        assert!(text.contains("XML tags not found"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_codes_split_client_and_generation_errors() {
        let bad = WeaverError::InvalidRequest {
            message: "topic must not be empty".to_string(),
        };
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);

        let gen_err = WeaverError::SectionGeneration { failures: vec![] };
        assert_eq!(gen_err.status_code(), StatusCode::OK);
    }
}
