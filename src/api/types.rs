//! API request and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An incoming message for one user in one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    /// Structured payload (card submissions, postbacks)
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error body; never carries internal detail for failed turns
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
