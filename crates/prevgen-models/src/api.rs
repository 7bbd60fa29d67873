//! Coordinator response envelope.

use serde::{Deserialize, Serialize};

/// Envelope wrapping every coordinator response.
///
/// Success: `{data, status, message}`. Failure: `{status, error: true, message}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: bool,
}

impl<T> ApiEnvelope<T> {
    /// Payload of a successful response.
    pub fn into_data(self) -> Option<T> {
        if self.error {
            return None;
        }
        self.data
    }
}
