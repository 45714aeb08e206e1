pub mod firebase_auth;
pub mod firestore;
pub mod memory;

use anyhow::anyhow;
use serde::Deserialize;

/// Error envelope shared by Google REST APIs
#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

/// Turns a non-success response into an [anyhow::Error] carrying the API's own error message
async fn ensure_success(
    response: reqwest::Response,
    action: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(anyhow!(
        "{action} failed with status {status}: {}",
        api_error_message(&body)
    ))
}

/// Pulls `error.message` out of a Google API error body, falling back to the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_owned())
}
