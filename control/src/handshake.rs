//! The URL verification handshake (spec.md §4.G): before a target URL is
//! trusted, it must echo back a caller-supplied token.

use std::time::Duration;

use thiserror::Error;

const VERIFICATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("verification request failed: {0}")]
    Transport(String),
    #[error("target responded with status {0}")]
    BadStatus(u16),
    #[error("verification token mismatch")]
    TokenMismatch,
}

pub async fn verify_target_url(
    client: &reqwest::Client,
    target_uri: &str,
    verification_token: &str,
) -> Result<(), VerificationError> {
    let response = client
        .post(target_uri)
        .json(&serde_json::json!({ "verification": "test" }))
        .timeout(VERIFICATION_TIMEOUT)
        .send()
        .await
        .map_err(|e| VerificationError::Transport(e.to_string()))?;

    let status = response.status();
    if status.as_u16() != 200 {
        return Err(VerificationError::BadStatus(status.as_u16()));
    }

    let body = response.text().await.map_err(|e| VerificationError::Transport(e.to_string()))?;
    if body.trim() != verification_token {
        return Err(VerificationError::TokenMismatch);
    }
    Ok(())
}
