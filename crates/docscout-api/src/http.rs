// Shared HTTP plumbing for the clients
use std::time::Duration;

use crate::error::{ApiError, Result};
use crate::retry::is_retryable_status;

pub const DEFAULT_USER_AGENT: &str = concat!("DocScout/", env!("CARGO_PKG_VERSION"));

/// Settings every client is built from
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
        }
    }
}

pub(crate) fn build_client(settings: &HttpSettings) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;
    Ok(client)
}

/// Turn a non-success response into the matching `ApiError`
pub(crate) async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => return Err(ApiError::AuthRequired),
        404 => return Err(ApiError::NotFound(what.to_string())),
        429 => return Err(ApiError::RateLimitExceeded),
        _ => {}
    }

    let body = response.text().await.unwrap_or_default();

    if status == reqwest::StatusCode::SERVICE_UNAVAILABLE && body.contains("loading") {
        return Err(ApiError::ModelLoading);
    }

    if is_retryable_status(status) {
        return Err(ApiError::ServerError {
            status: status.as_u16(),
            body,
        });
    }

    Err(ApiError::RequestFailed(format!("Status {}: {}", status, body)))
}
