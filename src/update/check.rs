//! Update-check protocol client.
//!
//! ```text
//! GET <update_check_url>?filename=<current bundle identifier>
//! x-api-key: <api_key>                      (only when configured)
//!
//! 200 {"updateAvailable": true, "signedUrl": "https://...", "filename": "android_com.acme_1.0_18c"}
//! ```
//!
//! `signedUrl` and `filename` are untrusted. The containment check between
//! them catches server-side mix-ups; it is not an integrity guarantee.

use crate::constants::{API_KEY_HEADER, FILENAME_QUERY_PARAM};
use crate::core::{OtaError, OtaResult};
use crate::layout::{is_single_component, parse_timestamp};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Answer of an update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    UpToDate,
    Available {
        signed_url: String,
        /// Bundle directory name to install under.
        filename: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCheckResponse {
    #[serde(default)]
    update_available: Option<bool>,
    #[serde(default)]
    signed_url: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

/// Parses and validates an update-check response body.
pub fn parse_check_response(body: &str) -> OtaResult<UpdateCheck> {
    let response: UpdateCheckResponse =
        serde_json::from_str(body).map_err(|e| OtaError::InvalidResponse {
            reason: format!("not valid JSON: {e}"),
        })?;

    if !response.update_available.unwrap_or(false) {
        return Ok(UpdateCheck::UpToDate);
    }

    let signed_url = required(response.signed_url, "signedUrl")?;
    let filename = required(response.filename, "filename")?;

    if !signed_url.contains(&filename) {
        return Err(OtaError::SignedUrlMismatch {
            signed_url,
            filename,
        });
    }
    if !is_single_component(&filename) {
        return Err(OtaError::InvalidResponse {
            reason: format!("filename '{filename}' is not a plain file name"),
        });
    }
    if parse_timestamp(&filename).is_none() {
        return Err(OtaError::InvalidResponse {
            reason: format!("filename '{filename}' has no hex timestamp suffix"),
        });
    }

    Ok(UpdateCheck::Available {
        signed_url,
        filename,
    })
}

fn required(value: Option<String>, field: &str) -> OtaResult<String> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| OtaError::InvalidResponse {
        reason: format!("updateAvailable is true but '{field}' is missing"),
    })
}

/// HTTP client for the update-check endpoint.
#[derive(Debug, Clone)]
pub struct UpdateClient {
    client: reqwest::Client,
}

impl UpdateClient {
    pub fn new(timeout: Duration) -> OtaResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            OtaError::ConfigError {
                message: format!("Failed to build HTTP client: {e}"),
            }
        })?;
        Ok(Self { client })
    }

    /// Asks `url` whether a bundle newer than `current_identifier` exists.
    pub async fn check(
        &self,
        url: &str,
        current_identifier: &str,
        api_key: Option<&str>,
    ) -> OtaResult<UpdateCheck> {
        let transport = |e: reqwest::Error| OtaError::TransportFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let mut request = self.client.get(url).query(&[(FILENAME_QUERY_PARAM, current_identifier)]);
        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        debug!("Checking for update at {} (current: {})", url, current_identifier);
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(OtaError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        parse_check_response(&body)
    }
}
