// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response envelope and rate-limit accounting.

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ApiError, ParseError};

/// The `{success, data}` envelope every vendor endpoint answers with.
///
/// A 2xx response with `success: false` is still a failed call; use
/// [`ApiResponse::into_data`] to fold that into an [`ApiError`].
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    message: Option<String>,
}

impl ApiResponse {
    /// Returns whether the API reported success.
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Returns the data portion of the envelope.
    #[must_use]
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Unwraps the envelope, turning `success: false` into an error.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Envelope`] carrying the vendor's message (or the
    /// given context when no message was supplied).
    pub fn into_data(self, context: &str) -> Result<serde_json::Value, ApiError> {
        if self.success {
            Ok(self.data)
        } else {
            let message = self
                .message
                .unwrap_or_else(|| format!("{context}: server reported failure"));
            Err(ApiError::Envelope(message))
        }
    }

    /// Deserializes a named field of the data object.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MissingField`] when the field is absent and
    /// [`ParseError::Json`] when it does not match `T`.
    pub fn parse_field<T: DeserializeOwned>(&self, field: &str) -> Result<T, ParseError> {
        let value = self
            .data
            .get(field)
            .ok_or_else(|| ParseError::MissingField(field.to_string()))?;
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// Rate-limit counters mirrored from the vendor's response headers.
///
/// The API reports `X-RateLimit-Limit` and `X-RateLimit-Remaining` on every
/// response. The client keeps the latest pair and logs a warning when more
/// than 80% of the window is used.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Total requests allowed in the current window.
    pub limit: u64,
    /// Requests remaining in the current window.
    pub remaining: u64,
}

impl RateLimitStatus {
    /// Usage threshold above which a warning is logged.
    const WARN_USAGE_PERCENT: f64 = 80.0;

    /// Updates the counters from response headers, keeping previous values
    /// for headers the response did not carry.
    pub fn update_from_headers(&mut self, headers: &HeaderMap) {
        if let Some(limit) = parse_header(headers, "X-RateLimit-Limit") {
            self.limit = limit;
        }
        if let Some(remaining) = parse_header(headers, "X-RateLimit-Remaining") {
            self.remaining = remaining;
        }

        if let Some(usage) = self.usage_percent() {
            if usage > Self::WARN_USAGE_PERCENT {
                tracing::warn!(
                    usage_percent = usage,
                    remaining = self.remaining,
                    limit = self.limit,
                    "rate limit usage high"
                );
            }
        }
    }

    /// Percentage of the window used, or `None` before the first response
    /// carrying a limit header.
    #[must_use]
    pub fn usage_percent(&self) -> Option<f64> {
        if self.limit == 0 {
            return None;
        }
        let used = self.limit.saturating_sub(self.remaining);
        // Safe: counters are small header values
        #[allow(clippy::cast_precision_loss)]
        Some(used as f64 / self.limit as f64 * 100.0)
    }
}

fn parse_header(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
