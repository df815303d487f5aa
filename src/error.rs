// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the North-Tracker library.
//!
//! This module provides a layered error hierarchy covering configuration
//! validation, vendor API communication, and payload parsing.

use thiserror::Error;

/// The main error type for this library.
///
/// This enum encompasses all possible errors that can occur when talking
/// to the North-Tracker API or validating configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during configuration validation.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred during API communication.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Error occurred while parsing a response payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Device was not found in the latest poll snapshot.
    #[error("device not found")]
    DeviceNotFound,

    /// Device does not report the requested capability.
    #[error("device does not support this capability")]
    CapabilityNotSupported,
}

/// Errors related to configuration validation.
///
/// These are raised before any network traffic happens; an invalid
/// scan interval never reaches the API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The scan interval is below the minimum of 1 minute.
    #[error("scan interval {actual} is below the minimum of {min} minutes")]
    ScanIntervalTooLow {
        /// Minimum allowed interval in minutes.
        min: u32,
        /// The interval that was provided.
        actual: u32,
    },

    /// The scan interval is above the maximum of 1440 minutes.
    #[error("scan interval {actual} is above the maximum of {max} minutes")]
    ScanIntervalTooHigh {
        /// Maximum allowed interval in minutes.
        max: u32,
        /// The interval that was provided.
        actual: u32,
    },

    /// Username or password is empty.
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
}

/// Errors related to vendor API communication.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connection refused, DNS, timeout).
    #[error("cannot connect: {0}")]
    CannotConnect(#[from] reqwest::Error),

    /// Credentials were rejected, or the token could not be refreshed.
    ///
    /// The caller should trigger a re-authentication flow.
    #[error("authentication failed: {0}")]
    InvalidAuth(String),

    /// The API returned HTTP 429.
    ///
    /// The client never retries this itself; the poller owns backoff.
    #[error("rate limited by the API")]
    RateLimited {
        /// Retry-after hint in seconds, when the API provided one.
        retry_after_secs: Option<u64>,
    },

    /// The API answered with HTTP 2xx but `success: false` in the envelope.
    #[error("API call failed: {0}")]
    Envelope(String),

    /// The API answered with HTTP 2xx but a body that is not the expected
    /// envelope.
    #[error("malformed API response: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    /// Unexpected HTTP status outside the known classifications.
    #[error("unexpected API response: HTTP {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },
}

impl ApiError {
    /// Returns `true` if this error indicates the session has expired
    /// and re-authentication might resolve it.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::InvalidAuth(_))
    }

    /// Returns `true` if this is a transient error worth retrying later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::CannotConnect(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }
}

/// Errors related to parsing vendor payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
