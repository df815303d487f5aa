// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Account setup and reconfiguration flows.
//!
//! Three entry points share one validation routine: [`ConfigFlow::user`]
//! for first-time setup, [`ConfigFlow::reauth`] when stored credentials
//! stopped working, and [`ConfigFlow::reconfigure`] for editing an
//! existing account. Validation is strictly ordered: credential presence,
//! then the scan-interval bounds, and only then a login attempt -- an
//! invalid interval never causes network traffic.

use thiserror::Error;

use crate::api::ApiClient;
use crate::config::{validate_scan_interval, TrackerConfig, DEFAULT_SCAN_INTERVAL};
use crate::error::{ApiError, ConfigError, Error};

/// Which flow a [`ConfigFlow`] was started as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    /// First-time account setup.
    User,
    /// Credentials replacement after the session could not be restored.
    ReauthConfirm,
    /// Editing an existing account's settings.
    Reconfigure,
}

/// What the user submitted to a flow.
#[derive(Debug, Clone, Default)]
pub struct FlowInput {
    /// Account username.
    pub username: String,
    /// Account password. In the reconfigure flow an empty value keeps the
    /// stored password.
    pub password: String,
    /// Scan interval in minutes; `None` keeps the current (or default)
    /// value.
    pub scan_interval: Option<u32>,
}

/// A validation failure, named by its stable error key.
///
/// The `Display` form is the key itself (`invalid_auth`, ...), suitable
/// for looking up a translated message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Username or password missing where required.
    #[error("missing_credentials")]
    MissingCredentials,

    /// Scan interval below the minimum.
    #[error("scan_interval_too_low")]
    ScanIntervalTooLow,

    /// Scan interval above the maximum.
    #[error("scan_interval_too_high")]
    ScanIntervalTooHigh,

    /// The API rejected the credentials.
    #[error("invalid_auth")]
    InvalidAuth,

    /// The API rate-limited the validation attempt.
    #[error("rate_limit")]
    RateLimit,

    /// The API could not be reached or answered unexpectedly.
    #[error("cannot_connect")]
    CannotConnect,
}

impl From<Error> for FlowError {
    fn from(err: Error) -> Self {
        match err {
            Error::Config(ConfigError::ScanIntervalTooLow { .. }) => Self::ScanIntervalTooLow,
            Error::Config(ConfigError::ScanIntervalTooHigh { .. }) => Self::ScanIntervalTooHigh,
            Error::Config(ConfigError::MissingCredentials(_)) => Self::MissingCredentials,
            Error::Api(ApiError::InvalidAuth(_)) => Self::InvalidAuth,
            Error::Api(ApiError::RateLimited { .. }) => Self::RateLimit,
            _ => Self::CannotConnect,
        }
    }
}

/// A successfully finished flow, carrying the validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// A new account entry should be created.
    Created(TrackerConfig),
    /// The stored credentials were replaced.
    ReauthSuccessful(TrackerConfig),
    /// The account settings were updated.
    ReconfigureSuccessful(TrackerConfig),
}

impl FlowOutcome {
    /// Returns the validated configuration regardless of the flow kind.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        match self {
            Self::Created(c) | Self::ReauthSuccessful(c) | Self::ReconfigureSuccessful(c) => c,
        }
    }
}

/// State machine for account setup, re-authentication, and reconfiguration.
///
/// # Examples
///
/// ```no_run
/// use northtracker_lib::flow::{ConfigFlow, FlowInput, FlowOutcome};
///
/// # async fn example() -> Result<(), northtracker_lib::flow::FlowError> {
/// let flow = ConfigFlow::user();
/// let outcome = flow
///     .submit(FlowInput {
///         username: "fleet@example.com".to_string(),
///         password: "secret".to_string(),
///         scan_interval: Some(30),
///     })
///     .await?;
/// assert!(matches!(outcome, FlowOutcome::Created(_)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigFlow {
    step: FlowStep,
    existing: Option<TrackerConfig>,
    base_url: Option<String>,
}

impl ConfigFlow {
    /// Starts a first-time setup flow.
    #[must_use]
    pub fn user() -> Self {
        Self {
            step: FlowStep::User,
            existing: None,
            base_url: None,
        }
    }

    /// Starts a re-authentication flow for an existing account.
    #[must_use]
    pub fn reauth(existing: TrackerConfig) -> Self {
        Self {
            step: FlowStep::ReauthConfirm,
            existing: Some(existing),
            base_url: None,
        }
    }

    /// Starts a reconfiguration flow for an existing account.
    #[must_use]
    pub fn reconfigure(existing: TrackerConfig) -> Self {
        Self {
            step: FlowStep::Reconfigure,
            existing: Some(existing),
            base_url: None,
        }
    }

    /// Overrides the API base URL used for the login check.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Returns which step this flow is at.
    #[must_use]
    pub fn step(&self) -> FlowStep {
        self.step
    }

    /// Pre-fills the form from the existing account, where one exists.
    ///
    /// The password is never echoed back.
    #[must_use]
    pub fn prefill(&self) -> FlowInput {
        match &self.existing {
            Some(config) => FlowInput {
                username: config.username().to_string(),
                password: String::new(),
                scan_interval: Some(config.scan_interval_minutes()),
            },
            None => FlowInput {
                scan_interval: Some(DEFAULT_SCAN_INTERVAL),
                ..FlowInput::default()
            },
        }
    }

    /// Validates the submitted input and finishes the flow.
    ///
    /// # Errors
    ///
    /// Returns a [`FlowError`] naming the failed check. Checks run in a
    /// fixed order (credentials present, interval in bounds, login) and
    /// stop at the first failure.
    pub async fn submit(&self, input: FlowInput) -> Result<FlowOutcome, FlowError> {
        let config = self.validated_config(input)?;

        tracing::debug!(username = %config.username(), step = ?self.step, "validating credentials");
        self.check_login(&config).await?;

        Ok(match self.step {
            FlowStep::User => FlowOutcome::Created(config),
            FlowStep::ReauthConfirm => FlowOutcome::ReauthSuccessful(config),
            FlowStep::Reconfigure => FlowOutcome::ReconfigureSuccessful(config),
        })
    }

    /// Runs the offline checks and assembles the candidate configuration.
    fn validated_config(&self, input: FlowInput) -> Result<TrackerConfig, FlowError> {
        if input.username.is_empty() {
            return Err(FlowError::MissingCredentials);
        }

        // Only the reconfigure flow may omit the password, falling back to
        // the stored one.
        let password = if input.password.is_empty() {
            match (&self.step, &self.existing) {
                (FlowStep::Reconfigure, Some(existing)) => existing.password().to_string(),
                _ => return Err(FlowError::MissingCredentials),
            }
        } else {
            input.password
        };

        let minutes = input.scan_interval.unwrap_or_else(|| {
            self.existing
                .as_ref()
                .map_or(DEFAULT_SCAN_INTERVAL, TrackerConfig::scan_interval_minutes)
        });
        let minutes = validate_scan_interval(minutes).map_err(Error::Config)?;

        TrackerConfig::new(input.username, password)
            .with_scan_interval(minutes)
            .map_err(|e| Error::Config(e).into())
    }

    /// Attempts a login with the candidate credentials.
    async fn check_login(&self, config: &TrackerConfig) -> Result<(), FlowError> {
        let mut builder = ApiClient::builder().credentials(config.username(), config.password());
        if let Some(base_url) = &self.base_url {
            builder = builder.base_url(base_url.clone());
        }
        let client = builder.build()?;
        client.login().await?;
        Ok(())
    }
}
