// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration types for the North-Tracker client.
//!
//! [`TrackerConfig`] holds the persisted account settings (credentials and
//! scan interval). The scan interval is validated against the allowed
//! [1, 1440] minute window before it is ever used; invalid values produce
//! typed errors and never reach the network layer.

use std::time::Duration;

use crate::error::ConfigError;

/// Minimum scan interval in minutes.
pub const MIN_SCAN_INTERVAL: u32 = 1;
/// Maximum scan interval in minutes (one day).
pub const MAX_SCAN_INTERVAL: u32 = 1440;
/// Default scan interval in minutes.
pub const DEFAULT_SCAN_INTERVAL: u32 = 15;

/// Validates a scan interval in minutes.
///
/// # Errors
///
/// Returns [`ConfigError::ScanIntervalTooLow`] for values below 1 and
/// [`ConfigError::ScanIntervalTooHigh`] for values above 1440.
pub fn validate_scan_interval(minutes: u32) -> Result<u32, ConfigError> {
    if minutes < MIN_SCAN_INTERVAL {
        return Err(ConfigError::ScanIntervalTooLow {
            min: MIN_SCAN_INTERVAL,
            actual: minutes,
        });
    }
    if minutes > MAX_SCAN_INTERVAL {
        return Err(ConfigError::ScanIntervalTooHigh {
            max: MAX_SCAN_INTERVAL,
            actual: minutes,
        });
    }
    Ok(minutes)
}

/// Persisted account configuration.
///
/// # Examples
///
/// ```
/// use northtracker_lib::config::TrackerConfig;
///
/// let config = TrackerConfig::new("fleet@example.com", "secret")
///     .with_scan_interval(30)
///     .unwrap();
/// assert_eq!(config.scan_interval_minutes(), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    username: String,
    password: String,
    scan_interval: u32,
}

impl TrackerConfig {
    /// Creates a configuration with the default scan interval.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }

    /// Sets the scan interval in minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval is outside [1, 1440].
    pub fn with_scan_interval(mut self, minutes: u32) -> Result<Self, ConfigError> {
        self.scan_interval = validate_scan_interval(minutes)?;
        Ok(self)
    }

    /// Validates the credentials are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredentials`] naming the empty field.
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::MissingCredentials("username".to_string()));
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingCredentials("password".to_string()));
        }
        Ok(())
    }

    /// Returns the account username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the scan interval in minutes.
    #[must_use]
    pub fn scan_interval_minutes(&self) -> u32 {
        self.scan_interval
    }

    /// Returns the scan interval as a [`Duration`].
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.scan_interval) * 60)
    }

    /// Replaces the stored password.
    ///
    /// Used by the reconfigure flow when the user enters a new password;
    /// an empty entry keeps the existing one.
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }
}

/// Backoff policy applied after the API rate-limits the poller.
///
/// Delays grow exponentially per consecutive rate-limited tick and are
/// capped at `max_delay`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use northtracker_lib::config::BackoffPolicy;
///
/// let policy = BackoffPolicy::default();
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(60));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Initial delay after the first rate-limit response.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied per consecutive rate-limited attempt.
    pub multiplier: f32,
}

impl BackoffPolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Calculates the delay for a given consecutive rate-limited attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let multiplier = self
            .multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        // Safe: initial_delay is seconds/minutes, not near u128 max
        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.initial_delay.as_millis() as f32 * multiplier;

        // Safe: delay_ms is always positive and within practical bounds
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(30 * 60),
            multiplier: 2.0,
        }
    }
}
