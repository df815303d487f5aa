// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The authenticated North-Tracker API client.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::json;
use tokio::sync::Mutex;

use crate::api::response::{ApiResponse, RateLimitStatus};
use crate::api::session::Session;
use crate::config::TrackerConfig;
use crate::error::{ApiError, Error, Result};
use crate::telemetry::{GpsFix, LockStatus, UnitDetails, UnitSummary};

/// Production base URL of the vendor API.
pub const DEFAULT_BASE_URL: &str = "https://apiv2.northtracker.com/api/v1";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timezone header the vendor expects on every request.
const TIMEZONE_HEADER: &str = "Europe/Stockholm";

/// Client for the North-Tracker vendor API.
///
/// Owns the bearer-token session: the first authenticated call logs in,
/// later calls reuse the token until its 23-hour window lapses, and a 401
/// triggers exactly one re-login and one retry before the error surfaces.
/// Rate-limit responses (429) are never retried here; classification is
/// immediate and backoff belongs to the poller.
///
/// # Examples
///
/// ```no_run
/// use northtracker_lib::api::ApiClient;
/// use northtracker_lib::config::TrackerConfig;
///
/// # async fn example() -> northtracker_lib::Result<()> {
/// let config = TrackerConfig::new("fleet@example.com", "secret");
/// let client = ApiClient::new(&config)?;
/// let units = client.all_units().await?;
/// println!("{} units on the account", units.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    session: Mutex<Session>,
    rate_limits: parking_lot::Mutex<RateLimitStatus>,
}

impl ApiClient {
    /// Creates a client against the production API.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        ApiClientBuilder::new()
            .credentials(config.username(), config.password())
            .build()
    }

    /// Creates a builder for a client with a custom base URL or timeout.
    #[must_use]
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Returns the base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the latest rate-limit counters reported by the API.
    #[must_use]
    pub fn rate_limit_status(&self) -> RateLimitStatus {
        *self.rate_limits.lock()
    }

    // ===== Authentication =====

    /// Logs in with the stored credentials, replacing any current token.
    ///
    /// Usually not needed directly: authenticated calls log in on demand.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidAuth`] when the credentials are rejected.
    pub async fn login(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        // An explicit call always retries, even after a rejected attempt.
        session.clear_login_failure();
        self.login_locked(&mut session).await?;
        Ok(())
    }

    /// Logs out and discards the token.
    ///
    /// The local session is cleared even when the logout request itself
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns the transport or envelope error from the logout call.
    pub async fn logout(&self) -> Result<()> {
        let token = {
            let session = self.session.lock().await;
            session.valid_token().map(str::to_string)
        };

        let result = match token {
            Some(token) => self
                .send(Method::POST, "/user/logout", None, Some(&token))
                .await
                .map(|_| ()),
            // Nothing to log out of.
            None => Ok(()),
        };

        self.session.lock().await.invalidate();
        result.map_err(Error::from)
    }

    /// Returns `true` when a usable token is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.is_authenticated()
    }

    /// Allows the next request to attempt a fresh login.
    ///
    /// The poller calls this at the start of each tick, so a rejected
    /// login is retried at most once per tick.
    pub(crate) async fn reset_login_failure(&self) {
        self.session.lock().await.clear_login_failure();
    }

    async fn login_locked(&self, session: &mut Session) -> std::result::Result<(), ApiError> {
        tracing::debug!(username = %self.username, "logging in");
        let payload = json!({
            "username": self.username,
            "password": self.password,
            "remember_me": false,
            "subsiteid": 0,
        });

        let response = match self.send(Method::POST, "/login", Some(&payload), None).await {
            Ok(response) => response,
            Err(e) => {
                if matches!(e, ApiError::InvalidAuth(_)) {
                    session.mark_login_failed();
                }
                return Err(e);
            }
        };
        if !response.success() {
            session.mark_login_failed();
            return Err(ApiError::InvalidAuth(
                "server rejected the credentials".to_string(),
            ));
        }

        let token = response
            .data()
            .pointer("/user/token")
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::InvalidAuth("login response carried no token".to_string()));
        let token = match token {
            Ok(token) => token,
            Err(e) => {
                session.mark_login_failed();
                return Err(e);
            }
        };

        session.set_token(token);
        tracing::debug!("login succeeded, token valid until {:?}", session.expires_at());
        Ok(())
    }

    /// Returns a valid token, logging in first when necessary.
    ///
    /// A login the server already rejected is not repeated; the failure is
    /// latched until [`Self::login`] or the next poll tick retries it.
    async fn ensure_authenticated(&self) -> std::result::Result<String, ApiError> {
        let mut session = self.session.lock().await;
        if let Some(token) = session.valid_token() {
            return Ok(token.to_string());
        }
        if session.login_failed() {
            return Err(ApiError::InvalidAuth(
                "login already rejected".to_string(),
            ));
        }
        self.login_locked(&mut session).await?;
        // login_locked stored a token on success
        session
            .valid_token()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidAuth("no token after login".to_string()))
    }

    /// Replaces a token the server rejected.
    ///
    /// If another task already refreshed while we waited for the lock, the
    /// newer token is used without a second login; if that refresh already
    /// failed, the failure is returned without another login attempt.
    async fn refresh_token(&self, rejected: &str) -> std::result::Result<String, ApiError> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.valid_token() {
            if current != rejected {
                return Ok(current.to_string());
            }
        }
        if session.login_failed() {
            return Err(ApiError::InvalidAuth(
                "login already rejected".to_string(),
            ));
        }
        session.invalidate();
        self.login_locked(&mut session).await?;
        session
            .valid_token()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidAuth("no token after refresh".to_string()))
    }

    // ===== Request plumbing =====

    /// Sends an authenticated request, refreshing the token once on 401.
    async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&serde_json::Value>,
    ) -> std::result::Result<ApiResponse, ApiError> {
        let token = self.ensure_authenticated().await?;

        match self.send(method.clone(), path, payload, Some(&token)).await {
            Err(ApiError::InvalidAuth(_)) => {
                tracing::debug!(path, "token rejected, refreshing and retrying once");
                let token = self.refresh_token(&token).await?;
                self.send(method, path, payload, Some(&token)).await
            }
            other => other,
        }
    }

    /// Performs one HTTP exchange and classifies the response.
    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> std::result::Result<ApiResponse, ApiError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%method, %url, "sending API request");

        let mut request = self
            .http
            .request(method, &url)
            .header("Timezone", TIMEZONE_HEADER)
            .header("X-Request-Type", "web");

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;

        self.rate_limits.lock().update_from_headers(response.headers());

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => {
                Err(ApiError::InvalidAuth("server rejected the token".to_string()))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok());
                tracing::warn!(?retry_after_secs, "API rate limit hit");
                Err(ApiError::RateLimited { retry_after_secs })
            }
            status if !status.is_success() => Err(ApiError::Status {
                status: status.as_u16(),
            }),
            _ => {
                let body = response.text().await?;
                serde_json::from_str(&body).map_err(ApiError::MalformedResponse)
            }
        }
    }

    // ===== Fleet endpoints =====

    /// Fetches the summary of every unit on the account.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication, or envelope errors, or a parse
    /// error when the `units` array is missing or malformed.
    pub async fn all_units(&self) -> Result<Vec<UnitSummary>> {
        let response = self
            .request(Method::GET, "/user/terminal/get-all-units-details", None)
            .await?;
        if !response.success() {
            return Err(ApiError::Envelope("unit listing failed".to_string()).into());
        }
        let units: Vec<UnitSummary> = response.parse_field("units")?;
        tracing::debug!(count = units.len(), "fetched unit summaries");
        Ok(units)
    }

    /// Fetches the latest GPS fix for every unit.
    ///
    /// # Errors
    ///
    /// Same classes as [`Self::all_units`].
    pub async fn realtime_tracking(&self) -> Result<Vec<GpsFix>> {
        let response = self
            .request(Method::GET, "/user/realtimetracking/get?lang=en", None)
            .await?;
        if !response.success() {
            return Err(ApiError::Envelope("realtime tracking failed".to_string()).into());
        }
        let fixes: Vec<GpsFix> = response.parse_field("gps")?;
        tracing::debug!(count = fixes.len(), "fetched GPS fixes");
        Ok(fixes)
    }

    /// Fetches the extended details of one unit.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication, envelope, or parse errors.
    pub async fn unit_details(&self, device_id: u64, device_type: &str) -> Result<UnitDetails> {
        let payload = json!({"device_id": device_id, "device_type": device_type});
        let response = self
            .request(Method::POST, "/user/terminal/edit-terminal", Some(&payload))
            .await?;
        let data = response.into_data("unit details")?;
        Ok(serde_json::from_value(data).map_err(crate::error::ParseError::Json)?)
    }

    /// Fetches the lock (alarm) status of one unit.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication, envelope, or parse errors.
    pub async fn lock_status(&self, device_id: u64) -> Result<LockStatus> {
        let payload = json!({"terminal_id": device_id});
        let response = self
            .request(
                Method::POST,
                "/user/terminal/access/lockstatus",
                Some(&payload),
            )
            .await?;
        let data = response.into_data("lock status")?;
        Ok(serde_json::from_value(data).map_err(crate::error::ParseError::Json)?)
    }

    /// Fetches the feature list of a unit by IMEI.
    ///
    /// The shape of this payload varies by hardware generation, so it is
    /// exposed as raw JSON.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication, or envelope errors.
    pub async fn unit_features(&self, imei: &str) -> Result<serde_json::Value> {
        let payload = json!({"Imei": imei});
        let response = self
            .request(
                Method::POST,
                "/user/terminal/get-unit-features",
                Some(&payload),
            )
            .await?;
        Ok(response.into_data("unit features")?)
    }

    // ===== Commands =====

    /// Switches digital output `output` (1-6) on or off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityNotSupported`] for an out-of-range output
    /// number, otherwise transport, authentication, or envelope errors.
    pub async fn set_output(&self, device_id: u64, output: u8, on: bool) -> Result<()> {
        validate_io_line(output)?;
        let payload = json!({
            "terminal_id": device_id,
            "doutnumber": output,
            "doutvalue": u8::from(on),
        });
        let response = self
            .request(
                Method::POST,
                "/user/terminal/relaysetting/sendmsg",
                Some(&payload),
            )
            .await?;
        response.into_data("set output")?;
        tracing::debug!(device_id, output, on, "output command accepted");
        Ok(())
    }

    /// Sends the alert-trigger message for digital input `input` (1-6).
    ///
    /// # Errors
    ///
    /// Same classes as [`Self::set_output`].
    pub async fn trigger_input_alert(&self, device_id: u64, input: u8) -> Result<()> {
        validate_io_line(input)?;
        let payload = json!({"terminal_id": device_id, "dinnumber": input});
        let response = self
            .request(
                Method::POST,
                "/user/terminal/dinsetting/sendmsgg",
                Some(&payload),
            )
            .await?;
        response.into_data("input alert")?;
        Ok(())
    }

    /// Configures the low-battery alert for a unit.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication, or envelope errors.
    pub async fn set_low_battery_alert(
        &self,
        imei: &str,
        enabled: bool,
        threshold: f64,
    ) -> Result<()> {
        let payload = json!({
            "Imei": imei,
            "enabled": enabled,
            "threshold": threshold,
        });
        let response = self
            .request(
                Method::POST,
                "/user/terminal/set-low-battery-alert",
                Some(&payload),
            )
            .await?;
        response.into_data("low battery alert")?;
        tracing::debug!(imei, enabled, threshold, "low battery alert updated");
        Ok(())
    }
}

fn validate_io_line(n: u8) -> Result<()> {
    if (1..=6).contains(&n) {
        Ok(())
    } else {
        Err(Error::CapabilityNotSupported)
    }
}

/// Builder for an [`ApiClient`] with a custom base URL or timeout.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use northtracker_lib::api::ApiClient;
///
/// # fn example() -> northtracker_lib::Result<()> {
/// let client = ApiClient::builder()
///     .credentials("fleet@example.com", "secret")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
}

impl ApiClientBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the base URL (no trailing slash).
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the account credentials.
    #[must_use]
    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error when credentials are missing or the HTTP client
    /// cannot be constructed.
    pub fn build(self) -> Result<ApiClient> {
        let (username, password) = match (self.username, self.password) {
            (Some(u), Some(p)) => (u, p),
            _ => {
                return Err(
                    crate::error::ConfigError::MissingCredentials("username".to_string()).into(),
                )
            }
        };

        let http = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(ApiError::CannotConnect)?;

        Ok(ApiClient {
            http,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            username,
            password,
            session: Mutex::new(Session::new()),
            rate_limits: parking_lot::Mutex::new(RateLimitStatus::default()),
        })
    }
}
