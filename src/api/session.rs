// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bearer-token session state.

use chrono::{DateTime, Duration, Utc};

/// How long a token is trusted after login.
///
/// The vendor issues 24-hour tokens; treating them as valid for 23 hours
/// leaves a margin so a token is never presented right at its expiry.
pub const TOKEN_VALIDITY: Duration = Duration::hours(23);

/// Authentication session for the vendor API.
///
/// Tracks the current bearer token and its local expiry estimate. The
/// client keeps this behind an async mutex so concurrent requests agree
/// on a single token and at most one login runs at a time.
#[derive(Debug, Default, Clone)]
pub struct Session {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    login_failed: bool,
}

impl Session {
    /// Creates an unauthenticated session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a freshly issued token, valid for [`TOKEN_VALIDITY`].
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
        self.expires_at = Some(Utc::now() + TOKEN_VALIDITY);
        self.login_failed = false;
    }

    /// Discards the current token.
    ///
    /// Called on logout and when the API answers 401, so the next request
    /// triggers a fresh login.
    pub fn invalidate(&mut self) {
        self.token = None;
        self.expires_at = None;
        self.login_failed = false;
    }

    /// Returns `true` when the last login attempt was rejected and no
    /// retry has been requested since.
    ///
    /// While set, requests needing a fresh token fail fast instead of
    /// hammering the login endpoint with credentials the server already
    /// turned down.
    #[must_use]
    pub fn login_failed(&self) -> bool {
        self.login_failed
    }

    /// Records a rejected login attempt.
    pub fn mark_login_failed(&mut self) {
        self.login_failed = true;
    }

    /// Allows the next request to attempt a fresh login.
    pub fn clear_login_failure(&mut self) {
        self.login_failed = false;
    }

    /// Returns the token if one is present and not past its expiry.
    #[must_use]
    pub fn valid_token(&self) -> Option<&str> {
        let token = self.token.as_deref()?;
        let expires_at = self.expires_at?;
        if Utc::now() < expires_at {
            Some(token)
        } else {
            None
        }
    }

    /// Returns `true` when a usable token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.valid_token().is_some()
    }

    /// Returns when the current token expires, if one is held.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}
