// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP client for the North-Tracker vendor API.
//!
//! The API is a plain HTTPS/JSON service: a bearer token obtained via
//! `POST /login` authorizes every other call, and every response wraps its
//! payload in a `{success, data}` envelope. [`ApiClient`] owns the token
//! lifecycle so callers never see a 401.

mod client;
mod response;
mod session;

pub use client::{ApiClient, ApiClientBuilder, DEFAULT_BASE_URL};
pub use response::{ApiResponse, RateLimitStatus};
pub use session::{Session, TOKEN_VALIDITY};
