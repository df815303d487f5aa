// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! North-Tracker Lib - A Rust client library for the North-Tracker GPS
//! tracking platform.
//!
//! This library talks to the North-Tracker REST API and turns an account's
//! fleet into typed device state: positions, telemetry, digital I/O, and
//! the entity descriptors a home-automation platform needs to expose them.
//!
//! # Supported Features
//!
//! - **Session management**: Bearer-token login with transparent refresh
//! - **Polling**: Interval fleet polling with bounded parallelism and
//!   rate-limit backoff
//! - **Entity mapping**: Capability-driven descriptors (tracker, sensors,
//!   switches, binary sensors, numbers)
//! - **Commands**: Digital outputs, input alerts, and the low-battery alert
//! - **Setup flows**: First-time setup, re-authentication, reconfiguration
//!
//! # Quick Start
//!
//! ## Polling an account
//!
//! ```no_run
//! use std::sync::Arc;
//! use northtracker_lib::api::ApiClient;
//! use northtracker_lib::config::TrackerConfig;
//! use northtracker_lib::poller::Poller;
//!
//! #[tokio::main]
//! async fn main() -> northtracker_lib::Result<()> {
//!     let config = TrackerConfig::new("fleet@example.com", "secret")
//!         .with_scan_interval(15)?;
//!     let client = Arc::new(ApiClient::new(&config)?);
//!
//!     let poller = Poller::new(client, &config);
//!     let snapshot = poller.poll_once().await?;
//!
//!     for device in snapshot.devices() {
//!         println!("{}: {:?}", device.name(), device.location());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Mapping a device to entities
//!
//! ```no_run
//! use northtracker_lib::entity::map_entities;
//! # use northtracker_lib::Device;
//!
//! # fn demo(device: &Device) {
//! for entity in map_entities(device) {
//!     println!("{:?} {}", entity.kind, entity.unique_id);
//! }
//! # }
//! ```
//!
//! ## Running the poll loop
//!
//! ```no_run
//! use std::sync::Arc;
//! use northtracker_lib::api::ApiClient;
//! use northtracker_lib::config::TrackerConfig;
//! use northtracker_lib::event::PollEvent;
//! use northtracker_lib::poller::Poller;
//!
//! #[tokio::main]
//! async fn main() -> northtracker_lib::Result<()> {
//!     let config = TrackerConfig::new("fleet@example.com", "secret");
//!     let client = Arc::new(ApiClient::new(&config)?);
//!     let poller = Poller::new(client, &config);
//!
//!     let mut events = poller.subscribe();
//!     let handle = poller.spawn();
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             PollEvent::PollCompleted { devices, .. } => {
//!                 println!("{devices} devices polled");
//!             }
//!             PollEvent::AuthExpired => break,
//!             _ => {}
//!         }
//!     }
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod api;
mod capabilities;
pub mod config;
mod device;
pub mod entity;
pub mod error;
pub mod event;
pub mod flow;
pub mod poller;
pub mod telemetry;

pub use api::{ApiClient, ApiClientBuilder};
pub use capabilities::{Capabilities, CapabilitiesBuilder};
pub use config::{BackoffPolicy, TrackerConfig};
pub use device::{Device, Location};
pub use entity::{map_entities, EntityDescriptor, EntityKind};
pub use error::{ApiError, ConfigError, Error, ParseError, Result};
pub use event::{EventBus, PollEvent};
pub use flow::{ConfigFlow, FlowInput, FlowOutcome, FlowStep};
pub use poller::{PollSnapshot, Poller, PollerHandle};
pub use telemetry::{GpsFix, LockStatus, UnitDetails, UnitSummary};
