// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Poll events and the broadcast bus that carries them.
//!
//! The poller publishes a [`PollEvent`] for everything a host platform
//! cares to react to (new snapshot, discovered or degraded devices, lost
//! session, rate limiting). Subscribe through
//! [`Poller::subscribe`](crate::poller::Poller::subscribe).

mod event_bus;
mod poll_event;

pub use event_bus::EventBus;
pub use poll_event::PollEvent;
