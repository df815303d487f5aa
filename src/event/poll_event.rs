// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events published by the poller.

/// An event describing polling activity.
///
/// Events are broadcast through the [`EventBus`](super::EventBus) after
/// each tick; subscribers use them to react to fleet changes without
/// holding a reference to the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// A poll tick finished and a new snapshot was published.
    PollCompleted {
        /// Devices present in the snapshot.
        devices: usize,
        /// Devices whose extras could not be fetched this tick.
        degraded: usize,
    },

    /// A device appeared that was not in the previous snapshot.
    DeviceDiscovered {
        /// Vendor terminal ID.
        device_id: u64,
    },

    /// A device's extras failed to fetch; its summary data is still current.
    DeviceDegraded {
        /// Vendor terminal ID.
        device_id: u64,
        /// Human-readable failure description.
        reason: String,
    },

    /// The session could not be re-established; re-authentication with new
    /// credentials is needed.
    AuthExpired,

    /// The API rate-limited the poll; the poller backs off before the next
    /// attempt.
    RateLimited {
        /// Delay until the next attempt, in seconds.
        backoff_secs: u64,
    },
}

impl PollEvent {
    /// Creates a [`PollEvent::PollCompleted`] event.
    #[must_use]
    pub fn poll_completed(devices: usize, degraded: usize) -> Self {
        Self::PollCompleted { devices, degraded }
    }

    /// Creates a [`PollEvent::DeviceDiscovered`] event.
    #[must_use]
    pub fn device_discovered(device_id: u64) -> Self {
        Self::DeviceDiscovered { device_id }
    }

    /// Creates a [`PollEvent::DeviceDegraded`] event.
    #[must_use]
    pub fn device_degraded(device_id: u64, reason: impl Into<String>) -> Self {
        Self::DeviceDegraded {
            device_id,
            reason: reason.into(),
        }
    }

    /// Returns the device ID for per-device events.
    #[must_use]
    pub fn device_id(&self) -> Option<u64> {
        match self {
            Self::DeviceDiscovered { device_id } | Self::DeviceDegraded { device_id, .. } => {
                Some(*device_id)
            }
            _ => None,
        }
    }
}
