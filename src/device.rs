// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The merged per-device view produced by a poll.
//!
//! A [`Device`] combines the unit summary with the optional extras fetched
//! alongside it: extended details, lock status, and the latest GPS fix.
//! The extras are optional because their fetches are allowed to fail
//! without failing the whole poll.

use chrono::{DateTime, Utc};

use crate::capabilities::Capabilities;
use crate::telemetry::{GpsFix, LockStatus, UnitDetails, UnitSummary};

/// Geographic position of a device.
///
/// `Unknown` covers both "no fix yet" and "fix present but coordinates
/// invalid"; callers never see a half-valid position.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// The device reported a valid position.
    Known {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
        /// Horizontal accuracy in meters, when reported.
        accuracy: Option<u32>,
    },
    /// No valid position is available.
    Unknown,
}

/// A North-Tracker device as of the latest poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    summary: UnitSummary,
    details: Option<UnitDetails>,
    lock: Option<LockStatus>,
    gps: Option<GpsFix>,
    capabilities: Capabilities,
    updated_at: DateTime<Utc>,
}

impl Device {
    /// Builds a device from the payloads gathered during one poll.
    ///
    /// Capabilities are detected from the same payloads.
    #[must_use]
    pub fn from_poll(
        summary: UnitSummary,
        details: Option<UnitDetails>,
        lock: Option<LockStatus>,
        gps: Option<GpsFix>,
    ) -> Self {
        let capabilities = Capabilities::from_unit(&summary, details.as_ref(), lock.as_ref());
        Self {
            summary,
            details,
            lock,
            gps,
            capabilities,
            updated_at: Utc::now(),
        }
    }

    // ===== Identity =====

    /// Vendor terminal ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.summary.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.summary.name
    }

    /// Vendor device type tag.
    #[must_use]
    pub fn device_type(&self) -> &str {
        &self.summary.device_type
    }

    /// Device IMEI.
    #[must_use]
    pub fn imei(&self) -> &str {
        &self.summary.imei
    }

    /// Hardware model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.summary.model
    }

    /// Detected capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// When this view was assembled.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ===== Position =====

    /// Current position, or [`Location::Unknown`] without a valid fix.
    #[must_use]
    pub fn location(&self) -> Location {
        let Some(gps) = &self.gps else {
            return Location::Unknown;
        };
        match (gps.latitude(), gps.longitude()) {
            (Some(latitude), Some(longitude)) => Location::Known {
                latitude,
                longitude,
                accuracy: gps.accuracy(),
            },
            _ => Location::Unknown,
        }
    }

    /// Current speed in km/h.
    #[must_use]
    pub fn speed(&self) -> Option<u32> {
        self.gps.as_ref().and_then(GpsFix::speed)
    }

    /// Course over ground in degrees (0-359).
    #[must_use]
    pub fn course(&self) -> Option<u16> {
        self.gps.as_ref().and_then(GpsFix::course)
    }

    // ===== Telemetry =====

    /// GPS signal strength as a percentage.
    #[must_use]
    pub fn gps_signal(&self) -> Option<u8> {
        self.summary.gps_signal
    }

    /// Cellular network signal strength as a percentage.
    #[must_use]
    pub fn network_signal(&self) -> Option<u8> {
        self.gps.as_ref().and_then(|g| g.network_signal)
    }

    /// External battery voltage.
    #[must_use]
    pub fn battery_voltage(&self) -> Option<f64> {
        self.summary.battery_voltage
    }

    /// Internal battery level as a percentage.
    #[must_use]
    pub fn internal_battery(&self) -> Option<u8> {
        self.gps.as_ref().and_then(|g| g.battery_percentage)
    }

    /// Odometer reading in kilometers.
    #[must_use]
    pub fn odometer(&self) -> Option<f64> {
        self.summary.odometer
    }

    /// Last report timestamp as the vendor formats it.
    #[must_use]
    pub fn last_seen(&self) -> Option<&str> {
        self.summary.last_seen.as_deref()
    }

    /// Reporting frequency in seconds.
    #[must_use]
    pub fn report_frequency(&self) -> Option<u32> {
        self.details.as_ref().and_then(UnitDetails::report_frequency)
    }

    /// Ambient temperature in degrees Celsius.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        self.details.as_ref().and_then(UnitDetails::temperature)
    }

    /// Relative humidity percentage.
    #[must_use]
    pub fn humidity(&self) -> Option<u8> {
        self.details.as_ref().and_then(UnitDetails::humidity)
    }

    /// Whether the low-battery alert is enabled.
    #[must_use]
    pub fn low_battery_alert_enabled(&self) -> Option<bool> {
        self.details
            .as_ref()
            .and_then(UnitDetails::low_battery_alert_enabled)
    }

    /// Configured low-battery voltage threshold.
    #[must_use]
    pub fn low_battery_threshold(&self) -> Option<f64> {
        self.details
            .as_ref()
            .and_then(UnitDetails::low_battery_threshold)
    }

    // ===== I/O and alarm =====

    /// State of digital input `n` (1-6).
    #[must_use]
    pub fn input_status(&self, n: u8) -> Option<bool> {
        self.summary.input_status(n)
    }

    /// State of digital output `n` (1-6).
    #[must_use]
    pub fn output_status(&self, n: u8) -> Option<bool> {
        self.summary.output_status(n)
    }

    /// Whether the alarm is armed.
    #[must_use]
    pub fn alarm_armed(&self) -> Option<bool> {
        self.lock.as_ref().and_then(|l| l.locked)
    }
}
