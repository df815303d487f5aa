// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device capabilities detection.
//!
//! This module provides types for representing and detecting the capabilities
//! of North-Tracker devices. The vendor never reports capabilities explicitly;
//! a capability exists exactly when the corresponding field is present in the
//! unit payload. An output that reports `"Off"` is just as present as one
//! reporting `"On"` -- state and capability are independent.
//!
//! # Auto-Detection
//!
//! After each poll, capabilities are detected from the unit payload with
//! [`Capabilities::from_unit`].
//!
//! # Manual Configuration
//!
//! For tests or fixed fleets, capabilities can be specified directly using
//! the builder pattern.

use crate::telemetry::{LockStatus, UnitDetails, UnitSummary};

/// Number of digital input/output lines a device can expose.
pub const MAX_IO_LINES: usize = 6;

/// Capabilities of a North-Tracker device.
///
/// Describes which controllable and observable features a device has:
/// digital outputs, digital inputs, an arm/disarm alarm, and a configurable
/// low-battery alert.
///
/// # Examples
///
/// ```
/// use northtracker_lib::Capabilities;
///
/// // Default capabilities (nothing beyond position tracking)
/// let basic = Capabilities::default();
/// assert!(!basic.has_output(1));
/// assert!(!basic.alarm);
///
/// // A tracker with one wired output and the alarm feature
/// let wired = Capabilities::builder()
///     .with_output(1)
///     .with_alarm()
///     .build();
/// assert!(wired.has_output(1));
/// assert!(!wired.has_output(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Digital outputs 1-6 present on the hardware.
    pub outputs: [bool; MAX_IO_LINES],

    /// Digital inputs 1-6 present on the hardware.
    pub inputs: [bool; MAX_IO_LINES],

    /// Supports arm/disarm via the lock endpoint.
    pub alarm: bool,

    /// Supports the configurable low-battery alert.
    pub low_battery_alert: bool,
}

impl Capabilities {
    /// Creates a builder for manually specified capabilities.
    #[must_use]
    pub fn builder() -> CapabilitiesBuilder {
        CapabilitiesBuilder::new()
    }

    /// Detects capabilities from a polled unit.
    ///
    /// A digital line counts as present when the unit payload carries its
    /// status field, regardless of whether the reported state is on or off.
    /// The alarm capability follows the lock endpoint answering with a
    /// status, and the low-battery alert follows the details payload
    /// carrying its settings.
    #[must_use]
    pub fn from_unit(
        unit: &UnitSummary,
        details: Option<&UnitDetails>,
        lock: Option<&LockStatus>,
    ) -> Self {
        let mut caps = Self::default();

        for line in 1..=MAX_IO_LINES {
            // Safe: line is 1..=6
            #[allow(clippy::cast_possible_truncation)]
            let n = line as u8;
            caps.outputs[line - 1] = unit.output_status(n).is_some();
            caps.inputs[line - 1] = unit.input_status(n).is_some();
        }

        caps.alarm = lock.is_some_and(|l| l.locked.is_some());
        caps.low_battery_alert =
            details.is_some_and(|d| d.low_battery_alert_enabled().is_some());

        caps
    }

    /// Returns whether digital output `n` (1-6) exists.
    #[must_use]
    pub fn has_output(&self, n: u8) -> bool {
        Self::line_index(n).is_some_and(|i| self.outputs[i])
    }

    /// Returns whether digital input `n` (1-6) exists.
    #[must_use]
    pub fn has_input(&self, n: u8) -> bool {
        Self::line_index(n).is_some_and(|i| self.inputs[i])
    }

    /// Returns whether the device has any digital I/O at all.
    #[must_use]
    pub fn has_io(&self) -> bool {
        self.outputs.iter().chain(self.inputs.iter()).any(|&b| b)
    }

    fn line_index(n: u8) -> Option<usize> {
        if (1..=MAX_IO_LINES as u8).contains(&n) {
            Some(usize::from(n) - 1)
        } else {
            None
        }
    }
}

/// Builder for creating custom capabilities.
#[derive(Debug, Default)]
pub struct CapabilitiesBuilder {
    inner: Capabilities,
}

impl CapabilitiesBuilder {
    /// Creates a new builder with no capabilities set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks digital output `n` (1-6) as present. Out-of-range lines are
    /// ignored.
    #[must_use]
    pub fn with_output(mut self, n: u8) -> Self {
        if let Some(i) = Capabilities::line_index(n) {
            self.inner.outputs[i] = true;
        }
        self
    }

    /// Marks digital input `n` (1-6) as present. Out-of-range lines are
    /// ignored.
    #[must_use]
    pub fn with_input(mut self, n: u8) -> Self {
        if let Some(i) = Capabilities::line_index(n) {
            self.inner.inputs[i] = true;
        }
        self
    }

    /// Enables the alarm capability.
    #[must_use]
    pub fn with_alarm(mut self) -> Self {
        self.inner.alarm = true;
        self
    }

    /// Enables the low-battery alert capability.
    #[must_use]
    pub fn with_low_battery_alert(mut self) -> Self {
        self.inner.low_battery_alert = true;
        self
    }

    /// Builds the capabilities.
    #[must_use]
    pub fn build(self) -> Capabilities {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capabilities() {
        let caps = Capabilities::default();
        assert!(!caps.has_io());
        assert!(!caps.alarm);
        assert!(!caps.low_battery_alert);
        for n in 1..=6 {
            assert!(!caps.has_output(n));
            assert!(!caps.has_input(n));
        }
    }

    #[test]
    fn builder_pattern() {
        let caps = Capabilities::builder()
            .with_output(1)
            .with_output(3)
            .with_input(2)
            .with_alarm()
            .build();

        assert!(caps.has_output(1));
        assert!(!caps.has_output(2));
        assert!(caps.has_output(3));
        assert!(caps.has_input(2));
        assert!(!caps.has_input(1));
        assert!(caps.alarm);
        assert!(!caps.low_battery_alert);
        assert!(caps.has_io());
    }

    #[test]
    fn builder_ignores_out_of_range_lines() {
        let caps = Capabilities::builder().with_output(0).with_input(7).build();
        assert!(!caps.has_io());
    }

    #[test]
    fn line_queries_reject_out_of_range() {
        let caps = Capabilities::builder().with_output(1).build();
        assert!(!caps.has_output(0));
        assert!(!caps.has_output(7));
        assert!(!caps.has_input(255));
    }

    #[test]
    fn from_unit_detects_present_lines_regardless_of_state() {
        // Dout1 is Off, Dout2 is On: both lines exist.
        let unit: UnitSummary = serde_json::from_str(
            r#"{
                "ID": 1,
                "NameOnly": "Truck",
                "Dout1Status": "Off",
                "Dout2Status": "On",
                "Din1Status": "Off"
            }"#,
        )
        .unwrap();

        let caps = Capabilities::from_unit(&unit, None, None);
        assert!(caps.has_output(1));
        assert!(caps.has_output(2));
        assert!(!caps.has_output(3));
        assert!(caps.has_input(1));
        assert!(!caps.has_input(2));
    }

    #[test]
    fn from_unit_without_io_fields() {
        let unit: UnitSummary =
            serde_json::from_str(r#"{"ID": 1, "NameOnly": "Bike"}"#).unwrap();
        let caps = Capabilities::from_unit(&unit, None, None);
        assert!(!caps.has_io());
    }

    #[test]
    fn from_unit_alarm_follows_lock_status() {
        let unit: UnitSummary =
            serde_json::from_str(r#"{"ID": 1, "NameOnly": "Van"}"#).unwrap();

        let lock: LockStatus = serde_json::from_str(r#"{"lockedstatus": false}"#).unwrap();
        let caps = Capabilities::from_unit(&unit, None, Some(&lock));
        assert!(caps.alarm);

        // A lock response without a status does not grant the capability.
        let empty: LockStatus = serde_json::from_str("{}").unwrap();
        let caps = Capabilities::from_unit(&unit, None, Some(&empty));
        assert!(!caps.alarm);

        let caps = Capabilities::from_unit(&unit, None, None);
        assert!(!caps.alarm);
    }

    #[test]
    fn from_unit_low_battery_alert_follows_details() {
        let unit: UnitSummary =
            serde_json::from_str(r#"{"ID": 1, "NameOnly": "Van"}"#).unwrap();

        let details: UnitDetails = serde_json::from_str(
            r#"{"terminal": {"LowBatteryAlertEnabled": false, "LowBatteryThreshold": 11.8}}"#,
        )
        .unwrap();
        let caps = Capabilities::from_unit(&unit, Some(&details), None);
        assert!(caps.low_battery_alert);

        let bare: UnitDetails = serde_json::from_str("{}").unwrap();
        let caps = Capabilities::from_unit(&unit, Some(&bare), None);
        assert!(!caps.low_battery_alert);
    }
}
