// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deserialized views of the vendor's device payloads.

use serde::Deserialize;

use super::{flexible_f64, flexible_percent, status_is_on};

/// One entry of the `units` array from the all-units-details endpoint.
///
/// Carries the device identity plus the base telemetry the vendor includes
/// with every unit. Digital input/output status fields are only present for
/// I/O lines that physically exist on the hardware; their presence drives
/// capability detection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UnitSummary {
    /// Vendor terminal ID.
    #[serde(rename = "ID")]
    pub id: u64,

    /// Display name without any decoration.
    #[serde(rename = "NameOnly")]
    pub name: String,

    /// Vendor device type tag (`gps`, `tracker`, `bluetooth`).
    #[serde(rename = "DeviceType")]
    pub device_type: String,

    /// Device IMEI.
    #[serde(rename = "Imei")]
    pub imei: String,

    /// Hardware model name.
    #[serde(rename = "GpsModel")]
    pub model: String,

    /// GPS signal strength as a percentage.
    #[serde(rename = "GPS", deserialize_with = "flexible_percent")]
    pub gps_signal: Option<u8>,

    /// Last report timestamp, as the vendor formats it.
    #[serde(rename = "LastSeen")]
    pub last_seen: Option<String>,

    /// External battery voltage.
    #[serde(rename = "BatteryVoltage", deserialize_with = "flexible_f64")]
    pub battery_voltage: Option<f64>,

    /// Odometer reading in kilometers.
    #[serde(rename = "Odometer", deserialize_with = "flexible_f64")]
    pub odometer: Option<f64>,

    #[serde(rename = "Din1Status")]
    din1: Option<String>,
    #[serde(rename = "Din2Status")]
    din2: Option<String>,
    #[serde(rename = "Din3Status")]
    din3: Option<String>,
    #[serde(rename = "Din4Status")]
    din4: Option<String>,
    #[serde(rename = "Din5Status")]
    din5: Option<String>,
    #[serde(rename = "Din6Status")]
    din6: Option<String>,

    #[serde(rename = "Dout1Status")]
    dout1: Option<String>,
    #[serde(rename = "Dout2Status")]
    dout2: Option<String>,
    #[serde(rename = "Dout3Status")]
    dout3: Option<String>,
    #[serde(rename = "Dout4Status")]
    dout4: Option<String>,
    #[serde(rename = "Dout5Status")]
    dout5: Option<String>,
    #[serde(rename = "Dout6Status")]
    dout6: Option<String>,
}

impl UnitSummary {
    /// Returns the state of digital input `n` (1-6), or `None` when the
    /// input does not exist on this device.
    #[must_use]
    pub fn input_status(&self, n: u8) -> Option<bool> {
        let raw = match n {
            1 => &self.din1,
            2 => &self.din2,
            3 => &self.din3,
            4 => &self.din4,
            5 => &self.din5,
            6 => &self.din6,
            _ => return None,
        };
        status_is_on(raw.as_deref())
    }

    /// Returns the state of digital output `n` (1-6), or `None` when the
    /// output does not exist on this device.
    #[must_use]
    pub fn output_status(&self, n: u8) -> Option<bool> {
        let raw = match n {
            1 => &self.dout1,
            2 => &self.dout2,
            3 => &self.dout3,
            4 => &self.dout4,
            5 => &self.dout5,
            6 => &self.dout6,
            _ => return None,
        };
        status_is_on(raw.as_deref())
    }
}

/// Extra per-unit details from the edit-terminal endpoint.
///
/// The vendor nests most of this under a `terminal` object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UnitDetails {
    #[serde(rename = "terminal")]
    terminal: TerminalDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
struct TerminalDetails {
    #[serde(rename = "ReportFrequency", deserialize_with = "flexible_f64")]
    report_frequency: Option<f64>,

    #[serde(rename = "Temperature", deserialize_with = "flexible_f64")]
    temperature: Option<f64>,

    #[serde(rename = "Humidity", deserialize_with = "flexible_percent")]
    humidity: Option<u8>,

    #[serde(rename = "LowBatteryAlertEnabled")]
    low_battery_alert_enabled: Option<bool>,

    #[serde(rename = "LowBatteryThreshold", deserialize_with = "flexible_f64")]
    low_battery_threshold: Option<f64>,
}

impl UnitDetails {
    /// Reporting frequency in seconds.
    #[must_use]
    pub fn report_frequency(&self) -> Option<u32> {
        self.terminal.report_frequency.and_then(|f| {
            if f >= 0.0 {
                // Safe: non-negative and far below u32::MAX in practice
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Some(f as u32)
            } else {
                None
            }
        })
    }

    /// Ambient temperature in degrees Celsius, for units with an attached
    /// environment sensor.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        self.terminal.temperature
    }

    /// Relative humidity percentage, for units with an attached
    /// environment sensor.
    #[must_use]
    pub fn humidity(&self) -> Option<u8> {
        self.terminal.humidity
    }

    /// Whether the low-battery alert is enabled.
    #[must_use]
    pub fn low_battery_alert_enabled(&self) -> Option<bool> {
        self.terminal.low_battery_alert_enabled
    }

    /// Configured low-battery voltage threshold.
    #[must_use]
    pub fn low_battery_threshold(&self) -> Option<f64> {
        self.terminal.low_battery_threshold
    }
}

/// Lock status from the access endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LockStatus {
    /// Whether the alarm/lock is armed.
    #[serde(rename = "lockedstatus")]
    pub locked: Option<bool>,
}

/// One entry of the `gps` array from the realtime-tracking endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GpsFix {
    /// Vendor terminal ID this fix belongs to.
    #[serde(rename = "TrackerID")]
    pub tracker_id: u64,

    /// Whether the device currently has a position fix.
    #[serde(rename = "HasPosition")]
    pub has_position: bool,

    #[serde(rename = "Latitude", deserialize_with = "flexible_f64")]
    latitude: Option<f64>,

    #[serde(rename = "Longitude", deserialize_with = "flexible_f64")]
    longitude: Option<f64>,

    #[serde(rename = "GPSAccuracy", deserialize_with = "flexible_f64")]
    accuracy: Option<f64>,

    /// Cellular network signal quality as a percentage.
    #[serde(rename = "NetworkQuality", deserialize_with = "flexible_percent")]
    pub network_signal: Option<u8>,

    /// Internal battery level, possibly formatted as `"85 %"`.
    #[serde(rename = "BatteryPercentage", deserialize_with = "flexible_percent")]
    pub battery_percentage: Option<u8>,

    #[serde(rename = "Speed", deserialize_with = "flexible_f64")]
    speed: Option<f64>,

    #[serde(rename = "Azimuth", deserialize_with = "flexible_f64")]
    azimuth: Option<f64>,
}

impl GpsFix {
    /// Latitude in degrees, validated to [-90, 90].
    ///
    /// Returns `None` without a position fix or when the value is out of
    /// range (logged as a warning).
    #[must_use]
    pub fn latitude(&self) -> Option<f64> {
        if !self.has_position {
            return None;
        }
        self.latitude.filter(|lat| {
            let ok = (-90.0..=90.0).contains(lat);
            if !ok {
                tracing::warn!(tracker_id = self.tracker_id, latitude = lat, "invalid latitude");
            }
            ok
        })
    }

    /// Longitude in degrees, validated to [-180, 180].
    #[must_use]
    pub fn longitude(&self) -> Option<f64> {
        if !self.has_position {
            return None;
        }
        self.longitude.filter(|lon| {
            let ok = (-180.0..=180.0).contains(lon);
            if !ok {
                tracing::warn!(
                    tracker_id = self.tracker_id,
                    longitude = lon,
                    "invalid longitude"
                );
            }
            ok
        })
    }

    /// GPS accuracy in meters.
    #[must_use]
    pub fn accuracy(&self) -> Option<u32> {
        if !self.has_position {
            return None;
        }
        self.accuracy.and_then(|a| {
            if a >= 0.0 {
                // Safe: non-negative, meters fit comfortably in u32
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Some(a as u32)
            } else {
                None
            }
        })
    }

    /// Current speed in km/h.
    #[must_use]
    pub fn speed(&self) -> Option<u32> {
        self.speed.and_then(|s| {
            if s >= 0.0 {
                // Safe: non-negative, km/h fits comfortably in u32
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Some(s as u32)
            } else {
                None
            }
        })
    }

    /// Course over ground in degrees, validated to [0, 359].
    #[must_use]
    pub fn course(&self) -> Option<u16> {
        self.azimuth.and_then(|a| {
            if (0.0..=359.0).contains(&a) {
                // Safe: range-checked above
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Some(a as u16)
            } else {
                tracing::warn!(tracker_id = self.tracker_id, azimuth = a, "invalid course");
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_unit_json() -> &'static str {
        r#"{
            "ID": 4711,
            "NameOnly": "Trailer",
            "DeviceType": "gps",
            "Imei": "350317703942710",
            "GpsModel": "NT-50",
            "GPS": 90,
            "LastSeen": "2024-05-01 10:00:00",
            "BatteryVoltage": "12.6",
            "Odometer": 1523.4,
            "Din1Status": "On",
            "Dout1Status": "Off",
            "Dout2Status": "On"
        }"#
    }

    #[test]
    fn unit_summary_parses_identity() {
        let unit: UnitSummary = serde_json::from_str(sample_unit_json()).unwrap();
        assert_eq!(unit.id, 4711);
        assert_eq!(unit.name, "Trailer");
        assert_eq!(unit.device_type, "gps");
        assert_eq!(unit.imei, "350317703942710");
        assert_eq!(unit.model, "NT-50");
    }

    #[test]
    fn unit_summary_parses_telemetry() {
        let unit: UnitSummary = serde_json::from_str(sample_unit_json()).unwrap();
        assert_eq!(unit.battery_voltage, Some(12.6));
        assert_eq!(unit.odometer, Some(1523.4));
        assert_eq!(unit.gps_signal, Some(90));
    }

    #[test]
    fn io_status_present_only_for_reported_lines() {
        let unit: UnitSummary = serde_json::from_str(sample_unit_json()).unwrap();
        assert_eq!(unit.input_status(1), Some(true));
        assert_eq!(unit.input_status(2), None);
        assert_eq!(unit.output_status(1), Some(false));
        assert_eq!(unit.output_status(2), Some(true));
        assert_eq!(unit.output_status(3), None);
        // Out-of-range line numbers
        assert_eq!(unit.input_status(0), None);
        assert_eq!(unit.output_status(7), None);
    }

    #[test]
    fn absent_telemetry_is_none_not_zero() {
        let unit: UnitSummary = serde_json::from_str(r#"{"ID": 1, "NameOnly": "x"}"#).unwrap();
        assert_eq!(unit.battery_voltage, None);
        assert_eq!(unit.odometer, None);
        assert_eq!(unit.gps_signal, None);
        assert_eq!(unit.last_seen, None);
    }

    #[test]
    fn unit_details_nested_terminal() {
        let details: UnitDetails = serde_json::from_str(
            r#"{"terminal": {
                "ReportFrequency": 300,
                "Temperature": -4.5,
                "Humidity": 62,
                "LowBatteryAlertEnabled": true,
                "LowBatteryThreshold": 12.1
            }}"#,
        )
        .unwrap();

        assert_eq!(details.report_frequency(), Some(300));
        assert_eq!(details.temperature(), Some(-4.5));
        assert_eq!(details.humidity(), Some(62));
        assert_eq!(details.low_battery_alert_enabled(), Some(true));
        assert_eq!(details.low_battery_threshold(), Some(12.1));
    }

    #[test]
    fn unit_details_empty_payload() {
        let details: UnitDetails = serde_json::from_str("{}").unwrap();
        assert_eq!(details.report_frequency(), None);
        assert_eq!(details.temperature(), None);
        assert_eq!(details.low_battery_threshold(), None);
    }

    #[test]
    fn gps_fix_with_position() {
        let fix: GpsFix = serde_json::from_str(
            r#"{
                "TrackerID": 4711,
                "HasPosition": true,
                "Latitude": "59.3293",
                "Longitude": 18.0686,
                "GPSAccuracy": 8,
                "NetworkQuality": 76,
                "BatteryPercentage": "85 %",
                "Speed": 43,
                "Azimuth": 270
            }"#,
        )
        .unwrap();

        assert_eq!(fix.latitude(), Some(59.3293));
        assert_eq!(fix.longitude(), Some(18.0686));
        assert_eq!(fix.accuracy(), Some(8));
        assert_eq!(fix.network_signal, Some(76));
        assert_eq!(fix.battery_percentage, Some(85));
        assert_eq!(fix.speed(), Some(43));
        assert_eq!(fix.course(), Some(270));
    }

    #[test]
    fn gps_fix_without_position_hides_coordinates() {
        let fix: GpsFix = serde_json::from_str(
            r#"{"TrackerID": 1, "HasPosition": false, "Latitude": 59.0, "Longitude": 18.0}"#,
        )
        .unwrap();

        assert_eq!(fix.latitude(), None);
        assert_eq!(fix.longitude(), None);
        assert_eq!(fix.accuracy(), None);
    }

    #[test]
    fn gps_fix_rejects_out_of_range_coordinates() {
        let fix: GpsFix = serde_json::from_str(
            r#"{"TrackerID": 1, "HasPosition": true, "Latitude": 95.0, "Longitude": -200.0}"#,
        )
        .unwrap();

        assert_eq!(fix.latitude(), None);
        assert_eq!(fix.longitude(), None);
    }

    #[test]
    fn gps_fix_rejects_out_of_range_course() {
        let fix: GpsFix =
            serde_json::from_str(r#"{"TrackerID": 1, "Azimuth": 400}"#).unwrap();
        assert_eq!(fix.course(), None);
    }

    #[test]
    fn lock_status_parses() {
        let lock: LockStatus = serde_json::from_str(r#"{"lockedstatus": true}"#).unwrap();
        assert_eq!(lock.locked, Some(true));

        let lock: LockStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(lock.locked, None);
    }
}
