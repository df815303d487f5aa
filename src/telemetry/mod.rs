// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload types for North-Tracker API responses.
//!
//! The vendor returns loosely typed JSON: numbers may arrive as strings,
//! percentages may carry a `%` suffix, and fields are simply omitted on
//! older device firmware. Every field here deserializes permissively into
//! an `Option`, and the accessors validate value ranges before exposing
//! them. Absence of a field is meaningful -- it marks a capability or
//! telemetry channel the device does not have -- so absence is never
//! collapsed into a zero value.

mod payload;

pub use payload::{GpsFix, LockStatus, UnitDetails, UnitSummary};

use serde::{Deserialize, Deserializer};

/// Deserializes a value that may arrive as a JSON number or a numeric string.
pub(crate) fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    let value = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        NumberOrString::Number(n) => Some(n),
        NumberOrString::String(s) => s.trim().parse().ok(),
    }))
}

/// Deserializes a percentage that may arrive as a number or as `"85 %"`.
pub(crate) fn flexible_percent<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PercentValue {
        Number(f64),
        String(String),
    }

    let value = Option::<PercentValue>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        let number = match v {
            PercentValue::Number(n) => n,
            PercentValue::String(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        };
        if (0.0..=100.0).contains(&number) {
            // Safe: range-checked above
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Some(number as u8)
        } else {
            None
        }
    }))
}

/// Returns `true` when an I/O status string means the line is active.
pub(crate) fn status_is_on(status: Option<&str>) -> Option<bool> {
    status.map(|s| s.eq_ignore_ascii_case("on"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "flexible_f64")]
        value: Option<f64>,
        #[serde(default, deserialize_with = "flexible_percent")]
        percent: Option<u8>,
    }

    #[test]
    fn flexible_f64_accepts_number() {
        let probe: Probe = serde_json::from_str(r#"{"value": 12.6}"#).unwrap();
        assert_eq!(probe.value, Some(12.6));
    }

    #[test]
    fn flexible_f64_accepts_numeric_string() {
        let probe: Probe = serde_json::from_str(r#"{"value": "12.6"}"#).unwrap();
        assert_eq!(probe.value, Some(12.6));
    }

    #[test]
    fn flexible_f64_rejects_garbage() {
        let probe: Probe = serde_json::from_str(r#"{"value": "n/a"}"#).unwrap();
        assert_eq!(probe.value, None);
    }

    #[test]
    fn flexible_f64_missing_is_none() {
        let probe: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(probe.value, None);
    }

    #[test]
    fn flexible_percent_strips_suffix() {
        let probe: Probe = serde_json::from_str(r#"{"percent": "85 %"}"#).unwrap();
        assert_eq!(probe.percent, Some(85));
    }

    #[test]
    fn flexible_percent_accepts_number() {
        let probe: Probe = serde_json::from_str(r#"{"percent": 42}"#).unwrap();
        assert_eq!(probe.percent, Some(42));
    }

    #[test]
    fn flexible_percent_rejects_out_of_range() {
        let probe: Probe = serde_json::from_str(r#"{"percent": 150}"#).unwrap();
        assert_eq!(probe.percent, None);
    }

    #[test]
    fn status_is_on_parses_case_insensitively() {
        assert_eq!(status_is_on(Some("On")), Some(true));
        assert_eq!(status_is_on(Some("ON")), Some(true));
        assert_eq!(status_is_on(Some("Off")), Some(false));
        assert_eq!(status_is_on(None), None);
    }
}
