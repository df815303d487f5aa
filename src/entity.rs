// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability-driven entity mapping.
//!
//! [`map_entities`] turns a polled [`Device`] into the list of entity
//! descriptors a home-automation platform should create for it. The mapping
//! is a fixed table: a descriptor is emitted exactly when the device
//! reports the matching capability or telemetry channel, so the same device
//! state always yields the same descriptors in the same order.

use crate::capabilities::MAX_IO_LINES;
use crate::device::Device;

/// Lowest accepted low-battery voltage threshold.
pub const MIN_BATTERY_VOLTAGE_THRESHOLD: f64 = 10.0;
/// Highest accepted low-battery voltage threshold.
pub const MAX_BATTERY_VOLTAGE_THRESHOLD: f64 = 14.0;

/// The platform an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Location tracker entity.
    Tracker,
    /// Read-only measurement.
    Sensor,
    /// Read-only on/off state (digital inputs).
    BinarySensor,
    /// Controllable on/off state (digital outputs, alarm, alert toggle).
    Switch,
    /// Controllable numeric setting (low-battery threshold).
    Number,
}

/// Describes one entity a device should expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// The device this entity belongs to.
    pub device_id: u64,
    /// The platform kind.
    pub kind: EntityKind,
    /// Stable key within the device (`battery_voltage`, `output_1`, ...).
    pub key: String,
    /// Globally unique ID, `{device_id}_{key}`.
    pub unique_id: String,
    /// Unit of measurement for sensors and numbers.
    pub unit: Option<&'static str>,
}

impl EntityDescriptor {
    fn new(device_id: u64, kind: EntityKind, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            unique_id: format!("{device_id}_{key}"),
            device_id,
            kind,
            key,
            unit: None,
        }
    }

    fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// Sensor channels in their fixed emission order.
const SENSOR_TABLE: &[(&str, Option<&str>, fn(&Device) -> bool)] = &[
    ("last_seen", None, |d| d.last_seen().is_some()),
    ("battery_voltage", Some("V"), |d| {
        d.battery_voltage().is_some()
    }),
    ("battery_percentage", Some("%"), |d| {
        d.internal_battery().is_some()
    }),
    ("odometer", Some("km"), |d| d.odometer().is_some()),
    ("gps_signal", Some("%"), |d| d.gps_signal().is_some()),
    ("network_signal", Some("%"), |d| d.network_signal().is_some()),
    ("speed", Some("km/h"), |d| d.speed().is_some()),
    ("report_frequency", Some("s"), |d| {
        d.report_frequency().is_some()
    }),
    ("temperature", Some("°C"), |d| d.temperature().is_some()),
    ("humidity", Some("%"), |d| d.humidity().is_some()),
];

/// Maps a device to its entity descriptors.
///
/// Every device gets a tracker entity. Everything else follows the
/// capability set: one switch per present output, one binary sensor per
/// present input, a switch for the alarm, and a switch plus a threshold
/// number for the low-battery alert. Sensors follow the telemetry channels
/// actually reported.
///
/// The result is deterministic for a given device state, and calling this
/// again on an unchanged device yields the identical list.
///
/// # Examples
///
/// ```
/// use northtracker_lib::entity::{map_entities, EntityKind};
/// # use northtracker_lib::Device;
/// # fn demo(device: &Device) {
/// let entities = map_entities(device);
/// assert_eq!(entities[0].kind, EntityKind::Tracker);
/// # }
/// ```
#[must_use]
pub fn map_entities(device: &Device) -> Vec<EntityDescriptor> {
    let id = device.id();
    let caps = device.capabilities();
    let mut entities = Vec::new();

    entities.push(EntityDescriptor::new(id, EntityKind::Tracker, "tracker"));

    for (key, unit, exists) in SENSOR_TABLE {
        if exists(device) {
            let mut descriptor = EntityDescriptor::new(id, EntityKind::Sensor, *key);
            descriptor.unit = *unit;
            entities.push(descriptor);
        }
    }

    for n in 1..=MAX_IO_LINES as u8 {
        if caps.has_input(n) {
            entities.push(EntityDescriptor::new(
                id,
                EntityKind::BinarySensor,
                format!("input_{n}"),
            ));
        }
    }

    for n in 1..=MAX_IO_LINES as u8 {
        if caps.has_output(n) {
            entities.push(EntityDescriptor::new(
                id,
                EntityKind::Switch,
                format!("output_{n}"),
            ));
        }
    }

    if caps.alarm {
        entities.push(EntityDescriptor::new(id, EntityKind::Switch, "alarm"));
    }

    if caps.low_battery_alert {
        entities.push(EntityDescriptor::new(
            id,
            EntityKind::Switch,
            "low_battery_alert",
        ));
        entities.push(
            EntityDescriptor::new(id, EntityKind::Number, "low_battery_threshold")
                .with_unit("V"),
        );
    }

    entities
}
