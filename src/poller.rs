// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interval poller for the device fleet.
//!
//! The [`Poller`] drives the fetch cycle: list all units, merge in the
//! latest GPS fixes, then fetch per-device extras with bounded parallelism.
//! Each successful cycle publishes a [`PollSnapshot`] and broadcasts
//! [`PollEvent`]s describing what changed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::api::ApiClient;
use crate::config::{BackoffPolicy, TrackerConfig};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::event::{EventBus, PollEvent};
use crate::telemetry::GpsFix;

/// Maximum concurrent per-device detail fetches within one poll.
const MAX_CONCURRENT_FETCHES: usize = 5;

/// The fleet state produced by one poll cycle.
///
/// Devices are keyed by terminal ID in a `BTreeMap`, so iteration order is
/// deterministic regardless of the order the per-device fetches finished in.
#[derive(Debug, Clone, Default)]
pub struct PollSnapshot {
    devices: BTreeMap<u64, Device>,
    degraded: BTreeMap<u64, String>,
    taken_at: Option<DateTime<Utc>>,
}

impl PollSnapshot {
    /// Returns the device with the given ID.
    #[must_use]
    pub fn device(&self, device_id: u64) -> Option<&Device> {
        self.devices.get(&device_id)
    }

    /// Iterates the devices in ascending ID order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Returns the device IDs in ascending order.
    #[must_use]
    pub fn device_ids(&self) -> Vec<u64> {
        self.devices.keys().copied().collect()
    }

    /// Returns the number of devices in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` when the snapshot holds no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices whose extras failed to fetch this cycle, with the reason.
    #[must_use]
    pub fn degraded(&self) -> &BTreeMap<u64, String> {
        &self.degraded
    }

    /// When this snapshot was taken, or `None` before the first poll.
    #[must_use]
    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }
}

/// Periodic poller for a North-Tracker account.
///
/// Cheap to clone; clones share the client, the snapshot, and the event
/// bus. A spawned poller keeps its own clone, so the original can keep
/// serving snapshot reads.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use northtracker_lib::api::ApiClient;
/// use northtracker_lib::config::TrackerConfig;
/// use northtracker_lib::poller::Poller;
///
/// # async fn example() -> northtracker_lib::Result<()> {
/// let config = TrackerConfig::new("fleet@example.com", "secret");
/// let client = Arc::new(ApiClient::new(&config)?);
/// let poller = Poller::new(client, &config);
///
/// let mut events = poller.subscribe();
/// let handle = poller.spawn();
///
/// while let Ok(event) = events.recv().await {
///     println!("{event:?}");
/// }
///
/// handle.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Poller {
    client: Arc<ApiClient>,
    scan_interval: std::time::Duration,
    backoff: BackoffPolicy,
    event_bus: EventBus,
    snapshot: Arc<parking_lot::RwLock<PollSnapshot>>,
}

impl Poller {
    /// Creates a poller using the configured scan interval.
    #[must_use]
    pub fn new(client: Arc<ApiClient>, config: &TrackerConfig) -> Self {
        Self {
            client,
            scan_interval: config.scan_interval(),
            backoff: BackoffPolicy::default(),
            event_bus: EventBus::new(),
            snapshot: Arc::new(parking_lot::RwLock::new(PollSnapshot::default())),
        }
    }

    /// Sets the backoff policy applied after rate-limited polls.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Subscribes to poll events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.event_bus.subscribe()
    }

    /// Returns a copy of the latest snapshot.
    #[must_use]
    pub fn latest_snapshot(&self) -> PollSnapshot {
        self.snapshot.read().clone()
    }

    /// Returns the latest state of one device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] when the device is not in the
    /// latest snapshot.
    pub fn device(&self, device_id: u64) -> Result<Device> {
        self.snapshot
            .read()
            .device(device_id)
            .cloned()
            .ok_or(Error::DeviceNotFound)
    }

    /// Runs one full poll cycle.
    ///
    /// Fetch order: unit summaries first (fatal on failure), then GPS fixes
    /// (non-fatal), then per-device details and lock status with at most
    /// [`MAX_CONCURRENT_FETCHES`] requests in flight. A device whose extras
    /// fail stays in the snapshot with its summary data and is reported as
    /// degraded.
    ///
    /// The snapshot swap and all event publishing happen only after every
    /// fetch has finished, so a cycle that is cancelled mid-flight leaves
    /// the previous snapshot untouched and publishes nothing.
    ///
    /// # Errors
    ///
    /// Returns the unit-listing error when the fleet cannot be fetched at
    /// all; rate limiting surfaces as
    /// [`ApiError::RateLimited`](crate::error::ApiError::RateLimited)
    /// without any internal retry. An authentication failure during any
    /// fetch aborts the whole cycle: the session is re-established at most
    /// once per tick, and a rejected re-login voids the cycle instead of
    /// degrading devices one by one.
    pub async fn poll_once(&self) -> Result<PollSnapshot> {
        // One fresh login attempt per tick.
        self.client.reset_login_failure().await;
        let units = self.client.all_units().await?;

        // Position data is an enrichment; a failed fetch degrades nothing
        // but location.
        let mut fixes: HashMap<u64, GpsFix> = match self.client.realtime_tracking().await {
            Ok(fixes) => fixes.into_iter().map(|f| (f.tracker_id, f)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "GPS fetch failed, polling without positions");
                HashMap::new()
            }
        };

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES));
        let mut tasks = JoinSet::new();

        for unit in units {
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let gps = fixes.remove(&unit.id);

            tasks.spawn(async move {
                // Closing the semaphore is not part of this flow, so the
                // acquire cannot fail while the poll is running.
                let _permit = semaphore.acquire().await;

                let mut failure = None;

                let details = match client.unit_details(unit.id, &unit.device_type).await {
                    Ok(details) => Some(details),
                    Err(Error::Api(e)) if e.is_auth_expired() => return Err(Error::Api(e)),
                    Err(e) => {
                        failure = Some(format!("details fetch failed: {e}"));
                        None
                    }
                };

                let lock = match client.lock_status(unit.id).await {
                    Ok(lock) => Some(lock),
                    Err(Error::Api(e)) if e.is_auth_expired() => return Err(Error::Api(e)),
                    Err(e) => {
                        if failure.is_none() {
                            failure = Some(format!("lock status fetch failed: {e}"));
                        }
                        None
                    }
                };

                Ok((Device::from_poll(unit, details, lock, gps), failure))
            });
        }

        let mut devices = BTreeMap::new();
        let mut degraded = BTreeMap::new();
        let mut auth_error = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((device, failure))) => {
                    if let Some(reason) = failure {
                        tracing::warn!(device_id = device.id(), %reason, "device degraded");
                        degraded.insert(device.id(), reason);
                    }
                    devices.insert(device.id(), device);
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "session lost during poll");
                    auth_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "device fetch task failed");
                }
            }
        }

        // A lost session voids the whole cycle; the previous snapshot
        // stays in place and nothing is published.
        if let Some(e) = auth_error {
            return Err(e);
        }

        let snapshot = PollSnapshot {
            devices,
            degraded,
            taken_at: Some(Utc::now()),
        };

        // Publish point: no awaits from here on, so cancellation before
        // this line leaves the previous snapshot in place.
        let previous_ids: Vec<u64> = {
            let mut guard = self.snapshot.write();
            let previous = guard.device_ids();
            *guard = snapshot.clone();
            previous
        };

        for id in snapshot.devices.keys() {
            if !previous_ids.contains(id) {
                self.event_bus.publish(PollEvent::device_discovered(*id));
            }
        }
        for (id, reason) in &snapshot.degraded {
            self.event_bus
                .publish(PollEvent::device_degraded(*id, reason.clone()));
        }
        self.event_bus
            .publish(PollEvent::poll_completed(snapshot.len(), snapshot.degraded.len()));

        tracing::debug!(
            devices = snapshot.len(),
            degraded = snapshot.degraded.len(),
            "poll completed"
        );

        Ok(snapshot)
    }

    /// Spawns the polling loop on the current runtime.
    ///
    /// The first poll runs immediately; later polls follow the scan
    /// interval. Ticks that would overlap a still-running poll are skipped,
    /// so at most one poll is in flight at any time. After a rate-limited
    /// poll the loop sleeps out the backoff delay (or the server's
    /// `Retry-After`, whichever is longer) and then polls again right away;
    /// no request leaves during the backoff window.
    #[must_use]
    pub fn spawn(&self) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let poller = self.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poller.scan_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut rate_limited_attempts: u32 = 0;

            'ticks: loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {}
                }

                // Inner loop so a rate-limited poll is retried after its
                // backoff window instead of waiting for the next tick.
                loop {
                    let result = tokio::select! {
                        _ = shutdown_rx.changed() => break 'ticks,
                        result = poller.poll_once() => result,
                    };

                    match result {
                        Ok(_) => {
                            rate_limited_attempts = 0;
                            break;
                        }
                        Err(Error::Api(e)) if e.is_auth_expired() => {
                            tracing::warn!(error = %e, "session expired and refresh failed");
                            poller.event_bus.publish(PollEvent::AuthExpired);
                            break;
                        }
                        Err(Error::Api(crate::error::ApiError::RateLimited {
                            retry_after_secs,
                        })) => {
                            let mut delay = poller.backoff.delay_for_attempt(rate_limited_attempts);
                            if let Some(hint) = retry_after_secs {
                                delay = delay.max(std::time::Duration::from_secs(hint));
                            }
                            rate_limited_attempts = rate_limited_attempts.saturating_add(1);

                            tracing::warn!(delay_secs = delay.as_secs(), "rate limited, backing off");
                            poller.event_bus.publish(PollEvent::RateLimited {
                                backoff_secs: delay.as_secs(),
                            });

                            tokio::select! {
                                _ = shutdown_rx.changed() => break 'ticks,
                                () = tokio::time::sleep(delay) => {}
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "poll failed");
                            break;
                        }
                    }
                }
            }

            tracing::debug!("poller stopped");
        });

        PollerHandle { shutdown_tx, task }
    }
}

impl Clone for Poller {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            scan_interval: self.scan_interval,
            backoff: self.backoff.clone(),
            event_bus: self.event_bus.clone(),
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

/// Handle to a spawned polling loop.
#[derive(Debug)]
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl PollerHandle {
    /// Signals the loop to stop and waits for it to finish.
    ///
    /// A poll that is mid-flight is abandoned without publishing anything.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }

    /// Returns `true` when the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let snapshot = PollSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
        assert_eq!(snapshot.taken_at(), None);
        assert!(snapshot.device(1).is_none());
    }

    #[test]
    fn snapshot_orders_devices_by_id() {
        let mut devices = BTreeMap::new();
        for id in [30_u64, 10, 20] {
            let summary: crate::telemetry::UnitSummary = serde_json::from_str(&format!(
                r#"{{"ID": {id}, "NameOnly": "unit-{id}"}}"#
            ))
            .unwrap();
            devices.insert(id, Device::from_poll(summary, None, None, None));
        }
        let snapshot = PollSnapshot {
            devices,
            degraded: BTreeMap::new(),
            taken_at: Some(Utc::now()),
        };

        assert_eq!(snapshot.device_ids(), vec![10, 20, 30]);
        let names: Vec<&str> = snapshot.devices().map(Device::name).collect();
        assert_eq!(names, vec!["unit-10", "unit-20", "unit-30"]);
    }
}
