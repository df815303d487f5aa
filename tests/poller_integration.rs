// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the poll cycle using wiremock.

use std::sync::Arc;
use std::time::Duration;

use northtracker_lib::entity::{map_entities, EntityKind};
use northtracker_lib::poller::Poller;
use northtracker_lib::{ApiClient, ApiError, BackoffPolicy, Error, Location, PollEvent, TrackerConfig};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn poller_for(server: &MockServer) -> Poller {
    let config = TrackerConfig::new("fleet@example.com", "secret");
    let client = ApiClient::builder()
        .credentials(config.username(), config.password())
        .base_url(server.uri())
        .build()
        .unwrap();
    Poller::new(Arc::new(client), &config)
}

fn ok_envelope(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "success": true,
        "data": data
    }))
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ok_envelope(serde_json::json!({"user": {"token": "token-1"}})))
        .mount(server)
        .await;
}

async fn mount_units(server: &MockServer, units: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/user/terminal/get-all-units-details"))
        .respond_with(ok_envelope(serde_json::json!({"units": units})))
        .mount(server)
        .await;
}

async fn mount_gps(server: &MockServer, gps: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/user/realtimetracking/get"))
        .respond_with(ok_envelope(serde_json::json!({"gps": gps})))
        .mount(server)
        .await;
}

async fn mount_details(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/user/terminal/edit-terminal"))
        .respond_with(ok_envelope(serde_json::json!({
            "terminal": {"ReportFrequency": 300}
        })))
        .mount(server)
        .await;
}

async fn mount_lock(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/user/terminal/access/lockstatus"))
        .respond_with(ok_envelope(serde_json::json!({"lockedstatus": false})))
        .mount(server)
        .await;
}

async fn unit_listing_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/user/terminal/get-all-units-details")
        .count()
}

fn two_units() -> serde_json::Value {
    serde_json::json!([
        {
            "ID": 20,
            "NameOnly": "Trailer",
            "DeviceType": "gps",
            "Imei": "350000000000020",
            "BatteryVoltage": 12.6,
            "Dout1Status": "Off"
        },
        {
            "ID": 10,
            "NameOnly": "Van",
            "DeviceType": "gps",
            "Imei": "350000000000010"
        }
    ])
}

// ============================================================================
// Poll cycle
// ============================================================================

mod poll_cycle {
    use super::*;

    #[tokio::test]
    async fn poll_merges_units_gps_and_extras() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_units(&server, two_units()).await;
        mount_gps(
            &server,
            serde_json::json!([{
                "TrackerID": 20,
                "HasPosition": true,
                "Latitude": 59.3293,
                "Longitude": 18.0686,
                "GPSAccuracy": 8
            }]),
        )
        .await;
        mount_details(&server).await;
        mount_lock(&server).await;

        let poller = poller_for(&server);
        let snapshot = poller.poll_once().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.degraded().is_empty());

        let trailer = snapshot.device(20).unwrap();
        assert_eq!(trailer.name(), "Trailer");
        assert_eq!(trailer.report_frequency(), Some(300));
        assert_eq!(trailer.alarm_armed(), Some(false));
        assert!(matches!(
            trailer.location(),
            Location::Known { accuracy: Some(8), .. }
        ));

        // The van had no GPS entry; its location stays unknown.
        let van = snapshot.device(10).unwrap();
        assert_eq!(van.location(), Location::Unknown);
    }

    #[tokio::test]
    async fn snapshot_order_is_deterministic() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_units(&server, two_units()).await;
        mount_gps(&server, serde_json::json!([])).await;
        mount_details(&server).await;
        mount_lock(&server).await;

        let poller = poller_for(&server);
        let snapshot = poller.poll_once().await.unwrap();

        // IDs ascend regardless of the order the API listed them in.
        assert_eq!(snapshot.device_ids(), vec![10, 20]);
    }

    #[tokio::test]
    async fn failed_extras_degrade_device_but_keep_it() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_units(&server, two_units()).await;
        mount_gps(&server, serde_json::json!([])).await;
        mount_lock(&server).await;

        // Details fail only for device 20.
        Mock::given(method("POST"))
            .and(path("/user/terminal/edit-terminal"))
            .and(body_partial_json(serde_json::json!({"device_id": 20})))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/terminal/edit-terminal"))
            .and(body_partial_json(serde_json::json!({"device_id": 10})))
            .respond_with(ok_envelope(serde_json::json!({
                "terminal": {"ReportFrequency": 300}
            })))
            .mount(&server)
            .await;

        let poller = poller_for(&server);
        let mut events = poller.subscribe();
        let snapshot = poller.poll_once().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.degraded().contains_key(&20));
        assert!(!snapshot.degraded().contains_key(&10));

        // Summary data of the degraded device is still available.
        let trailer = snapshot.device(20).unwrap();
        assert_eq!(trailer.battery_voltage(), Some(12.6));
        assert_eq!(trailer.report_frequency(), None);

        // Events: two discoveries, one degraded, one completion.
        let mut discovered = 0;
        let mut degraded = 0;
        let mut completed = None;
        while let Ok(event) = events.try_recv() {
            match event {
                PollEvent::DeviceDiscovered { .. } => discovered += 1,
                PollEvent::DeviceDegraded { device_id, .. } => {
                    assert_eq!(device_id, 20);
                    degraded += 1;
                }
                PollEvent::PollCompleted { devices, degraded } => {
                    completed = Some((devices, degraded));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(discovered, 2);
        assert_eq!(degraded, 1);
        assert_eq!(completed, Some((2, 1)));
    }

    #[tokio::test]
    async fn gps_failure_is_not_fatal() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_units(&server, two_units()).await;
        mount_details(&server).await;
        mount_lock(&server).await;

        Mock::given(method("GET"))
            .and(path("/user/realtimetracking/get"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let poller = poller_for(&server);
        let snapshot = poller.poll_once().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        for device in snapshot.devices() {
            assert_eq!(device.location(), Location::Unknown);
        }
    }

    #[tokio::test]
    async fn unit_listing_failure_is_fatal_and_keeps_previous_snapshot() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_gps(&server, serde_json::json!([])).await;
        mount_details(&server).await;
        mount_lock(&server).await;

        // First listing succeeds, the second fails.
        Mock::given(method("GET"))
            .and(path("/user/terminal/get-all-units-details"))
            .respond_with(ok_envelope(serde_json::json!({"units": two_units()})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/terminal/get-all-units-details"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let poller = poller_for(&server);
        poller.poll_once().await.unwrap();
        assert_eq!(poller.latest_snapshot().len(), 2);

        let err = poller.poll_once().await.unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Status { status: 500 })));
        // The previous snapshot is untouched.
        assert_eq!(poller.latest_snapshot().len(), 2);
    }

    #[tokio::test]
    async fn rate_limited_poll_surfaces_without_retry() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("GET"))
            .and(path("/user/terminal/get-all-units-details"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "60"))
            .expect(1)
            .mount(&server)
            .await;

        let poller = poller_for(&server);
        let err = poller.poll_once().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Api(ApiError::RateLimited {
                retry_after_secs: Some(60)
            })
        ));
        assert!(poller.latest_snapshot().is_empty());
    }

    #[tokio::test]
    async fn revoked_credentials_abort_the_cycle_with_one_relogin() {
        let server = MockServer::start().await;

        // The session is established once; the re-login after revocation
        // is rejected, and must happen at most once for the whole cycle.
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ok_envelope(serde_json::json!({"user": {"token": "token-1"}})))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        mount_units(
            &server,
            serde_json::json!([
                {"ID": 10, "NameOnly": "Van", "DeviceType": "gps", "Imei": "350000000000010"},
                {"ID": 20, "NameOnly": "Trailer", "DeviceType": "gps", "Imei": "350000000000020"},
                {"ID": 30, "NameOnly": "Truck", "DeviceType": "gps", "Imei": "350000000000030"}
            ]),
        )
        .await;
        mount_gps(&server, serde_json::json!([])).await;

        // Every per-device fetch hits the revoked token.
        Mock::given(method("POST"))
            .and(path("/user/terminal/edit-terminal"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/terminal/access/lockstatus"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let poller = poller_for(&server);
        let mut events = poller.subscribe();

        let err = poller.poll_once().await.unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::InvalidAuth(_))));

        // The cycle is void: no devices, not even degraded ones, and no
        // events.
        assert!(poller.latest_snapshot().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn discovery_events_fire_only_for_new_devices() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_units(&server, two_units()).await;
        mount_gps(&server, serde_json::json!([])).await;
        mount_details(&server).await;
        mount_lock(&server).await;

        let poller = poller_for(&server);
        poller.poll_once().await.unwrap();

        let mut events = poller.subscribe();
        poller.poll_once().await.unwrap();

        let mut discovered = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, PollEvent::DeviceDiscovered { .. }) {
                discovered += 1;
            }
        }
        assert_eq!(discovered, 0);
    }

    #[tokio::test]
    async fn device_lookup_after_poll() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_units(&server, two_units()).await;
        mount_gps(&server, serde_json::json!([])).await;
        mount_details(&server).await;
        mount_lock(&server).await;

        let poller = poller_for(&server);
        assert!(matches!(poller.device(10), Err(Error::DeviceNotFound)));

        poller.poll_once().await.unwrap();
        assert_eq!(poller.device(10).unwrap().name(), "Van");
        assert!(matches!(poller.device(999), Err(Error::DeviceNotFound)));
    }
}

// ============================================================================
// Poll loop
// ============================================================================

mod poll_loop {
    use super::*;

    #[tokio::test]
    async fn spawned_loop_polls_immediately_and_shuts_down() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_units(&server, two_units()).await;
        mount_gps(&server, serde_json::json!([])).await;
        mount_details(&server).await;
        mount_lock(&server).await;

        let poller = poller_for(&server);
        let mut events = poller.subscribe();
        let handle = poller.spawn();

        // The first tick fires immediately; wait for its completion event.
        let completed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let PollEvent::PollCompleted { devices, .. } = events.recv().await.unwrap() {
                    break devices;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(completed, 2);
        assert_eq!(poller.latest_snapshot().len(), 2);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn rate_limited_loop_waits_out_the_backoff_window() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_gps(&server, serde_json::json!([])).await;

        // First listing is rate limited; every later one succeeds.
        Mock::given(method("GET"))
            .and(path("/user/terminal/get-all-units-details"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/terminal/get-all-units-details"))
            .respond_with(ok_envelope(serde_json::json!({"units": []})))
            .mount(&server)
            .await;

        let poller = poller_for(&server).with_backoff(
            BackoffPolicy::new()
                .with_initial_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(1)),
        );
        let mut events = poller.subscribe();
        let handle = poller.spawn();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if matches!(events.recv().await.unwrap(), PollEvent::RateLimited { .. }) {
                    break;
                }
            }
        })
        .await
        .unwrap();

        // Inside the backoff window no further listing goes out.
        assert_eq!(unit_listing_requests(&server).await, 1);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(unit_listing_requests(&server).await, 1);

        // Once the window elapses the loop polls again and completes.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if matches!(events.recv().await.unwrap(), PollEvent::PollCompleted { .. }) {
                    break;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(unit_listing_requests(&server).await, 2);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn revoked_credentials_surface_auth_expired_from_the_loop() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ok_envelope(serde_json::json!({"user": {"token": "token-1"}})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        mount_units(&server, two_units()).await;
        mount_gps(&server, serde_json::json!([])).await;
        Mock::given(method("POST"))
            .and(path("/user/terminal/edit-terminal"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/terminal/access/lockstatus"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let poller = poller_for(&server);
        let mut events = poller.subscribe();
        let handle = poller.spawn();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, PollEvent::AuthExpired);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_before_first_tick_publishes_nothing() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        // Slow listing keeps the first poll in flight while we shut down.
        Mock::given(method("GET"))
            .and(path("/user/terminal/get-all-units-details"))
            .respond_with(
                ok_envelope(serde_json::json!({"units": []}))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let poller = poller_for(&server);
        let mut events = poller.subscribe();
        let handle = poller.spawn();

        // Give the loop a moment to enter the poll, then cancel it.
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;

        assert!(events.try_recv().is_err());
        assert!(poller.latest_snapshot().is_empty());
    }
}

// ============================================================================
// Entity mapping end to end
// ============================================================================

mod entity_mapping {
    use super::*;

    #[tokio::test]
    async fn io_unit_maps_to_expected_entity_set() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_units(
            &server,
            serde_json::json!([{
                "ID": 42,
                "NameOnly": "Truck",
                "DeviceType": "gps",
                "Imei": "350000000000042",
                "BatteryVoltage": 12.6,
                "Dout1Status": "Off",
                "Din1Status": "On"
            }]),
        )
        .await;
        mount_gps(&server, serde_json::json!([])).await;

        // No extras for this unit.
        Mock::given(method("POST"))
            .and(path("/user/terminal/edit-terminal"))
            .respond_with(ok_envelope(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/terminal/access/lockstatus"))
            .respond_with(ok_envelope(serde_json::json!({})))
            .mount(&server)
            .await;

        let poller = poller_for(&server);
        let snapshot = poller.poll_once().await.unwrap();
        let device = snapshot.device(42).unwrap();
        let entities = map_entities(device);

        let mut ids: Vec<&str> = entities.iter().map(|e| e.unique_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(
            ids,
            vec![
                "42_battery_voltage",
                "42_input_1",
                "42_output_1",
                "42_tracker"
            ]
        );

        let switch = entities.iter().find(|e| e.key == "output_1").unwrap();
        assert_eq!(switch.kind, EntityKind::Switch);
        let input = entities.iter().find(|e| e.key == "input_1").unwrap();
        assert_eq!(input.kind, EntityKind::BinarySensor);
    }
}
