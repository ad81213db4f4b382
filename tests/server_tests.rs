// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the camera server

mod common;

use camera_server::backends::camera::types::{DisplayRotation, FeedPhase, LensFacing};
use camera_server::backends::camera::{CameraServer, DeviceEvent, DeviceListener};
use camera_server::backends::host::LocalHost;
use camera_server::config::ServerConfig;
use camera_server::errors::PlatformError;
use common::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Listener that only counts events
#[derive(Default)]
struct CountingListener {
    events: AtomicUsize,
}

impl DeviceListener for CountingListener {
    fn on_event(&self, _event: DeviceEvent) {
        self.events.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_one_feed_per_sensor_in_order() {
    let platform = ScriptedPlatform::new(vec![
        back_camera("0"),
        descriptor("1", LensFacing::Front, 270, &[]),
        back_camera("2"),
    ]);
    let host = granted_host();
    let server = server(&platform, &host);

    let ids: Vec<&str> = server.feeds().iter().map(|feed| feed.id()).collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
    assert_eq!(server.feed("1").map(|feed| feed.facing()), Some(LensFacing::Front));
    assert!(server.feed("9").is_none());
}

#[test]
fn test_failed_describe_skips_sensor() {
    let platform = ScriptedPlatform::failing_describe(
        vec![back_camera("0"), back_camera("1"), back_camera("2")],
        &["1"],
    );
    let host = granted_host();
    let server = server(&platform, &host);

    let ids: Vec<&str> = server.feeds().iter().map(|feed| feed.id()).collect();
    assert_eq!(ids, vec!["0", "2"]);
}

#[test]
fn test_failed_listing_gives_no_feeds() {
    let platform = ScriptedPlatform::failing_listing();
    let host = granted_host();
    let server = server(&platform, &host);
    assert!(server.feeds().is_empty());
}

#[test]
fn test_permission_granted_has_no_side_effect() {
    let platform = ScriptedPlatform::new(vec![back_camera("0")]);
    let host = Arc::new(LocalHost::new());
    let server = server(&platform, &host);

    assert!(!server.permission_granted());
    host.grant("CAMERA");
    assert!(server.permission_granted());
    assert!(host.permission_requests().is_empty());
    assert!(host.emitted_signals().is_empty());
}

#[test]
fn test_custom_permission_name() {
    let platform = ScriptedPlatform::new(vec![back_camera("0")]);
    let host = Arc::new(LocalHost::new());
    host.grant("CAMERA");
    let config = ServerConfig {
        camera_permission: "android.permission.CAMERA".to_string(),
        ..ServerConfig::default()
    };
    let server = CameraServer::new(platform.clone(), host.clone(), config);

    assert!(!server.permission_granted());
    server.request_permission();
    assert_eq!(
        host.permission_requests(),
        vec!["android.permission.CAMERA".to_string()]
    );
}

#[test]
fn test_device_rotation_mapping() {
    let platform = ScriptedPlatform::new(vec![]);
    let host = granted_host();
    let server = server(&platform, &host);

    let cases = [
        (DisplayRotation::Rotation0, 0),
        (DisplayRotation::Rotation90, 270),
        (DisplayRotation::Rotation180, 180),
        (DisplayRotation::Rotation270, 90),
    ];
    for (display, device) in cases {
        host.set_display_rotation(display);
        assert_eq!(server.device_rotation(), device);
    }
}

#[test]
fn test_open_session_without_permission_requests_it() {
    let platform = ScriptedPlatform::new(vec![back_camera("0")]);
    let host = Arc::new(LocalHost::new());
    let server = server(&platform, &host);

    assert!(server.open_session("0", Arc::new(CountingListener::default())));
    assert_eq!(host.permission_requests(), vec!["CAMERA".to_string()]);
    assert_eq!(platform.open_count(), 0);
    assert!(!server.worker_running());
}

#[test]
fn test_open_session_starts_worker() {
    let platform = ScriptedPlatform::new(vec![back_camera("0")]);
    let host = granted_host();
    let server = server(&platform, &host);
    assert!(!server.worker_running());

    let listener = Arc::new(CountingListener::default());
    assert!(server.open_session("0", listener.clone()));
    assert!(server.worker_running());
    assert_eq!(platform.open_count(), 1);

    assert!(platform.fire(0, DeviceEvent::Disconnected));
    assert_eq!(listener.events.load(Ordering::SeqCst), 1);

    let name = platform.run_on_worker(0, || {
        std::thread::current().name().map(str::to_string)
    });
    assert_eq!(name.flatten().as_deref(), Some("camera-callbacks"));
}

#[test]
fn test_open_session_rejected() {
    let platform = ScriptedPlatform::new(vec![back_camera("0")]);
    let host = granted_host();
    let server = server(&platform, &host);

    platform.reject_next_open(PlatformError::UnknownCamera("7".to_string()));
    assert!(!server.open_session("7", Arc::new(CountingListener::default())));
}

#[test]
fn test_worker_shared_across_feeds() {
    let platform = ScriptedPlatform::new(vec![back_camera("0"), back_camera("1")]);
    let host = granted_host();
    let server = server(&platform, &host);

    for feed in server.feeds() {
        feed.activate(as_sink(&RecordingSink::new()));
    }

    let first = platform.run_on_worker(0, || std::thread::current().id());
    let second = platform.run_on_worker(1, || std::thread::current().id());
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn test_pause_stops_worker_and_resume_restarts_it() {
    let platform = ScriptedPlatform::new(vec![back_camera("0")]);
    let host = granted_host();
    let server = server(&platform, &host);

    server.feeds()[0].activate(as_sink(&RecordingSink::new()));
    assert!(server.worker_running());

    server.on_pause();
    assert!(!server.worker_running());
    assert!(platform.run_on_worker(0, || ()).is_none());

    server.on_resume();
    assert!(server.worker_running());
    assert!(platform.run_on_worker(1, || ()).is_some());
}

#[test]
fn test_pause_without_worker() {
    let platform = ScriptedPlatform::new(vec![back_camera("0")]);
    let host = granted_host();
    let server = server(&platform, &host);

    server.on_pause();
    server.on_resume();
    assert!(!server.worker_running());
    assert_eq!(platform.open_count(), 0);
}

#[test]
fn test_unrelated_permission_results_are_ignored() {
    let platform = ScriptedPlatform::new(vec![back_camera("0")]);
    let host = Arc::new(LocalHost::new());
    let server = server(&platform, &host);

    server.feeds()[0].activate(as_sink(&RecordingSink::new()));
    server.on_permission_result(&["RECORD_AUDIO"], &[true]);

    assert!(host.emitted_signals().is_empty());
    assert_eq!(server.feeds()[0].phase(), FeedPhase::AwaitingPermission);
}

#[test]
fn test_permission_result_reaches_every_feed() {
    let platform = ScriptedPlatform::new(vec![back_camera("0"), back_camera("1")]);
    let host = Arc::new(LocalHost::new());
    let server = server(&platform, &host);

    for feed in server.feeds() {
        feed.activate(as_sink(&RecordingSink::new()));
    }
    host.grant("CAMERA");
    server.on_permission_result(&["RECORD_AUDIO", "CAMERA"], &[false, true]);

    assert_eq!(host.emitted_signals(), vec!["camera_permission_granted".to_string()]);
    assert_eq!(platform.opened_ids(), vec!["0".to_string(), "1".to_string()]);
}

#[test]
fn test_drop_deactivates_feeds() {
    let platform = ScriptedPlatform::new(vec![back_camera("0")]);
    let host = granted_host();
    let server = server(&platform, &host);
    let feed = server.feeds()[0].clone();

    feed.activate(as_sink(&RecordingSink::new()));
    platform.bring_up(0);
    drop(server);

    assert!(!feed.is_active());
    assert_eq!(feed.phase(), FeedPhase::Idle);
    assert_eq!(platform.sessions_closed(), 1);
    assert_eq!(platform.devices_closed(), 1);
}
