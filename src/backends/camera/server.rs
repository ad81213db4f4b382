// SPDX-License-Identifier: GPL-3.0-only

//! Camera server: enumeration, permission broker and lifecycle fan-out
//!
//! The server enumerates the platform's sensors once, wraps each in a
//! [`CameraFeed`] and brokers the camera permission with the host. Device
//! opens go through [`ServerHandle`], which starts the shared callback
//! worker on demand and defers opens until the permission is granted.

use super::feed::CameraFeed;
use super::worker::{CallbackWorker, WorkerHandle};
use super::{CameraPlatform, DeviceListener, HostRuntime};
use crate::config::ServerConfig;
use crate::constants::signals;
use crate::errors::PlatformError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Result of asking the server to open a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The platform accepted the request; the result arrives asynchronously
    Requested,
    /// The permission is missing; the host's permission flow was started
    AwaitingPermission,
    /// The platform refused immediately
    Rejected(PlatformError),
}

struct ServerShared {
    platform: Arc<dyn CameraPlatform>,
    host: Arc<dyn HostRuntime>,
    config: ServerConfig,
    /// Started lazily on the first open, stopped on pause and teardown
    worker: Mutex<Option<CallbackWorker>>,
}

/// Shared access to the server's platform, host and callback worker
///
/// Feeds hold one of these; it does not keep the feeds alive.
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<ServerShared>,
}

impl ServerHandle {
    fn worker(&self) -> MutexGuard<'_, Option<CallbackWorker>> {
        self.shared
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the host has granted the camera permission
    pub fn permission_granted(&self) -> bool {
        let permission = &self.shared.config.camera_permission;
        self.shared
            .host
            .granted_permissions()
            .iter()
            .any(|granted| granted == permission)
    }

    /// Start the host's permission flow for the camera permission
    pub fn request_permission(&self) {
        info!(permission = %self.shared.config.camera_permission, "Requesting camera permission");
        self.shared
            .host
            .request_permission(&self.shared.config.camera_permission);
    }

    /// Device rotation in degrees derived from the host's display rotation
    pub fn device_rotation(&self) -> u32 {
        self.shared.host.display_rotation().device_degrees()
    }

    /// Maximum undelivered images a capture session may hold
    pub fn max_images(&self) -> usize {
        self.shared.config.max_images
    }

    /// Open a device with callbacks delivered on the callback worker
    ///
    /// Returns `true` if the open was requested or deferred until the
    /// permission is granted, `false` if the platform refused immediately.
    pub fn open_session(&self, camera_id: &str, listener: Arc<dyn DeviceListener>) -> bool {
        !matches!(
            self.request_open(camera_id, listener),
            OpenOutcome::Rejected(_)
        )
    }

    /// Like [`ServerHandle::open_session`] but reports which way it went
    pub fn request_open(&self, camera_id: &str, listener: Arc<dyn DeviceListener>) -> OpenOutcome {
        if !self.permission_granted() {
            self.request_permission();
            return OpenOutcome::AwaitingPermission;
        }

        let handler = match self.worker_handle() {
            Ok(handler) => handler,
            Err(e) => {
                error!(error = %e, "Failed to start camera callback worker");
                return OpenOutcome::Rejected(PlatformError::Other(format!(
                    "callback worker unavailable: {}",
                    e
                )));
            }
        };

        debug!(camera = %camera_id, "Requesting device open");
        match self.shared.platform.open_device(camera_id, listener, handler) {
            Ok(()) => OpenOutcome::Requested,
            Err(e) => {
                warn!(camera = %camera_id, error = %e, "Platform rejected device open");
                OpenOutcome::Rejected(e)
            }
        }
    }

    /// Handle of the running worker, starting one if needed
    fn worker_handle(&self) -> std::io::Result<WorkerHandle> {
        let mut worker = self.worker();
        if let Some(running) = worker.as_ref().filter(|w| w.is_running()) {
            return Ok(running.handle());
        }

        let started = CallbackWorker::start(&self.shared.config.worker_thread_name)?;
        let handle = started.handle();
        *worker = Some(started);
        Ok(handle)
    }

    /// Stop and join the worker; the lock is released before joining
    fn stop_worker(&self) {
        let worker = self.worker().take();
        if let Some(mut worker) = worker {
            worker.stop();
        }
    }

    fn worker_running(&self) -> bool {
        self.worker().as_ref().is_some_and(|w| w.is_running())
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("config", &self.shared.config)
            .field("worker_running", &self.worker_running())
            .finish()
    }
}

/// Camera server
///
/// Owns one [`CameraFeed`] per sensor the platform reported at construction.
/// Dropping the server deactivates every feed and stops the worker.
pub struct CameraServer {
    handle: ServerHandle,
    feeds: Vec<CameraFeed>,
}

impl CameraServer {
    /// Create a server and enumerate the platform's cameras
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        host: Arc<dyn HostRuntime>,
        config: ServerConfig,
    ) -> Self {
        let handle = ServerHandle {
            shared: Arc::new(ServerShared {
                platform,
                host,
                config,
                worker: Mutex::new(None),
            }),
        };
        let feeds = enumerate(&handle);
        Self { handle, feeds }
    }

    /// Create a server with the default configuration
    pub fn with_defaults(platform: Arc<dyn CameraPlatform>, host: Arc<dyn HostRuntime>) -> Self {
        Self::new(platform, host, ServerConfig::default())
    }

    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    /// Feeds in platform enumeration order
    pub fn feeds(&self) -> &[CameraFeed] {
        &self.feeds
    }

    pub fn feed(&self, camera_id: &str) -> Option<&CameraFeed> {
        self.feeds.iter().find(|feed| feed.id() == camera_id)
    }

    pub fn permission_granted(&self) -> bool {
        self.handle.permission_granted()
    }

    pub fn request_permission(&self) {
        self.handle.request_permission()
    }

    pub fn device_rotation(&self) -> u32 {
        self.handle.device_rotation()
    }

    pub fn open_session(&self, camera_id: &str, listener: Arc<dyn DeviceListener>) -> bool {
        self.handle.open_session(camera_id, listener)
    }

    /// Whether the callback worker thread is currently running
    pub fn worker_running(&self) -> bool {
        self.handle.worker_running()
    }

    /// Host permission results, `permissions[i]` paired with `grant_results[i]`
    ///
    /// Results for other permissions are ignored. For the camera permission
    /// the granted or denied signal is emitted first, then every feed is
    /// told.
    pub fn on_permission_result(&self, permissions: &[&str], grant_results: &[bool]) {
        let camera_permission = self.handle.shared.config.camera_permission.as_str();
        for (&permission, &granted) in permissions.iter().zip(grant_results) {
            if permission != camera_permission {
                debug!(permission, "Ignoring unrelated permission result");
                continue;
            }

            let signal = if granted {
                signals::PERMISSION_GRANTED
            } else {
                signals::PERMISSION_DENIED
            };
            info!(granted, "Camera permission result");
            self.handle.shared.host.emit_signal(signal);

            for feed in &self.feeds {
                feed.on_permission_result(granted);
            }
        }
    }

    /// Host pause: close every feed, then stop the callback worker
    pub fn on_pause(&self) {
        info!("Pausing camera server");
        for feed in &self.feeds {
            feed.on_pause();
        }
        self.handle.stop_worker();
    }

    /// Host resume: reopen feeds that were active before the pause
    pub fn on_resume(&self) {
        info!("Resuming camera server");
        for feed in &self.feeds {
            feed.on_resume();
        }
    }
}

impl Drop for CameraServer {
    fn drop(&mut self) {
        debug!("Camera server dropped, deactivating feeds");
        for feed in &self.feeds {
            feed.deactivate();
        }
        self.handle.stop_worker();
    }
}

impl std::fmt::Debug for CameraServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraServer")
            .field("handle", &self.handle)
            .field("feeds", &self.feeds)
            .finish()
    }
}

/// One feed per sensor that can be described
fn enumerate(handle: &ServerHandle) -> Vec<CameraFeed> {
    let platform = &handle.shared.platform;
    let ids = match platform.sensor_ids() {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = %e, "Failed to list cameras");
            return Vec::new();
        }
    };

    let mut feeds = Vec::with_capacity(ids.len());
    for id in ids {
        match platform.describe(&id) {
            Ok(descriptor) => {
                debug!(
                    camera = %descriptor.id,
                    facing = %descriptor.facing,
                    rotation = %descriptor.sensor_rotation,
                    "Found camera"
                );
                feeds.push(CameraFeed::new(descriptor, handle.clone()));
            }
            Err(e) => warn!(camera = %id, error = %e, "Failed to describe camera, skipping"),
        }
    }

    info!(count = feeds.len(), "Cameras enumerated");
    feeds
}
