// SPDX-License-Identifier: GPL-3.0-only

//! Camera feed: one physical sensor
//!
//! A feed owns the open → configure → stream state machine for its sensor
//! and the format staged for the next activation.
//!
//! ```text
//! Idle ──activate──▶ Opening ──Opened──▶ Configuring ──Configured──▶ Streaming
//!   ▲        │                                                           │
//!   │        └─(no permission)─▶ AwaitingPermission ──granted──▶ Opening │
//!   └──────────── deactivate / pause / error / configure failure ◀───────┘
//! ```
//!
//! Every open attempt gets a new generation number. Callbacks carrying an
//! older generation are stale: their devices and sessions are closed and
//! nothing reaches the sink.

use super::server::{OpenOutcome, ServerHandle};
use super::types::*;
use super::{CameraDevice, CaptureSession, DeviceEvent, DeviceListener, FrameSink};
use crate::errors::CameraError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info, trace, warn};

/// Rotation in degrees that makes a frame display-upright
///
/// `(mount - device_rotation * sign + 360) mod 360`, where `sign` is +1 for
/// front-facing sensors and -1 otherwise.
pub fn frame_rotation(
    sensor_rotation: SensorRotation,
    device_rotation: u32,
    facing: LensFacing,
) -> u32 {
    let mount = sensor_rotation.degrees() as i32;
    let device = (device_rotation % 360) as i32;
    (mount - device * facing.rotation_sign() + 360).rem_euclid(360) as u32
}

/// Supported entries of a descriptor's stream configurations, in platform order
fn supported_formats(descriptor: &CameraDescriptor) -> Vec<CaptureFormat> {
    descriptor
        .stream_configurations
        .iter()
        .filter(|format| format.encoding.is_supported())
        .cloned()
        .collect()
}

/// Device and session held by the feed
enum SessionState {
    Idle,
    AwaitingPermission,
    /// Format snapshot taken when activation began
    Opening {
        format: CaptureFormat,
    },
    Configuring {
        device: Box<dyn CameraDevice>,
    },
    Streaming {
        device: Box<dyn CameraDevice>,
        session: Box<dyn CaptureSession>,
    },
}

impl SessionState {
    fn phase(&self) -> FeedPhase {
        match self {
            SessionState::Idle => FeedPhase::Idle,
            SessionState::AwaitingPermission => FeedPhase::AwaitingPermission,
            SessionState::Opening { .. } => FeedPhase::Opening,
            SessionState::Configuring { .. } => FeedPhase::Configuring,
            SessionState::Streaming { .. } => FeedPhase::Streaming,
        }
    }
}

struct FeedState {
    selected_format: Option<CaptureFormat>,
    activated: bool,
    rotation: u32,
    sink: Option<Arc<dyn FrameSink>>,
    generation: u64,
    session: SessionState,
}

impl FeedState {
    /// Close whatever is open and invalidate outstanding callbacks
    fn close_session(&mut self) -> FeedPhase {
        let previous = self.session.phase();
        match std::mem::replace(&mut self.session, SessionState::Idle) {
            SessionState::Streaming {
                mut device,
                mut session,
            } => {
                session.close();
                device.close();
            }
            SessionState::Configuring { mut device } => device.close(),
            _ => {}
        }
        self.generation += 1;
        previous
    }

    /// Return to Idle after a failure; the caller must activate again
    ///
    /// Returns the sink that should hear about the failure.
    fn fail(&mut self) -> Option<Arc<dyn FrameSink>> {
        self.close_session();
        self.activated = false;
        self.sink.take()
    }
}

struct FeedInner {
    descriptor: CameraDescriptor,
    server: ServerHandle,
    state: Mutex<FeedState>,
}

/// One physical camera sensor
///
/// Cheap to clone; clones share the same sensor state.
#[derive(Clone)]
pub struct CameraFeed {
    inner: Arc<FeedInner>,
}

impl CameraFeed {
    pub(crate) fn new(descriptor: CameraDescriptor, server: ServerHandle) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                descriptor,
                server,
                state: Mutex::new(FeedState {
                    selected_format: None,
                    activated: false,
                    rotation: 0,
                    sink: None,
                    generation: 0,
                    session: SessionState::Idle,
                }),
            }),
        }
    }

    /// Platform identifier of the sensor
    pub fn id(&self) -> &str {
        &self.inner.descriptor.id
    }

    pub fn facing(&self) -> LensFacing {
        self.inner.descriptor.facing
    }

    pub fn descriptor(&self) -> &CameraDescriptor {
        &self.inner.descriptor
    }

    /// Output formats this feed can deliver, in platform order
    ///
    /// Built from the descriptor on every call; only the JPEG encoding is
    /// accepted.
    pub fn list_formats(&self) -> Vec<CaptureFormat> {
        supported_formats(&self.inner.descriptor)
    }

    /// Stage the format at `index` of [`CameraFeed::list_formats`] for the
    /// next activation
    ///
    /// Returns `false` without changing anything if `index` is out of range.
    /// A session that is already open keeps its format.
    pub fn select_format(&self, index: i32) -> bool {
        let Ok(index) = usize::try_from(index) else {
            return false;
        };
        let Some(format) = self.list_formats().into_iter().nth(index) else {
            debug!(camera = %self.id(), index, "Format index out of range");
            return false;
        };

        info!(camera = %self.id(), index, format = %format, "Format selected");
        self.inner.lock().selected_format = Some(format);
        true
    }

    /// Format staged for the next activation
    pub fn selected_format(&self) -> Option<CaptureFormat> {
        self.inner.lock().selected_format.clone()
    }

    /// Start streaming to `sink`
    ///
    /// Returns `false` only when no sink is given, in which case nothing
    /// changes. If the feed is already activated with a device open (or
    /// opening) this is a successful no-op. Otherwise the sink is registered
    /// and the device open is requested; its outcome is reported later
    /// through logs and [`FrameSink::on_error`].
    pub fn activate(&self, sink: Option<Arc<dyn FrameSink>>) -> bool {
        let Some(sink) = sink else {
            warn!(camera = %self.id(), "Activation without a frame sink");
            return false;
        };

        {
            let mut state = self.inner.lock();
            if state.activated && state.session.phase().holds_device() {
                debug!(camera = %self.id(), "Already active");
                return true;
            }
            state.sink = Some(sink);
            state.activated = true;
        }

        self.inner.start_camera();
        true
    }

    /// Close any open session and device and forget the sink. Idempotent.
    pub fn deactivate(&self) {
        let mut state = self.inner.lock();
        let previous = state.close_session();
        let was_active = state.activated;
        state.sink = None;
        state.activated = false;
        drop(state);

        if was_active || previous != FeedPhase::Idle {
            info!(camera = %self.id(), phase = %previous, "Feed deactivated");
        }
    }

    /// Whether the caller has activated the feed (survives pause)
    pub fn is_active(&self) -> bool {
        self.inner.lock().activated
    }

    pub fn phase(&self) -> FeedPhase {
        self.inner.lock().session.phase()
    }

    /// Rotation computed at the most recent activation start
    pub fn frame_rotation(&self) -> u32 {
        self.inner.lock().rotation
    }

    /// Host permission result: reopen if granted and activated
    pub fn on_permission_result(&self, granted: bool) {
        if granted {
            if self.is_active() {
                self.inner.start_camera();
            }
            return;
        }

        let mut state = self.inner.lock();
        if matches!(state.session, SessionState::AwaitingPermission) {
            state.close_session();
            info!(camera = %self.id(), "Camera permission denied, feed stays closed");
        }
    }

    /// Host pause: close everything but remember the activation
    pub fn on_pause(&self) {
        let mut state = self.inner.lock();
        let previous = state.close_session();
        if previous != FeedPhase::Idle {
            info!(camera = %self.id(), phase = %previous, "Feed closed for pause");
        }
    }

    /// Host resume: reopen if the feed was activated before the pause
    pub fn on_resume(&self) {
        if self.is_active() {
            debug!(camera = %self.id(), "Reopening feed after resume");
            self.inner.start_camera();
        }
    }
}

impl std::fmt::Debug for CameraFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("CameraFeed")
            .field("id", &self.inner.descriptor.id)
            .field("facing", &self.inner.descriptor.facing)
            .field("activated", &state.activated)
            .field("phase", &state.session.phase())
            .field("rotation", &state.rotation)
            .finish()
    }
}

impl FeedInner {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Begin an open attempt for an activated feed
    fn start_camera(self: &Arc<Self>) {
        let device_rotation = self.server.device_rotation();

        let generation = {
            let mut state = self.lock();
            if state.sink.is_none() || state.session.phase().holds_device() {
                return;
            }

            let staged = state.selected_format.clone();
            let Some(format) =
                staged.or_else(|| supported_formats(&self.descriptor).into_iter().next())
            else {
                error!(camera = %self.id(), "Camera advertises no supported format");
                let sink = state.fail();
                drop(state);
                if let Some(sink) = sink {
                    sink.on_error(&CameraError::NoSupportedFormat);
                }
                return;
            };

            state.rotation = frame_rotation(
                self.descriptor.sensor_rotation,
                device_rotation,
                self.descriptor.facing,
            );
            state.generation += 1;
            debug!(
                camera = %self.id(),
                format = %format,
                rotation = state.rotation,
                generation = state.generation,
                "Opening camera"
            );
            state.session = SessionState::Opening { format };
            state.generation
        };

        let listener = Arc::new(FeedListener {
            feed: Arc::downgrade(self),
            generation,
        });

        match self.server.request_open(self.id(), listener) {
            OpenOutcome::Requested => {}
            OpenOutcome::AwaitingPermission => {
                let mut state = self.lock();
                if state.generation == generation
                    && matches!(state.session, SessionState::Opening { .. })
                {
                    state.session = SessionState::AwaitingPermission;
                }
            }
            OpenOutcome::Rejected(e) => {
                let mut state = self.lock();
                if state.generation != generation {
                    return;
                }
                error!(camera = %self.id(), error = %e, "Failed to open camera");
                let sink = state.fail();
                drop(state);
                if let Some(sink) = sink {
                    sink.on_error(&CameraError::from(e));
                }
            }
        }
    }

    fn handle_event(&self, generation: u64, event: DeviceEvent) {
        let mut state = self.lock();
        if state.generation != generation {
            drop(state);
            trace!(camera = %self.id(), ?event, "Discarding stale callback");
            discard(event);
            return;
        }

        match event {
            DeviceEvent::Opened(mut device) => {
                let format = match &state.session {
                    SessionState::Opening { format } => Some(format.clone()),
                    _ => None,
                };
                let Some(format) = format else {
                    drop(state);
                    device.close();
                    return;
                };
                info!(camera = %self.id(), "Camera opened");

                let result =
                    device.create_capture_session(&format, self.server.max_images());
                state.session = SessionState::Configuring { device };
                if let Err(e) = result {
                    error!(camera = %self.id(), error = %e, "Failed to create capture session");
                    let sink = state.fail();
                    drop(state);
                    notify(sink, CameraError::ConfigureFailed(e.to_string()));
                }
            }
            DeviceEvent::Disconnected => {
                // Resources stay as they are; only the caller can recover
                warn!(camera = %self.id(), "Camera disconnected");
                let sink = state.sink.clone();
                drop(state);
                notify(sink, CameraError::Disconnected);
            }
            DeviceEvent::Error(code) => {
                error!(camera = %self.id(), code, "Camera device error");
                let sink = state.fail();
                drop(state);
                notify(sink, CameraError::Device(code));
            }
            DeviceEvent::Configured(mut session) => {
                let device = match std::mem::replace(&mut state.session, SessionState::Idle) {
                    SessionState::Configuring { device } => device,
                    other => {
                        state.session = other;
                        drop(state);
                        session.close();
                        return;
                    }
                };

                let result = session.set_repeating_request();
                state.session = SessionState::Streaming { device, session };
                match result {
                    Ok(()) => info!(camera = %self.id(), "Capture session streaming"),
                    Err(e) => {
                        error!(camera = %self.id(), error = %e, "Failed to start repeating request");
                        let sink = state.fail();
                        drop(state);
                        notify(sink, CameraError::ConfigureFailed(e.to_string()));
                    }
                }
            }
            DeviceEvent::ConfigureFailed => {
                error!(camera = %self.id(), "Failed to configure capture session");
                let sink = state.fail();
                drop(state);
                notify(
                    sink,
                    CameraError::ConfigureFailed("session configuration rejected".to_string()),
                );
            }
            DeviceEvent::ImageAvailable => {
                let SessionState::Streaming { session, .. } = &mut state.session else {
                    return;
                };
                let Some(image) = session.acquire_latest_image() else {
                    return;
                };
                let sink = state.sink.clone();
                let rotation = state.rotation;
                drop(state);

                match sink {
                    Some(sink) => {
                        let frame = Frame {
                            encoding: image.encoding(),
                            width: image.width(),
                            height: image.height(),
                            rotation,
                            planes: image.planes(),
                        };
                        sink.on_frame(&frame);
                    }
                    None => trace!(camera = %self.id(), "No sink registered, dropping frame"),
                }
                drop(image);
            }
        }
    }
}

fn notify(sink: Option<Arc<dyn FrameSink>>, error: CameraError) {
    if let Some(sink) = sink {
        sink.on_error(&error);
    }
}

/// Release whatever a stale callback carried
fn discard(event: DeviceEvent) {
    match event {
        DeviceEvent::Opened(mut device) => device.close(),
        DeviceEvent::Configured(mut session) => session.close(),
        _ => {}
    }
}

/// Routes platform callbacks for one open attempt back to its feed
struct FeedListener {
    feed: Weak<FeedInner>,
    generation: u64,
}

impl DeviceListener for FeedListener {
    fn on_event(&self, event: DeviceEvent) {
        match self.feed.upgrade() {
            Some(feed) => feed.handle_event(self.generation, event),
            None => discard(event),
        }
    }
}
