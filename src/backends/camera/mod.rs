// SPDX-License-Identifier: MPL-2.0

//! Camera feed abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │    HostRuntime      │  ← permissions, pause/resume, display rotation
//! └──────────┬──────────┘
//!            │ lifecycle events
//!            ▼
//! ┌─────────────────────┐
//! │    CameraServer     │  ← enumeration, permission broker, fan-out
//! └──────────┬──────────┘
//!            │ one per sensor
//!            ▼
//! ┌─────────────────────┐      ┌──────────────────┐
//! │     CameraFeed      │ ───▶ │  CameraPlatform  │  ← open / configure / capture
//! └──────────┬──────────┘      └────────┬─────────┘
//!            │                          │ DeviceEvent via CallbackWorker
//!            ▼                          ▼
//! ┌─────────────────────┐
//! │      FrameSink      │  ← receives (encoding, size, rotation, planes)
//! └─────────────────────┘
//! ```
//!
//! The platform, the host and the sink are external collaborators expressed
//! as traits. All platform callbacks are posted through a [`WorkerHandle`] and
//! run on the server's single [`CallbackWorker`] thread.

pub mod feed;
pub mod server;
pub mod sink;
pub mod types;
pub mod worker;

pub use feed::{CameraFeed, frame_rotation};
pub use server::{CameraServer, OpenOutcome, ServerHandle};
pub use sink::{ChannelSink, FrameReceiver, FrameSender, SinkEvent};
pub use types::*;
pub use worker::{CallbackWorker, WorkerHandle};

use crate::errors::{CameraError, PlatformResult};
use std::sync::Arc;

/// Platform camera API
///
/// Implementations must deliver every asynchronous result as a
/// [`DeviceEvent`] posted through the [`WorkerHandle`] given to
/// [`CameraPlatform::open_device`]. Events must never be delivered
/// synchronously from inside a call on this trait, [`CameraDevice`] or
/// [`CaptureSession`].
pub trait CameraPlatform: Send + Sync {
    /// Identifiers of every sensor the platform knows about
    fn sensor_ids(&self) -> PlatformResult<Vec<String>>;

    /// Static description of one sensor
    fn describe(&self, id: &str) -> PlatformResult<CameraDescriptor>;

    /// Start opening a device
    ///
    /// `Ok` means the request was accepted; the outcome arrives later as
    /// [`DeviceEvent::Opened`] or [`DeviceEvent::Error`]. `Err` is an
    /// immediate rejection.
    fn open_device(
        &self,
        id: &str,
        listener: Arc<dyn DeviceListener>,
        handler: WorkerHandle,
    ) -> PlatformResult<()>;
}

/// An open camera device
pub trait CameraDevice: Send {
    /// Identifier of the sensor this device belongs to
    fn id(&self) -> &str;

    /// Start building a capture session producing `format`
    ///
    /// The platform keeps at most `max_images` undelivered images for the
    /// session. The result arrives as [`DeviceEvent::Configured`] or
    /// [`DeviceEvent::ConfigureFailed`].
    fn create_capture_session(
        &mut self,
        format: &CaptureFormat,
        max_images: usize,
    ) -> PlatformResult<()>;

    /// Close the device. Idempotent.
    fn close(&mut self);
}

/// A configured capture session
pub trait CaptureSession: Send {
    /// Start the repeating capture request; images then arrive as
    /// [`DeviceEvent::ImageAvailable`]
    fn set_repeating_request(&mut self) -> PlatformResult<()>;

    /// Take the most recent image, releasing any older ones
    fn acquire_latest_image(&mut self) -> Option<Box<dyn Image>>;

    /// Stop capturing and release the session. Idempotent.
    fn close(&mut self);
}

/// A captured image; dropping it releases the buffer back to the platform
pub trait Image: Send {
    fn encoding(&self) -> PixelEncoding;
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// The remaining bytes of each plane's buffer
    fn planes(&self) -> Vec<&[u8]>;
}

/// Asynchronous platform callbacks for one open attempt
pub enum DeviceEvent {
    /// The device finished opening
    Opened(Box<dyn CameraDevice>),
    /// The device is no longer available
    Disconnected,
    /// The device reported an error with a platform-specific code
    Error(i32),
    /// The capture session is ready
    Configured(Box<dyn CaptureSession>),
    /// The capture session could not be configured
    ConfigureFailed,
    /// A new image can be acquired from the session
    ImageAvailable,
}

impl std::fmt::Debug for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceEvent::Opened(device) => write!(f, "Opened({})", device.id()),
            DeviceEvent::Disconnected => write!(f, "Disconnected"),
            DeviceEvent::Error(code) => write!(f, "Error({})", code),
            DeviceEvent::Configured(_) => write!(f, "Configured"),
            DeviceEvent::ConfigureFailed => write!(f, "ConfigureFailed"),
            DeviceEvent::ImageAvailable => write!(f, "ImageAvailable"),
        }
    }
}

/// Receiver of [`DeviceEvent`]s
pub trait DeviceListener: Send + Sync {
    fn on_event(&self, event: DeviceEvent);
}

/// Hosting runtime the server is plugged into
pub trait HostRuntime: Send + Sync {
    /// Permissions the host has granted so far
    fn granted_permissions(&self) -> Vec<String>;

    /// Start the host's asynchronous permission flow
    ///
    /// The result is reported back through
    /// [`CameraServer::on_permission_result`], never synchronously.
    fn request_permission(&self, permission: &str);

    /// Emit a named event to host-side listeners
    fn emit_signal(&self, signal: &str);

    /// Current display rotation
    fn display_rotation(&self) -> DisplayRotation;
}

/// Native frame consumer
///
/// `on_frame` runs on the callback worker and the platform buffer stays
/// locked until it returns; a slow sink stalls the capture pipeline.
/// A panicking sink takes the worker thread down with it: feeds that were
/// streaming stay in `Streaming` without frames until they are deactivated
/// or the server is paused and resumed.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, frame: &Frame<'_>);

    /// Error channel for failures that happen after activation returned
    fn on_error(&self, _error: &CameraError) {}
}
