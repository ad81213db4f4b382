// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the camera server

//! Shared types for camera feeds and platforms

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Direction a camera lens faces relative to the device screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    /// Same side as the screen (faces the user)
    Front,
    /// Opposite side of the screen
    Back,
    /// Attached externally; platforms that cannot tell report this
    #[default]
    External,
}

impl LensFacing {
    /// Sign applied to the device rotation when computing frame rotation
    ///
    /// Front-facing sensors see the device rotate in the same direction as
    /// the display; every other sensor sees it mirrored.
    pub fn rotation_sign(&self) -> i32 {
        match self {
            LensFacing::Front => 1,
            LensFacing::Back | LensFacing::External => -1,
        }
    }
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
            LensFacing::External => write!(f, "external"),
        }
    }
}

/// Sensor mounting angle in degrees (clockwise)
///
/// Camera sensors are often mounted at 90° or 270° relative to the device's
/// natural orientation. The angle is fixed at discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    ///
    /// Values between quarter turns round down to the previous quarter turn.
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) / 90 {
            1 => SensorRotation::Rotate90,
            2 => SensorRotation::Rotate180,
            3 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Display rotation as reported by the host (quarter turns from natural)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DisplayRotation {
    #[default]
    #[serde(rename = "0")]
    Rotation0,
    #[serde(rename = "90")]
    Rotation90,
    #[serde(rename = "180")]
    Rotation180,
    #[serde(rename = "270")]
    Rotation270,
}

impl DisplayRotation {
    /// Device rotation in degrees used for frame rotation
    ///
    /// Rotating the display by a quarter turn one way means the device was
    /// turned the opposite way, so 90 and 270 swap.
    pub fn device_degrees(&self) -> u32 {
        match self {
            DisplayRotation::Rotation0 => 0,
            DisplayRotation::Rotation90 => 270,
            DisplayRotation::Rotation180 => 180,
            DisplayRotation::Rotation270 => 90,
        }
    }
}

/// Pixel encoding of a capture output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelEncoding {
    /// Compressed JPEG, one buffer per plane (a single plane)
    Jpeg,
    /// Planar 4:2:0 (separate Y, U, V planes)
    Yuv420,
    /// Semi-planar 4:2:0 (Y plane + interleaved VU plane)
    Nv21,
    /// Raw sensor data
    Raw,
}

impl PixelEncoding {
    /// Whether frames in this encoding can be delivered to a sink
    ///
    /// Only the compressed single-buffer JPEG encoding is accepted.
    pub fn is_supported(&self) -> bool {
        matches!(self, PixelEncoding::Jpeg)
    }

    /// Short display name
    pub fn name(&self) -> &'static str {
        match self {
            PixelEncoding::Jpeg => "JPEG",
            PixelEncoding::Yuv420 => "YUV_420_888",
            PixelEncoding::Nv21 => "NV21",
            PixelEncoding::Raw => "RAW",
        }
    }
}

impl std::fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One output configuration a sensor advertises
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFormat {
    pub encoding: PixelEncoding,
    pub width: u32,
    pub height: u32,
    /// Shortest frame duration the sensor supports at this size
    pub min_frame_duration: Duration,
}

impl CaptureFormat {
    /// Highest framerate allowed by the minimum frame duration
    pub fn max_framerate(&self) -> Option<f64> {
        if self.min_frame_duration.is_zero() {
            None
        } else {
            Some(1.0 / self.min_frame_duration.as_secs_f64())
        }
    }
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max_framerate() {
            Some(fps) => write!(
                f,
                "{} {}x{} @ {:.2}fps",
                self.encoding, self.width, self.height, fps
            ),
            None => write!(f, "{} {}x{}", self.encoding, self.width, self.height),
        }
    }
}

/// Static identity and orientation data for one physical sensor
#[derive(Debug, Clone)]
pub struct CameraDescriptor {
    /// Opaque platform identifier
    pub id: String,
    pub facing: LensFacing,
    /// Mounting angle relative to the device's natural orientation
    pub sensor_rotation: SensorRotation,
    /// Every (encoding, size) pair the platform advertises, in platform order
    pub stream_configurations: Vec<CaptureFormat>,
}

/// Session phase of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedPhase {
    /// No device open
    Idle,
    /// Open deferred until the host grants camera permission
    AwaitingPermission,
    /// Device open requested, waiting for the platform
    Opening,
    /// Device open, capture session being built
    Configuring,
    /// Repeating request active, frames delivered
    Streaming,
}

impl FeedPhase {
    /// True while a device is open or an open is in flight
    pub fn holds_device(&self) -> bool {
        matches!(
            self,
            FeedPhase::Opening | FeedPhase::Configuring | FeedPhase::Streaming
        )
    }
}

impl std::fmt::Display for FeedPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedPhase::Idle => write!(f, "idle"),
            FeedPhase::AwaitingPermission => write!(f, "awaiting permission"),
            FeedPhase::Opening => write!(f, "opening"),
            FeedPhase::Configuring => write!(f, "configuring"),
            FeedPhase::Streaming => write!(f, "streaming"),
        }
    }
}

/// A captured frame lent to a sink for the duration of one delivery
///
/// Plane slices borrow the platform's image buffer, which is released as soon
/// as the sink returns. Use [`Frame::to_copied`] to keep the data.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub encoding: PixelEncoding,
    pub width: u32,
    pub height: u32,
    /// Clockwise degrees the frame must be rotated to appear display-upright
    pub rotation: u32,
    /// One byte region per image plane
    pub planes: Vec<&'a [u8]>,
}

impl Frame<'_> {
    /// Copy the plane data so the frame can outlive the delivery call
    pub fn to_copied(&self) -> OwnedFrame {
        OwnedFrame {
            encoding: self.encoding,
            width: self.width,
            height: self.height,
            rotation: self.rotation,
            planes: self.planes.iter().map(|plane| Arc::from(*plane)).collect(),
        }
    }
}

/// A frame with copied plane data (safe to send across threads)
#[derive(Debug, Clone)]
pub struct OwnedFrame {
    pub encoding: PixelEncoding,
    pub width: u32,
    pub height: u32,
    pub rotation: u32,
    pub planes: Vec<Arc<[u8]>>,
}

impl OwnedFrame {
    /// Borrow the copied planes as a [`Frame`]
    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            encoding: self.encoding,
            width: self.width,
            height: self.height,
            rotation: self.rotation,
            planes: self.planes.iter().map(|plane| &plane[..]).collect(),
        }
    }
}
