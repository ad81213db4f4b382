// SPDX-License-Identifier: MPL-2.0

//! Error types for the camera server
//!
//! None of these cross a public operation boundary as a hard failure: the
//! server and its feeds convert platform failures into a log line plus a
//! boolean or no-op outcome. [`CameraError`] is what a frame sink sees on its
//! error channel; [`PlatformError`] is what platform implementations return;
//! [`DecodeError`] covers frame decoding and [`ConfigError`] configuration
//! loading.

use crate::backends::camera::types::PixelEncoding;
use std::fmt;

/// Result type for platform calls
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for frame decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Failures reported by a platform camera API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The camera service could not be reached
    ServiceUnavailable(String),
    /// No sensor with this identifier exists
    UnknownCamera(String),
    /// The platform refused access to the device
    AccessDenied(String),
    /// The device is open by someone else or closed underneath us
    DeviceUnavailable(String),
    /// The requested output configuration cannot be produced
    InvalidConfiguration(String),
    /// Other errors
    Other(String),
}

/// Errors surfaced to a frame sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The platform rejected the device open
    OpenFailed(String),
    /// The platform reported a device error while open, with its error code
    Device(i32),
    /// The device disconnected while active
    Disconnected,
    /// The capture session could not be created or configured
    ConfigureFailed(String),
    /// The sensor advertises no supported output format
    NoSupportedFormat,
}

/// Failures turning a delivered frame into an image
#[derive(Debug)]
pub enum DecodeError {
    /// The frame is not in an encoding this decoder handles
    UnsupportedEncoding(PixelEncoding),
    /// A compressed frame must arrive as exactly one plane
    PlaneCount(usize),
    /// The plane data could not be decoded
    Image(image::ImageError),
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// Reading the file failed
    Io(std::io::Error),
    /// The file is not valid configuration JSON
    Parse(serde_json::Error),
    /// The file parsed but a value is out of range
    Invalid(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::ServiceUnavailable(msg) => {
                write!(f, "Camera service unavailable: {}", msg)
            }
            PlatformError::UnknownCamera(id) => write!(f, "Unknown camera: {}", id),
            PlatformError::AccessDenied(msg) => write!(f, "Camera access denied: {}", msg),
            PlatformError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            PlatformError::InvalidConfiguration(msg) => {
                write!(f, "Invalid output configuration: {}", msg)
            }
            PlatformError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::OpenFailed(msg) => write!(f, "Failed to open camera: {}", msg),
            CameraError::Device(code) => write!(f, "Camera device error: {}", code),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
            CameraError::ConfigureFailed(msg) => {
                write!(f, "Failed to configure capture session: {}", msg)
            }
            CameraError::NoSupportedFormat => write!(f, "No supported output format"),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnsupportedEncoding(encoding) => {
                write!(f, "Unsupported frame encoding: {}", encoding)
            }
            DecodeError::PlaneCount(count) => {
                write!(f, "Expected a single plane, got {}", count)
            }
            DecodeError::Image(e) => write!(f, "Failed to decode frame: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read configuration: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse configuration: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for PlatformError {}
impl std::error::Error for CameraError {}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        DecodeError::Image(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

// A rejected open is what the sink learns about
impl From<PlatformError> for CameraError {
    fn from(err: PlatformError) -> Self {
        CameraError::OpenFailed(err.to_string())
    }
}
