// SPDX-License-Identifier: GPL-3.0-only

//! Configuration for the server, the local host and the virtual cameras
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! defaults below.

use crate::backends::camera::types::{DisplayRotation, LensFacing, PixelEncoding};
use crate::constants::{capture, permissions, worker};
use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub host: HostConfig,
    /// Sensors exposed by the virtual platform, in enumeration order
    pub virtual_cameras: Vec<VirtualCameraConfig>,
}

/// Camera server settings
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name of the shared callback thread
    pub worker_thread_name: String,
    /// Images a capture session may hold before the oldest is recycled
    pub max_images: usize,
    /// Permission the host must grant before devices are opened
    pub camera_permission: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            worker_thread_name: worker::THREAD_NAME.to_string(),
            max_images: capture::MAX_IMAGES,
            camera_permission: permissions::CAMERA.to_string(),
        }
    }
}

/// Initial state of the in-process host
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Whether the camera permission starts out granted
    pub grant_permission: bool,
    pub display_rotation: DisplayRotation,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            grant_permission: true,
            display_rotation: DisplayRotation::default(),
        }
    }
}

/// One synthesized sensor
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualCameraConfig {
    pub id: String,
    pub facing: LensFacing,
    /// Sensor mounting angle in degrees
    pub mount_angle: i32,
    pub streams: Vec<StreamConfig>,
    /// Time between frames; derived from the stream's minimum frame
    /// duration when unset
    pub frame_interval_ms: Option<u64>,
    /// JPEG file delivered instead of the synthesized test pattern
    pub image_path: Option<PathBuf>,
}

impl Default for VirtualCameraConfig {
    fn default() -> Self {
        Self {
            id: "0".to_string(),
            facing: LensFacing::Back,
            mount_angle: 90,
            streams: vec![StreamConfig::default()],
            frame_interval_ms: None,
            image_path: None,
        }
    }
}

impl VirtualCameraConfig {
    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval_ms.map(Duration::from_millis)
    }
}

/// One advertised stream configuration
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub encoding: PixelEncoding,
    pub width: u32,
    pub height: u32,
    pub min_frame_duration_ns: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            encoding: PixelEncoding::Jpeg,
            width: 640,
            height: 480,
            min_frame_duration_ns: 33_333_333,
        }
    }
}

impl Config {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Virtual cameras to expose: the configured list, or a back and a
    /// front camera when none are configured
    pub fn virtual_cameras_or_default(&self) -> Vec<VirtualCameraConfig> {
        if !self.virtual_cameras.is_empty() {
            return self.virtual_cameras.clone();
        }

        let jpeg = |width, height| StreamConfig {
            width,
            height,
            ..StreamConfig::default()
        };
        vec![
            VirtualCameraConfig {
                id: "0".to_string(),
                facing: LensFacing::Back,
                mount_angle: 90,
                streams: vec![
                    jpeg(1280, 720),
                    StreamConfig {
                        encoding: PixelEncoding::Yuv420,
                        ..jpeg(1280, 720)
                    },
                    jpeg(640, 480),
                ],
                ..VirtualCameraConfig::default()
            },
            VirtualCameraConfig {
                id: "1".to_string(),
                facing: LensFacing::Front,
                mount_angle: 270,
                streams: vec![jpeg(640, 480)],
                ..VirtualCameraConfig::default()
            },
        ]
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.worker_thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server.worker_thread_name must not be empty".to_string(),
            ));
        }
        if self.server.max_images == 0 {
            return Err(ConfigError::Invalid(
                "server.max_images must be at least 1".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for camera in &self.virtual_cameras {
            if !ids.insert(camera.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate virtual camera id '{}'",
                    camera.id
                )));
            }
            if camera.frame_interval_ms == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "camera '{}': frame_interval_ms must be positive",
                    camera.id
                )));
            }
            if let Some(stream) = camera.streams.iter().find(|s| s.width == 0 || s.height == 0) {
                return Err(ConfigError::Invalid(format!(
                    "camera '{}': stream {}x{} has a zero dimension",
                    camera.id, stream.width, stream.height
                )));
            }
        }
        Ok(())
    }
}
