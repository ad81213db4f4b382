// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera platform
//!
//! An in-process [`CameraPlatform`] whose sensors come from configuration.
//! Devices open asynchronously through the worker handle like a hardware
//! platform would, and capture sessions produce JPEG frames on a timer.
//!
//! # Architecture
//!
//! ```text
//! VirtualCameraConfig
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ VirtualPlatform  │  ← descriptors, open bookkeeping
//! └──────────────────┘
//!        │ Opened
//!        ▼
//! ┌──────────────────┐
//! │ VirtualDevice    │  ← builds the frame payload for the chosen format
//! └──────────────────┘
//!        │ Configured
//!        ▼
//! ┌──────────────────┐
//! │ VirtualSession   │  ← producer thread, bounded image queue
//! └──────────────────┘
//!        │ ImageAvailable
//!        ▼
//!   CameraFeed (on the callback worker)
//! ```

mod session;

pub use session::{VirtualImage, VirtualSession, test_pattern_jpeg};

use crate::backends::camera::types::{CameraDescriptor, CaptureFormat, SensorRotation};
use crate::backends::camera::{
    CameraDevice, CameraPlatform, DeviceEvent, DeviceListener, WorkerHandle,
};
use crate::config::VirtualCameraConfig;
use crate::constants::virtual_camera as vc_timing;
use crate::errors::{PlatformError, PlatformResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ids of devices currently open, shared between the platform and its devices
type OpenSet = Arc<Mutex<HashSet<String>>>;

fn lock_open(open: &OpenSet) -> MutexGuard<'_, HashSet<String>> {
    open.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build the static descriptor of a configured sensor
pub fn descriptor_for(config: &VirtualCameraConfig) -> CameraDescriptor {
    CameraDescriptor {
        id: config.id.clone(),
        facing: config.facing,
        sensor_rotation: SensorRotation::from_degrees_int(config.mount_angle),
        stream_configurations: config
            .streams
            .iter()
            .map(|stream| CaptureFormat {
                encoding: stream.encoding,
                width: stream.width,
                height: stream.height,
                min_frame_duration: Duration::from_nanos(stream.min_frame_duration_ns),
            })
            .collect(),
    }
}

struct VirtualSensor {
    descriptor: CameraDescriptor,
    frame_interval: Option<Duration>,
    /// Pre-encoded JPEG delivered instead of the test pattern
    image: Option<Arc<[u8]>>,
}

/// Platform backed by configured virtual sensors
pub struct VirtualPlatform {
    sensors: Vec<VirtualSensor>,
    open: OpenSet,
}

impl VirtualPlatform {
    /// Create the platform, reading any configured image files
    pub fn new(cameras: &[VirtualCameraConfig]) -> PlatformResult<Self> {
        let mut sensors = Vec::with_capacity(cameras.len());
        for camera in cameras {
            let image = match &camera.image_path {
                Some(path) => {
                    let bytes = std::fs::read(path).map_err(|e| {
                        PlatformError::ServiceUnavailable(format!(
                            "Failed to read image for camera {} from {}: {}",
                            camera.id,
                            path.display(),
                            e
                        ))
                    })?;
                    debug!(camera = %camera.id, path = %path.display(), size = bytes.len(), "Loaded frame image");
                    Some(Arc::from(bytes))
                }
                None => None,
            };

            sensors.push(VirtualSensor {
                descriptor: descriptor_for(camera),
                frame_interval: camera.frame_interval(),
                image,
            });
        }

        info!(count = sensors.len(), "Virtual camera platform ready");
        Ok(Self {
            sensors,
            open: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Ids of devices that are open right now, sorted
    pub fn open_devices(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock_open(&self.open).iter().cloned().collect();
        ids.sort();
        ids
    }

    fn sensor(&self, id: &str) -> PlatformResult<&VirtualSensor> {
        self.sensors
            .iter()
            .find(|sensor| sensor.descriptor.id == id)
            .ok_or_else(|| PlatformError::UnknownCamera(id.to_string()))
    }
}

impl CameraPlatform for VirtualPlatform {
    fn sensor_ids(&self) -> PlatformResult<Vec<String>> {
        Ok(self
            .sensors
            .iter()
            .map(|sensor| sensor.descriptor.id.clone())
            .collect())
    }

    fn describe(&self, id: &str) -> PlatformResult<CameraDescriptor> {
        self.sensor(id).map(|sensor| sensor.descriptor.clone())
    }

    fn open_device(
        &self,
        id: &str,
        listener: Arc<dyn DeviceListener>,
        handler: WorkerHandle,
    ) -> PlatformResult<()> {
        let sensor = self.sensor(id)?;

        if !lock_open(&self.open).insert(id.to_string()) {
            return Err(PlatformError::DeviceUnavailable(format!(
                "camera {} is already open",
                id
            )));
        }

        let device = VirtualDevice {
            id: id.to_string(),
            frame_interval: sensor.frame_interval,
            image: sensor.image.clone(),
            listener: Arc::clone(&listener),
            handler: handler.clone(),
            open: Arc::clone(&self.open),
            closed: false,
        };

        debug!(camera = %id, "Opening virtual device");
        // A refused post drops the device, which releases the open slot
        if !handler.post(move || listener.on_event(DeviceEvent::Opened(Box::new(device)))) {
            return Err(PlatformError::ServiceUnavailable(
                "callback worker stopped".to_string(),
            ));
        }
        Ok(())
    }
}

/// An open virtual device
pub struct VirtualDevice {
    id: String,
    frame_interval: Option<Duration>,
    image: Option<Arc<[u8]>>,
    listener: Arc<dyn DeviceListener>,
    handler: WorkerHandle,
    open: OpenSet,
    closed: bool,
}

impl VirtualDevice {
    /// Frame payload for a session producing `format`
    fn frame_data(&self, format: &CaptureFormat) -> PlatformResult<Arc<[u8]>> {
        if let Some(image) = &self.image {
            return Ok(Arc::clone(image));
        }
        test_pattern_jpeg(format.width, format.height)
            .map(Arc::from)
            .map_err(|e| {
                PlatformError::InvalidConfiguration(format!("Failed to encode test pattern: {}", e))
            })
    }

    fn frame_interval(&self, format: &CaptureFormat) -> Duration {
        match self.frame_interval {
            Some(interval) if !interval.is_zero() => interval,
            _ if !format.min_frame_duration.is_zero() => format.min_frame_duration,
            _ => vc_timing::DEFAULT_FRAME_INTERVAL,
        }
    }

    fn post(&self, event: DeviceEvent) -> bool {
        let listener = Arc::clone(&self.listener);
        self.handler.post(move || listener.on_event(event))
    }
}

impl CameraDevice for VirtualDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_capture_session(
        &mut self,
        format: &CaptureFormat,
        max_images: usize,
    ) -> PlatformResult<()> {
        if self.closed {
            return Err(PlatformError::DeviceUnavailable(format!(
                "camera {} is closed",
                self.id
            )));
        }

        if !format.encoding.is_supported() {
            warn!(camera = %self.id, encoding = %format.encoding, "Virtual camera only produces JPEG");
            self.post(DeviceEvent::ConfigureFailed);
            return Ok(());
        }

        let session = VirtualSession::new(
            self.id.clone(),
            format.clone(),
            self.frame_data(format)?,
            self.frame_interval(format),
            max_images,
            Arc::clone(&self.listener),
            self.handler.clone(),
        );

        debug!(camera = %self.id, format = %format, "Configuring virtual session");
        self.post(DeviceEvent::Configured(Box::new(session)));
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        lock_open(&self.open).remove(&self.id);
        debug!(camera = %self.id, "Virtual device closed");
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{LensFacing, PixelEncoding};
    use crate::config::StreamConfig;

    #[test]
    fn test_descriptor_from_config() {
        let config = VirtualCameraConfig {
            id: "front".to_string(),
            facing: LensFacing::Front,
            mount_angle: -90,
            streams: vec![
                StreamConfig::default(),
                StreamConfig {
                    encoding: PixelEncoding::Yuv420,
                    width: 1920,
                    height: 1080,
                    min_frame_duration_ns: 0,
                },
            ],
            ..VirtualCameraConfig::default()
        };

        let descriptor = descriptor_for(&config);
        assert_eq!(descriptor.id, "front");
        assert_eq!(descriptor.sensor_rotation, SensorRotation::Rotate270);
        assert_eq!(descriptor.stream_configurations.len(), 2);
        assert_eq!(
            descriptor.stream_configurations[0].min_frame_duration,
            Duration::from_nanos(33_333_333)
        );
    }

    #[test]
    fn test_unknown_camera() {
        let platform = VirtualPlatform::new(&[VirtualCameraConfig::default()]).unwrap();
        assert_eq!(platform.sensor_ids().unwrap(), vec!["0".to_string()]);
        assert!(matches!(
            platform.describe("missing"),
            Err(PlatformError::UnknownCamera(_))
        ));
    }

    #[test]
    fn test_missing_image_file_is_an_error() {
        let config = VirtualCameraConfig {
            image_path: Some("/nonexistent/frame.jpg".into()),
            ..VirtualCameraConfig::default()
        };
        assert!(VirtualPlatform::new(&[config]).is_err());
    }
}
