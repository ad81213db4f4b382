// SPDX-License-Identifier: GPL-3.0-only

//! Scripted camera platform for integration tests
//!
//! Open requests are recorded instead of answered. Tests then fire device
//! events through the recorded listener and worker handle and wait for the
//! worker to process them.

#![allow(dead_code)]

use camera_server::backends::camera::types::*;
use camera_server::backends::camera::{
    CameraDevice, CameraPlatform, CameraServer, CaptureSession, DeviceEvent, DeviceListener,
    FrameSink, Image, WorkerHandle,
};
use camera_server::backends::host::LocalHost;
use camera_server::constants::permissions;
use camera_server::errors::{CameraError, PlatformError, PlatformResult};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn format(encoding: PixelEncoding, width: u32, height: u32) -> CaptureFormat {
    CaptureFormat {
        encoding,
        width,
        height,
        min_frame_duration: Duration::from_nanos(33_333_333),
    }
}

pub fn descriptor(
    id: &str,
    facing: LensFacing,
    mount: i32,
    formats: &[(PixelEncoding, u32, u32)],
) -> CameraDescriptor {
    CameraDescriptor {
        id: id.to_string(),
        facing,
        sensor_rotation: SensorRotation::from_degrees_int(mount),
        stream_configurations: formats
            .iter()
            .map(|&(encoding, width, height)| format(encoding, width, height))
            .collect(),
    }
}

/// A back camera mounted at 90° with one JPEG format
pub fn back_camera(id: &str) -> CameraDescriptor {
    descriptor(id, LensFacing::Back, 90, &[(PixelEncoding::Jpeg, 640, 480)])
}

pub fn granted_host() -> Arc<LocalHost> {
    let host = Arc::new(LocalHost::new());
    host.grant(permissions::CAMERA);
    host
}

/// Counters shared by the platform and everything it hands out
#[derive(Default)]
pub struct Probe {
    pub devices_closed: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub images_released: AtomicUsize,
    pub repeating_started: AtomicUsize,
    pub session_requests: Mutex<Vec<(CaptureFormat, usize)>>,
}

pub struct OpenRequest {
    pub camera_id: String,
    pub listener: Arc<dyn DeviceListener>,
    pub handler: WorkerHandle,
}

#[derive(Default)]
pub struct ScriptedPlatform {
    descriptors: Vec<CameraDescriptor>,
    fail_listing: bool,
    fail_describe: HashSet<String>,
    reject_open: Mutex<Option<PlatformError>>,
    opens: Mutex<Vec<OpenRequest>>,
    images: Arc<Mutex<VecDeque<ScriptedImage>>>,
    pub probe: Arc<Probe>,
}

impl ScriptedPlatform {
    pub fn new(descriptors: Vec<CameraDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            descriptors,
            ..Self::default()
        })
    }

    pub fn failing_listing() -> Arc<Self> {
        Arc::new(Self {
            fail_listing: true,
            ..Self::default()
        })
    }

    pub fn failing_describe(descriptors: Vec<CameraDescriptor>, ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            descriptors,
            fail_describe: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        })
    }

    /// Refuse the next open immediately with `error`
    pub fn reject_next_open(&self, error: PlatformError) {
        *self.reject_open.lock().unwrap() = Some(error);
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn opened_ids(&self) -> Vec<String> {
        self.opens
            .lock()
            .unwrap()
            .iter()
            .map(|open| open.camera_id.clone())
            .collect()
    }

    /// Post an event for open request `index` and wait until the worker ran it
    ///
    /// Returns `false` if the worker no longer accepts jobs.
    pub fn fire(&self, index: usize, event: DeviceEvent) -> bool {
        let (listener, handler) = {
            let opens = self.opens.lock().unwrap();
            let open = &opens[index];
            (Arc::clone(&open.listener), open.handler.clone())
        };

        if !handler.post(move || listener.on_event(event)) {
            return false;
        }
        flush(&handler)
    }

    /// Run a closure on the worker of open request `index`
    pub fn run_on_worker<T, F>(&self, index: usize, job: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let handler = self.opens.lock().unwrap()[index].handler.clone();
        let (tx, rx) = mpsc::channel();
        if !handler.post(move || {
            let _ = tx.send(job());
        }) {
            return None;
        }
        rx.recv_timeout(Duration::from_secs(5)).ok()
    }

    pub fn device(&self, id: &str) -> Box<dyn CameraDevice> {
        Box::new(ScriptedDevice {
            id: id.to_string(),
            probe: Arc::clone(&self.probe),
            closed: false,
        })
    }

    pub fn session(&self) -> Box<dyn CaptureSession> {
        Box::new(ScriptedSession {
            images: Arc::clone(&self.images),
            probe: Arc::clone(&self.probe),
            closed: false,
        })
    }

    /// Fire Opened then Configured for open request `index`
    pub fn bring_up(&self, index: usize) {
        let id = self.opens.lock().unwrap()[index].camera_id.clone();
        assert!(self.fire(index, DeviceEvent::Opened(self.device(&id))));
        assert!(self.fire(index, DeviceEvent::Configured(self.session())));
    }

    /// Queue an image for the next acquire
    pub fn push_image(&self, image: ScriptedImage) {
        self.images.lock().unwrap().push_back(image);
    }

    pub fn devices_closed(&self) -> usize {
        self.probe.devices_closed.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.probe.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn images_released(&self) -> usize {
        self.probe.images_released.load(Ordering::SeqCst)
    }

    pub fn session_requests(&self) -> Vec<(CaptureFormat, usize)> {
        self.probe.session_requests.lock().unwrap().clone()
    }
}

/// Wait until every job posted before this call has run
fn flush(handler: &WorkerHandle) -> bool {
    let (tx, rx) = mpsc::channel();
    if !handler.post(move || {
        let _ = tx.send(());
    }) {
        return false;
    }
    rx.recv_timeout(Duration::from_secs(5)).is_ok()
}

impl CameraPlatform for ScriptedPlatform {
    fn sensor_ids(&self) -> PlatformResult<Vec<String>> {
        if self.fail_listing {
            return Err(PlatformError::ServiceUnavailable("scripted".to_string()));
        }
        Ok(self.descriptors.iter().map(|d| d.id.clone()).collect())
    }

    fn describe(&self, id: &str) -> PlatformResult<CameraDescriptor> {
        if self.fail_describe.contains(id) {
            return Err(PlatformError::AccessDenied(id.to_string()));
        }
        self.descriptors
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| PlatformError::UnknownCamera(id.to_string()))
    }

    fn open_device(
        &self,
        id: &str,
        listener: Arc<dyn DeviceListener>,
        handler: WorkerHandle,
    ) -> PlatformResult<()> {
        if let Some(error) = self.reject_open.lock().unwrap().take() {
            return Err(error);
        }
        self.opens.lock().unwrap().push(OpenRequest {
            camera_id: id.to_string(),
            listener,
            handler,
        });
        Ok(())
    }
}

pub struct ScriptedDevice {
    id: String,
    probe: Arc<Probe>,
    closed: bool,
}

impl CameraDevice for ScriptedDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_capture_session(
        &mut self,
        format: &CaptureFormat,
        max_images: usize,
    ) -> PlatformResult<()> {
        self.probe
            .session_requests
            .lock()
            .unwrap()
            .push((format.clone(), max_images));
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.probe.devices_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct ScriptedSession {
    images: Arc<Mutex<VecDeque<ScriptedImage>>>,
    probe: Arc<Probe>,
    closed: bool,
}

impl CaptureSession for ScriptedSession {
    fn set_repeating_request(&mut self) -> PlatformResult<()> {
        self.probe.repeating_started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn acquire_latest_image(&mut self) -> Option<Box<dyn Image>> {
        let mut images = self.images.lock().unwrap();
        let latest = images.pop_back();
        // Older images are released here
        images.clear();
        latest.map(|image| Box::new(image) as Box<dyn Image>)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.probe.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct ScriptedImage {
    encoding: PixelEncoding,
    width: u32,
    height: u32,
    planes: Vec<Vec<u8>>,
    probe: Arc<Probe>,
}

impl ScriptedImage {
    pub fn new(
        platform: &ScriptedPlatform,
        encoding: PixelEncoding,
        width: u32,
        height: u32,
        planes: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            encoding,
            width,
            height,
            planes,
            probe: Arc::clone(&platform.probe),
        }
    }

    pub fn jpeg(platform: &ScriptedPlatform, data: Vec<u8>) -> Self {
        Self::new(platform, PixelEncoding::Jpeg, 640, 480, vec![data])
    }
}

impl Image for ScriptedImage {
    fn encoding(&self) -> PixelEncoding {
        self.encoding
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn planes(&self) -> Vec<&[u8]> {
        self.planes.iter().map(|plane| plane.as_slice()).collect()
    }
}

impl Drop for ScriptedImage {
    fn drop(&mut self) {
        self.probe.images_released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub encoding: PixelEncoding,
    pub width: u32,
    pub height: u32,
    pub rotation: u32,
    pub planes: Vec<Vec<u8>>,
}

/// Sink that records everything it is given
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<RecordedFrame>>,
    errors: Mutex<Vec<CameraError>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<CameraError> {
        self.errors.lock().unwrap().clone()
    }
}

/// Hand a recording sink to `activate`
pub fn as_sink(sink: &Arc<RecordingSink>) -> Option<Arc<dyn FrameSink>> {
    let sink: Arc<dyn FrameSink> = sink.clone();
    Some(sink)
}

impl FrameSink for RecordingSink {
    fn on_frame(&self, frame: &Frame<'_>) {
        self.frames.lock().unwrap().push(RecordedFrame {
            encoding: frame.encoding,
            width: frame.width,
            height: frame.height,
            rotation: frame.rotation,
            planes: frame.planes.iter().map(|plane| plane.to_vec()).collect(),
        });
    }

    fn on_error(&self, error: &CameraError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

/// Server over a scripted platform with default configuration
pub fn server(platform: &Arc<ScriptedPlatform>, host: &Arc<LocalHost>) -> CameraServer {
    CameraServer::with_defaults(platform.clone(), host.clone())
}
