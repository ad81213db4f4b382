// SPDX-License-Identifier: GPL-3.0-only

//! Virtual capture session and its producer thread

use crate::backends::camera::types::{CaptureFormat, PixelEncoding};
use crate::backends::camera::{CaptureSession, DeviceEvent, DeviceListener, Image, WorkerHandle};
use crate::constants::virtual_camera as vc_timing;
use crate::errors::{PlatformError, PlatformResult};
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Images produced but not yet acquired
type ImageQueue = Arc<Mutex<VecDeque<Arc<[u8]>>>>;

fn lock_queue(queue: &ImageQueue) -> MutexGuard<'_, VecDeque<Arc<[u8]>>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Encode a color-bar test pattern of the given size as JPEG
pub fn test_pattern_jpeg(width: u32, height: u32) -> image::ImageResult<Vec<u8>> {
    const BARS: [[u8; 3]; 7] = [
        [235, 235, 235],
        [235, 235, 16],
        [16, 235, 235],
        [16, 235, 16],
        [235, 16, 235],
        [235, 16, 16],
        [16, 16, 235],
    ];

    let image = RgbImage::from_fn(width, height, |x, y| {
        let bar = BARS[(x as usize * BARS.len()) / width.max(1) as usize];
        // Darken towards the bottom so orientation is visible
        let shade = 255 - (y * 128 / height.max(1)).min(128);
        image::Rgb(bar.map(|c| (c as u32 * shade / 255) as u8))
    });

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, vc_timing::PATTERN_JPEG_QUALITY)
        .encode_image(&image)?;
    Ok(bytes)
}

/// A frame handed out by [`VirtualSession::acquire_latest_image`]
pub struct VirtualImage {
    encoding: PixelEncoding,
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl Image for VirtualImage {
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
        vec![&self.data[..]]
    }
}

/// Capture session that repeats one frame payload at a fixed interval
pub struct VirtualSession {
    camera_id: String,
    format: CaptureFormat,
    data: Arc<[u8]>,
    interval: Duration,
    max_images: usize,
    listener: Arc<dyn DeviceListener>,
    handler: WorkerHandle,
    queue: ImageQueue,
    stop_signal: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
}

impl VirtualSession {
    pub(super) fn new(
        camera_id: String,
        format: CaptureFormat,
        data: Arc<[u8]>,
        interval: Duration,
        max_images: usize,
        listener: Arc<dyn DeviceListener>,
        handler: WorkerHandle,
    ) -> Self {
        Self {
            camera_id,
            format,
            data,
            interval,
            max_images: max_images.max(1),
            listener,
            handler,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            stop_signal: Arc::new(AtomicBool::new(false)),
            producer: None,
        }
    }
}

impl CaptureSession for VirtualSession {
    fn set_repeating_request(&mut self) -> PlatformResult<()> {
        if self.stop_signal.load(Ordering::SeqCst) {
            return Err(PlatformError::DeviceUnavailable(format!(
                "session for camera {} is closed",
                self.camera_id
            )));
        }
        if self.producer.is_some() {
            return Ok(());
        }

        let producer = Producer {
            camera_id: self.camera_id.clone(),
            data: Arc::clone(&self.data),
            interval: self.interval,
            max_images: self.max_images,
            listener: Arc::clone(&self.listener),
            handler: self.handler.clone(),
            queue: Arc::clone(&self.queue),
            stop_signal: Arc::clone(&self.stop_signal),
        };

        let handle = thread::Builder::new()
            .name(format!("virtual-camera-{}", self.camera_id))
            .spawn(move || producer.run())
            .map_err(|e| PlatformError::Other(format!("Failed to spawn frame producer: {}", e)))?;

        debug!(camera = %self.camera_id, interval_ms = self.interval.as_millis() as u64, "Repeating request started");
        self.producer = Some(handle);
        Ok(())
    }

    fn acquire_latest_image(&mut self) -> Option<Box<dyn Image>> {
        let mut queue = lock_queue(&self.queue);
        let latest = queue.pop_back();
        queue.clear();
        drop(queue);

        latest.map(|data| {
            Box::new(VirtualImage {
                encoding: self.format.encoding,
                width: self.format.width,
                height: self.format.height,
                data,
            }) as Box<dyn Image>
        })
    }

    fn close(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(producer) = self.producer.take() {
            producer.thread().unpark();
            if producer.join().is_err() {
                warn!(camera = %self.camera_id, "Frame producer panicked");
            }
            debug!(camera = %self.camera_id, "Virtual session closed");
        }
        lock_queue(&self.queue).clear();
    }
}

impl Drop for VirtualSession {
    fn drop(&mut self) {
        self.close();
    }
}

struct Producer {
    camera_id: String,
    data: Arc<[u8]>,
    interval: Duration,
    max_images: usize,
    listener: Arc<dyn DeviceListener>,
    handler: WorkerHandle,
    queue: ImageQueue,
    stop_signal: Arc<AtomicBool>,
}

impl Producer {
    fn run(self) {
        loop {
            thread::park_timeout(self.interval);
            if self.stop_signal.load(Ordering::SeqCst) {
                break;
            }

            {
                let mut queue = lock_queue(&self.queue);
                if queue.len() >= self.max_images {
                    queue.pop_front();
                }
                queue.push_back(Arc::clone(&self.data));
            }

            let listener = Arc::clone(&self.listener);
            if !self
                .handler
                .post(move || listener.on_event(DeviceEvent::ImageAvailable))
            {
                trace!(camera = %self.camera_id, "Callback worker gone, producer exiting");
                break;
            }
        }
    }
}
