// SPDX-License-Identifier: GPL-3.0-only

//! Channel-backed frame sink for async consumers
//!
//! Frames are copied out of the platform buffer and pushed into a bounded
//! channel. When the consumer falls behind, new frames are dropped rather
//! than stalling the callback worker.

use super::FrameSink;
use super::types::{Frame, OwnedFrame};
use crate::errors::CameraError;
use futures::channel::mpsc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace};

/// What a [`ChannelSink`] forwards to its receiver
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Frame(OwnedFrame),
    Error(CameraError),
}

pub type FrameSender = mpsc::Sender<SinkEvent>;
pub type FrameReceiver = mpsc::Receiver<SinkEvent>;

/// Frame sink that forwards into a bounded channel
pub struct ChannelSink {
    sender: Mutex<FrameSender>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink and the receiver for its frames
    pub fn new(capacity: usize) -> (Self, FrameReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender: Mutex::new(sender),
                dropped: AtomicU64::new(0),
            },
            receiver,
        )
    }

    /// Frames dropped because the channel was full
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn send(&self, event: SinkEvent) -> bool {
        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.try_send(event) {
            Ok(()) => true,
            Err(e) if e.is_disconnected() => {
                trace!("Frame receiver dropped");
                false
            }
            Err(_) => false,
        }
    }
}

impl FrameSink for ChannelSink {
    fn on_frame(&self, frame: &Frame<'_>) {
        if !self.send(SinkEvent::Frame(frame.to_copied())) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(dropped, "Frame dropped");
        }
    }

    fn on_error(&self, error: &CameraError) {
        if !self.send(SinkEvent::Error(error.clone())) {
            debug!(error = %error, "Could not forward camera error");
        }
    }
}
