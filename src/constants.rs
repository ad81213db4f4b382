// SPDX-License-Identifier: GPL-3.0-only

//! Crate-wide constants

use std::time::Duration;

/// Host permission handling
pub mod permissions {
    /// Permission name the host must grant before any device is opened
    pub const CAMERA: &str = "CAMERA";
}

/// Named events emitted through the host runtime
pub mod signals {
    /// Emitted once per permission result that granted camera access
    pub const PERMISSION_GRANTED: &str = "camera_permission_granted";
    /// Emitted once per permission result that denied camera access
    pub const PERMISSION_DENIED: &str = "camera_permission_denied";
}

/// Background callback worker
pub mod worker {
    /// Default name of the shared callback thread
    pub const THREAD_NAME: &str = "camera-callbacks";
}

/// Capture session parameters
pub mod capture {
    /// Images the platform may hold for one session before the oldest is recycled
    pub const MAX_IMAGES: usize = 2;

    /// Frames buffered by a channel sink before new frames are dropped
    pub const CHANNEL_CAPACITY: usize = 4;
}

/// Virtual camera defaults
pub mod virtual_camera {
    use super::Duration;

    /// Frame interval used when a virtual camera does not configure one (~30fps)
    pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

    /// JPEG quality for synthesized test-pattern frames
    pub const PATTERN_JPEG_QUALITY: u8 = 80;
}

/// CLI defaults
pub mod cli {
    use super::Duration;

    /// How long `capture` waits for each frame before giving up
    pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

    /// Directory created under the user's pictures folder for captured frames
    pub const OUTPUT_DIR_NAME: &str = "camera-server";
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
