// SPDX-License-Identifier: MPL-2.0

//! Camera Server - camera feed coordination over a platform camera API
//!
//! This library enumerates camera sensors, negotiates their output formats,
//! drives asynchronous open/configure/capture sessions and streams frames
//! with rotation metadata to a native frame sink.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Feed state machine, server, platform and host traits,
//!   plus the virtual camera platform and the in-process host
//! - [`media`]: JPEG decoding and display-upright rotation
//! - [`config`]: Server, host and virtual camera configuration
//! - [`errors`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use camera_server::backends::camera::{CameraServer, ChannelSink, FrameSink};
//! use camera_server::backends::host::LocalHost;
//! use camera_server::backends::virtual_camera::VirtualPlatform;
//! use camera_server::config::Config;
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let platform = VirtualPlatform::new(&config.virtual_cameras_or_default()).unwrap();
//! let host = LocalHost::from_config(&config.host, &config.server.camera_permission);
//! let server = CameraServer::new(Arc::new(platform), Arc::new(host), config.server);
//!
//! let (sink, _frames) = ChannelSink::new(4);
//! let sink: Arc<dyn FrameSink> = Arc::new(sink);
//! server.feeds()[0].activate(Some(sink));
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;

// Re-export commonly used types
pub use backends::camera::{CameraFeed, CameraServer, FrameSink};
pub use config::Config;
pub use errors::{CameraError, ConfigError, DecodeError, PlatformError};
