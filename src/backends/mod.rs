// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! This module provides:
//! - The camera feed state machine and the server that owns the feeds
//! - A virtual camera platform synthesizing sensors from configuration
//! - An in-process host runtime
//!
//! # Architecture
//!
//! The backend layer abstracts hardware access, providing a consistent API
//! regardless of the underlying platform:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             Host / Frame Sinks               │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │    Host     │    │     Camera       │   │
//! │  │   (local)   │    │ (server, feeds)  │   │
//! │  └─────────────┘    └──────────────────┘   │
//! │                     ┌──────────────────┐   │
//! │                     │ Virtual Camera   │   │
//! │                     │   (platform)     │   │
//! │                     └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Feeds, server, callback worker and the platform traits
//! - [`host`]: In-process host runtime
//! - [`virtual_camera`]: Configurable virtual camera platform

pub mod camera;
pub mod host;
pub mod virtual_camera;
