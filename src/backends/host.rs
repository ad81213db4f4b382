// SPDX-License-Identifier: GPL-3.0-only

//! In-process host runtime
//!
//! Keeps the granted permission set and display rotation in memory and
//! records permission requests and emitted signals so callers can answer
//! them later.

use super::camera::HostRuntime;
use super::camera::types::DisplayRotation;
use crate::config::HostConfig;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct HostState {
    granted: BTreeSet<String>,
    requests: Vec<String>,
    signals: Vec<String>,
    rotation: DisplayRotation,
}

/// Host runtime backed by plain memory
#[derive(Debug, Default)]
pub struct LocalHost {
    state: Mutex<HostState>,
}

impl LocalHost {
    /// A host that has granted nothing, at display rotation 0
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose initial state comes from configuration
    pub fn from_config(config: &HostConfig, camera_permission: &str) -> Self {
        let host = Self::new();
        if config.grant_permission {
            host.grant(camera_permission);
        }
        host.set_display_rotation(config.display_rotation);
        host
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn grant(&self, permission: &str) {
        self.lock().granted.insert(permission.to_string());
    }

    pub fn revoke(&self, permission: &str) {
        self.lock().granted.remove(permission);
    }

    pub fn set_display_rotation(&self, rotation: DisplayRotation) {
        self.lock().rotation = rotation;
    }

    /// Permission requests received so far, oldest first
    pub fn permission_requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Signals emitted so far, oldest first
    pub fn emitted_signals(&self) -> Vec<String> {
        self.lock().signals.clone()
    }
}

impl HostRuntime for LocalHost {
    fn granted_permissions(&self) -> Vec<String> {
        self.lock().granted.iter().cloned().collect()
    }

    fn request_permission(&self, permission: &str) {
        debug!(permission, "Permission requested");
        self.lock().requests.push(permission.to_string());
    }

    fn emit_signal(&self, signal: &str) {
        debug!(signal, "Signal emitted");
        self.lock().signals.push(signal.to_string());
    }

    fn display_rotation(&self) -> DisplayRotation {
        self.lock().rotation
    }
}
