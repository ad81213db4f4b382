// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Listing a camera's output formats
//! - Capturing a frame to disk

use camera_server::backends::camera::{CameraServer, ChannelSink, FrameSink, SinkEvent};
use camera_server::backends::camera::types::OwnedFrame;
use camera_server::backends::host::LocalHost;
use camera_server::backends::virtual_camera::VirtualPlatform;
use camera_server::config::Config;
use camera_server::constants::{capture, cli as cli_defaults};
use camera_server::media::decode_upright;
use chrono::Local;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build a server on the virtual platform described by `config`
fn build_server(config: &Config) -> Result<CameraServer, Box<dyn std::error::Error>> {
    let platform = VirtualPlatform::new(&config.virtual_cameras_or_default())?;
    let host = LocalHost::from_config(&config.host, &config.server.camera_permission);
    Ok(CameraServer::new(
        Arc::new(platform),
        Arc::new(host),
        config.server.clone(),
    ))
}

/// List all available cameras
pub fn list_cameras(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = build_server(config)?;

    if server.feeds().is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, feed) in server.feeds().iter().enumerate() {
        let descriptor = feed.descriptor();
        println!(
            "  [{}] {} ({}, mounted at {})",
            index, descriptor.id, descriptor.facing, descriptor.sensor_rotation
        );

        let formats = feed.list_formats();
        if formats.is_empty() {
            println!("      Formats: none supported");
        } else {
            let sizes: Vec<String> = formats
                .iter()
                .map(|f| format!("{}x{}", f.width, f.height))
                .collect();
            println!("      Formats: {}", sizes.join(", "));
        }
        println!();
    }

    Ok(())
}

/// List the output formats of one camera with their indices
pub fn list_formats(config: &Config, camera_index: usize) -> Result<(), Box<dyn std::error::Error>> {
    let server = build_server(config)?;
    let feed = server
        .feeds()
        .get(camera_index)
        .ok_or_else(|| index_error(camera_index, server.feeds().len()))?;

    println!("Formats for camera {}:", feed.id());
    let formats = feed.list_formats();
    if formats.is_empty() {
        println!("  (none)");
    }
    for (index, format) in formats.iter().enumerate() {
        println!("  [{}] {}", index, format);
    }

    Ok(())
}

/// Capture frames from a camera and save the last one
pub fn capture_frame(
    config: &Config,
    camera_index: usize,
    format_index: Option<i32>,
    frames: usize,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = build_server(config)?;
    let feed = server
        .feeds()
        .get(camera_index)
        .ok_or_else(|| index_error(camera_index, server.feeds().len()))?;

    if let Some(index) = format_index {
        if !feed.select_format(index) {
            return Err(format!(
                "Format index {} out of range for camera {} (see 'camera-server formats')",
                index,
                feed.id()
            )
            .into());
        }
    }

    if !server.permission_granted() {
        server.request_permission();
        return Err("Camera permission not granted (set host.grant_permission in the config)".into());
    }

    println!("Using camera: {}", feed.id());
    let (sink, mut receiver) = ChannelSink::new(capture::CHANNEL_CAPACITY);
    let sink = Arc::new(sink);
    feed.activate(Some(Arc::clone(&sink) as Arc<dyn FrameSink>));

    let rt = tokio::runtime::Runtime::new()?;
    let result: Result<Option<OwnedFrame>, Box<dyn std::error::Error>> = rt.block_on(async {
        let mut last = None;
        for _ in 0..frames.max(1) {
            match tokio::time::timeout(cli_defaults::FRAME_TIMEOUT, receiver.next()).await {
                Ok(Some(SinkEvent::Frame(frame))) => last = Some(frame),
                Ok(Some(SinkEvent::Error(e))) => return Err(e.into()),
                Ok(None) => break,
                Err(_) => return Err("Timed out waiting for a frame".into()),
            }
        }
        Ok(last)
    });
    feed.deactivate();

    let frame = result?.ok_or("No frames received")?;
    if sink.dropped_frames() > 0 {
        println!("Dropped {} frames while waiting", sink.dropped_frames());
    }
    println!(
        "Captured {} {}x{} (rotation {}°)",
        frame.encoding, frame.width, frame.height, frame.rotation
    );

    let image = decode_upright(&frame.as_frame())?;
    let path = output_path(output)?;
    image.save(&path)?;
    println!("Saved: {}", path.display());

    Ok(())
}

fn index_error(index: usize, count: usize) -> Box<dyn std::error::Error> {
    if count == 0 {
        return "No cameras found".into();
    }
    format!("Camera index {} out of range (0-{})", index, count - 1).into()
}

/// Resolve where to save a capture, creating the directory if needed
fn output_path(output: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = match output {
        Some(path) if path.is_dir() => path.join(default_file_name()),
        Some(path) => path,
        None => get_default_capture_dir().join(default_file_name()),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path)
}

fn default_file_name() -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("frame_{}.jpg", timestamp)
}

/// Get the default capture directory
fn get_default_capture_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(cli_defaults::OUTPUT_DIR_NAME)
}

/// Load the configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::default()),
    }
}
