// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-server")]
#[command(about = "Camera feed server running against configurable virtual cameras")]
#[command(version = camera_server::constants::app_info::version())]
struct Cli {
    /// Configuration file (JSON); built-in defaults are used when omitted
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// List the output formats of a camera
    Formats {
        /// Camera index to use (from 'camera-server list')
        #[arg(short, long, default_value = "0")]
        camera: usize,
    },

    /// Capture a frame and save it upright as JPEG
    Capture {
        /// Camera index to use (from 'camera-server list')
        #[arg(short, long, default_value = "0")]
        camera: usize,

        /// Format index to use (from 'camera-server formats')
        #[arg(short, long)]
        format: Option<i32>,

        /// Frames to receive before saving the last one
        #[arg(short = 'n', long, default_value = "5")]
        frames: usize,

        /// Output file path (default: ~/Pictures/camera-server/frame_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_server=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List => cli::list_cameras(&config),
        Commands::Formats { camera } => cli::list_formats(&config, camera),
        Commands::Capture {
            camera,
            format,
            frames,
            output,
        } => cli::capture_frame(&config, camera, format, frames, output),
    }
}
