// SPDX-License-Identifier: MPL-2.0

//! Media processing for delivered frames
//!
//! Frames reach a sink still compressed and in sensor orientation. The
//! [`decoders`] module turns them into upright RGB images.
//!
//! # Modules
//!
//! - [`decoders`]: JPEG decoding and display-upright rotation

pub mod decoders;

// Re-export commonly used types
pub use decoders::{JpegFrameDecoder, decode_upright};
