// SPDX-License-Identifier: GPL-3.0-only

//! Frame decoders
//!
//! Only JPEG frames are delivered, so JPEG is the only decoder.

mod jpeg;

pub use jpeg::{JpegFrameDecoder, decode_upright, rotate_upright};
