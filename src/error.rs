/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

use thiserror::Error;

/// Result type for pool buffer operations
pub type Result<T> = std::result::Result<T, PoolBufferError>;

/// Errors that can occur in pool buffer operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolBufferError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(u8),

    #[error("Invalid bit resolution code: {0}")]
    InvalidBitDepth(u8),

    #[error("Invalid frames per packet: {0}")]
    InvalidFramesPerPacket(usize),

    #[error("Invalid pool size: {0} (must be at least 2)")]
    InvalidPoolSize(usize),

    #[error("Packet size mismatch: expected {expected} bytes, got {actual}")]
    PacketSizeMismatch { expected: usize, actual: usize },
}
