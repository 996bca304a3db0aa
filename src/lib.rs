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

//! Jitter-concealing packet pool for low-latency uncompressed audio.
//!
//! A transport ships fixed-size PCM packets over an unreliable datagram
//! link; at the receiver an audio callback pulls one packet per period.
//! Jitter, reordering, and loss mean the packet due at pull time may be
//! missing. This crate keeps a small pool of recent arrivals keyed by a
//! receiver-assigned sequence, plays the packet trailing the pull cursor by
//! a configured lag, and when that packet is absent fabricates a plausible
//! continuation with Burg linear prediction, cross-fading back to real
//! audio afterwards. A health monitor realigns the cursors after sustained
//! loss.
//!
//! The ingress thread and the audio callback share one [`PoolBuffer`]:
//!
//! ```
//! use poolbuf::{PoolBuffer, PoolConfig};
//!
//! let pool = PoolBuffer::new(PoolConfig::default())?;
//!
//! let packet = vec![0u8; pool.packet_bytes()];
//! pool.push(&packet)?;
//!
//! let mut out = vec![0u8; pool.packet_bytes()];
//! pool.pull(&mut out)?;
//! # Ok::<(), poolbuf::PoolBufferError>(())
//! ```

pub mod channel;
pub mod codec;
pub mod engine;
pub mod error;
pub mod fade;
pub mod pool;
pub mod poolbuf;
pub mod predictor;

pub use codec::{BitDepth, SampleCodec};
pub use engine::{ConcealmentEngine, ConcealmentMode};
pub use error::{PoolBufferError, Result};
pub use poolbuf::{PoolBuffer, PoolConfig, PoolStats};
pub use predictor::BurgPredictor;
