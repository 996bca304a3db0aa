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

//! Concurrent façade over the packet pool and the concealment engine.
//!
//! One ingress thread calls [`PoolBuffer::push`] per received datagram; the
//! audio callback calls [`PoolBuffer::pull`] once per period. Both take
//! `&self`, so a single instance is shared behind an `Arc`. All shared state
//! sits under one mutex, held across the whole pull including the DSP, as
//! the single ingress thread contends only briefly. Splitting the critical
//! section (locked slot copy, unlocked DSP) would also be sound; it is not
//! done here.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use web_time::Instant;

use crate::codec::{BitDepth, SampleCodec};
use crate::engine::{ConcealmentEngine, ConcealmentMode};
use crate::pool::PacketPool;
use crate::{PoolBufferError, Result};

/// Samples of training history to aim for, across all packet sizes.
const TRAIN_SPAN_SAMPLES: usize = 192;

/// Ceiling on history depth in packets; bounds the predictor order.
const MAX_HISTORY_PACKETS: usize = 6;

/// Packets of history the predictor trains on for a given packet size:
/// enough packets to cover [`TRAIN_SPAN_SAMPLES`], clamped to `[1, 6]`.
fn history_depth(frames_per_packet: usize) -> usize {
    TRAIN_SPAN_SAMPLES.div_ceil(frames_per_packet).clamp(1, MAX_HISTORY_PACKETS)
}

/// Pool buffer configuration. All fields are fixed at construction.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of audio channels
    pub channels: u8,
    /// Sample format of the transported packets
    pub bit_depth: BitDepth,
    /// Frames (samples per channel) in one packet
    pub frames_per_packet: usize,
    /// Number of packet slots in the pool
    pub pool_size: usize,
    /// Playback delay in packets between the newest push and the pull target
    pub rcv_lag: usize,
    /// Concealment strategy
    pub mode: ConcealmentMode,
    /// Override for the resync threshold; `None` derives it from the
    /// training span (`history_depth * 2 * frames_per_packet`)
    pub glitch_max: Option<u32>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            bit_depth: BitDepth::Pcm16,
            frames_per_packet: 128,
            pool_size: 16,
            rcv_lag: 4,
            mode: ConcealmentMode::default(),
            glitch_max: None,
        }
    }
}

/// Snapshot of the monitor counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    /// Packets pushed since construction
    pub incoming_packets: u64,
    /// Packets pulled since construction
    pub outgoing_packets: u64,
    /// Missed pulls since the last resync
    pub glitch_count: u32,
    /// Missed pulls since construction
    pub total_glitches: u64,
    /// Times the health monitor realigned the cursors
    pub resync_count: u64,
    /// Pulls processed by the concealment engine since the stream started
    pub processed_packets: u64,
    /// Whether the stream has started (first resync observed)
    pub started: bool,
    /// Milliseconds since construction
    pub uptime_ms: u64,
}

#[derive(Debug)]
struct Shared {
    pool: PacketPool,
    engine: ConcealmentEngine,
    /// Transfer buffer: slot bytes land here, the engine rewrites in place.
    xfr: Vec<u8>,
    /// One packet of codec-encoded silence, played until the stream starts.
    zeros: Vec<u8>,
    incoming_cnt: i64,
    outgoing_cnt: i64,
    glitch_cnt: u32,
    started: bool,
    total_glitches: u64,
    resyncs: u64,
}

/// Jitter-concealing packet pool.
///
/// Sits between network ingress and audio egress of an uncompressed PCM
/// transport. Pushed packets are tagged with a receiver-assigned arrival
/// sequence and parked in a bounded slot pool; each pull plays the packet
/// whose sequence trails the pull counter by the configured lag, concealing
/// with linear prediction when that packet has not arrived.
#[derive(Debug)]
pub struct PoolBuffer {
    shared: Mutex<Shared>,
    config: PoolConfig,
    packet_bytes: usize,
    rcv_lag: i64,
    glitch_max: u32,
    hist: usize,
    created_at: Instant,
}

impl PoolBuffer {
    pub fn new(config: PoolConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(PoolBufferError::InvalidSampleRate(config.sample_rate));
        }
        if config.channels == 0 {
            return Err(PoolBufferError::InvalidChannelCount(config.channels));
        }
        if config.frames_per_packet == 0 {
            return Err(PoolBufferError::InvalidFramesPerPacket(config.frames_per_packet));
        }
        if config.pool_size < 2 {
            return Err(PoolBufferError::InvalidPoolSize(config.pool_size));
        }
        if config.rcv_lag >= config.pool_size {
            log::warn!(
                "rcv_lag {} >= pool_size {}: targets can outlive the pool",
                config.rcv_lag,
                config.pool_size
            );
        }

        let channels = config.channels as usize;
        let packet_bytes =
            config.frames_per_packet * channels * config.bit_depth.bytes_per_sample();
        let hist = history_depth(config.frames_per_packet);
        let glitch_max = config
            .glitch_max
            .unwrap_or((hist * 2 * config.frames_per_packet) as u32);

        let codec = SampleCodec::new(config.bit_depth, channels);
        let engine = ConcealmentEngine::new(
            codec,
            config.mode,
            channels,
            config.frames_per_packet,
            hist,
        );

        let mut zeros = vec![0u8; packet_bytes];
        for frame in 0..config.frames_per_packet {
            for ch in 0..channels {
                codec.write_sample(0.0, &mut zeros, ch, frame);
            }
        }

        log::debug!(
            "pool buffer: {} slots of {} bytes, lag {}, history {} packets, glitch_max {}",
            config.pool_size,
            packet_bytes,
            config.rcv_lag,
            hist,
            glitch_max
        );

        Ok(Self {
            shared: Mutex::new(Shared {
                pool: PacketPool::new(config.pool_size, packet_bytes),
                engine,
                xfr: zeros.clone(),
                zeros,
                incoming_cnt: 0,
                outgoing_cnt: 0,
                glitch_cnt: 0,
                started: false,
                total_glitches: 0,
                resyncs: 0,
            }),
            rcv_lag: config.rcv_lag as i64,
            glitch_max,
            hist,
            packet_bytes,
            config,
            created_at: Instant::now(),
        })
    }

    /// Size in bytes of every packet this pool accepts and emits.
    pub fn packet_bytes(&self) -> usize {
        self.packet_bytes
    }

    /// Training history depth derived from the packet size, in packets.
    pub fn history_depth(&self) -> usize {
        self.hist
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // Every invariant is re-established before unlock on all paths, so a
        // poisoned lock is safe to re-enter.
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Accept one packet from the ingress thread.
    ///
    /// The packet is tagged with the next arrival sequence and replaces the
    /// oldest pool slot. When the health monitor sees sustained loss
    /// (`glitch_cnt` past the threshold) it realigns the ingress counter to
    /// the egress cursor first, making this packet the new frontier; that is
    /// also what starts the stream after cold start.
    pub fn push(&self, buf: &[u8]) -> Result<()> {
        if buf.len() != self.packet_bytes {
            return Err(PoolBufferError::PacketSizeMismatch {
                expected: self.packet_bytes,
                actual: buf.len(),
            });
        }

        let mut shared = self.lock();
        let shared = &mut *shared;

        shared.incoming_cnt += 1;
        if shared.glitch_cnt > self.glitch_max {
            shared.started = true;
            shared.incoming_cnt = shared.outgoing_cnt;
            shared.glitch_cnt = 0;
            shared.resyncs += 1;
            log::debug!("resync: ingress realigned to egress cursor {}", shared.outgoing_cnt);
        }
        shared.pool.insert(shared.incoming_cnt, buf);
        Ok(())
    }

    /// Produce one packet for the audio callback.
    ///
    /// Looks up the lagged target sequence; a hit plays (and consumes) the
    /// slot, a miss evicts the oldest slot and runs concealment over the
    /// previous transfer buffer. Before the stream starts, emits silence.
    pub fn pull(&self, out: &mut [u8]) -> Result<()> {
        if out.len() != self.packet_bytes {
            return Err(PoolBufferError::PacketSizeMismatch {
                expected: self.packet_bytes,
                actual: out.len(),
            });
        }

        let mut shared = self.lock();
        let shared = &mut *shared;

        shared.outgoing_cnt += 1;
        let target = shared.outgoing_cnt - self.rcv_lag;

        let glitch = !shared.pool.take(target, &mut shared.xfr);
        if glitch {
            shared.glitch_cnt += 1;
            shared.total_glitches += 1;
        }

        if shared.started {
            shared.engine.process(&mut shared.xfr, glitch);
        } else {
            shared.xfr.copy_from_slice(&shared.zeros);
        }

        out.copy_from_slice(&shared.xfr);
        Ok(())
    }

    /// Snapshot the monitor counters.
    pub fn stats(&self) -> PoolStats {
        let shared = self.lock();
        PoolStats {
            incoming_packets: shared.incoming_cnt.max(0) as u64,
            outgoing_packets: shared.outgoing_cnt.max(0) as u64,
            glitch_count: shared.glitch_cnt,
            total_glitches: shared.total_glitches,
            resync_count: shared.resyncs,
            processed_packets: shared.engine.packet_count(),
            started: shared.started,
            uptime_ms: self.created_at.elapsed().as_millis() as u64,
        }
    }
}
