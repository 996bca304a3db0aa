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

//! Runs a sine tone through the pool over a simulated lossy link and writes
//! what the audio callback would have played to a WAV file, so the
//! concealment modes can be compared by ear.

use clap::Parser;
use poolbuf::{BitDepth, ConcealmentMode, PoolBuffer, PoolConfig, SampleCodec};
use rand::Rng;

#[derive(Parser, Debug)]
#[command(about = "Play a tone through a lossy jitter-concealing pool into a WAV file")]
struct Args {
    /// Sample rate in Hz
    #[arg(long, default_value_t = 48000)]
    sample_rate: u32,

    /// Frames per packet
    #[arg(long, default_value_t = 128)]
    fpp: usize,

    /// Packet pool size
    #[arg(long, default_value_t = 16)]
    pool: usize,

    /// Playback lag in packets
    #[arg(long, default_value_t = 3)]
    lag: usize,

    /// Concealment mode code (0-5)
    #[arg(long, default_value_t = 3)]
    mode: u8,

    /// Tone frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    freq: f32,

    /// Seconds of audio to run
    #[arg(long, default_value_t = 4.0)]
    seconds: f32,

    /// Probability that a packet is held up for a few periods
    #[arg(long, default_value_t = 0.05)]
    late_rate: f32,

    /// Probability that a packet never arrives
    #[arg(long, default_value_t = 0.005)]
    drop_rate: f32,

    /// Output WAV path
    #[arg(long, default_value = "loss_player.wav")]
    output: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mode = ConcealmentMode::from_code(args.mode)
        .ok_or_else(|| format!("unknown concealment mode {}", args.mode))?;

    let config = PoolConfig {
        sample_rate: args.sample_rate,
        channels: 1,
        bit_depth: BitDepth::Pcm16,
        frames_per_packet: args.fpp,
        pool_size: args.pool,
        rcv_lag: args.lag,
        mode,
        glitch_max: None,
    };
    let pool = PoolBuffer::new(config)?;
    let codec = SampleCodec::new(BitDepth::Pcm16, 1);

    // Dry pre-roll: the callback runs before the peer connects, and the
    // first packet after the glitch threshold starts the stream.
    let glitch_max = pool.history_depth() * 2 * args.fpp;
    let mut out = vec![0u8; pool.packet_bytes()];
    for _ in 0..=glitch_max {
        pool.pull(&mut out)?;
    }
    pool.push(&vec![0u8; pool.packet_bytes()])?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: args.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&args.output, spec)?;

    let packets = (args.seconds * args.sample_rate as f32 / args.fpp as f32) as usize;
    let mut rng = rand::rng();
    let mut in_flight: Vec<(usize, Vec<u8>)> = Vec::new();
    let mut dropped = 0usize;
    let mut late = 0usize;

    for k in 0..packets {
        let mut i = 0;
        while i < in_flight.len() {
            if in_flight[i].0 <= k {
                let (_, p) = in_flight.remove(i);
                pool.push(&p)?;
            } else {
                i += 1;
            }
        }

        let mut packet = vec![0u8; pool.packet_bytes()];
        for s in 0..args.fpp {
            let t = (k * args.fpp + s) as f32 / args.sample_rate as f32;
            let v = 0.5 * (std::f32::consts::TAU * args.freq * t).sin();
            codec.write_sample(v, &mut packet, 0, s);
        }

        let roll: f32 = rng.random();
        if roll < args.drop_rate {
            dropped += 1;
        } else if roll < args.drop_rate + args.late_rate {
            late += 1;
            in_flight.push((k + rng.random_range(2..=4), packet));
        } else {
            pool.push(&packet)?;
        }

        pool.pull(&mut out)?;
        for b in out.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([b[0], b[1]]))?;
        }
    }
    writer.finalize()?;

    let stats = pool.stats();
    println!("Wrote {} packets to {}", packets, args.output);
    println!("  late: {late}  dropped: {dropped}");
    println!(
        "  glitched pulls: {}  resyncs: {}",
        stats.total_glitches, stats.resync_count
    );

    Ok(())
}
