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

use poolbuf::{BitDepth, ConcealmentMode, PoolBuffer, PoolConfig, SampleCodec};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Pool Buffer Example");
    println!("===================");

    let config = PoolConfig {
        sample_rate: 48000,
        channels: 1,
        bit_depth: BitDepth::Pcm16,
        frames_per_packet: 32,
        pool_size: 16,
        rcv_lag: 2,
        mode: ConcealmentMode::SmoothedLpc,
        glitch_max: None,
    };
    let fpp = config.frames_per_packet;
    let pool = PoolBuffer::new(config)?;

    println!(
        "Created pool: {} byte packets, history {} packets",
        pool.packet_bytes(),
        pool.history_depth()
    );

    // The audio callback starts before the peer does. The dry pulls rack up
    // glitches until the first arriving packet trips the health monitor and
    // starts the stream.
    let mut out = vec![0u8; pool.packet_bytes()];
    for _ in 0..400 {
        pool.pull(&mut out)?;
    }
    pool.push(&vec![0u8; pool.packet_bytes()])?;
    println!("Stream started: {}", pool.stats().started);

    // Stream a 440 Hz tone. Three packets out of every ten are held up in
    // the network for three periods: the lag absorbs the first two and the
    // third forces one concealed pull.
    let codec = SampleCodec::new(BitDepth::Pcm16, 1);
    let mut in_flight: Vec<(usize, Vec<u8>)> = Vec::new();
    let mut concealed = 0u64;

    for k in 0..300usize {
        let mut i = 0;
        while i < in_flight.len() {
            if in_flight[i].0 <= k {
                let (_, late) = in_flight.remove(i);
                pool.push(&late)?;
            } else {
                i += 1;
            }
        }

        let mut packet = vec![0u8; pool.packet_bytes()];
        for s in 0..fpp {
            let t = (k * fpp + s) as f32 / 48000.0;
            let v = 0.5 * (std::f32::consts::TAU * 440.0 * t).sin();
            codec.write_sample(v, &mut packet, 0, s);
        }
        if k % 10 >= 7 {
            in_flight.push((k + 3, packet));
        } else {
            pool.push(&packet)?;
        }

        let before = pool.stats().total_glitches;
        pool.pull(&mut out)?;
        concealed += pool.stats().total_glitches - before;

        if k % 50 == 0 {
            let stats = pool.stats();
            println!(
                "packet {k}: in={} out={} glitches={} resyncs={}",
                stats.incoming_packets,
                stats.outgoing_packets,
                stats.total_glitches,
                stats.resync_count
            );
        }
    }

    let stats = pool.stats();
    println!("\nFinal statistics:");
    println!("  pushed:            {}", stats.incoming_packets);
    println!("  pulled:            {}", stats.outgoing_packets);
    println!("  concealed pulls:   {concealed}");
    println!("  lifetime glitches: {}", stats.total_glitches);
    println!("  resyncs:           {}", stats.resync_count);
    println!("  uptime:            {} ms", stats.uptime_ms);

    Ok(())
}
