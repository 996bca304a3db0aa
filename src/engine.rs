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

//! Pull-time concealment: decode the transfer buffer, train the predictor on
//! recent history, and rewrite the buffer with truth, prediction, or a
//! cross-fade of the two.

use crate::channel::ChannelState;
use crate::codec::SampleCodec;
use crate::fade::FadeTables;
use crate::predictor::BurgPredictor;

/// Strategy applied when the pull target is missing (and, for the smoothed
/// mode, on the packet right after).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcealmentMode {
    /// No concealment; stale bytes play as-is.
    Passthrough,
    /// Repeat the most recent clean packet.
    HoldLast,
    /// Silence on loss.
    Mute,
    /// Linear prediction with a one-packet cross-fade back to truth.
    #[default]
    SmoothedLpc,
    /// Linear prediction, no cross-fade.
    RawLpc,
    /// Always play the prediction, clean packets included. Diagnostic.
    AlwaysPredict,
}

impl ConcealmentMode {
    /// Numeric strategy codes as exposed by configuration front-ends.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ConcealmentMode::Passthrough),
            1 => Some(ConcealmentMode::HoldLast),
            2 => Some(ConcealmentMode::Mute),
            3 => Some(ConcealmentMode::SmoothedLpc),
            4 => Some(ConcealmentMode::RawLpc),
            5 => Some(ConcealmentMode::AlwaysPredict),
            _ => None,
        }
    }

    fn uses_lpc(self) -> bool {
        matches!(
            self,
            ConcealmentMode::SmoothedLpc | ConcealmentMode::RawLpc | ConcealmentMode::AlwaysPredict
        )
    }
}

/// Per-pull concealment pass over all channels of the transfer buffer.
#[derive(Debug)]
pub struct ConcealmentEngine {
    codec: SampleCodec,
    fades: FadeTables,
    predictor: BurgPredictor,
    channels: Vec<ChannelState>,
    mode: ConcealmentMode,
    frames_per_packet: usize,
    history_depth: usize,
    prediction_len: usize,
    packet_cnt: u64,
    last_was_glitch: bool,
}

impl ConcealmentEngine {
    pub fn new(
        codec: SampleCodec,
        mode: ConcealmentMode,
        channels: usize,
        frames_per_packet: usize,
        history_depth: usize,
    ) -> Self {
        let train_len = history_depth * frames_per_packet;
        // The refresh of next_pred reads prediction[s + FPP], so always
        // extrapolate at least two packets even at shallow history depths.
        let prediction_len = (train_len - 1).max(2 * frames_per_packet);
        Self {
            codec,
            fades: FadeTables::new(frames_per_packet),
            predictor: BurgPredictor::new(train_len),
            channels: (0..channels)
                .map(|_| ChannelState::new(frames_per_packet, history_depth, prediction_len))
                .collect(),
            mode,
            frames_per_packet,
            history_depth,
            prediction_len,
            packet_cnt: 0,
            last_was_glitch: false,
        }
    }

    /// Pulls processed since the stream started.
    pub fn packet_count(&self) -> u64 {
        self.packet_cnt
    }

    /// Run one concealment pass over `xfr` (all channels), then advance the
    /// glitch bookkeeping.
    pub fn process(&mut self, xfr: &mut [u8], glitch: bool) {
        let prev_glitch = self.last_was_glitch;
        for ch in 0..self.channels.len() {
            self.process_channel(ch, xfr, glitch, prev_glitch);
        }
        self.last_was_glitch = glitch;
        self.packet_cnt += 1;
    }

    fn process_channel(&mut self, ch: usize, xfr: &mut [u8], glitch: bool, prev_glitch: bool) {
        let fpp = self.frames_per_packet;
        let train_len = self.history_depth * fpp;
        let warm = self.packet_cnt > 0;
        let prediction_len = self.prediction_len;
        let mode = self.mode;

        let codec = self.codec;
        let fades = &self.fades;
        let predictor = &mut self.predictor;
        let cd = &mut self.channels[ch];

        // Decode unconditionally; on a glitch these are the previous cycle's
        // stale bytes and the mode table below decides whether they play.
        for s in 0..fpp {
            cd.truth[s] = codec.read_sample(xfr, ch, s);
        }

        if warm {
            if mode.uses_lpc() {
                cd.fill_training();
                predictor.train(&cd.training, &mut cd.coeffs);

                if cd.coeffs.iter().all(|c| c.is_finite()) {
                    cd.scratch.clear();
                    cd.scratch.extend_from_slice(&cd.training);
                    predictor.predict(&cd.coeffs, &mut cd.scratch, prediction_len);
                    for (i, p) in cd.prediction.iter_mut().enumerate() {
                        *p = cd.scratch[train_len + i] as f32;
                    }
                } else {
                    // Degenerate training window; conceal with silence for
                    // this cycle rather than propagate non-finite samples.
                    cd.prediction.fill(0.0);
                }

                if mode == ConcealmentMode::SmoothedLpc {
                    for s in 0..fpp {
                        cd.xfaded_pred[s] =
                            cd.truth[s] * fades.up[s] + cd.next_pred[s] * fades.down[s];
                    }
                }
            }

            for s in 0..fpp {
                let out = match mode {
                    ConcealmentMode::Passthrough => cd.truth[s],
                    ConcealmentMode::HoldLast => {
                        if glitch {
                            cd.last_good[s]
                        } else {
                            cd.truth[s]
                        }
                    }
                    ConcealmentMode::Mute => {
                        if glitch {
                            0.0
                        } else {
                            cd.truth[s]
                        }
                    }
                    ConcealmentMode::SmoothedLpc => {
                        if glitch {
                            cd.prediction[s]
                        } else if prev_glitch {
                            cd.xfaded_pred[s]
                        } else {
                            cd.truth[s]
                        }
                    }
                    ConcealmentMode::RawLpc => {
                        if glitch {
                            cd.prediction[s]
                        } else {
                            cd.truth[s]
                        }
                    }
                    ConcealmentMode::AlwaysPredict => cd.prediction[s],
                };
                codec.write_sample(out, xfr, ch, s);
            }

            if mode.uses_lpc() {
                for s in 0..fpp {
                    cd.next_pred[s] = cd.prediction[s + fpp];
                }
            }
        }

        cd.shift_history();
        // Feeding stale truth to the predictor during a glitch would poison
        // later training windows, so concealment commits its own prediction;
        // during warm-up there is no prediction yet and truth must do.
        let use_truth = !glitch || self.packet_cnt < self.history_depth as u64;
        cd.commit_history(use_truth);

        if !glitch {
            cd.last_good.copy_from_slice(&cd.truth);
        }
    }
}
