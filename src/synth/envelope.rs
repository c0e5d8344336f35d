// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! DAHDSR envelopes.
//!
//! The volume envelope decays exponentially (linear in dB), the modulation envelope linearly.
//! Both attack linearly.

use crate::bank::EnvelopeParams;

/// Level below which an exponential envelope is silent (-80 dB).
pub(crate) const SILENCE: f32 = 1e-4;

/// Shortest release applied on note-off.
const MIN_RELEASE_SECS: f32 = 0.01;

/// Release used when a voice is cut off by another voice.
const QUICK_RELEASE_SECS: f32 = 0.005;

/// Exponential segments fall this many dB over their nominal time.
const DECAY_DB: f32 = 100.0;

/// The current envelope segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    #[default]
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Exponential,
    Linear,
}

#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    shape: Shape,
    stage: Stage,
    level: f32,
    /// Additive slope for linear segments, multiplier for exponential ones.
    step: f32,
    remaining: u32,
    sample_rate: f32,
    delay: u32,
    attack: u32,
    hold: u32,
    decay_secs: f32,
    sustain: f32,
    release_secs: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            shape: Shape::Exponential,
            stage: Stage::Done,
            level: 0.0,
            step: 0.0,
            remaining: 0,
            sample_rate: 44100.0,
            delay: 0,
            attack: 0,
            hold: 0,
            decay_secs: 0.0,
            sustain: 0.0,
            release_secs: 0.0,
        }
    }
}

impl Envelope {
    /// Starts a new envelope for the given key at the delay stage.
    pub fn new(params: &EnvelopeParams, key: u8, shape: Shape, sample_rate: f32) -> Self {
        let samples = |secs: f32| (secs.max(0.0) * sample_rate).round() as u32;
        let mut envelope = Envelope {
            shape,
            stage: Stage::Delay,
            level: 0.0,
            step: 0.0,
            remaining: 0,
            sample_rate,
            delay: samples(params.delay),
            attack: samples(params.attack),
            hold: samples(params.hold_for_key(key)),
            decay_secs: params.decay_for_key(key),
            sustain: params.sustain.clamp(0.0, 1.0),
            release_secs: params.release,
        };
        envelope.enter(Stage::Delay);
        envelope
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    pub fn is_releasing(&self) -> bool {
        matches!(self.stage, Stage::Release | Stage::Done)
    }

    /// Enters the release stage using the region's release time. Does nothing if the envelope
    /// is already releasing.
    pub fn release(&mut self) {
        if self.is_releasing() {
            return;
        }
        self.release_secs = self.release_secs.max(MIN_RELEASE_SECS);
        self.enter(Stage::Release);
    }

    /// Releases over a few milliseconds, shortening any release already in progress.
    pub fn quick_release(&mut self) {
        if self.is_done() {
            return;
        }
        self.release_secs = self.release_secs.min(QUICK_RELEASE_SECS);
        self.enter(Stage::Release);
    }

    /// Keeps the remaining timings in seconds at a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if sample_rate <= 0.0 || sample_rate == self.sample_rate {
            return;
        }
        let ratio = sample_rate / self.sample_rate;
        let rescale = |samples: u32| (samples as f32 * ratio).round() as u32;
        self.sample_rate = sample_rate;
        self.delay = rescale(self.delay);
        self.attack = rescale(self.attack);
        self.hold = rescale(self.hold);
        if self.remaining > 0 {
            self.remaining = rescale(self.remaining).max(1);
        }

        match (self.stage, self.shape) {
            (Stage::Attack, _) => self.step = (1.0 - self.level) / self.remaining.max(1) as f32,
            (Stage::Decay, Shape::Exponential) => {
                self.step = db_factor((self.decay_secs * sample_rate).max(1.0))
            }
            (Stage::Decay, Shape::Linear) => {
                self.step = 1.0 / (self.decay_secs * sample_rate).max(1.0)
            }
            (Stage::Release, Shape::Exponential) => {
                self.step = db_factor((self.release_secs * sample_rate).max(1.0))
            }
            (Stage::Release, Shape::Linear) => {
                self.step = self.level / self.remaining.max(1) as f32
            }
            _ => {}
        }
    }

    /// Advances one sample and returns the new level.
    pub fn next_level(&mut self) -> f32 {
        match self.stage {
            Stage::Delay => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.enter(Stage::Attack);
                }
            }
            Stage::Attack => {
                self.level += self.step;
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.enter(Stage::Hold);
                }
            }
            Stage::Hold => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.enter(Stage::Decay);
                }
            }
            Stage::Decay => match self.shape {
                Shape::Exponential => {
                    self.level *= self.step;
                    if self.level <= self.sustain.max(SILENCE) {
                        self.level = self.sustain;
                        self.enter(Stage::Sustain);
                    }
                }
                Shape::Linear => {
                    self.level -= self.step;
                    self.remaining = self.remaining.saturating_sub(1);
                    if self.remaining == 0 || self.level <= self.sustain {
                        self.level = self.sustain;
                        self.enter(Stage::Sustain);
                    }
                }
            },
            Stage::Release => match self.shape {
                Shape::Exponential => {
                    self.level *= self.step;
                    if self.level < SILENCE {
                        self.enter(Stage::Done);
                    }
                }
                Shape::Linear => {
                    self.level = (self.level - self.step).max(0.0);
                    self.remaining = self.remaining.saturating_sub(1);
                    if self.remaining == 0 || self.level <= 0.0 {
                        self.enter(Stage::Done);
                    }
                }
            },
            Stage::Sustain | Stage::Done => {}
        }
        self.level
    }

    /// Advances a whole block and returns the level at its end.
    pub fn advance(&mut self, frames: usize) -> f32 {
        for _ in 0..frames {
            if matches!(self.stage, Stage::Sustain | Stage::Done) {
                break;
            }
            self.next_level();
        }
        self.level
    }

    /// Moves to `stage`, skipping any stage with no duration.
    fn enter(&mut self, mut stage: Stage) {
        loop {
            self.stage = stage;
            match stage {
                Stage::Delay => {
                    self.level = 0.0;
                    self.remaining = self.delay;
                    if self.remaining > 0 {
                        return;
                    }
                    stage = Stage::Attack;
                }
                Stage::Attack => {
                    self.remaining = self.attack;
                    if self.remaining > 0 {
                        self.step = (1.0 - self.level) / self.remaining as f32;
                        return;
                    }
                    stage = Stage::Hold;
                }
                Stage::Hold => {
                    self.level = 1.0;
                    self.remaining = self.hold;
                    if self.remaining > 0 {
                        return;
                    }
                    stage = Stage::Decay;
                }
                Stage::Decay => {
                    let samples = self.decay_secs * self.sample_rate;
                    if samples < 1.0 || self.level <= self.sustain {
                        self.level = self.sustain;
                        stage = Stage::Sustain;
                        continue;
                    }
                    match self.shape {
                        Shape::Exponential => self.step = db_factor(samples),
                        Shape::Linear => {
                            self.step = 1.0 / samples;
                            self.remaining = (((1.0 - self.sustain) * samples) as u32).max(1);
                        }
                    }
                    return;
                }
                Stage::Sustain => {
                    if self.shape == Shape::Exponential && self.sustain < SILENCE {
                        stage = Stage::Done;
                        continue;
                    }
                    return;
                }
                Stage::Release => {
                    let samples = (self.release_secs * self.sample_rate).max(1.0);
                    match self.shape {
                        Shape::Exponential => self.step = db_factor(samples),
                        Shape::Linear => {
                            self.step = self.level / samples;
                            self.remaining = samples as u32;
                        }
                    }
                    return;
                }
                Stage::Done => {
                    self.level = 0.0;
                    return;
                }
            }
        }
    }
}

/// Per-sample multiplier that falls `DECAY_DB` over `samples` samples.
fn db_factor(samples: f32) -> f32 {
    10f32.powf(-DECAY_DB / 20.0 / samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 1000.0;

    fn params(delay: f32, attack: f32, decay: f32, sustain: f32, release: f32) -> EnvelopeParams {
        EnvelopeParams {
            delay,
            attack,
            hold: 0.0,
            decay,
            sustain,
            release,
            keynum_to_hold: 0.0,
            keynum_to_decay: 0.0,
        }
    }

    #[test]
    fn test_attack_to_sustain() {
        let mut env = Envelope::new(
            &params(0.0, 0.01, 0.0, 1.0, 0.1),
            60,
            Shape::Exponential,
            RATE,
        );
        assert_eq!(env.stage(), Stage::Attack);

        let mut last = 0.0;
        for _ in 0..9 {
            let level = env.next_level();
            assert!(level > last);
            last = level;
        }
        env.next_level();
        assert_eq!(env.stage(), Stage::Sustain);
        assert!((env.level() - 1.0).abs() < 1e-6);

        // Sustain holds.
        assert_eq!(env.advance(500), 1.0);
    }

    #[test]
    fn test_delay_is_silent() {
        let mut env = Envelope::new(
            &params(0.005, 0.01, 0.0, 1.0, 0.1),
            60,
            Shape::Exponential,
            RATE,
        );
        for _ in 0..4 {
            assert_eq!(env.next_level(), 0.0);
        }
        env.next_level();
        assert_eq!(env.stage(), Stage::Attack);
    }

    #[test]
    fn test_release_is_monotonic() {
        let mut env = Envelope::new(
            &params(0.0, 0.0, 0.0, 1.0, 0.1),
            60,
            Shape::Exponential,
            RATE,
        );
        env.release();
        assert_eq!(env.stage(), Stage::Release);

        let mut last = env.level();
        let mut samples = 0;
        while !env.is_done() {
            let level = env.next_level();
            assert!(level <= last);
            last = level;
            samples += 1;
            assert!(samples <= 100, "release should finish within its release time");
        }
        assert!(samples >= 70);

        // Releasing again is a no-op.
        env.release();
        assert!(env.is_done());
    }

    #[test]
    fn test_minimum_release() {
        let mut env = Envelope::new(
            &params(0.0, 0.0, 0.0, 1.0, 0.0),
            60,
            Shape::Exponential,
            RATE,
        );
        env.release();
        let level = env.next_level();
        assert!(level > 0.0 && level < 1.0);
        assert!(!env.is_done());
    }

    #[test]
    fn test_quick_release_shortens() {
        let mut env = Envelope::new(
            &params(0.0, 0.0, 0.0, 1.0, 2.0),
            60,
            Shape::Exponential,
            RATE,
        );
        env.release();
        env.quick_release();
        env.advance(6);
        assert!(env.is_done());
    }

    #[test]
    fn test_decay_to_zero_sustain_finishes() {
        let mut env = Envelope::new(
            &params(0.0, 0.0, 0.05, 0.0, 0.1),
            60,
            Shape::Exponential,
            RATE,
        );
        assert_eq!(env.stage(), Stage::Decay);
        env.advance(60);
        assert!(env.is_done());
    }

    #[test]
    fn test_sample_rate_change_keeps_seconds() {
        let mut env = Envelope::new(
            &params(0.0, 1.0, 0.0, 1.0, 0.1),
            60,
            Shape::Exponential,
            RATE,
        );
        env.advance(500);
        assert!((env.level() - 0.5).abs() < 1e-3);

        // Half a second of attack is left, which is now 1000 samples.
        env.set_sample_rate(RATE * 2.0);
        env.advance(500);
        assert_eq!(env.stage(), Stage::Attack);
        assert!((env.level() - 0.75).abs() < 1e-3);
        env.advance(500);
        assert_eq!(env.stage(), Stage::Sustain);
    }

    #[test]
    fn test_sample_rate_change_during_release() {
        let mut env = Envelope::new(
            &params(0.0, 0.0, 0.0, 1.0, 0.1),
            60,
            Shape::Exponential,
            RATE,
        );
        env.release();
        env.advance(10);
        env.set_sample_rate(RATE * 4.0);

        // 100 samples at the old rate would have finished the release.
        env.advance(100);
        assert!(!env.is_done());
        env.advance(300);
        assert!(env.is_done());
    }

    #[test]
    fn test_linear_decay() {
        let mut env = Envelope::new(&params(0.0, 0.0, 0.1, 0.5, 0.1), 60, Shape::Linear, RATE);
        assert_eq!(env.stage(), Stage::Decay);

        env.advance(25);
        assert!((env.level() - 0.75).abs() < 1e-3);
        env.advance(25);
        assert_eq!(env.stage(), Stage::Sustain);
        assert!((env.level() - 0.5).abs() < 1e-6);

        env.release();
        env.advance(100);
        assert!(env.is_done());
        assert_eq!(env.level(), 0.0);
    }
}
