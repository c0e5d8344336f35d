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

use crate::bank::LfoParams;

/// A delayed triangle oscillator in the range -1.0..=1.0, starting at zero and rising.
#[derive(Debug, Clone, Default)]
pub(crate) struct Lfo {
    delay: u32,
    phase: f32,
    increment: f32,
    sample_rate: f32,
}

impl Lfo {
    pub fn new(params: &LfoParams, sample_rate: f32) -> Self {
        Lfo {
            delay: (params.delay.max(0.0) * sample_rate).round() as u32,
            phase: 0.0,
            increment: params.frequency.max(0.0) / sample_rate,
            sample_rate,
        }
    }

    /// Keeps the remaining delay and the frequency at a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if sample_rate <= 0.0 || self.sample_rate <= 0.0 || sample_rate == self.sample_rate {
            return;
        }
        let ratio = sample_rate / self.sample_rate;
        self.delay = (self.delay as f32 * ratio).round() as u32;
        self.increment /= ratio;
        self.sample_rate = sample_rate;
    }

    pub fn value(&self) -> f32 {
        if self.delay > 0 {
            return 0.0;
        }
        let p = self.phase;
        if p < 0.25 {
            4.0 * p
        } else if p < 0.75 {
            2.0 - 4.0 * p
        } else {
            4.0 * p - 4.0
        }
    }

    pub fn advance(&mut self, frames: usize) {
        let mut frames = frames as u32;
        if self.delay > 0 {
            let waited = self.delay.min(frames);
            self.delay -= waited;
            frames -= waited;
        }
        self.phase = (self.phase + self.increment * frames as f32).fract();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle() {
        let mut lfo = Lfo::new(
            &LfoParams {
                delay: 0.0,
                frequency: 1.0,
            },
            1000.0,
        );
        assert_eq!(lfo.value(), 0.0);

        lfo.advance(250);
        assert!((lfo.value() - 1.0).abs() < 1e-3);
        lfo.advance(500);
        assert!((lfo.value() + 1.0).abs() < 1e-3);
        lfo.advance(250);
        assert!(lfo.value().abs() < 1e-3);
    }

    #[test]
    fn test_delay() {
        let mut lfo = Lfo::new(
            &LfoParams {
                delay: 0.1,
                frequency: 1.0,
            },
            1000.0,
        );
        lfo.advance(99);
        assert_eq!(lfo.value(), 0.0);

        // One frame finishes the delay, the rest move the phase.
        lfo.advance(251);
        assert!((lfo.value() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_sample_rate_change() {
        let mut lfo = Lfo::new(
            &LfoParams {
                delay: 0.1,
                frequency: 1.0,
            },
            1000.0,
        );
        lfo.advance(50);
        lfo.set_sample_rate(2000.0);

        // 50 ms of delay left, then a quarter cycle.
        lfo.advance(99);
        assert_eq!(lfo.value(), 0.0);
        lfo.advance(501);
        assert!((lfo.value() - 1.0).abs() < 1e-3);
    }
}
