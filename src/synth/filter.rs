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

//! Resonant low-pass filter applied per voice.

use std::f32::consts::{FRAC_1_SQRT_2, PI};

/// Lowest cutoff the filter accepts.
const MIN_CUTOFF_HZ: f32 = 20.0;

/// Second order low-pass (RBJ cookbook biquad). A resonance of 0 dB is a Butterworth response.
#[derive(Debug, Clone, Default)]
pub(crate) struct LowPass {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl LowPass {
    /// Recomputes coefficients. State is kept so that the cutoff can move while a voice plays.
    pub fn set(&mut self, cutoff_hz: f32, resonance_db: f32, sample_rate: f32) {
        let cutoff = cutoff_hz.clamp(MIN_CUTOFF_HZ, sample_rate * 0.45);
        let q = 10f32.powf(resonance_db / 20.0) * FRAC_1_SQRT_2;

        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let a0 = 1.0 + alpha;

        self.b1 = (1.0 - cos) / a0;
        self.b0 = self.b1 * 0.5;
        self.b2 = self.b0;
        self.a1 = -2.0 * cos / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}
