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

//! The render output format and the gain stages applied while mixing.

use std::fmt;

use tracing::debug;

pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Channel layout of rendered PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One channel, voices mixed down without panning.
    Mono,
    /// Two channels interleaved as left, right.
    StereoInterleaved,
}

/// The format every render writes until it is changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    sample_rate: u32,
    mode: OutputMode,
}

impl OutputFormat {
    /// Creates a format, clamping the sample rate to the supported range. One channel renders
    /// mono, anything else interleaved stereo.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let clamped = sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
        if clamped != sample_rate {
            debug!(requested = sample_rate, sample_rate = clamped, "Clamped sample rate");
        }
        let mode = match channels {
            0 | 1 => OutputMode::Mono,
            _ => OutputMode::StereoInterleaved,
        };
        if channels == 0 || channels > 2 {
            debug!(requested = channels, ?mode, "Clamped output channel count");
        }

        OutputFormat {
            sample_rate: clamped,
            mode,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Interleaved samples per frame.
    pub fn channels(&self) -> usize {
        match self.mode {
            OutputMode::Mono => 1,
            OutputMode::StereoInterleaved => 2,
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat {
            sample_rate: 44_100,
            mode: OutputMode::StereoInterleaved,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} channel(s)", self.sample_rate, self.channels())
    }
}

/// Constant-power gains for a pan position in -0.5..=0.5.
#[inline]
pub(crate) fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-0.5, 0.5);
    ((0.5 - pan).sqrt(), (0.5 + pan).sqrt())
}

/// Converts decibels to a linear gain.
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        let format = OutputFormat::new(1, 1);
        assert_eq!(format.sample_rate(), MIN_SAMPLE_RATE);
        assert_eq!(format.mode(), OutputMode::Mono);

        let format = OutputFormat::new(1_000_000, 6);
        assert_eq!(format.sample_rate(), MAX_SAMPLE_RATE);
        assert_eq!(format.channels(), 2);

        let format = OutputFormat::new(48_000, 0);
        assert_eq!(format.sample_rate(), 48_000);
        assert_eq!(format.channels(), 1);
    }

    #[test]
    fn test_default_matches_cd_stereo() {
        let format = OutputFormat::default();
        assert_eq!(format.sample_rate(), 44_100);
        assert_eq!(format.mode(), OutputMode::StereoInterleaved);
    }

    #[test]
    fn test_pan_is_constant_power() {
        for pan in [-0.5, -0.25, 0.0, 0.3, 0.5] {
            let (left, right) = pan_gains(pan);
            assert!((left * left + right * right - 1.0).abs() < 1e-6);
        }
        let (left, right) = pan_gains(-0.5);
        assert_eq!((left, right), (1.0, 0.0));
    }

    #[test]
    fn test_db_to_gain() {
        assert_eq!(db_to_gain(0.0), 1.0);
        assert!((db_to_gain(-20.0) - 0.1).abs() < 1e-6);
    }
}
