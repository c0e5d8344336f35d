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

mod soundfont;

use std::sync::Arc;

use crate::bank::generators::op;
use crate::bank::InstrumentBank;

pub use soundfont::{
    decaying_sample, sine_sample, SoundFontBuilder, TestInstrument, TestPreset, TestZone,
};

/// Bank number of the canned drum kit.
pub const DRUM_BANK: u16 = 128;
pub const KICK: u8 = 36;
pub const CLOSED_HAT: u8 = 42;
pub const OPEN_HAT: u8 = 46;

/// Release of the canned piano, roughly 0.3 seconds.
pub const PIANO_RELEASE_TIMECENTS: i16 = -2084;

/// Builds the canned test bank:
///
/// - "Test Piano" (0:0): a looped 441 Hz sine rooted at A4 covering keys 21-108.
/// - "Test Pad" (0:1): the same sine with a slow attack, a filter and vibrato.
/// - "Test Kit" (128:0): a 100 ms one-shot on the kick and both hi-hats. The hi-hats share an
///   exclusive class.
pub fn test_bank_bytes() -> Vec<u8> {
    SoundFontBuilder::new("Test Bank")
        .sample(sine_sample("sine", 441.0, 44_100, 69))
        .sample(decaying_sample("click", 200.0, 4_410, 60))
        .instrument(
            TestInstrument::new("Piano")
                .global(vec![(op::RELEASE_VOL_ENV, PIANO_RELEASE_TIMECENTS)])
                .zone(TestZone::new(0).keys(21, 108).looped()),
        )
        .instrument(
            TestInstrument::new("Pad").zone(
                TestZone::new(0)
                    .looped()
                    .generator(op::ATTACK_VOL_ENV, -3986)
                    .generator(op::RELEASE_VOL_ENV, 0)
                    .generator(op::INITIAL_FILTER_FC, 9000)
                    .generator(op::INITIAL_FILTER_Q, 30)
                    .generator(op::VIB_LFO_TO_PITCH, 20),
            ),
        )
        .instrument(
            TestInstrument::new("Kit")
                .zone(TestZone::new(1).keys(KICK, KICK))
                .zone(
                    TestZone::new(1)
                        .keys(CLOSED_HAT, CLOSED_HAT)
                        .generator(op::EXCLUSIVE_CLASS, 1),
                )
                .zone(
                    TestZone::new(1)
                        .keys(OPEN_HAT, OPEN_HAT)
                        .generator(op::EXCLUSIVE_CLASS, 1),
                ),
        )
        .preset(TestPreset::new("Test Piano", 0, 0, 0))
        .preset(TestPreset::new("Test Pad", 0, 1, 1))
        .preset(TestPreset::new("Test Kit", DRUM_BANK, 0, 2))
        .build()
}

pub fn test_bank() -> Arc<InstrumentBank> {
    Arc::new(InstrumentBank::from_bytes(&test_bank_bytes()).expect("test bank should parse"))
}

/// Audio test utilities for validating rendered output
pub mod audio_test_utils {
    /// Calculate RMS (Root Mean Square) of a signal
    pub fn calculate_rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
        (sum_squares / samples.len() as f32).sqrt()
    }

    /// Largest absolute sample value.
    pub fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |peak, x| peak.max(x.abs()))
    }
}
