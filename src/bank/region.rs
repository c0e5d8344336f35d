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

//! Playable regions: merged zone generators converted to physical units.

use super::generators::{op, GeneratorSet};
use super::hydra::SampleHeader;

/// Root key used for samples that declare themselves unpitched.
const UNPITCHED_ROOT_KEY: u8 = 60;

/// How a region's sample loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Play the sample once.
    None,
    /// Loop for the whole life of the voice.
    Continuous,
    /// Loop while the key is held, then play through to the end of the sample.
    UntilRelease,
}

/// An envelope definition. Times are in seconds, sustain is a linear level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeParams {
    pub delay: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    /// Timecents per key below 60 added to the hold time.
    pub keynum_to_hold: f32,
    /// Timecents per key below 60 added to the decay time.
    pub keynum_to_decay: f32,
}

impl EnvelopeParams {
    /// Hold time in seconds for the given key.
    pub fn hold_for_key(&self, key: u8) -> f32 {
        self.hold * key_scale(self.keynum_to_hold, key)
    }

    /// Decay time in seconds for the given key.
    pub fn decay_for_key(&self, key: u8) -> f32 {
        self.decay * key_scale(self.keynum_to_decay, key)
    }
}

fn key_scale(timecents_per_key: f32, key: u8) -> f32 {
    if timecents_per_key == 0.0 {
        return 1.0;
    }
    2f32.powf(timecents_per_key * (60.0 - key as f32) / 1200.0)
}

/// A low frequency oscillator definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LfoParams {
    /// Seconds before the oscillator starts moving.
    pub delay: f32,
    /// Frequency in Hz.
    pub frequency: f32,
}

/// A region maps a key/velocity range of a preset to a sample and its playback parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub key_range: (u8, u8),
    pub vel_range: (u8, u8),

    /// Frame offsets into the bank sample pool. `loop_end` and `sample_end` are exclusive.
    pub sample_start: u32,
    pub sample_end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub loop_mode: LoopMode,
    pub sample_rate: u32,

    pub root_key: u8,
    /// Coarse transposition in semitones.
    pub transpose: i32,
    /// Fine tuning in cents, including the sample's pitch correction.
    pub tune: i32,
    /// Cents of pitch change per key (100 is normal keyboard tracking).
    pub pitch_keytrack: i32,

    /// Attenuation in dB.
    pub attenuation: f32,
    /// Pan position from -0.5 (left) to 0.5 (right).
    pub pan: f32,
    /// Low-pass cutoff in absolute cents.
    pub filter_cutoff: i32,
    /// Low-pass resonance in dB.
    pub filter_q: f32,

    pub volume_envelope: EnvelopeParams,
    pub modulation_envelope: EnvelopeParams,
    pub modulation_lfo: LfoParams,
    pub vibrato_lfo: LfoParams,

    /// Modulation routing depths in cents, except `mod_lfo_to_volume` which is in dB.
    pub mod_env_to_pitch: i32,
    pub mod_env_to_filter: i32,
    pub mod_lfo_to_pitch: i32,
    pub mod_lfo_to_filter: i32,
    pub mod_lfo_to_volume: f32,
    pub vib_lfo_to_pitch: i32,

    /// Voices sharing a non-zero class on a channel cut each other off.
    pub exclusive_class: u16,
}

impl Region {
    /// Returns true if this region plays for the given key and velocity.
    pub fn matches(&self, key: u8, velocity: u8) -> bool {
        key >= self.key_range.0
            && key <= self.key_range.1
            && velocity >= self.vel_range.0
            && velocity <= self.vel_range.1
    }

    /// Returns true if the low-pass filter changes the signal for this region.
    pub fn uses_filter(&self) -> bool {
        self.filter_cutoff < 13500
            || self.filter_q > 0.0
            || self.mod_env_to_filter != 0
            || self.mod_lfo_to_filter != 0
    }

    /// Builds a region from merged generators. Returns `None` if the sample range is empty
    /// once offsets are applied and clamped to the sample pool.
    pub(super) fn from_generators(
        generators: &GeneratorSet,
        sample: &SampleHeader,
        pool_len: usize,
    ) -> Option<Region> {
        let g = |operator| generators.get(operator);
        let pool_len = pool_len as i64;
        let clamp_to_pool = |value: i64| value.clamp(0, pool_len) as u32;

        let sample_start = clamp_to_pool(
            sample.start as i64
                + g(op::START_ADDRS_OFFSET) as i64
                + g(op::START_ADDRS_COARSE_OFFSET) as i64 * 32768,
        );
        let sample_end = clamp_to_pool(
            sample.end as i64
                + g(op::END_ADDRS_OFFSET) as i64
                + g(op::END_ADDRS_COARSE_OFFSET) as i64 * 32768,
        );
        if sample_end <= sample_start {
            return None;
        }

        let loop_start = (sample.loop_start as i64
            + g(op::STARTLOOP_ADDRS_OFFSET) as i64
            + g(op::STARTLOOP_ADDRS_COARSE_OFFSET) as i64 * 32768)
            .clamp(sample_start as i64, sample_end as i64) as u32;
        let loop_end = (sample.loop_end as i64
            + g(op::ENDLOOP_ADDRS_OFFSET) as i64
            + g(op::ENDLOOP_ADDRS_COARSE_OFFSET) as i64 * 32768)
            .clamp(sample_start as i64, sample_end as i64) as u32;

        let loop_mode = match g(op::SAMPLE_MODES) & 3 {
            _ if loop_end <= loop_start => LoopMode::None,
            1 => LoopMode::Continuous,
            3 => LoopMode::UntilRelease,
            _ => LoopMode::None,
        };

        let root_key = match g(op::OVERRIDING_ROOT_KEY) {
            key @ 0..=127 => key as u8,
            _ if sample.original_pitch <= 127 => sample.original_pitch,
            _ => UNPITCHED_ROOT_KEY,
        };

        Some(Region {
            key_range: generators.key_range(),
            vel_range: generators.vel_range(),
            sample_start,
            sample_end,
            loop_start,
            loop_end,
            loop_mode,
            sample_rate: sample.sample_rate,
            root_key,
            transpose: g(op::COARSE_TUNE).clamp(-120, 120),
            tune: g(op::FINE_TUNE).clamp(-99, 99) + sample.pitch_correction as i32,
            pitch_keytrack: g(op::SCALE_TUNING).clamp(0, 1200),
            attenuation: g(op::INITIAL_ATTENUATION).clamp(0, 1440) as f32 / 10.0,
            pan: g(op::PAN).clamp(-500, 500) as f32 / 1000.0,
            filter_cutoff: g(op::INITIAL_FILTER_FC).clamp(1500, 13500),
            filter_q: g(op::INITIAL_FILTER_Q).clamp(0, 960) as f32 / 10.0,
            volume_envelope: EnvelopeParams {
                delay: delay_secs(g(op::DELAY_VOL_ENV)),
                attack: timecents_to_secs(g(op::ATTACK_VOL_ENV).clamp(-12000, 8000)),
                hold: timecents_to_secs(g(op::HOLD_VOL_ENV).clamp(-12000, 5000)),
                decay: timecents_to_secs(g(op::DECAY_VOL_ENV).clamp(-12000, 8000)),
                sustain: centibels_to_gain(g(op::SUSTAIN_VOL_ENV).clamp(0, 1440) as f32),
                release: timecents_to_secs(g(op::RELEASE_VOL_ENV).clamp(-12000, 8000)),
                keynum_to_hold: g(op::KEYNUM_TO_VOL_ENV_HOLD).clamp(-1200, 1200) as f32,
                keynum_to_decay: g(op::KEYNUM_TO_VOL_ENV_DECAY).clamp(-1200, 1200) as f32,
            },
            modulation_envelope: EnvelopeParams {
                delay: delay_secs(g(op::DELAY_MOD_ENV)),
                attack: timecents_to_secs(g(op::ATTACK_MOD_ENV).clamp(-12000, 8000)),
                hold: timecents_to_secs(g(op::HOLD_MOD_ENV).clamp(-12000, 5000)),
                decay: timecents_to_secs(g(op::DECAY_MOD_ENV).clamp(-12000, 8000)),
                sustain: 1.0 - g(op::SUSTAIN_MOD_ENV).clamp(0, 1000) as f32 / 1000.0,
                release: timecents_to_secs(g(op::RELEASE_MOD_ENV).clamp(-12000, 8000)),
                keynum_to_hold: g(op::KEYNUM_TO_MOD_ENV_HOLD).clamp(-1200, 1200) as f32,
                keynum_to_decay: g(op::KEYNUM_TO_MOD_ENV_DECAY).clamp(-1200, 1200) as f32,
            },
            modulation_lfo: LfoParams {
                delay: delay_secs(g(op::DELAY_MOD_LFO)),
                frequency: absolute_cents_to_hz(g(op::FREQ_MOD_LFO).clamp(-16000, 4500)),
            },
            vibrato_lfo: LfoParams {
                delay: delay_secs(g(op::DELAY_VIB_LFO)),
                frequency: absolute_cents_to_hz(g(op::FREQ_VIB_LFO).clamp(-16000, 4500)),
            },
            mod_env_to_pitch: g(op::MOD_ENV_TO_PITCH).clamp(-12000, 12000),
            mod_env_to_filter: g(op::MOD_ENV_TO_FILTER_FC).clamp(-12000, 12000),
            mod_lfo_to_pitch: g(op::MOD_LFO_TO_PITCH).clamp(-12000, 12000),
            mod_lfo_to_filter: g(op::MOD_LFO_TO_FILTER_FC).clamp(-12000, 12000),
            mod_lfo_to_volume: g(op::MOD_LFO_TO_VOLUME).clamp(-960, 960) as f32 / 10.0,
            vib_lfo_to_pitch: g(op::VIB_LFO_TO_PITCH).clamp(-12000, 12000),
            exclusive_class: g(op::EXCLUSIVE_CLASS).clamp(0, 127) as u16,
        })
    }
}

/// Converts timecents to seconds.
pub fn timecents_to_secs(timecents: i32) -> f32 {
    2f32.powf(timecents as f32 / 1200.0)
}

/// Delays at the -12000 timecent floor mean "no delay".
fn delay_secs(timecents: i32) -> f32 {
    if timecents <= -12000 {
        0.0
    } else {
        timecents_to_secs(timecents.min(5000))
    }
}

/// Converts absolute cents (8.176 Hz at 0) to Hz.
pub fn absolute_cents_to_hz(cents: i32) -> f32 {
    8.176 * 2f32.powf(cents as f32 / 1200.0)
}

/// Converts an attenuation in centibels to a linear gain.
pub fn centibels_to_gain(centibels: f32) -> f32 {
    10f32.powf(-centibels / 200.0)
}
