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

//! Generator accumulation for preset and instrument zones.

use super::hydra::Generator;

/// SoundFont 2.04 generator operators.
pub(crate) mod op {
    pub const START_ADDRS_OFFSET: u16 = 0;
    pub const END_ADDRS_OFFSET: u16 = 1;
    pub const STARTLOOP_ADDRS_OFFSET: u16 = 2;
    pub const ENDLOOP_ADDRS_OFFSET: u16 = 3;
    pub const START_ADDRS_COARSE_OFFSET: u16 = 4;
    pub const MOD_LFO_TO_PITCH: u16 = 5;
    pub const VIB_LFO_TO_PITCH: u16 = 6;
    pub const MOD_ENV_TO_PITCH: u16 = 7;
    pub const INITIAL_FILTER_FC: u16 = 8;
    pub const INITIAL_FILTER_Q: u16 = 9;
    pub const MOD_LFO_TO_FILTER_FC: u16 = 10;
    pub const MOD_ENV_TO_FILTER_FC: u16 = 11;
    pub const END_ADDRS_COARSE_OFFSET: u16 = 12;
    pub const MOD_LFO_TO_VOLUME: u16 = 13;
    pub const PAN: u16 = 17;
    pub const DELAY_MOD_LFO: u16 = 21;
    pub const FREQ_MOD_LFO: u16 = 22;
    pub const DELAY_VIB_LFO: u16 = 23;
    pub const FREQ_VIB_LFO: u16 = 24;
    pub const DELAY_MOD_ENV: u16 = 25;
    pub const ATTACK_MOD_ENV: u16 = 26;
    pub const HOLD_MOD_ENV: u16 = 27;
    pub const DECAY_MOD_ENV: u16 = 28;
    pub const SUSTAIN_MOD_ENV: u16 = 29;
    pub const RELEASE_MOD_ENV: u16 = 30;
    pub const KEYNUM_TO_MOD_ENV_HOLD: u16 = 31;
    pub const KEYNUM_TO_MOD_ENV_DECAY: u16 = 32;
    pub const DELAY_VOL_ENV: u16 = 33;
    pub const ATTACK_VOL_ENV: u16 = 34;
    pub const HOLD_VOL_ENV: u16 = 35;
    pub const DECAY_VOL_ENV: u16 = 36;
    pub const SUSTAIN_VOL_ENV: u16 = 37;
    pub const RELEASE_VOL_ENV: u16 = 38;
    pub const KEYNUM_TO_VOL_ENV_HOLD: u16 = 39;
    pub const KEYNUM_TO_VOL_ENV_DECAY: u16 = 40;
    pub const INSTRUMENT: u16 = 41;
    pub const KEY_RANGE: u16 = 43;
    pub const VEL_RANGE: u16 = 44;
    pub const STARTLOOP_ADDRS_COARSE_OFFSET: u16 = 45;
    pub const KEYNUM: u16 = 46;
    pub const VELOCITY: u16 = 47;
    pub const INITIAL_ATTENUATION: u16 = 48;
    pub const ENDLOOP_ADDRS_COARSE_OFFSET: u16 = 50;
    pub const COARSE_TUNE: u16 = 51;
    pub const FINE_TUNE: u16 = 52;
    pub const SAMPLE_ID: u16 = 53;
    pub const SAMPLE_MODES: u16 = 54;
    pub const SCALE_TUNING: u16 = 56;
    pub const EXCLUSIVE_CLASS: u16 = 57;
    pub const OVERRIDING_ROOT_KEY: u16 = 58;

    /// One past the highest defined operator.
    pub const COUNT: usize = 61;
}

/// Which level of the bank a zone belongs to. Preset-level generators are relative offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ZoneLevel {
    Preset,
    Instrument,
}

/// Generator values for a zone, plus its key and velocity ranges.
#[derive(Debug, Clone)]
pub(super) struct GeneratorSet {
    values: [i32; op::COUNT],
    key_range: (u8, u8),
    vel_range: (u8, u8),
}

impl GeneratorSet {
    /// Instrument zones start from the SoundFont default values.
    pub fn instrument_defaults() -> Self {
        let mut values = [0i32; op::COUNT];
        values[op::INITIAL_FILTER_FC as usize] = 13500;
        for timecents in [
            op::DELAY_MOD_LFO,
            op::DELAY_VIB_LFO,
            op::DELAY_MOD_ENV,
            op::ATTACK_MOD_ENV,
            op::HOLD_MOD_ENV,
            op::DECAY_MOD_ENV,
            op::RELEASE_MOD_ENV,
            op::DELAY_VOL_ENV,
            op::ATTACK_VOL_ENV,
            op::HOLD_VOL_ENV,
            op::DECAY_VOL_ENV,
            op::RELEASE_VOL_ENV,
        ] {
            values[timecents as usize] = -12000;
        }
        values[op::KEYNUM as usize] = -1;
        values[op::VELOCITY as usize] = -1;
        values[op::SCALE_TUNING as usize] = 100;
        values[op::OVERRIDING_ROOT_KEY as usize] = -1;

        GeneratorSet {
            values,
            key_range: (0, 127),
            vel_range: (0, 127),
        }
    }

    /// Preset zones start at zero offsets with full ranges.
    pub fn preset_offsets() -> Self {
        GeneratorSet {
            values: [0; op::COUNT],
            key_range: (0, 127),
            vel_range: (0, 127),
        }
    }

    /// Applies a generator from a zone, replacing any earlier value.
    pub fn apply(&mut self, generator: &Generator, level: ZoneLevel) {
        let operator = generator.operator;
        if operator as usize >= op::COUNT {
            return;
        }
        if level == ZoneLevel::Preset && !allowed_at_preset_level(operator) {
            return;
        }

        match operator {
            op::KEY_RANGE => self.key_range = split_range(generator.amount),
            op::VEL_RANGE => self.vel_range = split_range(generator.amount),
            op::INSTRUMENT | op::SAMPLE_ID | op::SAMPLE_MODES => {
                self.values[operator as usize] = generator.amount as i32
            }
            _ => self.values[operator as usize] = generator.amount as i16 as i32,
        }
    }

    /// Adds preset-level offsets to this instrument-level set and intersects the ranges.
    pub fn add_preset(&mut self, preset: &GeneratorSet) {
        for operator in 0..op::COUNT as u16 {
            if is_additive(operator) {
                self.values[operator as usize] += preset.values[operator as usize];
            }
        }
        self.key_range = intersect(self.key_range, preset.key_range);
        self.vel_range = intersect(self.vel_range, preset.vel_range);
    }

    /// Returns the value of the given operator.
    pub fn get(&self, operator: u16) -> i32 {
        self.values.get(operator as usize).copied().unwrap_or(0)
    }

    pub fn key_range(&self) -> (u8, u8) {
        self.key_range
    }

    pub fn vel_range(&self) -> (u8, u8) {
        self.vel_range
    }

    /// Returns true if both ranges still cover at least one value.
    pub fn has_valid_ranges(&self) -> bool {
        self.key_range.0 <= self.key_range.1 && self.vel_range.0 <= self.vel_range.1
    }
}

/// Range amounts pack the low value in the first byte and the high value in the second.
fn split_range(amount: u16) -> (u8, u8) {
    let low = (amount & 0xff) as u8;
    let high = (amount >> 8) as u8;
    (low.min(127), high.min(127))
}

fn intersect(a: (u8, u8), b: (u8, u8)) -> (u8, u8) {
    (a.0.max(b.0), a.1.min(b.1))
}

/// Sample addressing, sample modes and the other per-sample generators are only
/// meaningful inside instruments.
fn allowed_at_preset_level(operator: u16) -> bool {
    !matches!(
        operator,
        op::START_ADDRS_OFFSET
            | op::END_ADDRS_OFFSET
            | op::STARTLOOP_ADDRS_OFFSET
            | op::ENDLOOP_ADDRS_OFFSET
            | op::START_ADDRS_COARSE_OFFSET
            | op::END_ADDRS_COARSE_OFFSET
            | op::STARTLOOP_ADDRS_COARSE_OFFSET
            | op::ENDLOOP_ADDRS_COARSE_OFFSET
            | op::KEYNUM
            | op::VELOCITY
            | op::SAMPLE_ID
            | op::SAMPLE_MODES
            | op::EXCLUSIVE_CLASS
            | op::OVERRIDING_ROOT_KEY
    )
}

fn is_additive(operator: u16) -> bool {
    allowed_at_preset_level(operator)
        && !matches!(operator, op::INSTRUMENT | op::KEY_RANGE | op::VEL_RANGE)
        // Unused and reserved operators.
        && !matches!(operator, 14 | 18 | 19 | 20 | 42 | 49 | 55 | 59 | 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(operator: u16, amount: i16) -> Generator {
        Generator {
            operator,
            amount: amount as u16,
        }
    }

    #[test]
    fn test_instrument_values_replace() {
        let mut set = GeneratorSet::instrument_defaults();
        assert_eq!(set.get(op::INITIAL_FILTER_FC), 13500);
        assert_eq!(set.get(op::RELEASE_VOL_ENV), -12000);

        set.apply(&generator(op::RELEASE_VOL_ENV, -2000), ZoneLevel::Instrument);
        set.apply(&generator(op::RELEASE_VOL_ENV, -1000), ZoneLevel::Instrument);
        assert_eq!(set.get(op::RELEASE_VOL_ENV), -1000);
    }

    #[test]
    fn test_preset_values_add() {
        let mut instrument = GeneratorSet::instrument_defaults();
        instrument.apply(&generator(op::COARSE_TUNE, 2), ZoneLevel::Instrument);
        instrument.apply(
            &Generator {
                operator: op::KEY_RANGE,
                amount: u16::from_le_bytes([36, 96]),
            },
            ZoneLevel::Instrument,
        );

        let mut preset = GeneratorSet::preset_offsets();
        preset.apply(&generator(op::COARSE_TUNE, -5), ZoneLevel::Preset);
        preset.apply(
            &Generator {
                operator: op::KEY_RANGE,
                amount: u16::from_le_bytes([60, 127]),
            },
            ZoneLevel::Preset,
        );
        // Not allowed at preset level, must be ignored.
        preset.apply(&generator(op::OVERRIDING_ROOT_KEY, 10), ZoneLevel::Preset);

        instrument.add_preset(&preset);
        assert_eq!(instrument.get(op::COARSE_TUNE), -3);
        assert_eq!(instrument.get(op::OVERRIDING_ROOT_KEY), -1);
        assert_eq!(instrument.key_range(), (60, 96));
        assert!(instrument.has_valid_ranges());
    }

    #[test]
    fn test_disjoint_ranges() {
        let mut instrument = GeneratorSet::instrument_defaults();
        instrument.apply(
            &Generator {
                operator: op::VEL_RANGE,
                amount: u16::from_le_bytes([0, 40]),
            },
            ZoneLevel::Instrument,
        );
        let mut preset = GeneratorSet::preset_offsets();
        preset.apply(
            &Generator {
                operator: op::VEL_RANGE,
                amount: u16::from_le_bytes([64, 127]),
            },
            ZoneLevel::Preset,
        );

        instrument.add_preset(&preset);
        assert!(!instrument.has_valid_ranges());
    }
}
