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

//! Per-channel MIDI state.

use crate::bank::PERCUSSION_BANK;

/// Center position of the 14-bit pitch wheel.
pub const NEUTRAL_PITCH_BEND: u16 = 8192;

/// Highest 14-bit pitch wheel value.
pub const MAX_PITCH_BEND: u16 = 16383;

mod cc {
    pub const BANK_SELECT_MSB: u8 = 0;
    pub const MODULATION: u8 = 1;
    pub const DATA_ENTRY_MSB: u8 = 6;
    pub const VOLUME: u8 = 7;
    pub const PAN: u8 = 10;
    pub const EXPRESSION: u8 = 11;
    pub const BANK_SELECT_LSB: u8 = 32;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const SUSTAIN: u8 = 64;
    pub const NRPN_LSB: u8 = 98;
    pub const NRPN_MSB: u8 = 99;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const RESET_CONTROLLERS: u8 = 121;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// RPN 0 sets the pitch bend range.
const RPN_PITCH_BEND_RANGE: u16 = 0;

/// The (N)RPN currently addressed by data entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parameter {
    None,
    Registered(u16),
    NonRegistered(u16),
}

/// What the synthesizer has to do to its voices after a controller change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControllerEffect {
    None,
    /// The sustain pedal lifted, held voices must release.
    SustainReleased,
    AllSoundOff,
    AllNotesOff,
}

/// The state of one MIDI channel.
#[derive(Debug, Clone)]
pub struct ChannelState {
    bank: u16,
    preset: u16,
    preset_index: usize,
    percussion: bool,
    bank_msb: u8,
    bank_lsb: Option<u8>,
    pitch_wheel: u16,
    pitch_bend_range: f32,
    default_bend_range: f32,
    volume: f32,
    expression: f32,
    pan: f32,
    sustain: bool,
    controllers: [u8; 128],
    parameter: Parameter,
}

impl ChannelState {
    pub(crate) fn new(pitch_bend_range: f32, percussion: bool) -> Self {
        let mut controllers = [0u8; 128];
        controllers[cc::VOLUME as usize] = 127;
        controllers[cc::PAN as usize] = 64;
        controllers[cc::EXPRESSION as usize] = 127;
        ChannelState {
            bank: if percussion { PERCUSSION_BANK } else { 0 },
            preset: 0,
            preset_index: 0,
            percussion,
            bank_msb: 0,
            bank_lsb: None,
            pitch_wheel: NEUTRAL_PITCH_BEND,
            pitch_bend_range,
            default_bend_range: pitch_bend_range,
            volume: 1.0,
            expression: 1.0,
            pan: 0.0,
            sustain: false,
            controllers,
            parameter: Parameter::None,
        }
    }

    /// The selected bank number.
    pub fn bank(&self) -> u16 {
        self.bank
    }

    /// The selected preset number.
    pub fn preset(&self) -> u16 {
        self.preset
    }

    /// Index of the resolved preset in the instrument bank.
    pub fn preset_index(&self) -> usize {
        self.preset_index
    }

    /// Whether program changes on this channel select percussion kits.
    pub fn is_percussion(&self) -> bool {
        self.percussion
    }

    pub fn pitch_wheel(&self) -> u16 {
        self.pitch_wheel
    }

    /// Pitch bend range in semitones.
    pub fn pitch_bend_range(&self) -> f32 {
        self.pitch_bend_range
    }

    /// Current pitch bend in semitones.
    pub fn bend_semitones(&self) -> f32 {
        (self.pitch_wheel as f32 - NEUTRAL_PITCH_BEND as f32) / NEUTRAL_PITCH_BEND as f32
            * self.pitch_bend_range
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn expression(&self) -> f32 {
        self.expression
    }

    /// Pan offset from -0.5 (left) to 0.5 (right).
    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    /// Last value received for a controller.
    pub fn controller(&self, controller: u8) -> u8 {
        self.controllers[(controller & 0x7f) as usize]
    }

    /// The bank a program change selects: the pending bank select, or the percussion bank.
    pub(crate) fn program_bank(&self) -> u16 {
        if self.percussion {
            return PERCUSSION_BANK;
        }
        match self.bank_lsb {
            Some(lsb) => (self.bank_msb as u16) << 7 | lsb as u16,
            None => self.bank_msb as u16,
        }
    }

    pub(crate) fn select_preset(&mut self, bank: u16, preset: u16, index: usize) {
        self.bank = bank;
        self.preset = preset;
        self.preset_index = index;
    }

    pub(crate) fn set_pitch_wheel(&mut self, value: u16) {
        self.pitch_wheel = value.min(MAX_PITCH_BEND);
    }

    pub(crate) fn apply_controller(&mut self, controller: u8, value: u8) -> ControllerEffect {
        let controller = controller & 0x7f;
        let value = value & 0x7f;
        self.controllers[controller as usize] = value;

        match controller {
            cc::BANK_SELECT_MSB => {
                self.bank_msb = value;
                self.bank_lsb = None;
            }
            cc::BANK_SELECT_LSB => self.bank_lsb = Some(value),
            cc::VOLUME => self.volume = value as f32 / 127.0,
            cc::EXPRESSION => self.expression = value as f32 / 127.0,
            cc::PAN => self.pan = pan_from_controller(value),
            cc::SUSTAIN => {
                let was_down = self.sustain;
                self.sustain = value >= 64;
                if was_down && !self.sustain {
                    return ControllerEffect::SustainReleased;
                }
            }
            cc::RPN_MSB | cc::RPN_LSB => {
                self.parameter =
                    Parameter::Registered(self.parameter_number(cc::RPN_MSB, cc::RPN_LSB));
            }
            cc::NRPN_MSB | cc::NRPN_LSB => {
                self.parameter =
                    Parameter::NonRegistered(self.parameter_number(cc::NRPN_MSB, cc::NRPN_LSB));
            }
            cc::DATA_ENTRY_MSB | cc::DATA_ENTRY_LSB => self.data_entry(),
            cc::ALL_SOUND_OFF => return ControllerEffect::AllSoundOff,
            cc::RESET_CONTROLLERS => {
                let was_down = self.sustain;
                self.reset_controllers();
                if was_down {
                    return ControllerEffect::SustainReleased;
                }
            }
            cc::ALL_NOTES_OFF => return ControllerEffect::AllNotesOff,
            _ => {}
        }
        ControllerEffect::None
    }

    /// Resets performance controllers. Volume, pan, bank select and the program are kept.
    fn reset_controllers(&mut self) {
        self.pitch_wheel = NEUTRAL_PITCH_BEND;
        self.expression = 1.0;
        self.sustain = false;
        self.parameter = Parameter::None;
        self.controllers[cc::MODULATION as usize] = 0;
        self.controllers[cc::EXPRESSION as usize] = 127;
        self.controllers[cc::SUSTAIN as usize] = 0;
        self.controllers[cc::RPN_MSB as usize] = 127;
        self.controllers[cc::RPN_LSB as usize] = 127;
        self.controllers[cc::NRPN_MSB as usize] = 127;
        self.controllers[cc::NRPN_LSB as usize] = 127;
    }

    fn parameter_number(&self, msb: u8, lsb: u8) -> u16 {
        (self.controllers[msb as usize] as u16) << 7 | self.controllers[lsb as usize] as u16
    }

    fn data_entry(&mut self) {
        // 127/127 is the null parameter.
        if self.parameter == Parameter::Registered(RPN_PITCH_BEND_RANGE) {
            let semitones = self.controllers[cc::DATA_ENTRY_MSB as usize] as f32;
            let cents = self.controllers[cc::DATA_ENTRY_LSB as usize] as f32;
            self.pitch_bend_range = semitones + cents / 100.0;
        }
    }

    /// Restores the state the channel had at engine creation.
    pub(crate) fn reset(&mut self) {
        *self = ChannelState::new(self.default_bend_range, self.percussion);
    }
}

fn pan_from_controller(value: u8) -> f32 {
    ((value as f32 - 64.0) / 128.0).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let channel = ChannelState::new(2.0, false);
        assert_eq!(channel.bank(), 0);
        assert_eq!(channel.pitch_wheel(), NEUTRAL_PITCH_BEND);
        assert_eq!(channel.bend_semitones(), 0.0);
        assert_eq!(channel.volume(), 1.0);
        assert_eq!(channel.pan(), 0.0);
        assert_eq!(channel.controller(7), 127);

        let drums = ChannelState::new(2.0, true);
        assert_eq!(drums.bank(), PERCUSSION_BANK);
        assert_eq!(drums.program_bank(), PERCUSSION_BANK);
    }

    #[test]
    fn test_pitch_bend_range_rpn() {
        let mut channel = ChannelState::new(2.0, false);
        channel.set_pitch_wheel(MAX_PITCH_BEND);
        assert!((channel.bend_semitones() - 2.0).abs() < 0.001);

        channel.apply_controller(101, 0);
        channel.apply_controller(100, 0);
        channel.apply_controller(6, 12);
        assert_eq!(channel.pitch_bend_range(), 12.0);
        assert!((channel.bend_semitones() - 12.0).abs() < 0.01);

        // Data entry for an NRPN does not touch the bend range.
        channel.apply_controller(99, 0);
        channel.apply_controller(98, 0);
        channel.apply_controller(6, 3);
        assert_eq!(channel.pitch_bend_range(), 12.0);
    }

    #[test]
    fn test_volume_pan_expression() {
        let mut channel = ChannelState::new(2.0, false);
        channel.apply_controller(7, 0);
        channel.apply_controller(11, 127);
        channel.apply_controller(10, 0);
        assert_eq!(channel.volume(), 0.0);
        assert_eq!(channel.expression(), 1.0);
        assert_eq!(channel.pan(), -0.5);

        channel.apply_controller(10, 127);
        assert!(channel.pan() > 0.49);
    }

    #[test]
    fn test_sustain_effects() {
        let mut channel = ChannelState::new(2.0, false);
        assert_eq!(channel.apply_controller(64, 127), ControllerEffect::None);
        assert!(channel.sustain());
        assert_eq!(
            channel.apply_controller(64, 0),
            ControllerEffect::SustainReleased
        );
        // Lifting a pedal that is already up does nothing.
        assert_eq!(channel.apply_controller(64, 0), ControllerEffect::None);
    }

    #[test]
    fn test_reset_controllers() {
        let mut channel = ChannelState::new(2.0, false);
        channel.apply_controller(7, 50);
        channel.apply_controller(11, 20);
        channel.apply_controller(64, 127);
        channel.set_pitch_wheel(0);

        assert_eq!(
            channel.apply_controller(121, 0),
            ControllerEffect::SustainReleased
        );
        assert_eq!(channel.pitch_wheel(), NEUTRAL_PITCH_BEND);
        assert_eq!(channel.expression(), 1.0);
        assert!(!channel.sustain());
        // Volume survives a controller reset.
        assert_eq!(channel.controller(7), 50);
    }

    #[test]
    fn test_bank_select() {
        let mut channel = ChannelState::new(2.0, false);
        channel.apply_controller(0, 1);
        assert_eq!(channel.program_bank(), 1);
        channel.apply_controller(32, 2);
        assert_eq!(channel.program_bank(), 130);
        channel.apply_controller(0, 0);
        assert_eq!(channel.program_bank(), 0);
    }

    #[test]
    fn test_channel_mode_messages() {
        let mut channel = ChannelState::new(2.0, false);
        assert_eq!(
            channel.apply_controller(120, 0),
            ControllerEffect::AllSoundOff
        );
        assert_eq!(
            channel.apply_controller(123, 0),
            ControllerEffect::AllNotesOff
        );
    }
}
