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

use super::output::OutputFormat;

/// A control-plane operation on a synthesizer. Everything that changes engine state outside of
/// rendering can be expressed as an event, so it can be queued and applied at the start of a
/// render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SynthEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    SetPreset { channel: u8, bank: u16, preset: u16 },
    ProgramChange { channel: u8, program: u8 },
    PitchBend { channel: u8, value: u16 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    AllNotesOff,
    ConfigureOutput(OutputFormat),
}
