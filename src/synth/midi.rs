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

//! Translation of raw MIDI channel messages into synthesizer events.

use midly::live::LiveEvent;
use midly::MidiMessage;

use super::error::MidiError;
use super::event::SynthEvent;

/// Parses one raw MIDI message. System and aftertouch messages parse to `None`.
pub fn parse(bytes: &[u8]) -> Result<Option<SynthEvent>, MidiError> {
    let LiveEvent::Midi { channel, message } = LiveEvent::parse(bytes)? else {
        return Ok(None);
    };
    let channel = channel.as_int();

    let event = match message {
        // A velocity of 0 is a note-off, which the synthesizer handles on note-on.
        MidiMessage::NoteOn { key, vel } => SynthEvent::NoteOn {
            channel,
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::NoteOff { key, .. } => SynthEvent::NoteOff {
            channel,
            note: key.as_int(),
        },
        MidiMessage::Controller { controller, value } => SynthEvent::ControlChange {
            channel,
            controller: controller.as_int(),
            value: value.as_int(),
        },
        MidiMessage::ProgramChange { program } => SynthEvent::ProgramChange {
            channel,
            program: program.as_int(),
        },
        MidiMessage::PitchBend { bend } => SynthEvent::PitchBend {
            channel,
            value: bend.0.as_int(),
        },
        MidiMessage::Aftertouch { .. } | MidiMessage::ChannelAftertouch { .. } => {
            return Ok(None)
        }
    };
    Ok(Some(event))
}
