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

//! Typed errors for engine construction, rendering and raw MIDI input.

/// The configuration cannot build an engine.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("max_voices must be at least 1")]
    NoVoices,
    #[error("midi_channels must be between 1 and 256, got {0}")]
    InvalidChannelCount(usize),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("output buffer holds {actual} samples, {required} are needed")]
    BufferTooSmall { required: usize, actual: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("malformed MIDI message: {0}")]
    Malformed(#[from] midly::Error),
}
