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

//! The synthesis engine.
//!
//! This module provides:
//! - Per-channel MIDI state (presets, controllers, pitch bend, sustain)
//! - A fixed pool of voices with envelope, LFO and filter processing
//! - Block rendering into mono or interleaved stereo floats

mod channel;
mod envelope;
mod error;
mod event;
mod filter;
mod lfo;
pub mod midi;
mod output;
mod synthesizer;
mod voice;

pub use channel::{ChannelState, MAX_PITCH_BEND, NEUTRAL_PITCH_BEND};
pub use error::{InitError, MidiError, RenderError};
pub use event::SynthEvent;
pub use output::{db_to_gain, OutputFormat, OutputMode, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
pub use synthesizer::{Synthesizer, MAX_MIDI_CHANNELS};
pub use voice::{VoiceInfo, VoiceState};
