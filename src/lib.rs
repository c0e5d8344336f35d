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

//! A SoundFont 2 wavetable synthesizer.
//!
//! Banks are parsed once into an immutable [`bank::InstrumentBank`] and shared between
//! engines. A [`synth::Synthesizer`] turns MIDI-style events into PCM blocks, an
//! [`engine::Engine`] lets several threads drive one synthesizer, and a
//! [`registry::Registry`] hands engines out behind integer handles.

pub mod bank;
pub mod config;
pub mod engine;
pub mod registry;
pub mod synth;

#[cfg(test)]
mod testutil;
