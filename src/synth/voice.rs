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

//! Voices and the fixed-size voice pool.
//!
//! Handles voice allocation, stealing, and note-off behavior.

use std::cmp::Ordering;

use super::channel::ChannelState;
use super::envelope::{Envelope, Shape, Stage};
use super::filter::LowPass;
use super::lfo::Lfo;
use super::output::{db_to_gain, pan_gains};
use crate::bank::{absolute_cents_to_hz, LoopMode, Region};

/// Modulators (envelopes, LFOs, filter cutoff) are updated once per block of this many frames.
pub(crate) const MOD_BLOCK: usize = 64;

/// Lifecycle of a voice slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// The slot is unused.
    #[default]
    Free,
    /// The key is down, or held by the sustain pedal.
    Playing,
    /// The envelope is in its release stage.
    Releasing,
    /// Silent and waiting to be reclaimed.
    Finished,
}

/// Per-channel inputs shared by every voice rendered in a block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MixContext<'a> {
    pub samples: &'a [f32],
    pub channel: &'a ChannelState,
    /// Global output gain.
    pub gain: f32,
    pub output_rate: f32,
    /// Interleaved output channels, 1 or 2.
    pub channels: usize,
}

/// What a new voice plays.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NoteStart {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub preset: usize,
    pub region: usize,
}

/// A snapshot of a sounding voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceInfo {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub state: VoiceState,
    /// Held by the sustain pedal after its note-off.
    pub held: bool,
    /// Current envelope amplitude including velocity and attenuation.
    pub amplitude: f32,
    pub preset: usize,
    pub region: usize,
}

/// One sample-playback unit bound to a note and a bank region.
#[derive(Debug, Clone, Default)]
pub(crate) struct Voice {
    state: VoiceState,
    held: bool,
    channel: u8,
    note: u8,
    velocity: u8,
    preset: usize,
    region: usize,
    exclusive_class: u16,
    /// Allocation order, used to pick the oldest voice when stealing.
    stamp: u64,
    /// Has rendered at least one block.
    sounded: bool,

    /// Playback position in frames of the sample pool.
    position: f64,
    /// Pitch relative to the sample's recorded pitch, before bend and modulation.
    pitch_cents: f32,
    /// Velocity and attenuation gain.
    note_gain: f32,
    filtered: bool,

    volume_env: Envelope,
    mod_env: Envelope,
    mod_lfo: Lfo,
    vib_lfo: Lfo,
    filter: LowPass,
}

impl Voice {
    fn start(&mut self, note: NoteStart, stamp: u64, region: &Region, output_rate: f32) {
        let key_offset = note.note as f32 - region.root_key as f32;

        *self = Voice {
            state: VoiceState::Playing,
            held: false,
            channel: note.channel,
            note: note.note,
            velocity: note.velocity,
            preset: note.preset,
            region: note.region,
            exclusive_class: region.exclusive_class,
            stamp,
            sounded: false,
            position: region.sample_start as f64,
            pitch_cents: key_offset * region.pitch_keytrack as f32
                + region.transpose as f32 * 100.0
                + region.tune as f32,
            note_gain: note.velocity as f32 / 127.0 * db_to_gain(-region.attenuation),
            filtered: region.uses_filter(),
            volume_env: Envelope::new(
                &region.volume_envelope,
                note.note,
                Shape::Exponential,
                output_rate,
            ),
            mod_env: Envelope::new(
                &region.modulation_envelope,
                note.note,
                Shape::Linear,
                output_rate,
            ),
            mod_lfo: Lfo::new(&region.modulation_lfo, output_rate),
            vib_lfo: Lfo::new(&region.vibrato_lfo, output_rate),
            filter: LowPass::default(),
        };
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, VoiceState::Playing | VoiceState::Releasing)
    }

    pub fn is_releasing(&self) -> bool {
        self.state == VoiceState::Releasing
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn preset(&self) -> usize {
        self.preset
    }

    pub fn region(&self) -> usize {
        self.region
    }

    pub fn exclusive_class(&self) -> u16 {
        self.exclusive_class
    }

    /// Current output amplitude of the voice, ignoring channel gains.
    pub fn amplitude(&self) -> f32 {
        self.volume_env.level() * self.note_gain
    }

    /// Level used to rank steal candidates. A voice still fading in counts at the level it is
    /// heading for.
    fn steal_level(&self) -> f32 {
        match self.volume_env.stage() {
            Stage::Delay | Stage::Attack => self.note_gain,
            _ => self.amplitude(),
        }
    }

    /// Moves envelope and LFO timings to a new output rate so they keep their length in seconds.
    pub fn set_output_rate(&mut self, output_rate: f32) {
        self.volume_env.set_sample_rate(output_rate);
        self.mod_env.set_sample_rate(output_rate);
        self.mod_lfo.set_sample_rate(output_rate);
        self.vib_lfo.set_sample_rate(output_rate);
    }

    pub fn info(&self) -> VoiceInfo {
        VoiceInfo {
            channel: self.channel,
            note: self.note,
            velocity: self.velocity,
            state: self.state,
            held: self.held,
            amplitude: self.amplitude(),
            preset: self.preset,
            region: self.region,
        }
    }

    /// Keeps the voice sounding after its note-off until the sustain pedal lifts.
    pub fn hold(&mut self) {
        if self.state == VoiceState::Playing {
            self.held = true;
        }
    }

    /// Enters the natural release of the region.
    pub fn release(&mut self) {
        if self.state != VoiceState::Playing {
            return;
        }
        self.state = VoiceState::Releasing;
        self.held = false;
        self.volume_env.release();
        self.mod_env.release();
    }

    /// Fades out over a few milliseconds.
    pub fn quick_release(&mut self) {
        if !self.is_active() {
            return;
        }
        self.state = VoiceState::Releasing;
        self.held = false;
        self.volume_env.quick_release();
        self.mod_env.release();
    }

    /// Mixes the voice into an interleaved block of `out.len() / channels` frames.
    pub fn render(&mut self, region: &Region, ctx: &MixContext, out: &mut [f32]) {
        let MixContext {
            samples,
            channel,
            gain,
            output_rate,
            channels,
        } = *ctx;
        let frames = out.len() / channels;
        if frames > 0 {
            self.sounded = true;
        }
        let ratio = region.sample_rate as f64 / output_rate as f64;
        let base_gain = self.note_gain * channel.volume() * channel.expression() * gain;
        let (left, right) = pan_gains(region.pan + channel.pan());
        let bend_cents = channel.bend_semitones() * 100.0;

        let mut frame = 0;
        while frame < frames && self.is_active() {
            let block = (frames - frame).min(MOD_BLOCK);

            let mod_env = self.mod_env.level();
            let mod_lfo = self.mod_lfo.value();
            let vib_lfo = self.vib_lfo.value();

            let cents = self.pitch_cents
                + bend_cents
                + mod_env * region.mod_env_to_pitch as f32
                + mod_lfo * region.mod_lfo_to_pitch as f32
                + vib_lfo * region.vib_lfo_to_pitch as f32;
            let step = 2f64.powf(cents as f64 / 1200.0) * ratio;

            if self.filtered {
                let cutoff = region.filter_cutoff as f32
                    + mod_env * region.mod_env_to_filter as f32
                    + mod_lfo * region.mod_lfo_to_filter as f32;
                self.filter.set(
                    absolute_cents_to_hz(cutoff.round() as i32),
                    region.filter_q,
                    output_rate,
                );
            }

            let block_gain = if region.mod_lfo_to_volume != 0.0 {
                base_gain * db_to_gain(mod_lfo * region.mod_lfo_to_volume)
            } else {
                base_gain
            };

            for i in frame..frame + block {
                let level = self.volume_env.next_level();
                let Some(mut value) = self.next_sample(region, samples, step) else {
                    self.state = VoiceState::Finished;
                    break;
                };
                if self.filtered {
                    value = self.filter.process(value);
                }
                value *= level * block_gain;

                if channels == 1 {
                    out[i] += value;
                } else {
                    out[i * 2] += value * left;
                    out[i * 2 + 1] += value * right;
                }

                if self.volume_env.is_done() {
                    self.state = VoiceState::Finished;
                    break;
                }
            }

            self.mod_env.advance(block);
            self.mod_lfo.advance(block);
            self.vib_lfo.advance(block);
            frame += block;
        }
    }

    /// Reads the interpolated sample at the current position and advances. Returns `None` once
    /// a non-looping voice runs off the end of its sample.
    #[inline]
    fn next_sample(&mut self, region: &Region, pool: &[f32], step: f64) -> Option<f32> {
        let looping = match region.loop_mode {
            LoopMode::Continuous => true,
            LoopMode::UntilRelease => self.state == VoiceState::Playing,
            LoopMode::None => false,
        };

        if looping && self.position >= region.loop_end as f64 {
            let loop_start = region.loop_start as f64;
            let loop_len = (region.loop_end - region.loop_start) as f64;
            self.position = loop_start + (self.position - loop_start) % loop_len;
        }

        let index = self.position as usize;
        let end = region.sample_end as usize;
        if index >= end {
            return None;
        }

        let next = if looping && index + 1 >= region.loop_end as usize {
            region.loop_start as usize
        } else {
            index + 1
        };
        let a = pool.get(index).copied().unwrap_or(0.0);
        let b = if next < end {
            pool.get(next).copied().unwrap_or(0.0)
        } else {
            0.0
        };

        let frac = (self.position - index as f64) as f32;
        self.position += step;
        Some(a + (b - a) * frac)
    }
}

/// A fixed set of voice slots. Never grows after construction.
#[derive(Debug)]
pub(crate) struct VoicePool {
    voices: Vec<Voice>,
    /// Slots that are not free.
    active: usize,
    next_stamp: u64,
    stolen: u64,
}

impl VoicePool {
    pub fn new(capacity: usize) -> Self {
        VoicePool {
            voices: vec![Voice::default(); capacity],
            active: 0,
            next_stamp: 0,
            stolen: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Number of voices stolen since the pool was created.
    pub fn stolen_count(&self) -> u64 {
        self.stolen
    }

    /// Starts a voice in a free slot, stealing one if the pool is full. Returns the slot used.
    pub fn start(&mut self, note: NoteStart, region: &Region, output_rate: f32) -> Option<usize> {
        let index = self.allocate()?;
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.voices[index].start(note, stamp, region, output_rate);
        Some(index)
    }

    fn allocate(&mut self) -> Option<usize> {
        if let Some(index) = self.voices.iter().position(|v| v.state == VoiceState::Free) {
            self.active += 1;
            return Some(index);
        }
        if let Some(index) = self
            .voices
            .iter()
            .position(|v| v.state == VoiceState::Finished)
        {
            return Some(index);
        }

        let index = self.steal_candidate()?;
        self.stolen += 1;
        Some(index)
    }

    /// Releasing voices first, then voices that have been heard, then the quietest, then the
    /// oldest. Voices started since the last render are taken last so that a chord arriving on
    /// a full pool replaces older notes instead of its own.
    fn steal_candidate(&self) -> Option<usize> {
        self.voices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| steal_order(a, b))
            .map(|(index, _)| index)
    }

    #[cfg(test)]
    pub fn get(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    pub fn active(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter().filter(|v| v.is_active())
    }

    pub fn active_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut().filter(|v| v.is_active())
    }

    /// Frees every active voice matching `predicate` immediately.
    pub fn free_where(&mut self, predicate: impl Fn(&Voice) -> bool) {
        for voice in self.voices.iter_mut() {
            if voice.state != VoiceState::Free && predicate(voice) {
                voice.state = VoiceState::Free;
                voice.held = false;
                self.active -= 1;
            }
        }
    }

    /// Returns finished voices to the pool.
    pub fn reclaim_finished(&mut self) {
        for voice in self.voices.iter_mut() {
            if voice.state == VoiceState::Finished {
                voice.state = VoiceState::Free;
                self.active -= 1;
            }
        }
    }

    /// Gives mutable access to all slots for rendering.
    pub fn slots_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }
}

fn steal_order(a: &Voice, b: &Voice) -> Ordering {
    b.is_releasing()
        .cmp(&a.is_releasing())
        .then(b.sounded.cmp(&a.sounded))
        .then(a.steal_level().total_cmp(&b.steal_level()))
        .then(a.stamp.cmp(&b.stamp))
}
