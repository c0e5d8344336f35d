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

//! The single-threaded synthesizer: event processing and block rendering.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::channel::{ChannelState, ControllerEffect};
use super::error::{InitError, MidiError, RenderError};
use super::event::SynthEvent;
use super::midi;
use super::output::{db_to_gain, OutputFormat};
use super::voice::{MixContext, NoteStart, VoiceInfo, VoicePool, VoiceState};
use crate::bank::InstrumentBank;
use crate::config;

/// Highest number of MIDI channels an engine can have, one per `u8` channel index.
pub const MAX_MIDI_CHANNELS: usize = u8::MAX as usize + 1;

/// A wavetable synthesizer playing one instrument bank.
pub struct Synthesizer {
    bank: Arc<InstrumentBank>,
    channels: Vec<ChannelState>,
    pool: VoicePool,
    format: OutputFormat,
    /// Global output gain.
    gain: f32,
}

impl Synthesizer {
    /// Creates a synthesizer with every channel at its default preset and no sounding voices.
    pub fn new(bank: Arc<InstrumentBank>, config: &config::Synth) -> Result<Self, InitError> {
        if config.max_voices() == 0 {
            return Err(InitError::NoVoices);
        }
        let midi_channels = config.midi_channels();
        if midi_channels == 0 || midi_channels > MAX_MIDI_CHANNELS {
            return Err(InitError::InvalidChannelCount(midi_channels));
        }

        let channels = (0..midi_channels)
            .map(|index| {
                ChannelState::new(
                    config.pitch_bend_range(),
                    config.drum_channel() == Some(index as u8),
                )
            })
            .collect();

        let mut synth = Synthesizer {
            bank,
            channels,
            pool: VoicePool::new(config.max_voices()),
            format: OutputFormat::new(config.sample_rate(), config.channels()),
            gain: db_to_gain(config.gain_db()),
        };
        synth.select_default_presets();

        info!(
            bank = synth.bank.name(),
            max_voices = synth.pool.capacity(),
            midi_channels,
            format = %synth.format,
            "Synthesizer created"
        );
        Ok(synth)
    }

    fn select_default_presets(&mut self) {
        for channel in 0..self.channels.len() {
            let bank = self.channels[channel].bank();
            self.select_preset(channel as u8, bank, 0);
        }
    }

    /// Gets the instrument bank.
    pub fn bank(&self) -> &Arc<InstrumentBank> {
        &self.bank
    }

    /// Gets the current output format.
    pub fn output_format(&self) -> OutputFormat {
        self.format
    }

    /// Changes the output format of subsequent renders.
    pub fn configure_output(&mut self, sample_rate: u32, channels: u16) {
        let format = OutputFormat::new(sample_rate, channels);
        debug!(%format, "Output configured");
        self.set_output_format(format);
    }

    /// Sounding voices keep their envelope and LFO timings in seconds across a rate change.
    fn set_output_format(&mut self, format: OutputFormat) {
        if format.sample_rate() != self.format.sample_rate() {
            let output_rate = format.sample_rate() as f32;
            for voice in self.pool.active_mut() {
                voice.set_output_rate(output_rate);
            }
        }
        self.format = format;
    }

    /// Maximum polyphony.
    pub fn max_voices(&self) -> usize {
        self.pool.capacity()
    }

    /// Number of sounding voices.
    pub fn active_voice_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Gets the state of a channel.
    pub fn channel(&self, channel: u8) -> Option<&ChannelState> {
        self.channels.get(channel as usize)
    }

    /// The (bank, preset) the channel resolved to.
    pub fn channel_preset(&self, channel: u8) -> Option<(u16, u16)> {
        self.channel(channel)
            .map(|state| (state.bank(), state.preset()))
    }

    /// Snapshots of every sounding voice.
    pub fn voices(&self) -> impl Iterator<Item = VoiceInfo> + '_ {
        self.pool.active().map(|voice| voice.info())
    }

    /// Starts voices for every region of the channel's preset that matches the note. A velocity
    /// of 0 is a note-off.
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        let stolen = self.pool.stolen_count();
        let started = self.start_note(channel, note, velocity);

        if started == Some(0) {
            debug!(
                channel,
                note,
                preset = ?self.channel_preset(channel),
                "No region plays this note"
            );
        }
        let stolen = self.pool.stolen_count() - stolen;
        if stolen > 0 {
            debug!(
                channel,
                note,
                stolen,
                max_voices = self.pool.capacity(),
                "Voice limit reached, stealing"
            );
        }
    }

    /// Does the work of `note_on` without logging. Returns the number of voices started, or
    /// `None` if the event was not a playable note-on.
    fn start_note(&mut self, channel: u8, note: u8, velocity: u8) -> Option<usize> {
        if velocity == 0 {
            self.note_off(channel, note);
            return None;
        }
        let state = self.channels.get(channel as usize)?;
        let note = note.min(127);
        let velocity = velocity.min(127);
        let preset_index = state.preset_index();
        let preset = self.bank.preset(preset_index)?;

        // Re-triggering a note lets the previous voices ring out in their release.
        for voice in self.pool.active_mut() {
            if voice.channel() == channel && voice.note() == note {
                voice.release();
            }
        }

        for region in preset.regions().iter().filter(|r| r.matches(note, velocity)) {
            if region.exclusive_class == 0 {
                continue;
            }
            for voice in self.pool.active_mut() {
                if voice.channel() == channel && voice.exclusive_class() == region.exclusive_class
                {
                    voice.quick_release();
                }
            }
        }

        let output_rate = self.format.sample_rate() as f32;
        let mut started = 0;
        for region_index in preset.matching_regions(note, velocity) {
            let start = NoteStart {
                channel,
                note,
                velocity,
                preset: preset_index,
                region: region_index,
            };
            if self
                .pool
                .start(start, &preset.regions()[region_index], output_rate)
                .is_some()
            {
                started += 1;
            }
        }
        Some(started)
    }

    /// Releases the voices of a note. With the sustain pedal down they are held instead.
    pub fn note_off(&mut self, channel: u8, note: u8) {
        let Some(state) = self.channels.get(channel as usize) else {
            return;
        };
        let sustain = state.sustain();

        for voice in self.pool.active_mut() {
            if voice.channel() != channel
                || voice.note() != note
                || voice.state() != VoiceState::Playing
            {
                continue;
            }
            if sustain {
                voice.hold();
            } else {
                voice.release();
            }
        }
    }

    /// Selects a preset for a channel. Unknown presets fall back to bank 0 preset 0, then to
    /// the first preset of the bank.
    pub fn set_preset(&mut self, channel: u8, bank: u16, preset: u16) {
        if self.select_preset(channel, bank, preset) {
            debug!(
                channel,
                bank,
                preset,
                fallback = ?self.channel_preset(channel),
                "Preset not found, using fallback"
            );
        }
    }

    /// Selects a preset without logging. Returns true if the request fell back to another
    /// preset.
    fn select_preset(&mut self, channel: u8, bank: u16, preset: u16) -> bool {
        let Some(state) = self.channels.get_mut(channel as usize) else {
            return false;
        };
        let index = self.bank.resolve_preset(bank, preset);
        let Some(resolved) = self.bank.preset(index) else {
            return false;
        };
        state.select_preset(resolved.bank(), resolved.number(), index);
        resolved.bank() != bank || resolved.number() != preset
    }

    /// Selects a program in the bank chosen by bank select, or the percussion bank.
    pub fn program_change(&mut self, channel: u8, program: u8) {
        if let Some(bank) = self.program_bank(channel) {
            self.set_preset(channel, bank, program.min(127) as u16);
        }
    }

    fn program_bank(&self, channel: u8) -> Option<u16> {
        self.channel(channel).map(|state| state.program_bank())
    }

    /// Sets the 14-bit pitch wheel. Sounding voices follow from the next block.
    pub fn pitch_bend(&mut self, channel: u8, value: u16) {
        if let Some(state) = self.channels.get_mut(channel as usize) {
            state.set_pitch_wheel(value);
        }
    }

    /// Applies a controller change.
    pub fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        let Some(state) = self.channels.get_mut(channel as usize) else {
            return;
        };

        match state.apply_controller(controller, value) {
            ControllerEffect::None => {}
            ControllerEffect::SustainReleased => {
                for voice in self.pool.active_mut() {
                    if voice.channel() == channel && voice.is_held() {
                        voice.release();
                    }
                }
            }
            ControllerEffect::AllSoundOff => {
                self.pool.free_where(|voice| voice.channel() == channel);
            }
            ControllerEffect::AllNotesOff => {
                for voice in self.pool.active_mut() {
                    if voice.channel() == channel {
                        voice.release();
                    }
                }
            }
        }
    }

    /// Releases every sounding voice, including voices held by the sustain pedal.
    pub fn all_notes_off(&mut self) {
        for voice in self.pool.active_mut() {
            voice.release();
        }
    }

    /// Silences every voice immediately.
    pub fn all_sound_off(&mut self) {
        self.pool.free_where(|_| true);
    }

    /// Silences everything and returns every channel to its initial state.
    pub fn reset(&mut self) {
        self.all_sound_off();
        for channel in self.channels.iter_mut() {
            channel.reset();
        }
        self.select_default_presets();
    }

    /// Applies a queued control-plane event. Nothing on this path logs, so it is safe to call
    /// from a render thread.
    pub fn apply(&mut self, event: SynthEvent) {
        match event {
            SynthEvent::NoteOn {
                channel,
                note,
                velocity,
            } => {
                self.start_note(channel, note, velocity);
            }
            SynthEvent::NoteOff { channel, note } => self.note_off(channel, note),
            SynthEvent::SetPreset {
                channel,
                bank,
                preset,
            } => {
                self.select_preset(channel, bank, preset);
            }
            SynthEvent::ProgramChange { channel, program } => {
                if let Some(bank) = self.program_bank(channel) {
                    self.select_preset(channel, bank, program.min(127) as u16);
                }
            }
            SynthEvent::PitchBend { channel, value } => self.pitch_bend(channel, value),
            SynthEvent::ControlChange {
                channel,
                controller,
                value,
            } => self.control_change(channel, controller, value),
            SynthEvent::AllNotesOff => self.all_notes_off(),
            SynthEvent::ConfigureOutput(format) => self.set_output_format(format),
        }
    }

    /// Parses and applies a raw MIDI channel message.
    pub fn process_midi(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        if let Some(event) = midi::parse(bytes)? {
            self.apply(event);
        }
        Ok(())
    }

    /// Renders `frames` frames into `out` in the current output format and returns the number
    /// of frames written. The buffer is left untouched if it is too small.
    pub fn render(&mut self, out: &mut [f32], frames: usize) -> Result<usize, RenderError> {
        if frames == 0 {
            return Ok(0);
        }
        let channels = self.format.channels();
        let required = frames.saturating_mul(channels);
        if out.len() < required {
            return Err(RenderError::BufferTooSmall {
                required,
                actual: out.len(),
            });
        }

        let out = &mut out[..required];
        out.fill(0.0);

        let samples = self.bank.samples();
        let output_rate = self.format.sample_rate() as f32;
        for voice in self.pool.slots_mut() {
            if !voice.is_active() {
                continue;
            }
            let Some(region) = self
                .bank
                .preset(voice.preset())
                .and_then(|preset| preset.regions().get(voice.region()))
            else {
                continue;
            };
            let Some(channel) = self.channels.get(voice.channel() as usize) else {
                continue;
            };

            let ctx = MixContext {
                samples,
                channel,
                gain: self.gain,
                output_rate,
                channels,
            };
            voice.render(region, &ctx, out);
        }

        self.pool.reclaim_finished();
        Ok(frames)
    }
}

impl fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synthesizer")
            .field("bank", &self.bank.name())
            .field("format", &self.format)
            .field("active_voices", &self.pool.active_count())
            .field("max_voices", &self.pool.capacity())
            .finish()
    }
}
