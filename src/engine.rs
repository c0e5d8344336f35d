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

//! A synthesizer that can be driven from several threads.
//!
//! Control calls queue events without taking the synthesizer lock. The render thread applies
//! them at the start of its next block without logging, so any logging about an event happens
//! here on the calling thread before it is queued.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bank::InstrumentBank;
use crate::config;
use crate::synth::{
    midi, InitError, MidiError, OutputFormat, RenderError, SynthEvent, Synthesizer, VoiceInfo,
};

/// Events applied per lock when a control call finds the queue full.
const FULL_QUEUE_DRAIN: usize = 16;

pub struct Engine {
    bank: Arc<InstrumentBank>,
    synth: Mutex<Synthesizer>,
    /// Control-plane events waiting for the next render or query.
    events_tx: Sender<SynthEvent>,
    events_rx: Receiver<SynthEvent>,
    capacity: usize,
}

impl Engine {
    /// Creates an engine for the given bank.
    pub fn new(bank: Arc<InstrumentBank>, config: &config::Synth) -> Result<Engine, InitError> {
        let synth = Synthesizer::new(bank.clone(), config)?;
        let capacity = config.event_queue_capacity();
        let (events_tx, events_rx) = crossbeam_channel::bounded(capacity);

        Ok(Engine {
            bank,
            synth: Mutex::new(synth),
            events_tx,
            events_rx,
            capacity,
        })
    }

    /// Queues an event. If the queue is full, the oldest pending events are applied a few at a
    /// time under the lock until this one fits behind them, so ordering is preserved and a
    /// render never waits on more than a few events.
    pub fn send(&self, mut event: SynthEvent) {
        let mut warned = false;
        loop {
            match self.events_tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    if !warned {
                        warn!(
                            capacity = self.capacity,
                            "Event queue full, applying events directly"
                        );
                        warned = true;
                    }
                    event = returned;
                    let mut synth = self.synth.lock();
                    self.drain_at_most(&mut synth, FULL_QUEUE_DRAIN);
                }
                // The receiver lives as long as the engine.
                Err(TrySendError::Disconnected(event)) => {
                    self.synth.lock().apply(event);
                    return;
                }
            }
        }
    }

    pub fn note_on(&self, channel: u8, note: u8, velocity: u8) {
        self.send(SynthEvent::NoteOn {
            channel,
            note,
            velocity,
        });
    }

    pub fn note_off(&self, channel: u8, note: u8) {
        self.send(SynthEvent::NoteOff { channel, note });
    }

    pub fn set_preset(&self, channel: u8, bank: u16, preset: u16) {
        if self.bank.find_preset(bank, preset).is_none() {
            if let Some(fallback) = self.bank.preset(self.bank.resolve_preset(bank, preset)) {
                debug!(
                    channel,
                    bank,
                    preset,
                    %fallback,
                    "Preset not found, using fallback"
                );
            }
        }
        self.send(SynthEvent::SetPreset {
            channel,
            bank,
            preset,
        });
    }

    pub fn program_change(&self, channel: u8, program: u8) {
        self.send(SynthEvent::ProgramChange { channel, program });
    }

    pub fn pitch_bend(&self, channel: u8, value: u16) {
        self.send(SynthEvent::PitchBend { channel, value });
    }

    pub fn control_change(&self, channel: u8, controller: u8, value: u8) {
        self.send(SynthEvent::ControlChange {
            channel,
            controller,
            value,
        });
    }

    pub fn all_notes_off(&self) {
        self.send(SynthEvent::AllNotesOff);
    }

    /// Changes the output format starting with the next render.
    pub fn configure_output(&self, sample_rate: u32, channels: u16) {
        let format = OutputFormat::new(sample_rate, channels);
        debug!(%format, "Output configured");
        self.send(SynthEvent::ConfigureOutput(format));
    }

    /// Parses one raw MIDI message and queues it. System messages are ignored.
    pub fn process_midi(&self, bytes: &[u8]) -> Result<(), MidiError> {
        if let Some(event) = midi::parse(bytes)? {
            self.send(event);
        }
        Ok(())
    }

    /// Applies pending events and renders `frames` frames into `out`.
    pub fn render(&self, out: &mut [f32], frames: usize) -> Result<usize, RenderError> {
        let mut synth = self.synth.lock();
        self.drain(&mut synth);
        synth.render(out, frames)
    }

    pub fn active_voice_count(&self) -> usize {
        let mut synth = self.synth.lock();
        self.drain(&mut synth);
        synth.active_voice_count()
    }

    pub fn channel_preset(&self, channel: u8) -> Option<(u16, u16)> {
        let mut synth = self.synth.lock();
        self.drain(&mut synth);
        synth.channel_preset(channel)
    }

    pub fn output_format(&self) -> OutputFormat {
        let mut synth = self.synth.lock();
        self.drain(&mut synth);
        synth.output_format()
    }

    pub fn max_voices(&self) -> usize {
        self.synth.lock().max_voices()
    }

    /// Snapshot of the active voices.
    pub fn voices(&self) -> Vec<VoiceInfo> {
        let mut synth = self.synth.lock();
        self.drain(&mut synth);
        synth.voices().collect()
    }

    pub fn bank(&self) -> Arc<InstrumentBank> {
        self.bank.clone()
    }

    /// Applies at most one queue's worth of events so that a busy producer can't hold up
    /// a render.
    fn drain(&self, synth: &mut Synthesizer) {
        self.drain_at_most(synth, self.capacity);
    }

    fn drain_at_most(&self, synth: &mut Synthesizer, limit: usize) {
        for _ in 0..limit {
            match self.events_rx.try_recv() {
                Ok(event) => synth.apply(event),
                Err(_) => break,
            }
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("pending_events", &self.events_rx.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
