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

//! Handle-based access to engines for hosts that can only pass integers around.
//!
//! Every operation takes primitive arguments and clamps them silently. Operations on a
//! handle that is closed or was never issued do nothing and return zero values.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::bank::InstrumentBank;
use crate::config;
use crate::engine::Engine;
use crate::synth::MAX_PITCH_BEND;

const MAX_CHANNEL: i32 = 15;
const MAX_DATA: i32 = 127;

/// Identifies an engine in a registry. A closed slot bumps its generation, so old handles
/// to it stop resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Packs the handle into a single integer. Zero is never a valid handle.
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_raw(raw: u64) -> Handle {
        Handle {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    engine: Option<Arc<Engine>>,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

pub struct Registry {
    arena: RwLock<Arena>,
    config: config::Synth,
}

impl Registry {
    /// Creates an empty registry. Every engine it creates uses the given configuration.
    pub fn new(config: config::Synth) -> Registry {
        Registry {
            arena: RwLock::new(Arena::default()),
            config,
        }
    }

    /// Loads a SoundFont from disk and creates an engine for it.
    pub fn load(&self, path: &Path) -> Option<Handle> {
        match InstrumentBank::from_file(path) {
            Ok(bank) => self.insert_bank(Arc::new(bank)),
            Err(e) => {
                warn!(path = ?path, err = %e, "Unable to load sound bank");
                None
            }
        }
    }

    /// Loads a SoundFont from the first `size` bytes of `bytes`.
    pub fn load_from_memory(&self, bytes: &[u8], size: i64) -> Option<Handle> {
        let len = match usize::try_from(size) {
            Ok(len) if len > 0 && len <= bytes.len() => len,
            _ => {
                warn!(size, available = bytes.len(), "Invalid sound bank size");
                return None;
            }
        };

        match InstrumentBank::from_bytes(&bytes[..len]) {
            Ok(bank) => self.insert_bank(Arc::new(bank)),
            Err(e) => {
                warn!(err = %e, "Unable to load sound bank from memory");
                None
            }
        }
    }

    /// Creates another engine for an already loaded bank. The bank is shared, not copied.
    pub fn insert_bank(&self, bank: Arc<InstrumentBank>) -> Option<Handle> {
        let engine = match Engine::new(bank, &self.config) {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                warn!(err = %e, "Unable to create engine");
                return None;
            }
        };

        let mut arena = self.arena.write();
        let handle = match arena.free.pop() {
            Some(index) => {
                let slot = &mut arena.slots[index as usize];
                slot.engine = Some(engine);
                Handle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = arena.slots.len() as u32;
                arena.slots.push(Slot {
                    generation: 1,
                    engine: Some(engine),
                });
                Handle {
                    index,
                    generation: 1,
                }
            }
        };
        info!(%handle, engines = arena.slots.len() - arena.free.len(), "Engine created");
        Some(handle)
    }

    /// Closes an engine. Closing a stale handle does nothing.
    pub fn close(&self, handle: Handle) {
        let mut arena = self.arena.write();
        let Some(slot) = arena.slots.get_mut(handle.index as usize) else {
            return;
        };
        if slot.generation != handle.generation || slot.engine.is_none() {
            debug!(%handle, "Ignoring close of a stale handle");
            return;
        }

        slot.engine = None;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        arena.free.push(handle.index);
        debug!(%handle, "Engine closed");
    }

    /// Resolves a handle. The engine stays alive while the returned reference is held, even
    /// if the handle is closed meanwhile.
    pub fn get(&self, handle: Handle) -> Option<Arc<Engine>> {
        let arena = self.arena.read();
        arena
            .slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.engine.clone())
    }

    /// Number of open engines.
    pub fn len(&self) -> usize {
        let arena = self.arena.read();
        arena.slots.len() - arena.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn configure_output(&self, handle: Handle, sample_rate: i32, channels: i32) {
        if let Some(engine) = self.get(handle) {
            engine.configure_output(
                sample_rate.max(0) as u32,
                channels.clamp(0, i32::from(u16::MAX)) as u16,
            );
        }
    }

    pub fn note_on(&self, handle: Handle, channel: i32, note: i32, velocity: i32) {
        if let Some(engine) = self.get(handle) {
            engine.note_on(clamp_channel(channel), clamp_data(note), clamp_data(velocity));
        }
    }

    pub fn note_off(&self, handle: Handle, channel: i32, note: i32) {
        if let Some(engine) = self.get(handle) {
            engine.note_off(clamp_channel(channel), clamp_data(note));
        }
    }

    pub fn set_preset(&self, handle: Handle, channel: i32, bank: i32, preset: i32) {
        if let Some(engine) = self.get(handle) {
            engine.set_preset(
                clamp_channel(channel),
                bank.clamp(0, i32::from(u16::MAX)) as u16,
                preset.clamp(0, MAX_DATA) as u16,
            );
        }
    }

    pub fn program_change(&self, handle: Handle, channel: i32, program: i32) {
        if let Some(engine) = self.get(handle) {
            engine.program_change(clamp_channel(channel), clamp_data(program));
        }
    }

    pub fn pitch_bend(&self, handle: Handle, channel: i32, value: i32) {
        if let Some(engine) = self.get(handle) {
            engine.pitch_bend(
                clamp_channel(channel),
                value.clamp(0, i32::from(MAX_PITCH_BEND)) as u16,
            );
        }
    }

    pub fn control_change(&self, handle: Handle, channel: i32, controller: i32, value: i32) {
        if let Some(engine) = self.get(handle) {
            engine.control_change(
                clamp_channel(channel),
                clamp_data(controller),
                clamp_data(value),
            );
        }
    }

    /// Renders `frame_count` frames and returns how many were written. A negative count, a
    /// short buffer or an invalid handle write nothing and return 0.
    pub fn render(&self, handle: Handle, out: &mut [f32], frame_count: i32) -> i32 {
        let Ok(frames) = usize::try_from(frame_count) else {
            return 0;
        };
        let Some(engine) = self.get(handle) else {
            return 0;
        };
        match engine.render(out, frames) {
            Ok(written) => written as i32,
            Err(_) => 0,
        }
    }

    pub fn all_notes_off(&self, handle: Handle) {
        if let Some(engine) = self.get(handle) {
            engine.all_notes_off();
        }
    }

    pub fn active_voice_count(&self, handle: Handle) -> i32 {
        self.get(handle)
            .map(|engine| engine.active_voice_count() as i32)
            .unwrap_or(0)
    }

    /// The (bank, preset) the channel resolved to.
    pub fn channel_preset(&self, handle: Handle, channel: i32) -> Option<(i32, i32)> {
        self.get(handle)?
            .channel_preset(clamp_channel(channel))
            .map(|(bank, preset)| (i32::from(bank), i32::from(preset)))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new(config::Synth::default())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("engines", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

fn clamp_channel(channel: i32) -> u8 {
    channel.clamp(0, MAX_CHANNEL) as u8
}

fn clamp_data(value: i32) -> u8 {
    value.clamp(0, MAX_DATA) as u8
}
