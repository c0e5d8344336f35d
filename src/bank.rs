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

//! SoundFont 2 instrument banks.
//!
//! This module provides:
//! - RIFF/SF2 parsing from a file or an in-memory buffer
//! - Preset and instrument zone merging into flat, playable regions
//! - An immutable sample pool shared by every voice

mod error;
pub(crate) mod generators;
mod hydra;
mod region;
mod riff;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use self::generators::{op, GeneratorSet, ZoneLevel};
use self::hydra::Hydra;
use self::riff::Chunk;

pub use error::LoadError;
pub use region::{
    absolute_cents_to_hz, centibels_to_gain, timecents_to_secs, EnvelopeParams, LfoParams,
    LoopMode, Region,
};

/// Bank number General MIDI players use for percussion kits.
pub const PERCUSSION_BANK: u16 = 128;

/// A named instrument selectable by (bank, preset number).
#[derive(Debug, Clone)]
pub struct Preset {
    name: String,
    bank: u16,
    number: u16,
    regions: Vec<Region>,
}

impl Preset {
    /// Gets the preset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the bank number.
    pub fn bank(&self) -> u16 {
        self.bank
    }

    /// Gets the preset (program) number.
    pub fn number(&self) -> u16 {
        self.number
    }

    /// Gets the playable regions of the preset.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Iterates over the indices of the regions that play for the given key and velocity.
    pub fn matching_regions(&self, key: u8, velocity: u8) -> impl Iterator<Item = usize> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter(move |(_, region)| region.matches(key, velocity))
            .map(|(index, _)| index)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}:{:03} {} (regions={})",
            self.bank,
            self.number,
            self.name,
            self.regions.len()
        )
    }
}

/// An immutable, parsed instrument bank. Shared between engines with `Arc`.
pub struct InstrumentBank {
    name: String,
    presets: Vec<Preset>,
    lookup: HashMap<(u16, u16), usize>,
    samples: Vec<f32>,
}

impl InstrumentBank {
    /// Loads a bank from a SoundFont file on disk.
    pub fn from_file(path: &Path) -> Result<InstrumentBank, LoadError> {
        info!(path = ?path, "Loading sound bank");
        let bytes = std::fs::read(path)?;
        InstrumentBank::from_bytes(&bytes)
    }

    /// Parses a bank from an in-memory SoundFont image.
    pub fn from_bytes(bytes: &[u8]) -> Result<InstrumentBank, LoadError> {
        if bytes.is_empty() {
            return Err(LoadError::Empty);
        }

        let root = Chunk::riff(bytes)?;
        match root.form_type() {
            Some(form) if &form == b"sfbk" => {}
            Some(form) => {
                return Err(LoadError::NotSoundFont(
                    String::from_utf8_lossy(&form).into_owned(),
                ))
            }
            None => return Err(LoadError::NotSoundFont(String::new())),
        }

        let mut name = String::new();
        let mut smpl = None;
        let mut pdta = None;
        for child in root.children() {
            let child = child?;
            match child.form_type().as_ref() {
                Some(b"INFO") => {
                    for info in child.children() {
                        let info = info?;
                        if info.is(b"INAM") {
                            name = hydra::read_name(info.data);
                        }
                    }
                }
                Some(b"sdta") => {
                    for data in child.children() {
                        let data = data?;
                        if data.is(b"smpl") {
                            smpl = Some(data.data);
                        }
                    }
                }
                Some(b"pdta") => pdta = Some(child),
                _ => {}
            }
        }

        let smpl = smpl.ok_or(LoadError::MissingChunk("smpl"))?;
        let pdta = pdta.ok_or(LoadError::MissingChunk("pdta"))?;
        let hydra = Hydra::parse(&pdta)?;

        let samples: Vec<f32> = smpl
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect();

        let presets = build_presets(&hydra, samples.len());
        if presets.is_empty() {
            return Err(LoadError::NoPresets);
        }

        let mut lookup = HashMap::with_capacity(presets.len());
        for (index, preset) in presets.iter().enumerate() {
            // The first definition of a duplicated (bank, preset) wins.
            lookup.entry((preset.bank, preset.number)).or_insert(index);
        }

        let bank = InstrumentBank {
            name,
            presets,
            lookup,
            samples,
        };
        info!(
            name = bank.name,
            presets = bank.presets.len(),
            regions = bank.region_count(),
            memory_kb = bank.memory_size() / 1024,
            "Sound bank loaded"
        );
        Ok(bank)
    }

    /// Gets the bank name from the INFO list, if any.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets all presets in file order.
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Gets a preset by index.
    pub fn preset(&self, index: usize) -> Option<&Preset> {
        self.presets.get(index)
    }

    /// Finds the index of the exact (bank, preset) pair.
    pub fn find_preset(&self, bank: u16, preset: u16) -> Option<usize> {
        self.lookup.get(&(bank, preset)).copied()
    }

    /// Resolves a (bank, preset) pair, falling back to bank 0 preset 0 and then to the first
    /// preset in the file.
    pub fn resolve_preset(&self, bank: u16, preset: u16) -> usize {
        self.find_preset(bank, preset)
            .or_else(|| self.find_preset(0, 0))
            .unwrap_or(0)
    }

    /// Gets the shared sample pool as normalized floats.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the total number of regions across all presets.
    pub fn region_count(&self) -> usize {
        self.presets.iter().map(|p| p.regions.len()).sum()
    }

    /// Returns the memory used by the sample pool in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for InstrumentBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentBank")
            .field("name", &self.name)
            .field("presets", &self.presets.len())
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}

/// Flattens every preset into regions. The last header of each table is the terminal record.
fn build_presets(hydra: &Hydra, pool_len: usize) -> Vec<Preset> {
    let mut presets = Vec::new();

    for (index, header) in hydra
        .presets
        .iter()
        .enumerate()
        .take(hydra.presets.len().saturating_sub(1))
    {
        let first_bag = header.bag_index as usize;
        let end_bag = (hydra.presets[index + 1].bag_index as usize)
            .min(hydra.preset_bags.len().saturating_sub(1));

        let mut global = GeneratorSet::preset_offsets();
        let mut regions = Vec::new();
        for bag in first_bag..end_bag.max(first_bag) {
            let generators =
                Hydra::zone_generators(&hydra.preset_bags, &hydra.preset_generators, bag);

            let mut zone = global.clone();
            let mut instrument = None;
            for generator in generators {
                if generator.operator == op::INSTRUMENT {
                    instrument = Some(generator.amount as usize);
                    break;
                }
                zone.apply(generator, ZoneLevel::Preset);
            }

            match instrument {
                Some(instrument) => add_instrument_regions(
                    hydra,
                    instrument,
                    &zone,
                    pool_len,
                    &mut regions,
                ),
                None if bag == first_bag => global = zone,
                None => {}
            }
        }

        debug!(
            name = header.name,
            bank = header.bank,
            preset = header.preset,
            regions = regions.len(),
            "Preset parsed"
        );
        presets.push(Preset {
            name: header.name.clone(),
            bank: header.bank,
            number: header.preset,
            regions,
        });
    }

    presets
}

fn add_instrument_regions(
    hydra: &Hydra,
    instrument: usize,
    preset_zone: &GeneratorSet,
    pool_len: usize,
    regions: &mut Vec<Region>,
) {
    // The terminal instrument record is not a real instrument.
    if instrument + 1 >= hydra.instruments.len() {
        debug!(instrument, "Preset zone references a missing instrument");
        return;
    }

    let first_bag = hydra.instruments[instrument].bag_index as usize;
    let end_bag = (hydra.instruments[instrument + 1].bag_index as usize)
        .min(hydra.instrument_bags.len().saturating_sub(1));

    let mut global = GeneratorSet::instrument_defaults();
    for bag in first_bag..end_bag.max(first_bag) {
        let generators =
            Hydra::zone_generators(&hydra.instrument_bags, &hydra.instrument_generators, bag);

        let mut zone = global.clone();
        let mut sample = None;
        for generator in generators {
            if generator.operator == op::SAMPLE_ID {
                sample = Some(generator.amount as usize);
                break;
            }
            zone.apply(generator, ZoneLevel::Instrument);
        }

        let Some(sample) = sample else {
            if bag == first_bag {
                global = zone;
            }
            continue;
        };

        let header = match hydra.samples.get(sample) {
            Some(header) if sample + 1 < hydra.samples.len() && header.is_playable() => header,
            _ => {
                debug!(
                    instrument = hydra.instruments[instrument].name,
                    sample, "Instrument zone references an unplayable sample"
                );
                continue;
            }
        };

        zone.add_preset(preset_zone);
        if !zone.has_valid_ranges() {
            continue;
        }
        if let Some(region) = Region::from_generators(&zone, header, pool_len) {
            regions.push(region);
        }
    }
}
