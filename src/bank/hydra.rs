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

//! The `pdta` record tables ("hydra") of a SoundFont 2 file.

use super::error::LoadError;
use super::riff::Chunk;

const PRESET_HEADER_LEN: usize = 38;
const BAG_LEN: usize = 4;
const GENERATOR_LEN: usize = 4;
const INSTRUMENT_HEADER_LEN: usize = 22;
const SAMPLE_HEADER_LEN: usize = 46;

/// Sample type flag for samples stored in ROM, which cannot be played from the file.
const ROM_SAMPLE: u16 = 0x8000;

#[derive(Debug, Clone)]
pub(super) struct PresetHeader {
    pub name: String,
    pub preset: u16,
    pub bank: u16,
    pub bag_index: u16,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Bag {
    pub generator_index: u16,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Generator {
    pub operator: u16,
    pub amount: u16,
}

#[derive(Debug, Clone)]
pub(super) struct InstrumentHeader {
    pub name: String,
    pub bag_index: u16,
}

#[derive(Debug, Clone)]
pub(super) struct SampleHeader {
    #[allow(dead_code)]
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_type: u16,
}

impl SampleHeader {
    /// Returns true if the sample data lives in the file rather than in synthesizer ROM.
    pub fn is_playable(&self) -> bool {
        self.sample_type & ROM_SAMPLE == 0 && self.sample_rate > 0 && self.end > self.start
    }
}

/// All record tables from the `pdta` list. Terminal records are kept so that bag and generator
/// ranges can be computed from the following record.
#[derive(Debug)]
pub(super) struct Hydra {
    pub presets: Vec<PresetHeader>,
    pub preset_bags: Vec<Bag>,
    pub preset_generators: Vec<Generator>,
    pub instruments: Vec<InstrumentHeader>,
    pub instrument_bags: Vec<Bag>,
    pub instrument_generators: Vec<Generator>,
    pub samples: Vec<SampleHeader>,
}

impl Hydra {
    /// Parses the record tables from the `pdta` list chunk.
    pub fn parse(pdta: &Chunk) -> Result<Hydra, LoadError> {
        let mut phdr = None;
        let mut pbag = None;
        let mut pgen = None;
        let mut inst = None;
        let mut ibag = None;
        let mut igen = None;
        let mut shdr = None;

        for child in pdta.children() {
            let child = child?;
            match &child.id {
                b"phdr" => phdr = Some(child.data),
                b"pbag" => pbag = Some(child.data),
                b"pgen" => pgen = Some(child.data),
                b"inst" => inst = Some(child.data),
                b"ibag" => ibag = Some(child.data),
                b"igen" => igen = Some(child.data),
                b"shdr" => shdr = Some(child.data),
                // Modulators are not supported.
                _ => {}
            }
        }

        let hydra = Hydra {
            presets: read_records(
                "phdr",
                phdr.ok_or(LoadError::MissingChunk("phdr"))?,
                PRESET_HEADER_LEN,
                |r| PresetHeader {
                    name: read_name(&r[0..20]),
                    preset: read_u16(r, 20),
                    bank: read_u16(r, 22),
                    bag_index: read_u16(r, 24),
                },
            )?,
            preset_bags: read_records(
                "pbag",
                pbag.ok_or(LoadError::MissingChunk("pbag"))?,
                BAG_LEN,
                read_bag,
            )?,
            preset_generators: read_records(
                "pgen",
                pgen.ok_or(LoadError::MissingChunk("pgen"))?,
                GENERATOR_LEN,
                read_generator,
            )?,
            instruments: read_records(
                "inst",
                inst.ok_or(LoadError::MissingChunk("inst"))?,
                INSTRUMENT_HEADER_LEN,
                |r| InstrumentHeader {
                    name: read_name(&r[0..20]),
                    bag_index: read_u16(r, 20),
                },
            )?,
            instrument_bags: read_records(
                "ibag",
                ibag.ok_or(LoadError::MissingChunk("ibag"))?,
                BAG_LEN,
                read_bag,
            )?,
            instrument_generators: read_records(
                "igen",
                igen.ok_or(LoadError::MissingChunk("igen"))?,
                GENERATOR_LEN,
                read_generator,
            )?,
            samples: read_records(
                "shdr",
                shdr.ok_or(LoadError::MissingChunk("shdr"))?,
                SAMPLE_HEADER_LEN,
                |r| SampleHeader {
                    name: read_name(&r[0..20]),
                    start: read_u32(r, 20),
                    end: read_u32(r, 24),
                    loop_start: read_u32(r, 28),
                    loop_end: read_u32(r, 32),
                    sample_rate: read_u32(r, 36),
                    original_pitch: r[40],
                    pitch_correction: r[41] as i8,
                    sample_type: read_u16(r, 44),
                },
            )?,
        };

        hydra.validate()?;
        Ok(hydra)
    }

    /// Returns the generators of bag `index` within `bags`, or an empty slice if the
    /// indices are inconsistent.
    pub fn zone_generators<'a>(
        bags: &[Bag],
        generators: &'a [Generator],
        index: usize,
    ) -> &'a [Generator] {
        let (Some(bag), Some(next)) = (bags.get(index), bags.get(index + 1)) else {
            return &[];
        };
        let start = bag.generator_index as usize;
        let end = (next.generator_index as usize).min(generators.len());
        if start >= end {
            return &[];
        }
        &generators[start..end]
    }

    /// Every table needs at least its terminal record, and bag indices must never run
    /// backwards past the end of their tables.
    fn validate(&self) -> Result<(), LoadError> {
        let checks: [(&'static str, usize); 5] = [
            ("phdr", self.presets.len()),
            ("pbag", self.preset_bags.len()),
            ("inst", self.instruments.len()),
            ("ibag", self.instrument_bags.len()),
            ("shdr", self.samples.len()),
        ];
        for (chunk, len) in checks {
            if len == 0 {
                return Err(LoadError::InvalidRecord {
                    chunk,
                    reason: "missing terminal record".to_string(),
                });
            }
        }

        if let Some(last) = self.presets.last() {
            if last.bag_index as usize >= self.preset_bags.len() {
                return Err(LoadError::InvalidRecord {
                    chunk: "phdr",
                    reason: format!(
                        "bag index {} out of range ({} bags)",
                        last.bag_index,
                        self.preset_bags.len()
                    ),
                });
            }
        }
        if let Some(last) = self.instruments.last() {
            if last.bag_index as usize >= self.instrument_bags.len() {
                return Err(LoadError::InvalidRecord {
                    chunk: "inst",
                    reason: format!(
                        "bag index {} out of range ({} bags)",
                        last.bag_index,
                        self.instrument_bags.len()
                    ),
                });
            }
        }

        Ok(())
    }
}

fn read_records<T>(
    chunk: &'static str,
    data: &[u8],
    record_len: usize,
    read: impl Fn(&[u8]) -> T,
) -> Result<Vec<T>, LoadError> {
    if data.len() % record_len != 0 {
        return Err(LoadError::InvalidRecord {
            chunk,
            reason: format!(
                "size {} is not a multiple of {}",
                data.len(),
                record_len
            ),
        });
    }
    Ok(data.chunks_exact(record_len).map(read).collect())
}

fn read_bag(record: &[u8]) -> Bag {
    Bag {
        generator_index: read_u16(record, 0),
    }
}

fn read_generator(record: &[u8]) -> Generator {
    Generator {
        operator: read_u16(record, 0),
        amount: read_u16(record, 2),
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Reads a fixed-width, NUL-padded name field.
pub(super) fn read_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}
