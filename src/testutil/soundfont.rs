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

//! Writes small SoundFont 2 images for tests.

use std::f32::consts::PI;

use crate::bank::generators::op;

const SAMPLE_RATE: u32 = 44_100;
/// Every sample is followed by at least 46 zero frames.
const SAMPLE_PADDING: usize = 46;
const MONO_SAMPLE: u16 = 1;

pub struct TestSample {
    name: String,
    data: Vec<i16>,
    sample_rate: u32,
    root_key: u8,
    loop_range: (u32, u32),
}

impl TestSample {
    pub fn new(name: &str, data: Vec<f32>, root_key: u8) -> TestSample {
        let frames = data.len() as u32;
        TestSample {
            name: name.to_string(),
            data: data
                .into_iter()
                .map(|x| (x.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .collect(),
            sample_rate: SAMPLE_RATE,
            root_key,
            loop_range: (0, frames),
        }
    }
}

/// A sine at half scale. Frequencies that divide the sample rate loop cleanly over the whole
/// sample.
pub fn sine_sample(name: &str, frequency: f32, frames: usize, root_key: u8) -> TestSample {
    let data = (0..frames)
        .map(|i| 0.5 * (2.0 * PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
        .collect();
    TestSample::new(name, data, root_key)
}

/// An exponentially decaying sine, like a struck drum.
pub fn decaying_sample(name: &str, frequency: f32, frames: usize, root_key: u8) -> TestSample {
    let data = (0..frames)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.8 * (-30.0 * t).exp() * (2.0 * PI * frequency * t).sin()
        })
        .collect();
    TestSample::new(name, data, root_key)
}

pub struct TestZone {
    sample: u16,
    key_range: Option<(u8, u8)>,
    vel_range: Option<(u8, u8)>,
    generators: Vec<(u16, i16)>,
}

impl TestZone {
    pub fn new(sample: u16) -> TestZone {
        TestZone {
            sample,
            key_range: None,
            vel_range: None,
            generators: Vec::new(),
        }
    }

    pub fn keys(mut self, low: u8, high: u8) -> TestZone {
        self.key_range = Some((low, high));
        self
    }

    pub fn velocities(mut self, low: u8, high: u8) -> TestZone {
        self.vel_range = Some((low, high));
        self
    }

    pub fn generator(mut self, operator: u16, amount: i16) -> TestZone {
        self.generators.push((operator, amount));
        self
    }

    /// Loops continuously.
    pub fn looped(self) -> TestZone {
        self.generator(op::SAMPLE_MODES, 1)
    }
}

pub struct TestInstrument {
    name: String,
    global: Option<Vec<(u16, i16)>>,
    zones: Vec<TestZone>,
}

impl TestInstrument {
    pub fn new(name: &str) -> TestInstrument {
        TestInstrument {
            name: name.to_string(),
            global: None,
            zones: Vec::new(),
        }
    }

    pub fn global(mut self, generators: Vec<(u16, i16)>) -> TestInstrument {
        self.global = Some(generators);
        self
    }

    pub fn zone(mut self, zone: TestZone) -> TestInstrument {
        self.zones.push(zone);
        self
    }
}

/// A preset with a single zone referencing one instrument.
pub struct TestPreset {
    name: String,
    bank: u16,
    preset: u16,
    instrument: u16,
    global: Option<Vec<(u16, i16)>>,
    key_range: Option<(u8, u8)>,
    generators: Vec<(u16, i16)>,
}

impl TestPreset {
    pub fn new(name: &str, bank: u16, preset: u16, instrument: u16) -> TestPreset {
        TestPreset {
            name: name.to_string(),
            bank,
            preset,
            instrument,
            global: None,
            key_range: None,
            generators: Vec::new(),
        }
    }

    pub fn global(mut self, generators: Vec<(u16, i16)>) -> TestPreset {
        self.global = Some(generators);
        self
    }

    pub fn keys(mut self, low: u8, high: u8) -> TestPreset {
        self.key_range = Some((low, high));
        self
    }

    pub fn generator(mut self, operator: u16, amount: i16) -> TestPreset {
        self.generators.push((operator, amount));
        self
    }
}

pub struct SoundFontBuilder {
    name: String,
    samples: Vec<TestSample>,
    instruments: Vec<TestInstrument>,
    presets: Vec<TestPreset>,
}

/// Bags and generators of one hydra level.
#[derive(Default)]
struct ZoneTables {
    bags: Vec<u8>,
    generators: Vec<u8>,
    bag_count: u16,
    generator_count: u16,
}

impl ZoneTables {
    /// Starts a zone and writes its generators, range generators first.
    fn zone(
        &mut self,
        key_range: Option<(u8, u8)>,
        vel_range: Option<(u8, u8)>,
        rest: &[(u16, i16)],
    ) {
        push_u16(&mut self.bags, self.generator_count);
        push_u16(&mut self.bags, 0);
        self.bag_count += 1;

        if let Some((low, high)) = key_range {
            self.range(op::KEY_RANGE, low, high);
        }
        if let Some((low, high)) = vel_range {
            self.range(op::VEL_RANGE, low, high);
        }
        for (operator, amount) in rest {
            self.generator(*operator, *amount as u16);
        }
    }

    fn range(&mut self, operator: u16, low: u8, high: u8) {
        self.generator(operator, u16::from_le_bytes([low, high]));
    }

    fn generator(&mut self, operator: u16, amount: u16) {
        push_u16(&mut self.generators, operator);
        push_u16(&mut self.generators, amount);
        self.generator_count += 1;
    }

    /// Writes the terminal bag and generator.
    fn finish(mut self) -> (Vec<u8>, Vec<u8>) {
        push_u16(&mut self.bags, self.generator_count);
        push_u16(&mut self.bags, 0);
        self.generators.extend_from_slice(&[0; 4]);
        (self.bags, self.generators)
    }
}

impl SoundFontBuilder {
    pub fn new(name: &str) -> SoundFontBuilder {
        SoundFontBuilder {
            name: name.to_string(),
            samples: Vec::new(),
            instruments: Vec::new(),
            presets: Vec::new(),
        }
    }

    pub fn sample(mut self, sample: TestSample) -> SoundFontBuilder {
        self.samples.push(sample);
        self
    }

    pub fn instrument(mut self, instrument: TestInstrument) -> SoundFontBuilder {
        self.instruments.push(instrument);
        self
    }

    pub fn preset(mut self, preset: TestPreset) -> SoundFontBuilder {
        self.presets.push(preset);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut info = b"INFO".to_vec();
        info.extend(chunk(b"ifil", &[2, 0, 1, 0]));
        info.extend(chunk(b"INAM", &name_bytes(&self.name)));

        let mut smpl = Vec::new();
        let mut shdr = Vec::new();
        let mut position = 0u32;
        for sample in &self.samples {
            for value in &sample.data {
                smpl.extend_from_slice(&value.to_le_bytes());
            }
            smpl.extend(std::iter::repeat(0u8).take(SAMPLE_PADDING * 2));

            let frames = sample.data.len() as u32;
            shdr.extend(fixed_name(&sample.name));
            push_u32(&mut shdr, position);
            push_u32(&mut shdr, position + frames);
            push_u32(&mut shdr, position + sample.loop_range.0);
            push_u32(&mut shdr, position + sample.loop_range.1);
            push_u32(&mut shdr, sample.sample_rate);
            shdr.push(sample.root_key);
            shdr.push(0);
            push_u16(&mut shdr, 0);
            push_u16(&mut shdr, MONO_SAMPLE);

            position += frames + SAMPLE_PADDING as u32;
        }
        shdr.extend(fixed_name("EOS"));
        shdr.extend_from_slice(&[0; 26]);

        let mut sdta = b"sdta".to_vec();
        sdta.extend(chunk(b"smpl", &smpl));

        let mut inst = Vec::new();
        let mut instrument_zones = ZoneTables::default();
        for instrument in &self.instruments {
            inst.extend(fixed_name(&instrument.name));
            push_u16(&mut inst, instrument_zones.bag_count);
            if let Some(global) = &instrument.global {
                instrument_zones.zone(None, None, global);
            }
            for zone in &instrument.zones {
                let mut generators = zone.generators.clone();
                generators.push((op::SAMPLE_ID, zone.sample as i16));
                instrument_zones.zone(zone.key_range, zone.vel_range, &generators);
            }
        }
        inst.extend(fixed_name("EOI"));
        push_u16(&mut inst, instrument_zones.bag_count);
        let (ibag, igen) = instrument_zones.finish();

        let mut phdr = Vec::new();
        let mut preset_zones = ZoneTables::default();
        for preset in &self.presets {
            phdr.extend(fixed_name(&preset.name));
            push_u16(&mut phdr, preset.preset);
            push_u16(&mut phdr, preset.bank);
            push_u16(&mut phdr, preset_zones.bag_count);
            phdr.extend_from_slice(&[0; 12]);
            if let Some(global) = &preset.global {
                preset_zones.zone(None, None, global);
            }
            let mut generators = preset.generators.clone();
            generators.push((op::INSTRUMENT, preset.instrument as i16));
            preset_zones.zone(preset.key_range, None, &generators);
        }
        phdr.extend(fixed_name("EOP"));
        push_u16(&mut phdr, 0);
        push_u16(&mut phdr, 0);
        push_u16(&mut phdr, preset_zones.bag_count);
        phdr.extend_from_slice(&[0; 12]);
        let (pbag, pgen) = preset_zones.finish();

        let mut pdta = b"pdta".to_vec();
        pdta.extend(chunk(b"phdr", &phdr));
        pdta.extend(chunk(b"pbag", &pbag));
        pdta.extend(chunk(b"pmod", &[0; 10]));
        pdta.extend(chunk(b"pgen", &pgen));
        pdta.extend(chunk(b"inst", &inst));
        pdta.extend(chunk(b"ibag", &ibag));
        pdta.extend(chunk(b"imod", &[0; 10]));
        pdta.extend(chunk(b"igen", &igen));
        pdta.extend(chunk(b"shdr", &shdr));

        let mut body = b"sfbk".to_vec();
        body.extend(chunk(b"LIST", &info));
        body.extend(chunk(b"LIST", &sdta));
        body.extend(chunk(b"LIST", &pdta));
        chunk(b"RIFF", &body)
    }
}

fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut bytes = id.to_vec();
    push_u32(&mut bytes, data.len() as u32);
    bytes.extend_from_slice(data);
    if data.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

/// A NUL-terminated name padded to an even length.
fn name_bytes(name: &str) -> Vec<u8> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

fn fixed_name(name: &str) -> [u8; 20] {
    let mut bytes = [0u8; 20];
    let len = name.len().min(20);
    bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
    bytes
}

fn push_u16(bytes: &mut Vec<u8>, value: u16) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(bytes: &mut Vec<u8>, value: u32) {
    bytes.extend_from_slice(&value.to_le_bytes());
}
