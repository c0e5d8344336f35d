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
use std::error::Error;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sfsynth::bank::InstrumentBank;
use sfsynth::config;
use sfsynth::synth::Synthesizer;

/// Frames rendered per block by the offline renderer.
const BLOCK_FRAMES: usize = 1024;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A SoundFont wavetable synthesizer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the presets in a SoundFont.
    Presets {
        /// The path to the SoundFont.
        bank: PathBuf,
    },
    /// Renders a chord to a WAV file.
    Render {
        /// The path to the SoundFont.
        bank: PathBuf,
        /// The WAV file to write.
        output: PathBuf,
        /// The path to a synthesizer config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The bank number of the preset to play.
        #[arg(short = 'b', long = "bank", default_value_t = 0)]
        bank_number: u16,
        /// The preset number to play.
        #[arg(short, long, default_value_t = 0)]
        preset: u16,
        /// The notes to play, separated by commas. For example, 60,64,67.
        #[arg(short, long, default_value = "60,64,67")]
        notes: String,
        /// The note-on velocity.
        #[arg(short, long, default_value_t = 100)]
        velocity: u8,
        /// How long the notes are held.
        #[arg(long, default_value = "1s")]
        hold: String,
        /// The longest the release may ring out after the notes are released.
        #[arg(long, default_value = "2s")]
        tail: String,
    },
    /// Loads a synthesizer config and prints it with defaults filled in.
    CheckConfig {
        /// The path to the synthesizer config.
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Presets { bank } => {
            let bank = InstrumentBank::from_file(&bank)?;

            println!("{} (presets: {}):", bank.name(), bank.presets().len());
            let mut presets: Vec<_> = bank.presets().iter().collect();
            presets.sort_by_key(|preset| (preset.bank(), preset.number()));
            for preset in presets {
                println!("- {}", preset);
            }
        }
        Commands::Render {
            bank,
            output,
            config,
            bank_number,
            preset,
            notes,
            velocity,
            hold,
            tail,
        } => {
            let config = match config {
                Some(path) => config::Synth::deserialize(&path)?,
                None => config::Synth::default(),
            };
            let notes = parse_notes(&notes)?;
            let hold: Duration = DurationString::from_string(hold)?.into();
            let tail: Duration = DurationString::from_string(tail)?.into();

            let bank = Arc::new(InstrumentBank::from_file(&bank)?);
            let mut synth = Synthesizer::new(bank, &config)?;
            synth.set_preset(0, bank_number, preset);
            render_chord(&mut synth, &notes, velocity, hold, tail, &output)?;
        }
        Commands::CheckConfig { path } => {
            let config = config::Synth::deserialize(&path)?;
            print!("{}", serde_yml::to_string(&config.resolved())?);
        }
    }

    Ok(())
}

fn parse_notes(notes: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut parsed = Vec::new();
    for note in notes.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let note: u8 = note.parse()?;
        if note > 127 {
            return Err(format!("note {} is out of range", note).into());
        }
        parsed.push(note);
    }
    if parsed.is_empty() {
        return Err("no notes given".into());
    }
    Ok(parsed)
}

/// Plays the notes for `hold`, releases them and renders until silence or `tail` elapses.
fn render_chord(
    synth: &mut Synthesizer,
    notes: &[u8],
    velocity: u8,
    hold: Duration,
    tail: Duration,
    output: &Path,
) -> Result<(), Box<dyn Error>> {
    let format = synth.output_format();
    let channels = format.channels();
    let mut writer = WavWriter::create(
        output,
        WavSpec {
            channels: channels as u16,
            sample_rate: format.sample_rate(),
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;
    let mut block = vec![0.0f32; BLOCK_FRAMES * channels];

    for note in notes {
        synth.note_on(0, *note, velocity);
    }
    let hold_frames = frames_in(hold, format.sample_rate());
    let mut rendered = 0;
    while rendered < hold_frames {
        let frames = BLOCK_FRAMES.min(hold_frames - rendered);
        write_block(synth, &mut writer, &mut block, frames)?;
        rendered += frames;
    }

    for note in notes {
        synth.note_off(0, *note);
    }
    let tail_frames = frames_in(tail, format.sample_rate());
    let mut rendered = 0;
    while rendered < tail_frames && synth.active_voice_count() > 0 {
        let frames = BLOCK_FRAMES.min(tail_frames - rendered);
        write_block(synth, &mut writer, &mut block, frames)?;
        rendered += frames;
    }

    writer.finalize()?;
    info!(path = ?output, format = %format, "Rendered");
    Ok(())
}

fn write_block<W: Write + Seek>(
    synth: &mut Synthesizer,
    writer: &mut WavWriter<W>,
    block: &mut [f32],
    frames: usize,
) -> Result<(), Box<dyn Error>> {
    let channels = synth.output_format().channels();
    let frames = synth.render(block, frames)?;
    for sample in &block[..frames * channels] {
        writer.write_sample(*sample)?;
    }
    Ok(())
}

fn frames_in(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}
