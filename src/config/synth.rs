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

use std::path::Path;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::synth::MAX_MIDI_CHANNELS;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_MAX_VOICES: usize = 64;
const DEFAULT_MIDI_CHANNELS: usize = 16;
const DEFAULT_PITCH_BEND_RANGE: f32 = 2.0;
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_DRUM_CHANNEL: u8 = 9;

fn default_drum_channel() -> Option<u8> {
    Some(DEFAULT_DRUM_CHANNEL)
}

/// A YAML representation of the synthesizer configuration.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Synth {
    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Output channels, 1 for mono or 2 for interleaved stereo (default: 2).
    channels: Option<u16>,

    /// Maximum polyphony (default: 64).
    max_voices: Option<usize>,

    /// Number of MIDI channels (default: 16).
    midi_channels: Option<usize>,

    /// Initial pitch bend range in semitones (default: 2.0).
    pitch_bend_range: Option<f32>,

    /// Global output gain in dB (default: 0.0).
    gain_db: Option<f32>,

    /// Control events that can be queued between renders (default: 1024).
    event_queue_capacity: Option<usize>,

    /// The channel that plays percussion kits from bank 128 (default: 9). Null disables it.
    #[serde(default = "default_drum_channel")]
    drum_channel: Option<u8>,
}

impl Default for Synth {
    fn default() -> Self {
        Synth {
            sample_rate: None,
            channels: None,
            max_voices: None,
            midi_channels: None,
            pitch_bend_range: None,
            gain_db: None,
            event_queue_capacity: None,
            drum_channel: default_drum_channel(),
        }
    }
}

impl Synth {
    /// Parse a synthesizer configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Synth, ConfigError> {
        let synth = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Synth>()?;
        synth.validate()?;
        Ok(synth)
    }

    /// Checks values that no engine can be built with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_voices() == 0 {
            return Err(ConfigError::Invalid {
                field: "max_voices",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(1..=MAX_MIDI_CHANNELS).contains(&self.midi_channels()) {
            return Err(ConfigError::Invalid {
                field: "midi_channels",
                reason: format!(
                    "{} is not between 1 and {}",
                    self.midi_channels(),
                    MAX_MIDI_CHANNELS
                ),
            });
        }
        if !self.pitch_bend_range().is_finite() || self.pitch_bend_range() < 0.0 {
            return Err(ConfigError::Invalid {
                field: "pitch_bend_range",
                reason: "must be a non-negative number of semitones".to_string(),
            });
        }
        if !self.gain_db().is_finite() {
            return Err(ConfigError::Invalid {
                field: "gain_db",
                reason: "must be finite".to_string(),
            });
        }
        Ok(())
    }

    /// Returns a copy with every default filled in.
    pub fn resolved(&self) -> Synth {
        Synth {
            sample_rate: Some(self.sample_rate()),
            channels: Some(self.channels()),
            max_voices: Some(self.max_voices()),
            midi_channels: Some(self.midi_channels()),
            pitch_bend_range: Some(self.pitch_bend_range()),
            gain_db: Some(self.gain_db()),
            event_queue_capacity: Some(self.event_queue_capacity()),
            drum_channel: self.drum_channel(),
        }
    }

    /// Returns the output sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the output channel count (default: 2)
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Returns the maximum polyphony (default: 64)
    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES)
    }

    /// Returns the number of MIDI channels (default: 16)
    pub fn midi_channels(&self) -> usize {
        self.midi_channels.unwrap_or(DEFAULT_MIDI_CHANNELS)
    }

    /// Returns the initial pitch bend range in semitones (default: 2.0)
    pub fn pitch_bend_range(&self) -> f32 {
        self.pitch_bend_range.unwrap_or(DEFAULT_PITCH_BEND_RANGE)
    }

    /// Returns the global gain in dB (default: 0.0)
    pub fn gain_db(&self) -> f32 {
        self.gain_db.unwrap_or(0.0)
    }

    /// Returns the event queue capacity, at least 1 (default: 1024)
    pub fn event_queue_capacity(&self) -> usize {
        self.event_queue_capacity
            .unwrap_or(DEFAULT_EVENT_QUEUE_CAPACITY)
            .max(1)
    }

    /// Returns the percussion channel, if any (default: 9)
    pub fn drum_channel(&self) -> Option<u8> {
        self.drum_channel
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_max_voices(mut self, max_voices: usize) -> Self {
        self.max_voices = Some(max_voices);
        self
    }

    pub fn with_midi_channels(mut self, midi_channels: usize) -> Self {
        self.midi_channels = Some(midi_channels);
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = Some(capacity);
        self
    }

    pub fn with_drum_channel(mut self, drum_channel: Option<u8>) -> Self {
        self.drum_channel = drum_channel;
        self
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Synth {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let synth = parse("{}");
        assert_eq!(synth, Synth::default());
        assert_eq!(synth.sample_rate(), 44100);
        assert_eq!(synth.channels(), 2);
        assert_eq!(synth.max_voices(), 64);
        assert_eq!(synth.midi_channels(), 16);
        assert_eq!(synth.pitch_bend_range(), 2.0);
        assert_eq!(synth.gain_db(), 0.0);
        assert_eq!(synth.event_queue_capacity(), 1024);
        assert_eq!(synth.drum_channel(), Some(9));
        assert!(synth.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let synth = parse(
            r#"
            sample_rate: 48000
            channels: 1
            max_voices: 8
            pitch_bend_range: 12.0
            gain_db: -6.0
            drum_channel: null
        "#,
        );
        assert_eq!(synth.sample_rate(), 48000);
        assert_eq!(synth.channels(), 1);
        assert_eq!(synth.max_voices(), 8);
        assert_eq!(synth.pitch_bend_range(), 12.0);
        assert_eq!(synth.gain_db(), -6.0);
        assert_eq!(synth.drum_channel(), None);
    }

    #[test]
    fn test_validate() {
        let synth = parse("max_voices: 0");
        assert!(matches!(
            synth.validate(),
            Err(ConfigError::Invalid {
                field: "max_voices",
                ..
            })
        ));

        assert!(parse("midi_channels: 32").validate().is_ok());
        let synth = parse("midi_channels: 257");
        assert!(matches!(
            synth.validate(),
            Err(ConfigError::Invalid {
                field: "midi_channels",
                ..
            })
        ));
    }

    #[test]
    fn test_deserialize_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.yaml");
        std::fs::write(&path, "max_voices: 32\nsample_rate: 22050\n").unwrap();

        let synth = Synth::deserialize(&path).unwrap();
        assert_eq!(synth.max_voices(), 32);
        assert_eq!(synth.sample_rate(), 22050);

        assert!(matches!(
            Synth::deserialize(&dir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_resolved() {
        let resolved = Synth::default().with_max_voices(4).resolved();
        let yaml = serde_yml::to_string(&resolved).unwrap();
        assert!(yaml.contains("max_voices: 4"));
        assert!(yaml.contains("sample_rate: 44100"));
    }
}
