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

/// Errors raised while loading an instrument bank. A failed load never produces a partial bank.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Unable to read sound bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sound bank buffer is empty")]
    Empty,

    #[error("Not a RIFF file")]
    NotRiff,

    #[error("RIFF form type is {0:?}, expected \"sfbk\"")]
    NotSoundFont(String),

    #[error("Chunk {0:?} is truncated")]
    Truncated(String),

    #[error("Required chunk {0:?} is missing")]
    MissingChunk(&'static str),

    #[error("Invalid {chunk:?} records: {reason}")]
    InvalidRecord { chunk: &'static str, reason: String },

    #[error("Sound bank defines no presets")]
    NoPresets,
}
