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

//! Minimal RIFF chunk walking over a borrowed byte buffer.

use super::error::LoadError;

/// Size of a chunk header: four byte id plus little-endian u32 size.
const HEADER_LEN: usize = 8;

/// A single RIFF chunk borrowed from the source buffer.
#[derive(Debug, Clone, Copy)]
pub(super) struct Chunk<'a> {
    pub id: [u8; 4],
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Reads the outermost chunk of a buffer, which must be the RIFF container.
    pub fn riff(bytes: &'a [u8]) -> Result<Chunk<'a>, LoadError> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != b"RIFF" {
            return Err(LoadError::NotRiff);
        }

        match ChunkReader::new(bytes).next() {
            Some(result) => result,
            None => Err(LoadError::NotRiff),
        }
    }

    /// Returns true if the chunk has the given id.
    pub fn is(&self, id: &[u8; 4]) -> bool {
        &self.id == id
    }

    /// Returns the form/list type of a RIFF or LIST chunk.
    pub fn form_type(&self) -> Option<[u8; 4]> {
        if (self.is(b"RIFF") || self.is(b"LIST")) && self.data.len() >= 4 {
            Some([self.data[0], self.data[1], self.data[2], self.data[3]])
        } else {
            None
        }
    }

    /// Iterates over the sub-chunks of a RIFF or LIST chunk.
    pub fn children(&self) -> ChunkReader<'a> {
        let data = if self.data.len() >= 4 {
            &self.data[4..]
        } else {
            &[]
        };
        ChunkReader::new(data)
    }
}

/// Iterates over consecutive chunks. Yields an error and stops if a chunk claims more bytes
/// than remain.
pub(super) struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> ChunkReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ChunkReader {
            data,
            pos: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<Chunk<'a>, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Anything shorter than a header at the tail is pad bytes.
        if self.failed || self.data.len() - self.pos < HEADER_LEN {
            return None;
        }

        let header = &self.data[self.pos..self.pos + HEADER_LEN];
        let id = [header[0], header[1], header[2], header[3]];
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = self.pos + HEADER_LEN;

        let end = match start.checked_add(size) {
            Some(end) if end <= self.data.len() => end,
            _ => {
                self.failed = true;
                return Some(Err(LoadError::Truncated(
                    String::from_utf8_lossy(&id).into_owned(),
                )));
            }
        };

        // Chunks are padded to an even length.
        self.pos = (end + (size & 1)).min(self.data.len());

        Some(Ok(Chunk {
            id,
            data: &self.data[start..end],
        }))
    }
}
