// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{AppError, AppResult};

/// Size of the length prefix in front of every message.
pub const RECORD_LENGTH_SIZE: usize = 4;

/// A self-delimiting run of records: `length:u32 | message bytes`, repeated.
///
/// This is both the on-disk layout of a partition file and the payload of a
/// Fetch response.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct MemoryRecords {
    buffer: Bytes,
}

impl std::fmt::Debug for MemoryRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRecords")
            .field("buffer length", &self.buffer.len())
            .finish()
    }
}

/// Result of walking a record run from the start.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordScan {
    /// byte length of the complete records; anything after is a torn tail
    pub valid_len: usize,
    /// start position of every complete record
    pub positions: Vec<u64>,
}

impl MemoryRecords {
    pub fn new(buffer: Bytes) -> Self {
        MemoryRecords { buffer }
    }

    pub fn empty() -> Self {
        MemoryRecords::default()
    }

    pub fn from_messages<I, M>(messages: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = M>,
        M: AsRef<[u8]>,
    {
        let mut buffer = BytesMut::new();
        for message in messages {
            put_record(&mut buffer, message.as_ref())?;
        }
        Ok(MemoryRecords::new(buffer.freeze()))
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.buffer
    }

    pub fn into_bytes(self) -> Bytes {
        self.buffer
    }

    /// Iterates the messages; a record that runs past the end yields one
    /// `CorruptMessage` error and stops.
    pub fn iter(&self) -> RecordIter {
        RecordIter {
            remaining: self.buffer.clone(),
            failed: false,
        }
    }

    pub fn messages(&self) -> AppResult<Vec<Bytes>> {
        self.iter().collect()
    }

    /// Walks complete records from byte 0, stopping at the first record
    /// whose declared length exceeds what is left.
    pub fn scan(buffer: &[u8]) -> RecordScan {
        let mut positions = Vec::new();
        let mut pos = 0usize;
        while buffer.len() - pos >= RECORD_LENGTH_SIZE {
            let mut len_bytes = &buffer[pos..pos + RECORD_LENGTH_SIZE];
            let len = len_bytes.get_u32() as usize;
            let end = match (pos + RECORD_LENGTH_SIZE).checked_add(len) {
                Some(end) if end <= buffer.len() => end,
                _ => break,
            };
            positions.push(pos as u64);
            pos = end;
        }
        RecordScan {
            valid_len: pos,
            positions,
        }
    }
}

/// Appends one length-prefixed record to `buffer`.
pub fn put_record(buffer: &mut BytesMut, message: &[u8]) -> AppResult<()> {
    let len = u32::try_from(message.len()).map_err(|_| {
        AppError::MessageTooLarge(format!(
            "message of {} bytes does not fit a u32 length",
            message.len()
        ))
    })?;
    buffer.reserve(RECORD_LENGTH_SIZE + message.len());
    buffer.put_u32(len);
    buffer.put_slice(message);
    Ok(())
}

pub struct RecordIter {
    remaining: Bytes,
    failed: bool,
}

impl Iterator for RecordIter {
    type Item = AppResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }
        if self.remaining.len() < RECORD_LENGTH_SIZE {
            self.failed = true;
            return Some(Err(AppError::CorruptMessage(format!(
                "{} trailing bytes cannot hold a record length",
                self.remaining.len()
            ))));
        }
        let len = (&self.remaining[..RECORD_LENGTH_SIZE]).get_u32() as usize;
        if self.remaining.len() - RECORD_LENGTH_SIZE < len {
            self.failed = true;
            return Some(Err(AppError::CorruptMessage(format!(
                "record declares {} bytes, only {} left",
                len,
                self.remaining.len() - RECORD_LENGTH_SIZE
            ))));
        }
        self.remaining.advance(RECORD_LENGTH_SIZE);
        Some(Ok(self.remaining.split_to(len)))
    }
}
