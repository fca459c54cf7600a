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

//! Fixed-width big-endian fields and the two length-prefixed shapes used on
//! the wire: strings (`u16` length) and byte blocks (`u32` length).
//!
//! Every reader checks the remaining length first, so a truncated payload
//! turns into `MalformedProtocol` instead of a panic inside `bytes`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{AppError, AppResult};

fn ensure_remaining(buffer: &Bytes, needed: usize, field: &str) -> AppResult<()> {
    if buffer.remaining() < needed {
        return Err(AppError::MalformedProtocol(format!(
            "field {} needs {} bytes, only {} left",
            field,
            needed,
            buffer.remaining()
        )));
    }
    Ok(())
}

pub fn read_u16(buffer: &mut Bytes, field: &str) -> AppResult<u16> {
    ensure_remaining(buffer, 2, field)?;
    Ok(buffer.get_u16())
}

pub fn read_u32(buffer: &mut Bytes, field: &str) -> AppResult<u32> {
    ensure_remaining(buffer, 4, field)?;
    Ok(buffer.get_u32())
}

/// Splits off exactly `len` bytes without copying.
pub fn read_bytes(buffer: &mut Bytes, len: usize, field: &str) -> AppResult<Bytes> {
    ensure_remaining(buffer, len, field)?;
    Ok(buffer.split_to(len))
}

/// `u16` length followed by utf-8 bytes
pub fn read_string(buffer: &mut Bytes, field: &str) -> AppResult<String> {
    let len = read_u16(buffer, field)? as usize;
    let raw = read_bytes(buffer, len, field)?;
    String::from_utf8(raw.to_vec())
        .map_err(|e| AppError::MalformedProtocol(format!("field {} is not utf-8: {}", field, e)))
}

pub fn write_string(buffer: &mut BytesMut, value: &str, field: &str) -> AppResult<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        AppError::InvalidValue(format!(
            "field {} is {} bytes, longer than {}",
            field,
            value.len(),
            u16::MAX
        ))
    })?;
    buffer.put_u16(len);
    buffer.put_slice(value.as_bytes());
    Ok(())
}

/// `u32` length followed by the raw bytes
pub fn write_bytes(buffer: &mut BytesMut, value: &[u8], field: &str) -> AppResult<()> {
    let len = u32::try_from(value.len()).map_err(|_| {
        AppError::InvalidValue(format!(
            "field {} is {} bytes, longer than {}",
            field,
            value.len(),
            u32::MAX
        ))
    })?;
    buffer.put_u32(len);
    buffer.put_slice(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_layout_is_u16_prefixed() {
        let mut buffer = BytesMut::new();
        write_string(&mut buffer, "test", "topic").unwrap();
        assert_eq!(&buffer[..], &[0, 4, b't', b'e', b's', b't']);

        let mut bytes = buffer.freeze();
        assert_eq!(read_string(&mut bytes, "topic").unwrap(), "test");
        assert!(bytes.is_empty());
    }

    #[test]
    fn truncated_fields_are_malformed() {
        let mut bytes = Bytes::from_static(&[0, 9, b'a']);
        let err = read_string(&mut bytes, "topic").unwrap_err();
        assert!(matches!(err, AppError::MalformedProtocol(_)));

        let mut bytes = Bytes::from_static(&[0, 0, 1]);
        assert!(read_u32(&mut bytes, "partition").is_err());
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let mut bytes = Bytes::from_static(&[0, 2, 0xff, 0xfe]);
        assert!(matches!(
            read_string(&mut bytes, "topic"),
            Err(AppError::MalformedProtocol(_))
        ));
    }

    #[test]
    fn block_layout_is_u32_prefixed() {
        let mut buffer = BytesMut::new();
        write_bytes(&mut buffer, b"abc", "message").unwrap();
        assert_eq!(&buffer[..], &[0, 0, 0, 3, b'a', b'b', b'c']);
    }
}
