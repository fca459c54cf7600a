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

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::primary_types::{read_u16, read_u32};
use crate::protocol::ApiKey;
use crate::AppResult;

/// Fixed request header that follows the frame length.
///
/// `api_key` stays raw so unknown keys survive decoding and can be answered;
/// `api_version` is recorded for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub api_key: u16,
    pub api_version: u16,
    pub correlation_id: u32,
}

impl RequestHeader {
    pub const SIZE: usize = 2 + 2 + 4;

    pub fn new(api_key: u16, api_version: u16, correlation_id: u32) -> Self {
        RequestHeader {
            api_key,
            api_version,
            correlation_id,
        }
    }

    pub fn read_from(buffer: &mut Bytes) -> AppResult<RequestHeader> {
        let api_key = read_u16(buffer, "api_key")?;
        let api_version = read_u16(buffer, "api_version")?;
        let correlation_id = read_u32(buffer, "correlation_id")?;
        Ok(RequestHeader {
            api_key,
            api_version,
            correlation_id,
        })
    }

    pub fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_u16(self.api_key);
        buffer.put_u16(self.api_version);
        buffer.put_u32(self.correlation_id);
    }

    pub fn api_key(&self) -> Option<ApiKey> {
        ApiKey::from_u16(self.api_key)
    }
}
