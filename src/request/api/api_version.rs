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

use crate::protocol::primary_types::{read_u16, read_u32};
use crate::protocol::{ApiKey, ProtocolCodec, MAX_API_VERSION, MIN_API_VERSION};
use crate::request::RequestContext;
use crate::AppResult;

use super::handler::ApiHandler;

pub struct ApiVersionRequestHandler;

impl ApiHandler for ApiVersionRequestHandler {
    type Request = ApiVersionRequest;
    type Response = ApiVersionResponse;

    async fn handle_request(
        &self,
        request: ApiVersionRequest,
        _context: &RequestContext,
    ) -> AppResult<ApiVersionResponse> {
        Ok(request.process())
    }
}

/// The payload is never inspected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApiVersionRequest;

impl ApiVersionRequest {
    pub fn process(&self) -> ApiVersionResponse {
        let api_versions = ApiKey::SUPPORTED
            .iter()
            .map(|key| ApiVersionRange {
                api_key: key.as_u16(),
                min_version: MIN_API_VERSION,
                max_version: MAX_API_VERSION,
            })
            .collect();
        ApiVersionResponse { api_versions }
    }
}

impl ProtocolCodec for ApiVersionRequest {
    fn encode(&self, _buffer: &mut BytesMut) -> AppResult<()> {
        Ok(())
    }

    fn decode(buffer: &mut Bytes) -> AppResult<Self> {
        buffer.advance(buffer.remaining());
        Ok(ApiVersionRequest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersionRange {
    pub api_key: u16,
    pub min_version: u16,
    pub max_version: u16,
}

/// `count:u32` then `(api_key:u16, min:u16, max:u16)` per api
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionResponse {
    pub api_versions: Vec<ApiVersionRange>,
}

impl ProtocolCodec for ApiVersionResponse {
    fn encode(&self, buffer: &mut BytesMut) -> AppResult<()> {
        buffer.reserve(4 + self.api_versions.len() * 6);
        buffer.put_u32(self.api_versions.len() as u32);
        for range in &self.api_versions {
            buffer.put_u16(range.api_key);
            buffer.put_u16(range.min_version);
            buffer.put_u16(range.max_version);
        }
        Ok(())
    }

    fn decode(buffer: &mut Bytes) -> AppResult<Self> {
        let count = read_u32(buffer, "api_versions count")?;
        let mut api_versions = Vec::new();
        for _ in 0..count {
            api_versions.push(ApiVersionRange {
                api_key: read_u16(buffer, "api_key")?,
                min_version: read_u16(buffer, "min_version")?,
                max_version: read_u16(buffer, "max_version")?,
            });
        }
        Ok(ApiVersionResponse { api_versions })
    }
}
