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

//! Request Router and API handlers.

pub mod api;
mod request_context;
mod request_header;
mod request_processor;

pub use request_context::RequestContext;
pub use request_header::RequestHeader;
pub use request_processor::RequestProcessor;

pub use api::{
    ApiVersionRange, ApiVersionRequest, ApiVersionResponse, FetchRequest, FetchResponse,
    MetadataRequest, MetadataResponse, ProduceRequest, ProduceResponse, ProduceResult,
};

use bytes::Bytes;

use crate::protocol::{ApiKey, ProtocolCodec};
use crate::AppResult;

#[derive(Debug)]
pub enum ApiRequest {
    Produce(ProduceRequest),
    Fetch(FetchRequest),
    Metadata(MetadataRequest),
    ApiVersion(ApiVersionRequest),
}

impl ApiRequest {
    /// Decodes the payload of a supported api.
    pub fn parse_from(api_key: ApiKey, body: &mut Bytes) -> AppResult<ApiRequest> {
        let request = match api_key {
            ApiKey::Produce => ApiRequest::Produce(ProduceRequest::decode(body)?),
            ApiKey::Fetch => ApiRequest::Fetch(FetchRequest::decode(body)?),
            ApiKey::Metadata => ApiRequest::Metadata(MetadataRequest::decode(body)?),
            ApiKey::ApiVersions => ApiRequest::ApiVersion(ApiVersionRequest::decode(body)?),
        };
        Ok(request)
    }
}
