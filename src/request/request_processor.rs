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

use bytes::{Bytes, BytesMut};
use tracing::{error, trace, warn};

use crate::network::ResponseFrame;
use crate::protocol::ProtocolCodec;
use crate::request::api::{
    ApiHandler, ApiVersionRequestHandler, FetchRequestHandler, MetadataRequestHandler,
    ProduceRequestHandler,
};
use crate::request::{ApiRequest, RequestContext};
use crate::AppResult;

/// general async handler
async fn execute_handler<H>(
    handler: H,
    request: H::Request,
    context: &RequestContext,
) -> AppResult<Bytes>
where
    H: ApiHandler + Sync,
{
    let response = handler.handle_request(request, context).await?;

    let mut buffer = BytesMut::new();
    response.encode(&mut buffer)?;
    Ok(buffer.freeze())
}

pub struct RequestProcessor;

impl RequestProcessor {
    /// Routes one request and always produces a response frame.
    ///
    /// Success echoes the request's correlation id; a fault is rendered by
    /// [`ResponseFrame::from_error`].
    pub async fn process_request(request_body: Bytes, context: &RequestContext) -> ResponseFrame {
        let correlation_id = context.request_header.correlation_id;
        match Self::dispatch(request_body, context).await {
            Ok(payload) => ResponseFrame::new(correlation_id, payload),
            Err(e) => {
                error!(
                    "request {:?} from {} failed: {}",
                    context.request_header, context.client_ip, e
                );
                ResponseFrame::from_error(&e)
            }
        }
    }

    /// Payload of the response, or the fault that prevented one. Unknown api
    /// keys are answered with an empty payload.
    pub async fn dispatch(mut request_body: Bytes, context: &RequestContext) -> AppResult<Bytes> {
        let header = &context.request_header;
        let Some(api_key) = header.api_key() else {
            warn!(
                "unsupported api key {} (version {}) from {}, answering empty payload",
                header.api_key, header.api_version, context.client_ip
            );
            return Ok(Bytes::new());
        };
        let request = ApiRequest::parse_from(api_key, &mut request_body)?;
        trace!(
            "Processing request: {:?} with request header {:?}",
            request,
            header
        );
        match request {
            ApiRequest::Produce(request) => {
                execute_handler(ProduceRequestHandler, request, context).await
            }
            ApiRequest::Fetch(request) => {
                execute_handler(FetchRequestHandler, request, context).await
            }
            ApiRequest::Metadata(request) => {
                execute_handler(MetadataRequestHandler, request, context).await
            }
            ApiRequest::ApiVersion(request) => {
                execute_handler(ApiVersionRequestHandler, request, context).await
            }
        }
    }
}
