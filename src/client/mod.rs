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

//! Client side of the protocol.
//!
//! The broker serves one request per TCP connection, so every call opens a
//! fresh connection, writes one frame and reads one response frame.

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};
use tracing::trace;

use crate::message::{MemoryRecords, TopicMetadata};
use crate::network::{RequestFrame, ResponseFrame, SENTINEL_CORRELATION_ID};
use crate::protocol::{ApiKey, ProtocolCodec};
use crate::request::{
    ApiVersionRange, ApiVersionRequest, ApiVersionResponse, FetchRequest, FetchResponse,
    MetadataRequest, MetadataResponse, ProduceRequest, ProduceResponse, ProduceResult,
    RequestHeader,
};
use crate::{AppError, AppResult};

/// api version sent in every request header
const CLIENT_API_VERSION: u16 = 0;
const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub struct BrokerClient {
    address: String,
    next_correlation_id: AtomicU32,
    max_frame_length: usize,
}

impl BrokerClient {
    pub fn new(address: impl Into<String>) -> Self {
        BrokerClient {
            address: address.into(),
            next_correlation_id: AtomicU32::new(1),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends one request and returns the raw response frame, whatever its
    /// correlation id.
    pub async fn send_raw(
        &self,
        api_key: u16,
        api_version: u16,
        payload: Bytes,
    ) -> AppResult<ResponseFrame> {
        let header = RequestHeader::new(api_key, api_version, self.next_correlation_id());
        self.exchange(RequestFrame::new(header, payload)).await
    }

    fn next_correlation_id(&self) -> u32 {
        self.next_correlation_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn exchange(&self, frame: RequestFrame) -> AppResult<ResponseFrame> {
        let mut buffer = BytesMut::new();
        frame.encode(&mut buffer)?;

        let mut stream = TcpStream::connect(&self.address).await?;
        stream.write_all(&buffer).await?;
        stream.flush().await?;

        let codec = LengthDelimitedCodec::builder()
            .length_field_length(4)
            .max_frame_length(self.max_frame_length)
            .new_codec();
        let mut frames = FramedRead::new(stream, codec);
        let body = frames.next().await.ok_or_else(|| {
            AppError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "broker closed the connection without a response",
            ))
        })??;
        let response = ResponseFrame::decode(body.freeze())?;
        trace!(
            "request {} answered with correlation id {} and {} payload bytes",
            frame.request_header.correlation_id,
            response.correlation_id,
            response.payload.len()
        );
        Ok(response)
    }

    /// Sends a typed request, checks the correlation id and decodes the
    /// typed response. A sentinel error frame becomes an `Err`.
    async fn call<Req, Resp>(&self, api_key: ApiKey, request: &Req) -> AppResult<Resp>
    where
        Req: ProtocolCodec,
        Resp: ProtocolCodec,
    {
        let mut payload = BytesMut::new();
        request.encode(&mut payload)?;
        let expected = self.next_correlation_id();
        let header = RequestHeader::new(api_key.as_u16(), CLIENT_API_VERSION, expected);
        let response = self
            .exchange(RequestFrame::new(header, payload.freeze()))
            .await?;

        if response.correlation_id != expected {
            if response.correlation_id == SENTINEL_CORRELATION_ID {
                return Err(AppError::IllegalStateError(format!(
                    "broker failed the request: {}",
                    String::from_utf8_lossy(&response.payload)
                )));
            }
            return Err(AppError::MalformedProtocol(format!(
                "expected correlation id {}, got {}",
                expected, response.correlation_id
            )));
        }
        let mut payload = response.payload;
        Resp::decode(&mut payload)
    }

    pub async fn api_versions(&self) -> AppResult<Vec<ApiVersionRange>> {
        let response: ApiVersionResponse =
            self.call(ApiKey::ApiVersions, &ApiVersionRequest).await?;
        Ok(response.api_versions)
    }

    pub async fn metadata(&self) -> AppResult<Vec<TopicMetadata>> {
        let response: MetadataResponse = self.call(ApiKey::Metadata, &MetadataRequest).await?;
        Ok(response.topics)
    }

    pub async fn produce(
        &self,
        topic: &str,
        partition: u32,
        message: impl Into<Bytes>,
    ) -> AppResult<ProduceResult> {
        let request = ProduceRequest::new(topic, partition, message.into());
        let response: ProduceResponse = self.call(ApiKey::Produce, &request).await?;
        Ok(response.result)
    }

    /// Every message of the partition, from the first one.
    pub async fn fetch(&self, topic: &str, partition: u32) -> AppResult<MemoryRecords> {
        let request = FetchRequest::new(topic, partition);
        let response: FetchResponse = self.call(ApiKey::Fetch, &request).await?;
        Ok(response.records)
    }
}
