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
use tracing::trace;

use crate::message::TopicMetadata;
use crate::protocol::primary_types::{read_string, read_u32, write_string};
use crate::protocol::ProtocolCodec;
use crate::request::RequestContext;
use crate::AppResult;

use super::handler::ApiHandler;

pub struct MetadataRequestHandler;

impl ApiHandler for MetadataRequestHandler {
    type Request = MetadataRequest;
    type Response = MetadataResponse;

    async fn handle_request(
        &self,
        _request: MetadataRequest,
        context: &RequestContext,
    ) -> AppResult<MetadataResponse> {
        let topics = context.topic_registry.snapshot();
        trace!("metadata request answered with {} topics", topics.len());
        Ok(MetadataResponse { topics })
    }
}

/// Always describes every topic; the payload is never inspected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MetadataRequest;

impl ProtocolCodec for MetadataRequest {
    fn encode(&self, _buffer: &mut BytesMut) -> AppResult<()> {
        Ok(())
    }

    fn decode(buffer: &mut Bytes) -> AppResult<Self> {
        buffer.advance(buffer.remaining());
        Ok(MetadataRequest)
    }
}

/// `topic_count:u32`, then per topic
/// `name_len:u16 | name | partition_count:u32 | partition_id:u32...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponse {
    pub topics: Vec<TopicMetadata>,
}

impl ProtocolCodec for MetadataResponse {
    fn encode(&self, buffer: &mut BytesMut) -> AppResult<()> {
        buffer.put_u32(self.topics.len() as u32);
        for topic in &self.topics {
            write_string(buffer, &topic.name, "topic")?;
            buffer.put_u32(topic.partitions.len() as u32);
            for partition in &topic.partitions {
                buffer.put_u32(*partition);
            }
        }
        Ok(())
    }

    fn decode(buffer: &mut Bytes) -> AppResult<Self> {
        let topic_count = read_u32(buffer, "topic_count")?;
        let mut topics = Vec::new();
        for _ in 0..topic_count {
            let name = read_string(buffer, "topic")?;
            let partition_count = read_u32(buffer, "partition_count")?;
            let mut partitions = Vec::new();
            for _ in 0..partition_count {
                partitions.push(read_u32(buffer, "partition")?);
            }
            topics.push(TopicMetadata { name, partitions });
        }
        Ok(MetadataResponse { topics })
    }
}
