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

use crate::message::{MemoryRecords, TopicPartition};
use crate::protocol::primary_types::{read_string, read_u32, write_string};
use crate::protocol::ProtocolCodec;
use crate::request::RequestContext;
use crate::AppResult;

use super::ApiHandler;

/// `topic_len:u16 | topic | partition:u32`
///
/// There is no offset or size limit: a fetch always returns the partition
/// from its first record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub topic: String,
    pub partition: u32,
}

impl FetchRequest {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        FetchRequest {
            topic: topic.into(),
            partition,
        }
    }
}

impl ProtocolCodec for FetchRequest {
    fn encode(&self, buffer: &mut BytesMut) -> AppResult<()> {
        write_string(buffer, &self.topic, "topic")?;
        buffer.put_u32(self.partition);
        Ok(())
    }

    fn decode(buffer: &mut Bytes) -> AppResult<Self> {
        let topic = read_string(buffer, "topic")?;
        let partition = read_u32(buffer, "partition")?;
        Ok(FetchRequest { topic, partition })
    }
}

/// The raw record run of the partition, empty when nothing was ever written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub records: MemoryRecords,
}

impl ProtocolCodec for FetchResponse {
    fn encode(&self, buffer: &mut BytesMut) -> AppResult<()> {
        buffer.put_slice(self.records.as_bytes());
        Ok(())
    }

    fn decode(buffer: &mut Bytes) -> AppResult<Self> {
        let records = MemoryRecords::new(buffer.split_to(buffer.remaining()));
        Ok(FetchResponse { records })
    }
}

pub struct FetchRequestHandler;

impl ApiHandler for FetchRequestHandler {
    type Request = FetchRequest;
    type Response = FetchResponse;

    /// No registry check: an unknown topic or partition has no file and
    /// reads as empty, same as a registered partition nobody produced to.
    async fn handle_request(
        &self,
        request: FetchRequest,
        context: &RequestContext,
    ) -> AppResult<FetchResponse> {
        let topic_partition = TopicPartition::new(request.topic, request.partition);
        let records = context.log_manager.read_all(&topic_partition).await?;
        trace!(
            "fetch {} returns {} bytes",
            topic_partition,
            records.size()
        );
        Ok(FetchResponse { records })
    }
}
