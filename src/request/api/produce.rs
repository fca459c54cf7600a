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
use tracing::{debug, instrument, trace, warn};

use crate::message::TopicPartition;
use crate::protocol::primary_types::{read_bytes, read_string, read_u32, write_bytes, write_string};
use crate::protocol::ProtocolCodec;
use crate::request::RequestContext;
use crate::{AppError, AppResult};

use super::ApiHandler;

/// `topic_len:u16 | topic | partition:u32 | message_len:u32 | message`
///
/// Bytes after the message are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    pub topic: String,
    pub partition: u32,
    pub message: Bytes,
}

impl ProduceRequest {
    pub fn new(topic: impl Into<String>, partition: u32, message: Bytes) -> ProduceRequest {
        ProduceRequest {
            topic: topic.into(),
            partition,
            message,
        }
    }
}

impl ProtocolCodec for ProduceRequest {
    fn encode(&self, buffer: &mut BytesMut) -> AppResult<()> {
        write_string(buffer, &self.topic, "topic")?;
        buffer.put_u32(self.partition);
        write_bytes(buffer, &self.message, "message")
    }

    fn decode(buffer: &mut Bytes) -> AppResult<Self> {
        let topic = read_string(buffer, "topic")?;
        let partition = read_u32(buffer, "partition")?;
        let message_len = read_u32(buffer, "message_len")? as usize;
        let message = read_bytes(buffer, message_len, "message")?;
        Ok(ProduceRequest {
            topic,
            partition,
            message,
        })
    }
}

/// The protocol's only in-band success/failure signal, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProduceResult {
    Success = 0x00,
    /// unknown topic or partition, or a message over the size limit
    Error = 0x01,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponse {
    pub result: ProduceResult,
}

impl ProduceResponse {
    pub fn success() -> Self {
        ProduceResponse {
            result: ProduceResult::Success,
        }
    }

    pub fn error() -> Self {
        ProduceResponse {
            result: ProduceResult::Error,
        }
    }
}

impl ProtocolCodec for ProduceResponse {
    fn encode(&self, buffer: &mut BytesMut) -> AppResult<()> {
        buffer.put_u8(self.result as u8);
        Ok(())
    }

    fn decode(buffer: &mut Bytes) -> AppResult<Self> {
        let code = read_bytes(buffer, 1, "result_code")?[0];
        let result = match code {
            0x00 => ProduceResult::Success,
            0x01 => ProduceResult::Error,
            other => {
                return Err(AppError::MalformedProtocol(format!(
                    "unknown produce result code: {:#04x}",
                    other
                )))
            }
        };
        Ok(ProduceResponse { result })
    }
}

pub struct ProduceRequestHandler;

impl ApiHandler for ProduceRequestHandler {
    type Request = ProduceRequest;
    type Response = ProduceResponse;

    #[instrument(
        name = "produce",
        skip_all,
        fields(topic = %request.topic, partition = request.partition)
    )]
    async fn handle_request(
        &self,
        request: ProduceRequest,
        context: &RequestContext,
    ) -> AppResult<ProduceResponse> {
        if !context
            .topic_registry
            .contains(&request.topic, request.partition)
        {
            debug!("produce to unknown topic partition rejected");
            return Ok(ProduceResponse::error());
        }
        if request.message.len() > context.max_msg_size {
            warn!(
                "message of {} bytes exceeds max_msg_size {}",
                request.message.len(),
                context.max_msg_size
            );
            return Ok(ProduceResponse::error());
        }

        let topic_partition = TopicPartition::new(request.topic, request.partition);
        let offset = context
            .log_manager
            .append(&topic_partition, request.message)
            .await?;
        trace!("produced record {} to {}", offset, topic_partition);
        Ok(ProduceResponse::success())
    }
}
