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

use crate::request::RequestHeader;
use crate::AppError::Incomplete;
use crate::{AppError, AppResult};

/// Bytes of the big-endian length in front of every frame.
pub const FRAME_LENGTH_SIZE: usize = 4;

/// Correlation id carried by responses rendered from a failure, since the
/// request's own id may never have been decoded.
pub const SENTINEL_CORRELATION_ID: u32 = 500;

/// `length:u32 | api_key:u16 | api_version:u16 | correlation_id:u32 | payload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub request_header: RequestHeader,
    pub request_body: Bytes,
}

impl RequestFrame {
    pub fn new(request_header: RequestHeader, request_body: Bytes) -> Self {
        RequestFrame {
            request_header,
            request_body,
        }
    }

    /// Checks whether `buffer` holds a whole frame, reserving room for the
    /// rest of the body when it does not.
    pub fn check(buffer: &mut BytesMut, max_package_size: usize) -> AppResult<()> {
        if buffer.remaining() < FRAME_LENGTH_SIZE {
            return Err(Incomplete);
        }
        let body_size = (&buffer[..FRAME_LENGTH_SIZE]).get_u32() as usize;
        if body_size > max_package_size {
            return Err(AppError::MalformedProtocol(format!(
                "Frame of length {} is too large.",
                body_size
            )));
        }
        if body_size < RequestHeader::SIZE {
            return Err(AppError::MalformedProtocol(format!(
                "frame of length {} cannot hold the {} byte request header",
                body_size,
                RequestHeader::SIZE
            )));
        }
        if buffer.remaining() < body_size + FRAME_LENGTH_SIZE {
            buffer.reserve(body_size + FRAME_LENGTH_SIZE - buffer.remaining());
            return Err(Incomplete);
        }
        Ok(())
    }

    /// `Ok(None)` until a whole frame is buffered; the frame bytes are split
    /// off the buffer on success.
    pub fn parse(buffer: &mut BytesMut, max_package_size: usize) -> AppResult<Option<RequestFrame>> {
        match RequestFrame::check(buffer, max_package_size) {
            Ok(_) => {
                let body_length = buffer.get_u32() as usize;
                let mut body = buffer.split_to(body_length).freeze();
                let request_header = RequestHeader::read_from(&mut body)?;
                Ok(Some(RequestFrame {
                    request_header,
                    request_body: body,
                }))
            }
            Err(Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Client side: writes the length-prefixed frame.
    pub fn encode(&self, buffer: &mut BytesMut) -> AppResult<()> {
        let body_size = encoded_length(RequestHeader::SIZE + self.request_body.len())?;
        buffer.reserve(FRAME_LENGTH_SIZE + body_size as usize);
        buffer.put_u32(body_size);
        self.request_header.write_to(buffer);
        buffer.put_slice(&self.request_body);
        Ok(())
    }
}

/// `length:u32 | correlation_id:u32 | payload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub correlation_id: u32,
    pub payload: Bytes,
}

impl ResponseFrame {
    pub fn new(correlation_id: u32, payload: Bytes) -> Self {
        ResponseFrame {
            correlation_id,
            payload,
        }
    }

    /// Renders a failed request: sentinel correlation id, the error text as
    /// a diagnostic payload.
    pub fn from_error(error: &AppError) -> Self {
        ResponseFrame {
            correlation_id: SENTINEL_CORRELATION_ID,
            payload: Bytes::from(error.to_string()),
        }
    }

    pub fn encode(&self, buffer: &mut BytesMut) -> AppResult<()> {
        let body_size = encoded_length(4 + self.payload.len())?;
        buffer.reserve(FRAME_LENGTH_SIZE + body_size as usize);
        buffer.put_u32(body_size);
        buffer.put_u32(self.correlation_id);
        buffer.put_slice(&self.payload);
        Ok(())
    }

    /// Client side: `body` is the frame without its length prefix.
    pub fn decode(mut body: Bytes) -> AppResult<Self> {
        if body.remaining() < 4 {
            return Err(AppError::MalformedProtocol(format!(
                "response of length {} has no correlation id",
                body.remaining()
            )));
        }
        let correlation_id = body.get_u32();
        Ok(ResponseFrame {
            correlation_id,
            payload: body,
        })
    }
}

fn encoded_length(len: usize) -> AppResult<u32> {
    u32::try_from(len).map_err(|_| {
        AppError::InvalidValue(format!("frame body of {} bytes exceeds u32 length", len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    fn sample_frame() -> RequestFrame {
        RequestFrame::new(
            RequestHeader::new(1, 1, 42),
            Bytes::from_static(&[0, 4, b't', b'e', b's', b't', 0, 0, 0, 0]),
        )
    }

    #[test]
    fn request_round_trip() {
        let frame = sample_frame();
        let mut buffer = BytesMut::new();
        frame.encode(&mut buffer).unwrap();
        assert_eq!(&buffer[..4], &[0, 0, 0, 18]);
        assert_eq!(&buffer[4..12], &[0, 1, 0, 1, 0, 0, 0, 42]);

        let parsed = RequestFrame::parse(&mut buffer, MAX).unwrap().unwrap();
        assert_eq!(parsed, frame);
        assert!(buffer.is_empty());
    }

    #[test]
    fn partial_frames_wait_for_more() {
        let mut encoded = BytesMut::new();
        sample_frame().encode(&mut encoded).unwrap();

        for cut in [0, 2, 4, 11, encoded.len() - 1] {
            let mut buffer = BytesMut::from(&encoded[..cut]);
            assert!(RequestFrame::parse(&mut buffer, MAX).unwrap().is_none());
            assert_eq!(buffer.len(), cut);
        }
    }

    #[test]
    fn leaves_following_bytes_in_buffer() {
        let mut buffer = BytesMut::new();
        sample_frame().encode(&mut buffer).unwrap();
        buffer.put_slice(&[0, 0]);

        RequestFrame::parse(&mut buffer, MAX).unwrap().unwrap();
        assert_eq!(&buffer[..], &[0, 0]);
    }

    #[test]
    fn oversized_and_headerless_frames_are_rejected() {
        let mut buffer = BytesMut::from(&[0u8, 0, 4, 1][..]);
        assert!(matches!(
            RequestFrame::parse(&mut buffer, MAX),
            Err(AppError::MalformedProtocol(_))
        ));

        let mut buffer = BytesMut::from(&[0u8, 0, 0, 3, 0, 18, 0][..]);
        assert!(matches!(
            RequestFrame::parse(&mut buffer, MAX),
            Err(AppError::MalformedProtocol(_))
        ));
    }

    #[test]
    fn response_layout() {
        let response = ResponseFrame::new(7, Bytes::from_static(&[0]));
        let mut buffer = BytesMut::new();
        response.encode(&mut buffer).unwrap();
        assert_eq!(&buffer[..], &[0, 0, 0, 5, 0, 0, 0, 7, 0]);

        let decoded = ResponseFrame::decode(buffer.freeze().slice(4..)).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn error_rendering_uses_sentinel() {
        let response = ResponseFrame::from_error(&AppError::MalformedProtocol("bad".into()));
        assert_eq!(response.correlation_id, SENTINEL_CORRELATION_ID);
        assert_eq!(response.payload, Bytes::from("malformed protocol: bad"));
    }
}
