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

use std::io::{self, ErrorKind};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::tcp::OwnedReadHalf;

use crate::network::RequestFrame;
use crate::AppResult;

/// Read side of a client connection.
///
/// Bytes are accumulated in `buffer` until a whole [`RequestFrame`] is
/// available, so a length or body split across several TCP reads is fine.
#[derive(Debug)]
pub struct Connection<R = OwnedReadHalf> {
    reader: R,
    buffer: BytesMut,
    max_package_size: usize,
    pub client_ip: String,
}

impl<R: AsyncRead + Unpin> Connection<R> {
    pub fn new(reader: R, buffer_size: usize, max_package_size: usize, client_ip: String) -> Self {
        Connection {
            reader,
            buffer: BytesMut::with_capacity(buffer_size),
            max_package_size,
            client_ip,
        }
    }

    /// Reads one `RequestFrame` from the connection.
    ///
    /// A format error or an oversized frame is returned as an error and the
    /// connection should be closed. If the client closes the connection
    /// gracefully before sending anything, `None` is returned; closing it in
    /// the middle of a frame is a `ConnectionReset` error.
    pub async fn read_frame(&mut self) -> AppResult<Option<RequestFrame>> {
        loop {
            if let Some(frame) = RequestFrame::parse(&mut self.buffer, self.max_package_size)? {
                return Ok(Some(frame));
            }
            if 0 == self.reader.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(
                        io::Error::new(ErrorKind::ConnectionReset, "connection reset by peer")
                            .into(),
                    )
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::request::RequestHeader;
    use crate::AppError;

    fn encoded_frame() -> Vec<u8> {
        let frame = RequestFrame::new(RequestHeader::new(18, 0, 9), Bytes::new());
        let mut buffer = BytesMut::new();
        frame.encode(&mut buffer).unwrap();
        buffer.to_vec()
    }

    #[tokio::test]
    async fn reads_frame_split_across_writes() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut connection = Connection::new(server, 16, 1024, "test".to_string());

        let bytes = encoded_frame();
        tokio::spawn(async move {
            for chunk in bytes.chunks(3) {
                client.write_all(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let frame = connection.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.request_header, RequestHeader::new(18, 0, 9));
        assert!(frame.request_body.is_empty());
    }

    #[tokio::test]
    async fn clean_close_is_end_of_stream() {
        let mut connection = Connection::new(&b""[..], 16, 1024, "test".to_string());
        assert!(connection.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_mid_frame_is_an_error() {
        let bytes = encoded_frame();
        let mut connection = Connection::new(&bytes[..6], 16, 1024, "test".to_string());
        match connection.read_frame().await {
            Err(AppError::IoError(e)) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
