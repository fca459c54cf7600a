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

//! Wire vocabulary shared by the broker and the client.
//!
//! All integers are unsigned, fixed width and big-endian.

mod api_key;
pub mod primary_types;

pub use api_key::{ApiKey, MAX_API_VERSION, MIN_API_VERSION};

use bytes::{Bytes, BytesMut};

use crate::AppResult;

/// Payload-level codec implemented by every request and response body.
///
/// Envelope fields (length, api key, correlation id) are handled by the
/// frame layer; implementors only see the payload bytes.
pub trait ProtocolCodec: Sized {
    fn encode(&self, buffer: &mut BytesMut) -> AppResult<()>;

    fn decode(buffer: &mut Bytes) -> AppResult<Self>;
}
