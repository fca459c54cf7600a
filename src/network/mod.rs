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

//! Network Module
//!
//! Frame codec and the buffered read side of a client connection. The
//! protocol carries exactly one request and one response per connection.
//!
//! - `Connection`: accumulates bytes until a whole request frame is buffered
//! - `RequestFrame` / `ResponseFrame`: length-prefixed envelopes, both
//!   directions, so the client shares the codec with the broker

pub use connection::Connection;
pub use frame::{RequestFrame, ResponseFrame, FRAME_LENGTH_SIZE, SENTINEL_CORRELATION_ID};
mod connection;
mod frame;
