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

use std::sync::Arc;

use crate::log::LogManager;
use crate::message::TopicRegistry;

use super::request_header::RequestHeader;

/// Everything a handler may touch while serving one request.
#[derive(Debug)]
pub struct RequestContext {
    pub client_ip: String,
    pub request_header: RequestHeader,
    pub log_manager: Arc<LogManager>,
    pub topic_registry: Arc<TopicRegistry>,
    pub max_msg_size: usize,
}

impl RequestContext {
    pub fn new(
        client_ip: String,
        request_header: RequestHeader,
        log_manager: Arc<LogManager>,
        topic_registry: Arc<TopicRegistry>,
        max_msg_size: usize,
    ) -> Self {
        RequestContext {
            client_ip,
            request_header,
            log_manager,
            topic_registry,
            max_msg_size,
        }
    }
}
