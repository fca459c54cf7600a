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

pub mod client;
mod log;
pub mod message;
pub mod network;
pub mod protocol;
pub mod request;
mod service;

pub use client::BrokerClient;
pub use log::{LogManager, PartitionLog};
pub use message::{MemoryRecords, TopicMetadata, TopicPartition, TopicRegistry};
pub use service::{
    setup_local_tracing, setup_tracing, AppError, AppResult, Broker, BrokerConfig, GeneralConfig,
    LogConfig, NetworkConfig, RequestHandlerPool, Shutdown, TopicConfig, TracingGuard,
    ENV_PREFIX,
};
