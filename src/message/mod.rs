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

//! Message-level vocabulary: partition identity, the topic registry and
//! length-prefixed record runs.

mod memory_records;
mod topic_partition;
mod topic_registry;

pub use memory_records::{put_record, MemoryRecords, RecordIter, RecordScan, RECORD_LENGTH_SIZE};
pub use topic_partition::{validate_topic_name, TopicPartition, MAX_TOPIC_NAME_LEN};
pub use topic_registry::{TopicMetadata, TopicRegistry};
