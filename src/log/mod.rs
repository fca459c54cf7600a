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

//! Log Store
//!
//! One append-only file per (topic, partition). Each file is a flat run of
//! `length:u32 | message` records with no header, checksum or index on disk;
//! the record index lives in memory and is rebuilt by scanning on open.

mod log_manager;
mod partition_log;

pub use log_manager::LogManager;
pub use partition_log::PartitionLog;
