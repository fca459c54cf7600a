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

use std::fmt::{Display, Formatter};

use crate::{AppError, AppResult};

/// Longest topic name accepted, same limit kafka uses.
pub const MAX_TOPIC_NAME_LEN: usize = 249;

/// Rejects names that cannot safely become part of a file name.
pub fn validate_topic_name(name: &str) -> AppResult<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::InvalidTopic(format!("illegal topic name: {:?}", name)));
    }
    if name.len() > MAX_TOPIC_NAME_LEN {
        return Err(AppError::InvalidTopic(format!(
            "topic name is {} bytes, longer than {}",
            name.len(),
            MAX_TOPIC_NAME_LEN
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '_' || *c == '-'))
    {
        return Err(AppError::InvalidTopic(format!(
            "topic name {:?} contains illegal character {:?}",
            name, c
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: u32,
}

impl Display for TopicPartition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    /// `<topic>_<partition>.log`, only meaningful for validated topic names
    pub fn log_file_name(&self) -> String {
        format!("{}_{}.log", self.topic, self.partition)
    }
}
