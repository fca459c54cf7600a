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

use parking_lot::RwLock;
use tracing::info;

use crate::service::TopicConfig;
use crate::{AppError, AppResult};

use super::topic_partition::validate_topic_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub name: String,
    pub partitions: Vec<u32>,
}

/// Topic name to partition ids, kept in registration order.
///
/// Reads vastly outnumber registrations, so a plain `RwLock` over a
/// small vector is enough; lookups are a linear scan.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<Vec<TopicMetadata>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(topics: &[TopicConfig]) -> AppResult<Self> {
        let registry = TopicRegistry::new();
        for topic in topics {
            registry.register(&topic.name, topic.partitions.clone())?;
        }
        Ok(registry)
    }

    pub fn register(&self, name: &str, partitions: Vec<u32>) -> AppResult<()> {
        validate_topic_name(name)?;
        let mut sorted = partitions.clone();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(AppError::InvalidValue(format!(
                "topic {} lists a partition twice: {:?}",
                name, partitions
            )));
        }

        let mut topics = self.topics.write();
        if topics.iter().any(|t| t.name == name) {
            return Err(AppError::InvalidTopic(format!(
                "topic {} already registered",
                name
            )));
        }
        info!("register topic {} with partitions {:?}", name, partitions);
        topics.push(TopicMetadata {
            name: name.to_string(),
            partitions,
        });
        Ok(())
    }

    pub fn contains(&self, topic: &str, partition: u32) -> bool {
        self.topics
            .read()
            .iter()
            .any(|t| t.name == topic && t.partitions.contains(&partition))
    }

    pub fn snapshot(&self) -> Vec<TopicMetadata> {
        self.topics.read().clone()
    }

    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let registry = TopicRegistry::new();
        registry.register("zeta", vec![0]).unwrap();
        registry.register("alpha", vec![3, 1]).unwrap();
        registry.register("mid", vec![]).unwrap();

        let names: Vec<_> = registry.snapshot().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.snapshot()[1].partitions, vec![3, 1]);
    }

    #[test]
    fn membership() {
        let registry = TopicRegistry::from_config(&[TopicConfig {
            name: "test".to_string(),
            partitions: vec![0, 1],
        }])
        .unwrap();

        assert!(registry.contains("test", 0));
        assert!(registry.contains("test", 1));
        assert!(!registry.contains("test", 2));
        assert!(!registry.contains("ghost", 0));
    }

    #[test]
    fn rejects_duplicates_and_bad_names() {
        let registry = TopicRegistry::new();
        registry.register("test", vec![0]).unwrap();

        assert!(registry.register("test", vec![1]).is_err());
        assert!(registry.register("other", vec![2, 2]).is_err());
        assert!(registry.register("../x", vec![0]).is_err());
        assert_eq!(registry.len(), 1);
    }
}
