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

//! Owns the data directory and every open [`PartitionLog`].
//!
//! Partition logs are opened lazily: the first Produce to a partition
//! creates its file, and a Fetch opens an existing file it has not seen yet.
//! Files left by an earlier run are loaded eagerly by [`LogManager::load_logs`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::message::{validate_topic_name, MemoryRecords, TopicPartition};
use crate::{AppError, AppResult};

use super::PartitionLog;

const LOG_FILE_SUFFIX: &str = ".log";

#[derive(Debug)]
pub struct LogManager {
    data_dir: PathBuf,
    writer_channel_capacity: usize,
    logs: DashMap<TopicPartition, Arc<PartitionLog>>,
    // serializes the slow path that opens a file, so a partition gets one writer
    open_lock: Mutex<()>,
}

impl LogManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, writer_channel_capacity: usize) -> AppResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            AppError::DetailedIoError(format!(
                "create data dir: {} error: {}",
                data_dir.to_string_lossy(),
                e
            ))
        })?;
        Ok(LogManager {
            data_dir,
            writer_channel_capacity,
            logs: DashMap::new(),
            open_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Opens every `<topic>_<partition>.log` in the data directory, running
    /// torn-tail recovery on each. Unrecognized files are skipped.
    pub async fn load_logs(&self) -> AppResult<usize> {
        info!("load partition logs from {}", self.data_dir.to_string_lossy());
        let mut loaded = 0;
        let mut dir = tokio::fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            match Self::parse_log_file_name(&file_name) {
                Some(topic_partition) => {
                    debug!("load partition log {}", topic_partition);
                    self.get_or_open(&topic_partition, true).await?;
                    loaded += 1;
                }
                None => warn!("skip unrecognized file in data dir: {}", file_name),
            }
        }
        info!("load {} partition logs finished", loaded);
        Ok(loaded)
    }

    fn parse_log_file_name(file_name: &str) -> Option<TopicPartition> {
        let stem = file_name.strip_suffix(LOG_FILE_SUFFIX)?;
        let (topic, raw_partition) = stem.rsplit_once('_')?;
        let partition: u32 = raw_partition.parse().ok()?;
        // `+0` or `05` would map onto another partition's file
        if partition.to_string() != raw_partition {
            return None;
        }
        validate_topic_name(topic).ok()?;
        Some(TopicPartition::new(topic, partition))
    }

    fn log_path(&self, topic_partition: &TopicPartition) -> PathBuf {
        self.data_dir.join(topic_partition.log_file_name())
    }

    async fn get_or_open(
        &self,
        topic_partition: &TopicPartition,
        create: bool,
    ) -> AppResult<Option<Arc<PartitionLog>>> {
        if let Some(log) = self.logs.get(topic_partition) {
            return Ok(Some(log.value().clone()));
        }

        let _guard = self.open_lock.lock().await;
        if let Some(log) = self.logs.get(topic_partition) {
            return Ok(Some(log.value().clone()));
        }
        let path = self.log_path(topic_partition);
        if !create && !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let log = Arc::new(
            PartitionLog::open(topic_partition.clone(), &path, self.writer_channel_capacity)
                .await?,
        );
        self.logs.insert(topic_partition.clone(), log.clone());
        debug!(
            "open partition log {} at {}",
            topic_partition,
            path.to_string_lossy()
        );
        Ok(Some(log))
    }

    /// Appends to the partition, creating its file on first use.
    pub async fn append(&self, topic_partition: &TopicPartition, message: Bytes) -> AppResult<u64> {
        validate_topic_name(&topic_partition.topic)?;
        let log = self
            .get_or_open(topic_partition, true)
            .await?
            .ok_or_else(|| {
                AppError::IllegalStateError(format!("partition log {} not created", topic_partition))
            })?;
        let offset = log.append(message).await?;
        trace!("appended record {} to {}", offset, topic_partition);
        Ok(offset)
    }

    /// The whole partition history. A partition without a file, or a topic
    /// name that could not name a file, reads as empty.
    pub async fn read_all(&self, topic_partition: &TopicPartition) -> AppResult<MemoryRecords> {
        self.read_from(topic_partition, 0).await
    }

    pub async fn read_from(
        &self,
        topic_partition: &TopicPartition,
        start: u64,
    ) -> AppResult<MemoryRecords> {
        if let Err(e) = validate_topic_name(&topic_partition.topic) {
            debug!("read of unusable topic name answered empty: {}", e);
            return Ok(MemoryRecords::empty());
        }
        match self.get_or_open(topic_partition, false).await? {
            Some(log) => log.read_from(start).await,
            None => Ok(MemoryRecords::empty()),
        }
    }

    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    /// fsync of every open partition, used at shutdown
    pub async fn flush_all(&self) -> AppResult<()> {
        let logs: Vec<Arc<PartitionLog>> =
            self.logs.iter().map(|entry| entry.value().clone()).collect();
        for log in logs {
            log.flush().await?;
            trace!("flushed partition log {}", log.topic_partition());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn creates_file_lazily() {
        let dir = tempdir().unwrap();
        let manager = LogManager::new(dir.path(), 16).unwrap();
        let tp = TopicPartition::new("test", 0);

        assert!(manager.read_all(&tp).await.unwrap().is_empty());
        assert!(!dir.path().join("test_0.log").exists());
        assert_eq!(manager.log_count(), 0);

        manager.append(&tp, Bytes::from_static(b"abc")).await.unwrap();
        assert!(dir.path().join("test_0.log").exists());
        assert_eq!(
            &manager.read_all(&tp).await.unwrap().as_bytes()[..],
            &[0, 0, 0, 3, b'a', b'b', b'c']
        );
    }

    #[tokio::test]
    async fn partitions_are_independent() {
        let dir = tempdir().unwrap();
        let manager = LogManager::new(dir.path(), 16).unwrap();
        let p0 = TopicPartition::new("test", 0);
        let p1 = TopicPartition::new("test", 1);

        manager.append(&p0, Bytes::from_static(b"zero")).await.unwrap();
        manager.append(&p1, Bytes::from_static(b"one")).await.unwrap();
        manager.append(&p0, Bytes::from_static(b"zero again")).await.unwrap();

        assert_eq!(manager.read_all(&p0).await.unwrap().messages().unwrap().len(), 2);
        assert_eq!(manager.read_all(&p1).await.unwrap().messages().unwrap().len(), 1);
        manager.flush_all().await.unwrap();
    }

    #[tokio::test]
    async fn unsafe_topic_names_never_touch_disk() {
        let dir = tempdir().unwrap();
        let manager = LogManager::new(dir.path().join("data"), 16).unwrap();
        std::fs::write(dir.path().join("secret_0.log"), [0, 0, 0, 1, b's']).unwrap();

        let escape = TopicPartition::new("../secret", 0);
        assert!(manager.read_all(&escape).await.unwrap().is_empty());
        let result = manager.append(&escape, Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(AppError::InvalidTopic(_))));
    }

    #[tokio::test]
    async fn load_logs_picks_up_previous_run() {
        let dir = tempdir().unwrap();
        {
            let manager = LogManager::new(dir.path(), 16).unwrap();
            manager
                .append(&TopicPartition::new("test", 1), Bytes::from_static(b"old"))
                .await
                .unwrap();
            manager.flush_all().await.unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let manager = LogManager::new(dir.path(), 16).unwrap();
        assert_eq!(manager.load_logs().await.unwrap(), 1);
        let messages = manager
            .read_all(&TopicPartition::new("test", 1))
            .await
            .unwrap()
            .messages()
            .unwrap();
        assert_eq!(messages, vec![Bytes::from_static(b"old")]);
    }

    #[tokio::test]
    async fn load_logs_ignores_non_canonical_partition_names() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("test_+0.log"), [0, 0, 0, 1, b'x']).unwrap();

        let manager = LogManager::new(dir.path(), 16).unwrap();
        assert_eq!(manager.load_logs().await.unwrap(), 0);
        assert!(!dir.path().join("test_0.log").exists());
        assert!(manager
            .read_all(&TopicPartition::new("test", 0))
            .await
            .unwrap()
            .is_empty());
    }

    #[rstest]
    #[case("test_0.log", Some(("test", 0)))]
    #[case("my_topic_12.log", Some(("my_topic", 12)))]
    #[case("test_x.log", None)]
    #[case("test_+0.log", None)]
    #[case("test_05.log", None)]
    #[case("test_-1.log", None)]
    #[case("test_0.idx", None)]
    #[case("nounderscore.log", None)]
    fn log_file_names(#[case] file_name: &str, #[case] expected: Option<(&str, u32)>) {
        let parsed = LogManager::parse_log_file_name(file_name);
        assert_eq!(
            parsed,
            expected.map(|(topic, partition)| TopicPartition::new(topic, partition))
        );
    }
}
