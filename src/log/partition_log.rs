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

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, trace, warn};

use crate::message::{put_record, MemoryRecords, TopicPartition};
use crate::{AppError, AppResult};

#[derive(Debug)]
enum LogOp {
    Append {
        message: Bytes,
        resp_tx: oneshot::Sender<AppResult<u64>>,
    },
    Flush(oneshot::Sender<AppResult<()>>),
}

/// Positions of complete records plus the committed file length.
///
/// Both move together under the write lock, so a reader that copies them
/// under the read lock always gets a length that ends on a record boundary.
#[derive(Debug, Default)]
struct RecordIndex {
    positions: Vec<u64>,
    committed_size: u64,
}

/// Write side of a partition file, only touched by the writer task.
trait LogFile {
    async fn write_record_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    async fn truncate(&mut self, len: u64) -> std::io::Result<()>;

    async fn sync(&mut self) -> std::io::Result<()>;
}

impl LogFile for File {
    async fn write_record_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.write_all(bytes).await?;
        // tokio only finishes the blocking write once flushed
        self.flush().await
    }

    async fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len).await
    }

    async fn sync(&mut self) -> std::io::Result<()> {
        self.sync_all().await
    }
}

/// Single writer of one partition file.
///
/// If a failed write cannot be rolled back, the file holds bytes the index
/// does not know about; the writer then refuses further appends until the
/// log is reopened and recovery cuts the torn tail.
struct LogWriter<F> {
    topic_partition: TopicPartition,
    file: F,
    buffer: BytesMut,
    index: Arc<RwLock<RecordIndex>>,
    size: Arc<AtomicU64>,
    failed: Option<String>,
}

impl<F: LogFile> LogWriter<F> {
    async fn run(mut self, mut rx: mpsc::Receiver<LogOp>) {
        while let Some(op) = rx.recv().await {
            match op {
                LogOp::Append { message, resp_tx } => {
                    let result = self.append(&message).await;
                    if let Err(error) = &result {
                        error!("append to {} failed: {:?}", self.topic_partition, error);
                    }
                    resp_tx.send(result).unwrap_or_else(|_| {
                        error!("append requester for {} is gone", self.topic_partition);
                    });
                }
                LogOp::Flush(resp_tx) => {
                    let result = self.file.sync().await.map_err(AppError::from);
                    resp_tx.send(result).unwrap_or_else(|_| {
                        error!("flush requester for {} is gone", self.topic_partition);
                    });
                }
            }
        }
        trace!("{} partition log writer exit", self.topic_partition);
    }

    async fn append(&mut self, message: &[u8]) -> AppResult<u64> {
        if let Some(reason) = &self.failed {
            return Err(AppError::IllegalStateError(format!(
                "partition log {} rejects appends after an unrecovered write failure: {}",
                self.topic_partition, reason
            )));
        }
        self.buffer.clear();
        put_record(&mut self.buffer, message)?;
        let position = self.size.load(Ordering::Acquire);

        if let Err(e) = self.file.write_record_bytes(&self.buffer[..]).await {
            // drop whatever part of the record reached the file
            if let Err(truncate_error) = self.file.truncate(position).await {
                error!(
                    "truncate {} back to {} after failed write error: {:?}",
                    self.topic_partition, position, truncate_error
                );
                self.failed = Some(format!("write: {}, truncate: {}", e, truncate_error));
            }
            return Err(e.into());
        }

        let end = position + self.buffer.len() as u64;
        let mut index = self.index.write();
        index.positions.push(position);
        index.committed_size = end;
        self.size.store(end, Ordering::Release);
        Ok(index.positions.len() as u64 - 1)
    }
}

/// Append-only message log of one partition, backed by a single file.
///
/// All writes go through one writer task fed by a channel, so concurrent
/// producers to the same partition are serialized without a lock around the
/// file. Readers open their own read-only handle and never read past the
/// committed length.
#[derive(Debug)]
pub struct PartitionLog {
    topic_partition: TopicPartition,
    file_path: PathBuf,
    tx: mpsc::Sender<LogOp>,
    index: Arc<RwLock<RecordIndex>>,
    // mirrors index.committed_size for lock-free size queries
    size: Arc<AtomicU64>,
}

impl PartitionLog {
    /// Opens or creates the log file. An existing file is scanned first and
    /// a torn trailing record, left by a crash in the middle of a write, is
    /// cut off.
    pub async fn open<P: AsRef<Path>>(
        topic_partition: TopicPartition,
        file_path: P,
        channel_capacity: usize,
    ) -> AppResult<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        let index = Self::recover(&topic_partition, &file_path).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await
            .map_err(|e| {
                AppError::DetailedIoError(format!(
                    "open file: {} error: {} while open partition log",
                    file_path.to_string_lossy(),
                    e
                ))
            })?;

        let size = Arc::new(AtomicU64::new(index.committed_size));
        let index = Arc::new(RwLock::new(index));
        let (tx, rx) = mpsc::channel(channel_capacity);

        let log = PartitionLog {
            topic_partition,
            file_path,
            tx,
            index,
            size,
        };
        log.start_writer_task(file, rx);
        Ok(log)
    }

    async fn recover(topic_partition: &TopicPartition, file_path: &Path) -> AppResult<RecordIndex> {
        let content = match tokio::fs::read(file_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RecordIndex::default()),
            Err(e) => return Err(e.into()),
        };
        let scan = MemoryRecords::scan(&content);
        if scan.valid_len < content.len() {
            warn!(
                "partition log {} has {} torn bytes after offset {}, truncating",
                topic_partition,
                content.len() - scan.valid_len,
                scan.valid_len
            );
            let file = OpenOptions::new().write(true).open(file_path).await?;
            file.set_len(scan.valid_len as u64).await?;
            file.sync_all().await?;
        }
        trace!(
            "recovered partition log {} with {} records",
            topic_partition,
            scan.positions.len()
        );
        Ok(RecordIndex {
            positions: scan.positions,
            committed_size: scan.valid_len as u64,
        })
    }

    fn start_writer_task(&self, file: File, rx: mpsc::Receiver<LogOp>) {
        let writer = LogWriter {
            topic_partition: self.topic_partition.clone(),
            file,
            buffer: BytesMut::with_capacity(4 * 1024),
            index: self.index.clone(),
            size: self.size.clone(),
            failed: None,
        };
        tokio::spawn(writer.run(rx));
    }

    /// Appends one message and returns its record number (0-based).
    pub async fn append(&self, message: Bytes) -> AppResult<u64> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(LogOp::Append { message, resp_tx })
            .await
            .map_err(|e| AppError::ChannelSendError(e.to_string()))?;
        resp_rx.await?
    }

    /// fsync of everything appended so far
    pub async fn flush(&self) -> AppResult<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(LogOp::Flush(resp_tx))
            .await
            .map_err(|e| AppError::ChannelSendError(e.to_string()))?;
        resp_rx.await?
    }

    pub async fn read_all(&self) -> AppResult<MemoryRecords> {
        self.read_from(0).await
    }

    /// Every complete record starting at record number `start`.
    pub async fn read_from(&self, start: u64) -> AppResult<MemoryRecords> {
        let (start_position, end_position) = {
            let index = self.index.read();
            match index.positions.get(start as usize) {
                Some(position) => (*position, index.committed_size),
                None => return Ok(MemoryRecords::empty()),
            }
        };

        let mut file = File::open(&self.file_path).await.map_err(|e| {
            AppError::DetailedIoError(format!(
                "open file: {} error: {} while read partition log",
                self.file_path.to_string_lossy(),
                e
            ))
        })?;
        file.seek(SeekFrom::Start(start_position)).await?;

        let len = (end_position - start_position) as usize;
        let mut buffer = BytesMut::zeroed(len);
        file.read_exact(&mut buffer).await?;

        let scan = MemoryRecords::scan(&buffer);
        if scan.valid_len != len {
            return Err(AppError::CorruptMessage(format!(
                "partition log {} has an incomplete record inside the committed range",
                self.topic_partition
            )));
        }
        Ok(MemoryRecords::new(buffer.freeze()))
    }

    pub fn record_count(&self) -> u64 {
        self.index.read().positions.len() as u64
    }

    /// committed bytes on disk
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn topic_partition(&self) -> &TopicPartition {
        &self.topic_partition
    }
}
