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

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use pebblemq::network::{RequestFrame, ResponseFrame, SENTINEL_CORRELATION_ID};
use pebblemq::protocol::{ApiKey, ProtocolCodec};
use pebblemq::request::{ProduceRequest, ProduceResult, RequestHeader};
use pebblemq::{AppResult, Broker, BrokerClient, BrokerConfig, TopicConfig};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestBroker {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<AppResult<()>>,
}

impl TestBroker {
    async fn start(data_dir: &Path, topics: Vec<TopicConfig>) -> TestBroker {
        Self::start_with(data_dir, |config| config.topics = topics).await
    }

    async fn start_with(data_dir: &Path, configure: impl FnOnce(&mut BrokerConfig)) -> TestBroker {
        let mut config = BrokerConfig::default();
        config.general.data_dir = data_dir.to_string_lossy().into_owned();
        config.general.max_msg_size = 1024;
        config.request_handler_pool.num_channels = 2;
        configure(&mut config);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let broker = Broker::new(config);
        let handle = tokio::spawn(async move {
            broker
                .serve(listener, async {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        TestBroker {
            addr,
            shutdown_tx,
            handle,
        }
    }

    fn client(&self) -> BrokerClient {
        BrokerClient::new(self.addr.to_string())
    }

    async fn stop(self) {
        self.shutdown_tx.send(()).unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

fn test_topic() -> Vec<TopicConfig> {
    vec![TopicConfig {
        name: "test".to_string(),
        partitions: vec![0, 1],
    }]
}

fn messages(records: &pebblemq::MemoryRecords) -> Vec<Vec<u8>> {
    records.iter().map(|m| m.unwrap().to_vec()).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn produce_then_fetch() {
    let data_dir = TempDir::new().unwrap();
    let broker = TestBroker::start(data_dir.path(), test_topic()).await;
    let client = broker.client();

    let result = client.produce("test", 0, "abc").await.unwrap();
    assert_eq!(result, ProduceResult::Success);

    let records = client.fetch("test", 0).await.unwrap();
    assert_eq!(&records.as_bytes()[..], &[0, 0, 0, 3, b'a', b'b', b'c']);

    // the other partition is untouched
    assert!(client.fetch("test", 1).await.unwrap().is_empty());
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fetch_keeps_publish_order() {
    let data_dir = TempDir::new().unwrap();
    let broker = TestBroker::start(data_dir.path(), test_topic()).await;
    let client = broker.client();

    let sent: Vec<Vec<u8>> = (0..20).map(|i| format!("message-{}", i).into_bytes()).collect();
    for message in &sent {
        let result = client
            .produce("test", 1, Bytes::from(message.clone()))
            .await
            .unwrap();
        assert_eq!(result, ProduceResult::Success);
    }

    let records = client.fetch("test", 1).await.unwrap();
    assert_eq!(messages(&records), sent);
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_topic_is_rejected_without_a_log_file() {
    let data_dir = TempDir::new().unwrap();
    let broker = TestBroker::start(data_dir.path(), test_topic()).await;
    let client = broker.client();

    let result = client.produce("ghost", 0, "x").await.unwrap();
    assert_eq!(result, ProduceResult::Error);
    let result = client.produce("test", 9, "x").await.unwrap();
    assert_eq!(result, ProduceResult::Error);

    assert!(client.fetch("ghost", 0).await.unwrap().is_empty());
    assert!(!data_dir.path().join("ghost_0.log").exists());
    assert!(!data_dir.path().join("test_9.log").exists());
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversized_message_is_rejected() {
    let data_dir = TempDir::new().unwrap();
    let broker = TestBroker::start(data_dir.path(), test_topic()).await;
    let client = broker.client();

    let result = client.produce("test", 0, vec![b'x'; 2048]).await.unwrap();
    assert_eq!(result, ProduceResult::Error);
    assert!(client.fetch("test", 0).await.unwrap().is_empty());
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn api_versions_and_metadata() {
    let data_dir = TempDir::new().unwrap();
    let topics = vec![
        TopicConfig {
            name: "orders".to_string(),
            partitions: vec![0, 1, 2],
        },
        TopicConfig {
            name: "audit".to_string(),
            partitions: vec![7],
        },
    ];
    let broker = TestBroker::start(data_dir.path(), topics).await;
    let client = broker.client();

    let versions = client.api_versions().await.unwrap();
    let keys: Vec<u16> = versions.iter().map(|v| v.api_key).collect();
    assert_eq!(keys, vec![0, 1, 3, 18]);
    assert!(versions
        .iter()
        .all(|v| v.min_version == 0 && v.max_version == 1));

    let metadata = client.metadata().await.unwrap();
    let names: Vec<&str> = metadata.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["orders", "audit"]);
    assert_eq!(metadata[0].partitions, vec![0, 1, 2]);
    assert_eq!(metadata[1].partitions, vec![7]);
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_api_key_gets_empty_payload() {
    let data_dir = TempDir::new().unwrap();
    let broker = TestBroker::start(data_dir.path(), test_topic()).await;
    let client = broker.client();

    let response = client.send_raw(7, 0, Bytes::new()).await.unwrap();
    assert_eq!(response.correlation_id, 1);
    assert!(response.payload.is_empty());
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_request_gets_sentinel_frame() {
    let data_dir = TempDir::new().unwrap();
    let broker = TestBroker::start(data_dir.path(), test_topic()).await;
    let client = broker.client();

    // topic length says 5, only one byte follows
    let response = client
        .send_raw(ApiKey::Produce.as_u16(), 0, Bytes::from_static(&[0, 5, b't']))
        .await
        .unwrap();
    assert_eq!(response.correlation_id, SENTINEL_CORRELATION_ID);
    assert!(!response.payload.is_empty());

    // the broker keeps serving afterwards
    let result = client.produce("test", 0, "after").await.unwrap();
    assert_eq!(result, ProduceResult::Success);
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_lose_nothing() {
    let data_dir = TempDir::new().unwrap();
    let broker = TestBroker::start(data_dir.path(), test_topic()).await;
    let client = Arc::new(broker.client());

    let mut tasks = Vec::new();
    for producer in 0..8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..10 {
                let message = format!("p{}-m{}", producer, i);
                let result = client.produce("test", 0, message).await.unwrap();
                assert_eq!(result, ProduceResult::Success);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let records = client.fetch("test", 0).await.unwrap();
    let mut received: Vec<String> = messages(&records)
        .into_iter()
        .map(|m| String::from_utf8(m).unwrap())
        .collect();
    assert_eq!(received.len(), 80);

    // each producer's messages keep their relative order
    for producer in 0..8 {
        let prefix = format!("p{}-", producer);
        let own: Vec<&String> = received.iter().filter(|m| m.starts_with(&prefix)).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("p{}-m{}", producer, i)).collect();
        assert_eq!(own, expected.iter().collect::<Vec<_>>());
    }

    received.sort();
    received.dedup();
    assert_eq!(received.len(), 80);
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn messages_survive_restart() {
    let data_dir = TempDir::new().unwrap();

    let broker = TestBroker::start(data_dir.path(), test_topic()).await;
    let client = broker.client();
    client.produce("test", 0, "first").await.unwrap();
    client.produce("test", 0, "second").await.unwrap();
    broker.stop().await;

    let broker = TestBroker::start(data_dir.path(), test_topic()).await;
    let client = broker.client();
    client.produce("test", 0, "third").await.unwrap();
    let records = client.fetch("test", 0).await.unwrap();
    assert_eq!(
        messages(&records),
        vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
    );
    broker.stop().await;
}

async fn read_response(stream: &mut TcpStream) -> ResponseFrame {
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    assert!(raw.len() >= 8, "short response: {:?}", raw);
    let declared = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    assert_eq!(declared, raw.len() - 4);
    ResponseFrame::decode(Bytes::from(raw).slice(4..)).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversized_frame_gets_sentinel_frame() {
    let data_dir = TempDir::new().unwrap();
    let broker = TestBroker::start_with(data_dir.path(), |config| {
        config.network.max_package_size = 64;
        config.topics = test_topic();
    })
    .await;

    // the length prefix alone is enough to reject the frame
    let mut stream = TcpStream::connect(broker.addr).await.unwrap();
    stream.write_all(&256u32.to_be_bytes()).await.unwrap();
    let response = read_response(&mut stream).await;

    assert_eq!(response.correlation_id, SENTINEL_CORRELATION_ID);
    let text = String::from_utf8_lossy(&response.payload);
    assert!(text.contains("Frame of length 256 is too large"), "{}", text);

    // other connections are unaffected
    let result = broker.client().produce("test", 0, "fine").await.unwrap();
    assert_eq!(result, ProduceResult::Success);
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_finishes_request_in_flight() {
    let data_dir = TempDir::new().unwrap();
    let broker = TestBroker::start(data_dir.path(), test_topic()).await;

    // connected but silent, must not hold up the shutdown
    let mut idle = TcpStream::connect(broker.addr).await.unwrap();

    let mut payload = BytesMut::new();
    ProduceRequest::new("test", 0, Bytes::from_static(b"in flight"))
        .encode(&mut payload)
        .unwrap();
    let frame = RequestFrame::new(
        RequestHeader::new(ApiKey::Produce.as_u16(), 0, 77),
        payload.freeze(),
    );
    let mut buffer = BytesMut::new();
    frame.encode(&mut buffer).unwrap();
    let mut stream = TcpStream::connect(broker.addr).await.unwrap();
    stream.write_all(&buffer).await.unwrap();

    // once the record is on disk the request has been read and dispatched
    let log_path = data_dir.path().join("test_0.log");
    tokio::time::timeout(Duration::from_secs(5), async {
        while std::fs::metadata(&log_path).map_or(0, |m| m.len()) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    broker.stop().await;

    let response = read_response(&mut stream).await;
    assert_eq!(response.correlation_id, 77);
    assert_eq!(&response.payload[..], &[0x00]);

    let mut rest = Vec::new();
    assert_eq!(idle.read_to_end(&mut rest).await.unwrap(), 0);

    // flushed before serve returned
    assert_eq!(
        std::fs::read(&log_path).unwrap(),
        b"\x00\x00\x00\x09in flight".to_vec()
    );
}
