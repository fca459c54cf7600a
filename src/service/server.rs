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
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error, trace, warn};

use crate::log::LogManager;
use crate::message::TopicRegistry;
use crate::network::{Connection, RequestFrame, ResponseFrame};
use crate::request::{RequestContext, RequestProcessor};
use crate::AppError;
use crate::AppResult;

use super::config::{BrokerConfig, RequestHandlerPool};
use super::worker_pool::start_worker_pool;
use super::Shutdown;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct RequestTask {
    connection_id: u64,
    client_ip: String,
    frame: RequestFrame,
    response_tx: oneshot::Sender<ResponseFrame>,
}

/// What request handler workers share.
#[derive(Debug, Clone)]
struct HandlerResources {
    log_manager: Arc<LogManager>,
    topic_registry: Arc<TopicRegistry>,
    max_msg_size: usize,
}

/// Starts the bounded request handler pool.
///
/// A worker that panics drops the reply channel of the request it was
/// serving (its connection answers with an error frame) and is replaced by
/// the pool monitor.
fn start_request_handler(
    resources: HandlerResources,
    request_handler_config: &RequestHandlerPool,
    notify_shutdown: &broadcast::Sender<()>,
) -> async_channel::Sender<RequestTask> {
    start_worker_pool(
        request_handler_config.channel_capacity,
        request_handler_config.worker_count(),
        Duration::from_secs(request_handler_config.monitor_interval.max(1)),
        notify_shutdown,
        move |request: RequestTask| {
            let resources = resources.clone();
            async move { process_request(request, &resources).await }
        },
    )
}

async fn process_request(request: RequestTask, resources: &HandlerResources) {
    let RequestTask {
        connection_id,
        client_ip,
        frame,
        response_tx,
    } = request;
    let RequestFrame {
        request_header,
        request_body,
    } = frame;
    let context = RequestContext::new(
        client_ip,
        request_header,
        resources.log_manager.clone(),
        resources.topic_registry.clone(),
        resources.max_msg_size,
    );
    let response = RequestProcessor::process_request(request_body, &context).await;
    if response_tx.send(response).is_err() {
        // the connection handler is gone, usually because the broker is stopping
        error!(
            "connection {} closed before its response was ready",
            connection_id
        );
    }
}

// handler for each connection
struct ConnectionHandler {
    shutdown: Shutdown,
    _shutdown_complete_tx: mpsc::Sender<()>,
    connection_id: u64,
    connection: Connection,
    writer: BufWriter<OwnedWriteHalf>,
    request_tx: async_channel::Sender<RequestTask>,
}

impl ConnectionHandler {
    /// Serves exactly one request, then the caller drops the socket.
    ///
    /// Any fault on the way (malformed frame, lost worker) is answered with
    /// a best-effort error frame before closing.
    async fn handle_connection(&mut self) -> AppResult<()> {
        let response = match self.serve_one().await {
            Ok(Some(response)) => response,
            Ok(None) => return Ok(()),
            Err(e) => {
                error!("connection {} failed: {}", self.connection_id, e);
                ResponseFrame::from_error(&e)
            }
        };
        self.write_response(&response).await
    }

    async fn serve_one(&mut self) -> AppResult<Option<ResponseFrame>> {
        let maybe_frame = tokio::select! {
            res = self.connection.read_frame() => res?,
            _ = self.shutdown.recv() => {
                debug!("connection handler exit read after recv shutdown signal");
                return Ok(None);
            }
        };

        let frame = match maybe_frame {
            Some(frame) => frame,
            None => {
                trace!("connection {} closed without a request", self.connection_id);
                return Ok(None);
            }
        };

        let (response_tx, response_rx) = oneshot::channel();
        let request = RequestTask {
            connection_id: self.connection_id,
            client_ip: self.connection.client_ip.clone(),
            frame,
            response_tx,
        };
        self.request_tx
            .send(request)
            .await
            .map_err(|e| AppError::ChannelSendError(e.to_string()))?;

        match response_rx.await {
            Ok(response) => Ok(Some(response)),
            Err(_) => Err(AppError::IllegalStateError(
                "request processor dropped without sending response".into(),
            )),
        }
    }

    async fn write_response(&mut self, response: &ResponseFrame) -> AppResult<()> {
        let mut buffer = BytesMut::new();
        response.encode(&mut buffer)?;
        self.writer
            .write_all(&buffer)
            .await
            .map_err(|e| AppError::DetailedIoError(format!("write response error: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| AppError::DetailedIoError(format!("flush response error: {}", e)))?;
        self.writer
            .shutdown()
            .await
            .map_err(|e| AppError::DetailedIoError(format!("close connection error: {}", e)))
    }
}

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
    resources: HandlerResources,
    config: Arc<BrokerConfig>,
}

impl Server {
    pub fn new(
        listener: TcpListener,
        notify_shutdown: broadcast::Sender<()>,
        shutdown_complete_tx: mpsc::Sender<()>,
        log_manager: Arc<LogManager>,
        topic_registry: Arc<TopicRegistry>,
        config: Arc<BrokerConfig>,
    ) -> Self {
        Server {
            listener,
            limit_connections: Arc::new(Semaphore::new(config.network.max_connection)),
            notify_shutdown,
            shutdown_complete_tx,
            resources: HandlerResources {
                log_manager,
                topic_registry,
                max_msg_size: config.general.max_msg_size,
            },
            config,
        }
    }

    /// Accepts connections until accepting fails for good.
    ///
    /// Each connection holds a semaphore permit for its lifetime, so at most
    /// `network.max_connection` are served at once; the next accept waits
    /// for a permit.
    ///
    /// Graceful shutdown: the caller cancels this future, then broadcasts
    /// shutdown. Connection handlers that are still waiting for a request stop
    /// reading; those already holding a request finish it and reply. Once all
    /// handlers drop their `shutdown_complete_tx` clone the caller knows the
    /// connections are drained, and the request handler pool exits when its
    /// last sender goes away.
    pub async fn run(&self) -> AppResult<()> {
        let request_sender = start_request_handler(
            self.resources.clone(),
            &self.config.request_handler_pool,
            &self.notify_shutdown,
        );
        let network = &self.config.network;

        loop {
            let permit = self
                .limit_connections
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::IllegalStateError(e.to_string()))?;

            let (socket, peer) = self.accept().await?;
            let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            debug!("accept connection {} from {}", connection_id, peer);
            let (reader, writer) = socket.into_split();

            let mut handler = ConnectionHandler {
                shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
                _shutdown_complete_tx: self.shutdown_complete_tx.clone(),
                connection_id,
                connection: Connection::new(
                    reader,
                    network.conn_read_buffer_size,
                    network.max_package_size,
                    peer.ip().to_string(),
                ),
                writer: BufWriter::new(writer),
                request_tx: request_sender.clone(),
            };

            tokio::spawn(async move {
                if let Err(err) = handler.handle_connection().await {
                    error!("Connection error: {:?}", err);
                }
                // whether gracefully or unexpectedly closed, release connection
                drop(permit);
            });
        }
    }

    async fn accept(&self) -> AppResult<(TcpStream, SocketAddr)> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok(accepted) => return Ok(accepted),
                Err(err) => {
                    if backoff > 64 {
                        return Err(AppError::Accept(format!(
                            "accept tcp server error: {}",
                            err
                        )));
                    }
                    warn!("accept error: {}, retry in {}s", err, backoff);
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        debug!("tcp server dropped");
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        trace!("connection handler {} dropped", self.connection_id);
    }
}
