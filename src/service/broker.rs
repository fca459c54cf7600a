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

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::{broadcast, mpsc};
use tokio::signal;
use tracing::{error, info, trace};

use crate::log::LogManager;
use crate::message::TopicRegistry;
use crate::service::Server;
use crate::AppError::IllegalStateError;
use crate::{AppResult, BrokerConfig};

pub struct Broker {
    config: Arc<BrokerConfig>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Broker {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub fn start(&self, rt: &Runtime) -> AppResult<()> {
        rt.block_on(async {
            let listener = Self::bind(&self.config.listen_address()).await?;
            self.serve(listener, async {
                if let Err(err) = signal::ctrl_c().await {
                    error!("listen for shutdown signal error: {}", err);
                }
            })
            .await
        })
    }

    pub async fn bind(listen_address: &str) -> AppResult<TcpListener> {
        match TcpListener::bind(listen_address).await {
            Ok(listener) => {
                info!("tcp server binding to {} for listening", listen_address);
                Ok(listener)
            }
            Err(err) => {
                let error_msg = format!(
                    "Failed to bind server to address: {} - Error: {}",
                    listen_address, err
                );
                error!("{}", error_msg);
                Err(IllegalStateError(error_msg))
            }
        }
    }

    /// Serves connections on `listener` until `shutdown` completes, then
    /// drains open connections and fsyncs every partition log.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let log_manager = Arc::new(LogManager::new(
            &self.config.general.data_dir,
            self.config.log.writer_channel_capacity,
        )?);
        log_manager.load_logs().await?;
        let topic_registry = Arc::new(TopicRegistry::from_config(&self.config.topics)?);

        let (notify_shutdown, _) = broadcast::channel(1);
        let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);

        let server = Server::new(
            listener,
            notify_shutdown.clone(),
            shutdown_complete_tx,
            log_manager.clone(),
            topic_registry,
            self.config.clone(),
        );

        let mut result = Ok(());
        tokio::select! {
            res = server.run() => {
                if let Err(err) = res {
                    error!(cause = %err, "failed to accept");
                    result = Err(err);
                }
            }
            _ = shutdown => {
                info!("get shutdown signal");
            }
        }

        // nobody may be subscribed yet, that is fine
        let _ = notify_shutdown.send(());
        drop(server);
        trace!("waiting for shutdown complete...");
        let _ = shutdown_complete_rx.recv().await;

        log_manager.flush_all().await?;
        info!("broker shutdown complete");
        result
    }
}
