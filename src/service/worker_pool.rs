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

use std::any::type_name;
use std::future::Future;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use super::Shutdown;

fn get_type_name<T>(_: &T) -> &'static str {
    type_name::<T>()
}

fn spawn_worker<T, F, Fut>(id: usize, rx: async_channel::Receiver<T>, handler: F) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        debug!("worker {} started", id);
        while let Ok(task) = rx.recv().await {
            handler(task).await;
        }
        debug!("worker {} exited", id);
    })
}

/// Starts `num_workers` tasks draining one bounded channel, plus a monitor.
///
/// A worker that panics loses the task it was running and is replaced at the
/// next monitor tick. Workers exit once every sender is dropped; the monitor
/// exits with them or on shutdown.
pub fn start_worker_pool<T, F, Fut>(
    capacity: usize,
    num_workers: usize,
    monitor_interval: Duration,
    notify_shutdown: &broadcast::Sender<()>,
    handler: F,
) -> async_channel::Sender<T>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (task_tx, task_rx) = async_channel::bounded(capacity);

    let mut workers: Vec<JoinHandle<()>> = (0..num_workers)
        .map(|id| spawn_worker(id, task_rx.clone(), handler.clone()))
        .collect();
    info!("worker pool started with {} workers", num_workers);

    let mut shutdown = Shutdown::new(notify_shutdown.subscribe());
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!("worker monitor received shutdown signal");
                    break;
                }
                _ = time::sleep(monitor_interval) => {}
            }
            for (id, handle) in workers.iter_mut().enumerate() {
                if !handle.is_finished() {
                    continue;
                }
                match (&mut *handle).await {
                    Err(join_error) if join_error.is_panic() => {
                        let payload = join_error.into_panic();
                        if let Some(message) = payload.downcast_ref::<&'static str>() {
                            error!("worker {} panicked with message: {}", id, message);
                        } else if let Some(message) = payload.downcast_ref::<String>() {
                            error!("worker {} panicked with message: {}", id, message);
                        } else {
                            error!(
                                "worker {} panicked with an unknown type: {}",
                                id,
                                get_type_name(&payload)
                            );
                        }
                        warn!("worker {} restarting", id);
                        *handle = spawn_worker(id, task_rx.clone(), handler.clone());
                    }
                    _ => {
                        // channel closed, nothing left to serve
                        debug!("worker monitor found worker {} exited", id);
                        return;
                    }
                }
            }
        }
        debug!("worker monitor exit loop");
    });
    task_tx
}
