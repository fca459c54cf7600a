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

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::{AppError, AppResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Keeps the non-blocking file writer alive; buffered lines are flushed on drop.
pub struct TracingGuard {
    _worker_guard: WorkerGuard,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        tracing::info!("shutdown tracing file writer");
    }
}

/// `-v` count on the command line, used when `RUST_LOG` is not set.
fn env_filter(verbose: u8) -> EnvFilter {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// stdout only, for the demo client and local runs
pub fn setup_local_tracing(verbose: u8) -> AppResult<()> {
    let timer = ChronoLocal::new(TIME_FORMAT.to_string());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_target(true)
        .with_thread_names(true)
        .with_thread_ids(true)
        .with_line_number(true);
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter(verbose))
        .try_init()
        .map_err(|e| AppError::TracingSetup(e.to_string()))
}

/// stdout plus an hourly rolling `pebblemq.log` under `log_dir`
pub fn setup_tracing<P: AsRef<Path>>(log_dir: P, verbose: u8) -> AppResult<TracingGuard> {
    let file_appender = tracing_appender::rolling::hourly(log_dir, "pebblemq.log");
    let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
    let writer = non_blocking.and(std::io::stdout);

    let timer = ChronoLocal::new(TIME_FORMAT.to_string());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_target(true)
        .with_thread_names(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter(verbose))
        .try_init()
        .map_err(|e| AppError::TracingSetup(e.to_string()))?;

    Ok(TracingGuard {
        _worker_guard: worker_guard,
    })
}
