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

use std::path::PathBuf;

use clap::Parser;
use dotenv::dotenv;
use pebblemq::{setup_tracing, AppResult, Broker, BrokerConfig};
use tokio::runtime;
use tracing::info;

#[derive(Parser)]
#[command(version)]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    /// directory of the rolling log files
    #[arg(long, default_value = "logs")]
    pub log_dir: String,
    #[command(subcommand)]
    pub command: Option<Command>,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Parser)]
pub enum Command {
    /// print the effective config and exit
    PrintConfig,
}

fn main() -> AppResult<()> {
    // .env may carry PEBBLEMQ__* overrides
    dotenv().ok();

    let commandline: CommandLine = CommandLine::parse();
    let config_path = commandline.conf.as_ref().map_or_else(
        || {
            let mut path = PathBuf::from("./");
            path.push("conf.toml");
            path
        },
        PathBuf::from,
    );
    let broker_config = BrokerConfig::set_up_config(&config_path)?;

    if let Some(Command::PrintConfig) = commandline.command {
        println!("{:#?}", broker_config);
        return Ok(());
    }

    let rt = runtime::Builder::new_multi_thread()
        .thread_name("pebblemq-worker")
        .enable_all()
        .build()?;

    let _tracing_guard = setup_tracing(&commandline.log_dir, commandline.verbose)?;
    info!(
        "starting broker with config {}, data dir {}",
        config_path.display(),
        broker_config.general.data_dir
    );

    let broker = Broker::new(broker_config);
    broker.start(&rt)?;

    Ok(())
}
