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

use std::time::Duration;

use clap::{Parser, Subcommand};
use pebblemq::{setup_local_tracing, AppResult, BrokerClient};
use rand::Rng;
use tracing::{error, info};

#[derive(Parser)]
#[command(version, about = "demo producer and consumer for pebblemq")]
pub struct CommandLine {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value_t = 9092)]
    pub port: u16,
    #[command(subcommand)]
    pub command: Command,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// publish one random message per interval
    Produce {
        #[arg(short, long, default_value = "test")]
        topic: String,
        #[arg(short, long, default_value_t = 0)]
        partition: u32,
        /// milliseconds between two messages
        #[arg(short, long, default_value_t = 1000)]
        interval: u64,
        /// stop after this many messages, run forever when absent
        #[arg(short, long)]
        count: Option<u64>,
    },
    /// print the whole partition once per interval
    Consume {
        #[arg(short, long, default_value = "test")]
        topic: String,
        #[arg(short, long, default_value_t = 0)]
        partition: u32,
        #[arg(short, long, default_value_t = 1000)]
        interval: u64,
        /// fetch once and exit
        #[arg(long)]
        once: bool,
    },
    Metadata,
    ApiVersions,
}

const MESSAGE_LEN: usize = 10;

fn random_message() -> String {
    let mut rng = rand::thread_rng();
    (0..MESSAGE_LEN)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

async fn produce(
    client: &BrokerClient,
    topic: &str,
    partition: u32,
    interval: Duration,
    count: Option<u64>,
) {
    println!("Starting producer...");
    let mut sent = 0u64;
    while count.map_or(true, |count| sent < count) {
        let message = random_message();
        match client.produce(topic, partition, message.clone()).await {
            Ok(result) => println!("Produced message: {} ({:?})", message, result),
            Err(err) => error!("produce to {}-{} failed: {}", topic, partition, err),
        }
        sent += 1;
        tokio::time::sleep(interval).await;
    }
}

async fn consume(
    client: &BrokerClient,
    topic: &str,
    partition: u32,
    interval: Duration,
    once: bool,
) {
    println!("Starting consumer...");
    loop {
        match client.fetch(topic, partition).await {
            Ok(records) => {
                for message in records.iter() {
                    match message {
                        Ok(message) => {
                            println!("Message: {}", String::from_utf8_lossy(&message))
                        }
                        Err(err) => {
                            error!("bad record in fetch response: {}", err);
                            break;
                        }
                    }
                }
            }
            Err(err) => error!("fetch from {}-{} failed: {}", topic, partition, err),
        }
        if once {
            return;
        }
        tokio::time::sleep(interval).await;
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let commandline = CommandLine::parse();
    setup_local_tracing(commandline.verbose)?;

    let client = BrokerClient::new(format!("{}:{}", commandline.host, commandline.port));
    info!("talking to broker at {}", client.address());

    match commandline.command {
        Command::Produce {
            topic,
            partition,
            interval,
            count,
        } => {
            produce(
                &client,
                &topic,
                partition,
                Duration::from_millis(interval),
                count,
            )
            .await
        }
        Command::Consume {
            topic,
            partition,
            interval,
            once,
        } => {
            consume(
                &client,
                &topic,
                partition,
                Duration::from_millis(interval),
                once,
            )
            .await
        }
        Command::Metadata => {
            for topic in client.metadata().await? {
                println!("{}: partitions {:?}", topic.name, topic.partitions);
            }
        }
        Command::ApiVersions => {
            for range in client.api_versions().await? {
                println!(
                    "api key {}: versions {}..={}",
                    range.api_key, range.min_version, range.max_version
                );
            }
        }
    }
    Ok(())
}
