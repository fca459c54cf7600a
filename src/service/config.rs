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

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

/// Prefix of environment variables that override file settings,
/// e.g. `PEBBLEMQ__NETWORK__PORT=19092`.
pub const ENV_PREFIX: &str = "PEBBLEMQ";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    /// directory holding one `<topic>_<partition>.log` file per partition
    pub data_dir: String,
    pub max_msg_size: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            data_dir: "data".to_string(),
            max_msg_size: 1024 * 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub ip: String,
    pub port: u16,
    pub max_connection: usize,
    pub max_package_size: usize,
    pub conn_read_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            ip: "127.0.0.1".to_string(),
            port: 9092,
            max_connection: 1024,
            max_package_size: 8 * 1024 * 1024,
            conn_read_buffer_size: 4 * 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RequestHandlerPool {
    pub channel_capacity: usize,
    /// 0 means one worker per cpu
    pub num_channels: usize,
    /// seconds between two worker health checks
    pub monitor_interval: u64,
}

impl Default for RequestHandlerPool {
    fn default() -> Self {
        RequestHandlerPool {
            channel_capacity: 1024,
            num_channels: 0,
            monitor_interval: 5,
        }
    }
}

impl RequestHandlerPool {
    pub fn worker_count(&self) -> usize {
        if self.num_channels == 0 {
            num_cpus::get()
        } else {
            self.num_channels
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    /// capacity of the append queue in front of each partition writer
    pub writer_channel_capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            writer_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub name: String,
    pub partitions: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BrokerConfig {
    pub general: GeneralConfig,
    pub network: NetworkConfig,
    pub log: LogConfig,
    pub request_handler_pool: RequestHandlerPool,
    pub topics: Vec<TopicConfig>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            general: GeneralConfig::default(),
            network: NetworkConfig::default(),
            log: LogConfig::default(),
            request_handler_pool: RequestHandlerPool::default(),
            topics: vec![TopicConfig {
                name: "test".to_string(),
                partitions: vec![0, 1],
            }],
        }
    }
}

impl BrokerConfig {
    /// Loads the config file, then lets `PEBBLEMQ__*` environment variables
    /// override single keys. A missing file falls back to the defaults.
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<BrokerConfig> {
        Self::load(path, Self::environment())
    }

    /// `PEBBLEMQ__NETWORK__PORT` overrides `network.port`
    fn environment() -> ::config::Environment {
        ::config::Environment::with_prefix(ENV_PREFIX).separator("__")
    }

    fn load<P: AsRef<Path>>(
        path: P,
        environment: ::config::Environment,
    ) -> AppResult<BrokerConfig> {
        let path_str = path.as_ref().to_str().ok_or_else(|| {
            AppError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            ))
        })?;
        let config = ::config::Config::builder()
            .add_source(::config::File::with_name(path_str).required(false))
            .add_source(environment)
            .build()?;

        let broker_config: BrokerConfig = config.try_deserialize()?;
        broker_config.validate()?;
        Ok(broker_config)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.network.ip, self.network.port)
    }

    fn validate(&self) -> AppResult<()> {
        if self.network.max_connection == 0 {
            return Err(AppError::InvalidValue(
                "network.max_connection must be greater than 0".to_string(),
            ));
        }
        if self.request_handler_pool.channel_capacity == 0 || self.log.writer_channel_capacity == 0
        {
            return Err(AppError::InvalidValue(
                "channel capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = BrokerConfig::set_up_config(temp_dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.listen_address(), "127.0.0.1:9092");
        assert_eq!(config.general.data_dir, "data");
        assert_eq!(
            config.topics,
            vec![TopicConfig {
                name: "test".to_string(),
                partitions: vec![0, 1]
            }]
        );
    }

    #[test]
    fn file_values_and_topic_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[general]
data_dir = "/var/lib/pebblemq"

[network]
port = 19092

[[topics]]
name = "orders"
partitions = [0, 1, 2]

[[topics]]
name = "audit"
partitions = [7]
"#
        )
        .unwrap();

        let config = BrokerConfig::set_up_config(&path).unwrap();
        assert_eq!(config.general.data_dir, "/var/lib/pebblemq");
        assert_eq!(config.network.port, 19092);
        assert_eq!(config.network.ip, "127.0.0.1");
        let names: Vec<_> = config.topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "audit"]);
        assert_eq!(config.topics[1].partitions, vec![7]);
    }

    #[test]
    fn environment_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf.toml");
        std::fs::write(
            &path,
            "[general]\ndata_dir = \"/srv/pebble\"\n\n[network]\nport = 19092\n",
        )
        .unwrap();

        let mut vars = ::config::Map::new();
        vars.insert("PEBBLEMQ__NETWORK__PORT".to_string(), "29092".to_string());
        vars.insert(
            "PEBBLEMQ__GENERAL__MAX_MSG_SIZE".to_string(),
            "2048".to_string(),
        );
        vars.insert("OTHERMQ__NETWORK__IP".to_string(), "10.0.0.1".to_string());
        let environment = BrokerConfig::environment().source(Some(vars));

        let config = BrokerConfig::load(&path, environment).unwrap();
        assert_eq!(config.network.port, 29092);
        assert_eq!(config.general.max_msg_size, 2048);
        assert_eq!(config.general.data_dir, "/srv/pebble");
        assert_eq!(config.network.ip, "127.0.0.1");
    }

    #[test]
    fn zero_connections_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf.toml");
        std::fs::write(&path, "[network]\nmax_connection = 0\n").unwrap();

        let result = BrokerConfig::set_up_config(&path);
        assert!(matches!(result, Err(AppError::InvalidValue(_))));
    }
}
