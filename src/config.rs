use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::{AddressPlan, MAX_NODES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Udp,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub node_count: usize,
    pub base_port: u16,
    pub host: IpAddr,
    pub topology: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub max_rounds: Option<u64>,
    pub transport: TransportKind,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: 6,
            base_port: AddressPlan::REFERENCE_BASE,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            topology: PathBuf::from("sample.txt"),
            output_dir: None,
            max_rounds: None,
            transport: TransportKind::Udp,
        }
    }
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SimulationConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_count == 0 || self.node_count > MAX_NODES {
            return Err(ConfigError::NodeCount {
                max: MAX_NODES,
                actual: self.node_count,
            });
        }
        self.addresses().map(|_| ())
    }

    pub fn addresses(&self) -> Result<AddressPlan, ConfigError> {
        AddressPlan::new(self.base_port, self.node_count)
    }
}
