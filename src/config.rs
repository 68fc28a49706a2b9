//! TOML-based fabric configuration.
//!
//! ```toml
//! ip_addresses  = ["10.0.0.1", "10.0.0.2"]
//! mac_addresses = ["02:00:00:00:00:01", "02:00:00:00:00:02"]
//! pool_size     = 8
//! print_packets = false
//! ```
//!
//! Entry `i` of both lists describes interface `vnic<i>`.

use std::path::Path;

use serde::Deserialize;

use crate::error::FabricError;
use crate::iface::DEFAULT_POOL_SIZE;

/// Fewest interfaces a fabric can be built with
pub const MIN_INTERFACES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FabricConfig {
    pub ip_addresses: Vec<String>,
    pub mac_addresses: Vec<String>,
    /// Packet buffers per interface
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Hex-dump every delivered frame at debug level
    #[serde(default)]
    pub print_packets: bool,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl FabricConfig {
    pub fn new<I, M>(ip_addresses: I, mac_addresses: M) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        FabricConfig {
            ip_addresses: ip_addresses.into_iter().map(Into::into).collect(),
            mac_addresses: mac_addresses.into_iter().map(Into::into).collect(),
            pool_size: default_pool_size(),
            print_packets: false,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_print_packets(mut self, print_packets: bool) -> Self {
        self.print_packets = print_packets;
        self
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, FabricError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, FabricError> {
        toml::from_str(s).map_err(|e| FabricError::InvalidConfig(format!("failed to parse config: {e}")))
    }

    pub fn interface_count(&self) -> usize {
        self.ip_addresses.len()
    }

    /// Shape checks that need no address parsing.
    pub fn validate(&self) -> Result<(), FabricError> {
        let (ips, macs) = (self.ip_addresses.len(), self.mac_addresses.len());
        if ips != macs {
            return Err(FabricError::ConfigMismatch(format!(
                "{ips} IP addresses but {macs} MAC addresses"
            )));
        }
        if ips < MIN_INTERFACES {
            return Err(FabricError::ConfigMismatch(format!(
                "{ips} interfaces configured, at least {MIN_INTERFACES} required"
            )));
        }
        if self.pool_size == 0 {
            return Err(FabricError::InvalidConfig("pool_size must be at least 1".into()));
        }
        Ok(())
    }
}
