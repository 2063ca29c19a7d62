//! Gateway configuration
//!
//! The whole configuration is one serde structure, normally read from a
//! JSON file by the binary:
//!
//! ```json
//! {
//!   "from": { "mode": "dstar", "remote_address": "127.0.0.1", "remote_port": 20010,
//!             "local_port": 20011, "callsign": "N0GW" },
//!   "to": [ { "mode": "dmr", "remote_address": "127.0.0.1", "remote_port": 62032,
//!             "local_port": 62033, "id": 1234567 } ],
//!   "routes": [ { "from": { "mode": "dstar", "callsign": "TESTBM" },
//!                 "to": { "mode": "dmr", "slot": 1, "tg": 9 } } ],
//!   "dmr_lookup": { "file": "DMRIds.dat", "reload_hours": 24 }
//! }
//! ```

use std::path::{Path, PathBuf};

use dv_protocol::Mode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GatewayError;
use crate::routing::{Destination, RouteTables};

/// UDP endpoint of one network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    /// Host name or address of the remote peer
    pub remote_address: String,
    pub remote_port: u16,
    /// Local bind address
    #[serde(default = "default_local_address")]
    pub local_address: String,
    /// Local bind port, zero for any
    #[serde(default)]
    pub local_port: u16,
    /// Hex-dump every datagram at debug level
    #[serde(default)]
    pub debug: bool,
}

fn default_local_address() -> String {
    "0.0.0.0".to_string()
}

/// One network adapter: its mode, endpoint and mode-specific identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    pub mode: Mode,
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    /// Gateway callsign used for polls, repeater fields and the YSF tag
    #[serde(default)]
    pub callsign: String,
    /// DMR repeater ID
    #[serde(default)]
    pub id: u32,
    /// DMR colour code
    #[serde(default = "default_color_code")]
    pub color_code: u8,
    /// NXDN radio access number
    #[serde(default = "default_ran")]
    pub ran: u8,
}

fn default_color_code() -> u8 {
    1
}

fn default_ran() -> u8 {
    1
}

/// One routing table entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteConfig {
    /// Address on the from-network
    pub from: Destination,
    /// Address on the target network
    pub to: Destination,
}

/// Identity used for traffic that originates on FM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FmConfig {
    pub callsign: String,
    pub dmr_id: u32,
    pub nxdn_id: u16,
}

impl Default for FmConfig {
    fn default() -> Self {
        Self {
            callsign: "N0CALL".to_string(),
            dmr_id: 0,
            nxdn_id: 0,
        }
    }
}

/// An ID to callsign table and its reload period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupConfig {
    pub file: PathBuf,
    #[serde(default = "default_reload_hours")]
    pub reload_hours: u32,
}

fn default_reload_hours() -> u32 {
    24
}

/// Serial transcoder device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscoderConfig {
    pub port: String,
    #[serde(default = "default_speed")]
    pub speed: u32,
}

fn default_speed() -> u32 {
    460_800
}

/// Complete gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// The network whose traffic is routed out
    pub from: NetworkConfig,
    /// Target networks, at most one per mode
    #[serde(default)]
    pub to: Vec<NetworkConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Route same-mode traffic straight through when no table matches
    #[serde(default)]
    pub passthrough: bool,
    #[serde(default)]
    pub fm: FmConfig,
    #[serde(default)]
    pub dmr_lookup: Option<LookupConfig>,
    #[serde(default)]
    pub nxdn_lookup: Option<LookupConfig>,
    #[serde(default)]
    pub transcoder: Option<TranscoderConfig>,
}

impl GatewayConfig {
    /// Read and validate a JSON configuration file
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let text = std::fs::read_to_string(path)?;
        let config: GatewayConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the network list for duplicates
    pub fn validate(&self) -> Result<(), GatewayError> {
        let mut seen = Vec::new();
        for network in &self.to {
            if seen.contains(&network.mode) {
                return Err(GatewayError::Config(format!(
                    "more than one {} target network",
                    network.mode
                )));
            }
            seen.push(network.mode);
        }
        Ok(())
    }

    /// Modes of the configured target networks
    pub fn to_modes(&self) -> Vec<Mode> {
        self.to.iter().map(|n| n.mode).collect()
    }

    /// Build the routing tables, skipping entries that cannot apply
    pub fn route_tables(&self) -> RouteTables {
        let mut tables = RouteTables::new();
        for route in &self.routes {
            let (from, to) = (route.from.mode(), route.to.mode());
            if from != self.from.mode {
                warn!(
                    "Skipping route {} -> {}: the from-network is {}",
                    route.from, route.to, self.from.mode
                );
                continue;
            }
            if to == from {
                warn!(
                    "Skipping same-mode route {} -> {}, use passthrough instead",
                    route.from, route.to
                );
                continue;
            }
            if !self.to.iter().any(|n| n.mode == to) {
                warn!("Route {} -> {} has no {} network", route.from, route.to, to);
            }
            tables.add(route.from.clone(), route.to.clone());
        }
        tables
    }
}
