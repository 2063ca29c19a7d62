//! Configuration file location and the starter configuration

use std::path::PathBuf;

use dv_gateway::{
    Destination, EndpointConfig, FmConfig, GatewayConfig, LookupConfig, NetworkConfig,
    RouteConfig,
};
use dv_protocol::Mode;

const APP_NAME: &str = "dvbridge";
const CONFIG_FILE: &str = "dvbridge.json";

/// `$XDG_CONFIG_HOME/dvbridge` when that is absolute, else `~/.config/dvbridge`
fn config_dir_from(xdg_config: Option<String>, home: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(xdg_config) = xdg_config {
        let path = PathBuf::from(xdg_config);
        if path.is_absolute() {
            return Some(path.join(APP_NAME));
        }
    }
    home.map(|h| h.join(".config").join(APP_NAME))
}

/// Where the configuration is read from when `--config` is not given
pub fn default_config_path() -> Option<PathBuf> {
    config_dir_from(std::env::var("XDG_CONFIG_HOME").ok(), dirs::home_dir())
        .map(|dir| dir.join(CONFIG_FILE))
}

fn network(mode: Mode, remote_port: u16, local_port: u16) -> NetworkConfig {
    NetworkConfig {
        mode,
        endpoint: EndpointConfig {
            remote_address: "127.0.0.1".to_string(),
            remote_port,
            local_address: "0.0.0.0".to_string(),
            local_port,
            debug: false,
        },
        callsign: "N0GW".to_string(),
        id: 0,
        color_code: 1,
        ran: 1,
    }
}

/// A D-Star gateway reaching DMR and System Fusion, printed by `--example`
pub fn example() -> GatewayConfig {
    let mut dmr = network(Mode::Dmr, 62032, 62033);
    dmr.id = 1_234_567;

    GatewayConfig {
        from: network(Mode::DStar, 20010, 20011),
        to: vec![dmr, network(Mode::Ysf, 42000, 42001)],
        routes: vec![
            RouteConfig {
                from: Destination::dstar("TESTBM"),
                to: Destination::Dmr { slot: 1, tg: 9 },
            },
            RouteConfig {
                from: Destination::dstar("TESTYSF"),
                to: Destination::Ysf { dg_id: 10 },
            },
        ],
        passthrough: false,
        fm: FmConfig::default(),
        dmr_lookup: Some(LookupConfig {
            file: PathBuf::from("DMRIds.dat"),
            reload_hours: 24,
        }),
        nxdn_lookup: None,
        transcoder: None,
    }
}
