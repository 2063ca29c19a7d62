//! Digital-Voice Gateway Engine
//!
//! This crate bridges one "from" network to up to six target networks of
//! other digital-voice modes, converting addressing, source identity and
//! vocoder format on the way.
//!
//! # Architecture
//!
//! - [`Gateway`] owns every network adapter and the routing engine and
//!   drives them from a single 5 ms loop.
//! - [`Network`] is one per-mode adapter: it receives datagrams through an
//!   [`Endpoint`], parses them with `dv-protocol` and builds native frames
//!   for the outbound direction.
//! - [`Data`] classifies each transmission against the [`RouteTables`],
//!   translates the talker's identity through the [`IdLookup`] tables and
//!   moves audio through a [`Transcoder`] when the vocoders differ.
//!
//! Only one transmission is in flight at a time, in one direction.
//!
//! # Example
//!
//! ```rust,no_run
//! use dv_gateway::{Gateway, GatewayCommand, GatewayConfig};
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> Result<(), dv_gateway::GatewayError> {
//! let config = GatewayConfig::load("dvbridge.json".as_ref())?;
//! let gateway = Gateway::open(&config, None).await?;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(8);
//! let task = tokio::spawn(gateway.run(cmd_rx));
//! cmd_tx.send(GatewayCommand::Shutdown).await.ok();
//! task.await.ok();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod gateway;
pub mod link;
pub mod lookup;
pub mod network;
pub mod routing;
pub mod transcoder;

pub use config::{
    EndpointConfig, FmConfig, GatewayConfig, LookupConfig, NetworkConfig, RouteConfig,
    TranscoderConfig,
};
pub use data::{Data, Direction, Route};
pub use error::GatewayError;
pub use gateway::{Gateway, GatewayCommand};
pub use link::{DatagramLink, Endpoint, UdpLink};
pub use lookup::IdLookup;
pub use network::Network;
pub use routing::{BidiTable, Destination, RouteTables};
pub use transcoder::{SerialTranscoder, Transcoder, TranscoderMode};
