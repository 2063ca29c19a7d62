//! The gateway loop
//!
//! One from-network, any number of target networks (at most one per mode)
//! and one routing engine. Every tick clocks all of them, drains each
//! network's receive queue through [`Data`] and writes whatever the active
//! route produced to its target. A route ends when its input signals the
//! end and every queued block is out, or when the input falls silent for
//! [`WATCHDOG`].

use std::time::Duration;

use dv_protocol::Timer;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::data::{Data, Direction, Route};
use crate::error::GatewayError;
use crate::network::Network;
use crate::transcoder::Transcoder;

/// Loop period
pub const TICK: Duration = Duration::from_millis(5);
/// Silence after which an unterminated stream is ended
pub const WATCHDOG: Duration = Duration::from_millis(1500);

/// Commands accepted by [`Gateway::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCommand {
    /// Close every network and return
    Shutdown,
    /// Reload the ID tables now
    Reload,
}

/// Which network a route reads from or writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    From,
    To(usize),
}

/// The device handshake waits on the serial line, so it runs off the runtime
async fn open_transcoder(
    mut transcoder: Box<dyn Transcoder>,
) -> Result<Box<dyn Transcoder>, GatewayError> {
    tokio::task::spawn_blocking(move || transcoder.open().map(|()| transcoder))
        .await
        .map_err(|e| GatewayError::Transcoder(format!("handshake task failed: {e}")))?
}

pub struct Gateway {
    from: Network,
    to: Vec<Network>,
    data: Data,
    watchdog: Timer,
}

impl Gateway {
    pub fn new(from: Network, to: Vec<Network>, data: Data) -> Self {
        Self {
            from,
            to,
            data,
            watchdog: Timer::new(WATCHDOG),
        }
    }

    /// Open the transcoder and every network, load the ID tables
    pub async fn open(
        config: &GatewayConfig,
        transcoder: Option<Box<dyn Transcoder>>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;
        let transcoder = match transcoder {
            Some(transcoder) => Some(open_transcoder(transcoder).await?),
            None => None,
        };
        let data = Data::from_config(config, transcoder)?;

        let from = Network::open(&config.from).await?;
        let mut to = Vec::with_capacity(config.to.len());
        for network in &config.to {
            to.push(Network::open(network).await?);
        }
        info!(
            "Gateway from {} to {}",
            from.mode(),
            to.iter()
                .map(|n| n.mode().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self::new(from, to, data))
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    /// One pass of the loop after `ms` milliseconds
    pub fn clock(&mut self, ms: u64) {
        self.from.clock(ms);
        for network in &mut self.to {
            network.clock(ms);
        }
        self.data.clock(ms);

        self.drain(Side::From);
        for i in 0..self.to.len() {
            self.drain(Side::To(i));
        }
        self.forward();
        self.check_watchdog(ms);
    }

    fn network(&mut self, side: Side) -> &mut Network {
        match side {
            Side::From => &mut self.from,
            Side::To(i) => &mut self.to[i],
        }
    }

    /// Read everything queued on one network, forwarding as it goes
    fn drain(&mut self, side: Side) {
        let direction = match side {
            Side::From => Direction::FromNetwork,
            Side::To(i) => Direction::ToNetwork(self.to[i].mode()),
        };

        loop {
            self.data.set_direction(direction);
            let network = match side {
                Side::From => &mut self.from,
                Side::To(i) => &mut self.to[i],
            };
            if !network.has_data() || !network.read(&mut self.data) {
                break;
            }
            self.forward();
        }
    }

    fn source(&self, route: &Route) -> Option<Side> {
        match route.direction {
            Direction::FromNetwork => Some(Side::From),
            Direction::ToNetwork(mode) => self.to.iter().position(|n| n.mode() == mode).map(Side::To),
        }
    }

    fn target(&self, route: &Route) -> Option<Side> {
        match route.direction {
            Direction::FromNetwork => self
                .to
                .iter()
                .position(|n| n.mode() == route.output)
                .map(Side::To),
            Direction::ToNetwork(_) => Some(Side::From),
        }
    }

    /// Write the active route's output and end it once drained
    fn forward(&mut self) {
        let Some(route) = self.data.route() else {
            return;
        };
        let (source, target) = (self.source(route), self.target(route));
        let (Some(source), Some(target)) = (source, target) else {
            warn!("No {} network for the active route", route.output);
            self.data.reset();
            return;
        };

        let network = match target {
            Side::From => &mut self.from,
            Side::To(i) => &mut self.to[i],
        };
        network.write(&mut self.data);
        network.write_raw(&mut self.data);

        if self.data.is_end() {
            if let Some(route) = self.data.route() {
                info!("{} -> {} transmission finished", route.input, route.output);
            }
            self.data.reset();
            self.network(source).reset();
            self.network(target).reset();
            self.watchdog.stop();
        }
    }

    fn check_watchdog(&mut self, ms: u64) {
        if self.data.take_activity() {
            self.watchdog.start();
            return;
        }
        self.watchdog.clock(ms);
        if !self.watchdog.has_expired() {
            return;
        }
        self.watchdog.stop();

        if self.data.route().is_some() {
            warn!("Stream went silent, ending it");
            self.data.terminate();
            self.forward();
        } else {
            debug!("Watchdog expired with no active route");
        }
    }

    /// Run until shut down, clocking every [`TICK`]
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<GatewayCommand>) {
        info!("Gateway started");
        let mut timer = interval(TICK);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    match cmd {
                        GatewayCommand::Shutdown => {
                            info!("Gateway shutdown requested");
                            break;
                        }
                        GatewayCommand::Reload => {
                            info!("Reloading ID tables");
                            self.data.reload_lookups();
                        }
                    }
                }
                _ = timer.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last).as_millis() as u64;
                    last = now;
                    self.clock(elapsed);
                }
            }
        }

        self.close();
        info!("Gateway stopped");
    }

    /// Close every network and the transcoder
    pub fn close(&mut self) {
        self.from.close();
        for network in &mut self.to {
            network.close();
        }
        self.data.close();
    }
}
