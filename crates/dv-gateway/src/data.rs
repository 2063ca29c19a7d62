//! Cross-mode routing engine
//!
//! [`Data`] is the single session object every network adapter talks to.
//! The receiving adapter reports the native addressing it parsed through
//! one of the `set_*` calls and pushes audio blocks with
//! [`Data::write_audio`]; the adapter of the chosen target pulls converted
//! blocks back out with [`Data::read_audio`].
//!
//! Classification depends on which side the traffic arrived on:
//!
//! - **From-network**: the native destination is looked up in every
//!   target mode's table in [`Mode::PRIORITY`] order, then same-mode
//!   passthrough. The first match wins and nothing fans out.
//! - **Target network**: the native destination is looked up in reverse in
//!   the table pairing the from-network's mode with this one. Traffic only
//!   ever goes back to the from-network.
//!
//! Source identities are translated through the DMR and NXDN ID tables
//! where the modes differ. A lookup that misses drops the whole transfer.

use std::collections::VecDeque;

use dv_protocol::callsign::base_callsign;
use dv_protocol::Mode;
use tracing::{debug, info, warn};

use crate::config::{FmConfig, GatewayConfig};
use crate::error::GatewayError;
use crate::lookup::IdLookup;
use crate::routing::{Destination, RouteTables};
use crate::transcoder::{Transcoder, TranscoderMode};

/// Which side of the gateway the traffic being read arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The from-network
    FromNetwork,
    /// The target network of the given mode
    ToNetwork(Mode),
}

/// The routing decision for the current transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Mode the traffic arrives in
    pub input: Mode,
    /// Mode it is sent out in
    pub output: Mode,
    pub direction: Direction,
    /// Source callsign, empty when no table names the source
    pub src_callsign: String,
    /// Source ID in the output mode's numbering, zero when not applicable
    pub src_id: u32,
    /// Address in the output mode
    pub dst: Destination,
    pub group: bool,
}

/// Who is talking, in the input mode's own terms
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Callsign(String),
    Id(u32),
    Fm,
}

/// Routing tables, lookups, transcoder access and the current session
pub struct Data {
    from_mode: Mode,
    to_modes: Vec<Mode>,
    tables: RouteTables,
    passthrough: bool,
    fm: FmConfig,
    dmr_lookup: IdLookup,
    nxdn_lookup: IdLookup,
    transcoder: Option<Box<dyn Transcoder>>,

    direction: Direction,
    route: Option<Route>,
    transcoding: bool,
    bypass: VecDeque<Vec<u8>>,
    raw: VecDeque<Vec<u8>>,
    count: usize,
    end: bool,
    activity: bool,
}

impl Data {
    /// Engine for a from-network of `from_mode` and targets of `to_modes`
    pub fn new(from_mode: Mode, to_modes: Vec<Mode>, tables: RouteTables) -> Self {
        Self {
            from_mode,
            to_modes,
            tables,
            passthrough: false,
            fm: FmConfig::default(),
            dmr_lookup: IdLookup::new(),
            nxdn_lookup: IdLookup::new(),
            transcoder: None,
            direction: Direction::FromNetwork,
            route: None,
            transcoding: false,
            bypass: VecDeque::new(),
            raw: VecDeque::new(),
            count: 0,
            end: false,
            activity: false,
        }
    }

    /// Build the engine from configuration, loading both ID tables
    pub fn from_config(
        config: &GatewayConfig,
        transcoder: Option<Box<dyn Transcoder>>,
    ) -> Result<Self, GatewayError> {
        let load = |lookup: &Option<crate::config::LookupConfig>| match lookup {
            Some(l) => IdLookup::load(&l.file, l.reload_hours),
            None => Ok(IdLookup::new()),
        };

        let mut data = Self::new(config.from.mode, config.to_modes(), config.route_tables())
            .with_passthrough(config.passthrough)
            .with_fm(config.fm.clone())
            .with_dmr_lookup(load(&config.dmr_lookup)?)
            .with_nxdn_lookup(load(&config.nxdn_lookup)?);
        data.transcoder = transcoder;
        Ok(data)
    }

    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn with_fm(mut self, fm: FmConfig) -> Self {
        self.fm = fm;
        self
    }

    pub fn with_dmr_lookup(mut self, lookup: IdLookup) -> Self {
        self.dmr_lookup = lookup;
        self
    }

    pub fn with_nxdn_lookup(mut self, lookup: IdLookup) -> Self {
        self.nxdn_lookup = lookup;
        self
    }

    pub fn with_transcoder(mut self, transcoder: Box<dyn Transcoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    pub fn from_mode(&self) -> Mode {
        self.from_mode
    }

    /// Tell the engine which network the following reads come from
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The active routing decision, if any
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Output mode of the active route
    pub fn to_mode(&self) -> Option<Mode> {
        self.route.as_ref().map(|r| r.output)
    }

    /// D-Star header: `my` is the talker, `your` the routing target
    pub fn set_dstar(&mut self, my: &str, your: &str) -> Option<Mode> {
        self.classify(
            Destination::dstar(your),
            Source::Callsign(base_callsign(my)),
            true,
        )
    }

    pub fn set_dmr(&mut self, slot: u8, src: u32, dst: u32, group: bool) -> Option<Mode> {
        self.classify(Destination::Dmr { slot, tg: dst }, Source::Id(src), group)
    }

    pub fn set_ysf(&mut self, src: &str, dg_id: u8) -> Option<Mode> {
        self.classify(
            Destination::Ysf { dg_id },
            Source::Callsign(base_callsign(src)),
            true,
        )
    }

    pub fn set_p25(&mut self, src: u32, dst: u32, group: bool) -> Option<Mode> {
        self.classify(Destination::P25 { tg: dst }, Source::Id(src), group)
    }

    pub fn set_nxdn(&mut self, src: u16, dst: u16, group: bool) -> Option<Mode> {
        self.classify(
            Destination::Nxdn { tg: dst },
            Source::Id(u32::from(src)),
            group,
        )
    }

    /// FM has no addressing; the configured FM identity stands in
    pub fn set_fm(&mut self) -> Option<Mode> {
        self.classify(Destination::Fm, Source::Fm, true)
    }

    pub fn set_m17(&mut self, src: &str, dst: &str) -> Option<Mode> {
        self.classify(
            Destination::m17(dst),
            Source::Callsign(base_callsign(src)),
            true,
        )
    }

    fn classify(&mut self, native: Destination, src: Source, group: bool) -> Option<Mode> {
        let input = native.mode();

        if let Some(route) = &self.route {
            if route.direction == self.direction && route.input == input {
                self.activity = true;
                return Some(route.output);
            }
            debug!(
                "Busy with {} -> {}, ignoring {} traffic for {}",
                route.input, route.output, input, native
            );
            return None;
        }

        let (output, dst, group) = match self.direction {
            Direction::FromNetwork => self.classify_outbound(&native, group),
            Direction::ToNetwork(_) => self.classify_return(&native, group),
        }?;

        let Some((src_callsign, src_id)) = self.resolve_source(input, &src, output) else {
            debug!(
                "No {} identity for {:?}, dropping {} -> {}",
                output, src, native, dst
            );
            return None;
        };

        if !self.set_transcoder(input, output) {
            return None;
        }

        info!(
            "{} {} ({}) -> {} {}",
            input, native, src_callsign, output, dst
        );
        self.route = Some(Route {
            input,
            output,
            direction: self.direction,
            src_callsign,
            src_id,
            dst,
            group,
        });
        self.end = false;
        self.count = 0;
        self.activity = true;
        Some(output)
    }

    /// First target whose table matches, then same-mode passthrough
    fn classify_outbound(&self, native: &Destination, group: bool) -> Option<(Mode, Destination, bool)> {
        for mode in Mode::PRIORITY {
            if mode == self.from_mode || !self.to_modes.contains(&mode) {
                continue;
            }
            if let Some(dst) = self.tables.lookup_forward(mode, native) {
                return Some((mode, dst.clone(), true));
            }
        }

        if self.passthrough && self.to_modes.contains(&self.from_mode) {
            return Some((self.from_mode, native.clone(), group));
        }
        debug!("No route for {}", native);
        None
    }

    /// Reverse lookup back toward the from-network
    fn classify_return(&self, native: &Destination, group: bool) -> Option<(Mode, Destination, bool)> {
        if native.mode() == self.from_mode {
            if self.passthrough {
                return Some((self.from_mode, native.clone(), group));
            }
            debug!("Passthrough disabled, dropping {}", native);
            return None;
        }

        match self.tables.lookup_reverse(self.from_mode, native) {
            Some(foreign) => Some((self.from_mode, foreign.clone(), true)),
            None => {
                debug!("No return route for {}", native);
                None
            }
        }
    }

    /// Translate the talker into the output mode's identity
    ///
    /// DMR and P25 share one numeric ID space; NXDN has its own.
    fn resolve_source(&self, input: Mode, src: &Source, output: Mode) -> Option<(String, u32)> {
        let numeric_nxdn = |id: u32| (id <= u32::from(u16::MAX)).then_some(id);

        match src {
            Source::Fm => {
                let id = match output {
                    Mode::Nxdn => u32::from(self.fm.nxdn_id),
                    _ => self.fm.dmr_id,
                };
                Some((self.fm.callsign.clone(), id))
            }
            Source::Callsign(callsign) => match output {
                Mode::Dmr | Mode::P25 => self
                    .dmr_lookup
                    .find_id(callsign)
                    .map(|id| (callsign.clone(), id)),
                Mode::Nxdn => self
                    .nxdn_lookup
                    .find_id(callsign)
                    .and_then(numeric_nxdn)
                    .map(|id| (callsign.clone(), id)),
                Mode::DStar | Mode::Ysf | Mode::M17 | Mode::Fm => Some((
                    callsign.clone(),
                    self.dmr_lookup.find_id(callsign).unwrap_or(0),
                )),
            },
            Source::Id(id) => {
                let id = *id;
                let own = if input == Mode::Nxdn {
                    &self.nxdn_lookup
                } else {
                    &self.dmr_lookup
                };
                let callsign = own.find_callsign(id).map(str::to_string);
                let same_space = (input == Mode::Nxdn) == (output == Mode::Nxdn);

                match output {
                    Mode::Dmr | Mode::P25 | Mode::Nxdn if same_space => {
                        Some((callsign.unwrap_or_default(), id))
                    }
                    Mode::Dmr | Mode::P25 => {
                        let callsign = callsign?;
                        let id = self.dmr_lookup.find_id(&callsign)?;
                        Some((callsign, id))
                    }
                    Mode::Nxdn => {
                        let callsign = callsign?;
                        let id = self.nxdn_lookup.find_id(&callsign).and_then(numeric_nxdn)?;
                        Some((callsign, id))
                    }
                    Mode::DStar | Mode::Ysf | Mode::M17 => callsign.map(|c| (c, id)),
                    // FM only shows the talker as metadata
                    Mode::Fm => Some((callsign.unwrap_or_else(|| id.to_string()), id)),
                }
            }
        }
    }

    /// Pick the vocoder conversion for the route, bypassing equal formats
    fn set_transcoder(&mut self, input: Mode, output: Mode) -> bool {
        let (from, to) = (
            TranscoderMode::for_mode(input),
            TranscoderMode::for_mode(output),
        );
        self.transcoding = from != to;
        if !self.transcoding {
            return true;
        }

        let Some(transcoder) = self.transcoder.as_mut() else {
            warn!("No transcoder for {from:?} -> {to:?}, dropping {input} -> {output}");
            return false;
        };
        if !transcoder.set_conversion(from, to) {
            warn!("Transcoder rejected {from:?} -> {to:?}");
            return false;
        }
        true
    }

    /// Whether reads from the current direction belong to the active route
    fn accepting(&self) -> bool {
        self.route
            .as_ref()
            .is_some_and(|r| r.direction == self.direction)
    }

    /// Queue one input-mode audio block
    pub fn write_audio(&mut self, block: &[u8]) -> bool {
        if !self.accepting() {
            return false;
        }
        self.activity = true;

        if self.transcoding {
            let Some(transcoder) = self.transcoder.as_mut() else {
                return false;
            };
            if !transcoder.write(block) {
                return false;
            }
        } else {
            self.bypass.push_back(block.to_vec());
        }
        self.count += 1;
        true
    }

    /// Take one output-mode audio block
    pub fn read_audio(&mut self) -> Option<Vec<u8>> {
        self.route.as_ref()?;
        let block = if self.transcoding {
            self.transcoder.as_mut()?.read()?
        } else {
            self.bypass.pop_front()?
        };
        self.count = self.count.saturating_sub(1);
        Some(block)
    }

    /// Queue a native non-voice frame; only same-mode routes carry them
    pub fn write_raw(&mut self, frame: &[u8]) -> bool {
        if !self.accepting() {
            return false;
        }
        if !self.route.as_ref().is_some_and(|r| r.input == r.output) {
            return false;
        }
        self.activity = true;
        self.raw.push_back(frame.to_vec());
        true
    }

    pub fn read_raw(&mut self) -> Option<Vec<u8>> {
        self.raw.pop_front()
    }

    /// The input side saw the end of the transmission
    pub fn set_end(&mut self) {
        if self.accepting() {
            self.activity = true;
            self.end = true;
        }
    }

    /// True once the end was seen and every block in flight was read out
    pub fn is_end(&self) -> bool {
        self.route.is_some() && self.end && self.count == 0
    }

    /// Force the end of the transmission, abandoning queued audio
    pub fn terminate(&mut self) {
        if self.route.is_some() {
            self.end = true;
            self.count = 0;
            self.bypass.clear();
            self.raw.clear();
        }
    }

    /// Drop the session; the routing tables stay
    pub fn reset(&mut self) {
        self.route = None;
        self.transcoding = false;
        self.bypass.clear();
        self.raw.clear();
        self.count = 0;
        self.end = false;
        self.activity = false;
    }

    /// Whether any input arrived since the last call
    pub fn take_activity(&mut self) -> bool {
        std::mem::take(&mut self.activity)
    }

    /// Drive the ID table reload timers
    pub fn clock(&mut self, ms: u64) {
        self.dmr_lookup.clock(ms);
        self.nxdn_lookup.clock(ms);
    }

    /// Reload both ID tables now
    pub fn reload_lookups(&mut self) {
        for (name, lookup) in [("DMR", &mut self.dmr_lookup), ("NXDN", &mut self.nxdn_lookup)] {
            if let Err(e) = lookup.reload() {
                warn!("{name} ID table reload failed: {e}");
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(transcoder) = self.transcoder.as_mut() {
            transcoder.close();
        }
    }
}
