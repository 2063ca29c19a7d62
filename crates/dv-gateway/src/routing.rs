//! Cross-mode routing tables
//!
//! Every (from-mode, to-mode) pair gets one [`BidiTable`] associating an
//! address in the from-network's mode with an address in the target mode.
//! The same table answers both directions: inbound traffic from the
//! from-network is looked up forward, traffic coming back from a target
//! network is looked up in reverse.

use std::collections::HashMap;
use std::fmt;

use dv_protocol::Mode;
use serde::{Deserialize, Serialize};

/// An ordered association table searchable from either side
///
/// Lookups are linear scans; the first matching entry in insertion order
/// wins. Duplicate keys are allowed and simply shadowed.
#[derive(Debug, Clone, PartialEq)]
pub struct BidiTable<F, L> {
    entries: Vec<(F, L)>,
}

impl<F, L> Default for BidiTable<F, L> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: PartialEq, L: PartialEq> BidiTable<F, L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, foreign: F, local: L) {
        self.entries.push((foreign, local));
    }

    /// Local value of the first entry whose foreign key matches
    pub fn lookup_forward(&self, foreign: &F) -> Option<&L> {
        self.entries
            .iter()
            .find(|(f, _)| f == foreign)
            .map(|(_, l)| l)
    }

    /// Foreign key of the first entry whose local value matches
    pub fn lookup_reverse(&self, local: &L) -> Option<&F> {
        self.entries
            .iter()
            .find(|(_, l)| l == local)
            .map(|(f, _)| f)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(F, L)> {
        self.entries.iter()
    }
}

impl<F: PartialEq, L: PartialEq> FromIterator<(F, L)> for BidiTable<F, L> {
    fn from_iter<I: IntoIterator<Item = (F, L)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A routable address in one mode
///
/// D-Star and M17 route on a callsign (reflector or destination), DMR on
/// slot and talkgroup, System Fusion on DG-ID, P25 and NXDN on a talkgroup.
/// FM carries no addressing at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Destination {
    DStar { callsign: String },
    Dmr { slot: u8, tg: u32 },
    Ysf { dg_id: u8 },
    P25 { tg: u32 },
    Nxdn { tg: u16 },
    Fm,
    M17 { callsign: String },
}

impl Destination {
    /// D-Star destination from a raw `your` field
    pub fn dstar(callsign: &str) -> Self {
        Destination::DStar {
            callsign: callsign.trim().to_ascii_uppercase(),
        }
    }

    /// M17 destination from a decoded callsign
    pub fn m17(callsign: &str) -> Self {
        Destination::M17 {
            callsign: callsign.trim().to_ascii_uppercase(),
        }
    }

    /// The mode this address belongs to
    pub fn mode(&self) -> Mode {
        match self {
            Destination::DStar { .. } => Mode::DStar,
            Destination::Dmr { .. } => Mode::Dmr,
            Destination::Ysf { .. } => Mode::Ysf,
            Destination::P25 { .. } => Mode::P25,
            Destination::Nxdn { .. } => Mode::Nxdn,
            Destination::Fm => Mode::Fm,
            Destination::M17 { .. } => Mode::M17,
        }
    }

    /// Canonical form used for matching: callsigns trimmed and upper-cased
    pub fn normalized(self) -> Self {
        match self {
            Destination::DStar { callsign } => Destination::dstar(&callsign),
            Destination::M17 { callsign } => Destination::m17(&callsign),
            other => other,
        }
    }

    /// Numeric talkgroup for DMR, P25 and NXDN destinations
    pub fn talkgroup(&self) -> Option<u32> {
        match self {
            Destination::Dmr { tg, .. } | Destination::P25 { tg } => Some(*tg),
            Destination::Nxdn { tg } => Some(u32::from(*tg)),
            _ => None,
        }
    }

    /// Callsign for D-Star and M17 destinations
    pub fn callsign(&self) -> Option<&str> {
        match self {
            Destination::DStar { callsign } | Destination::M17 { callsign } => Some(callsign),
            _ => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::DStar { callsign } => write!(f, "D-Star {callsign}"),
            Destination::Dmr { slot, tg } => write!(f, "DMR TS{slot} TG{tg}"),
            Destination::Ysf { dg_id } => write!(f, "YSF DG-ID {dg_id}"),
            Destination::P25 { tg } => write!(f, "P25 TG{tg}"),
            Destination::Nxdn { tg } => write!(f, "NXDN TG{tg}"),
            Destination::Fm => f.write_str("FM"),
            Destination::M17 { callsign } => write!(f, "M17 {callsign}"),
        }
    }
}

/// All routing tables, keyed by (from-mode, to-mode)
#[derive(Debug, Clone, Default)]
pub struct RouteTables {
    tables: HashMap<(Mode, Mode), BidiTable<Destination, Destination>>,
}

impl RouteTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to the table named by the two addresses' modes
    pub fn add(&mut self, from: Destination, to: Destination) {
        let key = (from.mode(), to.mode());
        self.tables
            .entry(key)
            .or_default()
            .insert(from.normalized(), to.normalized());
    }

    pub fn table(&self, from: Mode, to: Mode) -> Option<&BidiTable<Destination, Destination>> {
        self.tables.get(&(from, to))
    }

    /// Target address for traffic leaving the from-network
    pub fn lookup_forward(&self, to: Mode, from: &Destination) -> Option<&Destination> {
        self.table(from.mode(), to)?.lookup_forward(from)
    }

    /// From-network address for traffic coming back from a target network
    pub fn lookup_reverse(&self, from: Mode, to: &Destination) -> Option<&Destination> {
        self.table(from, to.mode())?.lookup_reverse(to)
    }

    /// Number of entries across every table
    pub fn len(&self) -> usize {
        self.tables.values().map(BidiTable::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let mut table = BidiTable::new();
        table.insert("A", 1);
        table.insert("A", 2);
        table.insert("B", 1);
        assert_eq!(table.lookup_forward(&"A"), Some(&1));
        assert_eq!(table.lookup_reverse(&1), Some(&"A"));
        assert_eq!(table.lookup_reverse(&2), Some(&"A"));
        assert_eq!(table.lookup_forward(&"C"), None);
    }

    #[test]
    fn test_empty_table_never_matches() {
        let table: BidiTable<u8, u8> = BidiTable::new();
        assert!(table.is_empty());
        assert_eq!(table.lookup_forward(&0), None);
        assert_eq!(table.lookup_reverse(&0), None);
    }

    #[test]
    fn test_route_tables() {
        let mut tables = RouteTables::new();
        tables.add(
            Destination::DStar {
                callsign: "testbm ".into(),
            },
            Destination::Dmr { slot: 1, tg: 9 },
        );
        tables.add(Destination::dstar("TESTBM"), Destination::Ysf { dg_id: 10 });

        assert_eq!(
            tables.lookup_forward(Mode::Dmr, &Destination::dstar("TESTBM  ")),
            Some(&Destination::Dmr { slot: 1, tg: 9 })
        );
        assert_eq!(
            tables.lookup_reverse(Mode::DStar, &Destination::Ysf { dg_id: 10 }),
            Some(&Destination::dstar("TESTBM"))
        );
        assert_eq!(tables.lookup_forward(Mode::P25, &Destination::dstar("TESTBM")), None);
        assert_eq!(tables.len(), 2);
    }

    #[test]
    fn test_destination_json() {
        let dst: Destination = serde_json::from_str(r#"{"mode":"dmr","slot":2,"tg":91}"#).unwrap();
        assert_eq!(dst, Destination::Dmr { slot: 2, tg: 91 });
        let fm: Destination = serde_json::from_str(r#"{"mode":"fm"}"#).unwrap();
        assert_eq!(fm.mode(), Mode::Fm);
        assert_eq!(Destination::Nxdn { tg: 65 }.talkgroup(), Some(65));
    }
}
