//! DMR and NXDN ID to callsign tables
//!
//! The files are the usual `id callsign [name ...]` dumps; separators may be
//! whitespace, commas, semicolons or tabs and lines starting with `#` are
//! comments. Malformed lines are skipped. A table reloads itself from the
//! same file every `reload_hours`, keeping the old contents if the reload
//! fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dv_protocol::callsign::base_callsign;
use dv_protocol::Timer;
use tracing::{debug, info, warn};

use crate::error::GatewayError;

/// Bidirectional numeric ID / callsign table
#[derive(Debug, Clone, Default)]
pub struct IdLookup {
    file: Option<PathBuf>,
    by_id: HashMap<u32, String>,
    by_callsign: HashMap<String, u32>,
    timer: Option<Timer>,
}

impl IdLookup {
    /// An empty table that never matches
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `file` and arrange for it to be reloaded every `reload_hours`
    ///
    /// A zero reload period disables reloading.
    pub fn load(file: impl AsRef<Path>, reload_hours: u32) -> Result<Self, GatewayError> {
        let file = file.as_ref().to_path_buf();
        let mut lookup = Self {
            file: Some(file),
            ..Self::default()
        };
        lookup.reload()?;

        let mut timer = Timer::from_hours(reload_hours);
        timer.start();
        lookup.timer = Some(timer);
        Ok(lookup)
    }

    /// Build a table from already-read file contents
    pub fn from_text(text: &str) -> Self {
        let mut lookup = Self::default();
        lookup.parse(text);
        lookup
    }

    /// Re-read the file now
    pub fn reload(&mut self) -> Result<(), GatewayError> {
        let Some(file) = self.file.clone() else {
            return Ok(());
        };
        let text = std::fs::read_to_string(&file).map_err(|e| GatewayError::Lookup {
            file: file.display().to_string(),
            reason: e.to_string(),
        })?;
        self.parse(&text);
        info!(
            "Loaded {} IDs from {}",
            self.by_id.len(),
            file.display()
        );
        Ok(())
    }

    fn parse(&mut self, text: &str) {
        self.by_id.clear();
        self.by_callsign.clear();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line
                .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
                .filter(|f| !f.is_empty());
            let (Some(id), Some(callsign)) = (fields.next(), fields.next()) else {
                debug!("Skipping lookup line {line:?}");
                continue;
            };
            let Ok(id) = id.parse::<u32>() else {
                debug!("Skipping lookup line {line:?}");
                continue;
            };
            let callsign = callsign.to_ascii_uppercase();
            self.by_callsign.entry(callsign.clone()).or_insert(id);
            self.by_id.insert(id, callsign);
        }
    }

    /// Drive the reload timer
    pub fn clock(&mut self, ms: u64) {
        let Some(timer) = self.timer.as_mut() else {
            return;
        };
        timer.clock(ms);
        if !timer.has_expired() {
            return;
        }
        timer.start();
        if let Err(e) = self.reload() {
            warn!("Keeping the previous table: {e}");
        }
    }

    /// Callsign for a numeric ID
    pub fn find_callsign(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Numeric ID for a callsign; suffixes and module letters are ignored
    pub fn find_id(&self, callsign: &str) -> Option<u32> {
        self.by_callsign.get(&base_callsign(callsign)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# id callsign name\n\
        1234567 N0CALL Test\n\
        2345678,k1abc,Other\n\
        3456789;N0CALL;Second ID\n\
        garbage line\n\
        \n\
        65\tW1AW\n";

    #[test]
    fn test_parse_formats() {
        let lookup = IdLookup::from_text(SAMPLE);
        assert_eq!(lookup.len(), 4);
        assert_eq!(lookup.find_callsign(2_345_678), Some("K1ABC"));
        assert_eq!(lookup.find_callsign(65), Some("W1AW"));
        assert_eq!(lookup.find_callsign(1), None);
    }

    #[test]
    fn test_callsign_uses_first_id_and_base() {
        let lookup = IdLookup::from_text(SAMPLE);
        assert_eq!(lookup.find_id("N0CALL"), Some(1_234_567));
        assert_eq!(lookup.find_id("N0CALL B"), Some(1_234_567));
        assert_eq!(lookup.find_id("n0call/p"), Some(1_234_567));
        assert_eq!(lookup.find_id("NOBODY"), None);
    }

    #[test]
    fn test_missing_file() {
        let err = IdLookup::load("/nonexistent/DMRIds.dat", 24).unwrap_err();
        assert!(matches!(err, GatewayError::Lookup { .. }));
    }

    #[test]
    fn test_reload_on_timer() {
        let path = std::env::temp_dir().join(format!("dv-lookup-{}.dat", std::process::id()));
        std::fs::write(&path, "1 AAA\n").unwrap();
        let mut lookup = IdLookup::load(&path, 1).unwrap();
        assert_eq!(lookup.find_callsign(1), Some("AAA"));

        std::fs::write(&path, "1 BBB\n").unwrap();
        lookup.clock(3_599_000);
        assert_eq!(lookup.find_callsign(1), Some("AAA"));
        lookup.clock(1_000);
        assert_eq!(lookup.find_callsign(1), Some("BBB"));

        // A vanished file keeps the previous contents
        std::fs::remove_file(&path).unwrap();
        lookup.clock(3_600_000);
        assert_eq!(lookup.find_callsign(1), Some("BBB"));
    }
}
