//! Fixed-width, space-padded callsign fields
//!
//! D-Star and System Fusion carry callsigns as fixed-size ASCII fields padded
//! with spaces. [`Callsign`] owns that wire form; the routing layer only ever
//! sees the trimmed text.

use std::fmt;

/// A callsign padded with spaces to exactly `N` bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Callsign<const N: usize>([u8; N]);

/// D-Star callsign field (8 bytes)
pub type DStarCallsign = Callsign<8>;
/// System Fusion callsign field (10 bytes)
pub type YsfCallsign = Callsign<10>;

impl<const N: usize> Callsign<N> {
    /// Pad (or truncate) text to the field width, upper-casing it
    pub fn new(text: &str) -> Self {
        let mut field = [b' '; N];
        for (slot, b) in field.iter_mut().zip(text.bytes()) {
            *slot = b.to_ascii_uppercase();
        }
        Self(field)
    }

    /// Take a field straight from the wire; short input is space-padded
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut field = [b' '; N];
        for (slot, &b) in field.iter_mut().zip(bytes) {
            *slot = if b == 0 { b' ' } else { b };
        }
        Self(field)
    }

    /// The padded wire bytes
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Text with trailing padding removed
    pub fn trimmed(&self) -> String {
        String::from_utf8_lossy(&self.0).trim_end().to_string()
    }

    /// The base callsign: everything before the first space, `/` or `-`
    ///
    /// `"N0CALL B"`, `"N0CALL/P"` and `"N0CALL-1"` all have the base `"N0CALL"`.
    pub fn base(&self) -> String {
        base_callsign(&String::from_utf8_lossy(&self.0))
    }

    /// Whether the field is entirely blank
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&b| b == b' ')
    }
}

impl<const N: usize> Default for Callsign<N> {
    fn default() -> Self {
        Self([b' '; N])
    }
}

impl<const N: usize> fmt::Debug for Callsign<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callsign({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl<const N: usize> fmt::Display for Callsign<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.trimmed())
    }
}

/// Strip suffixes, module letters and padding from free-text callsign input
pub fn base_callsign(text: &str) -> String {
    text.trim_start()
        .split([' ', '/', '-'])
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}
