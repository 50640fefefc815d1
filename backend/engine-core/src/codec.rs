//! Conversion between transport text and backend strings.
//!
//! Remote peers exchange text as UTF-16 code units ([`WireString`]); the backend works
//! with Rust `String`s. Both directions are infallible: well-formedness of the code
//! units is the transport's problem, and unpaired surrogates decode to U+FFFD.

use crate::service::StatusSnapshot;

/// Text as carried over the IPC transport: UTF-16 code units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WireString(Vec<u16>);

impl WireString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    pub fn units(&self) -> &[u16] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode little-endian code unit pairs from a protobuf `bytes` field.
    ///
    /// Returns `None` for an odd byte count.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 2 != 0 {
            return None;
        }

        let units = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Some(Self(units))
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|unit| unit.to_le_bytes()).collect()
    }
}

impl From<&str> for WireString {
    fn from(value: &str) -> Self {
        to_wire(value)
    }
}

/// Transport text to backend string.
pub fn to_native(wire: &WireString) -> String {
    String::from_utf16_lossy(&wire.0)
}

/// Backend string to transport text.
pub fn to_wire(native: &str) -> WireString {
    WireString(native.encode_utf16().collect())
}

/// [`StatusSnapshot`] with its text fields in wire form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireStatusSnapshot {
    pub last_checked_time: i64,
    pub progress: f64,
    pub current_operation: WireString,
    pub new_version: WireString,
    pub new_size: i64,
}

/// Encode a backend snapshot's text fields for the wire.
pub fn snapshot_to_wire(snapshot: &StatusSnapshot) -> WireStatusSnapshot {
    WireStatusSnapshot {
        last_checked_time: snapshot.last_checked_time,
        progress: snapshot.progress,
        current_operation: to_wire(&snapshot.current_operation),
        new_version: to_wire(&snapshot.new_version),
        new_size: snapshot.new_size,
    }
}
