//! Per-instance VIA settings.

/// Construction-time settings for one VIA instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ViaConfig {
    /// Instance name, e.g. `"VIA1"`. Tags snapshot sections and log output.
    pub name: String,
    /// Cycles between the bus cycle the CPU reports for a store and the
    /// cycle the chip latches it.
    pub write_offset: u64,
}

impl ViaConfig {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for ViaConfig {
    fn default() -> Self {
        Self {
            name: "VIA".to_string(),
            write_offset: 0,
        }
    }
}
