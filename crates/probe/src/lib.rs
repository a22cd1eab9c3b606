//! Media probe result model.
//!
//! A [`ProbeInfo`] is the parsed output of probing a media file with an
//! external tool (ffprobe's JSON report): one `format` object describing
//! the container and a list of `streams`. The exact set of keys varies
//! wildly by container and probe version, so both halves are kept as
//! loosely-typed JSON documents; the handful of fields the server
//! actually reasons about get typed accessors here. The cache crate
//! treats the whole thing as an opaque payload and only round-trips it
//! through serde.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Probe report for a single media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    /// Container-level attributes (`format_name`, `duration`, `bit_rate`, ...).
    #[serde(default)]
    pub format: Map<String, Value>,
    /// Per-stream attributes, in probe order.
    #[serde(default)]
    pub streams: Vec<Map<String, Value>>,
}

impl ProbeInfo {
    /// Short container format name, e.g. `"matroska,webm"`.
    pub fn format_name(&self) -> Option<&str> {
        self.format.get("format_name").and_then(Value::as_str)
    }

    /// Container duration.
    ///
    /// ffprobe reports this as a fractional-seconds string; anything
    /// unparseable, negative, or too large to represent counts as
    /// unknown.
    pub fn duration(&self) -> Option<Duration> {
        let seconds = self.format.get("duration")?.as_str()?.parse::<f64>().ok()?;
        Duration::try_from_secs_f64(seconds).ok()
    }

    /// Number of streams in the container.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}
