//! Simulator log classification.
//!
//! The simulator writes both competing slots and its file-logging channel to
//! one text stream, told apart only by marker substrings. `MarkerClassifier`
//! reproduces that convention; anything that can demultiplex a line can stand
//! in for it through `LineClassifier`.

use serde::{Deserialize, Serialize};

/// Level marker preceding the slot name on heartbeat lines
pub const INFO_MARKER: &str = "INF]";

/// A slot-A line with nothing after the slot tag
pub const HEARTBEAT: &str = "INF] release:";

/// Prefix of file-logging channel payloads
pub const FILE_MARKER: &str = "file:";

/// Slot A program name as printed by the simulator
pub const SLOT_A_MARKER: &str = "release:";

/// Slot B program name as printed by the simulator
pub const SLOT_B_MARKER: &str = "release (1):";

pub const SLOT_A_LABEL: &str = "[A]";
pub const SLOT_B_LABEL: &str = "[B]";

/// One of the two competing program instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

/// Where a line of simulator output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedLine {
    /// Noise; discard
    Drop,

    /// Append `payload` to the file sink
    FileSink(String),

    /// Print `text` to the console. `slot` names the relabelled tag, if any.
    Console { slot: Option<Slot>, text: String },
}

impl ClassifiedLine {
    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Drop)
    }
}

/// Trait for demultiplexing raw simulator lines
pub trait LineClassifier: Send + Sync {
    fn classify(&self, raw_line: &str) -> ClassifiedLine;
}

/// Substring-convention classifier matching the simulator's text output
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerClassifier;

impl LineClassifier for MarkerClassifier {
    fn classify(&self, raw_line: &str) -> ClassifiedLine {
        classify(raw_line)
    }
}

/// Classify one raw line. Rules apply in order; first match wins.
pub fn classify(raw_line: &str) -> ClassifiedLine {
    let line = raw_line.trim();
    if line.is_empty() {
        return ClassifiedLine::Drop;
    }

    if is_heartbeat(line) {
        return ClassifiedLine::Drop;
    }

    if let Some(idx) = line.find(FILE_MARKER) {
        let payload = line[idx + FILE_MARKER.len()..].trim();
        return ClassifiedLine::FileSink(payload.to_string());
    }

    // Slot B chatter is suppressed entirely
    if line.contains(SLOT_B_MARKER) {
        return ClassifiedLine::Drop;
    }

    relabel(line)
}

/// The line from its first `INF]` onward is exactly the bare slot-A tag
fn is_heartbeat(line: &str) -> bool {
    let tail = match line.find(INFO_MARKER) {
        Some(idx) => &line[idx..],
        None => line,
    };
    tail.trim() == HEARTBEAT
}

/// Replace the first occurrence of each slot tag with its short label
fn relabel(line: &str) -> ClassifiedLine {
    let mut slot = None;
    let mut text = line.to_string();

    if text.contains(SLOT_B_MARKER) {
        text = text.replacen(SLOT_B_MARKER, SLOT_B_LABEL, 1);
        slot = Some(Slot::B);
    }
    if text.contains(SLOT_A_MARKER) {
        text = text.replacen(SLOT_A_MARKER, SLOT_A_LABEL, 1);
        slot = slot.or(Some(Slot::A));
    }

    if text.trim().is_empty() {
        return ClassifiedLine::Drop;
    }

    ClassifiedLine::Console { slot, text }
}
