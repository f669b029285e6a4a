//! User-facing surfaces
//!
//! Two things are shown to the user: a log text area and the two controls
//! (connect/disconnect and flash). Both are write-only from the pipeline's
//! point of view. A log write starting with `\r` replaces the current line,
//! which is how progress is redrawn.

use crate::session::Stage;

/// Append-only text sink
pub trait LogSink {
    /// Remove all text
    fn clear(&mut self);

    /// Append text without a line break
    fn write(&mut self, text: &str);

    /// Append a line
    fn write_line(&mut self, line: &str) {
        self.write(line);
        self.write("\n");
    }
}

/// Label shown on the connect control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectLabel {
    /// "Connect"
    Connect,
    /// "Disconnect"
    Disconnect,
}

impl ConnectLabel {
    /// Text for the control
    pub fn text(&self) -> &'static str {
        match self {
            Self::Connect => "1. Connect device",
            Self::Disconnect => "Disconnect",
        }
    }
}

/// Enabled state and labels of the controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    /// Connect/disconnect control enabled
    pub connect_enabled: bool,
    /// Connect/disconnect control label
    pub connect_label: ConnectLabel,
    /// Flash control enabled
    pub flash_enabled: bool,
}

impl Affordances {
    /// Initial state: ready to connect, nothing to flash
    pub const READY_TO_CONNECT: Affordances = Affordances {
        connect_enabled: true,
        connect_label: ConnectLabel::Connect,
        flash_enabled: false,
    };
}

/// Receives control state changes
pub trait ControlSurface {
    /// Show the given control state
    fn apply(&mut self, affordances: &Affordances);

    /// Called on every stage transition of a flashing attempt
    fn stage_changed(&mut self, _stage: Stage) {}
}

/// Surface that keeps everything in memory
///
/// Carriage returns are honoured: text after a `\r` overwrites the current
/// line, as on a terminal. Control changes and stage transitions are
/// recorded in order.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    lines: Vec<String>,
    clears: usize,
    controls: Vec<Affordances>,
    stages: Vec<Stage>,
}

impl MemorySurface {
    /// Create an empty surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines currently shown (the last one may be unterminated)
    pub fn lines(&self) -> Vec<&str> {
        let mut lines: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        if lines.last() == Some(&"") {
            lines.pop();
        }
        lines
    }

    /// Full text
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    /// How many times the log was cleared
    pub fn clear_count(&self) -> usize {
        self.clears
    }

    /// Every control state applied, oldest first
    pub fn control_history(&self) -> &[Affordances] {
        &self.controls
    }

    /// Control state currently shown
    pub fn controls(&self) -> Option<&Affordances> {
        self.controls.last()
    }

    /// Every stage entered, oldest first
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

impl LogSink for MemorySurface {
    fn clear(&mut self) {
        self.lines.clear();
        self.clears += 1;
    }

    fn write(&mut self, text: &str) {
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        for (i, segment) in text.split('\n').enumerate() {
            if i > 0 {
                self.lines.push(String::new());
            }
            let mut parts = segment.split('\r');
            let first = parts.next().unwrap_or("");
            if let Some(current) = self.lines.last_mut() {
                current.push_str(first);
                for rewrite in parts {
                    current.clear();
                    current.push_str(rewrite);
                }
            }
        }
    }
}

impl ControlSurface for MemorySurface {
    fn apply(&mut self, affordances: &Affordances) {
        self.controls.push(*affordances);
    }

    fn stage_changed(&mut self, stage: Stage) {
        self.stages.push(stage);
    }
}
