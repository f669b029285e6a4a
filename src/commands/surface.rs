//! Terminal rendering of the log surface and controls

use fwprov_core::{Affordances, ControlSurface, LogSink, Stage};
use indicatif::{ProgressBar, ProgressStyle};

/// Log surface printing to the terminal
///
/// Completed lines are printed as they arrive. While the device is being
/// written, the line being redrawn with `\r` is shown on a progress bar.
pub struct TerminalSurface {
    current: String,
    bar: Option<ProgressBar>,
    printed: Vec<String>,
}

impl TerminalSurface {
    /// Create a surface
    pub fn new() -> Self {
        Self {
            current: String::new(),
            bar: None,
            printed: Vec::new(),
        }
    }

    /// Lines printed since the last clear
    pub fn printed(&self) -> &[String] {
        &self.printed
    }

    fn emit(&mut self) {
        let line = std::mem::take(&mut self.current);
        match &self.bar {
            Some(bar) => bar.println(&line),
            None => println!("{}", line),
        }
        self.printed.push(line);
    }

    fn start_bar(&mut self) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        self.bar = Some(bar);
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for TerminalSurface {
    fn clear(&mut self) {
        self.current.clear();
        self.printed.clear();
    }

    fn write(&mut self, text: &str) {
        for (i, segment) in text.split('\n').enumerate() {
            if i > 0 {
                self.emit();
            }
            let mut parts = segment.split('\r');
            self.current.push_str(parts.next().unwrap_or(""));
            for rewrite in parts {
                self.current.clear();
                self.current.push_str(rewrite);
            }
        }
        if let Some(bar) = &self.bar {
            bar.set_message(self.current.clone());
        }
    }
}

impl ControlSurface for TerminalSurface {
    fn apply(&mut self, affordances: &Affordances) {
        log::debug!(
            "Controls: [{}] {}, [flash] {}",
            affordances.connect_label.text(),
            if affordances.connect_enabled { "enabled" } else { "disabled" },
            if affordances.flash_enabled { "enabled" } else { "disabled" }
        );
    }

    fn stage_changed(&mut self, stage: Stage) {
        match stage {
            Stage::Writing => self.start_bar(),
            // The pending progress line is printed by the next line break
            Stage::Completed | Stage::Failed => self.finish_bar(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_and_carriage_returns() {
        let mut surface = TerminalSurface::new();
        surface.write_line("Writing to device...");
        surface.write("\rFlashing progress: 10%");
        surface.write("\rFlashing progress: 100%");
        surface.write_line("\n\nFlashing complete!");
        assert_eq!(
            surface.printed(),
            &[
                "Writing to device...".to_string(),
                "Flashing progress: 100%".to_string(),
                String::new(),
                "Flashing complete!".to_string(),
            ]
        );
    }

    #[test]
    fn test_clear() {
        let mut surface = TerminalSurface::new();
        surface.write_line("old");
        surface.clear();
        surface.write_line("new");
        assert_eq!(surface.printed(), &["new".to_string()]);
    }
}
