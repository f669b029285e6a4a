//! Write progress rendering

use crate::service::FlashProgress;
use crate::surface::LogSink;

/// Width of the progress bar in cells
pub const BAR_WIDTH: usize = 50;

/// Rounded completion percentage (0..=100)
///
/// A zero total counts as complete.
pub fn percent(bytes_written: usize, total_bytes: usize) -> u8 {
    if total_bytes == 0 {
        return 100;
    }
    let written = bytes_written.min(total_bytes) as f64;
    (written / total_bytes as f64 * 100.0).round() as u8
}

/// Fixed-width bar for a percentage: `round(percent / 2)` filled cells
pub fn bar(percent: u8) -> String {
    let filled = ((percent.min(100) as f64) / 2.0).round() as usize;
    let mut out = String::with_capacity(BAR_WIDTH + 2);
    out.push('[');
    out.extend(std::iter::repeat('=').take(filled));
    out.extend(std::iter::repeat(' ').take(BAR_WIDTH - filled));
    out.push(']');
    out
}

/// Progress line as shown on the log surface (without the leading `\r`)
pub fn progress_line(bytes_written: usize, total_bytes: usize) -> String {
    let p = percent(bytes_written, total_bytes);
    format!("Flashing progress: {}% {}", p, bar(p))
}

/// Progress sink that redraws a progress line on a [`LogSink`]
///
/// Reports that do not advance past the previous one are dropped.
pub struct LogProgress<'a, L: LogSink + ?Sized> {
    log: &'a mut L,
    last: Option<usize>,
}

impl<'a, L: LogSink + ?Sized> LogProgress<'a, L> {
    /// Wrap a log surface
    pub fn new(log: &'a mut L) -> Self {
        Self { log, last: None }
    }

    /// Highest `bytes_written` reported so far
    pub fn last_reported(&self) -> Option<usize> {
        self.last
    }
}

impl<L: LogSink + ?Sized> FlashProgress for LogProgress<'_, L> {
    fn update(&mut self, bytes_written: usize, total_bytes: usize) {
        if matches!(self.last, Some(last) if bytes_written <= last) {
            log::trace!("Ignoring stale progress {}/{}", bytes_written, total_bytes);
            return;
        }
        self.last = Some(bytes_written);
        self.log
            .write(&format!("\r{}", progress_line(bytes_written, total_bytes)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 1000), 0);
        assert_eq!(percent(400, 1000), 40);
        assert_eq!(percent(1, 200), 1); // 0.5 rounds up
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1000, 1000), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn test_bar() {
        assert_eq!(bar(0), format!("[{}]", " ".repeat(50)));
        assert_eq!(bar(100), format!("[{}]", "=".repeat(50)));
        assert_eq!(bar(40), format!("[{}{}]", "=".repeat(20), " ".repeat(30)));
        // 33 / 2 = 16.5 rounds to 17
        assert_eq!(bar(33), format!("[{}{}]", "=".repeat(17), " ".repeat(33)));
        assert_eq!(bar(33).len(), 52);
    }

    #[test]
    fn test_log_progress_redraws_one_line() {
        let mut log = MemorySurface::new();
        log.write_line("Writing...");
        {
            let mut sink = LogProgress::new(&mut log);
            sink.update(0, 200);
            sink.update(80, 200);
            sink.update(80, 200);
            sink.update(60, 200);
            assert_eq!(sink.last_reported(), Some(80));
        }
        assert_eq!(
            log.lines(),
            vec!["Writing...".to_string(), progress_line(80, 200)]
        );
        assert!(log.contains("Flashing progress: 40% [===================="));
    }
}
