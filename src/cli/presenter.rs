//! Terminal output for the record, formats and config commands.
//!
//! Status lines and the spinner go to stderr; results a script may want to
//! capture (artifact summary, config values, format table) go to stdout.

use std::time::Duration as StdDuration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

const SPINNER_TICK: StdDuration = StdDuration::from_millis(80);
const BAR_WIDTH: usize = 20;

/// Leading glyph of a status line
#[derive(Debug, Clone, Copy)]
enum Mark {
    Info,
    Ok,
    Warn,
    Fail,
}

impl Mark {
    fn glyph(self) -> ColoredString {
        match self {
            Mark::Info => "ℹ".cyan(),
            Mark::Ok => "✓".green(),
            Mark::Warn => "⚠".yellow(),
            Mark::Fail => "✗".red(),
        }
    }

    fn line(self, message: &str) -> String {
        format!("{} {}", self.glyph(), message)
    }
}

/// Presenter for CLI output formatting
#[derive(Default)]
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a spinner while the session is acquiring or recording
    pub fn show_recording_progress(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(SPINNER_TICK);
        self.spinner = Some(spinner);
    }

    pub fn update_spinner(&self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Refresh the spinner with elapsed recording time
    pub fn update_recording_progress(&self, elapsed_ms: u64, total_ms: Option<u64>) {
        self.update_spinner(&format!(
            "Recording... {}",
            self.format_progress(elapsed_ms, total_ms)
        ));
    }

    pub fn spinner_success(&mut self, message: &str) {
        self.finish_spinner(Some(Mark::Ok.line(message)));
    }

    pub fn spinner_fail(&mut self, message: &str) {
        self.finish_spinner(Some(Mark::Fail.line(message)));
    }

    pub fn stop_spinner(&mut self) {
        self.finish_spinner(None);
    }

    fn finish_spinner(&mut self, last_line: Option<String>) {
        let Some(spinner) = self.spinner.take() else {
            return;
        };
        match last_line {
            Some(line) => spinner.finish_with_message(line),
            None => spinner.finish_and_clear(),
        }
    }

    pub fn info(&self, message: &str) {
        eprintln!("{}", Mark::Info.line(message));
    }

    pub fn success(&self, message: &str) {
        eprintln!("{}", Mark::Ok.line(message));
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{}", Mark::Warn.line(message));
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", Mark::Fail.line(message));
    }

    /// Command result on stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// One row of the format support table
    pub fn format_row(&self, mime: &str, supported: bool) {
        let mark = if supported { Mark::Ok } else { Mark::Fail };
        println!("{}", mark.line(mime));
    }

    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Elapsed seconds, with a fill bar when the recording length is bounded
    pub fn format_progress(&self, elapsed_ms: u64, total_ms: Option<u64>) -> String {
        let elapsed_secs = elapsed_ms / 1000;
        let Some(total_ms) = total_ms else {
            return format!("{:>3}s", elapsed_secs);
        };

        let filled = if total_ms == 0 {
            0
        } else {
            let ratio = (elapsed_ms as f64 / total_ms as f64).min(1.0);
            (ratio * BAR_WIDTH as f64) as usize
        };

        format!(
            "[{}{}] {:>3}s / {}s",
            "█".repeat(filled).cyan(),
            "░".repeat(BAR_WIDTH - filled),
            elapsed_secs,
            total_ms / 1000
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_progress_at_start() {
        let progress = Presenter::new().format_progress(0, Some(10_000));
        assert!(progress.contains("0s / 10s"));
        assert_eq!(progress.matches('░').count(), BAR_WIDTH);
    }

    #[test]
    fn format_progress_at_half() {
        let progress = Presenter::new().format_progress(5_000, Some(10_000));
        assert!(progress.contains("5s / 10s"));
        assert_eq!(progress.matches('░').count(), BAR_WIDTH / 2);
    }

    #[test]
    fn format_progress_overrun_is_capped() {
        let progress = Presenter::new().format_progress(12_000, Some(10_000));
        assert!(progress.contains("12s / 10s"));
        assert!(!progress.contains('░'));
    }

    #[test]
    fn format_progress_zero_total() {
        let progress = Presenter::new().format_progress(1_000, Some(0));
        assert!(progress.contains("1s / 0s"));
    }

    #[test]
    fn format_progress_unbounded() {
        assert_eq!(Presenter::new().format_progress(42_000, None), " 42s");
    }

    #[test]
    fn spinner_calls_without_spinner_are_noops() {
        let mut presenter = Presenter::new();
        presenter.update_spinner("nothing");
        presenter.spinner_success("done");
        presenter.stop_spinner();
        assert!(presenter.spinner.is_none());
    }
}
