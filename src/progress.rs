//! Terminal progress for update jobs
//!
//! Spinners cover file reading and lockfile regeneration; a bar counts the
//! dependency checks. Everything is a no-op when disabled (quiet or JSON output).

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const BAR_TEMPLATE: &str = "{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {pos}/{len}";

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

pub struct Progress {
    enabled: bool,
    bar: Option<ProgressBar>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn replace(&mut self, bar: ProgressBar) {
        self.finish_and_clear();
        bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar = Some(bar);
    }

    /// Spinner for work of unknown length
    pub fn spinner(&mut self, message: &str) {
        if !self.enabled {
            return;
        }
        let spinner = ProgressBar::new_spinner().with_style(spinner_style());
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.replace(spinner);
    }

    /// Bar counting `total` dependency checks
    pub fn start(&mut self, total: u64, message: &str) {
        if !self.enabled || total == 0 {
            return;
        }
        let bar = ProgressBar::new(total).with_style(bar_style());
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.replace(bar);
    }

    pub fn inc(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn finish_and_clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_draws_nothing() {
        let mut progress = Progress::disabled();
        assert!(!progress.is_enabled());
        progress.spinner("Reading dependency files...");
        assert!(progress.bar.is_none());
        progress.start(3, "Checking dependencies");
        progress.inc();
        progress.set_message("Checking business");
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_start_replaces_spinner() {
        let mut progress = Progress::new(true);
        progress.spinner("Reading dependency files...");
        progress.start(2, "Checking dependencies");
        progress.inc();
        assert_eq!(progress.bar.as_ref().map(|b| b.position()), Some(1));
        progress.finish_and_clear();
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_empty_job_has_no_bar() {
        let mut progress = Progress::new(true);
        progress.start(0, "Checking dependencies");
        assert!(progress.bar.is_none());
    }
}
