//! Terminal progress for the `update` and `download` commands.
//!
//! Download progress arrives as a fraction, so the bar runs over per-mille
//! units and renders a percentage. Indeterminate phases (checking,
//! extracting) reuse the same bar as a message.
//!
//! # Environment Variables
//!
//! - `OTA_NO_PROGRESS`: set to any value to hide all progress output

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use std::time::Duration;

/// Environment variable that disables progress output.
pub const NO_PROGRESS_ENV: &str = "OTA_NO_PROGRESS";

const SCALE: u64 = 1000;

/// True when `OTA_NO_PROGRESS` is set.
#[must_use]
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// Progress bar for one update cycle.
#[derive(Debug, Clone)]
pub struct UpdateProgress {
    inner: IndicatifBar,
}

impl UpdateProgress {
    /// A visible bar, unless `enabled` is false or progress is disabled globally.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        let inner = if !enabled || is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(SCALE);
            bar.set_style(bar_style());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };
        Self { inner }
    }

    /// A bar that never draws.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Label for the current phase of the cycle.
    pub fn set_phase(&self, phase: impl Into<String>) {
        self.inner.set_message(phase.into());
    }

    /// Moves the bar to `fraction` (clamped to `0.0..=1.0`).
    pub fn set_fraction(&self, fraction: f64) {
        self.inner.set_position(fraction_to_position(fraction));
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }

    /// Current position in per-mille units.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.inner.position()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn fraction_to_position(fraction: f64) -> u64 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * SCALE as f64).round() as u64
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
        .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("━╸━"))
}
