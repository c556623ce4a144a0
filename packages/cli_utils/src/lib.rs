#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the `site_scout` binary.
//!
//! A generation run reports percent-complete checkpoints (data loaded,
//! density evaluated, candidates filtered, artifact stored, sites
//! clustered). [`IndicatifProgress::run_bar`] renders them as one bar per
//! run that ends with the run's status line. [`init_logger`] routes `log`
//! output through the same [`MultiProgress`] so log lines print above the
//! bar instead of tearing it.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use site_scout_density::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// Percent bar for one opportunity-map generation run.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied when the run announces its total; until then the bar spins.
    percent_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Adds a spinner labelled `subcategory` to `multi`. The spinner turns
    /// into a percent bar when the run calls
    /// [`ProgressCallback::set_total()`].
    #[must_use]
    pub fn run_bar(multi: &MultiProgress, subcategory: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(subcategory.to_string());
        bar.set_message("starting");

        let percent_style = ProgressStyle::with_template(
            "{prefix:.bold} {wide_bar:.cyan/dim} {percent:>3}% {msg} [{elapsed}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");

        Arc::new(Self { bar, percent_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_style(self.percent_style.clone());
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.disable_steady_tick();
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge` and returns
/// the [`MultiProgress`] that run bars must be added to.
///
/// Logs at `info` unless `RUST_LOG` says otherwise.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A logger may already be installed when called twice in one process.
    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}
