//! Progress reporting abstraction
//!
//! Keeps indicatif out of the scanning logic.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// A handle to an active progress bar
pub trait ProgressHandle: Send + Sync {
    fn inc(&self, n: u64);
    fn finish(&self);
}

/// Factory for creating progress handles
pub trait ProgressReporter: Send + Sync {
    fn start(&self, label: &str, total: u64) -> Box<dyn ProgressHandle>;
}

/// Choose a reporter for the scanner's output mode. Profiling runs
/// report timings through the log instead of drawing bars.
pub fn reporter_for(verbose: bool, profile: bool) -> Box<dyn ProgressReporter> {
    if verbose && !profile {
        Box::new(IndicatifProgress)
    } else {
        Box::new(NoopProgress)
    }
}

/// Indicatif-based progress reporter for CLI usage
pub struct IndicatifProgress;

/// Totals below this finish too quickly for a bar to be useful
const MIN_VISIBLE_TOTAL: u64 = 64;

impl ProgressReporter for IndicatifProgress {
    fn start(&self, label: &str, total: u64) -> Box<dyn ProgressHandle> {
        if total < MIN_VISIBLE_TOTAL {
            return Box::new(NoopHandle);
        }
        let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} {}: [{{bar:40.cyan/blue}}] {{pos}}/{{len}} commits ({{per_sec}})",
                    label
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Box::new(IndicatifHandle(pb))
    }
}

struct IndicatifHandle(ProgressBar);

impl ProgressHandle for IndicatifHandle {
    fn inc(&self, n: u64) {
        self.0.inc(n);
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }
}

/// No-op progress reporter for tests, benchmarks and quiet mode
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn start(&self, _label: &str, _total: u64) -> Box<dyn ProgressHandle> {
        Box::new(NoopHandle)
    }
}

struct NoopHandle;

impl ProgressHandle for NoopHandle {
    fn inc(&self, _n: u64) {}
    fn finish(&self) {}
}
