//! Progress reporting: thin wrapper over `indicatif` count bars.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const COUNT_TEMPLATE: &str = "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
                              it/s: {per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}";

/// Items-processed-out-of-total bar with an optional label.
pub struct ProgressScope {
    pb: ProgressBar,
}

impl ProgressScope {
    pub fn count<T: Into<String>>(label: T, total: u64) -> Self {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template(COUNT_TEMPLATE) {
            pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        let label = label.into();
        if !label.is_empty() {
            pb.set_message(label);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// `Some` only when progress output is enabled.
    pub fn count_if<T: Into<String>>(enabled: bool, label: T, total: u64) -> Option<Self> {
        enabled.then(|| Self::count(label, total))
    }

    #[inline]
    pub fn inc_items(&self, delta: u64) {
        self.pb.inc(delta);
    }

    pub fn finish<T: Into<String>>(&self, msg: T) {
        self.pb.finish_with_message(msg.into());
    }
}
