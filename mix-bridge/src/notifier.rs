//! Notifier that reports through the log

use mix_serial::Notifier;
use tracing::error;

/// Surfaces startup failures as `error` log records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, message: &str) {
        error!(title, "{}", message);
    }
}
