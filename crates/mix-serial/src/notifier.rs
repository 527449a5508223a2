//! User notifications for startup failures

/// Tells the user something went wrong that they have to fix
///
/// Only startup-fatal conditions are reported through this; everything else
/// retries quietly.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn notify(&self, title: &str, message: &str) {
        self(title, message)
    }
}
