//! Notification sink that writes summaries to the log.

use crate::ports::notify_port::NotifyPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotifyPort for LogNotifier {
    /// Nothing leaves the process, so this always reports `false`.
    fn send(&self, text: &str) -> bool {
        log::info!(target: "tradefuse::notify", "{text}");
        false
    }
}
