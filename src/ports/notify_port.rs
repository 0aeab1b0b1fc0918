//! Human notification port trait.

pub trait NotifyPort: Send + Sync {
    /// Deliver a one-line summary. Returns whether the message left the process.
    fn send(&self, text: &str) -> bool;
}
