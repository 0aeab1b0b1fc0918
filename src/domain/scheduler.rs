//! Fixed-interval ticker running a callback on its own thread.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Calls `on_tick` every `interval` until stopped or dropped. The callback
/// receives the 1-based tick number and returns `false` to end the loop.
pub struct Ticker {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl Ticker {
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(u64) -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let mut ticks = 0u64;
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        ticks += 1;
                        if !on_tick(ticks) {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            ticks
        });
        Ticker {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Block until the callback ends the loop on its own. Returns the tick count.
    pub fn join(mut self) -> u64 {
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or(0)
    }

    /// Signal the loop to end, wait for the current tick, return the tick count.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
