//! Cancellable debounce timer.
//!
//! [`Debouncer`] holds at most one pending timer. Scheduling a value aborts
//! the previous timer first, so a burst of edits fires once, after the quiet
//! period, with the last value.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Delays values and keeps only the latest.
///
/// Fired values are tagged with the schedule they came from. Cancelling or
/// scheduling again invalidates a value that already fired but was not
/// taken yet.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    sender: mpsc::UnboundedSender<(u64, T)>,
    receiver: mpsc::UnboundedReceiver<(u64, T)>,
    pending: Option<JoinHandle<()>>,
    sequence: u64,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Creates a debouncer with the given quiet period.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            delay,
            sender,
            receiver,
            pending: None,
            sequence: 0,
        }
    }

    /// Returns the quiet period.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `value`, replacing any pending or fired one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, value: T) {
        let replaced = self.cancel();
        let sequence = self.sequence;
        trace!(replaced, sequence, delay_ms = self.delay.as_millis(), "Scheduling debounced value");

        let sender = self.sender.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send((sequence, value));
        }));
    }

    /// Aborts the pending timer and discards a fired value not yet taken.
    ///
    /// Returns `true` if anything was dropped.
    pub fn cancel(&mut self) -> bool {
        self.sequence += 1;
        let waiting = self.pending.take().is_some_and(|handle| {
            let waiting = !handle.is_finished();
            handle.abort();
            waiting
        });
        let mut discarded = false;
        while self.receiver.try_recv().is_ok() {
            discarded = true;
        }
        waiting || discarded
    }

    /// Returns `true` while a timer is waiting to fire.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Takes the latest value if its timer already fired.
    pub fn try_fired(&mut self) -> Option<T> {
        while let Ok((sequence, value)) = self.receiver.try_recv() {
            if sequence == self.sequence {
                return Some(value);
            }
        }
        None
    }

    /// Waits for the pending timer and takes its value.
    ///
    /// Returns `None` right away if nothing is scheduled.
    pub async fn fired(&mut self) -> Option<T> {
        if let Some(value) = self.try_fired() {
            return Some(value);
        }
        while self.is_pending() {
            match self.receiver.recv().await {
                Some((sequence, value)) if sequence == self.sequence => return Some(value),
                Some(_) => {}
                None => return None,
            }
        }
        self.try_fired()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
