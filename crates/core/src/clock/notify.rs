//! Observer registration and the callback context notifications run on.
//!
//! The clock never calls its observer directly. Each change is posted to a
//! [`CallbackSender`] and delivered later, in posting order, by whoever owns
//! the matching [`CallbackContext`]. Observers are held weakly: once the
//! observer is dropped its pending notifications are discarded.

use std::sync::Weak;

use chrono::{DateTime, Utc};
use tokio::{
    sync::mpsc::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing::debug;

/// Receives simulated-time changes from a [`crate::SimulationClock`].
pub trait ClockObserver: Send + Sync {
    /// Called on the callback context with the clock's new simulated time.
    fn simulated_time_changed(&self, time: DateTime<Utc>);
}

struct Notification {
    observer: Weak<dyn ClockObserver>,
    time: DateTime<Utc>,
}

impl Notification {
    fn deliver(self) -> bool {
        match self.observer.upgrade() {
            Some(observer) => {
                observer.simulated_time_changed(self.time);
                true
            }
            None => false,
        }
    }
}

/// Posting half of the callback context, owned by the clock.
#[derive(Clone)]
pub struct CallbackSender {
    tx: mpsc::UnboundedSender<Notification>,
}

impl CallbackSender {
    /// Queue a notification. Returns `false` when the context has shut down.
    pub(crate) fn post(&self, observer: Weak<dyn ClockObserver>, time: DateTime<Utc>) -> bool {
        self.tx.send(Notification { observer, time }).is_ok()
    }
}

/// Delivering half: runs observer callbacks one at a time, in order.
pub struct CallbackContext {
    rx: mpsc::UnboundedReceiver<Notification>,
}

/// Create a connected sender/context pair.
pub fn callback_context() -> (CallbackSender, CallbackContext) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CallbackSender { tx }, CallbackContext { rx })
}

impl CallbackContext {
    /// Deliver notifications until every sender is gone.
    pub async fn run(mut self) {
        while let Some(notification) = self.rx.recv().await {
            notification.deliver();
        }
        debug!("callback context closed");
    }

    /// Run the context on its own tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Deliver everything currently queued without waiting.
    ///
    /// Returns how many notifications reached a live observer.
    pub fn drain(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            match self.rx.try_recv() {
                Ok(notification) => {
                    if notification.deliver() {
                        delivered += 1;
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<DateTime<Utc>>>,
    }

    impl ClockObserver for Recorder {
        fn simulated_time_changed(&self, time: DateTime<Utc>) {
            self.seen.lock().push(time);
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn delivers_in_posting_order() {
        let (sender, mut context) = callback_context();
        let recorder = Arc::new(Recorder::default());
        let weak = Arc::downgrade(&recorder);

        for hour in [1, 2, 3] {
            assert!(sender.post(weak.clone(), at(hour)));
        }

        assert_eq!(context.drain(), 3);
        assert_eq!(*recorder.seen.lock(), vec![at(1), at(2), at(3)]);
    }

    #[test]
    fn dropped_observer_is_skipped() {
        let (sender, mut context) = callback_context();
        let recorder = Arc::new(Recorder::default());
        let weak = Arc::downgrade(&recorder);
        sender.post(weak, at(4));
        drop(recorder);

        assert_eq!(context.drain(), 0);
    }

    #[tokio::test]
    async fn run_finishes_when_senders_drop() {
        let (sender, context) = callback_context();
        let recorder = Arc::new(Recorder::default());
        let weak = Arc::downgrade(&recorder);
        sender.post(weak, at(5));
        drop(sender);

        context.spawn().await.unwrap();
        assert_eq!(*recorder.seen.lock(), vec![at(5)]);
    }
}
