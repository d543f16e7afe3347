//! Simulated game clock.
//!
//! Simulated time advances at a multiple of real elapsed time chosen by the
//! current [`SpeedLevel`]. Every read, speed change and periodic tick runs the
//! same advance step under one lock, so simulated time never moves backwards
//! and no interval of real time is counted twice.

mod notify;
mod source;
mod speed;
mod ticker;

use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

pub use notify::{callback_context, CallbackContext, CallbackSender, ClockObserver};
pub use source::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use speed::{SpeedLevel, SpeedParseError};
pub use ticker::{spawn_ticker, DEFAULT_TICK_INTERVAL};

struct ClockState {
    speed: SpeedLevel,
    simulated_time: DateTime<Utc>,
    last_observed_real_time: DateTime<Utc>,
    observer: Option<Weak<dyn ClockObserver>>,
}

impl ClockState {
    /// Apply the real time elapsed since the last observation at the current
    /// speed. Returns whether simulated time moved.
    fn advance(&mut self, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.last_observed_real_time);
        self.last_observed_real_time = now;

        let rate = self.speed.simulated_seconds_per_second();
        if elapsed <= Duration::zero() || rate == 0 {
            return false;
        }
        let Ok(real) = elapsed.to_std() else {
            return false;
        };

        let before = self.simulated_time;
        self.simulated_time = real
            .checked_mul(rate)
            .and_then(|simulated| Duration::from_std(simulated).ok())
            .and_then(|delta| self.simulated_time.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.simulated_time > before
    }
}

/// Thread-safe simulated clock shared by the input loop and the ticker.
pub struct SimulationClock {
    state: Mutex<ClockState>,
    source: Arc<dyn TimeSource>,
    callbacks: CallbackSender,
}

impl SimulationClock {
    /// Create a clock on the system wall clock, starting at `reference`.
    pub fn new(reference: DateTime<Utc>, speed: SpeedLevel, callbacks: CallbackSender) -> Self {
        Self::with_time_source(reference, speed, callbacks, Arc::new(SystemTimeSource))
    }

    /// Create a clock that measures real time with `source`.
    pub fn with_time_source(
        reference: DateTime<Utc>,
        speed: SpeedLevel,
        callbacks: CallbackSender,
        source: Arc<dyn TimeSource>,
    ) -> Self {
        let now = source.now();
        Self {
            state: Mutex::new(ClockState {
                speed,
                simulated_time: reference,
                last_observed_real_time: now,
                observer: None,
            }),
            source,
            callbacks,
        }
    }

    /// Register the observer notified whenever simulated time changes.
    ///
    /// The clock keeps only a weak handle; a dropped observer simply stops
    /// receiving notifications.
    pub fn set_observer(&self, observer: Weak<dyn ClockObserver>) {
        self.state.lock().observer = Some(observer);
    }

    /// Forget the registered observer.
    pub fn clear_observer(&self) {
        self.state.lock().observer = None;
    }

    /// Change the speed level.
    ///
    /// Real time elapsed so far is first applied at the previous speed; the new
    /// speed only governs time from this call onwards. The observer is
    /// notified with the resulting simulated time.
    pub fn set_speed(&self, level: SpeedLevel) {
        let mut state = self.state.lock();
        let now = self.source.now();
        state.advance(now);
        let previous = state.speed;
        state.speed = level;
        let time = state.simulated_time;
        self.post(&state, time);
        drop(state);

        info!(from = %previous, to = %level, simulated = %time, "clock speed changed");
    }

    /// Current simulated time, brought up to date with real time first.
    pub fn current_simulated_time(&self) -> DateTime<Utc> {
        let mut state = self.state.lock();
        let now = self.source.now();
        state.advance(now);
        state.simulated_time
    }

    /// Current speed level.
    pub fn current_speed_level(&self) -> SpeedLevel {
        self.state.lock().speed
    }

    /// Periodic step: advance simulated time and notify the observer when it
    /// moved. Returns whether it moved.
    pub fn tick(&self) -> bool {
        let mut state = self.state.lock();
        let now = self.source.now();
        if !state.advance(now) {
            return false;
        }
        let time = state.simulated_time;
        self.post(&state, time);
        true
    }

    // Queued while the guard is held so deliveries keep mutation order; the
    // observer itself runs later on the callback context.
    fn post(&self, state: &ClockState, time: DateTime<Utc>) {
        if let Some(observer) = state.observer.as_ref() {
            if !self.callbacks.post(observer.clone(), time) {
                debug!("callback context closed; dropping clock notification");
            }
        }
    }
}
