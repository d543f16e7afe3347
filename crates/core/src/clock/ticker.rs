//! Background task that keeps the clock moving between reads.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::debug;

use super::SimulationClock;

/// Tick period used when configuration does not say otherwise.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Spawn a task that calls [`SimulationClock::tick`] every `period` for the
/// rest of the process lifetime.
pub fn spawn_ticker(clock: Arc<SimulationClock>, period: Duration) -> JoinHandle<()> {
    let period = if period.is_zero() {
        DEFAULT_TICK_INTERVAL
    } else {
        period
    };
    debug!(period_ms = period.as_millis() as u64, "starting clock ticker");

    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            clock.tick();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{callback_context, ClockObserver, ManualTimeSource, SpeedLevel};
    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<DateTime<Utc>>>,
    }

    impl ClockObserver for Recorder {
        fn simulated_time_changed(&self, time: DateTime<Utc>) {
            self.seen.lock().push(time);
        }
    }

    #[tokio::test]
    async fn ticker_delivers_advances_through_callback_context() {
        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let source = Arc::new(ManualTimeSource::new(Utc::now()));
        let (sender, context) = callback_context();
        let clock = Arc::new(SimulationClock::with_time_source(
            start,
            SpeedLevel::X4,
            sender,
            source.clone(),
        ));
        let recorder = Arc::new(Recorder::default());
        let weak = Arc::downgrade(&recorder);
        clock.set_observer(weak);

        context.spawn();
        let ticker = spawn_ticker(clock.clone(), Duration::from_millis(5));

        source.advance(chrono::Duration::seconds(1));
        for _ in 0..200 {
            if !recorder.seen.lock().is_empty() {
                break;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        ticker.abort();

        assert_eq!(
            *recorder.seen.lock(),
            vec![start + chrono::Duration::days(1)]
        );
    }
}
