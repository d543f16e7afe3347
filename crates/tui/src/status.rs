//! Status line orchestration: turns clock notifications into frame updates.

use std::{io::Write, sync::Arc};

use capworld_core::{ClockObserver, SimulationClock, SpeedLevel};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::terminal::{FrameRenderer, RowSource};

const BALANCE_COLUMN: usize = 24;
const DATE_COLUMN: usize = 24;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format a whole-unit amount with thousands separators, e.g. `-$1,234,567`.
pub fn format_money(amount: i64, symbol: &str) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{symbol}{grouped}")
}

/// Lay out the balance, date and speed columns.
pub fn format_status(
    balance: i64,
    symbol: &str,
    time: DateTime<Utc>,
    speed: SpeedLevel,
) -> String {
    let balance = format!("Balance: {}", format_money(balance, symbol));
    let date = format!("Date: {}", time.format(DATE_FORMAT));
    format!(
        "{balance:<BALANCE_COLUMN$}{date:<DATE_COLUMN$}Speed: {}",
        speed.label()
    )
}

pub struct StatusLine<W, R> {
    clock: Arc<SimulationClock>,
    renderer: Arc<FrameRenderer<W, R>>,
    prompt: String,
    currency_symbol: String,
    balance: Mutex<i64>,
    /// Newest simulated time painted so far. Older notifications are stale.
    shown: Mutex<DateTime<Utc>>,
}

impl<W: Write + Send, R: RowSource> StatusLine<W, R> {
    pub fn new(
        clock: Arc<SimulationClock>,
        renderer: Arc<FrameRenderer<W, R>>,
        prompt: impl Into<String>,
        currency_symbol: impl Into<String>,
        balance: i64,
    ) -> Self {
        Self {
            clock,
            renderer,
            prompt: prompt.into(),
            currency_symbol: currency_symbol.into(),
            balance: Mutex::new(balance),
            shown: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn currency_symbol(&self) -> &str {
        &self.currency_symbol
    }

    pub fn balance(&self) -> i64 {
        *self.balance.lock()
    }

    pub fn set_balance(&self, balance: i64) {
        *self.balance.lock() = balance;
    }

    fn compose(&self, time: DateTime<Utc>) -> String {
        format_status(
            self.balance(),
            &self.currency_symbol,
            time,
            self.clock.current_speed_level(),
        )
    }

    /// Status text for the clock's current time.
    pub fn current_status(&self) -> String {
        self.compose(self.clock.current_simulated_time())
    }

    /// Paint the whole frame with fresh status text.
    pub fn render_prompt(&self) {
        let mut shown = self.shown.lock();
        let time = self.clock.current_simulated_time();
        *shown = time.max(*shown);
        let status = self.compose(time);
        if let Err(err) = self.renderer.render_full(&self.prompt, &status) {
            warn!(error = %err, "failed to render prompt");
        }
    }
}

impl<W: Write + Send, R: RowSource> ClockObserver for StatusLine<W, R> {
    fn simulated_time_changed(&self, time: DateTime<Utc>) {
        let mut shown = self.shown.lock();
        if time < *shown {
            debug!(%time, shown = %*shown, "skipping stale clock notification");
            return;
        }
        *shown = time;
        let status = self.compose(time);
        if let Err(err) = self.renderer.update_status_only(&status) {
            warn!(error = %err, "failed to update status line");
        }
    }
}
