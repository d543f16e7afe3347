#![warn(clippy::all, missing_docs)]

//! Core domain logic for Capitalist World.
//!
//! This crate hosts the simulated game clock, the speed table it runs on,
//! and configuration handling used by the terminal frontend.

pub mod clock;
pub mod config;

pub use clock::{
    callback_context, spawn_ticker, CallbackContext, CallbackSender, ClockObserver,
    ManualTimeSource, SimulationClock, SpeedLevel, SpeedParseError, SystemTimeSource, TimeSource,
};
pub use config::AppConfig;
