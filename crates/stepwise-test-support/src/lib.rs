//! Shared test doubles and utilities for the Stepwise playback engine.

mod clock;
mod rng;

pub use clock::{FixedClock, ManualClock, epoch};
pub use rng::{MockRng, SequenceRng};
