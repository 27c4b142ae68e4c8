//! Stepwise Core — shared abstractions.
//!
//! This crate defines the host-facing seams that every other Stepwise crate
//! depends on: time, randomness, errors and the event envelope. It contains no
//! parsing or playback logic.

pub mod clock;
pub mod error;
pub mod event;
pub mod rng;
