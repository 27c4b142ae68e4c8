//! Stepwise — terminal player.
//!
//! Loads a script, then plays it one step per Enter or on the pulse clock,
//! writing every executed step to stdout as a JSON line.

pub mod config;
pub mod error;
pub mod runner;
pub mod state;
