//! Domain model and playback rules.

mod dispatch;
pub mod entities;
pub mod events;
pub mod score;
pub mod sequence;
pub mod step;
pub mod timeline;
pub mod world;
