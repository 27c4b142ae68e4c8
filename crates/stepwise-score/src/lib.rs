//! Stepwise — score model and playback.
//!
//! Owns the Score/Sequence/Step/Character/Location model, the sequence
//! advance policies (repeat, bounded counts, shuffle), the sequence queue,
//! delayed dispatch on a virtual timeline, and the `StepExecuted` events that
//! presentation layers consume.

pub mod application;
pub mod domain;

pub use domain::entities::{Character, Item, ItemKind, Location};
pub use domain::events::{STEP_EXECUTED_EVENT_TYPE, ScoreEvent, ScoreEventKind, StepExecuted};
pub use domain::score::{PlaybackOptions, Score, ScoreMetadata};
pub use domain::sequence::Sequence;
pub use domain::step::{Command, OptionDestination, Step, StepId, StepTarget};
pub use domain::timeline::{ScheduledTask, TaskAction, TaskId, Timeline};
pub use domain::world::{Palette, SpeechTone, TemperatureUnits, Timing, Weather};
pub use application::query_handlers::{CharacterView, ScoreView, score_view};
