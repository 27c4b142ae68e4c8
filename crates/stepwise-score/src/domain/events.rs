//! Domain events emitted by score playback.

use serde::{Deserialize, Serialize};
use stepwise_core::event::{DomainEvent, EventMetadata};

use super::step::Step;

/// Event type string for [`StepExecuted`].
pub const STEP_EXECUTED_EVENT_TYPE: &str = "score.step_executed";

/// Emitted for every dispatched step, immediate or delayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecuted {
    /// Id of the sequence the step was advanced from.
    pub sequence_id: String,
    /// The full step: command, content, target and command fields.
    pub step: Step,
}

/// Event payload variants for score playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScoreEventKind {
    /// A step was dispatched.
    StepExecuted(StepExecuted),
}

/// Domain event envelope for score playback.
#[derive(Debug, Clone)]
pub struct ScoreEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: ScoreEventKind,
}

impl ScoreEvent {
    /// The dispatched step, for `StepExecuted` events.
    #[must_use]
    pub fn step(&self) -> &Step {
        match &self.kind {
            ScoreEventKind::StepExecuted(payload) => &payload.step,
        }
    }
}

impl DomainEvent for ScoreEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            ScoreEventKind::StepExecuted(_) => STEP_EXECUTED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.kind).unwrap_or(serde_json::Value::Null)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
