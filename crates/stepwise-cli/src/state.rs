//! Player state: one score plus the clock and RNG that drive it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stepwise_core::clock::Clock;
use stepwise_core::event::DomainEvent;
use stepwise_core::rng::DeterministicRng;
use stepwise_score::{Score, ScoreEvent};

/// One output line per executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLine {
    /// Position in the score's event stream.
    pub sequence_number: i64,
    /// Event type name.
    pub event_type: &'static str,
    /// When the step was dispatched.
    pub occurred_at: DateTime<Utc>,
    /// The serialized event payload.
    pub payload: serde_json::Value,
}

impl From<&ScoreEvent> for EventLine {
    fn from(event: &ScoreEvent) -> Self {
        Self {
            sequence_number: event.metadata().sequence_number,
            event_type: event.event_type(),
            occurred_at: event.metadata().occurred_at,
            payload: event.to_payload(),
        }
    }
}

/// A score being played, with its clock and RNG.
pub struct PlayerState {
    /// The score.
    pub score: Score,
    clock: Arc<dyn Clock>,
    rng: Box<dyn DeterministicRng>,
    steps: usize,
    started: bool,
}

impl std::fmt::Debug for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerState")
            .field("score", &self.score.metadata().title)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl PlayerState {
    /// Create new player state.
    #[must_use]
    pub fn new(score: Score, clock: Arc<dyn Clock>, rng: Box<dyn DeterministicRng>) -> Self {
        Self {
            score,
            clock,
            rng,
            steps: 0,
            started: false,
        }
    }

    /// Advances on user input, subject to the input gate. Returns whether a
    /// step was produced.
    pub fn request_step(&mut self) -> bool {
        self.started = true;
        self.score
            .request_step(self.clock.as_ref(), self.rng.as_mut())
            .is_some()
    }

    /// Starts play mode. Returns whether the first tick produced a step.
    pub fn play(&mut self) -> bool {
        self.started = true;
        self.score.play(self.clock.as_ref(), self.rng.as_mut()).is_some()
    }

    /// Stops play mode.
    pub fn stop(&mut self) {
        self.score.stop();
    }

    /// Fires due tasks. Returns the number fired.
    pub fn run_due(&mut self) -> usize {
        self.score.run_due(self.clock.as_ref(), self.rng.as_mut())
    }

    /// Time until the next scheduled task, if any. Zero when already due.
    #[must_use]
    pub fn time_until_due(&self) -> Option<Duration> {
        let due = self.score.next_due()?;
        Some((due - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Steps executed and drained so far.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Whether nothing more can happen without a reset: the active sequence
    /// is exhausted and no delayed step is waiting.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let exhausted = self
            .score
            .current_sequence()
            .is_none_or(stepwise_score::Sequence::is_exhausted);
        let waiting = self
            .score
            .timeline()
            .tasks()
            .iter()
            .any(|task| matches!(task.action, stepwise_score::TaskAction::Dispatch { .. }));
        exhausted && !waiting && (self.started || self.score.sequences().is_empty())
    }

    /// Drains recorded events as output lines.
    pub fn drain_events(&mut self) -> Vec<EventLine> {
        let lines: Vec<EventLine> = self
            .score
            .take_uncommitted_events()
            .iter()
            .map(EventLine::from)
            .collect();
        self.steps += lines.len();
        lines
    }
}

#[cfg(test)]
mod tests {
    use stepwise_parser::{ParseOptions, ScriptFormat, parse};
    use stepwise_test_support::{ManualClock, MockRng};

    use super::*;

    fn player(script: &str, clock: &Arc<ManualClock>) -> PlayerState {
        let score = parse(
            Some(script),
            ScriptFormat::Text,
            &ParseOptions::default(),
            clock.as_ref(),
        );
        PlayerState::new(score, clock.clone(), Box::new(MockRng))
    }

    #[test]
    fn test_request_step_emits_event_lines() {
        // Arrange
        let clock = Arc::new(ManualClock::default());
        let mut player = player("T\nC\nD\nHello.", &clock);

        // Act
        let produced = player.request_step();
        let lines = player.drain_events();

        // Assert
        assert!(produced);
        assert_eq!(player.steps(), 1);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].event_type, "score.step_executed");
        assert_eq!(lines[0].sequence_number, 1);
        assert_eq!(lines[0].payload["StepExecuted"]["step"]["content"], "Hello.");
        assert!(player.drain_events().is_empty());
    }

    #[test]
    fn test_play_ticks_advance_through_run_due() {
        let clock = Arc::new(ManualClock::default());
        let mut player = player("T\nC\nD\na\nb", &clock);

        assert!(player.play());
        assert_eq!(player.time_until_due(), Some(Duration::from_micros(124_988)));
        clock.advance_ms(125);
        assert_eq!(player.run_due(), 1);

        assert_eq!(player.drain_events().len(), 2);
        assert_eq!(player.steps(), 2);
        player.stop();
        assert_eq!(player.time_until_due(), None);
    }

    #[test]
    fn test_empty_script_is_finished_at_once() {
        let clock = Arc::new(ManualClock::default());
        let player = PlayerState::new(
            Score::new(clock.as_ref()),
            clock.clone(),
            Box::new(MockRng),
        );

        assert!(player.is_finished());
    }

    #[test]
    fn test_single_pass_script_finishes_after_last_step() {
        let clock = Arc::new(ManualClock::default());
        let score = stepwise_parser::try_parse_xml(
            "<s><sequence><narrate>only</narrate></sequence></s>",
            clock.as_ref(),
        )
        .unwrap();
        let mut player = PlayerState::new(score, clock.clone(), Box::new(MockRng));
        assert!(!player.is_finished());

        assert!(player.request_step());

        assert!(player.is_finished());
    }
}
