//! Sequences: ordered steps with a playback policy and a cursor.

use chrono::{DateTime, Utc};
use serde::Serialize;
use stepwise_core::error::StepwiseError;
use stepwise_core::rng::DeterministicRng;
use tracing::{debug, warn};

use super::step::{Step, StepId};

/// Draw attempts per step before a shuffle falls back to the first unused
/// index.
const SHUFFLE_ATTEMPTS_PER_STEP: usize = 64;

/// An ordered list of steps with repeat, count and shuffle policy.
#[derive(Debug, Clone, Serialize)]
pub struct Sequence {
    /// Identifier, unique within a score.
    pub id: String,
    pub(crate) steps: Vec<Step>,
    /// Cursor; `None` before the first advance.
    pub(crate) step_index: Option<usize>,
    pub(crate) repeat: bool,
    /// Bounded repeat count; `None` is unbounded.
    pub(crate) count: Option<u32>,
    pub(crate) shuffle: bool,
    pub(crate) grouping: Option<String>,
    pub(crate) completions: u32,
    pub(crate) used_indexes: Vec<usize>,
    pub(crate) percent_completed: f64,
    pub(crate) is_completed: bool,
    pub(crate) is_exhausted: bool,
}

impl Sequence {
    /// Creates an empty, non-repeating, in-order sequence.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            step_index: None,
            repeat: false,
            count: None,
            shuffle: false,
            grouping: None,
            completions: 0,
            used_indexes: Vec::new(),
            percent_completed: 0.0,
            is_completed: false,
            is_exhausted: false,
        }
    }

    /// Sets the repeat flag and bounded count.
    #[must_use]
    pub fn with_repeat(mut self, repeat: bool, count: Option<u32>) -> Self {
        self.repeat = repeat;
        self.count = count;
        self
    }

    /// Sets shuffle playback.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Records the authored grouping string.
    #[must_use]
    pub fn with_grouping(mut self, grouping: Option<String>) -> Self {
        self.grouping = grouping;
        self
    }

    /// Appends a step.
    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// The steps, in order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The cursor; `None` before the first advance.
    #[must_use]
    pub fn step_index(&self) -> Option<usize> {
        self.step_index
    }

    /// The step under the cursor.
    #[must_use]
    pub fn current_step(&self) -> Option<&Step> {
        self.step_index.and_then(|index| self.steps.get(index))
    }

    /// Whether the sequence repeats.
    #[must_use]
    pub fn repeat(&self) -> bool {
        self.repeat
    }

    /// Bounded repeat count, `None` when unbounded.
    #[must_use]
    pub fn count(&self) -> Option<u32> {
        self.count
    }

    /// Whether steps are drawn in random order.
    #[must_use]
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// The authored grouping string.
    #[must_use]
    pub fn grouping(&self) -> Option<&str> {
        self.grouping.as_deref()
    }

    /// Number of completed passes (or draws, when shuffled).
    #[must_use]
    pub fn completions(&self) -> u32 {
        self.completions
    }

    /// Indexes drawn in the current shuffle cycle.
    #[must_use]
    pub fn used_indexes(&self) -> &[usize] {
        &self.used_indexes
    }

    /// Cursor position as a fraction of the step count.
    #[must_use]
    pub fn percent_completed(&self) -> f64 {
        self.percent_completed
    }

    /// Whether a pass has finished.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Whether the sequence can never advance again without a reset.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.is_exhausted
    }

    /// Clears the cursor and the completion flags. Completions and shuffle
    /// memory are kept.
    pub fn reset(&mut self) {
        self.step_index = None;
        self.is_completed = false;
        self.is_exhausted = false;
        self.percent_completed = 0.0;
    }

    /// Returns the sequence to its freshly parsed state.
    pub fn rewind(&mut self) {
        self.reset();
        self.completions = 0;
        self.used_indexes.clear();
    }

    fn exhaust(&mut self) {
        self.is_completed = true;
        self.is_exhausted = true;
    }

    /// Advances the cursor under the sequence's policy and returns the step
    /// to execute. Empty or exhausted sequences return `None`.
    pub fn next_step(&mut self, rng: &mut dyn DeterministicRng) -> Option<Step> {
        if self.steps.is_empty() || self.is_exhausted {
            return None;
        }
        if self.shuffle {
            Some(self.next_shuffled(rng))
        } else {
            self.next_in_order()
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn next_in_order(&mut self) -> Option<Step> {
        if self.is_completed && self.repeat {
            debug!(sequence_id = %self.id, "sequence completed; restarting");
            self.reset();
        }

        let index = self.step_index.map_or(0, |current| current + 1);
        let Some(step) = self.steps.get(index).cloned() else {
            // Completed, non-repeating and below its count: paused until reset.
            debug!(sequence_id = %self.id, "sequence paused at end");
            return None;
        };
        self.step_index = Some(index);
        self.percent_completed = index as f64 / self.steps.len() as f64;

        if index + 1 >= self.steps.len() {
            self.completions += 1;
            let count_reached = self.count.is_some_and(|count| self.completions >= count);
            debug!(
                sequence_id = %self.id,
                completions = self.completions,
                "sequence reached its end"
            );
            if self.repeat {
                if count_reached {
                    self.exhaust();
                } else {
                    self.reset();
                }
            } else if self.count.is_none() || count_reached {
                self.exhaust();
            } else {
                self.is_completed = true;
            }
        }

        Some(step)
    }

    fn next_shuffled(&mut self, rng: &mut dyn DeterministicRng) -> Step {
        let len = self.steps.len();
        let max = u32::try_from(len - 1).unwrap_or(u32::MAX);

        let mut drawn = None;
        for _ in 0..len * SHUFFLE_ATTEMPTS_PER_STEP {
            let candidate = rng.next_u32_range(0, max) as usize % len;
            if !self.used_indexes.contains(&candidate) {
                drawn = Some(candidate);
                break;
            }
        }
        let index = drawn.unwrap_or_else(|| {
            warn!(sequence_id = %self.id, "shuffle draws kept repeating; taking first unused step");
            (0..len)
                .find(|index| !self.used_indexes.contains(index))
                .unwrap_or(0)
        });

        self.step_index = Some(index);
        self.used_indexes.push(index);
        if self.used_indexes.len() >= len {
            self.used_indexes.clear();
        }
        self.completions += 1;
        self.is_completed = true;
        if self.count.is_some_and(|count| self.completions >= count) {
            self.is_exhausted = true;
        }

        self.steps[index].clone()
    }

    /// Positions the cursor so the next advance lands on `step_id`, which
    /// may be a top-level step or nested inside one.
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::StepNotFound` and leaves the cursor untouched
    /// if no step matches.
    pub fn seek_to_step(&mut self, step_id: StepId) -> Result<(), StepwiseError> {
        let found = self
            .steps
            .iter()
            .position(|step| step.id == step_id)
            .or_else(|| self.steps.iter().position(|step| step.contains(step_id)));

        match found {
            Some(index) => {
                self.step_index = index.checked_sub(1);
                Ok(())
            }
            None => {
                warn!(sequence_id = %self.id, %step_id, "could not cue up step; not found");
                Err(StepwiseError::StepNotFound {
                    sequence_id: self.id.clone(),
                    step_id: step_id.0,
                })
            }
        }
    }

    /// Moves the cursor onto the first `setdate`/`settime` step carrying
    /// exactly `date`. Returns whether one was found.
    pub fn match_date(&mut self, date: DateTime<Utc>) -> bool {
        match self.steps.iter().position(|step| step.date() == Some(date)) {
            Some(index) => {
                self.step_index = Some(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use stepwise_test_support::{MockRng, SequenceRng};

    use super::*;
    use crate::domain::step::Command;

    fn narrated(id: &str, lines: &[&str]) -> Sequence {
        let mut sequence = Sequence::new(id);
        for (n, line) in lines.iter().enumerate() {
            let step_id = StepId(u32::try_from(n).unwrap());
            sequence.push_step(Step::new(step_id, Command::Narrate, *line));
        }
        sequence
    }

    fn contents(
        sequence: &mut Sequence,
        rng: &mut dyn DeterministicRng,
        n: usize,
    ) -> Vec<Option<String>> {
        (0..n)
            .map(|_| sequence.next_step(rng).map(|step| step.content))
            .collect()
    }

    #[test]
    fn test_current_step_follows_the_cursor() {
        // Arrange
        let mut sequence = narrated("s", &["a", "b", "c"]);
        let mut rng = MockRng;
        assert!(sequence.current_step().is_none());

        // Act
        sequence.next_step(&mut rng);
        sequence.next_step(&mut rng);

        // Assert
        let current = sequence.current_step().unwrap();
        assert_eq!(current.id, StepId(1));
        assert_eq!(current.content, "b");
    }

    #[test]
    fn test_unbounded_repeat_never_exhausts() {
        // Arrange
        let mut sequence = narrated("s", &["a", "b", "c"]).with_repeat(true, None);
        let mut rng = MockRng;

        // Act / Assert
        for pass in 1..=10 {
            for _ in 0..3 {
                assert!(sequence.next_step(&mut rng).is_some());
            }
            assert_eq!(sequence.completions(), pass);
            assert!(!sequence.is_exhausted());
        }
    }

    #[test]
    fn test_bounded_repeat_exhausts_after_last_pass() {
        // Arrange
        let mut sequence = narrated("s", &["one", "two"]).with_repeat(true, Some(2));
        let mut rng = MockRng;

        // Act
        let first = contents(&mut sequence, &mut rng, 2);
        assert_eq!(sequence.completions(), 1);
        assert!(!sequence.is_exhausted());
        let second = contents(&mut sequence, &mut rng, 2);

        // Assert
        assert_eq!(first, vec![Some("one".into()), Some("two".into())]);
        assert_eq!(second, first);
        assert_eq!(sequence.completions(), 2);
        assert!(sequence.is_exhausted());
        assert!(sequence.is_completed());
        assert!(sequence.next_step(&mut rng).is_none());
    }

    #[test]
    fn test_single_pass_completes_and_exhausts_together() {
        let mut sequence = narrated("s", &["a", "b"]);
        let mut rng = MockRng;

        sequence.next_step(&mut rng);
        assert!(!sequence.is_completed());
        sequence.next_step(&mut rng);

        assert!(sequence.is_completed());
        assert!(sequence.is_exhausted());
    }

    #[test]
    fn test_non_repeating_below_count_pauses_until_reset() {
        // Arrange
        let mut sequence = narrated("s", &["a", "b"]).with_repeat(false, Some(2));
        let mut rng = MockRng;

        // Act
        contents(&mut sequence, &mut rng, 2);

        // Assert
        assert!(sequence.is_completed());
        assert!(!sequence.is_exhausted());
        assert!(sequence.next_step(&mut rng).is_none());

        sequence.reset();
        let again = contents(&mut sequence, &mut rng, 2);
        assert_eq!(again, vec![Some("a".into()), Some("b".into())]);
        assert!(sequence.is_exhausted());
    }

    #[test]
    fn test_percent_completed_tracks_cursor() {
        let mut sequence = narrated("s", &["a", "b", "c", "d"]);
        let mut rng = MockRng;

        sequence.next_step(&mut rng);
        sequence.next_step(&mut rng);

        assert!((sequence.percent_completed() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shuffle_draws_each_index_once_per_cycle() {
        // Arrange
        let mut sequence = narrated("s", &["a", "b", "c"]).with_shuffle(true);
        let mut rng = SequenceRng::new(vec![1, 1, 0, 1, 0, 2, 2]);

        // Act
        let mut seen = Vec::new();
        for _ in 0..2 {
            sequence.next_step(&mut rng);
            seen.push(sequence.step_index().unwrap());
        }
        assert_eq!(sequence.used_indexes(), &[1, 0]);
        sequence.next_step(&mut rng);
        seen.push(sequence.step_index().unwrap());

        // Assert
        assert_eq!(seen, vec![1, 0, 2]);
        assert!(sequence.used_indexes().is_empty());
        assert_eq!(rng.draws(), 6);

        // The next cycle may repeat the index just drawn.
        sequence.next_step(&mut rng);
        assert_eq!(sequence.step_index(), Some(2));
    }

    #[test]
    fn test_shuffle_completes_every_draw_and_honors_count() {
        let mut sequence = narrated("s", &["a", "b", "c"])
            .with_shuffle(true)
            .with_repeat(false, Some(2));
        let mut rng = SequenceRng::new(vec![0, 1]);

        sequence.next_step(&mut rng);
        assert!(sequence.is_completed());
        assert_eq!(sequence.completions(), 1);
        assert!(!sequence.is_exhausted());

        sequence.next_step(&mut rng);
        assert!(sequence.is_exhausted());
        assert!(sequence.next_step(&mut rng).is_none());
    }

    #[test]
    fn test_shuffle_survives_degenerate_rng() {
        let mut sequence = narrated("s", &["a", "b"]).with_shuffle(true);
        let mut rng = MockRng;

        sequence.next_step(&mut rng);
        sequence.next_step(&mut rng);

        assert_eq!(sequence.step_index(), Some(1));
    }

    #[test]
    fn test_seek_lands_next_advance_on_step() {
        let mut sequence = narrated("s", &["a", "b", "c"]);
        let mut rng = MockRng;

        sequence.seek_to_step(StepId(2)).unwrap();

        assert_eq!(sequence.next_step(&mut rng).unwrap().content, "c");
    }

    #[test]
    fn test_seek_finds_substep_owner() {
        let mut sequence = narrated("s", &["a"]);
        let mut group = Step::new(StepId(10), Command::Group, "");
        group.substeps.push(Step::new(StepId(11), Command::Narrate, "inner"));
        sequence.push_step(group);
        let mut rng = MockRng;

        sequence.seek_to_step(StepId(11)).unwrap();

        assert_eq!(sequence.next_step(&mut rng).unwrap().id, StepId(10));
    }

    #[test]
    fn test_seek_miss_leaves_cursor() {
        let mut sequence = narrated("s", &["a", "b"]);
        let mut rng = MockRng;
        sequence.next_step(&mut rng);

        let result = sequence.seek_to_step(StepId(99));

        assert!(matches!(result, Err(StepwiseError::StepNotFound { step_id: 99, .. })));
        assert_eq!(sequence.step_index(), Some(0));
    }

    #[test]
    fn test_match_date_sets_cursor_on_match() {
        // Arrange
        let when = Utc.with_ymd_and_hms(2001, 9, 9, 1, 46, 40).unwrap();
        let mut sequence = narrated("s", &["a"]);
        sequence.push_step(Step::new(StepId(5), Command::SetDate { date: Some(when) }, ""));

        // Act / Assert
        assert!(!sequence.match_date(when + chrono::TimeDelta::seconds(1)));
        assert_eq!(sequence.step_index(), None);
        assert!(sequence.match_date(when));
        assert_eq!(sequence.step_index(), Some(1));
    }

    #[test]
    fn test_empty_sequence_never_advances() {
        let mut sequence = Sequence::new("empty").with_repeat(true, None);
        assert!(sequence.next_step(&mut MockRng).is_none());
        assert_eq!(sequence.completions(), 0);
    }
}
