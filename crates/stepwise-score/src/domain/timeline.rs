//! Deferred work: delayed step dispatch and play-mode ticks.
//!
//! The timeline never reads a clock itself. The score schedules tasks at
//! absolute instants and the host fires whatever is due by calling
//! `Score::run_due`, which keeps delay semantics testable with a virtual
//! clock.

use chrono::{DateTime, Utc};

use super::step::Step;

/// Handle returned when a task is scheduled; used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// What a scheduled task does when it fires.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    /// Dispatch a delayed step.
    Dispatch {
        /// The step to dispatch.
        step: Step,
        /// Id of the sequence the step was advanced from.
        sequence_id: String,
    },
    /// Advance the score once more in play mode.
    PlayTick,
}

/// A task waiting on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    /// Cancel handle.
    pub id: TaskId,
    /// Instant at or after which the task fires.
    pub due: DateTime<Utc>,
    /// The work to do.
    pub action: TaskAction,
}

/// Pending tasks ordered by due time, then by scheduling order.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    tasks: Vec<ScheduledTask>,
    next_id: u64,
}

impl Timeline {
    /// Creates an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `action` to fire at `due`.
    pub fn schedule(&mut self, due: DateTime<Utc>, action: TaskAction) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(ScheduledTask { id, due, action });
        id
    }

    /// Cancels a pending task. Returns whether it was still pending.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    /// Earliest due instant among pending tasks.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.tasks.iter().map(|task| task.due).min()
    }

    /// The handle the next scheduled task will receive. Tasks with a smaller
    /// handle were scheduled before this call.
    #[must_use]
    pub fn watermark(&self) -> TaskId {
        TaskId(self.next_id)
    }

    /// Removes and returns the earliest task due at or before `now` that was
    /// scheduled before `watermark`.
    pub fn pop_due(&mut self, now: DateTime<Utc>, watermark: TaskId) -> Option<ScheduledTask> {
        let position = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= now && task.id < watermark)
            .min_by_key(|(_, task)| (task.due, task.id))
            .map(|(position, _)| position)?;
        Some(self.tasks.remove(position))
    }

    /// Pending tasks, in scheduling order.
    #[must_use]
    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use stepwise_test_support::epoch;

    use super::*;

    #[test]
    fn test_pop_due_orders_by_time_then_schedule_order() {
        // Arrange
        let now = epoch();
        let mut timeline = Timeline::new();
        let late = timeline.schedule(now + TimeDelta::milliseconds(20), TaskAction::PlayTick);
        let first = timeline.schedule(now, TaskAction::PlayTick);
        let second = timeline.schedule(now, TaskAction::PlayTick);
        let watermark = timeline.watermark();

        // Act
        let order: Vec<TaskId> = std::iter::from_fn(|| {
            timeline.pop_due(now + TimeDelta::milliseconds(20), watermark)
        })
        .map(|task| task.id)
        .collect();

        // Assert
        assert_eq!(order, vec![first, second, late]);
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_tasks_not_yet_due_stay_pending() {
        let now = epoch();
        let mut timeline = Timeline::new();
        timeline.schedule(now + TimeDelta::milliseconds(5), TaskAction::PlayTick);
        let watermark = timeline.watermark();

        assert!(timeline.pop_due(now, watermark).is_none());
        assert_eq!(timeline.next_due(), Some(now + TimeDelta::milliseconds(5)));
    }

    #[test]
    fn test_watermark_excludes_later_tasks() {
        let now = epoch();
        let mut timeline = Timeline::new();
        let watermark = timeline.watermark();
        timeline.schedule(now, TaskAction::PlayTick);

        assert!(timeline.pop_due(now, watermark).is_none());
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_cancel_removes_only_pending_task() {
        let mut timeline = Timeline::new();
        let id = timeline.schedule(epoch(), TaskAction::PlayTick);

        assert!(timeline.cancel(id));
        assert!(!timeline.cancel(id));
        assert!(timeline.is_empty());
    }
}
