//! Step execution: immediate or delayed dispatch, and the world-state
//! effects of each command.

use stepwise_core::clock::Clock;
use stepwise_core::event::EventMetadata;
use stepwise_core::rng::DeterministicRng;
use tracing::{debug, warn};
use uuid::Uuid;

use super::events::{STEP_EXECUTED_EVENT_TYPE, ScoreEvent, ScoreEventKind, StepExecuted};
use super::score::{Score, after_ms};
use super::step::{Command, Step, StepTarget};
use super::timeline::TaskAction;

/// Nesting limit for dispatches triggered by other dispatches (groups,
/// `sample`, auto-started sequences).
const MAX_DISPATCH_DEPTH: usize = 32;

impl Score {
    /// Advances the sequence at `index` and executes the step it yields.
    pub(crate) fn advance_sequence(
        &mut self,
        index: usize,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
        depth: usize,
    ) -> Option<Step> {
        let sequence = self.sequences.get_mut(index)?;
        let step = sequence.next_step(rng)?;
        let sequence_id = sequence.id.clone();
        debug!(%sequence_id, step_id = %step.id, command = step.command.tag(), "advanced");
        self.execute_step(&step, &sequence_id, clock, rng, depth);
        Some(step)
    }

    /// Dispatches `step` now, or schedules it when it carries a delay.
    fn execute_step(
        &mut self,
        step: &Step,
        sequence_id: &str,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
        depth: usize,
    ) {
        if !step.is_delayed() {
            self.dispatch(step, sequence_id, clock, rng, depth);
            return;
        }

        let now = clock.now();
        let due = after_ms(now, self.timing.delay_ms(step.delay));
        self.timeline.schedule(
            due,
            TaskAction::Dispatch {
                step: step.clone(),
                sequence_id: sequence_id.to_owned(),
            },
        );
        self.delay_end_time = Some(self.delay_end_time.map_or(due, |end| end.max(due)));
        debug!(step_id = %step.id, %due, "dispatch scheduled");
    }

    /// Fires the step: groups fan out to their substeps, everything else is
    /// recorded as a `StepExecuted` event and then applied to world state.
    pub(crate) fn dispatch(
        &mut self,
        step: &Step,
        sequence_id: &str,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
        depth: usize,
    ) {
        if depth > MAX_DISPATCH_DEPTH {
            warn!(step_id = %step.id, "dispatch nesting too deep; step dropped");
            return;
        }

        if matches!(step.command, Command::Group) {
            for substep in &step.substeps {
                self.execute_step(substep, sequence_id, clock, rng, depth + 1);
            }
            return;
        }

        if step.command.reveals_character() {
            if let StepTarget::Character { index, .. } = step.target {
                self.characters[index].reveal();
            }
        }

        self.record_step_executed(step, sequence_id, clock);
        self.apply_command(step, clock, rng, depth);
    }

    fn apply_command(
        &mut self,
        step: &Step,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
        depth: usize,
    ) {
        match (&step.command, &step.target) {
            (Command::SetLocation, StepTarget::Location { index, .. }) => {
                self.world.location = self.locations[*index].clone();
            }
            (Command::SetTemperature { value, units }, _) => match value {
                Some(value) => self.set_temperature(*value, *units),
                None => warn!(content = %step.content, "temperature is not a number"),
            },
            (Command::SetWeather { weather }, _) => match weather {
                Some(weather) => self.set_weather(*weather),
                None => warn!(content = %step.content, "unknown weather condition"),
            },
            (Command::SetDate { date } | Command::SetTime { date }, _) => match date {
                Some(date) => self.set_date(*date),
                None => warn!(content = %step.content, "unreadable date"),
            },
            (Command::SetSequence { at_date, auto_start }, StepTarget::Sequence { index, .. }) => {
                self.select_sequence(*index, *at_date, *auto_start, clock, rng, depth + 1);
            }
            (Command::Sample, StepTarget::Sequence { index, .. }) => {
                self.advance_sequence(*index, clock, rng, depth + 1);
            }
            (Command::Reset, StepTarget::Sequence { index, .. }) => {
                self.sequences[*index].reset();
            }
            (Command::SetBackColor, _) => self.set_back_color(step.content.trim()),
            (Command::SetMidColor, _) => self.set_mid_color(step.content.trim()),
            (Command::SetForeColor, _) => self.set_fore_color(step.content.trim()),
            (
                Command::SetLocation
                | Command::SetSequence { .. }
                | Command::Sample
                | Command::Reset,
                _,
            ) => {
                warn!(
                    command = step.command.tag(),
                    content = %step.content,
                    "target not found; step inert"
                );
            }
            _ => {}
        }
    }

    fn record_step_executed(&mut self, step: &Step, sequence_id: &str, clock: &dyn Clock) {
        self.event_count += 1;
        self.uncommitted_events.push(ScoreEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: STEP_EXECUTED_EVENT_TYPE.to_owned(),
                sequence_number: self.event_count,
                occurred_at: clock.now(),
            },
            kind: ScoreEventKind::StepExecuted(StepExecuted {
                sequence_id: sequence_id.to_owned(),
                step: step.clone(),
            }),
        });
    }
}
