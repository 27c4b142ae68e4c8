//! The score: every sequence, entity and piece of world state of one parsed
//! script, plus the playback cursor that walks it.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use stepwise_core::clock::Clock;
use stepwise_core::error::StepwiseError;
use stepwise_core::rng::DeterministicRng;
use tracing::{debug, warn};

use super::entities::{Character, Item, ItemKind, Location};
use super::events::ScoreEvent;
use super::sequence::Sequence;
use super::step::{Command, OptionDestination, Step, StepTarget};
use super::timeline::{TaskAction, TaskId, Timeline};
use super::world::{Palette, TemperatureUnits, Timing, Weather};

/// Host-selected playback behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    /// Let `request_step` advance while delayed output is still in flight.
    pub allow_input_during_delay: bool,
}

/// Descriptive fields of a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Primary credits (the author line in text scripts).
    pub primary_credits: String,
    /// Secondary credits.
    pub secondary_credits: String,
    /// Format version.
    pub version: u32,
    /// Script type.
    pub kind: String,
}

impl Default for ScoreMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            primary_credits: String::new(),
            secondary_credits: String::new(),
            version: 1,
            kind: "basic".to_owned(),
        }
    }
}

/// Mutable world state, changed by the score-level commands.
#[derive(Debug, Clone)]
pub(crate) struct WorldState {
    pub(crate) location: Location,
    pub(crate) temperature: f64,
    pub(crate) temperature_units: TemperatureUnits,
    pub(crate) weather: Weather,
    pub(crate) date: DateTime<Utc>,
    pub(crate) palette: Palette,
}

/// A parsed script and its playback state.
#[derive(Debug)]
pub struct Score {
    pub(crate) metadata: ScoreMetadata,
    pub(crate) sequences: Vec<Sequence>,
    pub(crate) sequences_by_id: HashMap<String, usize>,
    pub(crate) characters: Vec<Character>,
    pub(crate) characters_by_id: HashMap<String, usize>,
    pub(crate) locations: Vec<Location>,
    pub(crate) locations_by_id: HashMap<String, usize>,
    pub(crate) world: WorldState,
    pub(crate) timing: Timing,
    pub(crate) options: PlaybackOptions,
    /// Cursor into the top-level sequence list.
    pub(crate) sequence_index: usize,
    /// Derived from the queue and `sequence_index` on every advance.
    pub(crate) current_sequence: Option<usize>,
    /// Stack of sequences pushed for one-shot playback; last is the top.
    pub(crate) sequence_queue: Vec<usize>,
    pub(crate) delay_end_time: Option<DateTime<Utc>>,
    pub(crate) trigger_time: Option<DateTime<Utc>>,
    pub(crate) is_playing: bool,
    pub(crate) play_task: Option<TaskId>,
    pub(crate) timeline: Timeline,
    pub(crate) uncommitted_events: Vec<ScoreEvent>,
    pub(crate) event_count: i64,
}

/// `now` plus `ms` milliseconds; non-finite or negative offsets add nothing.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn after_ms(now: DateTime<Utc>, ms: f64) -> DateTime<Utc> {
    if !ms.is_finite() || ms <= 0.0 {
        return now;
    }
    let delta = TimeDelta::microseconds((ms * 1000.0).round() as i64);
    now.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Score {
    /// Creates an empty score in its default world state, dated `clock.now()`.
    #[must_use]
    pub fn new(clock: &dyn Clock) -> Self {
        Self {
            metadata: ScoreMetadata::default(),
            sequences: Vec::new(),
            sequences_by_id: HashMap::new(),
            characters: Vec::new(),
            characters_by_id: HashMap::new(),
            locations: Vec::new(),
            locations_by_id: HashMap::new(),
            world: WorldState {
                location: Location::default_location(),
                temperature: 24.0,
                temperature_units: TemperatureUnits::Celsius,
                weather: Weather::Clear,
                date: clock.now(),
                palette: Palette::default(),
            },
            timing: Timing::default(),
            options: PlaybackOptions::default(),
            sequence_index: 0,
            current_sequence: None,
            sequence_queue: Vec::new(),
            delay_end_time: None,
            trigger_time: None,
            is_playing: false,
            play_task: None,
            timeline: Timeline::new(),
            uncommitted_events: Vec::new(),
            event_count: 0,
        }
    }

    // ----- construction ---------------------------------------------------

    /// Replaces the descriptive metadata.
    pub fn set_metadata(&mut self, metadata: ScoreMetadata) {
        self.metadata = metadata;
    }

    /// Replaces the pulse timing.
    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    /// Replaces the playback options.
    pub fn set_options(&mut self, options: PlaybackOptions) {
        self.options = options;
    }

    /// Adds a sequence. A repeated id replaces the earlier one in id lookups;
    /// both stay in the ordered list.
    pub fn add_sequence(&mut self, sequence: Sequence) -> usize {
        let index = self.sequences.len();
        self.sequences_by_id.insert(sequence.id.clone(), index);
        self.sequences.push(sequence);
        index
    }

    /// Adds a character, with the same id rule as `add_sequence`.
    pub fn add_character(&mut self, character: Character) -> usize {
        let index = self.characters.len();
        self.characters_by_id.insert(character.id.clone(), index);
        self.characters.push(character);
        index
    }

    /// Adds a location, with the same id rule as `add_sequence`.
    pub fn add_location(&mut self, location: Location) -> usize {
        let index = self.locations.len();
        self.locations_by_id.insert(location.id.clone(), index);
        self.locations.push(location);
        index
    }

    /// Resolves every step's target against this score. Run once, after all
    /// sequences, characters and locations have been added.
    pub fn init(&mut self) {
        let directory = Directory {
            characters: &self.characters_by_id,
            locations: &self.locations_by_id,
            sequences: &self.sequences_by_id,
        };
        for sequence in &mut self.sequences {
            for step in &mut sequence.steps {
                directory.resolve(step);
            }
        }
    }

    // ----- queries --------------------------------------------------------

    /// Descriptive metadata.
    #[must_use]
    pub fn metadata(&self) -> &ScoreMetadata {
        &self.metadata
    }

    /// Pulse timing.
    #[must_use]
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Playback options.
    #[must_use]
    pub fn options(&self) -> PlaybackOptions {
        self.options
    }

    /// All sequences in discovery order.
    #[must_use]
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// All characters in discovery order.
    #[must_use]
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    /// All locations in discovery order.
    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Looks up a sequence by id.
    #[must_use]
    pub fn sequence(&self, id: &str) -> Option<&Sequence> {
        self.sequences_by_id.get(id).map(|&index| &self.sequences[index])
    }

    /// Looks up a character by id.
    #[must_use]
    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters_by_id.get(id).map(|&index| &self.characters[index])
    }

    /// Looks up a location by id.
    #[must_use]
    pub fn location(&self, id: &str) -> Option<&Location> {
        self.locations_by_id.get(id).map(|&index| &self.locations[index])
    }

    /// Looks up an item of the given kind by id.
    #[must_use]
    pub fn get_item_for_id(&self, kind: ItemKind, id: &str) -> Option<Item<'_>> {
        match kind {
            ItemKind::Character => self.character(id).map(Item::Character),
            ItemKind::Location => self.location(id).map(Item::Location),
            ItemKind::Sequence => self.sequence(id).map(Item::Sequence),
        }
    }

    /// The location the score is currently in.
    #[must_use]
    pub fn current_location(&self) -> &Location {
        &self.world.location
    }

    /// Current temperature value.
    #[must_use]
    pub fn current_temperature(&self) -> f64 {
        self.world.temperature
    }

    /// Units of the current temperature.
    #[must_use]
    pub fn current_temperature_units(&self) -> TemperatureUnits {
        self.world.temperature_units
    }

    /// Current weather.
    #[must_use]
    pub fn current_weather(&self) -> Weather {
        self.world.weather
    }

    /// Current in-story date.
    #[must_use]
    pub fn current_date(&self) -> DateTime<Utc> {
        self.world.date
    }

    /// Current colors.
    #[must_use]
    pub fn palette(&self) -> &Palette {
        &self.world.palette
    }

    /// Cursor into the top-level sequence list.
    #[must_use]
    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    /// The sequence chosen by the last advance.
    #[must_use]
    pub fn current_sequence(&self) -> Option<&Sequence> {
        self.current_sequence.map(|index| &self.sequences[index])
    }

    /// Ids of queued sequences, bottom first.
    #[must_use]
    pub fn queued_sequence_ids(&self) -> Vec<&str> {
        self.sequence_queue
            .iter()
            .map(|&index| self.sequences[index].id.as_str())
            .collect()
    }

    /// Instant until which delayed output is in flight.
    #[must_use]
    pub fn delay_end_time(&self) -> Option<DateTime<Utc>> {
        self.delay_end_time
    }

    /// Whether delayed output is still in flight at `now`.
    #[must_use]
    pub fn is_busy(&self, now: DateTime<Utc>) -> bool {
        self.delay_end_time.is_some_and(|end| now < end)
    }

    /// When `request_step` last let an advance through.
    #[must_use]
    pub fn trigger_time(&self) -> Option<DateTime<Utc>> {
        self.trigger_time
    }

    /// Whether play mode is on.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Pending deferred work.
    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Earliest instant at which `run_due` has work to do.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.timeline.next_due()
    }

    /// Events recorded since the last clear.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[ScoreEvent] {
        &self.uncommitted_events
    }

    /// Drains recorded events.
    pub fn take_uncommitted_events(&mut self) -> Vec<ScoreEvent> {
        std::mem::take(&mut self.uncommitted_events)
    }

    /// Discards recorded events.
    pub fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }

    // ----- world-state setters --------------------------------------------

    /// Moves to the location with `id`.
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::NotFound` and leaves the location unchanged if
    /// the score has no such location.
    pub fn set_location(&mut self, id: &str) -> Result<(), StepwiseError> {
        let index = *self
            .locations_by_id
            .get(id)
            .ok_or_else(|| StepwiseError::NotFound {
                kind: ItemKind::Location.as_str(),
                id: id.to_owned(),
            })?;
        self.world.location = self.locations[index].clone();
        Ok(())
    }

    /// Sets the temperature.
    pub fn set_temperature(&mut self, value: f64, units: TemperatureUnits) {
        self.world.temperature = value;
        self.world.temperature_units = units;
    }

    /// Sets the weather.
    pub fn set_weather(&mut self, weather: Weather) {
        self.world.weather = weather;
    }

    /// Sets the in-story date.
    pub fn set_date(&mut self, date: DateTime<Utc>) {
        self.world.date = date;
    }

    /// Sets the background color.
    pub fn set_back_color(&mut self, color: impl Into<String>) {
        self.world.palette.back = color.into();
    }

    /// Sets the midground color.
    pub fn set_mid_color(&mut self, color: impl Into<String>) {
        self.world.palette.mid = color.into();
    }

    /// Sets the foreground color.
    pub fn set_fore_color(&mut self, color: impl Into<String>) {
        self.world.palette.fore = color.into();
    }

    /// Sets the playback speed multiplier.
    pub fn set_time_scale(&mut self, time_scale: f64) {
        self.timing.time_scale = time_scale;
    }

    // ----- playback -------------------------------------------------------

    /// Picks the active sequence: the top of the queue unless it completed
    /// (then it is popped), otherwise the top-level sequence at
    /// `sequence_index`. An exhausted candidate leaves the previous choice in
    /// place.
    fn update_current_sequence(&mut self) {
        let top_level = (self.sequence_index < self.sequences.len()).then_some(self.sequence_index);
        let candidate = match self.sequence_queue.last().copied() {
            Some(top) if self.sequences[top].is_completed() => {
                self.sequence_queue.pop();
                debug!(sequence_id = %self.sequences[top].id, "queued sequence completed; popped");
                self.sequence_queue.last().copied().or(top_level)
            }
            Some(top) => Some(top),
            None => top_level,
        };

        if let Some(index) = candidate {
            if !self.sequences[index].is_exhausted() {
                self.current_sequence = Some(index);
            }
        }
    }

    /// Advances the active sequence once and executes the step it produces.
    /// Returns `None` when there is nothing left to play.
    pub fn next_step(
        &mut self,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
    ) -> Option<Step> {
        self.update_current_sequence();

        let step = match self.current_sequence {
            Some(index) if !self.sequences[index].is_exhausted() => {
                self.advance_sequence(index, clock, rng, 0)
            }
            _ => None,
        };

        if self.is_playing {
            self.schedule_play_tick(clock);
        }

        step
    }

    /// `next_step` behind the input gate: unless input during delays is
    /// allowed, nothing happens while delayed output is in flight.
    pub fn request_step(
        &mut self,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
    ) -> Option<Step> {
        let now = clock.now();
        if !self.options.allow_input_during_delay && self.is_busy(now) {
            debug!("input ignored while delayed output is in flight");
            return None;
        }
        self.trigger_time = Some(now);
        self.next_step(clock, rng)
    }

    /// Starts play mode: advances now and keeps advancing every tick.
    pub fn play(&mut self, clock: &dyn Clock, rng: &mut dyn DeterministicRng) -> Option<Step> {
        self.is_playing = true;
        self.next_step(clock, rng)
    }

    /// Stops play mode. Delayed dispatches already scheduled still fire.
    pub fn stop(&mut self) {
        self.is_playing = false;
        if let Some(task) = self.play_task.take() {
            self.timeline.cancel(task);
        }
    }

    fn schedule_play_tick(&mut self, clock: &dyn Clock) {
        if let Some(previous) = self.play_task.take() {
            self.timeline.cancel(previous);
        }
        let due = after_ms(clock.now(), self.timing.tick_ms());
        self.play_task = Some(self.timeline.schedule(due, TaskAction::PlayTick));
    }

    /// Makes the sequence with `id` the top-level sequence. With `at_date`,
    /// cues it to the matching `setdate` step first; with `auto_start`,
    /// advances it once and returns the step.
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::NotFound` if the score has no such sequence.
    pub fn set_sequence(
        &mut self,
        id: &str,
        at_date: Option<DateTime<Utc>>,
        auto_start: bool,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
    ) -> Result<Option<Step>, StepwiseError> {
        let index = self.sequence_index_for(id)?;
        Ok(self.select_sequence(index, at_date, auto_start, clock, rng, 0))
    }

    pub(crate) fn select_sequence(
        &mut self,
        index: usize,
        at_date: Option<DateTime<Utc>>,
        auto_start: bool,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
        depth: usize,
    ) -> Option<Step> {
        self.sequence_index = index;
        self.current_sequence = Some(index);
        debug!(sequence_id = %self.sequences[index].id, "sequence selected");
        if let Some(date) = at_date {
            if !self.sequences[index].match_date(date) {
                debug!(sequence_id = %self.sequences[index].id, %date, "no setdate step matches");
            }
        }
        if auto_start {
            self.advance_sequence(index, clock, rng, depth)
        } else {
            None
        }
    }

    /// Pushes the sequence with `id` onto the queue, makes it active and
    /// advances it once. It is popped once it reports completion.
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::NotFound` if the score has no such sequence.
    pub fn play_sequence(
        &mut self,
        id: &str,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
    ) -> Result<Option<Step>, StepwiseError> {
        let index = self.sequence_index_for(id)?;
        self.current_sequence = Some(index);
        self.sequence_queue.push(index);
        Ok(self.advance_sequence(index, clock, rng, 0))
    }

    /// Rewinds every sequence and returns the cursor to the first one.
    pub fn reset(&mut self) {
        for sequence in &mut self.sequences {
            sequence.rewind();
        }
        self.sequence_index = 0;
        self.current_sequence = None;
        self.sequence_queue.clear();
    }

    /// Fires every task due at or before `clock.now()`, earliest first.
    /// Tasks scheduled while firing wait for the next call. Returns the
    /// number of tasks fired.
    pub fn run_due(&mut self, clock: &dyn Clock, rng: &mut dyn DeterministicRng) -> usize {
        let now = clock.now();
        let watermark = self.timeline.watermark();
        let mut fired = 0;
        while let Some(task) = self.timeline.pop_due(now, watermark) {
            fired += 1;
            match task.action {
                TaskAction::Dispatch { step, sequence_id } => {
                    self.dispatch(&step, &sequence_id, clock, rng, 0);
                }
                TaskAction::PlayTick => {
                    if self.play_task == Some(task.id) {
                        self.play_task = None;
                    }
                    if self.is_playing {
                        self.next_step(clock, rng);
                    }
                }
            }
        }
        fired
    }

    fn sequence_index_for(&self, id: &str) -> Result<usize, StepwiseError> {
        self.sequences_by_id
            .get(id)
            .copied()
            .ok_or_else(|| StepwiseError::NotFound {
                kind: ItemKind::Sequence.as_str(),
                id: id.to_owned(),
            })
    }
}

/// Read-only id maps used to resolve step targets.
struct Directory<'a> {
    characters: &'a HashMap<String, usize>,
    locations: &'a HashMap<String, usize>,
    sequences: &'a HashMap<String, usize>,
}

impl Directory<'_> {
    fn resolve(&self, step: &mut Step) {
        let content = step.content.trim();
        step.target = match &step.command {
            Command::Narrate => StepTarget::Placeholder { visible: true },
            Command::Speak { .. } | Command::Think | Command::Sing { .. } => {
                self.character(step.character_ref.as_deref())
            }
            Command::SetLocation => match self.locations.get(content) {
                Some(&index) => StepTarget::Location {
                    index,
                    id: content.to_owned(),
                },
                None => miss(ItemKind::Location, content),
            },
            Command::SetSequence { .. } | Command::Sample | Command::Reset => {
                self.sequence(content)
            }
            Command::Choice => {
                step.destination = match (step.kind.as_deref(), step.destination_ref.as_deref()) {
                    (Some("sequence"), Some(id)) => match self.sequences.get(id) {
                        Some(&index) => Some(OptionDestination::Sequence {
                            index,
                            id: id.to_owned(),
                        }),
                        None => {
                            warn!(sequence_id = id, "option destination not found");
                            None
                        }
                    },
                    (Some("url"), Some(url)) => Some(OptionDestination::Url(url.to_owned())),
                    _ => None,
                };
                self.character(step.character_ref.as_deref())
            }
            _ => match step.character_ref.as_deref() {
                Some(id) => self.character(Some(id)),
                None => StepTarget::Placeholder { visible: false },
            },
        };

        for substep in &mut step.substeps {
            self.resolve(substep);
        }
    }

    fn character(&self, id: Option<&str>) -> StepTarget {
        let Some(id) = id else {
            return StepTarget::Unresolved;
        };
        match self.characters.get(id) {
            Some(&index) => StepTarget::Character {
                index,
                id: id.to_owned(),
            },
            None => miss(ItemKind::Character, id),
        }
    }

    fn sequence(&self, id: &str) -> StepTarget {
        match self.sequences.get(id) {
            Some(&index) => StepTarget::Sequence {
                index,
                id: id.to_owned(),
            },
            None => miss(ItemKind::Sequence, id),
        }
    }
}

fn miss(kind: ItemKind, id: &str) -> StepTarget {
    warn!(kind = kind.as_str(), id, "step target not found");
    StepTarget::Unresolved
}
