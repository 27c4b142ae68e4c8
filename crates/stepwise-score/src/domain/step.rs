//! Steps: single authored instructions and their resolved targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::world::{SpeechTone, TemperatureUnits, Weather};

/// Identity of a step within its score, assigned in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub u32);

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed command vocabulary, with each command's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum Command {
    /// Narration; always visible.
    Narrate,
    /// A character speaks.
    Speak {
        /// Delivery tone.
        tone: SpeechTone,
    },
    /// A character thinks.
    Think,
    /// A character sings.
    Sing {
        /// Delivery tone.
        tone: SpeechTone,
    },
    /// Moves the score to the location named by the content.
    SetLocation,
    /// Sets the temperature. `value` is `None` when the content was not a
    /// number.
    SetTemperature {
        /// Parsed temperature.
        value: Option<f64>,
        /// Units of `value`.
        units: TemperatureUnits,
    },
    /// Sets the weather. `weather` is `None` for an unknown condition name.
    SetWeather {
        /// Parsed weather.
        weather: Option<Weather>,
    },
    /// Sets the score date.
    SetDate {
        /// Parsed instant.
        date: Option<DateTime<Utc>>,
    },
    /// Sets the score date; alias of `SetDate`.
    SetTime {
        /// Parsed instant.
        date: Option<DateTime<Utc>>,
    },
    /// Switches the top-level sequence.
    SetSequence {
        /// Cue the sequence to the `setdate` step matching this instant.
        at_date: Option<DateTime<Utc>>,
        /// Advance the new sequence once immediately.
        auto_start: bool,
    },
    /// Advances the target sequence once without changing score cursors.
    Sample,
    /// Resets the target sequence.
    Reset,
    /// A choice offered by a character.
    #[serde(rename = "option")]
    Choice,
    /// Dispatches its substeps instead of itself.
    Group,
    /// Sets the background color.
    SetBackColor,
    /// Sets the midground color.
    SetMidColor,
    /// Sets the foreground color.
    SetForeColor,
    /// Any tag outside the vocabulary. Dispatched but inert.
    Unknown {
        /// The authored tag name.
        name: String,
    },
}

impl Command {
    /// The lowercase tag this command is authored as.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Narrate => "narrate",
            Self::Speak { .. } => "speak",
            Self::Think => "think",
            Self::Sing { .. } => "sing",
            Self::SetLocation => "setlocation",
            Self::SetTemperature { .. } => "settemperature",
            Self::SetWeather { .. } => "setweather",
            Self::SetDate { .. } => "setdate",
            Self::SetTime { .. } => "settime",
            Self::SetSequence { .. } => "setsequence",
            Self::Sample => "sample",
            Self::Reset => "reset",
            Self::Choice => "option",
            Self::Group => "group",
            Self::SetBackColor => "setbackcolor",
            Self::SetMidColor => "setmidcolor",
            Self::SetForeColor => "setforecolor",
            Self::Unknown { name } => name,
        }
    }

    /// Whether dispatching this command reveals its target character.
    #[must_use]
    pub fn reveals_character(&self) -> bool {
        matches!(
            self,
            Self::Speak { .. } | Self::Think | Self::Sing { .. } | Self::Choice
        )
    }
}

/// What a step acts on, resolved once when the score is initialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTarget {
    /// Not yet resolved, or the referenced id does not exist.
    #[default]
    Unresolved,
    /// No entity; carries only a visibility flag.
    Placeholder {
        /// Whether the step's output should be shown.
        visible: bool,
    },
    /// A character of the owning score.
    Character {
        /// Index into the score's character list.
        index: usize,
        /// The character id.
        id: String,
    },
    /// A location of the owning score.
    Location {
        /// Index into the score's location list.
        index: usize,
        /// The location id.
        id: String,
    },
    /// A sequence of the owning score.
    Sequence {
        /// Index into the score's sequence list.
        index: usize,
        /// The sequence id.
        id: String,
    },
}

/// Where an `option` step leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionDestination {
    /// A sequence of the owning score.
    Sequence {
        /// Index into the score's sequence list.
        index: usize,
        /// The sequence id.
        id: String,
    },
    /// An external URL.
    Url(String),
}

/// A single authored instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Identity within the score.
    pub id: StepId,
    /// The command and its fields.
    pub command: Command,
    /// Literal text payload.
    pub content: String,
    /// Resolved target.
    pub target: StepTarget,
    /// Authored `character` attribute.
    pub character_ref: Option<String>,
    /// Authored `itemRef` attribute.
    pub item_ref: Option<String>,
    /// Authored `type` attribute (`sequence` or `url` for options).
    pub kind: Option<String>,
    /// Authored `destination` attribute.
    pub destination_ref: Option<String>,
    /// Resolved option destination.
    pub destination: Option<OptionDestination>,
    /// Stagger in pulses; zero dispatches immediately.
    pub delay: f64,
    /// Whether displayed content accumulates instead of replacing.
    pub append: bool,
    /// Children; dispatched in place of the step for `group`.
    pub substeps: Vec<Step>,
}

impl Step {
    /// Creates an immediate, non-appending step with no references.
    #[must_use]
    pub fn new(id: StepId, command: Command, content: impl Into<String>) -> Self {
        Self {
            id,
            command,
            content: content.into(),
            target: StepTarget::Unresolved,
            character_ref: None,
            item_ref: None,
            kind: None,
            destination_ref: None,
            destination: None,
            delay: 0.0,
            append: false,
            substeps: Vec::new(),
        }
    }

    /// Whether dispatch is deferred by a delay.
    #[must_use]
    pub fn is_delayed(&self) -> bool {
        self.delay > 0.0
    }

    /// The instant carried by a `setdate`/`settime` step.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match &self.command {
            Command::SetDate { date } | Command::SetTime { date } => *date,
            _ => None,
        }
    }

    /// Whether `id` is this step or any of its descendants.
    #[must_use]
    pub fn contains(&self, id: StepId) -> bool {
        self.id == id || self.substeps.iter().any(|substep| substep.contains(id))
    }

    /// Marks this step and every descendant as appending.
    pub fn mark_append(&mut self) {
        self.append = true;
        for substep in &mut self.substeps {
            substep.mark_append();
        }
    }
}
