//! Query handlers for score playback.
//!
//! Presentation layers read world state through a flat, serializable view
//! instead of walking the score.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::score::Score;
use crate::domain::world::{Palette, TemperatureUnits, Weather};

/// A visible character, as shown to the audience.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterView {
    /// Character id.
    pub id: String,
    /// First plus last name.
    pub full_name: String,
}

/// Read-only snapshot of a score's world and playback state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreView {
    /// Score title.
    pub title: String,
    /// Primary credits.
    pub primary_credits: String,
    /// Id of the current location.
    pub location_id: String,
    /// Display name of the current location.
    pub location_name: String,
    /// Current temperature.
    pub temperature: f64,
    /// Units of `temperature`.
    pub temperature_units: TemperatureUnits,
    /// Current weather.
    pub weather: Weather,
    /// In-story date.
    pub date: DateTime<Utc>,
    /// Current colors.
    pub palette: Palette,
    /// Id of the active sequence, once playback has started.
    pub current_sequence_id: Option<String>,
    /// Queued sequence ids, bottom first.
    pub queued_sequence_ids: Vec<String>,
    /// Characters revealed so far, in discovery order.
    pub visible_characters: Vec<CharacterView>,
    /// Instant until which delayed output is in flight.
    pub delay_end_time: Option<DateTime<Utc>>,
    /// Whether play mode is on.
    pub is_playing: bool,
}

/// Builds a [`ScoreView`] of the score's current state.
#[must_use]
pub fn score_view(score: &Score) -> ScoreView {
    let location = score.current_location();
    ScoreView {
        title: score.metadata().title.clone(),
        primary_credits: score.metadata().primary_credits.clone(),
        location_id: location.id.clone(),
        location_name: location.name.clone(),
        temperature: score.current_temperature(),
        temperature_units: score.current_temperature_units(),
        weather: score.current_weather(),
        date: score.current_date(),
        palette: score.palette().clone(),
        current_sequence_id: score.current_sequence().map(|sequence| sequence.id.clone()),
        queued_sequence_ids: score
            .queued_sequence_ids()
            .into_iter()
            .map(str::to_owned)
            .collect(),
        visible_characters: score
            .characters()
            .iter()
            .filter(|character| character.is_visible())
            .map(|character| CharacterView {
                id: character.id.clone(),
                full_name: character.full_name.clone(),
            })
            .collect(),
        delay_end_time: score.delay_end_time(),
        is_playing: score.is_playing(),
    }
}
