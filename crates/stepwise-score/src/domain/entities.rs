//! Characters and locations, the static entities steps refer to by id.

use serde::{Deserialize, Serialize};

use super::sequence::Sequence;

/// A speaker that steps can target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Identifier, unique within a score.
    pub id: String,
    /// Given name.
    pub first_name: String,
    /// Family name, possibly empty.
    pub last_name: String,
    /// First name plus last name when there is one.
    pub full_name: String,
    /// Whether the character has been revealed.
    pub(crate) visible: bool,
    /// Authored `visible="false"`: never auto-revealed.
    pub(crate) pinned_hidden: bool,
}

impl Character {
    /// Creates a character. `visible` is the authored visibility attribute,
    /// if any.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        visible: Option<bool>,
    ) -> Self {
        let first_name = first_name.into();
        let last_name = last_name.into();
        let full_name = if last_name.is_empty() {
            first_name.clone()
        } else {
            format!("{first_name} {last_name}")
        };
        Self {
            id: id.into(),
            first_name,
            last_name,
            full_name,
            visible: visible == Some(true),
            pinned_hidden: visible == Some(false),
        }
    }

    /// Whether the character is currently visible.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the source pinned the character hidden.
    #[must_use]
    pub fn is_pinned_hidden(&self) -> bool {
        self.pinned_hidden
    }

    /// Reveals the character unless it is pinned hidden.
    pub(crate) fn reveal(&mut self) {
        if !self.pinned_hidden {
            self.visible = true;
        }
    }
}

/// A named place on the globe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Identifier, unique within a score.
    pub id: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Display name.
    pub name: String,
}

impl Location {
    /// Creates a location.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            name: name.into(),
        }
    }

    /// The location a score starts in before any `setlocation`.
    #[must_use]
    pub fn default_location() -> Self {
        Self::new("defaultLocation", 0.0, 0.0, "Default Location")
    }
}

/// The kinds of item `Score::get_item_for_id` can look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A character.
    Character,
    /// A location.
    Location,
    /// A sequence.
    Sequence,
}

impl ItemKind {
    /// Lowercase name, as used in scripts and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Location => "location",
            Self::Sequence => "sequence",
        }
    }

    /// Parses a kind name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "character" => Some(Self::Character),
            "location" => Some(Self::Location),
            "sequence" => Some(Self::Sequence),
            _ => None,
        }
    }
}

/// A borrowed item returned by an id lookup.
#[derive(Debug, Clone, Copy)]
pub enum Item<'a> {
    /// A character.
    Character(&'a Character),
    /// A location.
    Location(&'a Location),
    /// A sequence.
    Sequence(&'a Sequence),
}
