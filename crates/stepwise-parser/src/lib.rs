//! Stepwise — script parsing.
//!
//! Turns the line-delimited text form or the XML form of a script into an
//! initialized [`Score`]. Parsing is tolerant: missing or malformed fields
//! fall back to defaults one by one, and a document that is not XML at all
//! yields an empty score.

mod dates;
mod grouping;
mod numbers;
mod text;
mod xml;

use std::path::Path;

use serde::{Deserialize, Serialize};
use stepwise_core::clock::Clock;
use stepwise_core::error::StepwiseError;
use stepwise_score::Score;
use tracing::warn;

pub use dates::parse_date;

/// The two script forms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFormat {
    /// One narrate step per line, with optional `stepwise.*:` metadata lines.
    #[default]
    Text,
    /// The full element vocabulary.
    Xml,
}

impl ScriptFormat {
    /// Picks the format from a file extension: `.xml` is XML, anything else
    /// is text.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => Self::Xml,
            _ => Self::Text,
        }
    }
}

/// Parser settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Line separator for the text form.
    pub delimiter: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: "\n".to_owned(),
        }
    }
}

/// Parses a script into an initialized score. Never fails: absent input
/// gives the default score, and unreadable XML gives the default score plus
/// a warning.
#[must_use]
pub fn parse(
    input: Option<&str>,
    format: ScriptFormat,
    options: &ParseOptions,
    clock: &dyn Clock,
) -> Score {
    let Some(input) = input else {
        return Score::new(clock);
    };
    match format {
        ScriptFormat::Text => text::parse_text(input, &options.delimiter, clock),
        ScriptFormat::Xml => try_parse_xml(input, clock).unwrap_or_else(|error| {
            warn!(%error, "script is not readable XML; using an empty score");
            Score::new(clock)
        }),
    }
}

/// Parses the XML form, reporting a document that cannot be read at all.
///
/// # Errors
///
/// Returns `StepwiseError::MalformedXml` if `input` is not well-formed XML.
pub fn try_parse_xml(input: &str, clock: &dyn Clock) -> Result<Score, StepwiseError> {
    xml::parse_xml(input, clock)
}
