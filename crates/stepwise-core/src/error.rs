//! Error types shared by the Stepwise crates.

use thiserror::Error;

/// Top-level Stepwise error type.
///
/// None of these are fatal to playback: callers log them and keep going.
#[derive(Debug, Error)]
pub enum StepwiseError {
    /// A character, location or sequence id did not resolve.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The kind of item that was looked up.
        kind: &'static str,
        /// The id that failed to resolve.
        id: String,
    },

    /// A step could not be located inside a sequence.
    #[error("step {step_id} not found in sequence {sequence_id}")]
    StepNotFound {
        /// The sequence that was searched.
        sequence_id: String,
        /// The step identifier that was sought.
        step_id: u32,
    },

    /// The XML form of a script could not be read.
    #[error("malformed XML: {0}")]
    MalformedXml(String),
}
