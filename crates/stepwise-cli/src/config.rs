//! Command-line arguments and the validated player configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use stepwise_parser::{ParseOptions, ScriptFormat};
use stepwise_score::PlaybackOptions;

use crate::error::AppError;

/// Script format as named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Line-delimited text.
    Text,
    /// XML.
    Xml,
}

impl From<FormatArg> for ScriptFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Text => Self::Text,
            FormatArg::Xml => Self::Xml,
        }
    }
}

/// Command-line arguments for the player.
#[derive(Parser, Debug, Clone)]
#[command(name = "stepwise")]
#[command(about = "Play a Stepwise script in the terminal")]
#[command(version)]
pub struct Args {
    /// Path to the script file
    pub script: PathBuf,

    /// Script format; inferred from the file extension when omitted
    #[arg(long, value_enum, env = "STEPWISE_FORMAT")]
    pub format: Option<FormatArg>,

    /// Line delimiter for text scripts
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Playback speed multiplier
    #[arg(long, env = "STEPWISE_TIME_SCALE", default_value_t = 1.0)]
    pub time_scale: f64,

    /// Accept Enter while delayed steps are still arriving
    #[arg(long, env = "STEPWISE_ALLOW_INPUT_DURING_DELAY")]
    pub allow_input_during_delay: bool,

    /// Advance automatically every pulse instead of on Enter
    #[arg(long)]
    pub play: bool,

    /// Stop after this many steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Seed for shuffled sequences
    #[arg(long)]
    pub seed: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, env = "STEPWISE_LOG_JSON")]
    pub log_json: bool,
}

/// How steps are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One step per line read from stdin.
    Interactive,
    /// A step every play tick.
    Play,
}

/// Validated player configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Script file.
    pub script: PathBuf,
    /// Resolved script format.
    pub format: ScriptFormat,
    /// Parser settings.
    pub parse: ParseOptions,
    /// Score playback options.
    pub playback: PlaybackOptions,
    /// Playback speed multiplier.
    pub time_scale: f64,
    /// Trigger mode.
    pub mode: Mode,
    /// Step limit, if any.
    pub max_steps: Option<usize>,
    /// Shuffle seed, if any.
    pub seed: Option<u64>,
    /// JSON log output.
    pub log_json: bool,
}

impl Args {
    /// Validates the arguments into a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the time scale is not a positive number
    /// or the delimiter is empty.
    pub fn into_config(self) -> Result<Config, AppError> {
        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            return Err(AppError::Config(format!(
                "time scale must be a positive number, got {}",
                self.time_scale
            )));
        }

        let parse = match self.delimiter {
            Some(delimiter) if delimiter.is_empty() => {
                return Err(AppError::Config("delimiter must not be empty".to_owned()));
            }
            Some(delimiter) => ParseOptions { delimiter },
            None => ParseOptions::default(),
        };

        let format = self
            .format
            .map_or_else(|| ScriptFormat::for_path(&self.script), ScriptFormat::from);

        Ok(Config {
            script: self.script,
            format,
            parse,
            playback: PlaybackOptions {
                allow_input_during_delay: self.allow_input_during_delay,
            },
            time_scale: self.time_scale,
            mode: if self.play { Mode::Play } else { Mode::Interactive },
            max_steps: self.max_steps,
            seed: self.seed,
            log_json: self.log_json,
        })
    }
}
