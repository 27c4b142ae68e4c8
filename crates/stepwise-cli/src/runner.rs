//! The play loop: sleeps until the score has work due, fires it, and writes
//! each executed step as a JSON line.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use stepwise_core::clock::SystemClock;
use stepwise_core::rng::SystemRng;
use stepwise_parser::parse;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::config::{Config, Mode};
use crate::error::AppError;
use crate::state::PlayerState;

/// What a finished run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps written.
    pub steps: usize,
}

/// Builds a player for `source` with the system clock and an RNG seeded from
/// the configuration.
#[must_use]
pub fn build_player(config: &Config, source: &str) -> PlayerState {
    let clock = Arc::new(SystemClock);
    let mut score = parse(Some(source), config.format, &config.parse, clock.as_ref());
    score.set_options(config.playback);
    score.set_time_scale(config.time_scale);
    info!(
        title = %score.metadata().title,
        sequences = score.sequences().len(),
        pulse_ms = score.timing().pulse_ms(),
        "script loaded"
    );
    let rng = config.seed.map_or_else(SystemRng::new, SystemRng::seeded);
    PlayerState::new(score, clock, Box::new(rng))
}

/// Plays `source` to `out` until it finishes, the step limit is reached, or
/// the user quits.
///
/// # Errors
///
/// Returns `AppError::Io` if reading input or writing output fails, and
/// `AppError::Output` if an event cannot be serialized.
pub async fn run<W: Write>(
    config: &Config,
    source: &str,
    out: &mut W,
) -> Result<RunSummary, AppError> {
    let mut player = build_player(config, source);
    match config.mode {
        Mode::Play => play(&mut player, config.max_steps, out).await?,
        Mode::Interactive => interact(&mut player, config.max_steps, out).await?,
    }
    Ok(RunSummary {
        steps: player.steps(),
    })
}

async fn play<W: Write>(
    player: &mut PlayerState,
    max_steps: Option<usize>,
    out: &mut W,
) -> Result<(), AppError> {
    player.play();
    loop {
        emit(player, out)?;
        if limit_reached(player, max_steps) || player.is_finished() {
            break;
        }
        let Some(wait) = player.time_until_due() else {
            break;
        };
        tokio::select! {
            () = tokio::time::sleep(wait) => {
                player.run_due();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    player.stop();
    Ok(())
}

async fn interact<W: Write>(
    player: &mut PlayerState,
    max_steps: Option<usize>,
    out: &mut W,
) -> Result<(), AppError> {
    info!("press Enter to advance, q to quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        emit(player, out)?;
        if limit_reached(player, max_steps) || player.is_finished() {
            break;
        }
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().eq_ignore_ascii_case("q") => break,
                Some(_) => {
                    if !player.request_step() {
                        debug!("nothing advanced");
                    }
                }
                None => break,
            },
            () = sleep_until_due(player.time_until_due()) => {
                player.run_due();
            }
        }
    }
    finish_delayed(player, out).await
}

/// Lets delayed steps that are already scheduled arrive before exiting.
async fn finish_delayed<W: Write>(
    player: &mut PlayerState,
    out: &mut W,
) -> Result<(), AppError> {
    while let Some(wait) = player.time_until_due() {
        tokio::time::sleep(wait).await;
        player.run_due();
        emit(player, out)?;
    }
    Ok(())
}

async fn sleep_until_due(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

fn limit_reached(player: &PlayerState, max_steps: Option<usize>) -> bool {
    max_steps.is_some_and(|max| player.steps() >= max)
}

fn emit<W: Write>(player: &mut PlayerState, out: &mut W) -> Result<(), AppError> {
    for line in player.drain_events() {
        serde_json::to_writer(&mut *out, &line)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
