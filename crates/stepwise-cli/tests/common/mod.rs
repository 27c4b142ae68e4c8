//! Shared test helpers for player integration tests.
#![allow(dead_code)]

use clap::Parser;
use stepwise_cli::config::{Args, Config};

/// Builds a validated configuration from command-line style arguments.
pub fn config_from(args: &[&str]) -> Config {
    Args::try_parse_from(std::iter::once("stepwise").chain(args.iter().copied()))
        .unwrap()
        .into_config()
        .unwrap()
}

/// Splits the player's output into one JSON value per line.
pub fn json_lines(output: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// The `content` of each executed step in the output.
pub fn contents(output: &[u8]) -> Vec<String> {
    json_lines(output)
        .iter()
        .map(|line| {
            line["payload"]["StepExecuted"]["step"]["content"]
                .as_str()
                .unwrap()
                .to_owned()
        })
        .collect()
}
