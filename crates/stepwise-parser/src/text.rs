//! The line-delimited text form.
//!
//! Metadata comes from `stepwise.title:`, `stepwise.credit:` and
//! `stepwise.description:` lines when any is present, and otherwise from the
//! first three lines. Every other line is narration in one repeating
//! sequence.

use stepwise_core::clock::Clock;
use stepwise_score::{Command, Score, ScoreMetadata, Sequence, Step, StepId};
use tracing::{debug, warn};

const TITLE_KEY: &str = "stepwise.title:";
const CREDIT_KEY: &str = "stepwise.credit:";
const DESCRIPTION_KEY: &str = "stepwise.description:";

const POSITIONAL_METADATA_LINES: usize = 3;

/// Id of the single sequence a text script produces.
pub(crate) const TEXT_SEQUENCE_ID: &str = "sequence0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetadataKey {
    Title,
    Credit,
    Description,
}

/// Matches a keyed metadata line, case-insensitively, returning the key and
/// the trimmed value.
fn keyed_value(line: &str) -> Option<(MetadataKey, &str)> {
    [
        (TITLE_KEY, MetadataKey::Title),
        (CREDIT_KEY, MetadataKey::Credit),
        (DESCRIPTION_KEY, MetadataKey::Description),
    ]
    .into_iter()
    .find_map(|(prefix, key)| {
        let head = line.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix)
            .then(|| (key, line[prefix.len()..].trim()))
    })
}

fn split_lines<'a>(input: &'a str, delimiter: &str) -> Vec<&'a str> {
    let delimiter = if delimiter.is_empty() {
        warn!("empty line delimiter; splitting on newlines");
        "\n"
    } else {
        delimiter
    };
    let mut lines: Vec<&str> = input
        .split(delimiter)
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    if lines.len() > 1 && input.ends_with(delimiter) {
        lines.pop();
    }
    lines
}

/// Builds the metadata, preferring keyed lines over positional ones.
fn read_metadata(lines: &[&str]) -> (ScoreMetadata, bool) {
    let mut metadata = ScoreMetadata::default();
    let mut keyed = false;
    for (key, value) in lines.iter().filter_map(|line| keyed_value(line)) {
        keyed = true;
        let field = match key {
            MetadataKey::Title => &mut metadata.title,
            MetadataKey::Credit => &mut metadata.primary_credits,
            MetadataKey::Description => &mut metadata.description,
        };
        value.clone_into(field);
    }

    if !keyed {
        let positional = |index: usize| lines.get(index).map_or("", |line| line.trim()).to_owned();
        metadata.title = positional(0);
        metadata.primary_credits = positional(1);
        metadata.description = positional(2);
    }

    if metadata.title.is_empty() {
        "Untitled".clone_into(&mut metadata.title);
    }
    if metadata.primary_credits.is_empty() {
        "Author unknown".clone_into(&mut metadata.primary_credits);
    }
    (metadata, keyed)
}

pub(crate) fn parse_text(input: &str, delimiter: &str, clock: &dyn Clock) -> Score {
    let lines = split_lines(input, delimiter);
    let (metadata, keyed) = read_metadata(&lines);

    let story: Vec<&str> = if keyed {
        lines
            .iter()
            .copied()
            .filter(|line| keyed_value(line).is_none())
            .collect()
    } else {
        lines.iter().copied().skip(POSITIONAL_METADATA_LINES).collect()
    };

    let mut sequence = Sequence::new(TEXT_SEQUENCE_ID).with_repeat(true, None);
    for (index, line) in (0u32..).zip(story) {
        sequence.push_step(Step::new(StepId(index), Command::Narrate, line));
    }
    debug!(
        title = %metadata.title,
        keyed,
        steps = sequence.steps().len(),
        "parsed text script"
    );

    let mut score = Score::new(clock);
    score.set_metadata(metadata);
    score.add_sequence(sequence);
    score.init();
    score
}

#[cfg(test)]
mod tests {
    use stepwise_test_support::{FixedClock, MockRng, epoch};

    use super::*;

    fn contents(score: &Score) -> Vec<&str> {
        score.sequences()[0]
            .steps()
            .iter()
            .map(|step| step.content.as_str())
            .collect()
    }

    #[test]
    fn test_positional_metadata_and_narration() {
        // Arrange
        let clock = FixedClock(epoch());
        let input = "My Title\nJane Doe\nA tale.\nHello there.\nGoodbye.";

        // Act
        let mut score = parse_text(input, "\n", &clock);

        // Assert
        assert_eq!(score.metadata().title, "My Title");
        assert_eq!(score.metadata().primary_credits, "Jane Doe");
        assert_eq!(score.metadata().description, "A tale.");
        assert_eq!(score.sequences().len(), 1);
        let sequence = &score.sequences()[0];
        assert_eq!(sequence.id, TEXT_SEQUENCE_ID);
        assert!(sequence.repeat());
        assert_eq!(sequence.count(), None);
        assert_eq!(contents(&score), vec!["Hello there.", "Goodbye."]);

        let mut rng = MockRng;
        let played: Vec<String> = (0..3)
            .filter_map(|_| score.next_step(&clock, &mut rng))
            .map(|step| step.content)
            .collect();
        assert_eq!(played, vec!["Hello there.", "Goodbye.", "Hello there."]);
        assert_eq!(score.current_sequence().unwrap().completions(), 1);
    }

    #[test]
    fn test_keyed_metadata_wins_anywhere_in_the_script() {
        let clock = FixedClock(epoch());
        let input =
            "Once.\nSTEPWISE.Title:  First \nTwice.\nstepwise.title: Second\nstepwise.credit: Ann";

        let score = parse_text(input, "\n", &clock);

        assert_eq!(score.metadata().title, "Second");
        assert_eq!(score.metadata().primary_credits, "Ann");
        assert_eq!(score.metadata().description, "");
        assert_eq!(contents(&score), vec!["Once.", "Twice."]);
    }

    #[test]
    fn test_missing_metadata_gets_defaults() {
        let clock = FixedClock(epoch());

        let score = parse_text("\n\n", "\n", &clock);

        assert_eq!(score.metadata().title, "Untitled");
        assert_eq!(score.metadata().primary_credits, "Author unknown");
        assert_eq!(score.metadata().version, 1);
        assert_eq!(score.metadata().kind, "basic");
        assert!(score.sequences()[0].steps().is_empty());
    }

    #[test]
    fn test_custom_delimiter_and_line_endings() {
        let clock = FixedClock(epoch());

        let score = parse_text("T|C|D|one\r|two|", "|", &clock);

        assert_eq!(contents(&score), vec!["one", "two"]);
    }

    #[test]
    fn test_trailing_newline_adds_no_step() {
        let clock = FixedClock(epoch());

        let score = parse_text("T\r\nC\r\nD\r\nonly\r\n", "\n", &clock);

        assert_eq!(contents(&score), vec!["only"]);
    }

    #[test]
    fn test_step_ids_follow_line_order() {
        let clock = FixedClock(epoch());

        let score = parse_text("T\nC\nD\na\nb\nc", "\n", &clock);

        let ids: Vec<StepId> = score.sequences()[0].steps().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![StepId(0), StepId(1), StepId(2)]);
    }
}
