//! The XML form.
//!
//! Metadata, pulse, sequences, characters and locations are all found
//! anywhere in the document; the root element's name does not matter.

use roxmltree::{Document, Node};
use stepwise_core::clock::Clock;
use stepwise_core::error::StepwiseError;
use stepwise_score::{
    Character, Command, Location, Score, ScoreMetadata, Sequence, SpeechTone, Step, StepId,
    TemperatureUnits, Timing, Weather,
};
use tracing::{debug, warn};

use crate::dates::parse_date;
use crate::grouping::plan_groups;
use crate::numbers::{parse_float_prefix, parse_int_prefix};

/// Hands out step ids in document order.
#[derive(Debug, Default)]
struct StepIds(u32);

impl StepIds {
    fn next(&mut self) -> StepId {
        let id = StepId(self.0);
        self.0 += 1;
        id
    }
}

fn named<'a, 'input>(
    document: &'a Document<'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    document.descendants().filter(move |node| {
        node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
    })
}

fn first_named<'a, 'input>(
    document: &'a Document<'input>,
    name: &'a str,
) -> Option<Node<'a, 'input>> {
    named(document, name).next()
}

/// Attribute lookup ignoring the case of the attribute name.
fn attribute<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|attribute| attribute.name().eq_ignore_ascii_case(name))
        .map(|attribute| attribute.value())
}

/// All descendant text, concatenated.
fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|text| text.text())
        .collect()
}

fn child_elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

pub(crate) fn parse_xml(input: &str, clock: &dyn Clock) -> Result<Score, StepwiseError> {
    let document =
        Document::parse(input).map_err(|error| StepwiseError::MalformedXml(error.to_string()))?;

    let mut score = Score::new(clock);
    score.set_metadata(read_metadata(&document));
    score.set_timing(read_timing(&document));

    let mut ids = StepIds::default();
    for (index, node) in named(&document, "sequence").enumerate() {
        score.add_sequence(read_sequence(node, index, &mut ids));
    }
    for (index, node) in named(&document, "character").enumerate() {
        score.add_character(read_character(node, index));
    }
    for (index, node) in named(&document, "location").enumerate() {
        score.add_location(read_location(node, index));
    }
    debug!(
        title = %score.metadata().title,
        sequences = score.sequences().len(),
        characters = score.characters().len(),
        locations = score.locations().len(),
        "parsed XML script"
    );

    score.init();
    Ok(score)
}

fn read_metadata(document: &Document<'_>) -> ScoreMetadata {
    let text = |name: &str| first_named(document, name).map(text_of);
    let defaults = ScoreMetadata::default();
    ScoreMetadata {
        title: text("title").unwrap_or_default(),
        description: text("description").unwrap_or_default(),
        primary_credits: text("primaryCredits").unwrap_or_default(),
        secondary_credits: text("secondaryCredits").unwrap_or_default(),
        version: text("version")
            .and_then(|version| parse_int_prefix(&version))
            .and_then(|version| u32::try_from(version).ok())
            .unwrap_or(defaults.version),
        kind: text("type")
            .map(|kind| kind.trim().to_owned())
            .filter(|kind| !kind.is_empty())
            .unwrap_or(defaults.kind),
    }
}

fn read_timing(document: &Document<'_>) -> Timing {
    let mut timing = Timing::default();
    let Some(pulse) = first_named(document, "pulse") else {
        return timing;
    };
    let positive = |name: &str| {
        attribute(pulse, name)
            .and_then(parse_float_prefix)
            .filter(|value| *value > 0.0)
    };
    if let Some(bpm) = positive("beatsPerMinute") {
        timing.beats_per_minute = bpm;
    }
    if let Some(ppb) = positive("pulsesPerBeat") {
        timing.pulses_per_beat = ppb;
    }
    if let Some(swing) = positive("swing") {
        timing.swing = swing;
    }
    if let Some(duration) = attribute(pulse, "durationPerBeat")
        .and_then(parse_int_prefix)
        .and_then(|value| u32::try_from(value).ok())
    {
        timing.duration_per_beat = duration;
    }
    debug!(pulse_ms = timing.pulse_ms(), "pulse read");
    timing
}

fn read_sequence(node: Node<'_, '_>, index: usize, ids: &mut StepIds) -> Sequence {
    let id = attribute(node, "id").map_or_else(|| format!("sequence{index}"), str::to_owned);
    let mut sequence = Sequence::new(id)
        .with_shuffle(attribute(node, "shuffle") == Some("true"))
        .with_grouping(attribute(node, "grouping").map(str::to_owned));

    if let Some(repeat) = attribute(node, "repeat") {
        let count = parse_int_prefix(repeat).and_then(|count| u32::try_from(count).ok());
        sequence = sequence.with_repeat(true, count);
    }

    let children: Vec<Node<'_, '_>> = child_elements(node).collect();
    let groups =
        attribute(node, "grouping").and_then(|pattern| plan_groups(pattern, children.len()));
    match groups {
        Some(groups) => {
            for placements in groups {
                let group_id = ids.next();
                let substeps: Vec<Step> = placements
                    .iter()
                    .map(|placement| {
                        let mut step = read_step(children[placement.element], ids);
                        if placement.slot > 0 {
                            step.delay =
                                f64::from(u32::try_from(placement.slot).unwrap_or(u32::MAX));
                        }
                        if placement.append {
                            step.mark_append();
                        }
                        step
                    })
                    .collect();
                let content: String = substeps.iter().map(|step| step.content.as_str()).collect();
                let mut group = Step::new(group_id, Command::Group, content);
                group.substeps = substeps;
                sequence.push_step(group);
            }
        }
        None => {
            for child in children {
                sequence.push_step(read_step(child, ids));
            }
        }
    }
    sequence
}

fn read_step(node: Node<'_, '_>, ids: &mut StepIds) -> Step {
    let id = ids.next();
    let content = text_of(node);
    let command = read_command(node, &content);
    let mut step = Step::new(id, command, content);

    step.append = attribute(node, "append") == Some("true");
    if let Some(delay) = attribute(node, "delay") {
        match parse_float_prefix(delay) {
            Some(delay) if delay > 0.0 => step.delay = delay,
            Some(_) => {}
            None => debug!(step_id = %id, delay, "delay is not a number; ignored"),
        }
    }
    step.kind = attribute(node, "type").map(str::to_owned);
    step.item_ref = attribute(node, "itemRef").map(str::to_owned);
    step.character_ref = attribute(node, "character").map(str::to_owned);
    step.destination_ref = attribute(node, "destination").map(str::to_owned);
    step.substeps = child_elements(node).map(|child| read_step(child, ids)).collect();
    step
}

fn read_tone(node: Node<'_, '_>) -> SpeechTone {
    attribute(node, "tone")
        .and_then(|tone| {
            let parsed = SpeechTone::from_name(tone);
            if parsed.is_none() {
                debug!(tone, "unknown tone; using normal");
            }
            parsed
        })
        .unwrap_or_default()
}

fn read_command(node: Node<'_, '_>, content: &str) -> Command {
    let tag = node.tag_name().name().to_ascii_lowercase();
    match tag.as_str() {
        "narrate" => Command::Narrate,
        "speak" => Command::Speak {
            tone: read_tone(node),
        },
        "think" => Command::Think,
        "sing" => Command::Sing {
            tone: read_tone(node),
        },
        "setlocation" => Command::SetLocation,
        "settemperature" => Command::SetTemperature {
            value: parse_float_prefix(content),
            units: attribute(node, "units")
                .and_then(TemperatureUnits::from_name)
                .unwrap_or_default(),
        },
        "setweather" => Command::SetWeather {
            weather: Weather::from_name(content),
        },
        "setdate" => Command::SetDate {
            date: parse_date(content),
        },
        "settime" => Command::SetTime {
            date: parse_date(content),
        },
        "setsequence" => Command::SetSequence {
            at_date: attribute(node, "atDate").and_then(|date| {
                let parsed = parse_date(date);
                if parsed.is_none() {
                    warn!(date, "atDate is not a date; ignored");
                }
                parsed
            }),
            auto_start: attribute(node, "autoStart") == Some("true"),
        },
        "sample" => Command::Sample,
        "reset" => Command::Reset,
        "option" => Command::Choice,
        "group" => Command::Group,
        "setbackcolor" => Command::SetBackColor,
        "setmidcolor" => Command::SetMidColor,
        "setforecolor" => Command::SetForeColor,
        _ => {
            debug!(tag = %tag, "unknown command; step will be inert");
            Command::Unknown { name: tag }
        }
    }
}

fn read_character(node: Node<'_, '_>, index: usize) -> Character {
    let id = attribute(node, "id").map_or_else(|| format!("character{index}"), str::to_owned);
    let visible = match attribute(node, "visible") {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    };
    Character::new(
        id,
        attribute(node, "firstName").unwrap_or_default(),
        attribute(node, "lastName").unwrap_or_default(),
        visible,
    )
}

fn read_location(node: Node<'_, '_>, index: usize) -> Location {
    let id = attribute(node, "id").map_or_else(|| format!("location{index}"), str::to_owned);
    let coordinate = |name: &str| attribute(node, name).and_then(parse_float_prefix).unwrap_or(0.0);
    Location::new(id, coordinate("lat"), coordinate("lon"), text_of(node))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use stepwise_score::StepTarget;
    use stepwise_test_support::{FixedClock, epoch};

    use super::*;

    fn parse(input: &str) -> Score {
        parse_xml(input, &FixedClock(epoch())).unwrap()
    }

    #[test]
    fn test_metadata_and_pulse() {
        // Arrange
        let input = r#"<stepwise>
            <title>The Lighthouse</title>
            <description>A night watch.</description>
            <primaryCredits>R. Keeper</primaryCredits>
            <secondaryCredits>Illustrated</secondaryCredits>
            <version>3</version>
            <type>standard</type>
            <pulse BEATSPERMINUTE="60" pulsesPerBeat="2" durationPerBeat="3" swing="1.5"/>
        </stepwise>"#;

        // Act
        let score = parse(input);

        // Assert
        let metadata = score.metadata();
        assert_eq!(metadata.title, "The Lighthouse");
        assert_eq!(metadata.description, "A night watch.");
        assert_eq!(metadata.primary_credits, "R. Keeper");
        assert_eq!(metadata.secondary_credits, "Illustrated");
        assert_eq!(metadata.version, 3);
        assert_eq!(metadata.kind, "standard");
        assert!((score.timing().pulse_ms() - 500.0).abs() < f64::EPSILON);
        assert_eq!(score.timing().duration_per_beat, 3);
        assert!((score.timing().swing - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unreadable_metadata_falls_back() {
        let score = parse(r#"<s><version>next</version><pulse beatsPerMinute="fast"/></s>"#);

        assert_eq!(score.metadata().version, 1);
        assert_eq!(score.metadata().kind, "basic");
        assert!((score.timing().pulse_ms() - 125.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sequence_attributes() {
        // Arrange
        let input = r#"<stepwise>
            <sequence id="loop" repeat="2"><narrate>a</narrate></sequence>
            <sequence repeat="true" shuffle="true"><narrate>b</narrate></sequence>
            <sequence repeat="-4"><narrate>c</narrate></sequence>
            <sequence><narrate>d</narrate></sequence>
        </stepwise>"#;

        // Act
        let score = parse(input);

        // Assert
        let sequences = score.sequences();
        assert_eq!(sequences[0].id, "loop");
        assert!(sequences[0].repeat());
        assert_eq!(sequences[0].count(), Some(2));
        assert_eq!(sequences[1].id, "sequence1");
        assert!(sequences[1].repeat());
        assert!(sequences[1].shuffle());
        assert_eq!(sequences[1].count(), None);
        assert_eq!(sequences[2].count(), None);
        assert!(!sequences[3].repeat());
        assert!(!sequences[3].shuffle());
    }

    #[test]
    fn test_duplicate_ids_keep_both_entries_last_wins_lookup() {
        let score = parse(
            r#"<s><sequence id="a"><narrate>first</narrate></sequence>
               <sequence id="a"><narrate>second</narrate></sequence></s>"#,
        );

        assert_eq!(score.sequences().len(), 2);
        assert_eq!(score.sequence("a").unwrap().steps()[0].content, "second");
    }

    #[test]
    fn test_step_fields() {
        // Arrange
        let input = r#"<stepwise><sequence>
            <speak character="ada" tone="whisper" delay="1.5" append="true">Psst.</speak>
            <sing character="ada" tone="yodel">La.</sing>
            <settemperature units="Fahrenheit">72.5</settemperature>
            <setweather>HeavyRain</setweather>
            <setdate>2001-09-09 01:46:40</setdate>
            <setsequence atDate="2001-09-09" autoStart="true">other</setsequence>
            <option type="url" destination="https://example.org">Read more</option>
            <narrate itemRef="lamp" type="note">A <em>lamp</em> glows.</narrate>
            <dance>?</dance>
        </sequence></stepwise>"#;

        // Act
        let score = parse(input);

        // Assert
        let steps = score.sequences()[0].steps();
        assert_eq!(steps[0].command, Command::Speak { tone: SpeechTone::Whisper });
        assert!((steps[0].delay - 1.5).abs() < f64::EPSILON);
        assert!(steps[0].append);
        assert_eq!(steps[0].character_ref.as_deref(), Some("ada"));
        assert_eq!(steps[1].command, Command::Sing { tone: SpeechTone::Normal });
        assert_eq!(
            steps[2].command,
            Command::SetTemperature {
                value: Some(72.5),
                units: TemperatureUnits::Fahrenheit
            }
        );
        assert_eq!(steps[3].command, Command::SetWeather { weather: Some(Weather::HeavyRain) });
        assert_eq!(
            steps[4].date(),
            Some(Utc.with_ymd_and_hms(2001, 9, 9, 1, 46, 40).unwrap())
        );
        assert_eq!(
            steps[5].command,
            Command::SetSequence {
                at_date: Some(Utc.with_ymd_and_hms(2001, 9, 9, 0, 0, 0).unwrap()),
                auto_start: true
            }
        );
        assert_eq!(steps[6].kind.as_deref(), Some("url"));
        assert_eq!(steps[7].content, "A lamp glows.");
        assert_eq!(steps[7].item_ref.as_deref(), Some("lamp"));
        assert_eq!(steps[7].substeps.len(), 1);
        assert_eq!(steps[7].substeps[0].command, Command::Unknown { name: "em".to_owned() });
        assert_eq!(steps[8].command, Command::Unknown { name: "dance".to_owned() });
    }

    #[test]
    fn test_step_ids_are_unique_in_document_order() {
        let score = parse(
            r#"<s><sequence><narrate>a<b/></narrate><narrate>c</narrate></sequence>
               <sequence><narrate>d</narrate></sequence></s>"#,
        );

        let first = score.sequences()[0].steps();
        assert_eq!(first[0].id, StepId(0));
        assert_eq!(first[0].substeps[0].id, StepId(1));
        assert_eq!(first[1].id, StepId(2));
        assert_eq!(score.sequences()[1].steps()[0].id, StepId(3));
    }

    #[test]
    fn test_grouping_builds_staggered_group_steps() {
        // Arrange
        let input = r#"<s><sequence grouping="x&amp;x">
            <narrate>one</narrate>
            <narrate delay="3">two<narrate>inner</narrate></narrate>
            <narrate>three</narrate>
            <narrate delay="2">four</narrate>
        </sequence></s>"#;

        // Act
        let score = parse(input);

        // Assert
        let steps = score.sequences()[0].steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].command, Command::Group);
        let delays: Vec<f64> = steps[0].substeps.iter().map(|s| s.delay).collect();
        assert_eq!(delays, vec![0.0, 1.0, 2.0]);
        let appends: Vec<bool> = steps[0].substeps.iter().map(|s| s.append).collect();
        assert_eq!(appends, vec![false, true, false]);
        assert!(steps[0].substeps[1].substeps[0].append);
        assert_eq!(steps[1].substeps.len(), 1);
        assert!((steps[1].substeps[0].delay - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_grouping_without_placements_keeps_plain_steps() {
        let score = parse(
            r#"<s><sequence grouping="--"><narrate>a</narrate><narrate>b</narrate></sequence></s>"#,
        );

        let steps = score.sequences()[0].steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].command, Command::Narrate);
        assert_eq!(score.sequences()[0].grouping(), Some("--"));
    }

    #[test]
    fn test_characters_and_locations() {
        // Arrange
        let input = r#"<s>
            <character id="ada" firstname="Ada" LASTNAME="Lovelace" visible="true"/>
            <character firstName="Ghost" visible="false"/>
            <location id="lab" lat="51.5" lon="-0.12">The Lab</location>
            <location lat="north">Nowhere</location>
        </s>"#;

        // Act
        let score = parse(input);

        // Assert
        let ada = score.character("ada").unwrap();
        assert_eq!(ada.full_name, "Ada Lovelace");
        assert!(ada.is_visible());
        let ghost = score.character("character1").unwrap();
        assert_eq!(ghost.full_name, "Ghost");
        assert!(ghost.is_pinned_hidden());
        let lab = score.location("lab").unwrap();
        assert!((lab.latitude - 51.5).abs() < f64::EPSILON);
        assert_eq!(lab.name, "The Lab");
        let nowhere = score.location("location1").unwrap();
        assert!(nowhere.latitude.abs() < f64::EPSILON);
    }

    #[test]
    fn test_targets_resolve_across_the_document() {
        let score = parse(
            r#"<s><sequence>
                 <speak character="ada">Hi.</speak>
                 <setlocation>lab</setlocation>
                 <sample>later</sample>
                 <speak character="nobody">?</speak>
               </sequence>
               <sequence id="later"><narrate>x</narrate></sequence>
               <character id="ada" firstName="Ada"/>
               <location id="lab">Lab</location></s>"#,
        );

        let steps = score.sequences()[0].steps();
        assert!(matches!(steps[0].target, StepTarget::Character { index: 0, .. }));
        assert!(matches!(steps[1].target, StepTarget::Location { index: 0, .. }));
        assert!(matches!(steps[2].target, StepTarget::Sequence { index: 1, .. }));
        assert_eq!(steps[3].target, StepTarget::Unresolved);
    }
}
