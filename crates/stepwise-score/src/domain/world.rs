//! World-state value types: tone, temperature units, weather, palette and
//! pulse timing.

use serde::{Deserialize, Serialize};

/// Divisor guard applied wherever the time scale divides a duration.
pub const TIME_SCALE_EPSILON: f64 = 0.0001;

/// Delivery tone of a `speak` or `sing` step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechTone {
    /// Ordinary delivery.
    #[default]
    Normal,
    /// Quieter than normal.
    Murmur,
    /// Barely audible.
    Whisper,
    /// Raised voice.
    Shout,
    /// Loudest delivery.
    Scream,
}

impl SpeechTone {
    /// Parses a tone name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "murmur" => Some(Self::Murmur),
            "whisper" => Some(Self::Whisper),
            "shout" => Some(Self::Shout),
            "scream" => Some(Self::Scream),
            _ => None,
        }
    }
}

/// Units attached to a temperature value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnits {
    /// Degrees Celsius.
    #[default]
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnits {
    /// Parses a unit name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "celsius" => Some(Self::Celsius),
            "fahrenheit" => Some(Self::Fahrenheit),
            _ => None,
        }
    }
}

/// Weather conditions, after the OpenWeatherMap condition groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    /// Clear sky.
    #[default]
    Clear,
    /// Drizzle.
    Drizzle,
    /// Light rain.
    LightRain,
    /// Rain.
    Rain,
    /// Heavy rain.
    HeavyRain,
    /// Thunderstorm.
    Thunderstorm,
    /// Snow.
    Snow,
    /// Mist, fog, haze and the like.
    Atmosphere,
    /// Clouds.
    Clouds,
    /// Extreme conditions.
    Extreme,
    /// Anything else.
    Additional,
}

impl Weather {
    /// Parses a weather name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "clear" => Some(Self::Clear),
            "drizzle" => Some(Self::Drizzle),
            "lightrain" => Some(Self::LightRain),
            "rain" => Some(Self::Rain),
            "heavyrain" => Some(Self::HeavyRain),
            "thunderstorm" => Some(Self::Thunderstorm),
            "snow" => Some(Self::Snow),
            "atmosphere" => Some(Self::Atmosphere),
            "clouds" => Some(Self::Clouds),
            "extreme" => Some(Self::Extreme),
            "additional" => Some(Self::Additional),
            _ => None,
        }
    }
}

/// The three presentation colors a score can set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    /// Background color.
    pub back: String,
    /// Midground color.
    pub mid: String,
    /// Foreground color.
    pub fore: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            back: "#ffffff".to_owned(),
            mid: "#888888".to_owned(),
            fore: "#000000".to_owned(),
        }
    }
}

/// Pulse timing: how authored delays and play-mode ticks map to wall time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Tempo.
    pub beats_per_minute: f64,
    /// Pulses subdividing each beat.
    pub pulses_per_beat: f64,
    /// Authored beat length; carried for hosts, unused by playback.
    pub duration_per_beat: u32,
    /// Multiplier on the play-mode tick interval.
    pub swing: f64,
    /// Playback speed; larger is faster.
    pub time_scale: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            beats_per_minute: 120.0,
            pulses_per_beat: 4.0,
            duration_per_beat: 4,
            swing: 1.0,
            time_scale: 1.0,
        }
    }
}

impl Timing {
    /// Length of one pulse in milliseconds.
    #[must_use]
    pub fn pulse_ms(&self) -> f64 {
        60_000.0 / self.beats_per_minute / self.pulses_per_beat
    }

    /// Wall-clock milliseconds for an authored delay of `pulses`.
    #[must_use]
    pub fn delay_ms(&self, pulses: f64) -> f64 {
        pulses * self.pulse_ms() * (1.0 / (self.time_scale + TIME_SCALE_EPSILON))
    }

    /// Interval between play-mode ticks in milliseconds.
    #[must_use]
    pub fn tick_ms(&self) -> f64 {
        self.pulse_ms() * self.swing / (self.time_scale + TIME_SCALE_EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pulse_is_125_ms() {
        let timing = Timing::default();
        assert!((timing.pulse_ms() - 125.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delay_scales_inversely_with_time_scale() {
        let mut timing = Timing::default();
        let normal = timing.delay_ms(2.0);
        timing.time_scale = 2.0;
        let fast = timing.delay_ms(2.0);

        assert!((normal - 250.0).abs() < 0.1);
        assert!((fast - 125.0).abs() < 0.1);
    }

    #[test]
    fn test_weather_names_are_case_insensitive() {
        assert_eq!(Weather::from_name(" HeavyRain "), Some(Weather::HeavyRain));
        assert_eq!(Weather::from_name("sleet"), None);
    }

    #[test]
    fn test_unknown_tone_is_rejected() {
        assert_eq!(SpeechTone::from_name("WHISPER"), Some(SpeechTone::Whisper));
        assert_eq!(SpeechTone::from_name("mumble"), None);
    }
}
