use serde::{Deserialize, Serialize};

use crate::audio::voice::Voice;
use crate::dsp::oscillator::{SineTone, SquareTone, TriangleTone};

/// Supported raw tone generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Square,
}

impl Waveform {
    /// Build a fresh, uninitialized tone generator for this waveform
    pub fn tone(self) -> Voice {
        match self {
            Waveform::Sine => Voice::Sine(SineTone::new()),
            Waveform::Triangle => Voice::Triangle(TriangleTone::new()),
            Waveform::Square => Voice::Square(SquareTone::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sine() {
        assert_eq!(Waveform::default(), Waveform::Sine);
    }

    #[test]
    fn test_tone_variant() {
        assert!(matches!(Waveform::Sine.tone(), Voice::Sine(_)));
        assert!(matches!(Waveform::Triangle.tone(), Voice::Triangle(_)));
        assert!(matches!(Waveform::Square.tone(), Voice::Square(_)));
    }

    #[test]
    fn test_deserialize_lowercase() {
        let wave: Waveform = serde_yaml::from_str("triangle").unwrap();
        assert_eq!(wave, Waveform::Triangle);
    }
}
