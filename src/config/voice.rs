use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::audio::{
    envelope::{AdsrEnvelope, AdsrParams, ConstantEnvelope},
    multi_voice::{MultiVoice, Partial},
    voice::Voice,
};
use crate::dsp::filter::LowPassFilter;
use crate::types::waveform::Waveform;

/// Declarative description of a voice tree
///
/// Partials are summed (a single unit partial is used bare), then optionally
/// low-pass filtered, then shaped by the envelope.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VoiceSpec {
    pub partials: Vec<PartialSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<f32>,

    #[serde(default)]
    pub envelope: EnvelopeSpec,
}

/// One tone of a voice
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PartialSpec {
    #[serde(default)]
    pub wave: Waveform,

    /// Frequency ratio against the played note
    #[serde(default = "default_ratio")]
    pub freq: f32,

    /// Gain ratio against the note gain
    #[serde(default = "default_ratio")]
    pub gain: f32,
}

/// Envelope at the top of a voice
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EnvelopeSpec {
    Adsr(AdsrSpec),
    Constant,
    None,
}

impl Default for EnvelopeSpec {
    fn default() -> Self {
        EnvelopeSpec::Adsr(AdsrSpec::default())
    }
}

/// ADSR settings, times in seconds
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdsrSpec {
    pub attack: f32,
    pub peak: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub floor: f32,
}

impl Default for AdsrSpec {
    fn default() -> Self {
        AdsrParams::default().into()
    }
}

impl From<AdsrParams> for AdsrSpec {
    fn from(p: AdsrParams) -> Self {
        Self {
            attack: p.attack_time,
            peak: p.attack_gain,
            decay: p.decay_time,
            sustain: p.sustain_gain,
            release: p.release_time,
            floor: p.min_gain,
        }
    }
}

impl AdsrSpec {
    pub fn params(&self) -> AdsrParams {
        AdsrParams {
            attack_time: self.attack,
            attack_gain: self.peak,
            decay_time: self.decay,
            sustain_gain: self.sustain,
            release_time: self.release,
            min_gain: self.floor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, time) in [
            ("Attack", self.attack),
            ("Decay", self.decay),
            ("Release", self.release),
        ] {
            if !(0.0..=10.0).contains(&time) {
                return Err(anyhow!("{} must be between 0.0 and 10.0 seconds", name));
            }
        }
        if self.peak <= 0.0 {
            return Err(anyhow!("Peak gain must be positive"));
        }
        if self.sustain < 0.0 || self.sustain > self.peak {
            return Err(anyhow!("Sustain must be between 0.0 and the peak gain"));
        }
        if self.floor <= 0.0 {
            return Err(anyhow!("Floor must be positive"));
        }
        Ok(())
    }
}

impl PartialSpec {
    pub fn new(wave: Waveform, freq: f32, gain: f32) -> Self {
        Self { wave, freq, gain }
    }
}

impl VoiceSpec {
    /// Additive sine organ with a 2 kHz low-pass and a short ADSR
    pub fn organ() -> Self {
        Self {
            partials: vec![
                PartialSpec::new(Waveform::Sine, 1.0, 1.0),
                PartialSpec::new(Waveform::Sine, 2.0, 1.0 / 4.0),
                PartialSpec::new(Waveform::Sine, 4.0, 1.0 / 6.0),
            ],
            cutoff: Some(2000.0),
            envelope: EnvelopeSpec::default(),
        }
    }

    /// Softer two-partial variant of the organ
    pub fn mellow_organ() -> Self {
        Self {
            partials: vec![
                PartialSpec::new(Waveform::Sine, 1.0, 1.0 / 2.0),
                PartialSpec::new(Waveform::Sine, 2.0, 1.0 / 8.0),
            ],
            ..Self::organ()
        }
    }

    /// Triangle blip that fades out on its own
    pub fn blip() -> Self {
        Self {
            partials: vec![PartialSpec::new(Waveform::Triangle, 1.0, 1.0)],
            cutoff: None,
            envelope: EnvelopeSpec::Adsr(AdsrSpec {
                attack: 0.0001,
                peak: 1.2,
                decay: 1.0,
                sustain: 0.005,
                release: 0.1,
                floor: 0.01,
            }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.partials.is_empty() {
            return Err(anyhow!("Voice must have at least one partial"));
        }
        for partial in &self.partials {
            if partial.freq <= 0.0 || partial.gain <= 0.0 {
                return Err(anyhow!(
                    "Partial ratios must be positive (freq {}, gain {})",
                    partial.freq,
                    partial.gain
                ));
            }
        }
        if let Some(cutoff) = self.cutoff {
            if cutoff <= 0.0 {
                return Err(anyhow!("Cutoff must be positive, got {} Hz", cutoff));
            }
        }
        if let EnvelopeSpec::Adsr(adsr) = &self.envelope {
            adsr.validate()?;
        }
        Ok(())
    }

    /// True when a note on this voice dies away without a note off
    /// Only an ADSR whose sustain sits below its floor does
    pub fn fades_out(&self) -> bool {
        match &self.envelope {
            EnvelopeSpec::Adsr(adsr) => adsr.sustain < adsr.floor,
            EnvelopeSpec::Constant | EnvelopeSpec::None => false,
        }
    }

    /// Build a fresh, uninitialized voice tree
    pub fn build(&self) -> Voice {
        let tone = match self.partials.as_slice() {
            [single] if single.freq == 1.0 && single.gain == 1.0 => single.wave.tone(),
            partials => MultiVoice::new(
                partials
                    .iter()
                    .map(|p| Partial::new(p.wave.tone(), p.freq, p.gain))
                    .collect(),
            )
            .into(),
        };

        let filtered = match self.cutoff {
            Some(cutoff) => LowPassFilter::with_cutoff(tone, cutoff).into(),
            None => tone,
        };

        match &self.envelope {
            EnvelopeSpec::Adsr(adsr) => AdsrEnvelope::new(filtered, adsr.params()).into(),
            EnvelopeSpec::Constant => ConstantEnvelope::new(filtered).into(),
            EnvelopeSpec::None => filtered,
        }
    }
}

fn default_ratio() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_voice_spec() {
        let yaml = r#"
partials:
  - wave: square
    freq: 0.5
  - {}
cutoff: 1200
envelope:
  type: adsr
  attack: 0.02
  sustain: 0.6
"#;

        let spec: VoiceSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.partials[0], PartialSpec::new(Waveform::Square, 0.5, 1.0));
        assert_eq!(spec.partials[1], PartialSpec::new(Waveform::Sine, 1.0, 1.0));
        assert_eq!(spec.cutoff, Some(1200.0));

        let EnvelopeSpec::Adsr(adsr) = spec.envelope else {
            panic!("Expected ADSR envelope");
        };
        assert_eq!(adsr.attack, 0.02);
        assert_eq!(adsr.sustain, 0.6);
        assert_eq!(adsr.peak, AdsrSpec::default().peak);
    }

    #[test]
    fn test_parse_simple_envelopes() {
        let spec: VoiceSpec =
            serde_yaml::from_str("partials: [{wave: triangle}]\nenvelope: {type: constant}")
                .unwrap();
        assert_eq!(spec.envelope, EnvelopeSpec::Constant);
        assert!(matches!(spec.build(), Voice::Constant(_)));

        let spec: VoiceSpec =
            serde_yaml::from_str("partials: [{wave: square}]\nenvelope: {type: none}").unwrap();
        assert!(matches!(spec.build(), Voice::Square(_)));
    }

    #[test]
    fn test_build_organ_tree() {
        let Voice::Adsr(env) = VoiceSpec::organ().build() else {
            panic!("Expected ADSR at the top");
        };
        assert_eq!(*env.params(), AdsrParams::default());
    }

    #[test]
    fn test_built_voice_matches_hand_built() {
        let sample_rate = 44_100;
        let mut built = VoiceSpec::mellow_organ().build();
        let mut by_hand: Voice = AdsrEnvelope::new(
            LowPassFilter::with_cutoff(
                MultiVoice::new(vec![
                    Partial::new(Waveform::Sine.tone(), 1.0, 0.5),
                    Partial::new(Waveform::Sine.tone(), 2.0, 0.125),
                ])
                .into(),
                2000.0,
            )
            .into(),
            AdsrParams::default(),
        )
        .into();

        let mut a = vec![0.0f32; 512];
        let mut b = vec![0.0f32; 512];
        for (voice, out) in [(&mut built, &mut a), (&mut by_hand, &mut b)] {
            voice.initialize(sample_rate);
            voice.note_on(220.0, 0.3);
            voice.read(out);
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_blip_fades_by_itself() {
        let mut blip = VoiceSpec::blip().build();
        blip.initialize(44_100);
        blip.note_on(440.0, 1.0);
        let remaining = blip.remaining_samples();
        assert!(remaining > 0 && remaining < 10 * 44_100);
    }

    #[test]
    fn test_fades_out() {
        assert!(VoiceSpec::blip().fades_out());
        assert!(!VoiceSpec::organ().fades_out());

        let mut spec = VoiceSpec::blip();
        spec.envelope = EnvelopeSpec::Constant;
        assert!(!spec.fades_out());
        spec.envelope = EnvelopeSpec::None;
        assert!(!spec.fades_out());
    }

    #[test]
    fn test_validation() {
        let mut spec = VoiceSpec::organ();
        spec.partials.clear();
        assert!(spec.validate().is_err());

        let mut spec = VoiceSpec::organ();
        spec.partials[1].freq = 0.0;
        assert!(spec.validate().is_err());

        let mut spec = VoiceSpec::organ();
        spec.cutoff = Some(-5.0);
        assert!(spec.validate().is_err());

        let mut spec = VoiceSpec::blip();
        spec.envelope = EnvelopeSpec::Adsr(AdsrSpec {
            floor: 0.0,
            ..AdsrSpec::default()
        });
        assert!(spec.validate().is_err());

        let adsr = AdsrSpec {
            sustain: 2.0,
            ..AdsrSpec::default()
        };
        assert!(adsr.validate().is_err());

        let adsr = AdsrSpec {
            release: 11.0,
            ..AdsrSpec::default()
        };
        assert!(adsr.validate().is_err());
    }
}
