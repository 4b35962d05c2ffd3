use super::{
    envelope::{AdsrEnvelope, ConstantEnvelope},
    multi_voice::MultiVoice,
};
use crate::dsp::{
    filter::{LowPassFilter, Passthrough},
    oscillator::{SineTone, SquareTone, TriangleTone},
};

/// Remaining-samples value of a sound that never fades on its own
pub const UNDECAYING: u64 = u64::MAX;

/// Unified synthesis voice
///
/// Raw tones sit at the leaves, filters and envelopes own the voice they wrap,
/// so every voice is a tree owned by exactly one holder at a time.
pub enum Voice {
    Sine(SineTone),
    Square(SquareTone),
    Triangle(TriangleTone),
    Passthrough(Passthrough),
    LowPass(LowPassFilter),
    Adsr(AdsrEnvelope),
    Constant(ConstantEnvelope),
    Multi(MultiVoice),
}

impl Voice {
    /// Reset all internal state and adopt the given sample rate
    /// Called every time a voice is taken from the pool
    pub fn initialize(&mut self, sample_rate: u32) {
        match self {
            Voice::Sine(v) => v.initialize(sample_rate),
            Voice::Square(v) => v.initialize(sample_rate),
            Voice::Triangle(v) => v.initialize(sample_rate),
            Voice::Passthrough(v) => v.initialize(sample_rate),
            Voice::LowPass(v) => v.initialize(sample_rate),
            Voice::Adsr(v) => v.initialize(sample_rate),
            Voice::Constant(v) => v.initialize(sample_rate),
            Voice::Multi(v) => v.initialize(sample_rate),
        }
    }

    /// Overwrite `out` with the next `out.len()` samples
    pub fn read(&mut self, out: &mut [f32]) {
        match self {
            Voice::Sine(v) => v.read(out),
            Voice::Square(v) => v.read(out),
            Voice::Triangle(v) => v.read(out),
            Voice::Passthrough(v) => v.read(out),
            Voice::LowPass(v) => v.read(out),
            Voice::Adsr(v) => v.read(out),
            Voice::Constant(v) => v.read(out),
            Voice::Multi(v) => v.read(out),
        }
    }

    /// Start (or restart) a note
    pub fn note_on(&mut self, frequency: f32, gain: f32) {
        match self {
            Voice::Sine(v) => v.note_on(frequency, gain),
            Voice::Square(v) => v.note_on(frequency, gain),
            Voice::Triangle(v) => v.note_on(frequency, gain),
            Voice::Passthrough(v) => v.note_on(frequency, gain),
            Voice::LowPass(v) => v.note_on(frequency, gain),
            Voice::Adsr(v) => v.note_on(frequency, gain),
            Voice::Constant(v) => v.note_on(frequency, gain),
            Voice::Multi(v) => v.note_on(frequency, gain),
        }
    }

    /// Release the current note, the sound may keep ringing for a while
    pub fn note_off(&mut self) {
        match self {
            Voice::Sine(v) => v.note_off(),
            Voice::Square(v) => v.note_off(),
            Voice::Triangle(v) => v.note_off(),
            Voice::Passthrough(v) => v.note_off(),
            Voice::LowPass(v) => v.note_off(),
            Voice::Adsr(v) => v.note_off(),
            Voice::Constant(v) => v.note_off(),
            Voice::Multi(v) => v.note_off(),
        }
    }

    /// Upper bound on the samples left before this voice becomes inaudible
    ///
    /// Only `initialize`, `note_on` and `note_off` move this estimate, so callers
    /// may turn it into an absolute end time and cache it in between.
    pub fn remaining_samples(&self) -> u64 {
        match self {
            Voice::Sine(v) => v.remaining_samples(),
            Voice::Square(v) => v.remaining_samples(),
            Voice::Triangle(v) => v.remaining_samples(),
            Voice::Passthrough(v) => v.remaining_samples(),
            Voice::LowPass(v) => v.remaining_samples(),
            Voice::Adsr(v) => v.remaining_samples(),
            Voice::Constant(v) => v.remaining_samples(),
            Voice::Multi(v) => v.remaining_samples(),
        }
    }

    /// Short name of the outermost node, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Voice::Sine(_) => "sine",
            Voice::Square(_) => "square",
            Voice::Triangle(_) => "triangle",
            Voice::Passthrough(_) => "passthrough",
            Voice::LowPass(_) => "lowpass",
            Voice::Adsr(_) => "adsr",
            Voice::Constant(_) => "constant",
            Voice::Multi(_) => "multi",
        }
    }
}

macro_rules! impl_from_node {
    ($($node:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$node> for Voice {
                fn from(node: $node) -> Self {
                    Voice::$variant(node)
                }
            }
        )*
    };
}

impl_from_node! {
    SineTone => Sine,
    SquareTone => Square,
    TriangleTone => Triangle,
    Passthrough => Passthrough,
    LowPassFilter => LowPass,
    AdsrEnvelope => Adsr,
    ConstantEnvelope => Constant,
    MultiVoice => Multi,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::envelope::AdsrParams;
    use crate::types::waveform::Waveform;

    #[test]
    fn test_initialize_is_idempotent() {
        let build = || {
            Voice::Adsr(AdsrEnvelope::new(
                Voice::LowPass(LowPassFilter::with_cutoff(Waveform::Triangle.tone(), 1500.0)),
                AdsrParams::default(),
            ))
        };

        let mut once = build();
        once.initialize(44_100);

        let mut reused = build();
        reused.initialize(44_100);
        reused.note_on(220.0, 1.0);
        let mut scratch = vec![0.0f32; 300];
        reused.read(&mut scratch);
        reused.initialize(44_100);
        reused.initialize(44_100);

        let mut a = vec![0.0f32; 256];
        let mut b = vec![0.0f32; 256];
        once.note_on(330.0, 0.5);
        reused.note_on(330.0, 0.5);
        once.read(&mut a);
        reused.read(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_read_is_deterministic() {
        let mut a = Waveform::Sine.tone();
        let mut b = Waveform::Sine.tone();
        for voice in [&mut a, &mut b] {
            voice.initialize(22_050);
            voice.note_on(123.0, 0.9);
        }

        let mut out_a = vec![0.0f32; 100];
        let mut out_b = vec![0.0f32; 100];
        a.read(&mut out_a);
        b.read(&mut out_b[..40]);
        b.read(&mut out_b[40..]);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(Waveform::Square.tone().kind_name(), "square");
    }
}
