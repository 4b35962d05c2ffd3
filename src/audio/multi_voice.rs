use super::{mix::ScratchBuffer, voice::Voice};

/// One component of a composite voice
pub struct Partial {
    pub voice: Voice,
    /// Multiplies the note frequency (detuning, harmonics)
    pub frequency_ratio: f32,
    /// Multiplies the note gain
    pub gain_ratio: f32,
}

impl Partial {
    pub fn new(voice: Voice, frequency_ratio: f32, gain_ratio: f32) -> Self {
        Self {
            voice,
            frequency_ratio,
            gain_ratio,
        }
    }
}

/// Composite voice summing several sub-voices
pub struct MultiVoice {
    partials: Vec<Partial>,
    scratch: ScratchBuffer,
}

impl MultiVoice {
    pub fn new(partials: Vec<Partial>) -> Self {
        Self {
            partials,
            scratch: ScratchBuffer::new(),
        }
    }

    pub fn initialize(&mut self, sample_rate: u32) {
        for partial in &mut self.partials {
            partial.voice.initialize(sample_rate);
        }
    }

    pub fn read(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        // TODO: skip partials whose remaining_samples() already hit zero
        for partial in &mut self.partials {
            self.scratch.add_voice(&mut partial.voice, out);
        }
    }

    pub fn note_on(&mut self, frequency: f32, gain: f32) {
        for partial in &mut self.partials {
            partial
                .voice
                .note_on(frequency * partial.frequency_ratio, gain * partial.gain_ratio);
        }
    }

    pub fn note_off(&mut self) {
        for partial in &mut self.partials {
            partial.voice.note_off();
        }
    }

    /// A composite sounds as long as its longest-lived component
    pub fn remaining_samples(&self) -> u64 {
        self.partials
            .iter()
            .map(|p| p.voice.remaining_samples())
            .max()
            .unwrap_or(0)
    }
}
