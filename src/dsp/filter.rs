use std::f64::consts::TAU;

use crate::audio::voice::Voice;

/// Identity wrapper, forwards everything to the wrapped voice
pub struct Passthrough {
    voice: Box<Voice>,
}

impl Passthrough {
    pub fn new(voice: Voice) -> Self {
        Self {
            voice: Box::new(voice),
        }
    }

    pub fn initialize(&mut self, sample_rate: u32) {
        self.voice.initialize(sample_rate);
    }

    pub fn read(&mut self, out: &mut [f32]) {
        self.voice.read(out);
    }

    pub fn note_on(&mut self, frequency: f32, gain: f32) {
        self.voice.note_on(frequency, gain);
    }

    pub fn note_off(&mut self) {
        self.voice.note_off();
    }

    pub fn remaining_samples(&self) -> u64 {
        self.voice.remaining_samples()
    }
}

/// One-pole low-pass smoother over the wrapped voice
/// y = b*x + a*y_prev, with a = 1 - alpha and b = alpha
pub struct LowPassFilter {
    voice: Box<Voice>,
    sample_rate: u32,
    /// Cutoff re-applied every time the filter is initialized, None means pass-through
    cutoff: Option<f32>,
    current_value: f32,
    coefficient_a: f32,
    coefficient_b: f32,
}

impl LowPassFilter {
    /// Create a filter that passes everything until a cutoff is set
    pub fn new(voice: Voice) -> Self {
        Self {
            voice: Box::new(voice),
            sample_rate: 0,
            cutoff: None,
            current_value: 0.0,
            coefficient_a: 0.0,
            coefficient_b: 1.0,
        }
    }

    /// Create a filter with a cutoff that takes effect once the sample rate is known
    pub fn with_cutoff(voice: Voice, cutoff_hz: f32) -> Self {
        let mut filter = Self::new(voice);
        filter.cutoff = Some(cutoff_hz);
        filter
    }

    /// Set filter cutoff frequency
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        self.cutoff = Some(cutoff_hz);
        self.update_coefficients();
    }

    /// alpha = w / (w + 1), w = 2pi * cutoff / sample_rate
    fn update_coefficients(&mut self) {
        let Some(cutoff) = self.cutoff else {
            return;
        };
        if self.sample_rate == 0 {
            return;
        }

        let w = TAU * cutoff.max(0.0) as f64 / self.sample_rate as f64;
        let alpha = w / (w + 1.0);
        self.coefficient_a = (1.0 - alpha) as f32;
        self.coefficient_b = alpha as f32;
    }

    pub fn initialize(&mut self, sample_rate: u32) {
        self.voice.initialize(sample_rate);

        self.sample_rate = sample_rate;
        self.coefficient_a = 0.0;
        self.coefficient_b = 1.0;
        self.current_value = 0.0;
        self.update_coefficients();
    }

    pub fn read(&mut self, out: &mut [f32]) {
        self.voice.read(out);

        for sample in out.iter_mut() {
            self.current_value =
                self.coefficient_b * *sample + self.coefficient_a * self.current_value;
            *sample = self.current_value;
        }
    }

    pub fn note_on(&mut self, frequency: f32, gain: f32) {
        self.voice.note_on(frequency, gain);
    }

    pub fn note_off(&mut self) {
        self.voice.note_off();
    }

    pub fn remaining_samples(&self) -> u64 {
        self.voice.remaining_samples()
    }

    pub fn coefficients(&self) -> (f32, f32) {
        (self.coefficient_a, self.coefficient_b)
    }
}
