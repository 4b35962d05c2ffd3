use std::f64::consts::TAU;

use crate::audio::voice::UNDECAYING;

/// Lowest frequency an oscillator will accept, keeps cycle lengths finite
const MIN_FREQUENCY: f32 = 1.0e-3;

/// Length of one waveform cycle in samples, never shorter than a single sample
fn cycle_length(sample_rate: u32, frequency: f32) -> f32 {
    let frequency = frequency.max(MIN_FREQUENCY);
    (sample_rate.max(1) as f32 / frequency).max(1.0)
}

/// Sine tone generated by a two-tap resonator
/// y[n] = 2cos(w) * y[n-1] - y[n-2], no trig calls after note on
pub struct SineTone {
    sample_rate: u32,
    gain: f32,
    /// y[n-2]
    y0: f64,
    /// y[n-1]
    y1: f64,
    coefficient: f64,
}

impl SineTone {
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            gain: 0.0,
            y0: 0.0,
            y1: 0.0,
            coefficient: 0.0,
        }
    }

    pub fn initialize(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.gain = 0.0;
        self.y0 = 0.0;
        self.y1 = 0.0;
        self.coefficient = 0.0;
    }

    /// Seed the resonator so the first generated sample is sin(w)
    pub fn note_on(&mut self, frequency: f32, gain: f32) {
        let w = TAU * frequency.max(0.0) as f64 / self.sample_rate.max(1) as f64;

        self.coefficient = 2.0 * w.cos();
        self.y0 = (-w).sin();
        self.y1 = 0.0;
        self.gain = gain;
    }

    pub fn note_off(&mut self) {}

    pub fn read(&mut self, out: &mut [f32]) {
        let gain = self.gain as f64;
        for sample in out.iter_mut() {
            let y = self.coefficient * self.y1 - self.y0;
            self.y0 = self.y1;
            self.y1 = y;

            *sample = (y * gain) as f32;
        }
    }

    pub fn remaining_samples(&self) -> u64 {
        UNDECAYING
    }
}

impl Default for SineTone {
    fn default() -> Self {
        Self::new()
    }
}

/// Square tone from an integer phase counter
/// +gain for the first half of each cycle, -gain for the second
pub struct SquareTone {
    sample_rate: u32,
    gain: f32,
    samples_per_cycle: u32,
    samples_per_half_cycle: u32,
    counter: u32,
}

impl SquareTone {
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            gain: 0.0,
            samples_per_cycle: 1,
            samples_per_half_cycle: 1,
            counter: 0,
        }
    }

    pub fn initialize(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.gain = 0.0;
        self.samples_per_cycle = 1;
        self.samples_per_half_cycle = 1;
        self.counter = 0;
    }

    pub fn note_on(&mut self, frequency: f32, gain: f32) {
        let cycle = cycle_length(self.sample_rate, frequency);

        self.samples_per_cycle = (cycle as u32).max(1);
        self.samples_per_half_cycle = (cycle / 2.0) as u32;
        self.counter = 0;
        self.gain = gain;
    }

    pub fn note_off(&mut self) {}

    pub fn read(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            let y = if self.counter < self.samples_per_half_cycle {
                1.0
            } else {
                -1.0
            };
            self.counter = (self.counter + 1) % self.samples_per_cycle;

            *sample = y * self.gain;
        }
    }

    pub fn remaining_samples(&self) -> u64 {
        UNDECAYING
    }
}

impl Default for SquareTone {
    fn default() -> Self {
        Self::new()
    }
}

/// Triangle tone: a linear ramp reflecting at +-1
pub struct TriangleTone {
    sample_rate: u32,
    gain: f32,
    samples_per_quarter_cycle: f32,
    step: f32,
    counter: f32,
}

impl TriangleTone {
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            gain: 0.0,
            samples_per_quarter_cycle: 1.0,
            step: 0.0,
            counter: 0.0,
        }
    }

    pub fn initialize(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.gain = 0.0;
        self.samples_per_quarter_cycle = 1.0;
        self.step = 0.0;
        self.counter = 0.0;
    }

    pub fn note_on(&mut self, frequency: f32, gain: f32) {
        let cycle = cycle_length(self.sample_rate, frequency);

        self.samples_per_quarter_cycle = cycle / 4.0;
        self.step = 1.0 / self.samples_per_quarter_cycle;
        self.counter = 0.0;
        self.gain = gain;
    }

    pub fn note_off(&mut self) {}

    pub fn read(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            self.counter += self.step;
            if self.counter.abs() >= 1.0 {
                // Reflect off the peak and head back the other way
                let sign = self.counter.signum();
                self.step = -sign / self.samples_per_quarter_cycle;
                self.counter = (2.0 * sign - self.counter).clamp(-1.0, 1.0);
            }

            *sample = self.counter * self.gain;
        }
    }

    pub fn remaining_samples(&self) -> u64 {
        UNDECAYING
    }
}

impl Default for TriangleTone {
    fn default() -> Self {
        Self::new()
    }
}
