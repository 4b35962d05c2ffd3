use super::voice::Voice;

/// ADSR configuration, times in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    /// Time of the linear ramp from silence to `attack_gain`
    pub attack_time: f32,
    /// Peak gain reached at the end of the attack
    pub attack_gain: f32,
    /// Time of the geometric fall from `attack_gain` to `sustain_gain`
    pub decay_time: f32,
    /// Gain held while the note is down
    pub sustain_gain: f32,
    /// Half-life of the gain after note off
    pub release_time: f32,
    /// Gain below which the envelope counts as silent
    pub min_gain: f32,
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            attack_time: 0.009,
            attack_gain: 1.1,
            decay_time: 0.025,
            sustain_gain: 0.9,
            release_time: 0.09,
            min_gain: 0.01,
        }
    }
}

/// Phase of an ADSR envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR Envelope Generator wrapping another voice
/// Attack is a linear ramp, decay and release are geometric
pub struct AdsrEnvelope {
    voice: Box<Voice>,
    params: AdsrParams,
    stage: EnvelopeStage,
    gain: f64,
    /// Added to the gain every sample of the attack
    attack_speed: f64,
    // Both multipliers are stored as (ratio - 1) and applied as gain += gain * m,
    // floats resolve values near zero far better than values near one
    decay_multiplier: f64,
    release_multiplier: f64,
}

impl AdsrEnvelope {
    pub fn new(voice: Voice, params: AdsrParams) -> Self {
        Self {
            voice: Box::new(voice),
            params,
            stage: EnvelopeStage::Idle,
            gain: 0.0,
            attack_speed: 0.0,
            decay_multiplier: 0.0,
            release_multiplier: 0.0,
        }
    }

    /// Derive the per-sample rates for the given sample rate
    fn setup(&mut self, sample_rate: u32) {
        let sample_rate = sample_rate.max(1) as f64;
        let p = &self.params;

        let attack_gain = (p.attack_gain as f64).max(f64::EPSILON);
        let attack_samples = (p.attack_time as f64 * sample_rate).max(1.0);
        self.attack_speed = attack_gain / attack_samples;

        let full_ratio = (p.sustain_gain as f64).max(0.0) / attack_gain;
        let decay_samples = (p.decay_time as f64 * sample_rate).max(1.0);
        self.decay_multiplier = full_ratio.powf(1.0 / decay_samples) - 1.0;

        let release_samples = (p.release_time as f64 * sample_rate).max(1.0);
        self.release_multiplier = 0.5f64.powf(1.0 / release_samples) - 1.0;
    }

    pub fn initialize(&mut self, sample_rate: u32) {
        self.voice.initialize(sample_rate);
        self.setup(sample_rate);
        self.stage = EnvelopeStage::Idle;
        self.gain = 0.0;
    }

    pub fn read(&mut self, out: &mut [f32]) {
        // Floor check once per block, before anything else is generated
        let floor_applies = matches!(
            self.stage,
            EnvelopeStage::Decay | EnvelopeStage::Sustain | EnvelopeStage::Release
        );
        if floor_applies && self.gain < self.params.min_gain as f64 {
            self.stage = EnvelopeStage::Idle;
        }

        if self.stage == EnvelopeStage::Idle {
            out.fill(0.0);
            return;
        }

        self.voice.read(out);

        let attack_gain = self.params.attack_gain as f64;
        let sustain_gain = self.params.sustain_gain as f64;
        for sample in out.iter_mut() {
            match self.stage {
                EnvelopeStage::Attack => {
                    self.gain += self.attack_speed;
                    if self.gain > attack_gain {
                        self.stage = EnvelopeStage::Decay;
                    }
                }
                EnvelopeStage::Decay => {
                    self.gain += self.gain * self.decay_multiplier;
                    if self.gain < sustain_gain {
                        self.stage = EnvelopeStage::Sustain;
                    }
                }
                EnvelopeStage::Release => {
                    self.gain += self.gain * self.release_multiplier;
                }
                EnvelopeStage::Sustain | EnvelopeStage::Idle => {}
            }

            *sample *= self.gain as f32;
        }
    }

    pub fn note_on(&mut self, frequency: f32, gain: f32) {
        self.voice.note_on(frequency, gain);
        self.stage = EnvelopeStage::Attack;
        self.gain = 0.0;
    }

    pub fn note_off(&mut self) {
        self.voice.note_off();
        self.stage = EnvelopeStage::Release;
    }

    pub fn remaining_samples(&self) -> u64 {
        if self.stage == EnvelopeStage::Idle {
            return 0;
        }

        let remaining = self.voice.remaining_samples();
        let own = match self.stage {
            EnvelopeStage::Release => Some(self.release_samples_to_floor()),
            _ if self.params.sustain_gain < self.params.min_gain => self.samples_to_floor(),
            _ => None,
        };

        match own {
            Some(own) => own.min(remaining),
            None => remaining,
        }
    }

    /// gain * m^n = min_gain  =>  n = log_m(min_gain / gain)
    fn release_samples_to_floor(&self) -> u64 {
        let min_gain = self.params.min_gain as f64;
        if self.gain <= min_gain {
            return 0;
        }

        let samples = (min_gain / self.gain).ln() / (1.0 + self.release_multiplier).ln();
        samples.max(0.0) as u64
    }

    /// Time until a percussive envelope (sustain below the floor) fades out by itself
    fn samples_to_floor(&self) -> Option<u64> {
        let min_gain = self.params.min_gain as f64;
        let ratio = 1.0 + self.decay_multiplier;
        if ratio >= 1.0 {
            return None;
        }

        let decay_from = |gain: f64| -> f64 {
            if gain <= min_gain {
                0.0
            } else {
                ((min_gain / gain).ln() / ratio.ln()).ceil()
            }
        };

        let samples = match self.stage {
            EnvelopeStage::Attack => {
                let attack_gain = self.params.attack_gain as f64;
                let rise = ((attack_gain - self.gain).max(0.0) / self.attack_speed).ceil() + 1.0;
                rise + decay_from(attack_gain + self.attack_speed)
            }
            EnvelopeStage::Decay => decay_from(self.gain),
            _ => 0.0,
        };

        Some(samples as u64 + 1)
    }

    /// Current envelope gain
    pub fn gain(&self) -> f32 {
        self.gain as f32
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn params(&self) -> &AdsrParams {
        &self.params
    }
}

/// On/off gate: full wrapped output between note on and note off, silence otherwise
pub struct ConstantEnvelope {
    voice: Box<Voice>,
    active: bool,
}

impl ConstantEnvelope {
    pub fn new(voice: Voice) -> Self {
        Self {
            voice: Box::new(voice),
            active: false,
        }
    }

    pub fn initialize(&mut self, sample_rate: u32) {
        self.voice.initialize(sample_rate);
        self.active = false;
    }

    pub fn read(&mut self, out: &mut [f32]) {
        if !self.active {
            out.fill(0.0);
            return;
        }

        self.voice.read(out);
    }

    pub fn note_on(&mut self, frequency: f32, gain: f32) {
        self.voice.note_on(frequency, gain);
        self.active = true;
    }

    pub fn note_off(&mut self) {
        self.voice.note_off();
        self.active = false;
    }

    pub fn remaining_samples(&self) -> u64 {
        if !self.active {
            return 0;
        }

        self.voice.remaining_samples()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
