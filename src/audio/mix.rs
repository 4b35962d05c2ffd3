use super::voice::Voice;

/// Starting capacity of a scratch buffer, comfortably above common callback sizes
pub const DEFAULT_SCRATCH_LEN: usize = 8192;

/// Reusable render target for summing voices into a shared output
///
/// Grows by doubling when a longer block is requested and never shrinks,
/// so steady-state rendering does not allocate.
pub struct ScratchBuffer {
    samples: Vec<f32>,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self::with_len(DEFAULT_SCRATCH_LEN)
    }

    /// Pre-size for the longest block the caller expects
    pub fn with_len(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn ensure(&mut self, count: usize) {
        if self.samples.len() < count {
            let new_len = (2 * self.samples.len()).max(count);
            self.samples.resize(new_len, 0.0);
        }
    }

    /// Render `out.len()` samples of `voice` and add them into `out`
    /// Afterwards the scratch holds the voice's own samples
    pub fn add_voice(&mut self, voice: &mut Voice, out: &mut [f32]) {
        let count = out.len();
        self.ensure(count);

        let rendered = &mut self.samples[..count];
        voice.read(rendered);
        for (o, v) in out.iter_mut().zip(rendered.iter()) {
            *o += v;
        }
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}
