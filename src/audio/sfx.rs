use std::sync::{Arc, atomic::Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    active::ActiveVoices,
    mix::ScratchBuffer,
    output::SampleSource,
    parameters::AtomicF32,
    voice::Voice,
    voice_pool::{VoiceKey, VoicePool},
};

struct SfxState {
    pool: VoicePool,
    active: ActiveVoices,
    /// Samples rendered since creation
    sample_counter: u64,
    scratch: ScratchBuffer,
}

/// Fire-and-forget sound effect player
///
/// `play_sfx` may be called from any thread while the audio thread calls
/// `read`. All shared state sits behind one mutex. Voices are set up outside
/// the lock so the audio thread only waits on list operations.
pub struct SfxScheduler {
    sample_rate: u32,
    gain: AtomicF32,
    state: Mutex<SfxState>,
}

impl SfxScheduler {
    pub fn new(sample_rate: u32, factory: impl Fn(VoiceKey) -> Voice + Send + 'static) -> Self {
        Self {
            sample_rate,
            gain: AtomicF32::new(1.0),
            state: Mutex::new(SfxState {
                pool: VoicePool::new(factory),
                active: ActiveVoices::new(),
                sample_counter: 0,
                scratch: ScratchBuffer::new(),
            }),
        }
    }

    /// Master level applied to effects started from now on
    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain.max(0.0), Ordering::Relaxed);
    }

    pub fn gain(&self) -> f32 {
        self.gain.load(Ordering::Relaxed)
    }

    /// Start effect `id`, it plays until its voice fades out
    pub fn play_sfx(&self, id: VoiceKey, frequency: f32, gain: f32) {
        let mut voice = self.state.lock().pool.get(id);

        let gain = gain * self.gain();
        voice.initialize(self.sample_rate);
        voice.note_on(frequency, gain);
        let remaining = voice.remaining_samples();

        let mut state = self.state.lock();
        let end_time = state.sample_counter.saturating_add(remaining);
        state.active.insert(end_time, id, voice);

        trace!(
            id,
            frequency,
            gain,
            remaining,
            active = state.active.len(),
            "Playing sound effect"
        );
    }

    /// Overwrite `out` with the mix of every playing effect
    pub fn read(&self, out: &mut [f32]) -> usize {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.active.mix_into(out, &mut state.scratch);
        state.sample_counter += out.len() as u64;
        state.active.sweep(state.sample_counter, &mut state.pool);

        out.len()
    }

    /// Cut every playing effect, voices go back to the pool
    pub fn clear(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let stopped = state.active.sweep(u64::MAX, &mut state.pool);
        debug!(stopped, "Cleared sound effects");
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn free_count(&self) -> usize {
        self.state.lock().pool.free_count()
    }

    /// Samples rendered since creation
    pub fn sample_time(&self) -> u64 {
        self.state.lock().sample_counter
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl SampleSource for Arc<SfxScheduler> {
    fn sample_rate(&self) -> u32 {
        SfxScheduler::sample_rate(self)
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        SfxScheduler::read(self, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::envelope::{AdsrEnvelope, AdsrParams};
    use crate::types::waveform::Waveform;
    use std::sync::atomic::AtomicUsize;

    const SAMPLE_RATE: u32 = 8000;

    fn blip_params() -> AdsrParams {
        AdsrParams {
            attack_time: 0.0001,
            attack_gain: 1.2,
            decay_time: 0.2,
            sustain_gain: 0.005,
            release_time: 0.1,
            min_gain: 0.01,
        }
    }

    fn blip(_id: VoiceKey) -> Voice {
        AdsrEnvelope::new(Waveform::Triangle.tone(), blip_params()).into()
    }

    fn reference_remaining() -> u64 {
        let mut voice = blip(0);
        voice.initialize(SAMPLE_RATE);
        voice.note_on(440.0, 1.0);
        voice.remaining_samples()
    }

    #[test]
    fn test_output_matches_voice() {
        let sfx = SfxScheduler::new(SAMPLE_RATE, blip);
        sfx.set_gain(0.5);
        sfx.play_sfx(0, 440.0, 0.8);

        let mut reference = blip(0);
        reference.initialize(SAMPLE_RATE);
        reference.note_on(440.0, 0.4);

        let mut expected = vec![0.0f32; 256];
        reference.read(&mut expected);
        let mut out = vec![1.0f32; 256];
        assert_eq!(sfx.read(&mut out), 256);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_silence_without_effects() {
        let sfx = SfxScheduler::new(SAMPLE_RATE, blip);
        let mut out = vec![1.0f32; 64];
        sfx.read(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(sfx.sample_time(), 64);
    }

    #[test]
    fn test_effect_recycled_at_end_time() {
        let remaining = reference_remaining() as usize;
        assert!(remaining > 1 && remaining < 10 * SAMPLE_RATE as usize);

        let sfx = SfxScheduler::new(SAMPLE_RATE, blip);
        sfx.play_sfx(0, 440.0, 1.0);

        let mut out = vec![0.0f32; remaining - 1];
        sfx.read(&mut out);
        assert_eq!(sfx.active_count(), 1);

        sfx.read(&mut out[..1]);
        assert_eq!(sfx.active_count(), 0);
        assert_eq!(sfx.free_count(), 1);

        // Cached voice is reused
        sfx.play_sfx(0, 220.0, 1.0);
        assert_eq!(sfx.free_count(), 0);
    }

    #[test]
    fn test_end_time_counts_from_start() {
        let remaining = reference_remaining();
        let sfx = SfxScheduler::new(SAMPLE_RATE, blip);

        let mut out = vec![0.0f32; 1000];
        sfx.read(&mut out);
        sfx.play_sfx(3, 440.0, 1.0);

        let mut tail = vec![0.0f32; remaining as usize - 1];
        sfx.read(&mut tail);
        assert_eq!(sfx.active_count(), 1);
        sfx.read(&mut tail[..1]);
        assert_eq!(sfx.active_count(), 0);
    }

    #[test]
    fn test_clear_returns_voices() {
        let sfx = SfxScheduler::new(SAMPLE_RATE, blip);
        sfx.play_sfx(0, 440.0, 1.0);
        sfx.play_sfx(1, 660.0, 1.0);
        sfx.clear();

        assert_eq!(sfx.active_count(), 0);
        assert_eq!(sfx.free_count(), 2);
    }

    #[test]
    fn test_play_from_many_threads() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let sfx = SfxScheduler::new(SAMPLE_RATE, move |id| {
            counter.fetch_add(1, Ordering::SeqCst);
            blip(id)
        });

        std::thread::scope(|scope| {
            for thread in 0..4u32 {
                let sfx = &sfx;
                scope.spawn(move || {
                    for i in 0..50u32 {
                        sfx.play_sfx(thread, 200.0 + i as f32, 0.5);
                    }
                });
            }

            let mut out = vec![0.0f32; 128];
            for _ in 0..100 {
                sfx.read(&mut out);
                assert!(out.iter().all(|s| s.is_finite()));
            }
        });

        // Every voice is either playing or cached, none lost or duplicated
        let total = built.load(Ordering::SeqCst);
        assert_eq!(sfx.active_count() + sfx.free_count(), total);

        let mut out = vec![0.0f32; 4 * SAMPLE_RATE as usize];
        sfx.read(&mut out);
        assert_eq!(sfx.active_count(), 0);
        assert_eq!(sfx.free_count(), total);
    }

    #[test]
    fn test_shared_source() {
        let mut source = Arc::new(SfxScheduler::new(SAMPLE_RATE, blip));
        assert_eq!(SampleSource::sample_rate(&source), SAMPLE_RATE);

        source.play_sfx(0, 440.0, 1.0);
        let mut out = vec![0.0f32; 32];
        assert_eq!(SampleSource::read(&mut source, &mut out), 32);
        assert!(out.iter().any(|s| *s != 0.0));
    }
}
