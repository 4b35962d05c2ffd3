use std::collections::HashMap;

use tracing::debug;

use super::voice::Voice;

/// Identifies an instrument (MIDI program) or a sound effect timbre
pub type VoiceKey = u32;

/// Builds a fresh voice for a key on a pool miss
pub type VoiceFactory = Box<dyn Fn(VoiceKey) -> Voice + Send>;

/// Per-key cache of voices that finished playing
///
/// Voices are handed out by value, so a voice is owned either by the pool
/// or by exactly one caller. Each key keeps a LIFO stack.
pub struct VoicePool {
    free: HashMap<VoiceKey, Vec<Voice>>,
    free_count: usize,
    factory: VoiceFactory,
}

impl VoicePool {
    /// Create an empty pool that builds voices with `factory`
    pub fn new(factory: impl Fn(VoiceKey) -> Voice + Send + 'static) -> Self {
        Self {
            free: HashMap::new(),
            free_count: 0,
            factory: Box::new(factory),
        }
    }

    /// Take a cached voice for `key`, or build a new one
    /// The voice still has to be initialized by the caller
    pub fn get(&mut self, key: VoiceKey) -> Voice {
        if let Some(voice) = self.free.get_mut(&key).and_then(Vec::pop) {
            self.free_count -= 1;
            return voice;
        }

        let voice = (self.factory)(key);
        debug!(key, kind = voice.kind_name(), "Creating new voice");
        voice
    }

    /// Hand a voice back for later reuse under `key`
    pub fn put(&mut self, voice: Voice, key: VoiceKey) {
        self.free.entry(key).or_default().push(voice);
        self.free_count += 1;
    }

    /// Drop every cached voice
    pub fn clear(&mut self) {
        for stack in self.free.values_mut() {
            stack.clear();
        }
        self.free_count = 0;
    }

    /// Number of cached voices over all keys
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// Number of cached voices for one key
    pub fn free_for(&self, key: VoiceKey) -> usize {
        self.free.get(&key).map_or(0, Vec::len)
    }
}
