use super::{
    mix::ScratchBuffer,
    voice::Voice,
    voice_pool::{VoiceKey, VoicePool},
};

/// Handle of a sounding voice, unique for the lifetime of its list
pub type SlotId = u64;

/// A sounding voice plus the sample time at which it can be recycled
pub struct ActiveVoice {
    pub id: SlotId,
    pub end_time: u64,
    pub key: VoiceKey,
    pub voice: Voice,
}

/// Voices currently contributing to an output, in start order
pub struct ActiveVoices {
    slots: Vec<ActiveVoice>,
    next_id: SlotId,
}

impl ActiveVoices {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
        }
    }

    /// Start tracking a voice, returns its handle
    pub fn insert(&mut self, end_time: u64, key: VoiceKey, voice: Voice) -> SlotId {
        let id = self.next_id;
        self.next_id += 1;
        debug_assert!(self.slots.iter().all(|slot| slot.id != id));

        self.slots.push(ActiveVoice {
            id,
            end_time,
            key,
            voice,
        });
        id
    }

    /// Voice behind a handle, None once it has been recycled
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut Voice> {
        self.slots
            .iter_mut()
            .find(|slot| slot.id == id)
            .map(|slot| &mut slot.voice)
    }

    #[cfg(test)]
    pub fn end_time(&self, id: SlotId) -> Option<u64> {
        self.slots.iter().find(|slot| slot.id == id).map(|slot| slot.end_time)
    }

    /// Zero `out` and sum every active voice into it
    pub fn mix_into(&mut self, out: &mut [f32], scratch: &mut ScratchBuffer) {
        out.fill(0.0);
        for slot in &mut self.slots {
            scratch.add_voice(&mut slot.voice, out);
        }
    }

    /// Recompute every end time from the voices' current estimates
    pub fn refresh_end_times(&mut self, now: u64) {
        for slot in &mut self.slots {
            slot.end_time = now.saturating_add(slot.voice.remaining_samples());
        }
    }

    /// Move every voice whose end time has been reached back into the pool
    /// Returns how many voices were recycled
    pub fn sweep(&mut self, now: u64, pool: &mut VoicePool) -> usize {
        let mut recycled = 0;
        let mut i = 0;
        while i < self.slots.len() {
            if self.slots[i].end_time > now {
                i += 1;
                continue;
            }

            let slot = self.slots.remove(i);
            pool.put(slot.voice, slot.key);
            recycled += 1;
        }
        recycled
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Forget every voice without recycling it
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl Default for ActiveVoices {
    fn default() -> Self {
        Self::new()
    }
}
