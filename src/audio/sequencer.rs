use std::collections::HashMap;

use tracing::{debug, trace};

use super::{
    active::{ActiveVoices, SlotId},
    mix::ScratchBuffer,
    output::SampleSource,
    voice::Voice,
    voice_pool::{VoiceKey, VoicePool},
};
use crate::types::{
    events::{EventKind, MidiEvent, Song},
    note::{midi_note_to_frequency, midi_velocity_to_gain},
};

/// Next-note time once the song has no more notes to schedule
const NEVER: u64 = u64::MAX;

/// Instrument used by channels that never saw a program change
const DEFAULT_INSTRUMENT: VoiceKey = 0;

/// Song playback engine
///
/// Walks the merged event timeline of a song, starting and releasing voices
/// at the exact sample their tick maps to, and mixes every sounding voice into
/// the caller's buffer. Not internally synchronized: `set_song` and `read`
/// belong to one thread.
pub struct MidiSequencer {
    sample_rate: u32,
    gain: f32,
    /// Samples rendered since the song started
    song_time: u64,
    /// Sample time of the pending note event
    next_note_time: u64,
    ticks_per_second: u64,
    timeline: Vec<(usize, MidiEvent)>,
    cursor: usize,
    /// One-event lookahead: the next note on/off to apply
    pending: Option<(usize, MidiEvent)>,
    active: ActiveVoices,
    /// (track, channel, note) -> voice started by the last note on for that key
    channel_voices: HashMap<(usize, u8, u8), SlotId>,
    /// (track, channel) -> last selected program
    channel_instruments: HashMap<(usize, u8), VoiceKey>,
    pool: VoicePool,
    scratch: ScratchBuffer,
}

impl MidiSequencer {
    /// Create an idle sequencer; `factory` builds the voice for an instrument id
    pub fn new(sample_rate: u32, factory: impl Fn(VoiceKey) -> Voice + Send + 'static) -> Self {
        Self {
            sample_rate,
            gain: 1.0,
            song_time: 0,
            next_note_time: NEVER,
            ticks_per_second: 1,
            timeline: Vec::new(),
            cursor: 0,
            pending: None,
            active: ActiveVoices::new(),
            channel_voices: HashMap::new(),
            channel_instruments: HashMap::new(),
            pool: VoicePool::new(factory),
            scratch: ScratchBuffer::new(),
        }
    }

    /// Global output gain applied to every note
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Replace the current song and rewind to its start
    /// Everything from the previous song, cached voices included, is dropped
    pub fn set_song(&mut self, song: &Song) {
        self.reset();

        self.timeline = song.timeline();
        // Empirical rate, does not follow the file's tempo events
        self.ticks_per_second = (3 * song.ticks_per_quarter_note as u64 / 2).max(1);
        self.next_note_time = 0;

        debug!(
            tracks = song.tracks.len(),
            events = self.timeline.len(),
            ticks_per_second = self.ticks_per_second,
            "Song loaded"
        );

        self.update_note();
    }

    /// Silence playback and forget the current song
    pub fn stop(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.active.clear();
        self.channel_voices.clear();
        self.channel_instruments.clear();
        self.pool.clear();

        self.timeline.clear();
        self.cursor = 0;
        self.pending = None;
        self.song_time = 0;
        self.next_note_time = NEVER;
    }

    /// Fill `out` with the next block of the song, always the whole slice
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let count = out.len();
        let mut i = 0;

        while i < count {
            let to_next = self.next_note_time.saturating_sub(self.song_time);
            let chunk = (count - i).min(usize::try_from(to_next).unwrap_or(usize::MAX));

            self.active.mix_into(&mut out[i..i + chunk], &mut self.scratch);
            i += chunk;
            self.song_time += chunk as u64;

            while self.song_time >= self.next_note_time {
                self.update_note();
            }

            self.active.sweep(self.song_time, &mut self.pool);
        }

        count
    }

    /// Apply the pending note, then look ahead to the next one
    fn update_note(&mut self) {
        if let Some((track, event)) = self.pending.take() {
            self.process_event(track, event);
        }

        while self.pending.is_none() {
            let Some(&(track, event)) = self.timeline.get(self.cursor) else {
                break;
            };
            self.cursor += 1;

            match event.kind {
                EventKind::ProgramChange => {
                    self.channel_instruments
                        .insert((track, event.channel), event.program as VoiceKey);
                }
                _ if event.is_note() => self.pending = Some((track, event)),
                _ => {}
            }
        }

        self.next_note_time = match self.pending {
            Some((_, event)) => self.tick_to_sample(event.time),
            None => NEVER,
        };

        self.active.refresh_end_times(self.song_time);
    }

    fn process_event(&mut self, track: usize, event: MidiEvent) {
        let key = (track, event.channel, event.note);
        let frequency = midi_note_to_frequency(event.note);
        let gain = midi_velocity_to_gain(event.velocity) * self.gain;

        match event.kind {
            EventKind::NoteOn => {
                // Retrigger: the old voice keeps its slot and plays out its release
                if let Some(previous) = self.channel_voices.get(&key).copied() {
                    if let Some(voice) = self.active.get_mut(previous) {
                        voice.note_off();
                    }
                }

                let instrument = self
                    .channel_instruments
                    .get(&(track, event.channel))
                    .copied()
                    .unwrap_or(DEFAULT_INSTRUMENT);

                let mut voice = self.pool.get(instrument);
                voice.initialize(self.sample_rate);
                voice.note_on(frequency, gain);

                let end_time = self.song_time.saturating_add(voice.remaining_samples());
                let id = self.active.insert(end_time, instrument, voice);
                self.channel_voices.insert(key, id);
            }
            EventKind::NoteOff => {
                if let Some(id) = self.channel_voices.remove(&key) {
                    if let Some(voice) = self.active.get_mut(id) {
                        voice.note_off();
                    }
                }
            }
            EventKind::ProgramChange | EventKind::Other => {}
        }

        trace!(
            tick = event.time,
            active = self.active.len(),
            free = self.pool.free_count(),
            track,
            channel = event.channel,
            note = event.note,
            frequency,
            gain,
            "{:?}",
            event.kind
        );
    }

    /// sample = sample_rate * tick / ticks_per_second
    fn tick_to_sample(&self, tick: u64) -> u64 {
        let sample = self.sample_rate as u128 * tick as u128 / self.ticks_per_second as u128;
        u64::try_from(sample).unwrap_or(NEVER)
    }

    /// Samples rendered since the current song started
    pub fn song_time(&self) -> u64 {
        self.song_time
    }

    /// Number of voices currently sounding (held or releasing)
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of notes currently held down
    pub fn held_count(&self) -> usize {
        self.channel_voices.len()
    }

    /// Number of cached voices waiting for reuse
    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    /// True once every note has been scheduled and every voice has faded out
    pub fn is_finished(&self) -> bool {
        self.pending.is_none() && self.cursor >= self.timeline.len() && self.active.is_empty()
    }
}

impl SampleSource for MidiSequencer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        MidiSequencer::read(self, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::envelope::{AdsrEnvelope, AdsrParams, ConstantEnvelope};
    use crate::types::events::Track;
    use crate::types::waveform::Waveform;
    use parking_lot::Mutex;
    use std::sync::Arc;

    // 1000 ticks per quarter note -> 1500 ticks per second -> 2 samples per tick
    const SAMPLE_RATE: u32 = 3000;
    const TPQN: u16 = 1000;

    fn gate_voice(_key: VoiceKey) -> Voice {
        ConstantEnvelope::new(Waveform::Square.tone()).into()
    }

    fn release_params() -> AdsrParams {
        AdsrParams {
            attack_time: 0.002,
            attack_gain: 1.0,
            decay_time: 0.005,
            sustain_gain: 0.5,
            release_time: 0.01,
            min_gain: 0.01,
        }
    }

    fn adsr_voice(_key: VoiceKey) -> Voice {
        AdsrEnvelope::new(Waveform::Sine.tone(), release_params()).into()
    }

    fn song(tracks: Vec<Vec<MidiEvent>>) -> Song {
        Song::new(
            TPQN,
            tracks
                .into_iter()
                .enumerate()
                .map(|(i, events)| Track::new(i, events))
                .collect(),
        )
    }

    fn read_samples(seq: &mut MidiSequencer, count: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; count];
        assert_eq!(seq.read(&mut out), count);
        out
    }

    #[test]
    fn test_note_starts_on_its_exact_sample() {
        let mut seq = MidiSequencer::new(SAMPLE_RATE, gate_voice);
        seq.set_song(&song(vec![vec![MidiEvent::note_on(5, 0, 69, 100)]]));

        let out = read_samples(&mut seq, 20);
        assert!(out[..10].iter().all(|s| *s == 0.0), "{out:?}");
        assert!(out[10] != 0.0);
        assert_eq!(seq.active_count(), 1);
    }

    #[test]
    fn test_simultaneous_events_processed_together() {
        let mut seq = MidiSequencer::new(SAMPLE_RATE, adsr_voice);
        seq.set_song(&song(vec![vec![
            MidiEvent::note_on(0, 0, 60, 100),
            MidiEvent::note_on(10, 1, 64, 100),
            MidiEvent::note_off(10, 0, 60),
            MidiEvent::note_on(30, 0, 67, 100),
        ]]));

        read_samples(&mut seq, 19);
        assert_eq!(seq.active_count(), 1);
        assert_eq!(seq.held_count(), 1);

        // Tick 10 maps to sample 20: both events land before time moves on
        read_samples(&mut seq, 1);
        assert_eq!(seq.song_time(), 20);
        assert_eq!(seq.active_count(), 2);
        assert_eq!(seq.held_count(), 1);

        read_samples(&mut seq, 40);
        assert_eq!(seq.held_count(), 2);
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let events = vec![
            MidiEvent::note_on(0, 0, 60, 100),
            MidiEvent::note_on(7, 1, 72, 50),
            MidiEvent::note_off(20, 0, 60),
            MidiEvent::note_off(33, 1, 72),
        ];

        let mut whole = MidiSequencer::new(SAMPLE_RATE, adsr_voice);
        whole.set_song(&song(vec![events.clone()]));
        let expected = read_samples(&mut whole, 200);

        let mut pieces = MidiSequencer::new(SAMPLE_RATE, adsr_voice);
        pieces.set_song(&song(vec![events]));
        let mut actual = Vec::new();
        for size in [1, 13, 64, 2, 120] {
            actual.extend(read_samples(&mut pieces, size));
        }

        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-6);
        }
    }

    #[test]
    fn test_voice_recycled_when_release_ends() {
        let mut seq = MidiSequencer::new(SAMPLE_RATE, adsr_voice);
        seq.set_song(&song(vec![vec![
            MidiEvent::note_on(0, 0, 69, 127),
            MidiEvent::note_off(10, 0, 69),
        ]]));

        // Same voice driven by hand to learn its release length
        let mut reference = adsr_voice(0);
        reference.initialize(SAMPLE_RATE);
        reference.note_on(midi_note_to_frequency(69), midi_velocity_to_gain(127));
        let mut scratch = vec![0.0f32; 20];
        reference.read(&mut scratch);
        reference.note_off();
        let release = reference.remaining_samples();
        assert!(release > 0 && release < 10_000);

        let mut recycled_at = None;
        for _ in 0..(20 + release + 10) {
            read_samples(&mut seq, 1);
            if recycled_at.is_none() && seq.free_count() == 1 {
                recycled_at = Some(seq.song_time());
            }
        }

        assert_eq!(recycled_at, Some(20 + release));
        assert_eq!(seq.active_count(), 0);
        assert!(seq.is_finished());
    }

    #[test]
    fn test_retrigger_releases_previous_voice() {
        let mut seq = MidiSequencer::new(SAMPLE_RATE, adsr_voice);
        seq.set_song(&song(vec![vec![
            MidiEvent::note_on(0, 0, 60, 100),
            MidiEvent::note_on(5, 0, 60, 100),
        ]]));

        read_samples(&mut seq, 11);
        assert_eq!(seq.active_count(), 2);
        assert_eq!(seq.held_count(), 1);

        // The first voice fades out and goes back to the pool
        read_samples(&mut seq, 3000);
        assert_eq!(seq.active_count(), 1);
        assert_eq!(seq.free_count(), 1);
    }

    #[test]
    fn test_program_change_selects_instrument() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let log = requested.clone();
        let mut seq = MidiSequencer::new(SAMPLE_RATE, move |key| {
            log.lock().push(key);
            gate_voice(key)
        });

        seq.set_song(&song(vec![
            vec![
                MidiEvent::program_change(0, 0, 32),
                MidiEvent::note_on(0, 0, 40, 100),
                MidiEvent::note_on(0, 1, 40, 100),
            ],
            vec![MidiEvent::note_on(2, 0, 40, 100)],
        ]));
        read_samples(&mut seq, 10);

        // Same channel on another track keeps its own (default) instrument
        assert_eq!(*requested.lock(), vec![32, 0, 0]);
    }

    #[test]
    fn test_unmatched_note_off_is_ignored() {
        let mut seq = MidiSequencer::new(SAMPLE_RATE, gate_voice);
        seq.set_song(&song(vec![vec![
            MidiEvent::note_off(0, 0, 60),
            MidiEvent::note_on(1, 0, 62, 100),
            MidiEvent::note_off(2, 3, 62),
        ]]));

        read_samples(&mut seq, 10);
        assert_eq!(seq.active_count(), 1);
        assert_eq!(seq.held_count(), 1);
    }

    #[test]
    fn test_last_note_keeps_sounding_after_song_ends() {
        let mut seq = MidiSequencer::new(SAMPLE_RATE, gate_voice);
        seq.set_song(&song(vec![vec![MidiEvent::note_on(0, 0, 69, 100)]]));

        let out = read_samples(&mut seq, 5000);
        assert_eq!(seq.active_count(), 1);
        assert!(out[4000..].iter().any(|s| *s != 0.0));
        assert!(!seq.is_finished());
    }

    #[test]
    fn test_gain_scales_output() {
        let events = vec![MidiEvent::note_on(0, 0, 69, 127)];

        let mut loud = MidiSequencer::new(SAMPLE_RATE, gate_voice);
        loud.set_song(&song(vec![events.clone()]));
        let mut quiet = MidiSequencer::new(SAMPLE_RATE, gate_voice);
        quiet.set_gain(0.25);
        quiet.set_song(&song(vec![events]));

        let a = read_samples(&mut loud, 64);
        let b = read_samples(&mut quiet, 64);
        for (a, b) in a.iter().zip(&b) {
            assert!((a * 0.25 - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_set_song_resets_state() {
        let mut seq = MidiSequencer::new(SAMPLE_RATE, adsr_voice);
        seq.set_song(&song(vec![vec![
            MidiEvent::note_on(0, 0, 60, 100),
            MidiEvent::note_off(1, 0, 60),
        ]]));
        read_samples(&mut seq, 5000);
        assert_eq!(seq.free_count(), 1);

        seq.set_song(&song(vec![vec![MidiEvent::note_on(100, 0, 60, 100)]]));
        assert_eq!(seq.song_time(), 0);
        assert_eq!(seq.free_count(), 0);
        assert_eq!(seq.active_count(), 0);
    }

    #[test]
    fn test_idle_sequencer_renders_silence() {
        let mut seq = MidiSequencer::new(SAMPLE_RATE, gate_voice);
        let out = read_samples(&mut seq, 128);
        assert!(out.iter().all(|s| *s == 0.0));
        assert!(seq.is_finished());

        seq.set_song(&song(vec![vec![MidiEvent::note_on(0, 0, 60, 100)]]));
        seq.stop();
        assert!(seq.is_finished());
        assert_eq!(read_samples(&mut seq, 0).len(), 0);
    }
}
