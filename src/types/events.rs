/// Kind of a song event
/// Only notes and program changes drive the sequencer, everything else is carried along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn,
    NoteOff,
    ProgramChange,
    Other,
}

/// One timestamped channel event of a track
/// `time` is absolute, in ticks from the start of the song
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub time: u64,
    pub kind: EventKind,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub program: u8,
}

impl MidiEvent {
    /// Create a note on event
    pub fn note_on(time: u64, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            time,
            kind: EventKind::NoteOn,
            channel,
            note,
            velocity,
            program: 0,
        }
    }

    /// Create a note off event
    pub fn note_off(time: u64, channel: u8, note: u8) -> Self {
        Self {
            time,
            kind: EventKind::NoteOff,
            channel,
            note,
            velocity: 0,
            program: 0,
        }
    }

    /// Create a program change event
    pub fn program_change(time: u64, channel: u8, program: u8) -> Self {
        Self {
            time,
            kind: EventKind::ProgramChange,
            channel,
            note: 0,
            velocity: 0,
            program,
        }
    }

    /// Create an event the sequencer does not act on (controllers, pitch bend, ...)
    pub fn other(time: u64, channel: u8) -> Self {
        Self {
            time,
            kind: EventKind::Other,
            channel,
            note: 0,
            velocity: 0,
            program: 0,
        }
    }

    /// Note on / note off events pause the sequencer's lookahead
    pub fn is_note(&self) -> bool {
        matches!(self.kind, EventKind::NoteOn | EventKind::NoteOff)
    }
}

/// A single track of a song, events ordered by time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub index: usize,
    pub events: Vec<MidiEvent>,
}

impl Track {
    pub fn new(index: usize, events: Vec<MidiEvent>) -> Self {
        Self { index, events }
    }
}

/// A complete multi-track song as produced by a MIDI file reader
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Song {
    pub ticks_per_quarter_note: u16,
    pub tracks: Vec<Track>,
}

impl Song {
    pub fn new(ticks_per_quarter_note: u16, tracks: Vec<Track>) -> Self {
        Self {
            ticks_per_quarter_note,
            tracks,
        }
    }

    /// Merge all tracks into one sequence ordered by tick
    /// The sort is stable: simultaneous events keep track order, then in-track order
    pub fn timeline(&self) -> Vec<(usize, MidiEvent)> {
        let mut events: Vec<(usize, MidiEvent)> = self
            .tracks
            .iter()
            .flat_map(|track| track.events.iter().map(move |evt| (track.index, *evt)))
            .collect();

        events.sort_by_key(|(_, evt)| evt.time);
        events
    }

    /// Total number of events over all tracks
    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(|t| t.events.len()).sum()
    }
}
