pub mod events;
pub mod note;
pub mod waveform;

pub use events::{EventKind, MidiEvent, Song, Track};
pub use waveform::Waveform;
