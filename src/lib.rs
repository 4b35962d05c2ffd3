//! Polyphonic song and sound effect player
//!
//! Voices are small synthesis trees (tones, filters, envelopes) recycled
//! through per-instrument pools. `MidiSequencer` renders a song with
//! sample-accurate note timing and `SfxScheduler` mixes one-shot effects
//! triggered from any thread.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod midi;
pub mod types;
