pub mod active;
pub mod envelope;
pub mod mix;
pub mod multi_voice;
pub mod output;
pub mod parameters;
pub mod sequencer;
pub mod sfx;
pub mod voice;
pub mod voice_pool;

pub use output::{PlaybackMixer, PlaybackStats, SampleSource};
pub use sequencer::MidiSequencer;
pub use sfx::SfxScheduler;
pub use voice::{UNDECAYING, Voice};
pub use voice_pool::{VoiceKey, VoicePool};
