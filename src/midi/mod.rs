pub mod file;
pub mod message;

pub use file::{SongError, load_song, parse_song};
pub use message::MidiMessage;
