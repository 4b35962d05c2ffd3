use std::path::{Path, PathBuf};

use midly::{Smf, Timing, TrackEventKind};
use tracing::debug;

use super::message::MidiMessage;
use crate::types::events::{Song, Track};

/// Failure to turn a file into a playable song
#[derive(Debug, thiserror::Error)]
pub enum SongError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid MIDI file: {0}")]
    Parse(#[from] midly::Error),

    #[error("SMPTE timecode timing is not supported")]
    UnsupportedTiming,
}

/// Read and parse a Standard MIDI File
pub fn load_song(path: impl AsRef<Path>) -> Result<Song, SongError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| SongError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let song = parse_song(&bytes)?;
    debug!(
        path = %path.display(),
        tracks = song.tracks.len(),
        events = song.event_count(),
        "Loaded MIDI file"
    );
    Ok(song)
}

/// Parse an in-memory Standard MIDI File
/// Delta times become absolute ticks, meta and sysex events are skipped
pub fn parse_song(bytes: &[u8]) -> Result<Song, SongError> {
    let smf = Smf::parse(bytes)?;

    let ticks_per_quarter_note = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(..) => return Err(SongError::UnsupportedTiming),
    };

    let tracks = smf
        .tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let mut time = 0u64;
            let mut events = Vec::new();
            for event in track {
                time += event.delta.as_int() as u64;
                if let TrackEventKind::Midi { channel, message } = event.kind {
                    let message = MidiMessage::from_midly(channel.as_int(), &message);
                    events.extend(message.to_event(time));
                }
            }
            Track::new(index, events)
        })
        .collect();

    Ok(Song::new(ticks_per_quarter_note, tracks))
}
