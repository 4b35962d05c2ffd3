use std::sync::Arc;

use super::{sequencer::MidiSequencer, sfx::SfxScheduler};

/// Anything that renders mono audio on demand
pub trait SampleSource {
    fn sample_rate(&self) -> u32;

    /// Overwrite `out` with the next samples, returns how many were written
    fn read(&mut self, out: &mut [f32]) -> usize;
}

/// Snapshot of playback state for the host thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub song_time: u64,
    pub active_voices: usize,
    pub free_voices: usize,
    pub active_sfx: usize,
    pub finished: bool,
}

/// Starting buffer size in frames, grown on demand
const INITIAL_FRAMES: usize = 1024;

/// Output stage
/// Renders the song and the effects into mono buffers and copies the sum to
/// every channel of an interleaved device buffer
pub struct PlaybackMixer {
    sequencer: MidiSequencer,
    sfx: Option<Arc<SfxScheduler>>,
    music_buffer: Vec<f32>,
    sfx_buffer: Vec<f32>,
}

impl PlaybackMixer {
    pub fn new(sequencer: MidiSequencer, sfx: Option<Arc<SfxScheduler>>) -> Self {
        Self {
            sequencer,
            sfx,
            music_buffer: vec![0.0; INITIAL_FRAMES],
            sfx_buffer: vec![0.0; INITIAL_FRAMES],
        }
    }

    pub fn sequencer(&self) -> &MidiSequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut MidiSequencer {
        &mut self.sequencer
    }

    fn ensure_frames(&mut self, frames: usize) {
        if self.music_buffer.len() < frames {
            let new_len = (2 * self.music_buffer.len()).max(frames);
            self.music_buffer.resize(new_len, 0.0);
            self.sfx_buffer.resize(new_len, 0.0);
        }
    }

    /// Fill an interleaved buffer with `num_channels` channels
    pub fn process(&mut self, output: &mut [f32], num_channels: usize) -> PlaybackStats {
        let num_channels = num_channels.max(1);
        let frames = output.len() / num_channels;
        self.ensure_frames(frames);

        let music = &mut self.music_buffer[..frames];
        render(&mut self.sequencer, music);

        let effects = &mut self.sfx_buffer[..frames];
        match self.sfx.as_mut() {
            Some(sfx) => {
                render(sfx, effects);
            }
            None => effects.fill(0.0),
        }

        for (frame, (m, s)) in output
            .chunks_exact_mut(num_channels)
            .zip(music.iter().zip(effects.iter()))
        {
            frame.fill(m + s);
        }
        // Trailing partial frame, if any
        output[frames * num_channels..].fill(0.0);

        self.stats()
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            song_time: self.sequencer.song_time(),
            active_voices: self.sequencer.active_count(),
            free_voices: self.sequencer.free_count(),
            active_sfx: self.sfx.as_ref().map_or(0, |sfx| sfx.active_count()),
            finished: self.sequencer.is_finished(),
        }
    }
}

fn render<S: SampleSource>(source: &mut S, buffer: &mut [f32]) {
    let len = buffer.len();
    let written = source.read(buffer);
    buffer[written.min(len)..].fill(0.0);
}
