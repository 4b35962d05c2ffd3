use anyhow::{Context, Result, anyhow};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use the_player::audio::{MidiSequencer, PlaybackMixer, PlaybackStats, SfxScheduler};
use the_player::config::PlayerConfig;
use the_player::midi::load_song;
use the_player::types::Song;

/// Sound effect fired by --sfx-every
const DEMO_EFFECT: u32 = 0;

/// How often the audio callback reports progress, in seconds of audio
const STATS_INTERVAL: f32 = 0.25;

/// Plays a MIDI song through the polyphonic voice engine
#[derive(Parser, Debug)]
#[command(name = "the-player")]
#[command(about = "Polyphonic MIDI song and sound effect player", long_about = None)]
struct Args {
    /// Configuration file (YAML), built-in instruments when omitted
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Standard MIDI File to play
    #[arg(short = 's', long = "song", required_unless_present = "list_devices")]
    song: Option<PathBuf>,

    /// List available devices and exit
    #[arg(short = 'l', long = "list")]
    list_devices: bool,

    /// Fire a sound effect every N seconds while the song plays
    #[arg(long = "sfx-every", value_name = "SECONDS")]
    sfx_every: Option<f32>,
}

/// List available audio output devices
fn list_audio_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let mut devices: Vec<String> = host
        .output_devices()?
        .filter_map(|device| {
            device.description()
                .ok()
                .map(|desc| desc.name().to_string())
        })
        .collect();

    // Also try to get the default device explicitly
    if let Some(default_device) = host.default_output_device() {
        if let Ok(default_desc) = default_device.description() {
            let default_name = default_desc.name().to_string();
            if !devices.contains(&default_name) {
                devices.push(default_name);
            }
        }
    }

    if devices.is_empty() {
        return Err(anyhow!("No audio output devices found"));
    }

    Ok(devices)
}

/// Find audio device index by name or index string
fn find_audio_device(devices: &[String], search: &str) -> Result<usize> {
    if let Ok(index) = search.parse::<usize>() {
        if index < devices.len() {
            return Ok(index);
        } else {
            return Err(anyhow!(
                "Audio device index {} out of range (0-{})",
                index,
                devices.len() - 1
            ));
        }
    }

    // Case-insensitive substring match
    let search_lower = search.to_lowercase();
    for (i, device) in devices.iter().enumerate() {
        if device.to_lowercase().contains(&search_lower) {
            return Ok(i);
        }
    }

    Err(anyhow!("Audio device '{}' not found", search))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        let audio_devices = list_audio_devices()?;
        println!("Available Audio Output Devices:");
        for (i, device) in audio_devices.iter().enumerate() {
            println!("  {}: {}", i, device);
        }
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::builtin(),
    };

    if let Some(seconds) = args.sfx_every {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(anyhow!("--sfx-every must be a positive number of seconds"));
        }
    }

    let song_path = args.song.ok_or_else(|| anyhow!("--song is required"))?;
    let song = load_song(&song_path)
        .with_context(|| format!("Failed to load song: {}", song_path.display()))?;

    info!(
        song = %song_path.display(),
        tracks = song.tracks.len(),
        events = song.event_count(),
        "Song loaded"
    );

    play(&config, &song, args.sfx_every)
}

/// Play the song to the end on the configured output device
fn play(config: &PlayerConfig, song: &Song, sfx_every: Option<f32>) -> Result<()> {
    let host = cpal::default_host();
    let device = match &config.devices.audioout {
        Some(search) => {
            let audio_devices = list_audio_devices()?;
            let selected = find_audio_device(&audio_devices, search)?;
            host.output_devices()?
                .nth(selected)
                .ok_or_else(|| anyhow!("Selected audio device not available"))?
        }
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow!("No default audio output device"))?,
    };

    let audio_config = device.default_output_config()?;
    let num_channels = audio_config.channels() as usize;
    let sample_format = audio_config.sample_format();
    let stream_config: cpal::StreamConfig = audio_config.into();
    let sample_rate: u32 = stream_config.sample_rate;

    if let Ok(desc) = device.description() {
        info!(device = %desc.name(), sample_rate, num_channels, "Opening audio output");
    }

    let mut sequencer = MidiSequencer::new(sample_rate, config.instrument_factory());
    sequencer.set_gain(config.music.gain);
    sequencer.set_song(song);

    let sfx = Arc::new(SfxScheduler::new(sample_rate, config.sfx_factory()));
    sfx.set_gain(config.sfx.gain);

    let mixer = PlaybackMixer::new(sequencer, Some(sfx.clone()));
    let (stats_tx, stats_rx) = crossbeam_channel::bounded::<PlaybackStats>(16);

    let _stream = match sample_format {
        cpal::SampleFormat::F32 => {
            start_audio_stream::<f32>(&device, &stream_config, mixer, stats_tx, num_channels)?
        }
        cpal::SampleFormat::I16 => {
            start_audio_stream::<i16>(&device, &stream_config, mixer, stats_tx, num_channels)?
        }
        cpal::SampleFormat::U16 => {
            start_audio_stream::<u16>(&device, &stream_config, mixer, stats_tx, num_channels)?
        }
        other => return Err(anyhow!("Unsupported sample format {:?}", other)),
    };

    let stop = Arc::new(AtomicBool::new(false));
    let sfx_thread = sfx_every.map(|seconds| {
        let sfx = sfx.clone();
        let stop = stop.clone();
        thread::spawn(move || fire_effects(&sfx, Duration::from_secs_f32(seconds), &stop))
    });

    let result = wait_until_finished(&stats_rx, sample_rate);

    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = sfx_thread {
        let _ = handle.join();
    }

    result
}

/// Trigger the demo effect periodically, one semitone higher each time
fn fire_effects(sfx: &SfxScheduler, period: Duration, stop: &AtomicBool) {
    let semitone = 2.0f32.powf(1.0 / 12.0);
    let mut frequency = 440.0f32;

    while !stop.load(Ordering::Relaxed) {
        thread::sleep(period);
        sfx.play_sfx(DEMO_EFFECT, frequency, 1.0);

        frequency *= semitone;
        if frequency > 1760.0 {
            frequency = 440.0;
        }
    }
}

/// Block on progress reports from the audio thread until the song is over
fn wait_until_finished(
    stats_rx: &crossbeam_channel::Receiver<PlaybackStats>,
    sample_rate: u32,
) -> Result<()> {
    loop {
        match stats_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(stats) => {
                debug!(
                    seconds = stats.song_time as f32 / sample_rate.max(1) as f32,
                    active = stats.active_voices,
                    free = stats.free_voices,
                    sfx = stats.active_sfx,
                    "Playback"
                );
                if stats.finished {
                    info!("Song finished");
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                debug!("No progress from the audio thread");
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("Audio stream stopped unexpectedly"));
            }
        }
    }
}

/// Start audio stream driving the playback mixer
fn start_audio_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: PlaybackMixer,
    stats_tx: Sender<PlaybackStats>,
    num_channels: usize,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let stats_every = (config.sample_rate as f32 * STATS_INTERVAL) as u64;

    // Pre-allocate buffer for processing
    let mut temp_buffer = vec![0.0f32; 512 * num_channels];
    let mut frame_counter = 0u64;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if temp_buffer.len() < data.len() {
                temp_buffer.resize(data.len(), 0.0);
            }

            let stats = mixer.process(&mut temp_buffer[..data.len()], num_channels);

            for (out, sample) in data.iter_mut().zip(temp_buffer.iter()) {
                *out = T::from_sample(*sample);
            }

            // Periodically report progress to the main thread
            frame_counter += (data.len() / num_channels.max(1)) as u64;
            if frame_counter > stats_every || stats.finished {
                let _ = stats_tx.try_send(stats);
                frame_counter = 0;
            }
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )?;

    stream.play()?;

    Ok(stream)
}
