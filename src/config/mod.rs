use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::audio::{voice::Voice, voice_pool::VoiceKey};

pub mod voice;

pub use voice::{AdsrSpec, EnvelopeSpec, PartialSpec, VoiceSpec};

/// Program number that selects the mellow organ in the built-in setup
pub const MELLOW_PROGRAM: u8 = 32;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub devices: DeviceConfig,

    #[serde(default)]
    pub music: MusicConfig,

    #[serde(default)]
    pub sfx: SfxConfig,
}

impl PlayerConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: PlayerConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Built-in setup used when no config file is given
    pub fn builtin() -> Self {
        Self {
            devices: DeviceConfig::default(),
            music: MusicConfig {
                gain: default_music_gain(),
                instruments: vec![
                    InstrumentConfig {
                        program: ProgramSpec::Named("default".to_string()),
                        voice: VoiceSpec::organ(),
                    },
                    InstrumentConfig {
                        program: ProgramSpec::Number(MELLOW_PROGRAM),
                        voice: VoiceSpec::mellow_organ(),
                    },
                ],
            },
            sfx: SfxConfig {
                gain: default_sfx_gain(),
                effects: vec![EffectConfig {
                    id: 0,
                    voice: VoiceSpec::blip(),
                }],
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.music.validate().context("Invalid music configuration")?;
        self.sfx.validate().context("Invalid sfx configuration")?;
        Ok(())
    }

    /// Voice factory for the song player: program number -> voice
    /// Unlisted programs use the `default` instrument, or the organ if there is none
    pub fn instrument_factory(&self) -> impl Fn(VoiceKey) -> Voice + Send + 'static {
        let mut fallback = VoiceSpec::organ();
        let mut by_program = HashMap::new();

        for instrument in &self.music.instruments {
            match instrument.program {
                ProgramSpec::Number(program) => {
                    by_program.insert(program as VoiceKey, instrument.voice.clone());
                }
                ProgramSpec::Named(_) => fallback = instrument.voice.clone(),
            }
        }

        move |program| by_program.get(&program).unwrap_or(&fallback).build()
    }

    /// Voice factory for sound effects: effect id -> voice
    /// Unknown ids play the built-in blip
    pub fn sfx_factory(&self) -> impl Fn(VoiceKey) -> Voice + Send + 'static {
        let fallback = VoiceSpec::blip();
        let by_id: HashMap<VoiceKey, VoiceSpec> = self
            .sfx
            .effects
            .iter()
            .map(|effect| (effect.id, effect.voice.clone()))
            .collect();

        move |id| by_id.get(&id).unwrap_or(&fallback).build()
    }
}

/// Device configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Output device name (substring) or index, host default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audioout: Option<String>,
}

/// Song playback configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MusicConfig {
    #[serde(default = "default_music_gain")]
    pub gain: f32,

    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            gain: default_music_gain(),
            instruments: Vec::new(),
        }
    }
}

impl MusicConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gain < 0.0 {
            return Err(anyhow!("Gain must not be negative"));
        }

        let mut seen = HashSet::new();
        for (idx, instrument) in self.instruments.iter().enumerate() {
            instrument
                .validate()
                .with_context(|| format!("Invalid configuration for instrument {}", idx))?;

            let key = instrument.program.number();
            if !seen.insert(key) {
                return Err(match key {
                    Some(program) => anyhow!("Program {} is defined more than once", program),
                    None => anyhow!("The default instrument is defined more than once"),
                });
            }
        }
        Ok(())
    }
}

/// Sound effect configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SfxConfig {
    #[serde(default = "default_sfx_gain")]
    pub gain: f32,

    #[serde(default)]
    pub effects: Vec<EffectConfig>,
}

impl Default for SfxConfig {
    fn default() -> Self {
        Self {
            gain: default_sfx_gain(),
            effects: Vec::new(),
        }
    }
}

impl SfxConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gain < 0.0 {
            return Err(anyhow!("Gain must not be negative"));
        }

        let mut seen = HashSet::new();
        for effect in &self.effects {
            effect
                .voice
                .validate()
                .with_context(|| format!("Invalid configuration for effect {}", effect.id))?;
            // Effects never get a note off, a sustaining voice would play forever
            if !effect.voice.fades_out() {
                return Err(anyhow!(
                    "Effect {} must fade out by itself (adsr with sustain below floor)",
                    effect.id
                ));
            }
            if !seen.insert(effect.id) {
                return Err(anyhow!("Effect {} is defined more than once", effect.id));
            }
        }
        Ok(())
    }
}

/// Voice used for one MIDI program
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstrumentConfig {
    pub program: ProgramSpec,
    pub voice: VoiceSpec,
}

impl InstrumentConfig {
    pub fn validate(&self) -> Result<()> {
        match &self.program {
            ProgramSpec::Number(program) => {
                if *program > 127 {
                    return Err(anyhow!("Program must be between 0 and 127"));
                }
            }
            ProgramSpec::Named(name) => {
                if name != "default" {
                    return Err(anyhow!(
                        "Program must be a number or \"default\", got \"{}\"",
                        name
                    ));
                }
            }
        }
        self.voice.validate()
    }
}

/// Program selector - a MIDI program number (0-127) or "default"
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ProgramSpec {
    Number(u8),
    Named(String),
}

impl ProgramSpec {
    /// Program number, None for the default instrument
    pub fn number(&self) -> Option<u8> {
        match self {
            ProgramSpec::Number(program) => Some(*program),
            ProgramSpec::Named(_) => None,
        }
    }
}

/// Voice used for one sound effect id
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EffectConfig {
    pub id: VoiceKey,
    pub voice: VoiceSpec,
}

// Default value functions for serde
fn default_music_gain() -> f32 {
    0.05
}

fn default_sfx_gain() -> f32 {
    1.0
}
