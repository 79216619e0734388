//! Engine configuration.
//!
//! Match format, fighter selection and CPU settings for a headless run.
//! Configuration is read from and written to a TOML file.

use kombat_common::ConfigError;
use kombat_gameplay::{CharacterConfig, FighterTuning, Playfield, RoundRules};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "kombat.toml";

/// Highest accepted tick rate.
const MAX_TICK_RATE: u32 = 1000;

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Simulation ===
    /// Logical steps per second
    pub tick_rate: u32,
    /// Simulated time after which an unfinished match is abandoned
    pub max_seconds: u64,
    /// RNG seed for CPU opponents and block poses
    pub seed: u64,

    // === Match format ===
    /// Round timer length in seconds
    pub round_seconds: u64,
    /// Result display between rounds
    pub round_over_pause_ms: u64,
    /// Intro length before round one
    pub intro_ms: u64,

    // === Fighters ===
    /// Hitbox authoring file
    pub hitbox_path: PathBuf,
    /// Character presets for P1 and P2
    pub characters: [String; 2],
    /// CPU base difficulty for P1 and P2 (0.0 - 1.0)
    pub cpu_difficulty: [f32; 2],

    // === Physics ===
    /// Fighter physics constants
    pub tuning: FighterTuning,
    /// Stage bounds
    pub playfield: Playfield,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let rules = RoundRules::default();
        Self {
            tick_rate: 60,
            max_seconds: 900,
            seed: 42,

            round_seconds: rules.round_seconds,
            round_over_pause_ms: rules.round_over_pause_ms,
            intro_ms: rules.intro_ms,

            hitbox_path: PathBuf::from("hitboxes.json"),
            characters: ["scorpion".to_owned(), "nate".to_owned()],
            cpu_difficulty: [0.55, 0.55],

            tuning: FighterTuning::default(),
            playfield: Playfield::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `kombat.toml` in the working directory.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        match Self::read(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Ignoring config file {}: {e}", path.display());
                Self::default()
            },
        }
    }

    /// Reads and parses a config file without falling back to defaults.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Rejects unusable values and clamps the rest to sensible ranges.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_rate",
                reason: "must be positive".to_owned(),
            });
        }
        if self.round_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "round_seconds",
                reason: "must be positive".to_owned(),
            });
        }
        if self.playfield.max_x - self.playfield.min_x < self.tuning.fighter_width * 2 {
            return Err(ConfigError::Invalid {
                field: "playfield",
                reason: format!(
                    "stage {}..{} cannot hold two {} px fighters",
                    self.playfield.min_x, self.playfield.max_x, self.tuning.fighter_width
                ),
            });
        }
        for name in &self.characters {
            if let Err(e) = CharacterConfig::preset(name) {
                return Err(ConfigError::Invalid {
                    field: "characters",
                    reason: e.to_string(),
                });
            }
        }

        self.tick_rate = self.tick_rate.min(MAX_TICK_RATE);
        for difficulty in &mut self.cpu_difficulty {
            *difficulty = difficulty.clamp(0.0, 1.0);
        }
        Ok(())
    }

    /// Match format derived from the timing settings.
    #[must_use]
    pub fn rules(&self) -> RoundRules {
        RoundRules {
            round_seconds: self.round_seconds,
            round_over_pause_ms: self.round_over_pause_ms,
            intro_ms: self.intro_ms,
            ..RoundRules::default()
        }
    }

    /// Milliseconds per logical step.
    #[must_use]
    pub fn frame_ms(&self) -> u64 {
        (1000 / u64::from(self.tick_rate.max(1))).max(1)
    }
}
