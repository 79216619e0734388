//! Physics and geometry tuning.

use kombat_common::ConfigError;
use serde::{Deserialize, Serialize};

/// Per-fighter physics and timing constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FighterTuning {
    /// Walk speed in pixels per tick
    pub walk_speed: i32,
    /// Downward acceleration in pixels per tick squared
    pub gravity: f32,
    /// Vertical velocity at takeoff (negative is up)
    pub jump_velocity: f32,
    /// Horizontal speed of a directional jump
    pub jump_speed: i32,
    /// Ground freeze after landing from an air hit
    pub air_knockdown_ms: u64,
    /// Hold after landing from an air attack
    pub air_land_recover_ms: u64,
    /// Width of the fallback reach rectangle
    pub reach_pad: i32,
    /// Active frame of standing attacks
    pub attack_active_frame: usize,
    /// Active frame of the air attack
    pub air_attack_active_frame: usize,
    /// Fighter box width
    pub fighter_width: i32,
    /// Fighter box height
    pub fighter_height: i32,
}

impl Default for FighterTuning {
    fn default() -> Self {
        Self {
            walk_speed: 5,
            gravity: 1.1,
            jump_velocity: -20.0,
            jump_speed: 7,
            air_knockdown_ms: 1500,
            air_land_recover_ms: 450,
            reach_pad: 20,
            attack_active_frame: 4,
            air_attack_active_frame: 1,
            fighter_width: 300,
            fighter_height: 360,
        }
    }
}

impl FighterTuning {
    /// Rejects values the state machine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fighter_width <= 0 || self.fighter_height <= 0 {
            return Err(ConfigError::Invalid {
                field: "fighter_width/fighter_height",
                reason: "fighter box must have positive size".into(),
            });
        }
        if self.gravity <= 0.0 || !self.gravity.is_finite() {
            return Err(ConfigError::Invalid {
                field: "gravity",
                reason: format!("must be a positive number, got {}", self.gravity),
            });
        }
        if self.jump_velocity >= 0.0 {
            return Err(ConfigError::Invalid {
                field: "jump_velocity",
                reason: "must be negative (upwards)".into(),
            });
        }
        if self.walk_speed < 0 || self.jump_speed < 0 || self.reach_pad < 0 {
            return Err(ConfigError::Invalid {
                field: "walk_speed/jump_speed/reach_pad",
                reason: "must not be negative".into(),
            });
        }
        Ok(())
    }
}

/// Stage bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Playfield {
    /// Left edge
    pub min_x: i32,
    /// Right edge
    pub max_x: i32,
    /// Ground line (fighters' feet)
    pub ground_y: i32,
}

impl Default for Playfield {
    fn default() -> Self {
        Self {
            min_x: 0,
            max_x: 1000,
            ground_y: 520,
        }
    }
}

impl Playfield {
    /// Playfield width.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    /// Round start x for a fighter of `width`: 40 px in from its side.
    #[must_use]
    pub const fn start_x(&self, left_side: bool, width: i32) -> i32 {
        if left_side {
            self.min_x + 40
        } else {
            self.max_x - 40 - width
        }
    }

    /// Checks that two fighters of `fighter_width` fit on the stage.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the stage is too narrow.
    pub fn validate(&self, fighter_width: i32) -> Result<(), ConfigError> {
        if self.width() < fighter_width + 80 {
            return Err(ConfigError::Invalid {
                field: "playfield",
                reason: format!(
                    "width {} too narrow for fighters of width {}",
                    self.width(),
                    fighter_width
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let tuning = FighterTuning::default();
        assert!(tuning.validate().is_ok());
        assert!(Playfield::default().validate(tuning.fighter_width).is_ok());
    }

    #[test]
    fn test_start_positions() {
        let field = Playfield::default();
        assert_eq!(field.start_x(true, 300), 40);
        assert_eq!(field.start_x(false, 300), 660);
    }

    #[test]
    fn test_rejects_bad_tuning() {
        let tuning = FighterTuning {
            gravity: 0.0,
            ..FighterTuning::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(ConfigError::Invalid { field: "gravity", .. })
        ));

        let field = Playfield {
            max_x: 200,
            ..Playfield::default()
        };
        assert!(field.validate(300).is_err());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let tuning: FighterTuning =
            serde_json::from_str(r#"{"walk_speed": 9}"#).expect("parses");
        assert_eq!(tuning.walk_speed, 9);
        assert_eq!(tuning.air_knockdown_ms, 1500);
    }
}
