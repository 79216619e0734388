//! Per-frame push, hurt and hit boxes.
//!
//! Boxes are authored per character, per clip key and per frame index in a
//! "facing right" local space relative to the fighter's top-left corner.
//! This module covers:
//! - Lenient parsing of the authoring JSON file
//! - Frame lookup with nearest-frame fallback
//! - Local to world transforms (mirroring and foot anchoring)
//! - A per-image cache of the lowest opaque pixel row

use std::collections::BTreeMap;
use std::path::Path;

use ahash::AHashMap;
use kombat_common::{Facing, FrameId, HitboxError, Rect};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::animation::SpriteFrame;

/// Clip whose push box is replaced by the crouch idle push box.
const CROUCH_WALK_CLIP: &str = "low_move";
/// Clip providing the crouch-walk push box.
const CROUCH_IDLE_CLIP: &str = "low_idle";

// ============================================================================
// Authored data
// ============================================================================

/// Boxes authored for one frame, in local facing-right coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameBoxes {
    /// Body-separation box
    pub push: Option<Rect>,
    /// Vulnerable regions
    pub hurt: Vec<Rect>,
    /// Damage-dealing regions
    pub hit: Vec<Rect>,
}

/// Borrowed result of a table lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalBoxes<'a> {
    /// Body-separation box
    pub push: Option<Rect>,
    /// Vulnerable regions
    pub hurt: &'a [Rect],
    /// Damage-dealing regions
    pub hit: &'a [Rect],
}

impl LocalBoxes<'_> {
    /// Returns true if nothing is authored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.push.is_none() && self.hurt.is_empty() && self.hit.is_empty()
    }
}

/// Boxes transformed to world space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldBoxes {
    /// Body-separation box
    pub push: Option<Rect>,
    /// Vulnerable regions
    pub hurt: Vec<Rect>,
    /// Damage-dealing regions
    pub hit: Vec<Rect>,
}

/// Vertical correction for sprite packs whose feet do not touch the canvas
/// bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FootAnchor {
    /// Manual adjustment added to the measured padding
    pub nudge: i32,
}

type ClipFrames = BTreeMap<u32, FrameBoxes>;

/// Character -> clip key -> frame index -> boxes.
#[derive(Debug, Default)]
pub struct HitboxTable {
    characters: AHashMap<String, AHashMap<String, ClipFrames>>,
    bottoms: OpaqueBottomCache,
}

impl HitboxTable {
    /// Creates an empty table. Every lookup falls back to reach collision.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the authoring JSON.
    ///
    /// Frames that are not objects, frame keys that are not integers and
    /// rectangles that are not four numbers are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or the top level is not an
    /// object of objects.
    pub fn from_json_str(text: &str) -> Result<Self, HitboxError> {
        let root: Value = serde_json::from_str(text)?;
        let Value::Object(characters) = root else {
            return Err(HitboxError::Layout("top level must be an object".into()));
        };

        let mut table = Self::new();
        for (character, clips) in characters {
            let Value::Object(clips) = clips else {
                warn!("Skipping hitbox character '{}': not an object", character);
                continue;
            };
            let entry = table.characters.entry(character.clone()).or_default();
            for (clip, frames) in clips {
                let Value::Object(frames) = frames else {
                    warn!("Skipping hitbox clip '{}/{}': not an object", character, clip);
                    continue;
                };
                let parsed = entry.entry(clip.clone()).or_default();
                for (key, frame) in frames {
                    let Ok(index) = key.parse::<u32>() else {
                        warn!("Skipping hitbox frame '{}/{}/{}': bad index", character, clip, key);
                        continue;
                    };
                    match parse_frame(&frame) {
                        Some(boxes) => {
                            parsed.insert(index, boxes);
                        }
                        None => {
                            warn!("Skipping malformed hitbox frame '{}/{}/{}'", character, clip, key);
                        }
                    }
                }
            }
        }
        Ok(table)
    }

    /// Reads and parses a hitbox file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, HitboxError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Loads a hitbox file, falling back to an empty table on any failure.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(table) => {
                info!(
                    "Loaded hitboxes from {:?} ({} characters, {} frames)",
                    path,
                    table.characters.len(),
                    table.frame_count()
                );
                table
            }
            Err(e) => {
                warn!("Failed to load hitboxes from {:?}: {}, using empty table", path, e);
                Self::new()
            }
        }
    }

    /// Inserts or replaces the boxes of one frame.
    pub fn insert(&mut self, character: &str, clip: &str, index: u32, boxes: FrameBoxes) {
        self.characters
            .entry(character.to_owned())
            .or_default()
            .entry(clip.to_owned())
            .or_default()
            .insert(index, boxes);
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with_frame(mut self, character: &str, clip: &str, index: u32, boxes: FrameBoxes) -> Self {
        self.insert(character, clip, index, boxes);
        self
    }

    /// Total number of authored frames.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.characters
            .values()
            .flat_map(|clips| clips.values())
            .map(BTreeMap::len)
            .sum()
    }

    /// Returns true if nothing is authored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    fn clip(&self, character: &str, clip: &str) -> Option<&ClipFrames> {
        self.characters
            .get(character)
            .and_then(|clips| clips.get(clip))
            .filter(|frames| !frames.is_empty())
    }

    /// Finds the boxes for a frame.
    ///
    /// Falls back to frame 0, then the nearest authored frame at or below
    /// `index`, then the smallest authored frame. While crouch-walking the
    /// push box comes from the crouch idle clip so transparent padding on
    /// the walk frames does not shove the opponent.
    #[must_use]
    pub fn lookup(&self, character: &str, clip: &str, index: u32) -> LocalBoxes<'_> {
        let Some(frames) = self.clip(character, clip) else {
            return LocalBoxes::default();
        };

        let frame = frames
            .get(&index)
            .or_else(|| frames.get(&0))
            .or_else(|| frames.range(..=index).next_back().map(|(_, f)| f))
            .or_else(|| frames.values().next());

        let Some(frame) = frame else {
            return LocalBoxes::default();
        };

        let mut push = frame.push;
        if clip == CROUCH_WALK_CLIP {
            let idle_push = self
                .clip(character, CROUCH_IDLE_CLIP)
                .and_then(|idle| idle.get(&0).or_else(|| idle.values().next()))
                .and_then(|f| f.push);
            if idle_push.is_some() {
                push = idle_push;
            }
        }

        LocalBoxes {
            push,
            hurt: &frame.hurt,
            hit: &frame.hit,
        }
    }

    /// Looks up a frame and transforms every box to world space.
    #[must_use]
    pub fn world_boxes(
        &self,
        character: &str,
        clip: &str,
        index: u32,
        fighter: Rect,
        facing: Facing,
        y_offset: i32,
    ) -> WorldBoxes {
        let local = self.lookup(character, clip, index);
        let place = |r: &Rect| to_world(fighter, facing, *r, y_offset);
        WorldBoxes {
            push: local.push.as_ref().map(place),
            hurt: local.hurt.iter().map(place).collect(),
            hit: local.hit.iter().map(place).collect(),
        }
    }

    /// Vertical foot-anchor offset for a sprite frame.
    ///
    /// Zero without an anchor or without a frame.
    #[must_use]
    pub fn foot_offset(&self, frame: Option<&SpriteFrame>, anchor: Option<FootAnchor>) -> i32 {
        match (frame, anchor) {
            (Some(frame), Some(anchor)) => {
                let bottom = self.bottoms.bottom_row(frame);
                let padding = frame.height.saturating_sub(1).saturating_sub(bottom);
                padding as i32 + anchor.nudge
            }
            _ => 0,
        }
    }
}

/// Converts a local facing-right box to world space.
///
/// Mirrors within the fighter width when facing left, then translates by the
/// fighter's top-left and the vertical foot offset.
#[must_use]
pub fn to_world(fighter: Rect, facing: Facing, local: Rect, y_offset: i32) -> Rect {
    let oriented = if facing.is_flipped() {
        local.mirrored_within(fighter.w)
    } else {
        local
    };
    oriented.translated(fighter.x, fighter.y + y_offset)
}

fn parse_rect(value: &Value) -> Option<Rect> {
    let items = value.as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut out = [0_i32; 4];
    for (slot, item) in out.iter_mut().zip(items) {
        let n = item
            .as_i64()
            .or_else(|| item.as_f64().map(|f| f as i64))?;
        *slot = i32::try_from(n).ok()?;
    }
    Some(Rect::from_array(out))
}

fn parse_rect_list(value: Option<&Value>) -> Option<Vec<Rect>> {
    match value {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(parse_rect).collect(),
        Some(_) => None,
    }
}

fn parse_frame(value: &Value) -> Option<FrameBoxes> {
    let obj = value.as_object()?;
    let push = match obj.get("push") {
        None | Some(Value::Null) => None,
        Some(v) => Some(parse_rect(v)?),
    };
    Some(FrameBoxes {
        push,
        hurt: parse_rect_list(obj.get("hurt"))?,
        hit: parse_rect_list(obj.get("hit"))?,
    })
}

// ============================================================================
// Opaque bottom cache
// ============================================================================

/// Caches the lowest row containing a non-transparent pixel per frame image.
#[derive(Debug, Default)]
pub struct OpaqueBottomCache {
    rows: RwLock<AHashMap<FrameId, u32>>,
}

impl OpaqueBottomCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest opaque row of `frame`.
    ///
    /// Frames without pixels, or fully transparent ones, report the last
    /// canvas row.
    pub fn bottom_row(&self, frame: &SpriteFrame) -> u32 {
        if let Some(row) = self.rows.read().get(&frame.id) {
            return *row;
        }

        let fallback = frame.height.saturating_sub(1);
        let row = frame.pixels.as_deref().map_or(fallback, |img| {
            (0..img.height())
                .rev()
                .find(|&y| (0..img.width()).any(|x| img.get_pixel(x, y)[3] > 0))
                .unwrap_or(fallback)
        });

        debug!("Measured opaque bottom row {} for frame {:?}", row, frame.id);
        self.rows.write().insert(frame.id, row);
        row
    }

    /// Number of cached frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "nate": {
            "med_idle": {
                "0": {"push": [100, 40, 100, 320], "hurt": [[90, 20, 120, 340]], "hit": []},
                "3": {"push": null, "hurt": [[95, 20, 110, 340]], "hit": []}
            },
            "med_attack_e": {
                "2": {"push": null, "hurt": [], "hit": []},
                "4": {"push": null, "hurt": [[90, 20, 120, 340]], "hit": [[200, 60, 90, 40]]},
                "x": {"push": null}
            },
            "low_idle": {
                "0": {"push": [110, 180, 80, 180], "hurt": [], "hit": []}
            },
            "low_move": {
                "1": {"push": [0, 180, 300, 180], "hurt": [[100, 190, 100, 170]], "hit": []},
                "2": {"push": [1, 2, 3], "hurt": [], "hit": []}
            }
        }
    }"#;

    fn table() -> HitboxTable {
        HitboxTable::from_json_str(SAMPLE).expect("sample parses")
    }

    #[test]
    fn test_exact_lookup() {
        let t = table();
        let boxes = t.lookup("nate", "med_attack_e", 4);
        assert_eq!(boxes.hit, &[Rect::new(200, 60, 90, 40)]);
    }

    #[test]
    fn test_fallback_prefers_frame_zero() {
        let t = table();
        let boxes = t.lookup("nate", "med_idle", 2);
        assert_eq!(boxes.push, Some(Rect::new(100, 40, 100, 320)));
    }

    #[test]
    fn test_fallback_nearest_below_then_smallest() {
        let t = table();
        // No frame 0: nearest authored index <= 3 is 2
        let boxes = t.lookup("nate", "med_attack_e", 3);
        assert!(boxes.hit.is_empty());
        // Nothing <= 1: smallest authored index (2)
        let boxes = t.lookup("nate", "med_attack_e", 1);
        assert!(boxes.hurt.is_empty());
        assert!(boxes.hit.is_empty());
        // Past the end: nearest below is 4
        let boxes = t.lookup("nate", "med_attack_e", 9);
        assert_eq!(boxes.hit.len(), 1);
    }

    #[test]
    fn test_unknown_character_or_clip_is_empty() {
        let t = table();
        assert!(t.lookup("scorpion", "med_idle", 0).is_empty());
        assert!(t.lookup("nate", "high_move", 0).is_empty());
    }

    #[test]
    fn test_malformed_frames_are_skipped() {
        let t = table();
        // "x" index and 3-element push rect were dropped
        assert_eq!(t.frame_count(), 6);
    }

    #[test]
    fn test_crouch_walk_uses_idle_push() {
        let t = table();
        let boxes = t.lookup("nate", "low_move", 1);
        assert_eq!(boxes.push, Some(Rect::new(110, 180, 80, 180)));
        assert_eq!(boxes.hurt, &[Rect::new(100, 190, 100, 170)]);
    }

    #[test]
    fn test_bad_top_level_is_error() {
        assert!(matches!(
            HitboxTable::from_json_str("[1, 2]"),
            Err(HitboxError::Layout(_))
        ));
        assert!(matches!(
            HitboxTable::from_json_str("{not json"),
            Err(HitboxError::Json(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t = HitboxTable::load(dir.path().join("missing.json"));
        assert!(t.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write");
        let t = HitboxTable::load(file.path());
        assert!(!t.is_empty());
    }

    #[test]
    fn test_to_world_mirrors_when_facing_left() {
        let fighter = Rect::new(100, 160, 300, 360);
        let local = Rect::new(200, 60, 90, 40);
        assert_eq!(
            to_world(fighter, Facing::Right, local, 0),
            Rect::new(300, 220, 90, 40)
        );
        // Mirrored x = 300 - (200 + 90) = 10
        assert_eq!(
            to_world(fighter, Facing::Left, local, 5),
            Rect::new(110, 225, 90, 40)
        );
    }

    #[test]
    fn test_opaque_bottom_row_is_cached() {
        let mut img = RgbaImage::new(4, 10);
        img.put_pixel(1, 6, Rgba([255, 0, 0, 255]));
        let frame = SpriteFrame::from_image(img);

        let t = HitboxTable::new();
        // 10 - 1 - 6 = 3 rows of padding, plus nudge
        assert_eq!(t.foot_offset(Some(&frame), Some(FootAnchor { nudge: -30 })), -27);
        assert_eq!(t.bottoms.len(), 1);
        assert_eq!(t.foot_offset(Some(&frame), None), 0);
        assert_eq!(t.foot_offset(None, Some(FootAnchor::default())), 0);
    }

    #[test]
    fn test_placeholder_frame_has_no_padding() {
        let cache = OpaqueBottomCache::new();
        let frame = SpriteFrame::placeholder(300, 360);
        assert_eq!(cache.bottom_row(&frame), 359);
    }
}
