//! Frame animation player.
//!
//! A clip steps through its frames on a fixed interval derived from the
//! clip's FPS. Looping clips wrap to the first frame; one-shot clips hold
//! the last frame and report `done`.

use std::sync::Arc;

use image::RgbaImage;
use kombat_common::FrameId;

use crate::clock::Millis;

/// One renderable frame of a clip.
///
/// Pixels are optional: headless simulation and tests build clips from
/// placeholder frames that only carry their canvas size.
#[derive(Debug, Clone)]
pub struct SpriteFrame {
    /// Stable identity used for per-image caches
    pub id: FrameId,
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Decoded RGBA pixels, if the image was loaded
    pub pixels: Option<Arc<RgbaImage>>,
}

impl SpriteFrame {
    /// Wraps a decoded image.
    #[must_use]
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            id: FrameId::new(),
            width: image.width(),
            height: image.height(),
            pixels: Some(Arc::new(image)),
        }
    }

    /// Creates a frame with a canvas size but no pixel data.
    #[must_use]
    pub fn placeholder(width: u32, height: u32) -> Self {
        Self {
            id: FrameId::new(),
            width,
            height,
            pixels: None,
        }
    }
}

/// Result of a single [`AnimationClip::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameAdvance {
    /// The frame index changed this call
    pub advanced: bool,
    /// The clip wrapped from its last frame back to the first
    pub looped: bool,
}

/// Converts a playback rate into a whole-millisecond frame interval.
#[must_use]
pub fn frame_interval_ms(fps: u32) -> u64 {
    1000 / u64::from(fps.max(1))
}

/// A sequence of frames played back at a fixed interval.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    frames: Vec<SpriteFrame>,
    frame_interval_ms: u64,
    looping: bool,
    index: usize,
    done: bool,
    last_tick: Millis,
}

impl AnimationClip {
    /// Creates a clip from frames at the given FPS.
    #[must_use]
    pub fn new(frames: Vec<SpriteFrame>, fps: u32, looping: bool) -> Self {
        Self {
            frames,
            frame_interval_ms: frame_interval_ms(fps),
            looping,
            index: 0,
            done: false,
            last_tick: Millis::ZERO,
        }
    }

    /// Creates a clip of `count` placeholder frames.
    #[must_use]
    pub fn placeholder(count: usize, fps: u32, looping: bool, width: u32, height: u32) -> Self {
        let frames = (0..count)
            .map(|_| SpriteFrame::placeholder(width, height))
            .collect();
        Self::new(frames, fps, looping)
    }

    /// Creates a clip with no frames (asset load failure).
    #[must_use]
    pub fn empty(fps: u32, looping: bool) -> Self {
        Self::new(Vec::new(), fps, looping)
    }

    /// Restarts playback from the first frame.
    pub fn reset(&mut self, now: Millis) {
        self.index = 0;
        self.done = false;
        self.last_tick = now;
    }

    /// Steps the clip if at least one frame interval elapsed since the last step.
    pub fn advance(&mut self, now: Millis) -> FrameAdvance {
        if self.done || self.frames.is_empty() {
            return FrameAdvance::default();
        }
        if now.since(self.last_tick) < self.frame_interval_ms {
            return FrameAdvance::default();
        }

        self.last_tick = now;
        self.index += 1;

        let mut looped = false;
        if self.index >= self.frames.len() {
            if self.looping {
                self.index = 0;
                looped = true;
            } else {
                self.index = self.frames.len() - 1;
                self.done = true;
            }
        }

        FrameAdvance {
            advanced: true,
            looped,
        }
    }

    /// Moves the tick reference forward, so a pause does not count as
    /// elapsed playback time.
    pub fn shift(&mut self, ms: u64) {
        self.last_tick = self.last_tick.plus(ms);
    }

    /// Current frame, or `None` when the clip has no frames.
    #[must_use]
    pub fn current(&self) -> Option<&SpriteFrame> {
        self.frames.get(self.index)
    }

    /// Frame at `index`, if any.
    #[must_use]
    pub fn frame(&self, index: usize) -> Option<&SpriteFrame> {
        self.frames.get(index)
    }

    /// Last frame of the clip, if any.
    #[must_use]
    pub fn last_frame(&self) -> Option<&SpriteFrame> {
        self.frames.last()
    }

    /// Current frame index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// True once a one-shot clip has reached its last frame.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the clip has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the last frame (0 for empty clips).
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    /// Milliseconds between frames.
    #[must_use]
    pub const fn interval_ms(&self) -> u64 {
        self.frame_interval_ms
    }

    /// Whether the clip wraps around.
    #[must_use]
    pub const fn is_looping(&self) -> bool {
        self.looping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(count: usize, looping: bool) -> AnimationClip {
        // 10 fps -> 100 ms per frame
        AnimationClip::placeholder(count, 10, looping, 300, 360)
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval_ms(10), 100);
        assert_eq!(frame_interval_ms(14), 71);
        assert_eq!(frame_interval_ms(0), 1000);
    }

    #[test]
    fn test_advance_waits_for_interval() {
        let mut c = clip(3, true);
        c.reset(Millis(0));
        assert_eq!(c.advance(Millis(99)), FrameAdvance::default());
        let step = c.advance(Millis(100));
        assert!(step.advanced);
        assert!(!step.looped);
        assert_eq!(c.index(), 1);
    }

    #[test]
    fn test_looping_wraps() {
        let mut c = clip(2, true);
        c.reset(Millis(0));
        c.advance(Millis(100));
        let step = c.advance(Millis(200));
        assert!(step.looped);
        assert_eq!(c.index(), 0);
        assert!(!c.is_done());
    }

    #[test]
    fn test_one_shot_holds_last_frame() {
        let mut c = clip(2, false);
        c.reset(Millis(0));
        c.advance(Millis(100));
        let step = c.advance(Millis(200));
        assert!(step.advanced);
        assert!(!step.looped);
        assert!(c.is_done());
        assert_eq!(c.index(), 1);

        // Done clips never advance again
        assert_eq!(c.advance(Millis(1000)), FrameAdvance::default());
    }

    #[test]
    fn test_empty_clip_is_inert() {
        let mut c = AnimationClip::empty(10, true);
        assert!(c.current().is_none());
        assert_eq!(c.advance(Millis(10_000)), FrameAdvance::default());
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn test_reset_clears_done() {
        let mut c = clip(1, false);
        c.reset(Millis(0));
        c.advance(Millis(100));
        assert!(c.is_done());
        c.reset(Millis(500));
        assert!(!c.is_done());
        assert_eq!(c.index(), 0);
        assert!(!c.advance(Millis(550)).advanced);
    }

    #[test]
    fn test_shift_delays_next_step() {
        let mut c = clip(3, true);
        c.reset(Millis(0));
        c.shift(1000);
        assert!(!c.advance(Millis(500)).advanced);
        assert!(c.advance(Millis(1100)).advanced);
    }
}
