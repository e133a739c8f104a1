// Timeline Layout - Pixel geometry of the ruler and lanes
//
// All pointer x coordinates are viewport-relative. Adding the horizontal
// scroll offset gives the content coordinate, where step `s` starts at
// `s * step_width`.

use crate::pattern::{NoteId, STEPS, SynthPattern};

/// Width of one step at 100% zoom, in pixels
pub const BASE_STEP_WIDTH: f32 = 60.0;

/// Grab zone at the trailing edge of a note that starts a resize
pub const RESIZE_MARGIN_PX: f32 = 10.0;

/// Gap left between adjacent note blocks
pub const NOTE_GAP_PX: f32 = 2.0;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 2.0;

/// Part of a note block under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteZone {
    Body,
    /// Trailing resize handle
    Edge,
}

/// Result of a lane hit-test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteHit {
    pub id: NoteId,
    pub step: usize,
    pub duration_steps: u8,
    pub zone: NoteZone,
}

/// Zoom and scroll of the timeline view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineLayout {
    zoom: f32,
    scroll_x: f32,
}

impl Default for TimelineLayout {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            scroll_x: 0.0,
        }
    }
}

impl TimelineLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set the zoom factor, clamped to 0.5..=2.0
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn scroll_x(&self) -> f32 {
        self.scroll_x
    }

    pub fn set_scroll_x(&mut self, scroll_x: f32) {
        self.scroll_x = scroll_x.max(0.0);
    }

    /// Pixels per step at the current zoom
    #[inline]
    pub fn step_width(&self) -> f32 {
        BASE_STEP_WIDTH * self.zoom
    }

    /// Width of the whole loop in content pixels
    pub fn total_width(&self) -> f32 {
        STEPS as f32 * self.step_width()
    }

    /// Viewport x to content x
    #[inline]
    pub fn content_x(&self, x: f32) -> f32 {
        x + self.scroll_x
    }

    /// Content x where `step` starts
    pub fn step_x(&self, step: usize) -> f32 {
        step as f32 * self.step_width()
    }

    /// Step cell under a lane x coordinate
    pub fn step_at(&self, x: f32) -> Option<usize> {
        let content = self.content_x(x);
        if content < 0.0 {
            return None;
        }
        let step = (content / self.step_width()).floor() as usize;
        (step < STEPS).then_some(step)
    }

    /// Musical position (fractional steps) for a ruler x coordinate
    ///
    /// The ruler maps linearly onto the loop and clamps at both ends.
    pub fn ruler_position(&self, x: f32) -> f64 {
        let total = self.total_width();
        let content = self.content_x(x).clamp(0.0, total);
        (content / total) as f64 * STEPS as f64
    }

    /// Steps moved for a horizontal pointer delta
    pub fn step_delta(&self, pixels: f32) -> i32 {
        (pixels / self.step_width()).round() as i32
    }

    /// Note block under a synth-lane x coordinate
    ///
    /// Later onsets are drawn on top, so the last matching note wins.
    pub fn hit_test(&self, x: f32, pattern: &SynthPattern) -> Option<NoteHit> {
        let content = self.content_x(x);
        let mut hit = None;

        for (step, note) in pattern.notes() {
            let left = self.step_x(step);
            let width = (note.duration_steps as f32 * self.step_width() - NOTE_GAP_PX).max(1.0);
            if content < left || content >= left + width {
                continue;
            }
            let zone = if content > left + width - RESIZE_MARGIN_PX {
                NoteZone::Edge
            } else {
                NoteZone::Body
            };
            hit = Some(NoteHit {
                id: note.id,
                step,
                duration_steps: note.duration_steps,
                zone,
            });
        }
        hit
    }
}
