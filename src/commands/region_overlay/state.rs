//! Selection state for one overlay session.
//!
//! All mutation happens on the overlay thread, between messages, so the
//! state needs no locking; redraws always observe a consistent snapshot.

use super::types::{Point, Rect, MIN_SELECTION_SIZE};

/// The live rubber-band selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selection {
    pub start: Point,
    pub end: Point,
    pub dragging: bool,
    /// Space held during drag: mouse movement repositions the rectangle
    /// instead of resizing it.
    pub space_held: bool,
}

impl Selection {
    /// Begin a drag at `p`; both corners collapse onto the press point.
    pub fn begin(&mut self, p: Point) {
        self.start = p;
        self.end = p;
        self.dragging = true;
        self.space_held = false;
    }

    /// Extend the drag to `p` (resizing). When space is held, instead
    /// translate both corners by the delta from the previous end point,
    /// preserving the rectangle's dimensions.
    pub fn update(&mut self, p: Point, space_held: bool) {
        self.space_held = space_held;
        if space_held {
            let dx = p.x - self.end.x;
            let dy = p.y - self.end.y;
            self.start.x += dx;
            self.start.y += dy;
            self.end.x += dx;
            self.end.y += dy;
        } else {
            self.end = p;
        }
    }

    /// The selection as a normalized rectangle (min corner to max corner).
    pub fn rect(&self) -> Rect {
        Rect::new(self.start.x, self.start.y, self.end.x, self.end.y).normalize()
    }

    /// True when the current rectangle is large enough to commit.
    pub fn is_committable(&self) -> bool {
        let r = self.rect();
        r.width() as i32 > MIN_SELECTION_SIZE && r.height() as i32 > MIN_SELECTION_SIZE
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Clamp a mouse coordinate into the overlay rectangle.
///
/// Inclusive of `width`/`height` (not `width - 1`): the selection rectangle's
/// right/bottom edges are exclusive, so clamping to the full extent keeps the
/// outermost pixel row and column selectable.
pub fn clamp_to_overlay(x: i32, y: i32, width: u32, height: u32) -> Point {
    Point::new(x.clamp(0, width as i32), y.clamp(0, height as i32))
}

/// DPI ratio between a frame's physical width and the logical width the
/// windowing layer reported for the same extent. Floor-clamped at 1.0;
/// captures are never downscaled.
pub fn compute_scale_ratio(physical_width: u32, logical_width: u32) -> f64 {
    if logical_width == 0 {
        return 1.0;
    }
    (physical_width as f64 / logical_width as f64).max(1.0)
}

/// Scale a committed selection into physical pixels for cropping.
pub fn scale_selection(x: i32, y: i32, width: u32, height: u32, ratio: f64) -> (u32, u32, u32, u32) {
    (
        (x.max(0) as f64 * ratio) as u32,
        (y.max(0) as f64 * ratio) as u32,
        (width as f64 * ratio) as u32,
        (height as f64 * ratio) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_produces_normalized_rect() {
        let mut sel = Selection::default();
        sel.begin(Point::new(700, 500));
        sel.update(Point::new(100, 100), false);

        let r = sel.rect();
        assert_eq!((r.left, r.top, r.right, r.bottom), (100, 100, 700, 500));
        assert_eq!(r.width(), 600);
        assert_eq!(r.height(), 400);
    }

    #[test]
    fn test_space_translation_preserves_dimensions() {
        let mut sel = Selection::default();
        sel.begin(Point::new(100, 100));
        sel.update(Point::new(300, 250), false);
        let before = sel.rect();

        // Space held: the next move shifts the whole rectangle.
        sel.update(Point::new(340, 270), true);
        let after = sel.rect();

        assert_eq!(after.width(), before.width());
        assert_eq!(after.height(), before.height());
        assert_eq!(after.left, before.left + 40);
        assert_eq!(after.top, before.top + 20);
    }

    #[test]
    fn test_resize_resumes_after_space_release() {
        let mut sel = Selection::default();
        sel.begin(Point::new(0, 0));
        sel.update(Point::new(100, 100), false);
        sel.update(Point::new(120, 120), true);
        sel.update(Point::new(200, 150), false);

        let r = sel.rect();
        assert_eq!(r.right, 200);
        assert_eq!(r.bottom, 150);
        // Start stays where the space-translation left it.
        assert_eq!(r.left, 20);
        assert_eq!(r.top, 20);
    }

    #[test]
    fn test_commit_threshold() {
        let mut sel = Selection::default();
        sel.begin(Point::new(0, 0));
        sel.update(Point::new(10, 50), false);
        assert!(!sel.is_committable()); // width == 10 is too small

        sel.update(Point::new(11, 50), false);
        assert!(sel.is_committable());
    }

    #[test]
    fn test_clamp_is_inclusive_of_edges() {
        // Clamping to the rect, not rect-1: edge pixels stay selectable.
        let p = clamp_to_overlay(2000, -50, 1920, 1080);
        assert_eq!(p, Point::new(1920, 0));
        let p = clamp_to_overlay(-1, 1200, 1920, 1080);
        assert_eq!(p, Point::new(0, 1080));
    }

    #[test]
    fn test_scale_ratio() {
        assert_eq!(compute_scale_ratio(3840, 1920), 2.0);
        assert_eq!(compute_scale_ratio(1920, 1920), 1.0);
        // Never below 1.0 even if the report is nonsense.
        assert_eq!(compute_scale_ratio(1000, 2000), 1.0);
        assert_eq!(compute_scale_ratio(1920, 0), 1.0);
    }

    #[test]
    fn test_scale_selection_high_dpi() {
        // A 200x200 logical selection at 2.0 crops 400x400 physical pixels.
        let (x, y, w, h) = scale_selection(100, 100, 200, 200, 2.0);
        assert_eq!((x, y, w, h), (200, 200, 400, 400));
    }
}
