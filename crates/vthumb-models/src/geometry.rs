//! Geometry for overlay zones and face boxes.
//!
//! Overlay zones are fractions of the frame so one preset fits any
//! resolution; everything else in the pipeline works in analysis-image
//! pixels via [`PixelBox`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Rounding slack for hand-written preset zones that land on 1.0.
const COORD_SLACK: f64 = 1e-3;

/// A screen region, in fractions of the frame, where the host expects to
/// place an overlay later (title text, lower third, watermark). Frames
/// whose content collides with these regions are penalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverlayZone {
    /// Left edge as a fraction of frame width.
    pub x: f64,
    /// Top edge as a fraction of frame height.
    pub y: f64,
    /// Fractional width.
    pub width: f64,
    /// Fractional height.
    pub height: f64,
}

impl OverlayZone {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// A zone is usable when it has positive extent and stays inside the
    /// frame (with rounding slack past 1.0).
    pub fn is_valid(&self) -> bool {
        let within = |v: f64| (0.0..=1.0 + COORD_SLACK).contains(&v);
        self.width > 0.0
            && self.height > 0.0
            && within(self.x)
            && within(self.y)
            && within(self.x + self.width)
            && within(self.y + self.height)
    }

    /// Project onto a concrete frame, clamped to its bounds.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> PixelBox {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        PixelBox::new(self.x * fw, self.y * fh, self.width * fw, self.height * fh)
            .clamp_to(frame_width, frame_height)
    }
}

/// Axis-aligned box in analysis-image pixels: detected faces, and
/// overlay zones once projected onto a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PixelBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Overlap fraction (intersection over union) with another box.
    pub fn iou(&self, other: &PixelBox) -> f64 {
        let overlap_w = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let overlap_h = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let intersection = overlap_w * overlap_h;
        if intersection <= 0.0 {
            return 0.0;
        }
        intersection / (self.area() + other.area() - intersection)
    }

    /// Box grown by `margin` pixels on every side.
    pub fn grow(&self, margin: f64) -> PixelBox {
        PixelBox::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Clamp the edges to frame boundaries, shrinking the box if needed.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> PixelBox {
        let fw = frame_width as f64;
        let fh = frame_height as f64;

        let left = self.x.clamp(0.0, fw);
        let top = self.y.clamp(0.0, fh);
        let right = self.right().clamp(0.0, fw);
        let bottom = self.bottom().clamp(0.0, fh);

        PixelBox {
            x: left,
            y: top,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
        }
    }

    /// Pick the largest box by area, if any.
    pub fn largest(boxes: &[PixelBox]) -> Option<&PixelBox> {
        boxes.iter().max_by(|a, b| {
            a.area()
                .partial_cmp(&b.area())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_zone_validity() {
        // A typical lower-third caption zone
        assert!(OverlayZone::new(0.05, 0.7, 0.9, 0.25).is_valid());
        // Full-frame zone lands exactly on 1.0
        assert!(OverlayZone::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!OverlayZone::new(-0.05, 0.7, 0.9, 0.25).is_valid());
        assert!(!OverlayZone::new(0.5, 0.7, 0.9, 0.25).is_valid());
        assert!(!OverlayZone::new(0.05, 0.7, 0.0, 0.25).is_valid());
    }

    #[test]
    fn test_overlay_zone_to_pixels() {
        // Lower third of a 640x360 analysis image
        let zone = OverlayZone::new(0.0, 0.7, 1.0, 0.3);
        let px = zone.to_pixels(640, 360);
        assert!((px.x - 0.0).abs() < 1e-9);
        assert!((px.y - 252.0).abs() < 1e-9);
        assert!((px.width - 640.0).abs() < 1e-9);
        assert!((px.bottom() - 360.0).abs() < 1e-9);

        // A zone nudged past the right edge clamps to the frame
        let wide = OverlayZone::new(0.8, 0.0, 0.3, 0.2);
        assert!((wide.to_pixels(640, 360).right() - 640.0).abs() < 1e-9);
    }

    #[test]
    fn test_iou_of_shifted_faces() {
        // Two 120px faces on a 640x360 frame, offset by half their size:
        // overlap 60x60 = 3600, union 2*14400 - 3600 = 25200
        let a = PixelBox::new(200.0, 90.0, 120.0, 120.0);
        let b = PixelBox::new(260.0, 150.0, 120.0, 120.0);
        assert!((a.iou(&b) - 3600.0 / 25200.0).abs() < 1e-9);
        assert!((a.iou(&a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_iou_of_separated_faces() {
        let left = PixelBox::new(40.0, 40.0, 80.0, 80.0);
        let right = PixelBox::new(400.0, 200.0, 80.0, 80.0);
        assert_eq!(left.iou(&right), 0.0);
    }

    #[test]
    fn test_grow_and_clamp_near_frame_edge() {
        // Face mask padding near the top-left corner of the analysis image
        let face = PixelBox::new(2.0, 2.0, 60.0, 60.0);
        let grown = face.grow(5.0);
        assert!((grown.x - -3.0).abs() < 1e-9);
        assert!((grown.width - 70.0).abs() < 1e-9);

        let clamped = grown.clamp_to(640, 360);
        assert_eq!(clamped.x, 0.0);
        assert_eq!(clamped.y, 0.0);
        assert!((clamped.width - 67.0).abs() < 1e-9);
        assert!((clamped.height - 67.0).abs() < 1e-9);
    }

    #[test]
    fn test_largest_picks_dominant_face() {
        let faces = vec![
            PixelBox::new(60.0, 80.0, 48.0, 48.0),
            PixelBox::new(300.0, 70.0, 150.0, 150.0),
            PixelBox::new(520.0, 90.0, 72.0, 72.0),
        ];
        assert_eq!(PixelBox::largest(&faces).unwrap().width, 150.0);
        assert!(PixelBox::largest(&[]).is_none());
    }
}
