/// Axis-aligned box in normalised image coordinates (`0.0..=1.0`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Pixel-space rectangle, always inside the image it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Grows the box by `margin` times its own size on every side, clamped to
    /// the unit square.
    pub fn expand(&self, margin: f32) -> Self {
        let dx = (self.x2 - self.x1) * margin;
        let dy = (self.y2 - self.y1) * margin;
        Self {
            x1: (self.x1 - dx).clamp(0.0, 1.0),
            y1: (self.y1 - dy).clamp(0.0, 1.0),
            x2: (self.x2 + dx).clamp(0.0, 1.0),
            y2: (self.y2 + dy).clamp(0.0, 1.0),
        }
    }

    /// Returns `None` when the box covers no whole pixel.
    pub fn to_pixels(&self, width: u32, height: u32) -> Option<PixelRect> {
        let x1 = (self.x1.clamp(0.0, 1.0) * width as f32).floor() as u32;
        let y1 = (self.y1.clamp(0.0, 1.0) * height as f32).floor() as u32;
        let x2 = (self.x2.clamp(0.0, 1.0) * width as f32).ceil() as u32;
        let y2 = (self.y2.clamp(0.0, 1.0) * height as f32).ceil() as u32;

        let x2 = x2.min(width);
        let y2 = y2.min(height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}
