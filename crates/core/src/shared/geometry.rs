/// Axis-aligned face box as reported by a detector, origin top-left.
///
/// Boxes carry no identity: the only correlation between two cycles is
/// the position of a box in each cycle's detector output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Box covering a whole `width` x `height` image.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }
}

/// Margin-expanded, boundary-clamped rectangle used for extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl CropRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True when the region lies entirely inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x + self.width <= width as i32
            && self.y + self.height <= height as i32
    }
}

/// Expands `bbox` by a margin proportional to its shorter side and clamps
/// the result to the image.
///
/// When an edge overflows, the opposite edge is pushed inward by the same
/// amount so the requested size survives where the image allows it.
/// Left/top are clamped before right/bottom, so a box near a corner goes
/// through both steps in sequence. That ordering is a heuristic, not an
/// optimal re-centring, and the left/top step caps at `dim - 1` while the
/// right/bottom step caps at `dim`.
///
/// Never fails; degenerate input yields a degenerate region and the
/// caller decides what to do with it.
pub fn clamp_crop(
    bbox: &BoundingBox,
    margin_percent: u32,
    image_width: u32,
    image_height: u32,
) -> CropRegion {
    let margin = (bbox.w.min(bbox.h) as i64 * margin_percent as i64).div_euclid(100) as i32;
    let (x_a, x_b) = clamp_axis(bbox.x - margin, bbox.x + bbox.w + margin, image_width as i32);
    let (y_a, y_b) = clamp_axis(bbox.y - margin, bbox.y + bbox.h + margin, image_height as i32);
    CropRegion::new(x_a, y_a, x_b - x_a, y_b - y_a)
}

fn clamp_axis(mut lo: i32, mut hi: i32, limit: i32) -> (i32, i32) {
    if lo < 0 {
        hi = (hi - lo).min(limit - 1);
        lo = 0;
    }
    if hi > limit {
        lo = (lo - (hi - limit)).max(0);
        hi = limit;
    }
    (lo, hi)
}
