//! Source-image <-> preview coordinate mapping and drag-to-rectangle tracking.

use crate::error::{OcrDeckError, Result};
use crate::geometry::Rect;

/// Fit-to-box mapping between a source image and a scaled preview.
///
/// The per-axis factors are derived from the realized (rounded) display size,
/// not the ideal float scale, so repeated conversions do not drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    source_width: u32,
    source_height: u32,
    display_width: u32,
    display_height: u32,
    inv_x: f64,
    inv_y: f64,
}

impl CoordinateMapper {
    /// Scale `source` uniformly to fit inside `area`. Returns `None` for empty sizes.
    pub fn fit(source: (u32, u32), area: (u32, u32)) -> Option<Self> {
        let (sw, sh) = source;
        let (aw, ah) = area;
        if sw == 0 || sh == 0 || aw == 0 || ah == 0 {
            return None;
        }
        let scale = (aw as f64 / sw as f64).min(ah as f64 / sh as f64);
        let display_width = ((sw as f64 * scale).round() as u32).max(1);
        let display_height = ((sh as f64 * scale).round() as u32).max(1);
        Some(Self {
            source_width: sw,
            source_height: sh,
            display_width,
            display_height,
            inv_x: sw as f64 / display_width as f64,
            inv_y: sh as f64 / display_height as f64,
        })
    }

    pub fn source_size(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn display_size(&self) -> (u32, u32) {
        (self.display_width, self.display_height)
    }

    /// Source pixels per display pixel, per axis.
    pub fn inverse_scale(&self) -> (f64, f64) {
        (self.inv_x, self.inv_y)
    }

    pub fn to_display(&self, x: i32, y: i32) -> (i32, i32) {
        (
            (x as f64 / self.inv_x).round() as i32,
            (y as f64 / self.inv_y).round() as i32,
        )
    }

    pub fn to_source(&self, x: i32, y: i32) -> (i32, i32) {
        (
            (x as f64 * self.inv_x).round() as i32,
            (y as f64 * self.inv_y).round() as i32,
        )
    }

    /// Display-space edges for overlay drawing. May collapse to zero width for
    /// regions smaller than one display pixel.
    pub fn rect_to_display(&self, rect: &Rect) -> [i32; 4] {
        let (l, t) = self.to_display(rect.left(), rect.top());
        let (r, b) = self.to_display(rect.right(), rect.bottom());
        [l, t, r, b]
    }

    pub fn rect_to_source(&self, edges: [i32; 4]) -> Result<Rect> {
        let (l, t) = self.to_source(edges[0], edges[1]);
        let (r, b) = self.to_source(edges[2], edges[3]);
        Rect::from_corners(l, t, r, b)
    }
}

/// Tracks a pointer drag over the preview and turns it into a source-space region.
#[derive(Debug, Default, Clone)]
pub struct DragTracker {
    anchor: Option<(i32, i32)>,
    current: Option<(i32, i32)>,
}

impl DragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, x: i32, y: i32) {
        self.anchor = Some((x, y));
        self.current = Some((x, y));
    }

    /// Update the drag; returns the rubber-band rectangle in display space.
    pub fn drag(&mut self, x: i32, y: i32) -> Option<[i32; 4]> {
        let (ax, ay) = self.anchor?;
        self.current = Some((x, y));
        Some([ax.min(x), ay.min(y), ax.max(x), ay.max(y)])
    }

    pub fn is_active(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn cancel(&mut self) {
        self.anchor = None;
        self.current = None;
    }

    /// Finish the drag. `None` when no drag was in progress; otherwise the
    /// region mapped to source space and clamped to the source image.
    pub fn release(&mut self, x: i32, y: i32, mapper: &CoordinateMapper) -> Option<Result<Rect>> {
        let (ax, ay) = self.anchor.take()?;
        self.current = None;
        let display = [ax.min(x), ay.min(y), ax.max(x), ay.max(y)];
        let (sw, sh) = mapper.source_size();
        Some(
            mapper
                .rect_to_source(display)
                .and_then(|r| r.clamp_to(sw, sh))
                .map_err(|e| match e {
                    OcrDeckError::InvalidRegion(msg) => {
                        OcrDeckError::InvalidRegion(format!("drag too small: {msg}"))
                    }
                    other => other,
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn range(&mut self, lo: u32, hi: u32) -> u32 {
            lo + (self.next() % (hi - lo) as u64) as u32
        }
    }

    #[test]
    fn fits_landscape_into_box() {
        let m = CoordinateMapper::fit((1920, 1080), (800, 600)).unwrap();
        assert_eq!(m.display_size(), (800, 450));
        assert_eq!(m.to_display(960, 540), (400, 225));
        assert_eq!(m.to_source(400, 225), (960, 540));
    }

    #[test]
    fn empty_sizes_have_no_mapping() {
        assert!(CoordinateMapper::fit((0, 1080), (800, 600)).is_none());
        assert!(CoordinateMapper::fit((1920, 1080), (800, 0)).is_none());
    }

    #[test]
    fn source_display_source_round_trip() {
        let mut rng = XorShift(0x2545_f491_4f6c_dd1d);
        let mut checked = 0;
        for _ in 0..5_000 {
            let source = (rng.range(16, 4000), rng.range(16, 4000));
            let area = (rng.range(200, 3000), rng.range(200, 3000));
            let m = CoordinateMapper::fit(source, area).unwrap();
            let (inv_x, inv_y) = m.inverse_scale();

            // Regions must span at least a couple of display pixels to survive the trip.
            let min_w = (2.0 * inv_x).ceil() as u32 + 2;
            let min_h = (2.0 * inv_y).ceil() as u32 + 2;
            if min_w >= source.0 || min_h >= source.1 {
                continue;
            }
            let l = rng.range(0, source.0 - min_w);
            let r = rng.range(l + min_w, source.0 + 1);
            let t = rng.range(0, source.1 - min_h);
            let b = rng.range(t + min_h, source.1 + 1);
            let rect = Rect::from_corners(l as i32, t as i32, r as i32, b as i32).unwrap();

            let back = m.rect_to_source(m.rect_to_display(&rect)).unwrap();

            let tol_x = (inv_x / 2.0).ceil().max(1.0) as i32;
            let tol_y = (inv_y / 2.0).ceil().max(1.0) as i32;
            let (a, z) = (rect.edges(), back.edges());
            for (i, tol) in [tol_x, tol_y, tol_x, tol_y].into_iter().enumerate() {
                assert!(
                    (a[i] - z[i]).abs() <= tol,
                    "edge {i}: {rect} -> {back} (source {source:?}, area {area:?})"
                );
            }
            // A display pixel covering at most two source pixels keeps every edge within 1px.
            if inv_x <= 2.0 && inv_y <= 2.0 {
                for i in 0..4 {
                    assert!((a[i] - z[i]).abs() <= 1, "{rect} -> {back}");
                }
            }
            checked += 1;
        }
        assert!(checked > 1_000, "only {checked} cases exercised");
    }

    #[test]
    fn display_source_display_is_exact_when_downscaling() {
        let mut rng = XorShift(0xdead_beef_cafe_f00d);
        for _ in 0..2_000 {
            let source = (rng.range(800, 4000), rng.range(600, 4000));
            let area = (rng.range(100, 800), rng.range(100, 600));
            let m = CoordinateMapper::fit(source, area).unwrap();
            let (dw, dh) = m.display_size();
            let x = rng.range(0, dw + 1) as i32;
            let y = rng.range(0, dh + 1) as i32;
            let (sx, sy) = m.to_source(x, y);
            assert_eq!(m.to_display(sx, sy), (x, y));
        }
    }

    #[test]
    fn drag_produces_normalized_source_rect() {
        let m = CoordinateMapper::fit((1920, 1080), (960, 540)).unwrap();
        let mut drag = DragTracker::new();
        drag.press(105, 30);
        assert_eq!(drag.drag(50, 40), Some([50, 30, 105, 40]));
        let rect = drag.release(5, 5, &m).unwrap().unwrap();
        assert_eq!(rect.edges(), [10, 10, 210, 60]);
        assert!(!drag.is_active());
    }

    #[test]
    fn drag_is_clamped_to_source() {
        let m = CoordinateMapper::fit((1920, 1080), (960, 540)).unwrap();
        let mut drag = DragTracker::new();
        drag.press(900, 500);
        let rect = drag.release(1200, 700, &m).unwrap().unwrap();
        assert_eq!(rect.edges(), [1800, 1000, 1920, 1080]);
    }

    #[test]
    fn click_without_drag_is_rejected() {
        let m = CoordinateMapper::fit((1920, 1080), (960, 540)).unwrap();
        let mut drag = DragTracker::new();
        assert!(drag.release(1, 1, &m).is_none());
        drag.press(10, 10);
        assert!(drag.release(10, 10, &m).unwrap().is_err());
    }
}
