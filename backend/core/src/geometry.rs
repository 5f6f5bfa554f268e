//! Axis-aligned rectangles in source-image pixel space.

use serde::{Deserialize, Serialize};

use crate::error::{OcrDeckError, Result};

/// A rectangle `(left, top, right, bottom)` with `left < right` and `top < bottom`.
///
/// Serialized as a `[left, top, right, bottom]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[i32; 4]", try_from = "[i32; 4]")]
pub struct Rect {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl Rect {
    /// Build a rectangle from two opposite corners in any order.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (top, bottom) = (y1.min(y2), y1.max(y2));
        if left == right || top == bottom {
            return Err(OcrDeckError::InvalidRegion(format!(
                "degenerate rectangle ({x1},{y1})-({x2},{y2})"
            )));
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top) as u32
    }

    pub fn edges(&self) -> [i32; 4] {
        [self.left, self.top, self.right, self.bottom]
    }

    /// Whether the rectangle lies fully inside a `width x height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.right as i64 <= width as i64
            && self.bottom as i64 <= height as i64
    }

    /// Intersect with the `width x height` image bounds.
    pub fn clamp_to(&self, width: u32, height: u32) -> Result<Self> {
        let w = width.min(i32::MAX as u32) as i32;
        let h = height.min(i32::MAX as u32) as i32;
        let left = self.left.clamp(0, w);
        let right = self.right.clamp(0, w);
        let top = self.top.clamp(0, h);
        let bottom = self.bottom.clamp(0, h);
        if left >= right || top >= bottom {
            return Err(OcrDeckError::InvalidRegion(format!(
                "{self} lies outside the {width}x{height} frame"
            )));
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

impl std::str::FromStr for Rect {
    type Err = OcrDeckError;

    /// Parse `left,top,right,bottom`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| OcrDeckError::InvalidRegion(format!("'{s}': {e}")))?;
        match parts.as_slice() {
            [l, t, r, b] => Self::from_corners(*l, *t, *r, *b),
            _ => Err(OcrDeckError::InvalidRegion(format!(
                "'{s}': expected left,top,right,bottom"
            ))),
        }
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        r.edges()
    }
}

impl TryFrom<[i32; 4]> for Rect {
    type Error = OcrDeckError;

    fn try_from(e: [i32; 4]) -> Result<Self> {
        Rect::from_corners(e[0], e[1], e[2], e[3])
    }
}
