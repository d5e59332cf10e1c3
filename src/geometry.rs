use serde::{Deserialize, Serialize};

/// Rounds to `decimals` places, half away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn round4(value: f64) -> f64 {
    round_to(value, 4)
}

/// Axis-aligned rectangle in image-fraction units (0..1 on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl NormBox {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Clamps the origin into the frame and shrinks the size to fit.
    ///
    /// The origin never moves inward past the nearest edge, so a box hanging
    /// off the top-left keeps its far edges where they were.
    pub fn clamp_to_frame(self) -> NormBox {
        let x = self.x.clamp(0.0, 1.0);
        let y = self.y.clamp(0.0, 1.0);
        let w = self.w.max(0.0).min(1.0 - x);
        let h = self.h.max(0.0).min(1.0 - y);
        NormBox { x, y, w, h }.rounded()
    }

    /// Slides the window back into the frame, shrinking it only when it is
    /// larger than the frame itself.
    pub fn clamp_position_first(self) -> NormBox {
        let x = self.x.min(1.0 - self.w).max(0.0);
        let y = self.y.min(1.0 - self.h).max(0.0);
        let w = self.w.min(1.0 - x);
        let h = self.h.min(1.0 - y);
        NormBox { x, y, w, h }.rounded()
    }

    // round the origin first so the rounded size cannot push the far edge past 1
    fn rounded(self) -> NormBox {
        let x = round4(self.x);
        let y = round4(self.y);
        NormBox {
            x,
            y,
            w: round4(self.w).min(round4(1.0 - x)),
            h: round4(self.h).min(round4(1.0 - y)),
        }
    }

    /// Whether the box lies within the unit square, allowing for float noise.
    pub fn is_within_frame(&self) -> bool {
        const EPS: f64 = 1e-9;
        self.x >= 0.0
            && self.y >= 0.0
            && self.w >= 0.0
            && self.h >= 0.0
            && self.right() <= 1.0 + EPS
            && self.bottom() <= 1.0 + EPS
    }
}
