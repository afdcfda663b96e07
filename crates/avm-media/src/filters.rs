//! FFmpeg filter expressions for the avatar bubble overlay.

use serde::{Deserialize, Serialize};

/// Default bubble radius in pixels.
pub const DEFAULT_RADIUS: u32 = 150;
/// Default distance between bubble and frame edges in pixels.
pub const DEFAULT_MARGIN: u32 = 40;

/// Frame corner the bubble is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl Corner {
    /// `overlay` filter position (`x:y`) for this corner.
    ///
    /// `W`/`H` are the background size, `w`/`h` the overlay size.
    pub fn position(&self, margin: u32) -> String {
        match self {
            Corner::TopLeft => format!("{m}:{m}", m = margin),
            Corner::TopRight => format!("W-w-{m}:{m}", m = margin),
            Corner::BottomLeft => format!("{m}:H-h-{m}", m = margin),
            Corner::BottomRight => format!("W-w-{m}:H-h-{m}", m = margin),
        }
    }
}

/// Crop-to-circle filter chain for a single video stream.
///
/// The input is center-cropped to a square of `min(iw, ih)`, scaled to the
/// circle diameter and given an alpha channel that is opaque only inside
/// the circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircularMask {
    pub radius: u32,
}

impl CircularMask {
    pub fn new(radius: u32) -> Self {
        Self {
            radius: radius.max(1),
        }
    }

    pub fn diameter(&self) -> u32 {
        self.radius * 2
    }

    /// Filter chain, without input/output labels.
    pub fn filter(&self) -> String {
        let r = self.radius;
        let d = self.diameter();
        format!(
            "crop='min(iw,ih)':'min(iw,ih)',scale={d}:{d},format=rgba,\
             geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='if(lte(hypot(X-{r},Y-{r}),{r}),255,0)'"
        )
    }

    /// Whether a pixel of the scaled square is kept.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let r = self.radius as f64;
        (x as f64 - r).hypot(y as f64 - r) <= r
    }
}

impl Default for CircularMask {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS)
    }
}

/// Placement of the avatar bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayOptions {
    pub radius: u32,
    pub margin: u32,
    pub corner: Corner,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            margin: DEFAULT_MARGIN,
            corner: Corner::default(),
        }
    }
}

impl OverlayOptions {
    pub fn mask(&self) -> CircularMask {
        CircularMask::new(self.radius)
    }

    /// Read overrides from `AVM_OVERLAY_RADIUS`, `AVM_OVERLAY_MARGIN` and
    /// `AVM_OVERLAY_CORNER`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            radius: std::env::var("AVM_OVERLAY_RADIUS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.radius),
            margin: std::env::var("AVM_OVERLAY_MARGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.margin),
            corner: std::env::var("AVM_OVERLAY_CORNER")
                .ok()
                .and_then(|s| serde_json::from_value(serde_json::Value::String(s)).ok())
                .unwrap_or(defaults.corner),
        }
    }
}
