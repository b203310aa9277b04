use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }
}

/// The scroll container as seen by a view transform.
///
/// `y` is the vertical scroll offset and `height` the visible extent, both in
/// the same abstract units as row heights. Hosts pick the unit (terminal
/// cells, CSS pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    pub fn with_scroll(mut self, y: f64) -> Self {
        self.y = y;
        self
    }

    /// The visible region in content coordinates.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_rect_tracks_scroll() {
        let vp = Viewport::new(80.0, 24.0).with_scroll(100.0);
        let r = vp.rect();
        assert_eq!(r.y, 100.0);
        assert_eq!(r.bottom(), 124.0);
    }
}
