// Core data types for the mural protocol.
//
// Drawing primitives shared by the server's session store and the client's
// replica (`mural_board`). `Pixel` is an immutable point sample of a stroke;
// `Scribble` is the append-only pixel sequence of one continuous gesture,
// carrying a lazily widened bounding box that the rendering layer uses for
// hit-testing. `PlayerId` is the server-assigned participant identity.

use serde::{Deserialize, Serialize};

/// Server-assigned player ID (compact i32). Ids are allocated monotonically
/// starting at 1 and never reused for the lifetime of the server process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub i32);

impl PlayerId {
    /// Placeholder identity a client holds before the server assigns a real
    /// id via `Pong`.
    pub const UNASSIGNED: PlayerId = PlayerId(0);
}

/// 2D point in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// RGBA color, one byte per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// One point sample of a stroke: position, stroke half-width, color.
/// Produced by the drawing player; never mutated after creation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub center: Vec2,
    pub radius: f32,
    pub color: Color,
}

/// Axis-aligned bounding box over pixel centers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// Degenerate box containing a single point.
    fn around(point: Vec2) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Widen the box to contain `point`.
    fn widen(&mut self, point: Vec2) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }
}

/// One continuous stroke: an ordered, append-only sequence of pixels plus a
/// bounding box widened as pixels arrive. An empty scribble has no bounds.
///
/// Pixels are only ever appended; a scribble is removed or restored whole by
/// undo/redo, never edited in place. Fields stay private so `bounds` cannot
/// drift from `pixels`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scribble {
    pixels: Vec<Pixel>,
    bounds: Option<Bounds>,
}

impl Scribble {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a scribble from a full pixel list (the `Redo` payload).
    pub fn from_pixels(pixels: Vec<Pixel>) -> Self {
        let mut scribble = Self::new();
        for pixel in pixels {
            scribble.push(pixel);
        }
        scribble
    }

    /// Append a pixel, widening the bounding box to cover its center.
    pub fn push(&mut self, pixel: Pixel) {
        match &mut self.bounds {
            Some(bounds) => bounds.widen(pixel.center),
            None => self.bounds = Some(Bounds::around(pixel.center)),
        }
        self.pixels.push(pixel);
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(x: f32, y: f32) -> Pixel {
        Pixel {
            center: Vec2::new(x, y),
            radius: 4.0,
            color: Color {
                r: 20,
                g: 40,
                b: 60,
                a: 255,
            },
        }
    }

    #[test]
    fn empty_scribble_has_no_bounds() {
        let scribble = Scribble::new();
        assert!(scribble.is_empty());
        assert_eq!(scribble.bounds(), None);
    }

    #[test]
    fn push_preserves_order() {
        let mut scribble = Scribble::new();
        scribble.push(px(1.0, 1.0));
        scribble.push(px(2.0, 2.0));
        scribble.push(px(3.0, 3.0));

        let xs: Vec<f32> = scribble.pixels().iter().map(|p| p.center.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn bounds_widen_as_pixels_arrive() {
        let mut scribble = Scribble::new();
        scribble.push(px(10.0, 5.0));
        let bounds = scribble.bounds().unwrap();
        assert_eq!(bounds.min, Vec2::new(10.0, 5.0));
        assert_eq!(bounds.max, Vec2::new(10.0, 5.0));

        scribble.push(px(-2.0, 8.0));
        scribble.push(px(4.0, -1.0));
        let bounds = scribble.bounds().unwrap();
        assert_eq!(bounds.min, Vec2::new(-2.0, -1.0));
        assert_eq!(bounds.max, Vec2::new(10.0, 8.0));
    }

    #[test]
    fn from_pixels_matches_incremental_pushes() {
        let pixels = vec![px(0.0, 0.0), px(5.0, -3.0), px(2.0, 7.0)];

        let mut incremental = Scribble::new();
        for pixel in &pixels {
            incremental.push(*pixel);
        }
        let rebuilt = Scribble::from_pixels(pixels);

        assert_eq!(rebuilt, incremental);
    }
}
