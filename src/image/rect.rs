use std::fmt;

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Rectangles are allowed to have zero width and/or height, and may extend past the bounds of the
/// image they describe (for example, the black bars of a letterboxed frame).
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Rect {
    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        assert!(
            width >= 0.0 && height >= 0.0,
            "negative rectangle size {}x{}",
            width,
            height
        );
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Maps a point from the unit square `[0, 1]²` to a point inside this rectangle.
    pub fn denormalize(&self, u: f32, v: f32) -> [f32; 2] {
        [self.x + u * self.width, self.y + v * self.height]
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denormalize() {
        let rect = Rect::from_top_left(-80.0, 0.0, 640.0, 640.0);
        assert_eq!(rect.denormalize(0.0, 0.0), [-80.0, 0.0]);
        assert_eq!(rect.denormalize(0.5, 0.5), [240.0, 320.0]);
        assert_eq!(rect.denormalize(1.0, 1.0), [560.0, 640.0]);
    }

    #[test]
    #[should_panic]
    fn negative_size() {
        Rect::from_top_left(0.0, 0.0, -1.0, 1.0);
    }
}
