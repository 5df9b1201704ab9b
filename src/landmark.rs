//! Pixel-space landmarks.
//!
//! Landmark networks report positions normalized to the input frame (`[0, 1]` on both axes). The
//! types in this module hold the same positions resolved to integer pixel coordinates of a
//! specific frame, which is what the classifiers and the report work with.

use std::fmt;

use crate::hand::landmark::LandmarkIdx;
use crate::image::Resolution;

/// A single landmark resolved to pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Landmark {
    id: LandmarkIdx,
    x: i32,
    y: i32,
}

impl Landmark {
    pub fn new(id: LandmarkIdx, x: i32, y: i32) -> Self {
        Self { id, x, y }
    }

    /// Resolves a normalized `[x, y]` position against a frame of the given resolution.
    ///
    /// Coordinates are truncated towards zero, so a position of `0.999` in a 100 pixel wide frame
    /// ends up on pixel 99.
    pub fn from_normalized(id: LandmarkIdx, [x, y]: [f32; 2], res: Resolution) -> Self {
        Self {
            id,
            x: (x * res.width() as f32) as i32,
            y: (y * res.height() as f32) as i32,
        }
    }

    #[inline]
    pub fn id(&self) -> LandmarkIdx {
        self.id
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
    }

    #[inline]
    pub fn position(&self) -> [i32; 2] {
        [self.x, self.y]
    }
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@({}, {})", self.id.index(), self.x, self.y)
    }
}

/// The landmarks of a single hand in one frame, ordered by anatomical index.
///
/// A set is either empty (no hand in the frame) or built from consecutive indices starting at the
/// wrist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
}

impl LandmarkSet {
    /// Creates an empty set, as returned for frames without a hand.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set from pixel positions listed in anatomical order.
    ///
    /// Positions beyond the last anatomical index are ignored.
    pub fn from_positions<I: IntoIterator<Item = [i32; 2]>>(positions: I) -> Self {
        let landmarks = LandmarkIdx::ALL
            .iter()
            .zip(positions)
            .map(|(&id, [x, y])| Landmark::new(id, x, y))
            .collect();
        Self { landmarks }
    }

    /// Resolves normalized positions, listed in anatomical order, against a frame resolution.
    pub fn from_normalized<I: IntoIterator<Item = [f32; 2]>>(positions: I, res: Resolution) -> Self {
        let landmarks = LandmarkIdx::ALL
            .iter()
            .zip(positions)
            .map(|(&id, pos)| Landmark::from_normalized(id, pos, res))
            .collect();
        Self { landmarks }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Looks up a landmark, returning `None` if the set does not extend to `idx`.
    pub fn get(&self, idx: LandmarkIdx) -> Option<&Landmark> {
        self.landmarks.get(idx.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> + '_ {
        self.landmarks.iter()
    }
}

impl<'a> IntoIterator for &'a LandmarkSet {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.landmarks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_normalized_truncates() {
        let res = Resolution::new(640, 480);
        let lm = Landmark::from_normalized(LandmarkIdx::ThumbTip, [0.5, 0.9999], res);
        assert_eq!(lm.position(), [320, 479]);

        // Truncation is towards zero, also for landmarks slightly outside the frame.
        let lm = Landmark::from_normalized(LandmarkIdx::Wrist, [-0.001, 1.0], res);
        assert_eq!(lm.position(), [0, 480]);
    }

    #[test]
    fn set_keeps_anatomical_order() {
        let set = LandmarkSet::from_positions((0..21).map(|i| [i, 2 * i]));
        assert_eq!(set.len(), 21);
        for (i, lm) in set.iter().enumerate() {
            assert_eq!(lm.id().index(), i);
            assert_eq!(lm.position(), [i as i32, 2 * i as i32]);
        }
        assert_eq!(
            set.get(LandmarkIdx::ThumbTip).map(Landmark::position),
            Some([4, 8])
        );
    }

    #[test]
    fn short_set_lookup() {
        let set = LandmarkSet::from_positions([[0, 0], [1, 1], [2, 2]]);
        assert!(set.get(LandmarkIdx::ThumbMcp).is_some());
        assert!(set.get(LandmarkIdx::ThumbIp).is_none());
        assert!(LandmarkSet::empty().get(LandmarkIdx::Wrist).is_none());
    }

    #[test]
    fn extra_positions_are_ignored() {
        let set = LandmarkSet::from_positions((0..30).map(|i| [i, i]));
        assert_eq!(set.len(), LandmarkIdx::ALL.len());
    }

    #[test]
    fn display() {
        let lm = Landmark::new(LandmarkIdx::ThumbTip, 12, -3);
        assert_eq!(lm.to_string(), "4@(12, -3)");
    }
}
