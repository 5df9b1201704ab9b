//! Hand landmark naming, topology and normalized hand results.

use crate::image::{draw, Color, Image, Resolution};
use crate::landmark::LandmarkSet;

/// Number of landmarks reported for each hand.
pub const NUM_LANDMARKS: usize = 21;

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl LandmarkIdx {
    /// All landmarks, in anatomical index order.
    pub const ALL: [LandmarkIdx; NUM_LANDMARKS] = {
        use LandmarkIdx::*;
        [
            Wrist,
            ThumbCmc,
            ThumbMcp,
            ThumbIp,
            ThumbTip,
            IndexFingerMcp,
            IndexFingerPip,
            IndexFingerDip,
            IndexFingerTip,
            MiddleFingerMcp,
            MiddleFingerPip,
            MiddleFingerDip,
            MiddleFingerTip,
            RingFingerMcp,
            RingFingerPip,
            RingFingerDip,
            RingFingerTip,
            PinkyMcp,
            PinkyPip,
            PinkyDip,
            PinkyTip,
        ]
    };

    /// Returns the anatomical index (0-20) of this landmark.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

const PALM_LANDMARKS: &[LandmarkIdx] = {
    use LandmarkIdx::*;
    &[
        Wrist,
        ThumbCmc,
        IndexFingerMcp,
        MiddleFingerMcp,
        RingFingerMcp,
        PinkyMcp,
    ]
};

/// Pairs of landmarks that are connected by a bone (or the outline of the palm).
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// A single hand as reported by a landmark provider.
///
/// Positions are normalized to the frame the hand was detected in: `(0, 0)` is the top left
/// corner, `(1, 1)` the bottom right one. Hands near the border may have landmarks slightly outside
/// of that range.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHand {
    positions: [[f32; 2]; NUM_LANDMARKS],
    presence: f32,
    handedness: Handedness,
}

impl NormalizedHand {
    pub fn new(positions: [[f32; 2]; NUM_LANDMARKS], presence: f32, handedness: Handedness) -> Self {
        Self {
            positions,
            presence,
            handedness,
        }
    }

    /// Returns the normalized position of a landmark.
    #[inline]
    pub fn position(&self, idx: LandmarkIdx) -> [f32; 2] {
        self.positions[idx.index()]
    }

    #[inline]
    pub fn positions(&self) -> &[[f32; 2]; NUM_LANDMARKS] {
        &self.positions
    }

    /// Confidence that this is actually a hand, in range 0.0 to 1.0.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the estimated handedness of the hand.
    ///
    /// This assumes that the camera image is passed in as-is (not mirrored).
    #[inline]
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Resolves this hand's landmarks to pixel coordinates of a frame.
    pub fn to_landmark_set(&self, res: Resolution) -> LandmarkSet {
        LandmarkSet::from_normalized(self.positions.iter().copied(), res)
    }

    /// Draws the hand skeleton onto `target`.
    ///
    /// `target` should be the frame the hand was detected in, or at least have the same aspect
    /// ratio.
    pub fn draw(&self, target: &mut Image) {
        let landmarks = self.to_landmark_set(target.resolution());
        let pixel = |idx: LandmarkIdx| {
            landmarks
                .get(idx)
                .map(|lm| lm.position())
                .unwrap_or_default()
        };

        for &(a, b) in CONNECTIVITY {
            let [ax, ay] = pixel(a);
            let [bx, by] = pixel(b);
            draw::line(target, ax, ay, bx, by).color(Color::GREEN);
        }
        for lm in &landmarks {
            draw::marker(target, lm.x(), lm.y());
        }

        let (mut cx, mut cy) = (0i64, 0i64);
        for &idx in PALM_LANDMARKS {
            let [x, y] = pixel(idx);
            cx += i64::from(x);
            cy += i64::from(y);
        }
        let n = PALM_LANDMARKS.len() as i64;
        let label = match self.handedness {
            Handedness::Left => "L",
            Handedness::Right => "R",
        };
        // The mean of `i32` values always fits back into an `i32`.
        draw::text(target, (cx / n) as i32, (cy / n) as i32, label).color(Color::WHITE);
    }
}
