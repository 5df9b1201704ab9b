//! Index/middle finger alignment and the drawing gesture derived from it.
//!
//! The alignment score is the cosine of the angle between the index finger's distal direction
//! (PIP joint to fingertip) and the middle finger's distal direction. Both fingers extended next
//! to each other gives a score close to 1.0, which is interpreted as the user wanting to draw.

use std::fmt;

use nalgebra::Vector2;
use thiserror::Error;

use super::landmark::LandmarkIdx;
use crate::landmark::LandmarkSet;

/// Score at or above which [`DrawingMode::classify`] reports [`DrawingMode::Drawing`] by default.
pub const DEFAULT_DRAWING_THRESHOLD: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Index,
    Middle,
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Finger::Index => "index",
            Finger::Middle => "middle",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignmentError {
    /// The finger's tip coincides with its lower joint, so it has no direction.
    #[error("indeterminate angle: {0} finger segment has zero length")]
    IndeterminateAngle(Finger),
    #[error("landmark {0:?} is missing from the landmark set")]
    MissingLandmark(LandmarkIdx),
}

/// Cosine of the angle between the index and middle finger, in range -1.0 to 1.0.
///
/// Floating-point rounding can put the value a tiny bit outside of that range.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct AlignmentScore(f32);

impl AlignmentScore {
    #[inline]
    pub fn value(self) -> f32 {
        self.0
    }
}

impl fmt::Display for AlignmentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// Computes the alignment score of the index and middle finger in `landmarks`.
///
/// Requires the index and middle finger PIP joints and tips to be present.
pub fn alignment_score(landmarks: &LandmarkSet) -> Result<AlignmentScore, AlignmentError> {
    let index = segment(
        landmarks,
        LandmarkIdx::IndexFingerPip,
        LandmarkIdx::IndexFingerTip,
    )?;
    let middle = segment(
        landmarks,
        LandmarkIdx::MiddleFingerPip,
        LandmarkIdx::MiddleFingerTip,
    )?;
    alignment_between(index, middle)
}

/// Computes the cosine of the angle between the index finger direction `index` and the middle
/// finger direction `middle`.
///
/// Returns [`AlignmentError::IndeterminateAngle`] if either vector has zero length (or the result
/// is otherwise not a finite number). The index finger is checked first.
pub fn alignment_between(
    index: Vector2<f32>,
    middle: Vector2<f32>,
) -> Result<AlignmentScore, AlignmentError> {
    let index_norm = index.norm();
    if index_norm == 0.0 {
        return Err(AlignmentError::IndeterminateAngle(Finger::Index));
    }
    let middle_norm = middle.norm();
    if middle_norm == 0.0 {
        return Err(AlignmentError::IndeterminateAngle(Finger::Middle));
    }

    let score = index.dot(&middle) / index_norm / middle_norm;
    if !score.is_finite() {
        return Err(AlignmentError::IndeterminateAngle(Finger::Index));
    }
    Ok(AlignmentScore(score))
}

fn segment(
    landmarks: &LandmarkSet,
    from: LandmarkIdx,
    to: LandmarkIdx,
) -> Result<Vector2<f32>, AlignmentError> {
    let get = |idx| {
        landmarks
            .get(idx)
            .map(|lm| Vector2::new(lm.x() as f32, lm.y() as f32))
            .ok_or(AlignmentError::MissingLandmark(idx))
    };
    Ok(get(to)? - get(from)?)
}

/// Whether the hand is currently making the drawing gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingMode {
    /// Index and middle finger point in (roughly) the same direction.
    Drawing,
    Idle,
}

impl DrawingMode {
    /// Classifies an alignment score; scores at or above `threshold` mean [`DrawingMode::Drawing`].
    pub fn classify(score: AlignmentScore, threshold: f32) -> Self {
        if score.value() >= threshold {
            DrawingMode::Drawing
        } else {
            DrawingMode::Idle
        }
    }
}

impl fmt::Display for DrawingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DrawingMode::Drawing => "drawing",
            DrawingMode::Idle => "idle",
        })
    }
}
