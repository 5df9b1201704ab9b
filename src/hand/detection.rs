//! Hand landmark providers.
//!
//! A [`LandmarkProvider`] looks at a frame and returns a [`Detection`]: every hand it found, with
//! landmark positions normalized to the frame. The detection is a plain value, so turning it into
//! pixel coordinates or drawing it onto the frame does not depend on any hidden provider state.

use std::path::Path;

use crate::hand::landmark::{Handedness, NormalizedHand, NUM_LANDMARKS};
use crate::image::{AspectRatio, Image, Rect, Resolution};
use crate::landmark::LandmarkSet;
use crate::nn::{Cnn, ColorMapper, NeuralNetwork, Outputs};
use crate::timer::Timer;

/// Trait for anything that can find hands in a frame.
pub trait LandmarkProvider {
    /// Runs hand detection on `image`.
    ///
    /// Finding no hand is not an error; the returned [`Detection`] is empty in that case.
    fn detect(&mut self, image: &Image) -> anyhow::Result<Detection>;

    /// Returns profiling timers of this provider.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// The hands found in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    resolution: Resolution,
    hands: Vec<NormalizedHand>,
}

impl Detection {
    pub fn new(resolution: Resolution, hands: Vec<NormalizedHand>) -> Self {
        Self { resolution, hands }
    }

    /// Creates a detection result for a frame without hands.
    pub fn none(resolution: Resolution) -> Self {
        Self::new(resolution, Vec::new())
    }

    /// Returns the resolution of the frame this detection was computed on.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns all hands reported by the provider, most confident first.
    #[inline]
    pub fn hands(&self) -> &[NormalizedHand] {
        &self.hands
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    /// Resolves the landmarks of the first detected hand against a frame of resolution `res`.
    ///
    /// Returns an empty [`LandmarkSet`] if no hand was detected. Only the first hand is ever
    /// considered, even if the provider reported more.
    pub fn landmarks(&self, res: Resolution) -> LandmarkSet {
        match self.hands.first() {
            Some(hand) => {
                if self.hands.len() > 1 {
                    log::debug!(
                        "{} hands detected, only using the first one",
                        self.hands.len()
                    );
                }
                hand.to_landmark_set(res)
            }
            None => LandmarkSet::empty(),
        }
    }

    /// Draws the skeletons of all detected hands onto `target`.
    pub fn draw(&self, target: &mut Image) {
        for hand in &self.hands {
            hand.draw(target);
        }
    }
}

/// A [`LandmarkProvider`] backed by a MediaPipe-style hand landmark network.
///
/// The network is run on the whole frame, letterboxed to the network's input aspect ratio. It
/// must have one NCHW input and produce at least these outputs, in order:
///
/// 1. `[1, 63]` screen landmarks (x, y, z for each of the 21 landmarks, in input pixels).
/// 2. `[1, 1]` hand presence, in range 0.0 to 1.0.
/// 3. `[1, 1]` handedness (optional; values above 0.5 mean a right hand).
pub struct HandLandmarker {
    cnn: Cnn,
    presence_threshold: f32,
    max_hands: usize,
    t_infer: Timer,
    t_extract: Timer,
}

impl HandLandmarker {
    pub const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;

    /// Loads the landmark network from an `.onnx` file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let nn = NeuralNetwork::from_path(path)?;
        let cnn = Cnn::new(nn, ColorMapper::linear(0.0..=1.0))?;
        log::debug!(
            "loaded hand landmark network '{}' with input resolution {}",
            path.display(),
            cnn.input_resolution(),
        );
        Self::new(cnn)
    }

    pub fn new(cnn: Cnn) -> anyhow::Result<Self> {
        if cnn.num_outputs() < 2 {
            anyhow::bail!(
                "hand landmark network needs at least 2 outputs (landmarks, presence), this one has {}",
                cnn.num_outputs()
            );
        }
        if cnn.input_resolution().aspect_ratio().is_none() {
            anyhow::bail!(
                "hand landmark network has an empty input resolution {}",
                cnn.input_resolution()
            );
        }

        Ok(Self {
            cnn,
            presence_threshold: Self::DEFAULT_PRESENCE_THRESHOLD,
            max_hands: 1,
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        })
    }

    /// Sets the presence confidence below which a hand is considered absent.
    ///
    /// By default, [`HandLandmarker::DEFAULT_PRESENCE_THRESHOLD`] is used.
    pub fn set_presence_threshold(&mut self, threshold: f32) {
        self.presence_threshold = threshold;
    }

    /// Sets the maximum number of hands to report per frame.
    pub fn set_max_hands(&mut self, max_hands: usize) {
        self.max_hands = max_hands;
    }
}

impl LandmarkProvider for HandLandmarker {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Detection> {
        let input_ratio = self
            .cnn
            .input_resolution()
            .aspect_ratio()
            .unwrap_or(AspectRatio::SQUARE);
        let letterbox = image.resolution().letterbox(input_ratio);

        let outputs = self.t_infer.time(|| self.cnn.estimate(image, letterbox))?;
        let hand = {
            let _guard = self.t_extract.start();
            extract_hand(
                &outputs,
                self.presence_threshold,
                self.cnn.input_resolution(),
                letterbox,
                image.resolution(),
            )?
        };

        Ok(Detection::new(
            image.resolution(),
            limit_hands(hand, self.max_hands),
        ))
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_infer, &self.t_extract]
    }
}

fn limit_hands(
    hands: impl IntoIterator<Item = NormalizedHand>,
    max_hands: usize,
) -> Vec<NormalizedHand> {
    hands.into_iter().take(max_hands).collect()
}

fn extract_hand(
    outputs: &Outputs,
    presence_threshold: f32,
    input: Resolution,
    letterbox: Rect,
    frame: Resolution,
) -> anyhow::Result<Option<NormalizedHand>> {
    let screen = outputs[0].as_slice::<f32>()?;
    let presence = single(outputs[1].as_slice::<f32>()?)?;
    let handedness = match outputs.len() {
        n if n > 2 => Some(single(outputs[2].as_slice::<f32>()?)?),
        _ => None,
    };

    if presence < presence_threshold {
        log::trace!(
            "hand presence {} below threshold {}",
            presence,
            presence_threshold
        );
        return Ok(None);
    }

    decode_hand(screen, presence, handedness, letterbox, input, frame).map(Some)
}

fn single(data: &[f32]) -> anyhow::Result<f32> {
    match data {
        [value] => Ok(*value),
        _ => anyhow::bail!("expected a single value, got {} values", data.len()),
    }
}

/// Converts raw screen landmarks in network input coordinates into a hand normalized to `frame`.
fn decode_hand(
    screen: &[f32],
    presence: f32,
    handedness: Option<f32>,
    letterbox: Rect,
    input: Resolution,
    frame: Resolution,
) -> anyhow::Result<NormalizedHand> {
    if screen.len() != NUM_LANDMARKS * 3 {
        anyhow::bail!(
            "expected {} screen landmark values, got {}",
            NUM_LANDMARKS * 3,
            screen.len()
        );
    }

    let mut positions = [[0.0; 2]; NUM_LANDMARKS];
    for (out, xyz) in positions.iter_mut().zip(screen.chunks_exact(3)) {
        let u = xyz[0] / input.width() as f32;
        let v = xyz[1] / input.height() as f32;
        let [x, y] = letterbox.denormalize(u, v);
        *out = [x / frame.width() as f32, y / frame.height() as f32];
    }

    let handedness = match handedness {
        Some(raw) if raw > 0.5 => Handedness::Right,
        _ => Handedness::Left,
    };
    Ok(NormalizedHand::new(positions, presence, handedness))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use tract_onnx::prelude::Tensor;

    use super::*;
    use crate::hand::landmark::LandmarkIdx;

    fn hand_at(x: f32, y: f32) -> NormalizedHand {
        NormalizedHand::new([[x, y]; NUM_LANDMARKS], 1.0, Handedness::Left)
    }

    #[test]
    fn empty_detection_has_no_landmarks() {
        let det = Detection::none(Resolution::new(640, 480));
        assert!(det.is_empty());
        assert!(det.landmarks(det.resolution()).is_empty());
    }

    #[test]
    fn only_first_hand_is_used() {
        let res = Resolution::new(100, 100);
        let det = Detection::new(res, vec![hand_at(0.1, 0.2), hand_at(0.9, 0.9)]);
        assert_eq!(det.hands().len(), 2);

        let set = det.landmarks(res);
        assert_eq!(set.len(), NUM_LANDMARKS);
        assert!(set.iter().all(|lm| lm.position() == [10, 20]));
    }

    #[test]
    fn landmarks_use_requested_resolution() {
        let det = Detection::new(Resolution::new(100, 100), vec![hand_at(0.5, 0.25)]);
        let set = det.landmarks(Resolution::new(640, 480));
        let tip = set.get(LandmarkIdx::ThumbTip).unwrap();
        assert_eq!(tip.position(), [320, 120]);
    }

    #[test]
    fn decode_undoes_letterbox() {
        let frame = Resolution::new(640, 480);
        let input = Resolution::new(224, 224);
        let letterbox = frame.letterbox(AspectRatio::SQUARE);

        // Network center maps to the frame center, the network's top edge to the top black bar.
        let mut screen = vec![0.0; NUM_LANDMARKS * 3];
        screen[0] = 112.0;
        screen[1] = 112.0;
        screen[3] = 0.0;
        screen[4] = 0.0;
        screen[6] = 224.0;
        screen[7] = 224.0;

        let hand = decode_hand(&screen, 0.9, Some(0.8), letterbox, input, frame).unwrap();
        assert_eq!(hand.handedness(), Handedness::Right);
        assert_abs_diff_eq!(hand.presence(), 0.9);

        let [x, y] = hand.position(LandmarkIdx::Wrist);
        assert_abs_diff_eq!(x, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 0.5, epsilon = 1e-6);

        let [x, y] = hand.position(LandmarkIdx::ThumbCmc);
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, -80.0 / 480.0, epsilon = 1e-6);

        let [x, y] = hand.position(LandmarkIdx::ThumbMcp);
        assert_abs_diff_eq!(x, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 560.0 / 480.0, epsilon = 1e-6);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let frame = Resolution::new(10, 10);
        let err = decode_hand(
            &[0.0; 60],
            1.0,
            None,
            frame.letterbox(AspectRatio::SQUARE),
            frame,
            frame,
        )
        .unwrap_err();
        assert!(err.to_string().contains("63"));
    }

    #[test]
    fn missing_handedness_defaults_to_left() {
        let frame = Resolution::new(10, 10);
        let hand = decode_hand(
            &[0.0; 63],
            1.0,
            None,
            frame.letterbox(AspectRatio::SQUARE),
            frame,
            frame,
        )
        .unwrap();
        assert_eq!(hand.handedness(), Handedness::Left);
    }

    const INPUT: Resolution = Resolution::new(224, 224);

    fn outputs(presence: f32, handedness: Option<f32>) -> Outputs {
        let screen = Tensor::from_shape(&[1, NUM_LANDMARKS * 3], &[112.0f32; NUM_LANDMARKS * 3])
            .unwrap();
        let presence = Tensor::from_shape(&[1, 1], &[presence]).unwrap();
        let handedness = handedness.map(|h| Tensor::from_shape(&[1, 1], &[h]).unwrap());
        Outputs::from_tensors([screen, presence].into_iter().chain(handedness))
    }

    fn extract(outputs: &Outputs, threshold: f32) -> Option<NormalizedHand> {
        let frame = Resolution::new(640, 480);
        extract_hand(
            outputs,
            threshold,
            INPUT,
            frame.letterbox(AspectRatio::SQUARE),
            frame,
        )
        .unwrap()
    }

    #[test]
    fn presence_threshold_is_inclusive() {
        assert_eq!(extract(&outputs(0.49, None), 0.5), None);

        let hand = extract(&outputs(0.5, None), 0.5).unwrap();
        assert_abs_diff_eq!(hand.presence(), 0.5);

        let hand = extract(&outputs(0.8, None), 0.5).unwrap();
        assert_abs_diff_eq!(hand.presence(), 0.8);
        let [x, y] = hand.position(LandmarkIdx::IndexFingerTip);
        assert_abs_diff_eq!(x, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 0.5, epsilon = 1e-6);

        assert!(extract(&outputs(0.8, None), 0.9).is_none());
    }

    #[test]
    fn handedness_output_is_optional() {
        let hand = extract(&outputs(1.0, None), 0.5).unwrap();
        assert_eq!(hand.handedness(), Handedness::Left);

        let hand = extract(&outputs(1.0, Some(0.9)), 0.5).unwrap();
        assert_eq!(hand.handedness(), Handedness::Right);

        let hand = extract(&outputs(1.0, Some(0.5)), 0.5).unwrap();
        assert_eq!(hand.handedness(), Handedness::Left);

        assert_eq!(extract(&outputs(0.2, Some(0.9)), 0.5), None);
    }

    #[test]
    fn extract_rejects_malformed_presence() {
        let screen = Tensor::from_shape(&[1, NUM_LANDMARKS * 3], &[0.0f32; NUM_LANDMARKS * 3])
            .unwrap();
        let presence = Tensor::from_shape(&[1, 2], &[1.0f32, 1.0]).unwrap();
        let outputs = Outputs::from_tensors([screen, presence]);
        let frame = Resolution::new(10, 10);
        assert!(extract_hand(
            &outputs,
            0.5,
            INPUT,
            frame.letterbox(AspectRatio::SQUARE),
            frame
        )
        .is_err());
    }

    #[test]
    fn max_hands_limits_reported_hands() {
        let hand = || hand_at(0.5, 0.5);
        assert!(limit_hands(Some(hand()), 0).is_empty());
        assert_eq!(limit_hands(Some(hand()), 1).len(), 1);
        assert_eq!(limit_hands(None, 1).len(), 0);
        assert_eq!(limit_hands([hand(), hand(), hand()], 1).len(), 1);
        assert_eq!(limit_hands([hand(), hand()], 5).len(), 2);
    }

    #[test]
    fn single_value() {
        assert_eq!(single(&[0.25]).unwrap(), 0.25);
        assert!(single(&[]).is_err());
        assert!(single(&[0.1, 0.2]).is_err());
    }
}
