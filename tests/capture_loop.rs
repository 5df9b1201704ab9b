use std::{collections::VecDeque, io};

use airdraw::capture::{
    CaptureLoop, CaptureOptions, DisplayError, FrameSink, QuitReason, RunError,
};
use airdraw::hand::alignment::{AlignmentError, DrawingMode, Finger};
use airdraw::hand::detection::{Detection, LandmarkProvider};
use airdraw::hand::landmark::{Handedness, LandmarkIdx, NormalizedHand, NUM_LANDMARKS};
use airdraw::image::Image;
use airdraw::webcam::{CaptureError, FrameSource};
use approx::assert_abs_diff_eq;

/// Power of two, so that the pixel positions below survive normalization exactly.
const SIZE: u32 = 256;

struct FakeCamera {
    frames_left: usize,
    reads: usize,
}

impl FakeCamera {
    fn new(frames: usize) -> Self {
        Self {
            frames_left: frames,
            reads: 0,
        }
    }
}

impl FrameSource for FakeCamera {
    fn read(&mut self) -> Result<Image, CaptureError> {
        if self.frames_left == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "camera unplugged").into());
        }
        self.frames_left -= 1;
        self.reads += 1;
        Ok(Image::new(SIZE, SIZE))
    }
}

/// Replays scripted detection results, then reports no hands.
#[derive(Default)]
struct ScriptedProvider {
    script: VecDeque<anyhow::Result<Vec<NormalizedHand>>>,
}

impl ScriptedProvider {
    fn with(results: impl IntoIterator<Item = anyhow::Result<Vec<NormalizedHand>>>) -> Self {
        Self {
            script: results.into_iter().collect(),
        }
    }
}

impl LandmarkProvider for ScriptedProvider {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Detection> {
        let hands = self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))?;
        Ok(Detection::new(image.resolution(), hands))
    }
}

#[derive(Clone, Copy)]
enum Failure {
    Never,
    /// The window cannot be created.
    Open,
    /// Every other frame fails to show.
    EveryOtherFrame,
}

struct FakeWindow {
    shown: Vec<Image>,
    attempts: usize,
    quit_after: Option<(usize, QuitReason)>,
    failure: Failure,
}

impl FakeWindow {
    fn new() -> Self {
        Self {
            shown: Vec::new(),
            attempts: 0,
            quit_after: None,
            failure: Failure::Never,
        }
    }

    fn quit_after(frames: usize, reason: QuitReason) -> Self {
        Self {
            quit_after: Some((frames, reason)),
            ..Self::new()
        }
    }

    fn failing(failure: Failure) -> Self {
        Self {
            failure,
            ..Self::new()
        }
    }
}

impl FrameSink for FakeWindow {
    fn show(&mut self, image: &Image) -> Result<(), DisplayError> {
        self.attempts += 1;
        match self.failure {
            Failure::Open => {
                return Err(DisplayError::Unavailable("no display server".into()));
            }
            Failure::EveryOtherFrame if self.attempts % 2 == 0 => {
                return Err(DisplayError::Frame("surface lost".into()));
            }
            _ => {}
        }
        self.shown.push(image.clone());
        Ok(())
    }

    fn poll_quit(&mut self) -> Option<QuitReason> {
        match self.quit_after {
            Some((frames, reason)) if self.shown.len() >= frames => Some(reason),
            _ => None,
        }
    }
}

/// A hand whose listed landmarks are at the given pixel positions; all others sit at the origin.
fn hand(pixels: &[(LandmarkIdx, [i32; 2])]) -> NormalizedHand {
    let mut positions = [[0.0; 2]; NUM_LANDMARKS];
    for &(idx, [x, y]) in pixels {
        positions[idx.index()] = [x as f32 / SIZE as f32, y as f32 / SIZE as f32];
    }
    NormalizedHand::new(positions, 1.0, Handedness::Right)
}

fn fingers_together() -> NormalizedHand {
    hand(&[
        (LandmarkIdx::ThumbTip, [60, 140]),
        (LandmarkIdx::IndexFingerPip, [100, 100]),
        (LandmarkIdx::IndexFingerTip, [100, 80]),
        (LandmarkIdx::MiddleFingerPip, [120, 100]),
        (LandmarkIdx::MiddleFingerTip, [120, 80]),
    ])
}

fn is_blank(image: &Image) -> bool {
    image.data().iter().all(|&b| b == 0)
}

#[test]
fn stops_on_quit_key() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(100),
        ScriptedProvider::default(),
        FakeWindow::quit_after(3, QuitReason::QuitKey),
    );
    assert_eq!(capture.run().unwrap(), QuitReason::QuitKey);
    assert_eq!(capture.source().reads, 3);
    assert_eq!(capture.sink().shown.len(), 3);
}

#[test]
fn stops_on_window_close() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(100),
        ScriptedProvider::default(),
        FakeWindow::quit_after(1, QuitReason::WindowClosed),
    );
    assert_eq!(capture.run().unwrap(), QuitReason::WindowClosed);
    assert_eq!(capture.source().reads, 1);
}

#[test]
fn camera_failure_ends_loop() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(2),
        ScriptedProvider::default(),
        FakeWindow::new(),
    );
    let err = capture.run().unwrap_err();
    assert!(
        matches!(err, RunError::Capture(CaptureError::Stream(_))),
        "{:?}",
        err
    );
    assert_eq!(capture.sink().shown.len(), 2);
}

#[test]
fn unavailable_display_ends_loop() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(100),
        ScriptedProvider::default(),
        FakeWindow::failing(Failure::Open),
    );
    let err = capture.run().unwrap_err();
    assert!(
        matches!(err, RunError::Display(DisplayError::Unavailable(_))),
        "{:?}",
        err
    );
    assert_eq!(capture.source().reads, 1);
    assert_eq!(capture.sink().attempts, 1);
}

#[test]
fn frame_display_error_is_frame_local() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(5),
        ScriptedProvider::default(),
        FakeWindow::failing(Failure::EveryOtherFrame),
    );
    let err = capture.run().unwrap_err();
    assert!(matches!(err, RunError::Capture(_)), "{:?}", err);
    assert_eq!(capture.sink().attempts, 5);
    assert_eq!(capture.sink().shown.len(), 3);
}

#[test]
fn no_report_without_hand() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(1),
        ScriptedProvider::default(),
        FakeWindow::new(),
    );
    assert_eq!(capture.step().unwrap(), None);
    assert_eq!(capture.sink().shown.len(), 1);
}

#[test]
fn reports_aligned_fingers() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(1),
        ScriptedProvider::with([Ok(vec![fingers_together()])]),
        FakeWindow::new(),
    );

    let report = capture.step().unwrap().expect("hand should produce a report");
    assert_abs_diff_eq!(report.score.unwrap().value(), 1.0, epsilon = 1e-6);
    assert_eq!(report.mode, Some(DrawingMode::Drawing));

    let tip = report.thumb_tip.unwrap();
    assert_eq!(tip.id(), LandmarkIdx::ThumbTip);
    assert_eq!(tip.position(), [60, 140]);
    assert_eq!(
        report.to_string(),
        "score=1.000 thumb_tip=(60, 140) mode=drawing"
    );
}

/// Index points up, middle finger points up and to the right at 45 degrees.
fn fingers_spread() -> NormalizedHand {
    hand(&[
        (LandmarkIdx::IndexFingerPip, [100, 100]),
        (LandmarkIdx::IndexFingerTip, [100, 80]),
        (LandmarkIdx::MiddleFingerPip, [120, 100]),
        (LandmarkIdx::MiddleFingerTip, [140, 80]),
    ])
}

#[test]
fn drawing_threshold_is_configurable() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(1),
        ScriptedProvider::with([Ok(vec![fingers_spread()])]),
        FakeWindow::new(),
    )
    .with_options(CaptureOptions {
        drawing_threshold: 0.5,
        draw: false,
    });
    let report = capture.step().unwrap().unwrap();
    assert_abs_diff_eq!(
        report.score.unwrap().value(),
        std::f32::consts::FRAC_1_SQRT_2,
        epsilon = 1e-6
    );
    assert_eq!(report.mode, Some(DrawingMode::Drawing));

    let mut capture = CaptureLoop::new(
        FakeCamera::new(1),
        ScriptedProvider::with([Ok(vec![fingers_spread()])]),
        FakeWindow::new(),
    );
    let report = capture.step().unwrap().unwrap();
    assert_eq!(report.mode, Some(DrawingMode::Idle));
}

#[test]
fn indeterminate_angle_keeps_running() {
    let degenerate = hand(&[
        (LandmarkIdx::IndexFingerPip, [100, 100]),
        (LandmarkIdx::IndexFingerTip, [100, 100]),
        (LandmarkIdx::MiddleFingerPip, [120, 100]),
        (LandmarkIdx::MiddleFingerTip, [120, 80]),
    ]);
    let mut capture = CaptureLoop::new(
        FakeCamera::new(100),
        ScriptedProvider::with([Ok(vec![degenerate]), Ok(vec![fingers_together()])]),
        FakeWindow::quit_after(2, QuitReason::QuitKey),
    );

    let report = capture.step().unwrap().unwrap();
    assert_eq!(
        report.score,
        Err(AlignmentError::IndeterminateAngle(Finger::Index))
    );
    assert_eq!(report.mode, None);

    assert_eq!(capture.run().unwrap(), QuitReason::QuitKey);
    assert_eq!(capture.source().reads, 2);
}

#[test]
fn provider_error_is_frame_local() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(2),
        ScriptedProvider::with([
            Err(anyhow::anyhow!("inference failed")),
            Ok(vec![fingers_together()]),
        ]),
        FakeWindow::new(),
    );

    assert_eq!(capture.step().unwrap(), None);
    assert_eq!(capture.sink().shown.len(), 1);
    assert!(capture.step().unwrap().is_some());
}

#[test]
fn annotation_can_be_disabled() {
    let mut capture = CaptureLoop::new(
        FakeCamera::new(1),
        ScriptedProvider::with([Ok(vec![fingers_together()])]),
        FakeWindow::new(),
    )
    .with_options(CaptureOptions {
        draw: false,
        ..CaptureOptions::default()
    });
    capture.step().unwrap();
    assert!(is_blank(&capture.sink().shown[0]));

    let mut capture = CaptureLoop::new(
        FakeCamera::new(1),
        ScriptedProvider::with([Ok(vec![fingers_together()])]),
        FakeWindow::new(),
    );
    capture.step().unwrap();
    assert!(!is_blank(&capture.sink().shown[0]));
}

#[test]
fn only_first_hand_is_classified() {
    let crossed = hand(&[
        (LandmarkIdx::IndexFingerPip, [100, 100]),
        (LandmarkIdx::IndexFingerTip, [100, 80]),
        (LandmarkIdx::MiddleFingerPip, [120, 100]),
        (LandmarkIdx::MiddleFingerTip, [140, 100]),
    ]);
    let mut capture = CaptureLoop::new(
        FakeCamera::new(1),
        ScriptedProvider::with([Ok(vec![crossed, fingers_together()])]),
        FakeWindow::new(),
    );
    let report = capture.step().unwrap().unwrap();
    assert_abs_diff_eq!(report.score.unwrap().value(), 0.0, epsilon = 1e-6);
    assert_eq!(report.mode, Some(DrawingMode::Idle));
}
