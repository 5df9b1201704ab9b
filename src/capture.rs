//! The frame loop tying camera, hand detection, classification and display together.

use std::fmt;

use thiserror::Error;

use crate::hand::alignment::{
    alignment_score, AlignmentError, AlignmentScore, DrawingMode, DEFAULT_DRAWING_THRESHOLD,
};
use crate::hand::detection::{Detection, LandmarkProvider};
use crate::hand::landmark::LandmarkIdx;
use crate::image::{draw, Color, Image};
use crate::landmark::Landmark;
use crate::timer::FpsCounter;
use crate::webcam::{CaptureError, FrameSource};

/// Why a [`CaptureLoop`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReason {
    QuitKey,
    WindowClosed,
}

impl fmt::Display for QuitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QuitReason::QuitKey => "quit key pressed",
            QuitReason::WindowClosed => "window closed",
        })
    }
}

/// Error returned by [`FrameSink::show`].
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The display cannot show anything, now or later. Stops the [`CaptureLoop`].
    #[error("display unavailable")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Only the current frame could not be shown.
    #[error("failed to show frame")]
    Frame(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Why [`CaptureLoop::run`] failed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Display(#[from] DisplayError),
}

/// Destination for processed frames.
pub trait FrameSink {
    /// Displays `image`.
    fn show(&mut self, image: &Image) -> Result<(), DisplayError>;

    /// Returns whether the user asked to quit. Once this returns `Some`, it keeps doing so.
    fn poll_quit(&mut self) -> Option<QuitReason>;
}

/// Classification result for a frame that contained a hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Alignment score, or why none could be computed.
    pub score: Result<AlignmentScore, AlignmentError>,
    /// Pixel position of the thumb tip, if the landmark set contains it.
    pub thumb_tip: Option<Landmark>,
    /// Drawing mode derived from the score; `None` if the score is indeterminate.
    pub mode: Option<DrawingMode>,
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.score {
            Ok(score) => write!(f, "score={}", score)?,
            Err(_) => f.write_str("score=indeterminate")?,
        }
        match &self.thumb_tip {
            Some(tip) => write!(f, " thumb_tip=({}, {})", tip.x(), tip.y())?,
            None => f.write_str(" thumb_tip=-")?,
        }
        match &self.mode {
            Some(mode) => write!(f, " mode={}", mode),
            None => f.write_str(" mode=-"),
        }
    }
}

/// Behavior of a [`CaptureLoop`].
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    /// Alignment score at or above which the hand is in drawing mode.
    pub drawing_threshold: f32,
    /// Whether to draw the hand skeleton and the score onto displayed frames.
    pub draw: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            drawing_threshold: DEFAULT_DRAWING_THRESHOLD,
            draw: true,
        }
    }
}

/// Runs frames from a [`FrameSource`] through a [`LandmarkProvider`] and shows them in a
/// [`FrameSink`].
///
/// The loop owns all three; they are released when the loop is dropped.
pub struct CaptureLoop<S, P, D> {
    source: S,
    provider: P,
    sink: D,
    options: CaptureOptions,
    fps: FpsCounter,
}

impl<S: FrameSource, P: LandmarkProvider, D: FrameSink> CaptureLoop<S, P, D> {
    pub fn new(source: S, provider: P, sink: D) -> Self {
        Self {
            source,
            provider,
            sink,
            options: CaptureOptions::default(),
            fps: FpsCounter::new("capture"),
        }
    }

    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Processes frames until the user quits.
    ///
    /// Camera failures and an unavailable display end the loop with an error. Everything else only
    /// affects the current frame.
    pub fn run(&mut self) -> Result<QuitReason, RunError> {
        loop {
            self.step()?;

            if let Some(reason) = self.sink.poll_quit() {
                log::info!("stopping: {}", reason);
                return Ok(reason);
            }
        }
    }

    /// Reads, processes and displays a single frame.
    pub fn step(&mut self) -> Result<Option<FrameReport>, RunError> {
        let mut image = self.source.read()?;
        let report = self.process_frame(&mut image);

        match self.sink.show(&image) {
            Ok(()) => {}
            Err(DisplayError::Frame(e)) => log::error!("failed to display frame: {}", e),
            Err(e) => return Err(e.into()),
        }

        self.fps.tick_with(
            self.source
                .timers()
                .into_iter()
                .chain(self.provider.timers()),
        );
        Ok(report)
    }

    /// Detects and classifies the hand in `image`, and annotates `image` if enabled.
    ///
    /// Returns `None` if there is no hand in the frame.
    pub fn process_frame(&mut self, image: &mut Image) -> Option<FrameReport> {
        let detection = match self.provider.detect(image) {
            Ok(detection) => detection,
            Err(e) => {
                log::error!("hand detection failed: {:#}", e);
                Detection::none(image.resolution())
            }
        };

        let landmarks = detection.landmarks(image.resolution());
        let report = if landmarks.is_empty() {
            None
        } else {
            let score = alignment_score(&landmarks);
            let report = FrameReport {
                score,
                thumb_tip: landmarks.get(LandmarkIdx::ThumbTip).copied(),
                mode: score
                    .ok()
                    .map(|score| DrawingMode::classify(score, self.options.drawing_threshold)),
            };
            match &score {
                Ok(_) => log::info!("{}", report),
                Err(e) => log::warn!("{} ({})", report, e),
            }
            Some(report)
        };

        if self.options.draw {
            detection.draw(image);
            let status = match &report {
                Some(report) => match (&report.score, &report.mode) {
                    (Ok(score), Some(mode)) => format!("score: {} ({})", score, mode),
                    _ => "score: indeterminate".to_string(),
                },
                None => "no hand".to_string(),
            };
            draw::text(image, 4, 4, &status)
                .align_top()
                .align_left()
                .color(Color::YELLOW);
        }

        report
    }
}
