//! Webcam hand tracking with an index/middle finger drawing gesture.
//!
//! Frames from a V4L2 webcam are run through a hand landmark network. The first detected hand's
//! index and middle finger directions are compared: when both fingers point the same way (their
//! [alignment score] is at or above a threshold), the hand is considered to be in drawing mode.
//!
//! # Coordinates
//!
//! Pixel coordinates have their origin in the top left corner of the frame, with X pointing right
//! and Y pointing *down*.
//!
//! # Environment Variables
//!
//! The `airdraw` binary is configured through these environment variables (see [`config`]):
//!
//! * `AIRDRAW_WEBCAM_NAME`: card name of the webcam to open. If unset, the first device that
//!   supports a compatible image format will be used.
//! * `AIRDRAW_HAND_MODEL`: path to the `.onnx` hand landmark network.
//! * `AIRDRAW_PRESENCE_THRESHOLD`: minimum hand presence confidence (default 0.5).
//! * `AIRDRAW_DRAWING_THRESHOLD`: minimum alignment score for drawing mode (default 0.9).
//! * `AIRDRAW_MAX_HANDS`: maximum number of hands reported per frame (default 1).
//! * `AIRDRAW_QUIT_KEY`: key that closes the application (default `q`).
//! * `AIRDRAW_DRAW`: whether to annotate the displayed frames (default on).
//! * `AIRDRAW_FPS`: desired webcam frame rate (default 30).
//!
//! Logging can be configured with `RUST_LOG`, as usual for [`env_logger`].
//!
//! [alignment score]: hand::alignment::alignment_score

use log::LevelFilter;

pub mod capture;
pub mod config;
pub mod gui;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod nn;
pub mod timer;
pub mod webcam;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and `airdraw` log at *debug* level, `wgpu` at *warn* level. `RUST_LOG`
/// overrides both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
