//! Runtime configuration from `AIRDRAW_*` environment variables.

use std::{env, path::PathBuf, str::FromStr};

use thiserror::Error;

use crate::capture::CaptureOptions;
use crate::hand::alignment::DEFAULT_DRAWING_THRESHOLD;
use crate::hand::detection::HandLandmarker;
use crate::webcam::WebcamOptions;

pub const ENV_WEBCAM_NAME: &str = "AIRDRAW_WEBCAM_NAME";
pub const ENV_HAND_MODEL: &str = "AIRDRAW_HAND_MODEL";
pub const ENV_PRESENCE_THRESHOLD: &str = "AIRDRAW_PRESENCE_THRESHOLD";
pub const ENV_DRAWING_THRESHOLD: &str = "AIRDRAW_DRAWING_THRESHOLD";
pub const ENV_MAX_HANDS: &str = "AIRDRAW_MAX_HANDS";
pub const ENV_QUIT_KEY: &str = "AIRDRAW_QUIT_KEY";
pub const ENV_DRAW: &str = "AIRDRAW_DRAW";
pub const ENV_FPS: &str = "AIRDRAW_FPS";

const DEFAULT_HAND_MODEL: &str = "3rdparty/onnx/hand_landmark_full.onnx";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{var}` is set to '{value}', which is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("`{var}` is not valid unicode")]
    NotUnicode { var: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Card name of the webcam to open; the first suitable one is used if unset.
    pub webcam_name: Option<String>,
    pub hand_model: PathBuf,
    pub presence_threshold: f32,
    pub drawing_threshold: f32,
    pub max_hands: usize,
    pub quit_key: char,
    pub draw: bool,
    pub fps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webcam_name: None,
            hand_model: PathBuf::from(DEFAULT_HAND_MODEL),
            presence_threshold: HandLandmarker::DEFAULT_PRESENCE_THRESHOLD,
            drawing_threshold: DEFAULT_DRAWING_THRESHOLD,
            max_hands: 1,
            quit_key: 'q',
            draw: true,
            fps: 30,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| match env::var(var) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { var }),
        })
    }

    /// Builds the configuration from `lookup`, which maps variable names to their values.
    ///
    /// Unset variables keep their default.
    pub fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&'static str) -> Result<Option<String>, ConfigError>,
    {
        let mut config = Config::default();

        if let Some(name) = lookup(ENV_WEBCAM_NAME)? {
            config.webcam_name = Some(name);
        }
        if let Some(path) = lookup(ENV_HAND_MODEL)? {
            config.hand_model = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_PRESENCE_THRESHOLD)? {
            config.presence_threshold = parse(ENV_PRESENCE_THRESHOLD, value, "number")?;
        }
        if let Some(value) = lookup(ENV_DRAWING_THRESHOLD)? {
            config.drawing_threshold = parse(ENV_DRAWING_THRESHOLD, value, "number")?;
        }
        if let Some(value) = lookup(ENV_MAX_HANDS)? {
            config.max_hands = parse(ENV_MAX_HANDS, value, "hand count")?;
        }
        if let Some(value) = lookup(ENV_QUIT_KEY)? {
            config.quit_key = parse(ENV_QUIT_KEY, value, "single character")?;
        }
        if let Some(value) = lookup(ENV_DRAW)? {
            config.draw = parse_flag(ENV_DRAW, value)?;
        }
        if let Some(value) = lookup(ENV_FPS)? {
            config.fps = parse(ENV_FPS, value, "frame rate")?;
        }

        log::debug!("{:?}", config);
        Ok(config)
    }

    pub fn webcam_options(&self) -> WebcamOptions {
        let options = WebcamOptions::default().fps(self.fps);
        match &self.webcam_name {
            Some(name) => options.name(name.clone()),
            None => options,
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            drawing_threshold: self.drawing_threshold,
            draw: self.draw,
        }
    }
}

fn parse<T: FromStr>(
    var: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(ConfigError::Invalid {
            var,
            value,
            expected,
        }),
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            expected: "flag (1/true/on or 0/false/off)",
        }),
    }
}
