//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::io;

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};
use thiserror::Error;

use crate::image::{Image, Resolution};
use crate::timer::Timer;

/// Errors that make a camera unusable. These end the capture loop.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("camera stream failed: {0}")]
    Stream(#[from] io::Error),
}

/// A source of camera frames.
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    fn read(&mut self) -> Result<Image, CaptureError>;

    /// Returns profiling timers of this source.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the maximum resolution at the
/// desired frame rate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ParamPreference {
    #[default]
    Resolution,
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Options used when opening a [`Webcam`].
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Only opens the webcam whose card name is `name`.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the minimum desired resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver it.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the minimum desired frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver it.
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects which parameter is kept when the camera cannot deliver both the desired resolution
    /// and frame rate.
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }
}

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        1.0 / self.frame_interval.as_f32()
    }
}

fn negotiate_format(device: &Device, prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixel_format() == PixelFormat::JPEG || format.pixel_format() == PixelFormat::MJPG {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }
    let Some(pixel_format) = pixel_format else {
        bail!("no JPEG or MJPG pixel format supported");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    let Some(fmt) = select_format(&formats, prefs) else {
        bail!("failed to negotiate a webcam format");
    };
    let pixfmt = PixFormat::new(
        fmt.resolution.width(),
        fmt.resolution.height(),
        pixel_format,
    );
    Ok((pixfmt, fmt.frame_interval))
}

/// Picks the best format, dropping the less preferred constraint (and then the other one) until
/// some format matches.
fn select_format(formats: &[FrameFormat], mut prefs: FramePrefs) -> Option<FrameFormat> {
    loop {
        if let Some(fmt) = select_format_step(formats, prefs) {
            return Some(fmt);
        }

        log::debug!("no format matches {:?}", prefs);
        let relaxed = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
        };
        if !relaxed {
            return None;
        }
    }
}

fn select_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut eligible = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs
                .fps
                .map_or(true, |fps| fmt.fps().round() >= fps as f32)
        })
        .copied()
        .collect::<Vec<_>>();
    match prefs.pref {
        ParamPreference::Resolution => eligible.sort_by(|a, b| {
            let pixels = a.resolution.num_pixels().cmp(&b.resolution.num_pixels());
            pixels.then(a.fps().total_cmp(&b.fps()))
        }),
        ParamPreference::Framerate => eligible.sort_by(|a, b| {
            let pixels = a.resolution.num_pixels().cmp(&b.resolution.num_pixels());
            a.fps().total_cmp(&b.fps()).then(pixels)
        }),
    }
    eligible.last().copied()
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    name: String,
    stream: ReadStream,
    width: u32,
    height: u32,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam matching `options`.
    ///
    /// This can block for a few hundred milliseconds while the webcam initializes.
    pub fn open(options: WebcamOptions) -> Result<Self, CaptureError> {
        let devices = linuxvideo::list()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("cannot list devices: {e}")))?;
        for res in devices {
            match res {
                Ok(dev) => match Self::open_impl(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => log::debug!("{}", e),
                },
                Err(e) => log::warn!("{}", e),
            }
        }

        Err(CaptureError::DeviceUnavailable(match &options.name {
            Some(name) => format!("no supported webcam named '{name}' found"),
            None => "no supported webcam device found".into(),
        }))
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &options.name {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );
        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;
        let capture = dev.video_capture(pixfmt)?;
        let format = capture.format();
        let (width, height) = (format.width(), format.height());
        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {}x{} @ {:.1}Hz",
            caps.card(),
            path.display(),
            width,
            height,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream()?;
        Ok(Some(Self {
            name: caps.card().to_string(),
            stream,
            width,
            height,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Returns the negotiated frame resolution.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

impl FrameSource for Webcam {
    fn read(&mut self) -> Result<Image, CaptureError> {
        let dequeue_guard = self.t_dequeue.start();
        let image = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            let image = match self.t_decode.time(|| Image::decode_jpeg(&buf)) {
                Ok(image) => image,
                Err(e) => {
                    // USB transfers occasionally corrupt MJPG frames. A blank frame keeps the
                    // frame cadence, skipping it would double the latency.
                    log::error!("webcam decode error: {}", e);
                    Image::new(self.width, self.height)
                }
            };
            Ok(image)
        })?;
        Ok(image)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        log::debug!("releasing webcam {}", self.name);
    }
}
