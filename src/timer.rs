//! Frame timing and FPS logging.

use std::{
    cell::Cell,
    fmt,
    time::{Duration, Instant},
};

use itertools::Itertools;

/// Measures how long a recurring operation takes.
///
/// Every measurement is added to a running total. Displaying the timer with `{}` prints the
/// average since the last time it was displayed and starts a new measurement window.
pub struct Timer {
    name: &'static str,
    total: Cell<Duration>,
    count: Cell<u32>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total: Cell::new(Duration::ZERO),
            count: Cell::new(0),
        }
    }

    /// Invokes `timee`, recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation. The measurement ends when the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn record(&self, elapsed: Duration) {
        self.total.set(self.total.get() + elapsed);
        self.count.set(self.count.get() + 1);
    }

    /// Average duration of the operations recorded in the current window.
    pub fn average(&self) -> Option<Duration> {
        match self.count.get() {
            0 => None,
            n => Some(self.total.get() / n),
        }
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count.replace(0);
        let total = self.total.replace(Duration::ZERO);
        if count == 0 {
            return write!(f, "{}: -", self.name);
        }

        let avg_ms = total.as_secs_f32() * 1000.0 / count as f32;
        write!(f, "{}: {}x{:.01}ms", self.name, count, avg_ms)
    }
}

pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Counts processed frames and logs the frame rate about once per second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Counts a frame.
    pub fn tick(&mut self) {
        self.tick_with(std::iter::empty::<&Timer>());
    }

    /// Counts a frame, and includes `extra` in the log line when a second has passed.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.start.elapsed() < Duration::from_secs(1) {
            return;
        }

        let extra = extra.into_iter().join(", ");
        if extra.is_empty() {
            log::debug!("{}: {} FPS", self.name, self.frames);
        } else {
            log::debug!("{}: {} FPS ({})", self.name, self.frames, extra);
        }

        self.frames = 0;
        self.start = Instant::now();
    }

    /// Frames counted in the current one-second window.
    #[inline]
    pub fn frames(&self) -> u32 {
        self.frames
    }
}
