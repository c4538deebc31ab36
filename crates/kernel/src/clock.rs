use std::time::{Duration, Instant};

/// A source of timestamps relative to some fixed origin.
pub trait TimeSource {
    fn now(&mut self) -> Duration;
}

impl<T: TimeSource + ?Sized> TimeSource for Box<T> {
    fn now(&mut self) -> Duration {
        (**self).now()
    }
}

/// Wall-clock time since construction.
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic source that advances by `step` on every query.
///
/// The first query returns zero, so a [`Clock`] built on it reports exactly
/// `step` as the delta of every tick.
#[derive(Debug, Clone)]
pub struct FixedStep {
    step: Duration,
    current: Duration,
}

impl FixedStep {
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            current: Duration::ZERO,
        }
    }

    pub fn hz(rate: f64) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / rate))
    }
}

impl TimeSource for FixedStep {
    fn now(&mut self) -> Duration {
        let t = self.current;
        self.current += self.step;
        t
    }
}

/// Timing of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Zero-based tick number.
    pub number: u64,
    /// Seconds since the previous tick (or since the clock started).
    pub delta: f32,
    /// Seconds since the clock started. Kept in `f64` so phase-driven
    /// animation stays precise over long sessions.
    pub elapsed: f64,
}

/// Frame clock producing delta and elapsed time per tick.
#[derive(Debug, Clone)]
pub struct Clock<S: TimeSource = MonotonicTime> {
    source: S,
    start: Duration,
    last: Duration,
    frames: u64,
}

impl Clock<MonotonicTime> {
    /// Clock over wall time, starting now.
    pub fn monotonic() -> Self {
        Self::new(MonotonicTime::new())
    }
}

impl<S: TimeSource> Clock<S> {
    pub fn new(mut source: S) -> Self {
        let start = source.now();
        Self {
            source,
            start,
            last: start,
            frames: 0,
        }
    }

    /// Advance to now. A source that steps backwards yields a zero delta.
    pub fn tick(&mut self) -> FrameTime {
        let now = self.source.now().max(self.last);
        let delta = now - self.last;
        self.last = now;

        let frame = FrameTime {
            number: self.frames,
            delta: delta.as_secs_f32(),
            elapsed: (now - self.start).as_secs_f64(),
        };
        self.frames += 1;
        frame
    }

    /// Seconds from start to the most recent tick.
    pub fn elapsed(&self) -> f64 {
        (self.last - self.start).as_secs_f64()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
