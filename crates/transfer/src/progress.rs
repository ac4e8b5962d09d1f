use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

const DEFAULT_WINDOW: Duration = Duration::from_secs(30);
const DEFAULT_MAX_SAMPLES: usize = 100;

/// Part-upload throughput over a sliding time window.
pub struct SpeedCalculator {
    window: Mutex<Window>,
}

struct Window {
    /// `(when, bytes)` pairs, oldest first.
    samples: VecDeque<(Instant, u64)>,
    span: Duration,
    capacity: usize,
}

impl Window {
    fn push(&mut self, at: Instant, bytes: u64) {
        self.samples.push_back((at, bytes));
        while let Some(&(oldest, _)) = self.samples.front() {
            let expired = at.checked_duration_since(oldest).is_some_and(|age| age > self.span);
            if !expired && self.samples.len() <= self.capacity {
                break;
            }
            self.samples.pop_front();
        }
    }

    fn rate(&self) -> f64 {
        let (Some(&(first, _)), Some(&(last, _))) = (self.samples.front(), self.samples.back())
        else {
            return 0.0;
        };
        let elapsed = last.duration_since(first).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        // Bytes of the oldest sample were sent before the window opened.
        let bytes: u64 = self.samples.iter().skip(1).map(|&(_, b)| b).sum();
        bytes as f64 / elapsed
    }
}

impl SpeedCalculator {
    /// `span` defaults to 30 s and `capacity` to 100 samples.
    pub fn new(span: Option<Duration>, capacity: Option<usize>) -> Self {
        Self {
            window: Mutex::new(Window {
                samples: VecDeque::new(),
                span: span.unwrap_or(DEFAULT_WINDOW),
                capacity: capacity.unwrap_or(DEFAULT_MAX_SAMPLES).max(2),
            }),
        }
    }

    /// Records a part of `bytes` accepted just now.
    pub fn add_sample(&self, bytes: u64) {
        self.add_sample_at(bytes, Instant::now());
    }

    fn add_sample_at(&self, bytes: u64, at: Instant) {
        self.window.lock().unwrap().push(at, bytes);
    }

    /// Average bytes/second within the window; 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        self.window.lock().unwrap().rate()
    }

    /// Time left for `remaining_bytes` at the current rate.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        (rate > 0.0).then(|| Duration::from_secs_f64(remaining_bytes as f64 / rate))
    }
}

/// Human-readable byte rate, e.g. `"3.2 MiB/s"`.
pub fn format_rate(bytes_per_second: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KiB/s", "MiB/s", "GiB/s"];
    let mut value = bytes_per_second;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
