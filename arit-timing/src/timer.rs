use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock plus a rolling record of frame intervals
pub trait Timer: Clone + Send + Sync {
    /// Nanoseconds since the timer was created.
    fn now(&self) -> u64;
    fn elapsed(&self, since: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(since))
    }
    fn sleep(&self, d: Duration);
    fn record_frame(&mut self, d: Duration);
    fn frame_count(&self) -> usize;
    fn clear_frames(&mut self);
    fn calibration_stats(&self) -> CalibrationStats;
}

/// Seconds between two nanosecond timestamps, negative if `to` precedes `from`.
pub fn seconds_between(from: u64, to: u64) -> f64 {
    (to as f64 - from as f64) / 1e9
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStats {
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

impl CalibrationStats {
    pub fn from_frames(frames: &[Duration]) -> Self {
        if frames.is_empty() {
            return Self::default();
        }
        let times: Vec<f64> = frames.iter().map(|d| d.as_nanos() as f64).collect();
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub frame_times: Vec<Duration>,
    pub max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_frame(&mut self, d: Duration) {
        push_frame(&mut self.frame_times, self.max_samples, d);
    }
    fn frame_count(&self) -> usize {
        self.frame_times.len()
    }
    fn clear_frames(&mut self) {
        self.frame_times.clear();
    }
    fn calibration_stats(&self) -> CalibrationStats {
        CalibrationStats::from_frames(&self.frame_times)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: Vec::with_capacity(1000),
            max_samples: 1000,
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        self.spin_sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    // OS sleep for all but the last millisecond, then spin.
    #[cfg(not(target_os = "linux"))]
    fn spin_sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        if let Some(coarse) = duration.checked_sub(Duration::from_millis(1)) {
            std::thread::sleep(coarse);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock that only moves when told to. `sleep` advances it instantly, so
/// whole sessions can be simulated without waiting.
#[derive(Debug, Clone)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    pub frame_times: Vec<Duration>,
    pub max_samples: usize,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(0)),
            frame_times: Vec::new(),
            max_samples: 1000,
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
    fn record_frame(&mut self, d: Duration) {
        push_frame(&mut self.frame_times, self.max_samples, d);
    }
    fn frame_count(&self) -> usize {
        self.frame_times.len()
    }
    fn clear_frames(&mut self) {
        self.frame_times.clear();
    }
    fn calibration_stats(&self) -> CalibrationStats {
        CalibrationStats::from_frames(&self.frame_times)
    }
}

fn push_frame(frames: &mut Vec<Duration>, max_samples: usize, d: Duration) {
    if frames.len() >= max_samples {
        frames.remove(0);
    }
    frames.push(d);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_clones_share_a_clock() {
        let timer = ManualTimer::new();
        let view = timer.clone();
        timer.sleep(Duration::from_millis(250));
        assert_eq!(view.now(), 250_000_000);
        assert_eq!(view.elapsed(50_000_000), Duration::from_millis(200));
    }

    #[test]
    fn frame_window_is_bounded() {
        let mut timer = ManualTimer::new();
        timer.max_samples = 3;
        for ms in [10, 20, 30, 40] {
            timer.record_frame(Duration::from_millis(ms));
        }
        assert_eq!(timer.frame_count(), 3);
        assert_eq!(timer.frame_times[0], Duration::from_millis(20));
    }

    #[test]
    fn calibration_stats_summarise_frames() {
        let frames = [Duration::from_millis(10), Duration::from_millis(20)];
        let stats = CalibrationStats::from_frames(&frames);
        assert!((stats.average_frame_time_ns - 15e6).abs() < 1.0);
        assert!((stats.jitter_ns - 5e6).abs() < 1.0);
        assert_eq!(stats.min_frame_time_ns, 10e6);
        assert_eq!(stats.max_frame_time_ns, 20e6);
        assert!((stats.effective_fps - 1e9 / 15e6).abs() < 1e-9);
        assert_eq!(CalibrationStats::from_frames(&[]), CalibrationStats::default());
    }

    #[test]
    fn seconds_between_is_signed() {
        assert!((seconds_between(0, 1_500_000_000) - 1.5).abs() < 1e-12);
        assert!(seconds_between(2_000, 1_000) < 0.0);
    }
}
