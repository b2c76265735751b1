use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous frame tick, in seconds.
    pub dt: f32,

    /// Running time since the clock was created, excluding stopped intervals.
    pub total: f64,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Frame clock producing `FrameTime` snapshots.
///
/// Delta time is clamped to avoid pathological values after debugger breaks or
/// stalls. While stopped, ticks report zero delta; time spent stopped is never
/// folded into `total` or into the first delta after `start`.
#[derive(Debug, Clone)]
pub struct FrameClock {
    base: Instant,
    last: Instant,
    stopped_at: Option<Instant>,
    paused_total: Duration,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    /// Creates a new running clock with default clamps.
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    /// Creates a running clock with custom delta-time clamps.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        let now = Instant::now();
        Self {
            base: now,
            last: now,
            stopped_at: None,
            paused_total: Duration::ZERO,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Resets the baseline and the accumulated totals. The clock keeps running.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.base = now;
        self.last = now;
        self.stopped_at = None;
        self.paused_total = Duration::ZERO;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Stops the clock. Repeated calls keep the first stop instant.
    pub fn stop(&mut self) {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
        }
    }

    /// Resumes a stopped clock. No-op when running.
    pub fn start(&mut self) {
        if let Some(stopped_at) = self.stopped_at.take() {
            let now = Instant::now();
            self.paused_total += now.saturating_duration_since(stopped_at);
            self.last = now;
        }
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = if self.stopped_at.is_some() {
            0.0
        } else {
            let raw = now.saturating_duration_since(self.last);
            self.last = now;
            raw.clamp(self.dt_min, self.dt_max).as_secs_f32()
        };

        let reference = self.stopped_at.unwrap_or(now);
        let total = reference
            .saturating_duration_since(self.base)
            .saturating_sub(self.paused_total)
            .as_secs_f64();

        let ft = FrameTime {
            dt,
            total,
            now,
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_clamped_to_the_maximum() {
        let mut clock = FrameClock::new();
        let later = clock.last + Duration::from_secs(5);
        let ft = clock.tick_at(later);
        assert_eq!(ft.dt, 0.25);
    }

    #[test]
    fn delta_is_clamped_to_the_minimum() {
        let mut clock = FrameClock::new();
        let same = clock.last;
        let ft = clock.tick_at(same);
        assert!(ft.dt > 0.0);
    }

    #[test]
    fn stopped_clock_reports_zero_delta() {
        let mut clock = FrameClock::new();
        clock.stop();
        assert!(clock.is_stopped());
        let ft = clock.tick_at(Instant::now() + Duration::from_millis(100));
        assert_eq!(ft.dt, 0.0);
    }

    #[test]
    fn start_discards_the_stopped_gap() {
        let mut clock = FrameClock::new();
        clock.stop();
        std::thread::sleep(Duration::from_millis(30));
        clock.start();
        assert!(!clock.is_stopped());

        let ft = clock.tick_at(clock.last + Duration::from_millis(1));
        assert!((ft.dt - 0.001).abs() < 1e-6);
        // Total time never includes the 30ms spent stopped.
        assert!(ft.total < 0.03);
    }

    #[test]
    fn frame_index_increments_per_tick() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick().frame_index, 0);
        assert_eq!(clock.tick().frame_index, 1);
        clock.stop();
        assert_eq!(clock.tick().frame_index, 2);
    }
}
