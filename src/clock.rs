use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_STEP_SIZE: Duration = Duration::from_secs(10);
pub const DEFAULT_SPEED: f64 = 1.0;

/// Simulated epoch: an absolute UTC second count plus the elapsed simulated
/// time since the clock origin `t0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimTime {
    pub epoch_seconds: f64,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Running,
    Paused,
}

/// Relationship between wall-clock time and permitted simulated-time
/// advancement. `speed == 0` disables pacing entirely (free-run).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingConfig {
    pub step_size: Duration,
    pub speed: f64,
}

impl PacingConfig {
    pub fn is_valid(&self) -> bool {
        self.step_size > Duration::ZERO && self.speed.is_finite() && self.speed >= 0.0
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            step_size: DEFAULT_STEP_SIZE,
            speed: DEFAULT_SPEED,
        }
    }
}

/// Owner of simulated time. All pacing-sensitive methods take the wall-clock
/// `now` as a parameter so behavior is reproducible under test.
#[derive(Debug)]
pub struct SimulationClock {
    t0_epoch_seconds: f64,
    elapsed: Duration,
    state: ClockState,
    pacing: PacingConfig,
    // Anchor stored as a (wall instant, sim elapsed) pair. Equivalent to the
    // virtual start time `now - elapsed / speed`, but immune to Instant
    // underflow when elapsed / speed exceeds process uptime.
    anchor: Option<(Instant, Duration)>,
    reset_pending: bool,
}

impl SimulationClock {
    pub fn new(t0_epoch_seconds: f64, pacing: PacingConfig) -> Self {
        assert!(pacing.is_valid(), "invalid pacing config: {pacing:?}");
        Self {
            t0_epoch_seconds,
            elapsed: Duration::ZERO,
            state: ClockState::Idle,
            pacing,
            anchor: None,
            reset_pending: false,
        }
    }

    pub fn current_time(&self) -> SimTime {
        SimTime {
            epoch_seconds: self.t0_epoch_seconds + self.elapsed.as_secs_f64(),
            elapsed_seconds: self.elapsed.as_secs_f64(),
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn pacing(&self) -> PacingConfig {
        self.pacing
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Transition to Running, optionally replacing the pacing config
    /// atomically with the transition. Re-anchors pacing so resuming never
    /// causes a simulated-time jump.
    pub fn start(&mut self, pacing: Option<PacingConfig>, now: Instant) {
        if let Some(p) = pacing {
            assert!(p.is_valid(), "invalid pacing config: {p:?}");
            self.pacing = p;
        }
        self.state = ClockState::Running;
        self.re_anchor(now);
    }

    pub fn pause(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
        }
    }

    /// Raise the pending-reset flag. The reset itself is honored by
    /// `finish_step`, after any publication the in-flight step produces.
    pub fn request_reset(&mut self) {
        self.reset_pending = true;
    }

    pub fn set_step_size(&mut self, step_size: Duration) {
        assert!(step_size > Duration::ZERO, "step size must be positive");
        self.pacing.step_size = step_size;
    }

    /// Update the speed multiplier. Re-anchors while running so the change
    /// introduces no discontinuity in the simulated timeline.
    pub fn set_speed(&mut self, speed: f64, now: Instant) {
        assert!(
            speed.is_finite() && speed >= 0.0,
            "speed multiplier must be finite and non-negative"
        );
        self.pacing.speed = speed;
        if self.state == ClockState::Running {
            self.re_anchor(now);
        }
    }

    /// Advance by one step if running and the pacing gate allows it.
    /// Returns the new SimTime on advancement.
    pub fn try_advance(&mut self, now: Instant) -> Option<SimTime> {
        if self.state != ClockState::Running {
            return None;
        }
        let step = self.pacing.step_size;
        assert!(step > Duration::ZERO, "step size must be positive");
        if self.pacing.speed > 0.0 {
            let (anchor_wall, anchor_elapsed) =
                self.anchor.expect("pacing anchor set while running");
            let permitted = anchor_elapsed.as_secs_f64()
                + now.duration_since(anchor_wall).as_secs_f64() * self.pacing.speed;
            if permitted < self.elapsed.as_secs_f64() + step.as_secs_f64() {
                return None;
            }
        }
        self.elapsed += step;
        Some(self.current_time())
    }

    /// End-of-step bookkeeping: honor a pending reset. Returns true when a
    /// reset was performed. Pacing config survives the reset.
    pub fn finish_step(&mut self) -> bool {
        if !self.reset_pending {
            return false;
        }
        self.reset_pending = false;
        self.state = ClockState::Idle;
        self.elapsed = Duration::ZERO;
        self.anchor = None;
        true
    }

    fn re_anchor(&mut self, now: Instant) {
        self.anchor = Some((now, self.elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(step_secs: u64, speed: f64) -> SimulationClock {
        SimulationClock::new(
            0.0,
            PacingConfig {
                step_size: Duration::from_secs(step_secs),
                speed,
            },
        )
    }

    #[test]
    fn test_clock_starts_idle_at_origin() {
        let c = clock(10, 1.0);
        assert_eq!(c.state(), ClockState::Idle);
        assert_eq!(c.current_time().elapsed_seconds, 0.0);
        assert!(!c.reset_pending());
    }

    #[test]
    fn test_idle_clock_never_advances() {
        let mut c = clock(10, 0.0);
        assert!(c.try_advance(Instant::now()).is_none());
    }

    #[test]
    fn test_free_run_advances_every_step() {
        let mut c = clock(10, 0.0);
        let now = Instant::now();
        c.start(None, now);
        for i in 1..=5 {
            let t = c.try_advance(now).unwrap();
            assert_eq!(t.elapsed_seconds, (i * 10) as f64);
        }
    }

    #[test]
    fn test_pacing_gate_blocks_until_wall_catchup() {
        let mut c = clock(10, 1.0);
        let t0 = Instant::now();
        c.start(None, t0);

        // Not enough wall time has passed for the first step.
        assert!(c.try_advance(t0).is_none());
        assert!(c.try_advance(t0 + Duration::from_secs(9)).is_none());

        let t = c.try_advance(t0 + Duration::from_secs(10)).unwrap();
        assert_eq!(t.elapsed_seconds, 10.0);

        // The next step needs another 10 wall seconds.
        assert!(c.try_advance(t0 + Duration::from_secs(10)).is_none());
        assert!(c.try_advance(t0 + Duration::from_secs(20)).is_some());
    }

    #[test]
    fn test_pacing_never_outruns_wall_budget() {
        let mut c = clock(1, 3.0);
        let t0 = Instant::now();
        c.start(None, t0);

        for tick in 0..200u64 {
            let now = t0 + Duration::from_millis(tick * 100);
            c.try_advance(now);
            let wall = (now - t0).as_secs_f64();
            assert!(c.current_time().elapsed_seconds <= 3.0 * wall + 1e-9);
        }
    }

    #[test]
    fn test_speed_change_preserves_continuity() {
        let mut c = clock(10, 2.0);
        let t0 = Instant::now();
        c.start(None, t0);
        assert!(c.try_advance(t0 + Duration::from_secs(5)).is_some());
        let before = c.current_time();

        // Doubling the speed must not move simulated time by itself.
        c.set_speed(4.0, t0 + Duration::from_secs(5));
        assert_eq!(c.current_time(), before);

        // From the re-anchor point, 10 more simulated seconds need only
        // 2.5 wall seconds at speed 4.
        assert!(c.try_advance(t0 + Duration::from_secs(6)).is_none());
        assert!(c
            .try_advance(t0 + Duration::from_secs(5) + Duration::from_millis(2500))
            .is_some());
    }

    #[test]
    fn test_pause_resume_reproduces_trajectory() {
        let mut c = clock(10, 1.0);
        let t0 = Instant::now();
        c.start(None, t0);
        assert!(c.try_advance(t0 + Duration::from_secs(10)).is_some());

        c.pause();
        assert_eq!(c.state(), ClockState::Paused);
        assert!(c.try_advance(t0 + Duration::from_secs(60)).is_none());

        // Resume 50 wall seconds later: the trajectory continues exactly
        // where it left off, shifted by the paused interval.
        let resume = t0 + Duration::from_secs(60);
        c.start(None, resume);
        assert!(c.try_advance(resume + Duration::from_secs(9)).is_none());
        let t = c.try_advance(resume + Duration::from_secs(10)).unwrap();
        assert_eq!(t.elapsed_seconds, 20.0);
    }

    #[test]
    fn test_reset_is_deferred_to_finish_step() {
        let mut c = clock(10, 0.0);
        let now = Instant::now();
        c.start(None, now);
        assert!(c.try_advance(now).is_some());

        c.request_reset();
        assert_eq!(c.state(), ClockState::Running);
        assert_eq!(c.current_time().elapsed_seconds, 10.0);

        assert!(c.finish_step());
        assert_eq!(c.state(), ClockState::Idle);
        assert_eq!(c.current_time().elapsed_seconds, 0.0);
        assert!(!c.reset_pending());
        // Pacing survives the reset.
        assert_eq!(c.pacing().step_size, Duration::from_secs(10));
    }

    #[test]
    fn test_finish_step_without_pending_reset_is_noop() {
        let mut c = clock(10, 0.0);
        let now = Instant::now();
        c.start(None, now);
        assert!(c.try_advance(now).is_some());
        assert!(!c.finish_step());
        assert_eq!(c.current_time().elapsed_seconds, 10.0);
    }

    #[test]
    fn test_start_overrides_apply_atomically() {
        let mut c = clock(10, 1.0);
        let now = Instant::now();
        c.start(
            Some(PacingConfig {
                step_size: Duration::from_secs(30),
                speed: 0.0,
            }),
            now,
        );
        assert_eq!(c.pacing().step_size, Duration::from_secs(30));
        let t = c.try_advance(now).unwrap();
        assert_eq!(t.elapsed_seconds, 30.0);
    }

    #[test]
    #[should_panic(expected = "step size must be positive")]
    fn test_zero_step_size_is_an_invariant_violation() {
        let mut c = clock(10, 1.0);
        c.set_step_size(Duration::ZERO);
    }
}
