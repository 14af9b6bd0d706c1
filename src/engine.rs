//! Step orchestration: one engine instance is driven by exactly one
//! scheduling loop. Concurrent stepping would race on simulated time and the
//! pacing anchor, so the engine is owned, never shared.

use crate::bus::{EventBus, StepEcho};
use crate::clock::{PacingConfig, SimTime, SimulationClock};
use crate::command::{CommandInterpreter, CommandSource};
use crate::propagator::Propagator;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    /// Origin of simulated time, UTC seconds.
    pub t0_epoch_seconds: f64,
    pub pacing: PacingConfig,
    /// Republish each advancing step this many times (descending counter)
    /// on `simulation.step_forward`. 0 disables the echo.
    pub step_echo: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            t0_epoch_seconds: 0.0,
            pacing: PacingConfig::default(),
            step_echo: 0,
        }
    }
}

/// What one pass of the step loop did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepReport {
    pub commands_applied: usize,
    pub advanced_to: Option<SimTime>,
    pub published: bool,
    pub reset_honored: bool,
}

pub struct Simulation {
    clock: SimulationClock,
    interpreter: CommandInterpreter,
    propagator: Box<dyn Propagator>,
    bus: EventBus,
    step_echo: u8,
}

impl Simulation {
    pub fn new(
        config: SimulationConfig,
        propagator: Box<dyn Propagator>,
        source: Box<dyn CommandSource>,
    ) -> Self {
        Self {
            clock: SimulationClock::new(config.t0_epoch_seconds, config.pacing),
            interpreter: CommandInterpreter::new(source),
            propagator,
            bus: EventBus::new(),
            step_echo: config.step_echo,
        }
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// One pass of the step loop, invoked on a fixed external cadence.
    ///
    /// Ticks always fire; the interpreter runs on the tick; advancement is
    /// pacing-gated; a propagator failure skips this step's publication
    /// without stopping the loop; a pending reset is honored last, after any
    /// publication this step produced.
    pub fn step(&mut self, now: Instant) -> StepReport {
        let mut report = StepReport::default();

        self.bus.publish_tick(&self.clock.current_time());
        report.commands_applied = self
            .interpreter
            .run_pending(&mut self.clock, &mut self.bus, now);

        if let Some(time) = self.clock.try_advance(now) {
            report.advanced_to = Some(time);
            debug!(elapsed_seconds = time.elapsed_seconds, "advanced simulation step");

            for countdown in (0..self.step_echo).rev() {
                self.bus.publish_step_forward(&StepEcho { countdown, time });
            }

            match self.propagator.position(time) {
                Ok(position) => {
                    self.bus.publish_ground_position(&position);
                    report.published = true;
                }
                Err(e) => {
                    warn!(error = %e, "propagator query failed; skipping publication for this step");
                }
            }
        }

        report.reset_honored = self.clock.finish_step();
        report
    }
}
