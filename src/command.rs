use crate::bus::EventBus;
use crate::clock::SimulationClock;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Commands drained per tick. A longer backlog is consumed on the following
/// ticks, order preserved.
pub const MAX_COMMAND_BATCH: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Start {
        #[serde(default)]
        step_size_seconds: Option<u64>,
        #[serde(default)]
        speed: Option<f64>,
    },
    Pause,
    Reset,
    SetStepSize {
        step_size_seconds: u64,
    },
    SetSpeed {
        speed: f64,
    },
}

impl Command {
    /// Parameter validation. Runs at the wire boundary and again in the
    /// interpreter, before any clock mutation.
    pub fn validate(&self) -> Result<(), CommandError> {
        match *self {
            Command::Start {
                step_size_seconds,
                speed,
            } => {
                if step_size_seconds == Some(0) {
                    return Err(CommandError::NonPositiveStepSize);
                }
                if let Some(speed) = speed {
                    validate_speed(speed)?;
                }
                Ok(())
            }
            Command::SetStepSize { step_size_seconds } => {
                if step_size_seconds == 0 {
                    return Err(CommandError::NonPositiveStepSize);
                }
                Ok(())
            }
            Command::SetSpeed { speed } => validate_speed(speed),
            Command::Pause | Command::Reset => Ok(()),
        }
    }
}

fn validate_speed(speed: f64) -> Result<(), CommandError> {
    if speed.is_finite() && speed >= 0.0 {
        Ok(())
    } else {
        Err(CommandError::InvalidSpeed(speed))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("step size must be a positive number of seconds")]
    NonPositiveStepSize,
    #[error("speed multiplier must be finite and non-negative, got {0}")]
    InvalidSpeed(f64),
}

#[derive(Debug, Clone, Error)]
#[error("command source unavailable: {0}")]
pub struct SourceError(pub String);

/// Ordered, exactly-once-consumed queue of externally issued commands. A
/// poll drains everything pending, up to the batch bound.
pub trait CommandSource: Send {
    fn poll(&mut self) -> Result<Vec<Command, MAX_COMMAND_BATCH>, SourceError>;
}

/// Command source backed by an in-process channel. The sender side is handed
/// to whatever transport accepts commands (TCP handlers, tests).
pub struct ChannelCommandSource {
    receiver: std::sync::mpsc::Receiver<Command>,
}

impl ChannelCommandSource {
    pub fn new() -> (std::sync::mpsc::Sender<Command>, Self) {
        let (sender, receiver) = std::sync::mpsc::channel();
        (sender, Self { receiver })
    }
}

impl CommandSource for ChannelCommandSource {
    fn poll(&mut self) -> Result<Vec<Command, MAX_COMMAND_BATCH>, SourceError> {
        let mut batch = Vec::new();
        while batch.len() < batch.capacity() {
            match self.receiver.try_recv() {
                Ok(command) => {
                    let _ = batch.push(command);
                }
                Err(_) => break,
            }
        }
        Ok(batch)
    }
}

/// Applies queued commands to the clock, one batch per tick, FIFO. A
/// malformed command is logged and skipped without touching the clock or
/// aborting the rest of the batch.
pub struct CommandInterpreter {
    source: Box<dyn CommandSource>,
}

impl CommandInterpreter {
    pub fn new(source: Box<dyn CommandSource>) -> Self {
        Self { source }
    }

    /// Drain and apply pending commands. Returns the number applied. Each
    /// applied command is re-broadcast on `simulation.command`.
    pub fn run_pending(
        &mut self,
        clock: &mut SimulationClock,
        bus: &mut EventBus,
        now: Instant,
    ) -> usize {
        let batch = match self.source.poll() {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "command source poll failed");
                return 0;
            }
        };

        let mut applied = 0;
        for command in batch {
            match Self::apply(clock, &command, now) {
                Ok(()) => {
                    bus.publish_command(&command);
                    applied += 1;
                }
                Err(e) => {
                    warn!(command = ?command, error = %e, "rejected command");
                }
            }
        }
        applied
    }

    fn apply(
        clock: &mut SimulationClock,
        command: &Command,
        now: Instant,
    ) -> Result<(), CommandError> {
        command.validate()?;
        match *command {
            Command::Start {
                step_size_seconds,
                speed,
            } => {
                let mut pacing = clock.pacing();
                if let Some(step) = step_size_seconds {
                    pacing.step_size = Duration::from_secs(step);
                }
                if let Some(speed) = speed {
                    pacing.speed = speed;
                }
                clock.start(Some(pacing), now);
            }
            Command::Pause => clock.pause(),
            Command::Reset => clock.request_reset(),
            Command::SetStepSize { step_size_seconds } => {
                clock.set_step_size(Duration::from_secs(step_size_seconds));
            }
            Command::SetSpeed { speed } => clock.set_speed(speed, now),
        }
        Ok(())
    }
}
