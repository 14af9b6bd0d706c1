//! # Satellite Ground-Track Simulator
//!
//! A simulation engine that advances a satellite's ground position over
//! simulated time, broadcasts it to interested subsystems, and computes the
//! camera pointing parameters (bearing, tilt, zoom) needed to view a ground
//! target from the satellite's current position.
//!
//! ## Features
//!
//! - **Paced simulation clock**: run/pause/reset state machine with a
//!   wall-clock pacing gate and jump-free speed changes
//! - **Typed event bus**: synchronous in-process topics with fault-isolated
//!   subscriber dispatch
//! - **Command interpreter**: FIFO consumption of an injected command
//!   source, validation before any clock mutation
//! - **Viewing geometry**: pointing solutions with a 30-degree visibility
//!   gate, ready for a static-imagery provider
//! - **Snapshot store**: single-writer/multi-reader latest-position slot for
//!   the query endpoint
//!
//! ## Quick Start
//!
//! ```rust
//! use groundtrack::clock::PacingConfig;
//! use groundtrack::command::{ChannelCommandSource, Command};
//! use groundtrack::engine::{Simulation, SimulationConfig};
//! use groundtrack::propagator::CircularOrbit;
//! use std::time::{Duration, Instant};
//!
//! let (commands, source) = ChannelCommandSource::new();
//! let config = SimulationConfig {
//!     pacing: PacingConfig { step_size: Duration::from_secs(10), speed: 0.0 },
//!     ..SimulationConfig::default()
//! };
//! let mut simulation = Simulation::new(
//!     config,
//!     Box::new(CircularOrbit::default()),
//!     Box::new(source),
//! );
//!
//! commands.send(Command::Start { step_size_seconds: None, speed: None }).unwrap();
//! let report = simulation.step(Instant::now());
//! assert_eq!(report.commands_applied, 1);
//! ```
//!
//! ## Architecture
//!
//! - [`clock`] - simulated time, pacing, and the run/pause/reset machine
//! - [`bus`] - typed publish/subscribe topics
//! - [`command`] - commands, sources, and the interpreter
//! - [`engine`] - step sequencing over clock, interpreter, and propagator
//! - [`propagator`] - orbit propagation seam and a circular-orbit stand-in
//! - [`geometry`] - viewing geometry and the visibility gate
//! - [`snapshot`] - latest-position store for query endpoints
//! - [`telemetry`] - telemetry frames and the forwarder subscriber
//! - [`imagery`] - imagery provider seam and static-map requests
//! - [`protocol`] - JSON-lines wire protocol for the TCP surface

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod clock;
pub mod command;
pub mod engine;
pub mod geometry;
pub mod imagery;
pub mod propagator;
pub mod protocol;
pub mod snapshot;
pub mod telemetry;

// Re-export main public types for convenience
pub use clock::{ClockState, PacingConfig, SimTime, SimulationClock};
pub use command::{ChannelCommandSource, Command, CommandInterpreter, CommandSource};
pub use engine::{Simulation, SimulationConfig, StepReport};
pub use geometry::{pointing_solution, GroundTarget, PointingSolution};
pub use propagator::{CircularOrbit, GroundPosition, Propagator};
pub use snapshot::PositionStore;
