//! Typed in-process publish/subscribe bus. Dispatch is synchronous, in
//! registration order, on the publishing thread; a faulting subscriber never
//! masks delivery to the subscribers behind it.

use crate::clock::SimTime;
use crate::command::Command;
use crate::propagator::GroundPosition;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, warn};

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler<T> = Box<dyn FnMut(&T) -> Result<(), HandlerError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    SimulationTick,
    GroundPosition,
    SimulationCommand,
    StepForward,
}

impl Topic {
    pub fn name(self) -> &'static str {
        match self {
            Topic::SimulationTick => "simulation.tick",
            Topic::GroundPosition => "satellite.ground_position",
            Topic::SimulationCommand => "simulation.command",
            Topic::StepForward => "simulation.step_forward",
        }
    }
}

/// Stable handle returned by the subscribe methods, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    topic: Topic,
    id: u64,
}

/// Payload of the configurable step-echo topic: the advancing step is
/// republished with a descending counter for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEcho {
    pub countdown: u8,
    pub time: SimTime,
}

struct SubscriberList<T> {
    entries: Vec<(u64, Handler<T>)>,
}

impl<T> SubscriberList<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add(&mut self, id: u64, handler: Handler<T>) {
        self.entries.push((id, handler));
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    fn dispatch(&mut self, topic: Topic, payload: &T) {
        for (id, handler) in &mut self.entries {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(topic = topic.name(), subscriber = *id, error = %e,
                        "subscriber handler failed");
                }
                Err(_) => {
                    error!(topic = topic.name(), subscriber = *id,
                        "subscriber handler panicked");
                }
            }
        }
    }
}

pub struct EventBus {
    next_id: u64,
    tick: SubscriberList<SimTime>,
    ground_position: SubscriberList<GroundPosition>,
    command: SubscriberList<Command>,
    step_forward: SubscriberList<StepEcho>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            tick: SubscriberList::new(),
            ground_position: SubscriberList::new(),
            command: SubscriberList::new(),
            step_forward: SubscriberList::new(),
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn subscribe_tick<F>(&mut self, handler: F) -> Subscription
    where
        F: FnMut(&SimTime) -> Result<(), HandlerError> + Send + 'static,
    {
        let id = self.next_id();
        self.tick.add(id, Box::new(handler));
        Subscription {
            topic: Topic::SimulationTick,
            id,
        }
    }

    pub fn subscribe_ground_position<F>(&mut self, handler: F) -> Subscription
    where
        F: FnMut(&GroundPosition) -> Result<(), HandlerError> + Send + 'static,
    {
        let id = self.next_id();
        self.ground_position.add(id, Box::new(handler));
        Subscription {
            topic: Topic::GroundPosition,
            id,
        }
    }

    pub fn subscribe_command<F>(&mut self, handler: F) -> Subscription
    where
        F: FnMut(&Command) -> Result<(), HandlerError> + Send + 'static,
    {
        let id = self.next_id();
        self.command.add(id, Box::new(handler));
        Subscription {
            topic: Topic::SimulationCommand,
            id,
        }
    }

    pub fn subscribe_step_forward<F>(&mut self, handler: F) -> Subscription
    where
        F: FnMut(&StepEcho) -> Result<(), HandlerError> + Send + 'static,
    {
        let id = self.next_id();
        self.step_forward.add(id, Box::new(handler));
        Subscription {
            topic: Topic::StepForward,
            id,
        }
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        match subscription.topic {
            Topic::SimulationTick => self.tick.remove(subscription.id),
            Topic::GroundPosition => self.ground_position.remove(subscription.id),
            Topic::SimulationCommand => self.command.remove(subscription.id),
            Topic::StepForward => self.step_forward.remove(subscription.id),
        }
    }

    pub fn publish_tick(&mut self, time: &SimTime) {
        self.tick.dispatch(Topic::SimulationTick, time);
    }

    pub fn publish_ground_position(&mut self, position: &GroundPosition) {
        self.ground_position.dispatch(Topic::GroundPosition, position);
    }

    pub fn publish_command(&mut self, command: &Command) {
        self.command.dispatch(Topic::SimulationCommand, command);
    }

    pub fn publish_step_forward(&mut self, echo: &StepEcho) {
        self.step_forward.dispatch(Topic::StepForward, echo);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
