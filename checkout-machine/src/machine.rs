//! Building blocks shared by the checkout state machines.
//!
//! A [`Machine`] computes every transition from its current state and context
//! before committing anything, so an event is either applied entirely or not at
//! all. Side effects are never performed by a machine: they are returned as
//! effect values and executed by an [`actor`](crate::actor).

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identifies one asynchronous task started by a machine.
///
/// A result carrying a ticket the machine no longer waits for is stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket(pub u64);

impl Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies one incarnation of a child actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Monotonic source of tickets and actor ids, kept in a machine context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdIssuer {
    next: u64,
}

impl IdIssuer {
    /// Start issuing at `base`. Used to keep child ids apart from parent ids.
    pub fn starting_at(base: u64) -> Self {
        Self { next: base }
    }

    pub fn ticket(&mut self) -> Ticket {
        Ticket(self.bump())
    }

    pub fn actor(&mut self) -> ActorId {
        ActorId(self.bump())
    }

    fn bump(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

/// Result of sending an event to a machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<E> {
    /// The event does not apply to the current state. Nothing changed.
    Ignored,
    /// The event was applied.
    Taken {
        from: &'static str,
        to: &'static str,
        effects: Vec<E>,
    },
}

impl<E> Transition<E> {
    pub fn is_taken(&self) -> bool {
        matches!(self, Transition::Taken { .. })
    }

    pub fn effects(self) -> Vec<E> {
        match self {
            Transition::Ignored => Vec::new(),
            Transition::Taken { effects, .. } => effects,
        }
    }

    pub fn map<F>(self, f: impl FnMut(E) -> F) -> Transition<F> {
        match self {
            Transition::Ignored => Transition::Ignored,
            Transition::Taken { from, to, effects } => Transition::Taken {
                from,
                to,
                effects: effects.into_iter().map(f).collect(),
            },
        }
    }
}

/// A state machine that can be driven by an [`actor`](crate::actor).
pub trait Machine {
    type Event: Send + 'static;
    type Effect: Send + 'static;
    type Snapshot: Clone + Send + Sync + 'static;

    /// Name of the current state, e.g. `"SELECT"`.
    fn state_name(&self) -> &'static str;

    /// Whether `event` would be applied. Never mutates the machine.
    fn can(&self, event: &Self::Event) -> bool;

    /// Apply an event.
    fn send(&mut self, event: Self::Event) -> Transition<Self::Effect>;

    /// Read-only view of the state and context.
    fn snapshot(&self) -> Self::Snapshot;

    /// Effects to run when the machine is first started by an actor.
    fn start(&mut self) -> Vec<Self::Effect> {
        Vec::new()
    }
}
