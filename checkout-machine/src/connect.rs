//! "Connect wallet" flow used outside of a purchase.
//!
//! Two states: `CONNECT` and `SIGN_IN`. `SIGN_IN` owns a fresh
//! [`UnlockAccountMachine`] child for as long as the machine stays there.

use checkout_core::types::AccountIdentity;
use serde::Serialize;

use crate::{
    machine::{ActorId, IdIssuer, Machine, Transition},
    unlock_account::{
        UnlockAccountEffect, UnlockAccountEvent, UnlockAccountMachine, UnlockAccountSnapshot,
    },
};

#[derive(Debug, Clone)]
pub enum ConnectState {
    Connect,
    SignIn {
        id: ActorId,
        child: Box<UnlockAccountMachine>,
    },
}

impl ConnectState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectState::Connect => "CONNECT",
            ConnectState::SignIn { .. } => "SIGN_IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectEvent {
    UnlockAccount,
    Back,
    Disconnect,
    /// Event for the live unlock-account child.
    Child(UnlockAccountEvent),
    /// Asynchronous result addressed to a specific child incarnation.
    ChildSettled {
        child: ActorId,
        event: UnlockAccountEvent,
    },
}

impl ConnectEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectEvent::UnlockAccount => "UNLOCK_ACCOUNT",
            ConnectEvent::Back => "BACK",
            ConnectEvent::Disconnect => "DISCONNECT",
            ConnectEvent::Child(event) | ConnectEvent::ChildSettled { event, .. } => event.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectEffect {
    Child {
        child: ActorId,
        effect: UnlockAccountEffect,
    },
    ChildStopped {
        child: ActorId,
    },
    AccountChanged {
        account: Option<AccountIdentity>,
    },
    /// Forwarded to external auth teardown.
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectSnapshot {
    pub value: &'static str,
    pub account: Option<AccountIdentity>,
    pub unlock_account: Option<UnlockAccountSnapshot>,
}

#[derive(Debug, Clone)]
pub struct ConnectMachine {
    state: ConnectState,
    account: Option<AccountIdentity>,
    issuer: IdIssuer,
}

impl Default for ConnectMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectState::Connect,
            account: None,
            issuer: IdIssuer::default(),
        }
    }

    pub fn state(&self) -> &ConnectState {
        &self.state
    }

    pub fn account(&self) -> Option<&AccountIdentity> {
        self.account.as_ref()
    }

    fn plan(&self, event: &ConnectEvent) -> Option<(Self, Vec<ConnectEffect>)> {
        let mut next = self.clone();
        let mut effects = Vec::new();

        match (&self.state, event) {
            (ConnectState::Connect, ConnectEvent::UnlockAccount) => {
                let id = next.issuer.actor();
                next.state = ConnectState::SignIn {
                    id,
                    child: Box::new(UnlockAccountMachine::child(id)),
                };
            }
            (ConnectState::SignIn { id, .. }, ConnectEvent::Back) => {
                next.state = ConnectState::Connect;
                effects.push(ConnectEffect::ChildStopped { child: *id });
            }
            (_, ConnectEvent::Disconnect) => {
                next.account = None;
                effects.push(ConnectEffect::Disconnect);
                if self.account.is_some() {
                    effects.push(ConnectEffect::AccountChanged { account: None });
                }
            }
            (ConnectState::SignIn { id, child }, ConnectEvent::Child(child_event)) => {
                return self.forward(*id, child, child_event.clone());
            }
            (
                ConnectState::SignIn { id, child },
                ConnectEvent::ChildSettled {
                    child: target,
                    event: child_event,
                },
            ) if target == id => {
                return self.forward(*id, child, child_event.clone());
            }
            _ => return None,
        }

        Some((next, effects))
    }

    fn forward(
        &self,
        id: ActorId,
        child: &UnlockAccountMachine,
        event: UnlockAccountEvent,
    ) -> Option<(Self, Vec<ConnectEffect>)> {
        let mut child = child.clone();
        let transition = child.send(event);
        if !transition.is_taken() {
            return None;
        }

        let mut effects: Vec<ConnectEffect> = transition
            .effects()
            .into_iter()
            .map(|effect| ConnectEffect::Child { child: id, effect })
            .collect();

        let mut next = self.clone();
        match child.take_output() {
            Some(account) => {
                next.account = Some(account.clone());
                next.state = ConnectState::Connect;
                effects.push(ConnectEffect::ChildStopped { child: id });
                effects.push(ConnectEffect::AccountChanged {
                    account: Some(account),
                });
            }
            None => {
                next.state = ConnectState::SignIn {
                    id,
                    child: Box::new(child),
                };
            }
        }

        Some((next, effects))
    }
}

impl Machine for ConnectMachine {
    type Event = ConnectEvent;
    type Effect = ConnectEffect;
    type Snapshot = ConnectSnapshot;

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn can(&self, event: &ConnectEvent) -> bool {
        self.plan(event).is_some()
    }

    fn send(&mut self, event: ConnectEvent) -> Transition<ConnectEffect> {
        let Some((next, effects)) = self.plan(&event) else {
            #[cfg(feature = "tracing")]
            tracing::debug!("Connect ignored {} in {}", event.name(), self.state.name());
            return Transition::Ignored;
        };

        let from = self.state.name();
        *self = next;

        #[cfg(feature = "tracing")]
        tracing::debug!("Connect {} --{}--> {}", from, event.name(), self.state.name());

        Transition::Taken {
            from,
            to: self.state.name(),
            effects,
        }
    }

    fn snapshot(&self) -> ConnectSnapshot {
        ConnectSnapshot {
            value: self.state.name(),
            account: self.account.clone(),
            unlock_account: match &self.state {
                ConnectState::SignIn { child, .. } => Some(child.snapshot()),
                ConnectState::Connect => None,
            },
        }
    }
}
