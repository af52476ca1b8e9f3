//! Account unlock sub-flow.
//!
//! [`UnlockAccountMachine`] proves account ownership, either with an email and
//! password or by connecting a wallet, and completes with the resolved
//! [`AccountIdentity`]. It runs standalone inside a
//! [`ConnectMachine`](crate::connect::ConnectMachine) or nested inside a
//! [`CheckoutMachine`](crate::checkout::CheckoutMachine).
//!
//! ```text
//! CHOOSE_METHOD --CHOOSE_EMAIL--> ENTER_EMAIL --SUBMIT_EMAIL--> ENTER_PASSWORD
//!       |                                                            |
//!  CHOOSE_WALLET                                              SUBMIT_PASSWORD
//!       v                                                            v
//! CONNECTING_WALLET ------------- settled ok ------------> DONE <- AUTHENTICATING
//! ```

use std::fmt::Debug;

use checkout_core::types::AccountIdentity;
use serde::{Deserialize, Serialize};

use crate::machine::{ActorId, IdIssuer, Machine, Ticket, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlockAccountState {
    ChooseMethod,
    EnterEmail,
    EnterPassword,
    Authenticating,
    ConnectingWallet,
    Done,
}

impl UnlockAccountState {
    pub fn name(&self) -> &'static str {
        match self {
            UnlockAccountState::ChooseMethod => "CHOOSE_METHOD",
            UnlockAccountState::EnterEmail => "ENTER_EMAIL",
            UnlockAccountState::EnterPassword => "ENTER_PASSWORD",
            UnlockAccountState::Authenticating => "AUTHENTICATING",
            UnlockAccountState::ConnectingWallet => "CONNECTING_WALLET",
            UnlockAccountState::Done => "DONE",
        }
    }

    /// Where `BACK` leads, if anywhere.
    pub fn predecessor(&self) -> Option<UnlockAccountState> {
        match self {
            UnlockAccountState::EnterEmail => Some(UnlockAccountState::ChooseMethod),
            UnlockAccountState::EnterPassword => Some(UnlockAccountState::EnterEmail),
            UnlockAccountState::Authenticating => Some(UnlockAccountState::EnterPassword),
            UnlockAccountState::ConnectingWallet => Some(UnlockAccountState::ChooseMethod),
            UnlockAccountState::ChooseMethod | UnlockAccountState::Done => None,
        }
    }
}

/// Email and password submitted for sign in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnlockAccountEvent {
    ChooseEmail,
    ChooseWallet,
    SubmitEmail {
        email: String,
    },
    SubmitPassword {
        password: String,
    },
    SignInSettled {
        ticket: Ticket,
        result: Result<AccountIdentity, String>,
    },
    WalletSettled {
        ticket: Ticket,
        result: Result<AccountIdentity, String>,
    },
    Back,
}

impl UnlockAccountEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UnlockAccountEvent::ChooseEmail => "CHOOSE_EMAIL",
            UnlockAccountEvent::ChooseWallet => "CHOOSE_WALLET",
            UnlockAccountEvent::SubmitEmail { .. } => "SUBMIT_EMAIL",
            UnlockAccountEvent::SubmitPassword { .. } => "SUBMIT_PASSWORD",
            UnlockAccountEvent::SignInSettled { .. } => "SIGN_IN_SETTLED",
            UnlockAccountEvent::WalletSettled { .. } => "WALLET_SETTLED",
            UnlockAccountEvent::Back => "BACK",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnlockAccountEffect {
    StartSignIn {
        ticket: Ticket,
        credentials: Credentials,
    },
    StartWalletConnect {
        ticket: Ticket,
    },
    /// The task behind `ticket` is no longer awaited.
    Cancel {
        ticket: Ticket,
    },
}

/// In-progress authentication data, scoped to one machine instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockAccountContext {
    pub email: Option<String>,
    pub error: Option<String>,
    pub pending: Option<Ticket>,
    pub account: Option<AccountIdentity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockAccountSnapshot {
    pub value: &'static str,
    pub can_back: bool,
    pub context: UnlockAccountContext,
}

#[derive(Debug, Clone)]
pub struct UnlockAccountMachine {
    state: UnlockAccountState,
    context: UnlockAccountContext,
    issuer: IdIssuer,
    output: Option<AccountIdentity>,
}

impl Default for UnlockAccountMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl UnlockAccountMachine {
    pub fn new() -> Self {
        Self {
            state: UnlockAccountState::ChooseMethod,
            context: UnlockAccountContext::default(),
            issuer: IdIssuer::default(),
            output: None,
        }
    }

    /// A machine owned by a parent as child `id`. Its tickets never collide with
    /// the tickets of another incarnation.
    pub fn child(id: ActorId) -> Self {
        Self {
            issuer: IdIssuer::starting_at(id.0 << 32),
            ..Self::new()
        }
    }

    pub fn state(&self) -> UnlockAccountState {
        self.state
    }

    pub fn context(&self) -> &UnlockAccountContext {
        &self.context
    }

    pub fn is_done(&self) -> bool {
        self.state == UnlockAccountState::Done
    }

    /// The completion payload. Yields the identity once; later calls return `None`.
    pub fn take_output(&mut self) -> Option<AccountIdentity> {
        self.output.take()
    }

    fn plan(&self, event: &UnlockAccountEvent) -> Option<(Self, Vec<UnlockAccountEffect>)> {
        use UnlockAccountEvent as E;
        use UnlockAccountState as S;

        let mut next = self.clone();
        let mut effects = Vec::new();

        match (self.state, event) {
            (S::ChooseMethod, E::ChooseEmail) => {
                next.context.error = None;
                next.state = S::EnterEmail;
            }
            (S::ChooseMethod, E::ChooseWallet) => {
                let ticket = next.issuer.ticket();
                next.context.error = None;
                next.context.pending = Some(ticket);
                next.state = S::ConnectingWallet;
                effects.push(UnlockAccountEffect::StartWalletConnect { ticket });
            }
            (S::EnterEmail, E::SubmitEmail { email }) => {
                let email = email.trim();
                if !is_plausible_email(email) {
                    return None;
                }
                next.context.email = Some(email.to_string());
                next.context.error = None;
                next.state = S::EnterPassword;
            }
            (S::EnterPassword, E::SubmitPassword { password }) => {
                if password.is_empty() {
                    return None;
                }
                let email = self.context.email.clone()?;
                let ticket = next.issuer.ticket();
                next.context.pending = Some(ticket);
                next.context.error = None;
                next.state = S::Authenticating;
                effects.push(UnlockAccountEffect::StartSignIn {
                    ticket,
                    credentials: Credentials {
                        email,
                        password: password.clone(),
                    },
                });
            }
            (S::Authenticating, E::SignInSettled { ticket, result })
            | (S::ConnectingWallet, E::WalletSettled { ticket, result }) => {
                if self.context.pending != Some(*ticket) {
                    return None;
                }
                next.context.pending = None;
                match result {
                    Ok(account) => {
                        next.context.account = Some(account.clone());
                        next.output = Some(account.clone());
                        next.state = S::Done;
                    }
                    Err(reason) => {
                        next.context.error = Some(reason.clone());
                        next.state = self.state.predecessor().unwrap_or(S::ChooseMethod);
                    }
                }
            }
            (state, E::Back) => {
                next.state = state.predecessor()?;
                next.context.error = None;
                if let Some(ticket) = self.context.pending {
                    next.context.pending = None;
                    effects.push(UnlockAccountEffect::Cancel { ticket });
                }
            }
            _ => return None,
        }

        Some((next, effects))
    }
}

impl Machine for UnlockAccountMachine {
    type Event = UnlockAccountEvent;
    type Effect = UnlockAccountEffect;
    type Snapshot = UnlockAccountSnapshot;

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn can(&self, event: &UnlockAccountEvent) -> bool {
        self.plan(event).is_some()
    }

    fn send(&mut self, event: UnlockAccountEvent) -> Transition<UnlockAccountEffect> {
        let Some((next, effects)) = self.plan(&event) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Unlock account ignored {} in {}",
                event.name(),
                self.state.name()
            );
            return Transition::Ignored;
        };

        let from = self.state.name();
        *self = next;

        #[cfg(feature = "tracing")]
        tracing::debug!("Unlock account {} --{}--> {}", from, event.name(), self.state.name());

        Transition::Taken {
            from,
            to: self.state.name(),
            effects,
        }
    }

    fn snapshot(&self) -> UnlockAccountSnapshot {
        UnlockAccountSnapshot {
            value: self.state.name(),
            can_back: self.can(&UnlockAccountEvent::Back),
            context: self.context.clone(),
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}
