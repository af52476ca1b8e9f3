//! A checkout session as seen by the screen around it.
//!
//! [`Checkout`] wires a [`CheckoutMachine`] to its services and starts it.
//! The resulting [`CheckoutSession`] answers what the top navigation shows and
//! decides what closing the checkout does.

use std::sync::Arc;

use bon::Builder;
use checkout_core::{
    config::PaywallConfig,
    types::{AccountIdentity, AnyJson, MintState, Record},
};
use url::Url;

use crate::{
    actor::{ActorHandle, CheckoutEffects, ConnectEffects, MachineActor},
    bridge::Communication,
    checkout::{
        CheckoutContext, CheckoutEvent, CheckoutMachine, CheckoutSnapshot, CheckoutStep,
        PersistedCheckout,
    },
    connect::ConnectMachine,
    errors::Result,
    machine::Machine,
    services::{Authenticator, Minter},
    unlock_account::UnlockAccountEvent,
};

/// Replaces the default close behavior. Receives the caller's parameters.
pub type CloseHandler = Arc<dyn Fn(&Record<String>) + Send + Sync>;

/// Everything needed to start a checkout.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use checkout_core::config::PaywallConfig;
/// # use checkout_machine::{bridge::Standalone, services::{Authenticator, Minter}, session::Checkout};
/// # async fn demo(minter: Arc<impl Minter>, auth: Arc<impl Authenticator>, config: PaywallConfig) {
/// let session = Checkout::builder()
///     .paywall_config(config)
///     .minter(minter)
///     .authenticator(auth)
///     .communication(Arc::new(Standalone))
///     .build()
///     .start();
///
/// let navigation = session.navigation();
/// assert!(navigation.back.is_none());
/// # }
/// ```
#[derive(Builder)]
pub struct Checkout<S: Minter, A: Authenticator, C: Communication> {
    paywall_config: PaywallConfig,
    account: Option<AccountIdentity>,
    minter: Arc<S>,
    authenticator: Arc<A>,
    communication: Arc<C>,
    /// Takes precedence over the configured redirect.
    redirect_uri: Option<Url>,
    on_close: Option<CloseHandler>,
    /// Continue a checkout persisted by an earlier session.
    resume: Option<PersistedCheckout>,
}

impl<S: Minter, A: Authenticator, C: Communication> Checkout<S, A, C> {
    /// Start the checkout actor. Must be called within a tokio runtime.
    pub fn start(self) -> CheckoutSession<C> {
        let machine = match self.resume {
            Some(persisted) => {
                let mut machine = CheckoutMachine::restore(persisted);
                // The account of the page wins over the persisted one.
                machine.send(CheckoutEvent::AccountChanged {
                    account: self.account,
                });
                machine
            }
            None => CheckoutMachine::new(self.paywall_config.clone(), self.account),
        };
        let effects = CheckoutEffects::new(
            self.minter,
            self.authenticator,
            self.communication.clone(),
        );
        let handle = MachineActor::spawn(machine, effects);

        let session = CheckoutSession {
            handle,
            communication: self.communication,
            redirect_uri: self.redirect_uri,
            on_close: self.on_close,
        };
        // A resumed checkout follows the configuration of the page it reopened in.
        match session.update_config(self.paywall_config) {
            Ok(_) => {}
            #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Could not apply paywall config: {}", err);
            }
        }
        session
    }
}

/// Where the back button leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackTarget {
    /// A step inside the account unlock.
    Child,
    Checkout,
}

/// State of the top navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    pub can_close: bool,
    pub back: Option<BackTarget>,
    pub icon: Option<Url>,
    pub title: Option<String>,
}

impl Navigation {
    pub fn from_snapshot(snapshot: &CheckoutSnapshot) -> Self {
        let config = &snapshot.context.paywall_config;
        let child_can_back = snapshot
            .unlock_account
            .as_ref()
            .is_some_and(|child| child.can_back);

        let back = if child_can_back {
            Some(BackTarget::Child)
        } else if snapshot.can_back {
            Some(BackTarget::Checkout)
        } else {
            None
        };

        Self {
            can_close: !config.persistent_checkout,
            back,
            icon: config.icon.clone(),
            title: config.title.clone(),
        }
    }
}

/// What the embedding page must do after [`CheckoutSession::close`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseAction {
    /// The custom close handler ran.
    Handled,
    /// Navigate to this URL.
    Redirect(Url),
    /// Go back in the browser history.
    HistoryBack,
    /// The host was asked to close the modal.
    CloseModal,
}

/// A running checkout.
pub struct CheckoutSession<C> {
    handle: ActorHandle<CheckoutMachine>,
    communication: Arc<C>,
    redirect_uri: Option<Url>,
    on_close: Option<CloseHandler>,
}

impl<C: Communication> CheckoutSession<C> {
    pub fn handle(&self) -> &ActorHandle<CheckoutMachine> {
        &self.handle
    }

    pub fn send(&self, event: CheckoutEvent) -> Result<()> {
        self.handle.send(event)
    }

    pub fn snapshot(&self) -> CheckoutSnapshot {
        self.handle.snapshot()
    }

    pub async fn wait_for_step(&self, step: CheckoutStep) -> Result<CheckoutSnapshot> {
        self.handle.wait_for(|snapshot| snapshot.matches(step)).await
    }

    pub fn persist(&self) -> PersistedCheckout {
        self.snapshot().persist()
    }

    pub fn navigation(&self) -> Navigation {
        Navigation::from_snapshot(&self.snapshot())
    }

    /// Go back one step, inside the account unlock first. Returns whether a
    /// back event was sent.
    pub fn back(&self) -> Result<bool> {
        match self.navigation().back {
            Some(BackTarget::Child) => {
                self.send(CheckoutEvent::Child(UnlockAccountEvent::Back))?
            }
            Some(BackTarget::Checkout) => self.send(CheckoutEvent::Back)?,
            None => return Ok(false),
        }
        Ok(true)
    }

    /// Hand a new configuration to the checkout if it differs from the
    /// current one. Returns whether it was sent.
    pub fn update_config(&self, config: PaywallConfig) -> Result<bool> {
        let config = config.normalized();
        if self.snapshot().context.paywall_config == config {
            return Ok(false);
        }
        self.send(CheckoutEvent::UpdatePaywallConfig {
            config: Box::new(config),
        })?;
        Ok(true)
    }

    /// Apply a configuration received as JSON, e.g. from the host page.
    pub fn update_config_from_value(&self, value: AnyJson) -> Result<bool> {
        self.update_config(PaywallConfig::from_value(value)?)
    }

    /// Close the checkout. The checkout is reset first; the outcome is
    /// computed from the state it had before.
    pub fn close(&self, params: &Record<String>) -> Result<CloseAction> {
        let snapshot = self.snapshot();
        self.send(CheckoutEvent::ResetCheckout)?;

        if let Some(on_close) = &self.on_close {
            on_close(params);
            return Ok(CloseAction::Handled);
        }

        let redirect_uri = self
            .redirect_uri
            .as_ref()
            .or(snapshot.context.paywall_config.redirect_uri.as_ref());
        if let Some(redirect_uri) = redirect_uri {
            return Ok(CloseAction::Redirect(redirect_url(
                redirect_uri,
                &snapshot.context,
                params,
            )));
        }

        if !self.communication.inside_iframe() {
            return Ok(CloseAction::HistoryBack);
        }
        self.communication.emit_close_modal();
        Ok(CloseAction::CloseModal)
    }
}

/// Redirect target reporting the outcome of a checkout to the page that
/// opened it.
pub fn redirect_url(base: &Url, context: &CheckoutContext, params: &Record<String>) -> Url {
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    if context.mint.as_ref().is_some_and(MintState::is_error) {
        pairs.push(("error", "access-denied"));
    }
    if context.paywall_config.message_to_sign.is_some() && context.message_to_sign.is_none() {
        pairs.push(("error", "user did not sign message"));
    }
    if let Some(signed) = &context.message_to_sign {
        pairs.push(("signature", signed.signature.as_str()));
        pairs.push(("address", signed.address.as_str()));
    }
    pairs.extend(params.iter().map(|(key, value)| (key.as_str(), value.as_str())));

    let mut redirect = base.clone();
    if !pairs.is_empty() {
        redirect.query_pairs_mut().extend_pairs(pairs);
    }
    redirect
}

/// Start a standalone "connect wallet" flow.
pub fn connect<A: Authenticator, C: Communication>(
    authenticator: Arc<A>,
    communication: Arc<C>,
) -> ActorHandle<ConnectMachine> {
    MachineActor::spawn(ConnectMachine::new(), ConnectEffects::new(authenticator, communication))
}
