//! Asynchronous collaborators of the machines.
//!
//! Machines never call these directly: they emit effects, and the
//! [`actor`](crate::actor) runs the matching service call and reports the
//! outcome back as an event.

use std::collections::BTreeMap;

use checkout_core::types::{
    AccountIdentity, Gate, KeyPrice, MintState, PaymentMethod, Record, SignedMessage,
};
use serde::{Deserialize, Serialize};

use crate::{
    actor::EventSender,
    checkout::CheckoutEvent,
    machine::Ticket,
    unlock_account::Credentials,
};

/// Everything needed to purchase keys on a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub lock: String,
    pub network: Option<u64>,
    pub buyer: String,
    pub quantity: u32,
    pub recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<Record<String>>,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gate_data: BTreeMap<Gate, Vec<String>>,
    /// `None` when the lock price is unknown.
    pub total_price: Option<KeyPrice>,
    pub message: Option<SignedMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintReceipt {
    pub transaction_hash: Option<String>,
}

/// Reports intermediate progress of one mint back to its checkout.
#[derive(Debug, Clone)]
pub struct MintProgress {
    ticket: Ticket,
    sender: EventSender<CheckoutEvent>,
}

impl MintProgress {
    pub(crate) fn new(ticket: Ticket, sender: EventSender<CheckoutEvent>) -> Self {
        Self { ticket, sender }
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// The transaction was submitted and is waiting for confirmation.
    pub fn submitted(&self, transaction_hash: impl Into<String>) {
        // A stopped checkout no longer cares about progress.
        let _ = self.sender.send(CheckoutEvent::MintUpdated {
            ticket: self.ticket,
            mint: MintState::submitted(transaction_hash),
        });
    }
}

/// Purchases keys.
pub trait Minter: Send + Sync + 'static {
    type Error: std::error::Error + Send + 'static;

    fn mint(
        &self,
        request: MintRequest,
        progress: MintProgress,
    ) -> impl Future<Output = Result<MintReceipt, Self::Error>> + Send;

    /// Wait for a transaction submitted by an earlier session.
    fn wait_for_mint(
        &self,
        transaction_hash: String,
    ) -> impl Future<Output = Result<MintReceipt, Self::Error>> + Send;
}

/// Proves account ownership.
pub trait Authenticator: Send + Sync + 'static {
    type Error: std::error::Error + Send + 'static;

    fn sign_in(
        &self,
        credentials: Credentials,
    ) -> impl Future<Output = Result<AccountIdentity, Self::Error>> + Send;

    fn connect_wallet(&self) -> impl Future<Output = Result<AccountIdentity, Self::Error>> + Send;

    /// Tear down the external session. Failures are only logged.
    fn disconnect(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
