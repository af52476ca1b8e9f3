use serde::{Deserialize, Serialize};

use crate::{
    checkout::{context::CheckoutContext, step::CheckoutStep},
    unlock_account::UnlockAccountSnapshot,
};

/// Read-only view of a checkout, published after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSnapshot {
    pub value: &'static str,
    pub step: CheckoutStep,
    pub can_back: bool,
    /// Purchase path under the current context, for progress display.
    pub path: Vec<CheckoutStep>,
    pub context: CheckoutContext,
    pub unlock_account: Option<UnlockAccountSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_target: Option<PersistedUnlock>,
}

impl CheckoutSnapshot {
    pub fn matches(&self, step: CheckoutStep) -> bool {
        self.step == step
    }

    pub fn persist(&self) -> PersistedCheckout {
        PersistedCheckout {
            state: self.step,
            unlock_account: self.unlock_target,
            context: self.context.clone(),
        }
    }
}

/// Where an interrupted account unlock continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedUnlock {
    pub resume: CheckoutStep,
    pub origin: CheckoutStep,
}

/// Serializable form of a checkout, restored with
/// [`CheckoutMachine::restore`](super::CheckoutMachine::restore).
///
/// The unlock-account child itself is not persisted: a restored checkout
/// starts a fresh one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCheckout {
    pub state: CheckoutStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_account: Option<PersistedUnlock>,
    pub context: CheckoutContext,
}
