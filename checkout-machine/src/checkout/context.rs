use std::collections::BTreeMap;

use checkout_core::{
    config::{LockSettings, PaywallConfig},
    types::{AccountIdentity, Gate, MintState, PaymentMethod, Record, SignedMessage},
};
use serde::{Deserialize, Serialize};

use crate::{
    checkout::{flow, step::CheckoutStep},
    machine::{IdIssuer, Ticket},
    services::MintRequest,
};

/// Data owned by a checkout actor for its lifetime.
///
/// User selections are only written while the machine is in their own step.
/// `mint` is only set once the flow went through `MINTING`, and
/// `message_to_sign` only once it went through `MESSAGE_TO_SIGN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutContext {
    pub paywall_config: PaywallConfig,
    pub account: Option<AccountIdentity>,
    pub selected_lock: Option<String>,
    pub quantity: Option<u32>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<Record<String>>,
    #[serde(default)]
    pub gate_data: BTreeMap<Gate, Vec<String>>,
    pub payment_method: Option<PaymentMethod>,
    pub mint: Option<MintState>,
    pub message_to_sign: Option<SignedMessage>,
    pub skip_quantity: bool,
    pub skip_recipient: bool,
    #[serde(default)]
    pub pending_mint: Option<Ticket>,
    #[serde(default)]
    pub(crate) issuer: IdIssuer,
}

impl CheckoutContext {
    pub fn new(paywall_config: PaywallConfig, account: Option<AccountIdentity>) -> Self {
        let defaults = paywall_config.defaults();
        Self {
            paywall_config,
            account,
            selected_lock: None,
            quantity: None,
            recipients: Vec::new(),
            metadata: Vec::new(),
            gate_data: BTreeMap::new(),
            payment_method: None,
            mint: None,
            message_to_sign: None,
            skip_quantity: defaults.skip_quantity,
            skip_recipient: defaults.skip_recipient,
            pending_mint: None,
            issuer: IdIssuer::default(),
        }
    }

    /// Settings of the selected lock, or the top-level ones before selection.
    pub fn settings(&self) -> LockSettings {
        self.selected_lock
            .as_deref()
            .and_then(|lock| self.paywall_config.resolve(lock))
            .unwrap_or_else(|| self.paywall_config.defaults())
    }

    /// Re-derive the skip flags from the configuration and selection.
    pub(crate) fn derive_flags(&mut self) {
        let settings = self.settings();
        self.skip_quantity = settings.skip_quantity;
        self.skip_recipient = settings.skip_recipient;
    }

    /// Forget everything the user entered. Configuration, account and id
    /// counters survive.
    pub(crate) fn clear_user_fields(&mut self) {
        self.selected_lock = None;
        self.quantity = None;
        self.recipients.clear();
        self.metadata.clear();
        self.gate_data.clear();
        self.payment_method = None;
        self.mint = None;
        self.message_to_sign = None;
        self.pending_mint = None;
        self.derive_flags();
    }

    /// Recipients of the keys; defaults to the buyer for every key.
    pub fn effective_recipients(&self) -> Vec<String> {
        if !self.recipients.is_empty() {
            return self.recipients.clone();
        }
        let quantity = self.quantity.unwrap_or(1) as usize;
        self.account
            .as_ref()
            .map(|account| vec![account.address.clone(); quantity])
            .unwrap_or_default()
    }

    /// The purchase described by the current selections, if it is complete.
    pub fn mint_request(&self) -> Option<MintRequest> {
        let (lock, config) = self.paywall_config.lock(self.selected_lock.as_deref()?)?;
        let quantity = self.quantity?;
        Some(MintRequest {
            lock: lock.to_string(),
            network: config.network,
            buyer: self.account.as_ref()?.address.clone(),
            quantity,
            recipients: self.effective_recipients(),
            metadata: self.metadata.clone(),
            payment_method: self.payment_method.clone()?,
            gate_data: self.gate_data.clone(),
            total_price: config
                .key_price
                .and_then(|price| price.checked_total(quantity)),
            message: self.message_to_sign.clone(),
        })
    }

    /// Name of the first field required to show `step` that is missing.
    pub fn missing_for(&self, step: CheckoutStep) -> Option<&'static str> {
        use CheckoutStep as S;

        if step.requires_account() && self.account.is_none() {
            return Some("account");
        }
        let after_select = !matches!(step, S::Select | S::UnlockAccount);
        if after_select && self.selected_lock.is_none() {
            return Some("selectedLock");
        }
        if after_select && step != S::Returning && self.quantity.is_none() {
            return Some("quantity");
        }
        match flow::rewind(step, self) {
            rewound if rewound == step => {}
            S::MessageToSign => return Some("messageToSign"),
            _ => return Some("gateData"),
        }
        if matches!(step, S::Card | S::Confirm | S::Minting) && self.payment_method.is_none() {
            return Some("paymentMethod");
        }
        if step == S::Minting && self.mint.is_none() {
            return Some("mint");
        }
        None
    }
}
