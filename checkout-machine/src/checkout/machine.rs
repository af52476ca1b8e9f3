use checkout_core::{
    config::PaywallConfig,
    types::{AccountIdentity, AnyJson, MintState, MintStatus, PaymentMethod, Record},
};

use crate::{
    checkout::{
        context::CheckoutContext,
        event::{CheckoutEffect, CheckoutEvent},
        flow,
        snapshot::{CheckoutSnapshot, PersistedCheckout, PersistedUnlock},
        step::CheckoutStep,
    },
    errors::Result,
    machine::{ActorId, Machine, Transition},
    unlock_account::{UnlockAccountEvent, UnlockAccountMachine},
};

/// The unlock-account child owned by the `UNLOCK_ACCOUNT` state.
#[derive(Debug, Clone)]
pub struct UnlockAccountSlot {
    pub id: ActorId,
    /// Where the checkout continues once an account is known.
    pub resume: CheckoutStep,
    /// Where `BACK` leads.
    pub origin: CheckoutStep,
    pub child: UnlockAccountMachine,
}

#[derive(Debug, Clone)]
pub enum CheckoutState {
    Select,
    Quantity,
    Metadata,
    MessageToSign,
    Password,
    Promo,
    Captcha,
    Guild,
    Gitcoin,
    Payment,
    Card,
    Confirm,
    Minting,
    Returning,
    UnlockAccount(Box<UnlockAccountSlot>),
}

impl CheckoutState {
    pub fn step(&self) -> CheckoutStep {
        match self {
            CheckoutState::Select => CheckoutStep::Select,
            CheckoutState::Quantity => CheckoutStep::Quantity,
            CheckoutState::Metadata => CheckoutStep::Metadata,
            CheckoutState::MessageToSign => CheckoutStep::MessageToSign,
            CheckoutState::Password => CheckoutStep::Password,
            CheckoutState::Promo => CheckoutStep::Promo,
            CheckoutState::Captcha => CheckoutStep::Captcha,
            CheckoutState::Guild => CheckoutStep::Guild,
            CheckoutState::Gitcoin => CheckoutStep::Gitcoin,
            CheckoutState::Payment => CheckoutStep::Payment,
            CheckoutState::Card => CheckoutStep::Card,
            CheckoutState::Confirm => CheckoutStep::Confirm,
            CheckoutState::Minting => CheckoutStep::Minting,
            CheckoutState::Returning => CheckoutStep::Returning,
            CheckoutState::UnlockAccount(_) => CheckoutStep::UnlockAccount,
        }
    }

    /// State for a step that owns nothing. `None` for `UNLOCK_ACCOUNT`.
    fn at(step: CheckoutStep) -> Option<Self> {
        Some(match step {
            CheckoutStep::Select => CheckoutState::Select,
            CheckoutStep::Quantity => CheckoutState::Quantity,
            CheckoutStep::Metadata => CheckoutState::Metadata,
            CheckoutStep::MessageToSign => CheckoutState::MessageToSign,
            CheckoutStep::Password => CheckoutState::Password,
            CheckoutStep::Promo => CheckoutState::Promo,
            CheckoutStep::Captcha => CheckoutState::Captcha,
            CheckoutStep::Guild => CheckoutState::Guild,
            CheckoutStep::Gitcoin => CheckoutState::Gitcoin,
            CheckoutStep::Payment => CheckoutState::Payment,
            CheckoutStep::Card => CheckoutState::Card,
            CheckoutStep::Confirm => CheckoutState::Confirm,
            CheckoutStep::Minting => CheckoutState::Minting,
            CheckoutStep::Returning => CheckoutState::Returning,
            CheckoutStep::UnlockAccount => return None,
        })
    }
}

/// The purchase flow.
///
/// Every event is planned against a copy of the machine and committed only if
/// it applies, so a rejected event leaves no trace.
///
/// ```
/// use checkout_core::{config::PaywallConfig, types::AccountIdentity};
/// use checkout_machine::{
///     checkout::{CheckoutEvent, CheckoutMachine, CheckoutStep},
///     machine::Machine,
/// };
///
/// let config = PaywallConfig::from_value(serde_json::json!({
///     "locks": { "0xAAA": { "network": 1 } }
/// })).unwrap();
/// let mut checkout = CheckoutMachine::new(config, Some(AccountIdentity::wallet("0xme")));
///
/// checkout.send(CheckoutEvent::SelectLock {
///     lock: "0xaaa".to_string(),
///     existing_member: false,
/// });
/// assert_eq!(checkout.step(), CheckoutStep::Payment);
/// assert_eq!(checkout.context().selected_lock.as_deref(), Some("0xAAA"));
/// ```
#[derive(Debug, Clone)]
pub struct CheckoutMachine {
    state: CheckoutState,
    context: CheckoutContext,
    /// Effects queued by a restore, handed out by [`Machine::start`].
    startup: Vec<CheckoutEffect>,
}

impl CheckoutMachine {
    pub fn new(paywall_config: PaywallConfig, account: Option<AccountIdentity>) -> Self {
        Self {
            state: CheckoutState::Select,
            context: CheckoutContext::new(paywall_config.normalized(), account),
            startup: Vec::new(),
        }
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn step(&self) -> CheckoutStep {
        self.state.step()
    }

    pub fn context(&self) -> &CheckoutContext {
        &self.context
    }

    pub fn unlock_account(&self) -> Option<&UnlockAccountMachine> {
        match &self.state {
            CheckoutState::UnlockAccount(slot) => Some(&slot.child),
            _ => None,
        }
    }

    pub fn persist(&self) -> PersistedCheckout {
        PersistedCheckout {
            state: self.step(),
            unlock_account: self.unlock_target(),
            context: self.context.clone(),
        }
    }

    fn unlock_target(&self) -> Option<PersistedUnlock> {
        match &self.state {
            CheckoutState::UnlockAccount(slot) => Some(PersistedUnlock {
                resume: slot.resume,
                origin: slot.origin,
            }),
            _ => None,
        }
    }

    /// Rebuild a checkout from its persisted form.
    ///
    /// In-flight tasks do not survive: a mint that was submitted is watched
    /// again once the machine starts, one that was not submitted is reported
    /// as failed.
    pub fn restore(persisted: PersistedCheckout) -> Self {
        let PersistedCheckout {
            state,
            unlock_account,
            mut context,
        } = persisted;

        context.pending_mint = None;
        context.paywall_config = context.paywall_config.normalized();
        if let Some(lock) = context.selected_lock.take() {
            match context.paywall_config.lock(&lock) {
                Some((key, _)) => context.selected_lock = Some(key.to_string()),
                None => context.clear_user_fields(),
            }
        }
        context.derive_flags();

        let mut machine = Self {
            state: CheckoutState::Select,
            context,
            startup: Vec::new(),
        };
        let mut discarded = Vec::new();

        let target = match state {
            CheckoutStep::UnlockAccount => {
                let PersistedUnlock { resume, origin } = unlock_account.unwrap_or(PersistedUnlock {
                    resume: CheckoutStep::Select,
                    origin: CheckoutStep::Select,
                });
                let resume = flow::normalize(resume, &machine.context);
                let origin = flow::last_public_step(
                    flow::normalize(origin, &machine.context),
                    &machine.context,
                );
                machine.unlock(resume, origin, &mut discarded);
                return machine;
            }
            CheckoutStep::Minting => machine.resume_mint(),
            step => flow::normalize(step, &machine.context),
        };
        let target = flow::rewind(target, &machine.context);

        if target == CheckoutStep::Minting {
            machine.state = CheckoutState::Minting;
        } else if machine.context.selected_lock.is_none() {
            // Nothing chosen survived, start over.
        } else if target.requires_account() && machine.context.account.is_none() {
            let origin = flow::last_public_step(target, &machine.context);
            machine.unlock(target, origin, &mut discarded);
        } else if machine.context.missing_for(target).is_none() {
            machine.state = CheckoutState::at(target).unwrap_or(CheckoutState::Select);
        }
        machine
    }

    /// Restore from the JSON produced by serializing [`persist`](Self::persist).
    pub fn restore_from_value(value: AnyJson) -> Result<Self> {
        let persisted: PersistedCheckout = serde_json::from_value(value)?;
        Ok(Self::restore(persisted))
    }

    fn resume_mint(&mut self) -> CheckoutStep {
        match self.context.mint.clone() {
            Some(MintState {
                status: MintStatus::Processing,
                transaction_hash: Some(transaction_hash),
            }) => {
                let ticket = self.context.issuer.ticket();
                self.context.pending_mint = Some(ticket);
                self.startup.push(CheckoutEffect::AwaitMint {
                    ticket,
                    transaction_hash,
                });
                CheckoutStep::Minting
            }
            Some(MintState {
                status: MintStatus::Processing,
                transaction_hash: None,
            }) => {
                self.context.mint = Some(MintState::error(None));
                CheckoutStep::Minting
            }
            Some(MintState {
                status: MintStatus::Error,
                ..
            }) => CheckoutStep::Minting,
            Some(MintState {
                status: MintStatus::Finished,
                ..
            }) => CheckoutStep::Returning,
            None => CheckoutStep::Confirm,
        }
    }

    fn plan(&self, event: &CheckoutEvent) -> Option<(Self, Vec<CheckoutEffect>)> {
        use CheckoutEvent as E;
        use CheckoutStep as S;

        let step = self.step();
        let mut next = self.clone();
        let mut effects = Vec::new();

        if let Some((gate, data)) = event.gate_submission() {
            if step.as_gate() != Some(gate) || data.is_empty() {
                return None;
            }
            next.context.gate_data.insert(gate, data.to_vec());
            next.go(flow::successor(step, &next.context)?, &mut effects)?;
            return Some((next, effects));
        }

        match (step, event) {
            (
                S::Select,
                E::SelectLock {
                    lock,
                    existing_member,
                },
            ) => {
                let (key, _) = self.context.paywall_config.lock(lock)?;
                let ctx = &mut next.context;
                ctx.selected_lock = Some(key.to_string());
                clear_purchase(ctx);
                ctx.derive_flags();
                ctx.quantity = Some(ctx.settings().min_recipients);

                let target = if *existing_member {
                    S::Returning
                } else {
                    flow::successor(S::Select, &next.context)?
                };
                next.go(target, &mut effects)?;
            }
            (S::Quantity, E::SelectQuantity { quantity }) => {
                let settings = self.context.settings();
                if !(settings.min_recipients..=settings.max_recipients).contains(quantity) {
                    return None;
                }
                if self.context.quantity != Some(*quantity) {
                    next.context.recipients.clear();
                    next.context.metadata.clear();
                }
                next.context.quantity = Some(*quantity);
                next.go(flow::successor(step, &next.context)?, &mut effects)?;
            }
            (
                S::Metadata,
                E::SubmitRecipients {
                    recipients,
                    metadata,
                },
            ) => {
                if !self.accepts_recipients(recipients, metadata) {
                    return None;
                }
                next.context.recipients = recipients.iter().map(|r| r.trim().to_string()).collect();
                next.context.metadata = metadata.clone();
                next.go(flow::successor(step, &next.context)?, &mut effects)?;
            }
            (S::MessageToSign, E::SignMessage(signed)) => {
                if signed.signature.is_empty() {
                    return None;
                }
                let foreign = self
                    .context
                    .account
                    .as_ref()
                    .is_some_and(|account| !account.address.eq_ignore_ascii_case(&signed.address));
                if foreign {
                    return None;
                }
                next.context.message_to_sign = Some(signed.clone());
                next.go(flow::successor(step, &next.context)?, &mut effects)?;
            }
            (S::Payment, E::SelectPaymentMethod { method }) => {
                next.context.payment_method = Some(method.clone());
                next.go(flow::successor(step, &next.context)?, &mut effects)?;
            }
            (S::Card, E::SelectCardToCharge { card_id }) => {
                let paying_by_card = self
                    .context
                    .payment_method
                    .as_ref()
                    .is_some_and(PaymentMethod::is_card);
                if card_id.is_empty() || !paying_by_card {
                    return None;
                }
                next.context.payment_method = Some(PaymentMethod::Card {
                    card_id: Some(card_id.clone()),
                });
                next.go(flow::successor(step, &next.context)?, &mut effects)?;
            }
            (S::Confirm, E::ConfirmMint) => {
                if self.context.missing_for(S::Confirm).is_some() {
                    return None;
                }
                match &self.context.payment_method {
                    None | Some(PaymentMethod::Card { card_id: None }) => return None,
                    Some(_) => {}
                }
                next.go(S::Minting, &mut effects)?;
            }
            (S::Minting, E::MintUpdated { ticket, mint }) => {
                if self.context.pending_mint != Some(*ticket) {
                    return None;
                }
                let transaction_hash = mint.transaction_hash.clone().or_else(|| {
                    self.context
                        .mint
                        .as_ref()
                        .and_then(|m| m.transaction_hash.clone())
                });
                match mint.status {
                    MintStatus::Processing => {
                        next.context.mint = Some(MintState {
                            status: MintStatus::Processing,
                            transaction_hash,
                        });
                    }
                    MintStatus::Finished => {
                        next.context.pending_mint = None;
                        next.context.mint = Some(MintState::finished(transaction_hash));
                        next.go(S::Returning, &mut effects)?;
                    }
                    MintStatus::Error => {
                        next.context.pending_mint = None;
                        next.context.mint = Some(MintState::error(transaction_hash));
                        // The failed purchase can only be retried once the
                        // current config is satisfied.
                        let rewound = flow::rewind(S::Minting, &next.context);
                        if rewound != S::Minting {
                            next.go(rewound, &mut effects)?;
                        }
                    }
                }
            }
            (S::Minting, E::RetryMint) => {
                if !self.context.mint.as_ref().is_some_and(MintState::is_error) {
                    return None;
                }
                next.start_mint(&mut effects)?;
            }
            (S::Returning, E::MakeAnotherPurchase) => {
                let ctx = &mut next.context;
                clear_purchase(ctx);
                ctx.quantity = Some(ctx.settings().min_recipients);
                next.go(flow::successor(S::Select, &next.context)?, &mut effects)?;
            }
            (S::UnlockAccount | S::Minting, E::UnlockAccount) => return None,
            (_, E::UnlockAccount) => next.unlock(step, step, &mut effects),
            (S::UnlockAccount, E::Child(child_event)) => return self.forward(child_event.clone()),
            (S::UnlockAccount, E::ChildSettled { child, event }) => {
                match &self.state {
                    CheckoutState::UnlockAccount(slot) if slot.id == *child => {}
                    _ => return None,
                }
                return self.forward(event.clone());
            }
            (_, E::AccountChanged { account }) => {
                if self.context.account == *account {
                    return None;
                }
                next.context.account = account.clone();
                effects.push(CheckoutEffect::AccountChanged {
                    account: account.clone(),
                });
                next.follow_account(&mut effects)?;
            }
            (_, E::Disconnect) => {
                next.leave(&mut effects);
                next.context.clear_user_fields();
                next.context.account = None;
                next.state = CheckoutState::Select;
                effects.push(CheckoutEffect::Disconnect);
                if self.context.account.is_some() {
                    effects.push(CheckoutEffect::AccountChanged { account: None });
                }
            }
            (_, E::ResetCheckout) => {
                next.leave(&mut effects);
                next.context.clear_user_fields();
                next.state = CheckoutState::Select;
            }
            (_, E::UpdatePaywallConfig { config }) => return self.reconfigure(config),
            (_, E::Back) => match &self.state {
                CheckoutState::UnlockAccount(slot) => next.jump(slot.origin, &mut effects)?,
                _ => next.go(flow::predecessor(step, &self.context)?, &mut effects)?,
            },
            _ => return None,
        }

        Some((next, effects))
    }

    fn accepts_recipients(&self, recipients: &[String], metadata: &[Record<String>]) -> bool {
        let Some(quantity) = self.context.quantity else {
            return false;
        };
        let quantity = quantity as usize;
        if recipients.len() != quantity || recipients.iter().any(|r| r.trim().is_empty()) {
            return false;
        }
        if !metadata.is_empty() && metadata.len() != quantity {
            return false;
        }

        let settings = self.context.settings();
        let required: Vec<_> = settings
            .metadata_inputs
            .iter()
            .filter(|input| input.required)
            .collect();
        if required.is_empty() {
            return true;
        }
        !metadata.is_empty()
            && metadata.iter().all(|record| {
                required.iter().all(|input| {
                    record
                        .get(&input.name)
                        .is_some_and(|value| !value.trim().is_empty())
                })
            })
    }

    /// Run an event through the unlock-account child and, once it completes,
    /// continue where the checkout was headed.
    fn forward(&self, event: UnlockAccountEvent) -> Option<(Self, Vec<CheckoutEffect>)> {
        let CheckoutState::UnlockAccount(slot) = &self.state else {
            return None;
        };

        let mut child = slot.child.clone();
        let transition = child.send(event);
        if !transition.is_taken() {
            return None;
        }

        let id = slot.id;
        let mut effects: Vec<CheckoutEffect> = transition
            .effects()
            .into_iter()
            .map(|effect| CheckoutEffect::Child { child: id, effect })
            .collect();

        let mut next = self.clone();
        match child.take_output() {
            Some(account) => {
                next.context.account = Some(account.clone());
                effects.push(CheckoutEffect::AccountChanged {
                    account: Some(account),
                });
                let resume = flow::normalize(slot.resume, &next.context);
                next.go(resume, &mut effects)?;
            }
            None => {
                if let CheckoutState::UnlockAccount(slot) = &mut next.state {
                    slot.child = child;
                }
            }
        }

        Some((next, effects))
    }

    /// Adjust the position after the account was replaced.
    fn follow_account(&mut self, effects: &mut Vec<CheckoutEffect>) -> Option<()> {
        let signed_in = self.context.account.is_some();
        let step = self.step();

        if let CheckoutState::UnlockAccount(slot) = &mut self.state {
            if signed_in {
                let resume = flow::normalize(slot.resume, &self.context);
                return self.go(resume, effects);
            }
            slot.origin = flow::last_public_step(slot.origin, &self.context);
            return Some(());
        }

        // A mint in flight stays visible whatever happens to the account.
        if !signed_in && step.requires_account() && step != CheckoutStep::Minting {
            let origin = flow::last_public_step(step, &self.context);
            self.unlock(step, origin, effects);
        }
        Some(())
    }

    fn reconfigure(&self, config: &PaywallConfig) -> Option<(Self, Vec<CheckoutEffect>)> {
        let config = config.clone().normalized();
        if config == self.context.paywall_config {
            return None;
        }

        let mut next = self.clone();
        let mut effects = Vec::new();

        if config.message_to_sign != self.context.paywall_config.message_to_sign {
            next.context.message_to_sign = None;
        }
        next.context.paywall_config = config;

        if let Some(lock) = &self.context.selected_lock {
            let Some((key, _)) = next.context.paywall_config.lock(lock) else {
                next.leave(&mut effects);
                next.context.clear_user_fields();
                next.state = CheckoutState::Select;
                return Some((next, effects));
            };
            next.context.selected_lock = Some(key.to_string());
        }
        next.context.derive_flags();

        let settings = next.context.settings();
        if let Some(quantity) = self.context.quantity {
            let clamped = quantity.clamp(settings.min_recipients, settings.max_recipients);
            if clamped != quantity {
                next.context.quantity = Some(clamped);
                next.context.recipients.clear();
                next.context.metadata.clear();
            }
        }

        if let CheckoutState::UnlockAccount(slot) = &mut next.state {
            slot.resume = flow::normalize(slot.resume, &next.context);
            slot.origin = flow::last_public_step(
                flow::normalize(slot.origin, &next.context),
                &next.context,
            );
        }

        let step = next.step();
        if step != CheckoutStep::UnlockAccount {
            let target = flow::rewind(flow::normalize(step, &next.context), &next.context);
            if target != step {
                next.go(target, &mut effects)?;
            }
        }

        Some((next, effects))
    }

    /// Stop whatever the current state owns.
    fn leave(&mut self, effects: &mut Vec<CheckoutEffect>) {
        match &self.state {
            CheckoutState::UnlockAccount(slot) => {
                effects.push(CheckoutEffect::ChildStopped { child: slot.id });
            }
            CheckoutState::Minting => {
                if let Some(ticket) = self.context.pending_mint.take() {
                    effects.push(CheckoutEffect::Cancel { ticket });
                }
            }
            _ => {}
        }
    }

    /// Move to `target`, detouring through `UNLOCK_ACCOUNT` when it needs an
    /// account and none is known. Stops short at a message or gate that is
    /// still waiting for its data.
    fn go(&mut self, target: CheckoutStep, effects: &mut Vec<CheckoutEffect>) -> Option<()> {
        let target = flow::rewind(target, &self.context);
        if target.requires_account() && self.context.account.is_none() {
            let origin = match &self.state {
                CheckoutState::UnlockAccount(slot) => slot.origin,
                state => flow::last_public_step(state.step(), &self.context),
            };
            self.unlock(target, origin, effects);
            return Some(());
        }
        self.jump(target, effects)
    }

    /// Move to `target` without checking the account.
    fn jump(&mut self, target: CheckoutStep, effects: &mut Vec<CheckoutEffect>) -> Option<()> {
        let state = CheckoutState::at(target)?;
        self.leave(effects);
        self.state = state;
        if target == CheckoutStep::Minting {
            self.start_mint(effects)?;
        }
        Some(())
    }

    fn unlock(
        &mut self,
        resume: CheckoutStep,
        origin: CheckoutStep,
        effects: &mut Vec<CheckoutEffect>,
    ) {
        self.leave(effects);
        let id = self.context.issuer.actor();
        self.state = CheckoutState::UnlockAccount(Box::new(UnlockAccountSlot {
            id,
            resume,
            origin,
            child: UnlockAccountMachine::child(id),
        }));
    }

    fn start_mint(&mut self, effects: &mut Vec<CheckoutEffect>) -> Option<()> {
        if flow::first_unsatisfied(CheckoutStep::Minting, &self.context).is_some() {
            return None;
        }
        let request = self.context.mint_request()?;
        let ticket = self.context.issuer.ticket();
        self.context.mint = Some(MintState::processing());
        self.context.pending_mint = Some(ticket);
        effects.push(CheckoutEffect::StartMint { ticket, request });
        Some(())
    }
}

/// Forget the choices made after selecting a lock.
fn clear_purchase(ctx: &mut CheckoutContext) {
    ctx.recipients.clear();
    ctx.metadata.clear();
    ctx.gate_data.clear();
    ctx.payment_method = None;
    ctx.mint = None;
    ctx.pending_mint = None;
}

impl Machine for CheckoutMachine {
    type Event = CheckoutEvent;
    type Effect = CheckoutEffect;
    type Snapshot = CheckoutSnapshot;

    fn state_name(&self) -> &'static str {
        self.step().name()
    }

    fn can(&self, event: &CheckoutEvent) -> bool {
        self.plan(event).is_some()
    }

    fn send(&mut self, event: CheckoutEvent) -> Transition<CheckoutEffect> {
        let Some((next, effects)) = self.plan(&event) else {
            #[cfg(feature = "tracing")]
            tracing::debug!("Checkout ignored {} in {}", event.name(), self.step());
            return Transition::Ignored;
        };

        let from = self.state_name();
        *self = next;

        #[cfg(feature = "tracing")]
        tracing::debug!("Checkout {} --{}--> {}", from, event.name(), self.step());

        Transition::Taken {
            from,
            to: self.state_name(),
            effects,
        }
    }

    fn snapshot(&self) -> CheckoutSnapshot {
        CheckoutSnapshot {
            value: self.state_name(),
            step: self.step(),
            can_back: self.can(&CheckoutEvent::Back),
            path: flow::path(&self.context),
            context: self.context.clone(),
            unlock_account: self.unlock_account().map(|child| child.snapshot()),
            unlock_target: self.unlock_target(),
        }
    }

    fn start(&mut self) -> Vec<CheckoutEffect> {
        let mut effects = vec![CheckoutEffect::AccountChanged {
            account: self.context.account.clone(),
        }];
        effects.append(&mut self.startup);
        effects
    }
}

#[cfg(test)]
mod tests {
    use checkout_core::{
        config::{LockConfig, MetadataInput},
        types::{Gate, SignedMessage},
    };

    use crate::{machine::Ticket, unlock_account::UnlockAccountEffect};

    use super::*;

    use CheckoutEvent as E;
    use CheckoutStep as S;

    const LOCK: &str = "0xAAA";

    fn me() -> AccountIdentity {
        AccountIdentity::wallet("0xme")
    }

    fn config(lock: LockConfig) -> PaywallConfig {
        PaywallConfig::builder()
            .locks(Record::from([(LOCK.to_string(), lock)]))
            .build()
    }

    fn select(machine: &mut CheckoutMachine) {
        assert!(
            machine
                .send(E::SelectLock {
                    lock: LOCK.to_string(),
                    existing_member: false,
                })
                .is_taken()
        );
    }

    fn mint_ticket(effects: &[CheckoutEffect]) -> Ticket {
        effects
            .iter()
            .find_map(|effect| match effect {
                CheckoutEffect::StartMint { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no mint started in {effects:?}"))
    }

    fn to_minting(machine: &mut CheckoutMachine) -> Ticket {
        select(machine);
        machine.send(E::SelectPaymentMethod {
            method: PaymentMethod::Crypto,
        });
        assert_eq!(machine.step(), S::Confirm);
        mint_ticket(&machine.send(E::ConfirmMint).effects())
    }

    #[test]
    fn test_skip_quantity_goes_to_payment_and_back() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        select(&mut machine);
        assert_eq!(machine.step(), S::Payment);
        assert_eq!(machine.context().quantity, Some(1));

        machine.send(E::Back);
        assert_eq!(machine.step(), S::Select);
        assert!(!machine.can(&E::Back));
    }

    #[test]
    fn test_unknown_lock_is_ignored() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        let event = E::SelectLock {
            lock: "0xBBB".to_string(),
            existing_member: false,
        };
        assert!(!machine.can(&event));
        assert!(!machine.send(event).is_taken());
        assert_eq!(machine.step(), S::Select);
        assert!(machine.context().selected_lock.is_none());
    }

    #[test]
    fn test_quantity_bounds() {
        let lock = LockConfig::builder()
            .min_recipients(2)
            .max_recipients(4)
            .build();
        let mut machine = CheckoutMachine::new(config(lock), Some(me()));
        select(&mut machine);
        assert_eq!(machine.step(), S::Quantity);
        assert_eq!(machine.context().quantity, Some(2));

        for quantity in [0, 1, 5] {
            assert!(!machine.can(&E::SelectQuantity { quantity }));
        }
        machine.send(E::SelectQuantity { quantity: 3 });
        assert_eq!(machine.context().quantity, Some(3));
        assert_eq!(machine.step(), S::Payment);
    }

    #[test]
    fn test_required_metadata() {
        let lock = LockConfig::builder()
            .metadata_inputs(vec![
                MetadataInput::builder()
                    .name("email")
                    .required(true)
                    .build(),
            ])
            .build();
        let mut machine = CheckoutMachine::new(config(lock), Some(me()));
        select(&mut machine);
        assert_eq!(machine.step(), S::Metadata);

        let recipients = vec!["0xfriend".to_string()];
        assert!(!machine.can(&E::SubmitRecipients {
            recipients: recipients.clone(),
            metadata: Vec::new(),
        }));
        assert!(!machine.can(&E::SubmitRecipients {
            recipients: Vec::new(),
            metadata: Vec::new(),
        }));

        machine.send(E::SubmitRecipients {
            recipients,
            metadata: vec![Record::from([(
                "email".to_string(),
                "friend@example.com".to_string(),
            )])],
        });
        assert_eq!(machine.step(), S::Payment);
        assert_eq!(machine.context().recipients, vec!["0xfriend"]);
    }

    #[test]
    fn test_message_and_gates_in_order() {
        let config = PaywallConfig::builder()
            .message_to_sign("Hello")
            .locks(Record::from([(
                LOCK.to_string(),
                LockConfig::builder().promo(true).captcha(true).build(),
            )]))
            .build();
        let mut machine = CheckoutMachine::new(config, Some(me()));
        select(&mut machine);
        assert_eq!(machine.step(), S::MessageToSign);

        assert!(!machine.can(&E::SignMessage(SignedMessage {
            address: "0xsomeoneelse".to_string(),
            signature: "0xsig".to_string(),
        })));
        machine.send(E::SignMessage(SignedMessage {
            address: "0xME".to_string(),
            signature: "0xsig".to_string(),
        }));
        assert_eq!(machine.step(), S::Promo);

        // A captcha answer is not a promo code.
        assert!(!machine.can(&E::SolveCaptcha {
            data: vec!["token".to_string()]
        }));
        machine.send(E::SubmitPromo {
            data: vec!["CODE".to_string()],
        });
        assert_eq!(machine.step(), S::Captcha);
        machine.send(E::SolveCaptcha {
            data: vec!["token".to_string()],
        });
        assert_eq!(machine.step(), S::Payment);
        assert_eq!(
            machine.context().gate_data.get(&Gate::Promo),
            Some(&vec!["CODE".to_string()])
        );

        machine.send(E::Back);
        assert_eq!(machine.step(), S::Captcha);
    }

    #[test]
    fn test_card_payment_requires_card() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        select(&mut machine);
        machine.send(E::SelectPaymentMethod {
            method: PaymentMethod::card(),
        });
        assert_eq!(machine.step(), S::Card);
        assert!(!machine.can(&E::SelectCardToCharge {
            card_id: String::new()
        }));

        machine.send(E::SelectCardToCharge {
            card_id: "card_1".to_string(),
        });
        assert_eq!(machine.step(), S::Confirm);
        assert_eq!(
            machine.snapshot().path,
            vec![S::Select, S::Payment, S::Card, S::Confirm, S::Minting]
        );

        machine.send(E::Back);
        assert_eq!(machine.step(), S::Card);
    }

    #[test]
    fn test_mint_lifecycle() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        let ticket = to_minting(&mut machine);
        assert_eq!(machine.step(), S::Minting);
        assert_eq!(machine.context().mint, Some(MintState::processing()));
        assert!(!machine.can(&E::Back));
        assert!(!machine.can(&E::UnlockAccount));

        machine.send(E::MintUpdated {
            ticket,
            mint: MintState::submitted("0xhash"),
        });
        assert_eq!(
            machine.context().mint.as_ref().and_then(|m| m.transaction_hash.as_deref()),
            Some("0xhash")
        );

        machine.send(E::MintUpdated {
            ticket,
            mint: MintState::finished(None),
        });
        assert_eq!(machine.step(), S::Returning);
        assert_eq!(machine.context().mint, Some(MintState::finished(Some("0xhash".to_string()))));
        assert!(machine.context().pending_mint.is_none());
    }

    #[test]
    fn test_mint_error_then_retry() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        let ticket = to_minting(&mut machine);
        assert!(!machine.can(&E::RetryMint));

        machine.send(E::MintUpdated {
            ticket,
            mint: MintState::error(None),
        });
        assert_eq!(machine.step(), S::Minting);
        assert!(machine.can(&E::Back));

        // The failed attempt reports nothing else.
        assert!(!machine.can(&E::MintUpdated {
            ticket,
            mint: MintState::finished(None),
        }));

        let retry = mint_ticket(&machine.send(E::RetryMint).effects());
        assert_ne!(retry, ticket);
        assert_eq!(machine.context().pending_mint, Some(retry));
    }

    #[test]
    fn test_stale_mint_result_is_dropped() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        let ticket = to_minting(&mut machine);

        let effects = machine.send(E::ResetCheckout).effects();
        assert_eq!(effects, vec![CheckoutEffect::Cancel { ticket }]);
        assert_eq!(machine.step(), S::Select);

        let late = E::MintUpdated {
            ticket,
            mint: MintState::finished(Some("0xhash".to_string())),
        };
        assert!(!machine.send(late).is_taken());
        assert!(machine.context().mint.is_none());
    }

    #[test]
    fn test_existing_member_and_another_purchase() {
        let mut machine = CheckoutMachine::new(
            config(LockConfig::builder().max_recipients(2).build()),
            Some(me()),
        );
        machine.send(E::SelectLock {
            lock: LOCK.to_string(),
            existing_member: true,
        });
        assert_eq!(machine.step(), S::Returning);

        machine.send(E::MakeAnotherPurchase);
        assert_eq!(machine.step(), S::Quantity);
        assert_eq!(machine.context().selected_lock.as_deref(), Some(LOCK));

        machine.send(E::Back);
        assert_eq!(machine.step(), S::Select);
    }

    #[test]
    fn test_account_required_after_select() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), None);
        select(&mut machine);
        assert_eq!(machine.step(), S::UnlockAccount);

        // BACK from the unlock returns to where the buyer was.
        machine.send(E::Back);
        assert_eq!(machine.step(), S::Select);

        select(&mut machine);
        let effects = machine
            .send(E::Child(UnlockAccountEvent::ChooseWallet))
            .effects();
        let (child, ticket) = match effects.as_slice() {
            [
                CheckoutEffect::Child {
                    child,
                    effect: UnlockAccountEffect::StartWalletConnect { ticket },
                },
            ] => (*child, *ticket),
            other => panic!("unexpected effects {other:?}"),
        };

        let effects = machine
            .send(E::ChildSettled {
                child,
                event: UnlockAccountEvent::WalletSettled {
                    ticket,
                    result: Ok(me()),
                },
            })
            .effects();
        assert_eq!(machine.step(), S::Payment);
        assert_eq!(machine.context().account, Some(me()));
        assert_eq!(
            effects,
            vec![
                CheckoutEffect::AccountChanged {
                    account: Some(me())
                },
                CheckoutEffect::ChildStopped { child },
            ]
        );
    }

    #[test]
    fn test_sign_out_mid_flow() {
        let mut machine = CheckoutMachine::new(
            config(LockConfig::builder().max_recipients(3).build()),
            Some(me()),
        );
        select(&mut machine);
        machine.send(E::SelectQuantity { quantity: 2 });
        assert_eq!(machine.step(), S::Payment);

        machine.send(E::AccountChanged { account: None });
        assert_eq!(machine.step(), S::UnlockAccount);
        assert_eq!(machine.context().quantity, Some(2));

        machine.send(E::Back);
        assert_eq!(machine.step(), S::Quantity);
    }

    #[test]
    fn test_external_sign_in_completes_unlock() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), None);
        select(&mut machine);
        assert_eq!(machine.step(), S::UnlockAccount);

        machine.send(E::AccountChanged {
            account: Some(me()),
        });
        assert_eq!(machine.step(), S::Payment);
        assert!(!machine.can(&E::AccountChanged {
            account: Some(me())
        }));
    }

    #[test]
    fn test_disconnect_clears_everything() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        select(&mut machine);
        let effects = machine.send(E::Disconnect).effects();
        assert_eq!(
            effects,
            vec![
                CheckoutEffect::Disconnect,
                CheckoutEffect::AccountChanged { account: None },
            ]
        );
        assert_eq!(machine.step(), S::Select);
        assert!(machine.context().account.is_none());
        assert!(machine.context().selected_lock.is_none());
    }

    #[test]
    fn test_update_config_moves_off_removed_gate() {
        let mut machine = CheckoutMachine::new(
            config(LockConfig::builder().password(true).build()),
            Some(me()),
        );
        select(&mut machine);
        assert_eq!(machine.step(), S::Password);

        let unchanged = E::UpdatePaywallConfig {
            config: Box::new(machine.context().paywall_config.clone()),
        };
        assert!(!machine.can(&unchanged));

        machine.send(E::UpdatePaywallConfig {
            config: Box::new(config(LockConfig::default())),
        });
        assert_eq!(machine.step(), S::Payment);
        assert_eq!(machine.context().selected_lock.as_deref(), Some(LOCK));
    }

    #[test]
    fn test_update_config_drops_removed_lock() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        select(&mut machine);
        let other = PaywallConfig::builder()
            .locks(Record::from([("0xBBB".to_string(), LockConfig::default())]))
            .build();
        machine.send(E::UpdatePaywallConfig {
            config: Box::new(other),
        });
        assert_eq!(machine.step(), S::Select);
        assert!(machine.context().selected_lock.is_none());
    }

    #[test]
    fn test_update_config_clamps_quantity() {
        let mut machine = CheckoutMachine::new(
            config(LockConfig::builder().max_recipients(5).build()),
            Some(me()),
        );
        select(&mut machine);
        machine.send(E::SelectQuantity { quantity: 4 });

        machine.send(E::UpdatePaywallConfig {
            config: Box::new(config(LockConfig::builder().max_recipients(2).build())),
        });
        assert_eq!(machine.context().quantity, Some(2));
        assert_eq!(machine.step(), S::Payment);
    }

    #[test]
    fn test_restore_submitted_mint() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        let ticket = to_minting(&mut machine);
        machine.send(E::MintUpdated {
            ticket,
            mint: MintState::submitted("0xhash"),
        });

        let json = serde_json::to_value(machine.persist()).unwrap();
        let mut restored = CheckoutMachine::restore_from_value(json).unwrap();
        assert_eq!(restored.step(), S::Minting);

        let effects = restored.start();
        let resumed = match effects.as_slice() {
            [
                CheckoutEffect::AccountChanged { .. },
                CheckoutEffect::AwaitMint {
                    ticket,
                    transaction_hash,
                },
            ] => {
                assert_eq!(transaction_hash, "0xhash");
                *ticket
            }
            other => panic!("unexpected effects {other:?}"),
        };
        assert_ne!(resumed, ticket);
        assert!(!restored.can(&E::MintUpdated {
            ticket,
            mint: MintState::finished(None)
        }));
    }

    #[test]
    fn test_restore_unsubmitted_mint_fails_it() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), Some(me()));
        to_minting(&mut machine);

        let restored = CheckoutMachine::restore(machine.persist());
        assert_eq!(restored.step(), S::Minting);
        assert!(restored.context().mint.as_ref().is_some_and(MintState::is_error));
        assert!(restored.can(&E::RetryMint));
    }

    #[test]
    fn test_restore_unlock_account() {
        let mut machine = CheckoutMachine::new(config(LockConfig::default()), None);
        select(&mut machine);
        machine.send(E::Child(UnlockAccountEvent::ChooseEmail));

        let restored = CheckoutMachine::restore(machine.persist());
        assert_eq!(restored.step(), S::UnlockAccount);
        assert_eq!(
            restored.unlock_account().map(|child| child.state_name()),
            Some("CHOOSE_METHOD")
        );
        assert_eq!(restored.persist().unlock_account, machine.persist().unlock_account);
    }
}
