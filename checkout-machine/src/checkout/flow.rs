//! Navigation graph of the checkout.
//!
//! The graph depends on the configuration and on earlier choices, so it is
//! computed from the context on every query. Every function here is pure.

use checkout_core::types::MintStatus;

use crate::checkout::{context::CheckoutContext, step::CheckoutStep};

/// Ordered steps of the purchase path under the current context.
pub fn path(ctx: &CheckoutContext) -> Vec<CheckoutStep> {
    let mut steps = vec![CheckoutStep::Select];
    if !ctx.skip_quantity {
        steps.push(CheckoutStep::Quantity);
    }
    if !ctx.skip_recipient {
        steps.push(CheckoutStep::Metadata);
    }
    if ctx.paywall_config.message_to_sign.is_some() {
        steps.push(CheckoutStep::MessageToSign);
    }
    steps.extend(ctx.settings().gates.into_iter().map(CheckoutStep::gate));
    steps.push(CheckoutStep::Payment);
    if ctx
        .payment_method
        .as_ref()
        .is_some_and(|method| method.is_card())
    {
        steps.push(CheckoutStep::Card);
    }
    steps.push(CheckoutStep::Confirm);
    steps.push(CheckoutStep::Minting);
    steps
}

/// Whether `step` can be shown under the current context.
pub fn is_reachable(step: CheckoutStep, ctx: &CheckoutContext) -> bool {
    match step {
        CheckoutStep::Returning => ctx.selected_lock.is_some(),
        CheckoutStep::UnlockAccount => true,
        _ => path(ctx).contains(&step),
    }
}

/// The step `BACK` leads to from `step`, if any.
pub fn predecessor(step: CheckoutStep, ctx: &CheckoutContext) -> Option<CheckoutStep> {
    match step {
        CheckoutStep::Select | CheckoutStep::UnlockAccount => None,
        CheckoutStep::Returning => Some(CheckoutStep::Select),
        // A mint in flight cannot be walked away from.
        CheckoutStep::Minting
            if ctx.mint.as_ref().map(|mint| mint.status) != Some(MintStatus::Error) =>
        {
            None
        }
        _ => {
            let steps = path(ctx);
            let index = steps.iter().position(|s| *s == step)?;
            index.checked_sub(1).map(|i| steps[i])
        }
    }
}

/// The step following `step` on the purchase path.
pub fn successor(step: CheckoutStep, ctx: &CheckoutContext) -> Option<CheckoutStep> {
    let steps = path(ctx);
    let index = steps.iter().position(|s| *s == step)?;
    steps.get(index + 1).copied()
}

/// `step` if it is still reachable, otherwise the first reachable path step
/// ranked after it.
pub fn normalize(step: CheckoutStep, ctx: &CheckoutContext) -> CheckoutStep {
    if is_reachable(step, ctx) {
        return step;
    }
    if step == CheckoutStep::Returning {
        return CheckoutStep::Select;
    }
    path(ctx)
        .into_iter()
        .find(|s| s.rank() > step.rank())
        .unwrap_or(CheckoutStep::Select)
}

/// The first message or gate on the path before `step` whose data was not
/// provided.
pub fn first_unsatisfied(step: CheckoutStep, ctx: &CheckoutContext) -> Option<CheckoutStep> {
    let steps = path(ctx);
    if !steps.contains(&step) {
        return None;
    }
    steps
        .into_iter()
        .take_while(|s| *s != step)
        .find(|s| match s.as_gate() {
            Some(gate) => ctx.gate_data.get(&gate).is_none_or(|data| data.is_empty()),
            None => *s == CheckoutStep::MessageToSign && ctx.message_to_sign.is_none(),
        })
}

/// `step`, or the earlier step whose data it is still waiting for. A mint in
/// flight stays where it is.
pub fn rewind(step: CheckoutStep, ctx: &CheckoutContext) -> CheckoutStep {
    let in_flight = step == CheckoutStep::Minting
        && ctx.mint.as_ref().is_some_and(|mint| !mint.is_error());
    if in_flight {
        return step;
    }
    first_unsatisfied(step, ctx).unwrap_or(step)
}

/// The closest step at or before `step` that can be shown without an account.
pub fn last_public_step(step: CheckoutStep, ctx: &CheckoutContext) -> CheckoutStep {
    if !step.requires_account() {
        return step;
    }
    if step == CheckoutStep::Returning {
        return CheckoutStep::Select;
    }
    path(ctx)
        .into_iter()
        .take_while(|s| s.rank() <= step.rank())
        .filter(|s| !s.requires_account())
        .last()
        .unwrap_or(CheckoutStep::Select)
}
