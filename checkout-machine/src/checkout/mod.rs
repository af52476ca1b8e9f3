//! The purchase flow.
//!
//! [`CheckoutMachine`] walks the buyer from lock selection to a minted key.
//! Which steps are visited depends on the [`PaywallConfig`] and on earlier
//! choices; [`flow`] computes that graph.
//!
//! [`PaywallConfig`]: checkout_core::config::PaywallConfig

mod context;
mod event;
pub mod flow;
mod machine;
mod snapshot;
mod step;

pub use context::*;
pub use event::*;
pub use machine::*;
pub use snapshot::*;
pub use step::*;
