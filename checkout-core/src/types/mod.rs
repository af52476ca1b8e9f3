//! Value types used across the checkout machines.

mod amount;
mod common;
mod mint;
mod payment;

pub use amount::*;
pub use common::*;
pub use mint::*;
pub use payment::*;
