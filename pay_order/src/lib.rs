// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Order ledger records
//!
//! These structs are shared by the settlement ledger, the sponsorship ledger
//! and the gateway: orders, the contributions that fill them, the fee split
//! applied on completion, the notifications the ledger publishes and the ABI
//! of the payment contract whose calls can be sponsored.
//!

pub mod abi;
mod clock;
mod contribution;
mod event;
mod fee;
mod order;

pub use clock::{Clock, ManualClock, SystemClock, SECONDS_PER_DAY};
pub use contribution::{Contribution, ContributionId, ContributionSource};
pub use event::LedgerEvent;
pub use fee::{FeeSplit, BPS_DENOMINATOR, PROTOCOL_FEE_BPS};
pub use order::{Order, OrderProgress};
