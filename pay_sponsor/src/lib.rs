// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Gas sponsorship ledger
//!
//! A sponsor pays the native gas of order creation and direct contributions
//! and is repaid in USDC. [`SponsorshipLedger`] decides whether an operation
//! may be sponsored and keeps the spent amount within a global daily cap and
//! a per-payer daily cap.
//!
//! Costs are converted from wei to USDC base units through a
//! [`PriceReference`] and marked up to absorb price movement between
//! estimation and execution. After execution the estimate is reconciled
//! against the actual cost and any overestimate is credited back to both caps.
//! Days are `unix_seconds / 86_400`; counters reset lazily on the first call
//! of a new day.

mod adapters;
mod config;
mod cost;
mod error;
mod ledger;

pub use adapters::{FixedPrice, PriceReference, SponsorReserve};
pub use config::{SponsorshipConfig, DEFAULT_MARKUP_PERCENT};
pub use cost::{marked_up_cost, WEI_PER_NATIVE};
pub use error::SponsorshipError;
pub use ledger::{
    ExecutionOutcome, OperationDescriptor, Reconciliation, RemainingBudget, SponsorshipContext,
    SponsorshipLedger,
};
