// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Context adapters for the ledger manager.
//!
//! The manager never touches storage, funds or subscribers directly. Each
//! concern is an adapter implemented by the embedding application, which keeps
//! the settlement rules independent of where state lives and how tokens move.

mod custody;
mod events;
mod ledger;

pub use custody::{unwind_batch, FundsCustody, Transfer};
pub use events::EventSink;
pub use ledger::{LedgerRead, LedgerStats, LedgerStore, LedgerWrite, OrderChange};
