// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The `manager` module is the entry point for every ledger operation.
//!
//! [`Manager`] registers orders, accepts local and relayed contributions,
//! settles orders when they are fully funded and exposes the owner's
//! administrative controls. State, funds and notifications are reached
//! through the user-defined adapters in [`adapters`].
//!
//! Every state-changing call holds the manager's execution lock for its whole
//! duration, so calls never interleave. A call that re-enters the same manager
//! from inside an adapter fails with [`crate::Error::ReentrantCall`].

pub mod adapters;
mod admin;
#[cfg(feature = "in_memory")]
pub mod context;
mod intake;
mod ledger_manager;
mod settlement;

pub use intake::ContributionReceipt;
pub use ledger_manager::Manager;

use crate::Error;

fn adapter_error<T>(err: T) -> Error
where
    T: std::error::Error + Send + Sync + 'static,
{
    Error::AdapterError {
        source_error: anyhow::Error::new(err),
    }
}
