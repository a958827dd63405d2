// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One USDC movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transfer {
    /// Moves `amount` from `from` to `to`, spending the allowance `from`
    /// granted to `to`
    Pull {
        from: Address,
        to: Address,
        amount: u128,
    },
    /// Moves `amount` out of an account the ledger controls
    Push {
        from: Address,
        to: Address,
        amount: u128,
    },
}

impl Transfer {
    pub fn amount(&self) -> u128 {
        match self {
            Transfer::Pull { amount, .. } | Transfer::Push { amount, .. } => *amount,
        }
    }

    /// The movement that undoes this one: funds go back from `to` to `from`.
    ///
    /// A spent allowance is not restored.
    pub fn reversed(&self) -> Transfer {
        match *self {
            Transfer::Pull { from, to, amount } | Transfer::Push { from, to, amount } => {
                Transfer::Push {
                    from: to,
                    to: from,
                    amount,
                }
            }
        }
    }
}

/// Transfers that undo `transfers`, last one first
pub fn unwind_batch(transfers: &[Transfer]) -> Vec<Transfer> {
    transfers.iter().rev().map(Transfer::reversed).collect()
}

/// Token balances and movements
///
/// # Example
///
/// For example code see [crate::manager::context::memory::InMemoryContext]
#[async_trait]
pub trait FundsCustody {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    async fn balance_of(&self, account: Address) -> Result<u128, Self::AdapterError>;

    async fn allowance(&self, owner: Address, spender: Address)
        -> Result<u128, Self::AdapterError>;

    /// Executes every transfer in order, or none of them.
    ///
    /// A failure anywhere in the batch must leave all balances and allowances
    /// as they were before the call.
    ///
    /// When the ledger cannot commit after a successful batch it calls this
    /// again with [`unwind_batch`] of the same transfers, so pushed payouts
    /// must stay recoverable by the custody account until the call returns.
    ///
    /// Implementations must not call back into the manager, neither directly
    /// nor from a spawned task they wait on. A direct call fails with
    /// [`crate::Error::ReentrantCall`]; a call from another task waits for the
    /// execution lock this call holds and never completes.
    async fn execute_transfers(&self, transfers: &[Transfer]) -> Result<(), Self::AdapterError>;
}
