// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Token operations the gateway performs on behalf of the settlement chain.
//!
//! Balances live in the same in-memory context the ledger settles against, so
//! a deployment without a chain needs a way to put USDC in payer accounts,
//! approve custody and deliver bridged funds before the relay path runs.

use alloy_primitives::Address;
use log::info;
use pay_core::{
    manager::{adapters::FundsCustody, context::memory::InMemoryContext, Manager},
    Error,
};
use serde::{Deserialize, Serialize};

/// Balance and custody allowance of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFunds {
    pub balance: u128,
    pub custody_allowance: u128,
}

fn context_error(err: pay_core::manager::context::memory::InMemoryError) -> Error {
    Error::AdapterError {
        source_error: anyhow::Error::new(err),
    }
}

/// Issues `amount` to `account`. Only the ledger owner may deposit.
pub async fn deposit(
    ledger: &Manager<InMemoryContext>,
    caller: Address,
    account: Address,
    amount: u128,
) -> Result<AccountFunds, Error> {
    let owner = ledger.config().await.owner;
    if caller != owner {
        return Err(Error::Unauthorized { caller });
    }
    if amount == 0 {
        return Err(Error::InvalidAmount);
    }
    ledger.context().mint(account, amount).map_err(context_error)?;
    info!("Deposited {amount} to {account}");
    account_funds(ledger, account).await
}

/// Sets the custody allowance of `owner` to `amount`, replacing the previous one.
pub async fn approve_custody(
    ledger: &Manager<InMemoryContext>,
    owner: Address,
    amount: u128,
) -> Result<AccountFunds, Error> {
    let custody = ledger.config().await.custody;
    ledger
        .context()
        .approve(owner, custody, amount)
        .map_err(context_error)?;
    account_funds(ledger, owner).await
}

/// Delivers `amount` of bridged USDC to custody. Only the trusted relayer may
/// do so, ahead of the matching relayed message.
pub async fn credit_custody(
    ledger: &Manager<InMemoryContext>,
    caller: Address,
    amount: u128,
) -> Result<AccountFunds, Error> {
    let config = ledger.config().await;
    if config.trusted_relayer.is_zero() || caller != config.trusted_relayer {
        return Err(Error::Unauthorized { caller });
    }
    if amount == 0 {
        return Err(Error::InvalidAmount);
    }
    ledger
        .context()
        .mint(config.custody, amount)
        .map_err(context_error)?;
    info!("Bridge delivered {amount} to custody");
    account_funds(ledger, config.custody).await
}

pub async fn account_funds(
    ledger: &Manager<InMemoryContext>,
    account: Address,
) -> Result<AccountFunds, Error> {
    let custody = ledger.config().await.custody;
    let context = ledger.context();
    Ok(AccountFunds {
        balance: context.balance_of(account).await.map_err(context_error)?,
        custody_allowance: context
            .allowance(account, custody)
            .await
            .map_err(context_error)?,
    })
}
