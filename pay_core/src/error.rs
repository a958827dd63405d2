// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::{Address, B256, U256};
use pay_message::{MessageId, PayloadError};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Merchant must not be the zero address")]
    InvalidMerchant,
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Order {order_id} already exists")]
    OrderExists { order_id: B256 },
    #[error("Order {order_id} not found")]
    OrderNotFound { order_id: B256 },
    #[error("Order {order_id} is already completed")]
    OrderAlreadyCompleted { order_id: B256 },
    #[error("Contribution of {amount} exceeds the {remaining} remaining on order {order_id}")]
    OrderOverpayment {
        order_id: B256,
        amount: U256,
        remaining: u128,
    },
    #[error("Balance of {account} is {available}, {required} required")]
    InsufficientFunds {
        account: Address,
        available: u128,
        required: u128,
    },
    #[error("Allowance granted by {owner} is {available}, {required} required")]
    InsufficientAuthorization {
        owner: Address,
        available: u128,
        required: u128,
    },
    #[error("{caller} is not authorized to perform this operation")]
    Unauthorized { caller: Address },
    #[error("Relay message {message_id} was already processed")]
    MessageAlreadyProcessed { message_id: MessageId },
    #[error("Malformed relay payload: {0}")]
    MalformedPayload(#[from] PayloadError),
    #[error("Ledger is paused")]
    Paused,
    #[error("Reentrant call into the ledger")]
    ReentrantCall,
    #[error("Transfer batch failed: {reason}")]
    TransferFailed { reason: String },
    #[error("State commit failed and the transfers could not be reversed: {reason}")]
    UnwindFailed { reason: String },
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
    #[error("Error from adapter.\n Caused by: {source_error}")]
    AdapterError { source_error: anyhow::Error },
}

/// Category of an [`Error`], used to pick the response given to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The request itself is invalid
    InputValidation,
    /// The request conflicts with the current ledger state
    StateConsistency,
    /// The relay message was already handled
    Replay,
    /// Funds, allowances or transfers fell short
    Resource,
    /// The caller may not perform the operation
    Authorization,
    /// Something outside the caller's control failed
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidMerchant
            | Error::InvalidAmount
            | Error::MalformedPayload(_)
            | Error::InvalidConfig { .. } => ErrorKind::InputValidation,
            Error::OrderExists { .. }
            | Error::OrderNotFound { .. }
            | Error::OrderAlreadyCompleted { .. }
            | Error::OrderOverpayment { .. }
            | Error::Paused => ErrorKind::StateConsistency,
            Error::MessageAlreadyProcessed { .. } => ErrorKind::Replay,
            Error::InsufficientFunds { .. }
            | Error::InsufficientAuthorization { .. }
            | Error::TransferFailed { .. } => ErrorKind::Resource,
            Error::Unauthorized { .. } => ErrorKind::Authorization,
            Error::ReentrantCall | Error::UnwindFailed { .. } | Error::AdapterError { .. } => {
                ErrorKind::Internal
            }
        }
    }
}
