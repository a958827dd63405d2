// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::ContributionId;

/// Notifications published by the ledger after a state change is committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    OrderCreated {
        order_id: B256,
        merchant: Address,
        total_amount: u128,
        destination_chain: u32,
    },
    ContributionReceived {
        order_id: B256,
        contribution_id: ContributionId,
        contributor: B256,
        amount: u128,
        source_chain: u32,
        is_cross_chain: bool,
    },
    OrderCompleted {
        order_id: B256,
        merchant: Address,
        total_amount: u128,
        merchant_amount: u128,
        protocol_fee: u128,
    },
    Paused {
        by: Address,
    },
    Unpaused {
        by: Address,
    },
    FeeRecipientUpdated {
        previous: Address,
        current: Address,
    },
    RelayerUpdated {
        previous: Address,
        current: Address,
    },
    OwnershipTransferred {
        previous: Address,
        current: Address,
    },
    EmergencyWithdrawal {
        to: Address,
        amount: u128,
    },
}

impl LedgerEvent {
    /// Order the event refers to, if any
    pub fn order_id(&self) -> Option<B256> {
        match self {
            LedgerEvent::OrderCreated { order_id, .. }
            | LedgerEvent::ContributionReceived { order_id, .. }
            | LedgerEvent::OrderCompleted { order_id, .. } => Some(*order_id),
            _ => None,
        }
    }
}
