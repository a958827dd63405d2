// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Order record

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// A merchant's request to receive a fixed USDC total
///
/// `received_amount` never exceeds `total_amount`, `is_completed` flips to
/// `true` exactly once and `protocol_fee_charged` stays zero until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: B256,
    pub merchant: Address,
    /// Target amount in USDC base units (6 decimals)
    pub total_amount: u128,
    pub received_amount: u128,
    pub protocol_fee_charged: u128,
    pub is_completed: bool,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Chain the merchant expects to be paid on; informational only
    pub destination_chain: u32,
}

impl Order {
    /// Returns an open order with nothing received yet
    pub fn new(
        order_id: B256,
        merchant: Address,
        total_amount: u128,
        destination_chain: u32,
        created_at: u64,
    ) -> Self {
        Self {
            order_id,
            merchant,
            total_amount,
            received_amount: 0,
            protocol_fee_charged: 0,
            is_completed: false,
            created_at,
            destination_chain,
        }
    }

    pub fn remaining_amount(&self) -> u128 {
        self.total_amount.saturating_sub(self.received_amount)
    }

    /// Whether contributions have reached the target
    pub fn is_funded(&self) -> bool {
        self.received_amount >= self.total_amount
    }

    pub fn progress(&self) -> OrderProgress {
        OrderProgress {
            total_amount: self.total_amount,
            received_amount: self.received_amount,
            remaining_amount: self.remaining_amount(),
            is_completed: self.is_completed,
        }
    }
}

/// Read-only view of how far an order is from its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProgress {
    pub total_amount: u128,
    pub received_amount: u128,
    pub remaining_amount: u128,
    pub is_completed: bool,
}

#[cfg(test)]
mod order_unit_test {
    use alloy_primitives::address;
    use rstest::*;

    use super::*;

    #[fixture]
    fn order() -> Order {
        Order::new(
            B256::repeat_byte(0x01),
            address!("beefbeefbeefbeefbeefbeefbeefbeefbeefbeef"),
            20_000_000,
            8453,
            1_700_000_000,
        )
    }

    #[rstest]
    fn new_order_is_open(order: Order) {
        assert_eq!(order.received_amount, 0);
        assert_eq!(order.protocol_fee_charged, 0);
        assert!(!order.is_completed);
        assert!(!order.is_funded());
        assert_eq!(
            order.progress(),
            OrderProgress {
                total_amount: 20_000_000,
                received_amount: 0,
                remaining_amount: 20_000_000,
                is_completed: false,
            }
        );
    }

    #[rstest]
    fn progress_tracks_received_amount(mut order: Order) {
        order.received_amount = 10_000_000;
        assert_eq!(order.remaining_amount(), 10_000_000);
        assert!(!order.is_funded());

        order.received_amount = 20_000_000;
        assert_eq!(order.remaining_amount(), 0);
        assert!(order.is_funded());
    }
}
