// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Protocol fee charged on every completed order, in basis points (5%).
pub const PROTOCOL_FEE_BPS: u128 = 500;

/// One hundred percent, in basis points.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Split of an order total between the merchant and the protocol fee recipient
///
/// The fee is computed once on the order total, never per contribution, so
/// partial payments cannot accumulate rounding drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub total_amount: u128,
    pub merchant_amount: u128,
    pub protocol_fee: u128,
}

impl FeeSplit {
    /// `protocol_fee = floor(total * PROTOCOL_FEE_BPS / BPS_DENOMINATOR)`, the
    /// merchant receives the rest.
    pub fn for_total(total_amount: u128) -> Self {
        // Split the product so it cannot overflow for any u128 total.
        let whole = total_amount / BPS_DENOMINATOR * PROTOCOL_FEE_BPS;
        let rest = total_amount % BPS_DENOMINATOR * PROTOCOL_FEE_BPS / BPS_DENOMINATOR;
        let protocol_fee = whole + rest;
        Self {
            total_amount,
            merchant_amount: total_amount - protocol_fee,
            protocol_fee,
        }
    }
}
