// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::SponsorshipError;

/// Costs are charged at 110% of the converted estimate.
pub const DEFAULT_MARKUP_PERCENT: u128 = 110;

/// Settings of a sponsorship ledger. All amounts are USDC base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorshipConfig {
    pub owner: Address,
    /// Only calls to this contract can be sponsored
    pub payment_contract: Address,
    /// Account whose USDC reserve backs sponsored costs
    pub sponsor: Address,
    pub daily_cap: u128,
    pub per_payer_cap: u128,
    /// Percentage applied to converted costs, at least 100
    pub markup_percent: u128,
    /// Smallest payment an operation must carry to be sponsored
    pub min_payment_amount: u128,
}

impl SponsorshipConfig {
    pub fn validate(&self) -> Result<(), SponsorshipError> {
        if self.owner.is_zero() {
            return Err(SponsorshipError::InvalidConfig {
                reason: "owner must not be the zero address".to_string(),
            });
        }
        if self.payment_contract.is_zero() {
            return Err(SponsorshipError::InvalidConfig {
                reason: "payment_contract must not be the zero address".to_string(),
            });
        }
        if self.markup_percent < 100 {
            return Err(SponsorshipError::InvalidConfig {
                reason: format!("markup_percent {} is below 100", self.markup_percent),
            });
        }
        Ok(())
    }
}
