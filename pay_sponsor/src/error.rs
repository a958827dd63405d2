// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::{Address, U256};

#[derive(thiserror::Error, Debug)]
pub enum SponsorshipError {
    #[error("Operation cannot be sponsored: {reason}")]
    IneligibleOperation { reason: String },
    #[error("No price reference is configured")]
    PriceReferenceUnset,
    #[error("Payment of {payment_amount} is below the sponsorable minimum {minimum}")]
    PaymentTooSmall { payment_amount: U256, minimum: u128 },
    #[error("Cost {cost} on top of {used} spent today exceeds the daily cap {cap}")]
    ExceedsDailyLimit { used: u128, cost: u128, cap: u128 },
    #[error("Cost {cost} on top of {used} spent today by {payer} exceeds the per-payer cap {cap}")]
    ExceedsUserLimit {
        payer: Address,
        used: u128,
        cost: u128,
        cap: u128,
    },
    #[error("Sponsor reserve {available} is below the cost {required}")]
    InsufficientSponsorBalance { available: u128, required: u128 },
    #[error("{caller} is not authorized to perform this operation")]
    Unauthorized { caller: Address },
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
    #[error("Sponsorship {id} is not outstanding")]
    UnknownSponsorship { id: u64 },
    #[error("Converted cost does not fit in 128 bits")]
    CostOverflow,
    #[error("Error from adapter.\n Caused by: {source_error}")]
    AdapterError { source_error: anyhow::Error },
}
