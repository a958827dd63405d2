// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::Address;
use async_trait::async_trait;

/// USDC held by the sponsor to cover sponsored costs
#[async_trait]
pub trait SponsorReserve {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    async fn reserve_balance(&self, sponsor: Address) -> Result<u128, Self::AdapterError>;
}

/// Price of the native asset
#[async_trait]
pub trait PriceReference: Send + Sync + std::fmt::Debug {
    /// USDC base units per whole native unit (10^18 wei)
    async fn native_price(&self) -> anyhow::Result<u128>;
}

/// A price that never changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPrice(pub u128);

#[async_trait]
impl PriceReference for FixedPrice {
    async fn native_price(&self) -> anyhow::Result<u128> {
        Ok(self.0)
    }
}
