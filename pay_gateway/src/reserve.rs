// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::Address;
use async_trait::async_trait;
use pay_core::manager::context::memory::{InMemoryContext, InMemoryError};
use pay_sponsor::SponsorReserve;

/// Sponsor reserve read from the ledger's token balances
#[derive(Debug, Clone)]
pub struct CustodyReserve {
    context: InMemoryContext,
}

impl CustodyReserve {
    pub fn new(context: InMemoryContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl SponsorReserve for CustodyReserve {
    type AdapterError = InMemoryError;

    async fn reserve_balance(&self, sponsor: Address) -> Result<u128, Self::AdapterError> {
        self.context.balance(sponsor)
    }
}
