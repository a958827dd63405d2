// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use pay_message::MessageId;
use pay_order::{Contribution, ContributionId, Order};
use serde::{Deserialize, Serialize};

/// Totals over every settled order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub orders_processed: u64,
    pub volume_processed: u128,
}

/// Insert or replace of an order record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderChange {
    /// Must not exist yet
    Insert(Order),
    /// Must already exist
    Update(Order),
}

/// Everything one ledger operation changes, applied in a single commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerWrite {
    pub orders: Vec<OrderChange>,
    /// Contributions are write-once: a stored id must be rejected
    pub contributions: Vec<Contribution>,
    /// Markers are write-once: an already marked id must be rejected
    pub processed_messages: Vec<MessageId>,
    /// Amounts added to each merchant's running total
    pub merchant_credits: Vec<(Address, u128)>,
    /// Added to the stored totals
    pub stats: LedgerStats,
}

impl LedgerWrite {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
            && self.contributions.is_empty()
            && self.processed_messages.is_empty()
            && self.merchant_credits.is_empty()
            && self.stats == LedgerStats::default()
    }
}

/// Reads ledger state
///
/// # Example
///
/// For example code see [crate::manager::context::memory::InMemoryContext]
#[async_trait]
pub trait LedgerRead {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    async fn order(&self, order_id: B256) -> Result<Option<Order>, Self::AdapterError>;

    async fn contribution(
        &self,
        contribution_id: ContributionId,
    ) -> Result<Option<Contribution>, Self::AdapterError>;

    /// Contributions of an order, in the order they were accepted
    async fn order_contributions(
        &self,
        order_id: B256,
    ) -> Result<Vec<Contribution>, Self::AdapterError>;

    /// Number of contributions accepted for an order so far
    async fn contribution_count(&self, order_id: B256) -> Result<u64, Self::AdapterError>;

    async fn is_message_processed(&self, message_id: MessageId)
        -> Result<bool, Self::AdapterError>;

    /// Running total paid out to `merchant`, zero if never paid
    async fn merchant_balance(&self, merchant: Address) -> Result<u128, Self::AdapterError>;

    async fn stats(&self) -> Result<LedgerStats, Self::AdapterError>;
}

/// Persists ledger state
///
/// # Example
///
/// For example code see [crate::manager::context::memory::InMemoryContext]
#[async_trait]
pub trait LedgerStore {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    /// Applies `write` as a whole or not at all.
    ///
    /// Implementations must reject the write, leaving state untouched, when it
    /// inserts an order that exists, updates one that does not, stores a
    /// contribution id twice or marks a message that is already marked.
    async fn commit(&self, write: LedgerWrite) -> Result<(), Self::AdapterError>;
}
