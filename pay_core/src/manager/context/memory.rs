// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory context implementation for the ledger manager.
//!
//! This module provides an in-memory implementation of every adapter, with a
//! simple token ledger standing in for USDC. It is useful for testing,
//! development and single-process deployments of the gateway.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use pay_message::MessageId;
use pay_order::{Clock, Contribution, ContributionId, LedgerEvent, Order, SystemClock};
use thiserror::Error;

use crate::manager::adapters::*;

#[derive(Debug, Error)]
pub enum InMemoryError {
    #[error("write conflicts with stored state: {reason}")]
    Conflict { reason: String },
    #[error("transfer rejected: {reason}")]
    TransferRejected { reason: String },
    #[error("event delivery is switched off")]
    EventsUnavailable,
    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct LedgerState {
    orders: HashMap<B256, Order>,
    contributions: HashMap<ContributionId, Contribution>,
    order_contributions: HashMap<B256, Vec<ContributionId>>,
    processed_messages: HashSet<MessageId>,
    merchant_balances: HashMap<Address, u128>,
    stats: LedgerStats,
}

impl LedgerState {
    fn check(&self, write: &LedgerWrite) -> Result<(), InMemoryError> {
        let conflict = |reason: String| Err(InMemoryError::Conflict { reason });

        for change in &write.orders {
            match change {
                OrderChange::Insert(order) if self.orders.contains_key(&order.order_id) => {
                    return conflict(format!("order {} already exists", order.order_id));
                }
                OrderChange::Update(order) if !self.orders.contains_key(&order.order_id) => {
                    return conflict(format!("order {} does not exist", order.order_id));
                }
                _ => {}
            }
        }
        let mut contribution_ids = HashSet::new();
        for contribution in &write.contributions {
            let id = contribution.contribution_id;
            if self.contributions.contains_key(&id) || !contribution_ids.insert(id) {
                return conflict(format!("contribution {id} already stored"));
            }
        }
        let mut message_ids = HashSet::new();
        for message_id in &write.processed_messages {
            if self.processed_messages.contains(message_id) || !message_ids.insert(*message_id) {
                return conflict(format!("message {message_id} already processed"));
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: LedgerWrite) {
        for change in write.orders {
            let (OrderChange::Insert(order) | OrderChange::Update(order)) = change;
            self.orders.insert(order.order_id, order);
        }
        for contribution in write.contributions {
            self.order_contributions
                .entry(contribution.order_id)
                .or_default()
                .push(contribution.contribution_id);
            self.contributions
                .insert(contribution.contribution_id, contribution);
        }
        self.processed_messages.extend(write.processed_messages);
        for (merchant, amount) in write.merchant_credits {
            let balance = self.merchant_balances.entry(merchant).or_default();
            *balance = balance.saturating_add(amount);
        }
        self.stats.orders_processed = self
            .stats
            .orders_processed
            .saturating_add(write.stats.orders_processed);
        self.stats.volume_processed = self
            .stats
            .volume_processed
            .saturating_add(write.stats.volume_processed);
    }
}

#[derive(Debug, Default, Clone)]
struct TokenState {
    balances: HashMap<Address, u128>,
    /// (owner, spender) -> remaining allowance
    allowances: HashMap<(Address, Address), u128>,
    /// Accounts that refuse incoming transfers
    blocked: HashSet<Address>,
}

impl TokenState {
    fn balance(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn debit(&mut self, account: Address, amount: u128) -> Result<(), InMemoryError> {
        let held = self.balance(account);
        let remaining = held
            .checked_sub(amount)
            .ok_or_else(|| InMemoryError::TransferRejected {
                reason: format!("{account} holds {held}, {amount} required"),
            })?;
        self.balances.insert(account, remaining);
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: u128) -> Result<(), InMemoryError> {
        if self.blocked.contains(&account) {
            return Err(InMemoryError::TransferRejected {
                reason: format!("{account} refuses incoming transfers"),
            });
        }
        let total = self
            .balance(account)
            .checked_add(amount)
            .ok_or_else(|| InMemoryError::TransferRejected {
                reason: format!("balance of {account} would overflow"),
            })?;
        self.balances.insert(account, total);
        Ok(())
    }

    fn apply(&mut self, transfer: &Transfer) -> Result<(), InMemoryError> {
        match *transfer {
            Transfer::Pull { from, to, amount } => {
                let granted = self.allowances.get(&(from, to)).copied().unwrap_or_default();
                let remaining =
                    granted
                        .checked_sub(amount)
                        .ok_or_else(|| InMemoryError::TransferRejected {
                            reason: format!("allowance of {from} to {to} is {granted}, {amount} required"),
                        })?;
                self.allowances.insert((from, to), remaining);
                self.debit(from, amount)?;
                self.credit(to, amount)
            }
            Transfer::Push { from, to, amount } => {
                self.debit(from, amount)?;
                self.credit(to, amount)
            }
        }
    }
}

pub type EventLog = Arc<RwLock<Vec<LedgerEvent>>>;

#[derive(Clone, Debug)]
pub struct InMemoryContext {
    ledger: Arc<RwLock<LedgerState>>,
    tokens: Arc<RwLock<TokenState>>,
    events: EventLog,
    events_available: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryContext {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        InMemoryContext {
            ledger: Default::default(),
            tokens: Default::default(),
            events: Default::default(),
            events_available: Arc::new(AtomicBool::new(true)),
            clock,
        }
    }

    /// Creates `amount` tokens out of thin air for `account`
    pub fn mint(&self, account: Address, amount: u128) -> Result<(), InMemoryError> {
        let mut tokens = self.tokens.write().map_err(|_| InMemoryError::Poisoned)?;
        let balance = tokens.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
        Ok(())
    }

    /// Sets the allowance `owner` grants to `spender`
    pub fn approve(
        &self,
        owner: Address,
        spender: Address,
        amount: u128,
    ) -> Result<(), InMemoryError> {
        let mut tokens = self.tokens.write().map_err(|_| InMemoryError::Poisoned)?;
        tokens.allowances.insert((owner, spender), amount);
        Ok(())
    }

    pub fn balance(&self, account: Address) -> Result<u128, InMemoryError> {
        let tokens = self.tokens.read().map_err(|_| InMemoryError::Poisoned)?;
        Ok(tokens.balance(account))
    }

    /// Makes every transfer into `account` fail
    pub fn block_recipient(&self, account: Address) -> Result<(), InMemoryError> {
        let mut tokens = self.tokens.write().map_err(|_| InMemoryError::Poisoned)?;
        tokens.blocked.insert(account);
        Ok(())
    }

    pub fn unblock_recipient(&self, account: Address) -> Result<(), InMemoryError> {
        let mut tokens = self.tokens.write().map_err(|_| InMemoryError::Poisoned)?;
        tokens.blocked.remove(&account);
        Ok(())
    }

    /// While `false`, publishing fails with [`InMemoryError::EventsUnavailable`]
    pub fn set_events_available(&self, available: bool) {
        self.events_available.store(available, Ordering::SeqCst);
    }

    pub fn published_events(&self) -> Result<Vec<LedgerEvent>, InMemoryError> {
        Ok(self
            .events
            .read()
            .map_err(|_| InMemoryError::Poisoned)?
            .clone())
    }
}

impl Clock for InMemoryContext {
    fn now_secs(&self) -> u64 {
        self.clock.now_secs()
    }
}

#[async_trait]
impl LedgerRead for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn order(&self, order_id: B256) -> Result<Option<Order>, Self::AdapterError> {
        let ledger = self.ledger.read().map_err(|_| InMemoryError::Poisoned)?;
        Ok(ledger.orders.get(&order_id).cloned())
    }

    async fn contribution(
        &self,
        contribution_id: ContributionId,
    ) -> Result<Option<Contribution>, Self::AdapterError> {
        let ledger = self.ledger.read().map_err(|_| InMemoryError::Poisoned)?;
        Ok(ledger.contributions.get(&contribution_id).cloned())
    }

    async fn order_contributions(
        &self,
        order_id: B256,
    ) -> Result<Vec<Contribution>, Self::AdapterError> {
        let ledger = self.ledger.read().map_err(|_| InMemoryError::Poisoned)?;
        Ok(ledger
            .order_contributions
            .get(&order_id)
            .into_iter()
            .flatten()
            .filter_map(|id| ledger.contributions.get(id).cloned())
            .collect())
    }

    async fn contribution_count(&self, order_id: B256) -> Result<u64, Self::AdapterError> {
        let ledger = self.ledger.read().map_err(|_| InMemoryError::Poisoned)?;
        Ok(ledger
            .order_contributions
            .get(&order_id)
            .map_or(0, |ids| ids.len() as u64))
    }

    async fn is_message_processed(
        &self,
        message_id: MessageId,
    ) -> Result<bool, Self::AdapterError> {
        let ledger = self.ledger.read().map_err(|_| InMemoryError::Poisoned)?;
        Ok(ledger.processed_messages.contains(&message_id))
    }

    async fn merchant_balance(&self, merchant: Address) -> Result<u128, Self::AdapterError> {
        let ledger = self.ledger.read().map_err(|_| InMemoryError::Poisoned)?;
        Ok(ledger
            .merchant_balances
            .get(&merchant)
            .copied()
            .unwrap_or_default())
    }

    async fn stats(&self) -> Result<LedgerStats, Self::AdapterError> {
        let ledger = self.ledger.read().map_err(|_| InMemoryError::Poisoned)?;
        Ok(ledger.stats)
    }
}

#[async_trait]
impl LedgerStore for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn commit(&self, write: LedgerWrite) -> Result<(), Self::AdapterError> {
        let mut ledger = self.ledger.write().map_err(|_| InMemoryError::Poisoned)?;
        ledger.check(&write)?;
        ledger.apply(write);
        Ok(())
    }
}

#[async_trait]
impl FundsCustody for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn balance_of(&self, account: Address) -> Result<u128, Self::AdapterError> {
        self.balance(account)
    }

    async fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<u128, Self::AdapterError> {
        let tokens = self.tokens.read().map_err(|_| InMemoryError::Poisoned)?;
        Ok(tokens
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn execute_transfers(&self, transfers: &[Transfer]) -> Result<(), Self::AdapterError> {
        let mut tokens = self.tokens.write().map_err(|_| InMemoryError::Poisoned)?;
        let mut staged = tokens.clone();
        for transfer in transfers {
            staged.apply(transfer)?;
        }
        *tokens = staged;
        Ok(())
    }
}

#[async_trait]
impl EventSink for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn publish(&self, event: &LedgerEvent) -> Result<(), Self::AdapterError> {
        if !self.events_available.load(Ordering::SeqCst) {
            return Err(InMemoryError::EventsUnavailable);
        }
        self.events
            .write()
            .map_err(|_| InMemoryError::Poisoned)?
            .push(event.clone());
        Ok(())
    }
}
