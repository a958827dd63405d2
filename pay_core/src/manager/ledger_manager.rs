// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use alloy_primitives::{Address, B256};
use log::{debug, error, warn};
use pay_message::MessageId;
use pay_order::{Clock, Contribution, ContributionId, LedgerEvent, Order, OrderProgress};
use tokio::sync::{Mutex, RwLock};

use super::{
    adapter_error,
    adapters::{
        unwind_batch, EventSink, FundsCustody, LedgerRead, LedgerStats, LedgerStore, LedgerWrite,
        OrderChange, Transfer,
    },
};
use crate::{Error, LedgerConfig};

tokio::task_local! {
    /// Managers the current task is executing a guarded call on
    static ACTIVE_LEDGERS: Vec<u64>;
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub(super) struct AdminState {
    pub config: LedgerConfig,
    pub paused: bool,
}

/// Staged effects of one operation: funds move first, then the write is
/// committed, then events go out.
#[derive(Debug, Default)]
pub(super) struct ExecutionPlan {
    pub write: LedgerWrite,
    pub transfers: Vec<Transfer>,
    pub events: Vec<LedgerEvent>,
}

pub struct Manager<E> {
    /// Context that implements adapters
    context: E,

    /// Configuration and pause flag, changed only by the owner
    pub(super) admin: RwLock<AdminState>,

    /// Held for the whole duration of every state-changing call
    execution_lock: Mutex<()>,

    instance: u64,
}

impl<E> Manager<E> {
    /// Creates a ledger manager over `context`, running unpaused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate
    pub fn new(config: LedgerConfig, context: E) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            context,
            admin: RwLock::new(AdminState {
                config,
                paused: false,
            }),
            execution_lock: Mutex::new(()),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        })
    }

    pub fn context(&self) -> &E {
        &self.context
    }

    pub async fn config(&self) -> LedgerConfig {
        self.admin.read().await.config.clone()
    }

    pub async fn is_paused(&self) -> bool {
        self.admin.read().await.paused
    }

    /// Runs `operation` under the execution lock.
    ///
    /// The re-entry check must happen before waiting on the lock: a nested
    /// call from the task that holds it would otherwise wait forever.
    ///
    /// The check follows the calling task only. An adapter that spawns a task
    /// calling back into this manager and then waits for it deadlocks, since
    /// the spawned task starts without the active list and queues on the lock.
    pub(super) async fn guarded<T, F>(&self, operation: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let mut active = ACTIVE_LEDGERS.try_with(Clone::clone).unwrap_or_default();
        if active.contains(&self.instance) {
            warn!("Rejected reentrant call into ledger {}", self.instance);
            return Err(Error::ReentrantCall);
        }
        active.push(self.instance);

        let _lock = self.execution_lock.lock().await;
        ACTIVE_LEDGERS.scope(active, operation).await
    }

    /// Current configuration, failing while the ledger is paused
    pub(super) async fn unpaused_config(&self) -> Result<LedgerConfig, Error> {
        let admin = self.admin.read().await;
        if admin.paused {
            return Err(Error::Paused);
        }
        Ok(admin.config.clone())
    }
}

impl<E> Manager<E>
where
    E: LedgerRead,
{
    /// # Errors
    ///
    /// Returns [`Error::OrderNotFound`] for an unknown order id
    pub async fn get_order(&self, order_id: B256) -> Result<Order, Error> {
        self.context
            .order(order_id)
            .await
            .map_err(adapter_error)?
            .ok_or(Error::OrderNotFound { order_id })
    }

    /// # Errors
    ///
    /// Returns [`Error::OrderNotFound`] for an unknown order id
    pub async fn get_order_progress(&self, order_id: B256) -> Result<OrderProgress, Error> {
        Ok(self.get_order(order_id).await?.progress())
    }

    pub async fn get_contribution(
        &self,
        contribution_id: ContributionId,
    ) -> Result<Option<Contribution>, Error> {
        self.context
            .contribution(contribution_id)
            .await
            .map_err(adapter_error)
    }

    /// Contributions of an order, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrderNotFound`] for an unknown order id
    pub async fn get_order_contributions(&self, order_id: B256) -> Result<Vec<Contribution>, Error> {
        self.get_order(order_id).await?;
        self.context
            .order_contributions(order_id)
            .await
            .map_err(adapter_error)
    }

    pub async fn merchant_balance(&self, merchant: Address) -> Result<u128, Error> {
        self.context
            .merchant_balance(merchant)
            .await
            .map_err(adapter_error)
    }

    pub async fn is_message_processed(&self, message_id: MessageId) -> Result<bool, Error> {
        self.context
            .is_message_processed(message_id)
            .await
            .map_err(adapter_error)
    }

    pub async fn stats(&self) -> Result<LedgerStats, Error> {
        self.context.stats().await.map_err(adapter_error)
    }
}

impl<E> Manager<E>
where
    E: EventSink,
{
    pub(super) async fn publish(&self, event: &LedgerEvent) {
        if let Err(err) = self.context.publish(event).await {
            warn!("Failed to publish {event:?}: {err}");
        }
    }
}

impl<E> Manager<E>
where
    E: LedgerStore + FundsCustody + EventSink,
{
    /// Moves funds, commits state, then publishes events.
    ///
    /// Nothing is committed when the transfer batch fails. When the commit
    /// fails the transfers are reversed before the error is returned.
    pub(super) async fn execute(&self, plan: ExecutionPlan) -> Result<(), Error> {
        let ExecutionPlan {
            write,
            transfers,
            events,
        } = plan;

        if !transfers.is_empty() {
            self.context
                .execute_transfers(&transfers)
                .await
                .map_err(|err| Error::TransferFailed {
                    reason: err.to_string(),
                })?;
        }
        if !write.is_empty() {
            if let Err(err) = self.context.commit(write).await {
                return Err(self.unwind(&transfers, adapter_error(err)).await);
            }
        }
        for event in &events {
            self.publish(event).await;
        }
        Ok(())
    }

    /// Reverses `transfers` after `cause` stopped the commit.
    async fn unwind(&self, transfers: &[Transfer], cause: Error) -> Error {
        if transfers.is_empty() {
            return cause;
        }
        match self.context.execute_transfers(&unwind_batch(transfers)).await {
            Ok(()) => {
                warn!(
                    "Commit failed, reversed {} transfers: {cause}",
                    transfers.len()
                );
                cause
            }
            Err(err) => {
                error!("Commit failed ({cause}) and reversing {transfers:?} failed: {err}");
                Error::UnwindFailed {
                    reason: format!("{cause}; reversal: {err}"),
                }
            }
        }
    }
}

impl<E> Manager<E>
where
    E: LedgerRead + LedgerStore + FundsCustody + EventSink + Clock,
{
    /// Registers a new open order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Paused`] while the ledger is paused
    ///
    /// Returns [`Error::InvalidMerchant`] if `merchant` is the zero address
    ///
    /// Returns [`Error::InvalidAmount`] if `total_amount` is zero
    ///
    /// Returns [`Error::OrderExists`] if `order_id` is already registered
    pub async fn create_order(
        &self,
        order_id: B256,
        merchant: Address,
        total_amount: u128,
        destination_chain: u32,
    ) -> Result<Order, Error> {
        self.guarded(async {
            self.unpaused_config().await?;
            if merchant.is_zero() {
                return Err(Error::InvalidMerchant);
            }
            if total_amount == 0 {
                return Err(Error::InvalidAmount);
            }
            if self
                .context
                .order(order_id)
                .await
                .map_err(adapter_error)?
                .is_some()
            {
                return Err(Error::OrderExists { order_id });
            }

            let order = Order::new(
                order_id,
                merchant,
                total_amount,
                destination_chain,
                self.context.now_secs(),
            );
            self.execute(ExecutionPlan {
                write: LedgerWrite {
                    orders: vec![OrderChange::Insert(order.clone())],
                    ..Default::default()
                },
                transfers: vec![],
                events: vec![LedgerEvent::OrderCreated {
                    order_id,
                    merchant,
                    total_amount,
                    destination_chain,
                }],
            })
            .await?;

            debug!("Created order {order_id} for {merchant}, total {total_amount}");
            Ok(order)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicBool, Arc};

    use super::*;

    fn manager() -> Manager<()> {
        Manager::new(
            LedgerConfig {
                owner: Address::repeat_byte(1),
                custody: Address::repeat_byte(2),
                protocol_fee_recipient: Address::repeat_byte(3),
                trusted_relayer: Address::repeat_byte(4),
                settlement_chain: 6,
            },
            (),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn nested_guarded_call_is_rejected() {
        let manager = manager();
        let result = manager
            .guarded(async { manager.guarded(async { Ok(()) }).await })
            .await;
        assert!(matches!(result, Err(Error::ReentrantCall)));

        // the lock is released afterwards
        assert!(manager.guarded(async { Ok(()) }).await.is_ok());
    }

    #[tokio::test]
    async fn spawned_call_queues_behind_the_lock() {
        let manager = Arc::new(manager());
        let done = Arc::new(AtomicBool::new(false));
        let handle = manager
            .guarded(async {
                let handle = tokio::spawn({
                    let manager = manager.clone();
                    let done = done.clone();
                    async move {
                        let result = manager.guarded(async { Ok(()) }).await;
                        done.store(true, Ordering::SeqCst);
                        result
                    }
                });
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                }
                // awaiting `handle` here would never return
                assert!(!done.load(Ordering::SeqCst));
                Ok(handle)
            })
            .await
            .unwrap();
        assert!(handle.await.unwrap().is_ok());
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn guarded_calls_on_distinct_managers_may_nest() {
        let outer = manager();
        let inner = manager();
        let result = outer
            .guarded(async { inner.guarded(async { Ok(7) }).await })
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn sequential_guarded_calls_succeed() {
        let manager = manager();
        for _ in 0..3 {
            assert!(manager.guarded(async { Ok(()) }).await.is_ok());
        }
    }
}
