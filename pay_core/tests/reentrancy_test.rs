// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A custody adapter that calls back into the ledger while moving funds.

use std::sync::{Arc, Mutex, OnceLock, Weak};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use pay_core::{
    manager::{
        adapters::{EventSink, FundsCustody, LedgerRead, LedgerStats, LedgerStore, LedgerWrite, Transfer},
        context::memory::{InMemoryContext, InMemoryError},
        Manager,
    },
    Error, LedgerConfig,
};
use pay_message::MessageId;
use pay_order::{Clock, Contribution, ContributionId, LedgerEvent, Order};

#[derive(Clone, Debug)]
struct CallbackContext {
    inner: InMemoryContext,
    ledger: Arc<OnceLock<Weak<Manager<CallbackContext>>>>,
    callback_errors: Arc<Mutex<Vec<String>>>,
}

impl Clock for CallbackContext {
    fn now_secs(&self) -> u64 {
        self.inner.now_secs()
    }
}

#[async_trait]
impl LedgerRead for CallbackContext {
    type AdapterError = InMemoryError;

    async fn order(&self, order_id: B256) -> Result<Option<Order>, Self::AdapterError> {
        self.inner.order(order_id).await
    }

    async fn contribution(
        &self,
        contribution_id: ContributionId,
    ) -> Result<Option<Contribution>, Self::AdapterError> {
        self.inner.contribution(contribution_id).await
    }

    async fn order_contributions(
        &self,
        order_id: B256,
    ) -> Result<Vec<Contribution>, Self::AdapterError> {
        self.inner.order_contributions(order_id).await
    }

    async fn contribution_count(&self, order_id: B256) -> Result<u64, Self::AdapterError> {
        self.inner.contribution_count(order_id).await
    }

    async fn is_message_processed(
        &self,
        message_id: MessageId,
    ) -> Result<bool, Self::AdapterError> {
        self.inner.is_message_processed(message_id).await
    }

    async fn merchant_balance(&self, merchant: Address) -> Result<u128, Self::AdapterError> {
        self.inner.merchant_balance(merchant).await
    }

    async fn stats(&self) -> Result<LedgerStats, Self::AdapterError> {
        self.inner.stats().await
    }
}

#[async_trait]
impl LedgerStore for CallbackContext {
    type AdapterError = InMemoryError;

    async fn commit(&self, write: LedgerWrite) -> Result<(), Self::AdapterError> {
        self.inner.commit(write).await
    }
}

#[async_trait]
impl EventSink for CallbackContext {
    type AdapterError = InMemoryError;

    async fn publish(&self, event: &LedgerEvent) -> Result<(), Self::AdapterError> {
        self.inner.publish(event).await
    }
}

#[async_trait]
impl FundsCustody for CallbackContext {
    type AdapterError = InMemoryError;

    async fn balance_of(&self, account: Address) -> Result<u128, Self::AdapterError> {
        self.inner.balance_of(account).await
    }

    async fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<u128, Self::AdapterError> {
        self.inner.allowance(owner, spender).await
    }

    async fn execute_transfers(&self, transfers: &[Transfer]) -> Result<(), Self::AdapterError> {
        // a malicious recipient hook tries to contribute again mid-transfer
        if let Some(ledger) = self.ledger.get().and_then(Weak::upgrade) {
            if let Transfer::Pull { from, amount, .. } = transfers[0] {
                let order_id = B256::repeat_byte(1);
                if let Err(err) = ledger.contribute_directly(order_id, amount, from).await {
                    self.callback_errors
                        .lock()
                        .map_err(|_| InMemoryError::Poisoned)?
                        .push(err.to_string());
                    if matches!(err, Error::ReentrantCall) {
                        return Err(InMemoryError::TransferRejected {
                            reason: "reentrant callback".to_string(),
                        });
                    }
                }
            }
        }
        self.inner.execute_transfers(transfers).await
    }
}

#[tokio::test]
async fn custody_callback_cannot_reenter_ledger() {
    let config = LedgerConfig {
        owner: Address::repeat_byte(0x0a),
        custody: Address::repeat_byte(0x0c),
        protocol_fee_recipient: Address::repeat_byte(0x0f),
        trusted_relayer: Address::ZERO,
        settlement_chain: 6,
    };
    let context = CallbackContext {
        inner: InMemoryContext::default(),
        ledger: Arc::new(OnceLock::new()),
        callback_errors: Arc::new(Mutex::new(Vec::new())),
    };
    let manager = Arc::new(Manager::new(config.clone(), context.clone()).unwrap());
    context
        .ledger
        .set(Arc::downgrade(&manager))
        .unwrap();

    let payer = Address::repeat_byte(0x99);
    let merchant = Address::repeat_byte(0x98);
    let order_id = B256::repeat_byte(1);
    context.inner.mint(payer, 2_000).unwrap();
    context.inner.approve(payer, config.custody, 2_000).unwrap();
    manager
        .create_order(order_id, merchant, 1_000, 0)
        .await
        .unwrap();

    let result = manager.contribute_directly(order_id, 1_000, payer).await;
    assert!(matches!(result, Err(Error::TransferFailed { .. })));

    let errors = context.callback_errors.lock().unwrap().clone();
    assert_eq!(errors, vec![Error::ReentrantCall.to_string()]);

    let order = manager.get_order(order_id).await.unwrap();
    assert_eq!(order.received_amount, 0);
    assert!(!order.is_completed);
    assert_eq!(context.inner.balance(payer).unwrap(), 2_000);
    assert_eq!(context.inner.balance(merchant).unwrap(), 0);
}
