// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::{Address, Bytes, B256, U256};
use log::{debug, info, warn};
use pay_message::RelayMessage;
use pay_order::{
    Clock, Contribution, ContributionId, ContributionSource, FeeSplit, LedgerEvent, Order,
};
use serde::{Deserialize, Serialize};

use super::{
    adapter_error,
    adapters::{EventSink, FundsCustody, LedgerRead, LedgerStore, OrderChange, Transfer},
    ledger_manager::ExecutionPlan,
    settlement::settle_if_funded,
    Manager,
};
use crate::{Error, LedgerConfig};

/// Outcome of an accepted contribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionReceipt {
    pub contribution: Contribution,
    /// Order as committed by this call
    pub order: Order,
    /// Present when this contribution completed the order
    pub settlement: Option<FeeSplit>,
}

impl<E> Manager<E>
where
    E: LedgerRead + LedgerStore + FundsCustody + EventSink + Clock,
{
    /// Accepts a contribution paid on the settlement chain.
    ///
    /// Pulls `amount` from `payer` into the custody account. When this fills
    /// the order, the payouts run in the same transfer batch as the pull.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Paused`] while the ledger is paused
    ///
    /// Returns [`Error::InvalidAmount`], [`Error::OrderNotFound`],
    /// [`Error::OrderAlreadyCompleted`] or [`Error::OrderOverpayment`] if the
    /// order cannot take the contribution
    ///
    /// Returns [`Error::InsufficientFunds`] or
    /// [`Error::InsufficientAuthorization`] if the payer cannot cover the pull
    ///
    /// Returns [`Error::TransferFailed`] if the transfer batch fails. Nothing
    /// is recorded in that case.
    pub async fn contribute_directly(
        &self,
        order_id: B256,
        amount: u128,
        payer: Address,
    ) -> Result<ContributionReceipt, Error> {
        self.guarded(async {
            let config = self.unpaused_config().await?;
            let source = ContributionSource::Local { payer };
            let (mut plan, receipt) = self
                .accept_contribution(
                    order_id,
                    U256::from(amount),
                    &source,
                    config.settlement_chain,
                    &config,
                )
                .await?;

            let available = self.context().balance_of(payer).await.map_err(adapter_error)?;
            if available < amount {
                return Err(Error::InsufficientFunds {
                    account: payer,
                    available,
                    required: amount,
                });
            }
            let available = self
                .context()
                .allowance(payer, config.custody)
                .await
                .map_err(adapter_error)?;
            if available < amount {
                return Err(Error::InsufficientAuthorization {
                    owner: payer,
                    available,
                    required: amount,
                });
            }

            plan.transfers.insert(
                0,
                Transfer::Pull {
                    from: payer,
                    to: config.custody,
                    amount,
                },
            );
            self.execute(plan).await?;

            debug!(
                "Accepted {amount} from {payer} for order {order_id} as {}",
                receipt.contribution.contribution_id
            );
            Ok(receipt)
        })
        .await
    }

    /// Accepts a contribution relayed by the bridge from another chain.
    ///
    /// The message is marked processed in the same commit that records the
    /// contribution. A delivery that fails for any reason leaves no marker and
    /// can be delivered again; a processed one is rejected forever.
    ///
    /// `finalized` reports whether the source-chain transfer was final when
    /// the bridge attested it. It is logged but does not gate settlement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] unless `caller` is the trusted relayer
    ///
    /// Returns [`Error::Paused`] while the ledger is paused
    ///
    /// Returns [`Error::MessageAlreadyProcessed`] for a replayed message
    ///
    /// Returns [`Error::MalformedPayload`] if the payload is too short to decode
    ///
    /// Returns [`Error::InvalidAmount`], [`Error::OrderNotFound`],
    /// [`Error::OrderAlreadyCompleted`] or [`Error::OrderOverpayment`] if the
    /// order cannot take the contribution
    pub async fn handle_relayed_message(
        &self,
        caller: Address,
        source_domain: u32,
        sender: B256,
        payload: Bytes,
        finalized: bool,
    ) -> Result<ContributionReceipt, Error> {
        self.guarded(async {
            let config = self.config().await;
            if config.trusted_relayer.is_zero() || caller != config.trusted_relayer {
                warn!("Rejected relay delivery from untrusted caller {caller}");
                return Err(Error::Unauthorized { caller });
            }
            let config = self.unpaused_config().await?;

            let message = RelayMessage::new(source_domain, sender, payload);
            let message_id = message.message_id();
            self.accept_relayed(&message, finalized, &config)
                .await
                .inspect_err(|err| warn!("Rejected relay message {message_id}: {err}"))
        })
        .await
    }

    async fn accept_relayed(
        &self,
        message: &RelayMessage,
        finalized: bool,
        config: &LedgerConfig,
    ) -> Result<ContributionReceipt, Error> {
        let message_id = message.message_id();
        if self
            .context()
            .is_message_processed(message_id)
            .await
            .map_err(adapter_error)?
        {
            return Err(Error::MessageAlreadyProcessed { message_id });
        }
        let payload = message.decode_payload()?;

        if !finalized {
            info!(
                "Relay message {message_id} from domain {} reports an unfinalized source transfer",
                message.source_domain
            );
        }

        let source = ContributionSource::Relayed {
            source_domain: message.source_domain,
            sender: message.sender,
            finalized,
        };
        let (mut plan, receipt) = self
            .accept_contribution(
                payload.order_id,
                payload.amount,
                &source,
                payload.source_chain,
                config,
            )
            .await?;
        plan.write.processed_messages.push(message_id);
        self.execute(plan).await?;

        debug!(
            "Accepted relayed {} for order {} from chain {} as {}",
            receipt.contribution.amount,
            payload.order_id,
            payload.source_chain,
            receipt.contribution.contribution_id
        );
        Ok(receipt)
    }

    /// Checks shared by both paths, then stages the contribution, the order
    /// increment and a settlement if the order becomes funded.
    async fn accept_contribution(
        &self,
        order_id: B256,
        amount: U256,
        source: &ContributionSource,
        source_chain: u32,
        config: &LedgerConfig,
    ) -> Result<(ExecutionPlan, ContributionReceipt), Error> {
        if amount.is_zero() {
            return Err(Error::InvalidAmount);
        }
        let mut order = self.get_order(order_id).await?;
        if order.is_completed {
            return Err(Error::OrderAlreadyCompleted { order_id });
        }
        let remaining = order.remaining_amount();
        let accepted = u128::try_from(amount)
            .ok()
            .filter(|amount| *amount <= remaining)
            .ok_or(Error::OrderOverpayment {
                order_id,
                amount,
                remaining,
            })?;

        let index = self
            .context()
            .contribution_count(order_id)
            .await
            .map_err(adapter_error)?;
        let timestamp = self.context().now_secs();
        let contributor = source.contributor();
        let contribution = Contribution {
            contribution_id: ContributionId::derive(
                &order_id,
                &contributor,
                accepted,
                timestamp,
                index,
            ),
            order_id,
            contributor,
            amount: accepted,
            source_chain,
            is_cross_chain: source.is_cross_chain(),
            timestamp,
        };
        order.received_amount += accepted;

        let mut plan = ExecutionPlan::default();
        plan.events.push(LedgerEvent::ContributionReceived {
            order_id,
            contribution_id: contribution.contribution_id,
            contributor,
            amount: accepted,
            source_chain,
            is_cross_chain: contribution.is_cross_chain,
        });
        let settlement = settle_if_funded(&mut order, config, &mut plan);

        plan.write.orders.push(OrderChange::Update(order.clone()));
        plan.write.contributions.push(contribution.clone());

        Ok((
            plan,
            ContributionReceipt {
                contribution,
                order,
                settlement,
            },
        ))
    }
}
