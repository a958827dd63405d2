// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolInterface;
use log::{debug, info, warn};
use pay_order::{abi::IOrderLedger::IOrderLedgerCalls, Clock, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::{marked_up_cost, PriceReference, SponsorReserve, SponsorshipConfig, SponsorshipError};

/// Call a payer asks the sponsor to pay gas for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub target: Address,
    pub calldata: Bytes,
}

/// Accepted sponsorship, handed back to [`SponsorshipLedger::reconcile`].
///
/// The ledger keeps its own copy and reconciles from that copy once. A context
/// it did not issue, or one altered after issue, is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorshipContext {
    id: u64,
    payer: Address,
    estimated_cost: u128,
    payment_amount: U256,
    validated_at: u64,
}

impl SponsorshipContext {
    /// Issue number, unique within one ledger
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn payer(&self) -> Address {
        self.payer
    }

    /// Marked-up USDC cost added to both caps
    pub fn estimated_cost(&self) -> u128 {
        self.estimated_cost
    }

    /// Payment encoded in the sponsored call
    pub fn payment_amount(&self) -> U256 {
        self.payment_amount
    }

    /// Unix timestamp in seconds
    pub fn validated_at(&self) -> u64 {
        self.validated_at
    }

    fn day(&self) -> u64 {
        self.validated_at / SECONDS_PER_DAY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Succeeded,
    /// The sponsored call reverted; its gas was still spent
    Reverted,
    /// The sponsor's own post-execution step failed
    PostOpReverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// USDC finally counted against the caps
    pub charged: u128,
    /// USDC credited back to the caps
    pub refunded: u128,
}

/// Headroom left today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingBudget {
    pub global: u128,
    pub payer: u128,
}

#[derive(Debug, Default, Clone, Copy)]
struct DailyUsage {
    used: u128,
    day: u64,
}

impl DailyUsage {
    fn roll(&mut self, today: u64) {
        if today > self.day {
            self.used = 0;
            self.day = today;
        }
    }

    /// Usage as it would read after a roll to `today`
    fn used_on(&self, today: u64) -> u128 {
        if today > self.day {
            0
        } else {
            self.used
        }
    }

    fn refund(&mut self, day: u64, amount: u128) {
        if self.day == day {
            self.used = self.used.saturating_sub(amount);
        }
    }
}

#[derive(Debug, Default)]
struct SponsorshipState {
    global: DailyUsage,
    /// Only payers with a sponsorship accepted today
    payers: HashMap<Address, DailyUsage>,
    /// Issued contexts not reconciled yet, from today and yesterday
    outstanding: HashMap<u64, SponsorshipContext>,
    next_id: u64,
}

impl SponsorshipState {
    fn roll(&mut self, today: u64) {
        if today <= self.global.day {
            return;
        }
        self.global.roll(today);
        self.payers.clear();
        self.outstanding
            .retain(|_, context| context.day().saturating_add(1) >= today);
    }

    fn payer_used(&self, payer: Address, today: u64) -> u128 {
        self.payers
            .get(&payer)
            .map_or(0, |usage| usage.used_on(today))
    }
}

pub struct SponsorshipLedger<R> {
    reserve: R,
    config: RwLock<SponsorshipConfig>,
    price_reference: RwLock<Option<Arc<dyn PriceReference>>>,
    /// Serializes validation and reconciliation
    state: Mutex<SponsorshipState>,
    clock: Arc<dyn Clock>,
}

impl<R> SponsorshipLedger<R> {
    /// # Errors
    ///
    /// Returns [`SponsorshipError::InvalidConfig`] if `config` does not validate
    pub fn new(
        config: SponsorshipConfig,
        reserve: R,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SponsorshipError> {
        config.validate()?;
        Ok(Self {
            reserve,
            config: RwLock::new(config),
            price_reference: RwLock::new(None),
            state: Mutex::new(SponsorshipState::default()),
            clock,
        })
    }

    pub fn with_price_reference(self, price_reference: Arc<dyn PriceReference>) -> Self {
        Self {
            price_reference: RwLock::new(Some(price_reference)),
            ..self
        }
    }

    pub async fn config(&self) -> SponsorshipConfig {
        self.config.read().await.clone()
    }

    pub async fn remaining_budget(&self, payer: Address) -> RemainingBudget {
        let config = self.config().await;
        let today = self.clock.day_index();
        let state = self.state.lock().await;
        let payer_used = state.payer_used(payer, today);
        RemainingBudget {
            global: config
                .daily_cap
                .saturating_sub(state.global.used_on(today)),
            payer: config.per_payer_cap.saturating_sub(payer_used),
        }
    }

    async fn native_price(&self) -> Result<u128, SponsorshipError> {
        let price_reference = self
            .price_reference
            .read()
            .await
            .clone()
            .ok_or(SponsorshipError::PriceReferenceUnset)?;
        price_reference
            .native_price()
            .await
            .map_err(|source_error| SponsorshipError::AdapterError { source_error })
    }
}

/// Payment amount of an eligible operation
fn sponsored_payment(
    config: &SponsorshipConfig,
    operation: &OperationDescriptor,
) -> Result<U256, SponsorshipError> {
    if operation.target != config.payment_contract {
        return Err(SponsorshipError::IneligibleOperation {
            reason: format!("{} is not the payment contract", operation.target),
        });
    }
    IOrderLedgerCalls::abi_decode(&operation.calldata)
        .map(|call| call.payment_amount())
        .map_err(|err| SponsorshipError::IneligibleOperation {
            reason: format!("calldata is not a sponsorable payment call: {err}"),
        })
}

impl<R> SponsorshipLedger<R>
where
    R: SponsorReserve,
{
    /// Decides whether `payer` may have `operation` sponsored and books the
    /// marked-up cost against both caps.
    ///
    /// Counters from a previous day are reset first, whatever the outcome.
    /// A rejected payer leaves no trace in the ledger.
    ///
    /// # Errors
    ///
    /// Checked in this order: [`SponsorshipError::IneligibleOperation`],
    /// [`SponsorshipError::PriceReferenceUnset`],
    /// [`SponsorshipError::PaymentTooSmall`],
    /// [`SponsorshipError::ExceedsDailyLimit`],
    /// [`SponsorshipError::ExceedsUserLimit`],
    /// [`SponsorshipError::InsufficientSponsorBalance`]
    pub async fn validate_sponsorship(
        &self,
        payer: Address,
        operation: &OperationDescriptor,
        estimated_native_cost: u128,
    ) -> Result<SponsorshipContext, SponsorshipError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_secs();
        let today = now / SECONDS_PER_DAY;
        state.roll(today);
        let global_used = state.global.used;
        let payer_used = state.payer_used(payer, today);

        let config = self.config().await;
        let payment_amount = sponsored_payment(&config, operation)?;
        let price = self.native_price().await?;
        let cost = marked_up_cost(estimated_native_cost, price, config.markup_percent)?;

        if payment_amount < U256::from(config.min_payment_amount) {
            return Err(SponsorshipError::PaymentTooSmall {
                payment_amount,
                minimum: config.min_payment_amount,
            });
        }
        if global_used
            .checked_add(cost)
            .map_or(true, |total| total > config.daily_cap)
        {
            warn!("Daily sponsorship cap reached, rejecting {cost} for {payer}");
            return Err(SponsorshipError::ExceedsDailyLimit {
                used: global_used,
                cost,
                cap: config.daily_cap,
            });
        }
        if payer_used
            .checked_add(cost)
            .map_or(true, |total| total > config.per_payer_cap)
        {
            return Err(SponsorshipError::ExceedsUserLimit {
                payer,
                used: payer_used,
                cost,
                cap: config.per_payer_cap,
            });
        }
        let available = self
            .reserve
            .reserve_balance(config.sponsor)
            .await
            .map_err(|err| SponsorshipError::AdapterError {
                source_error: anyhow::Error::new(err),
            })?;
        if available < cost {
            warn!("Sponsor reserve {available} cannot cover {cost}");
            return Err(SponsorshipError::InsufficientSponsorBalance {
                available,
                required: cost,
            });
        }

        state.global.used += cost;
        let payer_usage = state.payers.entry(payer).or_default();
        payer_usage.roll(today);
        payer_usage.used += cost;
        let context = SponsorshipContext {
            id: state.next_id,
            payer,
            estimated_cost: cost,
            payment_amount,
            validated_at: now,
        };
        state.next_id += 1;
        state.outstanding.insert(context.id, context.clone());
        debug!(
            "Sponsoring {cost} for {payer}, payment {payment_amount}, context {}",
            context.id
        );
        Ok(context)
    }

    /// Settles a sponsorship after execution.
    ///
    /// When the actual marked-up cost is below the estimate the difference is
    /// credited back to both caps, provided the counters still belong to the
    /// day of validation. Costs above the estimate are never charged.
    ///
    /// Each context is reconciled at most once. Contexts validated before
    /// yesterday are forgotten.
    ///
    /// # Errors
    ///
    /// Returns [`SponsorshipError::UnknownSponsorship`] if the context was not
    /// issued by this ledger, was altered, was already reconciled or expired.
    /// The context stays outstanding when converting the actual cost fails.
    pub async fn reconcile(
        &self,
        context: &SponsorshipContext,
        actual_native_cost: u128,
        outcome: ExecutionOutcome,
    ) -> Result<Reconciliation, SponsorshipError> {
        let mut state = self.state.lock().await;
        let issued = match state.outstanding.get(&context.id) {
            Some(issued) if issued == context => issued.clone(),
            _ => return Err(SponsorshipError::UnknownSponsorship { id: context.id }),
        };
        let unchanged = Reconciliation {
            charged: issued.estimated_cost,
            refunded: 0,
        };
        if outcome == ExecutionOutcome::PostOpReverted {
            state.outstanding.remove(&issued.id);
            info!(
                "Post-operation step reverted for {}, keeping the estimate",
                issued.payer
            );
            return Ok(unchanged);
        }

        let markup_percent = self.config.read().await.markup_percent;
        let price = self.native_price().await?;
        let actual = marked_up_cost(actual_native_cost, price, markup_percent)?;
        state.outstanding.remove(&issued.id);
        if actual >= issued.estimated_cost {
            return Ok(unchanged);
        }

        let refunded = issued.estimated_cost - actual;
        let day = issued.day();
        state.global.refund(day, refunded);
        if let Some(usage) = state.payers.get_mut(&issued.payer) {
            usage.refund(day, refunded);
        }
        debug!("Refunded {refunded} of sponsored cost to {}", issued.payer);
        Ok(Reconciliation {
            charged: actual,
            refunded,
        })
    }
}

impl<R> SponsorshipLedger<R> {
    async fn update_config<F>(&self, caller: Address, update: F) -> Result<(), SponsorshipError>
    where
        F: FnOnce(&mut SponsorshipConfig),
    {
        let mut config = self.config.write().await;
        if caller != config.owner {
            return Err(SponsorshipError::Unauthorized { caller });
        }
        let mut updated = config.clone();
        update(&mut updated);
        updated.validate()?;
        info!("Sponsorship configuration updated by {caller}");
        *config = updated;
        Ok(())
    }

    pub async fn set_daily_cap(&self, caller: Address, cap: u128) -> Result<(), SponsorshipError> {
        self.update_config(caller, |config| config.daily_cap = cap)
            .await
    }

    pub async fn set_per_payer_cap(
        &self,
        caller: Address,
        cap: u128,
    ) -> Result<(), SponsorshipError> {
        self.update_config(caller, |config| config.per_payer_cap = cap)
            .await
    }

    /// # Errors
    ///
    /// Returns [`SponsorshipError::InvalidConfig`] for a markup below 100
    pub async fn set_markup_percent(
        &self,
        caller: Address,
        markup_percent: u128,
    ) -> Result<(), SponsorshipError> {
        self.update_config(caller, |config| config.markup_percent = markup_percent)
            .await
    }

    pub async fn set_min_payment_amount(
        &self,
        caller: Address,
        amount: u128,
    ) -> Result<(), SponsorshipError> {
        self.update_config(caller, |config| config.min_payment_amount = amount)
            .await
    }

    pub async fn set_payment_contract(
        &self,
        caller: Address,
        payment_contract: Address,
    ) -> Result<(), SponsorshipError> {
        self.update_config(caller, |config| config.payment_contract = payment_contract)
            .await
    }

    pub async fn transfer_ownership(
        &self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), SponsorshipError> {
        self.update_config(caller, |config| config.owner = new_owner)
            .await
    }

    /// `None` disables sponsorship until a reference is set again.
    pub async fn set_price_reference(
        &self,
        caller: Address,
        price_reference: Option<Arc<dyn PriceReference>>,
    ) -> Result<(), SponsorshipError> {
        let config = self.config.read().await;
        if caller != config.owner {
            return Err(SponsorshipError::Unauthorized { caller });
        }
        info!(
            "Price reference {} by {caller}",
            if price_reference.is_some() {
                "set"
            } else {
                "cleared"
            }
        );
        *self.price_reference.write().await = price_reference;
        Ok(())
    }
}
