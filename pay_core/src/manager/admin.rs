// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Owner-only controls

use alloy_primitives::Address;
use log::info;
use pay_order::LedgerEvent;

use super::{
    adapter_error,
    adapters::{EventSink, FundsCustody, LedgerStore, Transfer},
    ledger_manager::{AdminState, ExecutionPlan},
    Manager,
};
use crate::Error;

fn ensure_owner(admin: &AdminState, caller: Address) -> Result<(), Error> {
    if caller != admin.config.owner {
        return Err(Error::Unauthorized { caller });
    }
    Ok(())
}

impl<E> Manager<E>
where
    E: EventSink,
{
    /// Blocks order creation and both contribution paths. Views keep working.
    pub async fn pause(&self, caller: Address) -> Result<(), Error> {
        self.set_paused(caller, true).await
    }

    pub async fn unpause(&self, caller: Address) -> Result<(), Error> {
        self.set_paused(caller, false).await
    }

    async fn set_paused(&self, caller: Address, paused: bool) -> Result<(), Error> {
        self.guarded(async {
            {
                let mut admin = self.admin.write().await;
                ensure_owner(&admin, caller)?;
                admin.paused = paused;
            }
            info!("Ledger paused = {paused} by {caller}");
            let event = if paused {
                LedgerEvent::Paused { by: caller }
            } else {
                LedgerEvent::Unpaused { by: caller }
            };
            self.publish(&event).await;
            Ok(())
        })
        .await
    }

    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for any caller but the owner, then
    /// [`Error::InvalidConfig`] if `recipient` is the zero address
    pub async fn set_protocol_fee_recipient(
        &self,
        caller: Address,
        recipient: Address,
    ) -> Result<(), Error> {
        self.guarded(async {
            let previous = {
                let mut admin = self.admin.write().await;
                ensure_owner(&admin, caller)?;
                if recipient.is_zero() {
                    return Err(Error::InvalidConfig {
                        reason: "protocol_fee_recipient must not be the zero address".to_string(),
                    });
                }
                std::mem::replace(&mut admin.config.protocol_fee_recipient, recipient)
            };
            info!("Protocol fee recipient changed from {previous} to {recipient}");
            self.publish(&LedgerEvent::FeeRecipientUpdated {
                previous,
                current: recipient,
            })
            .await;
            Ok(())
        })
        .await
    }

    /// Setting the zero address disables relayed contributions.
    pub async fn set_trusted_relayer(&self, caller: Address, relayer: Address) -> Result<(), Error> {
        self.guarded(async {
            let previous = {
                let mut admin = self.admin.write().await;
                ensure_owner(&admin, caller)?;
                std::mem::replace(&mut admin.config.trusted_relayer, relayer)
            };
            info!("Trusted relayer changed from {previous} to {relayer}");
            self.publish(&LedgerEvent::RelayerUpdated {
                previous,
                current: relayer,
            })
            .await;
            Ok(())
        })
        .await
    }

    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for any caller but the owner, then
    /// [`Error::InvalidConfig`] if `new_owner` is the zero address
    pub async fn transfer_ownership(&self, caller: Address, new_owner: Address) -> Result<(), Error> {
        self.guarded(async {
            let previous = {
                let mut admin = self.admin.write().await;
                ensure_owner(&admin, caller)?;
                if new_owner.is_zero() {
                    return Err(Error::InvalidConfig {
                        reason: "owner must not be the zero address".to_string(),
                    });
                }
                std::mem::replace(&mut admin.config.owner, new_owner)
            };
            info!("Ownership transferred from {previous} to {new_owner}");
            self.publish(&LedgerEvent::OwnershipTransferred {
                previous,
                current: new_owner,
            })
            .await;
            Ok(())
        })
        .await
    }
}

impl<E> Manager<E>
where
    E: LedgerStore + FundsCustody + EventSink,
{
    /// Pushes `amount` out of the custody account to `to`.
    ///
    /// Allowed while paused. Ledger records are left untouched, so orders
    /// still open may fail to settle afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientFunds`] if custody holds less than `amount`
    ///
    /// Returns [`Error::TransferFailed`] if the push fails
    pub async fn emergency_withdraw(
        &self,
        caller: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), Error> {
        self.guarded(async {
            let config = {
                let admin = self.admin.read().await;
                ensure_owner(&admin, caller)?;
                admin.config.clone()
            };
            if amount == 0 {
                return Err(Error::InvalidAmount);
            }
            if to.is_zero() {
                return Err(Error::InvalidConfig {
                    reason: "withdrawal recipient must not be the zero address".to_string(),
                });
            }
            let available = self
                .context()
                .balance_of(config.custody)
                .await
                .map_err(adapter_error)?;
            if available < amount {
                return Err(Error::InsufficientFunds {
                    account: config.custody,
                    available,
                    required: amount,
                });
            }

            self.execute(ExecutionPlan {
                transfers: vec![Transfer::Push {
                    from: config.custody,
                    to,
                    amount,
                }],
                events: vec![LedgerEvent::EmergencyWithdrawal { to, amount }],
                ..Default::default()
            })
            .await?;
            info!("Emergency withdrawal of {amount} to {to}");
            Ok(())
        })
        .await
    }
}
