// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Settings of one ledger instance
///
/// The owner can change every field except `custody` and `settlement_chain`
/// through the administrative operations on [`crate::manager::Manager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Account allowed to run administrative operations
    pub owner: Address,
    /// Account holding contributed funds until an order settles. Payers
    /// approve this account for local contributions.
    pub custody: Address,
    pub protocol_fee_recipient: Address,
    /// Bridge endpoint allowed to deliver relayed contributions. The zero
    /// address disables the relay path.
    pub trusted_relayer: Address,
    /// Chain tag recorded on local contributions
    pub settlement_chain: u32,
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        for (name, address) in [
            ("owner", self.owner),
            ("custody", self.custody),
            ("protocol_fee_recipient", self.protocol_fee_recipient),
        ] {
            if address.is_zero() {
                return Err(Error::InvalidConfig {
                    reason: format!("{name} must not be the zero address"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[fixture]
    fn config() -> LedgerConfig {
        LedgerConfig {
            owner: Address::repeat_byte(1),
            custody: Address::repeat_byte(2),
            protocol_fee_recipient: Address::repeat_byte(3),
            trusted_relayer: Address::ZERO,
            settlement_chain: 6,
        }
    }

    #[rstest]
    fn relayer_may_be_unset(config: LedgerConfig) {
        assert!(config.validate().is_ok());
    }

    #[rstest]
    fn zero_fee_recipient_is_rejected(mut config: LedgerConfig) {
        config.protocol_fee_recipient = Address::ZERO;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { reason }) if reason.contains("protocol_fee_recipient")
        ));
    }
}
