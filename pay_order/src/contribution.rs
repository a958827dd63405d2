// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Contribution record and its content-derived identity

use std::fmt;

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Identity of a recorded contribution
///
/// Derived from the contribution content, never supplied by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributionId(pub B256);

impl ContributionId {
    /// `keccak256(order_id ‖ contributor ‖ amount ‖ timestamp ‖ index)`, each
    /// packed as a 32-byte big-endian word.
    ///
    /// `index` is the number of contributions already recorded for the order.
    /// It separates two identical payments landing in the same second.
    pub fn derive(
        order_id: &B256,
        contributor: &B256,
        amount: u128,
        timestamp: u64,
        index: u64,
    ) -> Self {
        let mut packed = Vec::with_capacity(5 * 32);
        packed.extend_from_slice(order_id.as_slice());
        packed.extend_from_slice(contributor.as_slice());
        packed.extend_from_slice(&U256::from(amount).to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(timestamp).to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(index).to_be_bytes::<32>());
        ContributionId(keccak256(packed))
    }
}

impl fmt::Display for ContributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a contribution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContributionSource {
    /// Paid on the settlement chain by `payer`
    Local { payer: Address },
    /// Delivered by the bridge from another chain
    Relayed {
        source_domain: u32,
        sender: B256,
        finalized: bool,
    },
}

impl ContributionSource {
    /// Contributor as a 32-byte word: the payer address left-padded, or the
    /// bridge sender as delivered.
    pub fn contributor(&self) -> B256 {
        match self {
            ContributionSource::Local { payer } => payer.into_word(),
            ContributionSource::Relayed { sender, .. } => *sender,
        }
    }

    pub fn is_cross_chain(&self) -> bool {
        matches!(self, ContributionSource::Relayed { .. })
    }
}

/// One accepted increment of payment toward an order. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub contribution_id: ContributionId,
    pub order_id: B256,
    pub contributor: B256,
    pub amount: u128,
    pub source_chain: u32,
    pub is_cross_chain: bool,
    /// Unix timestamp in seconds
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use rstest::*;

    use super::*;

    #[fixture]
    fn order_id() -> B256 {
        B256::repeat_byte(0x42)
    }

    #[fixture]
    fn payer() -> Address {
        address!("abababababababababababababababababababab")
    }

    #[rstest]
    fn local_contributor_is_left_padded(payer: Address) {
        let contributor = ContributionSource::Local { payer }.contributor();
        assert!(contributor[..12].iter().all(|b| *b == 0));
        assert_eq!(&contributor[12..], payer.as_slice());
    }

    #[rstest]
    fn relayed_source_is_cross_chain() {
        let sender = B256::repeat_byte(0x07);
        let source = ContributionSource::Relayed {
            source_domain: 0,
            sender,
            finalized: false,
        };
        assert!(source.is_cross_chain());
        assert_eq!(source.contributor(), sender);
        assert!(!ContributionSource::Local {
            payer: Address::ZERO
        }
        .is_cross_chain());
    }

    #[rstest]
    fn identity_depends_on_every_input(order_id: B256, payer: Address) {
        let contributor = payer.into_word();
        let id = ContributionId::derive(&order_id, &contributor, 10, 100, 0);

        assert_eq!(id, ContributionId::derive(&order_id, &contributor, 10, 100, 0));
        assert_ne!(
            id,
            ContributionId::derive(&B256::repeat_byte(0x43), &contributor, 10, 100, 0)
        );
        assert_ne!(
            id,
            ContributionId::derive(&order_id, &B256::repeat_byte(0x01), 10, 100, 0)
        );
        assert_ne!(id, ContributionId::derive(&order_id, &contributor, 11, 100, 0));
        assert_ne!(id, ContributionId::derive(&order_id, &contributor, 10, 101, 0));
        assert_ne!(id, ContributionId::derive(&order_id, &contributor, 10, 100, 1));
    }

    #[rstest]
    fn source_serializes_with_kind_tag(payer: Address) {
        let json = serde_json::to_value(ContributionSource::Local { payer }).unwrap();
        assert_eq!(json["kind"], "local");
        let json = serde_json::to_value(ContributionSource::Relayed {
            source_domain: 6,
            sender: B256::ZERO,
            finalized: true,
        })
        .unwrap();
        assert_eq!(json["kind"], "relayed");
        assert_eq!(json["source_domain"], 6);
    }
}
