// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Relayed contribution messages
//!
//! Contributions made on other chains reach the settlement ledger as opaque
//! messages delivered by a trusted bridge endpoint. This crate contains the
//! two pieces of that message the ledger relies on:
//!
//! - [`MessageId`]: the replay-protection identity of a delivery, computed from
//!   the source domain, the bridge sender and the raw payload.
//! - [`RelayPayload`]: the fixed 96-byte record carried in the payload.
//!
//! # Example
//! ```rust
//! use alloy_primitives::{B256, U256};
//! use pay_message::{RelayMessage, RelayPayload};
//!
//! let payload = RelayPayload {
//!     order_id: B256::repeat_byte(0x42),
//!     amount: U256::from(10_000_000u64),
//!     source_chain: 6,
//! };
//! let message = RelayMessage::new(3, B256::repeat_byte(0x01), payload.encode());
//!
//! assert_eq!(message.decode_payload().unwrap(), payload);
//! assert_eq!(message.message_id(), message.clone().message_id());
//! ```

use std::fmt;

use alloy_primitives::{keccak256, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Size of an encoded [`RelayPayload`]: three 32-byte words.
pub const PAYLOAD_LEN: usize = 96;

const WORD: usize = 32;

/// Errors returned while decoding a relay payload
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadError {
    #[error("relay payload is {len} bytes, expected at least {PAYLOAD_LEN}")]
    TooShort { len: usize },
}

/// Replay-protection identity of a relayed message
///
/// Equal to `keccak256(source_domain ‖ sender ‖ payload)`, where the source
/// domain is packed as 4 big-endian bytes. Two deliveries of the same payload
/// from the same sender and domain share an id, regardless of which order the
/// payload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub B256);

impl MessageId {
    pub fn compute(source_domain: u32, sender: &B256, payload: &[u8]) -> Self {
        let mut packed = Vec::with_capacity(4 + WORD + payload.len());
        packed.extend_from_slice(&source_domain.to_be_bytes());
        packed.extend_from_slice(sender.as_slice());
        packed.extend_from_slice(payload);
        MessageId(keccak256(packed))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message as handed over by the bridge endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    /// Bridge domain of the chain the message was sent from
    pub source_domain: u32,
    /// Sender on the source chain, as a 32-byte word
    pub sender: B256,
    /// Raw message body
    pub payload: Bytes,
}

impl RelayMessage {
    pub fn new(source_domain: u32, sender: B256, payload: impl Into<Bytes>) -> Self {
        Self {
            source_domain,
            sender,
            payload: payload.into(),
        }
    }

    pub fn message_id(&self) -> MessageId {
        MessageId::compute(self.source_domain, &self.sender, &self.payload)
    }

    pub fn decode_payload(&self) -> Result<RelayPayload, PayloadError> {
        RelayPayload::decode(&self.payload)
    }
}

/// Contribution carried by a relayed message
///
/// Layout, three 32-byte words:
///
/// | offset | content                                   |
/// |--------|-------------------------------------------|
/// | 0      | order id                                  |
/// | 32     | amount, big-endian unsigned               |
/// | 64     | source chain tag, right-aligned `u32`     |
///
/// Bytes past the third word are ignored, as are the 28 padding bytes in
/// front of the chain tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub order_id: B256,
    pub amount: U256,
    pub source_chain: u32,
}

impl RelayPayload {
    pub fn decode(data: &[u8]) -> Result<Self, PayloadError> {
        if data.len() < PAYLOAD_LEN {
            return Err(PayloadError::TooShort { len: data.len() });
        }

        let order_id = B256::from_slice(&data[..WORD]);
        let amount = U256::from_be_slice(&data[WORD..2 * WORD]);

        let mut chain = [0u8; 4];
        chain.copy_from_slice(&data[PAYLOAD_LEN - 4..PAYLOAD_LEN]);
        let source_chain = u32::from_be_bytes(chain);

        Ok(Self {
            order_id,
            amount,
            source_chain,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut data = Vec::with_capacity(PAYLOAD_LEN);
        data.extend_from_slice(self.order_id.as_slice());
        data.extend_from_slice(&self.amount.to_be_bytes::<32>());
        data.extend_from_slice(&[0u8; WORD - 4]);
        data.extend_from_slice(&self.source_chain.to_be_bytes());
        data.into()
    }
}
