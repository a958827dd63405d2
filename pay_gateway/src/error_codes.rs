// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use pay_core::ErrorKind;
use pay_sponsor::SponsorshipError;

/// JSON-RPC error codes returned by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonRpcErrorCode {
    /// -32001 -- Invalid API version.
    InvalidVersion = -32001,
    /// -32010 -- Malformed or out-of-range input.
    InputValidation = -32010,
    /// -32011 -- Request conflicts with the current ledger state.
    StateConsistency = -32011,
    /// -32012 -- Relay message already handled.
    Replay = -32012,
    /// -32013 -- Funds, allowances, caps or transfers fell short.
    Resource = -32013,
    /// -32014 -- Caller is not allowed to perform the operation.
    Authorization = -32014,
    /// -32015 -- Internal failure.
    Internal = -32015,
}

impl From<ErrorKind> for JsonRpcErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InputValidation => JsonRpcErrorCode::InputValidation,
            ErrorKind::StateConsistency => JsonRpcErrorCode::StateConsistency,
            ErrorKind::Replay => JsonRpcErrorCode::Replay,
            ErrorKind::Resource => JsonRpcErrorCode::Resource,
            ErrorKind::Authorization => JsonRpcErrorCode::Authorization,
            ErrorKind::Internal => JsonRpcErrorCode::Internal,
        }
    }
}

impl From<&SponsorshipError> for JsonRpcErrorCode {
    fn from(err: &SponsorshipError) -> Self {
        match err {
            SponsorshipError::IneligibleOperation { .. }
            | SponsorshipError::PaymentTooSmall { .. }
            | SponsorshipError::InvalidConfig { .. }
            | SponsorshipError::CostOverflow => JsonRpcErrorCode::InputValidation,
            SponsorshipError::PriceReferenceUnset | SponsorshipError::UnknownSponsorship { .. } => {
                JsonRpcErrorCode::StateConsistency
            }
            SponsorshipError::ExceedsDailyLimit { .. }
            | SponsorshipError::ExceedsUserLimit { .. }
            | SponsorshipError::InsufficientSponsorBalance { .. } => JsonRpcErrorCode::Resource,
            SponsorshipError::Unauthorized { .. } => JsonRpcErrorCode::Authorization,
            SponsorshipError::AdapterError { .. } => JsonRpcErrorCode::Internal,
        }
    }
}

/// JSON-RPC warning codes
/// These are not part of JSON-RPC 2.0, but are used to provide additional information to the
/// client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonRpcWarningCode {
    /// -32101 -- Requested API version is deprecated.
    DeprecatedVersion = -32101,
    /// -32102 -- Relayed transfer was not finalized on its source chain.
    UnfinalizedTransfer = -32102,
}
