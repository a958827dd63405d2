// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use pay_order::LedgerEvent;

/// Receives ledger notifications
///
/// Events are published after the state change is committed. A publish
/// failure is logged by the manager and does not undo the change.
#[async_trait]
pub trait EventSink {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    async fn publish(&self, event: &LedgerEvent) -> Result<(), Self::AdapterError>;
}
