// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Calls of the payment contract, as seen by the gas sponsor
//!
//! Only these two entry points may be sponsored. Decoding calldata through
//! [`IOrderLedger::IOrderLedgerCalls`] both checks the selector and yields the
//! encoded payment amount.

use alloy_primitives::U256;
use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IOrderLedger {
        function createOrder(bytes32 orderId, address merchant, uint256 totalAmount, uint32 destinationChain) external;
        function contributeDirectly(bytes32 orderId, uint256 amount) external;
    }
}

impl IOrderLedger::IOrderLedgerCalls {
    /// USDC amount the call commits the payer to
    pub fn payment_amount(&self) -> U256 {
        match self {
            IOrderLedger::IOrderLedgerCalls::createOrder(call) => call.totalAmount,
            IOrderLedger::IOrderLedgerCalls::contributeDirectly(call) => call.amount,
        }
    }
}
