// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use log::info;
use pay_order::{FeeSplit, LedgerEvent, Order};

use super::{adapters::Transfer, ledger_manager::ExecutionPlan};
use crate::LedgerConfig;

/// Stages the completion of `order` if it is funded and still open.
///
/// Marks the order completed, records the fee, credits the merchant, bumps
/// the totals and queues both payouts and the completion event on `plan`.
/// `is_completed` is the guard: an order is never settled twice.
pub(super) fn settle_if_funded(
    order: &mut Order,
    config: &LedgerConfig,
    plan: &mut ExecutionPlan,
) -> Option<FeeSplit> {
    if order.is_completed || !order.is_funded() {
        return None;
    }

    let split = FeeSplit::for_total(order.total_amount);
    order.is_completed = true;
    order.protocol_fee_charged = split.protocol_fee;

    plan.write
        .merchant_credits
        .push((order.merchant, split.merchant_amount));
    plan.write.stats.orders_processed += 1;
    plan.write.stats.volume_processed += order.total_amount;

    plan.transfers.push(Transfer::Push {
        from: config.custody,
        to: order.merchant,
        amount: split.merchant_amount,
    });
    if split.protocol_fee > 0 {
        plan.transfers.push(Transfer::Push {
            from: config.custody,
            to: config.protocol_fee_recipient,
            amount: split.protocol_fee,
        });
    }

    plan.events.push(LedgerEvent::OrderCompleted {
        order_id: order.order_id,
        merchant: order.merchant,
        total_amount: order.total_amount,
        merchant_amount: split.merchant_amount,
        protocol_fee: split.protocol_fee,
    });

    info!(
        "Order {} completed: {} to merchant {}, {} protocol fee",
        order.order_id, split.merchant_amount, order.merchant, split.protocol_fee
    );
    Some(split)
}
