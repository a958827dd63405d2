// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use alloy_primitives::{address, Address, Bytes, B256, U256};
use jsonrpsee::{
    core::client::ClientT,
    http_client::HttpClientBuilder,
    rpc_params,
};
use pay_core::{
    manager::{adapters::LedgerStats, context::memory::InMemoryContext, ContributionReceipt, Manager},
    LedgerConfig,
};
use pay_gateway::{
    api_versioning::PayRpcApiVersionsInfo, funding::AccountFunds,
    jsonrpsee_helpers::JsonRpcResponse, reserve::CustodyReserve, server,
};
use pay_message::RelayPayload;
use pay_order::{Clock, ManualClock, Order, OrderProgress};
use pay_sponsor::{FixedPrice, RemainingBudget, SponsorshipConfig, SponsorshipLedger};
use rstest::*;

const API_VERSION: &str = "0.1";

#[fixture]
fn config() -> LedgerConfig {
    LedgerConfig {
        owner: address!("0000000000000000000000000000000000000a11"),
        custody: address!("c057c057c057c057c057c057c057c057c057c057"),
        protocol_fee_recipient: address!("fee0fee0fee0fee0fee0fee0fee0fee0fee0fee0"),
        trusted_relayer: address!("b1d9eb1d9eb1d9eb1d9eb1d9eb1d9eb1d9eb1d9e"),
        settlement_chain: 6,
    }
}

struct Gateway {
    endpoint: String,
    context: InMemoryContext,
}

impl Gateway {
    fn client(&self) -> impl ClientT {
        HttpClientBuilder::default().build(&self.endpoint).unwrap()
    }
}

#[fixture]
async fn gateway(config: LedgerConfig) -> Gateway {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_700_000_000));
    let context = InMemoryContext::new(clock.clone());
    let ledger = Manager::new(config.clone(), context.clone()).unwrap();
    let sponsorship = SponsorshipLedger::new(
        SponsorshipConfig {
            owner: config.owner,
            payment_contract: Address::repeat_byte(0x70),
            sponsor: Address::repeat_byte(0x5b),
            daily_cap: 1_000_000_000,
            per_payer_cap: 50_000_000,
            markup_percent: 110,
            min_payment_amount: 0,
        },
        CustodyReserve::new(context.clone()),
        clock,
    )
    .unwrap()
    .with_price_reference(Arc::new(FixedPrice(3_000_000_000)));

    let (_join_handle, local_addr) = server::run_server(
        0,
        Arc::new(ledger),
        Arc::new(sponsorship),
        1024 * 100,
        1024 * 100,
        4,
    )
    .await
    .unwrap();

    Gateway {
        endpoint: format!("http://127.0.0.1:{}", local_addr.port()),
        context,
    }
}

#[rstest]
#[tokio::test]
async fn api_versions_lists_current_version(#[future] gateway: Gateway) {
    let client = gateway.await.client();
    let res: JsonRpcResponse<PayRpcApiVersionsInfo> = client
        .request("api_versions", rpc_params!())
        .await
        .unwrap();
    assert_eq!(res.data.versions_supported.len(), 1);
    assert_eq!(res.data.versions_supported[0].to_string(), API_VERSION);
    assert!(res.data.versions_deprecated.is_empty());
}

#[rstest]
#[tokio::test]
async fn order_completes_over_rpc(#[future] gateway: Gateway, config: LedgerConfig) {
    let client = gateway.await.client();
    let order_id = B256::repeat_byte(0x42);
    let merchant = address!("beefbeefbeefbeefbeefbeefbeefbeefbeefbeef");
    let payer = address!("abababababababababababababababababababab");

    let res: JsonRpcResponse<AccountFunds> = client
        .request(
            "deposit",
            rpc_params!(API_VERSION, config.owner, payer, 10_000_000u128),
        )
        .await
        .unwrap();
    assert_eq!(res.data.balance, 10_000_000);
    let res: JsonRpcResponse<AccountFunds> = client
        .request(
            "approve_custody",
            rpc_params!(API_VERSION, payer, 10_000_000u128),
        )
        .await
        .unwrap();
    assert_eq!(res.data.custody_allowance, 10_000_000);

    let res: JsonRpcResponse<Order> = client
        .request(
            "create_order",
            rpc_params!(API_VERSION, order_id, merchant, 20_000_000u128, 8453u32),
        )
        .await
        .unwrap();
    assert_eq!(res.data.total_amount, 20_000_000);
    assert!(res.warnings.is_none());

    let res: JsonRpcResponse<ContributionReceipt> = client
        .request(
            "contribute_directly",
            rpc_params!(API_VERSION, order_id, 10_000_000u128, payer),
        )
        .await
        .unwrap();
    assert_eq!(res.data.order.received_amount, 10_000_000);
    assert!(res.data.settlement.is_none());

    let progress: JsonRpcResponse<OrderProgress> = client
        .request("get_order_progress", rpc_params!(order_id))
        .await
        .unwrap();
    assert_eq!(progress.data.remaining_amount, 10_000_000);

    let res: JsonRpcResponse<AccountFunds> = client
        .request(
            "credit_custody",
            rpc_params!(API_VERSION, config.trusted_relayer, 10_000_000u128),
        )
        .await
        .unwrap();
    assert_eq!(res.data.balance, 20_000_000);
    let payload: Bytes = RelayPayload {
        order_id,
        amount: U256::from(10_000_000u64),
        source_chain: 84532,
    }
    .encode();
    let res: JsonRpcResponse<ContributionReceipt> = client
        .request(
            "handle_relayed_message",
            rpc_params!(
                API_VERSION,
                config.trusted_relayer,
                3u32,
                B256::repeat_byte(0x5e),
                payload,
                false
            ),
        )
        .await
        .unwrap();
    assert!(res.data.order.is_completed);
    assert!(res.data.contribution.is_cross_chain);
    let settlement = res.data.settlement.unwrap();
    assert_eq!(settlement.merchant_amount, 19_000_000);
    assert_eq!(settlement.protocol_fee, 1_000_000);
    let warnings = res.warnings.unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, -32102);

    let funds = |account: Address| {
        let client = &client;
        async move {
            client
                .request::<JsonRpcResponse<AccountFunds>, _>("account_funds", rpc_params!(account))
                .await
                .unwrap()
                .data
        }
    };
    assert_eq!(funds(merchant).await.balance, 19_000_000);
    assert_eq!(funds(config.protocol_fee_recipient).await.balance, 1_000_000);
    assert_eq!(funds(payer).await.custody_allowance, 0);

    let stats: JsonRpcResponse<LedgerStats> = client
        .request("ledger_stats", rpc_params!())
        .await
        .unwrap();
    assert_eq!(stats.data.orders_processed, 1);
    assert_eq!(stats.data.volume_processed, 20_000_000);

    let result: Result<JsonRpcResponse<ContributionReceipt>, _> = client
        .request(
            "contribute_directly",
            rpc_params!(API_VERSION, order_id, 1u128, payer),
        )
        .await;
    assert!(result.is_err());
}

#[rstest]
#[tokio::test]
async fn funding_is_gated(#[future] gateway: Gateway, config: LedgerConfig) {
    let gateway = gateway.await;
    let client = gateway.client();
    let stranger = Address::repeat_byte(0x66);

    let denied = client
        .request::<JsonRpcResponse<AccountFunds>, _>(
            "deposit",
            rpc_params!(API_VERSION, stranger, stranger, 5u128),
        )
        .await;
    let bridge_denied = client
        .request::<JsonRpcResponse<AccountFunds>, _>(
            "credit_custody",
            rpc_params!(API_VERSION, config.owner, 5u128),
        )
        .await;
    for result in [denied, bridge_denied] {
        match result.unwrap_err() {
            jsonrpsee::core::client::Error::Call(err) => assert_eq!(err.code(), -32014),
            other => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(gateway.context.balance(stranger).unwrap(), 0);
    assert_eq!(gateway.context.balance(config.custody).unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn errors_carry_category_codes(#[future] gateway: Gateway) {
    let client = gateway.await.client();

    let err = client
        .request::<JsonRpcResponse<Order>, _>("get_order", rpc_params!(B256::repeat_byte(9)))
        .await
        .unwrap_err();
    match err {
        jsonrpsee::core::client::Error::Call(err) => assert_eq!(err.code(), -32011),
        other => panic!("unexpected error: {other}"),
    }

    let err = client
        .request::<JsonRpcResponse<Order>, _>(
            "create_order",
            rpc_params!("9.9", B256::repeat_byte(9), Address::repeat_byte(1), 5u128, 0u32),
        )
        .await
        .unwrap_err();
    match err {
        jsonrpsee::core::client::Error::Call(err) => assert_eq!(err.code(), -32001),
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
#[tokio::test]
async fn sponsorship_budget_is_served(#[future] gateway: Gateway) {
    let client = gateway.await.client();
    let payer = Address::repeat_byte(0x33);

    let res: JsonRpcResponse<RemainingBudget> = client
        .request("remaining_budget", rpc_params!(payer))
        .await
        .unwrap();
    assert_eq!(res.data.global, 1_000_000_000);
    assert_eq!(res.data.payer, 50_000_000);
}
