// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{str::FromStr, sync::Arc};

use alloy_primitives::{Address, Bytes, B256};
use anyhow::{Context, Result};
use axum::{
    error_handling::HandleError, http::StatusCode, routing::post_service, BoxError, Router,
};
use jsonrpsee::{
    core::async_trait,
    proc_macros::rpc,
    server::{ServerBuilder, ServerConfig},
    types::ErrorObject,
};
use lazy_static::lazy_static;
use log::{error, info};
use pay_core::{
    manager::{
        adapters::LedgerStats, context::memory::InMemoryContext, ContributionReceipt, Manager,
    },
    ErrorKind,
};
use pay_message::MessageId;
use pay_order::{Contribution, Order, OrderProgress};
use pay_sponsor::{
    ExecutionOutcome, OperationDescriptor, Reconciliation, RemainingBudget, SponsorshipContext,
    SponsorshipError, SponsorshipLedger,
};
use prometheus::{register_counter, register_int_counter, Counter, IntCounter};
use tokio::{net::TcpListener, signal, task::JoinHandle};

use crate::{
    api_versioning::{
        pay_rpc_api_versions_info, PayRpcApiVersion, PayRpcApiVersionsInfo,
        PAY_RPC_API_VERSIONS_DEPRECATED,
    },
    error_codes::{JsonRpcErrorCode, JsonRpcWarningCode},
    funding::{self, AccountFunds},
    jsonrpsee_helpers::{JsonRpcError, JsonRpcResponse, JsonRpcResult, JsonRpcWarning},
    reserve::CustodyReserve,
};

// Register the metrics into the global metrics registry.
lazy_static! {
    static ref CONTRIBUTION_SUCCESS_COUNTER: IntCounter = register_int_counter!(
        "contribution_success_count",
        "Number of accepted contributions, local and relayed."
    )
    .unwrap();
    static ref LEDGER_FAILURE_COUNTER: IntCounter = register_int_counter!(
        "ledger_failure_count",
        "Number of failed ledger requests (for any reason)."
    )
    .unwrap();
    static ref RELAY_REPLAY_COUNTER: IntCounter = register_int_counter!(
        "relay_replay_count",
        "Number of relay deliveries rejected as replays."
    )
    .unwrap();
    static ref ORDERS_SETTLED: IntCounter = register_int_counter!(
        "orders_settled",
        "Number of orders settled to their merchant."
    )
    .unwrap();
    static ref SPONSORSHIP_SUCCESS_COUNTER: IntCounter = register_int_counter!(
        "sponsorship_success_count",
        "Number of operations accepted for gas sponsorship."
    )
    .unwrap();
    static ref SPONSORSHIP_FAILURE_COUNTER: IntCounter = register_int_counter!(
        "sponsorship_failure_count",
        "Number of rejected sponsorship requests (for any reason)."
    )
    .unwrap();
    static ref DEPRECATION_WARNING_COUNT: IntCounter = register_int_counter!(
        "deprecation_warning_count",
        "Number of deprecation warnings sent to clients."
    )
    .unwrap();
    static ref VERSION_ERROR_COUNT: IntCounter = register_int_counter!(
        "version_error_count",
        "Number of API version errors sent to clients."
    )
    .unwrap();
    // Float, settled volume in base units quickly exceeds what int64 counters hold.
    static ref TOTAL_USDC_SETTLED: Counter = register_counter!(
        "total_settled_usdc",
        "Total order value settled to merchants (USDC base units)."
    )
    .unwrap();
}

/// Generates the `RpcServer` trait that is used to define the JSON-RPC API.
///
/// The `rpc` macro does not carry this documentation over to the generated
/// trait; the API is described in `pay_gateway/README.md`.
#[rpc(server)]
pub trait Rpc {
    /// Returns the versions of the JSON-RPC API implemented by this server.
    #[method(name = "api_versions")]
    fn api_versions(&self) -> JsonRpcResult<PayRpcApiVersionsInfo>;

    #[method(name = "create_order")]
    async fn create_order(
        &self,
        api_version: String,
        order_id: B256,
        merchant: Address,
        total_amount: u128,
        destination_chain: u32,
    ) -> JsonRpcResult<Order>;

    #[method(name = "contribute_directly")]
    async fn contribute_directly(
        &self,
        api_version: String,
        order_id: B256,
        amount: u128,
        payer: Address,
    ) -> JsonRpcResult<ContributionReceipt>;

    /// `caller` is the bridge endpoint delivering the message.
    #[method(name = "handle_relayed_message")]
    async fn handle_relayed_message(
        &self,
        api_version: String,
        caller: Address,
        source_domain: u32,
        sender: B256,
        payload: Bytes,
        finalized: bool,
    ) -> JsonRpcResult<ContributionReceipt>;

    /// `caller` must be the ledger owner.
    #[method(name = "deposit")]
    async fn deposit(
        &self,
        api_version: String,
        caller: Address,
        account: Address,
        amount: u128,
    ) -> JsonRpcResult<AccountFunds>;

    /// Sets the allowance `owner` grants to custody.
    #[method(name = "approve_custody")]
    async fn approve_custody(
        &self,
        api_version: String,
        owner: Address,
        amount: u128,
    ) -> JsonRpcResult<AccountFunds>;

    /// `caller` is the bridge endpoint delivering funds ahead of its message.
    #[method(name = "credit_custody")]
    async fn credit_custody(
        &self,
        api_version: String,
        caller: Address,
        amount: u128,
    ) -> JsonRpcResult<AccountFunds>;

    #[method(name = "account_funds")]
    async fn account_funds(&self, account: Address) -> JsonRpcResult<AccountFunds>;

    #[method(name = "get_order")]
    async fn get_order(&self, order_id: B256) -> JsonRpcResult<Order>;

    #[method(name = "get_order_progress")]
    async fn get_order_progress(&self, order_id: B256) -> JsonRpcResult<OrderProgress>;

    #[method(name = "get_order_contributions")]
    async fn get_order_contributions(&self, order_id: B256) -> JsonRpcResult<Vec<Contribution>>;

    #[method(name = "is_message_processed")]
    async fn is_message_processed(&self, message_id: MessageId) -> JsonRpcResult<bool>;

    #[method(name = "ledger_stats")]
    async fn ledger_stats(&self) -> JsonRpcResult<LedgerStats>;

    #[method(name = "validate_sponsorship")]
    async fn validate_sponsorship(
        &self,
        api_version: String,
        payer: Address,
        operation: OperationDescriptor,
        estimated_native_cost: u128,
    ) -> JsonRpcResult<SponsorshipContext>;

    #[method(name = "reconcile_sponsorship")]
    async fn reconcile_sponsorship(
        &self,
        api_version: String,
        #[argument(rename = "context")] sponsorship_context: SponsorshipContext,
        actual_native_cost: u128,
        outcome: ExecutionOutcome,
    ) -> JsonRpcResult<Reconciliation>;

    #[method(name = "remaining_budget")]
    async fn remaining_budget(&self, payer: Address) -> JsonRpcResult<RemainingBudget>;
}

#[derive(Clone)]
struct RpcImpl {
    ledger: Arc<Manager<InMemoryContext>>,
    sponsorship: Arc<SponsorshipLedger<CustodyReserve>>,
}

/// Helper method that checks if the given API version is supported.
/// Returns an error if the API version is not supported.
fn parse_api_version(api_version: &str) -> Result<PayRpcApiVersion, JsonRpcError> {
    PayRpcApiVersion::from_str(api_version).map_err(|_| {
        ErrorObject::owned(
            JsonRpcErrorCode::InvalidVersion as i32,
            format!("Unsupported API version: \"{api_version}\"."),
            Some(pay_rpc_api_versions_info()),
        )
    })
}

/// Helper method that checks if the given API version has a deprecation warning.
/// Returns a warning if the API version is deprecated.
fn check_api_version_deprecation(api_version: &PayRpcApiVersion) -> Option<JsonRpcWarning> {
    if PAY_RPC_API_VERSIONS_DEPRECATED.contains(api_version) {
        Some(JsonRpcWarning::new(
            JsonRpcWarningCode::DeprecatedVersion as i32,
            format!("The API version {api_version} will be deprecated."),
            Some(pay_rpc_api_versions_info()),
        ))
    } else {
        None
    }
}

/// Validates the requested API version and collects the warnings it carries.
fn version_warnings(api_version: &str) -> Result<Vec<JsonRpcWarning>, JsonRpcError> {
    let api_version = match parse_api_version(api_version) {
        Ok(v) => v,
        Err(e) => {
            VERSION_ERROR_COUNT.inc();
            return Err(e);
        }
    };

    let mut warnings = Vec::new();
    if let Some(w) = check_api_version_deprecation(&api_version) {
        warnings.push(w);
        DEPRECATION_WARNING_COUNT.inc();
    }
    Ok(warnings)
}

fn ledger_error(err: pay_core::Error) -> JsonRpcError {
    let kind = err.kind();
    LEDGER_FAILURE_COUNTER.inc();
    if kind == ErrorKind::Replay {
        RELAY_REPLAY_COUNTER.inc();
    }
    ErrorObject::owned(
        JsonRpcErrorCode::from(kind) as i32,
        err.to_string(),
        Some(kind),
    )
}

fn sponsorship_error(err: SponsorshipError) -> JsonRpcError {
    SPONSORSHIP_FAILURE_COUNTER.inc();
    ErrorObject::owned(
        JsonRpcErrorCode::from(&err) as i32,
        err.to_string(),
        None::<()>,
    )
}

fn record_contribution(receipt: &ContributionReceipt) {
    CONTRIBUTION_SUCCESS_COUNTER.inc();
    if receipt.settlement.is_some() {
        ORDERS_SETTLED.inc();
        TOTAL_USDC_SETTLED.inc_by(receipt.order.total_amount as f64);
    }
}

#[async_trait]
impl RpcServer for RpcImpl {
    fn api_versions(&self) -> JsonRpcResult<PayRpcApiVersionsInfo> {
        Ok(JsonRpcResponse::ok(pay_rpc_api_versions_info()))
    }

    async fn create_order(
        &self,
        api_version: String,
        order_id: B256,
        merchant: Address,
        total_amount: u128,
        destination_chain: u32,
    ) -> JsonRpcResult<Order> {
        let warnings = version_warnings(&api_version)?;
        let order = self
            .ledger
            .create_order(order_id, merchant, total_amount, destination_chain)
            .await
            .map_err(ledger_error)?;
        Ok(JsonRpcResponse::warn(order, warnings))
    }

    async fn contribute_directly(
        &self,
        api_version: String,
        order_id: B256,
        amount: u128,
        payer: Address,
    ) -> JsonRpcResult<ContributionReceipt> {
        let warnings = version_warnings(&api_version)?;
        let receipt = self
            .ledger
            .contribute_directly(order_id, amount, payer)
            .await
            .map_err(ledger_error)?;
        record_contribution(&receipt);
        Ok(JsonRpcResponse::warn(receipt, warnings))
    }

    async fn handle_relayed_message(
        &self,
        api_version: String,
        caller: Address,
        source_domain: u32,
        sender: B256,
        payload: Bytes,
        finalized: bool,
    ) -> JsonRpcResult<ContributionReceipt> {
        let mut warnings = version_warnings(&api_version)?;
        let receipt = self
            .ledger
            .handle_relayed_message(caller, source_domain, sender, payload, finalized)
            .await
            .map_err(ledger_error)?;
        record_contribution(&receipt);
        if !finalized {
            warnings.push(JsonRpcWarning::unfinalized_transfer(source_domain));
        }
        Ok(JsonRpcResponse::warn(receipt, warnings))
    }

    async fn deposit(
        &self,
        api_version: String,
        caller: Address,
        account: Address,
        amount: u128,
    ) -> JsonRpcResult<AccountFunds> {
        let warnings = version_warnings(&api_version)?;
        let funds = funding::deposit(&self.ledger, caller, account, amount)
            .await
            .map_err(ledger_error)?;
        Ok(JsonRpcResponse::warn(funds, warnings))
    }

    async fn approve_custody(
        &self,
        api_version: String,
        owner: Address,
        amount: u128,
    ) -> JsonRpcResult<AccountFunds> {
        let warnings = version_warnings(&api_version)?;
        let funds = funding::approve_custody(&self.ledger, owner, amount)
            .await
            .map_err(ledger_error)?;
        Ok(JsonRpcResponse::warn(funds, warnings))
    }

    async fn credit_custody(
        &self,
        api_version: String,
        caller: Address,
        amount: u128,
    ) -> JsonRpcResult<AccountFunds> {
        let warnings = version_warnings(&api_version)?;
        let funds = funding::credit_custody(&self.ledger, caller, amount)
            .await
            .map_err(ledger_error)?;
        Ok(JsonRpcResponse::warn(funds, warnings))
    }

    async fn account_funds(&self, account: Address) -> JsonRpcResult<AccountFunds> {
        funding::account_funds(&self.ledger, account)
            .await
            .map(JsonRpcResponse::ok)
            .map_err(ledger_error)
    }

    async fn get_order(&self, order_id: B256) -> JsonRpcResult<Order> {
        self.ledger
            .get_order(order_id)
            .await
            .map(JsonRpcResponse::ok)
            .map_err(ledger_error)
    }

    async fn get_order_progress(&self, order_id: B256) -> JsonRpcResult<OrderProgress> {
        self.ledger
            .get_order_progress(order_id)
            .await
            .map(JsonRpcResponse::ok)
            .map_err(ledger_error)
    }

    async fn get_order_contributions(&self, order_id: B256) -> JsonRpcResult<Vec<Contribution>> {
        self.ledger
            .get_order_contributions(order_id)
            .await
            .map(JsonRpcResponse::ok)
            .map_err(ledger_error)
    }

    async fn is_message_processed(&self, message_id: MessageId) -> JsonRpcResult<bool> {
        self.ledger
            .is_message_processed(message_id)
            .await
            .map(JsonRpcResponse::ok)
            .map_err(ledger_error)
    }

    async fn ledger_stats(&self) -> JsonRpcResult<LedgerStats> {
        self.ledger
            .stats()
            .await
            .map(JsonRpcResponse::ok)
            .map_err(ledger_error)
    }

    async fn validate_sponsorship(
        &self,
        api_version: String,
        payer: Address,
        operation: OperationDescriptor,
        estimated_native_cost: u128,
    ) -> JsonRpcResult<SponsorshipContext> {
        let warnings = version_warnings(&api_version)?;
        let context = self
            .sponsorship
            .validate_sponsorship(payer, &operation, estimated_native_cost)
            .await
            .map_err(sponsorship_error)?;
        SPONSORSHIP_SUCCESS_COUNTER.inc();
        Ok(JsonRpcResponse::warn(context, warnings))
    }

    async fn reconcile_sponsorship(
        &self,
        api_version: String,
        context: SponsorshipContext,
        actual_native_cost: u128,
        outcome: ExecutionOutcome,
    ) -> JsonRpcResult<Reconciliation> {
        let warnings = version_warnings(&api_version)?;
        let reconciliation = self
            .sponsorship
            .reconcile(&context, actual_native_cost, outcome)
            .await
            .map_err(sponsorship_error)?;
        Ok(JsonRpcResponse::warn(reconciliation, warnings))
    }

    async fn remaining_budget(&self, payer: Address) -> JsonRpcResult<RemainingBudget> {
        Ok(JsonRpcResponse::ok(
            self.sponsorship.remaining_budget(payer).await,
        ))
    }
}

pub async fn run_server(
    port: u16,
    ledger: Arc<Manager<InMemoryContext>>,
    sponsorship: Arc<SponsorshipLedger<CustodyReserve>>,
    max_request_body_size: u32,
    max_response_body_size: u32,
    max_concurrent_connections: u32,
) -> Result<(JoinHandle<()>, std::net::SocketAddr)> {
    let rpc_impl = RpcImpl {
        ledger,
        sponsorship,
    };

    let config = ServerConfig::builder()
        .max_request_body_size(max_request_body_size)
        .max_response_body_size(max_response_body_size)
        .max_connections(max_concurrent_connections)
        .http_only()
        .build();
    let service_builder = ServerBuilder::new()
        .set_config(config)
        .to_service_builder();
    let (stop_handle, _server_handle) = jsonrpsee::server::stop_channel();
    let json_rpc_service = service_builder.build(rpc_impl.into_rpc(), stop_handle);

    async fn handle_anyhow_error(err: BoxError) -> (StatusCode, String) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {err}"),
        )
    }
    let router = Router::new().route_service(
        "/",
        HandleError::new(post_service(json_rpc_service), handle_anyhow_error),
    );

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind to gateway port {port}"))?;

    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_handler())
            .await
        {
            error!("Pay gateway error: {e}");
        }
    });

    Ok((handle, addr))
}

/// Graceful shutdown handler
async fn shutdown_handler() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}
