// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]

use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use pay_core::{
    manager::{context::memory::InMemoryContext, Manager},
    LedgerConfig,
};
use pay_gateway::{metrics, reserve::CustodyReserve, server};
use pay_order::{Clock, SystemClock};
use pay_sponsor::{FixedPrice, SponsorshipConfig, SponsorshipLedger, DEFAULT_MARKUP_PERCENT};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for JSON-RPC requests.
    /// Defaults to 8080.
    #[arg(long, default_value_t = 8080, env = "PAY_PORT")]
    port: u16,

    /// Owner of the ledger, allowed to run the administrative operations.
    #[arg(long, env = "PAY_OWNER")]
    owner: Address,

    /// Account holding the USDC of open orders.
    #[arg(long, env = "PAY_CUSTODY")]
    custody: Address,

    /// Recipient of the protocol fee taken at settlement.
    #[arg(long, env = "PAY_FEE_RECIPIENT")]
    protocol_fee_recipient: Address,

    /// Bridge endpoint allowed to deliver relayed contributions.
    /// Leave unset to disable the relay path.
    #[arg(long, env = "PAY_TRUSTED_RELAYER")]
    trusted_relayer: Option<Address>,

    /// Chain tag recorded on local contributions.
    #[arg(long, env = "PAY_SETTLEMENT_CHAIN")]
    settlement_chain: u32,

    /// Contract whose calls may be sponsored.
    #[arg(long, env = "PAY_PAYMENT_CONTRACT")]
    payment_contract: Address,

    /// Account whose USDC balance backs sponsored gas.
    #[arg(long, env = "PAY_SPONSOR")]
    sponsor: Address,

    /// Sponsored USDC allowed per day across all payers, in base units.
    #[arg(long, default_value_t = 0, env = "PAY_SPONSOR_DAILY_CAP")]
    sponsor_daily_cap: u128,

    /// Sponsored USDC allowed per day for a single payer, in base units.
    #[arg(long, default_value_t = 0, env = "PAY_SPONSOR_PER_PAYER_CAP")]
    sponsor_per_payer_cap: u128,

    /// Markup applied to converted gas costs, in percent.
    #[arg(long, default_value_t = DEFAULT_MARKUP_PERCENT, env = "PAY_SPONSOR_MARKUP_PERCENT")]
    sponsor_markup_percent: u128,

    /// Smallest payment, in USDC base units, eligible for sponsorship.
    #[arg(long, default_value_t = 0, env = "PAY_SPONSOR_MIN_PAYMENT")]
    sponsor_min_payment: u128,

    /// USDC base units per whole native unit. Sponsorship is refused until set.
    #[arg(long, env = "PAY_NATIVE_PRICE")]
    native_price: Option<u128>,

    /// Maximum request body size in bytes.
    /// Defaults to 10MB.
    #[arg(long, default_value_t = 10 * 1024 * 1024, env = "PAY_MAX_REQUEST_BODY_SIZE")]
    max_request_body_size: u32,

    /// Maximum response body size in bytes.
    /// Defaults to 100kB.
    #[arg(long, default_value_t = 100 * 1024, env = "PAY_MAX_RESPONSE_BODY_SIZE")]
    max_response_body_size: u32,

    /// Maximum number of concurrent connections.
    /// Defaults to 32.
    #[arg(long, default_value_t = 32, env = "PAY_MAX_CONNECTIONS")]
    max_connections: u32,

    /// Metrics server port.
    /// Defaults to 5000.
    #[arg(long, default_value_t = 5000, env = "PAY_METRICS_PORT")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger.
    // Set the log level by setting the RUST_LOG environment variable.
    // tracing_subscriber also picks up the jsonrpsee spans (client IP, etc).
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    debug!("Settings: {:?}", args);

    // Start the metrics server.
    // We just let it gracelessly get killed at the end of main()
    tokio::spawn(metrics::run_server(args.metrics_port));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let context = InMemoryContext::new(clock.clone());

    let ledger = Manager::new(ledger_config(&args), context.clone())?;
    info!("Ledger owner: {:#x}", args.owner);

    let mut sponsorship = SponsorshipLedger::new(
        sponsorship_config(&args),
        CustodyReserve::new(context),
        clock,
    )?;
    if let Some(price) = args.native_price {
        sponsorship = sponsorship.with_price_reference(Arc::new(FixedPrice(price)));
    }

    // Start the JSON-RPC server.
    // This await is non-blocking
    let (handle, _) = server::run_server(
        args.port,
        Arc::new(ledger),
        Arc::new(sponsorship),
        args.max_request_body_size,
        args.max_response_body_size,
        args.max_connections,
    )
    .await?;
    info!("Server started. Listening on port {}.", args.port);

    let _ = handle.await;

    // If we're here, we've received a signal to exit.
    info!("Shutting down...");
    Ok(())
}

fn ledger_config(args: &Args) -> LedgerConfig {
    LedgerConfig {
        owner: args.owner,
        custody: args.custody,
        protocol_fee_recipient: args.protocol_fee_recipient,
        trusted_relayer: args.trusted_relayer.unwrap_or_default(),
        settlement_chain: args.settlement_chain,
    }
}

fn sponsorship_config(args: &Args) -> SponsorshipConfig {
    SponsorshipConfig {
        owner: args.owner,
        payment_contract: args.payment_contract,
        sponsor: args.sponsor,
        daily_cap: args.sponsor_daily_cap,
        per_payer_cap: args.sponsor_per_payer_cap,
        markup_percent: args.sponsor_markup_percent,
        min_payment_amount: args.sponsor_min_payment,
    }
}
