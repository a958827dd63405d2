// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Multi-contribution order ledger
//!
//! A merchant opens an order for a fixed USDC amount. Payers fill it with
//! contributions made either on the settlement chain or on another chain, in
//! which case a trusted bridge relays the contribution as a message. Once the
//! received amount reaches the order total the order is settled in one step:
//! the merchant is paid the total minus a 5% protocol fee and the fee goes to
//! the protocol fee recipient.
//!
//! ## Getting started
//!
//! Take a look at the [`manager`] module: [`manager::Manager`] drives every
//! operation and talks to storage, custody and event delivery through the
//! adapters in [`manager::adapters`]. With the `in_memory` feature (enabled by
//! default) [`manager::context::memory::InMemoryContext`] implements all of
//! them.

mod config;
mod error;
pub mod manager;

pub use config::LedgerConfig;
pub use error::{Error, ErrorKind};
