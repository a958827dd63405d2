// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use jsonrpsee::core::Serialize;
use serde::Deserialize;
use serde_json::value::Value;

use crate::error_codes::JsonRpcWarningCode;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct JsonRpcWarning {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct JsonRpcResponse<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<JsonRpcWarning>>,
}

pub type JsonRpcError = jsonrpsee::types::ErrorObjectOwned;
pub type JsonRpcResult<T> = Result<JsonRpcResponse<T>, JsonRpcError>;

impl<T: Serialize> JsonRpcResponse<T> {
    /// Response carrying `data` and no warnings.
    pub fn ok(data: T) -> Self {
        JsonRpcResponse {
            data,
            warnings: None,
        }
    }

    /// Response carrying `data` and `warnings`.
    /// An empty warnings vector leaves the field out of the JSON-RPC response.
    pub fn warn(data: T, warnings: Vec<JsonRpcWarning>) -> Self {
        JsonRpcResponse {
            data,
            warnings: if warnings.is_empty() {
                None
            } else {
                Some(warnings)
            },
        }
    }
}

impl JsonRpcWarning {
    pub fn new<S: Serialize>(code: i32, message: String, data: Option<S>) -> Self {
        JsonRpcWarning {
            code,
            message,
            data: data.and_then(|d| serde_json::to_value(&d).ok()),
        }
    }

    /// A relayed contribution was accepted before its source transfer finalized.
    /// The data names the source domain so clients can track its finality.
    pub fn unfinalized_transfer(source_domain: u32) -> Self {
        JsonRpcWarning::new(
            JsonRpcWarningCode::UnfinalizedTransfer as i32,
            format!(
                "Contribution was accepted from an unfinalized transfer on source domain {source_domain}."
            ),
            Some(UnfinalizedTransfer { source_domain }),
        )
    }
}

/// Data of an unfinalized transfer warning
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnfinalizedTransfer {
    pub source_domain: u32,
}
