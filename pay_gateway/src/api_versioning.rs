// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;

use jsonrpsee::core::Serialize;
use serde::Deserialize;
use strum::{self, IntoEnumIterator};

/// Versions of the gateway JSON-RPC API implemented by this server.
/// They are numbered independently of the crate versions, so the ledger
/// libraries can change without breaking RPC clients (or vice versa).
#[derive(Clone, Debug, Eq, PartialEq, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum PayRpcApiVersion {
    #[strum(serialize = "0.1")]
    V0_1,
}

// Serialized through the strum strings ("0.1") rather than the variant names.
impl serde::ser::Serialize for PayRpcApiVersion {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

impl<'de> serde::de::Deserialize<'de> for PayRpcApiVersion {
    fn deserialize<D>(deserializer: D) -> std::result::Result<PayRpcApiVersion, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PayRpcApiVersion::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Versions for which a deprecation warning is attached to every response.
pub static PAY_RPC_API_VERSIONS_DEPRECATED: &[PayRpcApiVersion] = &[];

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PayRpcApiVersionsInfo {
    pub versions_supported: Vec<PayRpcApiVersion>,
    pub versions_deprecated: Vec<PayRpcApiVersion>,
}

pub fn pay_rpc_api_versions_info() -> PayRpcApiVersionsInfo {
    PayRpcApiVersionsInfo {
        versions_supported: PayRpcApiVersion::iter().collect::<Vec<_>>(),
        versions_deprecated: PAY_RPC_API_VERSIONS_DEPRECATED.to_vec(),
    }
}
