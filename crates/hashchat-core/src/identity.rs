//! Wallet identities: chain-namespaced account addresses.
//!
//! Accounts follow the CAIP-10 shape `namespace:reference:address`
//! (e.g. `eip155:1:0xab..ef`). The transport layer cannot carry `:` in
//! user ids, so accounts also have a reversible `_`-separated encoding.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CoreError;

/// The chain namespace of a wallet account.
///
/// Closed over the namespaces Hashchat can map to the policy oracle.
/// `Other` preserves unknown namespaces for error reporting; every
/// mapping rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChainNamespace {
    /// EVM chains (CAIP-2 `eip155`).
    Eip155,
    /// Solana.
    Solana,
    /// Any namespace Hashchat has no mapping for.
    Other(String),
}

impl ChainNamespace {
    /// The CAIP namespace string.
    pub fn as_str(&self) -> &str {
        match self {
            ChainNamespace::Eip155 => "eip155",
            ChainNamespace::Solana => "solana",
            ChainNamespace::Other(s) => s,
        }
    }
}

impl From<&str> for ChainNamespace {
    fn from(s: &str) -> Self {
        match s {
            "eip155" => ChainNamespace::Eip155,
            "solana" => ChainNamespace::Solana,
            other => ChainNamespace::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ChainNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChainNamespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChainNamespace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ChainNamespace::from(s.as_str()))
    }
}

/// A chain-namespaced wallet address.
///
/// Immutable; constructed once per wallet connection. Equality is by all
/// three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountIdentity {
    /// The chain namespace (`eip155`, `solana`, ...).
    pub namespace: ChainNamespace,
    /// The chain reference within the namespace (e.g. `1` for mainnet).
    pub reference: String,
    /// The wallet address, verbatim as the wallet reports it.
    pub address: String,
}

impl AccountIdentity {
    /// Create a new account identity.
    pub fn new(
        namespace: ChainNamespace,
        reference: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            namespace,
            reference: reference.into(),
            address: address.into(),
        }
    }

    /// An EVM account on the given chain id.
    pub fn eip155(chain_id: u64, address: impl Into<String>) -> Self {
        Self::new(ChainNamespace::Eip155, chain_id.to_string(), address)
    }

    /// A Solana mainnet account.
    pub fn solana(address: impl Into<String>) -> Self {
        Self::new(ChainNamespace::Solana, "mainnet", address)
    }

    /// Parse from the `namespace:reference:address` string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ns), Some(reference), Some(address))
                if !ns.is_empty() && !reference.is_empty() && !address.is_empty() =>
            {
                Ok(Self::new(ChainNamespace::from(ns), reference, address))
            }
            _ => Err(CoreError::MalformedAccountId(s.to_string())),
        }
    }

    /// The transport-safe user id encoding (`:` replaced with `_`).
    pub fn to_user_id(&self) -> String {
        self.to_string().replace(':', "_")
    }

    /// Parse from the transport user id encoding.
    pub fn from_user_id(user_id: &str) -> Result<Self, CoreError> {
        Self::parse(&user_id.replace('_', ":"))
    }

    /// The oracle chain identifier for this account's chain.
    pub fn oracle_chain_name(&self) -> Result<&'static str, CoreError> {
        oracle_chain_name(&self.namespace, &self.reference)
    }
}

impl fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.reference, self.address)
    }
}

/// EVM chain references the policy oracle knows by name.
///
/// Mirrors the oracle's supported-chain table; references outside this
/// table cannot be expressed in a condition set.
const EIP155_ORACLE_CHAINS: &[(&str, &str)] = &[
    ("1", "ethereum"),
    ("5", "goerli"),
    ("10", "optimism"),
    ("56", "bsc"),
    ("100", "xdai"),
    ("137", "polygon"),
    ("250", "fantom"),
    ("42161", "arbitrum"),
    ("43114", "avalanche"),
    ("80001", "mumbai"),
];

/// Map a chain to the identifier the policy oracle evaluates conditions
/// against.
///
/// Fails with [`CoreError::UnsupportedChainNamespace`] for namespaces
/// outside `eip155`/`solana`, and with
/// [`CoreError::UnknownChainReference`] for EVM chains the oracle has no
/// name for.
pub fn oracle_chain_name(
    namespace: &ChainNamespace,
    reference: &str,
) -> Result<&'static str, CoreError> {
    match namespace {
        ChainNamespace::Eip155 => EIP155_ORACLE_CHAINS
            .iter()
            .find(|(known, _)| *known == reference)
            .map(|(_, name)| *name)
            .ok_or_else(|| CoreError::UnknownChainReference {
                namespace: "eip155".to_string(),
                reference: reference.to_string(),
            }),
        ChainNamespace::Solana => Ok("solana"),
        ChainNamespace::Other(ns) => Err(CoreError::UnsupportedChainNamespace(ns.clone())),
    }
}
