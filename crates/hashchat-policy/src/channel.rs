//! Channel identifiers and the references embedded in them.
//!
//! Gated channels encode their gating contract or asset directly in the
//! channel id, so any party can rebuild the channel's access policy from
//! the id alone. The transport only allows identifier-safe characters,
//! so `:` and `/` are carried as `_` and `-` (reversible).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use hashchat_core::{AccountIdentity, ChainNamespace};

use crate::condition::AssetStandard;
use crate::error::PolicyError;

/// Prefix marking a multisig-gated channel id.
const SAFE_CHANNEL_PREFIX: &str = "gno_";

/// An opaque channel identifier, as the transport sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    /// Wrap a transport channel id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl FromStr for AssetStandard {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "erc20" => Ok(AssetStandard::Erc20),
            "erc721" => Ok(AssetStandard::Erc721),
            "erc1155" => Ok(AssetStandard::Erc1155),
            other => Err(PolicyError::MalformedChannelId(format!(
                "unknown asset standard: {other}"
            ))),
        }
    }
}

/// A CAIP-19 style asset reference: chain, token standard, contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Chain namespace of the asset's chain.
    pub namespace: ChainNamespace,
    /// Chain reference within the namespace.
    pub reference: String,
    /// Token standard.
    pub standard: AssetStandard,
    /// The asset contract address.
    pub contract: String,
}

impl AssetRef {
    /// An ERC-721 collection on an EVM chain.
    pub fn erc721(chain_id: u64, contract: impl Into<String>) -> Self {
        Self {
            namespace: ChainNamespace::Eip155,
            reference: chain_id.to_string(),
            standard: AssetStandard::Erc721,
            contract: contract.into(),
        }
    }

    /// The CAIP-19 string form (`eip155:137/erc721:0x..`).
    pub fn to_caip(&self) -> String {
        format!(
            "{}:{}/{}:{}",
            self.namespace,
            self.reference,
            self.standard.contract_type().to_lowercase(),
            self.contract
        )
    }

    /// Parse the CAIP-19 string form.
    pub fn from_caip(s: &str) -> Result<Self, PolicyError> {
        let malformed = || PolicyError::MalformedChannelId(s.to_string());

        let (chain, asset) = s.split_once('/').ok_or_else(malformed)?;
        let (namespace, reference) = chain.split_once(':').ok_or_else(malformed)?;
        let (standard, contract) = asset.split_once(':').ok_or_else(malformed)?;

        if reference.is_empty() || contract.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            namespace: ChainNamespace::from(namespace),
            reference: reference.to_string(),
            standard: standard.parse()?,
            contract: contract.to_string(),
        })
    }

    /// The identifier-safe channel id encoding (`:`→`_`, `/`→`-`).
    pub fn to_channel_id(&self) -> ChannelId {
        ChannelId::new(self.to_caip().replace(':', "_").replace('/', "-"))
    }

    /// Decode an asset reference from a channel id.
    pub fn from_channel_id(id: &ChannelId) -> Result<Self, PolicyError> {
        Self::from_caip(&id.as_str().replace('_', ":").replace('-', "/"))
    }
}

/// An asset gate applied to direct-message members: membership requires
/// owning a specific token of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetGate {
    /// The gating collection.
    pub asset: AssetRef,
    /// Token id, hex-encoded as wallets report it.
    pub token_id: String,
}

impl AssetGate {
    /// The token id in the decimal form contract calls expect.
    pub fn token_id_decimal(&self) -> Result<String, PolicyError> {
        let digits = self.token_id.trim_start_matches("0x");
        u128::from_str_radix(digits, 16)
            .map(|n| n.to_string())
            .map_err(|_| PolicyError::InvalidTokenId(self.token_id.clone()))
    }
}

/// How a channel's content key is gated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    /// Keyed to the listed members' wallets.
    DirectMessage,
    /// Keyed to holders of an asset encoded in the channel id.
    AssetGated(AssetRef),
    /// Keyed to members/owners of a gating contract (e.g. a safe).
    RoleGated(AccountIdentity),
}

/// A channel id together with its decoded gating kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub id: ChannelId,
    pub kind: ChannelKind,
}

impl ChannelDescriptor {
    /// A direct-message channel.
    pub fn direct(id: ChannelId) -> Self {
        Self {
            id,
            kind: ChannelKind::DirectMessage,
        }
    }

    /// An asset-gated channel; the id is derived from the asset.
    pub fn asset_gated(asset: AssetRef) -> Self {
        Self {
            id: asset.to_channel_id(),
            kind: ChannelKind::AssetGated(asset),
        }
    }

    /// A multisig-gated channel; the id is derived from the safe account.
    pub fn role_gated(safe: AccountIdentity) -> Self {
        Self {
            id: ChannelId::new(format!("{SAFE_CHANNEL_PREFIX}{}", safe.to_user_id())),
            kind: ChannelKind::RoleGated(safe),
        }
    }

    /// Classify a raw channel id by its shape.
    ///
    /// `gno_`-prefixed ids are multisig-gated, ids that decode as an
    /// asset reference are asset-gated, everything else is a
    /// direct-message channel.
    pub fn classify(id: ChannelId) -> Result<Self, PolicyError> {
        if let Some(encoded) = id.as_str().strip_prefix(SAFE_CHANNEL_PREFIX) {
            let safe = AccountIdentity::from_user_id(encoded)
                .map_err(|_| PolicyError::MalformedChannelId(id.as_str().to_string()))?;
            return Ok(Self {
                id,
                kind: ChannelKind::RoleGated(safe),
            });
        }

        if let Ok(asset) = AssetRef::from_channel_id(&id) {
            return Ok(Self {
                id,
                kind: ChannelKind::AssetGated(asset),
            });
        }

        Ok(Self::direct(id))
    }
}
