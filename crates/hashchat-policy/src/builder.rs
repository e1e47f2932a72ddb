//! Mapping channels and members to condition sets.
//!
//! Pure and deterministic: no I/O, and the same channel + members always
//! produce the same `ConditionSet` (the oracle binds keys to its bytes).

use hashchat_core::{AccountIdentity, ChainNamespace};

use crate::channel::{AssetGate, AssetRef, ChannelDescriptor, ChannelKind};
use crate::condition::{
    AccessCondition, Combinator, Comparator, ConditionSet, ConditionSetBuilder,
};
use crate::error::{PolicyError, Result};

/// Builds a channel's access policy from its descriptor and members.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicyBuilder;

impl AccessPolicyBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the condition set gating a channel's content key.
    ///
    /// `members` is only consulted for direct-message channels;
    /// `asset_gate` optionally tightens DM membership to ownership of a
    /// profile token.
    pub fn build(
        &self,
        channel: &ChannelDescriptor,
        members: &[AccountIdentity],
        asset_gate: Option<&AssetGate>,
    ) -> Result<ConditionSet> {
        match &channel.kind {
            ChannelKind::DirectMessage => self.direct_message(channel, members, asset_gate),
            ChannelKind::AssetGated(asset) => self.asset_gated(asset),
            ChannelKind::RoleGated(safe) => self.role_gated(safe),
        }
    }

    /// One condition per member, in member order, joined by `OR`:
    /// key access is granted to *any* listed wallet.
    fn direct_message(
        &self,
        channel: &ChannelDescriptor,
        members: &[AccountIdentity],
        asset_gate: Option<&AssetGate>,
    ) -> Result<ConditionSet> {
        let mut conditions = members.iter().map(|member| self.member_condition(member, asset_gate));

        let first = conditions
            .next()
            .ok_or_else(|| PolicyError::NoMembers(channel.id.as_str().to_string()))??;

        let mut builder = ConditionSetBuilder::new(first);
        for condition in conditions {
            builder = builder.join(Combinator::Or, condition?);
        }
        Ok(builder.build())
    }

    fn member_condition(
        &self,
        member: &AccountIdentity,
        asset_gate: Option<&AssetGate>,
    ) -> Result<AccessCondition> {
        match (&member.namespace, asset_gate) {
            (ChainNamespace::Eip155, None) => Ok(AccessCondition::WalletMatch {
                chain: member.oracle_chain_name()?.to_string(),
                expected_address: member.address.clone(),
            }),
            // With a profile gate, membership means owning the member's
            // profile token rather than matching the bare address.
            (ChainNamespace::Eip155, Some(gate)) => Ok(AccessCondition::AssetOwnership {
                chain: hashchat_core::oracle_chain_name(
                    &gate.asset.namespace,
                    &gate.asset.reference,
                )?
                .to_string(),
                contract: gate.asset.contract.clone(),
                standard: gate.asset.standard,
                method: "ownerOf".to_string(),
                parameters: vec![gate.token_id_decimal()?],
                comparator: Comparator::Equal,
                threshold: member.address.clone(),
            }),
            (ChainNamespace::Solana, _) => Ok(AccessCondition::WalletMatch {
                chain: "solana".to_string(),
                expected_address: member.address.clone(),
            }),
            (ChainNamespace::Other(ns), _) => {
                Err(PolicyError::UnsupportedChainNamespace(ns.clone()))
            }
        }
    }

    /// A single balance check against the asset encoded in the channel id.
    fn asset_gated(&self, asset: &AssetRef) -> Result<ConditionSet> {
        let chain = hashchat_core::oracle_chain_name(&asset.namespace, &asset.reference)?;
        Ok(ConditionSet::single(AccessCondition::AssetOwnership {
            chain: chain.to_string(),
            contract: asset.contract.clone(),
            standard: asset.standard,
            method: "balanceOf".to_string(),
            parameters: vec![":userAddress".to_string()],
            comparator: Comparator::GreaterThan,
            threshold: "0".to_string(),
        }))
    }

    /// A single `isOwner` role check against the gating safe contract.
    fn role_gated(&self, safe: &AccountIdentity) -> Result<ConditionSet> {
        Ok(ConditionSet::single(AccessCondition::ContractRole {
            chain: safe.oracle_chain_name()?.to_string(),
            contract: safe.address.clone(),
            method: "isOwner".to_string(),
            expected: "true".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelId;
    use crate::condition::ConditionEntry;

    fn dm_channel() -> ChannelDescriptor {
        ChannelDescriptor::direct(ChannelId::from("c1"))
    }

    #[test]
    fn test_dm_three_members_or_joined() {
        let members = vec![
            AccountIdentity::eip155(1, "0xa"),
            AccountIdentity::eip155(1, "0xb"),
            AccountIdentity::eip155(1, "0xc"),
        ];

        let set = AccessPolicyBuilder::new()
            .build(&dm_channel(), &members, None)
            .unwrap();

        // 3 WalletMatch conditions joined by 2 ORs, in member order.
        assert_eq!(set.len(), 3);
        let ops: Vec<_> = set.operators().collect();
        assert_eq!(ops, vec![Combinator::Or, Combinator::Or]);

        let addresses: Vec<_> = set
            .conditions()
            .map(|c| match c {
                AccessCondition::WalletMatch {
                    expected_address, ..
                } => expected_address.clone(),
                other => panic!("expected WalletMatch, got {other:?}"),
            })
            .collect();
        assert_eq!(addresses, vec!["0xa", "0xb", "0xc"]);
    }

    #[test]
    fn test_dm_mixed_namespaces() {
        let members = vec![
            AccountIdentity::eip155(1, "0xa"),
            AccountIdentity::solana("So1Addr"),
        ];

        let set = AccessPolicyBuilder::new()
            .build(&dm_channel(), &members, None)
            .unwrap();

        let chains: Vec<_> = set
            .conditions()
            .map(|c| match c {
                AccessCondition::WalletMatch { chain, .. } => chain.clone(),
                other => panic!("expected WalletMatch, got {other:?}"),
            })
            .collect();
        assert_eq!(chains, vec!["ethereum", "solana"]);
    }

    #[test]
    fn test_dm_unsupported_namespace_fails() {
        let members = vec![
            AccountIdentity::eip155(1, "0xa"),
            AccountIdentity::new(ChainNamespace::from("cosmos"), "hub", "cosmos1x"),
        ];

        let err = AccessPolicyBuilder::new()
            .build(&dm_channel(), &members, None)
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::UnsupportedChainNamespace(ns) if ns == "cosmos"
        ));
    }

    #[test]
    fn test_dm_empty_members_fails() {
        let err = AccessPolicyBuilder::new()
            .build(&dm_channel(), &[], None)
            .unwrap_err();
        assert!(matches!(err, PolicyError::NoMembers(_)));
    }

    #[test]
    fn test_dm_profile_gate_uses_owner_of() {
        let members = vec![AccountIdentity::eip155(1, "0xa")];
        let gate = AssetGate {
            asset: AssetRef::erc721(137, "0xDb46d1"),
            token_id: "0x10".to_string(),
        };

        let set = AccessPolicyBuilder::new()
            .build(&dm_channel(), &members, Some(&gate))
            .unwrap();

        match set.conditions().next().unwrap() {
            AccessCondition::AssetOwnership {
                chain,
                method,
                parameters,
                comparator,
                threshold,
                ..
            } => {
                assert_eq!(chain, "polygon");
                assert_eq!(method, "ownerOf");
                assert_eq!(parameters, &vec!["16".to_string()]);
                assert_eq!(*comparator, Comparator::Equal);
                assert_eq!(threshold, "0xa");
            }
            other => panic!("expected AssetOwnership, got {other:?}"),
        };
    }

    #[test]
    fn test_asset_gated_channel_balance_check() {
        let asset = AssetRef::erc721(1, "0xcollection");
        let channel = ChannelDescriptor::asset_gated(asset);

        let set = AccessPolicyBuilder::new().build(&channel, &[], None).unwrap();

        match set.conditions().next().unwrap() {
            AccessCondition::AssetOwnership {
                chain,
                method,
                comparator,
                threshold,
                ..
            } => {
                assert_eq!(chain, "ethereum");
                assert_eq!(method, "balanceOf");
                assert_eq!(*comparator, Comparator::GreaterThan);
                assert_eq!(threshold, "0");
            }
            other => panic!("expected AssetOwnership, got {other:?}"),
        };
    }

    #[test]
    fn test_role_gated_channel_is_owner_check() {
        let safe = AccountIdentity::eip155(100, "0x5afe");
        let channel = ChannelDescriptor::role_gated(safe);

        let set = AccessPolicyBuilder::new().build(&channel, &[], None).unwrap();

        match set.conditions().next().unwrap() {
            AccessCondition::ContractRole {
                chain,
                contract,
                method,
                expected,
            } => {
                assert_eq!(chain, "xdai");
                assert_eq!(contract, "0x5afe");
                assert_eq!(method, "isOwner");
                assert_eq!(expected, "true");
            }
            other => panic!("expected ContractRole, got {other:?}"),
        };
    }

    #[test]
    fn test_same_inputs_same_bytes() {
        let members = vec![
            AccountIdentity::eip155(1, "0xa"),
            AccountIdentity::eip155(1, "0xb"),
        ];
        let builder = AccessPolicyBuilder::new();

        let b1 = builder
            .build(&dm_channel(), &members, None)
            .unwrap()
            .canonical_bytes()
            .unwrap();
        let b2 = builder
            .build(&dm_channel(), &members, None)
            .unwrap()
            .canonical_bytes()
            .unwrap();
        assert_eq!(b1, b2);
    }
}
