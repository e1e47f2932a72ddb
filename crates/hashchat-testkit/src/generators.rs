//! Proptest generators for property-based testing.

use proptest::prelude::*;

use hashchat_core::{AccountIdentity, ChainNamespace, MessageId, MessageKind, MessagePayload};
use hashchat_policy::{AccessCondition, ChannelId, ConditionSet, ConditionSetBuilder};

/// Generate a hex address with a `0x` prefix.
pub fn evm_address() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<u8>(), 20).prop_map(|bytes| format!("0x{}", hex::encode(bytes)))
}

/// Generate an EVM account on a chain the oracle knows.
pub fn eip155_account() -> impl Strategy<Value = AccountIdentity> {
    (prop_oneof![Just(1u64), Just(10), Just(100), Just(137)], evm_address())
        .prop_map(|(chain_id, address)| AccountIdentity::eip155(chain_id, address))
}

/// Generate an account in any supported namespace.
pub fn account_identity() -> impl Strategy<Value = AccountIdentity> {
    prop_oneof![
        eip155_account(),
        evm_address().prop_map(|addr| AccountIdentity::new(
            ChainNamespace::Solana,
            "mainnet",
            addr
        )),
    ]
}

/// Generate a channel id in DM shape.
pub fn channel_id() -> impl Strategy<Value = ChannelId> {
    "[a-z][a-z0-9]{0,31}".prop_map(ChannelId::new)
}

/// Generate a message payload with optional fields toggled.
pub fn message_payload() -> impl Strategy<Value = MessagePayload> {
    (
        "[a-f0-9]{32}",
        "[ -~]{0,64}",
        proptest::option::of(0i64..=1_900_000_000_000),
        proptest::option::of("[a-z0-9_]{1,24}"),
    )
        .prop_map(|(id, content, created_at, thread_id)| MessagePayload {
            id: Some(MessageId::new(id)),
            kind: MessageKind::Message,
            body: Some(serde_json::json!({ "content": content })),
            to: None,
            from: None,
            thread_id,
            created_at,
            expires_at: None,
            reply_url: None,
            reply_to: None,
        })
}

/// Generate a wallet-match condition set of 1..=5 members.
pub fn wallet_match_set() -> impl Strategy<Value = ConditionSet> {
    prop::collection::vec(evm_address(), 1..=5).prop_map(|addresses| {
        let mut iter = addresses.into_iter().map(|address| AccessCondition::WalletMatch {
            chain: "ethereum".to_string(),
            expected_address: address,
        });
        let mut builder = ConditionSetBuilder::new(iter.next().expect("at least one"));
        for condition in iter {
            builder = builder.or(condition);
        }
        builder.build()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashchat_core::canonical_payload_bytes;
    use hashchat_policy::{AccessPolicyBuilder, ChannelDescriptor};

    proptest! {
        #[test]
        fn test_payload_canonical_bytes_deterministic(payload in message_payload()) {
            let b1 = canonical_payload_bytes(&payload).unwrap();
            let b2 = canonical_payload_bytes(&payload).unwrap();
            prop_assert_eq!(b1, b2);
        }

        #[test]
        fn test_payload_cbor_roundtrip(payload in message_payload()) {
            let mut buf = Vec::new();
            ciborium::into_writer(&payload, &mut buf).unwrap();
            let recovered: MessagePayload = ciborium::from_reader(&buf[..]).unwrap();
            prop_assert_eq!(payload, recovered);
        }

        #[test]
        fn test_condition_set_bytes_deterministic(set in wallet_match_set()) {
            prop_assert_eq!(
                set.canonical_bytes().unwrap(),
                set.clone().canonical_bytes().unwrap()
            );
        }

        #[test]
        fn test_user_id_encoding_roundtrip(account in account_identity()) {
            let user_id = account.to_user_id();
            prop_assert_eq!(AccountIdentity::from_user_id(&user_id).unwrap(), account);
        }

        #[test]
        fn test_dm_policy_member_order_preserved(members in prop::collection::vec(eip155_account(), 1..=5)) {
            let channel = ChannelDescriptor::direct(ChannelId::from("c1"));
            let set = AccessPolicyBuilder::new().build(&channel, &members, None).unwrap();

            prop_assert_eq!(set.len(), members.len());
            let addresses: Vec<_> = set
                .conditions()
                .map(|c| match c {
                    AccessCondition::WalletMatch { expected_address, .. } => expected_address.clone(),
                    other => panic!("unexpected condition {other:?}"),
                })
                .collect();
            let expected: Vec<_> = members.iter().map(|m| m.address.clone()).collect();
            prop_assert_eq!(addresses, expected);
        }
    }
}
