//! Access conditions: the predicates the policy oracle evaluates.
//!
//! A condition set is an ordered, alternating sequence of conditions and
//! combinators. Order matters: the oracle evaluates left-to-right and
//! signs the serialized set, so the same channel must always produce the
//! same sequence.

use serde::{Deserialize, Serialize};

use hashchat_core::{canonical_bytes, CoreError};

/// Comparator applied to a condition's on-chain return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    /// Exact equality.
    #[serde(rename = "=")]
    Equal,
    /// Strictly greater than.
    #[serde(rename = ">")]
    GreaterThan,
}

/// Combinator between two adjacent conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

/// Token standard of an asset-ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStandard {
    Erc20,
    Erc721,
    Erc1155,
}

impl AssetStandard {
    /// The contract-type name the oracle expects (uppercased standard).
    pub fn contract_type(&self) -> &'static str {
        match self {
            AssetStandard::Erc20 => "ERC20",
            AssetStandard::Erc721 => "ERC721",
            AssetStandard::Erc1155 => "ERC1155",
        }
    }
}

/// A single access predicate, evaluated by the policy oracle.
///
/// Closed set: every branch the system can express is a variant here, so
/// policy construction is exhaustive and testable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessCondition {
    /// The requesting wallet is exactly this address.
    WalletMatch {
        /// Oracle chain identifier (e.g. `ethereum`, `solana`).
        chain: String,
        /// The address the requester must prove control of.
        expected_address: String,
    },

    /// The requesting wallet holds (or owns) an asset.
    AssetOwnership {
        /// Oracle chain identifier.
        chain: String,
        /// The asset contract address.
        contract: String,
        /// Token standard of the contract.
        standard: AssetStandard,
        /// Contract method to call (`balanceOf`, `ownerOf`).
        method: String,
        /// Method parameters; `:userAddress` is substituted by the oracle.
        parameters: Vec<String>,
        /// Comparator applied to the return value.
        comparator: Comparator,
        /// Balance threshold or expected return value, depending on the
        /// method.
        threshold: String,
    },

    /// The requesting wallet satisfies a role predicate on a contract.
    ContractRole {
        /// Oracle chain identifier.
        chain: String,
        /// The gating contract address.
        contract: String,
        /// The boolean view method to call (e.g. `isOwner`).
        method: String,
        /// Expected stringified return value (e.g. `true`).
        expected: String,
    },
}

/// One entry in a condition set: a condition or a combinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionEntry {
    Condition(AccessCondition),
    Operator(Combinator),
}

/// An ordered sequence of conditions with combinators between them.
///
/// The alternation invariant (condition, operator, condition, ...) is
/// enforced by construction: the only way to build a set is
/// [`ConditionSet::single`] or [`ConditionSetBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet {
    entries: Vec<ConditionEntry>,
}

impl ConditionSet {
    /// A set with exactly one condition.
    pub fn single(condition: AccessCondition) -> Self {
        ConditionSetBuilder::new(condition).build()
    }

    /// The entries in evaluation order.
    pub fn entries(&self) -> &[ConditionEntry] {
        &self.entries
    }

    /// Iterate the conditions, skipping combinators.
    pub fn conditions(&self) -> impl Iterator<Item = &AccessCondition> {
        self.entries.iter().filter_map(|e| match e {
            ConditionEntry::Condition(c) => Some(c),
            ConditionEntry::Operator(_) => None,
        })
    }

    /// Iterate the combinators, in order.
    pub fn operators(&self) -> impl Iterator<Item = Combinator> + '_ {
        self.entries.iter().filter_map(|e| match e {
            ConditionEntry::Operator(op) => Some(*op),
            ConditionEntry::Condition(_) => None,
        })
    }

    /// Number of conditions (not counting combinators).
    pub fn len(&self) -> usize {
        self.conditions().count()
    }

    /// True if the set holds no conditions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The deterministic bytes the oracle binds sealed keys to.
    ///
    /// Equal sets produce equal bytes regardless of how they were built.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        canonical_bytes(&self.entries)
    }
}

/// Builder that keeps conditions and combinators alternating.
#[derive(Debug)]
pub struct ConditionSetBuilder {
    entries: Vec<ConditionEntry>,
}

impl ConditionSetBuilder {
    /// Start a set with its first condition.
    pub fn new(first: AccessCondition) -> Self {
        Self {
            entries: vec![ConditionEntry::Condition(first)],
        }
    }

    /// Append `<combinator> <condition>`.
    pub fn join(mut self, combinator: Combinator, condition: AccessCondition) -> Self {
        self.entries.push(ConditionEntry::Operator(combinator));
        self.entries.push(ConditionEntry::Condition(condition));
        self
    }

    /// Append `OR <condition>`.
    pub fn or(self, condition: AccessCondition) -> Self {
        self.join(Combinator::Or, condition)
    }

    /// Append `AND <condition>`.
    pub fn and(self, condition: AccessCondition) -> Self {
        self.join(Combinator::And, condition)
    }

    /// Finish the set.
    pub fn build(self) -> ConditionSet {
        ConditionSet {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(addr: &str) -> AccessCondition {
        AccessCondition::WalletMatch {
            chain: "ethereum".to_string(),
            expected_address: addr.to_string(),
        }
    }

    #[test]
    fn test_single_set_shape() {
        let set = ConditionSet::single(wallet("0xa"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.operators().count(), 0);
    }

    #[test]
    fn test_builder_alternates() {
        let set = ConditionSetBuilder::new(wallet("0xa"))
            .or(wallet("0xb"))
            .or(wallet("0xc"))
            .build();

        assert_eq!(set.len(), 3);
        let ops: Vec<_> = set.operators().collect();
        assert_eq!(ops, vec![Combinator::Or, Combinator::Or]);

        // Entries strictly alternate.
        for (i, entry) in set.entries().iter().enumerate() {
            match entry {
                ConditionEntry::Condition(_) => assert_eq!(i % 2, 0),
                ConditionEntry::Operator(_) => assert_eq!(i % 2, 1),
            }
        }
    }

    #[test]
    fn test_canonical_bytes_deterministic() {
        let build = || {
            ConditionSetBuilder::new(wallet("0xa"))
                .or(wallet("0xb"))
                .build()
        };
        assert_eq!(
            build().canonical_bytes().unwrap(),
            build().canonical_bytes().unwrap()
        );
    }

    #[test]
    fn test_canonical_bytes_order_sensitive() {
        let ab = ConditionSetBuilder::new(wallet("0xa")).or(wallet("0xb")).build();
        let ba = ConditionSetBuilder::new(wallet("0xb")).or(wallet("0xa")).build();
        assert_ne!(
            ab.canonical_bytes().unwrap(),
            ba.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn test_cbor_roundtrip() {
        let set = ConditionSetBuilder::new(wallet("0xa"))
            .and(AccessCondition::ContractRole {
                chain: "xdai".to_string(),
                contract: "0xsafe".to_string(),
                method: "isOwner".to_string(),
                expected: "true".to_string(),
            })
            .build();

        let mut buf = Vec::new();
        ciborium::into_writer(&set, &mut buf).unwrap();
        let recovered: ConditionSet = ciborium::from_reader(&buf[..]).unwrap();
        assert_eq!(set, recovered);
    }
}
