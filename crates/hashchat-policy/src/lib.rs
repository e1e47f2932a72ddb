//! # Hashchat Policy
//!
//! Access conditions and channel policy construction.
//!
//! ## Overview
//!
//! Confidentiality in Hashchat is gated by on-chain-verifiable access
//! policies, not server ACLs. A channel's policy is a [`ConditionSet`]:
//! an ordered sequence of [`AccessCondition`]s with explicit combinators
//! between them. The policy oracle evaluates the set left-to-right and
//! binds sealed keys to its canonical bytes, so construction must be
//! deterministic: the sender building a policy at seal time and a reader
//! rebuilding it at unseal time must produce identical bytes.
//!
//! ## Key Types
//!
//! - [`AccessCondition`] - A single on-chain predicate (closed enum)
//! - [`ConditionSet`] - Ordered conditions + combinators, canonical bytes
//! - [`AccessPolicyBuilder`] - Pure mapping from channel + members to a set
//! - [`ChannelDescriptor`] - A channel id classified by its gating kind

pub mod builder;
pub mod channel;
pub mod condition;
pub mod error;

pub use builder::AccessPolicyBuilder;
pub use channel::{AssetGate, AssetRef, ChannelDescriptor, ChannelId, ChannelKind};
pub use condition::{
    AccessCondition, AssetStandard, Combinator, Comparator, ConditionEntry, ConditionSet,
    ConditionSetBuilder,
};
pub use error::{PolicyError, Result};
