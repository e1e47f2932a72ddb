//! # Hashchat Testkit
//!
//! Testing utilities for Hashchat.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **LocalOracle**: an in-process policy oracle that seals keys and
//!   actually evaluates access conditions against registered chain state
//! - **Fixtures**: helper structs wiring a full pipeline over the memory
//!   transport for multi-party scenarios
//! - **Generators**: proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up a two-party conversation:
//!
//! ```rust,no_run
//! use hashchat_testkit::fixtures::{dm_channel, TestFixture, TestNetwork};
//!
//! # async fn example() {
//! let network = TestNetwork::new();
//! let alice = TestFixture::new(&network);
//! let bob = TestFixture::new(&network);
//!
//! alice.connect().await.unwrap();
//! bob.connect().await.unwrap();
//!
//! let channel = dm_channel(&network, "c1", &[&alice, &bob]).await;
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod oracle;

pub use fixtures::{dm_channel, multi_party_fixtures, TestFixture, TestNetwork};
pub use oracle::LocalOracle;
