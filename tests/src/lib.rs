//! # Aura Hive Test Suite
//!
//! Unified test crate covering cross-crate behavior:
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Fixtures: catalog items, pipeline builders, LLM stub
//! ├── integration/
//! │   ├── negotiation_flows.rs  # End-to-end pipeline scenarios
//! │   ├── market_flows.rs       # Crypto lock round-trips and races
//! │   └── signing.rs            # Signature-layer scenarios
//! └── properties.rs     # Property tests for the economic invariants
//! ```
//!
//! ## Running
//!
//! ```bash
//! cargo test -p aura-tests
//! cargo test -p aura-tests integration::
//! cargo test -p aura-tests properties::
//! ```

#![allow(dead_code)]

pub mod integration;
pub mod properties;
pub mod support;
