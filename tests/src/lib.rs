//! # Contest Session Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Simulated browser + session launcher
//! └── integration/      # End-to-end flows through SessionHandle
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p contest-tests
//! cargo test -p contest-tests integration::session_flows
//!
//! # Benchmarks
//! cargo bench -p contest-tests
//! ```

#![allow(dead_code)]

pub mod harness;
pub mod integration;
