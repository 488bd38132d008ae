//! Integration tests for the head-unit link manager
//!
//! These tests exercise the full stack through the public surface:
//! - manager lifecycle (builder, readiness, teardown)
//! - RPC dispatch (correlation, batches, listeners)
//! - icon bootstrap
//!
//! Everything runs against the scripted in-process peer, so the suite
//! needs no hardware and no network:
//!
//! ```bash
//! cargo test -p hulink-tests
//! ```
//!
//! # Test Structure
//!
//! - `lifecycle_test.rs` - startup, readiness transitions, teardown
//! - `dispatch_test.rs` - request/response correlation and batch jobs
//! - `bootstrap_test.rs` - app icon upload and apply flows

// This crate only contains tests, no library code
