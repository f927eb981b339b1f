//! Tests for the algorithms module.
//!
//! - `returns_tests`: backward return fold, bootstrap rule, GAE
//! - `loss_tests`: loss assembly on a real network
