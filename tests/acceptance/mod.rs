//! Integration tests for schedcost acceptance testing.
//!
//! These tests verify the measurement pipeline against the live kernel:
//! - Trial plumbing (rendezvous, traces, statistics) without privilege
//! - Configuration resolution from disk
//! - Full measurement runs under real-time scheduling
//!
//! The full runs require:
//! - Root privileges (or `CAP_SYS_NICE`)
//! - A multi-core host, ideally 4 cores or more
//! - PREEMPT_RT kernel (recommended, not required)

mod common;
mod config_test;
mod experiments_test;
