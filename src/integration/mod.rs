//! Integration test support
//!
//! Shared fixtures (mock provider, cue builders, prebuilt state) and
//! end-to-end tests driving the whole two-pass scheduler.

pub mod fixtures;

mod e2e;
