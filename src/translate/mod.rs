//! Translation pipeline
//!
//! This module covers everything between a normalized cue sequence and a
//! fully translated timing array:
//! - Provider abstraction and the batch request/response types
//! - Google web-endpoint client (fast baseline tier)
//! - OpenAI-compatible chat client (quality tier)
//! - Timing synchronizer that applies results without corrupting slots
//! - Two-phase orchestrator driving quick and quality passes

pub mod apply;
pub mod google;
pub mod openai;
pub mod orchestrator;
pub mod provider;

pub use orchestrator::run_session;
pub use provider::TranslationProvider;
