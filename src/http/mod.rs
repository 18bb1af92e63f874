//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with session, record, and debug endpoints
//! - Session lifecycle handlers (create, status, timings, cancel)
//! - Stored-record lookup and deletion
//! - CORS middleware for extension content scripts

pub mod handlers;
pub mod routes;
pub mod sessions;

pub use routes::create_router;
