//! viva - avatar assessment session orchestration.
//!
//! Provisions a live streaming-avatar session, drives the conversation
//! through a remote agent-completions service, and keeps a durable record
//! of at most one active session per (assessment, user). The streaming
//! provider is allowed to degrade: failures there are masked into locally
//! synthesized mock results so the assessment flow keeps moving. The
//! conversation service is never masked.

pub mod api;
pub mod build_info;
pub mod config;
pub mod conversation;
pub mod handlers;
pub mod orchestrator;
pub mod server;
pub mod store;
pub mod streaming;
pub mod sync;
