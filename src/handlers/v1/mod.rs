//! V1 API handlers.

mod sessions;

pub use sessions::{end_session, get_session, list_sessions, send_turn, start_session};
