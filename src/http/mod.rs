//! HTTP API for host control of recognition sessions
//!
//! - POST /sessions - Create (or look up) the session for a slot
//! - GET /sessions - List sessions
//! - POST /sessions/:handle/model - Load a streaming model
//! - POST /sessions/:handle/start - Start an attempt
//! - POST /sessions/:handle/stop - Stop the current attempt
//! - DELETE /sessions/:handle - Release a session
//! - GET /sessions/:handle - Session stats
//! - GET /sessions/:handle/events - Delivered events
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, SessionResponse};
pub use routes::create_router;
pub use state::AppState;
