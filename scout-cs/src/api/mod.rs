//! HTTP API handlers for scout-cs
//!
//! REST endpoints for running searches plus SSE progress streaming.

pub mod health;
pub mod search;
pub mod settings;
pub mod sse;

pub use health::health_routes;
pub use search::search_routes;
pub use settings::settings_routes;
pub use sse::event_stream;
