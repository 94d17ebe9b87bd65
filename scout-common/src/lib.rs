//! # Scout Common Library
//!
//! Shared code for Scout microservices including:
//! - Event types (ScoutEvent enum) and the EventBus
//! - Configuration loading and data folder resolution
//! - Common error types

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
