//! Core domain + dispatch pipeline for the multi-tenant guild audit logger.
//!
//! This crate is intentionally framework-agnostic. Discord lives behind the
//! platform port (trait) implemented in the adapter crate.

pub mod admin;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod event;
pub mod formatting;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod platform;
pub mod rate_limit;
pub mod tenant;

pub use errors::{Error, Result};
