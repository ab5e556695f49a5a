//! Incident reports with a cache-aside listing layer.
//!
//! Records live in an [`state::IncidentStore`]; paginated listings are read
//! through a [`cache::ListingCache`] and cleared wholesale on every write. The
//! coordination lives in [`service::IncidentService`].

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod state;
pub mod telemetry;

pub use error::{AppError, Result};
