//! Atelier: resilient generation and asset loading for AI-generated 3D assets
//!
//! Submits body and garment generation jobs to a slow, occasionally
//! unavailable remote service, tracks them to completion, and turns their
//! results into displayable models through an ordered fallback chain that
//! ends in a procedural placeholder.

pub mod abandon;
pub mod api;
pub mod asset;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod provider;
pub mod retry;
pub mod telemetry;

pub use abandon::AbandonToken;
pub use api::Atelier;
pub use error::{ApiError, ErrorKind};
