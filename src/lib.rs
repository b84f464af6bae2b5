//! Pet Echoes client core
//!
//! This library uploads photos to the Pet Echoes image generation backend,
//! tracks the server-side job by polling its status, and retrieves the
//! generated image. The UI layer drives it through
//! [`orchestrator::JobOrchestrator`] and consumes [`models::event::JobEvent`]s.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
