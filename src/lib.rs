//! Trimsalon booking and settlement core
//!
//! This library provides all the core functionality for the salon booking
//! service: availability checking, the appointment lifecycle, and the
//! payment settlement engine. It can be used independently of the main
//! binary for testing or integration into other applications.

pub mod config;
pub mod error;
pub mod handlers;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod state;
pub mod timeslot;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::*;
pub use state::AppState;
