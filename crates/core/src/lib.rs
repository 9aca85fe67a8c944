//! Core business logic for vidshare.
//!
//! Services take user IDs explicitly; authentication happens in the API layer.

pub mod services;

pub use services::*;
