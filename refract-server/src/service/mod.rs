//! Service Module
//!
//! Business logic layer for the server.
//! Handlers stay thin and delegate to these services.

pub mod monitor;
pub mod processing;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

// Re-export for convenience
pub use processing as processing_service;
pub use session as session_service;
