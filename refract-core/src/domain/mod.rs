//! Core domain types
//!
//! This module contains the core domain structures used across Refract crates.
//! These types are shared between the runner (for execution), the server
//! (for session handling) and the CLI (for one-shot runs).

pub mod asset;
pub mod context;
pub mod lifecycle;
pub mod result;
pub mod session;
pub mod workflow;
