//! Refract Core
//!
//! Core types and abstractions for the Refract media job system.
//!
//! This crate contains:
//! - Domain types: Core business entities (ResultCode, WorkflowKind, ContextKey, assets)
//! - DTOs: Data transfer objects for the HTTP surface of the server

pub mod domain;
pub mod dto;
