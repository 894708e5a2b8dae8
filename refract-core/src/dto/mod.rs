//! Data Transfer Objects for the HTTP surface
//!
//! DTOs used between the server and its clients. They are lightweight
//! representations of domain entities optimized for network transfer.

pub mod asset;
pub mod capabilities;
pub mod metrics;
pub mod session;
