//! Coordination service contract for the distributed log.
//!
//! The coordination service stores small, versioned nodes in a hierarchy.
//! Writers record allocation intent in it, and allocator pools enumerate
//! their members under it.
//!
//! # Modules
//!
//! - [`error`] -- Error types for coordination requests
//! - [`path`] -- Node path validation and helpers
//! - [`traits`] -- The [`CoordinationClient`] trait
//! - [`memory`] -- In-memory [`InMemoryCoordination`] for tests

pub mod error;
pub mod memory;
pub mod path;
pub mod traits;

pub use error::{CoordError, Result};
pub use memory::InMemoryCoordination;
pub use path::validate_path;
pub use traits::{CoordinationClient, CreateMode};
