//! Namespace wiring for distributed log entry stores.
//!
//! A namespace is a coordination root shared by many logs. The
//! [`NamespaceDriver`] builds the ledger-backed entry stores its writers and
//! readers use, including the shared allocator pool when it is enabled.
//!
//! # Modules
//!
//! - [`driver`] -- [`NamespaceDriver`] and [`Role`]
//! - [`error`] -- [`NamespaceError`] and the result alias

pub mod driver;
pub mod error;

pub use driver::{NamespaceDriver, Role};
pub use error::{NamespaceError, NamespaceResult};
