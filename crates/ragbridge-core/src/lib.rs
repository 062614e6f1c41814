//! Shared configuration, domain types, and failure classes for ragbridge.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
