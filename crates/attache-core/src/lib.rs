//! # attache-core
//!
//! Foundational types for the Attache workspace:
//! - Entity traits (`Identifiable`, `Timestamped`)
//! - Configuration types and environment loading

pub mod config;
pub mod traits;

pub use config::*;
pub use traits::*;
