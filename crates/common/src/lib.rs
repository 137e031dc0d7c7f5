//! Common utilities and shared types for courier.
//!
//! This crate provides foundational components used across all courier crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: UUID-based identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use courier_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!     let id_gen = IdGenerator::new();
//!     println!("Generated ID: {}", id_gen.generate());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
