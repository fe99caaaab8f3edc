//! # arcade-error
//!
//! Unified error handling for arcade, the pipeline that compiles agent-authored
//! games and runs them inside a sandbox.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what went wrong (e.g., EntryNotFound, RenderFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use arcade_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ModuleNotFound, "cannot resolve './board'")
//!         .with_operation("bundler::link")
//!         .with_context("importer", "main.tsx")
//!         .with_context("specifier", "./board"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, arcade_error::Error>`
//! - Agent-code failures are converted at the boundary where they originate
//! - `message()` is the plain text shown to the agent; Display is for logs
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using arcade Error
pub type Result<T> = std::result::Result<T, Error>;
