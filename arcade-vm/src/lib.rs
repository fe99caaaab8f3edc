//! # Arcade VM
//!
//! Compiles small multi-file TypeScript/TSX games written by an agent and
//! runs them in an isolated sandbox, one live scene per rendering target.
//!
//! ## Core Concepts
//! - **Virtual File Set**: path to source text, the whole input of a compile
//! - **Bundler**: resolves, type-erases and links the files into one [`Artifact`]
//! - **Sandbox**: an [`Executor`] turns an artifact into a live [`Scene`]
//! - **Lifecycle**: [`LifecycleManager`] keeps one scene per target and
//!   serializes state updates onto it
//! - **Session Cache**: bounded recency store of artifact and latest state

pub mod artifact;
pub mod bundler;
pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod resolver;
pub mod sandbox;
pub mod vfs;

pub use artifact::Artifact;
pub use bundler::{Bundler, Diagnostic};
pub use cache::{SessionCache, SessionRecord};
pub use config::{ArcadeConfig, CompileOptions, SandboxOptions};
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use lifecycle::{LifecycleManager, QueuedRender, RenderOutcome, TargetId, TargetStatus};
pub use resolver::Resolver;
pub use sandbox::{BoaExecutor, BoaScene, Executor, RenderOutput, Scene};
pub use vfs::VirtualFileSet;
