//! # Sandbox
//!
//! Runs compiled artifacts. An [`Executor`] turns an artifact into a live
//! [`Scene`] for one rendering target; the scene's render entry is then
//! called once per state update.
//!
//! The shipped executor is [`BoaExecutor`]: every scene gets its own Boa
//! realm on its own thread, whose only ambient capabilities are the JS
//! builtins, a `console` routed to `tracing`, the target's container and a
//! `require` that knows the configured host libraries.

mod host;
mod realm;

pub use realm::{BoaExecutor, BoaScene};

use crate::artifact::Artifact;
use crate::error::Result;
use crate::lifecycle::TargetId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// What a target shows after a successful render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    /// Container text content
    pub text: String,
    /// Container markup
    pub html: String,
}

/// Instantiates artifacts into scenes.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `artifact` once in a fresh scope and bind its entry points.
    ///
    /// Fails with `ExecutionFailed` when the artifact throws or its setup
    /// rejects, and with `EntryPointMissing` when no render entry is
    /// exported.
    async fn instantiate(&self, target: &TargetId, artifact: &Artifact) -> Result<Arc<dyn Scene>>;

    fn name(&self) -> &str;
}

/// One instantiated artifact bound to one target.
#[async_trait]
pub trait Scene: Send + Sync {
    /// Call the render entry with `(container, state, previous)`.
    ///
    /// A throw or rejection comes back as `RenderFailed`; the scene stays
    /// usable for the next update.
    async fn render(&self, state: &Value, previous: &Value) -> Result<RenderOutput>;

    /// Call the cleanup entry if the artifact exported one.
    async fn cleanup(&self) -> Result<()>;
}
