//! Viewer glue: drives the lifecycle manager from session frames.

use crate::service::GameFrame;
use arcade_vm::{
    ArcadeConfig, BoaExecutor, Executor, LifecycleManager, RenderOutcome, Result, TargetId, TargetStatus,
};
use std::sync::Arc;
use tracing::debug;

/// Shows frames on rendering targets, one live scene per target.
#[derive(Debug)]
pub struct Viewer {
    lifecycle: LifecycleManager,
}

impl Viewer {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { lifecycle: LifecycleManager::new(executor) }
    }

    /// A viewer backed by the Boa sandbox.
    pub fn boa(config: &ArcadeConfig) -> Self {
        Self::new(Arc::new(BoaExecutor::new(config.sandbox_options())))
    }

    /// Render `frame` on `target` with its state and previous state.
    pub async fn present(&self, target: &TargetId, frame: &GameFrame) -> Result<RenderOutcome> {
        debug!(target_id = %target, session_id = %frame.session_id, "presenting frame");
        self.lifecycle
            .render_update(target, &frame.artifact, frame.state.clone(), frame.previous_state.clone())
            .await
    }

    pub async fn discard(&self, target: &TargetId) {
        self.lifecycle.discard(target).await;
    }

    /// Discard every target.
    pub async fn shutdown(&self) {
        self.lifecycle.discard_all().await;
    }

    pub fn status(&self, target: &TargetId) -> TargetStatus {
        self.lifecycle.status(target)
    }
}
