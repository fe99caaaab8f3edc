//! Boa-backed executor.
//!
//! A Boa `Context` is neither `Send` nor `Sync`, so each scene owns a worker
//! thread that creates the context, installs the prelude and then serves
//! commands until the scene is dropped. Replies travel back over oneshot
//! channels. A realm that hangs or panics only affects its own target.
//!
//! There are no host timers, so a promise still pending after the job queue
//! is drained can never settle and is reported as a failure.

use super::host::{self, CallResult, Outcome, Protocol};
use super::{Executor, RenderOutput, Scene};
use crate::artifact::Artifact;
use crate::config::SandboxOptions;
use crate::error::{self, Error, ErrorKind, Result};
use crate::lifecycle::TargetId;
use async_trait::async_trait;
use boa_engine::Context;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info_span, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Executor
// ═══════════════════════════════════════════════════════════════════════════════

/// Executor that gives every scene a fresh Boa realm.
#[derive(Debug, Clone, Default)]
pub struct BoaExecutor {
    options: SandboxOptions,
}

impl BoaExecutor {
    pub fn new(options: SandboxOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }
}

#[async_trait]
impl Executor for BoaExecutor {
    async fn instantiate(&self, target: &TargetId, artifact: &Artifact) -> Result<Arc<dyn Scene>> {
        let scene = BoaScene::spawn(target, &self.options)?;
        scene.instantiate(artifact).await?;
        Ok(Arc::new(scene))
    }

    fn name(&self) -> &str {
        "boa"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scene
// ═══════════════════════════════════════════════════════════════════════════════

enum Command {
    Instantiate {
        code: Arc<str>,
        reply: oneshot::Sender<Result<()>>,
    },
    Render {
        state: String,
        previous: String,
        reply: oneshot::Sender<Result<RenderOutput>>,
    },
    Cleanup {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Handle to a realm thread. Dropping it shuts the realm down.
#[derive(Debug)]
pub struct BoaScene {
    target: TargetId,
    commands: mpsc::UnboundedSender<Command>,
}

impl BoaScene {
    fn spawn(target: &TargetId, options: &SandboxOptions) -> Result<Self> {
        let (commands, inbox) = mpsc::unbounded_channel();
        let options = options.clone();
        let name = target.to_string();
        std::thread::Builder::new()
            .name(format!("arcade-realm-{}", target))
            .spawn(move || serve(name, options, inbox))
            .map_err(|e| {
                Error::unexpected(format!("cannot start realm thread: {}", e))
                    .with_operation("BoaScene::spawn")
                    .set_source(e)
            })?;
        Ok(Self { target: target.clone(), commands })
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| error::channel_closed("realm"))?;
        response.await.map_err(|_| error::channel_closed("realm"))?
    }

    async fn instantiate(&self, artifact: &Artifact) -> Result<()> {
        let code: Arc<str> = Arc::from(artifact.code());
        self.request(|reply| Command::Instantiate { code, reply }).await
    }
}

#[async_trait]
impl Scene for BoaScene {
    async fn render(&self, state: &Value, previous: &Value) -> Result<RenderOutput> {
        let state = state.to_string();
        let previous = previous.to_string();
        self.request(|reply| Command::Render { state, previous, reply }).await
    }

    async fn cleanup(&self) -> Result<()> {
        self.request(|reply| Command::Cleanup { reply }).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Realm thread
// ═══════════════════════════════════════════════════════════════════════════════

fn serve(target: String, options: SandboxOptions, mut inbox: mpsc::UnboundedReceiver<Command>) {
    let _span = info_span!("realm", target_id = %target).entered();
    let mut context = Context::default();
    let setup = host::install(&mut context, &options).map_err(|e| e.message().to_string());
    if let Err(reason) = &setup {
        warn!(reason = %reason, "realm setup failed");
    }

    while let Some(command) = inbox.blocking_recv() {
        let broken = |reason: &String| Error::unexpected(format!("realm unavailable: {}", reason));
        match command {
            Command::Instantiate { code, reply } => {
                let result = match &setup {
                    Ok(protocol) => instantiate(&mut context, protocol, &code),
                    Err(reason) => Err(broken(reason)),
                };
                let _ = reply.send(result);
            }
            Command::Render { state, previous, reply } => {
                let result = match &setup {
                    Ok(protocol) => render(&mut context, protocol, &state, &previous),
                    Err(reason) => Err(broken(reason)),
                };
                let _ = reply.send(result);
            }
            Command::Cleanup { reply } => {
                let result = match &setup {
                    Ok(protocol) => cleanup(&mut context, protocol),
                    Err(reason) => Err(broken(reason)),
                };
                let _ = reply.send(result);
            }
        }
    }
    debug!("realm closed");
}

/// Drain the job queue once if the call left a promise pending.
fn settle(context: &mut Context, protocol: &Protocol, outcome: CallResult) -> CallResult {
    match outcome {
        Ok(Outcome::Pending) => {
            context.run_jobs();
            protocol.settle(context)
        }
        other => other,
    }
}

fn instantiate(context: &mut Context, protocol: &Protocol, code: &str) -> Result<()> {
    debug!(bytes = code.len(), "instantiating");
    let outcome = protocol.instantiate(context, code);
    match settle(context, protocol, outcome) {
        Ok(Outcome::Ok { .. }) => Ok(()),
        Ok(Outcome::Missing { export }) => Err(error::entry_point_missing(export)),
        Ok(Outcome::Failed { error }) => Err(error::execution_failed(error)),
        Ok(Outcome::Pending) => Err(error::execution_failed("setup promise never settled")),
        Err(reason) => Err(error::execution_failed(reason)),
    }
}

fn render(context: &mut Context, protocol: &Protocol, state: &str, previous: &str) -> Result<RenderOutput> {
    let outcome = protocol.render(context, state, previous);
    match settle(context, protocol, outcome) {
        Ok(Outcome::Ok { text, html }) => Ok(RenderOutput { text, html }),
        Ok(Outcome::Failed { error }) => Err(error::render_failed(error)),
        Ok(Outcome::Missing { export }) => Err(error::render_failed(format!("'{}' is no longer exported", export))),
        Ok(Outcome::Pending) => Err(error::render_failed("render promise never settled")),
        Err(reason) => Err(error::render_failed(reason)),
    }
}

fn cleanup(context: &mut Context, protocol: &Protocol) -> Result<()> {
    let outcome = protocol.cleanup(context);
    context.run_jobs();
    match outcome {
        Ok(Outcome::Failed { error }) | Err(error) => {
            Err(Error::new(ErrorKind::ExecutionFailed, format!("cleanup failed: {}", error)))
        }
        Ok(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::Bundler;
    use crate::vfs::VirtualFileSet;
    use serde_json::json;

    fn artifact(code: &str) -> Artifact {
        Artifact::new(code, "main.js", vec![])
    }

    async fn start(code: &str) -> Result<Arc<dyn Scene>> {
        BoaExecutor::default()
            .instantiate(&TargetId::from("test"), &artifact(code))
            .await
    }

    #[tokio::test]
    async fn test_render_round_trip() {
        let scene = start("exports.renderGame = function (c, p) { c.textContent = p.msg; };")
            .await
            .unwrap();
        let out = scene.render(&json!({ "msg": "hi" }), &Value::Null).await.unwrap();
        assert_eq!(out.text, "hi");
        let out = scene.render(&json!({ "msg": "bye" }), &json!({ "msg": "hi" })).await.unwrap();
        assert_eq!(out.text, "bye");
    }

    #[tokio::test]
    async fn test_previous_state_is_passed() {
        let scene = start("exports.renderGame = function (c, s, p) { c.textContent = (p ? p.n : 'none') + '->' + s.n; };")
            .await
            .unwrap();
        let out = scene.render(&json!({ "n": 2 }), &json!({ "n": 1 })).await.unwrap();
        assert_eq!(out.text, "1->2");
    }

    #[tokio::test]
    async fn test_missing_render_entry() {
        let err = start("exports.other = 1;").await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::EntryPointMissing);
        assert!(err.message().contains("renderGame"));
    }

    #[tokio::test]
    async fn test_setup_throw_is_execution_error() {
        let err = start("throw new Error('boom');").await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
        assert!(err.message().contains("boom"));
    }

    #[tokio::test]
    async fn test_render_throw_keeps_scene() {
        let scene = start("exports.renderGame = function (c, s) { c.textContent = s.a.b; };")
            .await
            .unwrap();
        let err = scene.render(&json!({}), &Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenderFailed);
        assert!(err.message().contains("TypeError"));

        let out = scene.render(&json!({ "a": { "b": "ok" } }), &Value::Null).await.unwrap();
        assert_eq!(out.text, "ok");
    }

    #[tokio::test]
    async fn test_async_render_settles() {
        let scene = start("exports.renderGame = async function (c, s) { await null; c.textContent = 'n' + s.n; };")
            .await
            .unwrap();
        let out = scene.render(&json!({ "n": 1 }), &Value::Null).await.unwrap();
        assert_eq!(out.text, "n1");
    }

    #[tokio::test]
    async fn test_async_render_rejection() {
        let scene = start("exports.renderGame = async function () { throw new Error('late'); };")
            .await
            .unwrap();
        let err = scene.render(&json!({}), &Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenderFailed);
        assert!(err.message().contains("late"));
    }

    #[tokio::test]
    async fn test_unsettled_promise_is_reported() {
        let scene = start("exports.renderGame = function () { return new Promise(function () {}); };")
            .await
            .unwrap();
        let err = scene.render(&json!({}), &Value::Null).await.unwrap_err();
        assert!(err.message().contains("never settled"));
    }

    #[tokio::test]
    async fn test_loop_limit() {
        let executor = BoaExecutor::new(SandboxOptions {
            loop_iteration_limit: Some(10_000),
            ..Default::default()
        });
        let scene = executor
            .instantiate(&TargetId::from("spin"), &artifact("exports.renderGame = function () { while (true) {} };"))
            .await
            .unwrap();
        let err = scene.render(&json!({}), &Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenderFailed);
    }

    #[tokio::test]
    async fn test_realms_are_isolated() {
        let a = start("globalThis.shared = 'a'; exports.renderGame = function (c) { c.textContent = String(globalThis.shared); };")
            .await
            .unwrap();
        let b = start("exports.renderGame = function (c) { c.textContent = typeof globalThis.shared; };")
            .await
            .unwrap();
        assert_eq!(a.render(&json!({}), &Value::Null).await.unwrap().text, "a");
        assert_eq!(b.render(&json!({}), &Value::Null).await.unwrap().text, "undefined");
    }

    #[tokio::test]
    async fn test_protocol_is_not_global() {
        let scene = start(
            "exports.renderGame = function (c) {\
               c.textContent = typeof __arcade + ':' + typeof __arcade_log;\
             };",
        )
        .await
        .unwrap();
        let out = scene.render(&json!({}), &Value::Null).await.unwrap();
        assert_eq!(out.text, "undefined:undefined");
    }

    #[tokio::test]
    async fn test_cleanup_entry() {
        let scene = start("exports.renderGame = function () {}; exports.cleanupGame = function () { throw new Error('x'); };")
            .await
            .unwrap();
        assert!(scene.cleanup().await.is_err());

        let scene = start("exports.renderGame = function () {};").await.unwrap();
        assert!(scene.cleanup().await.is_ok());
    }

    #[tokio::test]
    async fn test_compiled_tsx_renders_markup() {
        let files = VirtualFileSet::from_map([
            (
                "main.tsx",
                "import { Score } from './score';\nexport function renderGame(c: any, s: { n: number }) {\n  c.mount(<div className=\"board\"><Score n={s.n} /></div>);\n}",
            ),
            ("score.tsx", "export const Score = ({ n }: { n: number }) => <span>Score: {n}</span>;"),
        ]);
        let artifact = Bundler::default().compile(&files, None).unwrap();
        let scene = BoaExecutor::default()
            .instantiate(&TargetId::from("tsx"), &artifact)
            .await
            .unwrap();
        let out = scene.render(&json!({ "n": 3 }), &Value::Null).await.unwrap();
        assert_eq!(out.html, "<div class=\"board\"><span>Score: 3</span></div>");
        assert_eq!(out.text, "Score: 3");
    }
}
