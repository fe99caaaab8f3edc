//! # Instance Lifecycle Manager
//!
//! Keeps at most one live [`Scene`] per rendering target and feeds it state
//! updates in submission order.
//!
//! ```text
//!   Empty ──render_update──▶ Initializing ──instantiate ok──▶ Ready
//!     ▲                          │    ▲                         │
//!     └──── instantiate failed ──┘    └── different artifact ───┘
//! ```
//!
//! While a target is `Initializing`, further updates are queued and the
//! caller gets a [`QueuedRender`] back immediately. The task that started the
//! instantiation renders its own payload first, then drains the queue in
//! arrival order, each queued payload receiving the one before it as its
//! previous state. The target only becomes `Ready` once the queue is empty,
//! so later updates can never overtake queued ones.
//!
//! Targets are independent: each has its own slot and nothing locks across
//! targets. Targets are freed only by [`LifecycleManager::discard`].
//!
//! A target also falls back to `Empty` when the call driving its
//! instantiation is dropped mid-way, or when its scene's realm has gone away
//! (`ChannelClosed`), so the next update starts from scratch.

use crate::artifact::Artifact;
use crate::error::{self, Error, ErrorKind, Result};
use crate::sandbox::{Executor, RenderOutput, Scene};
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Opaque handle naming one rendering target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Observable phase of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Empty,
    Initializing { artifact_ref: String, pending: usize },
    Ready { artifact_ref: String },
}

/// What `render_update` did with a payload.
#[derive(Debug)]
pub enum RenderOutcome {
    /// Rendered by this call.
    Rendered(RenderOutput),
    /// Queued behind an in-flight instantiation.
    Queued(QueuedRender),
}

impl RenderOutcome {
    /// Wait for the payload to be rendered, whichever path it took.
    pub async fn into_output(self) -> Result<RenderOutput> {
        match self {
            RenderOutcome::Rendered(output) => Ok(output),
            RenderOutcome::Queued(queued) => queued.wait().await,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, RenderOutcome::Queued(_))
    }
}

/// Receipt for a queued payload.
#[derive(Debug)]
pub struct QueuedRender {
    position: usize,
    result: oneshot::Receiver<Result<RenderOutput>>,
}

impl QueuedRender {
    /// 1-based position in the queue at the time of queuing.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Resolves once the payload has been rendered, or with `ChannelClosed`
    /// when the target was discarded first.
    pub async fn wait(self) -> Result<RenderOutput> {
        self.result
            .await
            .map_err(|_| error::channel_closed("pending render"))?
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Slots
// ═══════════════════════════════════════════════════════════════════════════════

struct Pending {
    artifact: Artifact,
    state: Value,
    reply: oneshot::Sender<Result<RenderOutput>>,
}

enum SlotState {
    Empty,
    Initializing {
        artifact: Artifact,
        pending: VecDeque<Pending>,
    },
    Ready {
        artifact: Artifact,
        scene: Arc<dyn Scene>,
    },
}

struct TargetSlot {
    state: Mutex<SlotState>,
    /// Held across every call into the scene so calls never overlap.
    turn: tokio::sync::Mutex<()>,
}

impl TargetSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
            turn: tokio::sync::Mutex::new(()),
        }
    }
}

enum Plan {
    Direct(Arc<dyn Scene>),
    Initialize(Option<Arc<dyn Scene>>),
}

enum Next {
    Render(Pending),
    Done,
    Discarded,
}

/// Armed while a call owns a target's instantiation. Dropping it armed means
/// the call was cancelled: the target goes back to `Empty` and anything queued
/// is failed.
struct StartGuard<'a> {
    target: &'a TargetId,
    slot: &'a TargetSlot,
    armed: bool,
}

impl StartGuard<'_> {
    fn release(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let dropped = LifecycleManager::reset(self.slot, &error::channel_closed("instantiation"));
        warn!(target_id = %self.target, dropped, "instantiation cancelled");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Manager
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-target scene state machine over an [`Executor`].
pub struct LifecycleManager {
    executor: Arc<dyn Executor>,
    targets: Mutex<HashMap<TargetId, Arc<TargetSlot>>>,
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("executor", &self.executor.name())
            .field("targets", &self.targets.lock().len())
            .finish()
    }
}

impl LifecycleManager {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            targets: Mutex::new(HashMap::new()),
        }
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    fn slot(&self, target: &TargetId) -> Arc<TargetSlot> {
        self.targets
            .lock()
            .entry(target.clone())
            .or_insert_with(|| Arc::new(TargetSlot::new()))
            .clone()
    }

    /// Current phase of `target`.
    pub fn status(&self, target: &TargetId) -> TargetStatus {
        let Some(slot) = self.targets.lock().get(target).cloned() else {
            return TargetStatus::Empty;
        };
        let state = slot.state.lock();
        match &*state {
            SlotState::Empty => TargetStatus::Empty,
            SlotState::Initializing { artifact, pending } => TargetStatus::Initializing {
                artifact_ref: artifact.artifact_ref().to_string(),
                pending: pending.len(),
            },
            SlotState::Ready { artifact, .. } => TargetStatus::Ready {
                artifact_ref: artifact.artifact_ref().to_string(),
            },
        }
    }

    /// Render `state` on `target`, instantiating `artifact` first when the
    /// target is empty or shows a different artifact.
    ///
    /// Errors from instantiation are returned here and leave the target
    /// `Empty`. Render errors leave the scene in place.
    pub async fn render_update(
        &self,
        target: &TargetId,
        artifact: &Artifact,
        state: Value,
        previous: Value,
    ) -> Result<RenderOutcome> {
        let slot = self.slot(target);

        let plan = {
            let mut current = slot.state.lock();
            if let SlotState::Initializing { pending, .. } = &mut *current {
                let (reply, result) = oneshot::channel();
                pending.push_back(Pending { artifact: artifact.clone(), state, reply });
                debug!(target_id = %target, queued = pending.len(), "update queued behind instantiation");
                return Ok(RenderOutcome::Queued(QueuedRender { position: pending.len(), result }));
            }

            let reusable = match &*current {
                SlotState::Ready { artifact: shown, scene } if shown.same_code(artifact) => Some(scene.clone()),
                _ => None,
            };
            match reusable {
                Some(scene) => Plan::Direct(scene),
                None => {
                    let starting = SlotState::Initializing { artifact: artifact.clone(), pending: VecDeque::new() };
                    match std::mem::replace(&mut *current, starting) {
                        SlotState::Ready { scene, .. } => Plan::Initialize(Some(scene)),
                        _ => Plan::Initialize(None),
                    }
                }
            }
        };

        match plan {
            Plan::Direct(scene) => {
                let _turn = slot.turn.lock().await;
                let result = scene.render(&state, &previous).await;
                if matches!(&result, Err(e) if e.kind() == ErrorKind::ChannelClosed) {
                    Self::forget(target, &slot, &scene);
                }
                result
                    .map(RenderOutcome::Rendered)
                    .map_err(|e| e.with_context("target", target.to_string()))
            }
            Plan::Initialize(replaced) => self
                .initialize(target, &slot, replaced, artifact.clone(), state, previous)
                .await
                .map(RenderOutcome::Rendered),
        }
    }

    /// Tear down `target`: run the scene's cleanup (errors are only logged)
    /// and drop anything still queued.
    pub async fn discard(&self, target: &TargetId) {
        let Some(slot) = self.targets.lock().remove(target) else {
            return;
        };
        let previous = std::mem::replace(&mut *slot.state.lock(), SlotState::Empty);
        match previous {
            SlotState::Ready { scene, .. } => {
                let _turn = slot.turn.lock().await;
                Self::cleanup(target, scene).await;
                info!(target_id = %target, "target discarded");
            }
            SlotState::Initializing { pending, .. } => {
                info!(target_id = %target, dropped = pending.len(), "target discarded during instantiation");
            }
            SlotState::Empty => {}
        }
    }

    /// Discard every target concurrently.
    pub async fn discard_all(&self) {
        let targets: Vec<TargetId> = self.targets.lock().keys().cloned().collect();
        join_all(targets.iter().map(|target| self.discard(target))).await;
    }

    /// Number of targets with a slot.
    pub fn target_count(&self) -> usize {
        self.targets.lock().len()
    }

    async fn cleanup(target: &TargetId, scene: Arc<dyn Scene>) {
        if let Err(err) = scene.cleanup().await {
            warn!(target_id = %target, error = %err.message(), "cleanup failed");
        }
    }

    async fn initialize(
        &self,
        target: &TargetId,
        slot: &TargetSlot,
        replaced: Option<Arc<dyn Scene>>,
        artifact: Artifact,
        state: Value,
        previous: Value,
    ) -> Result<RenderOutput> {
        let mut guard = StartGuard { target, slot, armed: true };
        let _turn = slot.turn.lock().await;
        if let Some(old) = replaced {
            Self::cleanup(target, old).await;
        }

        info!(target_id = %target, artifact_ref = %artifact.artifact_ref(), "instantiating");
        let scene = match self.executor.instantiate(target, &artifact).await {
            Ok(scene) => scene,
            Err(err) => {
                guard.release();
                Self::abandon(target, slot, &err);
                return Err(err.with_context("target", target.to_string()));
            }
        };

        let first = scene.render(&state, &previous).await;
        let mut shown = artifact;
        let mut scene = scene;
        let mut last_state = state;

        loop {
            let next = Self::next(slot, &shown, &scene);
            if !matches!(next, Next::Render(_)) {
                guard.release();
            }
            match next {
                Next::Done => break,
                Next::Discarded => {
                    debug!(target_id = %target, "target discarded while starting, cleaning up new scene");
                    Self::cleanup(target, scene).await;
                    break;
                }
                Next::Render(item) => {
                    if !item.artifact.same_code(&shown) {
                        info!(target_id = %target, artifact_ref = %item.artifact.artifact_ref(), "re-instantiating for queued update");
                        Self::cleanup(target, scene.clone()).await;
                        match self.executor.instantiate(target, &item.artifact).await {
                            Ok(next) => {
                                scene = next;
                                shown = item.artifact.clone();
                            }
                            Err(err) => {
                                guard.release();
                                Self::abandon(target, slot, &err);
                                let _ = item.reply.send(Err(err));
                                break;
                            }
                        }
                    }
                    let result = scene.render(&item.state, &last_state).await;
                    let _ = item.reply.send(result);
                    last_state = item.state;
                }
            }
        }

        first.map_err(|e| e.with_context("target", target.to_string()))
    }

    /// Take the next queued payload, or publish `scene` as ready when the
    /// queue is empty.
    fn next(slot: &TargetSlot, shown: &Artifact, scene: &Arc<dyn Scene>) -> Next {
        let mut current = slot.state.lock();
        let SlotState::Initializing { artifact, pending } = &mut *current else {
            return Next::Discarded;
        };
        if let Some(item) = pending.pop_front() {
            *artifact = item.artifact.clone();
            return Next::Render(item);
        }
        *current = SlotState::Ready { artifact: shown.clone(), scene: scene.clone() };
        Next::Done
    }

    /// Instantiation failed: reset the target and fail everything queued.
    fn abandon(target: &TargetId, slot: &TargetSlot, err: &Error) {
        let dropped = Self::reset(slot, err);
        warn!(target_id = %target, error = %err.message(), dropped, "instantiation failed");
    }

    /// Move an `Initializing` slot back to `Empty`, failing its queue with a
    /// copy of `err`. Returns how many queued payloads were failed.
    fn reset(slot: &TargetSlot, err: &Error) -> usize {
        let pending = {
            let mut current = slot.state.lock();
            // Discarded meanwhile; nothing to fail.
            if !matches!(&*current, SlotState::Initializing { .. }) {
                return 0;
            }
            match std::mem::replace(&mut *current, SlotState::Empty) {
                SlotState::Initializing { pending, .. } => pending,
                _ => VecDeque::new(),
            }
        };
        let dropped = pending.len();
        for item in pending {
            let _ = item.reply.send(Err(Error::new(err.kind(), err.message()).with_operation(err.operation())));
        }
        dropped
    }

    /// The realm behind `scene` is gone. Empty the target if it still shows
    /// that scene.
    fn forget(target: &TargetId, slot: &TargetSlot, scene: &Arc<dyn Scene>) {
        let mut current = slot.state.lock();
        let lost = matches!(&*current, SlotState::Ready { scene: shown, .. } if Arc::ptr_eq(shown, scene));
        if lost {
            *current = SlotState::Empty;
            warn!(target_id = %target, "scene realm closed, target reset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Records every render call as "<artifact>:<state>:<previous>".
    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn entries(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    struct FakeScene {
        code: String,
        log: Arc<Log>,
        cleanups: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Scene for FakeScene {
        async fn render(&self, state: &Value, previous: &Value) -> Result<RenderOutput> {
            self.log.0.lock().push(format!("{}:{}:{}", self.code, state, previous));
            if state.get("fail").is_some() {
                return Err(error::render_failed("boom"));
            }
            if state.get("gone").is_some() {
                return Err(error::channel_closed("realm"));
            }
            Ok(RenderOutput { text: state.to_string(), html: String::new() })
        }

        async fn cleanup(&self) -> Result<()> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Err(error::render_failed("cleanup is allowed to fail"))
        }
    }

    /// Instantiation blocks until `gate` is notified (when `gated`).
    struct FakeExecutor {
        gated: bool,
        gate: Notify,
        instantiations: AtomicUsize,
        cleanups: Arc<AtomicUsize>,
        log: Arc<Log>,
    }

    impl FakeExecutor {
        fn new(gated: bool) -> Arc<Self> {
            Arc::new(Self {
                gated,
                gate: Notify::new(),
                instantiations: AtomicUsize::new(0),
                cleanups: Arc::new(AtomicUsize::new(0)),
                log: Arc::new(Log::default()),
            })
        }
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        async fn instantiate(&self, _target: &TargetId, artifact: &Artifact) -> Result<Arc<dyn Scene>> {
            self.instantiations.fetch_add(1, Ordering::SeqCst);
            if self.gated {
                self.gate.notified().await;
            }
            if artifact.code() == "broken" {
                return Err(error::execution_failed("bad artifact"));
            }
            Ok(Arc::new(FakeScene {
                code: artifact.code().to_string(),
                log: self.log.clone(),
                cleanups: self.cleanups.clone(),
            }))
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn artifact(code: &str) -> Artifact {
        Artifact::new(code, "main.ts", vec![])
    }

    #[tokio::test]
    async fn test_first_render_instantiates_then_reuses() {
        let executor = FakeExecutor::new(false);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");
        let a = artifact("A");

        let out = manager
            .render_update(&target, &a, json!(1), Value::Null)
            .await
            .unwrap()
            .into_output()
            .await
            .unwrap();
        assert_eq!(out.text, "1");
        assert!(matches!(manager.status(&target), TargetStatus::Ready { .. }));

        manager.render_update(&target, &a, json!(2), json!(1)).await.unwrap();
        assert_eq!(executor.instantiations.load(Ordering::SeqCst), 1);
        assert_eq!(executor.log.entries(), vec!["A:1:null", "A:2:1"]);
    }

    #[tokio::test]
    async fn test_concurrent_updates_queue_in_order() {
        let executor = FakeExecutor::new(true);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");
        let a = artifact("A");

        let first = manager.render_update(&target, &a, json!(1), Value::Null);
        let rest = async {
            // Let the first call reach the gate before queuing more.
            tokio::task::yield_now().await;
            let second = manager.render_update(&target, &a, json!(2), json!(1)).await.unwrap();
            let third = manager.render_update(&target, &a, json!(3), json!(2)).await.unwrap();
            assert!(second.is_queued());
            assert!(third.is_queued());
            assert_eq!(
                manager.status(&target),
                TargetStatus::Initializing { artifact_ref: a.artifact_ref().to_string(), pending: 2 }
            );
            executor.gate.notify_one();
            (second, third)
        };
        let (first, (second, third)) = tokio::join!(first, rest);

        assert_eq!(first.unwrap().into_output().await.unwrap().text, "1");
        assert_eq!(second.into_output().await.unwrap().text, "2");
        assert_eq!(third.into_output().await.unwrap().text, "3");
        assert_eq!(executor.instantiations.load(Ordering::SeqCst), 1);
        assert_eq!(executor.log.entries(), vec!["A:1:null", "A:2:1", "A:3:2"]);
        assert!(matches!(manager.status(&target), TargetStatus::Ready { .. }));
    }

    #[tokio::test]
    async fn test_queued_render_waits_for_instantiation() {
        let executor = FakeExecutor::new(true);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");
        let a = artifact("A");

        let first = manager.render_update(&target, &a, json!(1), Value::Null);
        let rest = async {
            tokio::task::yield_now().await;
            let queued = match manager.render_update(&target, &a, json!(2), json!(1)).await.unwrap() {
                RenderOutcome::Queued(queued) => queued,
                RenderOutcome::Rendered(_) => panic!("expected the update to queue"),
            };
            assert_eq!(queued.position(), 1);
            let mut waiting = tokio_test::task::spawn(queued.wait());
            tokio_test::assert_pending!(waiting.poll());
            executor.gate.notify_one();
            waiting
        };
        let (first, waiting) = tokio::join!(first, rest);

        first.unwrap();
        assert_eq!(waiting.await.unwrap().text, "2");
    }

    #[tokio::test]
    async fn test_new_artifact_replaces_scene() {
        let executor = FakeExecutor::new(false);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");

        manager.render_update(&target, &artifact("A"), json!(1), Value::Null).await.unwrap();
        manager.render_update(&target, &artifact("B"), json!(2), json!(1)).await.unwrap();

        assert_eq!(executor.instantiations.load(Ordering::SeqCst), 2);
        assert_eq!(executor.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(executor.log.entries(), vec!["A:1:null", "B:2:1"]);
    }

    #[tokio::test]
    async fn test_queued_update_with_new_artifact_reinstantiates() {
        let executor = FakeExecutor::new(true);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");
        let (a, b) = (artifact("A"), artifact("B"));

        let first = manager.render_update(&target, &a, json!(1), Value::Null);
        let rest = async {
            tokio::task::yield_now().await;
            let queued = manager.render_update(&target, &b, json!(2), json!(1)).await.unwrap();
            executor.gate.notify_one();
            tokio::task::yield_now().await;
            executor.gate.notify_one();
            queued
        };
        let (first, queued) = tokio::join!(first, rest);
        first.unwrap();
        assert_eq!(queued.into_output().await.unwrap().text, "2");
        assert_eq!(executor.log.entries(), vec!["A:1:null", "B:2:1"]);
        assert_eq!(
            manager.status(&target),
            TargetStatus::Ready { artifact_ref: b.artifact_ref().to_string() }
        );
    }

    #[tokio::test]
    async fn test_instantiation_failure_resets_target() {
        let executor = FakeExecutor::new(false);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");

        let err = manager
            .render_update(&target, &artifact("broken"), json!(1), Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
        assert_eq!(manager.status(&target), TargetStatus::Empty);

        // The next update retries from scratch.
        manager.render_update(&target, &artifact("A"), json!(2), Value::Null).await.unwrap();
        assert!(matches!(manager.status(&target), TargetStatus::Ready { .. }));
    }

    #[tokio::test]
    async fn test_render_error_keeps_scene() {
        let executor = FakeExecutor::new(false);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");
        let a = artifact("A");

        manager.render_update(&target, &a, json!(1), Value::Null).await.unwrap();
        let err = manager
            .render_update(&target, &a, json!({ "fail": true }), json!(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenderFailed);
        assert!(err.is_retryable());

        manager.render_update(&target, &a, json!(3), json!(1)).await.unwrap();
        assert_eq!(executor.instantiations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discard_runs_cleanup_and_swallows_errors() {
        let executor = FakeExecutor::new(false);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");

        manager.render_update(&target, &artifact("A"), json!(1), Value::Null).await.unwrap();
        manager.discard(&target).await;
        assert_eq!(executor.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(manager.status(&target), TargetStatus::Empty);
        assert_eq!(manager.target_count(), 0);

        manager.discard(&target).await;
        assert_eq!(executor.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_targets_are_independent() {
        let executor = FakeExecutor::new(false);
        let manager = LifecycleManager::new(executor.clone());
        let a = artifact("A");

        manager.render_update(&TargetId::from("x"), &a, json!(1), Value::Null).await.unwrap();
        manager.render_update(&TargetId::from("y"), &a, json!(1), Value::Null).await.unwrap();
        assert_eq!(executor.instantiations.load(Ordering::SeqCst), 2);

        manager.discard(&TargetId::from("x")).await;
        assert!(matches!(manager.status(&TargetId::from("y")), TargetStatus::Ready { .. }));

        manager.discard_all().await;
        assert_eq!(manager.target_count(), 0);
        assert_eq!(executor.cleanups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_instantiation_resets_target() {
        let executor = FakeExecutor::new(true);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");
        let a = artifact("A");

        let first = tokio::time::timeout(
            Duration::from_millis(20),
            manager.render_update(&target, &a, json!(1), Value::Null),
        );
        let rest = async {
            tokio::task::yield_now().await;
            manager.render_update(&target, &a, json!(2), json!(1)).await.unwrap()
        };
        let (first, queued) = tokio::join!(first, rest);
        assert!(first.is_err());
        assert_eq!(manager.status(&target), TargetStatus::Empty);
        assert_eq!(queued.into_output().await.unwrap_err().kind(), ErrorKind::ChannelClosed);

        executor.gate.notify_one();
        let out = manager
            .render_update(&target, &a, json!(3), Value::Null)
            .await
            .unwrap()
            .into_output()
            .await
            .unwrap();
        assert_eq!(out.text, "3");
        assert_eq!(executor.instantiations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closed_realm_resets_target() {
        let executor = FakeExecutor::new(false);
        let manager = LifecycleManager::new(executor.clone());
        let target = TargetId::from("t");
        let a = artifact("A");

        manager.render_update(&target, &a, json!(1), Value::Null).await.unwrap();
        let err = manager
            .render_update(&target, &a, json!({ "gone": true }), json!(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChannelClosed);
        assert_eq!(manager.status(&target), TargetStatus::Empty);

        manager.render_update(&target, &a, json!(3), Value::Null).await.unwrap();
        assert_eq!(executor.instantiations.load(Ordering::SeqCst), 2);
        assert!(matches!(manager.status(&target), TargetStatus::Ready { .. }));
    }
}
