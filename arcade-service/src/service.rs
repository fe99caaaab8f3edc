//! The two exposed operations: compile+start and state-update.

use arcade_vm::error::{self, Result};
use arcade_vm::{ArcadeConfig, Artifact, Bundler, SessionCache, SessionRecord, VirtualFileSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Input of [`GameService::start_game`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    pub title: String,
    pub files: BTreeMap<String, String>,
    /// Raw JSON text; rejected before compiling when it does not parse.
    pub initial_state: String,
    /// Reuse this session id instead of allocating one.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Explicit entry file, overriding the configured candidates.
    #[serde(default)]
    pub entry: Option<String>,
}

impl StartRequest {
    pub fn new(title: impl Into<String>, initial_state: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            initial_state: initial_state.into(),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.files.insert(path.into(), source.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }
}

/// Input of [`GameService::update_state`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub session_id: String,
    pub state: Value,
}

/// What a viewer needs to show one turn of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameFrame {
    pub session_id: String,
    pub title: String,
    pub artifact: Artifact,
    pub state: Value,
    /// State shown before this frame, `null` on a fresh session.
    pub previous_state: Value,
}

/// Wire shape of either operation: the frame, or `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GameResponse {
    Frame(GameFrame),
    Error { error: String },
}

impl From<Result<GameFrame>> for GameResponse {
    fn from(result: Result<GameFrame>) -> Self {
        match result {
            Ok(frame) => GameResponse::Frame(frame),
            Err(err) => GameResponse::Error { error: err.message().to_string() },
        }
    }
}

/// Owns the bundler and the session cache for one deployment.
#[derive(Debug)]
pub struct GameService {
    bundler: Bundler,
    cache: SessionCache,
    next_id: AtomicU64,
}

impl Default for GameService {
    fn default() -> Self {
        Self::new(&ArcadeConfig::default())
    }
}

impl GameService {
    pub fn new(config: &ArcadeConfig) -> Self {
        Self {
            bundler: Bundler::new(config.compile_options()),
            cache: SessionCache::new(config.cache_capacity),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Compile the request's files and open (or replace) a session.
    ///
    /// Nothing is stored unless the compile succeeds, so a failed restart
    /// leaves the session's previous artifact active.
    pub async fn start_game(&self, request: StartRequest) -> Result<GameFrame> {
        if request.files.is_empty() {
            return Err(error::invalid_argument("files must contain at least one source file")
                .with_operation("GameService::start_game"));
        }
        let state: Value = serde_json::from_str(&request.initial_state).map_err(|e| {
            error::parse_error(format!("initial state is not valid JSON: {}", e))
                .with_operation("GameService::start_game")
                .set_source(e)
        })?;

        let files = VirtualFileSet::from_map(request.files);
        let bundler = self.bundler.clone();
        let entry = request.entry;
        let artifact = tokio::task::spawn_blocking(move || bundler.compile(&files, entry.as_deref()))
            .await
            .map_err(|e| error::Error::unexpected(format!("compile task failed: {}", e)))?
            .inspect_err(|err| warn!(title = %request.title, kind = %err.kind(), "start rejected"))?;

        let session_id = request.session_id.unwrap_or_else(|| self.allocate_id());
        let previous_state = self
            .cache
            .get(&session_id)
            .map(|record| record.state)
            .unwrap_or(Value::Null);
        self.cache
            .put(session_id.clone(), SessionRecord::new(artifact.clone(), state.clone(), request.title.clone()));
        info!(session_id = %session_id, artifact_ref = %artifact.artifact_ref(), "game started");

        Ok(GameFrame {
            session_id,
            title: request.title,
            artifact,
            state,
            previous_state,
        })
    }

    /// Replace a session's state, reusing its cached artifact unchanged.
    pub async fn update_state(&self, request: UpdateRequest) -> Result<GameFrame> {
        let (record, previous_state) = self
            .cache
            .update_state_only(&request.session_id, request.state)
            .map_err(|e| e.with_operation("GameService::update_state"))?;
        debug!(session_id = %request.session_id, "state updated");

        Ok(GameFrame {
            session_id: request.session_id,
            title: record.title,
            artifact: record.artifact,
            state: record.state,
            previous_state,
        })
    }

    fn allocate_id(&self) -> String {
        loop {
            let id = format!("game-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
            if !self.cache.contains(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcade_vm::ErrorKind;
    use serde_json::json;

    const ECHO: &str = "exports.renderGame = function(c,p){ c.textContent = p.msg; };";

    fn echo_request(state: &str) -> StartRequest {
        StartRequest::new("echo", state).with_file("main.ts", ECHO)
    }

    #[tokio::test]
    async fn test_start_allocates_session() {
        let service = GameService::default();
        let frame = service.start_game(echo_request(r#"{"msg":"hi"}"#)).await.unwrap();

        assert_eq!(frame.session_id, "game-1");
        assert_eq!(frame.title, "echo");
        assert_eq!(frame.state, json!({ "msg": "hi" }));
        assert_eq!(frame.previous_state, Value::Null);
        assert!(service.cache().contains("game-1"));
    }

    #[tokio::test]
    async fn test_update_reuses_artifact() {
        let service = GameService::default();
        let started = service.start_game(echo_request(r#"{"msg":"hi"}"#)).await.unwrap();

        let first = service
            .update_state(UpdateRequest { session_id: started.session_id.clone(), state: json!({ "msg": "bye" }) })
            .await
            .unwrap();
        let second = service
            .update_state(UpdateRequest { session_id: started.session_id.clone(), state: json!({ "msg": "again" }) })
            .await
            .unwrap();

        assert_eq!(first.artifact, started.artifact);
        assert_eq!(second.artifact, started.artifact);
        assert_eq!(first.previous_state, json!({ "msg": "hi" }));
        assert_eq!(second.previous_state, json!({ "msg": "bye" }));
        assert_eq!(service.cache().get(&started.session_id).unwrap().state, json!({ "msg": "again" }));
    }

    #[tokio::test]
    async fn test_bad_json_rejected_before_compile() {
        let service = GameService::default();
        // The source would fail to compile; the JSON error must win.
        let request = StartRequest::new("bad", "{not json").with_file("main.ts", "let = ;");
        let err = service.start_game(request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert!(err.message().contains("not valid JSON"));
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_empty_files_rejected() {
        let service = GameService::default();
        let err = service.start_game(StartRequest::new("empty", "{}")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_missing_entry_names_candidates() {
        let service = GameService::default();
        let request = StartRequest::new("x", "{}").with_file("foo.ts", "export const x = 1;");
        let response = GameResponse::from(service.start_game(request).await);

        match response {
            GameResponse::Error { error } => {
                assert!(error.contains("main.tsx"));
                assert!(error.contains("main.ts"));
            }
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_without_session() {
        let service = GameService::default();
        let err = service
            .update_state(UpdateRequest { session_id: "nope".into(), state: json!({}) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveSession);
    }

    #[tokio::test]
    async fn test_eviction_then_reuse() {
        let service = GameService::new(&ArcadeConfig::default().with_cache_capacity(2));
        for id in ["A", "B", "C"] {
            service.start_game(echo_request("{}").with_session_id(id)).await.unwrap();
        }

        let update = |id: &str| UpdateRequest { session_id: id.into(), state: json!({ "msg": id }) };
        let err = service.update_state(update("A")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveSession);
        service.update_state(update("B")).await.unwrap();
        service.update_state(update("C")).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_restart_keeps_previous_artifact() {
        let service = GameService::default();
        let started = service.start_game(echo_request("{}").with_session_id("s")).await.unwrap();

        let broken = StartRequest::new("echo", "{}")
            .with_file("main.ts", "import { x } from './missing';")
            .with_session_id("s");
        let err = service.start_game(broken).await.unwrap_err();
        assert!(err.kind().is_compile_error());
        assert_eq!(service.cache().get("s").unwrap().artifact, started.artifact);
    }

    #[test]
    fn test_response_wire_shape() {
        let response = GameResponse::Error { error: "missing entry file".into() };
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "error": "missing entry file" }));
    }
}
