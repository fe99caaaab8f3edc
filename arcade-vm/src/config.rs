//! Pipeline configuration
//!
//! One [`ArcadeConfig`] per deployment. Each component receives only its own
//! slice of it: the bundler takes [`CompileOptions`], the sandbox takes
//! [`SandboxOptions`], the session cache takes `cache_capacity`.

use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default Session Cache bound.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Default render entry export.
pub const DEFAULT_RENDER_EXPORT: &str = "renderGame";

/// Default cleanup entry export.
pub const DEFAULT_CLEANUP_EXPORT: &str = "cleanupGame";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcadeConfig {
    /// Session Cache bound (N)
    pub cache_capacity: usize,
    /// Library ids left as runtime `require` calls
    pub externals: Vec<String>,
    /// Implicit entry file names, tried in order
    pub entry_candidates: Vec<String>,
    /// Resolver extension search order
    pub extensions: Vec<String>,
    /// Export name of the render entry point
    pub render_export: String,
    /// Export name of the optional cleanup entry point
    pub cleanup_export: String,
    /// Apply syntax-level minification
    pub minify: bool,
    /// Reject artifacts larger than this many bytes
    pub max_artifact_bytes: Option<usize>,
    /// Stop runaway loops after this many iterations per call
    pub loop_iteration_limit: Option<u64>,
}

impl Default for ArcadeConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            externals: vec!["react".into(), "react/jsx-runtime".into()],
            entry_candidates: vec!["main.tsx".into(), "main.ts".into()],
            extensions: vec![".tsx".into(), ".ts".into(), ".jsx".into(), ".js".into()],
            render_export: DEFAULT_RENDER_EXPORT.into(),
            cleanup_export: DEFAULT_CLEANUP_EXPORT.into(),
            minify: true,
            max_artifact_bytes: None,
            loop_iteration_limit: None,
        }
    }
}

impl ArcadeConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| error::Error::from(e).with_context("path", path.display().to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            error::config_invalid(format!("{}: {}", path.display(), e)).set_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_externals<I, S>(mut self, externals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.externals = externals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn with_max_artifact_bytes(mut self, max: usize) -> Self {
        self.max_artifact_bytes = Some(max);
        self
    }

    pub fn with_loop_iteration_limit(mut self, limit: u64) -> Self {
        self.loop_iteration_limit = Some(limit);
        self
    }

    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(error::config_invalid("cache_capacity must be at least 1"));
        }
        if self.entry_candidates.is_empty() {
            return Err(error::config_invalid("entry_candidates must not be empty"));
        }
        if let Some(ext) = self.extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(error::config_invalid(format!("extension '{}' must start with '.'", ext)));
        }
        if self.render_export.is_empty() {
            return Err(error::config_invalid("render_export must not be empty"));
        }
        Ok(())
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            externals: self.externals.clone(),
            entry_candidates: self.entry_candidates.clone(),
            extensions: self.extensions.clone(),
            minify: self.minify,
            max_artifact_bytes: self.max_artifact_bytes,
        }
    }

    pub fn sandbox_options(&self) -> SandboxOptions {
        SandboxOptions {
            externals: self.externals.clone(),
            render_export: self.render_export.clone(),
            cleanup_export: self.cleanup_export.clone(),
            loop_iteration_limit: self.loop_iteration_limit,
        }
    }
}

/// Options consumed by the bundler.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub externals: Vec<String>,
    pub entry_candidates: Vec<String>,
    pub extensions: Vec<String>,
    pub minify: bool,
    pub max_artifact_bytes: Option<usize>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        ArcadeConfig::default().compile_options()
    }
}

/// Options consumed by the sandboxed executor.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxOptions {
    pub externals: Vec<String>,
    pub render_export: String,
    pub cleanup_export: String,
    pub loop_iteration_limit: Option<u64>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        ArcadeConfig::default().sandbox_options()
    }
}
