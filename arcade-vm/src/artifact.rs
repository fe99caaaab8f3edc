//! Compiled artifact: the single executable module handed to a viewer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Immutable output of one successful compile.
///
/// `code` is a CommonJS function body over `require`, `module` and
/// `exports`. Two artifacts are the same scene exactly when their code is
/// identical, which is what `artifact_ref` identifies.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    code: Arc<str>,
    artifact_ref: String,
    entry: String,
    externals: Vec<String>,
}

impl Artifact {
    pub fn new(code: impl Into<Arc<str>>, entry: impl Into<String>, externals: Vec<String>) -> Self {
        let code = code.into();
        let artifact_ref = content_ref(&code);
        Self { code, artifact_ref, entry: entry.into(), externals }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Stable content id: the first 8 bytes of the code's SHA-256, in hex.
    /// Identical across processes and builds.
    pub fn artifact_ref(&self) -> &str {
        &self.artifact_ref
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Library ids left to the host `require`.
    pub fn externals(&self) -> &[String] {
        &self.externals
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// True when both artifacts carry the same executable text.
    pub fn same_code(&self, other: &Artifact) -> bool {
        Arc::ptr_eq(&self.code, &other.code) || self.code == other.code
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("artifact_ref", &self.artifact_ref)
            .field("entry", &self.entry)
            .field("bytes", &self.code.len())
            .field("externals", &self.externals)
            .finish()
    }
}

fn content_ref(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(16);
    digest
}
