//! [`Error`]: the one failure value passed between the bundler, the sandbox
//! and the lifecycle manager.
//!
//! `message` is what an agent gets to read. Everything else (operation,
//! context pairs, the wrapped source) exists for logs.

use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// A failed arcade operation.
///
/// ```rust
/// use arcade_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::RenderFailed, "TypeError: p.board is undefined")
///     .with_operation("lifecycle::render")
///     .with_context("target", "viewer-1");
///
/// assert_eq!(err.kind(), ErrorKind::RenderFailed);
/// assert_eq!(err.status(), ErrorStatus::Temporary);
/// assert_eq!(
///     err.to_string(),
///     "RenderFailed in lifecycle::render (temporary) [target=viewer-1]: TypeError: p.board is undefined"
/// );
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// The status starts from the kind: render failures and closed channels
    /// are temporary, everything else is permanent.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = if kind.is_retryable() {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        };
        Self {
            kind,
            message: message.into(),
            status,
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Plain text for the agent, without kind or context.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Innermost-last operation name, empty when none was recorded.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Record the operation that failed. An operation set earlier is kept as
    /// a `called` context pair, so the chain reads outermost first.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying error. Setting it twice is a bug (asserted in
    /// debug builds).
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    /// A temporary error whose retries ran out.
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Formatting
// ═══════════════════════════════════════════════════════════════════════════════

/// One line for logs: `Kind in operation (status) [k=v, ..]: message`.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.operation.is_empty() {
            write!(f, " in {}", self.operation)?;
        }
        write!(f, " ({})", self.status)?;

        if !self.context.is_empty() {
            let pairs: Vec<String> = self.context.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, " [{}]", pairs.join(", "))?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Error");
        out.field("kind", &self.kind).field("status", &self.status);
        if !self.operation.is_empty() {
            out.field("operation", &self.operation);
        }
        out.field("message", &self.message);
        if !self.context.is_empty() {
            out.field("context", &self.context);
        }
        if let Some(source) = &self.source {
            out.field("source", source);
        }
        out.finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Reading game directories and config files is the only I/O.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string()).with_operation("io").set_source(err)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Shorthands
// ═══════════════════════════════════════════════════════════════════════════════

impl Error {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }

    /// An update named a session that was never started (or already ended).
    pub fn no_active_session(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        Self::new(
            ErrorKind::NoActiveSession,
            format!("no active session '{}': start a game before updating its state", session_id),
        )
        .with_context("session_id", session_id)
    }

    pub fn render_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RenderFailed, message)
    }

    /// The other end of `name` went away, e.g. a realm thread that exited.
    pub fn channel_closed(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::ChannelClosed, format!("channel '{}' closed", name)).with_context("channel", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::new(ErrorKind::ModuleNotFound, "cannot resolve './board'");
        assert_eq!(err.kind(), ErrorKind::ModuleNotFound);
        assert_eq!(err.message(), "cannot resolve './board'");
        assert_eq!(err.status(), ErrorStatus::Permanent);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::new(ErrorKind::ModuleNotFound, "not found")
            .with_operation("resolver::resolve")
            .with_context("importer", "main.tsx")
            .with_context("specifier", "./board");

        assert_eq!(err.operation(), "resolver::resolve");
        assert_eq!(err.context().len(), 2);
        assert_eq!(err.context()[0], ("importer", "main.tsx".to_string()));
    }

    #[test]
    fn test_operation_chaining() {
        let err = Error::new(ErrorKind::ExecutionFailed, "setup threw")
            .with_operation("realm::instantiate")
            .with_operation("lifecycle::render_update");

        assert_eq!(err.operation(), "lifecycle::render_update");
        assert_eq!(err.context().len(), 1);
        assert_eq!(err.context()[0], ("called", "realm::instantiate".to_string()));
    }

    #[test]
    fn test_temporary_status() {
        let err = Error::render_failed("boom");
        assert!(err.is_retryable()); // RenderFailed defaults to temporary

        let err = Error::new(ErrorKind::CompileFailed, "syntax");
        assert!(!err.is_retryable()); // CompileFailed defaults to permanent
    }

    #[test]
    fn test_persist() {
        let err = Error::new(ErrorKind::IoFailed, "disk full").with_status(ErrorStatus::Temporary);
        assert!(err.is_retryable());

        let err = err.persist();
        assert!(!err.is_retryable());
        assert_eq!(err.status(), ErrorStatus::Persistent);
    }

    #[test]
    fn test_display() {
        let err = Error::render_failed("TypeError: x is undefined")
            .with_operation("lifecycle::render")
            .with_context("target", "viewer-1")
            .with_context("step", "3");
        assert_eq!(
            err.to_string(),
            "RenderFailed in lifecycle::render (temporary) [target=viewer-1, step=3]: TypeError: x is undefined"
        );

        let bare = Error::new(ErrorKind::CompileFailed, "");
        assert_eq!(bare.to_string(), "CompileFailed (permanent)");
    }

    #[test]
    fn test_debug_skips_empty_fields() {
        let err = Error::unexpected("boom");
        let debug = format!("{:?}", err);
        assert!(debug.starts_with("Error { kind: Unexpected"));
        assert!(debug.contains("message: \"boom\""));
        assert!(!debug.contains("operation"));
        assert!(!debug.contains("context"));
    }

    #[test]
    fn test_convenience_constructors() {
        let err = Error::no_active_session("game-7");
        assert_eq!(err.kind(), ErrorKind::NoActiveSession);
        assert!(err.message().contains("game-7"));

        let err = Error::channel_closed("realm");
        assert_eq!(err.kind(), ErrorKind::ChannelClosed);
    }

    #[test]
    fn test_set_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();

        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(err.source_ref().is_some());
        assert!(std::error::Error::source(&err).is_some());
    }
}
