//! Error kinds for arcade operations

use std::fmt;

/// The kind of error that occurred.
///
/// Kinds are grouped by the pipeline stage that raises them. Callers that only
/// care about the coarse taxonomy (compile / execution / render / session)
/// should use [`ErrorKind::is_compile_error`] and [`ErrorKind::is_execution_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Invalid argument passed to an operation
    InvalidArgument,

    // =========================================================================
    // Compile errors
    // =========================================================================
    /// One or more source units failed to parse, transform or link
    CompileFailed,

    /// Neither the explicit entry nor any implicit entry file exists
    EntryNotFound,

    /// An import specifier could not be resolved against the file set
    ModuleNotFound,

    /// The bundler produced no code
    EmptyOutput,

    /// The artifact exceeds the configured size bound
    ArtifactTooLarge,

    // =========================================================================
    // Execution errors
    // =========================================================================
    /// The artifact threw or rejected while being instantiated
    ExecutionFailed,

    /// The artifact ran but does not export the render entry point
    EntryPointMissing,

    /// A single render call threw or rejected
    RenderFailed,

    // =========================================================================
    // Session errors
    // =========================================================================
    /// State update for a session that was never started (or was evicted)
    NoActiveSession,

    // =========================================================================
    // Plumbing errors
    // =========================================================================
    /// Channel closed unexpectedly
    ChannelClosed,

    /// Failed to parse input
    ParseFailed,

    /// Serialization/deserialization failed
    SerializationFailed,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Compile
            ErrorKind::CompileFailed => "CompileFailed",
            ErrorKind::EntryNotFound => "EntryNotFound",
            ErrorKind::ModuleNotFound => "ModuleNotFound",
            ErrorKind::EmptyOutput => "EmptyOutput",
            ErrorKind::ArtifactTooLarge => "ArtifactTooLarge",

            // Execution
            ErrorKind::ExecutionFailed => "ExecutionFailed",
            ErrorKind::EntryPointMissing => "EntryPointMissing",
            ErrorKind::RenderFailed => "RenderFailed",

            // Session
            ErrorKind::NoActiveSession => "NoActiveSession",

            // Plumbing
            ErrorKind::ChannelClosed => "ChannelClosed",
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
        }
    }

    /// Check if this error kind is retryable by default.
    ///
    /// A failed render is retried by the next state update; nothing else is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::RenderFailed | ErrorKind::ChannelClosed)
    }

    /// The agent's source failed to resolve, transpile or bundle.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::CompileFailed
                | ErrorKind::EntryNotFound
                | ErrorKind::ModuleNotFound
                | ErrorKind::EmptyOutput
                | ErrorKind::ArtifactTooLarge
        )
    }

    /// The artifact compiled but crashed or broke the entry-point contract
    /// while being instantiated.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, ErrorKind::ExecutionFailed | ErrorKind::EntryPointMissing)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::EntryNotFound.to_string(), "EntryNotFound");
        assert_eq!(ErrorKind::NoActiveSession.to_string(), "NoActiveSession");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::RenderFailed.is_retryable());
        assert!(!ErrorKind::CompileFailed.is_retryable());
        assert!(!ErrorKind::NoActiveSession.is_retryable());
    }

    #[test]
    fn test_taxonomy_is_disjoint() {
        let compile = [
            ErrorKind::CompileFailed,
            ErrorKind::EntryNotFound,
            ErrorKind::ModuleNotFound,
            ErrorKind::EmptyOutput,
            ErrorKind::ArtifactTooLarge,
        ];
        for kind in compile {
            assert!(kind.is_compile_error(), "{kind}");
            assert!(!kind.is_execution_error(), "{kind}");
        }
        assert!(ErrorKind::EntryPointMissing.is_execution_error());
        assert!(!ErrorKind::RenderFailed.is_execution_error());
        assert!(!ErrorKind::RenderFailed.is_compile_error());
    }
}
