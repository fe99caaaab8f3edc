//! Arcade VM error types
//!
//! Re-exports arcade-error and provides pipeline-specific constructors.
//! Messages here are what the agent reads, so they say what to fix.

// Re-export the core error types
pub use arcade_error::{Error, ErrorKind, ErrorStatus, Result};

use crate::bundler::Diagnostic;

// =============================================================================
// Compile errors
// =============================================================================

/// Create a CompileFailed error from one or more diagnostics, one per line
pub fn compile_failed(diagnostics: &[Diagnostic]) -> Error {
    let message = diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    Error::new(ErrorKind::CompileFailed, message)
        .with_context("diagnostics", diagnostics.len().to_string())
}

/// Create an EntryNotFound error naming every accepted entry file
pub fn entry_not_found(candidates: &[String]) -> Error {
    let names = candidates.join(" or ");
    Error::new(
        ErrorKind::EntryNotFound,
        format!("missing entry file: add {} to the files", names),
    )
    .with_context("candidates", candidates.join(","))
}

/// Create an EntryNotFound error for an explicitly requested entry
pub fn explicit_entry_not_found(entry: impl Into<String>) -> Error {
    let entry = entry.into();
    Error::new(ErrorKind::EntryNotFound, format!("entry file '{}' is not in the files", entry))
        .with_context("entry", entry)
}

/// Create a ModuleNotFound error
pub fn module_not_found(importer: impl Into<String>, specifier: impl Into<String>) -> Error {
    let importer = importer.into();
    let specifier = specifier.into();
    Error::new(
        ErrorKind::ModuleNotFound,
        format!("cannot resolve '{}' imported from '{}'", specifier, importer),
    )
    .with_context("importer", importer)
    .with_context("specifier", specifier)
}

/// Create an EmptyOutput error
pub fn empty_output() -> Error {
    Error::new(ErrorKind::EmptyOutput, "bundler produced no code")
}

/// Create an ArtifactTooLarge error
pub fn artifact_too_large(size: usize, max: usize) -> Error {
    Error::new(
        ErrorKind::ArtifactTooLarge,
        format!("compiled artifact is {} bytes, limit is {}", size, max),
    )
    .with_context("size", size.to_string())
    .with_context("max", max.to_string())
}

// =============================================================================
// Execution errors
// =============================================================================

/// Create an ExecutionFailed error (artifact threw or rejected during setup)
pub fn execution_failed(reason: impl Into<String>) -> Error {
    Error::new(
        ErrorKind::ExecutionFailed,
        format!("game compiled but crashed while starting: {}", reason.into()),
    )
}

/// Create an EntryPointMissing error
pub fn entry_point_missing(export: impl Into<String>) -> Error {
    let export = export.into();
    Error::new(
        ErrorKind::EntryPointMissing,
        format!("game compiled but does not export a '{}' function", export),
    )
    .with_context("export", export)
}

/// Create a RenderFailed error
pub fn render_failed(reason: impl Into<String>) -> Error {
    Error::render_failed(reason)
}

// =============================================================================
// Plumbing
// =============================================================================

/// Create a ChannelClosed error
pub fn channel_closed(name: impl Into<String>) -> Error {
    Error::channel_closed(name)
}

/// Create a ConfigInvalid error
pub fn config_invalid(message: impl Into<String>) -> Error {
    Error::config_invalid(message)
}

/// Create an InvalidArgument error
pub fn invalid_argument(message: impl Into<String>) -> Error {
    Error::invalid_argument(message)
}

/// Create a ParseFailed error
pub fn parse_error(message: impl Into<String>) -> Error {
    Error::parse_failed(message)
}

/// Create a NoActiveSession error
pub fn no_active_session(session_id: impl Into<String>) -> Error {
    Error::no_active_session(session_id)
}
