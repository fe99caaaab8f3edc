//! # Bundler
//!
//! Compiles a [`VirtualFileSet`] into one [`Artifact`]:
//!
//! 1. pick the entry (explicit, or the first configured candidate present)
//! 2. walk the import graph breadth-first from the entry, resolving every
//!    specifier with the [`Resolver`]
//! 3. parse each file with `oxc`, run semantic checks, and lower it to a
//!    CommonJS body ([`transform`])
//! 4. link the bodies into a single module table ([`link`])
//!
//! Every file reachable from the entry is parsed even after an error so that
//! all diagnostics are reported together. Nothing here performs I/O.

mod diagnostic;
mod edit;
mod jsx;
mod link;
mod transform;

pub use diagnostic::{line_column, Diagnostic};
pub use transform::JSX_RUNTIME;

use std::collections::{HashSet, VecDeque};

use oxc_allocator::Allocator;
use oxc_diagnostics::OxcDiagnostic;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::config::CompileOptions;
use crate::error::{self, Result};
use crate::resolver::Resolver;
use crate::vfs::VirtualFileSet;
use link::LinkedModule;
use transform::{transform, ModuleContext, TransformedModule};

// ═══════════════════════════════════════════════════════════════════════════════
// Bundler
// ═══════════════════════════════════════════════════════════════════════════════

/// Stateless compiler over a fixed set of options.
#[derive(Debug, Clone)]
pub struct Bundler {
    options: CompileOptions,
    resolver: Resolver,
}

impl Default for Bundler {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl Bundler {
    pub fn new(options: CompileOptions) -> Self {
        let resolver = Resolver::from_options(&options);
        Self { options, resolver }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Compile `files` starting at `entry`, or at the first entry candidate
    /// present when `entry` is `None`.
    pub fn compile(&self, files: &VirtualFileSet, entry: Option<&str>) -> Result<Artifact> {
        let entry = self.select_entry(files, entry)?;
        info!(entry = %entry, files = files.len(), "compiling");

        let mut diagnostics = Vec::new();
        let mut modules = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([entry.clone()]);
        let mut queue = VecDeque::from([entry.clone()]);

        while let Some(path) = queue.pop_front() {
            let Some(source) = files.get(&path) else {
                continue;
            };
            let module = self.compile_module(&path, source, files);
            for dep in &module.dependencies {
                if seen.insert(dep.clone()) {
                    queue.push_back(dep.clone());
                }
            }
            diagnostics.extend(module.diagnostics);
            modules.push(LinkedModule { path, code: module.code });
        }

        if !diagnostics.is_empty() {
            diagnostics.sort();
            diagnostics.dedup();
            warn!(count = diagnostics.len(), "compile failed");
            return Err(error::compile_failed(&diagnostics).with_operation("Bundler::compile"));
        }

        if modules.iter().all(|m| m.code.trim().is_empty()) {
            return Err(error::empty_output().with_operation("Bundler::compile"));
        }

        let code = link::link(&entry, &modules, self.options.minify);
        if let Some(max) = self.options.max_artifact_bytes {
            if code.len() > max {
                return Err(error::artifact_too_large(code.len(), max).with_operation("Bundler::compile"));
            }
        }

        let artifact = Artifact::new(code, entry, self.options.externals.clone());
        info!(
            artifact_ref = %artifact.artifact_ref(),
            modules = modules.len(),
            bytes = artifact.len(),
            "compiled"
        );
        Ok(artifact)
    }

    fn select_entry(&self, files: &VirtualFileSet, entry: Option<&str>) -> Result<String> {
        if let Some(entry) = entry {
            let normalized = VirtualFileSet::normalize(entry);
            return if files.contains(&normalized) {
                Ok(normalized)
            } else {
                Err(error::explicit_entry_not_found(entry))
            };
        }
        self.options
            .entry_candidates
            .iter()
            .find(|candidate| files.contains(candidate))
            .cloned()
            .ok_or_else(|| error::entry_not_found(&self.options.entry_candidates))
    }

    fn compile_module(&self, path: &str, source: &str, files: &VirtualFileSet) -> TransformedModule {
        let Some(source_type) = source_type_for(path) else {
            if path.ends_with(".json") {
                return json_module(path, source);
            }
            return TransformedModule {
                diagnostics: vec![Diagnostic::new(path, "unsupported file type; use .tsx, .ts, .jsx, .js or .json")],
                ..Default::default()
            };
        };

        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, source_type).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            debug!(path, errors = parsed.errors.len(), "parse failed");
            return TransformedModule {
                diagnostics: to_diagnostics(path, source, &parsed.errors),
                ..Default::default()
            };
        }

        let checked = SemanticBuilder::new().with_check_syntax_error(true).build(&parsed.program);
        if !checked.errors.is_empty() {
            return TransformedModule {
                diagnostics: to_diagnostics(path, source, &checked.errors),
                ..Default::default()
            };
        }

        let ctx = ModuleContext {
            path,
            source,
            resolver: &self.resolver,
            files,
            minify: self.options.minify,
        };
        let module = transform(ctx, &parsed.program, checked.semantic.scoping());
        debug!(path, deps = module.dependencies.len(), bytes = module.code.len(), "module lowered");
        module
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn source_type_for(path: &str) -> Option<SourceType> {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
    match ext {
        "tsx" => Some(SourceType::tsx()),
        "ts" | "mts" => Some(SourceType::ts()),
        "jsx" => Some(SourceType::jsx()),
        "js" | "mjs" => Some(SourceType::mjs().with_jsx(true)),
        _ => None,
    }
}

fn json_module(path: &str, source: &str) -> TransformedModule {
    match serde_json::from_str::<serde_json::Value>(source) {
        Ok(value) => TransformedModule {
            code: format!("module.exports={};", value),
            ..Default::default()
        },
        Err(err) => TransformedModule {
            diagnostics: vec![Diagnostic {
                file: path.to_string(),
                position: Some((err.line() as u32, err.column() as u32)),
                message: format!("invalid JSON: {}", err),
            }],
            ..Default::default()
        },
    }
}

fn to_diagnostics(path: &str, source: &str, errors: &[OxcDiagnostic]) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|err| {
            let offset = err
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map(|label| label.offset() as u32);
            match offset {
                Some(offset) => Diagnostic::at(path, source, offset, err.message.to_string()),
                None => Diagnostic::new(path, err.message.to_string()),
            }
        })
        .collect()
}
