//! # Module Resolver
//!
//! Maps an import specifier, seen from an importing file, onto a key of the
//! [`VirtualFileSet`]. Resolution is purely textual: relative specifiers are
//! joined onto the importer's directory and `.`/`..` segments are folded,
//! then the literal path and each configured extension are tried in order.
//!
//! Anything else (bare names, absolute paths) is [`Resolution::Unresolved`].
//! The configured external library ids are unresolved too; the bundler checks
//! [`Resolver::is_external`] first and leaves those to the runtime `require`.

use crate::config::CompileOptions;
use crate::error::{self, Result};
use crate::vfs::VirtualFileSet;

/// Outcome of a single resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A key present in the file set
    Resolved(String),
    Unresolved,
}

/// Where an import points once externals are accounted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleTarget {
    /// A file inside the bundle
    Internal(String),
    /// A host library left as a runtime `require`
    External(String),
}

/// Stateless resolver over a fixed external list and extension order.
#[derive(Debug, Clone)]
pub struct Resolver {
    externals: Vec<String>,
    extensions: Vec<String>,
}

impl Resolver {
    pub fn new(externals: Vec<String>, extensions: Vec<String>) -> Self {
        Self { externals, extensions }
    }

    pub fn from_options(options: &CompileOptions) -> Self {
        Self::new(options.externals.clone(), options.extensions.clone())
    }

    pub fn is_external(&self, specifier: &str) -> bool {
        self.externals.iter().any(|e| e == specifier)
    }

    pub fn externals(&self) -> &[String] {
        &self.externals
    }

    /// Resolve `specifier` as imported from `importer`.
    pub fn resolve(&self, importer: &str, specifier: &str, files: &VirtualFileSet) -> Resolution {
        if self.is_external(specifier) || !is_relative(specifier) {
            return Resolution::Unresolved;
        }

        let Some(base) = join_relative(importer, specifier) else {
            return Resolution::Unresolved;
        };

        if files.contains(&base) {
            return Resolution::Resolved(base);
        }
        for ext in &self.extensions {
            let candidate = format!("{}{}", base, ext);
            if files.contains(&candidate) {
                return Resolution::Resolved(candidate);
            }
        }
        Resolution::Unresolved
    }

    /// Resolve and classify, failing with `ModuleNotFound` for anything that
    /// is neither an external nor a file in the set.
    pub fn locate(&self, importer: &str, specifier: &str, files: &VirtualFileSet) -> Result<ModuleTarget> {
        if self.is_external(specifier) {
            return Ok(ModuleTarget::External(specifier.to_string()));
        }
        match self.resolve(importer, specifier, files) {
            Resolution::Resolved(path) => Ok(ModuleTarget::Internal(path)),
            Resolution::Unresolved => Err(error::module_not_found(importer, specifier)),
        }
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Join a relative specifier onto the importer's directory and fold `.` and
/// `..` segments. `None` when `..` climbs above the root.
fn join_relative(importer: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = match importer.rfind('/') {
        Some(idx) => importer[..idx].split('/').collect(),
        None => Vec::new(),
    };

    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    let joined = joined.strip_prefix("./").unwrap_or(&joined).to_string();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver {
        Resolver::from_options(&CompileOptions::default())
    }

    fn files(paths: &[&str]) -> VirtualFileSet {
        VirtualFileSet::from_map(paths.iter().map(|p| (*p, "")))
    }

    #[test]
    fn test_extension_search_order() {
        let set = files(&["foo.ts", "foo.js"]);
        assert_eq!(
            resolver().resolve("main.tsx", "./foo", &set),
            Resolution::Resolved("foo.ts".to_string())
        );

        let set = files(&["foo.tsx", "foo.ts", "foo.jsx", "foo.js"]);
        assert_eq!(
            resolver().resolve("main.tsx", "./foo", &set),
            Resolution::Resolved("foo.tsx".to_string())
        );
    }

    #[test]
    fn test_custom_order_is_honored() {
        let r = Resolver::new(vec![], vec![".js".into(), ".ts".into()]);
        let set = files(&["foo.ts", "foo.js"]);
        assert_eq!(r.resolve("main.ts", "./foo", &set), Resolution::Resolved("foo.js".into()));
    }

    #[test]
    fn test_literal_path_wins() {
        let set = files(&["data.json", "data.json.ts"]);
        assert_eq!(
            resolver().resolve("main.ts", "./data.json", &set),
            Resolution::Resolved("data.json".to_string())
        );
    }

    #[test]
    fn test_parent_segments() {
        let set = files(&["lib/math.ts", "ui/board/cell.tsx"]);
        assert_eq!(
            resolver().resolve("ui/board/cell.tsx", "../../lib/math", &set),
            Resolution::Resolved("lib/math.ts".to_string())
        );
        assert_eq!(
            resolver().resolve("ui/board/index.ts", "./cell", &set),
            Resolution::Resolved("ui/board/cell.tsx".to_string())
        );
        assert_eq!(
            resolver().resolve("ui/x.ts", "./../lib/./math", &set),
            Resolution::Resolved("lib/math.ts".to_string())
        );
    }

    #[test]
    fn test_escaping_root_is_unresolved() {
        let set = files(&["math.ts"]);
        assert_eq!(resolver().resolve("main.ts", "../math", &set), Resolution::Unresolved);
    }

    #[test]
    fn test_bare_and_absolute_are_unresolved() {
        let set = files(&["lodash.ts", "util.ts"]);
        assert_eq!(resolver().resolve("main.ts", "lodash", &set), Resolution::Unresolved);
        assert_eq!(resolver().resolve("main.ts", "/util", &set), Resolution::Unresolved);

        let err = resolver().locate("main.ts", "lodash", &set).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ModuleNotFound);
        assert!(err.message().contains("lodash"));
        assert!(err.message().contains("main.ts"));
    }

    #[test]
    fn test_externals_are_never_files() {
        let set = files(&["react.ts", "react/jsx-runtime.ts"]);
        assert_eq!(resolver().resolve("main.ts", "react", &set), Resolution::Unresolved);
        assert_eq!(
            resolver().locate("main.ts", "react/jsx-runtime", &set).unwrap(),
            ModuleTarget::External("react/jsx-runtime".to_string())
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let set = files(&["a.ts", "a.tsx", "b/c.js"]);
        let r = resolver();
        let first = r.resolve("b/main.ts", "../a", &set);
        for _ in 0..10 {
            assert_eq!(r.resolve("b/main.ts", "../a", &set), first);
        }
    }
}
