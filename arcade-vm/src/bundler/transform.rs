//! Per-module lowering: TypeScript erasure, JSX, enums and ESM to CommonJS.
//!
//! A single [`Visit`] pass records span edits; nothing is re-printed. The
//! emitted module body expects `__require`, `module` and `exports` in scope
//! plus the bundle helpers (`__export`, `__reExport`, `__toESM`).

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use oxc_ast::ast::*;
use oxc_ast::CommentKind;
use oxc_ast_visit::{walk, Visit};
use oxc_semantic::{Scoping, SymbolFlags, SymbolId};
use oxc_span::{GetSpan, Span};
use oxc_syntax::scope::ScopeFlags;

use super::diagnostic::Diagnostic;
use super::edit::{EditList, Piece, Whitespace};
use super::jsx;
use crate::resolver::{ModuleTarget, Resolver};
use crate::vfs::VirtualFileSet;

/// Library that provides `jsx`, `jsxs` and `Fragment`.
pub const JSX_RUNTIME: &str = "react/jsx-runtime";

/// Local name of the anonymous default export.
const DEFAULT_BINDING: &str = "__default";

const TS_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override", "declare", "abstract"];

/// What one module needs to transform itself.
pub struct ModuleContext<'s> {
    pub path: &'s str,
    pub source: &'s str,
    pub resolver: &'s Resolver,
    pub files: &'s VirtualFileSet,
    pub minify: bool,
}

/// Output of [`transform`].
#[derive(Debug, Clone, Default)]
pub struct TransformedModule {
    /// CommonJS body of the module function
    pub code: String,
    /// Bundle-internal modules this one requires, in first-use order
    pub dependencies: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
enum ImportKind {
    Named(String),
    Default,
    Namespace,
}

#[derive(Debug, Clone)]
struct ImportBinding {
    request: usize,
    kind: ImportKind,
}

#[derive(Debug, Clone, PartialEq)]
enum AutoValue {
    Number(f64),
    After(String),
}

/// Transform one parsed module.
pub fn transform(ctx: ModuleContext<'_>, program: &Program<'_>, scoping: &Scoping) -> TransformedModule {
    let mut lowering = Lowering::new(ctx, scoping);
    lowering.run(program);
    lowering.finish(program)
}

struct Lowering<'s> {
    ctx: ModuleContext<'s>,
    scoping: &'s Scoping,
    edits: EditList,
    diagnostics: Vec<Diagnostic>,
    /// specifier -> resolved target (None once reported as unresolvable)
    requests: IndexMap<String, Option<ModuleTarget>>,
    imports: HashMap<SymbolId, ImportBinding>,
    /// (exported name, expression read by the getter)
    exports: Vec<(String, String)>,
    reexports: Vec<usize>,
    lazy_dependencies: Vec<String>,
    esm: bool,
    enum_stack: Vec<String>,
    callee_starts: HashSet<u32>,
    shorthand_starts: HashSet<u32>,
    /// boolean literals that bind tighter than `!0` when minified
    grouped_booleans: HashSet<u32>,
    function_depth: usize,
}

impl<'s> Lowering<'s> {
    fn new(ctx: ModuleContext<'s>, scoping: &'s Scoping) -> Self {
        Self {
            ctx,
            scoping,
            edits: EditList::new(),
            diagnostics: Vec::new(),
            requests: IndexMap::new(),
            imports: HashMap::new(),
            exports: Vec::new(),
            reexports: Vec::new(),
            lazy_dependencies: Vec::new(),
            esm: false,
            enum_stack: Vec::new(),
            callee_starts: HashSet::new(),
            shorthand_starts: HashSet::new(),
            grouped_booleans: HashSet::new(),
            function_depth: 0,
        }
    }

    fn run(&mut self, program: &Program<'_>) {
        if let Some(hashbang) = &program.hashbang {
            self.edits.delete(hashbang.span);
        }
        if self.ctx.minify {
            for comment in &program.comments {
                self.edits.separator(comment.span, comment.kind == CommentKind::MultiLineBlock);
            }
        }
        // Imports are hoisted: bind them all before rewriting any reference.
        for stmt in &program.body {
            if let Statement::ImportDeclaration(decl) = stmt {
                self.register_import(decl);
            }
        }
        self.visit_program(program);
    }

    fn finish(mut self, program: &Program<'_>) -> TransformedModule {
        let nl = if self.ctx.minify { "" } else { "\n" };
        let mut header = String::new();
        if self.esm {
            header.push_str("Object.defineProperty(exports,\"__esModule\",{value:true});");
            header.push_str(nl);
        }
        if !self.exports.is_empty() {
            let getters = self
                .exports
                .iter()
                .map(|(name, value)| format!("{}:function(){{return {}}}", jsx::prop_key(name), value))
                .collect::<Vec<_>>()
                .join(",");
            header.push_str(&format!("__export(exports,{{{}}});{}", getters, nl));
        }
        for (idx, target) in self.requests.values().enumerate() {
            match target {
                Some(ModuleTarget::Internal(path)) => {
                    header.push_str(&format!("var __m{}=__toESM(__require({}));{}", idx, jsx::quote(path), nl));
                }
                Some(ModuleTarget::External(id)) => {
                    header.push_str(&format!("var __m{}=__toESM(require({}));{}", idx, jsx::quote(id), nl));
                }
                None => {}
            }
        }
        for idx in &self.reexports {
            header.push_str(&format!("__reExport(exports,__m{});{}", idx, nl));
        }

        if !header.is_empty() {
            match program.directives.last() {
                Some(directive) => self.edits.insert(directive.span.end, format!(";{}", header)),
                None => self.edits.insert(0, header),
            }
        }

        let whitespace = if self.ctx.minify { Whitespace::Collapse } else { Whitespace::Preserve };
        let code = self.edits.render(self.ctx.source, whitespace).trim().to_string();

        let mut dependencies: Vec<String> = Vec::new();
        let internal = self.requests.values().filter_map(|target| match target {
            Some(ModuleTarget::Internal(path)) => Some(path.clone()),
            _ => None,
        });
        for path in internal.chain(self.lazy_dependencies.drain(..)) {
            if !dependencies.contains(&path) {
                dependencies.push(path);
            }
        }

        TransformedModule { code, dependencies, diagnostics: self.diagnostics }
    }

    // -------------------------------------------------------------------------
    // Bookkeeping
    // -------------------------------------------------------------------------

    fn diagnostic(&mut self, offset: u32, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::at(self.ctx.path, self.ctx.source, offset, message));
    }

    /// Index of the header variable for `specifier`, resolving it on first use.
    fn request(&mut self, specifier: &str, offset: u32) -> usize {
        if let Some(idx) = self.requests.get_index_of(specifier) {
            return idx;
        }
        let target = match self.ctx.resolver.locate(self.ctx.path, specifier, self.ctx.files) {
            Ok(target) => Some(target),
            Err(err) => {
                self.diagnostic(offset, err.message().to_string());
                None
            }
        };
        self.requests.insert_full(specifier.to_string(), target).0
    }

    fn register_import(&mut self, decl: &ImportDeclaration<'_>) {
        self.esm = true;
        if decl.import_kind.is_type() {
            return;
        }
        let source = decl.source.value.as_str();
        let Some(specifiers) = &decl.specifiers else {
            // Side-effect import.
            self.request(source, decl.source.span.start);
            return;
        };

        let mut bindings = Vec::new();
        for specifier in specifiers {
            let (local, kind) = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    if s.import_kind.is_type() {
                        continue;
                    }
                    (&s.local, ImportKind::Named(s.imported.name().to_string()))
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => (&s.local, ImportKind::Default),
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => (&s.local, ImportKind::Namespace),
            };
            let Some(symbol) = local.symbol_id.get() else {
                continue;
            };
            // Imports only used as types are elided.
            if self.scoping.get_resolved_references(symbol).any(|r| r.is_value()) {
                bindings.push((symbol, kind));
            }
        }
        if bindings.is_empty() {
            return;
        }
        let request = self.request(source, decl.source.span.start);
        for (symbol, kind) in bindings {
            self.imports.insert(symbol, ImportBinding { request, kind });
        }
    }

    fn binding_value(&self, binding: &ImportBinding) -> String {
        let var = format!("__m{}", binding.request);
        match &binding.kind {
            ImportKind::Named(name) => member(&var, name),
            ImportKind::Default => format!("{}.default", var),
            ImportKind::Namespace => var,
        }
    }

    fn symbol_of(&self, ident: &IdentifierReference<'_>) -> Option<SymbolId> {
        let reference = ident.reference_id.get()?;
        self.scoping.get_reference(reference).symbol_id()
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    /// Drop declarations with no runtime meaning, reject the ones that cannot
    /// be lowered. Returns true when `decl` was handled.
    fn erase_declaration(&mut self, decl: &Declaration<'_>, statement: Span) -> bool {
        let erased = match decl {
            Declaration::VariableDeclaration(d) => d.declare,
            Declaration::FunctionDeclaration(f) => f.declare || f.body.is_none(),
            Declaration::ClassDeclaration(c) => c.declare,
            Declaration::TSEnumDeclaration(e) => e.declare,
            Declaration::TSTypeAliasDeclaration(_)
            | Declaration::TSInterfaceDeclaration(_)
            | Declaration::TSGlobalDeclaration(_) => true,
            Declaration::TSModuleDeclaration(m) => {
                if !m.declare {
                    self.diagnostic(m.span.start, "namespaces are not supported; use ES modules instead");
                    return true;
                }
                true
            }
            Declaration::TSImportEqualsDeclaration(d) => {
                if !d.import_kind.is_type() {
                    self.diagnostic(d.span.start, "'import x = require()' is not supported; use an import declaration");
                    return true;
                }
                true
            }
        };
        if erased {
            self.erase_statement(statement);
        }
        erased
    }

    /// Remove a whole statement. A `;` is left behind when the statement
    /// after it would otherwise continue the one before it.
    fn erase_statement(&mut self, statement: Span) {
        if continues_previous(self.ctx.source.as_bytes(), statement.end as usize) {
            self.edits.replace(statement, ";");
        } else {
            self.edits.delete(statement);
        }
    }

    fn export_named(&mut self, decl: &ExportNamedDeclaration<'_>) {
        self.esm = true;
        if decl.export_kind.is_type() {
            self.erase_statement(decl.span);
            return;
        }

        if let Some(declaration) = &decl.declaration {
            if self.erase_declaration(declaration, decl.span) {
                return;
            }
            self.edits.delete_range(decl.span.start, declaration.span().start);
            for name in declared_names(declaration) {
                self.exports.push((name.clone(), name));
            }
            self.visit_declaration(declaration);
            return;
        }

        self.erase_statement(decl.span);
        if let Some(source) = &decl.source {
            let request = self.request(source.value.as_str(), source.span.start);
            let var = format!("__m{}", request);
            for spec in &decl.specifiers {
                if spec.export_kind.is_type() {
                    continue;
                }
                let value = match spec.local.name().as_str() {
                    "default" => format!("{}.default", var),
                    local => member(&var, local),
                };
                self.exports.push((spec.exported.name().to_string(), value));
            }
            return;
        }

        for spec in &decl.specifiers {
            if spec.export_kind.is_type() {
                continue;
            }
            let value = match &spec.local {
                ModuleExportName::IdentifierReference(ident) => match self.symbol_of(ident) {
                    Some(symbol) => {
                        if let Some(binding) = self.imports.get(&symbol) {
                            Some(self.binding_value(binding))
                        } else if self.scoping.symbol_flags(symbol).is_value() {
                            Some(ident.name.to_string())
                        } else {
                            None
                        }
                    }
                    None => Some(ident.name.to_string()),
                },
                other => Some(other.name().to_string()),
            };
            if let Some(value) = value {
                self.exports.push((spec.exported.name().to_string(), value));
            }
        }
    }

    fn export_default(&mut self, decl: &ExportDefaultDeclaration<'_>) {
        self.esm = true;
        let prefix_end = decl.declaration.span().start;
        match &decl.declaration {
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                self.erase_statement(decl.span);
            }
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                if func.declare || func.body.is_none() {
                    self.erase_statement(decl.span);
                    return;
                }
                self.default_declaration(decl.span, prefix_end, func.id.as_ref());
                self.visit_function(func, ScopeFlags::Function);
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                if class.declare {
                    self.erase_statement(decl.span);
                    return;
                }
                self.default_declaration(decl.span, prefix_end, class.id.as_ref());
                self.visit_class(class);
            }
            other => {
                if let Some(expr) = other.as_expression() {
                    self.edits
                        .replace_range(decl.span.start, prefix_end, format!("var {}=", DEFAULT_BINDING));
                    if !self.ctx.source[..decl.span.end as usize].ends_with(';') {
                        self.edits.insert(decl.span.end, ";");
                    }
                    self.exports.push(("default".into(), DEFAULT_BINDING.into()));
                    self.visit_expression(expr);
                }
            }
        }
    }

    fn default_declaration(&mut self, statement: Span, prefix_end: u32, id: Option<&BindingIdentifier<'_>>) {
        match id {
            Some(id) => {
                self.edits.delete_range(statement.start, prefix_end);
                self.exports.push(("default".into(), id.name.to_string()));
            }
            None => {
                self.edits
                    .replace_range(statement.start, prefix_end, format!("var {}=", DEFAULT_BINDING));
                self.edits.insert(statement.end, ";");
                self.exports.push(("default".into(), DEFAULT_BINDING.into()));
            }
        }
    }

    fn export_all(&mut self, decl: &ExportAllDeclaration<'_>) {
        self.esm = true;
        self.erase_statement(decl.span);
        if decl.export_kind.is_type() {
            return;
        }
        let request = self.request(decl.source.value.as_str(), decl.source.span.start);
        match &decl.exported {
            Some(name) => self.exports.push((name.name().to_string(), format!("__m{}", request))),
            None => self.reexports.push(request),
        }
    }

    // -------------------------------------------------------------------------
    // Classes and functions
    // -------------------------------------------------------------------------

    /// Remove TypeScript modifier keywords in `[start, end)`, keeping `static`
    /// and everything else.
    fn delete_modifier_words(&mut self, start: u32, end: u32) {
        let text = &self.ctx.source[start as usize..end as usize];
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if !is_ident_byte(bytes[i]) {
                i += 1;
                continue;
            }
            let word_start = i;
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            if TS_MODIFIERS.contains(&&text[word_start..i]) {
                let mut word_end = i;
                while word_end < bytes.len() && bytes[word_end].is_ascii_whitespace() {
                    word_end += 1;
                }
                self.edits.delete_range(start + word_start as u32, start + word_end as u32);
                i = word_end;
            }
        }
    }

    /// Delete the `?` or `!` that follows a key or binding ending at `from`.
    fn delete_marker_after(&mut self, from: u32, computed: bool) {
        let source = self.ctx.source.as_bytes();
        let mut pos = skip_whitespace(source, from as usize);
        if computed && source.get(pos) == Some(&b']') {
            pos = skip_whitespace(source, pos + 1);
        }
        if matches!(source.get(pos), Some(b'?') | Some(b'!')) {
            self.edits.delete_range(pos as u32, pos as u32 + 1);
        }
    }

    fn strip_member(&mut self, start: u32, key: &PropertyKey<'_>, computed: bool, marker: bool) {
        let key_span = key.span();
        self.delete_modifier_words(start, key_span.start);
        if marker {
            self.delete_marker_after(key_span.end, computed);
        }
    }

    /// Lower `constructor(private x: T)` to an assignment in the body.
    fn lower_parameter_properties(&mut self, class: &Class<'_>) {
        let constructor = class.body.body.iter().find_map(|element| match element {
            ClassElement::MethodDefinition(m) if m.kind == MethodDefinitionKind::Constructor => Some(m),
            _ => None,
        });
        let Some(constructor) = constructor else {
            return;
        };
        let Some(body) = &constructor.value.body else {
            return;
        };

        let assignments: String = constructor
            .value
            .params
            .items
            .iter()
            .filter(|p| p.accessibility.is_some() || p.readonly || p.r#override)
            .filter_map(|p| p.pattern.get_binding_identifier())
            .map(|id| format!("this.{0}={0};", id.name))
            .collect();
        if assignments.is_empty() {
            return;
        }

        let super_call = class.super_class.as_ref().and_then(|_| {
            body.statements.iter().find(|stmt| match stmt {
                Statement::ExpressionStatement(e) => matches!(
                    &e.expression,
                    Expression::CallExpression(call) if matches!(call.callee, Expression::Super(_))
                ),
                _ => false,
            })
        });
        match super_call {
            Some(stmt) => {
                let end = stmt.span().end;
                let sep = if self.ctx.source[..end as usize].ends_with(';') { "" } else { ";" };
                self.edits.insert(end, format!("{}{}", sep, assignments));
            }
            None => self.edits.insert(body.span.start + 1, assignments),
        }
    }

    fn strip_abstract_keyword(&mut self, class: &Class<'_>) {
        let start = class.span.start as usize;
        let source = self.ctx.source;
        if source[start..].starts_with("abstract") {
            let end = skip_whitespace(source.as_bytes(), start + "abstract".len());
            self.edits.delete_range(start as u32, end as u32);
        } else {
            let before = source[..start].trim_end();
            if let Some(head) = before.strip_suffix("abstract") {
                self.edits.delete_range(head.len() as u32, start as u32);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Enums
    // -------------------------------------------------------------------------

    fn lower_enum(&mut self, decl: &TSEnumDeclaration<'_>) {
        let name = decl.id.name.to_string();
        let mut pieces = vec![Piece::Text(format!("var {0}=(function({0}){{", name))];
        let mut auto = Some(AutoValue::Number(0.0));

        for member in &decl.body.members {
            let key = enum_member_name(&member.id);
            let quoted = jsx::quote(&key);
            match &member.initializer {
                Some(init) if is_string_initializer(init) => {
                    pieces.push(Piece::Text(format!("{}[{}]=", name, quoted)));
                    pieces.push(Piece::Source(init.span()));
                    pieces.push(Piece::Text(";".into()));
                    auto = None;
                }
                Some(init) => {
                    pieces.push(Piece::Text(format!("{0}[{0}[{1}]=", name, quoted)));
                    pieces.push(Piece::Source(init.span()));
                    pieces.push(Piece::Text(format!("]={};", quoted)));
                    auto = Some(match init.without_parentheses() {
                        Expression::NumericLiteral(num) => AutoValue::Number(num.value + 1.0),
                        _ => AutoValue::After(key.clone()),
                    });
                }
                None => {
                    let value = match &auto {
                        Some(AutoValue::Number(n)) => format_number(*n),
                        Some(AutoValue::After(prev)) => format!("{}[{}]+1", name, jsx::quote(prev)),
                        None => {
                            self.diagnostic(member.span.start, format!("enum member '{}' must have an initializer", key));
                            "0".into()
                        }
                    };
                    pieces.push(Piece::Text(format!("{0}[{0}[{1}]={2}]={1};", name, quoted, value)));
                    auto = match auto {
                        Some(AutoValue::Number(n)) => Some(AutoValue::Number(n + 1.0)),
                        _ => Some(AutoValue::After(key.clone())),
                    };
                }
            }
        }
        pieces.push(Piece::Text(format!("return {0}}})({0}||{{}});", name)));
        self.edits.composite(decl.span, pieces);
    }

    // -------------------------------------------------------------------------
    // JSX
    // -------------------------------------------------------------------------

    fn jsx_runtime(&mut self, offset: u32) -> String {
        format!("__m{}", self.request(JSX_RUNTIME, offset))
    }

    fn jsx_call(&mut self, span: Span, tag: Vec<Piece>, attributes: &[JSXAttributeItem<'_>], children: &[JSXChild<'_>]) {
        let runtime = self.jsx_runtime(span.start);
        let mut props: Vec<Vec<Piece>> = Vec::new();
        let mut key: Option<Vec<Piece>> = None;

        for item in attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let name = match &attr.name {
                        JSXAttributeName::Identifier(id) => id.name.to_string(),
                        JSXAttributeName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
                    };
                    let value = match &attr.value {
                        None => vec![Piece::Text(if self.ctx.minify { "!0" } else { "true" }.into())],
                        Some(JSXAttributeValue::StringLiteral(s)) => {
                            vec![Piece::Text(jsx::quote(&jsx::decode_entities(s.value.as_str())))]
                        }
                        Some(JSXAttributeValue::ExpressionContainer(c)) => match c.expression.as_expression() {
                            Some(expr) => vec![Piece::Source(expr.span())],
                            None => continue,
                        },
                        Some(JSXAttributeValue::Element(e)) => vec![Piece::Source(e.span)],
                        Some(JSXAttributeValue::Fragment(f)) => vec![Piece::Source(f.span)],
                    };
                    if name == "key" {
                        key = Some(value);
                        continue;
                    }
                    let mut prop = vec![Piece::Text(format!("{}:", jsx::prop_key(&name)))];
                    prop.extend(value);
                    props.push(prop);
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    props.push(vec![Piece::Text("...".into()), Piece::Source(spread.argument.span())]);
                }
            }
        }

        let mut spread_child = false;
        let mut kids: Vec<Vec<Piece>> = Vec::new();
        for child in children {
            match child {
                JSXChild::Text(text) => {
                    let raw = &self.ctx.source[text.span.start as usize..text.span.end as usize];
                    if let Some(clean) = jsx::clean_text(raw) {
                        kids.push(vec![Piece::Text(jsx::quote(&clean))]);
                    }
                }
                JSXChild::Element(e) => kids.push(vec![Piece::Source(e.span)]),
                JSXChild::Fragment(f) => kids.push(vec![Piece::Source(f.span)]),
                JSXChild::ExpressionContainer(c) => {
                    if let Some(expr) = c.expression.as_expression() {
                        kids.push(vec![Piece::Source(expr.span())]);
                    }
                }
                JSXChild::Spread(s) => {
                    spread_child = true;
                    kids.push(vec![Piece::Text("...".into()), Piece::Source(s.expression.span())]);
                }
            }
        }

        let multiple = kids.len() > 1 || spread_child;
        match kids.len() {
            0 => {}
            1 if !spread_child => {
                let mut prop = vec![Piece::Text("children:".into())];
                prop.extend(kids.pop().unwrap_or_default());
                props.push(prop);
            }
            _ => {
                let mut prop = vec![Piece::Text("children:[".into())];
                prop.extend(join_pieces(kids));
                prop.push(Piece::Text("]".into()));
                props.push(prop);
            }
        }

        let func = if multiple { "jsxs" } else { "jsx" };
        let mut pieces = vec![Piece::Text(format!("{}.{}(", runtime, func))];
        pieces.extend(tag);
        pieces.push(Piece::Text(",{".into()));
        pieces.extend(join_pieces(props));
        pieces.push(Piece::Text("}".into()));
        if let Some(key) = key {
            pieces.push(Piece::Text(",".into()));
            pieces.extend(key);
        }
        pieces.push(Piece::Text(")".into()));
        self.edits.composite(span, pieces);
    }
}

impl<'a> Visit<'a> for Lowering<'_> {
    fn visit_statement(&mut self, it: &Statement<'a>) {
        match it {
            Statement::ImportDeclaration(decl) => self.erase_statement(decl.span),
            Statement::ExportNamedDeclaration(decl) => self.export_named(decl),
            Statement::ExportDefaultDeclaration(decl) => self.export_default(decl),
            Statement::ExportAllDeclaration(decl) => self.export_all(decl),
            Statement::TSExportAssignment(decl) => {
                self.diagnostic(decl.span.start, "'export =' is not supported; use 'export default'");
            }
            Statement::TSNamespaceExportDeclaration(decl) => self.erase_statement(decl.span),
            _ => {
                if let Some(declaration) = it.as_declaration() {
                    if self.erase_declaration(declaration, it.span()) {
                        return;
                    }
                }
                walk::walk_statement(self, it);
            }
        }
    }

    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        let Some(symbol) = self.symbol_of(it) else {
            return;
        };
        if let Some(binding) = self.imports.get(&symbol) {
            let value = self.binding_value(binding);
            let text = if self.shorthand_starts.contains(&it.span.start) {
                format!("{}:{}", it.name, value)
            } else if self.callee_starts.contains(&it.span.start) && !matches!(binding.kind, ImportKind::Namespace) {
                // Call imported functions without the module object as `this`.
                format!("(0,{})", value)
            } else {
                value
            };
            self.edits.replace(it.span, text);
            return;
        }
        if let Some(enum_name) = self.enum_stack.last() {
            if self.scoping.symbol_flags(symbol).contains(SymbolFlags::EnumMember) {
                let text = member(enum_name, it.name.as_str());
                self.edits.replace(it.span, text);
            }
        }
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(ident) = &it.value {
                self.shorthand_starts.insert(ident.span.start);
            }
        }
        walk::walk_object_property(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(ident) = &it.callee {
            if ident.name == "require" && self.symbol_of(ident).is_none() && it.arguments.len() == 1 {
                if let Argument::StringLiteral(lit) = &it.arguments[0] {
                    let specifier = lit.value.as_str();
                    if !self.ctx.resolver.is_external(specifier) && specifier.starts_with('.') {
                        match self.ctx.resolver.locate(self.ctx.path, specifier, self.ctx.files) {
                            Ok(ModuleTarget::Internal(path)) => {
                                self.edits.replace(it.span, format!("__require({})", jsx::quote(&path)));
                                self.lazy_dependencies.push(path);
                            }
                            Ok(ModuleTarget::External(_)) => {}
                            Err(err) => self.diagnostic(lit.span.start, err.message().to_string()),
                        }
                        return;
                    }
                }
            }
            self.callee_starts.insert(ident.span.start);
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_tagged_template_expression(&mut self, it: &TaggedTemplateExpression<'a>) {
        if let Expression::Identifier(ident) = &it.tag {
            self.callee_starts.insert(ident.span.start);
        }
        walk::walk_tagged_template_expression(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        let Expression::StringLiteral(lit) = &it.source else {
            self.diagnostic(it.span.start, "import() needs a string literal specifier");
            return;
        };
        let load = match self.ctx.resolver.locate(self.ctx.path, lit.value.as_str(), self.ctx.files) {
            Ok(ModuleTarget::Internal(path)) => {
                let load = format!("__require({})", jsx::quote(&path));
                self.lazy_dependencies.push(path);
                load
            }
            Ok(ModuleTarget::External(id)) => format!("require({})", jsx::quote(&id)),
            Err(err) => {
                self.diagnostic(lit.span.start, err.message().to_string());
                return;
            }
        };
        self.edits.replace(
            it.span,
            format!("Promise.resolve().then(function(){{return __toESM({})}})", load),
        );
    }

    fn visit_meta_property(&mut self, it: &MetaProperty<'a>) {
        if it.meta.name == "import" {
            self.diagnostic(it.span.start, "import.meta is not supported");
        }
    }

    fn visit_await_expression(&mut self, it: &AwaitExpression<'a>) {
        if self.function_depth == 0 {
            self.diagnostic(it.span.start, "top-level await is not supported; await inside an async function");
        }
        walk::walk_await_expression(self, it);
    }

    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        if let Some(this_param) = &it.this_param {
            let source = self.ctx.source.as_bytes();
            let mut end = skip_whitespace(source, this_param.span.end as usize);
            if source.get(end) == Some(&b',') {
                end = skip_whitespace(source, end + 1);
            }
            self.edits.delete_range(this_param.span.start, end as u32);
        }
        self.function_depth += 1;
        walk::walk_function(self, it, flags);
        self.function_depth -= 1;
    }

    fn visit_arrow_function_expression(&mut self, it: &ArrowFunctionExpression<'a>) {
        self.function_depth += 1;
        walk::walk_arrow_function_expression(self, it);
        self.function_depth -= 1;
    }

    fn visit_formal_parameter(&mut self, it: &FormalParameter<'a>) {
        let pattern = it.pattern.span();
        if it.decorators.is_empty() && (it.accessibility.is_some() || it.readonly || it.r#override) {
            self.edits.delete_range(it.span.start, pattern.start);
        }
        if it.optional {
            self.delete_marker_after(pattern.end, false);
        }
        walk::walk_formal_parameter(self, it);
    }

    fn visit_variable_declarator(&mut self, it: &VariableDeclarator<'a>) {
        if it.definite {
            self.delete_marker_after(it.id.span().end, false);
        }
        walk::walk_variable_declarator(self, it);
    }

    fn visit_class(&mut self, it: &Class<'a>) {
        if it.r#abstract {
            self.strip_abstract_keyword(it);
        }
        if let (Some(first), Some(last)) = (it.implements.first(), it.implements.last()) {
            let head = &self.ctx.source[it.span.start as usize..first.span.start as usize];
            if let Some(idx) = head.rfind("implements") {
                self.edits.delete_range(it.span.start + idx as u32, last.span.end);
            }
        }
        self.lower_parameter_properties(it);
        walk::walk_class(self, it);
    }

    fn visit_class_element(&mut self, it: &ClassElement<'a>) {
        match it {
            ClassElement::TSIndexSignature(sig) => self.edits.delete(sig.span),
            ClassElement::MethodDefinition(m) => {
                if m.r#type == MethodDefinitionType::TSAbstractMethodDefinition || m.value.body.is_none() {
                    self.edits.delete(m.span);
                    return;
                }
                self.strip_member(m.span.start, &m.key, m.computed, m.optional);
                walk::walk_method_definition(self, m);
            }
            ClassElement::PropertyDefinition(p) => {
                if p.declare || p.r#type == PropertyDefinitionType::TSAbstractPropertyDefinition {
                    self.edits.delete(p.span);
                    return;
                }
                self.strip_member(p.span.start, &p.key, p.computed, p.optional || p.definite);
                walk::walk_property_definition(self, p);
            }
            ClassElement::AccessorProperty(a) => {
                if a.r#type == AccessorPropertyType::TSAbstractAccessorProperty {
                    self.edits.delete(a.span);
                } else {
                    self.diagnostic(a.span.start, "'accessor' fields are not supported");
                }
            }
            ClassElement::StaticBlock(_) => walk::walk_class_element(self, it),
        }
    }

    fn visit_decorator(&mut self, it: &Decorator<'a>) {
        self.diagnostic(it.span.start, "decorators are not supported");
    }

    fn visit_ts_enum_declaration(&mut self, it: &TSEnumDeclaration<'a>) {
        if it.declare {
            self.edits.delete(it.span);
            return;
        }
        self.lower_enum(it);
        self.enum_stack.push(it.id.name.to_string());
        for member in &it.body.members {
            if let Some(init) = &member.initializer {
                self.visit_expression(init);
            }
        }
        self.enum_stack.pop();
    }

    fn visit_ts_type_annotation(&mut self, it: &TSTypeAnnotation<'a>) {
        self.edits.delete(it.span);
    }

    fn visit_ts_type_parameter_declaration(&mut self, it: &TSTypeParameterDeclaration<'a>) {
        self.edits.delete(it.span);
    }

    fn visit_ts_type_parameter_instantiation(&mut self, it: &TSTypeParameterInstantiation<'a>) {
        self.edits.delete(it.span);
    }

    fn visit_ts_type(&mut self, _it: &TSType<'a>) {}

    fn visit_ts_this_parameter(&mut self, _it: &TSThisParameter<'a>) {}

    fn visit_ts_class_implements(&mut self, _it: &TSClassImplements<'a>) {}

    fn visit_ts_as_expression(&mut self, it: &TSAsExpression<'a>) {
        self.edits.delete_range(it.expression.span().end, it.span.end);
        self.visit_expression(&it.expression);
    }

    fn visit_ts_satisfies_expression(&mut self, it: &TSSatisfiesExpression<'a>) {
        self.edits.delete_range(it.expression.span().end, it.span.end);
        self.visit_expression(&it.expression);
    }

    fn visit_ts_non_null_expression(&mut self, it: &TSNonNullExpression<'a>) {
        self.edits.delete_range(it.expression.span().end, it.span.end);
        self.visit_expression(&it.expression);
    }

    fn visit_ts_type_assertion(&mut self, it: &TSTypeAssertion<'a>) {
        self.edits.delete_range(it.span.start, it.expression.span().start);
        self.visit_expression(&it.expression);
    }

    fn visit_ts_instantiation_expression(&mut self, it: &TSInstantiationExpression<'a>) {
        self.edits.delete_range(it.expression.span().end, it.span.end);
        self.visit_expression(&it.expression);
    }

    fn visit_jsx_element(&mut self, it: &JSXElement<'a>) {
        let tag = match &it.opening_element.name {
            JSXElementName::Identifier(id) => {
                let name = id.name.as_str();
                if jsx::is_intrinsic(name) {
                    vec![Piece::Text(jsx::quote(name))]
                } else {
                    vec![Piece::Text(name.to_string())]
                }
            }
            JSXElementName::IdentifierReference(ident) => vec![Piece::Source(ident.span)],
            JSXElementName::NamespacedName(ns) => {
                vec![Piece::Text(jsx::quote(&format!("{}:{}", ns.namespace.name, ns.name.name)))]
            }
            JSXElementName::MemberExpression(m) => vec![Piece::Source(m.span)],
            JSXElementName::ThisExpression(_) => vec![Piece::Text("this".into())],
        };
        self.jsx_call(it.span, tag, &it.opening_element.attributes, &it.children);
        walk::walk_jsx_element(self, it);
    }

    fn visit_jsx_fragment(&mut self, it: &JSXFragment<'a>) {
        let runtime = self.jsx_runtime(it.span.start);
        let tag = vec![Piece::Text(format!("{}.Fragment", runtime))];
        self.jsx_call(it.span, tag, &[], &it.children);
        walk::walk_jsx_fragment(self, it);
    }

    fn visit_member_expression(&mut self, it: &MemberExpression<'a>) {
        if let Expression::BooleanLiteral(lit) = it.object().get_inner_expression() {
            self.grouped_booleans.insert(lit.span.start);
        }
        walk::walk_member_expression(self, it);
    }

    fn visit_binary_expression(&mut self, it: &BinaryExpression<'a>) {
        if it.operator == BinaryOperator::Exponential {
            if let Expression::BooleanLiteral(lit) = it.left.get_inner_expression() {
                self.grouped_booleans.insert(lit.span.start);
            }
        }
        walk::walk_binary_expression(self, it);
    }

    fn visit_boolean_literal(&mut self, it: &BooleanLiteral) {
        if !self.ctx.minify {
            return;
        }
        let text = match (it.value, self.grouped_booleans.contains(&it.span.start)) {
            (true, false) => "!0",
            (false, false) => "!1",
            (true, true) => "(!0)",
            (false, true) => "(!1)",
        };
        self.edits.replace(it.span, text);
    }

    fn visit_string_literal(&mut self, it: &StringLiteral<'a>) {
        self.edits.protect(it.span.start, it.span.end);
    }

    fn visit_template_literal(&mut self, it: &TemplateLiteral<'a>) {
        for quasi in &it.quasis {
            self.edits.protect(quasi.span.start, quasi.span.end);
        }
        walk::walk_template_literal(self, it);
    }

    fn visit_reg_exp_literal(&mut self, it: &RegExpLiteral<'a>) {
        self.edits.protect(it.span.start, it.span.end);
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

/// `obj.name` when `name` is a plain identifier, `obj["name"]` otherwise.
fn member(object: &str, name: &str) -> String {
    if jsx::is_identifier(name) {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, jsx::quote(name))
    }
}

fn declared_names(decl: &Declaration<'_>) -> Vec<String> {
    match decl {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        other => other.id().map(|id| vec![id.name.to_string()]).unwrap_or_default(),
    }
}

fn enum_member_name(name: &TSEnumMemberName<'_>) -> String {
    match name {
        TSEnumMemberName::Identifier(id) => id.name.to_string(),
        TSEnumMemberName::String(s) | TSEnumMemberName::ComputedString(s) => s.value.to_string(),
        TSEnumMemberName::ComputedTemplateString(t) => t
            .quasis
            .iter()
            .map(|q| q.value.cooked.unwrap_or(q.value.raw).to_string())
            .collect(),
    }
}

fn is_string_initializer(expr: &Expression<'_>) -> bool {
    match expr.without_parentheses() {
        Expression::StringLiteral(_) => true,
        Expression::TemplateLiteral(t) => t.expressions.is_empty(),
        _ => false,
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn join_pieces(groups: Vec<Vec<Piece>>) -> Vec<Piece> {
    let mut out = Vec::new();
    for (i, group) in groups.into_iter().enumerate() {
        if i > 0 {
            out.push(Piece::Text(",".into()));
        }
        out.extend(group);
    }
    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn skip_whitespace(source: &[u8], mut pos: usize) -> usize {
    while pos < source.len() && source[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Whether the first token at or after `pos` (past whitespace and comments)
/// could extend an unterminated statement before it.
fn continues_previous(source: &[u8], mut pos: usize) -> bool {
    loop {
        pos = skip_whitespace(source, pos);
        match (source.get(pos), source.get(pos + 1)) {
            (Some(b'/'), Some(b'/')) => {
                pos = source[pos..].iter().position(|&b| b == b'\n').map_or(source.len(), |i| pos + i);
            }
            (Some(b'/'), Some(b'*')) => {
                pos = source[pos + 2..]
                    .windows(2)
                    .position(|w| w == b"*/")
                    .map_or(source.len(), |i| pos + 2 + i + 2);
            }
            (Some(&c), _) => return matches!(c, b'(' | b'[' | b'`' | b'+' | b'-' | b'/'),
            (None, _) => return false,
        }
    }
}
