//! Per-file source rewriting.
//!
//! All transformations (identifier renames, import aliasing, comment
//! stripping, literal encryption, opaque-predicate injection) are expressed
//! as span-addressed text edits against the original source, applied
//! back-to-front so earlier offsets stay valid. The rewriter reads only the
//! frozen mapping, protected set, and alias table; it owns no global state.
//!
//! Identifier policy, in order:
//! 1. protected names are never touched;
//! 2. a reference that resolves through the file's own scope chain uses the
//!    identity-keyed mapping;
//! 3. otherwise the flat name-keyed mapping (cross-file references);
//! 4. otherwise the reference is left unchanged.

use crate::classify::{Classifier, ProtectedSet};
use crate::crypt::{literal_eligible, LiteralCipher};
use crate::mapping::{NameGenerator, ObfuscationMapping};
use crate::scope::ScopeTree;
use crate::syntax::ast::{
    Decl, Expr, File, FuncDecl, LitKind, Span, Stmt, TypeExpr, ValueKind,
};
use crate::syntax::token::{Tok, Token};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Which transformations to apply
#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions {
    /// Strip comments (directives survive verbatim)
    pub strip_comments: bool,
    /// Encrypt eligible string literals
    pub encrypt_strings: bool,
    /// Inject opaque predicates into eligible function bodies
    pub opaque_predicates: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            strip_comments: true,
            encrypt_strings: false,
            opaque_predicates: false,
        }
    }
}

/// Everything the rewriter needs to know about one file
pub struct FileContext<'a> {
    /// Original source text
    pub src: &'a str,
    /// Raw token list including trivia
    pub tokens: &'a [Tok],
    /// Parsed tree
    pub file: &'a File,
    /// Frozen scope tree
    pub tree: &'a ScopeTree,
    /// Unit id of this file in the mapping
    pub unit: u32,
}

/// Result of rewriting one file
#[derive(Debug)]
pub struct RewriteOutcome {
    /// The rewritten source text
    pub text: String,
    /// Number of identifier occurrences renamed
    pub renamed: usize,
    /// Number of string literals encrypted
    pub encrypted: usize,
}

/// Shared, immutable rewrite state threaded through the rewrite phase
pub struct Rewriter<'a> {
    mapping: &'a ObfuscationMapping,
    protected: &'a ProtectedSet,
    classifier: &'a Classifier,
    /// Import path -> synthetic alias, standard-library paths only
    aliases: &'a HashMap<String, String>,
    cipher: Option<&'a LiteralCipher>,
    options: RewriteOptions,
}

#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

impl<'a> Rewriter<'a> {
    /// Creates a rewriter over the frozen per-run state
    pub fn new(
        mapping: &'a ObfuscationMapping,
        protected: &'a ProtectedSet,
        classifier: &'a Classifier,
        aliases: &'a HashMap<String, String>,
        cipher: Option<&'a LiteralCipher>,
        options: RewriteOptions,
    ) -> Self {
        Self {
            mapping,
            protected,
            classifier,
            aliases,
            cipher,
            options,
        }
    }

    /// Rewrite one file. `inject_helper` marks the unit chosen to carry the
    /// decrypt helper for its package.
    pub fn rewrite_file(
        &self,
        ctx: &FileContext<'_>,
        gen: &mut NameGenerator,
        inject_helper: bool,
    ) -> RewriteOutcome {
        let mut edits: Vec<Edit> = Vec::new();
        let mut renamed = 0usize;
        let mut encrypted = 0usize;

        // (a) import aliasing, standard-library paths only
        let local_aliases = self.alias_imports(ctx, &mut edits);

        // (b) identifier rewriting
        let mut sites = Vec::new();
        collect_ref_sites(ctx.file, &mut sites);
        for site in &sites {
            match site.kind {
                RefKind::Lexical => {
                    let name = site.name.as_str();
                    if name == "_" {
                        continue;
                    }
                    // A package qualifier that is not itself a local binding
                    // is rewritten to its synthetic alias
                    if site.qualifier {
                        if let Some(alias) = local_aliases.get(name) {
                            if ctx.tree.resolve(name, site.span.start).is_none() {
                                edits.push(Edit {
                                    start: site.span.start,
                                    end: site.span.end,
                                    text: alias.clone(),
                                });
                                continue;
                            }
                        }
                    }
                    if self.classifier.is_protected(name, self.protected) {
                        continue;
                    }
                    let replacement = ctx
                        .tree
                        .resolve(name, site.span.start)
                        .and_then(|id| self.mapping.lookup_object(ctx.unit, id))
                        .or_else(|| self.mapping.lookup_name(name));
                    if let Some(replacement) = replacement {
                        edits.push(Edit {
                            start: site.span.start,
                            end: site.span.end,
                            text: replacement.to_string(),
                        });
                        renamed += 1;
                    }
                }
                RefKind::Member => {
                    // Selector targets and literal keys have no lexical
                    // scope; only the cross-file name map applies
                    if self.classifier.is_protected(&site.name, self.protected) {
                        continue;
                    }
                    if let Some(replacement) = self.mapping.lookup_name(&site.name) {
                        edits.push(Edit {
                            start: site.span.start,
                            end: site.span.end,
                            text: replacement.to_string(),
                        });
                        renamed += 1;
                    }
                }
            }
        }

        // (c) comment stripping, directives preserved verbatim
        if self.options.strip_comments {
            for tok in ctx.tokens {
                if !tok.kind.is_comment() {
                    continue;
                }
                let text = tok.text(ctx.src);
                if is_directive(text) {
                    continue;
                }
                // A block comment may glue two tokens together; leave a space
                let replacement = if tok.kind == Token::BlockComment { " " } else { "" };
                edits.push(Edit {
                    start: tok.start,
                    end: tok.end,
                    text: replacement.to_string(),
                });
            }
        }

        // (d) literal encryption
        if self.options.encrypt_strings {
            if let Some(cipher) = self.cipher {
                encrypted = self.encrypt_literals(ctx, cipher, &mut edits);
            }
        }

        // (e) opaque predicates
        if self.options.opaque_predicates {
            self.inject_predicates(ctx, gen, &mut edits);
        }

        // Decrypt helper, once per compilation unit
        if inject_helper {
            if let Some(cipher) = self.cipher {
                self.inject_helper(ctx, gen, cipher, &mut edits);
            }
        }

        RewriteOutcome {
            text: apply_edits(ctx.src, edits),
            renamed,
            encrypted,
        }
    }

    /// Add synthetic aliases to standard-library imports, returning the
    /// local-name -> alias table for this file.
    fn alias_imports(&self, ctx: &FileContext<'_>, edits: &mut Vec<Edit>) -> HashMap<String, String> {
        let mut local = HashMap::new();
        for import in &ctx.file.imports {
            let Some(alias) = self.aliases.get(import.path_value()) else {
                continue;
            };
            let Some(name) = import.local_name() else {
                continue; // blank and dot imports keep their markers
            };
            match &import.alias {
                Some(existing) => edits.push(Edit {
                    start: existing.span.start,
                    end: existing.span.end,
                    text: alias.clone(),
                }),
                None => edits.push(Edit {
                    start: import.path.span.start,
                    end: import.path.span.start,
                    text: format!("{alias} "),
                }),
            }
            local.insert(name.to_string(), alias.clone());
        }
        local
    }

    fn encrypt_literals(
        &self,
        ctx: &FileContext<'_>,
        cipher: &LiteralCipher,
        edits: &mut Vec<Edit>,
    ) -> usize {
        // Literals inside import declarations and const blocks stay as-is:
        // import paths are resolved at compile time and const initializers
        // must remain constant expressions.
        let mut exempt_spans: Vec<Span> = ctx.file.import_decl_spans.clone();
        collect_const_spans(&ctx.file.decls, &mut exempt_spans);

        let mut literals = Vec::new();
        collect_string_literals(ctx.file, &mut literals);

        let mut count = 0;
        for lit in literals {
            if lit.kind != LitKind::Str {
                continue; // raw strings keep their exact bytes
            }
            if exempt_spans.iter().any(|s| s.contains(lit.span.start)) {
                continue;
            }
            let Some(content) = lit.str_content() else {
                continue;
            };
            if !literal_eligible(content) {
                continue;
            }
            edits.push(Edit {
                start: lit.span.start,
                end: lit.span.end,
                text: cipher.call_expr(content),
            });
            count += 1;
        }
        count
    }

    fn inject_predicates(
        &self,
        ctx: &FileContext<'_>,
        gen: &mut NameGenerator,
        edits: &mut Vec<Edit>,
    ) {
        for decl in &ctx.file.decls {
            let Decl::Func(f) = decl else { continue };
            if !predicate_eligible(ctx, f) {
                continue;
            }
            let Some(body) = &f.body else { continue };
            let v1 = gen.local_name();
            let v2 = gen.local_name();
            let v3 = gen.local_name();
            let junk = format!(
                "\n\t{v1} := 42\n\
                 \tif {v1}*{v1} >= 0 {{\n\t\t{v1} = {v1} + 1\n\t}}\n\
                 \t{v2} := 10\n\
                 \tif ({v2}*{v2}+{v2})%2 == 0 {{\n\t\t{v2} = {v2} * 2\n\t}}\n\
                 \t{v3} := 5\n\
                 \tif 2*{v3} > {v3} {{\n\t\t{v3} = {v3} - 1\n\t}}\n\
                 \tfor {v1} < 0 && {v2} > 1000000 {{\n\t\tbreak\n\t}}\n",
            );
            let insert_at = body.span.start + 1; // just past the `{`
            edits.push(Edit {
                start: insert_at,
                end: insert_at,
                text: junk,
            });
        }
    }

    fn inject_helper(
        &self,
        ctx: &FileContext<'_>,
        gen: &mut NameGenerator,
        cipher: &LiteralCipher,
        edits: &mut Vec<Edit>,
    ) {
        // Reuse an existing base64 import (honoring any alias it received),
        // otherwise add one right after the package clause.
        let existing = ctx
            .file
            .imports
            .iter()
            .find(|i| i.path_value() == "encoding/base64");
        let alias = match existing {
            Some(import) => self
                .aliases
                .get("encoding/base64")
                .cloned()
                .or_else(|| import.local_name().map(str::to_string))
                .unwrap_or_else(|| "base64".to_string()),
            None => {
                let alias = gen.import_alias();
                edits.push(Edit {
                    start: ctx.file.package.span.end,
                    end: ctx.file.package.span.end,
                    text: format!("\n\nimport {alias} \"encoding/base64\""),
                });
                alias
            }
        };
        edits.push(Edit {
            start: ctx.src.len(),
            end: ctx.src.len(),
            text: format!("\n{}", cipher.helper_source(&alias)),
        });
        debug!(helper = cipher.helper_name(), "injected decrypt helper");
    }
}

/// Compiler directives that must survive comment stripping
fn is_directive(text: &str) -> bool {
    text.starts_with("//go:") || text.starts_with("// +build") || text.starts_with("//+build")
}

/// Whether a function body receives opaque predicates.
///
/// Entry points, init hooks, directive-tagged functions, and short bodies
/// are skipped.
fn predicate_eligible(ctx: &FileContext<'_>, f: &FuncDecl) -> bool {
    if f.receiver.is_none() && (f.name.name == "main" || f.name.name == "init") {
        return false;
    }
    let Some(body) = &f.body else {
        return false;
    };
    if body.stmts.len() <= 2 {
        return false;
    }
    // A directive comment directly above the declaration marks the function
    // as compiler-managed
    for tok in ctx.tokens {
        if tok.start >= f.span.start {
            break;
        }
        if tok.kind.is_comment()
            && tok.text(ctx.src).starts_with("//go:")
            && only_trivia_between(ctx, tok.end, f.span.start)
        {
            return false;
        }
    }
    true
}

fn only_trivia_between(ctx: &FileContext<'_>, from: usize, to: usize) -> bool {
    ctx.tokens
        .iter()
        .filter(|t| t.start >= from && t.end <= to)
        .all(|t| matches!(t.kind, Token::Newline) || t.kind.is_comment())
}

/// Apply edits back-to-front; overlapping edits are dropped with a warning.
fn apply_edits(src: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut filtered: Vec<Edit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if let Some(last) = filtered.last() {
            if edit.start < last.end {
                warn!(
                    start = edit.start,
                    end = edit.end,
                    "dropping overlapping edit"
                );
                continue;
            }
        }
        filtered.push(edit);
    }
    let mut out = src.to_string();
    for edit in filtered.iter().rev() {
        out.replace_range(edit.start..edit.end, &edit.text);
    }
    out
}

// ----- reference collection -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    /// A name resolved through the lexical scope chain
    Lexical,
    /// A selector target or composite-literal key; name-map fallback only
    Member,
}

#[derive(Debug)]
struct RefSite {
    name: String,
    span: Span,
    kind: RefKind,
    /// True when the identifier is the base of a selector or a type
    /// qualifier, making it a candidate for import aliasing
    qualifier: bool,
}

fn lexical(id: &crate::syntax::ast::Ident) -> RefSite {
    RefSite {
        name: id.name.clone(),
        span: id.span,
        kind: RefKind::Lexical,
        qualifier: false,
    }
}

fn qualifier(id: &crate::syntax::ast::Ident) -> RefSite {
    RefSite {
        name: id.name.clone(),
        span: id.span,
        kind: RefKind::Lexical,
        qualifier: true,
    }
}

fn member(id: &crate::syntax::ast::Ident) -> RefSite {
    RefSite {
        name: id.name.clone(),
        span: id.span,
        kind: RefKind::Member,
        qualifier: false,
    }
}

fn collect_ref_sites(file: &File, out: &mut Vec<RefSite>) {
    for decl in &file.decls {
        decl_sites(decl, out);
    }
}

fn decl_sites(decl: &Decl, out: &mut Vec<RefSite>) {
    match decl {
        Decl::Func(f) => {
            out.push(lexical(&f.name));
            for p in f
                .receiver
                .iter()
                .chain(f.params.iter())
                .chain(f.results.iter())
            {
                for name in &p.names {
                    out.push(lexical(name));
                }
                type_sites(&p.ty, out);
            }
            if let Some(body) = &f.body {
                for stmt in &body.stmts {
                    stmt_sites(stmt, out);
                }
            }
        }
        Decl::Type(t) => {
            for spec in &t.specs {
                type_sites(&spec.ty, out);
            }
        }
        Decl::Value(v) => {
            for spec in &v.specs {
                for name in &spec.names {
                    out.push(lexical(name));
                }
                if let Some(ty) = &spec.ty {
                    type_sites(ty, out);
                }
                for value in &spec.values {
                    expr_sites(value, out);
                }
            }
        }
    }
}

fn stmt_sites(stmt: &Stmt, out: &mut Vec<RefSite>) {
    match stmt {
        Stmt::Decl(d) => decl_sites(d, out),
        Stmt::Empty(_) | Stmt::Branch { .. } => {}
        Stmt::Labeled { stmt, .. } => stmt_sites(stmt, out),
        Stmt::Expr(e) => expr_sites(e, out),
        Stmt::Send { chan, value, .. } => {
            expr_sites(chan, out);
            expr_sites(value, out);
        }
        Stmt::IncDec { expr, .. } => expr_sites(expr, out),
        Stmt::Assign { lhs, rhs, .. } => {
            for e in lhs.iter().chain(rhs.iter()) {
                expr_sites(e, out);
            }
        }
        Stmt::Go { call, .. } | Stmt::Defer { call, .. } => expr_sites(call, out),
        Stmt::Return { results, .. } => {
            for e in results {
                expr_sites(e, out);
            }
        }
        Stmt::Block(b) => {
            for s in &b.stmts {
                stmt_sites(s, out);
            }
        }
        Stmt::If(s) => {
            if let Some(init) = &s.init {
                stmt_sites(init, out);
            }
            expr_sites(&s.cond, out);
            for st in &s.body.stmts {
                stmt_sites(st, out);
            }
            if let Some(else_branch) = &s.else_branch {
                stmt_sites(else_branch, out);
            }
        }
        Stmt::Switch(s) => {
            if let Some(init) = &s.init {
                stmt_sites(init, out);
            }
            if let Some(tag) = &s.tag {
                expr_sites(tag, out);
            }
            for clause in &s.clauses {
                for e in &clause.exprs {
                    expr_sites(e, out);
                }
                for st in &clause.body {
                    stmt_sites(st, out);
                }
            }
        }
        Stmt::TypeSwitch(s) => {
            if let Some(init) = &s.init {
                stmt_sites(init, out);
            }
            if let Some(binding) = &s.binding {
                out.push(lexical(binding));
            }
            expr_sites(&s.subject, out);
            for clause in &s.clauses {
                for ty in &clause.types {
                    type_sites(ty, out);
                }
                for st in &clause.body {
                    stmt_sites(st, out);
                }
            }
        }
        Stmt::Select(s) => {
            for clause in &s.clauses {
                if let Some(comm) = &clause.comm {
                    stmt_sites(comm, out);
                }
                for st in &clause.body {
                    stmt_sites(st, out);
                }
            }
        }
        Stmt::For(s) => {
            if let Some(init) = &s.init {
                stmt_sites(init, out);
            }
            if let Some(cond) = &s.cond {
                expr_sites(cond, out);
            }
            if let Some(post) = &s.post {
                stmt_sites(post, out);
            }
            for st in &s.body.stmts {
                stmt_sites(st, out);
            }
        }
        Stmt::Range(s) => {
            for e in [&s.key, &s.value].into_iter().flatten() {
                expr_sites(e, out);
            }
            expr_sites(&s.subject, out);
            for st in &s.body.stmts {
                stmt_sites(st, out);
            }
        }
    }
}

fn expr_sites(expr: &Expr, out: &mut Vec<RefSite>) {
    match expr {
        Expr::Ident(id) => out.push(lexical(id)),
        Expr::Lit(_) => {}
        Expr::Selector { x, sel, .. } => {
            match &**x {
                Expr::Ident(base) => out.push(qualifier(base)),
                other => expr_sites(other, out),
            }
            out.push(member(sel));
        }
        Expr::Call { fun, args, .. } => {
            expr_sites(fun, out);
            for arg in args {
                expr_sites(arg, out);
            }
        }
        Expr::Index { x, index, .. } => {
            expr_sites(x, out);
            expr_sites(index, out);
        }
        Expr::Slice {
            x, low, high, max, ..
        } => {
            expr_sites(x, out);
            for bound in [low, high, max].into_iter().flatten() {
                expr_sites(bound, out);
            }
        }
        Expr::TypeAssert { x, ty, .. } => {
            expr_sites(x, out);
            type_sites(ty, out);
        }
        Expr::Star { x, .. } | Expr::Unary { x, .. } | Expr::Paren { x, .. } => {
            expr_sites(x, out)
        }
        Expr::Binary { x, y, .. } => {
            expr_sites(x, out);
            expr_sites(y, out);
        }
        Expr::FuncLit {
            params,
            results,
            body,
            ..
        } => {
            for p in params.iter().chain(results.iter()) {
                for name in &p.names {
                    out.push(lexical(name));
                }
                type_sites(&p.ty, out);
            }
            for stmt in &body.stmts {
                stmt_sites(stmt, out);
            }
        }
        Expr::Composite { ty, elts, .. } => {
            if let Some(ty) = ty {
                type_sites(ty, out);
            }
            for elt in elts {
                expr_sites(elt, out);
            }
        }
        Expr::KeyValue { key, value, .. } => {
            match &**key {
                Expr::Ident(id) => out.push(member(id)),
                other => expr_sites(other, out),
            }
            expr_sites(value, out);
        }
        Expr::Type(ty) => type_sites(ty, out),
    }
}

/// Types contribute package qualifiers (for aliasing) and array-length
/// expressions; type names themselves are never renamed.
fn type_sites(ty: &TypeExpr, out: &mut Vec<RefSite>) {
    match ty {
        TypeExpr::Name { pkg, args, .. } => {
            if let Some(pkg) = pkg {
                out.push(qualifier(pkg));
            }
            for arg in args {
                type_sites(arg, out);
            }
        }
        TypeExpr::Pointer { elem, .. }
        | TypeExpr::Chan { elem, .. }
        | TypeExpr::Ellipsis { elem, .. } => type_sites(elem, out),
        TypeExpr::Array { len, elem, .. } => {
            if let Some(len) = len {
                expr_sites(len, out);
            }
            type_sites(elem, out);
        }
        TypeExpr::Map { key, value, .. } => {
            type_sites(key, out);
            type_sites(value, out);
        }
        TypeExpr::Func {
            params, results, ..
        } => {
            for p in params.iter().chain(results.iter()) {
                type_sites(&p.ty, out);
            }
        }
        TypeExpr::Struct { fields, .. } => {
            for field in fields {
                type_sites(&field.ty, out);
            }
        }
        TypeExpr::Interface { elems, .. } => {
            for elem in elems {
                match elem {
                    crate::syntax::ast::InterfaceElem::Method {
                        params, results, ..
                    } => {
                        for p in params.iter().chain(results.iter()) {
                            type_sites(&p.ty, out);
                        }
                    }
                    crate::syntax::ast::InterfaceElem::Embedded(t) => type_sites(t, out),
                }
            }
        }
        TypeExpr::Paren { inner, .. } => type_sites(inner, out),
    }
}

/// Collect spans of const declaration blocks, including nested ones
fn collect_const_spans(decls: &[Decl], out: &mut Vec<Span>) {
    fn from_stmt(stmt: &Stmt, out: &mut Vec<Span>) {
        match stmt {
            Stmt::Decl(Decl::Value(v)) if v.kind == ValueKind::Const => out.push(v.span),
            Stmt::Block(b) => {
                for s in &b.stmts {
                    from_stmt(s, out);
                }
            }
            Stmt::If(s) => {
                for st in &s.body.stmts {
                    from_stmt(st, out);
                }
                if let Some(else_branch) = &s.else_branch {
                    from_stmt(else_branch, out);
                }
            }
            Stmt::For(s) => {
                for st in &s.body.stmts {
                    from_stmt(st, out);
                }
            }
            Stmt::Range(s) => {
                for st in &s.body.stmts {
                    from_stmt(st, out);
                }
            }
            _ => {}
        }
    }
    for decl in decls {
        match decl {
            Decl::Value(v) if v.kind == ValueKind::Const => out.push(v.span),
            Decl::Func(f) => {
                if let Some(body) = &f.body {
                    for stmt in &body.stmts {
                        from_stmt(stmt, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Collect every string literal in expression position
fn collect_string_literals<'a>(file: &'a File, out: &mut Vec<&'a crate::syntax::ast::Lit>) {
    fn from_expr<'a>(expr: &'a Expr, out: &mut Vec<&'a crate::syntax::ast::Lit>) {
        match expr {
            Expr::Lit(lit) if matches!(lit.kind, LitKind::Str | LitKind::RawStr) => out.push(lit),
            Expr::Lit(_) | Expr::Ident(_) | Expr::Type(_) => {}
            Expr::Selector { x, .. }
            | Expr::Star { x, .. }
            | Expr::Unary { x, .. }
            | Expr::Paren { x, .. }
            | Expr::TypeAssert { x, .. } => from_expr(x, out),
            Expr::Call { fun, args, .. } => {
                from_expr(fun, out);
                for arg in args {
                    from_expr(arg, out);
                }
            }
            Expr::Index { x, index, .. } => {
                from_expr(x, out);
                from_expr(index, out);
            }
            Expr::Slice {
                x, low, high, max, ..
            } => {
                from_expr(x, out);
                for bound in [low, high, max].into_iter().flatten() {
                    from_expr(bound, out);
                }
            }
            Expr::Binary { x, y, .. } => {
                from_expr(x, out);
                from_expr(y, out);
            }
            Expr::FuncLit { body, .. } => {
                for stmt in &body.stmts {
                    from_stmt(stmt, out);
                }
            }
            Expr::Composite { elts, .. } => {
                for elt in elts {
                    from_expr(elt, out);
                }
            }
            Expr::KeyValue { key, value, .. } => {
                from_expr(key, out);
                from_expr(value, out);
            }
        }
    }

    fn from_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<&'a crate::syntax::ast::Lit>) {
        let mut exprs = Vec::new();
        collect_stmt_exprs(stmt, &mut exprs);
        for e in exprs {
            from_expr(e, out);
        }
    }

    fn collect_stmt_exprs<'a>(stmt: &'a Stmt, out: &mut Vec<&'a Expr>) {
        match stmt {
            Stmt::Decl(Decl::Value(v)) => {
                for spec in &v.specs {
                    out.extend(spec.values.iter());
                }
            }
            Stmt::Decl(Decl::Func(f)) => {
                if let Some(body) = &f.body {
                    for s in &body.stmts {
                        collect_stmt_exprs(s, out);
                    }
                }
            }
            Stmt::Decl(Decl::Type(_)) | Stmt::Empty(_) | Stmt::Branch { .. } => {}
            Stmt::Labeled { stmt, .. } => collect_stmt_exprs(stmt, out),
            Stmt::Expr(e) => out.push(e),
            Stmt::Send { chan, value, .. } => {
                out.push(chan);
                out.push(value);
            }
            Stmt::IncDec { expr, .. } => out.push(expr),
            Stmt::Assign { lhs, rhs, .. } => {
                out.extend(lhs.iter().chain(rhs.iter()));
            }
            Stmt::Go { call, .. } | Stmt::Defer { call, .. } => out.push(call),
            Stmt::Return { results, .. } => out.extend(results.iter()),
            Stmt::Block(b) => {
                for s in &b.stmts {
                    collect_stmt_exprs(s, out);
                }
            }
            Stmt::If(s) => {
                if let Some(init) = &s.init {
                    collect_stmt_exprs(init, out);
                }
                out.push(&s.cond);
                for st in &s.body.stmts {
                    collect_stmt_exprs(st, out);
                }
                if let Some(else_branch) = &s.else_branch {
                    collect_stmt_exprs(else_branch, out);
                }
            }
            Stmt::Switch(s) => {
                if let Some(init) = &s.init {
                    collect_stmt_exprs(init, out);
                }
                if let Some(tag) = &s.tag {
                    out.push(tag);
                }
                for clause in &s.clauses {
                    out.extend(clause.exprs.iter());
                    for st in &clause.body {
                        collect_stmt_exprs(st, out);
                    }
                }
            }
            Stmt::TypeSwitch(s) => {
                if let Some(init) = &s.init {
                    collect_stmt_exprs(init, out);
                }
                out.push(&s.subject);
                for clause in &s.clauses {
                    for st in &clause.body {
                        collect_stmt_exprs(st, out);
                    }
                }
            }
            Stmt::Select(s) => {
                for clause in &s.clauses {
                    if let Some(comm) = &clause.comm {
                        collect_stmt_exprs(comm, out);
                    }
                    for st in &clause.body {
                        collect_stmt_exprs(st, out);
                    }
                }
            }
            Stmt::For(s) => {
                if let Some(init) = &s.init {
                    collect_stmt_exprs(init, out);
                }
                if let Some(cond) = &s.cond {
                    out.push(cond);
                }
                if let Some(post) = &s.post {
                    collect_stmt_exprs(post, out);
                }
                for st in &s.body.stmts {
                    collect_stmt_exprs(st, out);
                }
            }
            Stmt::Range(s) => {
                out.extend([&s.key, &s.value].into_iter().flatten());
                out.push(&s.subject);
                for st in &s.body.stmts {
                    collect_stmt_exprs(st, out);
                }
            }
        }
    }

    for decl in &file.decls {
        match decl {
            Decl::Func(f) => {
                if let Some(body) = &f.body {
                    for stmt in &body.stmts {
                        from_stmt(stmt, out);
                    }
                }
            }
            Decl::Value(v) => {
                for spec in &v.specs {
                    for value in &spec.values {
                        from_expr(value, out);
                    }
                }
            }
            Decl::Type(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::build_mapping;
    use crate::syntax::token::{lex, significant};

    struct Fixture {
        src: String,
        tokens: Vec<Tok>,
        file: File,
        tree: ScopeTree,
    }

    fn fixture(src: &str) -> Fixture {
        let tokens = lex(src).unwrap();
        let sig = significant(src, &tokens);
        let file = crate::syntax::parse_file(src, &sig).unwrap();
        let tree = ScopeTree::build(&file, src.len());
        Fixture {
            src: src.to_string(),
            tokens,
            file,
            tree,
        }
    }

    fn rewrite_with(
        fx: &Fixture,
        options: RewriteOptions,
        cipher: Option<&LiteralCipher>,
        aliases: &HashMap<String, String>,
        inject_helper: bool,
    ) -> RewriteOutcome {
        let classifier = Classifier::default();
        let mut protected = ProtectedSet::new();
        classifier.collect(&fx.file, None, &mut protected);
        let trees = std::slice::from_ref(&fx.tree);
        let mut gen = NameGenerator::new(11);
        let mapping = build_mapping(trees, &classifier, &protected, &mut gen);
        let rewriter = Rewriter::new(&mapping, &protected, &classifier, aliases, cipher, options);
        let ctx = FileContext {
            src: &fx.src,
            tokens: &fx.tokens,
            file: &fx.file,
            tree: &fx.tree,
            unit: 0,
        };
        rewriter.rewrite_file(&ctx, &mut gen, inject_helper)
    }

    #[test]
    fn test_renames_declaration_and_references() {
        let fx = fixture(
            "package main\n\nfunc helper() int { return 1 }\n\nfunc main() {\n\t_ = helper()\n}\n",
        );
        let out = rewrite_with(
            &fx,
            RewriteOptions::default(),
            None,
            &HashMap::new(),
            false,
        );
        assert!(!out.text.contains("helper"));
        assert!(out.text.contains("func main()"));
        assert!(out.renamed >= 2);
    }

    #[test]
    fn test_local_shadow_keeps_distinct_names() {
        let fx = fixture(
            "package x\n\nfunc transport() {}\n\nfunc other() {\n\ttransport := 1\n\t_ = transport\n\ttransport2()\n}\n\nfunc transport2() {}\n",
        );
        let out = rewrite_with(
            &fx,
            RewriteOptions::default(),
            None,
            &HashMap::new(),
            false,
        );
        assert!(!out.text.contains("transport"));
        // the local and the package function must not collapse to one name
        let fn_line = out
            .text
            .lines()
            .find(|l| l.starts_with("func fn"))
            .unwrap()
            .to_string();
        let fn_name: String = fn_line
            .trim_start_matches("func ")
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        let local_line = out.text.lines().find(|l| l.contains(":= 1")).unwrap();
        assert!(!local_line.contains(&fn_name));
    }

    #[test]
    fn test_unresolved_reference_unchanged() {
        // `sibling` is declared nowhere in this unit; with no name-map entry
        // it must survive verbatim
        let fx = fixture("package x\n\nfunc f() {\n\tsibling()\n}\n");
        let out = rewrite_with(
            &fx,
            RewriteOptions::default(),
            None,
            &HashMap::new(),
            false,
        );
        assert!(out.text.contains("sibling()"));
    }

    #[test]
    fn test_comment_stripping_preserves_directives() {
        let src = "package x\n\n//go:generate stringer -type=T\n// ordinary comment\nfunc f() { /* inline */ }\n";
        let fx = fixture(src);
        let out = rewrite_with(
            &fx,
            RewriteOptions::default(),
            None,
            &HashMap::new(),
            false,
        );
        assert!(out.text.contains("//go:generate stringer -type=T"));
        assert!(!out.text.contains("ordinary comment"));
        assert!(!out.text.contains("inline"));
    }

    #[test]
    fn test_import_aliasing_std_only() {
        let src = "package x\n\nimport (\n\t\"fmt\"\n\t\"github.com/pkg/errors\"\n)\n\nfunc f() {\n\tfmt.Println(errors.New(\"e\"))\n}\n";
        let fx = fixture(src);
        let mut aliases = HashMap::new();
        aliases.insert("fmt".to_string(), "pQw1x2y3z4".to_string());
        let out = rewrite_with(&fx, RewriteOptions::default(), None, &aliases, false);
        assert!(out.text.contains("pQw1x2y3z4 \"fmt\""));
        assert!(out.text.contains("pQw1x2y3z4.Println"));
        // third-party import and its references stay untouched
        assert!(out.text.contains("\"github.com/pkg/errors\""));
        assert!(out.text.contains("errors.New"));
    }

    #[test]
    fn test_alias_not_applied_to_shadowing_local() {
        let src = "package x\n\nimport \"fmt\"\n\nfunc f() {\n\tfmt.Println(1)\n\tfmt := 2\n\t_ = fmt\n}\n";
        let fx = fixture(src);
        let mut aliases = HashMap::new();
        aliases.insert("fmt".to_string(), "pAbCdEfGh".to_string());
        let out = rewrite_with(&fx, RewriteOptions::default(), None, &aliases, false);
        assert!(out.text.contains("import pAbCdEfGh \"fmt\""));
        // The call ahead of the shadowing `:=` still refers to the package
        // and is aliased; the local binding and its use stay untouched.
        assert!(out.text.contains("pAbCdEfGh.Println(1)"));
        assert!(out.text.contains("fmt := 2"));
        assert!(out.text.contains("_ = fmt"));
    }

    #[test]
    fn test_literal_encryption_and_exclusions() {
        let src = "package x\n\nimport \"fmt\"\n\nconst banner = \"unchanged\"\n\nfunc f() {\n\tfmt.Println(\"hello world\")\n\t_ = `raw stays`\n}\n";
        let fx = fixture(src);
        let cipher = LiteralCipher::with_key(vec![1, 2, 3, 4], "Qdec".to_string());
        let options = RewriteOptions {
            encrypt_strings: true,
            strip_comments: false,
            opaque_predicates: false,
        };
        let out = rewrite_with(&fx, options, Some(&cipher), &HashMap::new(), false);
        assert_eq!(out.encrypted, 1);
        assert!(!out.text.contains("\"hello world\""));
        assert!(out.text.contains("Qdec(\""));
        assert!(out.text.contains("\"unchanged\""));
        assert!(out.text.contains("`raw stays`"));
        assert!(out.text.contains("\"fmt\""));
    }

    #[test]
    fn test_helper_injected_once_with_import() {
        let src = "package x\n\nfunc f() string {\n\treturn \"top secret\"\n}\n";
        let fx = fixture(src);
        let cipher = LiteralCipher::with_key(vec![9, 9], "Qdec".to_string());
        let options = RewriteOptions {
            encrypt_strings: true,
            strip_comments: false,
            opaque_predicates: false,
        };
        let out = rewrite_with(&fx, options, Some(&cipher), &HashMap::new(), true);
        assert!(out.text.contains("\"encoding/base64\""));
        assert_eq!(out.text.matches("func Qdec(").count(), 1);
    }

    #[test]
    fn test_opaque_predicates_skip_main_and_short_bodies() {
        let src = "package main\n\nfunc main() {\n\twork()\n\twork()\n\twork()\n}\n\nfunc work() {\n\ta()\n\tb()\n\tc()\n}\n\nfunc tiny() { a() }\n";
        let fx = fixture(src);
        let options = RewriteOptions {
            opaque_predicates: true,
            strip_comments: false,
            encrypt_strings: false,
        };
        let out = rewrite_with(&fx, options, None, &HashMap::new(), false);
        // exactly one function is eligible
        assert_eq!(out.text.matches(":= 42").count(), 1);
        assert!(out.text.contains(">= 0 {"));
    }

    #[test]
    fn test_directive_tagged_function_not_injected() {
        let src = "package x\n\n//go:noinline\nfunc hot() {\n\ta()\n\tb()\n\tc()\n}\n";
        let fx = fixture(src);
        let options = RewriteOptions {
            opaque_predicates: true,
            strip_comments: false,
            encrypt_strings: false,
        };
        let out = rewrite_with(&fx, options, None, &HashMap::new(), false);
        assert!(!out.text.contains(":= 42"));
    }

    #[test]
    fn test_edits_apply_back_to_front() {
        let edits = vec![
            Edit {
                start: 0,
                end: 1,
                text: "XX".to_string(),
            },
            Edit {
                start: 2,
                end: 3,
                text: "Y".to_string(),
            },
        ];
        assert_eq!(apply_edits("abcd", edits), "XXbYd");
    }

    #[test]
    fn test_overlapping_edits_dropped() {
        let edits = vec![
            Edit {
                start: 0,
                end: 3,
                text: "A".to_string(),
            },
            Edit {
                start: 1,
                end: 2,
                text: "B".to_string(),
            },
        ];
        assert_eq!(apply_edits("abcd", edits), "Ad");
    }
}
