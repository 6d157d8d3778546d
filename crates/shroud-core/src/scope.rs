//! Lexical scope analysis and declaration tracking.
//!
//! One [`ScopeTree`] is built per parsed file. Scopes and declared objects
//! live in flat arenas addressed by [`ScopeId`] and [`ObjectId`] handles, so
//! a declaration's identity is a stable integer rather than a pointer, and
//! the frozen tree can be shared immutably across the mapping and rewrite
//! phases.
//!
//! Resolution walks from the innermost scope containing a position outward
//! to the file scope. It never descends into sibling scopes, so a local in
//! one function can never capture a reference made in another.

use crate::syntax::ast::{
    Block, CommClause, Decl, Expr, File, FuncDecl, Param, Span, Stmt, TypeExpr, ValueKind,
};
use std::collections::HashMap;

/// Handle of a scope within its [`ScopeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// Handle of a declared object within its [`ScopeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

/// What kind of declaration an object is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Package-level or nested function
    Func,
    /// Variable, parameter, receiver, or range binding
    Var,
    /// Constant
    Const,
    /// Named type
    Type,
}

/// A single declaration occurrence
#[derive(Debug, Clone)]
pub struct Object {
    /// Declared name
    pub name: String,
    /// Declaration kind
    pub kind: ObjectKind,
    /// Export flag, derived from the leading character case
    pub exported: bool,
    /// Span of the declaring identifier
    pub span: Span,
    /// Owning scope
    pub scope: ScopeId,
    /// Byte position from which the binding is visible. A short variable
    /// declaration shadows only from the end of its statement; a reference
    /// before that point still sees the outer binding.
    pub visible_from: usize,
}

/// One lexical scope
#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    names: HashMap<String, ObjectId>,
    span: Span,
}

/// Scope tree and object arena for one file
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    objects: Vec<Object>,
    file_scope: ScopeId,
}

impl ScopeTree {
    /// Build the scope tree for a parsed file.
    pub fn build(file: &File, source_len: usize) -> Self {
        let mut builder = Builder::new(source_len);
        builder.walk_file(file);
        builder.tree
    }

    /// The file-root scope
    pub fn file_scope(&self) -> ScopeId {
        self.file_scope
    }

    /// Access an object by handle
    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.0 as usize]
    }

    /// Iterate over all objects with their handles
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, obj)| (ObjectId(i as u32), obj))
    }

    /// Objects declared directly in the file-root scope
    pub fn file_scope_objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.scopes[self.file_scope.0 as usize]
            .names
            .values()
            .map(|&id| (id, self.object(id)))
    }

    /// Look a name up in the file-root scope only, without recursing
    pub fn lookup_file_scope(&self, name: &str) -> Option<ObjectId> {
        self.scopes[self.file_scope.0 as usize]
            .names
            .get(name)
            .copied()
    }

    /// The innermost scope whose span contains `pos`
    pub fn scope_at(&self, pos: usize) -> ScopeId {
        let mut current = self.file_scope;
        'descend: loop {
            for &child in &self.scopes[current.0 as usize].children {
                if self.scopes[child.0 as usize].span.contains(pos) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Resolve a reference to `name` at byte position `pos`.
    ///
    /// Searches the innermost enclosing scope and ascends through parents;
    /// returns `None` when no enclosing scope declares the name, signaling
    /// the caller to fall back to the flat name-keyed mapping.
    ///
    /// Package-level bindings are visible file-wide; everything else is
    /// visible only from its declaration onward, so a reference ahead of a
    /// shadowing `:=` still resolves to the outer binding.
    pub fn resolve(&self, name: &str, pos: usize) -> Option<ObjectId> {
        let mut current = Some(self.scope_at(pos));
        while let Some(id) = current {
            let scope = &self.scopes[id.0 as usize];
            if let Some(&obj_id) = scope.names.get(name) {
                let obj = self.object(obj_id);
                let visible = id == self.file_scope
                    || obj.span.contains(pos)
                    || pos >= obj.visible_from;
                if visible {
                    return Some(obj_id);
                }
            }
            current = scope.parent;
        }
        None
    }
}

struct Builder {
    tree: ScopeTree,
    current: ScopeId,
}

impl Builder {
    fn new(source_len: usize) -> Self {
        let file_scope = Scope {
            parent: None,
            children: Vec::new(),
            names: HashMap::new(),
            span: Span::new(0, source_len),
        };
        let tree = ScopeTree {
            scopes: vec![file_scope],
            objects: Vec::new(),
            file_scope: ScopeId(0),
        };
        Self {
            tree,
            current: ScopeId(0),
        }
    }

    fn enter(&mut self, span: Span) -> ScopeId {
        let id = ScopeId(self.tree.scopes.len() as u32);
        self.tree.scopes.push(Scope {
            parent: Some(self.current),
            children: Vec::new(),
            names: HashMap::new(),
            span,
        });
        self.tree.scopes[self.current.0 as usize].children.push(id);
        self.current = id;
        id
    }

    fn leave(&mut self) {
        if let Some(parent) = self.tree.scopes[self.current.0 as usize].parent {
            self.current = parent;
        }
    }

    fn declare(&mut self, name: &str, kind: ObjectKind, span: Span, visible_from: usize) {
        if name == "_" {
            return;
        }
        // A `:=` that mentions an already-declared name in the same scope
        // reuses that binding rather than declaring a second one
        if self.tree.scopes[self.current.0 as usize]
            .names
            .contains_key(name)
        {
            return;
        }
        let exported = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        let id = ObjectId(self.tree.objects.len() as u32);
        self.tree.objects.push(Object {
            name: name.to_string(),
            kind,
            exported,
            span,
            scope: self.current,
            visible_from,
        });
        self.tree.scopes[self.current.0 as usize]
            .names
            .insert(name.to_string(), id);
    }

    fn walk_file(&mut self, file: &File) {
        for decl in &file.decls {
            self.walk_decl(decl);
        }
    }

    fn walk_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Func(f) => self.walk_func(f),
            Decl::Type(t) => {
                for spec in &t.specs {
                    self.declare(&spec.name.name, ObjectKind::Type, spec.name.span, spec.span.end);
                }
            }
            Decl::Value(v) => {
                let kind = match v.kind {
                    ValueKind::Var => ObjectKind::Var,
                    ValueKind::Const => ObjectKind::Const,
                };
                for spec in &v.specs {
                    for name in &spec.names {
                        self.declare(&name.name, kind, name.span, spec.span.end);
                    }
                    for value in &spec.values {
                        self.walk_expr(value);
                    }
                }
            }
        }
    }

    fn walk_func(&mut self, f: &FuncDecl) {
        // Methods are resolved through their receiver, not the file scope
        if f.receiver.is_none() {
            self.declare(&f.name.name, ObjectKind::Func, f.name.span, 0);
        }
        self.enter(f.span);
        if let Some(recv) = &f.receiver {
            self.declare_params(std::slice::from_ref(recv), f.span.start);
        }
        self.declare_params(&f.params, f.span.start);
        self.declare_params(&f.results, f.span.start);
        if let Some(body) = &f.body {
            for stmt in &body.stmts {
                self.walk_stmt(stmt);
            }
        }
        self.leave();
    }

    fn declare_params(&mut self, params: &[Param], visible_from: usize) {
        for param in params {
            for name in &param.names {
                self.declare(&name.name, ObjectKind::Var, name.span, visible_from);
            }
        }
    }

    fn walk_block(&mut self, block: &Block) {
        self.enter(block.span);
        for stmt in &block.stmts {
            self.walk_stmt(stmt);
        }
        self.leave();
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(d) => self.walk_decl(d),
            Stmt::Empty(_) | Stmt::Branch { .. } => {}
            Stmt::Labeled { stmt, .. } => self.walk_stmt(stmt),
            Stmt::Expr(e) => self.walk_expr(e),
            Stmt::Send { chan, value, .. } => {
                self.walk_expr(chan);
                self.walk_expr(value);
            }
            Stmt::IncDec { expr, .. } => self.walk_expr(expr),
            Stmt::Assign {
                lhs,
                rhs,
                define,
                span,
            } => {
                for value in rhs {
                    self.walk_expr(value);
                }
                if *define {
                    for target in lhs {
                        if let Expr::Ident(id) = target {
                            self.declare(&id.name, ObjectKind::Var, id.span, span.end);
                        }
                    }
                } else {
                    for target in lhs {
                        self.walk_expr(target);
                    }
                }
            }
            Stmt::Go { call, .. } | Stmt::Defer { call, .. } => self.walk_expr(call),
            Stmt::Return { results, .. } => {
                for r in results {
                    self.walk_expr(r);
                }
            }
            Stmt::Block(b) => self.walk_block(b),
            Stmt::If(s) => {
                self.enter(s.span);
                if let Some(init) = &s.init {
                    self.walk_stmt(init);
                }
                self.walk_expr(&s.cond);
                self.walk_block(&s.body);
                if let Some(else_branch) = &s.else_branch {
                    self.walk_stmt(else_branch);
                }
                self.leave();
            }
            Stmt::Switch(s) => {
                self.enter(s.span);
                if let Some(init) = &s.init {
                    self.walk_stmt(init);
                }
                if let Some(tag) = &s.tag {
                    self.walk_expr(tag);
                }
                for clause in &s.clauses {
                    self.enter(clause.span);
                    for e in &clause.exprs {
                        self.walk_expr(e);
                    }
                    for st in &clause.body {
                        self.walk_stmt(st);
                    }
                    self.leave();
                }
                self.leave();
            }
            Stmt::TypeSwitch(s) => {
                self.enter(s.span);
                if let Some(init) = &s.init {
                    self.walk_stmt(init);
                }
                if let Some(binding) = &s.binding {
                    self.declare(&binding.name, ObjectKind::Var, binding.span, binding.span.end);
                }
                self.walk_expr(&s.subject);
                for clause in &s.clauses {
                    self.enter(clause.span);
                    for st in &clause.body {
                        self.walk_stmt(st);
                    }
                    self.leave();
                }
                self.leave();
            }
            Stmt::Select(s) => {
                for clause in &s.clauses {
                    self.enter(clause.span);
                    self.walk_comm(clause);
                    self.leave();
                }
            }
            Stmt::For(s) => {
                self.enter(s.span);
                if let Some(init) = &s.init {
                    self.walk_stmt(init);
                }
                if let Some(cond) = &s.cond {
                    self.walk_expr(cond);
                }
                if let Some(post) = &s.post {
                    self.walk_stmt(post);
                }
                self.walk_block(&s.body);
                self.leave();
            }
            Stmt::Range(s) => {
                self.enter(s.span);
                self.walk_expr(&s.subject);
                if s.define {
                    for binding in [&s.key, &s.value].into_iter().flatten() {
                        if let Expr::Ident(id) = binding {
                            self.declare(&id.name, ObjectKind::Var, id.span, s.body.span.start);
                        }
                    }
                } else {
                    for target in [&s.key, &s.value].into_iter().flatten() {
                        self.walk_expr(target);
                    }
                }
                self.walk_block(&s.body);
                self.leave();
            }
        }
    }

    fn walk_comm(&mut self, clause: &CommClause) {
        if let Some(comm) = &clause.comm {
            self.walk_stmt(comm);
        }
        for stmt in &clause.body {
            self.walk_stmt(stmt);
        }
    }

    /// Walk initializer expressions for nested binding sites (closures).
    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::FuncLit {
                params,
                results,
                body,
                span,
            } => {
                self.enter(*span);
                self.declare_params(params, span.start);
                self.declare_params(results, span.start);
                for stmt in &body.stmts {
                    self.walk_stmt(stmt);
                }
                self.leave();
            }
            Expr::Ident(_) | Expr::Lit(_) | Expr::Type(_) => {}
            Expr::Selector { x, .. } | Expr::Star { x, .. } | Expr::Unary { x, .. }
            | Expr::Paren { x, .. } => self.walk_expr(x),
            Expr::Call { fun, args, .. } => {
                self.walk_expr(fun);
                for arg in args {
                    self.walk_expr(arg);
                }
            }
            Expr::Index { x, index, .. } => {
                self.walk_expr(x);
                self.walk_expr(index);
            }
            Expr::Slice {
                x, low, high, max, ..
            } => {
                self.walk_expr(x);
                for bound in [low, high, max].into_iter().flatten() {
                    self.walk_expr(bound);
                }
            }
            Expr::TypeAssert { x, .. } => self.walk_expr(x),
            Expr::Binary { x, y, .. } => {
                self.walk_expr(x);
                self.walk_expr(y);
            }
            Expr::Composite { elts, .. } => {
                for elt in elts {
                    self.walk_expr(elt);
                }
            }
            Expr::KeyValue { value, .. } => {
                // Keys are field names or constants, not binding sites
                self.walk_expr(value);
            }
        }
    }
}

/// Walk every type expression reachable from a declaration.
///
/// Used by the classifier to find struct fields and interface methods in
/// nested positions (a struct inside a map value, a func type result).
pub fn visit_types<'a>(decl: &'a Decl, visit: &mut dyn FnMut(&'a TypeExpr)) {
    fn type_expr<'a>(ty: &'a TypeExpr, visit: &mut dyn FnMut(&'a TypeExpr)) {
        visit(ty);
        match ty {
            TypeExpr::Name { args, .. } => {
                for arg in args {
                    type_expr(arg, visit);
                }
            }
            TypeExpr::Pointer { elem, .. }
            | TypeExpr::Array { elem, .. }
            | TypeExpr::Chan { elem, .. }
            | TypeExpr::Ellipsis { elem, .. } => type_expr(elem, visit),
            TypeExpr::Map { key, value, .. } => {
                type_expr(key, visit);
                type_expr(value, visit);
            }
            TypeExpr::Func {
                params, results, ..
            } => {
                for p in params.iter().chain(results) {
                    type_expr(&p.ty, visit);
                }
            }
            TypeExpr::Struct { fields, .. } => {
                for f in fields {
                    type_expr(&f.ty, visit);
                }
            }
            TypeExpr::Interface { elems, .. } => {
                for elem in elems {
                    match elem {
                        crate::syntax::ast::InterfaceElem::Method {
                            params, results, ..
                        } => {
                            for p in params.iter().chain(results) {
                                type_expr(&p.ty, visit);
                            }
                        }
                        crate::syntax::ast::InterfaceElem::Embedded(t) => type_expr(t, visit),
                    }
                }
            }
            TypeExpr::Paren { inner, .. } => type_expr(inner, visit),
        }
    }

    match decl {
        Decl::Func(f) => {
            for p in f
                .receiver
                .iter()
                .chain(f.params.iter())
                .chain(f.results.iter())
            {
                type_expr(&p.ty, visit);
            }
        }
        Decl::Type(t) => {
            for spec in &t.specs {
                type_expr(&spec.ty, visit);
            }
        }
        Decl::Value(v) => {
            for spec in &v.specs {
                if let Some(ty) = &spec.ty {
                    type_expr(ty, visit);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::token::{lex, significant};

    fn tree_for(src: &str) -> ScopeTree {
        let toks = lex(src).unwrap();
        let sig = significant(src, &toks);
        let file = crate::syntax::parse_file(src, &sig).unwrap();
        ScopeTree::build(&file, src.len())
    }

    #[test]
    fn test_package_level_declarations() {
        let src = "package x\n\nvar count int\nconst limit = 10\nfunc run() {}\ntype Server struct{}\n";
        let tree = tree_for(src);
        let names: Vec<_> = tree
            .file_scope_objects()
            .map(|(_, o)| (o.name.clone(), o.kind))
            .collect();
        assert!(names.contains(&("count".to_string(), ObjectKind::Var)));
        assert!(names.contains(&("limit".to_string(), ObjectKind::Const)));
        assert!(names.contains(&("run".to_string(), ObjectKind::Func)));
        assert!(names.contains(&("Server".to_string(), ObjectKind::Type)));
    }

    #[test]
    fn test_method_name_not_in_file_scope() {
        let src = "package x\ntype S struct{}\nfunc (s S) Close() {}\n";
        let tree = tree_for(src);
        assert!(tree.lookup_file_scope("Close").is_none());
        assert!(tree.lookup_file_scope("S").is_some());
    }

    #[test]
    fn test_local_shadows_package_level() {
        let src = "package x\nvar conn int\nfunc f() {\n\tconn := \"local\"\n\t_ = conn\n}\n";
        let tree = tree_for(src);
        let pkg_obj = tree.lookup_file_scope("conn").unwrap();

        // At the use site the local declaration wins
        let local_pos = src.find("_ = conn").unwrap() + 4;
        let resolved = tree.resolve("conn", local_pos).unwrap();
        assert_ne!(resolved, pkg_obj);
        assert_eq!(tree.object(resolved).kind, ObjectKind::Var);

        // At package level the package object wins
        let resolved_pkg = tree.resolve("conn", src.find("var conn").unwrap()).unwrap();
        assert_eq!(resolved_pkg, pkg_obj);
    }

    #[test]
    fn test_sibling_scopes_do_not_leak() {
        let src = "package x\nfunc a() {\n\tsecret := 1\n\t_ = secret\n}\nfunc b() {\n\t_ = 2\n}\n";
        let tree = tree_for(src);
        let in_b = src.find("_ = 2").unwrap();
        assert!(tree.resolve("secret", in_b).is_none());
    }

    #[test]
    fn test_range_and_param_bindings() {
        let src = "package x\nfunc f(items []int) {\n\tfor i, v := range items {\n\t\t_ = i + v\n\t}\n}\n";
        let tree = tree_for(src);
        let inside = src.find("_ = i").unwrap();
        assert!(tree.resolve("i", inside).is_some());
        assert!(tree.resolve("v", inside).is_some());
        assert!(tree.resolve("items", inside).is_some());
    }

    #[test]
    fn test_unresolved_reference() {
        let src = "package x\nfunc f() {\n\t_ = helper()\n}\n";
        let tree = tree_for(src);
        let pos = src.find("helper").unwrap();
        assert!(tree.resolve("helper", pos).is_none());
    }

    #[test]
    fn test_shadow_visible_only_after_declaration() {
        let src = "package x\nvar mode = 1\nfunc f() {\n\t_ = mode\n\tmode := 2\n\t_ = mode\n}\n";
        let tree = tree_for(src);
        let pkg_obj = tree.lookup_file_scope("mode").unwrap();

        // Before the `:=` the package binding is still the one in scope
        let before = src.find("_ = mode").unwrap() + 4;
        assert_eq!(tree.resolve("mode", before), Some(pkg_obj));

        // After it, the local wins
        let after = src.rfind("_ = mode").unwrap() + 4;
        let resolved = tree.resolve("mode", after).unwrap();
        assert_ne!(resolved, pkg_obj);
    }

    #[test]
    fn test_redeclared_name_reuses_binding() {
        // `err` mentioned by two `:=` statements in one scope is a single
        // binding, not two
        let src = "package x\nfunc f() {\n\ta, err := g()\n\tb, err := h()\n\t_ = a\n\t_ = b\n\t_ = err\n}\n";
        let tree = tree_for(src);
        let first_decl = src.find("err").unwrap();
        let second_decl = src.rfind("err :=").unwrap();
        let use_pos = src.rfind("err").unwrap();
        let at_first = tree.resolve("err", first_decl).unwrap();
        let at_second = tree.resolve("err", second_decl).unwrap();
        let at_use = tree.resolve("err", use_pos).unwrap();
        assert_eq!(at_first, at_second);
        assert_eq!(at_first, at_use);
    }

    #[test]
    fn test_blank_identifier_not_declared() {
        let src = "package x\nfunc f() {\n\t_, err := pair()\n\t_ = err\n}\n";
        let tree = tree_for(src);
        let pos = src.find("= err").unwrap();
        assert!(tree.resolve("_", pos).is_none());
        assert!(tree.resolve("err", pos).is_some());
    }
}
