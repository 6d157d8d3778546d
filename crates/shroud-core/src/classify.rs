//! Protected-name classification.
//!
//! Decides which identifiers must never be renamed. Verdicts come from a
//! strict priority order, first match wins:
//!
//! 1. reserved keywords and predeclared builtins
//! 2. the entry point, initialization hooks, and the discard identifier
//! 3. exported names, while export renaming is disabled
//! 4. structural roles: struct fields, embedded field type names, interface
//!    methods, method names, selector targets on external packages
//! 5. reflection/serialization context: a unit importing `reflect` protects
//!    everything it declares; a unit importing a structured encoder protects
//!    untagged fields (a field with an explicit serialized-name tag may be
//!    renamed, once field renaming is enabled at all)
//! 6. user-supplied names
//!
//! Rules 4–6 accumulate into the run-wide [`ProtectedSet`] during the
//! collection pass; once a name is in the set it stays protected no matter
//! which file asserted it.

use crate::scope::visit_types;
use crate::syntax::ast::{Decl, Expr, File, InterfaceElem, Stmt, TypeExpr};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Go reserved keywords
pub const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var",
];

/// Predeclared types, functions, and constants
pub const GO_BUILTINS: &[&str] = &[
    "any", "append", "bool", "byte", "cap", "clear", "close", "comparable", "complex",
    "complex64", "complex128", "copy", "delete", "error", "false", "float32", "float64",
    "imag", "int", "int8", "int16", "int32", "int64", "iota", "len", "make", "max", "min",
    "new", "nil", "panic", "print", "println", "real", "recover", "rune", "string", "true",
    "uint", "uint8", "uint16", "uint32", "uint64", "uintptr",
];

/// Run-wide set of names forbidden from renaming.
///
/// Populated during collection, read-only afterward.
#[derive(Debug, Default)]
pub struct ProtectedSet {
    names: HashSet<String>,
}

impl ProtectedSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a name to the set
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Whether the set contains `name`
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of protected names collected so far
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no names have been collected
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Classification policy derived from the run configuration
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    /// Allow renaming exported identifiers (breaking change, default off)
    pub rename_exported: bool,
    /// Allow renaming struct fields at all (default off); without this,
    /// rule 4 protects every field and the tag exception is moot
    pub rename_fields: bool,
    /// Protect declarations in reflection-using units (default on)
    pub guard_reflection: bool,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            rename_exported: false,
            rename_fields: false,
            guard_reflection: true,
        }
    }
}

impl Classifier {
    /// The protection verdict for a single name.
    ///
    /// Pure and order-independent: the verdict depends only on the name, the
    /// policy, and the accumulated set.
    pub fn is_protected(&self, name: &str, set: &ProtectedSet) -> bool {
        // (1) keywords and predeclared identifiers
        if GO_KEYWORDS.contains(&name) || GO_BUILTINS.contains(&name) {
            return true;
        }
        // (2) entry point, init hooks, discard
        if name == "main" || name == "init" || name == "_" {
            return true;
        }
        // (3) exported names under the default policy
        if !self.rename_exported
            && name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        {
            return true;
        }
        // (4)-(6) accumulated structural, reflection, and user entries
        set.contains(name)
    }

    /// Collect structural and context protections from one file.
    ///
    /// `module_path` is the project's own module path, used to recognize
    /// selectors into project-internal packages (which stay renamable).
    pub fn collect(&self, file: &File, module_path: Option<&str>, set: &mut ProtectedSet) {
        // Import local names are package identifiers, never renamable
        let mut import_paths: HashMap<&str, &str> = HashMap::new();
        for import in &file.imports {
            if let Some(local) = import.local_name() {
                set.insert(local);
                import_paths.insert(local, import.path_value());
            }
        }

        let uses_reflection = self.guard_reflection
            && file
                .imports
                .iter()
                .any(|i| i.path_value().contains("reflect"));
        let uses_encoding = self.guard_reflection
            && file.imports.iter().any(|i| {
                let path = i.path_value();
                path.contains("encoding/json")
                    || path.contains("encoding/xml")
                    || path.contains("gopkg.in/yaml")
            });

        for decl in &file.decls {
            // (4) method names
            if let Decl::Func(f) = decl {
                if f.receiver.is_some() {
                    set.insert(f.name.name.clone());
                }
            }

            // (5) every type declared in a reflection-using unit
            if uses_reflection {
                if let Decl::Type(t) = decl {
                    for spec in &t.specs {
                        set.insert(spec.name.name.clone());
                    }
                }
            }

            // (4)+(5) fields and interface methods, wherever a struct or
            // interface type appears in the declaration
            visit_types(decl, &mut |ty| match ty {
                TypeExpr::Struct { fields, .. } => {
                    for field in fields {
                        for name in &field.names {
                            let tagged = field
                                .tag
                                .as_ref()
                                .and_then(|t| t.str_content())
                                .is_some_and(|t| {
                                    t.contains("json:") || t.contains("xml:") || t.contains("yaml:")
                                });
                            let structural = !self.rename_fields;
                            let reflective = uses_reflection || (uses_encoding && !tagged);
                            if structural || reflective {
                                set.insert(name.name.clone());
                            }
                        }
                        if let Some(embedded) = field.embedded_name() {
                            set.insert(embedded.name.clone());
                        }
                    }
                }
                TypeExpr::Interface { elems, .. } => {
                    for elem in elems {
                        if let InterfaceElem::Method { name, .. } = elem {
                            set.insert(name.name.clone());
                        }
                    }
                }
                _ => {}
            });
        }

        // (4) selector targets that resolve into external or standard
        // packages; selectors into the project's own packages stay renamable
        let count_before = set.len();
        collect_selector_targets(file, &import_paths, module_path, set);
        debug!(
            file = %file.package.name,
            selectors = set.len() - count_before,
            "collected protected selector targets"
        );
    }
}

/// Whether an import path belongs to the standard library.
///
/// Standard packages have no dot in their first path component; hosted
/// third-party modules start with a domain.
pub fn is_standard_library(path: &str) -> bool {
    if path.starts_with("internal/") || path.starts_with("vendor/") {
        return true;
    }
    let first = path.split('/').next().unwrap_or(path);
    !first.contains('.')
}

fn is_project_path(path: &str, module_path: Option<&str>) -> bool {
    match module_path {
        Some(module) => path == module || path.starts_with(&format!("{module}/")),
        None => false,
    }
}

fn collect_selector_targets(
    file: &File,
    import_paths: &HashMap<&str, &str>,
    module_path: Option<&str>,
    set: &mut ProtectedSet,
) {
    fn walk_expr(
        expr: &Expr,
        import_paths: &HashMap<&str, &str>,
        module_path: Option<&str>,
        set: &mut ProtectedSet,
    ) {
        if let Expr::Selector { x, sel, .. } = expr {
            // A selector into a project-internal package is a cross-file
            // reference to a renamable declaration. Everything else --
            // std/external packages, struct members, chained selectors --
            // is protected.
            let internal = match &**x {
                Expr::Ident(base) => import_paths
                    .get(base.name.as_str())
                    .is_some_and(|path| is_project_path(path, module_path)),
                _ => false,
            };
            if !internal {
                set.insert(sel.name.clone());
            }
        }
        for child in expr_children(expr) {
            walk_expr(child, import_paths, module_path, set);
        }
    }

    fn expr_children(expr: &Expr) -> Vec<&Expr> {
        match expr {
            Expr::Ident(_) | Expr::Lit(_) | Expr::Type(_) => Vec::new(),
            Expr::Selector { x, .. }
            | Expr::Star { x, .. }
            | Expr::Unary { x, .. }
            | Expr::Paren { x, .. }
            | Expr::TypeAssert { x, .. } => vec![x],
            Expr::Call { fun, args, .. } => {
                let mut v = vec![&**fun];
                v.extend(args.iter());
                v
            }
            Expr::Index { x, index, .. } => vec![x, index],
            Expr::Slice {
                x, low, high, max, ..
            } => {
                let mut v = vec![&**x];
                v.extend([low, high, max].into_iter().flatten().map(|b| &**b));
                v
            }
            Expr::Binary { x, y, .. } => vec![x, y],
            Expr::FuncLit { body, .. } => {
                let mut v = Vec::new();
                for stmt in &body.stmts {
                    stmt_exprs(stmt, &mut v);
                }
                v
            }
            Expr::Composite { elts, .. } => elts.iter().collect(),
            Expr::KeyValue { key, value, .. } => vec![key, value],
        }
    }

    fn stmt_exprs<'a>(stmt: &'a Stmt, out: &mut Vec<&'a Expr>) {
        match stmt {
            Stmt::Decl(d) => decl_exprs(d, out),
            Stmt::Empty(_) | Stmt::Branch { .. } => {}
            Stmt::Labeled { stmt, .. } => stmt_exprs(stmt, out),
            Stmt::Expr(e) => out.push(e),
            Stmt::Send { chan, value, .. } => {
                out.push(chan);
                out.push(value);
            }
            Stmt::IncDec { expr, .. } => out.push(expr),
            Stmt::Assign { lhs, rhs, .. } => {
                out.extend(lhs.iter());
                out.extend(rhs.iter());
            }
            Stmt::Go { call, .. } | Stmt::Defer { call, .. } => out.push(call),
            Stmt::Return { results, .. } => out.extend(results.iter()),
            Stmt::Block(b) => {
                for s in &b.stmts {
                    stmt_exprs(s, out);
                }
            }
            Stmt::If(s) => {
                if let Some(init) = &s.init {
                    stmt_exprs(init, out);
                }
                out.push(&s.cond);
                for st in &s.body.stmts {
                    stmt_exprs(st, out);
                }
                if let Some(else_branch) = &s.else_branch {
                    stmt_exprs(else_branch, out);
                }
            }
            Stmt::Switch(s) => {
                if let Some(init) = &s.init {
                    stmt_exprs(init, out);
                }
                if let Some(tag) = &s.tag {
                    out.push(tag);
                }
                for clause in &s.clauses {
                    out.extend(clause.exprs.iter());
                    for st in &clause.body {
                        stmt_exprs(st, out);
                    }
                }
            }
            Stmt::TypeSwitch(s) => {
                if let Some(init) = &s.init {
                    stmt_exprs(init, out);
                }
                out.push(&s.subject);
                for clause in &s.clauses {
                    for st in &clause.body {
                        stmt_exprs(st, out);
                    }
                }
            }
            Stmt::Select(s) => {
                for clause in &s.clauses {
                    if let Some(comm) = &clause.comm {
                        stmt_exprs(comm, out);
                    }
                    for st in &clause.body {
                        stmt_exprs(st, out);
                    }
                }
            }
            Stmt::For(s) => {
                if let Some(init) = &s.init {
                    stmt_exprs(init, out);
                }
                if let Some(cond) = &s.cond {
                    out.push(cond);
                }
                if let Some(post) = &s.post {
                    stmt_exprs(post, out);
                }
                for st in &s.body.stmts {
                    stmt_exprs(st, out);
                }
            }
            Stmt::Range(s) => {
                out.extend([&s.key, &s.value].into_iter().flatten());
                out.push(&s.subject);
                for st in &s.body.stmts {
                    stmt_exprs(st, out);
                }
            }
        }
    }

    fn decl_exprs<'a>(decl: &'a Decl, out: &mut Vec<&'a Expr>) {
        match decl {
            Decl::Func(f) => {
                if let Some(body) = &f.body {
                    for stmt in &body.stmts {
                        stmt_exprs(stmt, out);
                    }
                }
            }
            Decl::Type(_) => {}
            Decl::Value(v) => {
                for spec in &v.specs {
                    out.extend(spec.values.iter());
                }
            }
        }
    }

    let mut roots = Vec::new();
    for decl in &file.decls {
        decl_exprs(decl, &mut roots);
    }
    for root in roots {
        walk_expr(root, import_paths, module_path, set);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::token::{lex, significant};

    fn parse(src: &str) -> File {
        let toks = lex(src).unwrap();
        let sig = significant(src, &toks);
        crate::syntax::parse_file(src, &sig).unwrap()
    }

    #[test]
    fn test_keywords_and_builtins_protected() {
        let classifier = Classifier::default();
        let set = ProtectedSet::new();
        for name in ["func", "range", "error", "len", "iota", "nil"] {
            assert!(classifier.is_protected(name, &set), "{name}");
        }
    }

    #[test]
    fn test_entry_points_protected() {
        let classifier = Classifier {
            rename_exported: true,
            ..Classifier::default()
        };
        let set = ProtectedSet::new();
        assert!(classifier.is_protected("main", &set));
        assert!(classifier.is_protected("init", &set));
        assert!(classifier.is_protected("_", &set));
    }

    #[test]
    fn test_exported_policy() {
        let set = ProtectedSet::new();
        let default = Classifier::default();
        assert!(default.is_protected("Connect", &set));
        assert!(!default.is_protected("connect", &set));

        let renaming = Classifier {
            rename_exported: true,
            ..Classifier::default()
        };
        assert!(!renaming.is_protected("Connect", &set));
    }

    #[test]
    fn test_struct_fields_and_methods_collected() {
        let src = "package x\n\ntype Conn struct {\n\taddr string\n\tio.Reader\n}\n\nfunc (c *Conn) dial() {}\n";
        let mut set = ProtectedSet::new();
        Classifier::default().collect(&parse(src), None, &mut set);
        assert!(set.contains("addr"));
        assert!(set.contains("Reader"));
        assert!(set.contains("dial"));
        // the type name itself is handled by the mapping builder, not here
        assert!(!set.contains("Conn"));
    }

    #[test]
    fn test_selector_targets_protected_unless_internal() {
        let src = "package x\n\nimport (\n\t\"fmt\"\n\t\"example.com/app/util\"\n)\n\nfunc f() {\n\tfmt.Println(util.Helper())\n}\n";
        let mut set = ProtectedSet::new();
        Classifier::default().collect(&parse(src), Some("example.com/app"), &mut set);
        assert!(set.contains("Println"));
        assert!(!set.contains("Helper"));
    }

    #[test]
    fn test_reflection_unit_protects_declarations() {
        let src = "package x\n\nimport \"reflect\"\n\ntype payload struct {\n\tvalue int `json:\"value\"`\n}\n\nfunc (p payload) touch() {}\n\nfunc f() { reflect.TypeOf(1) }\n";
        let mut set = ProtectedSet::new();
        let classifier = Classifier {
            rename_fields: true,
            ..Classifier::default()
        };
        classifier.collect(&parse(src), None, &mut set);
        assert!(set.contains("payload"));
        assert!(set.contains("value"));
        assert!(set.contains("touch"));
    }

    #[test]
    fn test_tagged_field_renamable_untagged_not() {
        // `Token` carries a serialized-name tag, `Secret` does not
        let src = "package x\n\nimport \"encoding/json\"\n\ntype Creds struct {\n\tToken string `json:\"token\"`\n\tSecret string\n}\n\nvar _ = json.Marshal\n";
        let mut set = ProtectedSet::new();
        let classifier = Classifier {
            rename_exported: true,
            rename_fields: true,
            ..Classifier::default()
        };
        classifier.collect(&parse(src), None, &mut set);
        assert!(!set.contains("Token"));
        assert!(set.contains("Secret"));
    }

    #[test]
    fn test_verdict_is_order_independent() {
        let a = "package a\ntype T struct{ x int }\n";
        let b = "package b\nfunc (t T) x() {}\n";
        let classifier = Classifier::default();

        let mut forward = ProtectedSet::new();
        classifier.collect(&parse(a), None, &mut forward);
        classifier.collect(&parse(b), None, &mut forward);

        let mut reverse = ProtectedSet::new();
        classifier.collect(&parse(b), None, &mut reverse);
        classifier.collect(&parse(a), None, &mut reverse);

        assert_eq!(
            classifier.is_protected("x", &forward),
            classifier.is_protected("x", &reverse)
        );
    }

    #[test]
    fn test_standard_library_detection() {
        assert!(is_standard_library("fmt"));
        assert!(is_standard_library("net/http"));
        assert!(is_standard_library("internal/abi"));
        assert!(!is_standard_library("github.com/user/repo"));
        assert!(!is_standard_library("gopkg.in/yaml.v3"));
    }
}
