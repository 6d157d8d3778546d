//! Recursive-descent parser for the supported Go subset.
//!
//! The parser consumes the significant token stream (post semicolon
//! insertion) and produces the span-carrying tree in [`crate::syntax::ast`].
//! It does not try to cover every corner of the language: a file it cannot
//! parse is excluded from the rename universe and copied through unmodified,
//! so partial coverage degrades to a no-op rather than a miscompile.
//!
//! Notable simplifications:
//! - Generic parameter lists on declarations are skipped as balanced
//!   brackets; the type parameters are not declared as objects.
//! - Constraint unions in interfaces are flattened to embedded elements.

use super::ast::{
    BinOp, Block, CaseClause, ChanDir, CommClause, Decl, Expr, Field, File, ForStmt, FuncDecl,
    Ident, IfStmt, ImportSpec, InterfaceElem, Lit, LitKind, Param, RangeStmt, SelectStmt, Span,
    Stmt, SwitchStmt, TypeCaseClause, TypeDecl, TypeExpr, TypeSpec, TypeSwitchStmt, UnOp,
    ValueDecl, ValueKind, ValueSpec,
};
use super::token::{Tok, Token};

/// Parse failure: byte offset plus a description of what was expected
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Byte offset of the failure
    pub offset: usize,
    /// What the parser expected
    pub details: String,
}

type PResult<T> = Result<T, ParseError>;

/// Parse a significant token stream into a [`File`].
pub fn parse_file(src: &str, tokens: &[Tok]) -> Result<File, ParseError> {
    Parser::new(src, tokens).file()
}

struct Parser<'a> {
    src: &'a str,
    toks: &'a [Tok],
    pos: usize,
    /// Naked composite literals are not allowed in control-clause headers
    no_composite: bool,
    /// Set when a `.(type)` assertion was consumed in the current header
    saw_type_switch: bool,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, toks: &'a [Tok]) -> Self {
        Self {
            src,
            toks,
            pos: 0,
            no_composite: false,
            saw_type_switch: false,
        }
    }

    // ----- token helpers -----

    fn peek(&self) -> Option<Token> {
        self.toks.get(self.pos).map(|t| t.kind)
    }

    fn peek_at(&self, n: usize) -> Option<Token> {
        self.toks.get(self.pos + n).map(|t| t.kind)
    }

    fn at(&self, kind: Token) -> bool {
        self.peek() == Some(kind)
    }

    fn cur(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn offset(&self) -> usize {
        self.cur().map(|t| t.start).unwrap_or(self.src.len())
    }

    fn bump(&mut self) -> Tok {
        let tok = self.toks[self.pos];
        self.pos += 1;
        tok
    }

    fn accept(&mut self, kind: Token) -> Option<Tok> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: Token, what: &str) -> PResult<Tok> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.err(what))
        }
    }

    fn err(&self, what: &str) -> ParseError {
        ParseError {
            offset: self.offset(),
            details: format!("expected {what}"),
        }
    }

    fn span_of(tok: &Tok) -> Span {
        Span::new(tok.start, tok.end)
    }

    fn ident(&mut self) -> PResult<Ident> {
        let tok = self.expect(Token::Ident, "identifier")?;
        Ok(Ident {
            name: tok.text(self.src).to_string(),
            span: Self::span_of(&tok),
        })
    }

    fn lit_from(&self, tok: &Tok) -> Lit {
        let kind = match tok.kind {
            Token::Str => LitKind::Str,
            Token::RawStr => LitKind::RawStr,
            Token::Rune => LitKind::Rune,
            _ => LitKind::Number,
        };
        Lit {
            kind,
            raw: tok.text(self.src).to_string(),
            span: Self::span_of(tok),
        }
    }

    fn skip_semis(&mut self) {
        while self.accept(Token::Semi).is_some() {}
    }

    /// Skip a balanced bracket group starting at the current `[`.
    fn skip_balanced_brackets(&mut self) -> PResult<()> {
        self.expect(Token::LBracket, "'['")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                Some(Token::LBracket) => depth += 1,
                Some(Token::RBracket) => depth -= 1,
                None => return Err(self.err("']'")),
                _ => {}
            }
            self.bump();
        }
        Ok(())
    }

    // ----- file structure -----

    fn file(&mut self) -> PResult<File> {
        self.skip_semis();
        self.expect(Token::Package, "'package'")?;
        let package = self.ident()?;
        self.skip_semis();

        let mut imports = Vec::new();
        let mut import_decl_spans = Vec::new();
        while self.at(Token::Import) {
            let start = self.bump();
            let end;
            if self.accept(Token::LParen).is_some() {
                self.skip_semis();
                while !self.at(Token::RParen) {
                    imports.push(self.import_spec()?);
                    self.skip_semis();
                }
                end = self.expect(Token::RParen, "')'")?.end;
            } else {
                let spec = self.import_spec()?;
                end = spec.span.end;
                imports.push(spec);
            }
            import_decl_spans.push(Span::new(start.start, end));
            self.skip_semis();
        }

        let mut decls = Vec::new();
        while self.peek().is_some() {
            decls.push(self.top_decl()?);
            self.skip_semis();
        }

        Ok(File {
            package,
            imports,
            import_decl_spans,
            decls,
        })
    }

    fn import_spec(&mut self) -> PResult<ImportSpec> {
        let alias = match self.peek() {
            Some(Token::Ident) => Some(self.ident()?),
            Some(Token::Dot) => {
                let tok = self.bump();
                Some(Ident {
                    name: ".".to_string(),
                    span: Self::span_of(&tok),
                })
            }
            _ => None,
        };
        let path_tok = self.expect(Token::Str, "import path")?;
        let path = self.lit_from(&path_tok);
        let start = alias.as_ref().map(|a| a.span.start).unwrap_or(path.span.start);
        let span = Span::new(start, path.span.end);
        Ok(ImportSpec { alias, path, span })
    }

    fn top_decl(&mut self) -> PResult<Decl> {
        match self.peek() {
            Some(Token::Func) => self.func_decl().map(Decl::Func),
            Some(Token::Type) => self.type_decl().map(Decl::Type),
            Some(Token::Var) => self.value_decl(ValueKind::Var).map(Decl::Value),
            Some(Token::Const) => self.value_decl(ValueKind::Const).map(Decl::Value),
            _ => Err(self.err("declaration")),
        }
    }

    fn func_decl(&mut self) -> PResult<FuncDecl> {
        let start = self.expect(Token::Func, "'func'")?;
        let receiver = if self.at(Token::LParen) {
            let mut params = self.param_list()?;
            if params.len() != 1 {
                return Err(self.err("single receiver"));
            }
            Some(params.remove(0))
        } else {
            None
        };
        let name = self.ident()?;
        if self.at(Token::LBracket) {
            self.skip_balanced_brackets()?;
        }
        let params = self.param_list()?;
        let results = self.result_list()?;
        let (body, end) = if self.at(Token::LBrace) {
            let block = self.block()?;
            let end = block.span.end;
            (Some(block), end)
        } else {
            let end = results
                .last()
                .map(|p| p.span.end)
                .or_else(|| params.last().map(|p| p.span.end))
                .unwrap_or(name.span.end);
            (None, end)
        };
        Ok(FuncDecl {
            name,
            receiver,
            params,
            results,
            body,
            span: Span::new(start.start, end),
        })
    }

    fn type_decl(&mut self) -> PResult<TypeDecl> {
        let start = self.expect(Token::Type, "'type'")?;
        let mut specs = Vec::new();
        let end;
        if self.accept(Token::LParen).is_some() {
            self.skip_semis();
            while !self.at(Token::RParen) {
                specs.push(self.type_spec()?);
                self.skip_semis();
            }
            end = self.expect(Token::RParen, "')'")?.end;
        } else {
            let spec = self.type_spec()?;
            end = spec.span.end;
            specs.push(spec);
        }
        Ok(TypeDecl {
            specs,
            span: Span::new(start.start, end),
        })
    }

    fn type_spec(&mut self) -> PResult<TypeSpec> {
        let name = self.ident()?;
        if self.at(Token::LBracket) {
            self.skip_balanced_brackets()?;
        }
        self.accept(Token::Assign);
        let ty = self.type_expr()?;
        let span = Span::new(name.span.start, ty.span().end);
        Ok(TypeSpec { name, ty, span })
    }

    fn value_decl(&mut self, kind: ValueKind) -> PResult<ValueDecl> {
        let start = self.bump();
        let mut specs = Vec::new();
        let end;
        if self.accept(Token::LParen).is_some() {
            self.skip_semis();
            while !self.at(Token::RParen) {
                specs.push(self.value_spec(kind)?);
                self.skip_semis();
            }
            end = self.expect(Token::RParen, "')'")?.end;
        } else {
            let spec = self.value_spec(kind)?;
            end = spec.span.end;
            specs.push(spec);
        }
        Ok(ValueDecl {
            kind,
            specs,
            span: Span::new(start.start, end),
        })
    }

    fn value_spec(&mut self, kind: ValueKind) -> PResult<ValueSpec> {
        let mut names = vec![self.ident()?];
        while self.accept(Token::Comma).is_some() {
            names.push(self.ident()?);
        }
        let ty = if !self.at(Token::Assign) && !self.at(Token::Semi) && !self.at(Token::RParen) {
            Some(self.type_expr()?)
        } else {
            None
        };
        let mut values = Vec::new();
        if self.accept(Token::Assign).is_some() {
            values.push(self.expr()?);
            while self.accept(Token::Comma).is_some() {
                values.push(self.expr()?);
            }
        } else if kind == ValueKind::Var && ty.is_none() {
            return Err(self.err("type or initializer"));
        }
        let end = values
            .last()
            .map(|e| e.span().end)
            .or_else(|| ty.as_ref().map(|t| t.span().end))
            .unwrap_or(names.last().map(|n| n.span.end).unwrap_or(0));
        let span = Span::new(names[0].span.start, end);
        Ok(ValueSpec {
            names,
            ty,
            values,
            span,
        })
    }

    // ----- parameters -----

    fn param_list(&mut self) -> PResult<Vec<Param>> {
        self.expect(Token::LParen, "'('")?;
        let mut params = Vec::new();
        if self.accept(Token::RParen).is_some() {
            return Ok(params);
        }
        let list_start = self.pos;
        match self.try_named_params() {
            Ok(named) => params = named,
            Err(_) => {
                // Anonymous form: a plain comma-separated type list
                self.pos = list_start;
                loop {
                    let ty = self.param_type()?;
                    params.push(Param {
                        names: Vec::new(),
                        span: ty.span(),
                        ty,
                    });
                    if self.accept(Token::Comma).is_none() {
                        break;
                    }
                    if self.at(Token::RParen) {
                        break;
                    }
                }
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(params)
    }

    /// Attempt the `name, name Type` interpretation of a parameter list.
    fn try_named_params(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        loop {
            let mut names = vec![self.ident()?];
            while self.accept(Token::Comma).is_some() {
                names.push(self.ident()?);
            }
            // A dot after a single collected name means it was really a
            // qualified type; bail out to the anonymous interpretation.
            if self.at(Token::Dot) || self.at(Token::RParen) || self.at(Token::Comma) {
                return Err(self.err("parameter type"));
            }
            let ty = self.param_type()?;
            let span = Span::new(names[0].span.start, ty.span().end);
            params.push(Param { names, ty, span });
            if self.accept(Token::Comma).is_none() {
                break;
            }
            if self.at(Token::RParen) {
                break;
            }
        }
        Ok(params)
    }

    fn param_type(&mut self) -> PResult<TypeExpr> {
        if let Some(tok) = self.accept(Token::Ellipsis) {
            let elem = self.type_expr()?;
            let span = Span::new(tok.start, elem.span().end);
            return Ok(TypeExpr::Ellipsis {
                elem: Box::new(elem),
                span,
            });
        }
        self.type_expr()
    }

    fn result_list(&mut self) -> PResult<Vec<Param>> {
        match self.peek() {
            Some(Token::LParen) => self.param_list(),
            Some(kind) if Self::starts_type(kind) => {
                let ty = self.type_expr()?;
                Ok(vec![Param {
                    names: Vec::new(),
                    span: ty.span(),
                    ty,
                }])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn starts_type(kind: Token) -> bool {
        matches!(
            kind,
            Token::Ident
                | Token::Star
                | Token::LBracket
                | Token::Map
                | Token::Chan
                | Token::Arrow
                | Token::Func
                | Token::Struct
                | Token::Interface
                | Token::LParen
        )
    }

    // ----- types -----

    fn type_expr(&mut self) -> PResult<TypeExpr> {
        match self.peek() {
            Some(Token::Ident) => self.named_type(),
            Some(Token::Star) => {
                let star = self.bump();
                let elem = self.type_expr()?;
                let span = Span::new(star.start, elem.span().end);
                Ok(TypeExpr::Pointer {
                    elem: Box::new(elem),
                    span,
                })
            }
            Some(Token::LBracket) => {
                let open = self.bump();
                let len = if self.at(Token::RBracket) {
                    None
                } else if self.accept(Token::Ellipsis).is_some() {
                    // `[...]T` array literal type; the length is inferred
                    None
                } else {
                    Some(Box::new(self.guarded_expr()?))
                };
                self.expect(Token::RBracket, "']'")?;
                let elem = self.type_expr()?;
                let span = Span::new(open.start, elem.span().end);
                Ok(TypeExpr::Array {
                    len,
                    elem: Box::new(elem),
                    span,
                })
            }
            Some(Token::Map) => {
                let start = self.bump();
                self.expect(Token::LBracket, "'['")?;
                let key = self.type_expr()?;
                self.expect(Token::RBracket, "']'")?;
                let value = self.type_expr()?;
                let span = Span::new(start.start, value.span().end);
                Ok(TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                    span,
                })
            }
            Some(Token::Chan) => {
                let start = self.bump();
                let dir = if self.accept(Token::Arrow).is_some() {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = self.type_expr()?;
                let span = Span::new(start.start, elem.span().end);
                Ok(TypeExpr::Chan {
                    dir,
                    elem: Box::new(elem),
                    span,
                })
            }
            Some(Token::Arrow) => {
                let start = self.bump();
                self.expect(Token::Chan, "'chan'")?;
                let elem = self.type_expr()?;
                let span = Span::new(start.start, elem.span().end);
                Ok(TypeExpr::Chan {
                    dir: ChanDir::Recv,
                    elem: Box::new(elem),
                    span,
                })
            }
            Some(Token::Func) => {
                let start = self.bump();
                let params = self.param_list()?;
                let results = self.result_list()?;
                let end = results
                    .last()
                    .map(|p| p.span.end)
                    .or_else(|| params.last().map(|p| p.span.end))
                    .unwrap_or(start.end);
                Ok(TypeExpr::Func {
                    params,
                    results,
                    span: Span::new(start.start, end),
                })
            }
            Some(Token::Struct) => self.struct_type(),
            Some(Token::Interface) => self.interface_type(),
            Some(Token::LParen) => {
                let open = self.bump();
                let inner = self.type_expr()?;
                let close = self.expect(Token::RParen, "')'")?;
                Ok(TypeExpr::Paren {
                    inner: Box::new(inner),
                    span: Span::new(open.start, close.end),
                })
            }
            _ => Err(self.err("type")),
        }
    }

    fn named_type(&mut self) -> PResult<TypeExpr> {
        let first = self.ident()?;
        let (pkg, name) = if self.at(Token::Dot) && self.peek_at(1) == Some(Token::Ident) {
            self.bump();
            let name = self.ident()?;
            (Some(first), name)
        } else {
            (None, first)
        };
        let mut end = name.span.end;
        let mut args = Vec::new();
        if self.at(Token::LBracket) && !self.no_composite {
            self.bump();
            loop {
                args.push(self.type_expr()?);
                if self.accept(Token::Comma).is_none() {
                    break;
                }
            }
            end = self.expect(Token::RBracket, "']'")?.end;
        }
        let start = pkg.as_ref().map(|p| p.span.start).unwrap_or(name.span.start);
        Ok(TypeExpr::Name {
            pkg,
            name,
            args,
            span: Span::new(start, end),
        })
    }

    fn struct_type(&mut self) -> PResult<TypeExpr> {
        let start = self.expect(Token::Struct, "'struct'")?;
        self.expect(Token::LBrace, "'{'")?;
        self.skip_semis();
        let mut fields = Vec::new();
        while !self.at(Token::RBrace) {
            fields.push(self.field()?);
            self.skip_semis();
        }
        let close = self.expect(Token::RBrace, "'}'")?;
        Ok(TypeExpr::Struct {
            fields,
            span: Span::new(start.start, close.end),
        })
    }

    fn field(&mut self) -> PResult<Field> {
        let start_offset = self.offset();
        // Embedded field: `*pkg.Name`, `pkg.Name`, or `Name` followed by a
        // field terminator or a tag.
        let embedded = if self.at(Token::Star) {
            true
        } else if self.at(Token::Ident) {
            let mut n = 1;
            if self.peek_at(1) == Some(Token::Dot) {
                n = 3;
            }
            matches!(
                self.peek_at(n),
                Some(Token::Semi) | Some(Token::RBrace) | Some(Token::Str) | Some(Token::RawStr)
                    | None
            )
        } else {
            return Err(self.err("field"));
        };

        let (names, ty) = if embedded {
            (Vec::new(), self.type_expr()?)
        } else {
            let mut names = vec![self.ident()?];
            while self.accept(Token::Comma).is_some() {
                names.push(self.ident()?);
            }
            (names, self.type_expr()?)
        };

        let tag = match self.peek() {
            Some(Token::Str) | Some(Token::RawStr) => {
                let tok = self.bump();
                Some(self.lit_from(&tok))
            }
            _ => None,
        };
        let end = tag
            .as_ref()
            .map(|t| t.span.end)
            .unwrap_or_else(|| ty.span().end);
        Ok(Field {
            names,
            ty,
            tag,
            span: Span::new(start_offset, end),
        })
    }

    fn interface_type(&mut self) -> PResult<TypeExpr> {
        let start = self.expect(Token::Interface, "'interface'")?;
        self.expect(Token::LBrace, "'{'")?;
        self.skip_semis();
        let mut elems = Vec::new();
        while !self.at(Token::RBrace) {
            if self.at(Token::Ident) && self.peek_at(1) == Some(Token::LParen) {
                let name = self.ident()?;
                let params = self.param_list()?;
                let results = self.result_list()?;
                let end = results
                    .last()
                    .map(|p| p.span.end)
                    .or_else(|| params.last().map(|p| p.span.end))
                    .unwrap_or(name.span.end);
                let span = Span::new(name.span.start, end);
                elems.push(InterfaceElem::Method {
                    name,
                    params,
                    results,
                    span,
                });
            } else {
                // Embedded interface or constraint element; unions are
                // flattened into their members.
                self.accept(Token::Tilde);
                elems.push(InterfaceElem::Embedded(self.type_expr()?));
                while self.accept(Token::Pipe).is_some() {
                    self.accept(Token::Tilde);
                    elems.push(InterfaceElem::Embedded(self.type_expr()?));
                }
            }
            self.skip_semis();
        }
        let close = self.expect(Token::RBrace, "'}'")?;
        Ok(TypeExpr::Interface {
            elems,
            span: Span::new(start.start, close.end),
        })
    }

    // ----- statements -----

    fn block(&mut self) -> PResult<Block> {
        let open = self.expect(Token::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        self.skip_semis();
        while !self.at(Token::RBrace) {
            stmts.push(self.stmt()?);
            self.skip_semis();
        }
        let close = self.expect(Token::RBrace, "'}'")?;
        Ok(Block {
            stmts,
            span: Span::new(open.start, close.end),
        })
    }

    fn stmt(&mut self) -> PResult<Stmt> {
        match self.peek() {
            Some(Token::Var) => self.value_decl(ValueKind::Var).map(|d| Stmt::Decl(Decl::Value(d))),
            Some(Token::Const) => self
                .value_decl(ValueKind::Const)
                .map(|d| Stmt::Decl(Decl::Value(d))),
            Some(Token::Type) => self.type_decl().map(|d| Stmt::Decl(Decl::Type(d))),
            Some(Token::LBrace) => self.block().map(Stmt::Block),
            Some(Token::If) => self.if_stmt(),
            Some(Token::For) => self.for_stmt(),
            Some(Token::Switch) => self.switch_stmt(),
            Some(Token::Select) => self.select_stmt(),
            Some(Token::Go) => {
                let start = self.bump();
                let call = self.expr()?;
                let span = Span::new(start.start, call.span().end);
                Ok(Stmt::Go { call, span })
            }
            Some(Token::Defer) => {
                let start = self.bump();
                let call = self.expr()?;
                let span = Span::new(start.start, call.span().end);
                Ok(Stmt::Defer { call, span })
            }
            Some(Token::Return) => {
                let start = self.bump();
                let mut results = Vec::new();
                if !self.at(Token::Semi) && !self.at(Token::RBrace) {
                    results.push(self.expr()?);
                    while self.accept(Token::Comma).is_some() {
                        results.push(self.expr()?);
                    }
                }
                let end = results.last().map(|e| e.span().end).unwrap_or(start.end);
                Ok(Stmt::Return {
                    results,
                    span: Span::new(start.start, end),
                })
            }
            Some(Token::Break) | Some(Token::Continue) | Some(Token::Goto)
            | Some(Token::Fallthrough) => {
                let start = self.bump();
                let label = if self.at(Token::Ident) {
                    Some(self.ident()?)
                } else {
                    None
                };
                let end = label.as_ref().map(|l| l.span.end).unwrap_or(start.end);
                Ok(Stmt::Branch {
                    label,
                    span: Span::new(start.start, end),
                })
            }
            Some(Token::Semi) => {
                let tok = self.bump();
                Ok(Stmt::Empty(Self::span_of(&tok)))
            }
            Some(Token::Ident)
                if self.peek_at(1) == Some(Token::Colon)
                    && self.peek_at(2) != Some(Token::Assign) =>
            {
                let label = self.ident()?;
                self.bump(); // colon
                self.skip_semis();
                let stmt = self.stmt()?;
                let span = Span::new(label.span.start, stmt.span().end);
                Ok(Stmt::Labeled {
                    label,
                    stmt: Box::new(stmt),
                    span,
                })
            }
            Some(_) => self.simple_stmt(),
            None => Err(self.err("statement")),
        }
    }

    /// Simple statement: expression, send, inc/dec, or assignment.
    fn simple_stmt(&mut self) -> PResult<Stmt> {
        let first = self.expr()?;

        if self.accept(Token::Arrow).is_some() {
            let value = self.expr()?;
            let span = Span::new(first.span().start, value.span().end);
            return Ok(Stmt::Send {
                chan: first,
                value,
                span,
            });
        }

        if self.at(Token::Inc) || self.at(Token::Dec) {
            let op = self.bump();
            let span = Span::new(first.span().start, op.end);
            return Ok(Stmt::IncDec { expr: first, span });
        }

        let mut lhs = vec![first];
        while self.accept(Token::Comma).is_some() {
            lhs.push(self.expr()?);
        }

        let define = match self.peek() {
            Some(Token::ColonEq) => true,
            Some(
                Token::Assign
                | Token::PlusEq
                | Token::MinusEq
                | Token::StarEq
                | Token::SlashEq
                | Token::PercentEq
                | Token::AmpEq
                | Token::PipeEq
                | Token::CaretEq
                | Token::ShlEq
                | Token::ShrEq
                | Token::AmpCaretEq,
            ) => false,
            _ => {
                if lhs.len() == 1 {
                    return Ok(Stmt::Expr(lhs.remove(0)));
                }
                return Err(self.err("assignment"));
            }
        };
        self.bump();

        let mut rhs = vec![self.expr()?];
        while self.accept(Token::Comma).is_some() {
            rhs.push(self.expr()?);
        }
        let span = Span::new(lhs[0].span().start, rhs.last().map(|e| e.span().end).unwrap_or(0));
        Ok(Stmt::Assign {
            lhs,
            rhs,
            define,
            span,
        })
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        let start = self.expect(Token::If, "'if'")?;
        let (init, cond) = self.header_cond()?;
        let body = self.block()?;
        let else_branch = if self.accept(Token::Else).is_some() {
            let stmt = if self.at(Token::If) {
                self.if_stmt()?
            } else {
                Stmt::Block(self.block()?)
            };
            Some(Box::new(stmt))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|s| s.span().end)
            .unwrap_or(body.span.end);
        Ok(Stmt::If(IfStmt {
            init,
            cond,
            body,
            else_branch,
            span: Span::new(start.start, end),
        }))
    }

    /// Parse `[init ;] cond` with composite literals disabled.
    fn header_cond(&mut self) -> PResult<(Option<Box<Stmt>>, Expr)> {
        let saved = self.no_composite;
        self.no_composite = true;
        let result = (|| {
            let first = self.simple_stmt()?;
            if self.accept(Token::Semi).is_some() {
                let cond = self.expr()?;
                Ok((Some(Box::new(first)), cond))
            } else {
                match first {
                    Stmt::Expr(e) => Ok((None, e)),
                    _ => Err(self.err("condition")),
                }
            }
        })();
        self.no_composite = saved;
        result
    }

    fn for_stmt(&mut self) -> PResult<Stmt> {
        let start = self.expect(Token::For, "'for'")?;
        let saved = self.no_composite;
        self.no_composite = true;

        // `for {`
        if self.at(Token::LBrace) {
            self.no_composite = saved;
            let body = self.block()?;
            let span = Span::new(start.start, body.span.end);
            return Ok(Stmt::For(ForStmt {
                init: None,
                cond: None,
                post: None,
                body,
                span,
            }));
        }

        // `for range x {`
        if self.accept(Token::Range).is_some() {
            let subject = self.expr()?;
            self.no_composite = saved;
            let body = self.block()?;
            let span = Span::new(start.start, body.span.end);
            return Ok(Stmt::Range(RangeStmt {
                key: None,
                value: None,
                define: false,
                subject,
                body,
                span,
            }));
        }

        let header = (|| {
            let first = self.expr()?;
            let mut lhs = vec![first];
            while self.accept(Token::Comma).is_some() {
                lhs.push(self.expr()?);
            }

            // `for k, v := range x` / `for k = range x`
            let is_define = self.at(Token::ColonEq);
            if (is_define || self.at(Token::Assign)) && self.peek_at(1) == Some(Token::Range) {
                self.bump();
                self.bump();
                let subject = self.expr()?;
                let mut iter = lhs.into_iter();
                return Ok(ForHeader::Range {
                    key: iter.next(),
                    value: iter.next(),
                    define: is_define,
                    subject,
                });
            }

            // Reconstitute a simple statement from what we have parsed
            let first_stmt = self.finish_simple(lhs)?;
            if self.accept(Token::Semi).is_some() {
                let cond = if self.at(Token::Semi) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(Token::Semi, "';'")?;
                let post = if self.at(Token::LBrace) {
                    None
                } else {
                    Some(Box::new(self.simple_stmt()?))
                };
                Ok(ForHeader::Clauses {
                    init: Some(Box::new(first_stmt)),
                    cond,
                    post,
                })
            } else {
                match first_stmt {
                    Stmt::Expr(e) => Ok(ForHeader::Clauses {
                        init: None,
                        cond: Some(e),
                        post: None,
                    }),
                    _ => Err(self.err("loop condition")),
                }
            }
        })();
        self.no_composite = saved;
        let header = header?;

        let body = self.block()?;
        let span = Span::new(start.start, body.span.end);
        Ok(match header {
            ForHeader::Range {
                key,
                value,
                define,
                subject,
            } => Stmt::Range(RangeStmt {
                key,
                value,
                define,
                subject,
                body,
                span,
            }),
            ForHeader::Clauses { init, cond, post } => Stmt::For(ForStmt {
                init,
                cond,
                post,
                body,
                span,
            }),
        })
    }

    /// Finish a simple statement whose leading expression list is already
    /// parsed (used by the `for` header, which has to look for `range`).
    fn finish_simple(&mut self, mut lhs: Vec<Expr>) -> PResult<Stmt> {
        if lhs.len() == 1 {
            if let Some(op) = self.peek() {
                if op == Token::Inc || op == Token::Dec {
                    let tok = self.bump();
                    let expr = lhs.remove(0);
                    let span = Span::new(expr.span().start, tok.end);
                    return Ok(Stmt::IncDec { expr, span });
                }
            }
        }
        let define = match self.peek() {
            Some(Token::ColonEq) => true,
            Some(
                Token::Assign
                | Token::PlusEq
                | Token::MinusEq
                | Token::StarEq
                | Token::SlashEq
                | Token::PercentEq
                | Token::AmpEq
                | Token::PipeEq
                | Token::CaretEq
                | Token::ShlEq
                | Token::ShrEq
                | Token::AmpCaretEq,
            ) => false,
            _ => {
                if lhs.len() == 1 {
                    return Ok(Stmt::Expr(lhs.remove(0)));
                }
                return Err(self.err("assignment"));
            }
        };
        self.bump();
        let mut rhs = vec![self.expr()?];
        while self.accept(Token::Comma).is_some() {
            rhs.push(self.expr()?);
        }
        let span = Span::new(lhs[0].span().start, rhs.last().map(|e| e.span().end).unwrap_or(0));
        Ok(Stmt::Assign {
            lhs,
            rhs,
            define,
            span,
        })
    }

    fn switch_stmt(&mut self) -> PResult<Stmt> {
        let start = self.expect(Token::Switch, "'switch'")?;
        self.saw_type_switch = false;

        let saved = self.no_composite;
        self.no_composite = true;
        let header = (|| {
            if self.at(Token::LBrace) {
                return Ok((None, None));
            }
            let first = self.simple_stmt()?;
            if self.accept(Token::Semi).is_some() {
                if self.at(Token::LBrace) {
                    return Ok((Some(Box::new(first)), None));
                }
                let second = self.simple_stmt()?;
                Ok((Some(Box::new(first)), Some(second)))
            } else {
                Ok((None, Some(first)))
            }
        })();
        self.no_composite = saved;
        let (init, tag_stmt) = header?;

        if self.saw_type_switch {
            let (binding, subject) = match tag_stmt {
                Some(Stmt::Expr(e)) => (None, Self::unwrap_type_switch_subject(e)?),
                Some(Stmt::Assign {
                    mut lhs, mut rhs, ..
                }) if lhs.len() == 1 && rhs.len() == 1 => {
                    let binding = match lhs.remove(0) {
                        Expr::Ident(id) => Some(id),
                        _ => return Err(self.err("type switch binding")),
                    };
                    (binding, Self::unwrap_type_switch_subject(rhs.remove(0))?)
                }
                _ => return Err(self.err("type switch header")),
            };
            let clauses = self.type_case_clauses()?;
            let end = self.expect(Token::RBrace, "'}'")?.end;
            return Ok(Stmt::TypeSwitch(TypeSwitchStmt {
                init,
                binding,
                subject,
                clauses,
                span: Span::new(start.start, end),
            }));
        }

        let tag = match tag_stmt {
            None => None,
            Some(Stmt::Expr(e)) => Some(e),
            Some(_) => return Err(self.err("switch tag")),
        };
        let clauses = self.case_clauses()?;
        let end = self.expect(Token::RBrace, "'}'")?.end;
        Ok(Stmt::Switch(SwitchStmt {
            init,
            tag,
            clauses,
            span: Span::new(start.start, end),
        }))
    }

    /// Strip the `.(type)` marker produced by the postfix parser.
    fn unwrap_type_switch_subject(e: Expr) -> PResult<Expr> {
        match e {
            Expr::TypeAssert { x, ty, .. } => match *ty {
                TypeExpr::Name { ref name, .. } if name.name == "type" => Ok(*x),
                _ => Err(ParseError {
                    offset: 0,
                    details: "expected .(type) assertion".to_string(),
                }),
            },
            _ => Err(ParseError {
                offset: 0,
                details: "expected .(type) assertion".to_string(),
            }),
        }
    }

    fn case_clauses(&mut self) -> PResult<Vec<CaseClause>> {
        self.expect(Token::LBrace, "'{'")?;
        self.skip_semis();
        let mut clauses = Vec::new();
        while !self.at(Token::RBrace) {
            let start = self.offset();
            let mut exprs = Vec::new();
            if self.accept(Token::Case).is_some() {
                exprs.push(self.expr()?);
                while self.accept(Token::Comma).is_some() {
                    exprs.push(self.expr()?);
                }
            } else {
                self.expect(Token::Default, "'case' or 'default'")?;
            }
            self.expect(Token::Colon, "':'")?;
            let body = self.clause_body()?;
            let end = body.last().map(|s| s.span().end).unwrap_or(start);
            clauses.push(CaseClause {
                exprs,
                body,
                span: Span::new(start, end),
            });
        }
        Ok(clauses)
    }

    fn type_case_clauses(&mut self) -> PResult<Vec<TypeCaseClause>> {
        self.expect(Token::LBrace, "'{'")?;
        self.skip_semis();
        let mut clauses = Vec::new();
        while !self.at(Token::RBrace) {
            let start = self.offset();
            let mut types = Vec::new();
            if self.accept(Token::Case).is_some() {
                types.push(self.type_expr()?);
                while self.accept(Token::Comma).is_some() {
                    types.push(self.type_expr()?);
                }
            } else {
                self.expect(Token::Default, "'case' or 'default'")?;
            }
            self.expect(Token::Colon, "':'")?;
            let body = self.clause_body()?;
            let end = body.last().map(|s| s.span().end).unwrap_or(start);
            clauses.push(TypeCaseClause {
                types,
                body,
                span: Span::new(start, end),
            });
        }
        Ok(clauses)
    }

    fn select_stmt(&mut self) -> PResult<Stmt> {
        let start = self.expect(Token::Select, "'select'")?;
        self.expect(Token::LBrace, "'{'")?;
        self.skip_semis();
        let mut clauses = Vec::new();
        while !self.at(Token::RBrace) {
            let cstart = self.offset();
            let comm = if self.accept(Token::Case).is_some() {
                Some(Box::new(self.simple_stmt()?))
            } else {
                self.expect(Token::Default, "'case' or 'default'")?;
                None
            };
            self.expect(Token::Colon, "':'")?;
            let body = self.clause_body()?;
            let end = body.last().map(|s| s.span().end).unwrap_or(cstart);
            clauses.push(CommClause {
                comm,
                body,
                span: Span::new(cstart, end),
            });
        }
        let end = self.expect(Token::RBrace, "'}'")?.end;
        Ok(Stmt::Select(SelectStmt {
            clauses,
            span: Span::new(start.start, end),
        }))
    }

    fn clause_body(&mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        self.skip_semis();
        while !self.at(Token::Case) && !self.at(Token::Default) && !self.at(Token::RBrace) {
            body.push(self.stmt()?);
            self.skip_semis();
        }
        Ok(body)
    }

    // ----- expressions -----

    fn expr(&mut self) -> PResult<Expr> {
        self.binary_expr(0)
    }

    /// Parse an expression with composite literals re-enabled (inside
    /// brackets or parens the header restriction no longer applies).
    fn guarded_expr(&mut self) -> PResult<Expr> {
        let saved = self.no_composite;
        self.no_composite = false;
        let result = self.expr();
        self.no_composite = saved;
        result
    }

    fn binary_expr(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.unary_expr()?;
        while let Some(op) = self.peek().and_then(Self::bin_op) {
            let prec = op.precedence();
            if prec <= min_prec {
                break;
            }
            self.bump();
            let rhs = self.binary_expr(prec)?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                x: Box::new(lhs),
                op,
                y: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn bin_op(kind: Token) -> Option<BinOp> {
        Some(match kind {
            Token::OrOr => BinOp::OrOr,
            Token::AndAnd => BinOp::AndAnd,
            Token::EqEq => BinOp::Eq,
            Token::NotEq => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Pipe => BinOp::Or,
            Token::Caret => BinOp::Xor,
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::Percent => BinOp::Rem,
            Token::Shl => BinOp::Shl,
            Token::Shr => BinOp::Shr,
            Token::Amp => BinOp::And,
            Token::AmpCaret => BinOp::AndNot,
            _ => return None,
        })
    }

    fn unary_expr(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Some(Token::Plus) => Some(UnOp::Pos),
            Some(Token::Minus) => Some(UnOp::Neg),
            Some(Token::Not) => Some(UnOp::Not),
            Some(Token::Caret) => Some(UnOp::Xor),
            Some(Token::Amp) => Some(UnOp::Addr),
            Some(Token::Arrow) => Some(UnOp::Recv),
            Some(Token::Star) => {
                let star = self.bump();
                let x = self.unary_expr()?;
                let span = Span::new(star.start, x.span().end);
                return Ok(Expr::Star {
                    x: Box::new(x),
                    span,
                });
            }
            _ => None,
        };
        if let Some(op) = op {
            let tok = self.bump();
            let x = self.unary_expr()?;
            let span = Span::new(tok.start, x.span().end);
            return Ok(Expr::Unary {
                op,
                x: Box::new(x),
                span,
            });
        }
        self.postfix_expr()
    }

    fn postfix_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.operand()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.bump();
                    if self.accept(Token::LParen).is_some() {
                        // `.(T)` assertion, or the `.(type)` switch marker
                        let ty = if self.at(Token::Type) {
                            let tok = self.bump();
                            self.saw_type_switch = true;
                            TypeExpr::Name {
                                pkg: None,
                                name: Ident {
                                    name: "type".to_string(),
                                    span: Self::span_of(&tok),
                                },
                                args: Vec::new(),
                                span: Self::span_of(&tok),
                            }
                        } else {
                            self.type_expr()?
                        };
                        let close = self.expect(Token::RParen, "')'")?;
                        let span = Span::new(expr.span().start, close.end);
                        expr = Expr::TypeAssert {
                            x: Box::new(expr),
                            ty: Box::new(ty),
                            span,
                        };
                    } else {
                        let sel = self.ident()?;
                        let span = Span::new(expr.span().start, sel.span.end);
                        expr = Expr::Selector {
                            x: Box::new(expr),
                            sel,
                            span,
                        };
                    }
                }
                Some(Token::LParen) => {
                    self.bump();
                    let mut args = Vec::new();
                    while !self.at(Token::RParen) {
                        args.push(self.guarded_expr()?);
                        self.accept(Token::Ellipsis);
                        if self.accept(Token::Comma).is_none() {
                            break;
                        }
                    }
                    let close = self.expect(Token::RParen, "')'")?;
                    let span = Span::new(expr.span().start, close.end);
                    expr = Expr::Call {
                        fun: Box::new(expr),
                        args,
                        span,
                    };
                }
                Some(Token::LBracket) => {
                    self.bump();
                    // Index, slice, or generic instantiation
                    let low = if self.at(Token::Colon) {
                        None
                    } else {
                        Some(Box::new(self.guarded_expr()?))
                    };
                    if self.accept(Token::Colon).is_some() {
                        let high = if self.at(Token::Colon) || self.at(Token::RBracket) {
                            None
                        } else {
                            Some(Box::new(self.guarded_expr()?))
                        };
                        let max = if self.accept(Token::Colon).is_some() {
                            Some(Box::new(self.guarded_expr()?))
                        } else {
                            None
                        };
                        let close = self.expect(Token::RBracket, "']'")?;
                        let span = Span::new(expr.span().start, close.end);
                        expr = Expr::Slice {
                            x: Box::new(expr),
                            low,
                            high,
                            max,
                            span,
                        };
                    } else {
                        let index = low.ok_or_else(|| self.err("index expression"))?;
                        let close = self.expect(Token::RBracket, "']'")?;
                        let span = Span::new(expr.span().start, close.end);
                        expr = Expr::Index {
                            x: Box::new(expr),
                            index,
                            span,
                        };
                    }
                }
                Some(Token::LBrace) if !self.no_composite && Self::is_literal_type(&expr) => {
                    let (elts, end) = self.composite_body()?;
                    let span = Span::new(expr.span().start, end);
                    let ty = Self::expr_to_type(expr);
                    expr = Expr::Composite {
                        ty: ty.map(Box::new),
                        elts,
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Whether an already-parsed expression can be a composite literal type
    fn is_literal_type(expr: &Expr) -> bool {
        match expr {
            Expr::Ident(_) | Expr::Type(_) => true,
            Expr::Selector { x, .. } => matches!(**x, Expr::Ident(_)),
            Expr::Index { x, .. } => Self::is_literal_type(x),
            _ => false,
        }
    }

    /// Reinterpret an expression as the type of a composite literal
    fn expr_to_type(expr: Expr) -> Option<TypeExpr> {
        match expr {
            Expr::Ident(id) => {
                let span = id.span;
                Some(TypeExpr::Name {
                    pkg: None,
                    name: id,
                    args: Vec::new(),
                    span,
                })
            }
            Expr::Selector { x, sel, span } => match *x {
                Expr::Ident(pkg) => Some(TypeExpr::Name {
                    pkg: Some(pkg),
                    name: sel,
                    args: Vec::new(),
                    span,
                }),
                _ => None,
            },
            Expr::Type(t) => Some(t),
            Expr::Index { x, span, .. } => {
                // Generic instantiation used as a literal type; the argument
                // list is not needed downstream.
                Self::expr_to_type(*x).map(|t| match t {
                    TypeExpr::Name { pkg, name, args, .. } => TypeExpr::Name {
                        pkg,
                        name,
                        args,
                        span,
                    },
                    other => other,
                })
            }
            _ => None,
        }
    }

    fn composite_body(&mut self) -> PResult<(Vec<Expr>, usize)> {
        self.expect(Token::LBrace, "'{'")?;
        let saved = self.no_composite;
        self.no_composite = false;
        let result = (|| {
            let mut elts = Vec::new();
            self.skip_semis();
            while !self.at(Token::RBrace) {
                let elt = self.composite_elt()?;
                elts.push(elt);
                if self.accept(Token::Comma).is_none() {
                    self.skip_semis();
                    break;
                }
                self.skip_semis();
            }
            let close = self.expect(Token::RBrace, "'}'")?;
            Ok((elts, close.end))
        })();
        self.no_composite = saved;
        result
    }

    fn composite_elt(&mut self) -> PResult<Expr> {
        let value = if self.at(Token::LBrace) {
            let start = self.offset();
            let (elts, end) = self.composite_body()?;
            Expr::Composite {
                ty: None,
                elts,
                span: Span::new(start, end),
            }
        } else {
            self.expr()?
        };
        if self.accept(Token::Colon).is_some() {
            let val = if self.at(Token::LBrace) {
                let start = self.offset();
                let (elts, end) = self.composite_body()?;
                Expr::Composite {
                    ty: None,
                    elts,
                    span: Span::new(start, end),
                }
            } else {
                self.expr()?
            };
            let span = value.span().to(val.span());
            return Ok(Expr::KeyValue {
                key: Box::new(value),
                value: Box::new(val),
                span,
            });
        }
        Ok(value)
    }

    fn operand(&mut self) -> PResult<Expr> {
        match self.peek() {
            Some(Token::Ident) => self.ident().map(Expr::Ident),
            Some(Token::Str) | Some(Token::RawStr) | Some(Token::Rune) | Some(Token::Number) => {
                let tok = self.bump();
                Ok(Expr::Lit(self.lit_from(&tok)))
            }
            Some(Token::LParen) => {
                let open = self.bump();
                let x = self.guarded_expr()?;
                let close = self.expect(Token::RParen, "')'")?;
                Ok(Expr::Paren {
                    x: Box::new(x),
                    span: Span::new(open.start, close.end),
                })
            }
            Some(Token::Func) => {
                let start = self.bump();
                let params = self.param_list()?;
                let results = self.result_list()?;
                if self.at(Token::LBrace) {
                    let saved = self.no_composite;
                    self.no_composite = false;
                    let body = self.block();
                    self.no_composite = saved;
                    let body = body?;
                    let span = Span::new(start.start, body.span.end);
                    Ok(Expr::FuncLit {
                        params,
                        results,
                        body,
                        span,
                    })
                } else {
                    let end = results
                        .last()
                        .map(|p| p.span.end)
                        .or_else(|| params.last().map(|p| p.span.end))
                        .unwrap_or(start.end);
                    Ok(Expr::Type(TypeExpr::Func {
                        params,
                        results,
                        span: Span::new(start.start, end),
                    }))
                }
            }
            // Type-shaped operands: conversions like `[]byte(s)` and literal
            // types like `map[string]int{...}`
            Some(Token::LBracket) | Some(Token::Map) | Some(Token::Chan) | Some(Token::Struct)
            | Some(Token::Interface) => self.type_expr().map(Expr::Type),
            _ => Err(self.err("expression")),
        }
    }
}

enum ForHeader {
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        subject: Expr,
    },
    Clauses {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::token::{lex, significant};
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> File {
        let toks = lex(src).unwrap();
        let sig = significant(src, &toks);
        parse_file(src, &sig).unwrap_or_else(|e| {
            panic!("parse failed at byte {}: {}", e.offset, e.details);
        })
    }

    #[test]
    fn test_parse_hello_world() {
        let file = parse("package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n");
        assert_eq!(file.package.name, "main");
        assert_eq!(file.imports.len(), 1);
        assert_eq!(file.imports[0].path_value(), "fmt");
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn test_parse_grouped_imports() {
        let file = parse("package x\n\nimport (\n\t\"os\"\n\tj \"encoding/json\"\n\t_ \"embed\"\n)\n");
        assert_eq!(file.imports.len(), 3);
        assert_eq!(file.imports[1].local_name(), Some("j"));
        assert_eq!(file.imports[2].local_name(), None);
    }

    #[test]
    fn test_parse_named_and_anonymous_params() {
        let file = parse("package x\nfunc f(a, b int, c string) (int, error) { return a, nil }\n");
        let Decl::Func(f) = &file.decls[0] else {
            panic!("expected func")
        };
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].names.len(), 2);
        assert_eq!(f.results.len(), 2);
        assert!(f.results[0].names.is_empty());
    }

    #[test]
    fn test_parse_method_with_receiver() {
        let file = parse("package x\nfunc (s *Server) Close() error { return nil }\n");
        let Decl::Func(f) = &file.decls[0] else {
            panic!("expected func")
        };
        assert!(f.receiver.is_some());
        assert_eq!(f.name.name, "Close");
    }

    #[test]
    fn test_parse_struct_with_tags() {
        let file = parse(
            "package x\ntype User struct {\n\tName string `json:\"name\"`\n\tage int\n\tio.Reader\n}\n",
        );
        let Decl::Type(t) = &file.decls[0] else {
            panic!("expected type")
        };
        let TypeExpr::Struct { fields, .. } = &t.specs[0].ty else {
            panic!("expected struct")
        };
        assert_eq!(fields.len(), 3);
        assert!(fields[0].tag.is_some());
        assert_eq!(
            fields[2].embedded_name().map(|i| i.name.as_str()),
            Some("Reader")
        );
    }

    #[test]
    fn test_parse_control_flow() {
        let src = r#"package x
func f(xs []int) int {
	total := 0
	for i, v := range xs {
		if v > 0 && i%2 == 0 {
			total += v
		} else {
			total--
		}
	}
	for total > 100 {
		total /= 2
	}
	switch total {
	case 0:
		return -1
	default:
	}
	return total
}
"#;
        let file = parse(src);
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn test_parse_type_switch() {
        let src = "package x\nfunc f(v interface{}) {\n\tswitch t := v.(type) {\n\tcase int:\n\t\t_ = t\n\tcase nil:\n\tdefault:\n\t}\n}\n";
        let file = parse(src);
        let Decl::Func(f) = &file.decls[0] else {
            panic!()
        };
        let Stmt::TypeSwitch(ts) = &f.body.as_ref().unwrap().stmts[0] else {
            panic!("expected type switch")
        };
        assert_eq!(ts.binding.as_ref().unwrap().name, "t");
        assert_eq!(ts.clauses.len(), 3);
    }

    #[test]
    fn test_parse_select_and_channels() {
        let src = "package x\nfunc f(ch chan int, done <-chan bool) {\n\tselect {\n\tcase v := <-ch:\n\t\t_ = v\n\tcase ch <- 1:\n\tdefault:\n\t}\n}\n";
        let file = parse(src);
        let Decl::Func(f) = &file.decls[0] else {
            panic!()
        };
        let Stmt::Select(sel) = &f.body.as_ref().unwrap().stmts[0] else {
            panic!("expected select")
        };
        assert_eq!(sel.clauses.len(), 3);
    }

    #[test]
    fn test_parse_composite_literals() {
        let src = "package x\nvar m = map[string][]int{\"a\": {1, 2}, \"b\": nil}\nvar p = Point{X: 1, Y: 2}\n";
        let file = parse(src);
        assert_eq!(file.decls.len(), 2);
    }

    #[test]
    fn test_parse_func_literal_and_defer() {
        let src = "package x\nfunc f() {\n\tdefer func() {\n\t\trecover()\n\t}()\n\tgo work(1)\n}\n";
        parse(src);
    }

    #[test]
    fn test_composite_disallowed_in_if_header() {
        // `T{}` directly in an if header must not parse as a composite
        let src = "package x\nfunc f() {\n\tif x == (T{}) {\n\t\treturn\n\t}\n}\n";
        parse(src);
    }

    #[test]
    fn test_parse_failure_reports_offset() {
        let src = "package x\nfunc f( {\n";
        let toks = lex(src).unwrap();
        let sig = significant(src, &toks);
        let err = parse_file(src, &sig).unwrap_err();
        assert!(err.offset > 0);
    }
}
