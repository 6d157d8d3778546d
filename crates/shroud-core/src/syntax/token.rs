//! Lexical analysis of Go source text.
//!
//! The lexer is a [`logos`]-derived token enum. Two deviations from a
//! conventional skip-everything lexer matter here:
//!
//! - Comments and newlines are real tokens. The rewriter needs comment spans
//!   to strip them (and to preserve compiler directives verbatim), and Go's
//!   automatic semicolon insertion needs newline positions.
//! - [`significant`] applies the semicolon-insertion rule and drops trivia,
//!   producing the stream the parser consumes. The raw token list (with
//!   trivia) is kept alongside the parsed file for span-based rewriting.

use logos::Logos;

/// Go token kinds.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r]+")]
#[allow(missing_docs)] // keyword and operator variants name themselves
pub enum Token {
    /// `// ...` comment up to end of line
    #[regex(r"//[^\n]*")]
    LineComment,

    /// `/* ... */` comment, possibly spanning lines
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    /// Line break, significant for semicolon insertion
    #[token("\n")]
    Newline,

    // Keywords
    #[token("break")]
    Break,
    #[token("case")]
    Case,
    #[token("chan")]
    Chan,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("default")]
    Default,
    #[token("defer")]
    Defer,
    #[token("else")]
    Else,
    #[token("fallthrough")]
    Fallthrough,
    #[token("for")]
    For,
    #[token("func")]
    Func,
    #[token("go")]
    Go,
    #[token("goto")]
    Goto,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("interface")]
    Interface,
    #[token("map")]
    Map,
    #[token("package")]
    Package,
    #[token("range")]
    Range,
    #[token("return")]
    Return,
    #[token("select")]
    Select,
    #[token("struct")]
    Struct,
    #[token("switch")]
    Switch,
    #[token("type")]
    Type,
    #[token("var")]
    Var,

    /// Identifier (ASCII subset; a file using Unicode identifiers fails to
    /// lex and is copied through unmodified)
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    /// Interpreted string literal
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,

    /// Raw string literal (backquoted)
    #[regex(r"`[^`]*`")]
    RawStr,

    /// Rune literal
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Rune,

    /// Numeric literal (integer, float, or imaginary)
    #[regex(r"0[xXoObB][0-9a-fA-F_]+i?")]
    #[regex(r"[0-9][0-9_]*i?")]
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?i?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+i?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?i?")]
    Number,

    // Operators and delimiters
    #[token("+")]
    Plus,
    #[token("+=")]
    PlusEq,
    #[token("++")]
    Inc,
    #[token("-")]
    Minus,
    #[token("-=")]
    MinusEq,
    #[token("--")]
    Dec,
    #[token("*")]
    Star,
    #[token("*=")]
    StarEq,
    #[token("/")]
    Slash,
    #[token("/=")]
    SlashEq,
    #[token("%")]
    Percent,
    #[token("%=")]
    PercentEq,
    #[token("&")]
    Amp,
    #[token("&=")]
    AmpEq,
    #[token("&^")]
    AmpCaret,
    #[token("&^=")]
    AmpCaretEq,
    #[token("&&")]
    AndAnd,
    #[token("|")]
    Pipe,
    #[token("|=")]
    PipeEq,
    #[token("||")]
    OrOr,
    #[token("^")]
    Caret,
    #[token("^=")]
    CaretEq,
    #[token("<<")]
    Shl,
    #[token("<<=")]
    ShlEq,
    #[token(">>")]
    Shr,
    #[token(">>=")]
    ShrEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("=")]
    Assign,
    #[token("==")]
    EqEq,
    #[token(":=")]
    ColonEq,
    #[token("!")]
    Not,
    #[token("!=")]
    NotEq,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("<-")]
    Arrow,
    #[token("~")]
    Tilde,
}

impl Token {
    /// Returns true for comment tokens
    pub fn is_comment(self) -> bool {
        matches!(self, Token::LineComment | Token::BlockComment)
    }

    /// Returns true if a newline after this token inserts a semicolon
    /// (Go spec: identifiers, literals, certain keywords, `++`/`--`, and
    /// closing delimiters end a statement)
    fn ends_statement(self) -> bool {
        matches!(
            self,
            Token::Ident
                | Token::Str
                | Token::RawStr
                | Token::Rune
                | Token::Number
                | Token::Break
                | Token::Continue
                | Token::Fallthrough
                | Token::Return
                | Token::Inc
                | Token::Dec
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
        )
    }
}

/// One lexed token with its byte span in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tok {
    /// Token kind
    pub kind: Token,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
}

impl Tok {
    /// The token's text within `src`
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

/// Lex Go source text into a token list including trivia.
///
/// Returns the byte offset of the first unlexable character on failure.
pub fn lex(src: &str) -> Result<Vec<Tok>, usize> {
    let mut lexer = Token::lexer(src);
    let mut tokens = Vec::new();
    while let Some(item) = lexer.next() {
        let span = lexer.span();
        match item {
            Ok(kind) => tokens.push(Tok {
                kind,
                start: span.start,
                end: span.end,
            }),
            Err(()) => return Err(span.start),
        }
    }
    Ok(tokens)
}

/// Apply Go's automatic semicolon insertion and drop trivia.
///
/// A newline (or a block comment containing one) after a statement-ending
/// token becomes a synthetic `;` token with a zero-width span at the break.
pub fn significant(src: &str, tokens: &[Tok]) -> Vec<Tok> {
    let mut out: Vec<Tok> = Vec::with_capacity(tokens.len());
    for tok in tokens {
        let breaks_line = match tok.kind {
            Token::Newline => true,
            Token::BlockComment => tok.text(src).contains('\n'),
            _ => false,
        };
        if breaks_line {
            if let Some(last) = out.last() {
                if last.kind.ends_statement() {
                    out.push(Tok {
                        kind: Token::Semi,
                        start: tok.start,
                        end: tok.start,
                    });
                }
            }
            continue;
        }
        if tok.kind.is_comment() {
            continue;
        }
        out.push(*tok);
    }
    // A final statement without a trailing newline still terminates
    if let Some(last) = out.last() {
        if last.kind.ends_statement() {
            let end = src.len();
            out.push(Tok {
                kind: Token::Semi,
                start: end,
                end,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_keywords_and_idents() {
        assert_eq!(kinds("package main"), vec![Token::Package, Token::Ident]);
        assert_eq!(kinds("foo_Bar9"), vec![Token::Ident]);
    }

    #[test]
    fn test_lex_string_forms() {
        assert_eq!(kinds(r#""hi\n""#), vec![Token::Str]);
        assert_eq!(kinds("`raw \\ text`"), vec![Token::RawStr]);
        assert_eq!(kinds(r"'\n'"), vec![Token::Rune]);
    }

    #[test]
    fn test_lex_numbers() {
        assert_eq!(kinds("0xFF_0f"), vec![Token::Number]);
        assert_eq!(kinds("1.5e-3"), vec![Token::Number]);
        assert_eq!(kinds("3i"), vec![Token::Number]);
    }

    #[test]
    fn test_lex_compound_operators() {
        assert_eq!(kinds("&^="), vec![Token::AmpCaretEq]);
        assert_eq!(kinds("<-"), vec![Token::Arrow]);
        assert_eq!(kinds("..."), vec![Token::Ellipsis]);
    }

    #[test]
    fn test_lex_rejects_unknown() {
        assert!(lex("var x = \u{1F600}").is_err());
    }

    #[test]
    fn test_semicolon_insertion() {
        let src = "x := 1\ny := 2\n";
        let toks = lex(src).unwrap();
        let sig = significant(src, &toks);
        let semis = sig.iter().filter(|t| t.kind == Token::Semi).count();
        assert_eq!(semis, 2);
    }

    #[test]
    fn test_no_semicolon_after_operator() {
        let src = "x := 1 +\n2\n";
        let toks = lex(src).unwrap();
        let sig = significant(src, &toks);
        // the newline after `+` must not end the statement
        let semis = sig.iter().filter(|t| t.kind == Token::Semi).count();
        assert_eq!(semis, 1);
    }

    #[test]
    fn test_comments_are_tokens() {
        let src = "// top\nx := 1 /* inline */\n";
        let toks = lex(src).unwrap();
        assert!(toks.iter().any(|t| t.kind == Token::LineComment));
        assert!(toks.iter().any(|t| t.kind == Token::BlockComment));
        let sig = significant(src, &toks);
        assert!(sig.iter().all(|t| !t.kind.is_comment()));
    }
}
