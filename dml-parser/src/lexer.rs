//! Dml lexer using logos for tokenization

use dml_core::error::DmlError;
use logos::Logos;

fn unescape(slice: &str) -> Option<Box<str>> {
    let inner = &slice[1..slice.len() - 1];
    let mut res = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => res.push('\n'),
                't' => res.push('\t'),
                '\\' => res.push('\\'),
                '"' => res.push('"'),
                other => {
                    res.push('\\');
                    res.push(other);
                }
            }
        } else {
            res.push(c);
        }
    }
    Some(res.into())
}

/// Token types for dml scripts
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // ── Literals ─────────────────────────────────────────────
    /// `TRUE`
    #[token("TRUE")]
    True,
    /// `FALSE`
    #[token("FALSE")]
    False,
    /// Double literal
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Double(f64),
    /// Integer literal
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    /// String literal with escapes resolved
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    String(Box<str>),

    // ── Identifiers ──────────────────────────────────────────
    /// Identifier, may contain dots
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_.]*", priority = 1, callback = |lex| Box::<str>::from(lex.slice()))]
    Ident(Box<str>),

    // ── Operators ────────────────────────────────────────────
    /// `%*%`
    #[token("%*%")]
    MatMul,
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `*`
    #[token("*")]
    Star,
    /// `/`
    #[token("/")]
    Slash,
    /// `^`
    #[token("^")]
    Caret,
    /// `=`
    #[token("=")]
    Assign,
    /// `<-`
    #[token("<-")]
    LeftArrow,

    // ── Delimiters ───────────────────────────────────────────
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `,`
    #[token(",")]
    Comma,
    /// `;`
    #[token(";")]
    Semi,
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Token::True => f.write_str("TRUE"),
            Token::False => f.write_str("FALSE"),
            Token::Double(x) => f.write_fmt(format_args!("{x}")),
            Token::Int(x) => f.write_fmt(format_args!("{x}")),
            Token::String(x) => f.write_fmt(format_args!("{x:?}")),
            Token::Ident(x) => f.write_str(x),
            Token::MatMul => f.write_str("%*%"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::Assign => f.write_str("="),
            Token::LeftArrow => f.write_str("<-"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Semi => f.write_str(";"),
        }
    }
}

/// A token with the line it starts on
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    /// Token
    pub token: Token,
    /// Line number, starting at 1
    pub line: usize,
}

/// Tokenize dml source, stripping comments and returning tokens with lines
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, DmlError> {
    let line_starts: Vec<usize> = core::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| line_starts.partition_point(|start| *start <= offset);
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        let line = line_of(span.start);
        match result {
            Ok(token) => tokens.push(SpannedToken { token, line }),
            Err(()) => {
                return Err(DmlError::parse_error(format!(
                    "Unexpected input {:?} at line {line}",
                    &source[span]
                )))
            }
        }
    }
    Ok(tokens)
}

#[test]
fn tokenize_assignment() -> Result<(), DmlError> {
    let tokens = tokenize("# sum of vector\nV = read(\"in/v\", rows=10);\nx <- 1.5e3 %*% .5")?;
    let kinds: Vec<Token> = tokens.iter().map(|t| t.token.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            Token::Ident("V".into()),
            Token::Assign,
            Token::Ident("read".into()),
            Token::LParen,
            Token::String("in/v".into()),
            Token::Comma,
            Token::Ident("rows".into()),
            Token::Assign,
            Token::Int(10),
            Token::RParen,
            Token::Semi,
            Token::Ident("x".into()),
            Token::LeftArrow,
            Token::Double(1500.0),
            Token::MatMul,
            Token::Double(0.5),
        ]
    );
    assert_eq!(tokens[0].line, 2);
    assert_eq!(tokens[11].line, 3);
    Ok(())
}

#[test]
fn tokenize_rejects_unknown_characters() {
    let err = tokenize("x = 3 @ 4").err();
    assert!(matches!(err, Some(DmlError::ParseError(_))));
}

#[test]
fn keywords_and_dotted_identifiers() -> Result<(), DmlError> {
    let tokens = tokenize("as.scalar(TRUE) TRUEISH")?;
    assert_eq!(tokens[0].token, Token::Ident("as.scalar".into()));
    assert_eq!(tokens[2].token, Token::True);
    assert_eq!(tokens[4].token, Token::Ident("TRUEISH".into()));
    Ok(())
}
