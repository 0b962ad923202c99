use crate::error::{ParseError, ParseResult};
use logos::Logos;
use std::fmt;

/// Token types for attribute expressions
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token<'src> {
    // Keywords
    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("null")]
    Null,

    #[token("undefined")]
    Undefined,

    #[token("in")]
    In,

    // Identifiers (`$props`, `_private`, `item2`)
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice())]
    Ident(&'src str),

    // String literals, either quote style
    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| lex.slice())]
    String(&'src str),

    // Numbers (sign is handled by the parser as unary minus)
    #[regex(r"([0-9]+(\.[0-9]+)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    Number(&'src str),

    // Symbols
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(":")]
    Colon,

    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("...")]
    Ellipsis,

    #[token("?")]
    Question,

    #[token("=")]
    Assign,

    #[token("==")]
    EqualsEquals,

    #[token("===")]
    StrictEquals,

    #[token("!=")]
    NotEquals,

    #[token("!==")]
    StrictNotEquals,

    #[token("<")]
    LAngle,

    #[token("<=")]
    LessThanEquals,

    #[token(">")]
    RAngle,

    #[token(">=")]
    GreaterThanEquals,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("!")]
    Bang,

    #[token("&&")]
    And,

    #[token("||")]
    Or,
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Undefined => write!(f, "undefined"),
            Token::In => write!(f, "keyword 'in'"),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::String(s) => write!(f, "string {}", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Colon => write!(f, "':'"),
            Token::Semicolon => write!(f, "';'"),
            Token::Comma => write!(f, "','"),
            Token::Dot => write!(f, "'.'"),
            Token::Ellipsis => write!(f, "'...'"),
            Token::Question => write!(f, "'?'"),
            Token::Assign => write!(f, "'='"),
            Token::EqualsEquals => write!(f, "'=='"),
            Token::StrictEquals => write!(f, "'==='"),
            Token::NotEquals => write!(f, "'!='"),
            Token::StrictNotEquals => write!(f, "'!=='"),
            Token::LAngle => write!(f, "'<'"),
            Token::LessThanEquals => write!(f, "'<='"),
            Token::RAngle => write!(f, "'>'"),
            Token::GreaterThanEquals => write!(f, "'>='"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Bang => write!(f, "'!'"),
            Token::And => write!(f, "'&&'"),
            Token::Or => write!(f, "'||'"),
        }
    }
}

/// Tokenize an expression source string.
///
/// Unlike a lossy lexer pass, unrecognised input is an error: attribute
/// expressions are short and a silently dropped character changes meaning.
pub fn tokenize(source: &str) -> ParseResult<Vec<(Token<'_>, std::ops::Range<usize>)>> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(ParseError::lexer_error(
                    span.start,
                    &source[span.start..span.end],
                ))
            }
        }
    }
    Ok(tokens)
}
