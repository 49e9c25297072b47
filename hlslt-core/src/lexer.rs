//! HLSL tokenizer.
//!
//! Produces `(Token, Span)` pairs and collects source comments with their
//! line numbers for the comment-passthrough option. A small preprocessor
//! subset runs inline: predefined macros substitute whole identifier
//! tokens, `#include` is resolved through the caller-provided handler,
//! and other directives are skipped.

use crate::ast::Span;
use crate::ty::ScalarType;
use crate::IncludeHandler;
use log::trace;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit0, digit1, hex_digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Struct,
    CBuffer,
    TBuffer,
    Typedef,
    RegisterKw,
    PackOffsetKw,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Discard,
    In,
    Out,
    InOut,
    Uniform,
    Const,
    Static,
    Extern,
    Volatile,
    Shared,
    GroupShared,
    RowMajor,
    ColumnMajor,
    Precise,
    Void,
    True,
    False,

    // Identifiers and literals
    Ident(String),
    IntLiteral(String),
    UIntLiteral(String),
    FloatLiteral(String, ScalarType),
    StringLiteral(String),

    // Delimiters
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,
    Question,

    // Operators
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    AndAnd,
    OrOr,
    Not,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Inc,
    Dec,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;
        let s = match self {
            Struct => "struct",
            CBuffer => "cbuffer",
            TBuffer => "tbuffer",
            Typedef => "typedef",
            RegisterKw => "register",
            PackOffsetKw => "packoffset",
            Return => "return",
            If => "if",
            Else => "else",
            For => "for",
            While => "while",
            Do => "do",
            Switch => "switch",
            Case => "case",
            Default => "default",
            Break => "break",
            Continue => "continue",
            Discard => "discard",
            In => "in",
            Out => "out",
            InOut => "inout",
            Uniform => "uniform",
            Const => "const",
            Static => "static",
            Extern => "extern",
            Volatile => "volatile",
            Shared => "shared",
            GroupShared => "groupshared",
            RowMajor => "row_major",
            ColumnMajor => "column_major",
            Precise => "precise",
            Void => "void",
            True => "true",
            False => "false",
            Ident(s) | IntLiteral(s) | UIntLiteral(s) | FloatLiteral(s, _) | StringLiteral(s) => {
                return write!(f, "{}", s)
            }
            LBrace => "{",
            RBrace => "}",
            LParen => "(",
            RParen => ")",
            LBracket => "[",
            RBracket => "]",
            Semicolon => ";",
            Comma => ",",
            Colon => ":",
            Dot => ".",
            Question => "?",
            Assign => "=",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            DivAssign => "/=",
            ModAssign => "%=",
            Eq => "==",
            Ne => "!=",
            Le => "<=",
            Ge => ">=",
            Lt => "<",
            Gt => ">",
            AndAnd => "&&",
            OrOr => "||",
            Not => "!",
            Amp => "&",
            Pipe => "|",
            Caret => "^",
            Tilde => "~",
            Shl => "<<",
            Shr => ">>",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Inc => "++",
            Dec => "--",
        };
        write!(f, "{}", s)
    }
}

/// A source comment kept for the passthrough option.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub line: u32,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct TokenStream {
    pub tokens: Vec<(Token, Span)>,
    pub comments: Vec<Comment>,
}

impl TokenStream {
    /// Re-serializes the token stream (used by the preprocess-only mode).
    pub fn to_source_string(&self) -> String {
        let mut out = String::new();
        let mut line = 1;
        for (token, span) in &self.tokens {
            if span.line > line {
                for _ in line..span.line {
                    out.push('\n');
                }
                line = span.line;
            } else if !out.is_empty() && !out.ends_with('\n') {
                out.push(' ');
            }
            out.push_str(&token.to_string());
        }
        out.push('\n');
        out
    }
}

fn keyword_or_ident(ident: &str) -> Token {
    match ident {
        "struct" => Token::Struct,
        "cbuffer" => Token::CBuffer,
        "tbuffer" => Token::TBuffer,
        "typedef" => Token::Typedef,
        "register" => Token::RegisterKw,
        "packoffset" => Token::PackOffsetKw,
        "return" => Token::Return,
        "if" => Token::If,
        "else" => Token::Else,
        "for" => Token::For,
        "while" => Token::While,
        "do" => Token::Do,
        "switch" => Token::Switch,
        "case" => Token::Case,
        "default" => Token::Default,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "discard" => Token::Discard,
        "in" => Token::In,
        "out" => Token::Out,
        "inout" => Token::InOut,
        "uniform" => Token::Uniform,
        "const" => Token::Const,
        "static" => Token::Static,
        "extern" => Token::Extern,
        "volatile" => Token::Volatile,
        "shared" => Token::Shared,
        "groupshared" => Token::GroupShared,
        "row_major" => Token::RowMajor,
        "column_major" => Token::ColumnMajor,
        "precise" => Token::Precise,
        "void" => Token::Void,
        "true" => Token::True,
        "false" => Token::False,
        _ => Token::Ident(ident.to_string()),
    }
}

fn parse_ident(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        keyword_or_ident,
    )(input)
}

fn parse_exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn parse_float_literal(input: &str) -> IResult<&str, Token> {
    map(
        pair(
            recognize(alt((
                recognize(tuple((digit1, char('.'), digit0, opt(parse_exponent)))),
                recognize(tuple((char('.'), digit1, opt(parse_exponent)))),
                recognize(pair(digit1, parse_exponent)),
            ))),
            opt(one_of("fFhH")),
        ),
        |(text, suffix): (&str, Option<char>)| {
            let scalar = match suffix {
                Some('h') | Some('H') => ScalarType::Half,
                _ => ScalarType::Float,
            };
            Token::FloatLiteral(text.to_string(), scalar)
        },
    )(input)
}

fn parse_int_literal(input: &str) -> IResult<&str, Token> {
    map(
        pair(
            recognize(alt((
                recognize(preceded(alt((tag("0x"), tag("0X"))), hex_digit1)),
                digit1,
            ))),
            opt(one_of("uU")),
        ),
        |(text, suffix): (&str, Option<char>)| match suffix {
            Some(s) => Token::UIntLiteral(format!("{}{}", text, s)),
            None => Token::IntLiteral(text.to_string()),
        },
    )(input)
}

fn parse_string_literal(input: &str) -> IResult<&str, Token> {
    map(
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        |s: &str| Token::StringLiteral(format!("\"{}\"", s)),
    )(input)
}

fn parse_operator(input: &str) -> IResult<&str, Token> {
    alt((
        alt((
            value(Token::Inc, tag("++")),
            value(Token::Dec, tag("--")),
            value(Token::AddAssign, tag("+=")),
            value(Token::SubAssign, tag("-=")),
            value(Token::MulAssign, tag("*=")),
            value(Token::DivAssign, tag("/=")),
            value(Token::ModAssign, tag("%=")),
            value(Token::Eq, tag("==")),
            value(Token::Ne, tag("!=")),
            value(Token::Le, tag("<=")),
            value(Token::Ge, tag(">=")),
            value(Token::AndAnd, tag("&&")),
            value(Token::OrOr, tag("||")),
            value(Token::Shl, tag("<<")),
            value(Token::Shr, tag(">>")),
        )),
        alt((
            value(Token::Assign, char('=')),
            value(Token::Lt, char('<')),
            value(Token::Gt, char('>')),
            value(Token::Not, char('!')),
            value(Token::Amp, char('&')),
            value(Token::Pipe, char('|')),
            value(Token::Caret, char('^')),
            value(Token::Tilde, char('~')),
            value(Token::Plus, char('+')),
            value(Token::Minus, char('-')),
            value(Token::Star, char('*')),
            value(Token::Slash, char('/')),
            value(Token::Percent, char('%')),
        )),
    ))(input)
}

fn parse_delimiter(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::LBrace, char('{')),
        value(Token::RBrace, char('}')),
        value(Token::LParen, char('(')),
        value(Token::RParen, char(')')),
        value(Token::LBracket, char('[')),
        value(Token::RBracket, char(']')),
        value(Token::Semicolon, char(';')),
        value(Token::Comma, char(',')),
        value(Token::Colon, char(':')),
        value(Token::Dot, char('.')),
        value(Token::Question, char('?')),
    ))(input)
}

fn parse_token(input: &str) -> IResult<&str, Token> {
    alt((
        parse_ident,
        parse_float_literal,
        parse_int_literal,
        parse_string_literal,
        parse_delimiter,
        parse_operator,
    ))(input)
}

fn parse_line_comment(input: &str) -> IResult<&str, &str> {
    preceded(tag("//"), take_while(|c| c != '\n'))(input)
}

fn parse_block_comment(input: &str) -> IResult<&str, &str> {
    delimited(tag("/*"), take_until("*/"), tag("*/"))(input)
}

/// Tokenizes plain source with no predefined macros and no includes.
pub fn tokenize(source: &str) -> Result<TokenStream, String> {
    tokenize_with(source, &HashMap::new(), &mut None)
}

/// Tokenizes with predefined macros and an optional include handler.
pub fn tokenize_with(
    source: &str,
    defines: &HashMap<String, String>,
    include_handler: &mut Option<&mut dyn IncludeHandler>,
) -> Result<TokenStream, String> {
    let mut stream = TokenStream::default();
    tokenize_into(source, defines, include_handler, &mut stream, 0)?;
    Ok(stream)
}

fn tokenize_into(
    source: &str,
    defines: &HashMap<String, String>,
    include_handler: &mut Option<&mut dyn IncludeHandler>,
    out: &mut TokenStream,
    depth: usize,
) -> Result<(), String> {
    if depth > 16 {
        return Err("preprocessor expansion too deep".to_string());
    }

    let mut remaining = source;
    let mut line: u32 = 1;
    let mut column: u32 = 1;
    let mut at_line_start = true;

    // Updates the position counters for a consumed slice.
    fn advance(consumed: &str, line: &mut u32, column: &mut u32) {
        for ch in consumed.chars() {
            if ch == '\n' {
                *line += 1;
                *column = 1;
            } else {
                *column += 1;
            }
        }
    }

    while !remaining.is_empty() {
        // Skip whitespace.
        let trimmed = remaining.trim_start_matches([' ', '\t', '\r', '\n']);
        if trimmed.len() != remaining.len() {
            let consumed = &remaining[..remaining.len() - trimmed.len()];
            if consumed.contains('\n') {
                at_line_start = true;
            }
            advance(consumed, &mut line, &mut column);
            remaining = trimmed;
            continue;
        }

        // Comments.
        if let Ok((rest, text)) = parse_line_comment(remaining) {
            out.comments.push(Comment {
                line,
                text: text.trim().to_string(),
            });
            advance(&remaining[..remaining.len() - rest.len()], &mut line, &mut column);
            remaining = rest;
            continue;
        }
        if let Ok((rest, text)) = parse_block_comment(remaining) {
            out.comments.push(Comment {
                line,
                text: text.trim().to_string(),
            });
            advance(&remaining[..remaining.len() - rest.len()], &mut line, &mut column);
            remaining = rest;
            continue;
        }

        // Preprocessor directives occupy the rest of the line.
        if at_line_start && remaining.starts_with('#') {
            let end = remaining.find('\n').unwrap_or(remaining.len());
            let directive = &remaining[..end];
            if let Some(name) = parse_include_directive(directive) {
                let included = match include_handler {
                    Some(handler) => handler.include(&name).map_err(|e| e.to_string())?,
                    None => {
                        return Err(format!("can not resolve include file \"{}\"", name));
                    }
                };
                tokenize_into(&included, defines, include_handler, out, depth + 1)?;
            } else {
                trace!("skipping preprocessor directive: {}", directive);
            }
            advance(directive, &mut line, &mut column);
            remaining = &remaining[end..];
            continue;
        }

        let span = Span::new(line, column);
        match parse_token(remaining) {
            Ok((rest, token)) => {
                at_line_start = false;
                // Predefined-macro substitution for plain identifiers.
                if let Token::Ident(name) = &token {
                    if let Some(replacement) = defines.get(name) {
                        let mut sub = TokenStream::default();
                        tokenize_into(replacement, defines, include_handler, &mut sub, depth + 1)?;
                        for (tok, _) in sub.tokens {
                            out.tokens.push((tok, span));
                        }
                        advance(&remaining[..remaining.len() - rest.len()], &mut line, &mut column);
                        remaining = rest;
                        continue;
                    }
                }
                advance(&remaining[..remaining.len() - rest.len()], &mut line, &mut column);
                out.tokens.push((token, span));
                remaining = rest;
            }
            Err(_) => {
                let ch = remaining.chars().next().unwrap_or('?');
                return Err(format!(
                    "unexpected character '{}' at {}:{}",
                    ch, line, column
                ));
            }
        }
    }

    Ok(())
}

fn parse_include_directive(directive: &str) -> Option<String> {
    let rest = directive.strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("include")?.trim_start();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_of(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .tokens
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_tokenize_keywords_and_idents() {
        assert_eq!(
            tokens_of("struct VSIn cbuffer"),
            vec![
                Token::Struct,
                Token::Ident("VSIn".to_string()),
                Token::CBuffer,
            ]
        );
    }

    #[test]
    fn test_tokenize_literals() {
        assert_eq!(
            tokens_of("42 42u 0x1F 1.5 .5 1.0f 2.0h 1e3"),
            vec![
                Token::IntLiteral("42".to_string()),
                Token::UIntLiteral("42u".to_string()),
                Token::IntLiteral("0x1F".to_string()),
                Token::FloatLiteral("1.5".to_string(), ScalarType::Float),
                Token::FloatLiteral(".5".to_string(), ScalarType::Float),
                Token::FloatLiteral("1.0".to_string(), ScalarType::Float),
                Token::FloatLiteral("2.0".to_string(), ScalarType::Half),
                Token::FloatLiteral("1e3".to_string(), ScalarType::Float),
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            tokens_of("a += b << 2 && !c"),
            vec![
                Token::Ident("a".to_string()),
                Token::AddAssign,
                Token::Ident("b".to_string()),
                Token::Shl,
                Token::IntLiteral("2".to_string()),
                Token::AndAnd,
                Token::Not,
                Token::Ident("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_member_access_is_not_float() {
        assert_eq!(
            tokens_of("pos.xyz"),
            vec![
                Token::Ident("pos".to_string()),
                Token::Dot,
                Token::Ident("xyz".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_collected() {
        let stream = tokenize("// header\nfloat x; /* block */ float y;").unwrap();
        assert_eq!(stream.comments.len(), 2);
        assert_eq!(stream.comments[0].text, "header");
        assert_eq!(stream.comments[0].line, 1);
        assert_eq!(stream.comments[1].text, "block");
    }

    #[test]
    fn test_spans_track_lines() {
        let stream = tokenize("float x;\nfloat y;").unwrap();
        let spans: Vec<u32> = stream.tokens.iter().map(|(_, s)| s.line).collect();
        assert_eq!(spans, vec![1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_predefined_macro_substitution() {
        let mut defines = HashMap::new();
        defines.insert("SIZE".to_string(), "16".to_string());
        let stream = tokenize_with("float v[SIZE];", &defines, &mut None).unwrap();
        let tokens: Vec<Token> = stream.tokens.into_iter().map(|(t, _)| t).collect();
        assert!(tokens.contains(&Token::IntLiteral("16".to_string())));
        assert!(!tokens
            .iter()
            .any(|t| matches!(t, Token::Ident(s) if s == "SIZE")));
    }

    #[test]
    fn test_unknown_directives_skipped() {
        let stream = tokenize("#pragma something\nfloat x;").unwrap();
        assert_eq!(stream.tokens.len(), 3);
    }

    #[test]
    fn test_missing_include_fails() {
        let err = tokenize("#include \"lib.hlsl\"\n").unwrap_err();
        assert!(err.contains("lib.hlsl"));
    }
}
