//! Tokenizer for the IL text format
//!
//! Built on logos. Newlines are significant: the grammar is line oriented,
//! so they are kept as tokens while other whitespace and comments are
//! skipped.

use super::ParseError;
use logos::Logos;
use std::ops::Range;

/// IL text token
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+|(//|#)[^\n]*")]
pub enum Token {
    /// End of line
    #[token("\n")]
    Newline,

    /// `(`
    #[token("(")]
    LParen,

    /// `)`
    #[token(")")]
    RParen,

    /// `{`
    #[token("{")]
    LBrace,

    /// `}`
    #[token("}")]
    RBrace,

    /// `,`
    #[token(",")]
    Comma,

    /// `:`
    #[token(":")]
    Colon,

    /// `=`
    #[token("=")]
    Equals,

    /// `->`
    #[token("->")]
    Arrow,

    /// `@name`
    #[regex(r"@[A-Za-z0-9_.$]+", |lex| lex.slice()[1..].to_string())]
    Global(String),

    /// `%name`
    #[regex(r"%[A-Za-z0-9_.$]+", |lex| lex.slice()[1..].to_string())]
    Local(String),

    /// `^label`
    #[regex(r"\^[A-Za-z0-9_.$]+", |lex| lex.slice()[1..].to_string())]
    Label(String),

    /// Integer literal
    #[regex(r"-?[0-9]+", parse_int)]
    #[regex(r"-?0x[0-9a-fA-F]+", parse_hex)]
    Int(i64),

    /// Float literal
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", parse_float)]
    #[token("-inf", |_| f64::NEG_INFINITY)]
    Float(f64),

    /// String literal, unescaped
    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    Str(String),

    /// Keyword, mnemonic, type name or bare label
    #[regex(r"[A-Za-z_.][A-Za-z0-9_.]*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_hex(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    let slice = lex.slice();
    let (negative, digits) = match slice.strip_prefix('-') {
        Some(rest) => (true, &rest[2..]),
        None => (false, &slice[2..]),
    };
    let magnitude = u64::from_str_radix(digits, 16).ok()? as i64;
    Some(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let s = lex.slice();
    unescape(&s[1..s.len() - 1])
}

/// Undo [`escape`]
pub fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'x' => {
                let hi = chars.next()?.to_digit(16)?;
                let lo = chars.next()?.to_digit(16)?;
                out.push(char::from_u32(hi * 16 + lo)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Escape a string literal body for the text format
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// A token with its position
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// Token
    pub token: Token,
    /// Byte range in the source
    pub span: Range<usize>,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

/// Tokenize IL text
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut line = 1u32;
    let mut line_start = 0usize;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let column = (source[line_start..span.start].chars().count() + 1) as u32;
        match result {
            Ok(token) => {
                let is_newline = token == Token::Newline;
                tokens.push(Spanned {
                    token,
                    span: span.clone(),
                    line,
                    column,
                });
                if is_newline {
                    line += 1;
                    line_start = span.end;
                }
            }
            Err(()) => {
                let text = &source[span.clone()];
                let message = if text.starts_with('"') {
                    "malformed string literal".to_string()
                } else if text.starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
                    format!("invalid number '{}'", text)
                } else {
                    format!("unexpected character '{}'", text.chars().next().unwrap_or('?'))
                };
                return Err(ParseError::new(line, column, message));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_lex_instruction_line() {
        assert_eq!(
            kinds("%v0 = add %a, -2 // comment\n"),
            vec![
                Token::Local("v0".into()),
                Token::Equals,
                Token::Ident("add".into()),
                Token::Local("a".into()),
                Token::Comma,
                Token::Int(-2),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_lex_branch_and_labels() {
        assert_eq!(
            kinds("cbr %c, ^then(1.5), else"),
            vec![
                Token::Ident("cbr".into()),
                Token::Local("c".into()),
                Token::Comma,
                Token::Label("then".into()),
                Token::LParen,
                Token::Float(1.5),
                Token::RParen,
                Token::Comma,
                Token::Ident("else".into()),
            ]
        );
    }

    #[test]
    fn test_lex_strings_and_hash_comments() {
        assert_eq!(
            kinds("global const str @.L0 = \"a\\n\\\"b\\x01\" # trailing"),
            vec![
                Token::Ident("global".into()),
                Token::Ident("const".into()),
                Token::Ident("str".into()),
                Token::Global(".L0".into()),
                Token::Equals,
                Token::Str("a\n\"b\u{1}".into()),
            ]
        );
    }

    #[test]
    fn test_lex_numbers() {
        assert_eq!(kinds("0x10"), vec![Token::Int(16)]);
        assert_eq!(kinds("1e3"), vec![Token::Float(1000.0)]);
        assert_eq!(kinds("-inf"), vec![Token::Float(f64::NEG_INFINITY)]);
        assert_eq!(kinds("-9223372036854775808"), vec![Token::Int(i64::MIN)]);
    }

    #[test]
    fn test_lex_error_position() {
        let err = tokenize("ret\n  ~").unwrap_err();
        assert_eq!((err.line, err.column), (2, 3));
    }

    #[test]
    fn test_escape_round_trip() {
        let original = "tab\there \"quoted\" \\ \u{7}bell";
        assert_eq!(unescape(&escape(original)).as_deref(), Some(original));
    }
}
