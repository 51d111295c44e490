//! Strict literal-mapping decoder for tool arguments.
//!
//! Accepts exactly one mapping literal and nothing that could be evaluated:
//!
//! ```text
//! mapping = "{" [ entry ("," entry)* [","] ] "}"
//! entry   = STRING ":" value
//! value   = STRING | NUMBER | BOOL | NULL | list | tuple | mapping
//! list    = "[" [ value ("," value)* [","] ] "]"
//! tuple   = "(" [ value ("," value)* [","] ] ")"      (decoded as a list)
//! BOOL    = "true" | "false" | "True" | "False"
//! NULL    = "null" | "None"
//! ```
//!
//! Strings may be single- or double-quoted. Duplicate keys keep the last
//! value.

use fsmkit_core::ToolArgs;
use serde_json::{Map, Number, Value};

/// Deepest nesting of mappings, lists and tuples a literal may use.
pub const MAX_DEPTH: usize = 64;

/// Why a literal could not be decoded, and where.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at offset {offset})")]
pub struct LiteralError {
    /// Byte offset into the decoded text
    pub offset: usize,
    pub message: String,
}

impl LiteralError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Decode a mapping literal into tool arguments.
pub fn parse_mapping(input: &str) -> Result<ToolArgs, LiteralError> {
    let tokens = tokenize(input)?;
    let (value, rest) = parse_value(&tokens, input.len(), 0)?;

    if let Some((offset, token)) = rest.first() {
        return Err(LiteralError::new(
            *offset,
            format!("unexpected {} after the mapping", token.describe()),
        ));
    }

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(LiteralError::new(
            tokens.first().map(|(o, _)| *o).unwrap_or(0),
            "arguments must be a mapping in curly braces",
        )),
    }
}

// ─── Tokenizer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    Str(String),
    Num(Number),
    Bool(bool),
    Null,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LBrace => "'{'".into(),
            Token::RBrace => "'}'".into(),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Colon => "':'".into(),
            Token::Comma => "','".into(),
            Token::Str(s) => format!("string {s:?}"),
            Token::Num(n) => format!("number {n}"),
            Token::Bool(b) => format!("boolean {b}"),
            Token::Null => "null".into(),
        }
    }
}

type Spanned = (usize, Token);

fn tokenize(input: &str) -> Result<Vec<Spanned>, LiteralError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let punct = match c {
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = punct {
            chars.next();
            tokens.push((offset, token));
            continue;
        }

        match c {
            _ if c.is_whitespace() => {
                chars.next();
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((at, '\\')) => s.push(read_escape(&mut chars, at)?),
                        Some((_, ch)) if ch == quote => break,
                        Some((at, '\n')) => {
                            return Err(LiteralError::new(at, "newline inside string literal"));
                        }
                        Some((_, ch)) => s.push(ch),
                        None => return Err(LiteralError::new(offset, "unterminated string literal")),
                    }
                }
                tokens.push((offset, Token::Str(s)));
            }
            _ if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let mut text = String::new();
                while let Some(&(_, nc)) = chars.peek() {
                    let sign_after_exponent =
                        (nc == '-' || nc == '+') && text.ends_with(['e', 'E']);
                    let leading_sign = (nc == '-' || nc == '+') && text.is_empty();
                    if nc.is_ascii_digit()
                        || nc == '.'
                        || nc == 'e'
                        || nc == 'E'
                        || nc == '_'
                        || leading_sign
                        || sign_after_exponent
                    {
                        text.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((offset, Token::Num(parse_number(&text, offset)?)));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, wc)) = chars.peek() {
                    if wc.is_alphanumeric() || wc == '_' {
                        word.push(wc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match word.as_str() {
                    "true" | "True" => Token::Bool(true),
                    "false" | "False" => Token::Bool(false),
                    "null" | "None" => Token::Null,
                    _ => {
                        return Err(LiteralError::new(
                            offset,
                            format!("names are not allowed, found '{word}'"),
                        ));
                    }
                };
                tokens.push((offset, token));
            }
            _ => {
                return Err(LiteralError::new(
                    offset,
                    format!("unexpected character '{c}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

fn read_escape(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    at: usize,
) -> Result<char, LiteralError> {
    let escaped = match chars.next() {
        Some((_, 'n')) => '\n',
        Some((_, 't')) => '\t',
        Some((_, 'r')) => '\r',
        Some((_, '0')) => '\0',
        Some((_, '\\')) => '\\',
        Some((_, '\'')) => '\'',
        Some((_, '"')) => '"',
        Some((_, 'u')) => {
            let mut hex = String::with_capacity(4);
            for _ in 0..4 {
                match chars.next() {
                    Some((_, h)) if h.is_ascii_hexdigit() => hex.push(h),
                    _ => return Err(LiteralError::new(at, "\\u escape needs four hex digits")),
                }
            }
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| LiteralError::new(at, format!("invalid code point \\u{hex}")))?
        }
        Some((_, other)) => {
            return Err(LiteralError::new(at, format!("unknown escape '\\{other}'")));
        }
        None => return Err(LiteralError::new(at, "unterminated string literal")),
    };
    Ok(escaped)
}

fn parse_number(text: &str, offset: usize) -> Result<Number, LiteralError> {
    let digits = text.replace('_', "");
    let invalid = || LiteralError::new(offset, format!("invalid number '{text}'"));

    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let is_float = digits.contains(['.', 'e', 'E']);
    if !is_float {
        let unsigned = digits.strip_prefix('+').unwrap_or(&digits);
        if let Ok(n) = unsigned.parse::<i64>() {
            return Ok(Number::from(n));
        }
        if let Ok(n) = unsigned.parse::<u64>() {
            return Ok(Number::from(n));
        }
        // Wider integers lose precision but stay numbers
    }

    let value: f64 = digits.parse().map_err(|_| invalid())?;
    Number::from_f64(value)
        .ok_or_else(|| LiteralError::new(offset, format!("number '{text}' is not finite")))
}

// ─── Parser ──────────────────────────────────────────────────────────

fn parse_value(
    tokens: &[Spanned],
    end: usize,
    depth: usize,
) -> Result<(Value, &[Spanned]), LiteralError> {
    let Some(((offset, token), rest)) = tokens.split_first() else {
        return Err(LiteralError::new(end, "expected a value, found end of input"));
    };

    let opens_container = matches!(token, Token::LBrace | Token::LBracket | Token::LParen);
    if opens_container && depth >= MAX_DEPTH {
        return Err(LiteralError::new(
            *offset,
            format!("nesting is too deep (more than {MAX_DEPTH} levels)"),
        ));
    }

    match token {
        Token::LBrace => parse_entries(rest, end, depth + 1),
        Token::LBracket => parse_items(rest, end, Token::RBracket, depth + 1),
        Token::LParen => parse_items(rest, end, Token::RParen, depth + 1),
        Token::Str(s) => Ok((Value::String(s.clone()), rest)),
        Token::Num(n) => Ok((Value::Number(n.clone()), rest)),
        Token::Bool(b) => Ok((Value::Bool(*b), rest)),
        Token::Null => Ok((Value::Null, rest)),
        other => Err(LiteralError::new(
            *offset,
            format!("expected a value, found {}", other.describe()),
        )),
    }
}

/// Parse mapping entries after the opening brace.
fn parse_entries(
    mut tokens: &[Spanned],
    end: usize,
    depth: usize,
) -> Result<(Value, &[Spanned]), LiteralError> {
    let mut map = Map::new();

    loop {
        match tokens.split_first() {
            Some(((_, Token::RBrace), rest)) => return Ok((Value::Object(map), rest)),
            Some(((_, Token::Str(key)), rest)) => {
                let rest = expect(rest, end, Token::Colon)?;
                let (value, rest) = parse_value(rest, end, depth)?;
                map.insert(key.clone(), value);
                tokens = match rest.split_first() {
                    Some(((_, Token::Comma), rest)) => rest,
                    Some(((_, Token::RBrace), _)) => rest,
                    Some(((offset, other), _)) => {
                        return Err(LiteralError::new(
                            *offset,
                            format!("expected ',' or '}}', found {}", other.describe()),
                        ));
                    }
                    None => return Err(LiteralError::new(end, "unterminated mapping")),
                };
            }
            Some(((offset, other), _)) => {
                return Err(LiteralError::new(
                    *offset,
                    format!("mapping keys must be quoted strings, found {}", other.describe()),
                ));
            }
            None => return Err(LiteralError::new(end, "unterminated mapping")),
        }
    }
}

/// Parse list or tuple items after the opening bracket.
fn parse_items(
    mut tokens: &[Spanned],
    end: usize,
    close: Token,
    depth: usize,
) -> Result<(Value, &[Spanned]), LiteralError> {
    let mut items = Vec::new();

    loop {
        if let Some(((_, token), rest)) = tokens.split_first()
            && *token == close
        {
            return Ok((Value::Array(items), rest));
        }

        let (value, rest) = parse_value(tokens, end, depth)?;
        items.push(value);
        tokens = match rest.split_first() {
            Some(((_, Token::Comma), rest)) => rest,
            Some(((_, token), _)) if *token == close => rest,
            Some(((offset, other), _)) => {
                return Err(LiteralError::new(
                    *offset,
                    format!("expected ',' or {}, found {}", close.describe(), other.describe()),
                ));
            }
            None => return Err(LiteralError::new(end, "unterminated sequence")),
        };
    }
}

fn expect(tokens: &[Spanned], end: usize, wanted: Token) -> Result<&[Spanned], LiteralError> {
    match tokens.split_first() {
        Some(((_, token), rest)) if *token == wanted => Ok(rest),
        Some(((offset, other), _)) => Err(LiteralError::new(
            *offset,
            format!("expected {}, found {}", wanted.describe(), other.describe()),
        )),
        None => Err(LiteralError::new(
            end,
            format!("expected {}, found end of input", wanted.describe()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(input: &str) -> Value {
        Value::Object(parse_mapping(input).unwrap())
    }

    #[test]
    fn json_style_mapping() {
        assert_eq!(decode(r#"{"a": 2, "b": 3}"#), json!({"a": 2, "b": 3}));
    }

    #[test]
    fn python_style_literals() {
        let value = decode("{'name': 'Ada', 'ok': True, 'none': None, 'pair': (1, 2.5), 'off': False}");
        assert_eq!(
            value,
            json!({"name": "Ada", "ok": true, "none": null, "pair": [1, 2.5], "off": false})
        );
    }

    #[test]
    fn nested_values_and_trailing_commas() {
        let value = decode("{\n  'outer': {'inner': [1, [2, 3,], {}],},\n  'neg': -4,\n}");
        assert_eq!(value, json!({"outer": {"inner": [1, [2, 3], {}]}, "neg": -4}));
    }

    #[test]
    fn numbers_in_every_form() {
        let value = decode("{'i': 42, 'f': 0.5, 'e': 1e3, 'n': -2.5E-1, 'u': 1_000}");
        assert_eq!(value, json!({"i": 42, "f": 0.5, "e": 1000.0, "n": -0.25, "u": 1000}));
    }

    #[test]
    fn string_escapes() {
        let value = decode(r#"{"s": "line\nnext \"q\" é", 't': 'it\'s'}"#);
        assert_eq!(value, json!({"s": "line\nnext \"q\" é", "t": "it's"}));
    }

    #[test]
    fn empty_mapping() {
        assert!(parse_mapping("  {}  ").unwrap().is_empty());
    }

    #[test]
    fn duplicate_keys_keep_last() {
        assert_eq!(decode("{'a': 1, 'a': 2}"), json!({"a": 2}));
    }

    #[test]
    fn rejects_expressions_and_names() {
        for input in [
            "{'a': __import__('os').system('ls')}",
            "{'a': 1 + 2}",
            "{'a': x}",
            "{'a': open('f')}",
            "{'a': [i for i in y]}",
        ] {
            assert!(parse_mapping(input).is_err(), "accepted {input}");
        }
    }

    #[test]
    fn rejects_non_mapping_top_level() {
        let err = parse_mapping("[1, 2]").unwrap_err();
        assert!(err.message.contains("mapping"));
        assert!(parse_mapping("").is_err());
        assert!(parse_mapping("'text'").is_err());
    }

    #[test]
    fn rejects_unquoted_and_numeric_keys() {
        let err = parse_mapping("{a: 1}").unwrap_err();
        assert_eq!(err.offset, 1);
        let err = parse_mapping("{1: 'x'}").unwrap_err();
        assert!(err.message.contains("quoted strings"));
    }

    #[test]
    fn rejects_trailing_input() {
        let err = parse_mapping("{'a': 1} {'b': 2}").unwrap_err();
        assert_eq!(err.offset, 9);
    }

    #[test]
    fn reports_unterminated_input() {
        assert!(parse_mapping("{'a': 1").unwrap_err().message.contains("unterminated"));
        assert!(parse_mapping("{'a': 'open").unwrap_err().message.contains("unterminated"));
        assert!(parse_mapping("{'a': [1, 2}").is_err());
    }

    #[test]
    fn rejects_missing_separator() {
        let err = parse_mapping("{'a': 1 'b': 2}").unwrap_err();
        assert!(err.message.contains("expected ','"));
    }

    #[test]
    fn wide_integers_fall_back_to_unsigned_then_float() {
        assert_eq!(
            decode("{'a': 18446744073709551615}"),
            json!({"a": u64::MAX})
        );
        let value = decode("{'a': 99999999999999999999}");
        assert_eq!(value["a"].as_f64(), Some(1e20));
        assert!(parse_mapping("{'a': -99999999999999999999}").unwrap()["a"].is_f64());
    }

    #[test]
    fn nesting_up_to_the_limit_is_accepted() {
        // The outer mapping is one level
        let depth = MAX_DEPTH - 1;
        let input = format!("{{'a': {}1{}}}", "[".repeat(depth), "]".repeat(depth));
        assert!(parse_mapping(&input).is_ok());
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        for depth in [MAX_DEPTH, 2_000, 20_000] {
            let input = format!("{{'a': {}1{}}}", "[".repeat(depth), "]".repeat(depth));
            let err = parse_mapping(&input).unwrap_err();
            assert!(err.message.contains("too deep"), "depth {depth}: {err}");
        }
        let err = parse_mapping(&format!("{}{}", "{'k': ".repeat(5_000), "1")).unwrap_err();
        assert!(err.message.contains("too deep"));
    }

    #[test]
    fn rejects_junk_numbers() {
        assert!(parse_mapping("{'a': 1.2.3}").is_err());
        assert!(parse_mapping("{'a': -}").is_err());
        assert!(parse_mapping("{'a': 1e999}").is_err());
    }
}
