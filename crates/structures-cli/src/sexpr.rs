//! A trivial s-expression reader: just enough syntax to write `.rep`
//! definition files for the driver's own tests and demos.
//!
//! This is deliberately not a real reader (that's an external
//! collaborator per the engine's own docs — see `structures-core`'s
//! crate-level comment): no reader macros, no dotted pairs, no rational
//! or character literals, no vectors. Atoms, strings, integers, `#t`/
//! `#f`, lists, and a leading `'` as sugar for `(quote x)` are all it
//! supports, which is exactly what `FilesystemLoader` needs to drive
//! `define`/`require`/`structure` forms.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    Symbol(String),
    Int(i64),
    Str(String),
    Bool(bool),
    List(Vec<SExpr>),
}

impl SExpr {
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Self::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ReadError {
    pub message: String,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ReadError {}

fn err(message: impl Into<String>) -> ReadError {
    ReadError { message: message.into() }
}

/// Reads every top-level form in `source`.
pub fn read_all(source: &str) -> Result<Vec<SExpr>, ReadError> {
    let mut chars: Vec<char> = source.chars().collect();
    chars.push('\0');
    let mut pos = 0;
    let mut forms = Vec::new();
    loop {
        skip_atmosphere(&chars, &mut pos);
        if chars[pos] == '\0' {
            break;
        }
        forms.push(read_form(&chars, &mut pos)?);
    }
    Ok(forms)
}

fn skip_atmosphere(chars: &[char], pos: &mut usize) {
    loop {
        while chars[*pos].is_whitespace() {
            *pos += 1;
        }
        if chars[*pos] == ';' {
            while chars[*pos] != '\n' && chars[*pos] != '\0' {
                *pos += 1;
            }
            continue;
        }
        break;
    }
}

fn read_form(chars: &[char], pos: &mut usize) -> Result<SExpr, ReadError> {
    skip_atmosphere(chars, pos);
    match chars[*pos] {
        '\0' => Err(err("unexpected end of input")),
        '(' => read_list(chars, pos),
        ')' => Err(err("unexpected ')'")),
        '\'' => {
            *pos += 1;
            let quoted = read_form(chars, pos)?;
            Ok(SExpr::List(vec![SExpr::Symbol("quote".to_owned()), quoted]))
        }
        '"' => read_string(chars, pos),
        _ => read_atom(chars, pos),
    }
}

fn read_list(chars: &[char], pos: &mut usize) -> Result<SExpr, ReadError> {
    *pos += 1; // consume '('
    let mut items = Vec::new();
    loop {
        skip_atmosphere(chars, pos);
        match chars[*pos] {
            '\0' => return Err(err("unterminated list")),
            ')' => {
                *pos += 1;
                return Ok(SExpr::List(items));
            }
            _ => items.push(read_form(chars, pos)?),
        }
    }
}

fn read_string(chars: &[char], pos: &mut usize) -> Result<SExpr, ReadError> {
    *pos += 1; // consume opening '"'
    let mut text = String::new();
    loop {
        match chars[*pos] {
            '\0' => return Err(err("unterminated string literal")),
            '"' => {
                *pos += 1;
                return Ok(SExpr::Str(text));
            }
            '\\' => {
                *pos += 1;
                text.push(chars[*pos]);
                *pos += 1;
            }
            c => {
                text.push(c);
                *pos += 1;
            }
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';' | '\0' | '\'')
}

fn read_atom(chars: &[char], pos: &mut usize) -> Result<SExpr, ReadError> {
    let start = *pos;
    while !is_delimiter(chars[*pos]) {
        *pos += 1;
    }
    let text: String = chars[start..*pos].iter().collect();
    if text.is_empty() {
        return Err(err(format!("unexpected character '{}'", chars[*pos])));
    }
    Ok(match text.as_str() {
        "#t" => SExpr::Bool(true),
        "#f" => SExpr::Bool(false),
        _ => match text.parse::<i64>() {
            Ok(n) => SExpr::Int(n),
            Err(_) => SExpr::Symbol(text),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_atoms() {
        let forms = read_all("foo 42 #t #f").unwrap();
        assert_eq!(
            forms,
            vec![
                SExpr::Symbol("foo".to_owned()),
                SExpr::Int(42),
                SExpr::Bool(true),
                SExpr::Bool(false),
            ]
        );
    }

    #[test]
    fn reads_a_nested_list() {
        let forms = read_all("(define x (+ 1 2))").unwrap();
        assert_eq!(
            forms,
            vec![SExpr::List(vec![
                SExpr::Symbol("define".to_owned()),
                SExpr::Symbol("x".to_owned()),
                SExpr::List(vec![
                    SExpr::Symbol("+".to_owned()),
                    SExpr::Int(1),
                    SExpr::Int(2),
                ]),
            ])]
        );
    }

    #[test]
    fn quote_sugar_desugars_to_a_quote_form() {
        let forms = read_all("'foo").unwrap();
        assert_eq!(
            forms,
            vec![SExpr::List(vec![
                SExpr::Symbol("quote".to_owned()),
                SExpr::Symbol("foo".to_owned()),
            ])]
        );
    }

    #[test]
    fn skips_comments() {
        let forms = read_all("; a comment\n(define x 1) ; trailing\n").unwrap();
        assert_eq!(forms.len(), 1);
    }

    #[test]
    fn reads_string_literals_with_escapes() {
        let forms = read_all(r#""hello \"world\"""#).unwrap();
        assert_eq!(forms, vec![SExpr::Str("hello \"world\"".to_owned())]);
    }

    #[test]
    fn rejects_unterminated_list() {
        assert!(read_all("(define x 1").is_err());
    }

    #[test]
    fn rejects_stray_close_paren() {
        assert!(read_all(")").is_err());
    }
}
