use std::sync::Arc;

use crate::{
    error::{ParseError, ParseErrorKind},
    grammar::Term,
    lr::Symbol,
    value::Value,
};

type LexResult<T> = Result<T, ParseError>;

/// Token source driving the LR parser.
///
/// Once the input is exhausted every call returns the end of input symbol
/// (terminal id `0`).
pub trait Lexer {
    type Value;

    fn next_token(&mut self) -> Result<Symbol<Self::Value>, ParseError>;

    /// Current line (1-indexed).
    fn line(&self) -> usize;

    /// Current column (1-indexed).
    fn column(&self) -> usize;
}

/// Semantic value carried by a token.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Lexeme {
    #[default]
    None,
    Ident(Arc<str>),
    Literal(Value),
    Text(Arc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Code,
    /// Inside `${ }`, with the number of unclosed `{`.
    Placeholder(usize),
}

const KEYWORDS: &[(&str, Term)] = &[
    ("var", Term::Var),
    ("if", Term::If),
    ("else", Term::Else),
    ("for", Term::For),
    ("where", Term::Where),
    ("function", Term::Function),
    ("return", Term::Return),
    ("break", Term::Break),
    ("continue", Term::Continue),
    ("true", Term::True),
    ("false", Term::False),
    ("null", Term::Null),
];

/// Longest operators first.
const OPERATORS: &[(&str, Term)] = &[
    (">>>", Term::URShift),
    ("..", Term::DotDot),
    ("<<", Term::LShift),
    (">>", Term::RShift),
    ("<=", Term::Le),
    (">=", Term::Ge),
    ("==", Term::Eq),
    ("!=", Term::Ne),
    ("&&", Term::AndAnd),
    ("||", Term::OrOr),
    (";", Term::Semi),
    (",", Term::Comma),
    (".", Term::Dot),
    (":", Term::Colon),
    ("(", Term::LParen),
    (")", Term::RParen),
    ("[", Term::LBrack),
    ("]", Term::RBrack),
    ("{", Term::LBrace),
    ("}", Term::RBrace),
    ("=", Term::Assign),
    ("|", Term::Or),
    ("^", Term::Xor),
    ("&", Term::And),
    ("<", Term::Lt),
    (">", Term::Gt),
    ("+", Term::Plus),
    ("-", Term::Minus),
    ("*", Term::Star),
    ("/", Term::Slash),
    ("%", Term::Percent),
    ("!", Term::Not),
    ("~", Term::Tilde),
];

/// Lexer for template source: text with `<% code %>` blocks and `${ }`
/// placeholders.
pub struct TemplateLexer<'a> {
    input: &'a str,
    pos: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// The starting location of the current line
    line_start_pos: usize,
    mode: Mode,
    trim_blank_lines: bool,
    /// Skip the rest of the line after the current code block closes.
    trim_after_code: bool,
}

impl<'a> TemplateLexer<'a> {
    pub const fn new(input: &'a str, trim_code_block_blank_line: bool) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            line_start_pos: 0,
            mode: Mode::Text,
            trim_blank_lines: trim_code_block_blank_line,
            trim_after_code: false,
        }
    }

    #[inline]
    fn current_column(&self) -> usize {
        self.pos - self.line_start_pos + 1
    }

    fn rest(&self) -> &'a str {
        self.input.get(self.pos..).unwrap_or_default()
    }

    fn peek(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    /// Consumes one character, keeping line tracking up to date.
    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.line_start_pos = self.pos;
        }
        Some(c)
    }

    /// Advances over `s`, which must not contain newlines.
    fn advance_str(&mut self, s: &str) {
        self.pos += s.len();
    }

    fn error_at(line: usize, column: usize, kind: ParseErrorKind) -> ParseError {
        ParseError::new(line, column, kind)
    }

    fn symbol(term: Term, value: Lexeme, line: usize, column: usize) -> Symbol<Lexeme> {
        Symbol::new(term.id(), value, line, column)
    }

    fn eof(&self) -> Symbol<Lexeme> {
        Self::symbol(Term::Eof, Lexeme::None, self.line, self.current_column())
    }

    fn lex_text(&mut self) -> LexResult<Symbol<Lexeme>> {
        let (line, column) = (self.line, self.current_column());
        let mut text = String::new();
        loop {
            if self.peek("\\<%") || self.peek("\\${") {
                self.advance_str("\\");
                let delimiter = if self.peek("<%") { "<%" } else { "${" };
                text.push_str(delimiter);
                self.advance_str(delimiter);
                continue;
            }
            if self.peek("<%") {
                if self.trim_blank_lines && self.code_block_alone_on_line() {
                    let prefix = self.pos - self.line_start_pos;
                    text.truncate(text.len().saturating_sub(prefix));
                    self.trim_after_code = true;
                }
                break;
            }
            if self.peek("${") {
                break;
            }
            match self.bump() {
                Some(c) => text.push(c),
                None => break,
            }
        }

        if !text.is_empty() {
            return Ok(Self::symbol(Term::Text, Lexeme::Text(text.into()), line, column));
        }
        if self.peek("<%") {
            self.advance_str("<%");
            self.mode = Mode::Code;
            return self.lex_code();
        }
        if self.peek("${") {
            let (line, column) = (self.line, self.current_column());
            self.advance_str("${");
            self.mode = Mode::Placeholder(0);
            return Ok(Self::symbol(Term::Placeholder, Lexeme::None, line, column));
        }
        Ok(self.eof())
    }

    /// Whether the `<%` at the current position is preceded by nothing but
    /// whitespace on its line and its `%>` is followed by nothing but
    /// whitespace up to the end of that line.
    fn code_block_alone_on_line(&self) -> bool {
        let before = self
            .input
            .get(self.line_start_pos..self.pos)
            .unwrap_or_default();
        if !before.chars().all(char::is_whitespace) {
            return false;
        }
        let Some(end) = self.code_end(self.pos + 2) else {
            return false;
        };
        self.input
            .get(end..)
            .unwrap_or_default()
            .chars()
            .take_while(|c| *c != '\n')
            .all(char::is_whitespace)
    }

    /// Byte offset just past the `%>` closing the code block starting at
    /// `from`, skipping string literals and comments.
    fn code_end(&self, from: usize) -> Option<usize> {
        let bytes = self.input.as_bytes();
        let at = |i: usize| bytes.get(i).copied();
        let mut i = from;
        while let Some(b) = at(i) {
            match (b, at(i + 1)) {
                (b'%', Some(b'>')) => return Some(i + 2),
                (b'\'' | b'"', _) => {
                    i += 1;
                    while let Some(c) = at(i) {
                        if c == b {
                            break;
                        }
                        i += if c == b'\\' { 2 } else { 1 };
                    }
                    i += 1;
                }
                (b'/', Some(b'/')) => {
                    while let Some(c) = at(i) {
                        if c == b'\n' || (c == b'%' && at(i + 1) == Some(b'>')) {
                            break;
                        }
                        i += 1;
                    }
                }
                (b'/', Some(b'*')) => {
                    let close = self.input.get(i + 2..)?.find("*/")?;
                    i += close + 4;
                }
                _ => i += 1,
            }
        }
        None
    }

    /// Drops whitespace after a trimmed code block, through the newline.
    fn skip_blank_line(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                self.bump();
                break;
            }
            if !c.is_whitespace() {
                break;
            }
            self.bump();
        }
    }

    /// Consumes whitespace and comments inside code.
    fn skip_trivia(&mut self) -> LexResult<()> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek("//") => {
                    // Line comments also end before `%>`.
                    while let Some(c) = self.peek_char() {
                        if c == '\n' || self.peek("%>") {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek("/*") => {
                    let (line, column) = (self.line, self.current_column());
                    self.advance_str("/*");
                    loop {
                        if self.peek("*/") {
                            self.advance_str("*/");
                            break;
                        }
                        if self.bump().is_none() {
                            return Err(Self::error_at(
                                line,
                                column,
                                ParseErrorKind::UnterminatedComment,
                            ));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_code(&mut self) -> LexResult<Symbol<Lexeme>> {
        self.skip_trivia()?;
        if self.mode == Mode::Code && self.peek("%>") {
            self.advance_str("%>");
            self.mode = Mode::Text;
            if self.trim_after_code {
                self.trim_after_code = false;
                self.skip_blank_line();
            }
            return self.lex_text();
        }

        let (line, column) = (self.line, self.current_column());
        let Some(c) = self.peek_char() else {
            return Ok(self.eof());
        };
        if c.is_ascii_digit() {
            return self.lex_number(line, column);
        }
        if c == '\'' || c == '"' {
            return self.lex_string(c, line, column);
        }
        if c.is_alphabetic() || c == '_' {
            return Ok(self.lex_word(line, column));
        }

        let Some((op, term)) = OPERATORS.iter().find(|(op, _)| self.peek(op)) else {
            return Err(Self::error_at(
                line,
                column,
                ParseErrorKind::IllegalCharacter(c),
            ));
        };
        self.advance_str(op);
        if let Mode::Placeholder(depth) = self.mode {
            if *term == Term::LBrace {
                self.mode = Mode::Placeholder(depth + 1);
            } else if *term == Term::RBrace {
                self.mode = depth.checked_sub(1).map_or(Mode::Text, Mode::Placeholder);
            }
        }
        Ok(Self::symbol(*term, Lexeme::None, line, column))
    }

    fn lex_word(&mut self, line: usize, column: usize) -> Symbol<Lexeme> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.bump();
        }
        let word = self.input.get(start..self.pos).unwrap_or_default();
        match KEYWORDS.iter().find(|(keyword, _)| *keyword == word) {
            Some((_, term)) => Self::symbol(*term, Lexeme::None, line, column),
            None => Self::symbol(Term::Ident, Lexeme::Ident(word.into()), line, column),
        }
    }

    fn lex_number(&mut self, line: usize, column: usize) -> LexResult<Symbol<Lexeme>> {
        let start = self.pos;
        let invalid = |literal: &str| {
            Self::error_at(
                line,
                column,
                ParseErrorKind::InvalidNumber {
                    literal: literal.to_owned(),
                },
            )
        };

        if self.peek("0x") || self.peek("0X") {
            self.advance_str("0x");
            let digits_start = self.pos;
            while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = self.input.get(digits_start..self.pos).unwrap_or_default();
            let literal = self.input.get(start..self.pos).unwrap_or_default();
            let value = i64::from_str_radix(digits, 16).map_err(|_| invalid(literal))?;
            return Ok(Self::symbol(
                Term::Int,
                Lexeme::Literal(Value::Int(value)),
                line,
                column,
            ));
        }

        let mut float = false;
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        // `1..5` is a range, not a float.
        if self.peek_char() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            float = true;
            self.bump();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let rest = self.rest();
            let exponent = rest.get(1..).unwrap_or_default();
            let exponent = exponent
                .strip_prefix(['+', '-'])
                .unwrap_or(exponent);
            if exponent.starts_with(|c: char| c.is_ascii_digit()) {
                float = true;
                self.bump();
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.bump();
                }
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        let literal = self.input.get(start..self.pos).unwrap_or_default();
        if float {
            let value: f64 = literal.parse().map_err(|_| invalid(literal))?;
            Ok(Self::symbol(
                Term::Float,
                Lexeme::Literal(Value::Float(value)),
                line,
                column,
            ))
        } else {
            let value: i64 = literal.parse().map_err(|_| invalid(literal))?;
            Ok(Self::symbol(
                Term::Int,
                Lexeme::Literal(Value::Int(value)),
                line,
                column,
            ))
        }
    }

    fn lex_string(&mut self, quote: char, line: usize, column: usize) -> LexResult<Symbol<Lexeme>> {
        self.bump();
        let mut value = String::new();
        loop {
            let (escape_line, escape_column) = (self.line, self.current_column());
            let Some(c) = self.bump() else {
                return Err(Self::error_at(
                    line,
                    column,
                    ParseErrorKind::UnterminatedString,
                ));
            };
            if c == quote {
                break;
            }
            if c != '\\' {
                value.push(c);
                continue;
            }
            let invalid = || Self::error_at(escape_line, escape_column, ParseErrorKind::InvalidEscape);
            let escaped = match self.bump() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('0') => '\0',
                Some(c @ ('\\' | '\'' | '"' | '$')) => c,
                Some('u') => {
                    let hex = self.rest().get(..4).ok_or_else(invalid)?;
                    let code = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
                    let c = char::from_u32(code).ok_or_else(invalid)?;
                    self.advance_str(hex);
                    c
                }
                Some(_) => return Err(invalid()),
                None => {
                    return Err(Self::error_at(
                        line,
                        column,
                        ParseErrorKind::UnterminatedString,
                    ));
                }
            };
            value.push(escaped);
        }
        Ok(Self::symbol(
            Term::Str,
            Lexeme::Literal(Value::Str(value.into())),
            line,
            column,
        ))
    }
}

impl Lexer for TemplateLexer<'_> {
    type Value = Lexeme;

    fn next_token(&mut self) -> LexResult<Symbol<Lexeme>> {
        match self.mode {
            Mode::Text => self.lex_text(),
            Mode::Code | Mode::Placeholder(_) => self.lex_code(),
        }
    }

    fn line(&self) -> usize {
        self.line
    }

    fn column(&self) -> usize {
        self.current_column()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str, trim: bool) -> Vec<Symbol<Lexeme>> {
        let mut lexer = TemplateLexer::new(input, trim);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.id == Term::Eof.id() {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    fn kinds(input: &str) -> Vec<Term> {
        tokens(input, false)
            .iter()
            .map(|t| Term::ALL[t.id])
            .collect()
    }

    fn text_of(input: &str, trim: bool) -> String {
        tokens(input, trim)
            .into_iter()
            .filter_map(|t| match t.value {
                Lexeme::Text(text) => Some(text.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_text_code_and_placeholder() {
        assert_eq!(
            kinds("a<% var x = 1; %>b${ x }c"),
            vec![
                Term::Text,
                Term::Var,
                Term::Ident,
                Term::Assign,
                Term::Int,
                Term::Semi,
                Term::Text,
                Term::Placeholder,
                Term::Ident,
                Term::RBrace,
                Term::Text,
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_placeholder_tracks_nested_braces() {
        assert_eq!(
            kinds("${ function() { return 1; }() }!"),
            vec![
                Term::Placeholder,
                Term::Function,
                Term::LParen,
                Term::RParen,
                Term::LBrace,
                Term::Return,
                Term::Int,
                Term::Semi,
                Term::RBrace,
                Term::LParen,
                Term::RParen,
                Term::RBrace,
                Term::Text,
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_escaped_delimiters_are_text() {
        assert_eq!(text_of(r"a\<%b\${c}", false), "a<%b${c}");
        assert_eq!(kinds(r"\<% x %>"), vec![Term::Text]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_operators_longest_match() {
        assert_eq!(
            kinds("<% a >>> b >> c >= d .. e != f && g %>"),
            vec![
                Term::Ident,
                Term::URShift,
                Term::Ident,
                Term::RShift,
                Term::Ident,
                Term::Ge,
                Term::Ident,
                Term::DotDot,
                Term::Ident,
                Term::Ne,
                Term::Ident,
                Term::AndAnd,
                Term::Ident,
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_numbers() {
        let values: Vec<Lexeme> = tokens("<% 42 0x1F 1.5 2e3 1..5 %>", false)
            .into_iter()
            .map(|t| t.value)
            .collect();
        assert_eq!(
            values,
            vec![
                Lexeme::Literal(Value::Int(42)),
                Lexeme::Literal(Value::Int(31)),
                Lexeme::Literal(Value::Float(1.5)),
                Lexeme::Literal(Value::Float(2000.0)),
                Lexeme::Literal(Value::Int(1)),
                Lexeme::None,
                Lexeme::Literal(Value::Int(5)),
            ]
        );

        let err = TemplateLexer::new("<% 99999999999999999999 %>", false)
            .next_token()
            .unwrap_err();
        assert_eq!((err.line, err.column), (1, 4));
        assert!(matches!(err.kind, ParseErrorKind::InvalidNumber { .. }));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_strings_and_escapes() {
        let token = TemplateLexer::new(r#"<% "a\n\"bA" %>"#, false)
            .next_token()
            .unwrap();
        assert_eq!(token.value, Lexeme::Literal(Value::from("a\n\"bA")));

        let token = TemplateLexer::new("<% 'it''s' %>", false).next_token().unwrap();
        assert_eq!(token.value, Lexeme::Literal(Value::from("it")));

        let err = TemplateLexer::new("<% 'open %>", false).next_token().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
        assert_eq!((err.line, err.column), (1, 4));

        let err = TemplateLexer::new(r"<% 'bad\q' %>", false).next_token().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidEscape);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_comments() {
        assert_eq!(
            kinds("<% // line %>x<% /* block\n */ y %>"),
            vec![Term::Text, Term::Ident]
        );
        let err = TemplateLexer::new("<% /* open", false).next_token().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedComment);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_positions_track_lines() {
        let tokens = tokens("ab\n<% \n  foo %>", false);
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (3, 3));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_eof_repeats() {
        let mut lexer = TemplateLexer::new("x", false);
        assert_eq!(lexer.next_token().unwrap().id, Term::Text.id());
        for _ in 0..3 {
            assert_eq!(lexer.next_token().unwrap().id, Term::Eof.id());
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_illegal_character() {
        let err = TemplateLexer::new("<% @ %>", false).next_token().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::IllegalCharacter('@'));
        assert_eq!((err.line, err.column), (1, 4));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_trim_code_block_blank_line() {
        let input = "a\n  <% x; %>  \nb\n";
        assert_eq!(text_of(input, true), "a\nb\n");
        assert_eq!(text_of(input, false), "a\n    \nb\n");

        // Blocks sharing a line with other text are left alone.
        assert_eq!(text_of("a <% x; %>\nb", true), "a \nb");
        assert_eq!(text_of("  <% x; %> b\n", true), "   b\n");

        // A `%>` inside a string does not end the block.
        assert_eq!(text_of("  <% '%>'; %>\nb", true), "b");
    }
}
