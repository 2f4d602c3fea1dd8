//! Tokeniser for the Octave language subset.
//!
//! Whitespace is significant inside `[ ]` and `{ }`: the lexer inserts a
//! [`Tok::Comma`] where a blank separates two elements (`[1 -2]` has two
//! elements, `[1 - 2]` has one) and turns newlines into [`Tok::Semi`] row
//! breaks.  A `'` is a transpose when it directly follows a value and a
//! string delimiter otherwise.

use super::error::ParseError;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Num(f64),
    /// Imaginary literal such as `2i`.
    Imag(f64),
    /// Single-quoted string.
    SqStr(String),
    /// Double-quoted string (escapes already processed).
    DqStr(String),
    Ident(String),
    Kw(Keyword),

    Plus,
    Minus,
    Star,
    Slash,
    Backslash,
    Caret,
    DotStar,
    DotSlash,
    DotBackslash,
    DotCaret,
    /// `'`
    Quote,
    /// `.'`
    DotQuote,

    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Amp,
    Pipe,
    AmpAmp,
    PipePipe,
    /// `!` or `~`
    Not,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Colon,
    Comma,
    Semi,
    Newline,
    Dot,
    At,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Elseif,
    Else,
    End,
    Endif,
    While,
    Endwhile,
    For,
    Endfor,
    Switch,
    Case,
    Otherwise,
    Endswitch,
    Function,
    Endfunction,
    Return,
    Break,
    Continue,
    Global,
    Try,
    Catch,
    EndTryCatch,
    UnwindProtect,
    UnwindProtectCleanup,
    EndUnwindProtect,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("if", Keyword::If),
    ("elseif", Keyword::Elseif),
    ("else", Keyword::Else),
    ("end", Keyword::End),
    ("endif", Keyword::Endif),
    ("while", Keyword::While),
    ("endwhile", Keyword::Endwhile),
    ("for", Keyword::For),
    ("endfor", Keyword::Endfor),
    ("switch", Keyword::Switch),
    ("case", Keyword::Case),
    ("otherwise", Keyword::Otherwise),
    ("endswitch", Keyword::Endswitch),
    ("function", Keyword::Function),
    ("endfunction", Keyword::Endfunction),
    ("return", Keyword::Return),
    ("break", Keyword::Break),
    ("continue", Keyword::Continue),
    ("global", Keyword::Global),
    ("try", Keyword::Try),
    ("catch", Keyword::Catch),
    ("end_try_catch", Keyword::EndTryCatch),
    ("unwind_protect", Keyword::UnwindProtect),
    ("unwind_protect_cleanup", Keyword::UnwindProtectCleanup),
    ("end_unwind_protect", Keyword::EndUnwindProtect),
];

/// Reserved words that can never name a variable.  Includes words the
/// parser does not implement but Octave reserves.
const RESERVED: &[&str] = &[
    "do", "until", "parfor", "endparfor", "persistent", "classdef", "endclassdef",
    "methods", "endmethods", "properties", "endproperties", "events", "endevents",
    "enumeration", "endenumeration", "spmd", "endspmd", "__FILE__", "__LINE__",
];

pub fn keyword(word: &str) -> Option<Keyword> {
    KEYWORDS.iter().find(|(w, _)| *w == word).map(|(_, k)| *k)
}

pub fn is_reserved(word: &str) -> bool {
    keyword(word).is_some() || RESERVED.contains(&word)
}

/// Octave's variable-name grammar: `[A-Za-z][A-Za-z0-9_]*`, not a keyword.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else { return false };
    first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !is_reserved(name)
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub col: usize,
    /// Byte offset of the token's first character.
    pub offset: usize,
    /// Whitespace immediately precedes this token.
    pub space_before: bool,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nest {
    Paren,
    Bracket,
    Brace,
}

struct Lexer<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
    nest: Vec<Nest>,
    out: Vec<Token>,
}

/// Tokenise `src`.  The result always ends with [`Tok::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut lx = Lexer {
        src: src.as_bytes(),
        text: src,
        pos: 0,
        line: 1,
        line_start: 0,
        nest: Vec::new(),
        out: Vec::new(),
    };
    lx.run()?;
    Ok(lx.out)
}

fn ends_value(t: &Tok) -> bool {
    matches!(
        t,
        Tok::Num(_)
            | Tok::Imag(_)
            | Tok::SqStr(_)
            | Tok::DqStr(_)
            | Tok::Ident(_)
            | Tok::Kw(Keyword::End)
            | Tok::RParen
            | Tok::RBracket
            | Tok::RBrace
            | Tok::Quote
            | Tok::DotQuote
    )
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn col(&self) -> usize {
        self.pos - self.line_start + 1
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg, self.line, self.col())
    }

    fn in_matrix(&self) -> bool {
        matches!(self.nest.last(), Some(Nest::Bracket | Nest::Brace))
    }

    fn prev(&self) -> Option<&Tok> {
        self.out.last().map(|t| &t.tok)
    }

    fn push(&mut self, tok: Tok, start: usize, space_before: bool) {
        let col = start - self.line_start + 1;
        self.out.push(Token { tok, line: self.line, col, offset: start, space_before });
    }

    fn newline(&mut self) {
        self.pos += 1;
        self.line += 1;
        self.line_start = self.pos;
    }

    fn skip_to_eol(&mut self) {
        while !matches!(self.peek(), None | Some(b'\n')) {
            self.pos += 1;
        }
    }

    /// At a line consisting only of `%{` / `#{`: skip to the matching close.
    fn try_block_comment(&mut self) -> bool {
        let line_end = self.text[self.pos..].find('\n').map_or(self.src.len(), |i| self.pos + i);
        let before = &self.text[self.line_start..self.pos];
        let here = self.text[self.pos..line_end].trim_end();
        if !before.trim().is_empty() || !(here == "%{" || here == "#{") {
            return false;
        }
        let mut depth = 0usize;
        loop {
            let end = self.text[self.pos..].find('\n').map_or(self.src.len(), |i| self.pos + i);
            let trimmed = self.text[self.pos..end].trim();
            if trimmed == "%{" || trimmed == "#{" {
                depth += 1;
            } else if trimmed == "%}" || trimmed == "#}" {
                depth -= 1;
            }
            self.pos = end;
            if depth == 0 || self.peek().is_none() {
                return true;
            }
            self.newline();
        }
    }

    /// Whether the upcoming character starts a new matrix element after a
    /// blank.
    fn starts_element(&self) -> bool {
        let Some(c) = self.peek() else { return false };
        match c {
            b'+' | b'-' => {
                let next = self.peek_at(1);
                !matches!(next, Some(b' ' | b'\t' | b'=') | None) && next != Some(c)
            }
            b'!' | b'~' => self.peek_at(1) != Some(b'='),
            b'.' => matches!(self.peek_at(1), Some(b'0'..=b'9')),
            b'\'' | b'"' | b'(' | b'[' | b'{' | b'@' => true,
            c => c.is_ascii_alphanumeric() || c == b'_',
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        loop {
            let mut space = false;
            // Blanks, comments and continuations.
            loop {
                match self.peek() {
                    Some(b' ' | b'\t' | b'\r') => {
                        self.pos += 1;
                        space = true;
                    }
                    Some(b'.') if self.text[self.pos..].starts_with("...") => {
                        self.skip_to_eol();
                        if self.peek() == Some(b'\n') {
                            self.newline();
                        }
                        space = true;
                    }
                    Some(b'%' | b'#') => {
                        if !self.try_block_comment() {
                            self.skip_to_eol();
                        }
                    }
                    _ => break,
                }
            }

            if space && self.in_matrix() && self.prev().is_some_and(ends_value) && self.starts_element()
            {
                self.push(Tok::Comma, self.pos, true);
            }

            let start = self.pos;
            let Some(c) = self.peek() else {
                self.push(Tok::Eof, start, space);
                return Ok(());
            };

            if c == b'\n' {
                match self.nest.last() {
                    Some(Nest::Paren) => {}
                    Some(_) => self.push(Tok::Semi, start, space),
                    None => self.push(Tok::Newline, start, space),
                }
                self.newline();
                continue;
            }

            if c.is_ascii_digit() || (c == b'.' && matches!(self.peek_at(1), Some(b'0'..=b'9'))) {
                let tok = self.number()?;
                self.push(tok, start, space);
                continue;
            }

            if c.is_ascii_alphabetic() || c == b'_' {
                while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
                    self.pos += 1;
                }
                let word = &self.text[start..self.pos];
                let tok = match keyword(word) {
                    Some(k) => Tok::Kw(k),
                    None => Tok::Ident(word.to_owned()),
                };
                self.push(tok, start, space);
                continue;
            }

            if c == b'\'' {
                let transpose = self.prev().is_some_and(ends_value) && !(space && self.in_matrix());
                if transpose {
                    self.pos += 1;
                    self.push(Tok::Quote, start, space);
                } else {
                    let s = self.single_quoted()?;
                    self.push(Tok::SqStr(s), start, space);
                }
                continue;
            }

            if c == b'"' {
                let s = self.double_quoted()?;
                self.push(Tok::DqStr(s), start, space);
                continue;
            }

            let tok = self.operator(c)?;
            match tok {
                Tok::LParen => self.nest.push(Nest::Paren),
                Tok::LBracket => self.nest.push(Nest::Bracket),
                // `c{i}` indexes; only a literal `{` opens a matrix context.
                Tok::LBrace if self.prev().is_some_and(ends_value) && !(space && self.in_matrix()) => {
                    self.nest.push(Nest::Paren)
                }
                Tok::LBrace => self.nest.push(Nest::Brace),
                Tok::RParen | Tok::RBracket | Tok::RBrace => {
                    self.nest.pop();
                }
                _ => {}
            }
            self.push(tok, start, space);
        }
    }

    fn number(&mut self) -> Result<Tok, ParseError> {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.pos += 2;
            let hex_start = self.pos;
            while matches!(self.peek(), Some(b) if b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = &self.text[hex_start..self.pos];
            let n = u64::from_str_radix(digits, 16)
                .map_err(|_| self.err(format!("malformed hex constant '0x{digits}'")))?;
            return Ok(Tok::Num(n as f64));
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        // `3.*x` is `3 .* x`, `3.'` is `3 .'`.
        if self.peek() == Some(b'.')
            && !matches!(self.peek_at(1), Some(b'*' | b'/' | b'\\' | b'^' | b'\''))
            && !self.text[self.pos..].starts_with("...")
        {
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E' | b'd' | b'D')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(b'0'..=b'9')) {
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }
        let literal = self.text[start..self.pos].replace(['d', 'D'], "e");
        let value: f64 = literal
            .parse()
            .map_err(|_| self.err(format!("malformed number '{literal}'")))?;
        if matches!(self.peek(), Some(b'i' | b'j' | b'I' | b'J'))
            && !matches!(self.peek_at(1), Some(b) if b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
            return Ok(Tok::Imag(value));
        }
        Ok(Tok::Num(value))
    }

    fn single_quoted(&mut self) -> Result<String, ParseError> {
        let (line, col) = (self.line, self.col());
        self.pos += 1;
        let mut s = String::new();
        loop {
            let rest = &self.text[self.pos..];
            let Some(ch) = rest.chars().next() else {
                return Err(ParseError::new("unterminated character string constant", line, col));
            };
            match ch {
                '\n' => {
                    return Err(ParseError::new("unterminated character string constant", line, col))
                }
                '\'' if rest[1..].starts_with('\'') => {
                    s.push('\'');
                    self.pos += 2;
                }
                '\'' => {
                    self.pos += 1;
                    return Ok(s);
                }
                c => {
                    s.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn double_quoted(&mut self) -> Result<String, ParseError> {
        let (line, col) = (self.line, self.col());
        self.pos += 1;
        let mut s = String::new();
        loop {
            let rest = &self.text[self.pos..];
            let Some(ch) = rest.chars().next() else {
                return Err(ParseError::new("unterminated character string constant", line, col));
            };
            self.pos += ch.len_utf8();
            match ch {
                '\n' => {
                    return Err(ParseError::new("unterminated character string constant", line, col))
                }
                '"' if self.peek() == Some(b'"') => {
                    s.push('"');
                    self.pos += 1;
                }
                '"' => return Ok(s),
                '\\' => {
                    let Some(esc) = self.text[self.pos..].chars().next() else { continue };
                    self.pos += esc.len_utf8();
                    let unescaped = match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        'a' => '\x07',
                        '0' => '\0',
                        '\\' | '"' | '\'' => esc,
                        _ => {
                            s.push('\\');
                            esc
                        }
                    };
                    s.push(unescaped);
                }
                c => s.push(c),
            }
        }
    }

    fn operator(&mut self, c: u8) -> Result<Tok, ParseError> {
        let next = self.peek_at(1);
        let (tok, len) = match (c, next) {
            (b'.', Some(b'*')) => (Tok::DotStar, 2),
            (b'.', Some(b'/')) => (Tok::DotSlash, 2),
            (b'.', Some(b'\\')) => (Tok::DotBackslash, 2),
            (b'.', Some(b'^')) => (Tok::DotCaret, 2),
            (b'.', Some(b'\'')) => (Tok::DotQuote, 2),
            (b'.', _) => (Tok::Dot, 1),
            (b'=', Some(b'=')) => (Tok::EqEq, 2),
            (b'=', _) => (Tok::Assign, 1),
            (b'!' | b'~', Some(b'=')) => (Tok::Ne, 2),
            (b'!' | b'~', _) => (Tok::Not, 1),
            (b'<', Some(b'=')) => (Tok::Le, 2),
            (b'<', _) => (Tok::Lt, 1),
            (b'>', Some(b'=')) => (Tok::Ge, 2),
            (b'>', _) => (Tok::Gt, 1),
            (b'&', Some(b'&')) => (Tok::AmpAmp, 2),
            (b'&', _) => (Tok::Amp, 1),
            (b'|', Some(b'|')) => (Tok::PipePipe, 2),
            (b'|', _) => (Tok::Pipe, 1),
            (b'+', Some(b'=')) if !self.in_matrix() => (Tok::PlusAssign, 2),
            (b'-', Some(b'=')) if !self.in_matrix() => (Tok::MinusAssign, 2),
            (b'*', Some(b'=')) if !self.in_matrix() => (Tok::StarAssign, 2),
            (b'/', Some(b'=')) if !self.in_matrix() => (Tok::SlashAssign, 2),
            (b'+', _) => (Tok::Plus, 1),
            (b'-', _) => (Tok::Minus, 1),
            (b'*', _) => (Tok::Star, 1),
            (b'/', _) => (Tok::Slash, 1),
            (b'\\', _) => (Tok::Backslash, 1),
            (b'^', _) => (Tok::Caret, 1),
            (b':', _) => (Tok::Colon, 1),
            (b',', _) => (Tok::Comma, 1),
            (b';', _) => (Tok::Semi, 1),
            (b'@', _) => (Tok::At, 1),
            (b'(', _) => (Tok::LParen, 1),
            (b')', _) => (Tok::RParen, 1),
            (b'[', _) => (Tok::LBracket, 1),
            (b']', _) => (Tok::RBracket, 1),
            (b'{', _) => (Tok::LBrace, 1),
            (b'}', _) => (Tok::RBrace, 1),
            _ => {
                let ch = self.text[self.pos..].chars().next().unwrap_or('?');
                return Err(self.err(format!("invalid character '{ch}'")));
            }
        };
        self.pos += len;
        Ok(tok)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
