//! Recursive-descent parser producing a [`Program`].
//!
//! Operator precedence (lowest → highest):
//!   `||`  →  `&&`  →  `|`  →  `&`  →  comparison  →  `:`  →
//!   additive  →  multiplicative  →  prefix unary  →  power  →  postfix

use std::sync::Arc;

use super::ast::*;
use super::error::ParseError;
use super::lexer::{tokenize, Keyword, Tok, Token};

/// Words parsed with command syntax (`clear x y`) when followed by a blank.
const COMMAND_WORDS: &[&str] = &["clear", "clc", "close", "format", "more", "warning"];

/// Parse a source unit.
pub fn parse(src: &str) -> Result<Program, ParseError> {
    let toks = tokenize(src)?;
    let mut p = Parser { toks, pos: 0, src, index_depth: 0, functions: Vec::new() };
    let body = p.block(&[])?;
    Ok(Program { body, functions: p.functions })
}

struct Parser<'a> {
    toks: Vec<Token>,
    pos: usize,
    src: &'a str,
    /// Nesting depth of index argument lists, where `end` and `:` are magic.
    index_depth: usize,
    functions: Vec<Arc<FunctionDef>>,
}

fn describe(t: &Tok) -> String {
    match t {
        Tok::Num(n) => format!("{n}"),
        Tok::Imag(n) => format!("{n}i"),
        Tok::SqStr(s) => format!("'{s}'"),
        Tok::DqStr(s) => format!("\"{s}\""),
        Tok::Ident(s) => s.clone(),
        Tok::Kw(k) => keyword_text(*k).to_owned(),
        Tok::Newline => "newline".into(),
        Tok::Eof => "end of input".into(),
        other => {
            let s = match other {
                Tok::Plus => "+",
                Tok::Minus => "-",
                Tok::Star => "*",
                Tok::Slash => "/",
                Tok::Backslash => "\\",
                Tok::Caret => "^",
                Tok::DotStar => ".*",
                Tok::DotSlash => "./",
                Tok::DotBackslash => ".\\",
                Tok::DotCaret => ".^",
                Tok::Quote => "'",
                Tok::DotQuote => ".'",
                Tok::EqEq => "==",
                Tok::Ne => "!=",
                Tok::Lt => "<",
                Tok::Le => "<=",
                Tok::Gt => ">",
                Tok::Ge => ">=",
                Tok::Amp => "&",
                Tok::Pipe => "|",
                Tok::AmpAmp => "&&",
                Tok::PipePipe => "||",
                Tok::Not => "!",
                Tok::Assign => "=",
                Tok::PlusAssign => "+=",
                Tok::MinusAssign => "-=",
                Tok::StarAssign => "*=",
                Tok::SlashAssign => "/=",
                Tok::Colon => ":",
                Tok::Comma => ",",
                Tok::Semi => ";",
                Tok::Dot => ".",
                Tok::At => "@",
                Tok::LParen => "(",
                Tok::RParen => ")",
                Tok::LBracket => "[",
                Tok::RBracket => "]",
                Tok::LBrace => "{",
                Tok::RBrace => "}",
                _ => "?",
            };
            s.to_owned()
        }
    }
}

fn keyword_text(k: Keyword) -> &'static str {
    match k {
        Keyword::If => "if",
        Keyword::Elseif => "elseif",
        Keyword::Else => "else",
        Keyword::End => "end",
        Keyword::Endif => "endif",
        Keyword::While => "while",
        Keyword::Endwhile => "endwhile",
        Keyword::For => "for",
        Keyword::Endfor => "endfor",
        Keyword::Switch => "switch",
        Keyword::Case => "case",
        Keyword::Otherwise => "otherwise",
        Keyword::Endswitch => "endswitch",
        Keyword::Function => "function",
        Keyword::Endfunction => "endfunction",
        Keyword::Return => "return",
        Keyword::Break => "break",
        Keyword::Continue => "continue",
        Keyword::Global => "global",
        Keyword::Try => "try",
        Keyword::Catch => "catch",
        Keyword::EndTryCatch => "end_try_catch",
        Keyword::UnwindProtect => "unwind_protect",
        Keyword::UnwindProtectCleanup => "unwind_protect_cleanup",
        Keyword::EndUnwindProtect => "end_unwind_protect",
    }
}

/// Keywords that may directly follow a statement without a separator.
fn closes_block(k: Keyword) -> bool {
    !matches!(
        k,
        Keyword::If
            | Keyword::While
            | Keyword::For
            | Keyword::Switch
            | Keyword::Function
            | Keyword::Return
            | Keyword::Break
            | Keyword::Continue
            | Keyword::Global
            | Keyword::Try
            | Keyword::UnwindProtect
    )
}

impl<'a> Parser<'a> {
    // ── Token cursor ──────────────────────────────────────────────────────────

    fn tok(&self) -> &Tok {
        &self.toks[self.pos.min(self.toks.len() - 1)].tok
    }

    fn token(&self) -> &Token {
        &self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn peek_tok(&self, n: usize) -> &Tok {
        &self.toks[(self.pos + n).min(self.toks.len() - 1)].tok
    }

    fn bump(&mut self) -> Tok {
        let t = self.tok().clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, t: &Tok) -> bool {
        if self.tok() == t {
            self.bump();
            true
        } else {
            false
        }
    }

    fn at_kw(&self, k: Keyword) -> bool {
        *self.tok() == Tok::Kw(k)
    }

    fn err_here(&self, msg: impl Into<String>) -> ParseError {
        let t = self.token();
        ParseError::new(msg, t.line, t.col)
    }

    fn unexpected(&self) -> ParseError {
        self.err_here(format!("syntax error: unexpected '{}'", describe(self.tok())))
    }

    fn expect(&mut self, t: &Tok) -> Result<(), ParseError> {
        if self.eat(t) {
            Ok(())
        } else {
            Err(self.err_here(format!(
                "syntax error: expected '{}' but found '{}'",
                describe(t),
                describe(self.tok())
            )))
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.tok().clone() {
            Tok::Ident(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.err_here(format!(
                "syntax error: expected identifier but found '{}'",
                describe(self.tok())
            ))),
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.tok(), Tok::Newline | Tok::Semi | Tok::Comma) {
            self.bump();
        }
    }

    /// Consume the end of a simple statement and report whether its value
    /// should be displayed.
    fn statement_end(&mut self) -> Result<bool, ParseError> {
        match self.tok() {
            Tok::Semi => {
                self.bump();
                Ok(false)
            }
            Tok::Comma | Tok::Newline => {
                self.bump();
                Ok(true)
            }
            Tok::Eof => Ok(true),
            Tok::Kw(k) if closes_block(*k) => Ok(true),
            _ => Err(self.unexpected()),
        }
    }

    fn end_keyword(&mut self, alternatives: &[Keyword]) -> Result<(), ParseError> {
        if self.at_kw(Keyword::End) || alternatives.iter().any(|k| self.at_kw(*k)) {
            self.bump();
            Ok(())
        } else {
            Err(self.err_here(format!(
                "syntax error: missing 'end', found '{}'",
                describe(self.tok())
            )))
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    /// Parse statements until one of `terminators` (not consumed).  An empty
    /// terminator list means "until end of input".
    fn block(&mut self, terminators: &[Keyword]) -> Result<Block, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            match self.tok() {
                Tok::Eof if terminators.is_empty() => return Ok(stmts),
                Tok::Eof => return Err(self.err_here("syntax error: unexpected end of input")),
                Tok::Kw(k) if terminators.contains(k) => return Ok(stmts),
                Tok::Kw(Keyword::Function) => {
                    let def = self.function_def()?;
                    self.functions.push(Arc::new(def));
                }
                _ => stmts.push(self.statement()?),
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.token().line;
        let kind = match self.tok().clone() {
            Tok::Kw(Keyword::If) => self.if_stmt()?,
            Tok::Kw(Keyword::While) => {
                self.bump();
                let cond = self.expr()?;
                let body = self.block(&[Keyword::End, Keyword::Endwhile])?;
                self.end_keyword(&[Keyword::Endwhile])?;
                StmtKind::While { cond, body }
            }
            Tok::Kw(Keyword::For) => self.for_stmt()?,
            Tok::Kw(Keyword::Switch) => self.switch_stmt()?,
            Tok::Kw(Keyword::Try) => self.try_stmt()?,
            Tok::Kw(Keyword::UnwindProtect) => {
                self.bump();
                let body = self.block(&[
                    Keyword::UnwindProtectCleanup,
                    Keyword::EndUnwindProtect,
                    Keyword::End,
                ])?;
                let cleanup = if self.eat(&Tok::Kw(Keyword::UnwindProtectCleanup)) {
                    self.block(&[Keyword::EndUnwindProtect, Keyword::End])?
                } else {
                    Vec::new()
                };
                self.end_keyword(&[Keyword::EndUnwindProtect])?;
                StmtKind::UnwindProtect { body, cleanup }
            }
            Tok::Kw(Keyword::Break) => {
                self.bump();
                self.statement_end()?;
                StmtKind::Break
            }
            Tok::Kw(Keyword::Continue) => {
                self.bump();
                self.statement_end()?;
                StmtKind::Continue
            }
            Tok::Kw(Keyword::Return) => {
                self.bump();
                self.statement_end()?;
                StmtKind::Return
            }
            Tok::Kw(Keyword::Global) => self.global_stmt()?,
            Tok::Kw(_) => return Err(self.unexpected()),
            Tok::Ident(word) if self.is_command_syntax(&word) => self.command(word)?,
            Tok::LBracket => match self.try_multi_assign()? {
                Some(kind) => kind,
                None => self.expr_or_assign()?,
            },
            _ => self.expr_or_assign()?,
        };
        Ok(Stmt { kind, line })
    }

    fn expr_or_assign(&mut self) -> Result<StmtKind, ParseError> {
        let e = self.expr()?;
        let op = match self.tok() {
            Tok::Assign => None,
            Tok::PlusAssign => Some(BinOp::Add),
            Tok::MinusAssign => Some(BinOp::Sub),
            Tok::StarAssign => Some(BinOp::MatMul),
            Tok::SlashAssign => Some(BinOp::MatDiv),
            _ => {
                let print = self.statement_end()?;
                return Ok(StmtKind::Expr { expr: e, print });
            }
        };
        let lhs = self.to_lvalue(e.clone())?;
        self.bump();
        let mut rhs = self.expr()?;
        if let Some(op) = op {
            rhs = Expr::Binary(op, Box::new(e), Box::new(rhs));
        }
        let print = self.statement_end()?;
        Ok(StmtKind::Assign { lhs: vec![lhs], rhs, print })
    }

    fn to_lvalue(&self, e: Expr) -> Result<LValue, ParseError> {
        match e {
            Expr::Ident(name) => Ok(LValue::Var { name, chain: Vec::new() }),
            Expr::Index { base, chain } => match *base {
                Expr::Ident(name) => Ok(LValue::Var { name, chain }),
                _ => Err(self.err_here("invalid assignment target")),
            },
            _ => Err(self.err_here("invalid assignment target")),
        }
    }

    /// `[a, ~, c] = rhs`; rewinds and returns `None` if the bracket turns
    /// out to be a matrix expression.
    fn try_multi_assign(&mut self) -> Result<Option<StmtKind>, ParseError> {
        let save = self.pos;
        let saved_depth = self.index_depth;
        let attempt = (|| -> Result<Option<Vec<LValue>>, ParseError> {
            self.bump();
            let mut lhs = Vec::new();
            loop {
                match self.tok() {
                    Tok::RBracket => {
                        self.bump();
                        break;
                    }
                    Tok::Comma => {
                        self.bump();
                    }
                    Tok::Not if matches!(self.peek_tok(1), Tok::Comma | Tok::RBracket) => {
                        self.bump();
                        lhs.push(LValue::Ignore);
                    }
                    Tok::Ident(_) => {
                        let e = self.postfix()?;
                        match self.to_lvalue(e) {
                            Ok(lv) => lhs.push(lv),
                            Err(_) => return Ok(None),
                        }
                    }
                    _ => return Ok(None),
                }
            }
            Ok((self.tok() == &Tok::Assign && !lhs.is_empty()).then_some(lhs))
        })();
        match attempt {
            Ok(Some(lhs)) => {
                self.bump();
                let rhs = self.expr()?;
                let print = self.statement_end()?;
                Ok(Some(StmtKind::Assign { lhs, rhs, print }))
            }
            _ => {
                self.pos = save;
                self.index_depth = saved_depth;
                Ok(None)
            }
        }
    }

    fn is_command_syntax(&self, word: &str) -> bool {
        if !COMMAND_WORDS.contains(&word) {
            return false;
        }
        let next = &self.toks[(self.pos + 1).min(self.toks.len() - 1)];
        if !next.space_before || next.line != self.token().line {
            return false;
        }
        match &next.tok {
            Tok::Assign | Tok::LParen | Tok::Newline | Tok::Semi | Tok::Comma | Tok::Eof => false,
            Tok::Ident(_) | Tok::Num(_) | Tok::SqStr(_) | Tok::DqStr(_) => true,
            // `clear -all`, but not `clear - 1`.
            Tok::Minus => {
                let after = &self.toks[(self.pos + 2).min(self.toks.len() - 1)];
                !after.space_before
            }
            _ => false,
        }
    }

    fn command(&mut self, name: String) -> Result<StmtKind, ParseError> {
        self.bump();
        let start = self.token().offset;
        let rest = &self.src[start..];
        let len = rest.find(['\n', ';', ',']).unwrap_or(rest.len());
        let end = start + len;
        let args = rest[..len]
            .split_whitespace()
            .map(|w| w.trim_matches(|c| c == '\'' || c == '"').to_owned())
            .collect();
        while self.token().offset < end && *self.tok() != Tok::Eof {
            self.bump();
        }
        let print = self.statement_end()?;
        Ok(StmtKind::Command { name, args, print })
    }

    fn if_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.bump();
        let mut clauses = Vec::new();
        let mut else_block = None;
        let stops = [Keyword::Elseif, Keyword::Else, Keyword::End, Keyword::Endif];
        let cond = self.expr()?;
        let body = self.block(&stops)?;
        clauses.push((cond, body));
        loop {
            if self.eat(&Tok::Kw(Keyword::Elseif)) {
                let cond = self.expr()?;
                let body = self.block(&stops)?;
                clauses.push((cond, body));
            } else if self.eat(&Tok::Kw(Keyword::Else)) {
                else_block = Some(self.block(&[Keyword::End, Keyword::Endif])?);
            } else {
                self.end_keyword(&[Keyword::Endif])?;
                return Ok(StmtKind::If { clauses, else_block });
            }
        }
    }

    fn for_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.bump();
        let parenthesised = *self.tok() == Tok::LParen
            && matches!(self.peek_tok(1), Tok::Ident(_))
            && *self.peek_tok(2) == Tok::Assign;
        if parenthesised {
            self.bump();
        }
        let name = self.ident()?;
        self.expect(&Tok::Assign)?;
        let iter = self.expr()?;
        if parenthesised {
            self.expect(&Tok::RParen)?;
        }
        let body = self.block(&[Keyword::End, Keyword::Endfor])?;
        self.end_keyword(&[Keyword::Endfor])?;
        Ok(StmtKind::For { var: LValue::Var { name, chain: Vec::new() }, iter, body })
    }

    fn switch_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.bump();
        let subject = self.expr()?;
        let mut cases = Vec::new();
        let mut default = None;
        let stops = [Keyword::Case, Keyword::Otherwise, Keyword::End, Keyword::Endswitch];
        self.skip_separators();
        loop {
            if self.eat(&Tok::Kw(Keyword::Case)) {
                let label = self.expr()?;
                let body = self.block(&stops)?;
                cases.push((label, body));
            } else if self.eat(&Tok::Kw(Keyword::Otherwise)) {
                default = Some(self.block(&stops)?);
            } else {
                self.end_keyword(&[Keyword::Endswitch])?;
                return Ok(StmtKind::Switch { subject, cases, default });
            }
        }
    }

    fn try_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.bump();
        let body = self.block(&[Keyword::Catch, Keyword::End, Keyword::EndTryCatch])?;
        let mut ident = None;
        let mut handler = Vec::new();
        if self.at_kw(Keyword::Catch) {
            let catch_line = self.token().line;
            self.bump();
            if let Tok::Ident(name) = self.tok().clone() {
                let same_line = self.token().line == catch_line;
                let ends = matches!(self.peek_tok(1), Tok::Newline | Tok::Semi | Tok::Comma | Tok::Eof);
                if same_line && ends {
                    self.bump();
                    ident = Some(name);
                }
            }
            handler = self.block(&[Keyword::End, Keyword::EndTryCatch])?;
        }
        self.end_keyword(&[Keyword::EndTryCatch])?;
        Ok(StmtKind::TryCatch { body, ident, handler })
    }

    fn global_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.bump();
        let mut names = Vec::new();
        while let Tok::Ident(name) = self.tok().clone() {
            self.bump();
            let init = if self.eat(&Tok::Assign) { Some(self.expr()?) } else { None };
            names.push((name, init));
        }
        if names.is_empty() {
            return Err(self.unexpected());
        }
        self.statement_end()?;
        Ok(StmtKind::Global(names))
    }

    fn function_def(&mut self) -> Result<FunctionDef, ParseError> {
        self.bump();
        let mut outputs = Vec::new();
        let name;
        if self.eat(&Tok::LBracket) {
            while !self.eat(&Tok::RBracket) {
                if !self.eat(&Tok::Comma) {
                    outputs.push(self.ident()?);
                }
            }
            self.expect(&Tok::Assign)?;
            name = self.ident()?;
        } else {
            let first = self.ident()?;
            if self.eat(&Tok::Assign) {
                outputs.push(first);
                name = self.ident()?;
            } else {
                name = first;
            }
        }
        let mut params = Vec::new();
        if self.eat(&Tok::LParen) {
            while !self.eat(&Tok::RParen) {
                match self.tok() {
                    Tok::Comma => {
                        self.bump();
                    }
                    Tok::Not => {
                        self.bump();
                        params.push("~".to_owned());
                    }
                    _ => params.push(self.ident()?),
                }
            }
        }
        let body = self.block(&[Keyword::End, Keyword::Endfunction, Keyword::Function])?;
        if self.at_kw(Keyword::End) || self.at_kw(Keyword::Endfunction) {
            self.bump();
        }
        Ok(FunctionDef { name, params, outputs, body })
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub(super) fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.andand()?;
        while self.eat(&Tok::PipePipe) {
            let rhs = self.andand()?;
            lhs = Expr::OrOr(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn andand(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.elem_or()?;
        while self.eat(&Tok::AmpAmp) {
            let rhs = self.elem_or()?;
            lhs = Expr::AndAnd(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn elem_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.elem_and()?;
        while self.eat(&Tok::Pipe) {
            let rhs = self.elem_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn elem_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.comparison()?;
        while self.eat(&Tok::Amp) {
            let rhs = self.comparison()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.range()?;
        loop {
            let op = match self.tok() {
                Tok::EqEq => BinOp::Eq,
                Tok::Ne => BinOp::Ne,
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.range()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn range(&mut self) -> Result<Expr, ParseError> {
        let start = self.additive()?;
        if !self.range_colon() {
            return Ok(start);
        }
        self.bump();
        let second = self.additive()?;
        if self.range_colon() {
            self.bump();
            let stop = self.additive()?;
            return Ok(Expr::Range {
                start: Box::new(start),
                step: Some(Box::new(second)),
                stop: Box::new(stop),
            });
        }
        Ok(Expr::Range { start: Box::new(start), step: None, stop: Box::new(second) })
    }

    /// A `:` that continues a range (not the magic colon before `)` or `,`).
    fn range_colon(&self) -> bool {
        *self.tok() == Tok::Colon
            && !matches!(self.peek_tok(1), Tok::RParen | Tok::RBrace | Tok::Comma)
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.tok() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.tok() {
                Tok::Star => BinOp::MatMul,
                Tok::Slash => BinOp::MatDiv,
                Tok::Backslash => BinOp::MatLeftDiv,
                Tok::DotStar => BinOp::Mul,
                Tok::DotSlash => BinOp::Div,
                Tok::DotBackslash => BinOp::LeftDiv,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.tok() {
            Tok::Minus => UnOp::Neg,
            Tok::Plus => UnOp::Plus,
            Tok::Not => UnOp::Not,
            _ => return self.power(),
        };
        self.bump();
        let operand = self.unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.postfix()?;
        loop {
            let op = match self.tok() {
                Tok::Caret => BinOp::MatPow,
                Tok::DotCaret => BinOp::Pow,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.power_operand()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    /// The right operand of `^` may carry its own prefix operator (`2^-1`).
    fn power_operand(&mut self) -> Result<Expr, ParseError> {
        let op = match self.tok() {
            Tok::Minus => UnOp::Neg,
            Tok::Plus => UnOp::Plus,
            Tok::Not => UnOp::Not,
            _ => return self.postfix(),
        };
        self.bump();
        let operand = self.power_operand()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut e = self.primary()?;
        loop {
            let access = match self.tok() {
                Tok::LParen => {
                    self.bump();
                    Access::Paren(self.args(&Tok::RParen)?)
                }
                Tok::LBrace => {
                    self.bump();
                    Access::Brace(self.args(&Tok::RBrace)?)
                }
                Tok::Dot => {
                    self.bump();
                    if self.eat(&Tok::LParen) {
                        let saved = std::mem::replace(&mut self.index_depth, 0);
                        let name = self.expr();
                        self.index_depth = saved;
                        let name = name?;
                        self.expect(&Tok::RParen)?;
                        Access::DynField(Box::new(name))
                    } else {
                        match self.bump() {
                            Tok::Ident(name) => Access::Field(name),
                            Tok::Kw(k) => Access::Field(keyword_text(k).to_owned()),
                            _ => return Err(self.err_here("syntax error: expected field name after '.'")),
                        }
                    }
                }
                Tok::Quote => {
                    self.bump();
                    e = Expr::Unary(UnOp::CTranspose, Box::new(e));
                    continue;
                }
                Tok::DotQuote => {
                    self.bump();
                    e = Expr::Unary(UnOp::Transpose, Box::new(e));
                    continue;
                }
                _ => return Ok(e),
            };
            e = match e {
                Expr::Index { base, mut chain } => {
                    chain.push(access);
                    Expr::Index { base, chain }
                }
                other => Expr::Index { base: Box::new(other), chain: vec![access] },
            };
        }
    }

    fn args(&mut self, close: &Tok) -> Result<Vec<Expr>, ParseError> {
        self.index_depth += 1;
        let result = self.args_inner(close);
        self.index_depth -= 1;
        result
    }

    fn args_inner(&mut self, close: &Tok) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            let magic_colon = *self.tok() == Tok::Colon
                && (self.peek_tok(1) == close || *self.peek_tok(1) == Tok::Comma);
            if magic_colon {
                self.bump();
                args.push(Expr::Colon);
            } else {
                args.push(self.expr()?);
            }
            if self.eat(close) {
                return Ok(args);
            }
            self.expect(&Tok::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.tok().clone() {
            Tok::Num(n) => {
                self.bump();
                Ok(Expr::Num(n))
            }
            Tok::Imag(n) => {
                self.bump();
                Ok(Expr::Imag(n))
            }
            Tok::SqStr(text) => {
                self.bump();
                Ok(Expr::Str { text, double_quoted: false })
            }
            Tok::DqStr(text) => {
                self.bump();
                Ok(Expr::Str { text, double_quoted: true })
            }
            Tok::Ident(name) => {
                self.bump();
                Ok(Expr::Ident(name))
            }
            Tok::Kw(Keyword::End) if self.index_depth > 0 => {
                self.bump();
                Ok(Expr::End)
            }
            Tok::LParen => {
                self.bump();
                let e = self.expr()?;
                self.expect(&Tok::RParen)?;
                Ok(e)
            }
            Tok::LBracket => {
                self.bump();
                Ok(Expr::Matrix(self.rows(&Tok::RBracket)?))
            }
            Tok::LBrace => {
                self.bump();
                Ok(Expr::CellLit(self.rows(&Tok::RBrace)?))
            }
            Tok::At => {
                self.bump();
                match self.tok().clone() {
                    Tok::Ident(name) => {
                        self.bump();
                        Ok(Expr::FuncHandle(name))
                    }
                    Tok::LParen => Err(self.err_here("anonymous functions are not supported")),
                    _ => Err(self.unexpected()),
                }
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Rows of a matrix or cell literal, up to and including `close`.
    fn rows(&mut self, close: &Tok) -> Result<Vec<Vec<Expr>>, ParseError> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        loop {
            match self.tok() {
                t if t == close => {
                    self.bump();
                    if !row.is_empty() {
                        rows.push(row);
                    }
                    return Ok(rows);
                }
                Tok::Semi | Tok::Newline => {
                    self.bump();
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                Tok::Comma => {
                    self.bump();
                }
                Tok::Eof => return Err(self.err_here(format!("syntax error: missing '{}'", describe(close)))),
                _ => row.push(self.expr()?),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body(src: &str) -> Block {
        parse(src).unwrap().body
    }

    fn expr(src: &str) -> Expr {
        match body(src).remove(0).kind {
            StmtKind::Expr { expr, .. } => expr,
            other => panic!("not an expression: {other:?}"),
        }
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Num(n))
    }

    #[test]
    fn precedence() {
        assert_eq!(
            expr("1 + 2 * 3"),
            Expr::Binary(BinOp::Add, num(1.0), Box::new(Expr::Binary(BinOp::MatMul, num(2.0), num(3.0))))
        );
        assert_eq!(
            expr("-2 ^ 2"),
            Expr::Unary(UnOp::Neg, Box::new(Expr::Binary(BinOp::MatPow, num(2.0), num(2.0))))
        );
        assert_eq!(
            expr("2 ^ -1"),
            Expr::Binary(BinOp::MatPow, num(2.0), Box::new(Expr::Unary(UnOp::Neg, num(1.0))))
        );
    }

    #[test]
    fn ranges() {
        assert_eq!(
            expr("1:2:9"),
            Expr::Range { start: num(1.0), step: Some(num(2.0)), stop: num(9.0) }
        );
    }

    #[test]
    fn index_with_end_and_colon() {
        assert_eq!(
            expr("a(end, :)"),
            Expr::Index {
                base: Box::new(Expr::Ident("a".into())),
                chain: vec![Access::Paren(vec![Expr::End, Expr::Colon])],
            }
        );
    }

    #[test]
    fn field_chain() {
        assert_eq!(
            expr("s.a{2}.b"),
            Expr::Index {
                base: Box::new(Expr::Ident("s".into())),
                chain: vec![
                    Access::Field("a".into()),
                    Access::Brace(vec![Expr::Num(2.0)]),
                    Access::Field("b".into()),
                ],
            }
        );
    }

    #[test]
    fn matrix_rows() {
        assert_eq!(
            expr("[1, 2; 3 4]"),
            Expr::Matrix(vec![
                vec![Expr::Num(1.0), Expr::Num(2.0)],
                vec![Expr::Num(3.0), Expr::Num(4.0)],
            ])
        );
        assert_eq!(expr("[]"), Expr::Matrix(vec![]));
    }

    #[test]
    fn print_flags() {
        let b = body("x = 1; y = 2\nz = 3,");
        let flags: Vec<bool> = b
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Assign { print, .. } => *print,
                _ => panic!(),
            })
            .collect();
        assert_eq!(flags, vec![false, true, true]);
    }

    #[test]
    fn multi_assign() {
        let b = body("[a, ~, c] = f(1);");
        let StmtKind::Assign { lhs, .. } = &b[0].kind else { panic!() };
        assert_eq!(lhs.len(), 3);
        assert_eq!(lhs[1], LValue::Ignore);
        // A matrix expression statement is not an assignment.
        assert!(matches!(body("[a, b]")[0].kind, StmtKind::Expr { .. }));
    }

    #[test]
    fn function_definitions() {
        let p = parse("function y = test_return (x); y = x; endfunction").unwrap();
        assert!(p.body.is_empty());
        assert_eq!(p.functions[0].name, "test_return");
        assert_eq!(p.functions[0].params, vec!["x"]);
        assert_eq!(p.functions[0].outputs, vec!["y"]);

        let p = parse("function [a, b] = two()\n a = 1; b = 2;\nend\nfunction none\nend").unwrap();
        assert_eq!(p.functions.len(), 2);
        assert_eq!(p.functions[0].outputs, vec!["a", "b"]);
        assert!(p.functions[1].params.is_empty());
    }

    #[test]
    fn control_flow() {
        let src = "if x > 1\n y = 1;\nelseif x < 0\n y = 2;\nelse\n y = 3;\nend";
        let StmtKind::If { clauses, else_block } = &body(src)[0].kind else { panic!() };
        assert_eq!(clauses.len(), 2);
        assert!(else_block.is_some());

        let src = "try\n error('x');\ncatch err\n disp(err.message);\nend";
        let StmtKind::TryCatch { ident, .. } = &body(src)[0].kind else { panic!() };
        assert_eq!(ident.as_deref(), Some("err"));

        let src = "for i = 1:3, s = s + i; end";
        assert!(matches!(body(src)[0].kind, StmtKind::For { .. }));
        let src = "switch x\n case 1\n y = 1;\n otherwise\n y = 0;\nend";
        assert!(matches!(body(src)[0].kind, StmtKind::Switch { .. }));
    }

    #[test]
    fn command_syntax() {
        let b = body("clear x y");
        assert_eq!(
            b[0].kind,
            StmtKind::Command { name: "clear".into(), args: vec!["x".into(), "y".into()], print: true }
        );
        // A function call is not command syntax.
        assert!(matches!(body("clear('x')")[0].kind, StmtKind::Expr { .. }));
    }

    #[test]
    fn syntax_errors() {
        assert!(parse("endfunction").is_err());
        assert!(parse("x = (1 + 2").is_err());
        assert!(parse("if x").is_err());
        let e = parse("x = 1\ny = = 2").unwrap_err();
        assert_eq!(e.line, 2);
    }

    #[test]
    fn compound_assignment() {
        let b = body("x += 2;");
        let StmtKind::Assign { rhs, .. } = &b[0].kind else { panic!() };
        assert!(matches!(rhs, Expr::Binary(BinOp::Add, _, _)));
    }
}
