//! Syntax tree.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    /// `*`
    MatMul,
    /// `/`
    MatDiv,
    /// `\`
    MatLeftDiv,
    /// `^`
    MatPow,
    /// `.*`
    Mul,
    /// `./`
    Div,
    /// `.\`
    LeftDiv,
    /// `.^`
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Elementwise `&`
    And,
    /// Elementwise `|`
    Or,
}

impl BinOp {
    /// Operator spelling, for error messages.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::MatMul => "*",
            BinOp::MatDiv => "/",
            BinOp::MatLeftDiv => "\\",
            BinOp::MatPow => "^",
            BinOp::Mul => ".*",
            BinOp::Div => "./",
            BinOp::LeftDiv => ".\\",
            BinOp::Pow => ".^",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&",
            BinOp::Or => "|",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
    /// `'`
    CTranspose,
    /// `.'`
    Transpose,
}

/// One step of an index chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// `(args)`
    Paren(Vec<Expr>),
    /// `{args}`
    Brace(Vec<Expr>),
    /// `.name`
    Field(String),
    /// `.(expr)`
    DynField(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Imag(f64),
    Str { text: String, double_quoted: bool },
    Ident(String),
    /// Magic `:` inside an index.
    Colon,
    /// Magic `end` inside an index.
    End,
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    AndAnd(Box<Expr>, Box<Expr>),
    OrOr(Box<Expr>, Box<Expr>),
    Range { start: Box<Expr>, step: Option<Box<Expr>>, stop: Box<Expr> },
    /// `[ ... ]`, rows of elements.
    Matrix(Vec<Vec<Expr>>),
    /// `{ ... }`, rows of elements.
    CellLit(Vec<Vec<Expr>>),
    /// `base` followed by index/field accesses.
    Index { base: Box<Expr>, chain: Vec<Access> },
    /// `@name`
    FuncHandle(String),
}

/// Assignment target.
#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    Var { name: String, chain: Vec<Access> },
    /// `~` in a multi-assignment.
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr { expr: Expr, print: bool },
    Assign { lhs: Vec<LValue>, rhs: Expr, print: bool },
    If { clauses: Vec<(Expr, Block)>, else_block: Option<Block> },
    While { cond: Expr, body: Block },
    For { var: LValue, iter: Expr, body: Block },
    Switch { subject: Expr, cases: Vec<(Expr, Block)>, default: Option<Block> },
    Break,
    Continue,
    Return,
    Global(Vec<(String, Option<Expr>)>),
    TryCatch { body: Block, ident: Option<String>, handler: Block },
    UnwindProtect { body: Block, cleanup: Block },
    /// Command syntax, e.g. `clear x y`.
    Command { name: String, args: Vec<String>, print: bool },
}

pub type Block = Vec<Stmt>;

/// A user-defined function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub outputs: Vec<String>,
    pub body: Block,
}

impl FunctionDef {
    pub fn takes_varargin(&self) -> bool {
        self.params.last().is_some_and(|p| p == "varargin")
    }

    pub fn gives_varargout(&self) -> bool {
        self.outputs.last().is_some_and(|p| p == "varargout")
    }
}

/// A parsed source unit: top-level statements plus the functions it defines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Block,
    pub functions: Vec<Arc<FunctionDef>>,
}
