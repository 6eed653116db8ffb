//! Abstract syntax tree

use crate::error::Pos;

#[derive(Debug, Clone)]
pub struct File {
    pub package: String,
    pub package_pos: Pos,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub path: String,
    pub alias: Option<String>,
    pub pos: Pos,
}

impl Import {
    /// Name the import is referenced by in the file
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Type(TypeDecl),
    Const(ConstDecl),
    Func(FuncDecl),
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub body: Block,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Name(String, Pos),
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Struct(Vec<FieldDecl>),
    Interface(Vec<String>),
    Func(Vec<TypeExpr>, Vec<TypeExpr>),
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub tag: Option<String>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var {
        names: Vec<String>,
        ty: Option<TypeExpr>,
        values: Vec<Expr>,
        pos: Pos,
    },
    Define {
        names: Vec<String>,
        values: Vec<Expr>,
        pos: Pos,
    },
    Assign {
        targets: Vec<Expr>,
        op: AssignOp,
        values: Vec<Expr>,
        pos: Pos,
    },
    IncDec {
        target: Expr,
        inc: bool,
        pos: Pos,
    },
    Expr(Expr),
    Return {
        values: Vec<Expr>,
        pos: Pos,
    },
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Block,
        els: Option<Box<Stmt>>,
        pos: Pos,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
        pos: Pos,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
        body: Block,
        pos: Pos,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        cases: Vec<CaseClause>,
        pos: Pos,
    },
    Block(Block),
    Break(Pos),
    Continue(Pos),
}

#[derive(Debug, Clone)]
pub struct CaseClause {
    /// Empty for `default`
    pub exprs: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    Addr,
    Deref,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::BitOr | BinaryOp::BitXor => 4,
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::BitAnd
            | BinaryOp::Shl
            | BinaryOp::Shr => 5,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(String, Pos),
    Int(i64, Pos),
    Float(f64, Pos),
    Str(String, Pos),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        spread: bool,
        pos: Pos,
    },
    Selector {
        expr: Box<Expr>,
        name: String,
        pos: Pos,
    },
    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    SliceExpr {
        expr: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
        pos: Pos,
    },
    /// `T{...}`; the type is elided inside an enclosing composite literal
    Composite {
        ty: Option<TypeExpr>,
        elems: Vec<Element>,
        pos: Pos,
    },
    /// A type in expression position (`make([]int, 3)`, `new(T)`)
    Type(TypeExpr, Pos),
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Ident(_, pos)
            | Expr::Int(_, pos)
            | Expr::Float(_, pos)
            | Expr::Str(_, pos)
            | Expr::Type(_, pos) => *pos,
            Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Selector { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::SliceExpr { pos, .. }
            | Expr::Composite { pos, .. } => *pos,
        }
    }
}
