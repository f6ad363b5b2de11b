//! Abstract Syntax Tree (AST) definitions
//!
//! The tree handed to the code generator after parsing and static checking.
//! It is assumed valid: names resolve, types agree, arities match.

use serde::{Deserialize, Serialize};

/// AST schema version
///
/// Included in JSON hand-over so a driver and the runtime agree on the
/// tree layout. Increment when making breaking changes to the structure.
pub const AST_VERSION: u32 = 1;

/// Top-level program: record types and functions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub types: Vec<TypeDecl>,
    pub functions: Vec<FunDecl>,
}

/// Versioned AST wrapper for JSON serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedProgram {
    /// AST schema version
    pub ast_version: u32,
    /// The actual program AST
    #[serde(flatten)]
    pub program: Program,
}

impl VersionedProgram {
    pub fn new(program: Program) -> Self {
        Self {
            ast_version: AST_VERSION,
            program,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<Program> for VersionedProgram {
    fn from(program: Program) -> Self {
        Self::new(program)
    }
}

/// Record type declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    /// Fields with their initializers, in declaration order
    pub fields: Vec<VarDecl>,
}

/// Function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunDecl {
    pub name: String,
    pub return_type: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    VarDecl(VarDecl),
    Assign(Assign),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Return(Option<Expr>),
    Delete(String),
    Call(CallExpr),
}

/// Variable declaration (`var x = e` or `var int x = e`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<String>,
    pub init: Expr,
}

/// Assignment to a variable or a field path (`a.b.c = e`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub target: Vec<String>,
    pub value: Expr,
}

/// `if`/`elif`/`else` chain
///
/// `branches[0]` is the `if`, the remaining entries are `elif`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub branches: Vec<Branch>,
    pub else_body: Option<Vec<Stmt>>,
}

/// One guarded block of an `if` chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// While loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// Counting loop (`for i from a upto b`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub var: String,
    pub start: Expr,
    pub direction: ForDirection,
    pub end: Expr,
    pub body: Vec<Stmt>,
}

/// Direction of a counting loop; both bounds are inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForDirection {
    Upto,
    Downto,
}

/// Function call (user function or built-in)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub name: String,
    pub args: Vec<Expr>,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    /// Variable or field path: `x`, `a.b.c`
    Path(Vec<String>),
    /// Record construction: `new T`
    New(String),
    Call(CallExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    /// Parenthesized sub-expression
    Group(Box<Expr>),
}

/// Unary expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub expr: Box<Expr>,
}

/// Binary expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Double(f64),
    Bool(bool),
    Char(char),
    String(String),
    Nil,
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate, // neg
    Not,    // not
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
}

// Builders used by drivers and tests to assemble trees without a parser

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn double(value: f64) -> Self {
        Expr::Literal(Literal::Double(value))
    }

    pub fn bool(value: bool) -> Self {
        Expr::Literal(Literal::Bool(value))
    }

    pub fn char(value: char) -> Self {
        Expr::Literal(Literal::Char(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn nil() -> Self {
        Expr::Literal(Literal::Nil)
    }

    /// Single variable reference
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Path(vec![name.into()])
    }

    /// Field path; `Expr::path(&["a", "b"])` is `a.b`
    pub fn path(components: &[&str]) -> Self {
        Expr::Path(components.iter().map(|c| c.to_string()).collect())
    }

    pub fn new_record(type_name: impl Into<String>) -> Self {
        Expr::New(type_name.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(CallExpr::new(name, args))
    }

    pub fn neg(expr: Expr) -> Self {
        Expr::Unary(UnaryExpr {
            op: UnaryOp::Negate,
            expr: Box::new(expr),
        })
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Unary(UnaryExpr {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        })
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn group(expr: Expr) -> Self {
        Expr::Group(Box::new(expr))
    }
}

impl CallExpr {
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

impl Stmt {
    /// `var name = init`
    pub fn var(name: impl Into<String>, init: Expr) -> Self {
        Stmt::VarDecl(VarDecl {
            name: name.into(),
            ty: None,
            init,
        })
    }

    /// `var ty name = init`
    pub fn typed_var(ty: impl Into<String>, name: impl Into<String>, init: Expr) -> Self {
        Stmt::VarDecl(VarDecl {
            name: name.into(),
            ty: Some(ty.into()),
            init,
        })
    }

    /// `name = value`
    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign(Assign {
            target: vec![name.into()],
            value,
        })
    }

    /// `a.b.c = value`
    pub fn assign_path(target: &[&str], value: Expr) -> Self {
        Stmt::Assign(Assign {
            target: target.iter().map(|c| c.to_string()).collect(),
            value,
        })
    }

    /// Bare call statement
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Stmt::Call(CallExpr::new(name, args))
    }

    /// `print(expr)`
    pub fn print(expr: Expr) -> Self {
        Stmt::call("print", vec![expr])
    }

    pub fn ret(expr: Expr) -> Self {
        Stmt::Return(Some(expr))
    }

    pub fn ret_nil() -> Self {
        Stmt::Return(None)
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Stmt::Delete(name.into())
    }

    pub fn while_loop(cond: Expr, body: Vec<Stmt>) -> Self {
        Stmt::While(WhileStmt { cond, body })
    }

    pub fn for_upto(var: impl Into<String>, start: Expr, end: Expr, body: Vec<Stmt>) -> Self {
        Stmt::For(ForStmt {
            var: var.into(),
            start,
            direction: ForDirection::Upto,
            end,
            body,
        })
    }

    pub fn for_downto(var: impl Into<String>, start: Expr, end: Expr, body: Vec<Stmt>) -> Self {
        Stmt::For(ForStmt {
            var: var.into(),
            start,
            direction: ForDirection::Downto,
            end,
            body,
        })
    }

    /// `if cond { body }`
    pub fn if_then(cond: Expr, body: Vec<Stmt>) -> Self {
        Stmt::If(IfStmt {
            branches: vec![Branch { cond, body }],
            else_body: None,
        })
    }

    /// Full `if`/`elif`/`else` chain
    pub fn if_chain(branches: Vec<(Expr, Vec<Stmt>)>, else_body: Option<Vec<Stmt>>) -> Self {
        Stmt::If(IfStmt {
            branches: branches
                .into_iter()
                .map(|(cond, body)| Branch { cond, body })
                .collect(),
            else_body,
        })
    }
}

impl FunDecl {
    /// `params` are `(type, name)` pairs in declaration order
    pub fn new(
        return_type: impl Into<String>,
        name: impl Into<String>,
        params: &[(&str, &str)],
        body: Vec<Stmt>,
    ) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            params: params
                .iter()
                .map(|(ty, name)| Param {
                    name: name.to_string(),
                    ty: ty.to_string(),
                })
                .collect(),
            body,
        }
    }

    /// `fun void main() { body }`
    pub fn main(body: Vec<Stmt>) -> Self {
        Self::new("void", "main", &[], body)
    }
}

impl TypeDecl {
    /// `fields` are `(name, initializer)` pairs in declaration order
    pub fn new(name: impl Into<String>, fields: Vec<(&str, Expr)>) -> Self {
        Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(field, init)| VarDecl {
                    name: field.to_string(),
                    ty: None,
                    init,
                })
                .collect(),
        }
    }
}

impl Program {
    pub fn new(types: Vec<TypeDecl>, functions: Vec<FunDecl>) -> Self {
        Self { types, functions }
    }

    /// Program consisting of a single `main`
    pub fn with_main(body: Vec<Stmt>) -> Self {
        Self::new(Vec::new(), vec![FunDecl::main(body)])
    }
}
