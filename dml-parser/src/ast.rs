use core::fmt::{Display, Formatter};

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UOp {
    /// Negation
    Neg,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BOp {
    /// Addition, concatenation for strings
    Add,
    /// Subtraction
    Sub,
    /// Elementwise multiplication
    Mul,
    /// Elementwise division
    Div,
    /// Elementwise exponentiation
    Pow,
    /// Matrix multiplication
    MatMul,
}

impl BOp {
    /// Operator as written in scripts
    pub fn symbol(self) -> &'static str {
        match self {
            BOp::Add => "+",
            BOp::Sub => "-",
            BOp::Mul => "*",
            BOp::Div => "/",
            BOp::Pow => "^",
            BOp::MatMul => "%*%",
        }
    }
}

/// Expression together with the line it starts on
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// What the expression is
    pub kind: ExprKind,
    /// Line number, starting at 1
    pub line: usize,
}

/// Kinds of expressions
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Double literal
    Double(f64),
    /// Integer literal
    Int(i64),
    /// Boolean literal
    Boolean(bool),
    /// String literal
    String(Box<str>),
    /// Variable reference
    Ident(Box<str>),
    /// Unary operation
    Unary(UOp, Box<Expr>),
    /// Binary operation
    Binary(BOp, Box<Expr>, Box<Expr>),
    /// Call of builtin function
    Call {
        /// Function name
        name: Box<str>,
        /// Positional and named arguments in written order
        args: Vec<Arg>,
    },
}

/// Function call argument
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Name of named argument, none for positional argument
    pub name: Option<Box<str>>,
    /// Argument value
    pub value: Expr,
}

/// Statement together with the line it starts on
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// What the statement is
    pub kind: StatementKind,
    /// Line number, starting at 1
    pub line: usize,
}

/// Kinds of statements
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `target = value`
    Assign {
        /// Assigned variable
        target: Box<str>,
        /// Assigned expression
        value: Expr,
    },
    /// Expression evaluated for its side effects, like `write(...)`
    Expr(Expr),
}

/// Parsed script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Statements in execution order
    pub statements: Vec<Statement>,
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match &self.kind {
            ExprKind::Double(x) => f.write_fmt(format_args!("{x:?}")),
            ExprKind::Int(x) => f.write_fmt(format_args!("{x}")),
            ExprKind::Boolean(x) => f.write_str(if *x { "TRUE" } else { "FALSE" }),
            ExprKind::String(x) => f.write_fmt(format_args!("{x:?}")),
            ExprKind::Ident(x) => f.write_str(x),
            ExprKind::Unary(UOp::Neg, x) => f.write_fmt(format_args!("-({x})")),
            ExprKind::Binary(op, x, y) => f.write_fmt(format_args!("({x} {} {y})", op.symbol())),
            ExprKind::Call { name, args } => {
                f.write_fmt(format_args!("{name}("))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(n) = &arg.name {
                        f.write_fmt(format_args!("{n}="))?;
                    }
                    f.write_fmt(format_args!("{}", arg.value))?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match &self.kind {
            StatementKind::Assign { target, value } => {
                f.write_fmt(format_args!("{target} = {value};"))
            }
            StatementKind::Expr(e) => f.write_fmt(format_args!("{e};")),
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        for s in &self.statements {
            f.write_fmt(format_args!("{:>4}: {s}\n", s.line))?;
        }
        Ok(())
    }
}
