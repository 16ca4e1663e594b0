//! Target-language AST for emitted code.
//!
//! The SEG pipeline builds programs against this surface only; the concrete
//! C-like rendering below is a stand-in for whatever expression emitter the
//! surrounding toolchain plugs in.

use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(String),
    Int(i64),
    Index(Box<Expr>, Box<Expr>),
    Deref(Box<Expr>),
    AddrOf(Box<Expr>),
    Call(String, Vec<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn int(value: i64) -> Self {
        Self::Int(value)
    }

    pub fn index(base: Expr, idx: Expr) -> Self {
        Self::Index(Box::new(base), Box::new(idx))
    }

    pub fn deref(inner: Expr) -> Self {
        Self::Deref(Box::new(inner))
    }

    pub fn addr_of(inner: Expr) -> Self {
        Self::AddrOf(Box::new(inner))
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call(callee.into(), args)
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::Add(Box::new(lhs), Box::new(rhs))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::Eq(Box::new(lhs), Box::new(rhs))
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::And(Box::new(lhs), Box::new(rhs))
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "{name}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Index(base, idx) => write!(f, "{base}[{idx}]"),
            Self::Deref(inner) => write!(f, "(*{inner})"),
            Self::AddrOf(inner) => write!(f, "&{inner}"),

            Self::Call(callee, args) => {
                write!(f, "{callee}(")?;

                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }

                    write!(f, "{arg}")?;
                }

                write!(f, ")")
            }

            Self::Add(lhs, rhs) => write!(f, "({lhs} + {rhs})"),
            Self::Eq(lhs, rhs) => write!(f, "({lhs} == {rhs})"),
            Self::And(lhs, rhs) => write!(f, "({lhs} && {rhs})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Local { ty: String, name: String, init: Expr },
    Assign { target: Expr, value: Expr },
    Expr(Expr),
    Return(Expr),
    If { cond: Expr, body: Vec<Stmt> },
}

impl Stmt {
    pub fn local(name: impl Into<String>, init: Expr) -> Self {
        Self::Local {
            ty: "auto".into(),
            name: name.into(),
            init,
        }
    }

    pub fn typed_local(ty: impl Into<String>, name: impl Into<String>, init: Expr) -> Self {
        Self::Local {
            ty: ty.into(),
            name: name.into(),
            init,
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::Assign { target, value }
    }

    pub fn if_(cond: Expr, body: Vec<Stmt>) -> Self {
        Self::If { cond, body }
    }
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, indent: usize) -> fmt::Result {
    let pad = "    ".repeat(indent);

    match stmt {
        Stmt::Local { ty, name, init } => writeln!(f, "{pad}{ty} {name} = {init};"),
        Stmt::Assign { target, value } => writeln!(f, "{pad}{target} = {value};"),
        Stmt::Expr(expr) => writeln!(f, "{pad}{expr};"),
        Stmt::Return(expr) => writeln!(f, "{pad}return {expr};"),

        Stmt::If { cond, body } => {
            writeln!(f, "{pad}if {cond} {{")?;

            for stmt in body {
                write_stmt(f, stmt, indent + 1)?;
            }

            writeln!(f, "{pad}}}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub ty: String,
    pub name: String,
}

impl Param {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
        }
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub ret: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

impl Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.ret, self.name)?;

        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }

            write!(f, "{param}")?;
        }

        writeln!(f, ") {{")?;

        for stmt in &self.body {
            write_stmt(f, stmt, 1)?;
        }

        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_function() {
        let decl = FunctionDecl {
            name: "probe".into(),
            ret: "Value".into(),
            params: vec![Param::new("Value*", "stack"), Param::new("int*", "stack_offset")],
            body: vec![
                Stmt::local(
                    "v0",
                    Expr::index(Expr::var("stack"), Expr::deref(Expr::var("stack_offset"))),
                ),
                Stmt::if_(
                    Expr::and(
                        Expr::eq(Expr::var("select_0"), Expr::int(1)),
                        Expr::eq(Expr::var("select_1"), Expr::int(0)),
                    ),
                    vec![Stmt::Expr(Expr::call("seg_fn_0", vec![Expr::var("v0")]))],
                ),
                Stmt::Return(Expr::var("v0")),
            ],
        };

        let expected = "\
Value probe(Value* stack, int* stack_offset) {
    auto v0 = stack[(*stack_offset)];
    if ((select_0 == 1) && (select_1 == 0)) {
        seg_fn_0(v0);
    }
    return v0;
}
";
        assert_eq!(decl.to_string(), expected);
    }
}
