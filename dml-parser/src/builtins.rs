use crate::ast::{Arg, Expr};
use dml_core::error::DmlError;

/// Parameter of builtin function
#[derive(Debug, Clone, Copy)]
pub struct Param {
    /// Name usable for named arguments
    pub name: &'static str,
    /// Must the argument be given?
    pub required: bool,
}

const fn req(name: &'static str) -> Param {
    Param { name, required: true }
}

const fn opt(name: &'static str) -> Param {
    Param { name, required: false }
}

/// Builtin function signature
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    /// Function name
    pub name: &'static str,
    /// Parameters in positional order
    pub params: &'static [Param],
    /// Does this function produce a value?
    pub returns_value: bool,
}

const fn builtin(name: &'static str, params: &'static [Param]) -> Builtin {
    Builtin { name, params, returns_value: true }
}

const X: &[Param] = &[req("target")];
const READ: &[Param] = &[req("path"), opt("rows"), opt("cols"), opt("format")];
const WRITE: &[Param] = &[req("target"), req("path"), opt("format")];
const MIN_MAX: &[Param] = &[req("target"), opt("other")];
const RAND: &[Param] = &[
    req("rows"),
    req("cols"),
    opt("min"),
    opt("max"),
    opt("sparsity"),
    opt("seed"),
];
const MATRIX: &[Param] = &[req("data"), req("rows"), req("cols")];

static BUILTINS: &[Builtin] = &[
    builtin("read", READ),
    Builtin { name: "write", params: WRITE, returns_value: false },
    Builtin { name: "print", params: X, returns_value: false },
    builtin("sum", X),
    builtin("rowSums", X),
    builtin("colSums", X),
    builtin("mean", X),
    builtin("min", MIN_MAX),
    builtin("max", MIN_MAX),
    builtin("nrow", X),
    builtin("ncol", X),
    builtin("as.scalar", X),
    builtin("abs", X),
    builtin("exp", X),
    builtin("sqrt", X),
    builtin("rand", RAND),
    builtin("matrix", MATRIX),
];

/// Aggregates which only accept a matrix argument, min and max
/// are aggregates only when called with a single argument.
pub const AGGREGATES: &[&str] = &["sum", "rowSums", "colSums", "mean", "min", "max"];

/// Find builtin by name
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

impl Builtin {
    /// Bind call arguments to parameters. Returns one entry per parameter,
    /// in parameter order, none where an optional argument was not given.
    pub fn bind<'a>(&self, args: &'a [Arg], line: usize) -> Result<Vec<Option<&'a Expr>>, DmlError> {
        let mut bound: Vec<Option<&Expr>> = vec![None; self.params.len()];
        let mut positional = 0;
        for arg in args {
            let i = match &arg.name {
                None => {
                    let i = positional;
                    positional += 1;
                    if i >= self.params.len() {
                        return Err(DmlError::language_error(format!(
                            "Function {} takes at most {} arguments, found {} at line {line}",
                            self.name,
                            self.params.len(),
                            args.len()
                        )));
                    }
                    i
                }
                Some(name) => self.params.iter().position(|p| p.name == &**name).ok_or_else(|| {
                    DmlError::language_error(format!(
                        "Function {} has no parameter named {name} at line {line}",
                        self.name
                    ))
                })?,
            };
            if bound[i].is_some() {
                return Err(DmlError::language_error(format!(
                    "Parameter {} of function {} is given twice at line {line}",
                    self.params[i].name, self.name
                )));
            }
            bound[i] = Some(&arg.value);
        }
        if let Some(p) = self.params.iter().zip(&bound).find(|(p, b)| p.required && b.is_none()) {
            return Err(DmlError::language_error(format!(
                "Missing argument {} of function {} at line {line}",
                p.0.name, self.name
            )));
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprKind;

    fn arg(name: Option<&str>, v: i64) -> Arg {
        Arg {
            name: name.map(Into::into),
            value: Expr { kind: ExprKind::Int(v), line: 1 },
        }
    }

    #[test]
    fn bind_positional_and_named() -> Result<(), DmlError> {
        let rand = lookup("rand").ok_or_else(|| DmlError::runtime_error("no rand"))?;
        let args = [arg(None, 10), arg(Some("seed"), 7), arg(Some("cols"), 3)];
        let bound = rand.bind(&args, 1)?;
        assert_eq!(bound.len(), 6);
        assert_eq!(bound[0].map(|e| &e.kind), Some(&ExprKind::Int(10)));
        assert_eq!(bound[1].map(|e| &e.kind), Some(&ExprKind::Int(3)));
        assert!(bound[2].is_none());
        assert_eq!(bound[5].map(|e| &e.kind), Some(&ExprKind::Int(7)));
        Ok(())
    }

    #[test]
    fn bind_errors_are_language_errors() {
        let sum = lookup("sum").map(|b| *b);
        let Some(sum) = sum else { panic!("sum is a builtin") };
        for args in [
            vec![],
            vec![arg(None, 1), arg(None, 2)],
            vec![arg(Some("x"), 1)],
            vec![arg(None, 1), arg(Some("target"), 1)],
        ] {
            let err = sum.bind(&args, 3).err();
            assert!(matches!(err, Some(DmlError::LanguageError(_))));
        }
        assert!(lookup("solve").is_none());
    }
}
