use crate::ast::{Arg, BOp, Expr, ExprKind, Program, StatementKind, UOp};
use crate::builtins::{lookup, AGGREGATES};
use dml_core::dtype::{DataType, ValueType};
use dml_core::error::DmlError;
use std::collections::BTreeMap;

/// What validation knows about a value before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInfo {
    /// Scalar or matrix
    pub data_type: DataType,
    /// Value type, always double for matrices
    pub value_type: ValueType,
    /// Number of rows of matrix, if known
    pub rows: Option<usize>,
    /// Number of columns of matrix, if known
    pub cols: Option<usize>,
}

impl VarInfo {
    const fn scalar(value_type: ValueType) -> Self {
        Self { data_type: DataType::Scalar, value_type, rows: None, cols: None }
    }

    const fn matrix(rows: Option<usize>, cols: Option<usize>) -> Self {
        Self { data_type: DataType::Matrix, value_type: ValueType::Double, rows, cols }
    }

    fn is_matrix(&self) -> bool {
        self.data_type == DataType::Matrix
    }

    fn is_one_by_one(&self) -> bool {
        self.rows == Some(1) && self.cols == Some(1)
    }
}

/// Result of validation, types of all variables after the last statement
#[derive(Debug, Clone, Default)]
pub struct Validation {
    /// Variables by name
    pub variables: BTreeMap<Box<str>, VarInfo>,
}

fn literal_dim(e: Option<&Expr>) -> Option<usize> {
    match e.map(|e| &e.kind) {
        Some(ExprKind::Int(x)) => usize::try_from(*x).ok(),
        _ => None,
    }
}

struct Validator {
    variables: BTreeMap<Box<str>, VarInfo>,
}

impl Validator {
    fn expr(&self, e: &Expr) -> Result<VarInfo, DmlError> {
        match &e.kind {
            ExprKind::Double(_) => Ok(VarInfo::scalar(ValueType::Double)),
            ExprKind::Int(_) => Ok(VarInfo::scalar(ValueType::Int)),
            ExprKind::Boolean(_) => Ok(VarInfo::scalar(ValueType::Boolean)),
            ExprKind::String(_) => Ok(VarInfo::scalar(ValueType::String)),
            ExprKind::Ident(name) => self.variables.get(name).copied().ok_or_else(|| {
                DmlError::language_error(format!(
                    "Undefined Variable ({name}) used in statement at line {}",
                    e.line
                ))
            }),
            ExprKind::Unary(UOp::Neg, x) => {
                let x = self.expr(x)?;
                if x.value_type == ValueType::String {
                    return Err(DmlError::language_error(format!(
                        "Cannot negate string at line {}",
                        e.line
                    )));
                }
                Ok(x)
            }
            ExprKind::Binary(op, x, y) => self.binary(*op, x, y, e.line),
            ExprKind::Call { name, args } => {
                let no_value = || {
                    DmlError::language_error(format!(
                        "Function {name} does not return a value, but is used as expression at line {}",
                        e.line
                    ))
                };
                if lookup(name).is_some_and(|b| !b.returns_value) {
                    return Err(no_value());
                }
                self.call(name, args, e.line)?.ok_or_else(no_value)
            }
        }
    }

    fn binary(&self, op: BOp, x: &Expr, y: &Expr, line: usize) -> Result<VarInfo, DmlError> {
        let xi = self.expr(x)?;
        let yi = self.expr(y)?;
        if op == BOp::MatMul {
            return Err(DmlError::language_error(format!(
                "Matrix multiplication %*% is not supported at line {line}"
            )));
        }
        let strings = xi.value_type == ValueType::String || yi.value_type == ValueType::String;
        if strings {
            if op == BOp::Add && !xi.is_matrix() && !yi.is_matrix() {
                return Ok(VarInfo::scalar(ValueType::String));
            }
            return Err(DmlError::language_error(format!(
                "Invalid operand of type string for operator {} at line {line}",
                op.symbol()
            )));
        }
        match (xi.is_matrix(), yi.is_matrix()) {
            (true, true) => {
                if xi.is_one_by_one() {
                    return Ok(yi);
                }
                if yi.is_one_by_one() {
                    return Ok(xi);
                }
                let mismatch = |a: Option<usize>, b: Option<usize>| matches!((a, b), (Some(a), Some(b)) if a != b);
                if mismatch(xi.rows, yi.rows) || mismatch(xi.cols, yi.cols) {
                    return Err(DmlError::language_error(format!(
                        "Mismatched dimensions for operator {}: {}x{} and {}x{} at line {line}",
                        op.symbol(),
                        dim(xi.rows),
                        dim(xi.cols),
                        dim(yi.rows),
                        dim(yi.cols)
                    )));
                }
                Ok(VarInfo::matrix(xi.rows.or(yi.rows), xi.cols.or(yi.cols)))
            }
            (true, false) => Ok(xi),
            (false, true) => Ok(yi),
            (false, false) => {
                let ints = xi.value_type == ValueType::Int && yi.value_type == ValueType::Int;
                if ints && matches!(op, BOp::Add | BOp::Sub | BOp::Mul) {
                    Ok(VarInfo::scalar(ValueType::Int))
                } else {
                    Ok(VarInfo::scalar(ValueType::Double))
                }
            }
        }
    }

    fn expect_string(&self, e: &Expr, what: &str, function: &str) -> Result<(), DmlError> {
        let info = self.expr(e)?;
        if info.is_matrix() || !matches!(info.value_type, ValueType::String | ValueType::Unknown) {
            return Err(DmlError::language_error(format!(
                "Argument {what} of function {function} must be a string at line {}",
                e.line
            )));
        }
        Ok(())
    }

    fn expect_numeric_scalar(&self, e: Option<&Expr>, what: &str, function: &str) -> Result<(), DmlError> {
        let Some(e) = e else { return Ok(()) };
        let info = self.expr(e)?;
        if info.is_matrix() || !info.value_type.is_numeric() {
            return Err(DmlError::language_error(format!(
                "Argument {what} of function {function} must be a numeric scalar at line {}",
                e.line
            )));
        }
        Ok(())
    }

    /// Returns type of value produced by call, none for functions without value
    fn call(&self, name: &str, args: &[Arg], line: usize) -> Result<Option<VarInfo>, DmlError> {
        let builtin = lookup(name).ok_or_else(|| {
            DmlError::language_error(format!("Unknown function {name} at line {line}"))
        })?;
        let bound = builtin.bind(args, line)?;
        let target = match bound.first().copied().flatten() {
            Some(e) => Some(self.expr(e)?),
            None => None,
        };
        let other = match bound.get(1).copied().flatten() {
            Some(e) if matches!(name, "min" | "max") => Some(self.expr(e)?),
            _ => None,
        };

        // Single argument aggregates are only defined for matrices
        if AGGREGATES.contains(&name) && other.is_none() {
            if let Some(t) = target {
                if !t.is_matrix() {
                    return Err(DmlError::language_error(format!(
                        "Expecting matrix argument for function {name} at line {line}"
                    )));
                }
            }
        }

        let matrix_arg = |what: &str| -> Result<VarInfo, DmlError> {
            match target {
                Some(t) if t.is_matrix() => Ok(t),
                _ => Err(DmlError::language_error(format!(
                    "Expecting matrix argument for function {what} at line {line}"
                ))),
            }
        };

        let info = match name {
            "read" => {
                if let Some(p) = bound[0] {
                    self.expect_string(p, "path", name)?;
                }
                self.expect_numeric_scalar(bound[1], "rows", name)?;
                self.expect_numeric_scalar(bound[2], "cols", name)?;
                if let Some(f) = bound[3] {
                    self.expect_string(f, "format", name)?;
                }
                Some(VarInfo::matrix(literal_dim(bound[1]), literal_dim(bound[2])))
            }
            "write" => {
                if let Some(p) = bound[1] {
                    self.expect_string(p, "path", name)?;
                }
                if let Some(f) = bound[2] {
                    self.expect_string(f, "format", name)?;
                }
                None
            }
            "print" => None,
            "sum" | "mean" => Some(VarInfo::scalar(ValueType::Double)),
            "min" | "max" => match (target, other) {
                (Some(t), Some(o)) => {
                    if t.is_matrix() || o.is_matrix() {
                        return Err(DmlError::language_error(format!(
                            "Two argument {name} is only supported for scalars at line {line}"
                        )));
                    }
                    if t.value_type == ValueType::Int && o.value_type == ValueType::Int {
                        Some(VarInfo::scalar(ValueType::Int))
                    } else {
                        Some(VarInfo::scalar(ValueType::Double))
                    }
                }
                _ => Some(VarInfo::scalar(ValueType::Double)),
            },
            "rowSums" => Some(VarInfo::matrix(matrix_arg(name)?.rows, Some(1))),
            "colSums" => Some(VarInfo::matrix(Some(1), matrix_arg(name)?.cols)),
            "nrow" | "ncol" => {
                matrix_arg(name)?;
                Some(VarInfo::scalar(ValueType::Int))
            }
            "as.scalar" => {
                let t = matrix_arg(name)?;
                let known_wrong = t.rows.is_some_and(|r| r != 1) || t.cols.is_some_and(|c| c != 1);
                if known_wrong {
                    return Err(DmlError::language_error(format!(
                        "as.scalar expects a 1x1 matrix, found {}x{} at line {line}",
                        dim(t.rows),
                        dim(t.cols)
                    )));
                }
                Some(VarInfo::scalar(ValueType::Double))
            }
            "abs" | "exp" | "sqrt" => {
                let t = target.unwrap_or(VarInfo::scalar(ValueType::Unknown));
                if !t.value_type.is_numeric() {
                    return Err(DmlError::language_error(format!(
                        "Function {name} expects numeric argument at line {line}"
                    )));
                }
                if t.is_matrix() {
                    Some(t)
                } else {
                    Some(VarInfo::scalar(ValueType::Double))
                }
            }
            "rand" => {
                for (i, p) in builtin.params.iter().enumerate() {
                    self.expect_numeric_scalar(bound[i], p.name, name)?;
                }
                Some(VarInfo::matrix(literal_dim(bound[0]), literal_dim(bound[1])))
            }
            "matrix" => {
                for (i, p) in builtin.params.iter().enumerate() {
                    self.expect_numeric_scalar(bound[i], p.name, name)?;
                }
                Some(VarInfo::matrix(literal_dim(bound[1]), literal_dim(bound[2])))
            }
            _ => {
                return Err(DmlError::language_error(format!(
                    "Function {name} has no validation rule at line {line}"
                )))
            }
        };
        Ok(info)
    }
}

fn dim(d: Option<usize>) -> String {
    d.map_or_else(|| "?".into(), |d| d.to_string())
}

/// Check program for language errors without executing it.
/// Statements are checked in order, so variables must be assigned before use.
pub fn validate(program: &Program) -> Result<Validation, DmlError> {
    let mut validator = Validator { variables: BTreeMap::new() };
    for statement in &program.statements {
        match &statement.kind {
            StatementKind::Assign { target, value } => {
                let info = validator.expr(value)?;
                if dml_core::debug(dml_core::DEBUG_PARSE) {
                    println!("Line {}: {target} is {info:?}", statement.line);
                }
                validator.variables.insert(target.clone(), info);
            }
            StatementKind::Expr(Expr { kind: ExprKind::Call { name, args }, line }) => {
                validator.call(name, args, *line)?;
            }
            StatementKind::Expr(e) => {
                validator.expr(e)?;
            }
        }
    }
    Ok(Validation { variables: validator.variables })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check(source: &str) -> Result<Validation, DmlError> {
        validate(&parse(source)?)
    }

    fn language_error(source: &str) -> bool {
        matches!(check(source), Err(DmlError::LanguageError(_)))
    }

    #[test]
    fn sum_of_matrix_is_scalar() -> Result<(), DmlError> {
        let v = check("V = read(\"in/vector\", rows=10, cols=1, format=\"text\");\ns = sum(V);")?;
        assert_eq!(v.variables["V"], VarInfo::matrix(Some(10), Some(1)));
        assert_eq!(v.variables["s"], VarInfo::scalar(ValueType::Double));
        Ok(())
    }

    #[test]
    fn sum_of_scalar_is_language_error() {
        assert!(language_error("scalar = 3;\nscalar_sum = sum(scalar);"));
        assert!(language_error("x = sum(3.5);"));
        assert!(language_error("write(sum(3), \"out\");"));
        let Err(DmlError::LanguageError(msg)) = check("s = 3; t = sum(s);") else {
            panic!("sum of scalar must fail validation");
        };
        assert!(msg.contains("Expecting matrix argument for function sum"));
    }

    #[test]
    fn other_aggregates_of_scalar() {
        for f in ["rowSums", "colSums", "mean", "min", "max", "nrow", "ncol", "as.scalar"] {
            assert!(language_error(&format!("x = 3; y = {f}(x);")), "{f}");
        }
        assert!(check("x = min(3, 4);").is_ok());
        assert!(language_error("X = rand(rows=2, cols=2); y = max(X, 1);"));
    }

    #[test]
    fn dimensions_are_propagated() -> Result<(), DmlError> {
        let v = check(
            "X = rand(rows=3, cols=4, seed=7);\nr = rowSums(X);\nc = colSums(X);\nY = X * 2 + X;",
        )?;
        assert_eq!(v.variables["r"], VarInfo::matrix(Some(3), Some(1)));
        assert_eq!(v.variables["c"], VarInfo::matrix(Some(1), Some(4)));
        assert_eq!(v.variables["Y"], VarInfo::matrix(Some(3), Some(4)));
        assert!(language_error("X = rand(rows=3, cols=4); Y = rand(rows=4, cols=3); Z = X + Y;"));
        assert!(check("X = rand(rows=3, cols=4); s = matrix(1, rows=1, cols=1); Z = X + s;").is_ok());
        Ok(())
    }

    #[test]
    fn undefined_and_unknown() {
        assert!(language_error("y = x + 1;"));
        assert!(language_error("y = solve(1);"));
        assert!(language_error("y = print(1);"));
        assert!(language_error("X = rand(rows=2, cols=2); Y = X %*% X;"));
        assert!(language_error("x = \"a\" * 2;"));
        assert!(language_error("X = read(3);"));
        assert!(check("x = \"a\" + 2; print(x);").is_ok());
    }

    #[test]
    fn valueless_builtins_only_as_statements() {
        assert!(check("X = rand(rows=2, cols=2); write(X, \"out\");").is_ok());
        assert!(language_error("X = rand(rows=2, cols=2); y = write(X, \"out\");"));
        assert!(language_error("x = 1 + print(2);"));
        let err = check("s = sum(print(1));").err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("does not return a value"), "{err}");
    }
}
