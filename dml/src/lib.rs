//! # dml
//!
//! Small matrix scripting runtime. Scripts are parsed and validated first,
//! any language error stops the run before a single statement executes.
//! Valid scripts are executed statement by statement on the CPU backend.
//!
//! ```rust
//! use std::collections::BTreeMap;
//! let outputs = dml::run_script("X = matrix(2, rows=3, cols=3);\nprint(sum(X));", &BTreeMap::new())?;
//! assert_eq!(outputs.printed, vec!["18.0".to_string()]);
//! # Ok::<(), dml::DmlError>(())
//! ```
//!
#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
#![forbid(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
#![forbid(rustdoc::private_doc_tests)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::unescaped_backticks)]
#![forbid(rustdoc::redundant_explicit_links)]

use dml_core::io::{self, Format};
use dml_core::scalar::Scalar;
use dml_cpu::{Backend, Config, Matrix, Shape, CPU};
use dml_parser::ast::{Arg, BOp, Expr, ExprKind, Program, StatementKind, UOp};
use dml_parser::builtins::lookup;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use dml_core::error::{DmlError, ErrorKind};

/// Value of script variable
#[derive(Debug, Clone)]
pub enum Value<'a> {
    /// Scalar value
    Scalar(Scalar),
    /// Lazily evaluated matrix
    Matrix(Matrix<&'a CPU>),
}

/// Things a script did that are visible outside of it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outputs {
    /// Lines printed by `print`
    pub printed: Vec<String>,
    /// Files written by `write`, in order
    pub written: Vec<PathBuf>,
}

/// Replace `$$name$$` and `$name` placeholders with argument values.
/// Unknown placeholders are left untouched.
pub fn substitute_args(script: &str, args: &BTreeMap<String, String>) -> String {
    let mut res = String::with_capacity(script.len());
    let mut rest = script;
    while let Some(i) = rest.find('$') {
        res.push_str(&rest[..i]);
        rest = &rest[i..];
        let double = rest.starts_with("$$");
        let start = if double { 2 } else { 1 };
        let len = rest[start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len() - start);
        let name = &rest[start..start + len];
        let end = start + len;
        let closed = !double || rest[end..].starts_with("$$");
        match args.get(name) {
            Some(value) if !name.is_empty() && closed => {
                res.push_str(value);
                rest = &rest[if double { end + 2 } else { end }..];
            }
            _ => {
                res.push_str(&rest[..start]);
                rest = &rest[start..];
            }
        }
    }
    res.push_str(rest);
    res
}

/// Substitute arguments, parse and validate script.
/// Returns validated program in its printed form.
pub fn explain(source: &str, args: &BTreeMap<String, String>) -> Result<String, DmlError> {
    let source = substitute_args(source, args);
    let (program, _) = dml_parser::parse_and_validate(&source)?;
    Ok(program.to_string())
}

/// Run script on new CPU device configured from `dml/config.json`
pub fn run_script(source: &str, args: &BTreeMap<String, String>) -> Result<Outputs, DmlError> {
    run_script_with_config(source, args, &Config::load())
}

/// Run script on new CPU device with given config
pub fn run_script_with_config(
    source: &str,
    args: &BTreeMap<String, String>,
    config: &Config,
) -> Result<Outputs, DmlError> {
    let source = substitute_args(source, args);
    let (program, _) = dml_parser::parse_and_validate(&source)?;
    let dev = dml_cpu::device_with_config(config)?;
    let mut executor = Executor::new(&dev, config.print_precision);
    executor.run(&program)?;
    Ok(executor.outputs)
}

struct Executor<'a> {
    dev: &'a CPU,
    variables: BTreeMap<Box<str>, Value<'a>>,
    outputs: Outputs,
    print_precision: usize,
}

fn matrix_arg<'a>(v: Value<'a>, function: &str) -> Result<Matrix<&'a CPU>, DmlError> {
    match v {
        Value::Matrix(x) => Ok(x),
        Value::Scalar(_) => Err(DmlError::language_error(format!(
            "Expecting matrix argument for function {function}"
        ))),
    }
}

fn scalar_arg(v: Value<'_>, what: &str) -> Result<Scalar, DmlError> {
    match v {
        Value::Scalar(x) => Ok(x),
        Value::Matrix(_) => Err(DmlError::runtime_error(format!("Argument {what} must be a scalar"))),
    }
}

fn string_arg(v: Value<'_>, what: &str) -> Result<Box<str>, DmlError> {
    match scalar_arg(v, what)? {
        Scalar::String(s) => Ok(s),
        x => Err(DmlError::runtime_error(format!("Argument {what} must be a string, found {x}"))),
    }
}

fn dim_arg(v: Value<'_>, what: &str) -> Result<usize, DmlError> {
    let x = scalar_arg(v, what)?.as_i64()?;
    usize::try_from(x)
        .map_err(|_| DmlError::runtime_error(format!("Argument {what} must not be negative, found {x}")))
}

#[allow(clippy::cast_possible_wrap)]
fn int(x: usize) -> Scalar {
    Scalar::Int(x as i64)
}

impl<'a> Executor<'a> {
    fn new(dev: &'a CPU, print_precision: usize) -> Self {
        Self { dev, variables: BTreeMap::new(), outputs: Outputs::default(), print_precision }
    }

    fn run(&mut self, program: &Program) -> Result<(), DmlError> {
        for statement in &program.statements {
            if dml_core::debug(dml_core::DEBUG_PARSE) {
                println!("Executing {statement}");
            }
            match &statement.kind {
                StatementKind::Assign { target, value } => {
                    let value = self.expr(value)?;
                    self.variables.insert(target.clone(), value);
                }
                StatementKind::Expr(Expr { kind: ExprKind::Call { name, args }, .. }) => {
                    self.call(name, args)?;
                }
                StatementKind::Expr(e) => {
                    self.expr(e)?;
                }
            }
        }
        Ok(())
    }

    fn expr(&mut self, e: &Expr) -> Result<Value<'a>, DmlError> {
        Ok(match &e.kind {
            ExprKind::Double(x) => Value::Scalar(Scalar::Double(*x)),
            ExprKind::Int(x) => Value::Scalar(Scalar::Int(*x)),
            ExprKind::Boolean(x) => Value::Scalar(Scalar::Boolean(*x)),
            ExprKind::String(x) => Value::Scalar(Scalar::String(x.clone())),
            ExprKind::Ident(name) => self.variables.get(name).cloned().ok_or_else(|| {
                DmlError::language_error(format!("Undefined Variable ({name}) at line {}", e.line))
            })?,
            ExprKind::Unary(UOp::Neg, x) => match self.expr(x)? {
                Value::Scalar(x) => Value::Scalar(x.neg()?),
                Value::Matrix(x) => Value::Matrix(x.neg()?),
            },
            ExprKind::Binary(op, x, y) => {
                let x = self.expr(x)?;
                let y = self.expr(y)?;
                binary(*op, x, y)?
            }
            ExprKind::Call { name, args } => self.call(name, args)?.ok_or_else(|| {
                DmlError::language_error(format!("Function {name} does not return a value"))
            })?,
        })
    }

    fn call(&mut self, name: &str, args: &[Arg]) -> Result<Option<Value<'a>>, DmlError> {
        let builtin = lookup(name)
            .ok_or_else(|| DmlError::language_error(format!("Unknown function {name}")))?;
        let bound = builtin.bind(args, 0)?;
        let mut values = Vec::with_capacity(bound.len());
        for e in bound {
            values.push(match e {
                Some(e) => Some(self.expr(e)?),
                None => None,
            });
        }
        let mut values = values.into_iter();
        let mut next = || values.next().flatten();

        let res = match name {
            "read" => {
                let path = string_arg(next().unwrap_or(Value::Scalar("".into())), "path")?;
                let rows = next().map(|v| dim_arg(v, "rows")).transpose()?;
                let cols = next().map(|v| dim_arg(v, "cols")).transpose()?;
                let format = next().map(|v| string_arg(v, "format")).transpose()?;
                let format = format.map(|f| Format::parse(&f)).transpose()?;
                let (shape, data) = io::read_matrix(&*path, format, rows, cols)?;
                Value::Matrix(self.dev.store(data, shape)?)
            }
            "write" => {
                let x = next();
                let path = string_arg(next().unwrap_or(Value::Scalar("".into())), "path")?;
                let format = next().map(|v| string_arg(v, "format")).transpose()?;
                let format = format.map_or(Ok(Format::Text), |f| Format::parse(&f))?;
                match x {
                    Some(Value::Matrix(x)) => io::write_matrix(&*path, &x.to_vec()?, &x.shape(), format)?,
                    Some(Value::Scalar(x)) => io::write_scalar(&*path, &x)?,
                    None => return Err(DmlError::language_error("Missing argument target of function write")),
                }
                self.outputs.written.push(PathBuf::from(&*path));
                return Ok(None);
            }
            "print" => {
                let line = match next() {
                    Some(Value::Scalar(x)) => x.to_string(),
                    Some(Value::Matrix(x)) => format!("{x:.prec$}", prec = self.print_precision),
                    None => String::new(),
                };
                println!("{line}");
                self.outputs.printed.push(line);
                return Ok(None);
            }
            "sum" | "mean" | "min" | "max" => {
                let x = next().ok_or_else(|| DmlError::language_error(format!("Missing argument of {name}")))?;
                if let Some(y) = next() {
                    return scalar_min_max(name, scalar_arg(x, "target")?, scalar_arg(y, "other")?).map(Some);
                }
                let x = matrix_arg(x, name)?;
                Value::Scalar(Scalar::Double(match name {
                    "sum" => x.sum()?,
                    "mean" => x.mean()?,
                    "min" => x.min()?,
                    _ => x.max()?,
                }))
            }
            "rowSums" | "colSums" | "nrow" | "ncol" | "as.scalar" => {
                let x = matrix_arg(next().unwrap_or(Value::Scalar(Scalar::Int(0))), name)?;
                match name {
                    "rowSums" => Value::Matrix(x.row_sums()?),
                    "colSums" => Value::Matrix(x.col_sums()?),
                    "nrow" => Value::Scalar(int(x.nrow())),
                    "ncol" => Value::Scalar(int(x.ncol())),
                    _ => Value::Scalar(Scalar::Double(x.as_scalar()?)),
                }
            }
            "abs" | "exp" | "sqrt" => match next() {
                Some(Value::Matrix(x)) => Value::Matrix(match name {
                    "abs" => x.abs()?,
                    "exp" => x.exp()?,
                    _ => x.sqrt()?,
                }),
                Some(Value::Scalar(x)) => {
                    let x = x.as_f64()?;
                    Value::Scalar(Scalar::Double(match name {
                        "abs" => x.abs(),
                        "exp" => x.exp(),
                        _ => x.sqrt(),
                    }))
                }
                None => return Err(DmlError::language_error(format!("Missing argument of {name}"))),
            },
            "rand" => {
                let rows = next().map_or(Ok(1), |v| dim_arg(v, "rows"))?;
                let cols = next().map_or(Ok(1), |v| dim_arg(v, "cols"))?;
                let min = next().map_or(Ok(0.0), |v| scalar_arg(v, "min")?.as_f64())?;
                let max = next().map_or(Ok(1.0), |v| scalar_arg(v, "max")?.as_f64())?;
                let sparsity = next().map_or(Ok(1.0), |v| scalar_arg(v, "sparsity")?.as_f64())?;
                let seed = next().map_or(Ok(-1), |v| scalar_arg(v, "seed")?.as_i64())?;
                Value::Matrix(self.dev.rand(Shape::checked_matrix(rows, cols)?, min, max, sparsity, seed)?)
            }
            "matrix" => {
                let value = next().map_or(Ok(0.0), |v| scalar_arg(v, "data")?.as_f64())?;
                let rows = next().map_or(Ok(1), |v| dim_arg(v, "rows"))?;
                let cols = next().map_or(Ok(1), |v| dim_arg(v, "cols"))?;
                Value::Matrix(self.dev.full(value, Shape::checked_matrix(rows, cols)?)?)
            }
            _ => return Err(DmlError::language_error(format!("Unknown function {name}"))),
        };
        Ok(Some(res))
    }
}

fn scalar_min_max<'a>(name: &str, x: Scalar, y: Scalar) -> Result<Value<'a>, DmlError> {
    let max = name == "max";
    Ok(Value::Scalar(match (x, y) {
        (Scalar::Int(x), Scalar::Int(y)) => Scalar::Int(if max { x.max(y) } else { x.min(y) }),
        (x, y) => {
            let (x, y) = (x.as_f64()?, y.as_f64()?);
            Scalar::Double(if max { x.max(y) } else { x.min(y) })
        }
    }))
}

fn binary<'a>(op: BOp, x: Value<'a>, y: Value<'a>) -> Result<Value<'a>, DmlError> {
    Ok(match (x, y) {
        (Value::Scalar(x), Value::Scalar(y)) => Value::Scalar(match op {
            BOp::Add => x.add(y)?,
            BOp::Sub => x.sub(y)?,
            BOp::Mul => x.mul(y)?,
            BOp::Div => x.div(y)?,
            BOp::Pow => x.pow(y)?,
            BOp::MatMul => return Err(DmlError::language_error("Matrix multiplication is not supported")),
        }),
        (Value::Matrix(x), Value::Matrix(y)) => Value::Matrix(match op {
            BOp::Add => x.add(&y)?,
            BOp::Sub => x.sub(&y)?,
            BOp::Mul => x.mul(&y)?,
            BOp::Div => x.div(&y)?,
            BOp::Pow => x.pow(&y)?,
            BOp::MatMul => return Err(DmlError::language_error("Matrix multiplication is not supported")),
        }),
        (Value::Matrix(x), Value::Scalar(y)) => Value::Matrix(matrix_scalar(op, &x, y.as_f64()?, false)?),
        (Value::Scalar(x), Value::Matrix(y)) => Value::Matrix(matrix_scalar(op, &y, x.as_f64()?, true)?),
    })
}

fn matrix_scalar<'a>(
    op: BOp,
    x: &Matrix<&'a CPU>,
    value: f64,
    scalar_left: bool,
) -> Result<Matrix<&'a CPU>, DmlError> {
    match op {
        BOp::Add => x.add_scalar(value, scalar_left),
        BOp::Sub => x.sub_scalar(value, scalar_left),
        BOp::Mul => x.mul_scalar(value, scalar_left),
        BOp::Div => x.div_scalar(value, scalar_left),
        BOp::Pow => x.pow_scalar(value, scalar_left),
        BOp::MatMul => Err(DmlError::language_error("Matrix multiplication is not supported")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn substitute_placeholders() {
        let a = args(&[("in", "X"), ("indir", "/tmp/in"), ("n", "10")]);
        assert_eq!(substitute_args("read($indir/v, rows=$n)", &a), "read(/tmp/in/v, rows=10)");
        assert_eq!(substitute_args("x = \"$$indir$$/A\"", &a), "x = \"/tmp/in/A\"");
        assert_eq!(substitute_args("$in + $unknown", &a), "X + $unknown");
        assert_eq!(substitute_args("cost $ 5 $$", &a), "cost $ 5 $$");
    }

    #[test]
    fn scalar_and_matrix_arithmetic() -> Result<(), DmlError> {
        let out = run_script_with_config(
            "X = matrix(3, rows=2, cols=2);\nY = 1 - X * 2;\nprint(sum(Y));\nprint(nrow(Y) + ncol(X));\nprint(\"n=\" + 4 / 2);",
            &BTreeMap::new(),
            &Config::default(),
        )?;
        assert_eq!(out.printed, vec!["-20.0", "4", "n=2.0"]);
        Ok(())
    }

    #[test]
    fn sum_of_scalar_fails_before_execution() {
        let res = run_script_with_config(
            "print(\"started\");\nscalar = 3;\nscalar_sum = sum(scalar);",
            &BTreeMap::new(),
            &Config::default(),
        );
        assert!(matches!(res, Err(DmlError::LanguageError(_))));
    }

    #[test]
    fn negating_smallest_int_wraps() -> Result<(), DmlError> {
        let out = run_script_with_config(
            "x = 0 - 9223372036854775807 - 1;\ny = -x;\nprint(y);",
            &BTreeMap::new(),
            &Config::default(),
        )?;
        assert_eq!(out.printed, vec![i64::MIN.to_string()]);
        Ok(())
    }

    #[test]
    fn too_large_dimensions_are_shape_errors() {
        for script in [
            "X = matrix(1, rows=4294967296, cols=4294967297);\nprint(sum(X));",
            "X = rand(rows=4294967296, cols=4294967297, seed=1);\nprint(sum(X));",
        ] {
            let res = run_script_with_config(script, &BTreeMap::new(), &Config::default());
            assert_eq!(res.err().map(|e| e.kind()), Some(ErrorKind::Shape));
        }
    }

    #[test]
    fn write_and_read_back() -> Result<(), DmlError> {
        let dir = tempfile::tempdir()?;
        let a = args(&[("dir", &dir.path().display().to_string())]);
        let out = run_script_with_config(
            "X = rand(rows=4, cols=3, min=-1, max=1, sparsity=0.5, seed=3);\nwrite(X, \"$dir/X\");\nY = read(\"$dir/X\");\nwrite(sum(X - Y), \"$dir/d\");\nwrite(rowSums(Y), \"$dir/r\", format=\"csv\");",
            &a,
            &Config::default(),
        )?;
        assert_eq!(out.written.len(), 3);
        let d = io::read_cells(dir.path().join("d"))?;
        assert_eq!(d.get(&(1, 1)), Some(&0.0));
        let (shape, _) = io::read_matrix(dir.path().join("r"), None, None, None)?;
        assert_eq!(shape, Shape::matrix(4, 1));
        Ok(())
    }

    #[test]
    fn explain_prints_program() -> Result<(), DmlError> {
        let text = explain("x = $v + 1;", &args(&[("v", "2")]))?;
        assert_eq!(text, "   1: x = (2 + 1);\n");
        assert!(explain("x = sum(2);", &BTreeMap::new()).is_err());
        Ok(())
    }
}
