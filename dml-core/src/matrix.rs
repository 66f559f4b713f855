use crate::axes::Axes;
use crate::backend::Backend;
use crate::error::DmlError;
use crate::node::Node;
use crate::shape::Shape;

/// Id of matrix.
#[derive(Clone, Copy, PartialOrd, PartialEq, Ord, Eq, Debug)]
pub struct Id(usize);

/// Create new id.
pub const fn id(id: usize) -> Id {
    Id(id)
}

impl Id {
    /// Convert id to usize
    pub const fn i(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for Id {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

/// Create new matrix from id and backend.
/// The caller hands over one reference count of id.
pub fn matrix<B: Backend>(id: Id, backend: B) -> Matrix<B> {
    Matrix { id, backend }
}

/// Matrix is the atom of dml.
/// Matrix is a two dimensional array of doubles.
/// Matrix is immutable and lazily evaluated, data is computed
/// only when it is loaded.
pub struct Matrix<B: Backend> {
    id: Id,
    backend: B,
}

impl<B: Backend> Clone for Matrix<B> {
    fn clone(&self) -> Self {
        self.backend.retain(self.id);
        matrix(self.id, self.backend)
    }
}

impl<B: Backend> Drop for Matrix<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.release(self.id) {
            if crate::debug(crate::DEBUG_GRAPH) {
                println!("Failed to release matrix {}: {e}", self.id);
            }
        }
    }
}

impl<B: Backend> core::fmt::Debug for Matrix<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("Matrix {{ id = {:?} }}", self.id))
    }
}

impl<B: Backend> core::fmt::Display for Matrix<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let precision = f.precision().unwrap_or(3);
        match self.to_vec() {
            Ok(data) => f.write_str(&matrix_to_string(&data, &self.shape(), precision)),
            Err(e) => f.write_fmt(format_args!("matrix failed to realize: {e}")),
        }
    }
}

fn matrix_to_string(data: &[f64], shape: &Shape, precision: usize) -> String {
    use core::fmt::Write;
    let cols = shape.cols();
    let mut res = String::new();
    if data.is_empty() {
        return "[]".into();
    }
    for row in data.chunks(cols) {
        let line: Vec<String> = row.iter().map(|x| format!("{x:.precision$}")).collect();
        let _ = writeln!(res, "{}", line.join(" "));
    }
    res.pop();
    res
}

#[derive(Clone, Copy)]
enum BOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BOp {
    fn node(self, x: Id, y: Id) -> Node {
        match self {
            BOp::Add => Node::Add(x, y),
            BOp::Sub => Node::Sub(x, y),
            BOp::Mul => Node::Mul(x, y),
            BOp::Div => Node::Div(x, y),
            BOp::Pow => Node::Pow(x, y),
        }
    }
}

impl<B: Backend> Matrix<B> {
    /// Id of this matrix in the backend's graph
    #[must_use]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Shape of matrix
    #[must_use]
    pub fn shape(&self) -> Shape {
        self.backend.shape(self.id)
    }

    /// Number of rows
    #[must_use]
    pub fn nrow(&self) -> usize {
        self.shape().rows()
    }

    /// Number of columns
    #[must_use]
    pub fn ncol(&self) -> usize {
        self.shape().cols()
    }

    /// Number of elements
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape().numel()
    }

    /// Load values of matrix in row major order
    pub fn to_vec(&self) -> Result<Vec<f64>, DmlError> {
        self.backend.load(self.id)
    }

    fn reduce(&self, axes: Axes, op: fn(Id, Axes, Shape) -> Node) -> Result<Matrix<B>, DmlError> {
        let shape = self.shape().reduce(&axes);
        self.backend.push(op(self.id, axes, shape))
    }

    fn reduce_all(&self, op: fn(Id, Axes, Shape) -> Node) -> Result<f64, DmlError> {
        let x = self.reduce(Axes::from([0, 1]), op)?;
        x.to_vec()?
            .first()
            .copied()
            .ok_or_else(|| DmlError::runtime_error("Full aggregate did not produce a value"))
    }

    /// Sum of all values of matrix.
    /// Values are added in row major order with Kahan compensated summation,
    /// sum of empty matrix is zero.
    pub fn sum(&self) -> Result<f64, DmlError> {
        self.reduce_all(Node::Sum)
    }

    /// Sum of each row, returns rows x 1 matrix
    pub fn row_sums(&self) -> Result<Matrix<B>, DmlError> {
        self.reduce(Axes::from([1]), Node::Sum)
    }

    /// Sum of each column, returns 1 x cols matrix
    pub fn col_sums(&self) -> Result<Matrix<B>, DmlError> {
        self.reduce(Axes::from([0]), Node::Sum)
    }

    /// Maximum of all values, negative infinity for empty matrix
    pub fn max(&self) -> Result<f64, DmlError> {
        self.reduce_all(Node::Max)
    }

    /// Minimum of all values, infinity for empty matrix
    pub fn min(&self) -> Result<f64, DmlError> {
        self.reduce_all(Node::Min)
    }

    /// Arithmetic mean of all values, NaN for empty matrix
    pub fn mean(&self) -> Result<f64, DmlError> {
        #[allow(clippy::cast_precision_loss)]
        let n = self.numel() as f64;
        Ok(self.sum()? / n)
    }

    /// Value of 1x1 matrix
    pub fn as_scalar(&self) -> Result<f64, DmlError> {
        let shape = self.shape();
        if shape.numel() != 1 {
            return Err(DmlError::shape_error(format!(
                "Cannot cast matrix with shape {shape} to scalar"
            )));
        }
        self.sum()
    }

    fn unary(&self, op: fn(Id) -> Node) -> Result<Matrix<B>, DmlError> {
        self.backend.push(op(self.id))
    }

    /// Neg
    pub fn neg(&self) -> Result<Matrix<B>, DmlError> {
        self.unary(Node::Neg)
    }

    /// Exp
    pub fn exp(&self) -> Result<Matrix<B>, DmlError> {
        self.unary(Node::Exp)
    }

    /// Square root
    pub fn sqrt(&self) -> Result<Matrix<B>, DmlError> {
        self.unary(Node::Sqrt)
    }

    /// Absolute value
    pub fn abs(&self) -> Result<Matrix<B>, DmlError> {
        self.unary(Node::Abs)
    }

    /// Expand 1x1 matrix (or rows/cols of size one) to shape
    pub fn expand(&self, shape: Shape) -> Result<Matrix<B>, DmlError> {
        let sh = self.shape();
        if sh.rank() != shape.rank() || sh.iter().zip(&shape).any(|(d, e)| *d != 1 && d != e) {
            return Err(DmlError::shape_error(format!(
                "Cannot expand matrix with shape {sh} to shape {shape}"
            )));
        }
        self.backend.push(Node::Expand(self.id, shape))
    }

    fn binary(&self, rhs: &Matrix<B>, op: BOp) -> Result<Matrix<B>, DmlError> {
        let xs = self.shape();
        let ys = rhs.shape();
        if xs == ys {
            return self.backend.push(op.node(self.id, rhs.id));
        }
        if ys.numel() == 1 {
            let y = rhs.expand(xs)?;
            return self.backend.push(op.node(self.id, y.id));
        }
        if xs.numel() == 1 {
            let x = self.expand(ys)?;
            return self.backend.push(op.node(x.id, rhs.id));
        }
        Err(DmlError::shape_error(format!(
            "Matrix dimensions do not match, left is {xs}, right is {ys}"
        )))
    }

    fn binary_scalar(&self, value: f64, op: BOp, scalar_left: bool) -> Result<Matrix<B>, DmlError> {
        let y = self.backend.full(value, Shape::matrix(1, 1))?;
        if scalar_left {
            y.binary(self, op)
        } else {
            self.binary(&y, op)
        }
    }

    /// Elementwise addition
    pub fn add(&self, rhs: &Matrix<B>) -> Result<Matrix<B>, DmlError> {
        self.binary(rhs, BOp::Add)
    }

    /// Elementwise subtraction
    pub fn sub(&self, rhs: &Matrix<B>) -> Result<Matrix<B>, DmlError> {
        self.binary(rhs, BOp::Sub)
    }

    /// Elementwise multiplication
    pub fn mul(&self, rhs: &Matrix<B>) -> Result<Matrix<B>, DmlError> {
        self.binary(rhs, BOp::Mul)
    }

    /// Elementwise division
    pub fn div(&self, rhs: &Matrix<B>) -> Result<Matrix<B>, DmlError> {
        self.binary(rhs, BOp::Div)
    }

    /// Elementwise exponentiation
    pub fn pow(&self, rhs: &Matrix<B>) -> Result<Matrix<B>, DmlError> {
        self.binary(rhs, BOp::Pow)
    }

    /// Add scalar to every value, or every value to scalar if `scalar_left`
    pub fn add_scalar(&self, value: f64, scalar_left: bool) -> Result<Matrix<B>, DmlError> {
        self.binary_scalar(value, BOp::Add, scalar_left)
    }

    /// Subtract scalar from every value, or every value from scalar if `scalar_left`
    pub fn sub_scalar(&self, value: f64, scalar_left: bool) -> Result<Matrix<B>, DmlError> {
        self.binary_scalar(value, BOp::Sub, scalar_left)
    }

    /// Multiply every value by scalar
    pub fn mul_scalar(&self, value: f64, scalar_left: bool) -> Result<Matrix<B>, DmlError> {
        self.binary_scalar(value, BOp::Mul, scalar_left)
    }

    /// Divide every value by scalar, or scalar by every value if `scalar_left`
    pub fn div_scalar(&self, value: f64, scalar_left: bool) -> Result<Matrix<B>, DmlError> {
        self.binary_scalar(value, BOp::Div, scalar_left)
    }

    /// Raise every value to scalar, or scalar to every value if `scalar_left`
    pub fn pow_scalar(&self, value: f64, scalar_left: bool) -> Result<Matrix<B>, DmlError> {
        self.binary_scalar(value, BOp::Pow, scalar_left)
    }
}

#[test]
fn matrix_to_string_rows() {
    let s = matrix_to_string(&[1.0, 2.0, 3.0, 4.5], &Shape::matrix(2, 2), 1);
    assert_eq!(s, "1.0 2.0\n3.0 4.5");
    assert_eq!(matrix_to_string(&[], &Shape::matrix(0, 3), 3), "[]");
}
