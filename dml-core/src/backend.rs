use crate::error::DmlError;
use crate::matrix::{Id, Matrix};
use crate::node::Node;
use crate::shape::Shape;

/// Backend is a cheap, copyable handle to a device that owns a runtime.
/// Matrices keep a copy of it to reach their data.
pub trait Backend: Copy {
    /// Create graph of operations between matrices in dot format for visualization
    fn plot_graph<'a>(self, matrices: impl IntoIterator<Item = &'a Matrix<Self>>) -> String
    where
        Self: 'a;

    /// Create new matrix from row major data
    fn store(self, data: Vec<f64>, shape: Shape) -> Result<Matrix<Self>, DmlError>;

    /// Create new matrix with random values,
    /// see [random_data](crate::runtime::random_data)
    fn rand(
        self,
        shape: Shape,
        min: f64,
        max: f64,
        sparsity: f64,
        seed: i64,
    ) -> Result<Matrix<Self>, DmlError>;

    /// Create new matrix with all values equal to value
    fn full(self, value: f64, shape: Shape) -> Result<Matrix<Self>, DmlError> {
        let n = shape.numel();
        self.store(vec![value; n], shape)
    }

    /// Get shape of matrix x
    fn shape(self, x: Id) -> Shape;

    /// Load matrix x, evaluating it if needed
    fn load(self, x: Id) -> Result<Vec<f64>, DmlError>;

    /// Create new matrix from node
    fn push(self, node: Node) -> Result<Matrix<Self>, DmlError>;

    /// Decrease reference count of x
    fn release(self, x: Id) -> Result<(), DmlError>;

    /// Increase reference count of x
    fn retain(self, x: Id);
}
