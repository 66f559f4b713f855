//! CPU only, pure rust backend for dml
//!
//! Initialize backend.
//! ```rust
//! use dml_cpu::Backend;
//! let dev = dml_cpu::device()?;
//! let x = dev.store(vec![1.0, 2.0, 3.0, 4.0], dml_cpu::Shape::matrix(2, 2))?;
//! assert_eq!(x.sum()?, 10.0);
//! # Ok::<(), dml_cpu::DmlError>(())
//! ```
//!
//! Parallel kernels use rayon when the `std` feature is enabled.

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

mod interpreter;
use crate::interpreter::Interpreter;

use dml_core::{
    matrix::{matrix, Id},
    node::Node,
    runtime::Runtime,
};
pub use dml_core::{backend::Backend, config::Config, error::DmlError, matrix::Matrix, shape::Shape};
use std::cell::RefCell;

/// CPU backend
pub struct CPU(RefCell<Runtime<Interpreter>>);

/// Create new CPU backend configured from `dml/config.json`
pub fn device() -> Result<CPU, DmlError> {
    device_with_config(&Config::load())
}

/// Create new CPU backend with given config
pub fn device_with_config(config: &Config) -> Result<CPU, DmlError> {
    Ok(CPU(RefCell::new(Runtime::new(Interpreter::new(config)?))))
}

impl Backend for &CPU {
    fn plot_graph<'a>(self, matrices: impl IntoIterator<Item = &'a Matrix<Self>>) -> String
    where
        Self: 'a,
    {
        let ids: Vec<Id> = matrices.into_iter().map(Matrix::id).collect();
        self.0.borrow().plot_graph_dot(&ids)
    }

    fn store(self, data: Vec<f64>, shape: Shape) -> Result<Matrix<Self>, DmlError> {
        Ok(matrix(self.0.borrow_mut().store(data, shape)?, self))
    }

    fn rand(
        self,
        shape: Shape,
        min: f64,
        max: f64,
        sparsity: f64,
        seed: i64,
    ) -> Result<Matrix<Self>, DmlError> {
        Ok(matrix(self.0.borrow_mut().rand(shape, min, max, sparsity, seed)?, self))
    }

    fn shape(self, x: Id) -> Shape {
        self.0.borrow().shape(x).clone()
    }

    fn load(self, x: Id) -> Result<Vec<f64>, DmlError> {
        self.0.borrow_mut().load(x)
    }

    fn push(self, node: Node) -> Result<Matrix<Self>, DmlError> {
        Ok(matrix(self.0.borrow_mut().push(node)?, self))
    }

    fn release(self, x: Id) -> Result<(), DmlError> {
        self.0.borrow_mut().release(x)
    }

    fn retain(self, x: Id) {
        self.0.borrow_mut().retain(x);
    }
}
