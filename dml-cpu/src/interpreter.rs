use dml_core::{
    axes::Axes, config::Config, error::DmlError, matrix::Id, node::Node, runtime::RuntimeBackend,
    shape::Shape, utils::{get_shape, kahan_sum},
};
#[cfg(feature = "std")]
use rayon::prelude::*;
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

fn unary(data: &[f64], op: impl Fn(f64) -> f64 + Sync + Send) -> Vec<f64> {
    #[cfg(not(feature = "std"))]
    {
        data.iter().copied().map(op).collect()
    }
    #[cfg(feature = "std")]
    {
        data.par_iter().copied().map(op).collect()
    }
}

fn binary(xdata: &[f64], ydata: &[f64], op: impl Fn((f64, f64)) -> f64 + Sync + Send) -> Vec<f64> {
    #[cfg(not(feature = "std"))]
    {
        xdata.iter().copied().zip(ydata.iter().copied()).map(op).collect()
    }
    #[cfg(feature = "std")]
    {
        xdata.par_iter().copied().zip(ydata.par_iter().copied()).map(op).collect()
    }
}

/// Materialize broadcast of data with shape `from` to shape `to`,
/// dimensions of size one are repeated.
fn expand(data: &[f64], from: &Shape, to: &Shape) -> Vec<f64> {
    let (rows, cols) = (to.rows(), to.cols());
    let src_cols = from.cols();
    let row_step = usize::from(from.rows() != 1);
    let col_step = usize::from(src_cols != 1);
    let mut res = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        let start = r * row_step * src_cols;
        res.extend((0..cols).map(|c| data[start + c * col_step]));
    }
    res
}

#[derive(Clone, Copy)]
enum ROp {
    Sum,
    Max,
    Min,
}

impl ROp {
    fn identity(self) -> f64 {
        match self {
            ROp::Sum => 0.0,
            ROp::Max => f64::NEG_INFINITY,
            ROp::Min => f64::INFINITY,
        }
    }

    fn fold(self, values: impl Iterator<Item = f64>, kahan: bool) -> f64 {
        match self {
            ROp::Sum if kahan => kahan_sum(values),
            ROp::Sum => values.fold(0.0, |acc, x| acc + x),
            ROp::Max => values.fold(self.identity(), f64::max),
            ROp::Min => values.fold(self.identity(), f64::min),
        }
    }
}

/// Reduce rows x cols data along axes. Full reductions go over data in row
/// major order, column reductions keep one accumulator per column.
fn reduce_op(data: &[f64], shape: &Shape, axes: &Axes, op: ROp, kahan: bool) -> Vec<f64> {
    let (rows, cols) = (shape.rows(), shape.cols());
    match (axes.contains(0), axes.contains(1)) {
        (true, true) => vec![op.fold(data.iter().copied(), kahan)],
        (false, true) => {
            if cols == 0 {
                return vec![op.identity(); rows];
            }
            #[cfg(not(feature = "std"))]
            {
                data.chunks(cols).map(|row| op.fold(row.iter().copied(), kahan)).collect()
            }
            #[cfg(feature = "std")]
            {
                data.par_chunks(cols).map(|row| op.fold(row.iter().copied(), kahan)).collect()
            }
        }
        (true, false) => {
            let mut res = vec![op.identity(); cols];
            let mut correction = vec![0.0; cols];
            for row in data.chunks(cols.max(1)) {
                for ((acc, c), x) in res.iter_mut().zip(&mut correction).zip(row) {
                    match op {
                        ROp::Sum if kahan => {
                            let y = x - *c;
                            let t = *acc + y;
                            *c = (t - *acc) - y;
                            *acc = t;
                        }
                        ROp::Sum => *acc += x,
                        ROp::Max => *acc = acc.max(*x),
                        ROp::Min => *acc = acc.min(*x),
                    }
                }
            }
            res
        }
        (false, false) => data.to_vec(),
    }
}

pub struct Interpreter {
    buffers: BTreeMap<Id, Vec<f64>>,
    kahan: bool,
    #[cfg(feature = "std")]
    pool: Option<rayon::ThreadPool>,
}

impl Interpreter {
    pub(crate) fn new(config: &Config) -> Result<Self, DmlError> {
        #[cfg(feature = "std")]
        let pool = if config.threads > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.threads)
                    .build()
                    .map_err(|e| DmlError::runtime_error(format!("Failed to start thread pool, {e}")))?,
            )
        } else {
            None
        };
        Ok(Self {
            buffers: BTreeMap::new(),
            kahan: config.kahan,
            #[cfg(feature = "std")]
            pool,
        })
    }

    fn get(&self, x: Id) -> Result<&[f64], DmlError> {
        self.buffers
            .get(&x)
            .map(Vec::as_slice)
            .ok_or_else(|| DmlError::runtime_error(format!("Matrix {x} is not evaluated")))
    }

    fn unary_op(&mut self, x: Id, nid: Id, op: fn(f64) -> f64) -> Result<(), DmlError> {
        let data = unary(self.get(x)?, op);
        self.buffers.insert(nid, data);
        Ok(())
    }

    fn binary_op(&mut self, x: Id, y: Id, nid: Id, op: fn((f64, f64)) -> f64) -> Result<(), DmlError> {
        let data = binary(self.get(x)?, self.get(y)?, op);
        self.buffers.insert(nid, data);
        Ok(())
    }

    fn reduce(&mut self, x: Id, axes: &Axes, nid: Id, op: ROp, nodes: &[Node]) -> Result<(), DmlError> {
        let data = reduce_op(self.get(x)?, get_shape(nodes, x), axes, op, self.kahan);
        self.buffers.insert(nid, data);
        Ok(())
    }

    fn evaluate_nodes(
        &mut self,
        to_eval: &BTreeSet<Id>,
        mut rcs: BTreeMap<Id, u32>,
        order: &[Id],
        nodes: &[Node],
    ) -> Result<(), DmlError> {
        for nid in order.iter().copied() {
            if self.is_evaluated(nid) {
                continue;
            }
            match &nodes[nid.i()] {
                Node::Leaf(..) => {
                    return Err(DmlError::runtime_error(format!("Leaf {nid} has no data")));
                }
                Node::Neg(x) => self.unary_op(*x, nid, |x| -x)?,
                Node::Exp(x) => self.unary_op(*x, nid, f64::exp)?,
                Node::Sqrt(x) => self.unary_op(*x, nid, f64::sqrt)?,
                Node::Abs(x) => self.unary_op(*x, nid, f64::abs)?,
                Node::Add(x, y) => self.binary_op(*x, *y, nid, |(x, y)| x + y)?,
                Node::Sub(x, y) => self.binary_op(*x, *y, nid, |(x, y)| x - y)?,
                Node::Mul(x, y) => self.binary_op(*x, *y, nid, |(x, y)| x * y)?,
                Node::Div(x, y) => self.binary_op(*x, *y, nid, |(x, y)| x / y)?,
                Node::Pow(x, y) => self.binary_op(*x, *y, nid, |(x, y)| x.powf(y))?,
                Node::Expand(x, sh) => {
                    let data = expand(self.get(*x)?, get_shape(nodes, *x), sh);
                    self.buffers.insert(nid, data);
                }
                Node::Sum(x, ax, _) => self.reduce(*x, ax, nid, ROp::Sum, nodes)?,
                Node::Max(x, ax, _) => self.reduce(*x, ax, nid, ROp::Max, nodes)?,
                Node::Min(x, ax, _) => self.reduce(*x, ax, nid, ROp::Min, nodes)?,
            }
            for p in nodes[nid.i()].parameters() {
                if let Entry::Occupied(e) = rcs.entry(p).and_modify(|rc| *rc -= 1) {
                    if *e.get() == 0 && !to_eval.contains(&p) {
                        self.remove(p)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl RuntimeBackend for Interpreter {
    fn is_evaluated(&self, x: Id) -> bool {
        self.buffers.contains_key(&x)
    }

    fn remove(&mut self, x: Id) -> Result<(), DmlError> {
        self.buffers.remove(&x);
        Ok(())
    }

    fn store(&mut self, x: Id, data: Vec<f64>) -> Result<(), DmlError> {
        self.buffers.insert(x, data);
        Ok(())
    }

    fn load(&mut self, x: Id) -> Result<Vec<f64>, DmlError> {
        self.get(x).map(<[f64]>::to_vec)
    }

    fn evaluate(
        &mut self,
        to_eval: BTreeSet<Id>,
        rcs: BTreeMap<Id, u32>,
        order: &[Id],
        nodes: &[Node],
    ) -> Result<(), DmlError> {
        #[cfg(feature = "std")]
        if let Some(pool) = self.pool.take() {
            let res = pool.install(|| self.evaluate_nodes(&to_eval, rcs, order, nodes));
            self.pool = Some(pool);
            return res;
        }
        self.evaluate_nodes(&to_eval, rcs, order, nodes)
    }
}

#[test]
fn expand_broadcasts_rows_and_columns() {
    let one = expand(&[2.0], &Shape::matrix(1, 1), &Shape::matrix(2, 2));
    assert_eq!(one, vec![2.0; 4]);
    let col = expand(&[1.0, 2.0], &Shape::matrix(2, 1), &Shape::matrix(2, 3));
    assert_eq!(col, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    let row = expand(&[1.0, 2.0], &Shape::matrix(1, 2), &Shape::matrix(2, 2));
    assert_eq!(row, vec![1.0, 2.0, 1.0, 2.0]);
}

#[test]
fn reduce_along_axes() {
    let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let sh = Shape::matrix(2, 3);
    assert_eq!(reduce_op(&data, &sh, &Axes::from([0, 1]), ROp::Sum, true), vec![21.0]);
    assert_eq!(reduce_op(&data, &sh, &Axes::from([1]), ROp::Sum, true), vec![6.0, 15.0]);
    assert_eq!(reduce_op(&data, &sh, &Axes::from([0]), ROp::Sum, false), vec![5.0, 7.0, 9.0]);
    assert_eq!(reduce_op(&data, &sh, &Axes::from([0]), ROp::Max, true), vec![4.0, 5.0, 6.0]);
    assert_eq!(reduce_op(&data, &sh, &Axes::from([1]), ROp::Min, true), vec![1.0, 4.0]);
    assert_eq!(reduce_op(&[], &Shape::matrix(0, 0), &Axes::from([0, 1]), ROp::Sum, true), vec![0.0]);
    assert_eq!(reduce_op(&[], &Shape::matrix(2, 0), &Axes::from([1]), ROp::Sum, true), vec![0.0, 0.0]);
}
