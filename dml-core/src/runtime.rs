use crate::error::DmlError;
use crate::utils::get_shape;
use crate::{
    matrix::{self, Id},
    node::Node,
    shape::Shape,
};
use rand::distributions::Uniform;
use std::collections::{BTreeMap, BTreeSet};

/// After this many pushed, not yet evaluated nodes the graph is evaluated
/// to keep it from growing without bound in long loops.
const MAX_NON_EVALUATED_NODES: usize = 30000;

/// RuntimeBackend is a good plug in point for backend developers.
/// Use Runtime::new(YourOwnStructThatImplementsRuntimeBackend::new()) to write your
/// own backend which needs to implement only evaluation of graph.
pub trait RuntimeBackend {
    /// Is matrix x evaluated?
    fn is_evaluated(&self, x: Id) -> bool;
    /// Delete all memory used by matrix x.
    fn remove(&mut self, x: Id) -> Result<(), DmlError>;
    /// Store data into runtime backend
    fn store(&mut self, x: Id, data: Vec<f64>) -> Result<(), DmlError>;
    /// Load evaluated matrix x in row major order.
    fn load(&mut self, x: Id) -> Result<Vec<f64>, DmlError>;
    /// Evaluate matrices to_eval with given graph of nodes and recommended
    /// order of evaluation. Rcs are reference counts of nodes within the
    /// evaluated subgraph, nodes whose count drops to zero can be freed.
    fn evaluate(
        &mut self,
        to_eval: BTreeSet<Id>,
        rcs: BTreeMap<Id, u32>,
        order: &[Id],
        nodes: &[Node],
    ) -> Result<(), DmlError>;
}

/// Generate rows x cols values in row major order.
/// Each value is non zero with probability `sparsity` and then uniform in `min..=max`.
/// Seed -1 draws the seed from system entropy, any other seed is deterministic.
pub fn random_data(
    shape: &Shape,
    min: f64,
    max: f64,
    sparsity: f64,
    seed: i64,
) -> Result<Vec<f64>, DmlError> {
    use rand::{rngs::SmallRng, Rng, SeedableRng};
    if !(min <= max) {
        return Err(DmlError::runtime_error(format!(
            "Invalid range for rand, min {min} is larger than max {max}"
        )));
    }
    if !(0.0..=1.0).contains(&sparsity) {
        return Err(DmlError::runtime_error(format!(
            "Invalid sparsity {sparsity} for rand, must be in 0..=1"
        )));
    }
    let mut rng = if seed == -1 {
        SmallRng::from_entropy()
    } else {
        SmallRng::seed_from_u64(seed as u64)
    };
    let dist = Uniform::new_inclusive(min, max);
    Ok((0..shape.numel())
        .map(|_| {
            if sparsity >= 1.0 || rng.gen::<f64>() < sparsity {
                rng.sample(dist)
            } else {
                0.0
            }
        })
        .collect())
}

/// Runtime with lazy, reference counted graph of matrix operations.
/// This runtime uses [Node] enum as representation of matrices.
pub struct Runtime<R: RuntimeBackend> {
    rcs: Vec<u32>,
    nodes: Vec<Node>,
    non_evaluated_nodes_count: usize,
    runtime_backend: R,
}

impl<R: RuntimeBackend> Runtime<R> {
    /// Initialize new runtime.
    #[must_use]
    pub fn new(runtime_backend: R) -> Self {
        Self {
            rcs: Vec::new(),
            nodes: Vec::new(),
            non_evaluated_nodes_count: 0,
            runtime_backend,
        }
    }

    fn insert(&mut self, node: Node) -> Id {
        if let Some(i) = self.rcs.iter().position(|rc| *rc == 0) {
            self.rcs[i] = 1;
            self.nodes[i] = node;
            matrix::id(i)
        } else {
            self.rcs.push(1);
            self.nodes.push(node);
            matrix::id(self.rcs.len() - 1)
        }
    }

    /// Create matrix with random values, see [random_data]
    pub fn rand(
        &mut self,
        shape: Shape,
        min: f64,
        max: f64,
        sparsity: f64,
        seed: i64,
    ) -> Result<Id, DmlError> {
        let data = random_data(&shape, min, max, sparsity, seed)?;
        self.store(data, shape)
    }

    /// Store row major data into runtime as matrix
    pub fn store(&mut self, data: Vec<f64>, shape: Shape) -> Result<Id, DmlError> {
        if data.len() != shape.numel() {
            return Err(DmlError::shape_error(format!(
                "Cannot store {} values as matrix with shape {shape}",
                data.len()
            )));
        }
        let id = self.insert(Node::Leaf(shape));
        self.runtime_backend.store(id, data)?;
        Ok(id)
    }

    /// Get shape of matrix x
    #[must_use]
    pub fn shape(&self, x: Id) -> &Shape {
        get_shape(self.nodes.as_slice(), x)
    }

    /// Load matrix x
    pub fn load(&mut self, x: Id) -> Result<Vec<f64>, DmlError> {
        // This may need to evaluate, therefore we need to take mutable reference to self
        if !self.runtime_backend.is_evaluated(x) {
            self.evaluate(BTreeSet::from([x]))?;
        }
        self.runtime_backend.load(x)
    }

    /// Push new Node into the graph creating new matrix.
    /// This function does ZERO verification that the node is correct, but it optimizes
    /// out useless operations (like expanding to the same shape)
    pub fn push(&mut self, node: Node) -> Result<Id, DmlError> {
        // get rid of noops
        match node {
            Node::Expand(x, ref shape) => {
                if shape == self.shape(x) {
                    self.retain(x);
                    return Ok(x);
                }
            }
            Node::Sum(x, ref axes, ..) | Node::Max(x, ref axes, ..) | Node::Min(x, ref axes, ..) => {
                if axes.is_empty() {
                    self.retain(x);
                    return Ok(x);
                }
            }
            _ => {}
        }
        for nid in node.parameters() {
            self.rcs[nid.i()] += 1;
        }
        let id = self.insert(node);
        self.non_evaluated_nodes_count += 1;
        if self.non_evaluated_nodes_count > MAX_NON_EVALUATED_NODES {
            self.evaluate(BTreeSet::from([id]))?;
        }
        Ok(id)
    }

    /// Decrease reference count of x. If x's reference count reaches zero, this function will delete
    /// x and release all of it's predecessors in the graph.
    pub fn release(&mut self, x: Id) -> Result<(), DmlError> {
        let mut params = Vec::with_capacity(10);
        params.push(x);
        while let Some(p) = params.pop() {
            self.rcs[p.i()] -= 1;
            if self.rcs[p.i()] == 0 {
                params.extend(self.nodes[p.i()].parameters());
                self.runtime_backend.remove(p)?;
            }
        }
        Ok(())
    }

    /// Increase reference count of matrix x.
    pub fn retain(&mut self, x: Id) {
        self.rcs[x.i()] += 1;
    }

    /// Evaluate specified nodes.
    pub fn evaluate(&mut self, mut nodes: BTreeSet<Id>) -> Result<(), DmlError> {
        // Make a list of visited nodes and their reference counts.
        let mut params: Vec<Id> = nodes.iter().copied().collect();
        let mut rcs: BTreeMap<Id, u32> = BTreeMap::new();
        while let Some(nid) = params.pop() {
            rcs.entry(nid).and_modify(|rc| *rc += 1).or_insert_with(|| {
                if !self.runtime_backend.is_evaluated(nid) {
                    params.extend(self.nodes[nid.i()].parameters());
                }
                1
            });
        }

        // Order them using rcs reference counts
        let mut order = Vec::new();
        let mut internal_rcs: BTreeMap<Id, u32> = BTreeMap::new();
        let mut params: Vec<Id> = nodes.iter().copied().collect();
        while let Some(nid) = params.pop() {
            if let Some(rc) = rcs.get(&nid) {
                if *rc
                    == *internal_rcs
                        .entry(nid)
                        .and_modify(|rc| *rc += 1)
                        .or_insert(1)
                {
                    order.push(nid);
                    if !self.runtime_backend.is_evaluated(nid) {
                        params.extend(self.nodes[nid.i()].parameters());
                    }
                }
            }
        }
        order.reverse();

        // Already evaluated nodes are kept in memory, only intermediate
        // results are freed by the backend.
        for nid in &order {
            if self.runtime_backend.is_evaluated(*nid) {
                if let Some(rc) = rcs.get_mut(nid) {
                    *rc += 1;
                }
                nodes.insert(*nid);
            }
        }

        if crate::debug(crate::DEBUG_GRAPH) {
            println!("Evaluating {nodes:?} in order {order:?}");
            let ids: Vec<Id> = nodes.iter().copied().collect();
            println!("{}", self.plot_graph_dot(&ids));
        }

        self.runtime_backend
            .evaluate(nodes, rcs, &order, self.nodes.as_slice())?;

        let n = self.nodes.len();
        self.non_evaluated_nodes_count = (0..n)
            .filter(|i| self.rcs[*i] > 0 && !self.runtime_backend.is_evaluated(matrix::id(*i)))
            .count();
        Ok(())
    }

    /// Plot dot graph in dot format between given nodes
    #[must_use]
    pub fn plot_graph_dot(&self, ids: &[Id]) -> String {
        let mut params: Vec<Id> = ids.into();
        let mut visited: BTreeSet<Id> = BTreeSet::new();
        while let Some(nid) = params.pop() {
            if visited.insert(nid) {
                params.extend(self.nodes[nid.i()].parameters());
            }
        }
        crate::utils::plot_graph_dot(&visited, &self.nodes, &self.rcs)
    }
}
