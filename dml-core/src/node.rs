use crate::{axes::Axes, matrix::Id, shape::Shape};
use core::fmt::Formatter;

/// Node representing different possible matrices
pub enum Node {
    /// Leaf that is guaranteed to be evaluated
    Leaf(Shape),
    /// Neg unary op
    Neg(Id),
    /// Exp unary op
    Exp(Id),
    /// Square root unary op
    Sqrt(Id),
    /// Absolute value unary op
    Abs(Id),
    /// Addition binary op
    Add(Id, Id),
    /// Subtraction binary op
    Sub(Id, Id),
    /// Multiplication binary op
    Mul(Id, Id),
    /// Division binary op
    Div(Id, Id),
    /// Exponentiation binary op
    Pow(Id, Id),
    /// Expand dimensions of size one to shape
    Expand(Id, Shape),
    /// Sum reduce op
    Sum(Id, Axes, Shape),
    /// Max reduce op
    Max(Id, Axes, Shape),
    /// Min reduce op
    Min(Id, Axes, Shape),
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Node::Leaf(sh) => f.write_fmt(format_args!("Leaf({sh})")),
            Node::Neg(x) => f.write_fmt(format_args!("Neg({x})")),
            Node::Exp(x) => f.write_fmt(format_args!("Exp({x})")),
            Node::Sqrt(x) => f.write_fmt(format_args!("Sqrt({x})")),
            Node::Abs(x) => f.write_fmt(format_args!("Abs({x})")),
            Node::Add(x, y) => f.write_fmt(format_args!("Add({x}, {y})")),
            Node::Sub(x, y) => f.write_fmt(format_args!("Sub({x}, {y})")),
            Node::Mul(x, y) => f.write_fmt(format_args!("Mul({x}, {y})")),
            Node::Div(x, y) => f.write_fmt(format_args!("Div({x}, {y})")),
            Node::Pow(x, y) => f.write_fmt(format_args!("Pow({x}, {y})")),
            Node::Expand(x, sh) => f.write_fmt(format_args!("Expand({x}, {sh})")),
            Node::Sum(x, ax, ..) => f.write_fmt(format_args!("Sum({x}, {ax})")),
            Node::Max(x, ax, ..) => f.write_fmt(format_args!("Max({x}, {ax})")),
            Node::Min(x, ax, ..) => f.write_fmt(format_args!("Min({x}, {ax})")),
        }
    }
}

/// Iterator over parameters of node which does not allocate on heap.
pub struct NodeParametersIterator {
    parameters: [Id; 2],
    len: u8,
    idx: u8,
}

impl Iterator for NodeParametersIterator {
    type Item = Id;
    fn next(&mut self) -> Option<Self::Item> {
        if self.idx == self.len {
            return None;
        }
        let idx = self.idx;
        self.idx += 1;
        Some(self.parameters[idx as usize])
    }
}

impl Node {
    /// Get all parameters of self. This method does not allocate.
    pub const fn parameters(&self) -> NodeParametersIterator {
        let zero = crate::matrix::id(0);
        match self {
            Node::Leaf(..) => NodeParametersIterator { parameters: [zero; 2], idx: 0, len: 0 },
            Node::Neg(x)
            | Node::Exp(x)
            | Node::Sqrt(x)
            | Node::Abs(x)
            | Node::Expand(x, ..)
            | Node::Sum(x, ..)
            | Node::Max(x, ..)
            | Node::Min(x, ..) => NodeParametersIterator { parameters: [*x, zero], idx: 0, len: 1 },
            Node::Add(x, y) | Node::Sub(x, y) | Node::Mul(x, y) | Node::Div(x, y) | Node::Pow(x, y) => {
                NodeParametersIterator { parameters: [*x, *y], idx: 0, len: 2 }
            }
        }
    }
}

#[test]
fn parameters_do_not_allocate() {
    use crate::matrix::id;
    let node = Node::Add(id(3), id(5));
    assert_eq!(node.parameters().collect::<Vec<_>>(), vec![id(3), id(5)]);
    assert_eq!(Node::Leaf(Shape::matrix(2, 2)).parameters().count(), 0);
    let sum = Node::Sum(id(1), Axes::from([0, 1]), Shape::matrix(1, 1));
    assert_eq!(sum.parameters().collect::<Vec<_>>(), vec![id(1)]);
}
