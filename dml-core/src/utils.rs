use crate::matrix::Id;
use crate::node::Node;
use crate::shape::Shape;
use std::collections::BTreeSet;

/// Recursive search to get shape of x in nodes
pub fn get_shape(nodes: &[Node], mut x: Id) -> &Shape {
    loop {
        let node = &nodes[x.i()];
        match node {
            Node::Leaf(shape)
            | Node::Expand(_, shape)
            | Node::Sum(.., shape)
            | Node::Max(.., shape)
            | Node::Min(.., shape) => return shape,
            _ => match node.parameters().next() {
                Some(p) => x = p,
                None => unreachable!("only leafs have no parameters"),
            },
        }
    }
}

/// Puts graph of nodes into dot language for visualization
pub fn plot_graph_dot(ids: &BTreeSet<Id>, nodes: &[Node], rcs: &[u32]) -> String {
    use std::fmt::Write;
    let mut res = String::from("strict digraph {\n  ordering=in\n  rank=source\n");
    let mut edges = String::new();
    for id in ids {
        let i = id.i();
        let node = &nodes[i];
        let shape = if matches!(node, Node::Leaf(..)) { "box" } else { "oval" };
        // Writing into a String never fails
        let _ = writeln!(
            res,
            "  {i}[label=\"{i} x {}\\n{node:?}\\n{}\", shape={shape}]",
            rcs[i],
            get_shape(nodes, *id),
        );
        for param in node.parameters() {
            let _ = writeln!(edges, "  {} -> {i}", param.i());
        }
    }
    res.push_str(&edges);
    res.push('}');
    res
}

/// Kahan compensated sum of values in iteration order
pub fn kahan_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;
    for x in values {
        let y = x - correction;
        let t = sum + y;
        correction = (t - sum) - y;
        sum = t;
    }
    sum
}

#[test]
fn kahan_is_more_precise_than_naive() {
    let values = std::iter::once(1.0).chain(std::iter::repeat(1e-16).take(10_000));
    let naive: f64 = values.clone().sum();
    let kahan = kahan_sum(values);
    assert_eq!(naive, 1.0);
    assert!((kahan - (1.0 + 1e-12)).abs() < 1e-15);
}
