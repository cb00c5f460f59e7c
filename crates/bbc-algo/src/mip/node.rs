//! Search tree nodes and branching.

use std::cmp::Ordering;

use super::model::MipModel;

/// Open node: column bounds plus the parent's LP bound.
#[derive(Debug, Clone)]
pub struct Node {
    pub bound: f64,
    pub depth: usize,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Node {
    pub fn root(model: &MipModel) -> Self {
        Self {
            bound: f64::NEG_INFINITY,
            depth: 0,
            lower: model.lower_bounds(),
            upper: model.upper_bounds(),
        }
    }

    /// Split on column `j` at fractional value `value`.
    pub fn branch(&self, j: usize, value: f64, bound: f64) -> (Node, Node) {
        let mut down = Node {
            bound,
            depth: self.depth + 1,
            lower: self.lower.clone(),
            upper: self.upper.clone(),
        };
        down.upper[j] = value.floor();
        let mut up = Node {
            bound,
            depth: self.depth + 1,
            lower: self.lower.clone(),
            upper: self.upper.clone(),
        };
        up.lower[j] = value.ceil();
        (down, up)
    }
}

// Best-bound first, deeper nodes first among equal bounds.
impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .bound
            .total_cmp(&self.bound)
            .then_with(|| self.depth.cmp(&other.depth))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

/// Integral column whose value is furthest from an integer, if any.
pub fn most_fractional(model: &MipModel, values: &[f64], tol: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;
    for (j, col) in model.columns().iter().enumerate() {
        if !col.kind.is_integral() {
            continue;
        }
        let v = values[j];
        let frac = (v - v.floor()).min(v.ceil() - v);
        if frac <= tol {
            continue;
        }
        if best.map_or(true, |(_, _, f)| frac > f) {
            best = Some((j, v, frac));
        }
    }
    best.map(|(j, v, _)| (j, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mip::model::ColumnKind;
    use std::collections::BinaryHeap;

    #[test]
    fn heap_pops_lowest_bound_first() {
        let mk = |bound, depth| Node {
            bound,
            depth,
            lower: vec![],
            upper: vec![],
        };
        let mut heap = BinaryHeap::new();
        heap.push(mk(3.0, 0));
        heap.push(mk(-1.0, 1));
        heap.push(mk(-1.0, 4));
        heap.push(mk(f64::NEG_INFINITY, 0));
        assert_eq!(heap.pop().unwrap().bound, f64::NEG_INFINITY);
        assert_eq!(heap.pop().unwrap().depth, 4);
        assert_eq!(heap.pop().unwrap().depth, 1);
        assert_eq!(heap.pop().unwrap().bound, 3.0);
    }

    #[test]
    fn picks_most_fractional_integral_column() {
        let mut model = MipModel::new();
        model.add_column("a", ColumnKind::Binary, 0.0, 1.0, 0.0);
        model.add_column("c", ColumnKind::Continuous, 0.0, 1.0, 0.0);
        model.add_column("b", ColumnKind::Binary, 0.0, 1.0, 0.0);
        let pick = most_fractional(&model, &[0.9, 0.5, 0.4], 1e-6);
        assert_eq!(pick, Some((2, 0.4)));
        assert_eq!(most_fractional(&model, &[1.0, 0.5, 0.0], 1e-6), None);
    }

    #[test]
    fn branching_tightens_one_bound() {
        let mut model = MipModel::new();
        model.add_column("a", ColumnKind::Binary, 0.0, 1.0, 0.0);
        let root = Node::root(&model);
        let (down, up) = root.branch(0, 0.3, -2.0);
        assert_eq!(down.upper[0], 0.0);
        assert_eq!(up.lower[0], 1.0);
        assert_eq!(down.depth, 1);
        assert_eq!(up.bound, -2.0);
    }
}
