use foundation::Aabb2;
use foundation::math::precision::stable_total_cmp_f64;

/// A screen-space point tagged with the caller's slot number.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IndexedPoint {
    pub slot: usize,
    pub position: [f64; 2],
}

/// A deterministic bounding volume hierarchy over screen-space points.
///
/// Ordering contract:
/// - `query_window` returns slots in ascending order, independent of the
///   order points were passed to `build`.
#[derive(Debug, Clone, Default)]
pub struct PointIndex {
    nodes: Vec<Node>,
    len: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        bounds: Aabb2,
        points: Vec<IndexedPoint>,
    },
    Internal {
        bounds: Aabb2,
        left: usize,
        right: usize,
    },
}

impl PointIndex {
    /// Builds the index. Points with non-finite coordinates are skipped.
    pub fn build(points: Vec<IndexedPoint>) -> Self {
        let mut points: Vec<IndexedPoint> = points
            .into_iter()
            .filter(|p| p.position[0].is_finite() && p.position[1].is_finite())
            .collect();
        let len = points.len();
        let mut nodes = Vec::new();
        if !points.is_empty() {
            build_node(&mut nodes, &mut points);
        }
        Self { nodes, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots of every point inside `window`, boundary inclusive.
    pub fn query_window(&self, window: &Aabb2) -> Vec<usize> {
        if self.nodes.is_empty() {
            return Vec::new();
        }

        let mut hits = Vec::new();
        let mut stack = vec![0usize];

        while let Some(idx) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { bounds, points } => {
                    if !bounds.intersects(window) {
                        continue;
                    }
                    hits.extend(
                        points
                            .iter()
                            .filter(|p| window.contains(p.position))
                            .map(|p| p.slot),
                    );
                }
                Node::Internal {
                    bounds,
                    left,
                    right,
                } => {
                    if !bounds.intersects(window) {
                        continue;
                    }
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }

        hits.sort_unstable();
        hits.dedup();
        hits
    }
}

const LEAF_MAX: usize = 8;

fn build_node(nodes: &mut Vec<Node>, points: &mut [IndexedPoint]) -> usize {
    let bounds = bounds_for(points);
    if points.len() <= LEAF_MAX {
        let idx = nodes.len();
        nodes.push(Node::Leaf {
            bounds,
            points: points.to_vec(),
        });
        return idx;
    }

    let axis = split_axis(&bounds);
    points.sort_by(|a, b| {
        stable_total_cmp_f64(a.position[axis], b.position[axis]).then_with(|| a.slot.cmp(&b.slot))
    });

    let mid = points.len() / 2;
    let (left_points, right_points) = points.split_at_mut(mid);

    let idx = nodes.len();
    // Patched once both children exist.
    nodes.push(Node::Leaf {
        bounds,
        points: Vec::new(),
    });

    let left = build_node(nodes, left_points);
    let right = build_node(nodes, right_points);

    nodes[idx] = Node::Internal {
        bounds,
        left,
        right,
    };
    idx
}

fn split_axis(bounds: &Aabb2) -> usize {
    let ex = bounds.max[0] - bounds.min[0];
    let ey = bounds.max[1] - bounds.min[1];
    // Ties prefer X.
    if ex >= ey { 0 } else { 1 }
}

fn bounds_for(points: &[IndexedPoint]) -> Aabb2 {
    points[1..]
        .iter()
        .fold(Aabb2::point(points[0].position), |b, p| {
            b.union(&Aabb2::point(p.position))
        })
}

#[cfg(test)]
mod tests {
    use super::{IndexedPoint, PointIndex};
    use foundation::Aabb2;

    fn p(slot: usize, x: f64, y: f64) -> IndexedPoint {
        IndexedPoint {
            slot,
            position: [x, y],
        }
    }

    #[test]
    fn window_query_returns_slots_in_order() {
        let index = PointIndex::build(vec![p(2, 100.0, 0.0), p(1, 0.0, 0.0), p(3, 5.0, 5.0)]);
        assert_eq!(index.len(), 3);
        let hits = index.query_window(&Aabb2::new([-1.0, -1.0], [5.0, 5.0]));
        assert_eq!(hits, vec![1, 3]);
    }

    #[test]
    fn results_do_not_depend_on_input_order() {
        let a: Vec<IndexedPoint> = (0..50)
            .map(|i| p(i, (i * 7 % 13) as f64 * 10.0, (i % 5) as f64 * 10.0))
            .collect();
        let mut b = a.clone();
        b.reverse();

        let window = Aabb2::square([60.0, 20.0], 40.0);
        let ha = PointIndex::build(a.clone()).query_window(&window);
        let hb = PointIndex::build(b).query_window(&window);
        assert_eq!(ha, hb);

        let brute: Vec<usize> = a
            .iter()
            .filter(|q| window.contains(q.position))
            .map(|q| q.slot)
            .collect();
        assert_eq!(ha, brute);
    }

    #[test]
    fn non_finite_points_are_skipped() {
        let index = PointIndex::build(vec![p(0, f64::NAN, 0.0), p(1, 1.0, 1.0)]);
        assert_eq!(index.len(), 1);
        assert!(PointIndex::build(Vec::new()).is_empty());
        assert_eq!(
            index.query_window(&Aabb2::new([-1e9, -1e9], [1e9, 1e9])),
            vec![1]
        );
    }
}
