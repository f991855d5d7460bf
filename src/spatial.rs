use crate::error::{HazardError, Result};

/// Immutable 2-d kd-tree over (lon, lat) points in degree space.
///
/// Built once per catalog and queried many times. Returned indices refer
/// to positions in the point set passed to `build`, so attribute lookup
/// is a plain `attrs[index]` on the owning catalog.
///
/// Distances are squared Euclidean in degrees, not geodesic. Ties are
/// broken by whichever point the traversal visits first; construction is
/// fully deterministic, so repeated queries against the same build agree.
pub struct PointIndex {
    points: Vec<[f64; 2]>,
    root: Option<Box<KdNode>>,
}

struct KdNode {
    ix: usize,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

impl PointIndex {
    /// Build an index over the given points.
    ///
    /// Errors with `EmptyCatalog` on an empty point set: every catalog in
    /// this crate requires at least one reference point to be queryable.
    pub fn build(points: Vec<[f64; 2]>) -> Result<Self> {
        if points.is_empty() {
            return Err(HazardError::EmptyCatalog("no points to index"));
        }
        let mut order: Vec<usize> = (0..points.len()).collect();
        let root = Self::build_node(&points, &mut order, 0);
        Ok(Self { points, root })
    }

    fn build_node(points: &[[f64; 2]], order: &mut [usize], depth: usize) -> Option<Box<KdNode>> {
        if order.is_empty() {
            return None;
        }
        let axis = depth % 2;
        // total_cmp keeps the split deterministic for any input ordering
        order.sort_by(|a, b| points[*a][axis].total_cmp(&points[*b][axis]));
        let mid = order.len() / 2;
        let ix = order[mid];
        let (lower, upper) = order.split_at_mut(mid);
        let left = Self::build_node(points, lower, depth + 1);
        let right = Self::build_node(points, &mut upper[1..], depth + 1);
        Some(Box::new(KdNode { ix, left, right }))
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indexed point at `ix` (the values passed to `build`).
    pub fn point(&self, ix: usize) -> [f64; 2] {
        self.points[ix]
    }

    /// Index of the closest point to a single query.
    pub fn nearest(&self, query: [f64; 2]) -> usize {
        let mut best_ix = 0;
        let mut best_d2 = f64::INFINITY;
        if let Some(root) = &self.root {
            self.search(root, query, 0, &mut best_ix, &mut best_d2);
        }
        best_ix
    }

    /// Indices of the closest point for every query, in query order.
    ///
    /// The batched form every catalog lookup in this crate goes through:
    /// one tree traversal per query and a single output allocation.
    pub fn nearest_batch(&self, queries: &[[f64; 2]]) -> Vec<usize> {
        queries.iter().map(|q| self.nearest(*q)).collect()
    }

    fn search(
        &self,
        node: &KdNode,
        query: [f64; 2],
        depth: usize,
        best_ix: &mut usize,
        best_d2: &mut f64,
    ) {
        let p = self.points[node.ix];
        let dx = p[0] - query[0];
        let dy = p[1] - query[1];
        let d2 = dx * dx + dy * dy;
        // strictly-smaller keeps the first-visited point on ties
        if d2 < *best_d2 {
            *best_d2 = d2;
            *best_ix = node.ix;
        }

        let axis = depth % 2;
        let delta = query[axis] - p[axis];
        let (near, far) = if delta < 0.0 {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        if let Some(child) = near {
            self.search(child, query, depth + 1, best_ix, best_d2);
        }
        // the far half-space only holds points at distance >= |delta|
        if delta * delta < *best_d2 {
            if let Some(child) = far {
                self.search(child, query, depth + 1, best_ix, best_d2);
            }
        }
    }
}
