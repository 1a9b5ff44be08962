use super::{Bounds, Evaluator, ParameterSet, SearchSpace, Solver};
use crate::error::Result;

/// evenly spaced grid, `k` points per dimension where `k^d <= num_evals`
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch;

/// largest k >= 1 with k^dims <= budget
pub(crate) fn points_per_dimension(budget: usize, dims: usize) -> usize {
    if dims == 0 {
        return 1;
    }
    let fits = |k: usize| {
        (0..dims)
            .try_fold(1usize, |acc, _| acc.checked_mul(k))
            .map_or(false, |total| total <= budget)
    };

    let mut k = 1;
    while fits(k + 1) {
        k += 1;
    }
    k
}

fn axis_values(bounds: &Bounds, k: usize) -> Vec<f64> {
    if k == 1 {
        return vec![(bounds.low + bounds.high) / 2.0];
    }
    let step = bounds.width() / (k - 1) as f64;
    (0..k)
        .map(|i| if i == k - 1 { bounds.high } else { bounds.low + i as f64 * step })
        .collect()
}

impl GridSearch {
    /// every grid point, first dimension varying slowest
    pub fn candidates(&self, space: &SearchSpace, budget: usize) -> Vec<ParameterSet> {
        if space.is_empty() {
            return Vec::new();
        }
        let k = points_per_dimension(budget, space.len());
        let axes: Vec<Vec<f64>> = space.iter().map(|(_, b)| axis_values(b, k)).collect();

        let mut points: Vec<Vec<f64>> = vec![Vec::with_capacity(axes.len())];
        for axis in &axes {
            points = points
                .into_iter()
                .flat_map(|prefix| {
                    axis.iter().map(move |&v| {
                        let mut point = prefix.clone();
                        point.push(v);
                        point
                    })
                })
                .collect();
        }

        points.truncate(budget);
        points.iter().map(|p| space.point(p)).collect()
    }
}

impl Solver for GridSearch {
    fn name(&self) -> &'static str {
        "grid search"
    }

    fn optimize(&self, space: &SearchSpace, evaluator: &mut Evaluator<'_>) -> Result<()> {
        let candidates = self.candidates(space, evaluator.remaining());
        evaluator.evaluate(&candidates)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_points_per_dimension() {
        assert_eq!(points_per_dimension(1, 6), 1);
        assert_eq!(points_per_dimension(63, 6), 1);
        assert_eq!(points_per_dimension(64, 6), 2);
        assert_eq!(points_per_dimension(100, 2), 10);
        assert_eq!(points_per_dimension(99, 2), 9);
        assert_eq!(points_per_dimension(7, 1), 7);
        assert_eq!(points_per_dimension(4, 0), 1);
    }

    #[test]
    fn test_empty_space_has_no_candidates() {
        assert!(GridSearch.candidates(&SearchSpace::new(), 4).is_empty());
    }

    #[test]
    fn test_grid_values() {
        let space = SearchSpace::new()
            .with("a", (0.0, 1.0)).unwrap()
            .with("b", (-1.0, 1.0)).unwrap();
        let grid = GridSearch.candidates(&space, 9);

        assert_eq!(grid.len(), 9);
        assert_relative_eq!(grid[0]["a"], 0.0);
        assert_relative_eq!(grid[0]["b"], -1.0);
        assert_relative_eq!(grid[1]["b"], 0.0);
        assert_relative_eq!(grid[8]["a"], 1.0);
        assert_relative_eq!(grid[8]["b"], 1.0);
    }

    #[test]
    fn test_single_point_is_midpoint() {
        let space = SearchSpace::new().with("a", (2.0, 4.0)).unwrap();
        let grid = GridSearch.candidates(&space, 1);
        assert_eq!(grid.len(), 1);
        assert_relative_eq!(grid[0]["a"], 3.0);
    }

    #[test]
    fn test_degenerate_axis() {
        let space = SearchSpace::new()
            .with("a", (0.3, 0.3)).unwrap()
            .with("b", (0.0, 1.0)).unwrap();
        let grid = GridSearch.candidates(&space, 16);
        assert_eq!(grid.len(), 16);
        assert!(grid.iter().all(|p| p["a"] == 0.3));
    }
}
