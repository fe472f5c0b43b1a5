//! Matching utilities for carrying group identities across ticks.

use ndarray::Array2;

/// Jaccard distance matrix between previous and current member sets.
///
/// Member lists must be sorted.
pub fn jaccard_distance(previous: &[Vec<u64>], current: &[Vec<u64>]) -> Array2<f64> {
    let mut dists = Array2::zeros((previous.len(), current.len()));
    for (i, a) in previous.iter().enumerate() {
        for (j, b) in current.iter().enumerate() {
            let shared = a.iter().filter(|id| b.binary_search(id).is_ok()).count();
            let union = a.len() + b.len() - shared;
            dists[[i, j]] = if union == 0 {
                1.0
            } else {
                1.0 - shared as f64 / union as f64
            };
        }
    }
    dists
}

#[derive(Debug, Clone)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_previous: Vec<usize>,
    pub unmatched_current: Vec<usize>,
}

/// Minimum-cost matching of rows to columns. Pairs costing `thresh` or more
/// are left unmatched.
pub fn linear_assignment(cost_matrix: &Array2<f64>, thresh: f64) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_previous: vec![],
            unmatched_current: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_previous: (0..num_rows).collect(),
            unmatched_current: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);
    padded
        .slice_mut(ndarray::s![..num_rows, ..num_cols])
        .assign(cost_matrix);

    let mut matches = vec![];
    let mut unmatched_previous = vec![];
    let mut unmatched_current_mask = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] < thresh {
                    matches.push((row_idx, col_idx));
                    unmatched_current_mask[col_idx] = false;
                } else {
                    unmatched_previous.push(row_idx);
                }
            }
        }
        Err(_) => {
            unmatched_previous = (0..num_rows).collect();
        }
    }

    let unmatched_current = unmatched_current_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| u.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_previous,
        unmatched_current,
    }
}
