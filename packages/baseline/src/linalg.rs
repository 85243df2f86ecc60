//! Penalised least squares on small dense systems.

/// Solve `min ||X b - y||² + Σ penalty_j b_j²`.
///
/// `rows` are the rows of `X`; every row must have `penalty.len()` columns.
/// Returns `None` when the normal equations are singular.
pub fn ridge(rows: &[Vec<f64>], y: &[f64], penalty: &[f64]) -> Option<Vec<f64>> {
    let p = penalty.len();
    let mut a = vec![vec![0.0; p]; p];
    let mut b = vec![0.0; p];

    for (row, &target) in rows.iter().zip(y) {
        for i in 0..p {
            b[i] += row[i] * target;
            for j in i..p {
                a[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..p {
        a[i][i] += penalty[i];
        for j in 0..i {
            a[i][j] = a[j][i];
        }
    }

    solve(a, b)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn recovers_exact_line() {
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..5).map(|i| 2.0 + 3.0 * i as f64).collect();

        let beta = ridge(&rows, &y, &[0.0, 0.0]).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-9);
        assert!((beta[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn penalty_shrinks_towards_zero() {
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..5).map(|i| 3.0 * i as f64).collect();

        let free = ridge(&rows, &y, &[0.0, 0.0]).unwrap();
        let shrunk = ridge(&rows, &y, &[0.0, 100.0]).unwrap();
        assert!(shrunk[1].abs() < free[1].abs());
    }

    #[test]
    fn singular_system_is_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(ridge(&rows, &[1.0, 2.0], &[0.0, 0.0]).is_none());
    }
}
