//! Per-column standardization (z-scores).

/// Column means and scales learned from a feature matrix.
///
/// Scales use the population standard deviation. A constant column keeps a
/// scale of 1.0, so it maps to all zeros instead of dividing by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(matrix: &[Vec<f64>]) -> Self {
        let dimension = matrix.first().map(|row| row.len()).unwrap_or(0);
        let n = matrix.len() as f64;

        let mut means = vec![0.0; dimension];
        for row in matrix {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        if n > 0.0 {
            means.iter_mut().for_each(|m| *m /= n);
        }

        let mut variances = vec![0.0; dimension];
        for row in matrix {
            for ((variance, value), mean) in variances.iter_mut().zip(row).zip(&means) {
                *variance += (value - mean) * (value - mean);
            }
        }

        let scales = variances
            .into_iter()
            .map(|variance| {
                let std = if n > 0.0 { (variance / n).sqrt() } else { 0.0 };
                if std > 0.0 && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Self { means, scales }
    }

    pub fn transform(&self, matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
        matrix
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(value, (mean, scale))| (value - mean) / scale)
                    .collect()
            })
            .collect()
    }

    pub fn fit_transform(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
        Self::fit(matrix).transform(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_columns_get_zero_mean_unit_variance() {
        let matrix = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        let scaled = StandardScaler::fit_transform(&matrix);

        for col in 0..2 {
            let values: Vec<f64> = scaled.iter().map(|r| r[col]).collect();
            let mean = values.iter().sum::<f64>() / 3.0;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
            assert!(approx(mean, 0.0));
            assert!(approx(variance, 1.0));
        }
    }

    #[test]
    fn test_constant_column_becomes_zeros() {
        let matrix = vec![vec![5.0, 1.0], vec![5.0, 3.0]];
        let scaler = StandardScaler::fit(&matrix);

        assert_eq!(scaler.scales[0], 1.0);
        let scaled = scaler.transform(&matrix);
        assert_eq!(scaled[0][0], 0.0);
        assert_eq!(scaled[1][0], 0.0);
        assert!(approx(scaled[0][1], -1.0));
        assert!(approx(scaled[1][1], 1.0));
    }

    #[test]
    fn test_input_is_left_untouched() {
        let matrix = vec![vec![1.0], vec![3.0]];
        let _ = StandardScaler::fit_transform(&matrix);
        assert_eq!(matrix, vec![vec![1.0], vec![3.0]]);
    }

    #[test]
    fn test_empty_matrix() {
        let scaler = StandardScaler::fit(&[]);
        assert!(scaler.means.is_empty());
        assert!(scaler.transform(&[]).is_empty());
    }
}
