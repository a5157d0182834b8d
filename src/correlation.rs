// 📈 Cross-entity correlation of monthly series
//
// Pearson correlation over the shared 12-month domain. A constant series
// has no variance, so every cell in its row and column (its diagonal too)
// is NotComputable.

use crate::aggregate::KeyValue;
use crate::metrics::Measure;
use crate::seasonal::MonthlySeries;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub labels: Vec<KeyValue>,
    /// Symmetric; `cells[i][j]` correlates `labels[i]` with `labels[j]`
    pub cells: Vec<Vec<Measure>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &KeyValue, b: &KeyValue) -> Option<Measure> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        Some(self.cells[i][j])
    }
}

fn variance_terms(values: &[f64]) -> (f64, Vec<f64>) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let deviations: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let sum_sq = deviations.iter().map(|d| d * d).sum();
    (sum_sq, deviations)
}

/// Pearson correlation of two equally long series
pub fn pearson(a: &[f64], b: &[f64]) -> Measure {
    if a.len() != b.len() || a.len() < 2 {
        return Measure::NotComputable;
    }

    let (ss_a, dev_a) = variance_terms(a);
    let (ss_b, dev_b) = variance_terms(b);
    if ss_a == 0.0 || ss_b == 0.0 {
        return Measure::NotComputable;
    }

    let covariance: f64 = dev_a.iter().zip(&dev_b).map(|(x, y)| x * y).sum();
    match Measure::from_f64(covariance / (ss_a * ss_b).sqrt()) {
        Measure::Value(r) => Measure::Value(r.clamp(-1.0, 1.0)),
        other => other,
    }
}

pub fn correlation_matrix(series: &[(KeyValue, MonthlySeries)]) -> CorrelationMatrix {
    let n = series.len();
    let mut cells = vec![vec![Measure::NotComputable; n]; n];

    for i in 0..n {
        for j in i..n {
            let a = series[i].1.values();
            let b = series[j].1.values();
            let r = if i == j {
                // Self-correlation is exactly 1 unless the series is constant
                match pearson(a, b) {
                    Measure::Value(_) => Measure::Value(1.0),
                    other => other,
                }
            } else {
                pearson(a, b)
            };
            cells[i][j] = r;
            cells[j][i] = r;
        }
    }

    CorrelationMatrix {
        labels: series.iter().map(|(label, _)| label.clone()).collect(),
        cells,
    }
}
