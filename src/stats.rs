//! Descriptive statistics over plain `f64` slices.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` degrees of freedom removed
/// (0 = population, 1 = sample).
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - ddof) as f64).sqrt())
}

pub fn population_std(values: &[f64]) -> f64 {
    std_dev(values, 0).unwrap_or(0.0)
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(&residuals(actual, predicted).iter().map(|r| r * r).collect::<Vec<_>>()).unwrap_or(0.0)
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(&residuals(actual, predicted).iter().map(|r| r.abs()).collect::<Vec<_>>()).unwrap_or(0.0)
}

/// Coefficient of determination; 0 when the actuals have no variance
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let Some(m) = mean(actual) else {
        return 0.0;
    };
    let ss_res: f64 = residuals(actual, predicted).iter().map(|r| r * r).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - m).powi(2)).sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}

/// Share of rows where prediction and actual agree on being strictly positive
pub fn direction_accuracy(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let hits = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| (**a > 0.0) == (**p > 0.0))
        .count();
    hits as f64 / n as f64
}

/// `actual - predicted`, element-wise
pub fn residuals(actual: &[f64], predicted: &[f64]) -> Vec<f64> {
    actual.iter().zip(predicted).map(|(a, p)| a - p).collect()
}
