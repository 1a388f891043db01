//! Three-parameter logistic (3PL) item response functions.

use tierwise_core::Item;

/// Bound on the logistic exponent so `exp` never overflows.
const EXPONENT_LIMIT: f64 = 500.0;

/// Probability that a student at `theta` answers an item correctly.
///
/// `p = c + (1 - c) / (1 + exp(-a (theta - b)))`, always within `[c, 1]`.
pub fn probability_correct(theta: f64, a: f64, b: f64, c: f64) -> f64 {
    let exponent = (-a * (theta - b)).clamp(-EXPONENT_LIMIT, EXPONENT_LIMIT);
    (c + (1.0 - c) / (1.0 + exponent.exp())).min(1.0)
}

/// Fisher information an item contributes at `theta`.
///
/// Zero in the degenerate region (`p <= c` or `q <= 0`).
pub fn fisher_information(theta: f64, a: f64, b: f64, c: f64) -> f64 {
    let p = probability_correct(theta, a, b, c);
    let q = 1.0 - p;
    if p <= c || q <= 0.0 {
        return 0.0;
    }
    let p_star = (p - c) / (1.0 - c);
    a * a * p_star * p_star * (q / p)
}

pub(crate) fn item_information(theta: f64, item: &Item) -> f64 {
    fisher_information(theta, item.a, item.b, item.c)
}

/// Standard error of `theta` given the administered items: `1 / sqrt(sum info)`.
///
/// `None` when the items carry no information at `theta`.
pub fn standard_error<'a>(theta: f64, items: impl IntoIterator<Item = &'a Item>) -> Option<f64> {
    let total: f64 = items.into_iter().map(|item| item_information(theta, item)).sum();
    (total > 0.0).then(|| 1.0 / total.sqrt())
}
