use crate::prelude::*;

/// Tolerance for deciding that two successive derivative estimates agree.
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

/// Halving the step more than this means the quotient never settled.
const MAX_HALVINGS: u32 = 64;

/// Whether `a` and `b` differ by at most `threshold`.
pub fn approximately(a: f64, b: f64, threshold: f64) -> bool {
    (a - b).abs() <= threshold
}

/// Forward-difference derivative of `f` at `x`.
///
/// Starts with a step of 1 and keeps halving it until two successive
/// quotients `(f(x + h) - f(x)) / h` agree within [`DEFAULT_TOLERANCE`].
/// Hitting the halving cap first is [`Error::NonConvergent`]; a
/// non-converged estimate is never returned as a best effort.
pub fn differentiate<F>(mut f: F, x: f64) -> Result<f64>
where
    F: FnMut(f64) -> Result<f64>,
{
    let from = f(x)?;
    let mut h = 1.0;
    let mut estimate = f64::INFINITY;
    for _ in 0..MAX_HALVINGS {
        h /= 2.0;
        let prev = estimate;
        estimate = (f(x + h)? - from) / h;
        if approximately(prev, estimate, DEFAULT_TOLERANCE) {
            return Ok(estimate);
        }
    }
    Err(Error::NonConvergent)
}
