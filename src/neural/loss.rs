use crate::matrix::Matrix;
use crate::prelude::*;

/// Loss functions over an output/answer column-vector pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    /// `0.5 * sum((output - answer)^2)`
    SumOfSquares,
    /// `sum(-answer * ln(softmax(output)))`
    CrossEntropy,
}

impl Loss {
    pub fn call(&self, output: &Matrix<f64>, answer: &Matrix<f64>) -> Result<f64> {
        if output.dim() != answer.dim() || output.cols() != 1 {
            return Err(Error::DimensionErr);
        }

        match self {
            Loss::SumOfSquares => {
                let mut sum = 0.0;
                for r in 0..output.rows() {
                    let diff = output[(r, 0)] - answer[(r, 0)];
                    sum += diff * diff;
                }
                Ok(0.5 * sum)
            }
            Loss::CrossEntropy => {
                let probs = softmax(output);
                let mut sum = 0.0;
                for r in 0..output.rows() {
                    sum -= answer[(r, 0)] * probs[(r, 0)].ln();
                }
                Ok(sum)
            }
        }
    }

    /// Gradient of the loss with respect to the output vector.
    ///
    /// Both variants reduce to `output - answer`: squared error directly,
    /// cross entropy through the softmax cancellation.
    pub fn gradient(&self, output: &Matrix<f64>, answer: &Matrix<f64>) -> Result<Matrix<f64>> {
        output - answer
    }
}

/// Normalizes a column vector into a probability distribution,
/// `out_r = e^x_r / sum(e^x)`.
pub fn softmax(x: &Matrix<f64>) -> Matrix<f64> {
    let mut out = x.clone();
    out.apply(|d| d.exp());
    let mut sigma = 0.0;
    for r in 0..out.rows() {
        sigma += out[(r, 0)];
    }
    out.apply(|d| d / sigma);
    out
}

/// How per-sample losses are folded into one batch statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Arithmetic mean. The default contract for training.
    Mean,
    /// Drops the top and bottom quartile before averaging, for
    /// outlier-heavy batches. Falls back to the plain median when fewer
    /// than 4 samples survive the trim or the trimmed sum is non-finite.
    TrimmedMean,
}

impl Reduction {
    pub fn reduce(&self, losses: &[f64]) -> f64 {
        match self {
            Reduction::Mean => losses.iter().sum::<f64>() / losses.len() as f64,
            Reduction::TrimmedMean => {
                let mut sorted = losses.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

                let quartile = sorted.len() / 4;
                let kept = &sorted[quartile..sorted.len() - quartile];
                let sum: f64 = kept.iter().sum();
                if kept.len() < 4 || !sum.is_finite() {
                    median(&sorted)
                } else {
                    sum / kept.len() as f64
                }
            }
        }
    }
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
