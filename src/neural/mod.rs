pub mod activations;
pub mod loss;
pub mod optimizer;

use std::ops::Range;
use std::path::Path;

use rand::Rng;
use rayon::prelude::*;

use crate::matrix::{
    ops::{Dot, Transpose},
    Matrix, SharedColumn,
};
use crate::prelude::*;
use crate::storage;

use self::activations::{Activation, Activations};
use self::loss::{Loss, Reduction};

const CELL_BYTES: usize = std::mem::size_of::<f64>();

/// Node count and activation function of one computation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSpec {
    pub nodes: usize,
    pub activation: Activations,
}

impl LayerSpec {
    pub fn new(nodes: usize, activation: Activations) -> Self {
        Self { nodes, activation }
    }
}

/// Feedforward network over bias-fused weight matrices.
///
/// Layer `i` owns one `(nodes_i, nodes_{i-1} + 1)` matrix whose column 0 is
/// the bias; the forward pass prepends a constant-1 row to the previous
/// activation so bias and weights ride in a single product.
#[derive(Debug, Clone)]
pub struct Network {
    weights: Vec<Matrix<f64>>,
    activations: Vec<Activations>,
    loss: Loss,
    input_nodes: usize,
    output_nodes: usize,
}

/// Every value produced by one forward pass, kept for backpropagation.
pub struct Trace {
    /// `activations[0]` is the input; `activations[i + 1]` is layer `i`'s
    /// output after its activation function.
    pub activations: Vec<Matrix<f64>>,
    /// `pre_activations[i]` is layer `i`'s nodes before the activation
    /// function.
    pub pre_activations: Vec<Matrix<f64>>,
}

impl Network {
    /// Fresh network with Xavier-scaled Gaussian weights and zero biases.
    pub fn new<R: Rng + ?Sized>(
        input_nodes: usize,
        layers: &[LayerSpec],
        loss: Loss,
        rng: &mut R,
    ) -> Result<Self> {
        Self::validate(input_nodes, layers)?;

        let mut weights = Vec::with_capacity(layers.len());
        let mut prev = input_nodes;
        for spec in layers {
            let mut fused = Matrix::new(spec.nodes, prev + 1);
            fused.randomize_xavier(rng, prev, spec.nodes);
            for r in 0..spec.nodes {
                fused[(r, 0)] = 0.0; // biases start at zero
            }
            weights.push(fused);
            prev = spec.nodes;
        }

        Self::from_params(input_nodes, layers, loss, weights)
    }

    /// Restore from explicit layer matrices; shapes are checked against the
    /// declared architecture.
    pub fn from_params(
        input_nodes: usize,
        layers: &[LayerSpec],
        loss: Loss,
        weights: Vec<Matrix<f64>>,
    ) -> Result<Self> {
        Self::validate(input_nodes, layers)?;

        if weights.len() != layers.len() {
            return Err(Error::ArchitectureErr(format!(
                "expected {} layer matrices, got {}",
                layers.len(),
                weights.len()
            )));
        }

        let mut prev = input_nodes;
        for (spec, matrix) in layers.iter().zip(&weights) {
            if matrix.dim() != (spec.nodes, prev + 1) {
                return Err(Error::ArchitectureErr(format!(
                    "layer matrix is {:?}, architecture wants ({}, {})",
                    matrix.dim(),
                    spec.nodes,
                    prev + 1
                )));
            }
            prev = spec.nodes;
        }

        Ok(Self {
            weights,
            activations: layers.iter().map(|l| l.activation).collect(),
            loss,
            input_nodes,
            output_nodes: prev,
        })
    }

    fn validate(input_nodes: usize, layers: &[LayerSpec]) -> Result<()> {
        if layers.is_empty() {
            return Err(Error::ArchitectureErr(
                "a network needs an input layer and at least one computation layer".into(),
            ));
        }
        if input_nodes == 0 || layers.iter().any(|l| l.nodes == 0) {
            return Err(Error::ArchitectureErr(
                "every layer needs at least one node".into(),
            ));
        }
        Ok(())
    }

    pub fn input_nodes(&self) -> usize {
        self.input_nodes
    }

    pub fn output_nodes(&self) -> usize {
        self.output_nodes
    }

    /// Computation layers, excluding the input layer.
    pub fn layer_count(&self) -> usize {
        self.weights.len()
    }

    fn check_input(&self, input: &Matrix<f64>) -> Result<()> {
        if input.dim() != (self.input_nodes, 1) {
            return Err(Error::DimensionErr);
        }
        Ok(())
    }

    /// Layer `index`'s nodes before the activation function.
    fn raw_next(&self, index: usize, prev: &Matrix<f64>) -> Result<Matrix<f64>> {
        let one = Matrix::from_column(vec![1.0]);
        let augmented = Matrix::combine_rows(&one, prev)?;
        self.weights[index].dot(&augmented)
    }

    fn next_layer(&self, index: usize, prev: &Matrix<f64>) -> Result<Matrix<f64>> {
        let mut nodes = self.raw_next(index, prev)?;
        let func = self.activations[index];
        nodes.apply(|x| func.call(x));
        Ok(nodes)
    }

    /// Forward pass: the output column vector for one input column vector.
    pub fn calculate(&self, input: &Matrix<f64>) -> Result<Matrix<f64>> {
        self.check_input(input)?;

        let mut nodes = self.next_layer(0, input)?;
        for i in 1..self.weights.len() {
            nodes = self.next_layer(i, &nodes)?;
        }
        Ok(nodes)
    }

    /// Forward pass that keeps every activation and pre-activation.
    pub fn forward_trace(&self, input: &Matrix<f64>) -> Result<Trace> {
        self.check_input(input)?;

        let mut activations = Vec::with_capacity(self.weights.len() + 1);
        let mut pre_activations = Vec::with_capacity(self.weights.len());
        activations.push(input.clone());

        for i in 0..self.weights.len() {
            let pre = self.raw_next(i, &activations[i])?;
            let mut post = pre.clone();
            let func = self.activations[i];
            post.apply(|x| func.call(x));
            pre_activations.push(pre);
            activations.push(post);
        }

        Ok(Trace {
            activations,
            pre_activations,
        })
    }

    pub fn loss_from_output(&self, output: &Matrix<f64>, answer: &Matrix<f64>) -> Result<f64> {
        self.loss.call(output, answer)
    }

    pub fn loss(&self, input: &Matrix<f64>, answer: &Matrix<f64>) -> Result<f64> {
        self.loss_from_output(&self.calculate(input)?, answer)
    }

    /// Loss gradient for one sample with respect to every fused
    /// weight-and-bias matrix, in layer order.
    ///
    /// Per layer, back to front: the error signal times the activation
    /// derivative at the pre-activation nodes gives the bias gradient; the
    /// bias gradient times the previous activation transposed gives the
    /// weight gradient; the next layer's weights (bias column dropped),
    /// transposed, carry the signal backward.
    pub fn gradient(&self, input: &Matrix<f64>, answer: &Matrix<f64>) -> Result<Vec<Matrix<f64>>> {
        if answer.dim() != (self.output_nodes, 1) {
            return Err(Error::DimensionErr);
        }

        let trace = self.forward_trace(input)?;
        let count = self.weights.len();
        let mut grads = vec![Matrix::new(0, 0); count];
        let mut bias_grad = Matrix::new(0, 0);

        for layer in (0..count).rev() {
            let d_nodes = if layer == count - 1 {
                self.loss.gradient(&trace.activations[layer + 1], answer)?
            } else {
                let next = &self.weights[layer + 1];
                let without_bias = next.select_columns(1, next.cols())?;
                without_bias.transpose().dot(&bias_grad)?
            };

            let mut deriv = trace.pre_activations[layer].clone();
            let func = self.activations[layer];
            deriv.apply(|x| func.derivative(x));

            bias_grad = d_nodes;
            bias_grad.hadamard(&deriv)?;

            let weight_grad = bias_grad.dot(&trace.activations[layer].transpose())?;
            grads[layer] = Matrix::combine_columns(&bias_grad, &weight_grad)?;
        }

        Ok(grads)
    }

    fn check_batch(&self, inputs: &[Matrix<f64>], answers: &[Matrix<f64>]) -> Result<()> {
        if inputs.is_empty() || inputs.len() != answers.len() {
            return Err(Error::DimensionErr);
        }
        Ok(())
    }

    /// Summed gradient over the batch.
    ///
    /// Workers take a contiguous slice each and read the parameters only;
    /// their partial sums are combined on the calling thread so the result
    /// is reproducible for a given worker count. Any worker error fails the
    /// whole batch.
    pub fn batch_gradient(
        &self,
        inputs: &[Matrix<f64>],
        answers: &[Matrix<f64>],
    ) -> Result<Vec<Matrix<f64>>> {
        self.check_batch(inputs, answers)?;

        let partials = partition(inputs.len(), worker_count())
            .into_par_iter()
            .map(|range| -> Result<Option<Vec<Matrix<f64>>>> {
                let mut local: Option<Vec<Matrix<f64>>> = None;
                for i in range {
                    let grad = self.gradient(&inputs[i], &answers[i])?;
                    local = Some(match local {
                        None => grad,
                        Some(acc) => sum_grads(acc, &grad)?,
                    });
                }
                Ok(local)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut sum: Option<Vec<Matrix<f64>>> = None;
        for partial in partials.into_iter().flatten() {
            sum = Some(match sum {
                None => partial,
                Some(acc) => sum_grads(acc, &partial)?,
            });
        }
        sum.ok_or(Error::DimensionErr)
    }

    /// One gradient-descent step: average the batch gradient, scale by the
    /// learning rate, subtract from the parameters.
    pub fn train_batch(
        &mut self,
        inputs: &[Matrix<f64>],
        answers: &[Matrix<f64>],
        rate: f64,
    ) -> Result<()> {
        let mut sum = self.batch_gradient(inputs, answers)?;
        let scale = rate / inputs.len() as f64;

        for (weights, grad) in self.weights.iter_mut().zip(&mut sum) {
            grad.apply(|d| d * scale);
            *weights = (&*weights - &*grad)?;
        }
        Ok(())
    }

    /// Mean per-sample loss over the batch.
    pub fn average_loss(&self, inputs: &[Matrix<f64>], answers: &[Matrix<f64>]) -> Result<f64> {
        self.average_loss_with(inputs, answers, Reduction::Mean)
    }

    /// Batch loss under an explicit reduction; [`Reduction::TrimmedMean`]
    /// is the robust variant for outlier-heavy batches.
    pub fn average_loss_with(
        &self,
        inputs: &[Matrix<f64>],
        answers: &[Matrix<f64>],
        reduction: Reduction,
    ) -> Result<f64> {
        self.check_batch(inputs, answers)?;

        let per_worker = partition(inputs.len(), worker_count())
            .into_par_iter()
            .map(|range| -> Result<Vec<f64>> {
                let mut local = Vec::with_capacity(range.len());
                for i in range {
                    local.push(self.loss(&inputs[i], &answers[i])?);
                }
                Ok(local)
            })
            .collect::<Result<Vec<_>>>()?;

        let losses: Vec<f64> = per_worker.into_iter().flatten().collect();
        Ok(reduction.reduce(&losses))
    }

    /// Fraction of samples whose prediction satisfies `check`.
    pub fn evaluate<F>(
        &self,
        inputs: &[Matrix<f64>],
        answers: &[Matrix<f64>],
        check: F,
    ) -> Result<f64>
    where
        F: Fn(&Matrix<f64>, &Matrix<f64>) -> bool + Sync,
    {
        self.check_batch(inputs, answers)?;

        let passed = partition(inputs.len(), worker_count())
            .into_par_iter()
            .map(|range| -> Result<usize> {
                let mut local = 0;
                for i in range {
                    if check(&self.calculate(&inputs[i])?, &answers[i]) {
                        local += 1;
                    }
                }
                Ok(local)
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .sum::<usize>();

        Ok(passed as f64 / inputs.len() as f64)
    }

    /// Every parameter addressed as one flat column vector, layer-major.
    pub fn params_mut(&mut self) -> SharedColumn<'_> {
        SharedColumn::new(self.weights.iter_mut().collect())
    }

    pub fn param_count(&self) -> usize {
        self.weights.iter().map(|m| m.rows() * m.cols()).sum()
    }

    /// Every parameter as little-endian doubles in layer-major, row-major
    /// order. Shapes are not written; the loader reconstructs them from the
    /// declared architecture.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.param_count() * CELL_BYTES);
        for matrix in &self.weights {
            bytes.extend_from_slice(&matrix.to_bytes());
        }
        bytes
    }

    /// Restore from a [`Network::to_bytes`] blob. The byte length must match
    /// the declared architecture exactly.
    pub fn from_bytes(
        input_nodes: usize,
        layers: &[LayerSpec],
        loss: Loss,
        bytes: &[u8],
    ) -> Result<Self> {
        Self::validate(input_nodes, layers)?;

        let mut expected = 0;
        let mut prev = input_nodes;
        for spec in layers {
            expected += spec.nodes * (prev + 1) * CELL_BYTES;
            prev = spec.nodes;
        }
        if bytes.len() != expected {
            return Err(Error::ArchitectureErr(format!(
                "parameter blob holds {} bytes, the declared architecture needs {}",
                bytes.len(),
                expected
            )));
        }

        let mut weights = Vec::with_capacity(layers.len());
        let mut offset = 0;
        let mut prev = input_nodes;
        for spec in layers {
            let len = spec.nodes * (prev + 1) * CELL_BYTES;
            weights.push(Matrix::from_bytes(
                spec.nodes,
                prev + 1,
                &bytes[offset..offset + len],
            )?);
            offset += len;
            prev = spec.nodes;
        }

        Self::from_params(input_nodes, layers, loss, weights)
    }

    /// Write a checkpoint of the current parameters.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        storage::save_buffer(path, &self.to_bytes())
    }

    /// Restore a checkpoint, or start fresh when none exists yet. A present
    /// checkpoint whose size disagrees with the architecture is fatal.
    pub fn create_from_file_or_new<R: Rng + ?Sized>(
        path: impl AsRef<Path>,
        input_nodes: usize,
        layers: &[LayerSpec],
        loss: Loss,
        rng: &mut R,
    ) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let bytes = storage::load_buffer(path)?;
            Self::from_bytes(input_nodes, layers, loss, &bytes)
        } else {
            Self::new(input_nodes, layers, loss, rng)
        }
    }
}

/// Standard classification check: the strongest output row matches the
/// strongest answer row.
pub fn argmax_match(output: &Matrix<f64>, answer: &Matrix<f64>) -> bool {
    output.max_cell().0 == answer.max_cell().0
}

fn sum_grads(mut acc: Vec<Matrix<f64>>, other: &[Matrix<f64>]) -> Result<Vec<Matrix<f64>>> {
    for (a, b) in acc.iter_mut().zip(other) {
        *a = (&*a + b)?;
    }
    Ok(acc)
}

fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Contiguous per-worker index ranges; the first ranges absorb the
/// remainder, so partitioning is deterministic for a given worker count.
fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let common = len / workers;
    let remainder = len % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut begin = 0;
    for i in 0..workers {
        let size = common + usize::from(i < remainder);
        ranges.push(begin..begin + size);
        begin += size;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn tiny_net(seed: u64) -> Network {
        Network::new(
            2,
            &[
                LayerSpec::new(3, Activations::Sigmoid),
                LayerSpec::new(2, Activations::Sigmoid),
            ],
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(seed),
        )
        .unwrap()
    }

    fn tiny_batch() -> (Vec<Matrix<f64>>, Vec<Matrix<f64>>) {
        let inputs = vec![
            Matrix::from_column(vec![0.0, 0.0]),
            Matrix::from_column(vec![0.0, 1.0]),
            Matrix::from_column(vec![1.0, 0.0]),
            Matrix::from_column(vec![1.0, 1.0]),
        ];
        let answers = vec![
            Matrix::from_column(vec![0.0, 0.0]),
            Matrix::from_column(vec![1.0, 0.0]),
            Matrix::from_column(vec![1.0, 0.0]),
            Matrix::from_column(vec![0.0, 1.0]),
        ];
        (inputs, answers)
    }

    #[test]
    fn rejects_bad_architectures() {
        let mut rng = StdRng::seed_from_u64(0);

        let no_layers = Network::new(2, &[], Loss::SumOfSquares, &mut rng);
        assert!(matches!(no_layers, Err(Error::ArchitectureErr(_))));

        let empty_layer = Network::new(
            2,
            &[LayerSpec::new(0, Activations::Sigmoid)],
            Loss::SumOfSquares,
            &mut rng,
        );
        assert!(matches!(empty_layer, Err(Error::ArchitectureErr(_))));

        let no_inputs = Network::new(
            0,
            &[LayerSpec::new(1, Activations::Sigmoid)],
            Loss::SumOfSquares,
            &mut rng,
        );
        assert!(matches!(no_inputs, Err(Error::ArchitectureErr(_))));
    }

    #[test]
    fn layer_matrices_are_bias_fused() {
        let net = tiny_net(0);
        assert_eq!(net.layer_count(), 2);
        assert_eq!(net.weights[0].dim(), (3, 3));
        assert_eq!(net.weights[1].dim(), (2, 4));
        assert_eq!(net.input_nodes(), 2);
        assert_eq!(net.output_nodes(), 2);
        // Fresh biases are zero.
        for matrix in &net.weights {
            for r in 0..matrix.rows() {
                assert_eq!(matrix[(r, 0)], 0.0);
            }
        }
    }

    #[test]
    fn calculate_checks_the_input_shape() {
        let net = tiny_net(0);
        let wide = Matrix::from_column(vec![1.0, 2.0, 3.0]);
        assert_eq!(net.calculate(&wide).unwrap_err(), Error::DimensionErr);

        let row = Matrix::from_array([[1.0, 2.0]]);
        assert_eq!(net.calculate(&row).unwrap_err(), Error::DimensionErr);
    }

    #[test]
    fn calculate_is_deterministic() {
        let net = tiny_net(5);
        let input = Matrix::from_column(vec![0.3, -0.7]);

        let a = net.calculate(&input).unwrap();
        let b = net.calculate(&input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn forward_trace_matches_calculate() {
        let net = tiny_net(9);
        let input = Matrix::from_column(vec![0.5, 0.25]);

        let trace = net.forward_trace(&input).unwrap();
        assert_eq!(trace.activations.len(), 3);
        assert_eq!(trace.pre_activations.len(), 2);
        assert_eq!(trace.activations[0], input);
        assert_eq!(
            trace.activations.last().unwrap(),
            &net.calculate(&input).unwrap()
        );

        // Post-activation is the activation function of pre-activation.
        for (pre, post) in trace.pre_activations.iter().zip(&trace.activations[1..]) {
            let mut expect = pre.clone();
            expect.apply(|x| Activations::Sigmoid.call(x));
            assert_eq!(&expect, post);
        }
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let mut net = tiny_net(1);
        let input = Matrix::from_column(vec![0.3, -0.7]);
        let answer = Matrix::from_column(vec![0.0, 1.0]);

        let mut grads = net.gradient(&input, &answer).unwrap();
        let flat = SharedColumn::new(grads.iter_mut().collect()).to_matrix();

        let eps = 1e-5;
        for i in 0..net.param_count() {
            let saved = net.params_mut().get(i).unwrap();

            net.params_mut().set(i, saved + eps).unwrap();
            let plus = net.loss(&input, &answer).unwrap();
            net.params_mut().set(i, saved - eps).unwrap();
            let minus = net.loss(&input, &answer).unwrap();
            net.params_mut().set(i, saved).unwrap();

            let numeric = (plus - minus) / (2.0 * eps);
            assert!(
                (flat[(i, 0)] - numeric).abs() < 1e-3,
                "param {i}: analytic {} vs numeric {numeric}",
                flat[(i, 0)]
            );
        }
    }

    #[test]
    fn gradient_checks_the_answer_shape() {
        let net = tiny_net(0);
        let input = Matrix::from_column(vec![0.0, 1.0]);
        let short = Matrix::from_column(vec![1.0]);
        assert_eq!(
            net.gradient(&input, &short).unwrap_err(),
            Error::DimensionErr
        );
    }

    #[test]
    fn batch_gradient_matches_sequential_accumulation() {
        let net = tiny_net(2);
        let (inputs, answers) = tiny_batch();

        let parallel = net.batch_gradient(&inputs, &answers).unwrap();

        let mut sequential = net.gradient(&inputs[0], &answers[0]).unwrap();
        for i in 1..inputs.len() {
            sequential =
                sum_grads(sequential, &net.gradient(&inputs[i], &answers[i]).unwrap()).unwrap();
        }

        for (p, s) in parallel.iter().zip(&sequential) {
            assert_eq!(p.dim(), s.dim());
            for r in 0..p.rows() {
                for c in 0..p.cols() {
                    assert!((p[(r, c)] - s[(r, c)]).abs() < 1e-9);
                }
            }
        }

        // The partial-sum scheme is insensitive to the worker count.
        for workers in [1, 2, inputs.len()] {
            let mut by_ranges: Option<Vec<Matrix<f64>>> = None;
            for range in partition(inputs.len(), workers) {
                let mut local: Option<Vec<Matrix<f64>>> = None;
                for i in range {
                    let grad = net.gradient(&inputs[i], &answers[i]).unwrap();
                    local = Some(match local {
                        None => grad,
                        Some(acc) => sum_grads(acc, &grad).unwrap(),
                    });
                }
                if let Some(partial) = local {
                    by_ranges = Some(match by_ranges {
                        None => partial,
                        Some(acc) => sum_grads(acc, &partial).unwrap(),
                    });
                }
            }

            for (p, s) in by_ranges.unwrap().iter().zip(&sequential) {
                for r in 0..p.rows() {
                    for c in 0..p.cols() {
                        assert!((p[(r, c)] - s[(r, c)]).abs() < 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn batch_operations_reject_mismatched_slices() {
        let mut net = tiny_net(0);
        let (inputs, mut answers) = tiny_batch();
        answers.pop();

        assert_eq!(
            net.batch_gradient(&inputs, &answers).unwrap_err(),
            Error::DimensionErr
        );
        assert_eq!(
            net.average_loss(&inputs, &answers).unwrap_err(),
            Error::DimensionErr
        );
        assert_eq!(
            net.train_batch(&inputs, &answers, 0.1).unwrap_err(),
            Error::DimensionErr
        );
        assert_eq!(net.batch_gradient(&[], &[]).unwrap_err(), Error::DimensionErr);
    }

    #[test]
    fn train_batch_reduces_the_loss() {
        let mut net = tiny_net(3);
        let (inputs, answers) = tiny_batch();

        let before = net.average_loss(&inputs, &answers).unwrap();
        for _ in 0..50 {
            net.train_batch(&inputs, &answers, 1.0).unwrap();
        }
        let after = net.average_loss(&inputs, &answers).unwrap();
        assert!(after < before, "{after} !< {before}");
    }

    #[test]
    fn cross_entropy_training_separates_three_classes() {
        // Linear logits over three separable points; the collapsed
        // output-minus-answer gradient drives each logit row toward its
        // one-hot target.
        let mut net = Network::new(
            2,
            &[LayerSpec::new(3, Activations::Identity)],
            Loss::CrossEntropy,
            &mut StdRng::seed_from_u64(10),
        )
        .unwrap();

        let inputs = vec![
            Matrix::from_column(vec![1.0, 0.0]),
            Matrix::from_column(vec![0.0, 1.0]),
            Matrix::from_column(vec![1.0, 1.0]),
        ];
        let answers = vec![
            Matrix::from_column(vec![1.0, 0.0, 0.0]),
            Matrix::from_column(vec![0.0, 1.0, 0.0]),
            Matrix::from_column(vec![0.0, 0.0, 1.0]),
        ];

        let before = net.average_loss(&inputs, &answers).unwrap();
        for _ in 0..2_000 {
            net.train_batch(&inputs, &answers, 0.5).unwrap();
        }
        let after = net.average_loss(&inputs, &answers).unwrap();
        assert!(after < before, "{after} !< {before}");

        let accuracy = net.evaluate(&inputs, &answers, argmax_match).unwrap();
        assert_eq!(accuracy, 1.0);
    }

    #[test]
    fn trimmed_average_loss_ignores_outlier_samples() {
        let net = tiny_net(4);
        let (mut inputs, mut answers) = tiny_batch();
        // Duplicate the batch to 8 samples, then poison one answer hard.
        inputs.extend(inputs.clone());
        answers.extend(answers.clone());
        answers[0] = Matrix::from_column(vec![1000.0, -1000.0]);

        let mean = net.average_loss(&inputs, &answers).unwrap();
        let trimmed = net
            .average_loss_with(&inputs, &answers, Reduction::TrimmedMean)
            .unwrap();
        assert!(trimmed < mean);
    }

    #[test]
    fn evaluate_counts_predicate_passes() {
        let net = tiny_net(6);
        let (inputs, answers) = tiny_batch();

        let all = net.evaluate(&inputs, &answers, |_, _| true).unwrap();
        assert_eq!(all, 1.0);

        let none = net.evaluate(&inputs, &answers, |_, _| false).unwrap();
        assert_eq!(none, 0.0);

        let fraction = net.evaluate(&inputs, &answers, argmax_match).unwrap();
        assert!((0.0..=1.0).contains(&fraction));
    }

    #[test]
    fn argmax_match_compares_strongest_rows() {
        let output = Matrix::from_column(vec![0.1, 0.7, 0.2]);
        let answer = Matrix::from_column(vec![0.0, 1.0, 0.0]);
        assert!(argmax_match(&output, &answer));

        let wrong = Matrix::from_column(vec![0.0, 0.0, 1.0]);
        assert!(!argmax_match(&output, &wrong));
    }

    #[test]
    fn params_view_covers_every_cell() {
        let mut net = tiny_net(7);
        assert_eq!(net.param_count(), 3 * 3 + 2 * 4);
        assert_eq!(net.params_mut().rows(), net.param_count());

        let input = Matrix::from_column(vec![0.5, 0.5]);
        let before = net.calculate(&input).unwrap();

        // Zeroing every parameter through the view changes inference.
        net.params_mut().apply(|_| 0.0);
        let after = net.calculate(&input).unwrap();
        assert_ne!(before, after);
        // All-zero sigmoid layers emit exactly 0.5 everywhere.
        for r in 0..after.rows() {
            assert_eq!(after[(r, 0)], 0.5);
        }
    }

    #[test]
    fn byte_round_trip_preserves_inference() {
        let layers = [
            LayerSpec::new(3, Activations::Tanh),
            LayerSpec::new(2, Activations::Identity),
        ];
        let net = Network::new(
            2,
            &layers,
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(8),
        )
        .unwrap();

        let restored =
            Network::from_bytes(2, &layers, Loss::SumOfSquares, &net.to_bytes()).unwrap();

        let input = Matrix::from_column(vec![-0.4, 0.9]);
        assert_eq!(
            net.calculate(&input).unwrap(),
            restored.calculate(&input).unwrap()
        );
    }

    #[test]
    fn from_bytes_rejects_a_blob_of_the_wrong_size() {
        let layers = [LayerSpec::new(2, Activations::Sigmoid)];
        let net = Network::new(
            2,
            &layers,
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

        let mut bytes = net.to_bytes();
        bytes.extend_from_slice(&[0; 8]);

        let restored = Network::from_bytes(2, &layers, Loss::SumOfSquares, &bytes);
        assert!(matches!(restored, Err(Error::ArchitectureErr(_))));

        // A different declared architecture rejects the original blob too.
        let other = [LayerSpec::new(3, Activations::Sigmoid)];
        let restored = Network::from_bytes(2, &other, Loss::SumOfSquares, &net.to_bytes());
        assert!(matches!(restored, Err(Error::ArchitectureErr(_))));
    }

    #[test]
    fn partition_spreads_the_remainder_over_the_first_workers() {
        assert_eq!(partition(10, 4), vec![0..3, 3..6, 6..8, 8..10]);
        assert_eq!(partition(4, 4), vec![0..1, 1..2, 2..3, 3..4]);
        assert_eq!(partition(3, 1), vec![0..3]);
        // More workers than samples leaves trailing empty ranges.
        assert_eq!(partition(2, 4), vec![0..1, 1..2, 2..2, 2..2]);
    }
}
