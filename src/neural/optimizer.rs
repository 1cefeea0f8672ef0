use std::path::PathBuf;

use rand::Rng;

use crate::dataset::{Dataset, Mode};
use crate::matrix::Matrix;
use crate::neural::Network;
use crate::numeric;
use crate::prelude::*;

pub enum OptimizerMethod {
    /// Analytic reverse-mode gradients.
    Backprop,
    /// Per-parameter step-halving finite-difference estimates through the
    /// flat parameter view. One forward sweep of the batch per parameter,
    /// so orders of magnitude slower; exists to cross-check the analytic
    /// path, not for production training.
    FiniteDiff,
}

pub struct Optimizer {
    method: OptimizerMethod,
    iterations: usize,
    iterations_per_log: Option<usize>,
    batch_size: Option<usize>,
    checkpoint: Option<(PathBuf, usize)>,
    rate: f64,
}

impl Optimizer {
    pub fn new(method: OptimizerMethod, iterations: usize, rate: f64) -> Self {
        Self {
            method,
            iterations,
            iterations_per_log: None,
            batch_size: None,
            checkpoint: None,
            rate,
        }
    }

    pub fn with_log(mut self, iterations_per_log: Option<usize>) -> Self {
        self.iterations_per_log = iterations_per_log;
        self
    }

    pub fn with_batches(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Save the parameters to `path` every `every` steps.
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>, every: usize) -> Self {
        self.checkpoint = Some((path.into(), every.max(1)));
        self
    }

    /// Runs the configured number of iterations over an in-memory sample
    /// set. Each iteration steps once on the full set, or once per chunk
    /// when a batch size is configured.
    pub fn train_on(
        &self,
        net: &mut Network,
        inputs: &[Matrix<f64>],
        answers: &[Matrix<f64>],
    ) -> Result<()> {
        if inputs.is_empty() || inputs.len() != answers.len() {
            return Err(Error::DimensionErr);
        }

        let mut steps = 0;
        for i in 0..self.iterations {
            let batch = self.batch_size.unwrap_or(inputs.len()).max(1);
            for begin in (0..inputs.len()).step_by(batch) {
                let end = (begin + batch).min(inputs.len());
                self.step(net, &inputs[begin..end], &answers[begin..end])?;
                steps += 1;
                self.maybe_checkpoint(net, steps)?;
            }

            if self.iterations_per_log.is_some_and(|ipl| i % ipl == 0) {
                let avg = net.average_loss(inputs, answers)?;
                println!("Iteration {i} loss: {avg}");
            }
        }
        Ok(())
    }

    /// Epoch-driven training over a dataset: every step draws a fresh batch
    /// of random training samples.
    pub fn train<D, R>(&self, net: &mut Network, data: &D, rng: &mut R) -> Result<()>
    where
        D: Dataset,
        R: Rng + ?Sized,
    {
        let total = data.sample_count(Mode::Train);
        if total == 0 {
            return Err(Error::IndexErr);
        }
        let batch = self.batch_size.unwrap_or(total).clamp(1, total);
        let steps_per_epoch = (total / batch).max(1);

        let mut steps = 0;
        for epoch in 0..self.iterations {
            for _ in 0..steps_per_epoch {
                let mut inputs = Vec::with_capacity(batch);
                let mut answers = Vec::with_capacity(batch);
                for _ in 0..batch {
                    let (input, answer) = data.sample(rng.gen_range(0..total), Mode::Train)?;
                    inputs.push(input);
                    answers.push(answer);
                }

                self.step(net, &inputs, &answers)?;
                steps += 1;

                if self.iterations_per_log.is_some_and(|ipl| steps % ipl == 0) {
                    let avg = net.average_loss(&inputs, &answers)?;
                    println!("Epoch {epoch} step {steps} loss: {avg}");
                }
                self.maybe_checkpoint(net, steps)?;
            }
        }
        Ok(())
    }

    fn maybe_checkpoint(&self, net: &Network, steps: usize) -> Result<()> {
        if let Some((path, every)) = &self.checkpoint {
            if steps % every == 0 {
                net.save(path)?;
            }
        }
        Ok(())
    }

    fn step(&self, net: &mut Network, inputs: &[Matrix<f64>], answers: &[Matrix<f64>]) -> Result<()> {
        match self.method {
            OptimizerMethod::Backprop => net.train_batch(inputs, answers, self.rate),
            OptimizerMethod::FiniteDiff => self.finite_diff_step(net, inputs, answers),
        }
    }

    /// Descend along a numerically estimated gradient.
    ///
    /// Each parameter is perturbed through the flat column view and the
    /// change in average batch loss gives its derivative estimate. An
    /// estimate that never settles aborts the whole step.
    fn finite_diff_step(
        &self,
        net: &mut Network,
        inputs: &[Matrix<f64>],
        answers: &[Matrix<f64>],
    ) -> Result<()> {
        let count = net.param_count();
        let mut grad = Vec::with_capacity(count);

        for i in 0..count {
            let saved = net.params_mut().get(i)?;
            let estimate = numeric::differentiate(
                |v| {
                    net.params_mut().set(i, v)?;
                    net.average_loss(inputs, answers)
                },
                saved,
            );
            net.params_mut().set(i, saved)?;
            grad.push(estimate?);
        }

        let rate = self.rate;
        let mut params = net.params_mut();
        for (i, d) in grad.iter().enumerate() {
            let v = params.get(i)?;
            params.set(i, v - rate * d)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FuncDataset, HalfAdderDataset};
    use crate::neural::activations::Activations;
    use crate::neural::loss::Loss;
    use crate::neural::LayerSpec;
    use rand::{rngs::StdRng, SeedableRng};

    fn half_adder_samples() -> (Vec<Matrix<f64>>, Vec<Matrix<f64>>) {
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
    fn backprop_learns_the_half_adder() {
        let mut net = Network::new(
            2,
            &[
                LayerSpec::new(3, Activations::Sigmoid),
                LayerSpec::new(2, Activations::Sigmoid),
            ],
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        let (inputs, answers) = half_adder_samples();

        let optim = Optimizer::new(OptimizerMethod::Backprop, 30_000, 2.0);
        assert_eq!(Ok(()), optim.train_on(&mut net, &inputs, &answers));

        let fin = net.average_loss(&inputs, &answers).unwrap();
        println!("Final loss: {fin}");
        assert!(fin < 0.05);
    }

    #[test]
    fn finite_diff_reduces_the_loss() {
        // One linear layer fitting y = 2x - 1, sampled on the unit interval.
        let mut net = Network::new(
            1,
            &[LayerSpec::new(1, Activations::Identity)],
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

        let line = FuncDataset::new(2, |x| 2.0 * x - 1.0);
        let mut inputs = Vec::new();
        let mut answers = Vec::new();
        for i in 0..=line.sample_count(Mode::Train) {
            let (input, answer) = line.sample(i, Mode::Train).unwrap();
            inputs.push(input);
            answers.push(answer);
        }

        let before = net.average_loss(&inputs, &answers).unwrap();
        let optim = Optimizer::new(OptimizerMethod::FiniteDiff, 200, 0.5);
        optim.train_on(&mut net, &inputs, &answers).unwrap();
        let after = net.average_loss(&inputs, &answers).unwrap();

        assert!(after < before, "{after} !< {before}");
        assert!(after < 0.01, "{after}");
    }

    #[test]
    fn finite_diff_and_backprop_agree_on_a_step() {
        let layers = [LayerSpec::new(2, Activations::Sigmoid)];
        let make = || {
            Network::new(
                2,
                &layers,
                Loss::SumOfSquares,
                &mut StdRng::seed_from_u64(13),
            )
            .unwrap()
        };
        let (inputs, answers) = half_adder_samples();

        let mut analytic = make();
        Optimizer::new(OptimizerMethod::Backprop, 1, 0.1)
            .train_on(&mut analytic, &inputs, &answers)
            .unwrap();

        let mut numeric = make();
        Optimizer::new(OptimizerMethod::FiniteDiff, 1, 0.1)
            .train_on(&mut numeric, &inputs, &answers)
            .unwrap();

        for i in 0..analytic.param_count() {
            let a = analytic.params_mut().get(i).unwrap();
            let n = numeric.params_mut().get(i).unwrap();
            assert!((a - n).abs() < 1e-3, "param {i}: {a} vs {n}");
        }
    }

    #[test]
    fn dataset_training_reaches_the_truth_table() {
        let dataset = HalfAdderDataset::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut net = Network::new(
            2,
            &[
                LayerSpec::new(3, Activations::Sigmoid),
                LayerSpec::new(2, Activations::Sigmoid),
            ],
            Loss::SumOfSquares,
            &mut rng,
        )
        .unwrap();

        // One "epoch" per step here: batch size 4 over 4 samples.
        let optim = Optimizer::new(OptimizerMethod::Backprop, 30_000, 2.0).with_batches(Some(4));
        optim.train(&mut net, &dataset, &mut rng).unwrap();

        // Round each output to a bit; argmax comparison would tie on the
        // all-zero row.
        let (inputs, answers) = half_adder_samples();
        let accuracy = net
            .evaluate(&inputs, &answers, |out, ans| {
                (0..out.rows()).all(|r| out[(r, 0)].round() == ans[(r, 0)])
            })
            .unwrap();
        assert_eq!(accuracy, 1.0);
    }

    #[test]
    fn checkpoints_persist_the_training_state() {
        let path = std::env::temp_dir().join(format!(
            "draftnet-optimizer-checkpoint-{}",
            std::process::id()
        ));
        let layers = [
            LayerSpec::new(3, Activations::Sigmoid),
            LayerSpec::new(2, Activations::Sigmoid),
        ];
        let mut net = Network::new(
            2,
            &layers,
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(21),
        )
        .unwrap();
        let (inputs, answers) = half_adder_samples();

        let optim =
            Optimizer::new(OptimizerMethod::Backprop, 10, 0.5).with_checkpoint(&path, 1);
        optim.train_on(&mut net, &inputs, &answers).unwrap();

        // The checkpoint matches the live network, so restoring resumes
        // exactly where training stopped.
        let restored = Network::create_from_file_or_new(
            &path,
            2,
            &layers,
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(99),
        )
        .unwrap();
        for (input, _) in inputs.iter().zip(&answers) {
            assert_eq!(
                net.calculate(input).unwrap(),
                restored.calculate(input).unwrap()
            );
        }

        // A conflicting declared architecture makes the same file fatal.
        let wrong = [LayerSpec::new(2, Activations::Sigmoid)];
        let conflict = Network::create_from_file_or_new(
            &path,
            2,
            &wrong,
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(99),
        );
        assert!(matches!(conflict, Err(Error::ArchitectureErr(_))));

        std::fs::remove_file(&path).unwrap();

        // With the file gone the same call hands back a fresh network.
        let fresh = Network::create_from_file_or_new(
            &path,
            2,
            &layers,
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(99),
        );
        assert!(fresh.is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn train_on_rejects_mismatched_sample_sets() {
        let mut net = Network::new(
            2,
            &[LayerSpec::new(1, Activations::Sigmoid)],
            Loss::SumOfSquares,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();
        let (inputs, mut answers) = half_adder_samples();
        answers.pop();

        let optim = Optimizer::new(OptimizerMethod::Backprop, 1, 0.1);
        assert_eq!(
            optim.train_on(&mut net, &inputs, &answers),
            Err(Error::DimensionErr)
        );
    }
}
