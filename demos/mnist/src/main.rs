//! Digit classifier over the MNIST binary files.
//!
//! `mnist train <data-dir>` trains a 784-512-128-10 network with softmax
//! cross entropy, checkpointing to `nn.bin` every 1000 batches. `mnist test
//! <data-dir>` reports argmax accuracy on the test split with the same
//! checkpoint. Both commands pick up an existing checkpoint, so training
//! can resume where it stopped.

use std::env;
use std::process::ExitCode;

use draftnet::dataset::{Dataset, MnistDataset, Mode};
use draftnet::neural::{
    activations::Activations,
    argmax_match,
    loss::Loss,
    optimizer::{Optimizer, OptimizerMethod},
    LayerSpec, Network,
};
use draftnet::prelude::Result;
use rand::{rngs::StdRng, SeedableRng};

const CHECKPOINT: &str = "nn.bin";
const EPOCHS: usize = 10;
const BATCH: usize = 10;
const RATE: f64 = 0.001;

fn architecture() -> [LayerSpec; 3] {
    [
        LayerSpec::new(512, Activations::ReLU),
        LayerSpec::new(128, Activations::ReLU),
        LayerSpec::new(10, Activations::Identity),
    ]
}

fn load_net(rng: &mut StdRng) -> Result<Network> {
    Network::create_from_file_or_new(CHECKPOINT, 28 * 28, &architecture(), Loss::CrossEntropy, rng)
}

fn train(dir: &str) -> Result<()> {
    let dataset = MnistDataset::load(dir)?;
    println!(
        "Loaded {} training samples, {} test samples",
        dataset.sample_count(Mode::Train),
        dataset.sample_count(Mode::Test)
    );

    let mut rng = StdRng::seed_from_u64(0);
    let mut net = load_net(&mut rng)?;

    let optim = Optimizer::new(OptimizerMethod::Backprop, EPOCHS, RATE)
        .with_batches(Some(BATCH))
        .with_log(Some(100))
        .with_checkpoint(CHECKPOINT, 1_000);
    optim.train(&mut net, &dataset, &mut rng)?;

    net.save(CHECKPOINT)?;
    println!("Saved parameters to {CHECKPOINT}");
    Ok(())
}

fn test(dir: &str) -> Result<()> {
    let dataset = MnistDataset::load(dir)?;
    let mut rng = StdRng::seed_from_u64(0);
    let net = load_net(&mut rng)?;

    let count = dataset.sample_count(Mode::Test);
    let mut inputs = Vec::with_capacity(count);
    let mut answers = Vec::with_capacity(count);
    for i in 0..count {
        let (input, answer) = dataset.sample(i, Mode::Test)?;
        inputs.push(input);
        answers.push(answer);
    }

    let accuracy = net.evaluate(&inputs, &answers, argmax_match)?;
    println!(
        "Correct/questions = {}/{} = rate {accuracy:.3}",
        (accuracy * count as f64).round() as usize,
        count
    );
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let run = match (args.get(1).map(String::as_str), args.get(2)) {
        (Some("train"), Some(dir)) => train(dir),
        (Some("test"), Some(dir)) => test(dir),
        _ => {
            eprintln!("usage: mnist <train|test> <data-dir>");
            return ExitCode::FAILURE;
        }
    };

    match run {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
