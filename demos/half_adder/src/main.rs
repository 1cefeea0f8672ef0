//! Trains a 2-3-2 sigmoid network on the half-adder truth table and dumps
//! every prediction next to the expected bits.

use draftnet::dataset::{Dataset, HalfAdderDataset, Mode};
use draftnet::neural::{
    activations::Activations,
    loss::Loss,
    optimizer::{Optimizer, OptimizerMethod},
    LayerSpec, Network,
};
use draftnet::prelude::Result;
use rand::{rngs::StdRng, SeedableRng};

fn main() -> Result<()> {
    let dataset = HalfAdderDataset::new();
    let mut inputs = Vec::new();
    let mut answers = Vec::new();
    for i in 0..dataset.sample_count(Mode::Train) {
        let (input, answer) = dataset.sample(i, Mode::Train)?;
        inputs.push(input);
        answers.push(answer);
    }

    let mut rng = StdRng::seed_from_u64(8);
    let mut net = Network::new(
        2,
        &[
            LayerSpec::new(3, Activations::Sigmoid),
            LayerSpec::new(2, Activations::Sigmoid),
        ],
        Loss::SumOfSquares,
        &mut rng,
    )?;

    let optim = Optimizer::new(OptimizerMethod::Backprop, 12_000, 2.0).with_log(Some(1_000));
    optim.train_on(&mut net, &inputs, &answers)?;

    println!("------------------");
    println!("Final loss: {}", net.average_loss(&inputs, &answers)?);
    println!("(A, B) -> (C, D), C = A XOR B, D = A AND B");

    for (input, answer) in inputs.iter().zip(&answers) {
        let out = net.calculate(input)?;
        println!(
            "({}, {}) -> ({:.3}, {:.3}), expected ({}, {})",
            input[(0, 0)],
            input[(1, 0)],
            out[(0, 0)],
            out[(1, 0)],
            answer[(0, 0)],
            answer[(1, 0)],
        );
    }

    Ok(())
}
