//! A from-scratch feedforward neural network for handwritten digit
//! recognition and small toy problems.
//!
//! The crate is a dense f64 [`matrix`] engine, a [`neural::Network`] built
//! from bias-fused layer matrices with per-layer activation functions,
//! analytic backpropagation with parallel batch aggregation, and a
//! finite-difference gradient mode that cross-checks the analytic path.
//! [`dataset`] supplies the MNIST binary loader and two toy sample sources;
//! [`storage`] persists trained parameters.
//!
//! ```
//! use draftnet::matrix::Matrix;
//! use draftnet::neural::{activations::Activations, loss::Loss, LayerSpec, Network};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! # fn main() -> draftnet::prelude::Result<()> {
//! let mut rng = StdRng::seed_from_u64(0);
//! let net = Network::new(
//!     2,
//!     &[
//!         LayerSpec::new(3, Activations::Sigmoid),
//!         LayerSpec::new(2, Activations::Sigmoid),
//!     ],
//!     Loss::SumOfSquares,
//!     &mut rng,
//! )?;
//!
//! let out = net.calculate(&Matrix::from_column(vec![0.0, 1.0]))?;
//! assert_eq!(out.dim(), (2, 1));
//! # Ok(())
//! # }
//! ```

pub mod dataset;
pub mod matrix;
pub mod neural;
pub mod numeric;
pub mod prelude;
pub mod storage;
