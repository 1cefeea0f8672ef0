pub trait Activation {
    /// Returns activation function at x
    fn call(&self, x: f64) -> f64;
    /// Returns derivative of the activation function with respect to its
    /// input, evaluated at the pre-activation value x (the layer's nodes
    /// before the nonlinearity).
    fn derivative(&self, x: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activations {
    Identity,
    Sigmoid,
    ReLU,
    Elu,
    Tanh,
}

impl Activation for Activations {
    fn call(&self, x: f64) -> f64 {
        use Activations::*;
        match self {
            Identity => x,
            Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ReLU => x.max(0.0),
            Elu => {
                if x >= 0.0 {
                    x
                } else {
                    x.exp() - 1.0
                }
            }
            Tanh => x.tanh(),
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        use Activations::*;
        match self {
            Identity => 1.0,
            Sigmoid => {
                let fx = self.call(x);
                fx * (1.0 - fx)
            }
            ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Elu => {
                if x >= 0.0 {
                    1.0
                } else {
                    x.exp()
                }
            }
            Tanh => {
                let fx = x.tanh();
                1.0 - fx * fx
            }
        }
    }
}
