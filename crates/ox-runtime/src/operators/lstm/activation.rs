use ox_tensor::FloatElement;

/// Elementwise activation functions for recurrent gates.
///
/// Parameterised variants carry their `alpha`/`beta`; defaults follow the
/// ONNX recurrent operator definitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
    Affine { alpha: f32, beta: f32 },
    LeakyRelu { alpha: f32 },
    ThresholdedRelu { alpha: f32 },
    ScaledTanh { alpha: f32, beta: f32 },
    HardSigmoid { alpha: f32, beta: f32 },
    Elu { alpha: f32 },
    Softsign,
    Softplus,
}

/// Hands out `activation_alpha` / `activation_beta` values in order of
/// appearance, falling back to per-function defaults when exhausted.
#[derive(Debug, Clone)]
pub(crate) struct ActivationParams<'a> {
    alphas: std::slice::Iter<'a, f32>,
    betas: std::slice::Iter<'a, f32>,
}

impl<'a> ActivationParams<'a> {
    pub(crate) fn new(alphas: &'a [f32], betas: &'a [f32]) -> Self {
        ActivationParams {
            alphas: alphas.iter(),
            betas: betas.iter(),
        }
    }

    fn alpha(&mut self, default: f32) -> f32 {
        self.alphas.next().copied().unwrap_or(default)
    }

    fn beta(&mut self, default: f32) -> f32 {
        self.betas.next().copied().unwrap_or(default)
    }
}

impl Activation {
    /// Parses an activation name, consuming its parameters from `params`.
    /// Returns `None` for an unknown name.
    pub(crate) fn parse(name: &str, params: &mut ActivationParams<'_>) -> Option<Activation> {
        let activation = match name.to_ascii_lowercase().as_str() {
            "relu" => Activation::Relu,
            "tanh" => Activation::Tanh,
            "sigmoid" => Activation::Sigmoid,
            "affine" => Activation::Affine {
                alpha: params.alpha(1.0),
                beta: params.beta(0.0),
            },
            "leakyrelu" => Activation::LeakyRelu {
                alpha: params.alpha(0.01),
            },
            "thresholdedrelu" => Activation::ThresholdedRelu {
                alpha: params.alpha(1.0),
            },
            "scaledtanh" => Activation::ScaledTanh {
                alpha: params.alpha(1.0),
                beta: params.beta(1.0),
            },
            "hardsigmoid" => Activation::HardSigmoid {
                alpha: params.alpha(0.2),
                beta: params.beta(0.5),
            },
            "elu" => Activation::Elu {
                alpha: params.alpha(1.0),
            },
            "softsign" => Activation::Softsign,
            "softplus" => Activation::Softplus,
            _ => return None,
        };
        Some(activation)
    }

    pub fn apply<T: FloatElement>(&self, x: T) -> T {
        let zero = T::ZERO;
        let one = T::ONE;
        match *self {
            Activation::Relu => x.max(zero),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => one.div(one.add(x.neg().exp())),
            Activation::Affine { alpha, beta } => {
                T::from_f64(alpha as f64).mul(x).add(T::from_f64(beta as f64))
            }
            Activation::LeakyRelu { alpha } => {
                if x >= zero {
                    x
                } else {
                    T::from_f64(alpha as f64).mul(x)
                }
            }
            Activation::ThresholdedRelu { alpha } => {
                if x > T::from_f64(alpha as f64) {
                    x
                } else {
                    zero
                }
            }
            Activation::ScaledTanh { alpha, beta } => {
                let inner = T::from_f64(beta as f64).mul(x).tanh();
                T::from_f64(alpha as f64).mul(inner)
            }
            Activation::HardSigmoid { alpha, beta } => {
                let y = T::from_f64(alpha as f64).mul(x).add(T::from_f64(beta as f64));
                y.min(one).max(zero)
            }
            Activation::Elu { alpha } => {
                if x >= zero {
                    x
                } else {
                    T::from_f64(alpha as f64).mul(x.exp().sub(one))
                }
            }
            Activation::Softsign => x.div(one.add(x.abs())),
            Activation::Softplus => x.exp().add(one).ln(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse(name: &str) -> Option<Activation> {
        Activation::parse(name, &mut ActivationParams::new(&[], &[]))
    }

    #[test]
    fn test_sigmoid_tanh() {
        let s = parse("Sigmoid").unwrap();
        assert_relative_eq!(s.apply(0.0f64), 0.5);
        assert_relative_eq!(s.apply(1.0f64), 1.0 / (1.0 + (-1.0f64).exp()), epsilon = 1e-12);
        assert_relative_eq!(parse("Tanh").unwrap().apply(0.5f32), 0.5f32.tanh());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(parse("HardSigmoid"), Some(Activation::HardSigmoid { alpha: 0.2, beta: 0.5 }));
        assert_eq!(parse("LeakyRelu"), Some(Activation::LeakyRelu { alpha: 0.01 }));
        assert_eq!(parse("nope"), None);
    }

    #[test]
    fn test_params_consumed_in_order() {
        let alphas = [0.5, 2.0];
        let betas = [3.0];
        let mut params = ActivationParams::new(&alphas, &betas);
        let a = Activation::parse("Affine", &mut params).unwrap();
        let e = Activation::parse("Elu", &mut params).unwrap();
        let h = Activation::parse("HardSigmoid", &mut params).unwrap();
        assert_eq!(a, Activation::Affine { alpha: 0.5, beta: 3.0 });
        assert_eq!(e, Activation::Elu { alpha: 2.0 });
        assert_eq!(h, Activation::HardSigmoid { alpha: 0.2, beta: 0.5 });
    }

    #[test]
    fn test_piecewise() {
        assert_eq!(Activation::Relu.apply(-1.0f32), 0.0);
        assert_eq!(Activation::ThresholdedRelu { alpha: 1.0 }.apply(0.5f32), 0.0);
        assert_eq!(Activation::HardSigmoid { alpha: 0.2, beta: 0.5 }.apply(10.0f32), 1.0);
        assert_relative_eq!(Activation::Softsign.apply(1.0f64), 0.5);
        assert_relative_eq!(Activation::Softplus.apply(0.0f64), 2.0f64.ln());
        assert_relative_eq!(
            Activation::Elu { alpha: 1.0 }.apply(-1.0f64),
            (-1.0f64).exp() - 1.0
        );
    }
}
