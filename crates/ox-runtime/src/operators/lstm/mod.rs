//! The LSTM operator family.
//!
//! Three schema versions share one kernel. Attributes a version does not
//! declare (`layout` before 14, `output_sequence` after 1) are filtered out
//! by the registry, so [`LstmConfig`] sees their defaults.

mod activation;
mod config;
mod layer;
mod state;

pub use activation::Activation;
pub use config::{ActivationSet, Direction, Layout, LstmConfig};
pub use layer::{LstmInputs, LstmLayer};
pub use state::{CellState, Gate, Gates, HiddenState, LayerOutput, LayerState};

use ox_tensor::{DType, Element, FloatElement, NdArray};

use crate::attribute::{AttributeKind, Attributes};
use crate::context::ExecutionContext;
use crate::data::Tensor;
use crate::error::{Result, RuntimeError};
use crate::operator::schema::{AttributeInfo, IoInfo, OperatorInfo, VersionInfo, DEFAULT_DOMAIN};
use crate::operator::{OperatorKernel, OperatorVariant};

pub(crate) const OP_NAME: &str = "LSTM";

static FLOATS: [DType; 2] = [DType::F32, DType::F64];
static INT32: [DType; 1] = [DType::I32];

static INPUTS: [IoInfo; 8] = [
    IoInfo::required(0, "X", &FLOATS).constrained("T"),
    IoInfo::required(1, "W", &FLOATS).constrained("T"),
    IoInfo::required(2, "R", &FLOATS).constrained("T"),
    IoInfo::optional(3, "B", &FLOATS).constrained("T"),
    IoInfo::optional(4, "sequence_lens", &INT32),
    IoInfo::optional(5, "initial_h", &FLOATS).constrained("T"),
    IoInfo::optional(6, "initial_c", &FLOATS).constrained("T"),
    IoInfo::optional(7, "P", &FLOATS).constrained("T"),
];

static OUTPUTS: [IoInfo; 3] = [
    IoInfo::optional(0, "Y", &FLOATS).constrained("T"),
    IoInfo::optional(1, "Y_h", &FLOATS).constrained("T"),
    IoInfo::optional(2, "Y_c", &FLOATS).constrained("T"),
];

const fn attr(name: &'static str, kind: AttributeKind) -> AttributeInfo {
    AttributeInfo::new(name, kind, false)
}

static ATTRIBUTES_V1: [AttributeInfo; 8] = [
    attr("activation_alpha", AttributeKind::Floats),
    attr("activation_beta", AttributeKind::Floats),
    attr("activations", AttributeKind::Strings),
    attr("clip", AttributeKind::Float),
    attr("direction", AttributeKind::String),
    attr("hidden_size", AttributeKind::Int),
    attr("input_forget", AttributeKind::Int),
    attr("output_sequence", AttributeKind::Int),
];

static ATTRIBUTES_V7: [AttributeInfo; 7] = [
    attr("activation_alpha", AttributeKind::Floats),
    attr("activation_beta", AttributeKind::Floats),
    attr("activations", AttributeKind::Strings),
    attr("clip", AttributeKind::Float),
    attr("direction", AttributeKind::String),
    attr("hidden_size", AttributeKind::Int),
    attr("input_forget", AttributeKind::Int),
];

static ATTRIBUTES_V14: [AttributeInfo; 8] = [
    attr("activation_alpha", AttributeKind::Floats),
    attr("activation_beta", AttributeKind::Floats),
    attr("activations", AttributeKind::Strings),
    attr("clip", AttributeKind::Float),
    attr("direction", AttributeKind::String),
    attr("hidden_size", AttributeKind::Int),
    attr("input_forget", AttributeKind::Int),
    attr("layout", AttributeKind::Int),
];

pub static INFO_V1: OperatorInfo = OperatorInfo {
    name: OP_NAME,
    domain: DEFAULT_DOMAIN,
    version: VersionInfo::new(1, Some(7)),
    attributes: &ATTRIBUTES_V1,
    inputs: &INPUTS,
    outputs: &OUTPUTS,
};

pub static INFO_V7: OperatorInfo = OperatorInfo {
    name: OP_NAME,
    domain: DEFAULT_DOMAIN,
    version: VersionInfo::new(7, Some(14)),
    attributes: &ATTRIBUTES_V7,
    inputs: &INPUTS,
    outputs: &OUTPUTS,
};

pub static INFO_V14: OperatorInfo = OperatorInfo {
    name: OP_NAME,
    domain: DEFAULT_DOMAIN,
    version: VersionInfo::new(14, None),
    attributes: &ATTRIBUTES_V14,
    inputs: &INPUTS,
    outputs: &OUTPUTS,
};

fn build(attributes: &Attributes) -> Result<Box<dyn OperatorKernel>> {
    Ok(Box::new(LstmKernel::new(LstmConfig::from_attributes(
        attributes,
    )?)))
}

/// Every registered LSTM variant, oldest first.
pub static VARIANTS: [OperatorVariant; 3] = [
    OperatorVariant {
        info: &INFO_V1,
        factory: build,
    },
    OperatorVariant {
        info: &INFO_V7,
        factory: build,
    },
    OperatorVariant {
        info: &INFO_V14,
        factory: build,
    },
];

fn typed<U: Element>(inputs: &[Option<Tensor>], index: usize) -> Result<Option<&NdArray<U>>> {
    inputs
        .get(index)
        .and_then(Option::as_ref)
        .map(|t| t.as_array::<U>())
        .transpose()
}

fn required<'a, U: Element>(
    inputs: &'a [Option<Tensor>],
    index: usize,
    name: &str,
) -> Result<&'a NdArray<U>> {
    typed(inputs, index)?
        .ok_or_else(|| RuntimeError::input(OP_NAME, format!("missing input '{}'", name)))
}

/// LSTM over `f32` or `f64` inputs.
#[derive(Debug, Clone)]
pub struct LstmKernel {
    config: LstmConfig,
}

impl LstmKernel {
    pub fn new(config: LstmConfig) -> Self {
        LstmKernel { config }
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    fn run<T: FloatElement>(&self, inputs: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>> {
        let layer = LstmLayer::<T>::initialize(
            &self.config,
            LstmInputs {
                x: required(inputs, 0, "X")?,
                w: required(inputs, 1, "W")?,
                r: required(inputs, 2, "R")?,
                b: typed(inputs, 3)?,
                sequence_lens: typed(inputs, 4)?,
                initial_h: typed(inputs, 5)?,
                initial_c: typed(inputs, 6)?,
                p: typed(inputs, 7)?,
            },
        )?;
        let output = layer.run()?;

        Ok(vec![
            Some(Tensor::new(output.output)),
            Some(Tensor::new(output.hidden)),
            Some(Tensor::new(output.cell)),
        ])
    }
}

impl OperatorKernel for LstmKernel {
    fn compute(
        &self,
        _ctx: &ExecutionContext,
        inputs: &[Option<Tensor>],
    ) -> Result<Vec<Option<Tensor>>> {
        let dtype = inputs
            .first()
            .and_then(Option::as_ref)
            .map(Tensor::dtype)
            .ok_or_else(|| RuntimeError::input(OP_NAME, "missing input 'X'"))?;
        match dtype {
            DType::F32 => self.run::<f32>(inputs),
            DType::F64 => self.run::<f64>(inputs),
            other => Err(RuntimeError::input(
                OP_NAME,
                format!("unsupported dtype {}", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeValue;
    use approx::assert_relative_eq;

    fn input(values: Vec<f64>, dims: &[usize]) -> Option<Tensor> {
        Some(Tensor::new(NdArray::from_vec(values, dims).unwrap()))
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    fn compute(attrs: Attributes, inputs: &[Option<Tensor>]) -> Vec<Vec<f64>> {
        let kernel = LstmKernel::new(LstmConfig::from_attributes(&attrs).unwrap());
        kernel
            .compute(&ExecutionContext::new(), inputs)
            .unwrap()
            .into_iter()
            .map(|t| t.unwrap().as_array::<f64>().unwrap().to_vec())
            .collect()
    }

    fn dims(attrs: Attributes, inputs: &[Option<Tensor>]) -> Vec<Vec<usize>> {
        let kernel = LstmKernel::new(LstmConfig::from_attributes(&attrs).unwrap());
        kernel
            .compute(&ExecutionContext::new(), inputs)
            .unwrap()
            .into_iter()
            .map(|t| t.unwrap().shape().dims().to_vec())
            .collect()
    }

    #[test]
    fn test_single_step_closed_form() {
        let inputs = [
            input(vec![1.0], &[1, 1, 1]),
            input(vec![1.0; 4], &[1, 4, 1]),
            input(vec![0.0; 4], &[1, 4, 1]),
        ];
        let out = compute(Attributes::new(), &inputs);

        let c = sigmoid(1.0) * 1.0f64.tanh();
        let h = sigmoid(1.0) * c.tanh();
        assert_relative_eq!(out[0][0], h, epsilon = 1e-6);
        assert_relative_eq!(out[1][0], h, epsilon = 1e-6);
        assert_relative_eq!(out[2][0], c, epsilon = 1e-6);
    }

    #[test]
    fn test_final_hidden_as_input() {
        let x = NdArray::from_vec(vec![1.0, -1.0, 0.5, 2.0], [2, 2, 1]).unwrap();
        let w = NdArray::from_vec(vec![0.3, -0.2, 0.5, 0.1, 0.4, 0.1, -0.6, 0.2], [2, 4, 1]).unwrap();
        let r = NdArray::from_vec(vec![0.2, 0.4, -0.3, 0.6, 0.1, 0.0, 0.3, -0.2], [2, 4, 1]).unwrap();
        let inputs = LstmInputs {
            x: &x,
            w: &w,
            r: &r,
            b: None,
            sequence_lens: None,
            initial_h: None,
            initial_c: None,
            p: None,
        };
        let bidirectional =
            Attributes::new().with("direction", AttributeValue::String("bidirectional".into()));

        let config = LstmConfig::from_attributes(&bidirectional).unwrap();
        let out = LstmLayer::<f64>::initialize(&config, inputs).unwrap().run().unwrap();
        let first = out.hidden_as_input(0).unwrap();
        assert_eq!(first.dims(), &[2, 1]);
        assert!(first.shares_storage(&out.hidden));
        assert_eq!(out.hidden_as_input(1).unwrap().to_vec(), out.hidden.view(&[1]).unwrap().to_vec());
        assert!(out.hidden_as_input(2).is_err());

        // Batch-major Y_h is [B, D, H]; the input view stays [B, H].
        let config = LstmConfig::from_attributes(
            &bidirectional.with("layout", AttributeValue::Int(1)),
        )
        .unwrap();
        let out = LstmLayer::<f64>::initialize(&config, inputs).unwrap().run().unwrap();
        for d in 0..2 {
            let view = out.hidden_as_input(d).unwrap();
            assert_eq!(view.dims(), &[2, 1]);
            for b in 0..2 {
                assert_eq!(view.get(&[b, 0]).unwrap(), out.hidden.get(&[b, d, 0]).unwrap());
            }
        }
    }

    #[test]
    fn test_output_shapes() {
        let inputs = [
            input(vec![0.1; 3 * 2 * 5], &[3, 2, 5]),
            input(vec![0.1; 2 * 16 * 5], &[2, 16, 5]),
            input(vec![0.1; 2 * 16 * 4], &[2, 16, 4]),
        ];
        let attrs = Attributes::new()
            .with("direction", AttributeValue::String("bidirectional".into()))
            .with("hidden_size", AttributeValue::Int(4));
        let shapes = dims(attrs, &inputs);
        assert_eq!(shapes[0], vec![3, 2, 2, 4]);
        assert_eq!(shapes[1], vec![2, 2, 4]);
        assert_eq!(shapes[2], vec![2, 2, 4]);
    }

    #[test]
    fn test_reverse_matches_forward_on_reversed_input() {
        let w = vec![0.3, -0.2, 0.5, 0.1];
        let r = vec![0.2, 0.4, -0.3, 0.6];
        let b = vec![0.1, 0.0, -0.1, 0.2, 0.05, 0.0, 0.0, -0.05];
        let xs = vec![0.5, -1.0, 2.0];

        let twice = |v: &Vec<f64>| v.iter().chain(v.iter()).copied().collect::<Vec<_>>();
        let bidi = compute(
            Attributes::new().with("direction", AttributeValue::String("bidirectional".into())),
            &[
                input(xs.clone(), &[3, 1, 1]),
                input(twice(&w), &[2, 4, 1]),
                input(twice(&r), &[2, 4, 1]),
                input(twice(&b), &[2, 8]),
            ],
        );

        let reversed: Vec<f64> = xs.iter().rev().copied().collect();
        let forward = compute(
            Attributes::new(),
            &[
                input(reversed, &[3, 1, 1]),
                input(w.clone(), &[1, 4, 1]),
                input(r.clone(), &[1, 4, 1]),
                input(b.clone(), &[1, 8]),
            ],
        );

        // Y is [T, D, B, H]; direction 1 at t pairs with forward at T-1-t.
        for t in 0..3 {
            assert_relative_eq!(bidi[0][t * 2 + 1], forward[0][2 - t], epsilon = 1e-12);
        }
        assert_relative_eq!(bidi[1][1], forward[1][0], epsilon = 1e-12);
        assert_relative_eq!(bidi[2][1], forward[2][0], epsilon = 1e-12);
    }

    #[test]
    fn test_sequence_lens_stop_early() {
        let w = vec![0.3, -0.2, 0.5, 0.1];
        let r = vec![0.2, 0.4, -0.3, 0.6];
        let both = compute(
            Attributes::new(),
            &[
                input(vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0], &[3, 2, 1]),
                input(w.clone(), &[1, 4, 1]),
                input(r.clone(), &[1, 4, 1]),
                None,
                Some(Tensor::new(NdArray::from_vec(vec![3i32, 1], [2]).unwrap())),
            ],
        );
        let short = compute(
            Attributes::new(),
            &[
                input(vec![1.0], &[1, 1, 1]),
                input(w, &[1, 4, 1]),
                input(r, &[1, 4, 1]),
            ],
        );

        // Y [3, 1, 2, 1]: batch 1 only runs at t = 0.
        assert_relative_eq!(both[0][1], short[0][0], epsilon = 1e-12);
        assert_eq!(both[0][3], 0.0);
        assert_eq!(both[0][5], 0.0);
        assert_relative_eq!(both[1][1], short[1][0], epsilon = 1e-12);
        assert_relative_eq!(both[2][1], short[2][0], epsilon = 1e-12);
    }

    #[test]
    fn test_sequence_lens_out_of_range() {
        let kernel = LstmKernel::new(LstmConfig::from_attributes(&Attributes::new()).unwrap());
        let err = kernel
            .compute(
                &ExecutionContext::new(),
                &[
                    input(vec![1.0], &[1, 1, 1]),
                    input(vec![1.0; 4], &[1, 4, 1]),
                    input(vec![0.0; 4], &[1, 4, 1]),
                    None,
                    Some(Tensor::new(NdArray::from_vec(vec![2i32], [1]).unwrap())),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidOperatorInput { .. }));
    }

    #[test]
    fn test_batch_major_layout() {
        let w = vec![0.3, -0.2, 0.5, 0.1];
        let r = vec![0.2, 0.4, -0.3, 0.6];
        // [T=2, B=2, I=1] and its [B, T, I] transpose.
        let seq_major = compute(
            Attributes::new(),
            &[
                input(vec![1.0, -1.0, 0.5, 2.0], &[2, 2, 1]),
                input(w.clone(), &[1, 4, 1]),
                input(r.clone(), &[1, 4, 1]),
            ],
        );
        let batch_inputs = [
            input(vec![1.0, 0.5, -1.0, 2.0], &[2, 2, 1]),
            input(w, &[1, 4, 1]),
            input(r, &[1, 4, 1]),
        ];
        let attrs = || Attributes::new().with("layout", AttributeValue::Int(1));
        let batch_major = compute(attrs(), &batch_inputs);
        let shapes = dims(attrs(), &batch_inputs);

        assert_eq!(shapes[0], vec![2, 2, 1, 1]);
        assert_eq!(shapes[1], vec![2, 1, 1]);
        // Y[b, t] against Y[t, b].
        for t in 0..2 {
            for b in 0..2 {
                assert_relative_eq!(batch_major[0][b * 2 + t], seq_major[0][t * 2 + b]);
            }
        }
        assert_eq!(batch_major[1], seq_major[1]);
        assert_eq!(batch_major[2], seq_major[2]);
    }

    #[test]
    fn test_input_forget_couples_gates() {
        let attrs = Attributes::new().with("input_forget", AttributeValue::Int(1));
        let out = compute(
            attrs,
            &[
                input(vec![1.0], &[1, 1, 1]),
                input(vec![1.0; 4], &[1, 4, 1]),
                input(vec![0.0; 4], &[1, 4, 1]),
                None,
                None,
                None,
                input(vec![1.0], &[1, 1, 1]),
            ],
        );
        let i = sigmoid(1.0);
        let c = (1.0 - i) * 1.0 + i * 1.0f64.tanh();
        assert_relative_eq!(out[2][0], c, epsilon = 1e-12);
    }

    #[test]
    fn test_peephole_and_clip() {
        let attrs = Attributes::new().with("clip", AttributeValue::Float(0.5));
        let out = compute(
            attrs,
            &[
                input(vec![1.0], &[1, 1, 1]),
                input(vec![1.0; 4], &[1, 4, 1]),
                input(vec![0.0; 4], &[1, 4, 1]),
                None,
                None,
                None,
                input(vec![2.0], &[1, 1, 1]),
                input(vec![1.0, 1.0, 1.0], &[1, 3]),
            ],
        );
        // Every pre-activation exceeds 0.5 and is clipped to it.
        let gate = sigmoid(0.5);
        let c = gate * 2.0 + gate * 0.5f64.tanh();
        assert_relative_eq!(out[2][0], c, epsilon = 1e-12);
        assert_relative_eq!(out[1][0], gate * c.tanh(), epsilon = 1e-12);
    }

    #[test]
    fn test_f32_inputs() {
        let kernel = LstmKernel::new(LstmConfig::from_attributes(&Attributes::new()).unwrap());
        let f32_input = |values: Vec<f32>, dims: &[usize]| {
            Some(Tensor::new(NdArray::from_vec(values, dims).unwrap()))
        };
        let out = kernel
            .compute(
                &ExecutionContext::new(),
                &[
                    f32_input(vec![1.0], &[1, 1, 1]),
                    f32_input(vec![1.0; 4], &[1, 4, 1]),
                    f32_input(vec![0.0; 4], &[1, 4, 1]),
                ],
            )
            .unwrap();
        let y = out[0].as_ref().unwrap().as_array::<f32>().unwrap().to_vec();
        let c = sigmoid(1.0) * 1.0f64.tanh();
        assert_relative_eq!(y[0], (sigmoid(1.0) * c.tanh()) as f32, epsilon = 1e-6);
    }

    #[test]
    fn test_shape_errors() {
        let kernel = LstmKernel::new(
            LstmConfig::from_attributes(&Attributes::new().with("hidden_size", AttributeValue::Int(2)))
                .unwrap(),
        );
        let err = kernel
            .compute(
                &ExecutionContext::new(),
                &[
                    input(vec![1.0], &[1, 1, 1]),
                    input(vec![1.0; 4], &[1, 4, 1]),
                    input(vec![0.0; 4], &[1, 4, 1]),
                ],
            )
            .unwrap_err();
        assert!(err.is_shape_mismatch());

        let kernel = LstmKernel::new(LstmConfig::from_attributes(&Attributes::new()).unwrap());
        let err = kernel
            .compute(
                &ExecutionContext::new(),
                &[
                    input(vec![1.0], &[1, 1]),
                    input(vec![1.0; 4], &[1, 4, 1]),
                    input(vec![0.0; 4], &[1, 4, 1]),
                ],
            )
            .unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_variant_ranges() {
        assert!(INFO_V1.version.contains(6));
        assert!(!INFO_V1.version.contains(7));
        assert!(INFO_V7.version.contains(13));
        assert!(INFO_V14.version.contains(21));
        assert!(INFO_V7.attribute("layout").is_none());
        assert!(INFO_V1.attribute("output_sequence").is_some());
    }
}
