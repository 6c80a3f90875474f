use crate::attribute::Attributes;
use crate::error::{Result, RuntimeError};

use super::activation::{Activation, ActivationParams};
use super::OP_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
    Bidirectional,
}

impl Direction {
    pub fn num_directions(&self) -> usize {
        match self {
            Direction::Bidirectional => 2,
            Direction::Forward | Direction::Reverse => 1,
        }
    }

    /// Whether direction slot `d` walks the sequence backwards.
    pub fn is_reversed(&self, d: usize) -> bool {
        match self {
            Direction::Forward => false,
            Direction::Reverse => true,
            Direction::Bidirectional => d == 1,
        }
    }
}

/// Memory layout of X, Y and the state tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `X [T, B, I]`, states `[D, B, H]`.
    SequenceMajor,
    /// `X [B, T, I]`, states `[B, D, H]`.
    BatchMajor,
}

/// The `(f, g, h)` activations of one direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationSet {
    /// Input, output and forget gates.
    pub f: Activation,
    /// Cell gate.
    pub g: Activation,
    /// Hidden output.
    pub h: Activation,
}

impl Default for ActivationSet {
    fn default() -> Self {
        ActivationSet {
            f: Activation::Sigmoid,
            g: Activation::Tanh,
            h: Activation::Tanh,
        }
    }
}

/// LSTM configuration parsed from node attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmConfig {
    pub hidden_size: Option<usize>,
    pub direction: Direction,
    /// One set per direction.
    pub activations: Vec<ActivationSet>,
    pub clip: Option<f32>,
    pub input_forget: bool,
    pub layout: Layout,
}

fn invalid(attribute: &str, reason: impl Into<String>) -> RuntimeError {
    RuntimeError::InvalidAttribute {
        op: OP_NAME.to_string(),
        attribute: attribute.to_string(),
        reason: reason.into(),
    }
}

impl LstmConfig {
    /// Reads `hidden_size`, `direction`, `activations`, `activation_alpha`,
    /// `activation_beta`, `clip`, `input_forget` and `layout`. Absent
    /// attributes take their ONNX defaults.
    pub fn from_attributes(attrs: &Attributes) -> Result<LstmConfig> {
        let get_err = |e: crate::attribute::AttributeError| e.into_runtime(OP_NAME);

        let hidden_size = match attrs.get_int("hidden_size").map_err(get_err)? {
            Some(h) if h > 0 => Some(h as usize),
            Some(h) => return Err(invalid("hidden_size", format!("must be positive, got {}", h))),
            None => None,
        };

        let direction = match attrs.get_string("direction").map_err(get_err)? {
            None | Some("forward") => Direction::Forward,
            Some("reverse") => Direction::Reverse,
            Some("bidirectional") => Direction::Bidirectional,
            Some(other) => return Err(invalid("direction", format!("unknown direction '{}'", other))),
        };
        let num_directions = direction.num_directions();

        let alphas = attrs.get_floats("activation_alpha").map_err(get_err)?.unwrap_or(&[]);
        let betas = attrs.get_floats("activation_beta").map_err(get_err)?.unwrap_or(&[]);
        let activations = match attrs.get_strings("activations").map_err(get_err)? {
            None => vec![ActivationSet::default(); num_directions],
            Some(names) => {
                if names.len() != 3 * num_directions {
                    return Err(invalid(
                        "activations",
                        format!("expected {} names, got {}", 3 * num_directions, names.len()),
                    ));
                }
                let mut params = ActivationParams::new(alphas, betas);
                let mut parsed = Vec::with_capacity(names.len());
                for name in names {
                    let activation = Activation::parse(name, &mut params).ok_or_else(|| {
                        invalid("activations", format!("unknown activation '{}'", name))
                    })?;
                    parsed.push(activation);
                }
                parsed
                    .chunks(3)
                    .map(|c| ActivationSet {
                        f: c[0],
                        g: c[1],
                        h: c[2],
                    })
                    .collect()
            }
        };

        let clip = match attrs.get_float("clip").map_err(get_err)? {
            Some(c) if c > 0.0 => Some(c),
            Some(c) => return Err(invalid("clip", format!("must be positive, got {}", c))),
            None => None,
        };

        let input_forget = attrs.get_int("input_forget").map_err(get_err)?.unwrap_or(0) != 0;

        let layout = match attrs.get_int("layout").map_err(get_err)?.unwrap_or(0) {
            0 => Layout::SequenceMajor,
            1 => Layout::BatchMajor,
            other => return Err(invalid("layout", format!("expected 0 or 1, got {}", other))),
        };

        Ok(LstmConfig {
            hidden_size,
            direction,
            activations,
            clip,
            input_forget,
            layout,
        })
    }
}
