use ox_tensor::{Element, FloatElement, MutNdArray, NdArray};

use crate::error::{Result, RuntimeError};

use super::activation::Activation;
use super::config::{Direction, Layout, LstmConfig};
use super::state::{CellState, Gates, HiddenState, LayerOutput, LayerState};
use super::OP_NAME;

/// Typed operator inputs, borrowed for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct LstmInputs<'a, T: FloatElement> {
    pub x: &'a NdArray<T>,
    pub w: &'a NdArray<T>,
    pub r: &'a NdArray<T>,
    pub b: Option<&'a NdArray<T>>,
    pub sequence_lens: Option<&'a NdArray<i32>>,
    pub initial_h: Option<&'a NdArray<T>>,
    pub initial_c: Option<&'a NdArray<T>>,
    pub p: Option<&'a NdArray<T>>,
}

/// One LSTM invocation: validated inputs, per-direction gates and the
/// buffers they update.
#[derive(Debug)]
pub struct LstmLayer<T: FloatElement> {
    x: NdArray<T>,
    layout: Layout,
    direction: Direction,
    seq_length: usize,
    batch_size: usize,
    hidden_size: usize,
    sequence_lens: Vec<usize>,
    clip: Option<T>,
    input_forget: bool,
    /// `(f, g)` per direction.
    gate_activations: Vec<(Activation, Activation)>,
    gates: Vec<Gates<T>>,
    state: LayerState<T>,
    /// `[T, D, B, H]` regardless of layout.
    output: MutNdArray<T>,
}

fn dims_error(what: &str, expected: &[usize], got: &[usize]) -> RuntimeError {
    RuntimeError::shape(OP_NAME, format!("{} expected {:?}, got {:?}", what, expected, got))
}

fn expect_dims<T: Element>(what: &str, array: &NdArray<T>, expected: &[usize]) -> Result<()> {
    if array.dims() != expected {
        return Err(dims_error(what, expected, array.dims()));
    }
    Ok(())
}

/// Copies `[A, B, H]` into a fresh `[B, A, H]` array.
fn swap_leading<T: FloatElement>(src: &NdArray<T>) -> Result<MutNdArray<T>> {
    let (a, b, h) = match *src.dims() {
        [a, b, h] => (a, b, h),
        _ => return Err(dims_error("state", &[0, 0, 0], src.dims())),
    };
    let out = MutNdArray::zeros([b, a, h]);
    for i in 0..a {
        for j in 0..b {
            out.view_mut(&[j, i])?.copy_from(0, &src.view(&[i, j])?)?;
        }
    }
    Ok(out)
}

impl<T: FloatElement> LstmLayer<T> {
    /// Validates shapes, slices parameters into gates and allocates every
    /// buffer the run needs.
    pub fn initialize(config: &LstmConfig, inputs: LstmInputs<'_, T>) -> Result<Self> {
        let num_directions = config.direction.num_directions();

        let (seq_length, batch_size, input_size) = match (inputs.x.dims(), config.layout) {
            (&[t, b, i], Layout::SequenceMajor) => (t, b, i),
            (&[b, t, i], Layout::BatchMajor) => (t, b, i),
            _ => return Err(dims_error("X", &[0, 0, 0], inputs.x.dims())),
        };

        let hidden_size = match *inputs.r.dims() {
            [d, four_h, h] if d == num_directions && four_h == 4 * h => h,
            _ => {
                return Err(RuntimeError::shape(
                    OP_NAME,
                    format!(
                        "R expected [{}, 4*H, H], got {:?}",
                        num_directions,
                        inputs.r.dims()
                    ),
                ))
            }
        };
        if let Some(h) = config.hidden_size {
            if h != hidden_size {
                return Err(RuntimeError::shape(
                    OP_NAME,
                    format!("hidden_size is {} but R implies {}", h, hidden_size),
                ));
            }
        }
        let (d, h) = (num_directions, hidden_size);
        expect_dims("W", inputs.w, &[d, 4 * h, input_size])?;

        let weights = inputs.w.reshape([d, 4, h, input_size])?;
        let recurrent = inputs.r.reshape([d, 4, h, h])?;
        let bias = match inputs.b {
            Some(b) => {
                expect_dims("B", b, &[d, 8 * h])?;
                Some(b.reshape([d, 8, h])?)
            }
            None => None,
        };
        let peephole = match inputs.p {
            Some(p) => {
                expect_dims("P", p, &[d, 3 * h])?;
                Some(p.reshape([d, 3, h])?)
            }
            None => None,
        };

        let sequence_lens = match inputs.sequence_lens {
            Some(lens) => {
                expect_dims("sequence_lens", lens, &[batch_size])?;
                lens.to_vec()
                    .into_iter()
                    .map(|len| match usize::try_from(len) {
                        Ok(len) if len <= seq_length => Ok(len),
                        _ => Err(RuntimeError::input(
                            OP_NAME,
                            format!("sequence length {} outside 0..={}", len, seq_length),
                        )),
                    })
                    .collect::<Result<Vec<usize>>>()?
            }
            None => vec![seq_length; batch_size],
        };

        let state_dims = match config.layout {
            Layout::SequenceMajor => [d, batch_size, h],
            Layout::BatchMajor => [batch_size, d, h],
        };
        let initial = |given: Option<&NdArray<T>>, what: &str| -> Result<MutNdArray<T>> {
            match given {
                None => Ok(MutNdArray::zeros([d, batch_size, h])),
                Some(s) => {
                    expect_dims(what, s, &state_dims)?;
                    match config.layout {
                        Layout::SequenceMajor => Ok(s.to_mutable()),
                        Layout::BatchMajor => swap_leading(s),
                    }
                }
            }
        };
        let state = LayerState {
            cell: CellState::new(initial(inputs.initial_c, "initial_c")?),
            hidden: HiddenState::new(
                initial(inputs.initial_h, "initial_h")?,
                config.activations.iter().map(|set| set.h).collect(),
            ),
        };

        let mut gates = Vec::with_capacity(d);
        for dir in 0..d {
            let bias = bias.as_ref().map(|b| b.view(&[dir])).transpose()?;
            let peephole = peephole.as_ref().map(|p| p.view(&[dir])).transpose()?;
            gates.push(Gates::create(
                &weights.view(&[dir])?,
                &recurrent.view(&[dir])?,
                bias.as_ref(),
                peephole.as_ref(),
                batch_size,
                h,
            )?);
        }

        tracing::debug!(
            seq_length,
            batch_size,
            input_size,
            hidden_size = h,
            directions = d,
            layout = ?config.layout,
            "initialized LSTM layer"
        );

        Ok(LstmLayer {
            x: inputs.x.clone(),
            layout: config.layout,
            direction: config.direction,
            seq_length,
            batch_size,
            hidden_size: h,
            sequence_lens,
            clip: config.clip.map(|c| T::from_f64(c as f64)),
            input_forget: config.input_forget,
            gate_activations: config.activations.iter().map(|set| (set.f, set.g)).collect(),
            gates,
            state,
            output: MutNdArray::zeros([seq_length, d, batch_size, h]),
        })
    }

    /// `[I]` input row for timestep `t`, batch element `batch`.
    fn input_row(&self, t: usize, batch: usize) -> Result<NdArray<T>> {
        let row = match self.layout {
            Layout::SequenceMajor => self.x.view(&[t, batch])?,
            Layout::BatchMajor => self.x.view(&[batch, t])?,
        };
        Ok(row)
    }

    /// Advances direction `d` by one step. Step `s` maps to timestep `s`
    /// going forward and to `L - 1 - s` going backward, where `L` is the
    /// batch element's sequence length.
    pub fn step(&mut self, d: usize, s: usize) -> Result<()> {
        let reversed = self.direction.is_reversed(d);
        let (f, g) = self.gate_activations[d];
        for batch in 0..self.batch_size {
            let len = self.sequence_lens[batch];
            if s >= len {
                continue;
            }
            let t = if reversed { len - 1 - s } else { s };
            tracing::trace!(direction = d, step = s, timestep = t, batch, "LSTM step");

            let x = self.input_row(t, batch)?;
            let h_prev = self.state.hidden.vector(d, batch)?;
            let c_prev = self.state.cell.vector(d, batch)?;
            let gates = &mut self.gates[d];

            gates.input.compute(&x, &h_prev, &c_prev, f, self.clip, batch)?;
            gates.output.compute(&x, &h_prev, &c_prev, f, self.clip, batch)?;
            if self.input_forget {
                let Gates { input, forget, .. } = &mut *gates;
                forget.complement_of(input, batch)?;
            } else {
                gates.forget.compute(&x, &h_prev, &c_prev, f, self.clip, batch)?;
            }
            gates.cell.compute(&x, &h_prev, &c_prev, g, self.clip, batch)?;

            self.state.cell.compute(gates, d, batch)?;
            self.state.hidden.compute(gates, &self.state.cell, d, batch)?;

            self.output
                .view_mut(&[t, d, batch])?
                .copy_from(0, &self.state.hidden.vector(d, batch)?)?;
        }
        Ok(())
    }

    /// Runs every direction over the whole sequence.
    pub fn run(mut self) -> Result<LayerOutput<T>> {
        for s in 0..self.seq_length {
            for d in 0..self.direction.num_directions() {
                self.step(d, s)?;
            }
        }
        self.finish()
    }

    /// Packages `Y`, `Y_h` and `Y_c` in the configured layout.
    pub fn finish(self) -> Result<LayerOutput<T>> {
        let hidden = self.state.hidden.data();
        let cell = self.state.cell.data();
        match self.layout {
            Layout::SequenceMajor => Ok(LayerOutput {
                output: self.output.into_frozen(),
                hidden: hidden.clone(),
                cell,
                hidden_state: hidden,
            }),
            Layout::BatchMajor => {
                let d = self.direction.num_directions();
                let output = MutNdArray::zeros([self.batch_size, self.seq_length, d, self.hidden_size]);
                for t in 0..self.seq_length {
                    for dir in 0..d {
                        for b in 0..self.batch_size {
                            output
                                .view_mut(&[b, t, dir])?
                                .copy_from(0, &self.output.view(&[t, dir, b])?)?;
                        }
                    }
                }
                Ok(LayerOutput {
                    output: output.into_frozen(),
                    hidden: swap_leading(&hidden)?.into_frozen(),
                    cell: swap_leading(&cell)?.into_frozen(),
                    hidden_state: hidden,
                })
            }
        }
    }
}
