//! Gate and state buffers of one LSTM invocation.
//!
//! Buffers are allocated once in [`super::layer::LstmLayer::initialize`]
//! and updated in place for every timestep. Weight, bias and peephole
//! slices are zero-copy views into the operator inputs.

use ox_tensor::{dot_transposed, FloatElement, MutNdArray, NdArray};

use crate::error::Result;

use super::activation::Activation;

/// One of the four LSTM gates, with a `[B, H]` activation buffer.
#[derive(Debug)]
pub struct Gate<T: FloatElement> {
    /// `[H, I]`
    weights: NdArray<T>,
    /// `[H, H]`
    recurrent: NdArray<T>,
    /// Primary plus recurrent bias, `[H]`.
    bias: Option<NdArray<T>>,
    /// `[H]`
    peephole: Option<NdArray<T>>,
    data: MutNdArray<T>,
}

impl<T: FloatElement> Gate<T> {
    fn new(
        weights: NdArray<T>,
        recurrent: NdArray<T>,
        bias: Option<NdArray<T>>,
        peephole: Option<NdArray<T>>,
        batch_size: usize,
        hidden_size: usize,
    ) -> Self {
        Gate {
            weights,
            recurrent,
            bias,
            peephole,
            data: MutNdArray::zeros([batch_size, hidden_size]),
        }
    }

    /// `act(x·Wᵀ + h·Rᵀ + bias [+ P ⊙ c])` for batch element `batch`,
    /// clamped to `[-clip, clip]` before activation when `clip` is set.
    pub fn compute(
        &mut self,
        x: &NdArray<T>,
        hidden: &NdArray<T>,
        cell: &NdArray<T>,
        activation: Activation,
        clip: Option<T>,
        batch: usize,
    ) -> Result<()> {
        let mut local = self.data.view_mut(&[batch])?;
        local.clean();

        dot_transposed(x, &self.weights, &mut local)?;
        dot_transposed(hidden, &self.recurrent, &mut local)?;
        if let Some(bias) = &self.bias {
            local.add_assign(bias)?;
        }
        if let Some(peephole) = &self.peephole {
            local.add_product_assign(peephole, cell)?;
        }
        if let Some(limit) = clip {
            local.map_in_place(|v| v.max(limit.neg()).min(limit));
        }
        local.map_in_place(|v| activation.apply(v));
        Ok(())
    }

    /// Replaces batch row `batch` with `1 - other[batch]`.
    pub fn complement_of(&mut self, other: &Gate<T>, batch: usize) -> Result<()> {
        let mut local = self.data.view_mut(&[batch])?;
        local.copy_from(0, &other.vector(batch)?)?;
        local.map_in_place(|v| T::ONE.sub(v));
        Ok(())
    }

    /// Activation row of batch element `batch`, `[H]`.
    pub fn vector(&self, batch: usize) -> Result<NdArray<T>> {
        Ok(self.data.view(&[batch])?)
    }
}

/// The input, output, forget and cell gates of one direction.
#[derive(Debug)]
pub struct Gates<T: FloatElement> {
    pub input: Gate<T>,
    pub output: Gate<T>,
    pub forget: Gate<T>,
    pub cell: Gate<T>,
}

impl<T: FloatElement> Gates<T> {
    /// Slices per-direction parameters into gates.
    ///
    /// `weights` is `[4, H, I]`, `recurrent` `[4, H, H]`, `bias` `[8, H]`
    /// and `peephole` `[3, H]`, all in gate order input, output, forget,
    /// cell. Gate `k` gets bias `bias[k] + bias[k + 4]`, summed here once.
    /// The cell gate has no peephole.
    pub fn create(
        weights: &NdArray<T>,
        recurrent: &NdArray<T>,
        bias: Option<&NdArray<T>>,
        peephole: Option<&NdArray<T>>,
        batch_size: usize,
        hidden_size: usize,
    ) -> Result<Self> {
        let gate = |k: usize| -> Result<Gate<T>> {
            let bias = match bias {
                Some(b) => Some(b.view(&[k])?.add(&b.view(&[k + 4])?)?.into_frozen()),
                None => None,
            };
            let peephole = match peephole {
                Some(p) if k < 3 => Some(p.view(&[k])?),
                _ => None,
            };
            Ok(Gate::new(
                weights.view(&[k])?,
                recurrent.view(&[k])?,
                bias,
                peephole,
                batch_size,
                hidden_size,
            ))
        };
        Ok(Gates {
            input: gate(0)?,
            output: gate(1)?,
            forget: gate(2)?,
            cell: gate(3)?,
        })
    }
}

/// Cell state `c`, `[D, B, H]`.
#[derive(Debug)]
pub struct CellState<T: FloatElement> {
    data: MutNdArray<T>,
    scratch: MutNdArray<T>,
}

impl<T: FloatElement> CellState<T> {
    /// Takes ownership of `initial`, already shaped `[D, B, H]`.
    pub fn new(initial: MutNdArray<T>) -> Self {
        let scratch = MutNdArray::zeros(initial.shape().clone());
        CellState {
            data: initial,
            scratch,
        }
    }

    /// `c = f ⊙ c + i ⊙ g` for direction `d`, batch element `batch`.
    pub fn compute(&mut self, gates: &Gates<T>, d: usize, batch: usize) -> Result<()> {
        let mut state = self.data.view_mut(&[d, batch])?;
        state.mul_assign(&gates.forget.vector(batch)?)?;

        let mut product = self.scratch.view_mut(&[d, batch])?;
        product.copy_from(0, &gates.input.vector(batch)?)?;
        product.mul_assign(&gates.cell.vector(batch)?)?;
        state.add_assign(&product)?;
        Ok(())
    }

    pub fn vector(&self, d: usize, batch: usize) -> Result<NdArray<T>> {
        Ok(self.data.view(&[d, batch])?)
    }

    pub fn data(&self) -> NdArray<T> {
        self.data.as_view()
    }
}

/// Hidden state `h`, `[D, B, H]`.
#[derive(Debug)]
pub struct HiddenState<T: FloatElement> {
    data: MutNdArray<T>,
    /// Output activation `h` of each direction.
    activations: Vec<Activation>,
}

impl<T: FloatElement> HiddenState<T> {
    pub fn new(initial: MutNdArray<T>, activations: Vec<Activation>) -> Self {
        HiddenState {
            data: initial,
            activations,
        }
    }

    /// `h = o ⊙ act(c)` for direction `d`, batch element `batch`.
    pub fn compute(
        &mut self,
        gates: &Gates<T>,
        cell: &CellState<T>,
        d: usize,
        batch: usize,
    ) -> Result<()> {
        let activation = self.activations[d];
        let mut state = self.data.view_mut(&[d, batch])?;
        state.copy_from(0, &cell.vector(d, batch)?)?;
        state.map_in_place(|v| activation.apply(v));
        state.mul_assign(&gates.output.vector(batch)?)?;
        Ok(())
    }

    pub fn vector(&self, d: usize, batch: usize) -> Result<NdArray<T>> {
        Ok(self.data.view(&[d, batch])?)
    }

    /// `[B, H]` view of direction `d`, usable directly as the input of a
    /// following layer.
    pub fn as_input(&self, d: usize) -> Result<NdArray<T>> {
        Ok(self.data.view(&[d])?)
    }

    pub fn data(&self) -> NdArray<T> {
        self.data.as_view()
    }
}

/// Recurrent state carried between timesteps.
#[derive(Debug)]
pub struct LayerState<T: FloatElement> {
    pub cell: CellState<T>,
    pub hidden: HiddenState<T>,
}

/// Result of a completed layer run.
#[derive(Debug, Clone)]
pub struct LayerOutput<T: FloatElement> {
    /// `Y`, `[T, D, B, H]` (or `[B, T, D, H]` batch-major).
    pub output: NdArray<T>,
    /// `Y_h`, `[D, B, H]` (or `[B, D, H]` batch-major).
    pub hidden: NdArray<T>,
    /// `Y_c`, same shape as `hidden`.
    pub cell: NdArray<T>,
    /// Final hidden state buffer, `[D, B, H]` in either layout.
    pub(crate) hidden_state: NdArray<T>,
}

impl<T: FloatElement> LayerOutput<T> {
    /// `[B, H]` view of direction `d`'s final hidden state, shaped as the
    /// input of a following layer. Shares storage with the state buffer.
    pub fn hidden_as_input(&self, d: usize) -> Result<NdArray<T>> {
        Ok(self.hidden_state.view(&[d])?)
    }
}
