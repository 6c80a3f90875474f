use std::fmt;
use std::time::Instant;

use ox_tensor::DType;

use crate::context::ExecutionContext;
use crate::data::Tensor;
use crate::error::{Result, RuntimeError};
use crate::operator::schema::OperatorInfo;

/// Computation behind one operator variant.
///
/// Kernels are built once per node from its attributes and keep no state
/// between calls.
pub trait OperatorKernel: Send + Sync + fmt::Debug {
    /// Inputs have already been checked against the schema.
    fn compute(
        &self,
        ctx: &ExecutionContext,
        inputs: &[Option<Tensor>],
    ) -> Result<Vec<Option<Tensor>>>;
}

/// A resolved, validated operator ready to apply.
#[derive(Debug)]
pub struct Operator {
    info: &'static OperatorInfo,
    node: Option<String>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    kernel: Box<dyn OperatorKernel>,
}

impl Operator {
    pub(crate) fn new(
        info: &'static OperatorInfo,
        node: Option<String>,
        inputs: Vec<String>,
        outputs: Vec<String>,
        kernel: Box<dyn OperatorKernel>,
    ) -> Self {
        Operator {
            info,
            node,
            inputs,
            outputs,
            kernel,
        }
    }

    pub fn info(&self) -> &'static OperatorInfo {
        self.info
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// Input names as declared by the node.
    pub fn input_names(&self) -> &[String] {
        &self.inputs
    }

    pub fn output_names(&self) -> &[String] {
        &self.outputs
    }

    /// Checks arity, presence of required inputs, input dtypes and that
    /// inputs sharing a type constraint agree.
    fn validate(&self, inputs: &[Option<Tensor>]) -> Result<()> {
        let op = self.info.name;
        if inputs.len() > self.info.inputs.len() {
            return Err(RuntimeError::input(
                op,
                format!(
                    "expected at most {} inputs, got {}",
                    self.info.inputs.len(),
                    inputs.len()
                ),
            ));
        }
        for io in self.info.inputs {
            match inputs.get(io.index).and_then(Option::as_ref) {
                None if !io.optional => {
                    return Err(RuntimeError::input(
                        op,
                        format!("missing required input '{}'", io.name),
                    ));
                }
                Some(tensor) if !io.accepts(tensor.dtype()) => {
                    return Err(RuntimeError::input(
                        op,
                        format!("input '{}' has unsupported dtype {}", io.name, tensor.dtype()),
                    ));
                }
                _ => {}
            }
        }

        let mut bound: Vec<(&str, &str, DType)> = Vec::new();
        for io in self.info.inputs {
            let (Some(tag), Some(tensor)) =
                (io.constraint, inputs.get(io.index).and_then(Option::as_ref))
            else {
                continue;
            };
            match bound.iter().find(|(t, _, _)| *t == tag) {
                Some(&(_, first, dtype)) if dtype != tensor.dtype() => {
                    return Err(RuntimeError::input(
                        op,
                        format!(
                            "input '{}' is {} but '{}' is {}; both are bound to {}",
                            io.name,
                            tensor.dtype(),
                            first,
                            dtype,
                            tag
                        ),
                    ));
                }
                Some(_) => {}
                None => bound.push((tag, io.name, tensor.dtype())),
            }
        }
        Ok(())
    }

    /// Validates `inputs`, computes and names the outputs.
    ///
    /// Nothing is computed when validation fails or the context is
    /// cancelled.
    pub fn apply(
        &self,
        ctx: &ExecutionContext,
        inputs: &[Option<Tensor>],
    ) -> Result<Vec<Option<Tensor>>> {
        let span = tracing::debug_span!("apply", op = self.info.name, node = ?self.node);
        let _enter = span.enter();

        self.validate(inputs)?;
        ctx.ensure_active()?;

        let start = Instant::now();
        let outputs = self.kernel.compute(ctx, inputs)?;
        ctx.record(self.info.name, self.node.as_deref(), start.elapsed());

        if self.outputs.is_empty() {
            return Ok(outputs);
        }
        let named = outputs
            .into_iter()
            .enumerate()
            .map(|(i, tensor)| match (tensor, self.outputs.get(i)) {
                (Some(mut tensor), Some(name)) if !name.is_empty() => {
                    tensor.name = Some(name.clone());
                    Some(tensor)
                }
                _ => None,
            })
            .collect();
        Ok(named)
    }
}
