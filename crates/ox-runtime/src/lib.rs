//! `ox-runtime` - operator execution on top of `ox-tensor`.
//!
//! - `Attributes`, typed node attributes with kind-checked getters
//! - `OperatorRegistry`, version-aware operator resolution
//! - `ExecutionContext`, cancellation and per-operator profiling
//! - `operators::lstm`, the LSTM operator family (versions 1, 7 and 14)
//! - `wire`, decoding of serialized tensor messages

pub mod attribute;
pub mod context;
pub mod data;
pub mod error;
pub mod operator;
pub mod operators;
pub mod wire;

pub use attribute::{AttributeKind, AttributeValue, Attributes};
pub use context::{CancellationToken, ExecutionConfig, ExecutionContext, ProfileRecord};
pub use data::{StringArray, Tensor, TensorData};
pub use error::{Result, RuntimeError};
pub use operator::{Operator, OperatorKernel, OperatorRegistry, OperatorRequest};
pub use wire::{decode, encode, TensorProto};
