//! Versioned operator dispatch.

pub mod kernel;
pub mod registry;
pub mod schema;

pub use kernel::{Operator, OperatorKernel};
pub use registry::{KernelFactory, OperatorRegistry, OperatorRequest, OperatorVariant};
pub use schema::{AttributeInfo, IoInfo, OperatorInfo, VersionInfo, DEFAULT_DOMAIN};
