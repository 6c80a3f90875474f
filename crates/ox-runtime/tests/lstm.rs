//! End-to-end LSTM tests: wire payloads are decoded, the operator is
//! resolved through the default registry and applied under a context.

use approx::assert_relative_eq;
use ox_runtime::{
    decode, AttributeValue, Attributes, ExecutionConfig, ExecutionContext, OperatorRegistry,
    OperatorRequest, RuntimeError, Tensor, TensorProto,
};
use ox_tensor::{NdArray, WireType};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn float_proto(name: &str, dims: &[i64], values: Vec<f32>) -> TensorProto {
    TensorProto {
        name: Some(name.to_string()),
        dims: dims.to_vec(),
        data_type: WireType::Float.code(),
        float_data: values,
        ..TensorProto::default()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `X = [1]`, every gate weight 1, no recurrence.
fn unit_inputs() -> Vec<Option<Tensor>> {
    [
        float_proto("X", &[1, 1, 1], vec![1.0]),
        float_proto("W", &[1, 4, 1], vec![1.0; 4]),
        float_proto("R", &[1, 4, 1], vec![0.0; 4]),
    ]
    .iter()
    .map(|proto| Some(decode(proto).unwrap()))
    .collect()
}

fn values(tensor: &Option<Tensor>) -> Vec<f32> {
    tensor
        .as_ref()
        .unwrap()
        .as_array::<f32>()
        .unwrap()
        .to_vec()
}

#[test]
fn resolve_and_apply_latest() {
    init_tracing();
    let registry = OperatorRegistry::with_defaults();
    let op = registry
        .resolve(
            OperatorRequest::new("LSTM")
                .node("lstm_0")
                .inputs(["X", "W", "R"])
                .outputs(["Y", "Y_h", "Y_c"]),
        )
        .unwrap();
    assert_eq!(op.info().version.since_version, 14);

    let ctx = ExecutionContext::new();
    let outputs = op.apply(&ctx, &unit_inputs()).unwrap();
    assert_eq!(outputs.len(), 3);

    let c = sigmoid(1.0) * 1.0f64.tanh();
    let h = sigmoid(1.0) * c.tanh();
    assert_relative_eq!(values(&outputs[0])[0] as f64, h, epsilon = 1e-6);
    assert_relative_eq!(values(&outputs[2])[0] as f64, c, epsilon = 1e-6);
    assert_eq!(outputs[1].as_ref().unwrap().name.as_deref(), Some("Y_h"));
    assert_eq!(outputs[0].as_ref().unwrap().shape().dims(), &[1, 1, 1, 1]);
}

#[test]
fn version_one_skips_unnamed_output() {
    init_tracing();
    let registry = OperatorRegistry::with_defaults();
    let op = registry
        .resolve(
            OperatorRequest::new("LSTM")
                .version(6)
                .attributes(
                    Attributes::new().with("output_sequence", AttributeValue::Int(0)),
                )
                .outputs(["", "Y_h", "Y_c"]),
        )
        .unwrap();
    assert_eq!(op.info().version.since_version, 1);

    let outputs = op.apply(&ExecutionContext::new(), &unit_inputs()).unwrap();
    assert!(outputs[0].is_none());
    assert!(outputs[1].is_some());
    assert_eq!(outputs[2].as_ref().unwrap().name.as_deref(), Some("Y_c"));
}

#[test]
fn layout_ignored_before_version_fourteen() {
    init_tracing();
    let registry = OperatorRegistry::with_defaults();
    let op = registry
        .resolve(
            OperatorRequest::new("LSTM")
                .version(7)
                .attributes(Attributes::new().with("layout", AttributeValue::Int(1))),
        )
        .unwrap();

    // A [T=2, B=1, I=1] input is only valid sequence-major.
    let x = Tensor::new(NdArray::from_vec(vec![1.0f32, 0.5], [2, 1, 1]).unwrap());
    let mut inputs = unit_inputs();
    inputs[0] = Some(x);
    let outputs = op.apply(&ExecutionContext::new(), &inputs).unwrap();
    assert_eq!(outputs[0].as_ref().unwrap().shape().dims(), &[2, 1, 1, 1]);
}

#[test]
fn integer_input_rejected_before_compute() {
    let registry = OperatorRegistry::with_defaults();
    let op = registry.resolve(OperatorRequest::new("LSTM")).unwrap();
    let ctx = ExecutionContext::with_profiling();

    let mut inputs = unit_inputs();
    inputs[0] = Some(Tensor::new(NdArray::from_vec(vec![1i32], [1, 1, 1]).unwrap()));
    let err = op.apply(&ctx, &inputs).unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidOperatorInput { .. }));
    assert!(ctx.profile_records().is_empty());
}

#[test]
fn unsupported_version_and_cancellation() {
    let registry = OperatorRegistry::with_defaults();
    assert!(matches!(
        registry.resolve(OperatorRequest::new("LSTM").version(0)),
        Err(RuntimeError::UnsupportedVersion { version: 0, .. })
    ));
    assert_eq!(registry.versions("", "LSTM").len(), 3);

    let op = registry.resolve(OperatorRequest::new("LSTM")).unwrap();
    let ctx = ExecutionContext::new();
    ctx.cancellation().cancel();
    assert!(matches!(
        op.apply(&ctx, &unit_inputs()),
        Err(RuntimeError::Cancelled)
    ));
}

#[test]
fn profiling_records_each_application() {
    let registry = OperatorRegistry::with_defaults();
    let op = registry
        .resolve(OperatorRequest::new("LSTM").node("encoder"))
        .unwrap();
    let ctx = ExecutionContext::with_config(ExecutionConfig { profile: true });

    op.apply(&ctx, &unit_inputs()).unwrap();
    op.apply(&ctx, &unit_inputs()).unwrap();

    let records = ctx.profile_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].operator, "LSTM");
    assert_eq!(records[0].node.as_deref(), Some("encoder"));
}

#[test]
fn mixed_float_widths_rejected_before_compute() {
    let registry = OperatorRegistry::with_defaults();
    let op = registry.resolve(OperatorRequest::new("LSTM")).unwrap();
    let ctx = ExecutionContext::with_profiling();

    let mut inputs = unit_inputs();
    inputs[1] = Some(Tensor::new(
        NdArray::from_vec(vec![1.0f64; 4], [1, 4, 1]).unwrap(),
    ));
    let err = op.apply(&ctx, &inputs).unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidOperatorInput { .. }));
    assert!(ctx.profile_records().is_empty());
}
