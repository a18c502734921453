//! Minimal ONNX classifier for exercising ONNX Runtime in tests
//!
//! `input (1,1,28,28) -> Flatten -> MatMul(784x10) -> logits (1,10)`
//!
//! Every row of the weight matrix is `(k - 4.5) / 784` for column `k`, so
//! logit `k` is `mean(pixels) * (k - 4.5)`: dark images score digit 0
//! highest, bright images digit 9.

use super::layout::{CLASS_COUNT, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH};

const FLAT: usize = INPUT_CHANNELS * INPUT_HEIGHT * INPUT_WIDTH;

/// TensorProto.DataType.FLOAT
const ELEM_FLOAT: u64 = 1;
const IR_VERSION: u64 = 7;
const OPSET: u64 = 13;

/// Serialized ModelProto bytes
pub fn linear_digits_onnx() -> Vec<u8> {
    let mut graph = Vec::new();
    message(&mut graph, 1, &node(&["input"], &["flat"], "Flatten"));
    message(&mut graph, 1, &node(&["flat", "weights"], &["logits"], "MatMul"));
    string(&mut graph, 2, "linear_digits");
    message(&mut graph, 5, &weights());
    message(&mut graph, 11, &value_info("input", &[1, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH]));
    message(&mut graph, 12, &value_info("logits", &[1, CLASS_COUNT]));

    let mut opset = Vec::new();
    varint_field(&mut opset, 2, OPSET);

    let mut model = Vec::new();
    varint_field(&mut model, 1, IR_VERSION);
    string(&mut model, 2, "digit-classifier-tests");
    message(&mut model, 7, &graph);
    message(&mut model, 8, &opset);
    model
}

fn node(inputs: &[&str], outputs: &[&str], op_type: &str) -> Vec<u8> {
    let mut node = Vec::new();
    for input in inputs {
        string(&mut node, 1, input);
    }
    for output in outputs {
        string(&mut node, 2, output);
    }
    string(&mut node, 4, op_type);
    node
}

fn weights() -> Vec<u8> {
    let mut raw = Vec::with_capacity(FLAT * CLASS_COUNT * 4);
    for _ in 0..FLAT {
        for k in 0..CLASS_COUNT {
            let w = (k as f32 - 4.5) / FLAT as f32;
            raw.extend_from_slice(&w.to_le_bytes());
        }
    }

    let mut tensor = Vec::new();
    varint_field(&mut tensor, 1, FLAT as u64);
    varint_field(&mut tensor, 1, CLASS_COUNT as u64);
    varint_field(&mut tensor, 2, ELEM_FLOAT);
    string(&mut tensor, 8, "weights");
    message(&mut tensor, 9, &raw);
    tensor
}

fn value_info(name: &str, dims: &[usize]) -> Vec<u8> {
    let mut shape = Vec::new();
    for &d in dims {
        let mut dim = Vec::new();
        varint_field(&mut dim, 1, d as u64);
        message(&mut shape, 1, &dim);
    }

    let mut tensor_type = Vec::new();
    varint_field(&mut tensor_type, 1, ELEM_FLOAT);
    message(&mut tensor_type, 2, &shape);

    let mut type_proto = Vec::new();
    message(&mut type_proto, 1, &tensor_type);

    let mut info = Vec::new();
    string(&mut info, 1, name);
    message(&mut info, 2, &type_proto);
    info
}

// ============================================================================
// PROTOBUF WIRE FORMAT
// ============================================================================

fn varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn varint_field(buf: &mut Vec<u8>, field: u64, value: u64) {
    varint(buf, field << 3);
    varint(buf, value);
}

fn message(buf: &mut Vec<u8>, field: u64, payload: &[u8]) {
    varint(buf, (field << 3) | 2);
    varint(buf, payload.len() as u64);
    buf.extend_from_slice(payload);
}

fn string(buf: &mut Vec<u8>, field: u64, value: &str) {
    message(buf, field, value.as_bytes());
}

#[test]
fn test_varint_encoding() {
    let mut buf = Vec::new();
    varint(&mut buf, 300);
    assert_eq!(buf, [0xac, 0x02]);
}
