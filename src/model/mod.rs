//! Model Module - gesture classifier inference
//!
//! Input validation, label lookup and the ONNX backend live apart so the
//! HTTP layer only sees the `Classifier` trait.

pub mod classifier;
pub mod labels;
pub mod onnx;
pub mod shape;

// Re-export common types
pub use classifier::{classify, Classifier, InferenceError, Prediction};
pub use labels::{LabelError, LabelMap};
pub use onnx::OnnxClassifier;
pub use shape::{InputShape, Keypoints, ShapeError};
