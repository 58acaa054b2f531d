//! ONNX Runtime backend
//!
//! The Keras classifier is exported to ONNX offline; this loads the graph,
//! reads its input signature once and serves predictions from one session.

use std::path::Path;
use std::time::Instant;

use ndarray::{Array2, ArrayD, ArrayViewD, Ix1, Ix2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;

use super::classifier::{Classifier, InferenceError};
use super::shape::InputShape;

pub struct OnnxClassifier {
    name: String,
    input_shape: InputShape,
    output_name: String,
    // `Session::run` takes `&mut self`
    session: Mutex<Session>,
}

impl OnnxClassifier {
    pub fn load(model_path: impl AsRef<Path>, threads: usize) -> Result<Self, InferenceError> {
        let model_path = model_path.as_ref();
        let name = model_path.display().to_string();
        tracing::info!("Loading ONNX model from: {}", name);

        if !model_path.exists() {
            return Err(InferenceError::ModelNotFound(name));
        }

        let session = Session::builder()
            .map_err(|e| InferenceError::Load(format!("session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Load(format!("optimization level: {}", e)))?
            .with_intra_threads(threads)
            .map_err(|e| InferenceError::Load(format!("intra threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| InferenceError::Load(e.to_string()))?;

        let input = session.inputs.first().ok_or(InferenceError::NoInput)?;
        let raw_dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .ok_or(InferenceError::NoInput)?
            .iter()
            .copied()
            .collect();
        let input_shape = InputShape::from_model_dims(&raw_dims);

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or(InferenceError::NoOutput)?;

        tracing::info!(
            "ONNX model loaded: input '{}' {:?} -> sample shape {}, output '{}'",
            input.name,
            raw_dims,
            input_shape,
            output_name
        );

        Ok(Self {
            name,
            input_shape,
            output_name,
            session: Mutex::new(session),
        })
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_shape(&self) -> &InputShape {
        &self.input_shape
    }

    fn predict(&self, input: ArrayD<f32>) -> Result<Array2<f32>, InferenceError> {
        let start_time = Instant::now();

        let input_tensor = Tensor::from_array(input)
            .map_err(|e| InferenceError::Run(format!("tensor: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or(InferenceError::NoOutput)?;

        let scores = output
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::Run(format!("extract: {}", e)))?;

        let scores = scores_to_2d(scores)?;

        tracing::debug!(
            "ONNX inference took {} us",
            start_time.elapsed().as_micros()
        );

        Ok(scores)
    }
}

/// Bring classifier output to `(batch, classes)`.
/// `[C]` is a single unbatched row; anything past rank 2 is not a class vector.
fn scores_to_2d(scores: ArrayViewD<f32>) -> Result<Array2<f32>, InferenceError> {
    let shape = scores.shape().to_vec();
    match shape.len() {
        1 => {
            let row = scores
                .into_dimensionality::<Ix1>()
                .map_err(|e| InferenceError::Run(format!("output shape: {}", e)))?;
            Ok(row.insert_axis(ndarray::Axis(0)).to_owned())
        }
        2 => Ok(scores
            .into_dimensionality::<Ix2>()
            .map_err(|e| InferenceError::Run(format!("output shape: {}", e)))?
            .to_owned()),
        _ => Err(InferenceError::Run(format!(
            "expected class scores of rank 1 or 2, got output shape {:?}",
            shape
        ))),
    }
}
