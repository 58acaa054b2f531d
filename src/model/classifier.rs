//! Classifier - inference seam and output decoding

use ndarray::{Array2, ArrayD, ArrayView1};
use serde::Serialize;

use super::labels::LabelMap;
use super::shape::InputShape;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Model has no tensor input")]
    NoInput,

    #[error("Model has no output")]
    NoOutput,

    #[error("Inference failed: {0}")]
    Run(String),

    #[error("Model returned an empty prediction")]
    EmptyOutput,
}

/// Inference backend. ONNX in production, fakes in tests.
pub trait Classifier: Send + Sync {
    /// Human-readable identifier, usually the model path
    fn name(&self) -> &str;

    /// Expected input, batch axis excluded
    fn input_shape(&self) -> &InputShape;

    /// Run a batch. Returns scores as `(batch, classes)`.
    fn predict(&self, input: ArrayD<f32>) -> Result<Array2<f32>, InferenceError>;
}

/// Prediction output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub prediction: String,
    pub confidence: f32,
    pub class_index: usize,
}

/// Pick the best class from the first row of `scores`.
pub fn classify(scores: &Array2<f32>, labels: &LabelMap) -> Result<Prediction, InferenceError> {
    if scores.nrows() == 0 {
        return Err(InferenceError::EmptyOutput);
    }

    let (class_index, confidence) = argmax(scores.row(0)).ok_or(InferenceError::EmptyOutput)?;

    Ok(Prediction {
        prediction: labels.label(class_index).to_string(),
        confidence,
        class_index,
    })
}

/// First maximum wins; NaN never wins unless every score is NaN.
fn argmax(row: ArrayView1<f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in row.iter().enumerate() {
        match best {
            None => best = Some((i, score)),
            Some((_, top)) if top.is_nan() && !score.is_nan() => best = Some((i, score)),
            Some((_, top)) if score > top => best = Some((i, score)),
            _ => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels() -> LabelMap {
        [(0, "hello".to_string()), (1, "thanks".to_string()), (2, "yes".to_string())]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_classify_picks_argmax() {
        let scores = array![[0.1, 0.7, 0.2]];
        let prediction = classify(&scores, &labels()).unwrap();
        assert_eq!(prediction.prediction, "thanks");
        assert_eq!(prediction.class_index, 1);
        assert!((prediction.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_classify_uses_first_row_only() {
        let scores = array![[0.9, 0.05, 0.05], [0.0, 0.0, 1.0]];
        let prediction = classify(&scores, &labels()).unwrap();
        assert_eq!(prediction.class_index, 0);
    }

    #[test]
    fn test_ties_pick_first() {
        let scores = array![[0.4, 0.4, 0.2]];
        assert_eq!(classify(&scores, &labels()).unwrap().class_index, 0);
    }

    #[test]
    fn test_nan_never_wins() {
        let scores = array![[f32::NAN, 0.3, 0.6]];
        assert_eq!(classify(&scores, &labels()).unwrap().class_index, 2);
    }

    #[test]
    fn test_unknown_label() {
        let scores = array![[0.0, 0.0, 0.0, 1.0]];
        let prediction = classify(&scores, &labels()).unwrap();
        assert_eq!(prediction.class_index, 3);
        assert_eq!(prediction.prediction, "Unknown");
    }

    #[test]
    fn test_empty_output() {
        let empty = Array2::<f32>::zeros((0, 3));
        assert_eq!(classify(&empty, &labels()), Err(InferenceError::EmptyOutput));

        let no_classes = Array2::<f32>::zeros((1, 0));
        assert_eq!(classify(&no_classes, &labels()), Err(InferenceError::EmptyOutput));
    }
}
