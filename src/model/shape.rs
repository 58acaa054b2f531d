//! Input Shape - keypoint validation and reshaping
//!
//! Clients send keypoints flat (`[x0, y0, z0, ...]`), per time step
//! (`[[...], [...]]`) or already batched. Everything is brought to
//! `[batch, ...model_dims]` before it reaches the session.

use std::fmt;

use ndarray::{ArrayD, IxDyn};
use serde_json::Value;

/// Errors from keypoint parsing / shape matching. Always a client error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("keypoints must be an array")]
    NotAnArray,

    #[error("keypoints must not be empty")]
    Empty,

    #[error("keypoints must contain only numbers")]
    NotNumeric,

    #[error("keypoints rows must all have the same length")]
    Ragged,

    #[error("keypoints values must fit in a 32-bit float")]
    OutOfRange,

    #[error("Invalid keypoints shape. Expected {0} values")]
    Length(usize),

    #[error("Invalid keypoints shape. Expected a multiple of {0} values")]
    NotMultiple(usize),

    #[error("Invalid keypoints shape. Expected {expected}, got {got:?}")]
    Dims { expected: InputShape, got: Vec<usize> },

    #[error("model input {0} has more than one dynamic dimension")]
    Ambiguous(InputShape),
}

/// Expected model input, batch axis excluded. `None` marks a dynamic dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputShape {
    dims: Vec<Option<usize>>,
}

impl InputShape {
    pub fn new(dims: Vec<Option<usize>>) -> Self {
        Self { dims }
    }

    /// Build from raw ONNX dimensions (leading batch axis included).
    /// Symbolic dims come through as -1 (or 0 from some exporters).
    pub fn from_model_dims(raw: &[i64]) -> Self {
        let dims = raw
            .iter()
            .skip(1)
            .map(|&d| if d > 0 { Some(d as usize) } else { None })
            .collect();
        Self { dims }
    }

    pub fn fixed(dims: &[usize]) -> Self {
        Self::new(dims.iter().copied().map(Some).collect())
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Option<usize>] {
        &self.dims
    }

    /// Number of values in one sample, if every dimension is fixed
    pub fn sample_len(&self) -> Option<usize> {
        self.dims.iter().copied().product()
    }

    fn matches(&self, got: &[usize]) -> bool {
        self.dims.len() == got.len()
            && self
                .dims
                .iter()
                .zip(got)
                .all(|(want, have)| want.map_or(*have > 0, |w| w == *have))
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match dim {
                Some(d) => write!(f, "{}", d)?,
                None => write!(f, "?")?,
            }
        }
        write!(f, "]")
    }
}

/// Parsed request keypoints: row-major values plus their nesting dims.
#[derive(Debug, Clone, PartialEq)]
pub struct Keypoints {
    data: Vec<f32>,
    dims: Vec<usize>,
}

impl Keypoints {
    pub fn from_json(value: &Value) -> Result<Self, ShapeError> {
        if !value.is_array() {
            return Err(ShapeError::NotAnArray);
        }

        // Dims come from the first element at each level; flatten rejects
        // anything that disagrees, so nothing is sized from them up front.
        let mut dims = Vec::new();
        let mut probe = value;
        while let Value::Array(items) = probe {
            if items.is_empty() {
                return Err(ShapeError::Empty);
            }
            dims.push(items.len());
            probe = &items[0];
        }

        let mut data = Vec::new();
        flatten(value, &dims, &mut data)?;

        Ok(Self { data, dims })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn value_count(&self) -> usize {
        self.data.len()
    }

    /// Reshape into `[batch, ...expected]` for the model.
    pub fn into_model_input(self, expected: &InputShape) -> Result<ArrayD<f32>, ShapeError> {
        let rank = self.dims.len();

        let shape = if rank == 1 && expected.rank() > 0 {
            let mut shape = vec![1];
            shape.extend(resolve_flat(self.data.len(), expected)?);
            shape
        } else if rank == expected.rank() {
            if !expected.matches(&self.dims) {
                return Err(ShapeError::Dims { expected: expected.clone(), got: self.dims });
            }
            let mut shape = vec![1];
            shape.extend_from_slice(&self.dims);
            shape
        } else if rank == expected.rank() + 1 {
            if !expected.matches(&self.dims[1..]) {
                return Err(ShapeError::Dims {
                    expected: expected.clone(),
                    got: self.dims[1..].to_vec(),
                });
            }
            self.dims
        } else {
            return Err(ShapeError::Dims { expected: expected.clone(), got: self.dims });
        };

        ArrayD::from_shape_vec(IxDyn(&shape), self.data)
            .map_err(|_| ShapeError::Length(shape.iter().product()))
    }
}

fn flatten(value: &Value, dims: &[usize], out: &mut Vec<f32>) -> Result<(), ShapeError> {
    match value {
        Value::Array(items) => {
            let Some((&len, rest)) = dims.split_first() else {
                return Err(ShapeError::Ragged);
            };
            if items.len() != len {
                return Err(ShapeError::Ragged);
            }
            for item in items {
                flatten(item, rest, out)?;
            }
            Ok(())
        }
        Value::Number(n) => {
            if !dims.is_empty() {
                return Err(ShapeError::Ragged);
            }
            let v = n.as_f64().ok_or(ShapeError::NotNumeric)? as f32;
            if !v.is_finite() {
                return Err(ShapeError::OutOfRange);
            }
            out.push(v);
            Ok(())
        }
        _ => Err(ShapeError::NotNumeric),
    }
}

/// Work out the per-sample dims for a flat array of `len` values.
fn resolve_flat(len: usize, expected: &InputShape) -> Result<Vec<usize>, ShapeError> {
    let dynamic = expected.dims().iter().filter(|d| d.is_none()).count();

    match dynamic {
        0 => {
            let total = expected.sample_len().unwrap_or(0);
            if len != total {
                return Err(ShapeError::Length(total));
            }
            Ok(expected.dims().iter().map(|d| d.unwrap_or(0)).collect())
        }
        1 => {
            let known: usize = expected.dims().iter().flatten().product();
            if known == 0 || len % known != 0 {
                return Err(ShapeError::NotMultiple(known));
            }
            let inferred = len / known;
            Ok(expected.dims().iter().map(|d| d.unwrap_or(inferred)).collect())
        }
        _ => Err(ShapeError::Ambiguous(expected.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keypoints(value: Value) -> Keypoints {
        Keypoints::from_json(&value).unwrap()
    }

    #[test]
    fn test_from_model_dims_drops_batch() {
        let shape = InputShape::from_model_dims(&[-1, 30, 126]);
        assert_eq!(shape, InputShape::fixed(&[30, 126]));

        let dynamic = InputShape::from_model_dims(&[1, -1, 126]);
        assert_eq!(dynamic.dims(), &[None, Some(126)]);
        assert_eq!(dynamic.sample_len(), None);
        assert_eq!(dynamic.to_string(), "[?, 126]");
    }

    #[test]
    fn test_parse_nested() {
        let kp = keypoints(json!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]));
        assert_eq!(kp.dims(), &[2, 3]);
        assert_eq!(kp.value_count(), 6);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(Keypoints::from_json(&json!(3.0)), Err(ShapeError::NotAnArray));
        assert_eq!(Keypoints::from_json(&json!({"x": 1})), Err(ShapeError::NotAnArray));
        assert_eq!(Keypoints::from_json(&json!([])), Err(ShapeError::Empty));
        assert_eq!(Keypoints::from_json(&json!([1.0, "a"])), Err(ShapeError::NotNumeric));
        assert_eq!(Keypoints::from_json(&json!([1.0, null])), Err(ShapeError::NotNumeric));
        assert_eq!(Keypoints::from_json(&json!([[1.0, 2.0], [3.0]])), Err(ShapeError::Ragged));
        assert_eq!(Keypoints::from_json(&json!([[1.0], 2.0])), Err(ShapeError::Ragged));
        assert_eq!(Keypoints::from_json(&json!([1.0, [2.0]])), Err(ShapeError::Ragged));
    }

    #[test]
    fn test_parse_rejects_lopsided_nesting() {
        // First element nests four deep, its siblings are plain numbers.
        // Sized from the first path alone this would be 1000^4 values.
        let mut value = json!(vec![0; 1000]);
        for _ in 0..3 {
            let mut level = vec![value];
            level.extend(std::iter::repeat(json!(0)).take(999));
            value = Value::Array(level);
        }

        assert_eq!(Keypoints::from_json(&value), Err(ShapeError::Ragged));
    }

    #[test]
    fn test_parse_rejects_values_beyond_f32() {
        assert_eq!(
            Keypoints::from_json(&json!([1.0, 1e300])),
            Err(ShapeError::OutOfRange)
        );
        assert_eq!(
            Keypoints::from_json(&json!([[0.5], [-1e39]])),
            Err(ShapeError::OutOfRange)
        );
    }

    #[test]
    fn test_flat_into_sequence_model() {
        let expected = InputShape::fixed(&[2, 3]);
        let input = keypoints(json!([1, 2, 3, 4, 5, 6])).into_model_input(&expected).unwrap();
        assert_eq!(input.shape(), &[1, 2, 3]);
        assert_eq!(input.iter().nth(3), Some(&4.0));
    }

    #[test]
    fn test_flat_into_dense_model() {
        let expected = InputShape::fixed(&[126]);
        let values: Vec<f32> = (0..126).map(|i| i as f32).collect();
        let input = keypoints(json!(values)).into_model_input(&expected).unwrap();
        assert_eq!(input.shape(), &[1, 126]);
    }

    #[test]
    fn test_flat_wrong_length() {
        let expected = InputShape::fixed(&[2, 3]);
        let err = keypoints(json!([1, 2, 3, 4, 5])).into_model_input(&expected).unwrap_err();
        assert_eq!(err, ShapeError::Length(6));
        assert_eq!(err.to_string(), "Invalid keypoints shape. Expected 6 values");
    }

    #[test]
    fn test_flat_infers_dynamic_sequence() {
        let expected = InputShape::new(vec![None, Some(3)]);
        let input = keypoints(json!([1, 2, 3, 4, 5, 6, 7, 8, 9]))
            .into_model_input(&expected)
            .unwrap();
        assert_eq!(input.shape(), &[1, 3, 3]);

        let err = keypoints(json!([1, 2, 3, 4])).into_model_input(&expected).unwrap_err();
        assert_eq!(err, ShapeError::NotMultiple(3));
    }

    #[test]
    fn test_flat_with_two_dynamic_dims() {
        let expected = InputShape::new(vec![None, None]);
        let err = keypoints(json!([1, 2, 3, 4])).into_model_input(&expected).unwrap_err();
        assert!(matches!(err, ShapeError::Ambiguous(_)));
    }

    #[test]
    fn test_unbatched_gets_batch_axis() {
        let expected = InputShape::fixed(&[2, 3]);
        let input = keypoints(json!([[1, 2, 3], [4, 5, 6]]))
            .into_model_input(&expected)
            .unwrap();
        assert_eq!(input.shape(), &[1, 2, 3]);
    }

    #[test]
    fn test_batched_passes_through() {
        let expected = InputShape::fixed(&[2, 3]);
        let input = keypoints(json!([[[1, 2, 3], [4, 5, 6]], [[0, 0, 0], [0, 0, 0]]]))
            .into_model_input(&expected)
            .unwrap();
        assert_eq!(input.shape(), &[2, 2, 3]);
    }

    #[test]
    fn test_nested_dims_must_match() {
        let expected = InputShape::fixed(&[2, 3]);
        let err = keypoints(json!([[1, 2], [3, 4]])).into_model_input(&expected).unwrap_err();
        assert_eq!(err, ShapeError::Dims { expected: expected.clone(), got: vec![2, 2] });

        let err = keypoints(json!([[[[1]]]])).into_model_input(&expected).unwrap_err();
        assert!(matches!(err, ShapeError::Dims { .. }));
    }
}
