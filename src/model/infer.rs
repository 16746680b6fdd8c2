use tch::{Kind, Tensor};

use crate::error::ApiError;
use crate::model::handle::ModelHandle;

/// Pure forward pass: normalized input tensor in, class probabilities out.
///
/// Shape mismatches are a caller bug, reported as `InferenceError` and
/// never retried; they are a different failure class from the model being
/// unavailable in the first place.
pub fn infer(handle: &ModelHandle, input: &Tensor) -> Result<Vec<f32>, ApiError> {
    let (height, width) = handle.input_size;
    let expected = vec![1, 3, height as i64, width as i64];
    if input.size() != expected {
        return Err(ApiError::Inference(format!(
            "input tensor shape {:?} does not match model input shape {:?}",
            input.size(),
            expected
        )));
    }

    let output = tch::no_grad(|| handle.module().forward(input))
        .map_err(|e| ApiError::Inference(e.to_string()))?;
    let probs = output.softmax(-1, Kind::Float).to_kind(Kind::Float).view([-1]);

    let produced = probs.size()[0] as usize;
    if produced != handle.num_classes {
        return Err(ApiError::Inference(format!(
            "model produced {} scores, expected {}",
            produced, handle.num_classes
        )));
    }

    let mut scores = vec![0f32; produced];
    probs.copy_data(&mut scores, produced);
    Ok(scores)
}
