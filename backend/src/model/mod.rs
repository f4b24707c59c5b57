#[cfg(feature = "libtorch")]
pub mod torchscript;

use crate::preprocess::NormalizedTensor;

#[cfg(feature = "libtorch")]
pub use torchscript::TorchScriptModel;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("input tensor has shape {actual:?}, expected {expected:?}")]
    InvalidShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("model returned {0} values, expected a single score")]
    UnexpectedOutput(usize),
    #[error("model score {0} is outside [0, 1]")]
    ScoreOutOfRange(f64),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("model error: {0}")]
    Backend(String),
}

/// A loaded binary image classifier.
///
/// Implementations are built once at startup and only read afterwards, so a
/// single handle can be shared between concurrent requests.
pub trait ScoreModel: Send + Sync {
    /// Runs one forward pass and returns the model output, flattened.
    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError>;

    fn name(&self) -> &str;
}
