use std::sync::Arc;

use lungscan_shared::Diagnosis;

use crate::model::{InferenceError, ScoreModel};
use crate::preprocess::{INPUT_SHAPE, NormalizedTensor};

/// Scores strictly below this are read as cancer. The model's positive class
/// is "no cancer", so the comparison is inverted relative to the raw output.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Unmodified classifier output, guaranteed finite and within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RawScore(f64);

impl RawScore {
    pub fn new(value: f64) -> Result<Self, InferenceError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InferenceError::ScoreOutOfRange(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub label: Diagnosis,
    /// In [0, 100], rounded to two decimals.
    pub confidence_percent: f64,
}

/// Maps a raw score to a label and a confidence for that label.
///
/// `score < 0.5` is `CancerDetected` with confidence `100 - score * 100`;
/// `score >= 0.5` (0.5 included) is `NoCancerDetected` with confidence
/// `score * 100`. The score percentage is rounded to two decimals (ties to
/// even) before the cancer branch subtracts it from 100.
pub fn decide(score: RawScore) -> Decision {
    let s = score.value();
    let percent = round2(s * 100.0);
    let (label, confidence) = if s < DECISION_THRESHOLD {
        (Diagnosis::CancerDetected, round2(100.0 - percent))
    } else {
        (Diagnosis::NoCancerDetected, percent)
    };
    Decision {
        label,
        confidence_percent: confidence.clamp(0.0, 100.0),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Adapter around the shared model handle.
#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn ScoreModel>,
}

impl Classifier {
    pub fn new(model: Arc<dyn ScoreModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// One forward pass. Rejects tensors of the wrong shape instead of
    /// reshaping them, and model outputs that are not a single unit score.
    pub fn classify(&self, tensor: &NormalizedTensor) -> Result<RawScore, InferenceError> {
        if tensor.shape() != INPUT_SHAPE {
            return Err(InferenceError::InvalidShape {
                expected: INPUT_SHAPE.to_vec(),
                actual: tensor.shape().to_vec(),
            });
        }

        let output = self.model.forward(tensor)?;
        match output.as_slice() {
            [score] => RawScore::new(*score as f64),
            other => Err(InferenceError::UnexpectedOutput(other.len())),
        }
    }
}
