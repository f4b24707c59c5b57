use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

use crate::classifier::{Classifier, Decision, RawScore, decide};
use crate::model::InferenceError;
use crate::preprocess::{DecodeError, normalize};
use crate::report::{self, Report, ReportGenerationError};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Result of one analyze action. The report is kept apart from the decision so
/// a failed report never hides the diagnosis.
#[derive(Debug)]
pub struct Analysis {
    pub decision: Decision,
    pub raw_score: RawScore,
    pub image_sha256: String,
    pub analyzed_at: NaiveDateTime,
    pub report: Result<Report, ReportGenerationError>,
}

/// Runs preprocess, classify, decide and report in sequence for one upload.
#[derive(Clone)]
pub struct Analyzer {
    classifier: Classifier,
}

impl Analyzer {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn analyze(&self, image: &[u8], analyzed_at: NaiveDateTime) -> Result<Analysis, AnalysisError> {
        let image_sha256 = image_digest(image);

        let tensor = normalize(image).inspect_err(|e| {
            log::warn!("Rejected upload {}: {}", short(&image_sha256), e);
        })?;
        let raw_score = self.classifier.classify(&tensor).inspect_err(|e| {
            log::error!("Inference failed for {}: {}", short(&image_sha256), e);
        })?;
        let decision = decide(raw_score);

        log::info!(
            "Analyzed {}: {} ({:.2}%, raw {:.4})",
            short(&image_sha256),
            decision.label,
            decision.confidence_percent,
            raw_score.value()
        );

        let report = report::build(decision.label, decision.confidence_percent, analyzed_at);
        if let Err(e) = &report {
            log::error!("Report generation failed for {}: {}", short(&image_sha256), e);
        }

        Ok(Analysis {
            decision,
            raw_score,
            image_sha256,
            analyzed_at,
            report,
        })
    }
}

pub fn image_digest(image: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image);
    hex::encode(hasher.finalize())
}

fn short(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScoreModel;
    use crate::preprocess::NormalizedTensor;
    use chrono::NaiveDate;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use lungscan_shared::Diagnosis;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        score: f32,
        calls: AtomicUsize,
    }

    impl ScoreModel for CountingModel {
        fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError> {
            assert_eq!(input.shape(), &[1, 224, 224, 1]);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.score])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn analyzer(score: f32) -> (Analyzer, Arc<CountingModel>) {
        let model = Arc::new(CountingModel {
            score,
            calls: AtomicUsize::new(0),
        });
        (Analyzer::new(Classifier::new(model.clone())), model)
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn scenario_a_end_to_end() {
        let (analyzer, _) = analyzer(0.1234);
        let analysis = analyzer.analyze(&png(300, 200), noon()).unwrap();
        assert_eq!(analysis.decision.label, Diagnosis::CancerDetected);
        assert_eq!(format!("{:.2}", analysis.decision.confidence_percent), "87.66");
        let report = analysis.report.unwrap();
        let text = String::from_utf8_lossy(report.bytes());
        assert!(text.contains("Diagnosis: Lung Cancer Detected"));
        assert!(text.contains("Confidence Score: 87.66%"));
        assert!(text.contains("Date: 2025-06-01 12:00:00"));
    }

    #[test]
    fn scenario_b_end_to_end() {
        let (analyzer, _) = analyzer(0.9);
        let analysis = analyzer.analyze(&png(50, 50), noon()).unwrap();
        assert_eq!(analysis.decision.label, Diagnosis::NoCancerDetected);
        assert_eq!(format!("{:.2}", analysis.decision.confidence_percent), "90.00");
        assert_eq!(format!("{:.4}", analysis.raw_score.value()), "0.9000");
    }

    #[test]
    fn every_analysis_runs_inference_again() {
        let (analyzer, model) = analyzer(0.6);
        let image = png(10, 10);
        analyzer.analyze(&image, noon()).unwrap();
        analyzer.analyze(&image, noon()).unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn decode_failure_skips_inference() {
        let (analyzer, model) = analyzer(0.6);
        let err = analyzer.analyze(b"not an image", noon()).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn out_of_range_score_is_an_inference_error() {
        let (analyzer, _) = analyzer(1.7);
        let err = analyzer.analyze(&png(10, 10), noon()).unwrap_err();
        assert!(matches!(err, AnalysisError::Inference(_)));
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            image_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(short("abc"), "abc");
    }
}
