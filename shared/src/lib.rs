use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Outcome of a single-image analysis. Serialized by variant name; `Display`
/// yields the human-readable label printed on screen and in the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum Diagnosis {
    #[strum(serialize = "CancerDetected", to_string = "Lung Cancer Detected")]
    CancerDetected,
    #[strum(serialize = "NoCancerDetected", to_string = "No Lung Cancer Detected")]
    NoCancerDetected,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub label: Diagnosis,
    pub display_label: String,
    pub confidence_percent: f64,
    pub raw_score: f64,
    pub image_sha256: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub analyzed_at: String,
    /// Base64 encoded PDF, absent when report generation failed.
    pub report: Option<String>,
    pub report_error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub label: Diagnosis,
    pub confidence_percent: f64,
    /// `YYYY-MM-DD HH:MM:SS`; the server clock is used when omitted.
    pub timestamp: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
