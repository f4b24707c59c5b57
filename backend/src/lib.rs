pub mod analysis;
pub mod classifier;
pub mod config;
pub mod model;
pub mod preprocess;
pub mod report;
pub mod routes;

pub use analysis::{Analysis, AnalysisError, Analyzer};
pub use classifier::{Classifier, Decision, RawScore, decide};
pub use config::AppConfig;
pub use model::{InferenceError, ScoreModel};
pub use preprocess::{DecodeError, NormalizedTensor, normalize};
pub use report::{Report, ReportGenerationError};
