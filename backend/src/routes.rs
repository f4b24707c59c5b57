use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDateTime;
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use serde_json::json;

use lungscan_shared::{AnalysisResponse, ErrorResponse, ReportRequest};

use crate::analysis::{Analysis, AnalysisError, Analyzer};
use crate::report::{self, REPORT_FILE_NAME, TIMESTAMP_FORMAT};

/// Largest accepted upload, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/analyze").route(web::post().to(handle_analyze)))
        .service(web::resource("/api/report").route(web::post().to(handle_report)));
}

fn error_body(message: impl Into<String>) -> ErrorResponse {
    ErrorResponse {
        error: message.into(),
    }
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

async fn health(analyzer: web::Data<Analyzer>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "model": analyzer.classifier().model_name(),
    }))
}

enum UploadError {
    TooLarge,
    Empty,
    Payload(String),
}

/// Multipart field name the image is expected under.
pub const IMAGE_FIELD: &str = "image";

/// A field carries the image when it is named `image` or is a file part.
fn is_image_field(field: &actix_multipart::Field) -> bool {
    let has_filename = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .is_some();
    has_filename || field.name() == Some(IMAGE_FIELD)
}

/// Reads the first non-empty image field. Other form fields are drained and
/// ignored, but still count towards the size limit.
async fn read_upload(payload: &mut Multipart, limit: usize) -> Result<Vec<u8>, UploadError> {
    let mut received = 0usize;
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| UploadError::Payload(e.to_string()))?
    {
        let wanted = is_image_field(&field);
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| UploadError::Payload(e.to_string()))?;
            received += data.len();
            if received > limit {
                return Err(UploadError::TooLarge);
            }
            if wanted {
                image_data.extend_from_slice(&data);
            }
        }
        if !image_data.is_empty() {
            return Ok(image_data);
        }
    }
    Err(UploadError::Empty)
}

fn analysis_response(analysis: Analysis) -> AnalysisResponse {
    let (report, report_error) = match analysis.report {
        Ok(report) => (Some(STANDARD.encode(report.bytes())), None),
        Err(e) => (None, Some(e.to_string())),
    };
    AnalysisResponse {
        label: analysis.decision.label,
        display_label: analysis.decision.label.to_string(),
        confidence_percent: analysis.decision.confidence_percent,
        raw_score: analysis.raw_score.value(),
        image_sha256: analysis.image_sha256,
        analyzed_at: analysis.analyzed_at.format(TIMESTAMP_FORMAT).to_string(),
        report,
        report_error,
    }
}

async fn handle_analyze(
    analyzer: web::Data<Analyzer>,
    limit: web::Data<UploadLimit>,
    mut payload: Multipart,
) -> HttpResponse {
    let image_data = match read_upload(&mut payload, limit.0).await {
        Ok(data) => data,
        Err(UploadError::TooLarge) => {
            return HttpResponse::PayloadTooLarge()
                .json(error_body(format!("Image exceeds the {} byte limit", limit.0)));
        }
        Err(UploadError::Empty) => {
            return HttpResponse::BadRequest().json(error_body("No image uploaded"));
        }
        Err(UploadError::Payload(e)) => {
            error!("Failed to read upload: {}", e);
            return HttpResponse::BadRequest().json(error_body("Malformed upload"));
        }
    };
    info!("Received {} byte upload", image_data.len());

    let analyzed_at = now();
    let analyzer = analyzer.into_inner();
    let result = web::block(move || analyzer.analyze(&image_data, analyzed_at)).await;

    match result {
        Ok(Ok(analysis)) => HttpResponse::Ok().json(analysis_response(analysis)),
        Ok(Err(AnalysisError::Decode(e))) => HttpResponse::BadRequest().json(error_body(format!(
            "Please upload a valid JPEG or PNG image ({})",
            e
        ))),
        Ok(Err(AnalysisError::Inference(e))) => {
            error!("Model inference error: {}", e);
            HttpResponse::InternalServerError().json(error_body("Analysis failed"))
        }
        Err(e) => {
            error!("Analysis task did not complete: {}", e);
            HttpResponse::InternalServerError().json(error_body("Analysis failed"))
        }
    }
}

async fn handle_report(request: web::Json<ReportRequest>) -> HttpResponse {
    let request = request.into_inner();
    if !(0.0..=100.0).contains(&request.confidence_percent) {
        return HttpResponse::BadRequest().json(error_body("confidencePercent must be within [0, 100]"));
    }

    let timestamp = match request.timestamp.as_deref() {
        Some(raw) => match NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
            Ok(ts) => ts,
            Err(_) => {
                return HttpResponse::BadRequest()
                    .json(error_body("timestamp must be formatted as YYYY-MM-DD HH:MM:SS"));
            }
        },
        None => now(),
    };

    match report::build(request.label, request.confidence_percent, timestamp) {
        Ok(report) => HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", REPORT_FILE_NAME),
            ))
            .body(report.into_bytes()),
        Err(e) => {
            error!("Report generation failed: {}", e);
            HttpResponse::InternalServerError().json(error_body("Report generation failed"))
        }
    }
}
