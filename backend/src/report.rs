use chrono::NaiveDateTime;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use lungscan_shared::Diagnosis;

pub const REPORT_FILE_NAME: &str = "lung_cancer_report.pdf";
pub const REPORT_TITLE: &str = "Lung Cancer Detection Report";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: i64 = 50;
const FIRST_BASELINE: i64 = 780;
const TITLE_SIZE: i64 = 16;
const BODY_SIZE: i64 = 12;

#[derive(Debug, thiserror::Error)]
pub enum ReportGenerationError {
    #[error("failed to encode page content: {0}")]
    Content(String),
    #[error("failed to write document: {0}")]
    Write(String),
}

/// Finished PDF document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    bytes: Vec<u8>,
}

impl Report {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn file_name(&self) -> &'static str {
        REPORT_FILE_NAME
    }
}

/// Lines of the report body, in print order. The first line is the title.
pub fn report_lines(label: Diagnosis, confidence_percent: f64, timestamp: NaiveDateTime) -> Vec<String> {
    vec![
        REPORT_TITLE.to_string(),
        String::new(),
        format!("Date: {}", timestamp.format(TIMESTAMP_FORMAT)),
        String::new(),
        "Analysis Result:".to_string(),
        format!("Diagnosis: {}", label),
        format!("Confidence Score: {:.2}%", confidence_percent),
    ]
}

/// Renders a single-page A4 report. The output depends only on the inputs;
/// the document carries no IDs or creation dates and the content stream is
/// left uncompressed.
pub fn build(
    label: Diagnosis,
    confidence_percent: f64,
    timestamp: NaiveDateTime,
) -> Result<Report, ReportGenerationError> {
    let lines = report_lines(label, confidence_percent, timestamp);

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => bold_id,
            "F2" => regular_id,
        },
    });

    let content = Content {
        operations: text_operations(&lines),
    };
    let encoded = content
        .encode()
        .map_err(|e| ReportGenerationError::Content(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ReportGenerationError::Write(e.to_string()))?;
    log::debug!("Built {} byte report", bytes.len());
    Ok(Report { bytes })
}

/// Title in bold, then the body one line per leading step.
fn text_operations(lines: &[String]) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Td", vec![MARGIN_LEFT.into(), FIRST_BASELINE.into()]),
    ];

    for (i, line) in lines.iter().enumerate() {
        let size = if i == 0 { TITLE_SIZE } else { BODY_SIZE };
        let font = if i == 0 { "F1" } else { "F2" };
        if i > 0 {
            let leading = -(size as f32 * 1.2);
            ops.push(Operation::new("Td", vec![0.into(), leading.into()]));
        }
        if i <= 1 {
            ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
        }
        if !line.is_empty() {
            ops.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
        }
    }

    ops.push(Operation::new("ET", vec![]));
    ops
}
