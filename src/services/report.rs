//! Report service
//!
//! JSON reports come back as data; pdf, csv and excel reports are downloaded
//! as files named `<kind>_report_<YYYY-MM-DD>.<ext>`.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use super::{QueryParams, Reported};
use crate::api::{ApiClient, ApiResult, Download, RequestOptions};
use crate::events::{AppEvent, EventBus, Resource};

/// Output format of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Json,
    Pdf,
    Csv,
    Excel,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Pdf => "pdf",
            ReportFormat::Csv => "csv",
            ReportFormat::Excel => "excel",
        }
    }

    /// Formats delivered as a file download
    pub fn is_file(&self) -> bool {
        !matches!(self, ReportFormat::Json)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Pdf => "pdf",
            ReportFormat::Csv => "csv",
            ReportFormat::Excel => "xlsx",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "pdf" => Ok(ReportFormat::Pdf),
            "csv" => Ok(ReportFormat::Csv),
            "excel" | "xlsx" => Ok(ReportFormat::Excel),
            other => Err(format!("Unknown report format: {}", other)),
        }
    }
}

/// Which report to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Attendance,
    Personnel,
    Activity,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Attendance => "attendance",
            ReportKind::Personnel => "personnel",
            ReportKind::Activity => "activity",
        }
    }

    fn endpoint(&self) -> String {
        format!("/reports/{}", self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "attendance" => Ok(ReportKind::Attendance),
            "personnel" => Ok(ReportKind::Personnel),
            "activity" => Ok(ReportKind::Activity),
            other => Err(format!("Unknown report kind: {}", other)),
        }
    }
}

/// A downloaded report file
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub filename: String,
    pub format: ReportFormat,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ReportFile {
    /// Name the file `<prefix>_<today>.<ext>`
    pub fn new(prefix: &str, format: ReportFormat, download: Download) -> Self {
        let date = chrono::Local::now().format("%Y-%m-%d");
        Self {
            filename: format!("{}_{}.{}", prefix, date, format.extension()),
            format,
            content_type: download.content_type,
            bytes: download.bytes,
        }
    }

    /// Write the file into `dir`, returning its path
    pub fn save(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Result of a report request
#[derive(Debug, Clone)]
pub enum ReportOutput {
    Data(serde_json::Value),
    File(ReportFile),
}

#[derive(Clone)]
pub struct ReportService {
    api: Arc<ApiClient>,
    events: EventBus,
}

impl ReportService {
    pub fn new(api: Arc<ApiClient>, events: EventBus) -> Self {
        Self { api, events }
    }

    pub async fn generate(
        &self,
        kind: ReportKind,
        format: ReportFormat,
        params: &QueryParams,
    ) -> ApiResult<ReportOutput> {
        tracing::info!(kind = kind.as_str(), format = format.as_str(), "Generating report");

        let result = if format.is_file() {
            let query = params.clone().with("format", format.as_str());
            let prefix = format!("{}_report", kind.as_str());
            self.api
                .download(&query.apply(&kind.endpoint()), RequestOptions::get())
                .await
                .map(|download| ReportOutput::File(ReportFile::new(&prefix, format, download)))
        } else {
            let mut body = params.to_json();
            body["format"] = json!(format.as_str());
            self.api
                .request(&kind.endpoint(), RequestOptions::post(body))
                .await
                .map(|p| ReportOutput::Data(p.into_json()))
        };

        result.reported(
            &self.events,
            Resource::Report,
            &format!("Failed to generate {} report", kind.as_str()),
        )
    }

    pub async fn templates(&self) -> ApiResult<serde_json::Value> {
        self.api
            .request("/reports/templates", RequestOptions::get())
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Report, "Failed to get report templates")
    }

    pub async fn schedule(&self, schedule: serde_json::Value) -> ApiResult<serde_json::Value> {
        let response = self
            .api
            .request("/reports/schedule", RequestOptions::post(schedule))
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Report, "Failed to schedule report")?;

        let scheduled = response
            .get("schedule")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        self.events.emit(AppEvent::ReportScheduled { schedule: scheduled });
        Ok(response)
    }

    pub async fn scheduled(&self) -> ApiResult<serde_json::Value> {
        self.api
            .request("/reports/schedule", RequestOptions::get())
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Report, "Failed to get scheduled reports")
    }

    pub async fn delete_schedule(&self, id: u64) -> ApiResult<()> {
        self.api
            .request(&format!("/reports/schedule/{}", id), RequestOptions::delete())
            .await
            .reported(&self.events, Resource::Report, "Failed to delete scheduled report")?;

        self.events.emit(AppEvent::ReportScheduleDeleted { id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HttpMethod, HttpResponse};
    use crate::testing::{json_response, sign_in, test_context};

    #[test]
    fn test_format_parsing_and_extension() {
        assert_eq!("Excel".parse::<ReportFormat>().unwrap().extension(), "xlsx");
        assert!(!ReportFormat::Json.is_file());
        assert!("docx".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_file_name_and_save() {
        let file = ReportFile::new(
            "personnel_report",
            ReportFormat::Pdf,
            Download {
                bytes: b"%PDF".to_vec(),
                content_type: None,
            },
        );
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        assert_eq!(file.filename, format!("personnel_report_{}.pdf", today));

        let dir = tempfile::tempdir().unwrap();
        let path = file.save(dir.path()).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn test_json_report_is_posted() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(
            HttpMethod::Post,
            "/reports/personnel",
            json_response(200, json!({"success": true, "rows": []})),
        );

        let output = ctx
            .services
            .report
            .generate(
                ReportKind::Personnel,
                ReportFormat::Json,
                &QueryParams::new().with("station", "Central"),
            )
            .await
            .unwrap();

        assert!(matches!(output, ReportOutput::Data(_)));
        let body = &transport.bodies(HttpMethod::Post, "/reports/personnel")[0];
        assert_eq!(body["station"], "Central");
        assert_eq!(body["format"], "json");
    }

    #[tokio::test]
    async fn test_excel_report_downloads_xlsx() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(
            HttpMethod::Get,
            "/reports/activity",
            HttpResponse {
                status: 200,
                content_type: Some("application/vnd.ms-excel".to_string()),
                body: vec![1, 2, 3],
            },
        );

        let output = ctx
            .services
            .report
            .generate(ReportKind::Activity, ReportFormat::Excel, &QueryParams::new())
            .await
            .unwrap();

        let ReportOutput::File(file) = output else {
            panic!("expected a file");
        };
        assert!(file.filename.starts_with("activity_report_"));
        assert!(file.filename.ends_with(".xlsx"));
        assert_eq!(file.bytes, vec![1, 2, 3]);
    }
}
