//! Reports view
//!
//! Builds a report query from a period preset or custom dates, shows the
//! JSON summary, and exports pdf/csv/excel files into the download folder.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use super::{el, input_value, notify_failure, page, Element, Listeners, Node, Outlet, UiEvent};
use super::{UiEventKind, View, ViewAction, ViewKind, ViewResult};
use crate::api::dto::Personnel;
use crate::api::{ApiError, ApiResult};
use crate::app::AppContext;
use crate::services::{QueryParams, ReportFormat, ReportKind, ReportOutput};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl Period {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Period::Daily),
            "weekly" => Some(Period::Weekly),
            "monthly" => Some(Period::Monthly),
            "custom" => Some(Period::Custom),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Custom => "custom",
        }
    }

    /// Days covered, counting today
    fn days(&self) -> Option<i64> {
        match self {
            Period::Daily => Some(1),
            Period::Weekly => Some(7),
            Period::Monthly => Some(30),
            Period::Custom => None,
        }
    }
}

#[derive(Debug, Default)]
struct Summary {
    total: u64,
    on_time: u64,
    late: u64,
    absent: u64,
    rows: Vec<Value>,
}

impl Summary {
    fn from_report(report: &Value) -> Self {
        let body = report.get("data").filter(|d| d.is_object()).unwrap_or(report);
        let summary = body.get("summary").unwrap_or(&Value::Null);
        let count = |key: &str| summary.get(key).and_then(Value::as_u64).unwrap_or(0);
        Self {
            total: count("total"),
            on_time: count("on_time"),
            late: count("late"),
            absent: count("absent"),
            rows: body
                .get("records")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

pub struct ReportsView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    kind: ReportKind,
    period: Period,
    start: NaiveDate,
    end: NaiveDate,
    personnel_id: Option<u64>,
    export_format: ReportFormat,
    personnel: Vec<Personnel>,
    summary: Option<Summary>,
    generating: bool,
    exported: Option<PathBuf>,
}

impl ReportsView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet) -> Self {
        let today = Local::now().date_naive();
        Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
            kind: ReportKind::Attendance,
            period: Period::Weekly,
            start: today - Duration::days(6),
            end: today,
            personnel_id: None,
            export_format: ReportFormat::Pdf,
            personnel: Vec::new(),
            summary: None,
            generating: false,
            exported: None,
        }
    }

    fn set_period(&mut self, period: Period) {
        self.period = period;
        if let Some(days) = period.days() {
            let today = Local::now().date_naive();
            self.end = today;
            self.start = today - Duration::days(days - 1);
        }
    }

    fn query(&self) -> ApiResult<QueryParams> {
        if self.start > self.end {
            return Err(ApiError::Validation(
                "Start date must be before end date".to_string(),
            ));
        }
        Ok(QueryParams::new()
            .with("date_from", self.start.format(DATE_FORMAT))
            .with("date_to", self.end.format(DATE_FORMAT))
            .with("period", self.period.as_str())
            .opt("personnel_id", self.personnel_id))
    }

    async fn generate(&mut self) -> ApiResult<()> {
        let params = self.query()?;
        self.generating = true;
        let result = self
            .ctx
            .services
            .report
            .generate(self.kind, ReportFormat::Json, &params)
            .await;
        self.generating = false;

        if let ReportOutput::Data(report) = result? {
            self.summary = Some(Summary::from_report(&report));
        }
        Ok(())
    }

    async fn export(&mut self) -> ApiResult<()> {
        let params = self.query()?;
        let output = self
            .ctx
            .services
            .report
            .generate(self.kind, self.export_format, &params)
            .await?;
        let ReportOutput::File(file) = output else {
            return Ok(());
        };

        let dir = PathBuf::from(&self.ctx.config.storage.download_dir);
        match std::fs::create_dir_all(&dir).and_then(|_| file.save(&dir)) {
            Ok(path) => {
                tracing::info!(path = %path.display(), kind = self.kind.as_str(), "Report exported");
                self.ctx
                    .ui
                    .notifications()
                    .success(format!("Report saved to {}", path.display()));
                self.exported = Some(path);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to save report");
                self.ctx
                    .ui
                    .notifications()
                    .error(format!("Failed to save report: {}", e));
            }
        }
        Ok(())
    }

    fn select<'a>(id: &str, current: &str, options: impl IntoIterator<Item = (&'a str, String)>) -> Element {
        el("select").id(id).class("form-control").attr("value", current).children(
            options.into_iter().map(|(value, label)| {
                el("option")
                    .attr("value", value)
                    .flag("selected", value == current)
                    .text(label)
            }),
        )
    }

    fn controls(&self) -> Element {
        let personnel_value = self.personnel_id.map(|id| id.to_string()).unwrap_or_default();
        let personnel_options: Vec<(String, String)> = std::iter::once((String::new(), "All Personnel".to_string()))
            .chain(self.personnel.iter().map(|p| (p.id.to_string(), p.name.clone())))
            .collect();

        el("div")
            .class("report-controls")
            .child(Self::select(
                "report-kind",
                self.kind.as_str(),
                [
                    ("attendance", "Attendance".to_string()),
                    ("personnel", "Personnel".to_string()),
                    ("activity", "Activity".to_string()),
                ],
            ))
            .child(Self::select(
                "report-type",
                self.period.as_str(),
                [
                    ("daily", "Daily Report".to_string()),
                    ("weekly", "Weekly Report".to_string()),
                    ("monthly", "Monthly Report".to_string()),
                    ("custom", "Custom Range".to_string()),
                ],
            ))
            .child(
                el("input")
                    .id("date-range-start")
                    .attr("type", "date")
                    .attr("value", self.start.format(DATE_FORMAT).to_string()),
            )
            .child(
                el("input")
                    .id("date-range-end")
                    .attr("type", "date")
                    .attr("value", self.end.format(DATE_FORMAT).to_string()),
            )
            .child(Self::select(
                "personnel-filter",
                &personnel_value,
                personnel_options.iter().map(|(v, l)| (v.as_str(), l.clone())),
            ))
            .child(Self::select(
                "export-format",
                self.export_format.as_str(),
                [
                    ("pdf", "PDF".to_string()),
                    ("csv", "CSV".to_string()),
                    ("excel", "Excel".to_string()),
                ],
            ))
            .child(
                el("button")
                    .id("generate-report-btn")
                    .class("btn btn-primary")
                    .flag("disabled", self.generating)
                    .text("Generate Report"),
            )
            .child(el("button").id("export-report-btn").class("btn btn-outline").text("Export"))
    }

    fn report_body(&self) -> Element {
        let content = el("div").id("report-content");
        let Some(summary) = &self.summary else {
            return content;
        };
        if summary.total == 0 && summary.rows.is_empty() {
            return content.child(
                el("div")
                    .id("no-data-message")
                    .class("text-center")
                    .text("No attendance data found for the selected period"),
            );
        }

        let card = |id: &str, label: &str, value: u64| {
            el("div")
                .class("summary-card")
                .child(el("p").text(label))
                .child(el("p").id(id).class("summary-value").text(value.to_string()))
        };
        let rows = summary.rows.iter().map(|row| {
            let field = |key: &str| row.get(key).and_then(Value::as_str).unwrap_or("-").to_string();
            el("tr")
                .child(el("td").text(field("date")))
                .child(el("td").text(field("name")))
                .child(el("td").text(field("time_in")))
                .child(el("td").text(field("time_out")))
                .child(el("td").text(field("status")))
        });

        content
            .child(
                el("h2")
                    .id("report-title")
                    .text(format!("{} Report", capitalize(self.kind.as_str()))),
            )
            .child(el("p").id("report-date-range").text(format!(
                "Date Range: {} to {}",
                self.start.format(DATE_FORMAT),
                self.end.format(DATE_FORMAT)
            )))
            .child(
                el("div")
                    .class("summary-grid")
                    .child(card("total-records", "Total Records", summary.total))
                    .child(card("on-time-count", "On Time", summary.on_time))
                    .child(card("late-count", "Late", summary.late))
                    .child(card("absent-count", "Absent", summary.absent)),
            )
            .child(el("table").child(el("tbody").id("report-records-table").children(rows)))
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl View for ReportsView {
    fn kind(&self) -> ViewKind {
        ViewKind::Reports
    }

    fn render(&self) -> Node {
        let mut root = page("reports-container", "Attendance Reports")
            .child(el("p").class("page-subtitle").text("View and analyze attendance data"))
            .child(self.controls())
            .child(self.report_body());
        if let Some(path) = &self.exported {
            root = root.child(el("p").id("export-path").class("hint").text(path.display().to_string()));
        }
        root.into()
    }

    fn attach(&mut self) {
        let outlet = self.outlet.clone();
        for target in [
            "report-kind",
            "report-type",
            "date-range-start",
            "date-range-end",
            "personnel-filter",
            "export-format",
        ] {
            self.listeners.add(&outlet, UiEventKind::Input, target);
        }
        self.listeners.add(&outlet, UiEventKind::Click, "generate-report-btn");
        self.listeners.add(&outlet, UiEventKind::Click, "export-report-btn");
    }

    async fn load(&mut self) -> ViewResult<()> {
        match self.ctx.services.personnel.list(&QueryParams::new()).await {
            Ok(list) => self.personnel = list.data,
            Err(e) => tracing::warn!(error = %e, "Failed to load personnel for report filter"),
        }
        Ok(())
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        let value = input_value(&event).unwrap_or_default().trim().to_string();
        let result = match event.target() {
            "report-kind" => {
                if let Ok(kind) = value.parse() {
                    self.kind = kind;
                }
                Ok(())
            }
            "report-type" => {
                if let Some(period) = Period::parse(&value) {
                    self.set_period(period);
                }
                Ok(())
            }
            "date-range-start" | "date-range-end" => match NaiveDate::parse_from_str(&value, DATE_FORMAT) {
                Ok(date) => {
                    if event.target() == "date-range-start" {
                        self.start = date;
                    } else {
                        self.end = date;
                    }
                    self.period = Period::Custom;
                    Ok(())
                }
                Err(_) => Err(ApiError::Validation("Please enter a valid date".to_string())),
            },
            "personnel-filter" => {
                self.personnel_id = value.parse().ok();
                Ok(())
            }
            "export-format" => {
                match value.parse::<ReportFormat>() {
                    Ok(format) if format.is_file() => self.export_format = format,
                    _ => {}
                }
                Ok(())
            }
            "generate-report-btn" => self.generate().await,
            "export-report-btn" => self.export().await,
            _ => Ok(()),
        };

        if let Err(e) = result {
            notify_failure(&self.ctx, &e);
        }
        Ok(ViewAction::None)
    }

    fn destroy(&mut self) {
        self.listeners.release(&self.outlet);
        self.outlet.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HttpMethod, HttpResponse};
    use crate::config::Config;
    use crate::testing::{json_response, sign_in, test_context, test_context_with, FakeCamera};
    use serde_json::json;

    async fn loaded(ctx: &Arc<AppContext>) -> ReportsView {
        let mut view = ReportsView::new(ctx.clone(), Outlet::new());
        view.attach();
        view.load().await.unwrap();
        view
    }

    #[tokio::test]
    async fn test_generate_posts_range_and_shows_summary() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(
            HttpMethod::Get,
            "/personnel",
            json_response(200, json!({"data": [{"id": 3, "name": "Pedro Reyes"}]})),
        );
        transport.push(
            HttpMethod::Post,
            "/reports/attendance",
            json_response(200, json!({"data": {
                "summary": {"total": 12, "on_time": 9, "late": 2, "absent": 1},
                "records": [{"date": "2024-05-02", "name": "Pedro Reyes", "time_in": "08:10", "status": "late"}]
            }})),
        );

        let mut view = loaded(&ctx).await;
        view.handle(UiEvent::input("personnel-filter", "3")).await.unwrap();
        view.handle(UiEvent::input("date-range-start", "2024-05-01")).await.unwrap();
        view.handle(UiEvent::input("date-range-end", "2024-05-07")).await.unwrap();
        view.handle(UiEvent::click("generate-report-btn")).await.unwrap();

        let body = &transport.bodies(HttpMethod::Post, "/reports/attendance")[0];
        assert_eq!(body["date_from"], "2024-05-01");
        assert_eq!(body["date_to"], "2024-05-07");
        assert_eq!(body["period"], "custom");
        assert_eq!(body["personnel_id"], "3");
        assert_eq!(body["format"], "json");

        let markup = view.render();
        let late = Node::from(markup.find_by_id("late-count").unwrap().clone());
        assert_eq!(late.text_content(), "2");
        assert!(markup.find_by_id("report-records-table").is_some());
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected_locally() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.always(HttpMethod::Get, "/personnel", json_response(200, json!({"data": []})));

        let mut view = loaded(&ctx).await;
        view.handle(UiEvent::input("date-range-start", "2024-06-01")).await.unwrap();
        view.handle(UiEvent::input("date-range-end", "2024-05-01")).await.unwrap();
        view.handle(UiEvent::click("generate-report-btn")).await.unwrap();

        assert_eq!(transport.count(HttpMethod::Post, "/reports/attendance"), 0);
        assert_eq!(
            ctx.ui.notifications().visible()[0].message,
            "Start date must be before end date"
        );
    }

    #[tokio::test]
    async fn test_period_preset_sets_range() {
        let (ctx, transport, _) = test_context();
        transport.always(HttpMethod::Get, "/personnel", json_response(200, json!({"data": []})));
        let mut view = loaded(&ctx).await;

        view.handle(UiEvent::input("report-type", "daily")).await.unwrap();
        assert_eq!(view.start, view.end);

        view.handle(UiEvent::input("report-type", "monthly")).await.unwrap();
        assert_eq!((view.end - view.start).num_days(), 29);
    }

    #[tokio::test]
    async fn test_export_downloads_selected_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.download_dir = dir.path().to_string_lossy().to_string();
        let (ctx, transport, _) = test_context_with(config, FakeCamera::new());
        sign_in(&ctx);
        transport.always(HttpMethod::Get, "/personnel", json_response(200, json!({"data": []})));
        transport.push(
            HttpMethod::Get,
            "/reports/personnel",
            HttpResponse {
                status: 200,
                content_type: Some("text/csv".to_string()),
                body: b"id,name\n".to_vec(),
            },
        );

        let mut view = loaded(&ctx).await;
        view.handle(UiEvent::input("report-kind", "personnel")).await.unwrap();
        view.handle(UiEvent::input("export-format", "csv")).await.unwrap();
        view.handle(UiEvent::click("export-report-btn")).await.unwrap();

        let path = view.exported.clone().unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("personnel_report_"));
        assert_eq!(std::fs::read(path).unwrap(), b"id,name\n");
    }
}
