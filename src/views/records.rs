//! Attendance records view
//!
//! Server-side filtering and pagination; filters may arrive as route
//! parameters (`#/attendance/records?date_from=2024-05-01&type=in`).

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::dashboard::record_row;
use super::pagination::Pagination;
use super::{el, input_value, page, row_id, Element, Listeners, Node, Outlet, UiEvent, UiEventKind};
use super::{View, ViewAction, ViewKind, ViewResult};
use crate::api::dto::{AttendanceRecord, AttendanceType, ListResponse};
use crate::api::ApiResult;
use crate::app::AppContext;
use crate::router::RouteParams;
use crate::services::{QueryParams, ReportFormat, ReportOutput};

#[derive(Debug, Clone, Default, PartialEq)]
struct Filters {
    date_from: Option<String>,
    date_to: Option<String>,
    kind: Option<AttendanceType>,
    personnel_id: Option<u64>,
}

impl Filters {
    fn from_params(params: &RouteParams) -> Self {
        let text = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            date_from: text("date_from"),
            date_to: text("date_to"),
            kind: params.get("type").and_then(|t| t.parse().ok()),
            personnel_id: params.get("personnel_id").and_then(|id| id.parse().ok()),
        }
    }

    fn query(&self) -> QueryParams {
        QueryParams::new()
            .opt("date_from", self.date_from.as_ref())
            .opt("date_to", self.date_to.as_ref())
            .opt("type", self.kind.map(|k| k.as_str()))
    }
}

pub struct RecordsView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    filters: Filters,
    draft: Filters,
    pages: Pagination,
    records: Vec<AttendanceRecord>,
    loading: bool,
    error: Option<String>,
    exported: Option<PathBuf>,
}

impl RecordsView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet, params: RouteParams) -> Self {
        let per_page = ctx
            .services
            .settings
            .get_as::<u32>("ui.tableRowsPerPage")
            .unwrap_or(10);
        let mut pages = Pagination::new(per_page);
        pages.page = params
            .get("page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1)
            .max(1);
        let filters = Filters::from_params(&params);
        Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
            draft: filters.clone(),
            filters,
            pages,
            records: Vec::new(),
            loading: true,
            error: None,
            exported: None,
        }
    }

    async fn fetch(&self) -> ApiResult<ListResponse<AttendanceRecord>> {
        let params = self
            .filters
            .query()
            .with("page", self.pages.page)
            .with("per_page", self.pages.per_page);
        let attendance = &self.ctx.services.attendance;
        match self.filters.personnel_id {
            Some(id) => attendance.list_for_personnel(id, &params).await,
            None => attendance.list(&params).await,
        }
    }

    async fn reload(&mut self) {
        self.loading = true;
        match self.fetch().await {
            Ok(list) => {
                let total = list.total.map(|t| t as usize).unwrap_or(list.data.len());
                self.pages.total = total;
                self.records = list.data;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load attendance records");
                self.records.clear();
                self.error = Some("Failed to load attendance records".to_string());
            }
        }
        self.loading = false;
    }

    async fn export(&mut self) {
        let mut params = self.filters.query();
        if let Some(id) = self.filters.personnel_id {
            params = params.with("personnel_id", id);
        }
        let output = match self
            .ctx
            .services
            .attendance
            .generate_report(ReportFormat::Csv, &params)
            .await
        {
            Ok(output) => output,
            Err(_) => return,
        };
        let ReportOutput::File(file) = output else {
            return;
        };

        let dir = PathBuf::from(&self.ctx.config.storage.download_dir);
        let saved = std::fs::create_dir_all(&dir).and_then(|_| file.save(&dir));
        match saved {
            Ok(path) => {
                tracing::info!(path = %path.display(), "Attendance export saved");
                self.ctx
                    .ui
                    .notifications()
                    .success(format!("Report saved to {}", path.display()));
                self.exported = Some(path);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to save attendance export");
                self.ctx
                    .ui
                    .notifications()
                    .error(format!("Failed to save report: {}", e));
            }
        }
    }

    fn filter_bar(&self) -> Element {
        let type_value = self.draft.kind.map(|k| k.as_str()).unwrap_or("all");
        el("div")
            .class("records-filters")
            .child(
                el("input")
                    .id("filter-date-from")
                    .attr("type", "date")
                    .attr("value", self.draft.date_from.clone().unwrap_or_default()),
            )
            .child(
                el("input")
                    .id("filter-date-to")
                    .attr("type", "date")
                    .attr("value", self.draft.date_to.clone().unwrap_or_default()),
            )
            .child(el("select").id("filter-type").attr("value", type_value).children(
                [("all", "All"), ("in", "Time In"), ("out", "Time Out")].iter().map(|(value, label)| {
                    el("option")
                        .attr("value", *value)
                        .flag("selected", *value == type_value)
                        .text(*label)
                }),
            ))
            .child(el("button").id("btn-apply-filters").class("btn btn-primary").text("Apply"))
            .child(el("button").id("btn-clear-filters").class("btn btn-outline").text("Clear"))
            .child(el("button").id("btn-export").class("btn btn-outline").text("Export CSV"))
    }
}

#[async_trait]
impl View for RecordsView {
    fn kind(&self) -> ViewKind {
        ViewKind::AttendanceRecords
    }

    fn render(&self) -> Node {
        let body = el("tbody").id("records-table-body");
        let body = if self.loading {
            body.child(el("tr").child(el("td").attr("colspan", "4").text("Loading records...")))
        } else if let Some(error) = &self.error {
            body.child(
                el("tr").child(
                    el("td")
                        .attr("colspan", "4")
                        .class("error-message")
                        .text(error.clone())
                        .child(el("button").id("retry-btn").class("btn btn-sm btn-outline").text("Retry")),
                ),
            )
        } else if self.records.is_empty() {
            body.child(
                el("tr").child(
                    el("td")
                        .attr("colspan", "4")
                        .class("text-center")
                        .text("No attendance records found"),
                ),
            )
        } else {
            body.children(self.records.iter().map(record_row))
        };

        let mut root = page("records-container", "Attendance Records")
            .child(self.filter_bar())
            .child(
                el("table")
                    .class("records-table")
                    .child(
                        el("thead").child(
                            el("tr")
                                .child(el("th").text("Name"))
                                .child(el("th").text("Time In"))
                                .child(el("th").text("Time Out"))
                                .child(el("th").text("Status")),
                        ),
                    )
                    .child(body),
            )
            .child(self.pages.render());

        if let Some(path) = &self.exported {
            root = root.child(
                el("p")
                    .id("export-path")
                    .class("hint")
                    .text(path.display().to_string()),
            );
        }
        root.into()
    }

    fn attach(&mut self) {
        let outlet = self.outlet.clone();
        for target in ["filter-date-from", "filter-date-to", "filter-type"] {
            self.listeners.add(&outlet, UiEventKind::Input, target);
        }
        for target in [
            "btn-apply-filters",
            "btn-clear-filters",
            "btn-export",
            "retry-btn",
            "pagination-prev",
            "pagination-next",
            "page-*",
        ] {
            self.listeners.add(&outlet, UiEventKind::Click, target);
        }
    }

    async fn load(&mut self) -> ViewResult<()> {
        self.reload().await;
        Ok(())
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        let value = input_value(&event).map(|v| v.trim().to_string());
        let non_empty = value.clone().filter(|v| !v.is_empty());

        let changed_page = match event.target() {
            "filter-date-from" => {
                self.draft.date_from = non_empty;
                false
            }
            "filter-date-to" => {
                self.draft.date_to = non_empty;
                false
            }
            "filter-type" => {
                self.draft.kind = value.and_then(|v| v.parse().ok());
                false
            }
            "btn-apply-filters" => {
                self.draft.personnel_id = self.filters.personnel_id;
                self.filters = self.draft.clone();
                self.pages.page = 1;
                true
            }
            "btn-clear-filters" => {
                self.filters = Filters::default();
                self.draft = Filters::default();
                self.pages.page = 1;
                true
            }
            "btn-export" => {
                self.export().await;
                false
            }
            "retry-btn" => true,
            "pagination-prev" => self.pages.prev(),
            "pagination-next" => self.pages.next(),
            target => row_id(target, "page-").is_some_and(|p| self.pages.go_to(p as u32)),
        };

        if changed_page {
            self.reload().await;
        }
        Ok(ViewAction::None)
    }

    fn destroy(&mut self) {
        self.listeners.release(&self.outlet);
        self.outlet.clear();
    }
}
