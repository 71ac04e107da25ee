//! Dashboard view

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{el, page, Element, Listeners, Node, Outlet, UiEvent, UiEventKind};
use super::{View, ViewAction, ViewKind, ViewResult};
use crate::api::dto::AttendanceRecord;
use crate::api::ApiResult;
use crate::app::AppContext;
use crate::services::QueryParams;

const RANGES: [(&str, &str); 3] = [("day", "Today"), ("week", "This Week"), ("month", "This Month")];

#[derive(Debug, Default)]
struct Stats {
    attendance: Value,
    personnel: Value,
    recent: Vec<AttendanceRecord>,
}

pub struct DashboardView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    range: String,
    loading: bool,
    stats: Option<Stats>,
    error: Option<String>,
}

impl DashboardView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet) -> Self {
        let range = ctx
            .services
            .settings
            .get_as::<String>("dashboard.defaultDateRange")
            .filter(|r| RANGES.iter().any(|(key, _)| key == r))
            .unwrap_or_else(|| "week".to_string());
        Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
            range,
            loading: true,
            stats: None,
            error: None,
        }
    }

    async fn fetch(&self) -> ApiResult<Stats> {
        let services = &self.ctx.services;
        let attendance = services
            .attendance
            .statistics(&QueryParams::new().with("range", &self.range))
            .await?;
        let personnel = services.personnel.statistics().await?;
        let recent = services.attendance.recent(5).await?;
        Ok(Stats {
            attendance: unwrap_data(attendance),
            personnel: unwrap_data(personnel),
            recent,
        })
    }

    async fn reload(&mut self) {
        self.loading = true;
        match self.fetch().await {
            Ok(stats) => {
                self.stats = Some(stats);
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load dashboard data");
                self.error = Some("Failed to load dashboard data".to_string());
            }
        }
        self.loading = false;
    }

    fn stat_card(&self, id: &str, title: &str, value: u64) -> Element {
        let mut value_el = el("div").id(id).class("stat-value");
        value_el = if self.loading {
            value_el.class("skeleton-loader")
        } else {
            value_el.text(value.to_string())
        };
        el("div")
            .class("stat-card")
            .child(el("h3").class("stat-title").text(title))
            .child(value_el)
    }
}

/// Statistics endpoints wrap their payload in `data`
fn unwrap_data(value: Value) -> Value {
    match value.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => value,
    }
}

fn count(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

pub(crate) fn record_row(record: &AttendanceRecord) -> Element {
    let (status, status_class) = if record.is_late() {
        ("Late", "status-late")
    } else {
        ("Present", "status-present")
    };
    el("tr")
        .child(
            el("td").text(
                record
                    .personnel_name
                    .clone()
                    .unwrap_or_else(|| format!("#{}", record.personnel_id)),
            ),
        )
        .child(el("td").text(record.time_in.clone().unwrap_or_else(|| "-".to_string())))
        .child(el("td").text(record.time_out.clone().unwrap_or_else(|| "-".to_string())))
        .child(
            el("td").child(
                el("span")
                    .class("status-badge")
                    .class(status_class)
                    .text(status),
            ),
        )
}

#[async_trait]
impl View for DashboardView {
    fn kind(&self) -> ViewKind {
        ViewKind::Dashboard
    }

    fn render(&self) -> Node {
        let empty = Stats::default();
        let stats = self.stats.as_ref().unwrap_or(&empty);

        let ranges = RANGES.iter().map(|(key, label)| {
            el("button")
                .id(&format!("range-{}", key))
                .class("btn btn-sm")
                .class(if *key == self.range { "btn-primary" } else { "btn-outline" })
                .text(*label)
        });

        let rows: Vec<Element> = if stats.recent.is_empty() {
            vec![el("tr").child(
                el("td")
                    .attr("colspan", "4")
                    .class("text-center")
                    .text("No recent attendance records found"),
            )]
        } else {
            stats.recent.iter().map(record_row).collect()
        };

        let mut root = page("dashboard-container", "Dashboard")
            .child(
                el("div")
                    .class("dashboard-controls")
                    .children(ranges)
                    .child(el("button").id("btn-refresh").class("btn btn-sm btn-outline").text("Refresh")),
            )
            .child(
                el("div")
                    .class("stats-grid")
                    .child(self.stat_card("present-value", "Present Today", count(&stats.attendance, "today_present")))
                    .child(self.stat_card("absent-value", "Absent Today", count(&stats.attendance, "today_absent")))
                    .child(self.stat_card("late-value", "Late Arrivals", count(&stats.attendance, "today_late")))
                    .child(self.stat_card("personnel-value", "Total Personnel", count(&stats.personnel, "total"))),
            );

        if let Some(error) = &self.error {
            root = root.child(el("div").class("error-message").text(error.clone()));
        }

        root.child(
            el("div")
                .class("card recent-attendance")
                .child(el("h2").class("card-title").text("Recent Attendance"))
                .child(el("table").child(el("tbody").id("recent-attendance-body").children(rows))),
        )
        .into()
    }

    fn attach(&mut self) {
        for (key, _) in RANGES {
            self.listeners
                .add(&self.outlet, UiEventKind::Click, &format!("range-{}", key));
        }
        self.listeners.add(&self.outlet, UiEventKind::Click, "btn-refresh");
    }

    async fn load(&mut self) -> ViewResult<()> {
        self.reload().await;
        Ok(())
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        if let Some(range) = event.target().strip_prefix("range-") {
            self.range = range.to_string();
        }
        self.reload().await;
        Ok(ViewAction::None)
    }

    fn destroy(&mut self) {
        self.listeners.release(&self.outlet);
        self.outlet.clear();
    }
}
