//! Personnel list view
//!
//! Loads the whole list once, then filters, sorts and paginates locally.
//! Deleting goes through a confirmation panel.

use async_trait::async_trait;
use std::sync::Arc;

use super::pagination::Pagination;
use super::{el, input_value, page, row_id, Element, Listeners, Node, Outlet, UiEvent, UiEventKind};
use super::{View, ViewAction, ViewKind, ViewResult};
use crate::api::dto::Personnel;
use crate::app::AppContext;
use crate::router::RouteParams;
use crate::services::QueryParams;

const COLUMNS: [(&str, &str); 4] = [
    ("id_number", "ID Number"),
    ("name", "Name"),
    ("rank", "Rank"),
    ("position", "Position"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortDirection {
    Asc,
    Desc,
}

pub struct PersonnelView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    personnel: Vec<Personnel>,
    filter: String,
    sort_field: String,
    sort_direction: SortDirection,
    pages: Pagination,
    loading: bool,
    error: Option<String>,
    confirm_delete: Option<Personnel>,
}

impl PersonnelView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet, params: RouteParams) -> Self {
        let per_page = ctx
            .services
            .settings
            .get_as::<u32>("ui.tableRowsPerPage")
            .unwrap_or(10);
        let mut pages = Pagination::new(per_page);
        if let Some(page) = params.get("page").and_then(|p| p.parse().ok()) {
            pages.page = page;
        }
        Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
            personnel: Vec::new(),
            filter: params.get("search").cloned().unwrap_or_default(),
            sort_field: "name".to_string(),
            sort_direction: SortDirection::Asc,
            pages,
            loading: true,
            error: None,
            confirm_delete: None,
        }
    }

    async fn reload(&mut self) {
        self.loading = true;
        match self.ctx.services.personnel.list(&QueryParams::new()).await {
            Ok(list) => {
                self.personnel = list.data;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load personnel");
                self.error = Some("Failed to load personnel data".to_string());
            }
        }
        self.loading = false;
        let total = self.visible().len();
        self.pages.set_total(total);
    }

    /// Personnel matching the search, in the current sort order
    fn visible(&self) -> Vec<&Personnel> {
        let filter = self.filter.to_lowercase();
        let mut rows: Vec<&Personnel> = self
            .personnel
            .iter()
            .filter(|p| filter.is_empty() || matches_filter(p, &filter))
            .collect();

        rows.sort_by(|a, b| {
            let order = sort_key(a, &self.sort_field).cmp(&sort_key(b, &self.sort_field));
            match self.sort_direction {
                SortDirection::Asc => order,
                SortDirection::Desc => order.reverse(),
            }
        });
        rows
    }

    fn toggle_sort(&mut self, field: &str) {
        if self.sort_field == field {
            self.sort_direction = match self.sort_direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.sort_field = field.to_string();
            self.sort_direction = SortDirection::Asc;
        }
    }

    async fn delete_confirmed(&mut self) {
        let Some(person) = self.confirm_delete.take() else {
            return;
        };
        let pending = self
            .ctx
            .ui
            .notifications()
            .info(format!("Deleting {}...", person.name));
        let result = self.ctx.services.personnel.delete(person.id).await;
        self.ctx.ui.notifications().dismiss(pending);

        if result.is_ok() {
            self.reload().await;
        }
    }

    fn header(&self, field: &str, label: &str) -> Element {
        let mut th = el("th")
            .id(&format!("sort-{}", field))
            .class("sortable")
            .attr("data-sort", field)
            .text(label);
        if self.sort_field == field {
            th = th.class(match self.sort_direction {
                SortDirection::Asc => "sort-asc",
                SortDirection::Desc => "sort-desc",
            });
        }
        th
    }

    fn table_body(&self) -> Element {
        let body = el("tbody").id("personnel-table-body");
        if self.loading {
            return body.child(
                el("tr").child(
                    el("td")
                        .attr("colspan", "5")
                        .class("text-center")
                        .text("Loading personnel data..."),
                ),
            );
        }
        if let Some(error) = &self.error {
            return body.child(
                el("tr").child(
                    el("td")
                        .attr("colspan", "5")
                        .class("error-message")
                        .text(error.clone())
                        .child(el("button").id("retry-btn").class("btn btn-sm btn-outline").text("Retry")),
                ),
            );
        }

        let rows = self.visible();
        if rows.is_empty() {
            return body.child(
                el("tr").child(
                    el("td")
                        .attr("colspan", "5")
                        .class("text-center")
                        .text("No personnel found"),
                ),
            );
        }
        body.children(rows[self.pages.bounds()].iter().map(|p| person_row(p)))
    }
}

fn matches_filter(person: &Personnel, filter: &str) -> bool {
    [&person.id_number, &person.position, &person.rank, &person.station]
        .into_iter()
        .flatten()
        .chain(std::iter::once(&person.name))
        .any(|value| value.to_lowercase().contains(filter))
}

fn sort_key(person: &Personnel, field: &str) -> String {
    let value = match field {
        "id_number" => person.id_number.as_deref(),
        "rank" => person.rank.as_deref(),
        "position" => person.position.as_deref(),
        "station" => person.station.as_deref(),
        _ => Some(person.name.as_str()),
    };
    value.unwrap_or_default().to_lowercase()
}

fn person_row(person: &Personnel) -> Element {
    let cell = |value: &Option<String>| el("td").text(value.clone().unwrap_or_else(|| "N/A".to_string()));
    el("tr")
        .id(&format!("personnel-row-{}", person.id))
        .child(cell(&person.id_number))
        .child(el("td").text(person.name.clone()))
        .child(cell(&person.rank))
        .child(cell(&person.position))
        .child(
            el("td")
                .class("actions")
                .child(
                    el("button")
                        .id(&format!("edit-{}", person.id))
                        .class("btn btn-icon btn-edit")
                        .text("Edit"),
                )
                .child(
                    el("button")
                        .id(&format!("delete-{}", person.id))
                        .class("btn btn-icon btn-delete")
                        .text("Delete"),
                ),
        )
}

#[async_trait]
impl View for PersonnelView {
    fn kind(&self) -> ViewKind {
        ViewKind::Personnel
    }

    fn render(&self) -> Node {
        let header = el("tr").children(COLUMNS.iter().map(|(f, l)| self.header(f, l))).child(el("th").text("Actions"));

        let mut root = page("personnel-container", "Personnel Management")
            .child(
                el("div")
                    .class("personnel-controls")
                    .child(
                        el("input")
                            .id("personnel-search")
                            .class("search-input")
                            .attr("placeholder", "Search personnel...")
                            .attr("value", self.filter.clone()),
                    )
                    .child(
                        el("button")
                            .id("add-personnel-btn")
                            .class("btn btn-primary")
                            .text("Add Personnel"),
                    ),
            )
            .child(
                el("table")
                    .class("personnel-table")
                    .child(el("thead").child(header))
                    .child(self.table_body()),
            )
            .child(self.pages.render());

        if let Some(person) = &self.confirm_delete {
            root = root.child(
                el("div")
                    .id("confirm-modal")
                    .class("modal active")
                    .child(
                        el("p")
                            .id("confirm-message")
                            .text(format!("Are you sure you want to delete {}?", person.name)),
                    )
                    .child(el("button").id("confirm-cancel").class("btn btn-outline").text("Cancel"))
                    .child(el("button").id("confirm-ok").class("btn btn-danger").text("Confirm")),
            );
        }
        root.into()
    }

    fn attach(&mut self) {
        let outlet = self.outlet.clone();
        self.listeners.add(&outlet, UiEventKind::Input, "personnel-search");
        for target in [
            "add-personnel-btn",
            "retry-btn",
            "pagination-prev",
            "pagination-next",
            "page-*",
            "sort-*",
            "edit-*",
            "delete-*",
            "confirm-ok",
            "confirm-cancel",
        ] {
            self.listeners.add(&outlet, UiEventKind::Click, target);
        }
    }

    async fn load(&mut self) -> ViewResult<()> {
        self.reload().await;
        Ok(())
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        let target = event.target().to_string();
        match target.as_str() {
            "personnel-search" => {
                self.filter = input_value(&event).unwrap_or_default().to_string();
                self.pages.page = 1;
                let total = self.visible().len();
                self.pages.set_total(total);
            }
            "add-personnel-btn" => return Ok(ViewAction::Navigate("/personnel/add".to_string())),
            "retry-btn" => self.reload().await,
            "pagination-prev" => {
                self.pages.prev();
            }
            "pagination-next" => {
                self.pages.next();
            }
            "confirm-cancel" => self.confirm_delete = None,
            "confirm-ok" => self.delete_confirmed().await,
            _ => {
                if let Some(page) = row_id(&target, "page-") {
                    self.pages.go_to(page as u32);
                } else if let Some(field) = target.strip_prefix("sort-") {
                    if COLUMNS.iter().any(|(f, _)| *f == field) {
                        self.toggle_sort(field);
                    }
                } else if let Some(id) = row_id(&target, "edit-") {
                    return Ok(ViewAction::Navigate(format!("/personnel/edit?id={}", id)));
                } else if let Some(id) = row_id(&target, "delete-") {
                    self.confirm_delete = self.personnel.iter().find(|p| p.id == id).cloned();
                }
            }
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
    use crate::api::HttpMethod;
    use crate::testing::{json_response, sign_in, test_context};
    use serde_json::json;

    fn roster() -> serde_json::Value {
        json!({"data": [
            {"id": 1, "name": "Maria Santos", "position": "Fire Officer II", "id_number": "BFP-002"},
            {"id": 2, "name": "Juan Dela Cruz", "position": "Fire Officer I", "id_number": "BFP-001"},
            {"id": 3, "name": "Pedro Reyes", "position": "Senior Fire Officer", "id_number": "BFP-003"}
        ]})
    }

    async fn loaded(ctx: &Arc<AppContext>, params: RouteParams) -> PersonnelView {
        let outlet = Outlet::new();
        let mut view = PersonnelView::new(ctx.clone(), outlet, params);
        view.attach();
        view.load().await.unwrap();
        view
    }

    fn names(view: &PersonnelView) -> Vec<String> {
        view.visible().iter().map(|p| p.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_search_filters_and_sorts_by_name() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.always(HttpMethod::Get, "/personnel", json_response(200, roster()));

        let mut view = loaded(&ctx, RouteParams::new()).await;
        assert_eq!(names(&view), vec!["Juan Dela Cruz", "Maria Santos", "Pedro Reyes"]);

        view.handle(UiEvent::input("personnel-search", "fire officer i"))
            .await
            .unwrap();
        assert_eq!(names(&view), vec!["Juan Dela Cruz", "Maria Santos"]);

        view.handle(UiEvent::click("sort-name")).await.unwrap();
        assert_eq!(names(&view), vec!["Maria Santos", "Juan Dela Cruz"]);
    }

    #[tokio::test]
    async fn test_search_param_prefills_filter() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.always(HttpMethod::Get, "/personnel", json_response(200, roster()));

        let params: RouteParams = [("search".to_string(), "BFP-003".to_string())].into();
        let view = loaded(&ctx, params).await;
        assert_eq!(names(&view), vec!["Pedro Reyes"]);
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.always(HttpMethod::Get, "/personnel", json_response(200, roster()));
        transport.push(HttpMethod::Delete, "/personnel/2", json_response(200, json!({"success": true})));

        let mut view = loaded(&ctx, RouteParams::new()).await;
        view.handle(UiEvent::click("delete-2")).await.unwrap();
        let markup = view.render();
        assert_eq!(
            Node::from(markup.find_by_id("confirm-message").unwrap().clone()).text_content(),
            "Are you sure you want to delete Juan Dela Cruz?"
        );
        assert_eq!(transport.count(HttpMethod::Delete, "/personnel/2"), 0);

        view.handle(UiEvent::click("confirm-ok")).await.unwrap();
        assert_eq!(transport.count(HttpMethod::Delete, "/personnel/2"), 1);
        assert_eq!(transport.count(HttpMethod::Get, "/personnel"), 2);
        assert!(view.render().find_by_id("confirm-modal").is_none());
    }

    #[tokio::test]
    async fn test_row_actions_navigate() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.always(HttpMethod::Get, "/personnel", json_response(200, roster()));

        let mut view = loaded(&ctx, RouteParams::new()).await;
        assert_eq!(
            view.handle(UiEvent::click("edit-3")).await.unwrap(),
            ViewAction::Navigate("/personnel/edit?id=3".to_string())
        );
        assert_eq!(
            view.handle(UiEvent::click("add-personnel-btn")).await.unwrap(),
            ViewAction::Navigate("/personnel/add".to_string())
        );
    }

    #[tokio::test]
    async fn test_load_failure_offers_retry() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(HttpMethod::Get, "/personnel", json_response(500, json!({"error": "boom"})));

        let view = loaded(&ctx, RouteParams::new()).await;
        let markup = view.render();
        assert!(markup.find_by_id("retry-btn").is_some());
        assert!(markup.text_content().contains("Failed to load personnel data"));
    }
}
